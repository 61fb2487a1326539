//! Configuration management commands.
//!
//! Stores CLI settings in `<config dir>/teachtrack/config.toml`.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::output::{self, OutputFormat};

/// Keys `config set` accepts.
pub const KNOWN_KEYS: [&str; 3] = ["api-url", "host", "token"];

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show all configuration
    Show,

    /// Set a configuration value
    Set {
        /// One of: api-url, host, token
        key: String,
        /// Value to set
        value: String,
    },

    /// Print the configuration file path
    Path,
}

/// Persistent CLI configuration stored on disk.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl CliConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if !KNOWN_KEYS.contains(&key) {
            bail!("Unknown key '{}' (expected one of: {})", key, KNOWN_KEYS.join(", "));
        }
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Values for display, with the token shortened.
    pub fn masked(&self) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(k, v)| {
                let shown = if k == "token" && v.chars().count() > 12 {
                    format!("{}...", v.chars().take(12).collect::<String>())
                } else {
                    v.clone()
                };
                (k.clone(), shown)
            })
            .collect()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("teachtrack").join("config.toml"))
}

/// Saved configuration, or defaults when nothing is stored yet.
pub fn load() -> CliConfig {
    config_path()
        .and_then(|path| CliConfig::load_from(&path))
        .unwrap_or_default()
}

/// Persist a freshly issued token.
pub fn save_token(token: &str) -> Result<PathBuf> {
    let path = config_path()?;
    let mut cfg = CliConfig::load_from(&path)?;
    cfg.set("token", token)?;
    cfg.save_to(&path)?;
    Ok(path)
}

pub async fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let cfg = CliConfig::load_from(&config_path()?)?;
            if cfg.values.is_empty() {
                output::print_info("No configuration values set.");
                return Ok(());
            }
            let shown = cfg.masked();
            match format {
                OutputFormat::Table => {
                    output::print_header("Configuration");
                    for (k, v) in &shown {
                        output::print_detail(k, v);
                    }
                }
                _ => output::print_item(&shown, format)?,
            }
        }

        ConfigCommands::Set { key, value } => {
            let path = config_path()?;
            let mut cfg = CliConfig::load_from(&path)?;
            cfg.set(&key, &value)?;
            cfg.save_to(&path)?;
            match format {
                OutputFormat::Table => output::print_success(&format!("{} updated", key)),
                _ => output::print_item(&serde_json::json!({ "key": key, "saved": true }), format)?,
            }
        }

        ConfigCommands::Path => println!("{}", config_path()?.display()),
    }

    Ok(())
}
