//! TeachTrack CLI.
//!
//! Talks to the HTTP API. The school is picked by `--host` (sent as the
//! `Host` header); the token comes from `--token`, the environment or the
//! one saved by `teachtrack login`.

mod client;
mod commands;
mod models;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{auth, cache, config, health, school, user};
use output::OutputFormat;

const DEFAULT_API_URL: &str = "http://localhost:3000";

/// TeachTrack - multi-tenant school backend CLI
#[derive(Parser)]
#[command(
    name = "teachtrack",
    version,
    about = "TeachTrack school management CLI",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// API server URL
    #[arg(long, global = true, env = "TEACHTRACK_API_URL")]
    api_url: Option<String>,

    /// School host, e.g. acme.teachtrack.app
    #[arg(long, global = true, env = "TEACHTRACK_HOST")]
    host: Option<String>,

    /// Bearer token
    #[arg(long, global = true, env = "TEACHTRACK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health
    Health,

    /// Sign in and save the token
    Login(auth::LoginArgs),

    /// School management
    #[command(subcommand)]
    School(school::SchoolCommands),

    /// User management
    #[command(subcommand)]
    User(user::UserCommands),

    /// Cache administration
    #[command(subcommand)]
    Cache(cache::CacheCommands),

    /// CLI configuration
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

/// Flags win over saved configuration.
fn resolve(flag: Option<String>, saved: &config::CliConfig, key: &str) -> Option<String> {
    flag.or_else(|| saved.get(key).map(str::to_string))
}

async fn run(cli: Cli) -> Result<()> {
    let format = cli.output;
    if let Commands::Config(cmd) = cli.command {
        return config::execute(cmd, format).await;
    }

    let saved = config::load();
    let api_url = resolve(cli.api_url, &saved, "api-url").unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let host = resolve(cli.host, &saved, "host");
    let token = resolve(cli.token, &saved, "token");
    let client = client::ApiClient::new(&api_url, host, token)?;

    match cli.command {
        Commands::Health => health::execute(&client, format).await,
        Commands::Login(args) => auth::execute(args, &client, format).await,
        Commands::School(cmd) => school::execute(cmd, &client, format).await,
        Commands::User(cmd) => user::execute(cmd, &client, format).await,
        Commands::Cache(cmd) => cache::execute(cmd, &client, format).await,
        Commands::Config(_) => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flag_overrides_saved_value() {
        let mut saved = config::CliConfig::default();
        saved.set("host", "saved.school.com").unwrap();

        assert_eq!(
            resolve(Some("flag.school.com".to_string()), &saved, "host").as_deref(),
            Some("flag.school.com")
        );
        assert_eq!(resolve(None, &saved, "host").as_deref(), Some("saved.school.com"));
        assert_eq!(resolve(None, &saved, "token"), None);
    }

    #[test]
    fn test_parse_school_update() {
        let cli = Cli::try_parse_from([
            "teachtrack",
            "--host",
            "acme.school.com",
            "school",
            "update",
            "abc",
            "--status",
            "active",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("acme.school.com"));
        assert!(matches!(cli.command, Commands::School(school::SchoolCommands::Update { .. })));
    }
}
