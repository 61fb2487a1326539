//! Cache administration.

use anyhow::Result;
use clap::Subcommand;
use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Drop every cached entry (SUPER_ADMIN only)
    Clear,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheCleared {
    cleared: bool,
    backend: String,
}

pub async fn execute(cmd: CacheCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        CacheCommands::Clear => {
            let result: CacheCleared = client
                .post("/api/v1/cache/clear", &serde_json::json!({}))
                .await?;
            match format {
                OutputFormat::Table => {
                    output::print_success(&format!("Cache cleared ({} backend)", result.backend))
                }
                _ => output::print_item(&result, format)?,
            }
        }
    }
    Ok(())
}
