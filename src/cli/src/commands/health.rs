//! Health check command.

use anyhow::Result;

use crate::client::ApiClient;
use crate::output::{self, OutputFormat};

pub async fn execute(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.get_raw("/health").await?;

    if format != OutputFormat::Table {
        return output::print_item(&health, format);
    }

    let field = |name: &str| {
        health
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    };
    let status = field("status");

    output::print_header("System Health");
    output::print_detail("Status", &status);
    output::print_detail("API URL", client.base_url());
    output::print_detail("Version", &field("version"));
    output::print_detail("Timestamp", &field("timestamp"));

    if status == "healthy" {
        output::print_success("Server is up");
    } else {
        output::print_error(&format!("Server status: {}", status));
    }
    Ok(())
}
