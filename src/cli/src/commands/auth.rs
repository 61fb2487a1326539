//! `login`: exchange phone and password for a token.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::config;
use crate::client::ApiClient;
use crate::models::Session;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct LoginArgs {
    /// Phone number of the account
    #[arg(long)]
    phone: String,

    /// Account password
    #[arg(long, env = "TEACHTRACK_PASSWORD", hide_env_values = true)]
    password: String,

    /// Print the token without saving it
    #[arg(long)]
    no_save: bool,
}

pub async fn execute(args: LoginArgs, client: &ApiClient, format: OutputFormat) -> Result<()> {
    let session: Session = client
        .post(
            "/api/v1/auth/login",
            &json!({ "phoneNumber": args.phone, "password": args.password }),
        )
        .await?;

    if format != OutputFormat::Table {
        output::print_item(&session, format)?;
    } else {
        output::print_success(&format!(
            "Signed in as {} ({})",
            session.user.full_name, session.user.role
        ));
        println!("{}", session.token);
    }

    if !args.no_save {
        let path = config::save_token(&session.token)?;
        if format == OutputFormat::Table {
            output::print_info(&format!("Token saved to {}", path.display()));
        }
    }
    Ok(())
}
