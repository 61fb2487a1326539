//! User listing within the school selected by `--host`.

use anyhow::Result;
use clap::Subcommand;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::models::{Page, User};
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum UserCommands {
    /// List users of one role
    List {
        /// ADMIN, STAFF, TEACHER or STUDENT
        #[arg(long)]
        role: String,
        /// Match against name or phone number
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "10")]
        limit: u32,
    },
}

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Phone")]
    phone: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&User> for UserRow {
    fn from(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            name: u.full_name.clone(),
            phone: u.phone_number.clone(),
            role: u.role.clone(),
            status: u.status.clone(),
        }
    }
}

fn list_query(role: &str, search: Option<&str>, page: u32, limit: u32) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("role", role.to_uppercase()),
        ("page", page.to_string()),
        ("limit", limit.to_string()),
    ];
    if let Some(term) = search.filter(|s| !s.trim().is_empty()) {
        query.push(("search", term.to_string()));
    }
    query
}

pub async fn execute(cmd: UserCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        UserCommands::List {
            role,
            search,
            page,
            limit,
        } => {
            let query = list_query(&role, search.as_deref(), page, limit);
            let result: Page<User> = client.get_query("/api/v1/users", &query).await?;
            if format == OutputFormat::Table {
                output::print_list(&result.data, |u: &User| UserRow::from(u), format)?;
                output::print_page_footer(result.page, result.total_pages, result.total_data);
            } else {
                output::print_item(&result, format)?;
            }
        }
    }
    Ok(())
}
