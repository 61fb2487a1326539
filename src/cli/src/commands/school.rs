//! School management commands.
//!
//! `list`, `create` and `director` need a SUPER_ADMIN token; `get` and
//! `update` also work for a school's own ADMIN.

use anyhow::{bail, Result};
use clap::Subcommand;
use serde::Serialize;
use serde_json::json;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::models::{Page, School};
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum SchoolCommands {
    /// List schools
    List {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "10")]
        limit: u32,
    },

    /// Show one school
    Get {
        /// School ID
        id: String,
    },

    /// Onboard a new school (starts INACTIVE)
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        address: String,
        #[arg(long)]
        subdomain: String,
        #[arg(long, default_value = "0")]
        price: i64,
        #[arg(long)]
        logo: Option<String>,
    },

    /// Change school fields or lifecycle status
    Update {
        /// School ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        subdomain: Option<String>,
        #[arg(long)]
        logo: Option<String>,
        /// ACTIVE, INACTIVE or DELETED
        #[arg(long)]
        status: Option<String>,
    },

    /// Assign an ADMIN of the school as its director
    Director {
        /// School ID
        id: String,
        /// User ID of the new director
        #[arg(long)]
        user: String,
    },
}

#[derive(Tabled)]
struct SchoolRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Subdomain")]
    subdomain: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Director")]
    director: String,
}

impl From<&School> for SchoolRow {
    fn from(s: &School) -> Self {
        Self {
            id: s.id.clone(),
            name: s.name.clone(),
            subdomain: s.subdomain.clone(),
            status: s.status.clone(),
            director: s.director_id.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct SchoolPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subdomain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

impl SchoolPatch {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone_number.is_none()
            && self.address.is_none()
            && self.subdomain.is_none()
            && self.logo.is_none()
            && self.status.is_none()
    }
}

fn show(school: &School, format: OutputFormat) -> Result<()> {
    if format != OutputFormat::Table {
        return output::print_item(school, format);
    }
    output::print_header(&school.name);
    output::print_detail("ID", &school.id);
    output::print_detail("Subdomain", &school.subdomain);
    output::print_detail("Status", &school.status);
    output::print_detail("Director", school.director_id.as_deref().unwrap_or("-"));
    Ok(())
}

pub async fn execute(cmd: SchoolCommands, client: &ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        SchoolCommands::List { page, limit } => {
            let result: Page<School> = client
                .get_query("/api/v1/schools", &[("page", page), ("limit", limit)])
                .await?;
            if format == OutputFormat::Table {
                output::print_list(&result.data, |s: &School| SchoolRow::from(s), format)?;
                output::print_page_footer(result.page, result.total_pages, result.total_data);
            } else {
                output::print_item(&result, format)?;
            }
        }

        SchoolCommands::Get { id } => {
            let school: School = client.get(&format!("/api/v1/schools/{}", id)).await?;
            show(&school, format)?;
        }

        SchoolCommands::Create {
            name,
            phone,
            address,
            subdomain,
            price,
            logo,
        } => {
            let body = json!({
                "name": name,
                "phoneNumber": phone,
                "address": address,
                "subdomain": subdomain,
                "price": price,
                "logo": logo,
            });
            let school: School = client.post("/api/v1/schools", &body).await?;
            if format == OutputFormat::Table {
                output::print_success(&format!("School '{}' created as INACTIVE", school.subdomain));
            }
            show(&school, format)?;
        }

        SchoolCommands::Update {
            id,
            name,
            phone,
            address,
            subdomain,
            logo,
            status,
        } => {
            let patch = SchoolPatch {
                name,
                phone_number: phone,
                address,
                subdomain,
                logo,
                status: status.map(|s| s.to_uppercase()),
            };
            if patch.is_empty() {
                bail!("Nothing to update: pass at least one field");
            }
            let school: School = client.put(&format!("/api/v1/schools/{}", id), &patch).await?;
            show(&school, format)?;
        }

        SchoolCommands::Director { id, user } => {
            let school: School = client
                .patch(
                    &format!("/api/v1/schools/{}/director", id),
                    &json!({ "directorId": user }),
                )
                .await?;
            if format == OutputFormat::Table {
                output::print_success(&format!("Director of '{}' set to {}", school.subdomain, user));
            } else {
                output::print_item(&school, format)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_serializes_only_given_fields() {
        let patch = SchoolPatch {
            phone_number: Some("+998901".to_string()),
            status: Some("ACTIVE".to_string()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"phoneNumber": "+998901", "status": "ACTIVE"})
        );
        assert!(SchoolPatch::default().is_empty());
    }
}
