//! School (tenant) records and their lifecycle.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::error::{Result, TrackError};
use crate::rbac::UserId;

/// A single DNS label: letters, digits and hyphens, at most 63 characters.
static SUBDOMAIN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9-]{1,63}$").expect("Invalid subdomain regex")
});

// ═══════════════════════════════════════════════════════════════════════════════
// Identifiers
// ═══════════════════════════════════════════════════════════════════════════════

/// Strongly-typed school identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Normalize and check a subdomain label. Labels are stored lowercase.
pub fn normalize_subdomain(raw: &str) -> Result<String> {
    let label = raw.trim();
    if !SUBDOMAIN_REGEX.is_match(label) {
        return Err(TrackError::validation(format!("Invalid subdomain: {}", raw))
            .with_context("subdomain", raw));
    }
    Ok(label.to_ascii_lowercase())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════════════════════════

/// School lifecycle state.
///
/// ```text
/// Inactive ──► Active ──► Inactive
///                 │
///                 └─────► Deleted (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    #[default]
    Inactive,
    Active,
    Deleted,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "INACTIVE",
            Self::Active => "ACTIVE",
            Self::Deleted => "DELETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INACTIVE" => Some(Self::Inactive),
            "ACTIVE" => Some(Self::Active),
            "DELETED" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Staying in the current state is always allowed.
    pub fn can_transition_to(&self, next: TenantStatus) -> bool {
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Self::Inactive, Self::Active)
                | (Self::Active, Self::Inactive)
                | (Self::Active, Self::Deleted)
        )
    }

    pub fn transition_to(self, next: TenantStatus) -> Result<TenantStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TrackError::invalid_state_transition(self, next))
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tenant
// ═══════════════════════════════════════════════════════════════════════════════

/// A school. Never physically removed; deletion is the `Deleted` state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub phone_number: String,
    pub address: String,
    pub subdomain: String,
    pub status: TenantStatus,
    pub director_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// New schools start out inactive until an operator activates them.
    pub fn new(
        name: impl Into<String>,
        phone_number: impl Into<String>,
        address: impl Into<String>,
        subdomain: impl Into<String>,
        price: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TenantId::generate(),
            name: name.into(),
            phone_number: phone_number.into(),
            address: address.into(),
            subdomain: subdomain.into(),
            status: TenantStatus::Inactive,
            director_id: None,
            logo: None,
            price,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    pub fn is_deleted(&self) -> bool {
        self.status == TenantStatus::Deleted
    }

    /// Apply a lifecycle transition, bumping `updated_at`.
    pub fn set_status(&mut self, next: TenantStatus) -> Result<()> {
        self.status = self.status.transition_to(next)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}
