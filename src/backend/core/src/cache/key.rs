//! Deterministic cache key generation.
//!
//! Keys follow the grammar `<entity>:<indexKind>:<value>[:<segment>...]`:
//! - `tenant:id:<id>` and `tenant:subdomain:<subdomain>`
//! - `user:id:<id>`
//! - `users:tenant:id:<tenantId>` and `users:tenant:id:<tenantId>:role:<ROLE>`
//! - `tenants:page:<page>`
//!
//! Every key also names the TTL bucket its value is stored under.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rbac::{Role, UserId};
use crate::tenant::TenantId;

// ═══════════════════════════════════════════════════════════════════════════════
// Key Parts
// ═══════════════════════════════════════════════════════════════════════════════

/// Cached entity kind. Plural kinds hold listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    Tenant,
    Tenants,
    User,
    Users,
}

impl KeyType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Tenant => "tenant",
            Self::Tenants => "tenants",
            Self::User => "user",
            Self::Users => "users",
        }
    }

    /// Listings live in the content bucket, single records in the default one.
    pub fn bucket(&self) -> TtlBucket {
        match self {
            Self::Tenant | Self::User => TtlBucket::Default,
            Self::Tenants | Self::Users => TtlBucket::Content,
        }
    }
}

/// Which field the value is indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Id,
    Subdomain,
    TenantId,
    Page,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Subdomain => "subdomain",
            Self::TenantId => "tenant:id",
            Self::Page => "page",
        }
    }
}

/// TTL class of a cached value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlBucket {
    #[default]
    Default,
    Content,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cache Key
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key_type: KeyType,
    index: IndexKind,
    value: String,
    segments: Vec<String>,
}

impl CacheKey {
    pub fn new(key_type: KeyType, index: IndexKind, value: impl Into<String>) -> Self {
        Self {
            key_type,
            index,
            value: value.into(),
            segments: Vec::new(),
        }
    }

    /// Add a trailing key segment.
    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    pub fn tenant_by_id(id: &TenantId) -> Self {
        Self::new(KeyType::Tenant, IndexKind::Id, id.as_str())
    }

    pub fn tenant_by_subdomain(subdomain: &str) -> Self {
        Self::new(KeyType::Tenant, IndexKind::Subdomain, subdomain)
    }

    pub fn user_by_id(id: &UserId) -> Self {
        Self::new(KeyType::User, IndexKind::Id, id.as_str())
    }

    pub fn users_by_tenant(tenant_id: &TenantId) -> Self {
        Self::new(KeyType::Users, IndexKind::TenantId, tenant_id.as_str())
    }

    pub fn users_by_tenant_role(tenant_id: &TenantId, role: Role) -> Self {
        Self::users_by_tenant(tenant_id)
            .with_segment("role")
            .with_segment(role.as_str())
    }

    pub fn tenants_page(page: u32) -> Self {
        Self::new(KeyType::Tenants, IndexKind::Page, page.to_string())
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn bucket(&self) -> TtlBucket {
        self.key_type.bucket()
    }

    /// Build the key string, optionally under a namespace prefix.
    pub fn build(&self, namespace: Option<&str>) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(4 + self.segments.len());

        if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
            parts.push(ns);
        }
        parts.push(self.key_type.prefix());
        parts.push(self.index.as_str());
        parts.push(&self.value);
        parts.extend(self.segments.iter().map(String::as_str));

        parts.join(":")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build(None))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
