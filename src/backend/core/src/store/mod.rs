//! Persistence contracts for schools and users.
//!
//! The services only see the traits below; the server wires in [`PgStore`],
//! tests use [`MemoryStore`]. Both order listings by `(created_at, id)` so
//! pagination is stable across calls.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::rbac::{Role, User, UserId};
use crate::tenant::{Tenant, TenantId};

// ═══════════════════════════════════════════════════════════════════════════════
// Tenant Store
// ═══════════════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Lookup by id, whatever the lifecycle state.
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>>;

    /// Lookup by subdomain, whatever the lifecycle state.
    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>>;

    /// Fails with a duplicate-record error when the subdomain is taken.
    async fn insert(&self, tenant: &Tenant) -> Result<()>;

    /// Overwrite the stored record with the same id.
    async fn update(&self, tenant: &Tenant) -> Result<()>;

    /// Number of schools that are not deleted.
    async fn count(&self) -> Result<u64>;

    /// Schools that are not deleted, in stable order.
    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<Tenant>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// User Store
// ═══════════════════════════════════════════════════════════════════════════════

/// Listing filter. Deleted users never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFilter {
    pub tenant_id: TenantId,
    pub role: Option<Role>,
    /// Case-insensitive substring of the phone number or full name.
    pub search: Option<String>,
}

impl UserFilter {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            role: None,
            search: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Blank search terms are ignored.
    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    pub fn matches(&self, user: &User) -> bool {
        if user.is_deleted() || user.tenant_id != self.tenant_id {
            return false;
        }
        if self.role.is_some_and(|role| role != user.role) {
            return false;
        }
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                user.phone_number.to_lowercase().contains(&term)
                    || user.full_name.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>>;

    /// Phone numbers are unique per school, not globally.
    async fn find_by_phone_in_tenant(&self, tenant_id: &TenantId, phone: &str) -> Result<Option<User>>;

    async fn insert(&self, user: &User) -> Result<()>;

    async fn update(&self, user: &User) -> Result<()>;

    async fn count_matching(&self, filter: &UserFilter) -> Result<u64>;

    async fn list_matching(&self, filter: &UserFilter, offset: u64, limit: u64) -> Result<Vec<User>>;
}
