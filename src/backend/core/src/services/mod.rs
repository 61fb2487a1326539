//! Domain services.
//!
//! Every read goes through the [`ReadThroughCache`]; every mutation
//! invalidates the keys it affects before reporting success.
//!
//! ```rust,ignore
//! let services = Services::new(store.clone(), store, cache, tokens, hasher, settings);
//! let school = services.tenants.get_by_subdomain("acme").await?;
//! ```

pub mod tenants;
pub mod users;

pub use tenants::{NewTenant, TenantService, TenantUpdate};
pub use users::{NewUser, Session, UserQuery, UserService};

use std::sync::Arc;
use tracing::info;

use crate::auth::{AuthTokenService, PasswordHasher};
use crate::cache::ReadThroughCache;
use crate::config::{BootstrapSettings, PaginationSettings};
use crate::error::Result;
use crate::store::{TenantStore, UserStore};

/// The service graph shared by handlers and the tenant resolver.
#[derive(Clone)]
pub struct Services {
    pub tenants: Arc<TenantService>,
    pub users: Arc<UserService>,
}

impl Services {
    pub fn new(
        tenant_store: Arc<dyn TenantStore>,
        user_store: Arc<dyn UserStore>,
        cache: ReadThroughCache,
        tokens: Arc<AuthTokenService>,
        hasher: Arc<dyn PasswordHasher>,
        pagination: PaginationSettings,
    ) -> Self {
        let tenants = TenantService::new(
            tenant_store,
            user_store.clone(),
            cache.clone(),
            pagination.clone(),
        );
        let users = UserService::new(user_store, cache, tokens, hasher, pagination);
        Self {
            tenants: Arc::new(tenants),
            users: Arc::new(users),
        }
    }

    /// Make sure the platform school and its operator account exist.
    pub async fn bootstrap(&self, settings: &BootstrapSettings) -> Result<()> {
        let platform = self
            .tenants
            .ensure_platform(&settings.subdomain, &settings.school_name)
            .await?;
        let operator = self
            .users
            .ensure_operator(&platform, &settings.phone_number, &settings.password)
            .await?;
        info!(
            subdomain = %platform.subdomain,
            operator_id = %operator.id,
            "Bootstrap complete"
        );
        Ok(())
    }
}
