//! School onboarding, lookup, lifecycle and listing.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::cache::{CacheKey, InvalidationEvent, ReadThroughCache};
use crate::config::PaginationSettings;
use crate::error::{ErrorCode, Result, TrackError};
use crate::pagination::{PageQuery, PageResult, PageSource, Paginator};
use crate::rbac::{Role, UserId};
use crate::store::{TenantStore, UserStore};
use crate::tenant::{normalize_subdomain, Tenant, TenantId, TenantStatus};

// ═══════════════════════════════════════════════════════════════════════════════
// Inputs
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTenant {
    pub name: String,
    pub phone_number: String,
    pub address: String,
    pub subdomain: String,
    #[serde(default)]
    pub logo: Option<String>,
    pub price: i64,
}

/// Partial update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdomain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TenantStatus>,
}

fn require_text(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TrackError::validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tenant Service
// ═══════════════════════════════════════════════════════════════════════════════

pub struct TenantService {
    tenants: Arc<dyn TenantStore>,
    users: Arc<dyn UserStore>,
    cache: ReadThroughCache,
    pagination: PaginationSettings,
}

impl TenantService {
    pub fn new(
        tenants: Arc<dyn TenantStore>,
        users: Arc<dyn UserStore>,
        cache: ReadThroughCache,
        pagination: PaginationSettings,
    ) -> Self {
        Self {
            tenants,
            users,
            cache,
            pagination,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// A school that is not deleted.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: &TenantId) -> Result<Tenant> {
        let store = &self.tenants;
        self.cache
            .get_or_populate(&CacheKey::tenant_by_id(id), || async move {
                store.find_by_id(id).await
            })
            .await?
            .filter(|tenant| !tenant.is_deleted())
            .ok_or_else(TrackError::school_not_found)
    }

    /// Cached lookup in any lifecycle state. State checks are the caller's job.
    #[instrument(skip(self))]
    pub async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>> {
        let store = &self.tenants;
        self.cache
            .get_or_populate(&CacheKey::tenant_by_subdomain(subdomain), || async move {
                store.find_by_subdomain(subdomain).await
            })
            .await
    }

    pub async fn get_by_subdomain(&self, subdomain: &str) -> Result<Tenant> {
        self.find_by_subdomain(subdomain)
            .await?
            .ok_or_else(TrackError::school_not_found)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Onboard a school. It starts out inactive.
    #[instrument(skip(self, input), fields(subdomain = %input.subdomain))]
    pub async fn create(&self, input: NewTenant) -> Result<Tenant> {
        let subdomain = normalize_subdomain(&input.subdomain)?;
        if self.tenants.find_by_subdomain(&subdomain).await?.is_some() {
            return Err(TrackError::subdomain_already_exists(subdomain));
        }

        let mut tenant = Tenant::new(
            require_text("name", &input.name)?,
            require_text("phoneNumber", &input.phone_number)?,
            require_text("address", &input.address)?,
            subdomain,
            input.price,
        );
        tenant.logo = input.logo;

        self.tenants
            .insert(&tenant)
            .await
            .map_err(|e| self.duplicate_subdomain(e, &tenant.subdomain))?;

        self.cache
            .invalidate(&InvalidationEvent::tenant(tenant.id.clone(), tenant.subdomain.clone()).keys())
            .await?;

        info!(tenant_id = %tenant.id, subdomain = %tenant.subdomain, "School created");
        Ok(tenant)
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, id: &TenantId, update: TenantUpdate) -> Result<Tenant> {
        let mut tenant = self.load_for_write(id).await?;
        let previous_subdomain = tenant.subdomain.clone();

        if let Some(name) = update.name {
            tenant.name = require_text("name", &name)?;
        }
        if let Some(phone) = update.phone_number {
            tenant.phone_number = require_text("phoneNumber", &phone)?;
        }
        if let Some(address) = update.address {
            tenant.address = require_text("address", &address)?;
        }
        if let Some(logo) = update.logo {
            tenant.logo = Some(logo);
        }
        if let Some(raw) = update.subdomain {
            let subdomain = normalize_subdomain(&raw)?;
            if subdomain != tenant.subdomain {
                if self.tenants.find_by_subdomain(&subdomain).await?.is_some() {
                    return Err(TrackError::subdomain_already_exists(subdomain));
                }
                tenant.subdomain = subdomain;
            }
        }
        if let Some(status) = update.status {
            tenant.set_status(status)?;
        }
        tenant.updated_at = Utc::now();

        self.tenants
            .update(&tenant)
            .await
            .map_err(|e| self.duplicate_subdomain(e, &tenant.subdomain))?;
        self.invalidate(&tenant, &previous_subdomain).await?;

        info!(tenant_id = %tenant.id, status = %tenant.status, "School updated");
        Ok(tenant)
    }

    /// Make an ADMIN of the school its director.
    #[instrument(skip(self))]
    pub async fn assign_director(&self, id: &TenantId, user_id: &UserId) -> Result<Tenant> {
        let mut tenant = self.load_for_write(id).await?;

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .filter(|user| !user.is_deleted() && user.tenant_id == tenant.id)
            .ok_or_else(TrackError::user_not_found)?;

        if user.role != Role::Admin {
            return Err(TrackError::director_role_must_be_admin());
        }

        tenant.director_id = Some(user.id);
        tenant.updated_at = Utc::now();

        self.tenants.update(&tenant).await?;
        self.invalidate(&tenant, &tenant.subdomain).await?;

        info!(tenant_id = %tenant.id, director_id = %user_id, "Director assigned");
        Ok(tenant)
    }

    /// Find or create the active platform school used by operators.
    #[instrument(skip(self))]
    pub async fn ensure_platform(&self, subdomain: &str, name: &str) -> Result<Tenant> {
        let subdomain = normalize_subdomain(subdomain)?;
        if let Some(existing) = self.tenants.find_by_subdomain(&subdomain).await? {
            if existing.is_deleted() {
                return Err(TrackError::configuration(format!(
                    "bootstrap school '{}' has been deleted",
                    subdomain
                )));
            }
            if existing.is_active() {
                return Ok(existing);
            }
            return self
                .update(
                    &existing.id,
                    TenantUpdate {
                        status: Some(TenantStatus::Active),
                        ..Default::default()
                    },
                )
                .await;
        }

        let created = self
            .create(NewTenant {
                name: name.to_string(),
                phone_number: "-".to_string(),
                address: "-".to_string(),
                subdomain,
                logo: None,
                price: 0,
            })
            .await?;
        self.update(
            &created.id,
            TenantUpdate {
                status: Some(TenantStatus::Active),
                ..Default::default()
            },
        )
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listing
    // ─────────────────────────────────────────────────────────────────────────

    /// Schools that are not deleted. The default first page is cached.
    #[instrument(skip(self))]
    pub async fn list(&self, query: &PageQuery) -> Result<PageResult<Tenant>> {
        let request = query.into_request(&self.pagination)?;
        let source = TenantListing {
            store: self.tenants.as_ref(),
        };

        if !query.is_default(&self.pagination) {
            return Paginator::paginate(&source, request).await;
        }

        let page = self
            .cache
            .get_or_populate(&CacheKey::tenants_page(1), || async {
                Paginator::paginate(&source, request).await.map(Some)
            })
            .await?;
        page.ok_or_else(|| TrackError::internal("Tenant listing produced no page"))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    /// Read from the store, bypassing the cache, for a read-modify-write.
    async fn load_for_write(&self, id: &TenantId) -> Result<Tenant> {
        self.tenants
            .find_by_id(id)
            .await?
            .filter(|tenant| !tenant.is_deleted())
            .ok_or_else(TrackError::school_not_found)
    }

    async fn invalidate(&self, tenant: &Tenant, previous_subdomain: &str) -> Result<()> {
        let event = if previous_subdomain == tenant.subdomain {
            InvalidationEvent::tenant(tenant.id.clone(), tenant.subdomain.clone())
        } else {
            InvalidationEvent::tenant_renamed(
                tenant.id.clone(),
                tenant.subdomain.clone(),
                previous_subdomain,
            )
        };
        self.cache.invalidate(&event.keys()).await
    }

    /// A unique violation that slipped past the pre-check is still a taken subdomain.
    fn duplicate_subdomain(&self, error: TrackError, subdomain: &str) -> TrackError {
        if error.code() == ErrorCode::DuplicateRecord {
            TrackError::subdomain_already_exists(subdomain)
        } else {
            error
        }
    }
}

/// Non-deleted schools as a [`PageSource`].
struct TenantListing<'a> {
    store: &'a dyn TenantStore,
}

#[async_trait]
impl PageSource for TenantListing<'_> {
    type Item = Tenant;

    async fn count(&self) -> Result<u64> {
        self.store.count().await
    }

    async fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<Tenant>> {
        self.store.list(offset, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBackend, CacheConfig, InMemoryBackend};
    use crate::rbac::{User, UserStatus};
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        backend: Arc<InMemoryBackend>,
        service: TenantService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(InMemoryBackend::default());
        let cache = ReadThroughCache::new(backend.clone(), CacheConfig::default());
        let service = TenantService::new(
            store.clone(),
            store.clone(),
            cache,
            PaginationSettings::default(),
        );
        Fixture {
            store,
            backend,
            service,
        }
    }

    fn new_tenant(subdomain: &str) -> NewTenant {
        NewTenant {
            name: "Acme School".to_string(),
            phone_number: "+998901234567".to_string(),
            address: "Main st".to_string(),
            subdomain: subdomain.to_string(),
            logo: None,
            price: 100,
        }
    }

    fn user(tenant_id: &TenantId, role: Role) -> User {
        User {
            id: UserId::generate(),
            tenant_id: tenant_id.clone(),
            full_name: "Director".to_string(),
            phone_number: "+998900000001".to_string(),
            role,
            status: UserStatus::Active,
            gender: None,
            password_hash: String::new(),
            guardian_name: None,
            guardian_phone_number: None,
            address: None,
            salary: None,
            birthday: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_starts_inactive() {
        let f = fixture();
        let tenant = f.service.create(new_tenant("Acme")).await.unwrap();
        assert_eq!(tenant.status, TenantStatus::Inactive);
        assert_eq!(tenant.subdomain, "acme");
    }

    #[tokio::test]
    async fn test_duplicate_subdomain() {
        let f = fixture();
        f.service.create(new_tenant("acme")).await.unwrap();
        let err = f.service.create(new_tenant("ACME")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SubdomainAlreadyExists);
    }

    #[tokio::test]
    async fn test_update_invalidates_old_and_new_subdomain() {
        let f = fixture();
        let tenant = f.service.create(new_tenant("old")).await.unwrap();

        f.service.get_by_subdomain("old").await.unwrap();
        f.service.get_by_id(&tenant.id).await.unwrap();
        assert!(f.backend.exists("tenant:subdomain:old").await.unwrap());

        let updated = f
            .service
            .update(
                &tenant.id,
                TenantUpdate {
                    subdomain: Some("new".to_string()),
                    status: Some(TenantStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(!f.backend.exists("tenant:subdomain:old").await.unwrap());
        assert!(!f.backend.exists(&format!("tenant:id:{}", tenant.id)).await.unwrap());
        assert!(f.service.find_by_subdomain("old").await.unwrap().is_none());
        assert_eq!(f.service.get_by_subdomain("new").await.unwrap().status, TenantStatus::Active);
        assert_eq!(f.service.get_by_id(&tenant.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_invalid_transition_rejected() {
        let f = fixture();
        let tenant = f.service.create(new_tenant("acme")).await.unwrap();
        let err = f
            .service
            .update(
                &tenant.id,
                TenantUpdate {
                    status: Some(TenantStatus::Deleted),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidStateTransition);
    }

    #[tokio::test]
    async fn test_deleted_tenant_is_not_found_by_id() {
        let f = fixture();
        let tenant = f.service.create(new_tenant("acme")).await.unwrap();
        for status in [TenantStatus::Active, TenantStatus::Deleted] {
            f.service
                .update(
                    &tenant.id,
                    TenantUpdate {
                        status: Some(status),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }

        let err = f.service.get_by_id(&tenant.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchoolNotFound);
        // Still resolvable by subdomain so operators can see it.
        assert!(f.service.find_by_subdomain("acme").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_assign_director_requires_admin() {
        let f = fixture();
        let tenant = f.service.create(new_tenant("acme")).await.unwrap();

        let staff = user(&tenant.id, Role::Staff);
        UserStore::insert(f.store.as_ref(), &staff).await.unwrap();
        let err = f.service.assign_director(&tenant.id, &staff.id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DirectorRoleMustBeAdmin);

        let mut admin = user(&tenant.id, Role::Admin);
        admin.phone_number = "+998900000002".to_string();
        UserStore::insert(f.store.as_ref(), &admin).await.unwrap();
        let updated = f.service.assign_director(&tenant.id, &admin.id).await.unwrap();
        assert_eq!(updated.director_id, Some(admin.id));
    }

    #[tokio::test]
    async fn test_assign_director_unknown_user() {
        let f = fixture();
        let tenant = f.service.create(new_tenant("acme")).await.unwrap();
        let err = f
            .service
            .assign_director(&tenant.id, &UserId::new("ghost"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UserNotFound);
    }

    #[tokio::test]
    async fn test_ensure_platform_is_idempotent() {
        let f = fixture();
        let first = f.service.ensure_platform("Admin", "Platform").await.unwrap();
        assert_eq!(first.status, TenantStatus::Active);
        let second = f.service.ensure_platform("admin", "Platform").await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_first_page_cached_and_invalidated() {
        let f = fixture();
        f.service.create(new_tenant("a")).await.unwrap();

        let page = f.service.list(&PageQuery::default()).await.unwrap();
        assert_eq!(page.total_data, 1);
        assert!(f.backend.exists("tenants:page:1").await.unwrap());

        f.service.create(new_tenant("b")).await.unwrap();
        assert!(!f.backend.exists("tenants:page:1").await.unwrap());

        let page = f.service.list(&PageQuery::default()).await.unwrap();
        assert_eq!(page.total_data, 2);
    }

    #[tokio::test]
    async fn test_non_default_page_is_not_cached() {
        let f = fixture();
        f.service.create(new_tenant("a")).await.unwrap();
        let page = f
            .service
            .list(&PageQuery::new(Some(2), Some(1)))
            .await
            .unwrap();
        assert!(page.data.is_empty());
        assert!(page.has_prev_page);
        assert!(!f.backend.exists("tenants:page:1").await.unwrap());
    }
}
