//! Accounts inside a school: login, registration, status and listing.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::auth::{AuthTokenService, PasswordHasher};
use crate::cache::{CacheKey, InvalidationEvent, ReadThroughCache};
use crate::config::PaginationSettings;
use crate::context::{Identity, TenantContext};
use crate::error::{ErrorCode, Result, TrackError};
use crate::pagination::{PageQuery, PageResult, PageSource, Paginator};
use crate::rbac::{AccessControl, Gender, Role, User, UserId, UserStatus};
use crate::store::{UserFilter, UserStore};
use crate::tenant::Tenant;

// ═══════════════════════════════════════════════════════════════════════════════
// Inputs and Outputs
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub full_name: String,
    pub phone_number: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Role,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub guardian_name: Option<String>,
    #[serde(default)]
    pub guardian_phone_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub salary: Option<i64>,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
}

/// A redacted user together with a freshly issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Listing query as received from the caller.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub search: Option<String>,
    pub page: PageQuery,
}

// ═══════════════════════════════════════════════════════════════════════════════
// User Service
// ═══════════════════════════════════════════════════════════════════════════════

pub struct UserService {
    users: Arc<dyn UserStore>,
    cache: ReadThroughCache,
    tokens: Arc<AuthTokenService>,
    hasher: Arc<dyn PasswordHasher>,
    access: AccessControl,
    pagination: PaginationSettings,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserStore>,
        cache: ReadThroughCache,
        tokens: Arc<AuthTokenService>,
        hasher: Arc<dyn PasswordHasher>,
        pagination: PaginationSettings,
    ) -> Self {
        Self {
            users,
            cache,
            tokens,
            hasher,
            access: AccessControl::new(),
            pagination,
        }
    }

    /// Phone and password login within the resolved school.
    #[instrument(skip(self, password), fields(tenant_id = %tenant.tenant_id))]
    pub async fn login(&self, tenant: &TenantContext, phone: &str, password: &str) -> Result<Session> {
        let user = self
            .users
            .find_by_phone_in_tenant(&tenant.tenant_id, phone.trim())
            .await?
            .filter(|user| !user.is_deleted())
            .ok_or_else(TrackError::user_not_found)?;

        if !self.hasher.verify(password, &user.password_hash)? {
            warn!(user_id = %user.id, "Login rejected: wrong password");
            return Err(TrackError::invalid_credentials());
        }
        if !user.is_active() {
            return Err(TrackError::user_inactive());
        }

        info!(user_id = %user.id, role = %user.role, "User logged in");
        self.session(user)
    }

    /// Create an account in the resolved school on behalf of `actor`.
    #[instrument(skip(self, input), fields(actor = %actor.id, role = %input.role))]
    pub async fn register(
        &self,
        actor: &Identity,
        tenant: &TenantContext,
        input: NewUser,
    ) -> Result<Session> {
        if !self.access.can_create(actor.role, input.role) {
            return Err(TrackError::no_access());
        }
        if input.password != input.confirm_password {
            return Err(TrackError::password_mismatch());
        }

        let phone = input.phone_number.trim().to_string();
        if phone.is_empty() || input.full_name.trim().is_empty() {
            return Err(TrackError::validation("fullName and phoneNumber are required"));
        }
        if self
            .users
            .find_by_phone_in_tenant(&tenant.tenant_id, &phone)
            .await?
            .is_some()
        {
            return Err(TrackError::user_already_exists());
        }

        let status = if actor.role.is_school_admin() {
            UserStatus::Active
        } else {
            UserStatus::Inactive
        };
        let now = Utc::now();
        let user = User {
            id: UserId::generate(),
            tenant_id: tenant.tenant_id.clone(),
            full_name: input.full_name.trim().to_string(),
            phone_number: phone,
            role: input.role,
            status,
            gender: input.gender,
            password_hash: self.hasher.hash(&input.password)?,
            guardian_name: input.guardian_name,
            guardian_phone_number: input.guardian_phone_number,
            address: input.address,
            salary: input.salary,
            birthday: input.birthday,
            created_at: now,
            updated_at: now,
        };

        self.users.insert(&user).await.map_err(|e| {
            if e.code() == ErrorCode::DuplicateRecord {
                TrackError::user_already_exists()
            } else {
                e
            }
        })?;
        self.cache
            .invalidate(&InvalidationEvent::user_created(user.tenant_id.clone()).keys())
            .await?;

        info!(user_id = %user.id, status = %user.status.as_str(), "User registered");
        self.session(user)
    }

    /// The caller's own account.
    #[instrument(skip(self), fields(user_id = %identity.id))]
    pub async fn me(&self, identity: &Identity) -> Result<User> {
        let user = self.cached_user(&identity.id).await?;
        if !user.is_active() {
            return Err(TrackError::user_inactive());
        }
        Ok(user.redacted())
    }

    /// Activate, deactivate or soft-delete an account ranked below the actor.
    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn update_status(
        &self,
        actor: &Identity,
        tenant: &TenantContext,
        user_id: &UserId,
        status: UserStatus,
    ) -> Result<User> {
        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .filter(|user| !user.is_deleted() && user.tenant_id == tenant.tenant_id)
            .ok_or_else(TrackError::user_not_found)?;

        self.access.require_can_assume_role(Some(actor.role), user.role)?;

        user.status = status;
        user.updated_at = Utc::now();
        self.users.update(&user).await?;
        self.cache
            .invalidate(&InvalidationEvent::user_updated(user.id.clone(), user.tenant_id.clone()).keys())
            .await?;

        info!(user_id = %user.id, status = %status.as_str(), "User status changed");
        Ok(user.redacted())
    }

    /// Users of one role in the resolved school.
    ///
    /// Only roles strictly below the actor may be listed. The first default
    /// page without a search term is cached per role.
    #[instrument(skip(self, query), fields(actor = %actor.id))]
    pub async fn list(
        &self,
        actor: &Identity,
        tenant: &TenantContext,
        query: &UserQuery,
    ) -> Result<PageResult<User>> {
        let role = query.role.ok_or_else(TrackError::missing_query_role)?;
        if !self.access.can_assume_role(actor.role, role) {
            return Err(TrackError::no_access());
        }

        let request = query.page.into_request(&self.pagination)?;
        let filter = UserFilter::new(tenant.tenant_id.clone())
            .with_role(role)
            .with_search(query.search.clone());
        let source = UserListing {
            store: self.users.as_ref(),
            filter: &filter,
        };

        let cacheable = filter.search.is_none() && query.page.is_default(&self.pagination);
        if !cacheable {
            return Ok(Paginator::paginate(&source, request).await?.map(User::redacted));
        }

        let page = self
            .cache
            .get_or_populate(&CacheKey::users_by_tenant_role(&tenant.tenant_id, role), || async {
                let page = Paginator::paginate(&source, request).await?;
                Ok(Some(page.map(User::redacted)))
            })
            .await?;
        page.ok_or_else(|| TrackError::internal("User listing produced no page"))
    }

    /// Seed the platform operator account if it does not exist yet.
    #[instrument(skip(self, password), fields(tenant_id = %tenant.id))]
    pub async fn ensure_operator(&self, tenant: &Tenant, phone: &str, password: &str) -> Result<User> {
        if let Some(existing) = self.users.find_by_phone_in_tenant(&tenant.id, phone).await? {
            return Ok(existing.redacted());
        }

        let now = Utc::now();
        let operator = User {
            id: UserId::generate(),
            tenant_id: tenant.id.clone(),
            full_name: "Platform operator".to_string(),
            phone_number: phone.to_string(),
            role: Role::SuperAdmin,
            status: UserStatus::Active,
            gender: None,
            password_hash: self.hasher.hash(password)?,
            guardian_name: None,
            guardian_phone_number: None,
            address: None,
            salary: None,
            birthday: None,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(&operator).await?;
        self.cache
            .invalidate(&InvalidationEvent::user_created(tenant.id.clone()).keys())
            .await?;

        info!(user_id = %operator.id, "Operator account created");
        Ok(operator.redacted())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn cached_user(&self, id: &UserId) -> Result<User> {
        let store = &self.users;
        self.cache
            .get_or_populate(&CacheKey::user_by_id(id), || async move {
                Ok(store.find_by_id(id).await?.map(User::redacted))
            })
            .await?
            .filter(|user| !user.is_deleted())
            .ok_or_else(TrackError::user_not_found)
    }

    fn session(&self, user: User) -> Result<Session> {
        let identity = Identity::new(user.id.clone(), user.role, Some(user.tenant_id.clone()));
        let token = self.tokens.issue(&identity)?;
        Ok(Session {
            user: user.redacted(),
            token,
        })
    }
}

/// Users matching a filter as a [`PageSource`].
struct UserListing<'a> {
    store: &'a dyn UserStore,
    filter: &'a UserFilter,
}

#[async_trait]
impl PageSource for UserListing<'_> {
    type Item = User;

    async fn count(&self) -> Result<u64> {
        self.store.count_matching(self.filter).await
    }

    async fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<User>> {
        self.store.list_matching(self.filter, offset, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBackend, CacheConfig, InMemoryBackend};
    use crate::store::MemoryStore;
    use crate::tenant::TenantId;
    use std::time::Duration;

    /// Plain-text hasher so tests skip the Argon2 cost.
    struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, password: &str) -> Result<String> {
            Ok(format!("plain:{}", password))
        }

        fn verify(&self, password: &str, hash: &str) -> Result<bool> {
            Ok(hash == format!("plain:{}", password))
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        backend: Arc<InMemoryBackend>,
        tokens: Arc<AuthTokenService>,
        service: UserService,
        tenant: TenantContext,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(InMemoryBackend::default());
        let tokens = Arc::new(
            AuthTokenService::new("secret", Duration::from_secs(3600), Duration::ZERO).unwrap(),
        );
        let service = UserService::new(
            store.clone(),
            ReadThroughCache::new(backend.clone(), CacheConfig::default()),
            tokens.clone(),
            Arc::new(PlainHasher),
            PaginationSettings::default(),
        );
        Fixture {
            store,
            backend,
            tokens,
            service,
            tenant: TenantContext {
                tenant_id: TenantId::new("t-1"),
                subdomain: "acme".to_string(),
            },
        }
    }

    fn actor(role: Role) -> Identity {
        Identity::new(UserId::new(format!("actor-{}", role)), role, Some(TenantId::new("t-1")))
    }

    fn new_user(phone: &str, role: Role) -> NewUser {
        NewUser {
            full_name: "Ali Valiyev".to_string(),
            phone_number: phone.to_string(),
            password: "pw".to_string(),
            confirm_password: "pw".to_string(),
            role,
            gender: Some(Gender::Male),
            guardian_name: None,
            guardian_phone_number: None,
            address: None,
            salary: None,
            birthday: None,
        }
    }

    #[tokio::test]
    async fn test_register_by_admin_is_active_and_login_works() {
        let f = fixture();
        let session = f
            .service
            .register(&actor(Role::Admin), &f.tenant, new_user("+998901", Role::Teacher))
            .await
            .unwrap();
        assert_eq!(session.user.status, UserStatus::Active);
        assert!(session.user.password_hash.is_empty());

        let login = f.service.login(&f.tenant, "+998901", "pw").await.unwrap();
        let identity = f.tokens.verify(&login.token).unwrap();
        assert_eq!(identity.id, session.user.id);
        assert_eq!(identity.tenant_id, Some(f.tenant.tenant_id.clone()));
    }

    #[tokio::test]
    async fn test_register_by_staff_is_inactive() {
        let f = fixture();
        let session = f
            .service
            .register(&actor(Role::Staff), &f.tenant, new_user("+998902", Role::Student))
            .await
            .unwrap();
        assert_eq!(session.user.status, UserStatus::Inactive);

        let err = f.service.login(&f.tenant, "+998902", "pw").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UserInactive);
    }

    #[tokio::test]
    async fn test_register_rules() {
        let f = fixture();
        let err = f
            .service
            .register(&actor(Role::Staff), &f.tenant, new_user("+1", Role::Admin))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoAccess);

        let mut mismatched = new_user("+1", Role::Student);
        mismatched.confirm_password = "other".to_string();
        let err = f
            .service
            .register(&actor(Role::Admin), &f.tenant, mismatched)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PasswordMismatch);

        f.service
            .register(&actor(Role::Admin), &f.tenant, new_user("+1", Role::Student))
            .await
            .unwrap();
        let err = f
            .service
            .register(&actor(Role::Admin), &f.tenant, new_user("+1", Role::Teacher))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UserAlreadyExists);
    }

    #[tokio::test]
    async fn test_login_failures() {
        let f = fixture();
        f.service
            .register(&actor(Role::Admin), &f.tenant, new_user("+998903", Role::Staff))
            .await
            .unwrap();

        let err = f.service.login(&f.tenant, "+000", "pw").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UserNotFound);

        let err = f.service.login(&f.tenant, "+998903", "bad").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidCredentials);

        let other = TenantContext {
            tenant_id: TenantId::new("t-2"),
            subdomain: "other".to_string(),
        };
        let err = f.service.login(&other, "+998903", "pw").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UserNotFound);
    }

    #[tokio::test]
    async fn test_me_is_cached_and_invalidated_by_status_change() {
        let f = fixture();
        let session = f
            .service
            .register(&actor(Role::Admin), &f.tenant, new_user("+998904", Role::Teacher))
            .await
            .unwrap();
        let identity = Identity::new(session.user.id.clone(), Role::Teacher, Some(f.tenant.tenant_id.clone()));

        f.service.me(&identity).await.unwrap();
        let key = format!("user:id:{}", session.user.id);
        assert!(f.backend.exists(&key).await.unwrap());

        f.service
            .update_status(&actor(Role::Admin), &f.tenant, &session.user.id, UserStatus::Inactive)
            .await
            .unwrap();
        assert!(!f.backend.exists(&key).await.unwrap());

        let err = f.service.me(&identity).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UserInactive);
    }

    #[tokio::test]
    async fn test_update_status_requires_higher_rank() {
        let f = fixture();
        let session = f
            .service
            .register(&actor(Role::Admin), &f.tenant, new_user("+998905", Role::Staff))
            .await
            .unwrap();

        let err = f
            .service
            .update_status(&actor(Role::Staff), &f.tenant, &session.user.id, UserStatus::Inactive)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoAccess);
    }

    #[tokio::test]
    async fn test_list_requires_role_below_actor() {
        let f = fixture();
        let query = UserQuery::default();
        let err = f.service.list(&actor(Role::Admin), &f.tenant, &query).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingQueryRole);

        let query = UserQuery {
            role: Some(Role::Staff),
            ..Default::default()
        };
        let err = f.service.list(&actor(Role::Staff), &f.tenant, &query).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoAccess);
    }

    #[tokio::test]
    async fn test_list_caches_first_page_and_register_invalidates() {
        let f = fixture();
        let admin = actor(Role::Admin);
        f.service
            .register(&admin, &f.tenant, new_user("+10", Role::Student))
            .await
            .unwrap();

        let query = UserQuery {
            role: Some(Role::Student),
            ..Default::default()
        };
        let page = f.service.list(&admin, &f.tenant, &query).await.unwrap();
        assert_eq!(page.total_data, 1);
        assert!(page.data.iter().all(|u| u.password_hash.is_empty()));
        assert!(f.backend.exists("users:tenant:id:t-1:role:STUDENT").await.unwrap());

        f.service
            .register(&admin, &f.tenant, new_user("+11", Role::Student))
            .await
            .unwrap();
        assert!(!f.backend.exists("users:tenant:id:t-1:role:STUDENT").await.unwrap());
        assert_eq!(f.service.list(&admin, &f.tenant, &query).await.unwrap().total_data, 2);
    }

    #[tokio::test]
    async fn test_search_is_not_cached() {
        let f = fixture();
        let admin = actor(Role::Admin);
        f.service
            .register(&admin, &f.tenant, new_user("+998906", Role::Student))
            .await
            .unwrap();

        let query = UserQuery {
            role: Some(Role::Student),
            search: Some("valiyev".to_string()),
            page: PageQuery::default(),
        };
        let page = f.service.list(&admin, &f.tenant, &query).await.unwrap();
        assert_eq!(page.total_data, 1);
        assert!(!f.backend.exists("users:tenant:id:t-1:role:STUDENT").await.unwrap());
        assert_eq!(UserStore::count_matching(f.store.as_ref(), &UserFilter::new(TenantId::new("t-1"))).await.unwrap(), 1);
    }
}
