//! In-process store used by tests and the in-memory server profile.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{TenantStore, UserFilter, UserStore};
use crate::error::{ErrorCode, Result, TrackError};
use crate::rbac::{User, UserId};
use crate::tenant::{Tenant, TenantId};

/// DashMap-backed store with unique subdomain and per-school phone indexes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tenants: DashMap<TenantId, Tenant>,
    subdomains: DashMap<String, TenantId>,
    users: DashMap<UserId, User>,
    phones: DashMap<(TenantId, String), UserId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn duplicate(entity: &str, value: &str) -> TrackError {
        TrackError::new(ErrorCode::DuplicateRecord, format!("{} already exists", entity))
            .with_context("value", value)
    }

    /// Stable `(created_at, id)` ordering applied to every listing.
    fn sorted<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K) -> Vec<T> {
        items.sort_by_key(|item| key(item));
        items
    }

    fn phone_key(user: &User) -> (TenantId, String) {
        (user.tenant_id.clone(), user.phone_number.clone())
    }

    fn window<T>(items: Vec<T>, offset: u64, limit: u64) -> Vec<T> {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        items.into_iter().skip(offset).take(limit).collect()
    }

    fn listed_tenants(&self) -> Vec<Tenant> {
        let tenants = self
            .tenants
            .iter()
            .filter(|entry| !entry.value().is_deleted())
            .map(|entry| entry.value().clone())
            .collect();
        Self::sorted(tenants, |t: &Tenant| (t.created_at, t.id.clone()))
    }

    fn matching_users(&self, filter: &UserFilter) -> Vec<User> {
        let users = self
            .users
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        Self::sorted(users, |u: &User| (u.created_at, u.id.clone()))
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>> {
        Ok(self.tenants.get(id).map(|t| t.value().clone()))
    }

    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>> {
        let Some(id) = self.subdomains.get(subdomain).map(|id| id.value().clone()) else {
            return Ok(None);
        };
        Ok(self.tenants.get(&id).map(|t| t.value().clone()))
    }

    async fn insert(&self, tenant: &Tenant) -> Result<()> {
        match self.subdomains.entry(tenant.subdomain.clone()) {
            Entry::Occupied(_) => return Err(Self::duplicate("Subdomain", &tenant.subdomain)),
            Entry::Vacant(slot) => {
                slot.insert(tenant.id.clone());
            }
        }
        self.tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(())
    }

    async fn update(&self, tenant: &Tenant) -> Result<()> {
        let previous = self
            .tenants
            .get(&tenant.id)
            .map(|t| t.subdomain.clone())
            .ok_or_else(|| TrackError::not_found("Tenant", tenant.id.as_str()))?;

        if previous != tenant.subdomain {
            match self.subdomains.entry(tenant.subdomain.clone()) {
                Entry::Occupied(_) => return Err(Self::duplicate("Subdomain", &tenant.subdomain)),
                Entry::Vacant(slot) => {
                    slot.insert(tenant.id.clone());
                }
            }
            self.subdomains.remove(&previous);
        }

        self.tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self
            .tenants
            .iter()
            .filter(|entry| !entry.value().is_deleted())
            .count() as u64)
    }

    async fn list(&self, offset: u64, limit: u64) -> Result<Vec<Tenant>> {
        Ok(Self::window(self.listed_tenants(), offset, limit))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.users.get(id).map(|u| u.value().clone()))
    }

    async fn find_by_phone_in_tenant(&self, tenant_id: &TenantId, phone: &str) -> Result<Option<User>> {
        let key = (tenant_id.clone(), phone.to_string());
        let Some(id) = self.phones.get(&key).map(|id| id.value().clone()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.value().clone()))
    }

    async fn insert(&self, user: &User) -> Result<()> {
        match self.phones.entry(Self::phone_key(user)) {
            Entry::Occupied(_) => return Err(Self::duplicate("User", &user.phone_number)),
            Entry::Vacant(slot) => {
                slot.insert(user.id.clone());
            }
        }
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<()> {
        let previous = self
            .users
            .get(&user.id)
            .map(|u| Self::phone_key(u.value()))
            .ok_or_else(|| TrackError::not_found("User", user.id.as_str()))?;

        let next = Self::phone_key(user);
        if previous != next {
            match self.phones.entry(next) {
                Entry::Occupied(_) => return Err(Self::duplicate("User", &user.phone_number)),
                Entry::Vacant(slot) => {
                    slot.insert(user.id.clone());
                }
            }
            self.phones.remove(&previous);
        }

        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn count_matching(&self, filter: &UserFilter) -> Result<u64> {
        Ok(self
            .users
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .count() as u64)
    }

    async fn list_matching(&self, filter: &UserFilter, offset: u64, limit: u64) -> Result<Vec<User>> {
        Ok(Self::window(self.matching_users(filter), offset, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::{Role, UserStatus};
    use crate::tenant::TenantStatus;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn tenant(subdomain: &str, minutes_ago: i64) -> Tenant {
        let mut t = Tenant::new("School", "+998901234567", "Main st", subdomain, 100);
        t.created_at = Utc::now() - Duration::minutes(minutes_ago);
        t
    }

    fn user(tenant_id: &str, phone: &str) -> User {
        User {
            id: UserId::generate(),
            tenant_id: TenantId::new(tenant_id),
            full_name: "Staff Member".to_string(),
            phone_number: phone.to_string(),
            role: Role::Staff,
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
    async fn test_duplicate_subdomain_rejected() {
        let store = MemoryStore::new();
        TenantStore::insert(&store, &tenant("acme", 0)).await.unwrap();
        let err = TenantStore::insert(&store, &tenant("acme", 0)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateRecord);
    }

    #[tokio::test]
    async fn test_subdomain_rename_moves_index() {
        let store = MemoryStore::new();
        let mut t = tenant("old", 0);
        TenantStore::insert(&store, &t).await.unwrap();

        t.subdomain = "new".to_string();
        TenantStore::update(&store, &t).await.unwrap();

        assert!(store.find_by_subdomain("old").await.unwrap().is_none());
        assert_eq!(store.find_by_subdomain("new").await.unwrap().unwrap().id, t.id);
    }

    #[tokio::test]
    async fn test_rename_into_taken_subdomain_rejected() {
        let store = MemoryStore::new();
        TenantStore::insert(&store, &tenant("taken", 0)).await.unwrap();
        let mut t = tenant("mine", 0);
        TenantStore::insert(&store, &t).await.unwrap();

        t.subdomain = "taken".to_string();
        assert!(TenantStore::update(&store, &t).await.is_err());
        assert!(store.find_by_subdomain("mine").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_listing_is_ordered_and_excludes_deleted() {
        let store = MemoryStore::new();
        let oldest = tenant("a", 30);
        let middle = tenant("b", 20);
        let mut gone = tenant("c", 10);
        gone.status = TenantStatus::Deleted;

        for t in [&middle, &gone, &oldest] {
            TenantStore::insert(&store, t).await.unwrap();
        }

        assert_eq!(TenantStore::count(&store).await.unwrap(), 2);
        let page = store.list(0, 10).await.unwrap();
        let subdomains: Vec<_> = page.iter().map(|t| t.subdomain.as_str()).collect();
        assert_eq!(subdomains, vec!["a", "b"]);

        assert_eq!(store.list(1, 10).await.unwrap().len(), 1);
        assert!(store.list(5, 10).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_claim_phone_once() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { UserStore::insert(&*store, &user("t-1", "+998900000001")).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => created += 1,
                Err(e) => assert_eq!(e.code(), ErrorCode::DuplicateRecord),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.users.len(), 1);
    }

    #[tokio::test]
    async fn test_same_phone_allowed_in_other_school() {
        let store = MemoryStore::new();
        UserStore::insert(&store, &user("t-1", "+998900000001")).await.unwrap();
        UserStore::insert(&store, &user("t-2", "+998900000001")).await.unwrap();
        let err = UserStore::insert(&store, &user("t-1", "+998900000001")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateRecord);
    }

    #[tokio::test]
    async fn test_phone_change_moves_index() {
        let store = MemoryStore::new();
        let mut u = user("t-1", "+998900000001");
        UserStore::insert(&store, &u).await.unwrap();
        let other = user("t-1", "+998900000002");
        UserStore::insert(&store, &other).await.unwrap();

        u.phone_number = "+998900000002".to_string();
        let err = UserStore::update(&store, &u).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateRecord);

        u.phone_number = "+998900000003".to_string();
        UserStore::update(&store, &u).await.unwrap();
        let tenant_id = TenantId::new("t-1");
        assert!(store.find_by_phone_in_tenant(&tenant_id, "+998900000001").await.unwrap().is_none());
        assert_eq!(
            store.find_by_phone_in_tenant(&tenant_id, "+998900000003").await.unwrap().unwrap().id,
            u.id
        );
        UserStore::insert(&store, &user("t-1", "+998900000001")).await.unwrap();
    }
}
