//! Enumerating the keys a mutation makes stale.
//!
//! A record can be cached under several keys: its id key, secondary index
//! keys (subdomain) and any listing that embeds it. Each mutation event maps
//! to the full set so callers cannot forget one.

use std::collections::BTreeSet;

use super::key::CacheKey;
use crate::rbac::{Role, UserId};
use crate::tenant::TenantId;

// ═══════════════════════════════════════════════════════════════════════════════
// Invalidation Events
// ═══════════════════════════════════════════════════════════════════════════════

/// A mutation that makes cached values stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationEvent {
    /// A school's fields, status or director changed. `previous_subdomain`
    /// is set when the subdomain itself was renamed.
    TenantChanged {
        tenant_id: TenantId,
        subdomain: String,
        previous_subdomain: Option<String>,
    },

    /// A user was created or updated.
    UserChanged {
        user_id: Option<UserId>,
        tenant_id: TenantId,
    },
}

impl InvalidationEvent {
    pub fn tenant(tenant_id: TenantId, subdomain: impl Into<String>) -> Self {
        Self::TenantChanged {
            tenant_id,
            subdomain: subdomain.into(),
            previous_subdomain: None,
        }
    }

    pub fn tenant_renamed(
        tenant_id: TenantId,
        subdomain: impl Into<String>,
        previous_subdomain: impl Into<String>,
    ) -> Self {
        Self::TenantChanged {
            tenant_id,
            subdomain: subdomain.into(),
            previous_subdomain: Some(previous_subdomain.into()),
        }
    }

    pub fn user_created(tenant_id: TenantId) -> Self {
        Self::UserChanged {
            user_id: None,
            tenant_id,
        }
    }

    pub fn user_updated(user_id: UserId, tenant_id: TenantId) -> Self {
        Self::UserChanged {
            user_id: Some(user_id),
            tenant_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TenantChanged { .. } => "tenant",
            Self::UserChanged { .. } => "user",
        }
    }

    /// Every key whose value embeds the mutated record.
    pub fn keys(&self) -> InvalidationSet {
        let mut set = InvalidationSet::new();
        match self {
            Self::TenantChanged {
                tenant_id,
                subdomain,
                previous_subdomain,
            } => {
                set.insert(CacheKey::tenant_by_id(tenant_id));
                set.insert(CacheKey::tenant_by_subdomain(subdomain));
                if let Some(previous) = previous_subdomain {
                    set.insert(CacheKey::tenant_by_subdomain(previous));
                }
                set.insert(CacheKey::tenants_page(1));
            }
            Self::UserChanged { user_id, tenant_id } => {
                if let Some(user_id) = user_id {
                    set.insert(CacheKey::user_by_id(user_id));
                }
                set.insert(CacheKey::users_by_tenant(tenant_id));
                for role in Role::ALL {
                    set.insert(CacheKey::users_by_tenant_role(tenant_id, role));
                }
            }
        }
        set
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Invalidation Set
// ═══════════════════════════════════════════════════════════════════════════════

/// Deduplicated, ordered set of keys to delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationSet {
    keys: BTreeSet<String>,
}

impl InvalidationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: CacheKey) {
        self.keys.insert(key.to_string());
    }

    pub fn with(mut self, key: CacheKey) -> Self {
        self.insert(key);
        self
    }

    pub fn extend(&mut self, other: InvalidationSet) {
        self.keys.extend(other.keys);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Unprefixed key strings.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl FromIterator<CacheKey> for InvalidationSet {
    fn from_iter<I: IntoIterator<Item = CacheKey>>(iter: I) -> Self {
        let mut set = Self::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

impl From<CacheKey> for InvalidationSet {
    fn from(key: CacheKey) -> Self {
        Self::new().with(key)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_rename_covers_both_subdomains() {
        let event = InvalidationEvent::tenant_renamed(TenantId::new("t-1"), "new", "old");
        let keys = event.keys();
        assert!(keys.contains("tenant:id:t-1"));
        assert!(keys.contains("tenant:subdomain:new"));
        assert!(keys.contains("tenant:subdomain:old"));
        assert!(keys.contains("tenants:page:1"));
        assert_eq!(keys.len(), 4);
    }

    #[test]
    fn test_tenant_without_rename() {
        let keys = InvalidationEvent::tenant(TenantId::new("t-1"), "acme").keys();
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_user_update_covers_listings() {
        let keys = InvalidationEvent::user_updated(UserId::new("u-1"), TenantId::new("t-1")).keys();
        assert!(keys.contains("user:id:u-1"));
        assert!(keys.contains("users:tenant:id:t-1"));
        assert!(keys.contains("users:tenant:id:t-1:role:GUARDIAN"));
        assert_eq!(keys.len(), 2 + Role::ALL.len());
    }

    #[test]
    fn test_user_created_has_no_id_key() {
        let keys = InvalidationEvent::user_created(TenantId::new("t-1")).keys();
        assert!(keys.iter().all(|k| k.starts_with("users:")));
    }

    #[test]
    fn test_set_deduplicates() {
        let set: InvalidationSet = [
            CacheKey::tenants_page(1),
            CacheKey::tenants_page(1),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 1);
    }
}
