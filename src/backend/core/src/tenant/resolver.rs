//! Host to school resolution.

use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::context::{Identity, TenantContext};
use crate::error::{Result, TrackError};
use crate::services::TenantService;
use crate::tenant::TenantStatus;

/// Resolves the school addressed by a request and checks it may be served.
#[derive(Clone)]
pub struct TenantResolver {
    tenants: Arc<TenantService>,
    base_domain_labels: usize,
}

impl TenantResolver {
    pub fn new(tenants: Arc<TenantService>, base_domain_labels: usize) -> Self {
        Self {
            tenants,
            base_domain_labels,
        }
    }

    /// The subdomain label nearest the base domain, lowercased.
    ///
    /// `acme.school.com:3000` gives `acme` with two base labels. IP hosts and
    /// hosts with no label left of the base domain give `None`.
    pub fn extract_subdomain(&self, host: &str) -> Option<String> {
        let host = strip_port(host.trim());
        if host.is_empty() || host.parse::<IpAddr>().is_ok() {
            return None;
        }

        let labels: Vec<&str> = host.trim_end_matches('.').split('.').collect();
        if labels.len() <= self.base_domain_labels {
            return None;
        }

        let nearest = labels[labels.len() - self.base_domain_labels - 1];
        if nearest.is_empty() {
            return None;
        }
        Some(nearest.to_ascii_lowercase())
    }

    /// Resolve `host` for `identity` (absent on public routes).
    ///
    /// Checks run in order: the school must exist, SUPER_ADMIN skips the rest,
    /// the caller must belong to it, and it must be neither deleted nor
    /// inactive.
    #[instrument(skip(self, identity), fields(role = ?identity.map(|i| i.role)))]
    pub async fn resolve(&self, identity: Option<&Identity>, host: Option<&str>) -> Result<TenantContext> {
        let subdomain = host
            .and_then(|host| self.extract_subdomain(host))
            .ok_or_else(TrackError::school_not_found)?;

        let tenant = self
            .tenants
            .find_by_subdomain(&subdomain)
            .await?
            .ok_or_else(TrackError::school_not_found)?;

        let context = TenantContext {
            tenant_id: tenant.id.clone(),
            subdomain: tenant.subdomain.clone(),
        };

        if identity.is_some_and(|i| i.role.is_super_admin()) {
            debug!(tenant_id = %tenant.id, "Operator bypasses school checks");
            return Ok(context);
        }

        if let Some(scope) = identity.and_then(|i| i.tenant_id.as_ref()) {
            if scope != &tenant.id {
                return Err(TrackError::cross_tenant_access());
            }
        }

        match tenant.status {
            TenantStatus::Deleted => Err(TrackError::school_not_found()),
            TenantStatus::Inactive => Err(TrackError::school_inactive()),
            TenantStatus::Active => Ok(context),
        }
    }
}

fn strip_port(host: &str) -> &str {
    // Bracketed IPv6 literal, with or without a port.
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    // A bare IPv6 literal has more than one colon.
    if host.matches(':').count() > 1 {
        return host;
    }
    host.split(':').next().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ReadThroughCache;
    use crate::config::PaginationSettings;
    use crate::error::ErrorCode;
    use crate::rbac::{Role, UserId};
    use crate::services::{NewTenant, TenantUpdate};
    use crate::store::MemoryStore;
    use crate::tenant::{Tenant, TenantId};

    fn resolver() -> TenantResolver {
        let store = Arc::new(MemoryStore::new());
        let service = TenantService::new(
            store.clone(),
            store,
            ReadThroughCache::in_memory(),
            PaginationSettings::default(),
        );
        TenantResolver::new(Arc::new(service), 2)
    }

    async fn school(resolver: &TenantResolver, subdomain: &str, states: &[TenantStatus]) -> Tenant {
        let mut tenant = resolver
            .tenants
            .create(NewTenant {
                name: "School".to_string(),
                phone_number: "+998901234567".to_string(),
                address: "Main st".to_string(),
                subdomain: subdomain.to_string(),
                logo: None,
                price: 100,
            })
            .await
            .unwrap();
        for status in states {
            tenant = resolver
                .tenants
                .update(
                    &tenant.id,
                    TenantUpdate {
                        status: Some(*status),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        tenant
    }

    fn caller(role: Role, tenant: Option<&TenantId>) -> Identity {
        Identity::new(UserId::new("u-1"), role, tenant.cloned())
    }

    #[test]
    fn test_extract_subdomain() {
        let r = resolver();
        assert_eq!(r.extract_subdomain("acme.school.com"), Some("acme".to_string()));
        assert_eq!(r.extract_subdomain("ACME.school.com:3000"), Some("acme".to_string()));
        assert_eq!(r.extract_subdomain("x.acme.school.com"), Some("acme".to_string()));
        assert_eq!(r.extract_subdomain("school.com"), None);
        assert_eq!(r.extract_subdomain("localhost:3000"), None);
        assert_eq!(r.extract_subdomain("127.0.0.1:3000"), None);
        assert_eq!(r.extract_subdomain("[::1]:3000"), None);
        assert_eq!(r.extract_subdomain(""), None);
    }

    #[test]
    fn test_extract_subdomain_single_base_label() {
        let store = Arc::new(MemoryStore::new());
        let service = TenantService::new(
            store.clone(),
            store,
            ReadThroughCache::in_memory(),
            PaginationSettings::default(),
        );
        let r = TenantResolver::new(Arc::new(service), 1);
        assert_eq!(r.extract_subdomain("acme.localhost:3000"), Some("acme".to_string()));
    }

    #[tokio::test]
    async fn test_missing_or_unknown_subdomain() {
        let r = resolver();
        let err = r.resolve(None, None).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchoolNotFound);

        let err = r.resolve(None, Some("nope.school.com")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchoolNotFound);
    }

    #[tokio::test]
    async fn test_active_school_resolves() {
        let r = resolver();
        let tenant = school(&r, "acme", &[TenantStatus::Active]).await;

        let ctx = r
            .resolve(Some(&caller(Role::Staff, Some(&tenant.id))), Some("acme.school.com"))
            .await
            .unwrap();
        assert_eq!(ctx.tenant_id, tenant.id);
        assert_eq!(ctx.subdomain, "acme");

        // Public routes carry no identity.
        assert!(r.resolve(None, Some("acme.school.com")).await.is_ok());
    }

    #[tokio::test]
    async fn test_inactive_school_is_bad_request() {
        let r = resolver();
        let tenant = school(&r, "acme", &[]).await;
        let err = r
            .resolve(Some(&caller(Role::Admin, Some(&tenant.id))), Some("acme.school.com"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchoolInactive);
        assert_eq!(err.http_status().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_deleted_school_only_serves_super_admin() {
        let r = resolver();
        let tenant = school(&r, "acme", &[TenantStatus::Active, TenantStatus::Deleted]).await;

        let err = r
            .resolve(Some(&caller(Role::Admin, Some(&tenant.id))), Some("acme.school.com"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchoolNotFound);

        let ctx = r
            .resolve(Some(&caller(Role::SuperAdmin, None)), Some("acme.school.com"))
            .await
            .unwrap();
        assert_eq!(ctx.tenant_id, tenant.id);
    }

    #[tokio::test]
    async fn test_cross_tenant_access() {
        let r = resolver();
        school(&r, "acme", &[TenantStatus::Active]).await;
        let other = school(&r, "other", &[TenantStatus::Active]).await;

        let err = r
            .resolve(Some(&caller(Role::Admin, Some(&other.id))), Some("acme.school.com"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::CrossTenantAccess);
        assert_eq!(err.http_status().as_u16(), 405);
    }
}
