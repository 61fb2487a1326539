//! Shared fixtures: an in-memory app with one active school.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use teachtrack_core::api::{build_router, AppState};
use teachtrack_core::auth::{AuthTokenService, PasswordHasher};
use teachtrack_core::cache::{InMemoryBackend, ReadThroughCache, CacheConfig};
use teachtrack_core::config::{CorsSettings, PaginationSettings};
use teachtrack_core::context::{Identity, TenantContext};
use teachtrack_core::rbac::{Role, UserId};
use teachtrack_core::services::{NewTenant, NewUser, Services, TenantUpdate};
use teachtrack_core::store::MemoryStore;
use teachtrack_core::telemetry::MetricsHandle;
use teachtrack_core::tenant::{Tenant, TenantStatus};
use teachtrack_core::Result;

pub const HOST: &str = "acme.school.com";

/// Reversible stand-in so tests skip the Argon2 cost.
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String> {
        Ok(format!("plain:{}", password))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        Ok(hash == format!("plain:{}", password))
    }
}

pub struct TestApp {
    pub router: Router,
    pub services: Services,
    pub tokens: Arc<AuthTokenService>,
    pub backend: Arc<InMemoryBackend>,
    pub school: Tenant,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(InMemoryBackend::default());
        let cache = ReadThroughCache::new(backend.clone(), CacheConfig::default());
        let tokens = Arc::new(
            AuthTokenService::new("integration-secret", Duration::from_secs(3600), Duration::ZERO)
                .unwrap(),
        );
        let services = Services::new(
            store.clone(),
            store,
            cache.clone(),
            tokens.clone(),
            Arc::new(PlainHasher),
            PaginationSettings::default(),
        );

        let school = create_school(&services, "acme", &[TenantStatus::Active]).await;

        let state = AppState::new(
            services.clone(),
            tokens.clone(),
            cache,
            MetricsHandle::disabled(),
            2,
        );
        Self {
            router: build_router(state, &CorsSettings::default()),
            services,
            tokens,
            backend,
            school,
        }
    }

    pub fn token_for(&self, role: Role, tenant: Option<&Tenant>) -> String {
        let identity = Identity::new(
            UserId::new(format!("{}-caller", role)),
            role,
            tenant.map(|t| t.id.clone()),
        );
        self.tokens.issue(&identity).unwrap()
    }

    pub fn super_admin_token(&self) -> String {
        self.token_for(Role::SuperAdmin, None)
    }

    /// Register an active user in the fixture school and return its token.
    pub async fn signed_in(&self, phone: &str, role: Role) -> (UserId, String) {
        let operator = Identity::new(UserId::new("root"), Role::SuperAdmin, None);
        let session = self
            .services
            .users
            .register(&operator, &self.tenant_context(), new_user(phone, role))
            .await
            .unwrap();
        (session.user.id, session.token)
    }

    pub fn tenant_context(&self) -> TenantContext {
        TenantContext {
            tenant_id: self.school.id.clone(),
            subdomain: self.school.subdomain.clone(),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }
}

pub async fn create_school(services: &Services, subdomain: &str, states: &[TenantStatus]) -> Tenant {
    let mut tenant = services
        .tenants
        .create(NewTenant {
            name: format!("{} school", subdomain),
            phone_number: "+998901112233".to_string(),
            address: "Main st 1".to_string(),
            subdomain: subdomain.to_string(),
            logo: None,
            price: 250_000,
        })
        .await
        .unwrap();
    for status in states {
        tenant = services
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

pub fn new_user(phone: &str, role: Role) -> NewUser {
    serde_json::from_value(serde_json::json!({
        "fullName": "Test User",
        "phoneNumber": phone,
        "password": "secret",
        "confirmPassword": "secret",
        "role": role,
    }))
    .unwrap()
}

/// Request builder with host, optional bearer token and optional JSON body.
pub fn request(method: &str, uri: &str, host: Option<&str>, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(host) = host {
        builder = builder.header(header::HOST, host);
    }
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
