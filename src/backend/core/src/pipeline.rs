//! Request admission pipeline.
//!
//! Every route declares a [`RoutePolicy`]. Before the handler runs, the
//! pipeline builds a [`RequestContext`] in three ordered stages:
//!
//! 1. **auth**: verify the bearer token (skipped for public routes)
//! 2. **tenant**: resolve the school from the `Host` header
//! 3. **role**: `require_can_act(ctx.role(), policy.min_role)`
//!
//! A stage failure short-circuits with its error, is logged at `warn` and is
//! counted in `pipeline_denials_total{stage}`.
//!
//! Two ways to apply a policy:
//!
//! ```rust,ignore
//! // Per handler, statically typed.
//! async fn me(admitted: Admitted<Authenticated>) -> ... { admitted.context() }
//!
//! // Per route group, as a tower layer; handlers extract `RequestContext`.
//! Router::new()
//!     .route("/cache/clear", post(clear_cache))
//!     .route_layer(PipelineLayer::new(pipeline, RoutePolicy::role(Role::SuperAdmin)));
//! ```

use axum::{
    async_trait,
    body::Body,
    extract::{FromRef, FromRequestParts, Request},
    http::{header::HOST, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use metrics::counter;
use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

use crate::auth::AuthTokenService;
use crate::context::RequestContext;
use crate::error::{Result, TrackError};
use crate::rbac::{AccessControl, Role};
use crate::tenant::TenantResolver;

/// Header carrying a caller-supplied request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// ═══════════════════════════════════════════════════════════════════════════════
// Route Policy
// ═══════════════════════════════════════════════════════════════════════════════

/// What a route requires before its handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolicy {
    pub authenticate: bool,
    pub resolve_tenant: bool,
    pub min_role: Option<Role>,
}

impl RoutePolicy {
    /// No token, but the school is resolved from the host (login).
    pub const fn public_tenant() -> Self {
        Self {
            authenticate: false,
            resolve_tenant: true,
            min_role: None,
        }
    }

    /// Any valid token.
    pub const fn authenticated() -> Self {
        Self {
            authenticate: true,
            resolve_tenant: false,
            min_role: None,
        }
    }

    /// A valid token whose role can act as `min_role`.
    pub const fn role(min_role: Role) -> Self {
        Self {
            authenticate: true,
            resolve_tenant: false,
            min_role: Some(min_role),
        }
    }

    /// [`role`](Self::role) plus a resolved school the caller may reach.
    pub const fn tenant_scoped(min_role: Role) -> Self {
        Self {
            authenticate: true,
            resolve_tenant: true,
            min_role: Some(min_role),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Pipeline
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct RequestPipeline {
    tokens: Arc<AuthTokenService>,
    resolver: TenantResolver,
    access: AccessControl,
}

impl RequestPipeline {
    pub fn new(tokens: Arc<AuthTokenService>, resolver: TenantResolver) -> Self {
        Self {
            tokens,
            resolver,
            access: AccessControl::new(),
        }
    }

    /// Run every stage `policy` asks for and return the enriched context.
    pub async fn admit(
        &self,
        headers: &HeaderMap,
        host: Option<&str>,
        policy: &RoutePolicy,
    ) -> Result<RequestContext> {
        let mut ctx = request_context(headers);

        if policy.authenticate {
            let identity = self
                .tokens
                .verify_headers(headers)
                .map_err(|e| denied("auth", &ctx, e))?;
            ctx = ctx.with_identity(identity);
        }

        if policy.resolve_tenant {
            let tenant = self
                .resolver
                .resolve(ctx.identity.as_ref(), host)
                .await
                .map_err(|e| denied("tenant", &ctx, e))?;
            ctx = ctx.with_tenant(tenant);
        }

        if let Some(min_role) = policy.min_role {
            self.access
                .require_can_act(ctx.role(), min_role)
                .map_err(|e| denied("role", &ctx, e))?;
        }

        Ok(ctx)
    }

    async fn admit_parts(&self, parts: &Parts, policy: &RoutePolicy) -> Result<RequestContext> {
        self.admit(&parts.headers, request_host(parts), policy).await
    }
}

fn request_context(headers: &HeaderMap) -> RequestContext {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty())
        .map(RequestContext::new)
        .unwrap_or_else(RequestContext::anonymous)
}

/// `Host` header, falling back to the URI authority (HTTP/2).
fn request_host(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.authority().map(|a| a.as_str()))
}

fn denied(stage: &'static str, ctx: &RequestContext, error: TrackError) -> TrackError {
    warn!(
        stage,
        request_id = %ctx.request_id,
        role = ?ctx.role(),
        code = %error.code(),
        "Request denied"
    );
    counter!("pipeline_denials_total", "stage" => stage).increment(1);
    error
}

// ═══════════════════════════════════════════════════════════════════════════════
// Extractors
// ═══════════════════════════════════════════════════════════════════════════════

/// A route policy chosen at compile time.
pub trait PolicySpec: Send + Sync + 'static {
    const POLICY: RoutePolicy;
}

macro_rules! policy_spec {
    ($(#[$doc:meta])* $name:ident => $policy:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl PolicySpec for $name {
            const POLICY: RoutePolicy = $policy;
        }
    };
}

policy_spec!(
    /// Login: school from the host, no token.
    PublicTenant => RoutePolicy::public_tenant()
);
policy_spec!(
    /// Any signed-in caller.
    Authenticated => RoutePolicy::authenticated()
);
policy_spec!(
    /// ADMIN and above, no school resolution.
    AdminOnly => RoutePolicy::role(Role::Admin)
);
policy_spec!(
    /// STAFF and above inside the resolved school.
    StaffInTenant => RoutePolicy::tenant_scoped(Role::Staff)
);

/// Context admitted under policy `P`.
#[derive(Debug, Clone)]
pub struct Admitted<P> {
    context: RequestContext,
    _policy: PhantomData<fn() -> P>,
}

impl<P> Admitted<P> {
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn into_context(self) -> RequestContext {
        self.context
    }
}

#[async_trait]
impl<P, S> FromRequestParts<S> for Admitted<P>
where
    P: PolicySpec,
    S: Send + Sync,
    RequestPipeline: FromRef<S>,
{
    type Rejection = TrackError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let pipeline = RequestPipeline::from_ref(state);
        let context = pipeline.admit_parts(parts, &P::POLICY).await?;
        Ok(Self {
            context,
            _policy: PhantomData,
        })
    }
}

/// Context inserted by [`PipelineLayer`].
#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = TrackError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| TrackError::internal("Request context missing; PipelineLayer not applied"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Applies one policy to every route it wraps.
#[derive(Clone)]
pub struct PipelineLayer {
    pipeline: RequestPipeline,
    policy: RoutePolicy,
}

impl PipelineLayer {
    pub fn new(pipeline: RequestPipeline, policy: RoutePolicy) -> Self {
        Self { pipeline, policy }
    }
}

impl<S> Layer<S> for PipelineLayer {
    type Service = PipelineService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PipelineService {
            inner,
            pipeline: self.pipeline.clone(),
            policy: self.policy,
        }
    }
}

#[derive(Clone)]
pub struct PipelineService<S> {
    inner: S,
    pipeline: RequestPipeline,
    policy: RoutePolicy,
}

impl<S> Service<Request<Body>> for PipelineService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let pipeline = self.pipeline.clone();
        let policy = self.policy;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            match pipeline.admit_parts(&parts, &policy).await {
                Ok(context) => {
                    parts.extensions.insert(context);
                    inner.call(Request::from_parts(parts, body)).await
                }
                Err(error) => Ok(error.into_response()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ReadThroughCache;
    use crate::config::PaginationSettings;
    use crate::context::Identity;
    use crate::error::ErrorCode;
    use crate::rbac::UserId;
    use crate::services::{NewTenant, TenantService, TenantUpdate};
    use crate::store::MemoryStore;
    use crate::tenant::{TenantId, TenantStatus};
    use axum::http::{header::AUTHORIZATION, HeaderValue};
    use std::time::Duration;

    struct Fixture {
        pipeline: RequestPipeline,
        tokens: Arc<AuthTokenService>,
        tenant_id: TenantId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let tenants = Arc::new(TenantService::new(
            store.clone(),
            store,
            ReadThroughCache::in_memory(),
            PaginationSettings::default(),
        ));
        let tenant = tenants
            .create(NewTenant {
                name: "Acme".to_string(),
                phone_number: "+1".to_string(),
                address: "x".to_string(),
                subdomain: "acme".to_string(),
                logo: None,
                price: 1,
            })
            .await
            .unwrap();
        tenants
            .update(
                &tenant.id,
                TenantUpdate {
                    status: Some(TenantStatus::Active),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let tokens = Arc::new(
            AuthTokenService::new("secret", Duration::from_secs(60), Duration::ZERO).unwrap(),
        );
        Fixture {
            pipeline: RequestPipeline::new(tokens.clone(), TenantResolver::new(tenants, 2)),
            tokens,
            tenant_id: tenant.id,
        }
    }

    fn bearer(tokens: &AuthTokenService, identity: &Identity) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = format!("Bearer {}", tokens.issue(identity).unwrap());
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
        headers
    }

    /// Neither a token nor a school.
    const OPEN: RoutePolicy = RoutePolicy {
        authenticate: false,
        resolve_tenant: false,
        min_role: None,
    };

    #[tokio::test]
    async fn test_open_policy_admits_anyone() {
        let f = fixture().await;
        let ctx = f
            .pipeline
            .admit(&HeaderMap::new(), None, &OPEN)
            .await
            .unwrap();
        assert!(ctx.identity.is_none());
        assert!(ctx.tenant.is_none());
    }

    #[tokio::test]
    async fn test_request_id_header_is_kept() {
        let f = fixture().await;
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-42"));
        let ctx = f.pipeline.admit(&headers, None, &OPEN).await.unwrap();
        assert_eq!(ctx.request_id, "req-42");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let f = fixture().await;
        let err = f
            .pipeline
            .admit(&HeaderMap::new(), Some("acme.school.com"), &RoutePolicy::tenant_scoped(Role::Staff))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn test_tenant_scoped_admits_member() {
        let f = fixture().await;
        let identity = Identity::new(UserId::new("u"), Role::Admin, Some(f.tenant_id.clone()));
        let headers = bearer(&f.tokens, &identity);

        let ctx = f
            .pipeline
            .admit(&headers, Some("acme.school.com"), &RoutePolicy::tenant_scoped(Role::Staff))
            .await
            .unwrap();
        assert_eq!(ctx.identity, Some(identity));
        assert_eq!(ctx.tenant.unwrap().tenant_id, f.tenant_id);
    }

    #[tokio::test]
    async fn test_role_stage_runs_after_tenant() {
        let f = fixture().await;
        let identity = Identity::new(UserId::new("u"), Role::Teacher, Some(f.tenant_id.clone()));
        let headers = bearer(&f.tokens, &identity);

        let err = f
            .pipeline
            .admit(&headers, Some("acme.school.com"), &RoutePolicy::tenant_scoped(Role::Staff))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoAccess);

        // An unknown school fails before the role stage.
        let err = f
            .pipeline
            .admit(&headers, Some("nope.school.com"), &RoutePolicy::tenant_scoped(Role::Staff))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchoolNotFound);
    }

    #[tokio::test]
    async fn test_public_tenant_resolves_without_identity() {
        let f = fixture().await;
        let ctx = f
            .pipeline
            .admit(&HeaderMap::new(), Some("acme.school.com"), &RoutePolicy::public_tenant())
            .await
            .unwrap();
        assert_eq!(ctx.tenant.unwrap().subdomain, "acme");
    }
}
