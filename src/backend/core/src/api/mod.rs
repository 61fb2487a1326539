//! HTTP API.
//!
//! # Routes
//!
//! Unversioned:
//! - `GET /health` - liveness with version and timestamp
//! - `GET /metrics` - Prometheus text
//!
//! Under `/api/v1`:
//!
//! | Route                        | Policy                               |
//! |------------------------------|--------------------------------------|
//! | `POST /auth/login`           | public, school from the host         |
//! | `POST /auth/register`        | STAFF inside the school              |
//! | `GET /me`                    | any signed-in caller                 |
//! | `GET /users`                 | STAFF inside the school              |
//! | `PATCH /users/:id/status`    | STAFF inside the school              |
//! | `POST /schools`              | SUPER_ADMIN                          |
//! | `GET /schools`               | SUPER_ADMIN                          |
//! | `GET /schools/:id`           | ADMIN, own school                    |
//! | `PUT /schools/:id`           | ADMIN, own school                    |
//! | `PATCH /schools/:id/director`| SUPER_ADMIN                          |
//! | `POST /cache/clear`          | SUPER_ADMIN                          |
//!
//! Anything else is `404 ROUTE_NOT_FOUND`.

pub mod dto;
mod handlers;

pub use dto::ApiResponse;

use axum::{
    extract::FromRef,
    http::HeaderValue,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::auth::AuthTokenService;
use crate::cache::ReadThroughCache;
use crate::config::CorsSettings;
use crate::pipeline::{PipelineLayer, RequestPipeline, RoutePolicy};
use crate::rbac::Role;
use crate::services::Services;
use crate::telemetry::MetricsHandle;
use crate::tenant::TenantResolver;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub pipeline: RequestPipeline,
    pub cache: ReadThroughCache,
    pub metrics: MetricsHandle,
}

impl AppState {
    pub fn new(
        services: Services,
        tokens: Arc<AuthTokenService>,
        cache: ReadThroughCache,
        metrics: MetricsHandle,
        base_domain_labels: usize,
    ) -> Self {
        let resolver = TenantResolver::new(services.tenants.clone(), base_domain_labels);
        Self {
            pipeline: RequestPipeline::new(tokens, resolver),
            services,
            cache,
            metrics,
        }
    }
}

impl FromRef<AppState> for RequestPipeline {
    fn from_ref(state: &AppState) -> Self {
        state.pipeline.clone()
    }
}

/// Build the full router.
///
/// ```rust,ignore
/// let app = build_router(state, &config.cors);
/// axum::serve(listener, app).await?;
/// ```
pub fn build_router(state: AppState, cors: &CorsSettings) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .nest("/api/v1", v1_router(&state))
        .fallback(handlers::route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors))
        .with_state(state)
}

fn v1_router(state: &AppState) -> Router<AppState> {
    let school_routes = Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/register", post(handlers::register))
        .route("/me", get(handlers::me))
        .route("/users", get(handlers::list_users))
        .route("/users/:id/status", patch(handlers::update_user_status))
        .route(
            "/schools/:id",
            get(handlers::get_school).put(handlers::update_school),
        );

    let operator_routes = Router::new()
        .route(
            "/schools",
            post(handlers::create_school).get(handlers::list_schools),
        )
        .route("/schools/:id/director", patch(handlers::assign_director))
        .route("/cache/clear", post(handlers::clear_cache))
        .route_layer(PipelineLayer::new(
            state.pipeline.clone(),
            RoutePolicy::role(Role::SuperAdmin),
        ));

    school_routes.merge(operator_routes)
}

fn cors_layer(settings: &CorsSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
