//! API request handlers.
//!
//! Handlers return `Result<_, TrackError>`; the error's `IntoResponse` turns
//! failures into the standard error body. Admission (token, school, role)
//! has already happened by the time a handler body runs.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header::CONTENT_TYPE, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use tracing::info;

use super::dto::{
    ApiResponse, AssignDirectorRequest, CacheClearResponse, HealthResponse, LoginRequest,
    StatusUpdateRequest, UserListParams,
};
use super::AppState;
use crate::context::{Identity, RequestContext};
use crate::error::{Result, TrackError};
use crate::pagination::{PageQuery, PageResult};
use crate::pipeline::{AdminOnly, Admitted, Authenticated, PublicTenant, StaffInTenant};
use crate::rbac::{User, UserId};
use crate::services::{NewTenant, NewUser, Session, TenantUpdate};
use crate::tenant::{Tenant, TenantId};

type ApiResult<T> = Result<Json<ApiResponse<T>>>;

fn ok<T: serde::Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

// ═══════════════════════════════════════════════════════════════════════════════
// System
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
}

pub async fn route_not_found(uri: Uri) -> TrackError {
    TrackError::route_not_found(uri.path())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Auth
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn login(
    State(state): State<AppState>,
    admitted: Admitted<PublicTenant>,
    body: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Session> {
    let Json(req) = body?;
    let tenant = admitted.context().require_tenant()?;
    ok(state
        .services
        .users
        .login(tenant, &req.phone_number, &req.password)
        .await?)
}

pub async fn register(
    State(state): State<AppState>,
    admitted: Admitted<StaffInTenant>,
    body: std::result::Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Session>>)> {
    let Json(input) = body?;
    let ctx = admitted.context();
    let session = state
        .services
        .users
        .register(ctx.require_identity()?, ctx.require_tenant()?, input)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(session))))
}

pub async fn me(State(state): State<AppState>, admitted: Admitted<Authenticated>) -> ApiResult<User> {
    let identity = admitted.context().require_identity()?;
    ok(state.services.users.me(identity).await?)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Users
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn list_users(
    State(state): State<AppState>,
    admitted: Admitted<StaffInTenant>,
    Query(params): Query<UserListParams>,
) -> ApiResult<PageResult<User>> {
    let ctx = admitted.context();
    let query = params.into_query()?;
    ok(state
        .services
        .users
        .list(ctx.require_identity()?, ctx.require_tenant()?, &query)
        .await?)
}

pub async fn update_user_status(
    State(state): State<AppState>,
    admitted: Admitted<StaffInTenant>,
    Path(id): Path<String>,
    body: std::result::Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> ApiResult<User> {
    let Json(req) = body?;
    let ctx = admitted.context();
    ok(state
        .services
        .users
        .update_status(
            ctx.require_identity()?,
            ctx.require_tenant()?,
            &UserId::new(id),
            req.status,
        )
        .await?)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Schools
// ═══════════════════════════════════════════════════════════════════════════════

/// Anyone below SUPER_ADMIN only reaches their own school.
fn ensure_own_school(identity: &Identity, id: &TenantId) -> Result<()> {
    if identity.role.is_super_admin() || identity.tenant_id.as_ref() == Some(id) {
        Ok(())
    } else {
        Err(TrackError::cross_tenant_access())
    }
}

pub async fn create_school(
    State(state): State<AppState>,
    ctx: RequestContext,
    body: std::result::Result<Json<NewTenant>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Tenant>>)> {
    let Json(input) = body?;
    let tenant = state.services.tenants.create(input).await?;
    info!(request_id = %ctx.request_id, tenant_id = %tenant.id, "School onboarded");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(tenant))))
}

pub async fn list_schools(
    State(state): State<AppState>,
    _ctx: RequestContext,
    query: std::result::Result<Query<PageQuery>, axum::extract::rejection::QueryRejection>,
) -> ApiResult<PageResult<Tenant>> {
    let Query(query) = query?;
    ok(state.services.tenants.list(&query).await?)
}

pub async fn get_school(
    State(state): State<AppState>,
    admitted: Admitted<AdminOnly>,
    Path(id): Path<String>,
) -> ApiResult<Tenant> {
    let id = TenantId::new(id);
    ensure_own_school(admitted.context().require_identity()?, &id)?;
    ok(state.services.tenants.get_by_id(&id).await?)
}

pub async fn update_school(
    State(state): State<AppState>,
    admitted: Admitted<AdminOnly>,
    Path(id): Path<String>,
    body: std::result::Result<Json<TenantUpdate>, JsonRejection>,
) -> ApiResult<Tenant> {
    let Json(update) = body?;
    let id = TenantId::new(id);
    let identity = admitted.context().require_identity()?;
    ensure_own_school(identity, &id)?;

    // Lifecycle changes are an operator decision.
    if update.status.is_some() && !identity.role.is_super_admin() {
        return Err(TrackError::no_access());
    }
    ok(state.services.tenants.update(&id, update).await?)
}

pub async fn assign_director(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    body: std::result::Result<Json<AssignDirectorRequest>, JsonRejection>,
) -> ApiResult<Tenant> {
    let Json(req) = body?;
    let tenant = state
        .services
        .tenants
        .assign_director(&TenantId::new(id), &req.director_id)
        .await?;
    info!(request_id = %ctx.request_id, tenant_id = %tenant.id, "Director changed");
    ok(tenant)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Cache
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn clear_cache(State(state): State<AppState>, ctx: RequestContext) -> ApiResult<CacheClearResponse> {
    state.cache.flush().await?;
    info!(request_id = %ctx.request_id, backend = state.cache.backend_name(), "Cache cleared");
    ok(CacheClearResponse {
        cleared: true,
        backend: state.cache.backend_name().to_string(),
    })
}
