#![allow(clippy::result_large_err)]
//! # TeachTrack Core
//!
//! Multi-tenant school management backend.
//!
//! ## Architecture
//!
//! - **Cache**: read-through cache over Redis or memory with key invalidation
//! - **Pagination**: offset/limit executor and page metadata
//! - **RBAC**: role hierarchy and the access-control tables
//! - **Tenant**: school lifecycle and host-based school resolution
//! - **Auth**: signed bearer tokens and password hashing
//! - **Pipeline**: token, school and role admission in front of every handler
//! - **Services**: school and user operations over the stores
//! - **Store**: PostgreSQL and in-memory persistence
//! - **Telemetry**: structured logging and Prometheus metrics

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod pagination;
pub mod pipeline;
pub mod rbac;
pub mod services;
pub mod store;
pub mod telemetry;
pub mod tenant;

pub use error::{ErrorCode, ErrorContext, ErrorDetails, ErrorSeverity, Result, TrackError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{build_router, ApiResponse, AppState};
    pub use crate::auth::{Argon2Hasher, AuthTokenService, PasswordHasher};
    pub use crate::cache::{
        CacheBackend, CacheConfig, CacheKey, InMemoryBackend, InvalidationEvent, InvalidationSet,
        ReadThroughCache, RedisBackend,
    };
    pub use crate::config::Config;
    pub use crate::context::{Identity, RequestContext, TenantContext};
    pub use crate::error::{ErrorCode, ErrorContext, Result, TrackError};
    pub use crate::pagination::{PageQuery, PageRequest, PageResult, PageSource, Paginator};
    pub use crate::pipeline::{Admitted, PipelineLayer, RequestPipeline, RoutePolicy};
    pub use crate::rbac::{AccessControl, Role, User, UserId, UserStatus};
    pub use crate::services::{Services, TenantService, UserService};
    pub use crate::store::{MemoryStore, PgStore, TenantStore, UserStore};
    pub use crate::tenant::{Tenant, TenantId, TenantResolver, TenantStatus};
}
