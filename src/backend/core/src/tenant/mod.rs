//! Schools as tenants.
//!
//! This module provides:
//! - **Models**: the school record, its id and the lifecycle state machine
//! - **Resolver**: maps the request host to a school and enforces that a
//!   caller only reaches its own, active school
//!
//! # Lifecycle
//!
//! ```text
//! Inactive ──► Active ──► Inactive
//!                 │
//!                 └─────► Deleted (terminal)
//! ```

pub mod models;
pub mod resolver;

pub use models::{normalize_subdomain, Tenant, TenantId, TenantStatus};
pub use resolver::TenantResolver;
