//! Role-based access control for school accounts.
//!
//! This module provides:
//! - **Roles**: the closed role set with its hierarchy and permission tables
//! - **Access Control**: the three table checks used by the request pipeline
//!   and the services (`can_assume_role`, `can_act`, `can_create`)
//! - **Models**: the user account and its identifiers
//!
//! # Usage
//!
//! ```rust,ignore
//! use teachtrack_core::rbac::{AccessControl, Role};
//!
//! let acl = AccessControl::new();
//! assert!(acl.can_create(Role::Staff, Role::Teacher));
//! acl.require_can_act(ctx.role(), Role::Staff)?;
//! ```

pub mod models;
pub mod policy;
pub mod roles;

pub use models::{Gender, User, UserId, UserStatus};
pub use policy::{AccessControl, PolicyDecision};
pub use roles::Role;
