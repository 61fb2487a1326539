//! Access-control evaluation over the static role tables.
//!
//! Three independent questions, all answered from [`Role`]'s tables:
//! - `can_assume_role`: may the actor see/manage users of the target role?
//!   Strictly lower tiers only, so peers are never visible through it.
//! - `can_act`: is the actor permitted to act at the required role level?
//! - `can_create`: may the actor create an account with the new role?
//!
//! The `require_*` variants take the role as found on the request context.
//! A missing role is Unauthorized; a role that fails the table is Forbidden.

use tracing::debug;

use super::roles::Role;
use crate::error::{Result, TrackError};

// ═══════════════════════════════════════════════════════════════════════════════
// Decision
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The action is allowed.
    Allow,
    /// The action is denied, with a reason.
    Deny(String),
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    fn from_bool(allowed: bool, reason: impl FnOnce() -> String) -> Self {
        if allowed {
            Self::Allow
        } else {
            Self::Deny(reason())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Access Control
// ═══════════════════════════════════════════════════════════════════════════════

/// Stateless evaluator over the role hierarchy and permission tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessControl;

impl AccessControl {
    pub fn new() -> Self {
        Self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Table lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// `hierarchy[target] < hierarchy[actor]`; equal tiers are denied.
    pub fn can_assume_role(&self, actor: Role, target: Role) -> bool {
        target.hierarchy() < actor.hierarchy()
    }

    /// `required ∈ rolePermissions[actor]`.
    pub fn can_act(&self, actor: Role, required: Role) -> bool {
        actor.acts_on().contains(&required)
    }

    /// `new_role ∈ userCreateRolePermissions[actor]`.
    pub fn can_create(&self, actor: Role, new_role: Role) -> bool {
        actor.creatable_roles().contains(&new_role)
    }

    /// Decision form of [`can_act`](Self::can_act), with a reason for logs.
    pub fn check_act(&self, actor: Role, required: Role) -> PolicyDecision {
        PolicyDecision::from_bool(self.can_act(actor, required), || {
            format!("role {} cannot act as {}", actor, required)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Enforcement
    // ─────────────────────────────────────────────────────────────────────────

    pub fn require_can_act(&self, actor: Option<Role>, required: Role) -> Result<Role> {
        let actor = actor.ok_or_else(TrackError::unauthorized)?;
        match self.check_act(actor, required) {
            PolicyDecision::Allow => Ok(actor),
            PolicyDecision::Deny(reason) => {
                debug!(%actor, %required, %reason, "Role check denied");
                Err(TrackError::no_access())
            }
        }
    }

    pub fn require_can_create(&self, actor: Option<Role>, new_role: Role) -> Result<Role> {
        let actor = actor.ok_or_else(TrackError::unauthorized)?;
        if self.can_create(actor, new_role) {
            Ok(actor)
        } else {
            debug!(%actor, %new_role, "Create check denied");
            Err(TrackError::forbidden(format!(
                "User with role {} cannot create user with role {}",
                actor, new_role
            )))
        }
    }

    pub fn require_can_assume_role(&self, actor: Option<Role>, target: Role) -> Result<Role> {
        let actor = actor.ok_or_else(TrackError::unauthorized)?;
        if self.can_assume_role(actor, target) {
            Ok(actor)
        } else {
            debug!(%actor, %target, "Assume-role check denied");
            Err(TrackError::no_access())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const ACL: AccessControl = AccessControl;

    #[test]
    fn test_can_assume_role_strictly_lower() {
        assert!(ACL.can_assume_role(Role::Admin, Role::Staff));
        assert!(!ACL.can_assume_role(Role::Staff, Role::Admin));
        assert!(!ACL.can_assume_role(Role::Admin, Role::Admin));
    }

    #[test]
    fn test_can_assume_role_equal_tier_peers() {
        // STUDENT and GUARDIAN share tier 1.
        assert!(!ACL.can_assume_role(Role::Student, Role::Guardian));
        assert!(!ACL.can_assume_role(Role::Guardian, Role::Student));
        assert!(ACL.can_assume_role(Role::Teacher, Role::Guardian));
    }

    #[test]
    fn test_can_act_is_table_driven() {
        assert!(ACL.can_act(Role::Admin, Role::Staff));
        assert!(ACL.can_act(Role::Staff, Role::Student));
        assert!(!ACL.can_act(Role::Staff, Role::Teacher));
        assert!(ACL.can_act(Role::Guardian, Role::Guardian));
        assert!(!ACL.can_act(Role::Guardian, Role::Student));
        assert!(!ACL.can_act(Role::Admin, Role::SuperAdmin));
    }

    #[test]
    fn test_can_create() {
        assert!(ACL.can_create(Role::Staff, Role::Teacher));
        assert!(!ACL.can_create(Role::Staff, Role::Admin));
        assert!(ACL.can_create(Role::SuperAdmin, Role::SuperAdmin));
        assert!(ACL.can_create(Role::Admin, Role::Guardian));
        assert!(!ACL.can_create(Role::Admin, Role::Admin));
        for role in Role::ALL {
            assert!(!ACL.can_create(Role::Teacher, role));
            assert!(!ACL.can_create(Role::Student, role));
            assert!(!ACL.can_create(Role::Guardian, role));
        }
    }

    #[test]
    fn test_missing_role_is_unauthorized() {
        let err = ACL.require_can_act(None, Role::Student).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);

        let err = ACL.require_can_create(None, Role::Student).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
    }

    #[test]
    fn test_failed_check_is_forbidden() {
        let err = ACL.require_can_act(Some(Role::Teacher), Role::Staff).unwrap_err();
        assert_eq!(err.http_status(), axum::http::StatusCode::FORBIDDEN);

        let err = ACL.require_can_create(Some(Role::Staff), Role::Admin).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let err = ACL
            .require_can_assume_role(Some(Role::Staff), Role::Staff)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoAccess);
    }

    #[test]
    fn test_check_act_reason() {
        match ACL.check_act(Role::Student, Role::Teacher) {
            PolicyDecision::Deny(reason) => assert!(reason.contains("STUDENT")),
            PolicyDecision::Allow => panic!("student must not act as teacher"),
        }
        assert!(ACL.check_act(Role::Teacher, Role::Teacher).is_allowed());
    }
}
