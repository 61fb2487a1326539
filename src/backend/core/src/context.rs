//! Typed per-request context.
//!
//! Each pipeline stage returns a new [`RequestContext`] with its result
//! attached instead of mutating the request in place. Handlers receive the
//! final value through the [`Admitted`](crate::pipeline::Admitted) extractor.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TrackError};
use crate::rbac::{Role, UserId};
use crate::tenant::TenantId;

/// The authenticated principal, rebuilt from the token on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: UserId,
    pub role: Role,
    /// School the principal belongs to. Operators may have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
}

impl Identity {
    pub fn new(id: UserId, role: Role, tenant_id: Option<TenantId>) -> Self {
        Self { id, role, tenant_id }
    }
}

/// The school a request was resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantContext {
    pub tenant_id: TenantId,
    pub subdomain: String,
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub identity: Option<Identity>,
    pub tenant: Option<TenantContext>,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            identity: None,
            tenant: None,
        }
    }

    /// Context with a freshly generated request id.
    pub fn anonymous() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn with_identity(self, identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            ..self
        }
    }

    pub fn with_tenant(self, tenant: TenantContext) -> Self {
        Self {
            tenant: Some(tenant),
            ..self
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|identity| identity.role)
    }

    pub fn require_identity(&self) -> Result<&Identity> {
        self.identity.as_ref().ok_or_else(TrackError::unauthorized)
    }

    /// The resolved school. Only tenant-scoped routes carry one.
    pub fn require_tenant(&self) -> Result<&TenantContext> {
        self.tenant.as_ref().ok_or_else(TrackError::school_not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_builder_keeps_request_id() {
        let ctx = RequestContext::new("req-1")
            .with_identity(Identity::new(UserId::new("u-1"), Role::Staff, None))
            .with_tenant(TenantContext {
                tenant_id: TenantId::new("t-1"),
                subdomain: "acme".to_string(),
            });

        assert_eq!(ctx.request_id, "req-1");
        assert_eq!(ctx.role(), Some(Role::Staff));
        assert_eq!(ctx.require_tenant().unwrap().subdomain, "acme");
    }

    #[test]
    fn test_missing_identity_is_unauthorized() {
        let ctx = RequestContext::anonymous();
        assert_eq!(ctx.role(), None);
        assert_eq!(ctx.require_identity().unwrap_err().code(), ErrorCode::Unauthorized);
    }

    #[test]
    fn test_identity_wire_shape() {
        let identity = Identity::new(
            UserId::new("u-1"),
            Role::Teacher,
            Some(TenantId::new("t-1")),
        );
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["id"], "u-1");
        assert_eq!(json["role"], "TEACHER");
        assert_eq!(json["tenantId"], "t-1");
    }
}
