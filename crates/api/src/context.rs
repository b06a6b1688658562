use edufin_auth::{Principal, Role};
use edufin_core::{TenantId, UserId};

/// Principal context for a request (authenticated identity + roles).
///
/// The tenant half of the request context is
/// [`edufin_tenancy::TenantContext`], which the auth middleware both inserts
/// as an extension and binds for the rest of the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, roles: Vec<Role>) -> Self {
        Self { user_id, roles }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Resolve permissions for authorization checks within `tenant_id`.
    pub fn principal(&self, tenant_id: TenantId) -> Principal {
        Principal::from_roles(self.user_id.clone(), tenant_id, &self.roles)
    }
}
