//! API-side permission checks, run before a handler touches an engine.

use axum::http::StatusCode;
use axum::response::Response;

use edufin_auth::{Permission, authorize};
use edufin_tenancy::TenantContext;

use crate::app::errors;
use crate::context::PrincipalContext;

/// `Ok(())` if the caller holds `required` in the request's tenant,
/// otherwise a ready 403 response.
pub fn require(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    required: &Permission,
) -> Result<(), Response> {
    authorize(&principal.principal(tenant.tenant_id().clone()), required)
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}
