use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::get,
};

use edufin_audit::NewAdminAction;
use edufin_auth::Permission;
use edufin_tenancy::TenantContext;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/financial", get(list_financial))
        .route("/financial/verify", get(verify_financial))
        .route("/admin", get(list_admin).post(record_admin))
}

pub async fn list_financial(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, &Permission::AUDIT_READ) {
        return resp;
    }

    match services.audit.financial_trail(tenant.tenant_id()).await {
        Ok(items) => (StatusCode::OK, Json(dto::ListResponse { items })).into_response(),
        Err(e) => errors::audit_error_to_response(e),
    }
}

/// Integrity problems come back as `200 {isValid: false, errors}`.
pub async fn verify_financial(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, &Permission::AUDIT_READ) {
        return resp;
    }

    match services
        .audit
        .verify_financial_audit_trail(tenant.tenant_id())
        .await
    {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::audit_error_to_response(e),
    }
}

pub async fn list_admin(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, &Permission::AUDIT_READ) {
        return resp;
    }

    match services.audit.admin_trail(tenant.tenant_id()).await {
        Ok(items) => (StatusCode::OK, Json(dto::ListResponse { items })).into_response(),
        Err(e) => errors::audit_error_to_response(e),
    }
}

pub async fn record_admin(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    headers: HeaderMap,
    Json(body): Json<dto::RecordAdminActionRequest>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, &Permission::AUDIT_WRITE) {
        return resp;
    }
    if body.action.trim().is_empty() {
        return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", "action must not be blank");
    }

    let input = NewAdminAction {
        action: body.action,
        details: body.details,
        ip_address: client_ip(&headers),
        user_agent: header_str(&headers, header::USER_AGENT.as_str()),
    };

    match services
        .audit
        .record_admin_action(input, principal.user_id().clone(), tenant.tenant_id().clone())
        .await
    {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(e) => errors::audit_error_to_response(e),
    }
}

/// First hop of `X-Forwarded-For`, else `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
