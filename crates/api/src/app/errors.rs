use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use edufin_core::DomainError;
use edufin_infra::{AuditError, LedgerError, StoreError};

/// Cross-tenant rejections never say which tenant was targeted.
const TENANCY_MESSAGE: &str = "operation not permitted for this tenant";

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::Domain(e) => domain_error_to_response(e),
        LedgerError::Tenancy(_) => {
            json_error(StatusCode::FORBIDDEN, "tenancy_violation", TENANCY_MESSAGE)
        }
        LedgerError::MissingTenantContext => json_error(
            StatusCode::UNAUTHORIZED,
            "missing_tenant_context",
            "no tenant context",
        ),
        LedgerError::Store(e) => store_error_to_response(e),
    }
}

pub fn audit_error_to_response(err: AuditError) -> axum::response::Response {
    match err {
        AuditError::Tenancy(_) => {
            json_error(StatusCode::FORBIDDEN, "tenancy_violation", TENANCY_MESSAGE)
        }
        AuditError::Store(e) => store_error_to_response(e),
    }
}

fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        e @ DomainError::UnbalancedJournal { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "unbalanced_journal", e.to_string())
        }
    }
}

fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::ForeignKey(msg) => json_error(StatusCode::BAD_REQUEST, "unknown_reference", msg),
        StoreError::Tenancy(_) => {
            json_error(StatusCode::FORBIDDEN, "tenancy_violation", TENANCY_MESSAGE)
        }
        e @ (StoreError::InvalidRecord(_) | StoreError::Backend(_)) => {
            tracing::error!(error = %e, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "storage failure")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
