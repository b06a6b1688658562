use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use edufin_accounting::{JournalDraft, NewAccount};
use edufin_auth::Permission;
use edufin_core::{AccountId, JournalId};
use edufin_tenancy::TenantContext;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/accounts", post(open_account))
        .route("/accounts/:id", get(get_account))
        .route("/accounts/:id/balance", get(get_account_balance))
        .route("/journals", post(post_journal))
        .route("/journals/:id", get(get_journal))
}

pub async fn open_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewAccount>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }

    match services.ledger.open_account(body).await {
        Ok(account) => (StatusCode::CREATED, Json(account)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Post a journal, then record it in the tenant's financial audit chain.
pub async fn post_journal(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<JournalDraft>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, &Permission::LEDGER_WRITE) {
        return resp;
    }

    let (amount, _) = match body.totals() {
        Ok(totals) => totals,
        Err(e) => return errors::ledger_error_to_response(e.into()),
    };

    let posted = match services.ledger.post(body).await {
        Ok(p) => p,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    let details = json!({
        "journalId": posted.journal.id,
        "reference": posted.journal.reference,
        "date": posted.journal.date,
        "amount": amount.to_string(),
        "lineCount": posted.entries.len(),
    });

    if let Err(e) = services
        .audit
        .record_financial_action(
            "JOURNAL_POSTED",
            details,
            principal.user_id().clone(),
            tenant.tenant_id().clone(),
        )
        .await
    {
        // The journal is committed; the missing audit link must be visible.
        tracing::error!(
            target: "security",
            journal_id = %posted.journal.id,
            error = %e,
            "journal posted but audit append failed"
        );
        return errors::audit_error_to_response(e);
    }

    (StatusCode::CREATED, Json(posted)).into_response()
}

pub async fn get_journal(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }

    let Ok(journal_id) = id.parse::<JournalId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid journal id");
    };

    match services.ledger.journal(journal_id).await {
        Ok(Some(journal)) => (StatusCode::OK, Json(journal)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "journal not found"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }

    let Ok(account_id) = id.parse::<AccountId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid account id");
    };

    match services.ledger.account(account_id).await {
        Ok(Some(account)) => (StatusCode::OK, Json(account)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "account not found"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_account_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, &Permission::LEDGER_READ) {
        return resp;
    }

    let Ok(account_id) = id.parse::<AccountId>() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid account id");
    };

    match services.ledger.account_balance(account_id).await {
        Ok(balance) => (
            StatusCode::OK,
            Json(dto::BalanceResponse {
                account_id,
                balance,
            }),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
