use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use edufin_core::AccountId;

// -------------------------
// Request DTOs
// -------------------------

/// `POST /audit/admin`. Client address and user agent come from the request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordAdminActionRequest {
    pub action: String,
    #[serde(default)]
    pub details: Option<JsonValue>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub account_id: AccountId,
    /// Serialized as a decimal string.
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}
