//! Canonical payload serialization and the chain hash.
//!
//! `hash = hex(SHA-256(serialize(payload) + (previous_hash ?? "")))` where
//! `serialize` emits compact JSON with keys in the fixed order
//! `actionType, details, userId, tenantId, createdAt`.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use edufin_core::{TenantId, UserId};

/// Fields of a financial entry covered by its hash.
#[derive(Debug, Clone, Copy)]
pub struct ChainPayload<'a> {
    pub action_type: &'a str,
    pub details: &'a JsonValue,
    pub user_id: &'a UserId,
    pub tenant_id: &'a TenantId,
    pub created_at: DateTime<Utc>,
}

impl ChainPayload<'_> {
    /// Canonical JSON form of the payload.
    ///
    /// Nested objects in `details` serialize with sorted keys, so the output
    /// is stable across a JSONB round-trip.
    pub fn serialize(&self) -> String {
        format!(
            "{{\"actionType\":{},\"details\":{},\"userId\":{},\"tenantId\":{},\"createdAt\":{}}}",
            json_string(self.action_type),
            self.details,
            json_string(self.user_id.as_str()),
            json_string(self.tenant_id.as_str()),
            json_string(&self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
        )
    }
}

fn json_string(s: &str) -> String {
    JsonValue::from(s).to_string()
}

/// Chain hash of `payload` linked to `previous_hash`.
pub fn chain_hash(payload: &ChainPayload<'_>, previous_hash: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.serialize().as_bytes());
    hasher.update(previous_hash.unwrap_or("").as_bytes());
    hex::encode(hasher.finalize())
}

/// Timestamp precision used for audit entries (microseconds, matching
/// `TIMESTAMPTZ`), so a stored entry re-hashes to the same value.
pub fn audit_timestamp(now: DateTime<Utc>) -> DateTime<Utc> {
    now.trunc_subsecs(6)
}
