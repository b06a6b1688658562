use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use edufin_core::{AuditLogId, Record, TenantField, TenantId, UserId};

use crate::chain::audit_timestamp;

/// Input for an administrative audit entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewAdminAction {
    pub action: String,
    pub details: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Append-only administrative audit entry.
///
/// Not hash-chained: its integrity rests on storage durability alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAuditLogEntry {
    pub id: AuditLogId,
    pub tenant_id: TenantId,
    pub action: String,
    pub user_id: UserId,
    pub details: Option<JsonValue>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AdminAuditLogEntry {
    pub fn new(
        input: NewAdminAction,
        user_id: UserId,
        tenant_id: TenantId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AuditLogId::new(),
            tenant_id,
            action: input.action,
            user_id,
            details: input.details,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            created_at: audit_timestamp(created_at),
        }
    }
}

impl Record for AdminAuditLogEntry {
    const KIND: &'static str = "admin_audit_log";

    fn tenant_field(&mut self) -> TenantField<'_> {
        TenantField::Fixed(&self.tenant_id)
    }
}
