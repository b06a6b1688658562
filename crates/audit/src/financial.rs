use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use edufin_core::{AuditLogId, Record, TenantField, TenantId, UserId};

use crate::chain::{ChainPayload, audit_timestamp, chain_hash};

/// Input for a financial audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFinancialAction {
    pub action_type: String,
    pub details: JsonValue,
    pub user_id: UserId,
    pub tenant_id: TenantId,
}

/// Append-only, hash-chained record of a financial action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialAuditLogEntry {
    pub id: AuditLogId,
    pub tenant_id: TenantId,
    /// 1-based position in the tenant's chain.
    pub sequence: u64,
    pub action_type: String,
    pub details: JsonValue,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub hash: String,
    pub previous_hash: Option<String>,
}

impl FinancialAuditLogEntry {
    /// Build the next link of a chain whose current tail is `previous`.
    pub fn chained(
        action: NewFinancialAction,
        created_at: DateTime<Utc>,
        previous: Option<&FinancialAuditLogEntry>,
    ) -> Self {
        let mut entry = Self {
            id: AuditLogId::new(),
            tenant_id: action.tenant_id,
            sequence: previous.map(|p| p.sequence + 1).unwrap_or(1),
            action_type: action.action_type,
            details: action.details,
            user_id: action.user_id,
            created_at: audit_timestamp(created_at),
            hash: String::new(),
            previous_hash: previous.map(|p| p.hash.clone()),
        };
        entry.hash = entry.compute_hash(entry.previous_hash.as_deref());
        entry
    }

    pub fn payload(&self) -> ChainPayload<'_> {
        ChainPayload {
            action_type: &self.action_type,
            details: &self.details,
            user_id: &self.user_id,
            tenant_id: &self.tenant_id,
            created_at: self.created_at,
        }
    }

    /// Hash of this entry's payload linked to `previous_hash`.
    pub fn compute_hash(&self, previous_hash: Option<&str>) -> String {
        chain_hash(&self.payload(), previous_hash)
    }
}

impl Record for FinancialAuditLogEntry {
    const KIND: &'static str = "financial_audit_log";

    fn tenant_field(&mut self) -> TenantField<'_> {
        TenantField::Fixed(&self.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(amount: u32) -> NewFinancialAction {
        NewFinancialAction {
            action_type: "PAYMENT".to_string(),
            details: json!({ "amount": amount }),
            user_id: UserId::new("bursar").unwrap(),
            tenant_id: TenantId::new("school-1").unwrap(),
        }
    }

    #[test]
    fn first_link_has_no_previous_hash() {
        let e = FinancialAuditLogEntry::chained(action(500), Utc::now(), None);
        assert_eq!(e.sequence, 1);
        assert_eq!(e.previous_hash, None);
        assert_eq!(e.hash, e.compute_hash(None));
    }

    #[test]
    fn next_link_points_at_the_tail() {
        let first = FinancialAuditLogEntry::chained(action(500), Utc::now(), None);
        let second = FinancialAuditLogEntry::chained(action(300), Utc::now(), Some(&first));
        assert_eq!(second.sequence, 2);
        assert_eq!(second.previous_hash.as_deref(), Some(first.hash.as_str()));
        assert_eq!(second.hash, second.compute_hash(Some(&first.hash)));
    }

    #[test]
    fn json_shape_is_camel_case() {
        let e = FinancialAuditLogEntry::chained(action(500), Utc::now(), None);
        let v = serde_json::to_value(&e).unwrap();
        assert!(v.get("previousHash").is_some());
        assert_eq!(v["actionType"], "PAYMENT");
        assert_eq!(v["tenantId"], "school-1");
    }
}
