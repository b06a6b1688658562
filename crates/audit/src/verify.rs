//! Chain verification.

use serde::{Deserialize, Serialize};

use crate::financial::FinancialAuditLogEntry;

/// Outcome of a chain walk. Integrity problems are reported as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Walk `entries` (in chain order) and report every hash or link mismatch.
///
/// After each entry the *stored* hash becomes the expected previous hash, so
/// a tampered row is reported on its own and later rows are checked against
/// what is actually stored.
pub fn verify_chain(entries: &[FinancialAuditLogEntry]) -> VerificationReport {
    let mut errors = Vec::new();
    let mut expected_previous_hash: Option<&str> = None;

    for entry in entries {
        let expected_hash = entry.compute_hash(expected_previous_hash);
        if entry.hash != expected_hash {
            errors.push(format!("Log ID {} hash mismatch.", entry.id));
        }
        if entry.previous_hash.as_deref() != expected_previous_hash {
            errors.push(format!("Log ID {} previous hash mismatch.", entry.id));
        }
        expected_previous_hash = Some(&entry.hash);
    }

    VerificationReport {
        is_valid: errors.is_empty(),
        errors,
    }
}
