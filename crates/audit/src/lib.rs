//! Audit trail domain: hash-chained financial entries, unchained
//! administrative entries, and chain verification.
//!
//! Pure domain logic only; storage and locking live in `edufin-infra`.

pub mod admin;
pub mod chain;
pub mod financial;
pub mod verify;

pub use admin::{AdminAuditLogEntry, NewAdminAction};
pub use chain::{audit_timestamp, chain_hash, ChainPayload};
pub use financial::{FinancialAuditLogEntry, NewFinancialAction};
pub use verify::{verify_chain, VerificationReport};
