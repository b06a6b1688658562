//! `edufin-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod money;

pub use entity::{Record, TenantField};
pub use error::{DomainError, DomainResult};
pub use id::{AccountId, AuditLogId, JournalEntryId, JournalId, TenantId, UserId};
pub use money::{Amount, AmountError, checked_sum};
