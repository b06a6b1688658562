use thiserror::Error;

use edufin_tenancy::TenancyViolation;

/// Storage operation error.
///
/// These are **infrastructure errors** (storage, referential integrity,
/// isolation) as opposed to domain errors (validation, balance). A failed
/// write never leaves partial rows behind.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique constraint hit (e.g. duplicate account code, concurrent chain append).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A row referenced something that does not exist in the same tenant.
    #[error("foreign key violation: {0}")]
    ForeignKey(String),

    /// The record set handed to the store is internally inconsistent.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The tenancy guard rejected a record built inside the store's lock.
    #[error(transparent)]
    Tenancy(#[from] TenancyViolation),

    /// Backend failure (connection, transaction, poisoned lock, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::ForeignKey(msg),
                Some("23514") => StoreError::InvalidRecord(msg),
                _ => StoreError::Backend(msg),
            }
        }
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}
