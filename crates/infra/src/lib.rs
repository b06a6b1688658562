//! Infrastructure layer: storage adapters and the engines that orchestrate
//! guarded writes against them.

pub mod audit_engine;
pub mod error;
pub mod ledger_engine;
pub mod repository;


pub use audit_engine::{AuditError, AuditTrailEngine};
pub use error::StoreError;
pub use ledger_engine::{LedgerEngine, LedgerError};
pub use repository::{
    AuditRepository, ChainLink, InMemoryStore, LedgerRepository, PostgresStore,
};
