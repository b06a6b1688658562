//! `edufin-tenancy`: ambient tenant context and the write-path guard.
//!
//! - [`TenantContext`] binds the active tenant to one logical operation (a
//!   tokio task), surviving `.await` points.
//! - [`TenancyGuard`] is the only way to obtain an [`Admitted`] record, and
//!   repository inserts only accept admitted records.

pub mod context;
pub mod guard;

pub use context::TenantContext;
pub use guard::{Admitted, TenancyGuard, TenancyViolation};
