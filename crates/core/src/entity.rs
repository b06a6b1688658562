//! The tenant-field declaration used by the write-path guard.

use crate::TenantId;

/// How a persisted record exposes its tenant column.
#[derive(Debug)]
pub enum TenantField<'a> {
    /// The record's schema has no tenant column.
    Absent,
    /// The record's tenant column (unset when `None`).
    Present(&'a mut Option<TenantId>),
    /// A tenant column that is always set at construction.
    Fixed(&'a TenantId),
}

/// Anything written through a repository.
///
/// Every insert path takes records implementing this trait so the tenancy
/// guard can inspect (and fill) the tenant column before the write.
pub trait Record {
    /// Entity kind, used in logs and security incidents.
    const KIND: &'static str;

    /// Tenant column of this record, if the schema declares one.
    fn tenant_field(&mut self) -> TenantField<'_> {
        TenantField::Absent
    }
}
