//! Tenant-scoped repositories.
//!
//! Insert methods only take [`Admitted`] records, so every write has been
//! through the [`edufin_tenancy::TenancyGuard`]. Reads take the tenant id
//! explicitly and never return rows of another tenant.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use edufin_accounting::{Account, Journal, JournalEntry, PostedJournal};
use edufin_audit::{AdminAuditLogEntry, FinancialAuditLogEntry};
use edufin_core::{AccountId, JournalId, TenantId};
use edufin_tenancy::{Admitted, TenancyViolation};

use crate::error::StoreError;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Builds the next financial audit entry from the tenant's current tail.
///
/// Called by the store while it holds the tenant's chain lock, between
/// reading the tail and inserting the new entry.
pub type ChainLink = Box<
    dyn FnOnce(Option<&FinancialAuditLogEntry>) -> Result<Admitted<FinancialAuditLogEntry>, TenancyViolation>
        + Send,
>;

/// Accounts, journals and journal lines.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Insert an account. Codes are unique per tenant.
    async fn insert_account(&self, account: Admitted<Account>) -> Result<Account, StoreError>;

    async fn account(
        &self,
        tenant_id: &TenantId,
        account_id: AccountId,
    ) -> Result<Option<Account>, StoreError>;

    /// Insert a journal and its lines atomically (all or nothing).
    ///
    /// Every line must reference an account of the journal's tenant.
    async fn insert_journal(
        &self,
        journal: Admitted<Journal>,
        entries: Vec<Admitted<JournalEntry>>,
    ) -> Result<PostedJournal, StoreError>;

    async fn journal(
        &self,
        tenant_id: &TenantId,
        journal_id: JournalId,
    ) -> Result<Option<PostedJournal>, StoreError>;

    /// `Σ(debit - credit)` over committed lines for `account_id` whose journal
    /// belongs to `tenant_id`; zero when there are none.
    async fn account_balance(
        &self,
        tenant_id: &TenantId,
        account_id: AccountId,
    ) -> Result<Decimal, StoreError>;
}

/// Financial (chained) and administrative (unchained) audit logs.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Append to a tenant's financial chain.
    ///
    /// Implementations serialize appends per tenant: reading the tail and
    /// inserting the entry built by `link` happen under one exclusive lock, so
    /// two appends can never chain from the same tail.
    async fn append_financial(
        &self,
        tenant_id: &TenantId,
        link: ChainLink,
    ) -> Result<FinancialAuditLogEntry, StoreError>;

    /// The tenant's financial entries in chain order.
    async fn financial_entries(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<FinancialAuditLogEntry>, StoreError>;

    async fn insert_admin(
        &self,
        entry: Admitted<AdminAuditLogEntry>,
    ) -> Result<AdminAuditLogEntry, StoreError>;

    /// The tenant's administrative entries, oldest first.
    async fn admin_entries(&self, tenant_id: &TenantId)
    -> Result<Vec<AdminAuditLogEntry>, StoreError>;
}

#[async_trait]
impl<S> LedgerRepository for Arc<S>
where
    S: LedgerRepository + ?Sized,
{
    async fn insert_account(&self, account: Admitted<Account>) -> Result<Account, StoreError> {
        (**self).insert_account(account).await
    }

    async fn account(
        &self,
        tenant_id: &TenantId,
        account_id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        (**self).account(tenant_id, account_id).await
    }

    async fn insert_journal(
        &self,
        journal: Admitted<Journal>,
        entries: Vec<Admitted<JournalEntry>>,
    ) -> Result<PostedJournal, StoreError> {
        (**self).insert_journal(journal, entries).await
    }

    async fn journal(
        &self,
        tenant_id: &TenantId,
        journal_id: JournalId,
    ) -> Result<Option<PostedJournal>, StoreError> {
        (**self).journal(tenant_id, journal_id).await
    }

    async fn account_balance(
        &self,
        tenant_id: &TenantId,
        account_id: AccountId,
    ) -> Result<Decimal, StoreError> {
        (**self).account_balance(tenant_id, account_id).await
    }
}

#[async_trait]
impl<S> AuditRepository for Arc<S>
where
    S: AuditRepository + ?Sized,
{
    async fn append_financial(
        &self,
        tenant_id: &TenantId,
        link: ChainLink,
    ) -> Result<FinancialAuditLogEntry, StoreError> {
        (**self).append_financial(tenant_id, link).await
    }

    async fn financial_entries(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<FinancialAuditLogEntry>, StoreError> {
        (**self).financial_entries(tenant_id).await
    }

    async fn insert_admin(
        &self,
        entry: Admitted<AdminAuditLogEntry>,
    ) -> Result<AdminAuditLogEntry, StoreError> {
        (**self).insert_admin(entry).await
    }

    async fn admin_entries(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<AdminAuditLogEntry>, StoreError> {
        (**self).admin_entries(tenant_id).await
    }
}

/// Reject a chain link whose entry does not extend `tail` for `tenant_id`.
pub(crate) fn check_link(
    tenant_id: &TenantId,
    tail: Option<&FinancialAuditLogEntry>,
    entry: &FinancialAuditLogEntry,
) -> Result<(), StoreError> {
    if &entry.tenant_id != tenant_id {
        return Err(StoreError::InvalidRecord(
            "chain entry tenant does not match the chain being appended".to_string(),
        ));
    }
    let expected_sequence = tail.map(|t| t.sequence + 1).unwrap_or(1);
    if entry.sequence != expected_sequence || entry.previous_hash.as_deref() != tail.map(|t| t.hash.as_str()) {
        return Err(StoreError::InvalidRecord(
            "chain entry does not extend the current tail".to_string(),
        ));
    }
    Ok(())
}
