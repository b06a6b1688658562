use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use rust_decimal::Decimal;

use edufin_accounting::{Account, Journal, JournalEntry, PostedJournal, account_balance};
use edufin_audit::{AdminAuditLogEntry, FinancialAuditLogEntry};
use edufin_core::{AccountId, JournalId, TenantId};
use edufin_tenancy::Admitted;

use super::{AuditRepository, ChainLink, LedgerRepository, check_link};
use crate::error::StoreError;

#[derive(Debug, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    journals: Vec<Journal>,
    journal_entries: Vec<JournalEntry>,
    financial_audit: HashMap<TenantId, Vec<FinancialAuditLogEntry>>,
    admin_audit: Vec<AdminAuditLogEntry>,
}

/// In-memory store for tests/dev. Not optimized for performance.
///
/// One lock covers all tables: every write is applied in a single critical
/// section, which gives the same all-or-nothing behavior as a transaction
/// and serializes chain appends.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    #[cfg(test)]
    fail_writes: std::sync::atomic::AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    #[cfg(test)]
    fn check_commit(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_commit(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Make every following write fail at commit time.
    #[cfg(test)]
    pub(crate) fn set_fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    /// Mutate a stored financial entry in place, bypassing the engine.
    #[cfg(test)]
    pub(crate) fn tamper_financial(
        &self,
        tenant_id: &TenantId,
        index: usize,
        f: impl FnOnce(&mut FinancialAuditLogEntry),
    ) {
        let mut tables = self.tables.write().unwrap();
        let chain = tables.financial_audit.get_mut(tenant_id).unwrap();
        f(&mut chain[index]);
    }

    #[cfg(test)]
    pub(crate) fn row_counts(&self) -> (usize, usize) {
        let tables = self.tables.read().unwrap();
        (tables.journals.len(), tables.journal_entries.len())
    }

    fn posted(tables: &Tables, journal: &Journal) -> PostedJournal {
        PostedJournal {
            journal: journal.clone(),
            entries: tables
                .journal_entries
                .iter()
                .filter(|e| e.journal_id == journal.id)
                .cloned()
                .collect(),
        }
    }
}

#[async_trait]
impl LedgerRepository for InMemoryStore {
    async fn insert_account(&self, account: Admitted<Account>) -> Result<Account, StoreError> {
        let account = account.into_inner();
        let mut tables = self.write()?;

        let duplicate = tables
            .accounts
            .values()
            .any(|a| a.tenant_id == account.tenant_id && a.code == account.code);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "account code '{}' already exists",
                account.code
            )));
        }

        self.check_commit()?;
        tables.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn account(
        &self,
        tenant_id: &TenantId,
        account_id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .accounts
            .get(&account_id)
            .filter(|a| a.tenant_id.as_ref() == Some(tenant_id))
            .cloned())
    }

    async fn insert_journal(
        &self,
        journal: Admitted<Journal>,
        entries: Vec<Admitted<JournalEntry>>,
    ) -> Result<PostedJournal, StoreError> {
        let journal = journal.into_inner();
        let entries: Vec<JournalEntry> = entries.into_iter().map(Admitted::into_inner).collect();

        let mut tables = self.write()?;

        // Validate the whole set before touching any table.
        for entry in &entries {
            if entry.journal_id != journal.id {
                return Err(StoreError::InvalidRecord(format!(
                    "journal entry {} does not belong to journal {}",
                    entry.id, journal.id
                )));
            }
            let known = tables
                .accounts
                .get(&entry.account_id)
                .is_some_and(|a| a.tenant_id == journal.tenant_id);
            if !known {
                return Err(StoreError::ForeignKey(format!(
                    "unknown account {}",
                    entry.account_id
                )));
            }
        }

        self.check_commit()?;
        tables.journals.push(journal.clone());
        tables.journal_entries.extend(entries.iter().cloned());

        Ok(PostedJournal { journal, entries })
    }

    async fn journal(
        &self,
        tenant_id: &TenantId,
        journal_id: JournalId,
    ) -> Result<Option<PostedJournal>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .journals
            .iter()
            .find(|j| j.id == journal_id && j.tenant_id.as_ref() == Some(tenant_id))
            .map(|j| Self::posted(&tables, j)))
    }

    async fn account_balance(
        &self,
        tenant_id: &TenantId,
        account_id: AccountId,
    ) -> Result<Decimal, StoreError> {
        let tables = self.read()?;
        let tenant_journals: Vec<JournalId> = tables
            .journals
            .iter()
            .filter(|j| j.tenant_id.as_ref() == Some(tenant_id))
            .map(|j| j.id)
            .collect();

        Ok(account_balance(
            account_id,
            tables
                .journal_entries
                .iter()
                .filter(|e| tenant_journals.contains(&e.journal_id)),
        ))
    }
}

#[async_trait]
impl AuditRepository for InMemoryStore {
    async fn append_financial(
        &self,
        tenant_id: &TenantId,
        link: ChainLink,
    ) -> Result<FinancialAuditLogEntry, StoreError> {
        // The write lock is held from reading the tail to the insert.
        let mut tables = self.write()?;
        let chain = tables.financial_audit.entry(tenant_id.clone()).or_default();

        let entry = link(chain.last())?.into_inner();
        check_link(tenant_id, chain.last(), &entry)?;

        self.check_commit()?;
        chain.push(entry.clone());
        Ok(entry)
    }

    async fn financial_entries(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<FinancialAuditLogEntry>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .financial_audit
            .get(tenant_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_admin(
        &self,
        entry: Admitted<AdminAuditLogEntry>,
    ) -> Result<AdminAuditLogEntry, StoreError> {
        let entry = entry.into_inner();
        let mut tables = self.write()?;
        self.check_commit()?;
        tables.admin_audit.push(entry.clone());
        Ok(entry)
    }

    async fn admin_entries(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<AdminAuditLogEntry>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .admin_audit
            .iter()
            .filter(|e| &e.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}
