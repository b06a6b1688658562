//! Double-entry posting and balance queries.
//!
//! ```text
//! JournalDraft
//!   ↓
//! 1. Σ debit == Σ credit ?            (else UnbalancedJournal, nothing stored)
//!   ↓
//! 2. build journal + lines, generate ids
//!   ↓
//! 3. TenancyGuard::admit / admit_batch (auto-tag with the ambient tenant)
//!   ↓
//! 4. LedgerRepository::insert_journal (one transaction: journal, then lines)
//! ```
//!
//! Financial writes are never retried here; a failure surfaces to the caller
//! with nothing persisted.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::instrument;

use edufin_accounting::{Account, JournalDraft, NewAccount, PostedJournal};
use edufin_core::{AccountId, DomainError, JournalId, TenantId};
use edufin_tenancy::{TenancyGuard, TenancyViolation, TenantContext};

use crate::error::StoreError;
use crate::repository::LedgerRepository;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Validation or balance failure; nothing was persisted.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Tenancy(#[from] TenancyViolation),

    /// A tenant-scoped read was attempted outside any tenant context.
    #[error("no tenant context is active")]
    MissingTenantContext,

    /// The store failed; the transaction was rolled back.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Tenancy(violation) => LedgerError::Tenancy(violation),
            other => LedgerError::Store(other),
        }
    }
}

/// Posting engine over any [`LedgerRepository`].
#[derive(Debug, Clone)]
pub struct LedgerEngine<R> {
    repo: R,
}

impl<R> LedgerEngine<R>
where
    R: LedgerRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Open an account under the ambient tenant.
    #[instrument(skip(self, input), fields(account_code = %input.code), err)]
    pub async fn open_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        let account = Account::open(input)?;
        let admitted = TenancyGuard::admit(account)?;
        Ok(self.repo.insert_account(admitted).await?)
    }

    /// Post a balanced journal atomically.
    ///
    /// Without an ambient tenant the journal is stored untagged (system
    /// writes); inside a tenant scope it is tagged with that tenant.
    #[instrument(
        skip(self, draft),
        fields(reference = %draft.reference, line_count = draft.entries.len()),
        err
    )]
    pub async fn post(&self, draft: JournalDraft) -> Result<PostedJournal, LedgerError> {
        let (journal, entries) = draft.into_journal()?;

        let journal = TenancyGuard::admit(journal)?;
        let entries = TenancyGuard::admit_batch(entries)?;

        let posted = self.repo.insert_journal(journal, entries).await?;
        tracing::info!(
            journal_id = %posted.journal.id,
            tenant_id = ?posted.journal.tenant_id.as_ref().map(TenantId::as_str),
            "journal posted"
        );
        Ok(posted)
    }

    /// Fetch an account of the ambient tenant.
    #[instrument(skip(self), err)]
    pub async fn account(&self, account_id: AccountId) -> Result<Option<Account>, LedgerError> {
        let tenant_id = active_tenant()?;
        Ok(self.repo.account(&tenant_id, account_id).await?)
    }

    /// Fetch a posted journal of the ambient tenant.
    #[instrument(skip(self), err)]
    pub async fn journal(&self, journal_id: JournalId) -> Result<Option<PostedJournal>, LedgerError> {
        let tenant_id = active_tenant()?;
        Ok(self.repo.journal(&tenant_id, journal_id).await?)
    }

    /// `Σ(debit - credit)` for `account_id` over the ambient tenant's journals.
    #[instrument(skip(self), err)]
    pub async fn account_balance(&self, account_id: AccountId) -> Result<Decimal, LedgerError> {
        let tenant_id = active_tenant()?;
        Ok(self.repo.account_balance(&tenant_id, account_id).await?)
    }
}

fn active_tenant() -> Result<TenantId, LedgerError> {
    TenantContext::current().ok_or(LedgerError::MissingTenantContext)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use edufin_accounting::{AccountType, DraftLine};
    use edufin_core::Amount;

    use super::*;
    use crate::repository::InMemoryStore;

    fn tenant(id: &str) -> TenantContext {
        TenantContext::new(TenantId::new(id).unwrap())
    }

    fn new_account(code: &str, account_type: AccountType) -> NewAccount {
        NewAccount {
            code: code.to_string(),
            name: format!("Account {code}"),
            account_type,
            category: "general".to_string(),
        }
    }

    fn line(account_id: AccountId, debit: Decimal, credit: Decimal) -> DraftLine {
        DraftLine {
            account_id,
            debit: Amount::new(debit).unwrap(),
            credit: Amount::new(credit).unwrap(),
        }
    }

    fn draft(lines: Vec<DraftLine>) -> JournalDraft {
        JournalDraft {
            date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            reference: "FEE-0001".to_string(),
            memo: None,
            entries: lines,
        }
    }

    fn engine() -> (LedgerEngine<Arc<InMemoryStore>>, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (LedgerEngine::new(store.clone()), store)
    }

    #[tokio::test]
    async fn unbalanced_post_is_rejected_and_nothing_is_stored() {
        let (engine, store) = engine();
        tenant("school-1")
            .scope(async {
                let cash = engine.open_account(new_account("1000", AccountType::Asset)).await.unwrap();
                let fees = engine.open_account(new_account("4000", AccountType::Revenue)).await.unwrap();

                let err = engine
                    .post(draft(vec![
                        line(cash.id, dec!(500.00), dec!(0)),
                        line(fees.id, dec!(0), dec!(499.99)),
                    ]))
                    .await
                    .unwrap_err();

                assert!(matches!(
                    err,
                    LedgerError::Domain(DomainError::UnbalancedJournal { debits, credits })
                        if debits == dec!(500.00) && credits == dec!(499.99)
                ));
            })
            .await;

        assert_eq!(store.row_counts(), (0, 0));
    }

    #[tokio::test]
    async fn posted_journal_is_tagged_with_the_ambient_tenant() {
        let (engine, _store) = engine();
        let posted = tenant("school-1")
            .scope(async {
                let cash = engine.open_account(new_account("1000", AccountType::Asset)).await.unwrap();
                let fees = engine.open_account(new_account("4000", AccountType::Revenue)).await.unwrap();
                engine
                    .post(draft(vec![
                        line(cash.id, dec!(500.00), dec!(0)),
                        line(fees.id, dec!(0), dec!(500.00)),
                    ]))
                    .await
                    .unwrap()
            })
            .await;

        assert_eq!(posted.journal.tenant_id.as_ref().map(TenantId::as_str), Some("school-1"));
        assert_eq!(posted.entries.len(), 2);
        assert!(posted.entries.iter().all(|e| e.journal_id == posted.journal.id));
    }

    #[tokio::test]
    async fn commit_failure_leaves_no_journal_or_lines() {
        let (engine, store) = engine();
        tenant("school-1")
            .scope(async {
                let cash = engine.open_account(new_account("1000", AccountType::Asset)).await.unwrap();
                let fees = engine.open_account(new_account("4000", AccountType::Revenue)).await.unwrap();

                store.set_fail_writes(true);
                let err = engine
                    .post(draft(vec![
                        line(cash.id, dec!(10), dec!(0)),
                        line(fees.id, dec!(0), dec!(10)),
                    ]))
                    .await
                    .unwrap_err();
                assert!(matches!(err, LedgerError::Store(StoreError::Backend(_))));
            })
            .await;

        assert_eq!(store.row_counts(), (0, 0));
    }

    #[tokio::test]
    async fn lines_cannot_reference_another_tenants_account() {
        let (engine, store) = engine();
        let foreign = tenant("school-2")
            .scope(engine.open_account(new_account("1000", AccountType::Asset)))
            .await
            .unwrap();

        let err = tenant("school-1")
            .scope(async {
                let fees = engine.open_account(new_account("4000", AccountType::Revenue)).await.unwrap();
                engine
                    .post(draft(vec![
                        line(foreign.id, dec!(10), dec!(0)),
                        line(fees.id, dec!(0), dec!(10)),
                    ]))
                    .await
                    .unwrap_err()
            })
            .await;

        assert!(matches!(err, LedgerError::Store(StoreError::ForeignKey(_))));
        assert_eq!(store.row_counts(), (0, 0));
    }

    #[tokio::test]
    async fn account_codes_are_unique_per_tenant() {
        let (engine, _store) = engine();
        let open_cash = || engine.open_account(new_account("1000", AccountType::Asset));

        tenant("school-1").scope(open_cash()).await.unwrap();
        let err = tenant("school-1").scope(open_cash()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Store(StoreError::Conflict(_))));

        // Same code in another tenant is fine.
        let other = tenant("school-2").scope(open_cash()).await.unwrap();

        let visible = tenant("school-2").scope(engine.account(other.id)).await.unwrap();
        assert_eq!(visible.map(|a| a.code), Some("1000".to_string()));
        let hidden = tenant("school-1").scope(engine.account(other.id)).await.unwrap();
        assert_eq!(hidden, None);
    }

    #[tokio::test]
    async fn balance_requires_a_tenant_context() {
        let (engine, _store) = engine();
        let err = engine.account_balance(AccountId::new()).await.unwrap_err();
        assert!(matches!(err, LedgerError::MissingTenantContext));

        let err = engine.journal(JournalId::new()).await.unwrap_err();
        assert!(matches!(err, LedgerError::MissingTenantContext));
    }

    #[tokio::test]
    async fn balance_of_an_unused_account_is_zero() {
        let (engine, _store) = engine();
        let balance = tenant("school-1")
            .scope(async {
                let cash = engine.open_account(new_account("1000", AccountType::Asset)).await.unwrap();
                engine.account_balance(cash.id).await.unwrap()
            })
            .await;
        assert_eq!(balance, Decimal::ZERO);
    }

    #[tokio::test]
    async fn journals_of_other_tenants_are_invisible() {
        let (engine, _store) = engine();
        let posted = tenant("school-1")
            .scope(async {
                let cash = engine.open_account(new_account("1000", AccountType::Asset)).await.unwrap();
                let fees = engine.open_account(new_account("4000", AccountType::Revenue)).await.unwrap();
                engine
                    .post(draft(vec![
                        line(cash.id, dec!(75), dec!(0)),
                        line(fees.id, dec!(0), dec!(75)),
                    ]))
                    .await
                    .unwrap()
            })
            .await;

        let own = tenant("school-1")
            .scope(engine.journal(posted.journal.id))
            .await
            .unwrap();
        assert_eq!(own, Some(posted.clone()));

        let other = tenant("school-2")
            .scope(engine.journal(posted.journal.id))
            .await
            .unwrap();
        assert_eq!(other, None);
    }
}
