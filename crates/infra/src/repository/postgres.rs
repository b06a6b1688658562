//! Postgres-backed repositories.
//!
//! Every read filters on `tenant_id`. Journal posting runs in one
//! transaction; financial chain appends take a per-tenant advisory lock for
//! the duration of their transaction and the table carries
//! `UNIQUE (tenant_id, sequence)` as a second line of defense.
//!
//! ## Error Mapping
//!
//! | PostgreSQL Error Code | StoreError | Scenario |
//! |----------------------|------------|----------|
//! | `23505` | `Conflict` | Duplicate account code, duplicate chain position |
//! | `23503` | `ForeignKey` | Line references a missing journal/account |
//! | `23514` | `InvalidRecord` | Negative amount, non-positive sequence |
//! | Any other | `Backend` | Connection failures, pool closed, ... |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use edufin_accounting::{Account, AccountType, Journal, JournalEntry, PostedJournal};
use edufin_audit::{AdminAuditLogEntry, FinancialAuditLogEntry};
use edufin_core::{AccountId, Amount, AuditLogId, JournalId, TenantId, UserId};
use edufin_tenancy::Admitted;

use super::{AuditRepository, ChainLink, LedgerRepository, check_link};
use crate::error::{StoreError, map_sqlx_error};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id UUID PRIMARY KEY,
        tenant_id TEXT,
        code TEXT NOT NULL,
        name TEXT NOT NULL,
        account_type TEXT NOT NULL,
        category TEXT NOT NULL,
        UNIQUE (tenant_id, code)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS journals (
        id UUID PRIMARY KEY,
        tenant_id TEXT,
        date DATE NOT NULL,
        reference TEXT NOT NULL,
        memo TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS journal_entries (
        id UUID PRIMARY KEY,
        journal_id UUID NOT NULL REFERENCES journals(id),
        account_id UUID NOT NULL REFERENCES accounts(id),
        -- Same bounds as edufin_core::Amount, so no line is ever rounded.
        debit NUMERIC(20, 4) NOT NULL CHECK (debit >= 0),
        credit NUMERIC(20, 4) NOT NULL CHECK (credit >= 0)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS journal_entries_account_idx
        ON journal_entries (account_id)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS financial_audit_logs (
        id UUID PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        sequence BIGINT NOT NULL CHECK (sequence > 0),
        action_type TEXT NOT NULL,
        details JSONB NOT NULL,
        user_id TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        hash TEXT NOT NULL,
        previous_hash TEXT,
        UNIQUE (tenant_id, sequence)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS admin_audit_logs (
        id UUID PRIMARY KEY,
        tenant_id TEXT NOT NULL,
        action TEXT NOT NULL,
        user_id TEXT NOT NULL,
        details JSONB,
        ip_address TEXT,
        user_agent TEXT,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS admin_audit_logs_tenant_idx
        ON admin_audit_logs (tenant_id, created_at)
    "#,
];

/// Postgres-backed ledger and audit store.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; the store can be
/// shared behind an `Arc` across request handlers.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'_, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

async fn rollback(tx: Transaction<'_, Postgres>) -> Result<(), StoreError> {
    tx.rollback()
        .await
        .map_err(|e| map_sqlx_error("rollback", e))
}

async fn commit(tx: Transaction<'_, Postgres>) -> Result<(), StoreError> {
    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("commit_transaction", e))
}

#[async_trait]
impl LedgerRepository for PostgresStore {
    #[instrument(skip(self, account), fields(account_code = %account.code), err)]
    async fn insert_account(&self, account: Admitted<Account>) -> Result<Account, StoreError> {
        let account = account.into_inner();

        sqlx::query(
            r#"
            INSERT INTO accounts (id, tenant_id, code, name, account_type, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.tenant_id.as_ref().map(TenantId::as_str))
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(&account.category)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;

        Ok(account)
    }

    #[instrument(skip(self, tenant_id), fields(tenant_id = %tenant_id), err)]
    async fn account(
        &self,
        tenant_id: &TenantId,
        account_id: AccountId,
    ) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, code, name, account_type, category
            FROM accounts
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(account_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_account", e))?;

        row.map(|row| Account::try_from(decode::<AccountRow>(&row)?))
            .transpose()
    }

    #[instrument(
        skip(self, journal, entries),
        fields(journal_id = %journal.id, line_count = entries.len()),
        err
    )]
    async fn insert_journal(
        &self,
        journal: Admitted<Journal>,
        entries: Vec<Admitted<JournalEntry>>,
    ) -> Result<PostedJournal, StoreError> {
        let journal = journal.into_inner();
        let entries: Vec<JournalEntry> = entries.into_iter().map(Admitted::into_inner).collect();

        if let Some(entry) = entries.iter().find(|e| e.journal_id != journal.id) {
            return Err(StoreError::InvalidRecord(format!(
                "journal entry {} does not belong to journal {}",
                entry.id, journal.id
            )));
        }

        let tenant = journal.tenant_id.as_ref().map(TenantId::as_str);
        let mut tx = self.begin().await?;

        // Every referenced account must belong to the journal's tenant.
        let mut account_ids: Vec<Uuid> = entries.iter().map(|e| *e.account_id.as_uuid()).collect();
        account_ids.sort();
        account_ids.dedup();
        let known: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS known
            FROM accounts
            WHERE id = ANY($1) AND tenant_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(&account_ids)
        .bind(tenant)
        .fetch_one(&mut *tx)
        .await
        .and_then(|row| row.try_get("known"))
        .map_err(|e| map_sqlx_error("check_accounts", e))?;

        if known != account_ids.len() as i64 {
            rollback(tx).await?;
            return Err(StoreError::ForeignKey(
                "journal references an unknown account".to_string(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO journals (id, tenant_id, date, reference, memo)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(journal.id.as_uuid())
        .bind(tenant)
        .bind(journal.date)
        .bind(&journal.reference)
        .bind(journal.memo.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_journal", e))?;

        for entry in &entries {
            sqlx::query(
                r#"
                INSERT INTO journal_entries (id, journal_id, account_id, debit, credit)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(entry.id.as_uuid())
            .bind(entry.journal_id.as_uuid())
            .bind(entry.account_id.as_uuid())
            .bind(entry.debit.value())
            .bind(entry.credit.value())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_journal_entry", e))?;
        }

        commit(tx).await?;
        Ok(PostedJournal { journal, entries })
    }

    #[instrument(skip(self, tenant_id), fields(tenant_id = %tenant_id), err)]
    async fn journal(
        &self,
        tenant_id: &TenantId,
        journal_id: JournalId,
    ) -> Result<Option<PostedJournal>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, tenant_id, date, reference, memo
            FROM journals
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(journal_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_journal", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let journal = Journal::try_from(decode::<JournalRow>(&row)?)?;

        let rows = sqlx::query(
            r#"
            SELECT id, journal_id, account_id, debit, credit
            FROM journal_entries
            WHERE journal_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(journal_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_journal_entries", e))?;

        let entries = rows
            .iter()
            .map(|row| JournalEntry::try_from(decode::<JournalEntryRow>(row)?))
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Some(PostedJournal { journal, entries }))
    }

    #[instrument(skip(self, tenant_id, account_id), fields(tenant_id = %tenant_id, account_id = %account_id), err)]
    async fn account_balance(
        &self,
        tenant_id: &TenantId,
        account_id: AccountId,
    ) -> Result<Decimal, StoreError> {
        sqlx::query(
            r#"
            SELECT COALESCE(SUM(e.debit - e.credit), 0) AS balance
            FROM journal_entries e
            JOIN journals j ON j.id = e.journal_id
            WHERE j.tenant_id = $1 AND e.account_id = $2
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(account_id.as_uuid())
        .fetch_one(&*self.pool)
        .await
        .and_then(|row| row.try_get::<Decimal, _>("balance"))
        .map(|balance| balance.normalize())
        .map_err(|e| map_sqlx_error("account_balance", e))
    }
}

#[async_trait]
impl AuditRepository for PostgresStore {
    #[instrument(skip(self, tenant_id, link), fields(tenant_id = %tenant_id), err)]
    async fn append_financial(
        &self,
        tenant_id: &TenantId,
        link: ChainLink,
    ) -> Result<FinancialAuditLogEntry, StoreError> {
        let mut tx = self.begin().await?;

        // Serializes appends per tenant until commit/rollback.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)")
            .bind(tenant_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_chain", e))?;

        let tail = sqlx::query(
            r#"
            SELECT id, tenant_id, sequence, action_type, details, user_id,
                   created_at, hash, previous_hash
            FROM financial_audit_logs
            WHERE tenant_id = $1
            ORDER BY sequence DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_chain_tail", e))?
        .map(|row| FinancialAuditLogEntry::try_from(decode::<FinancialRow>(&row)?))
        .transpose()?;

        let entry = match link(tail.as_ref()) {
            Ok(admitted) => admitted.into_inner(),
            Err(violation) => {
                rollback(tx).await?;
                return Err(violation.into());
            }
        };
        if let Err(e) = check_link(tenant_id, tail.as_ref(), &entry) {
            rollback(tx).await?;
            return Err(e);
        }

        sqlx::query(
            r#"
            INSERT INTO financial_audit_logs (
                id, tenant_id, sequence, action_type, details, user_id,
                created_at, hash, previous_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.tenant_id.as_str())
        .bind(entry.sequence as i64)
        .bind(&entry.action_type)
        .bind(&entry.details)
        .bind(entry.user_id.as_str())
        .bind(entry.created_at)
        .bind(&entry.hash)
        .bind(entry.previous_hash.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_financial_audit_log", e))?;

        commit(tx).await?;
        Ok(entry)
    }

    #[instrument(skip(self, tenant_id), fields(tenant_id = %tenant_id), err)]
    async fn financial_entries(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<FinancialAuditLogEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, sequence, action_type, details, user_id,
                   created_at, hash, previous_hash
            FROM financial_audit_logs
            WHERE tenant_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(tenant_id.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_financial_audit_logs", e))?;

        rows.iter()
            .map(|row| FinancialAuditLogEntry::try_from(decode::<FinancialRow>(row)?))
            .collect()
    }

    #[instrument(skip(self, entry), fields(action = %entry.action), err)]
    async fn insert_admin(
        &self,
        entry: Admitted<AdminAuditLogEntry>,
    ) -> Result<AdminAuditLogEntry, StoreError> {
        let entry = entry.into_inner();

        sqlx::query(
            r#"
            INSERT INTO admin_audit_logs (
                id, tenant_id, action, user_id, details, ip_address, user_agent, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.tenant_id.as_str())
        .bind(&entry.action)
        .bind(entry.user_id.as_str())
        .bind(&entry.details)
        .bind(entry.ip_address.as_deref())
        .bind(entry.user_agent.as_deref())
        .bind(entry.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_admin_audit_log", e))?;

        Ok(entry)
    }

    #[instrument(skip(self, tenant_id), fields(tenant_id = %tenant_id), err)]
    async fn admin_entries(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<AdminAuditLogEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, action, user_id, details, ip_address, user_agent, created_at
            FROM admin_audit_logs
            WHERE tenant_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(tenant_id.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_admin_audit_logs", e))?;

        rows.iter()
            .map(|row| AdminAuditLogEntry::try_from(decode::<AdminRow>(row)?))
            .collect()
    }
}

// SQLx row types

fn decode<'r, T>(row: &'r sqlx::postgres::PgRow) -> Result<T, StoreError>
where
    T: FromRow<'r, sqlx::postgres::PgRow>,
{
    T::from_row(row).map_err(|e| StoreError::Backend(format!("failed to decode row: {e}")))
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("stored {what} is invalid: {err}"))
}

fn tenant(value: String) -> Result<TenantId, StoreError> {
    TenantId::new(value).map_err(|e| corrupt("tenant_id", e))
}

fn user(value: String) -> Result<UserId, StoreError> {
    UserId::new(value).map_err(|e| corrupt("user_id", e))
}

#[derive(Debug)]
struct AccountRow {
    id: Uuid,
    tenant_id: Option<String>,
    code: String,
    name: String,
    account_type: String,
    category: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for AccountRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            account_type: row.try_get("account_type")?,
            category: row.try_get("category")?,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: AccountId::from_uuid(row.id),
            tenant_id: row.tenant_id.map(tenant).transpose()?,
            code: row.code,
            name: row.name,
            account_type: row
                .account_type
                .parse::<AccountType>()
                .map_err(|e| corrupt("account_type", e))?,
            category: row.category,
        })
    }
}

#[derive(Debug)]
struct JournalRow {
    id: Uuid,
    tenant_id: Option<String>,
    date: NaiveDate,
    reference: String,
    memo: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for JournalRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(JournalRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            date: row.try_get("date")?,
            reference: row.try_get("reference")?,
            memo: row.try_get("memo")?,
        })
    }
}

impl TryFrom<JournalRow> for Journal {
    type Error = StoreError;

    fn try_from(row: JournalRow) -> Result<Self, Self::Error> {
        Ok(Journal {
            id: JournalId::from_uuid(row.id),
            tenant_id: row.tenant_id.map(tenant).transpose()?,
            date: row.date,
            reference: row.reference,
            memo: row.memo,
        })
    }
}

#[derive(Debug)]
struct JournalEntryRow {
    id: Uuid,
    journal_id: Uuid,
    account_id: Uuid,
    debit: Decimal,
    credit: Decimal,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for JournalEntryRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(JournalEntryRow {
            id: row.try_get("id")?,
            journal_id: row.try_get("journal_id")?,
            account_id: row.try_get("account_id")?,
            debit: row.try_get("debit")?,
            credit: row.try_get("credit")?,
        })
    }
}

impl TryFrom<JournalEntryRow> for JournalEntry {
    type Error = StoreError;

    fn try_from(row: JournalEntryRow) -> Result<Self, Self::Error> {
        Ok(JournalEntry {
            id: row.id.into(),
            journal_id: JournalId::from_uuid(row.journal_id),
            account_id: AccountId::from_uuid(row.account_id),
            debit: Amount::new(row.debit).map_err(|e| corrupt("debit", e))?,
            credit: Amount::new(row.credit).map_err(|e| corrupt("credit", e))?,
        })
    }
}

#[derive(Debug)]
struct FinancialRow {
    id: Uuid,
    tenant_id: String,
    sequence: i64,
    action_type: String,
    details: serde_json::Value,
    user_id: String,
    created_at: DateTime<Utc>,
    hash: String,
    previous_hash: Option<String>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for FinancialRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(FinancialRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            sequence: row.try_get("sequence")?,
            action_type: row.try_get("action_type")?,
            details: row.try_get("details")?,
            user_id: row.try_get("user_id")?,
            created_at: row.try_get("created_at")?,
            hash: row.try_get("hash")?,
            previous_hash: row.try_get("previous_hash")?,
        })
    }
}

impl TryFrom<FinancialRow> for FinancialAuditLogEntry {
    type Error = StoreError;

    fn try_from(row: FinancialRow) -> Result<Self, Self::Error> {
        Ok(FinancialAuditLogEntry {
            id: AuditLogId::from_uuid(row.id),
            tenant_id: tenant(row.tenant_id)?,
            sequence: u64::try_from(row.sequence).map_err(|e| corrupt("sequence", e))?,
            action_type: row.action_type,
            details: row.details,
            user_id: user(row.user_id)?,
            created_at: row.created_at,
            hash: row.hash,
            previous_hash: row.previous_hash,
        })
    }
}

#[derive(Debug)]
struct AdminRow {
    id: Uuid,
    tenant_id: String,
    action: String,
    user_id: String,
    details: Option<serde_json::Value>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for AdminRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(AdminRow {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            action: row.try_get("action")?,
            user_id: row.try_get("user_id")?,
            details: row.try_get("details")?,
            ip_address: row.try_get("ip_address")?,
            user_agent: row.try_get("user_agent")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<AdminRow> for AdminAuditLogEntry {
    type Error = StoreError;

    fn try_from(row: AdminRow) -> Result<Self, Self::Error> {
        Ok(AdminAuditLogEntry {
            id: AuditLogId::from_uuid(row.id),
            tenant_id: tenant(row.tenant_id)?,
            action: row.action,
            user_id: user(row.user_id)?,
            details: row.details,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            created_at: row.created_at,
        })
    }
}
