use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use edufin_core::{
    AccountId, Amount, DomainError, DomainResult, JournalEntryId, JournalId, Record,
    TenantField, TenantId, checked_sum,
};

/// High-level account type (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        }
    }
}

impl core::str::FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "revenue" => Ok(AccountType::Revenue),
            "expense" => Ok(AccountType::Expense),
            _ => Err(DomainError::validation(
                "type must be one of: asset, liability, equity, revenue, expense",
            )),
        }
    }
}

/// Input for opening an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub code: String, // e.g. "1000"
    pub name: String, // e.g. "Cash"
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub category: String, // e.g. "tuition"
}

/// Chart-of-accounts entry. Identity is immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub tenant_id: Option<TenantId>,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub category: String,
}

impl Account {
    /// Build an untagged account; the tenancy guard tags it on insert.
    pub fn open(input: NewAccount) -> DomainResult<Self> {
        if input.code.trim().is_empty() {
            return Err(DomainError::validation("account code must not be blank"));
        }
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("account name must not be blank"));
        }

        Ok(Self {
            id: AccountId::new(),
            tenant_id: None,
            code: input.code.trim().to_string(),
            name: input.name.trim().to_string(),
            account_type: input.account_type,
            category: input.category,
        })
    }
}

impl Record for Account {
    const KIND: &'static str = "account";

    fn tenant_field(&mut self) -> TenantField<'_> {
        TenantField::Present(&mut self.tenant_id)
    }
}

/// One requested line of a journal draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftLine {
    pub account_id: AccountId,
    #[serde(default)]
    pub debit: Amount,
    #[serde(default)]
    pub credit: Amount,
}

/// Command: post a journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalDraft {
    pub date: NaiveDate,
    pub reference: String,
    #[serde(default)]
    pub memo: Option<String>,
    pub entries: Vec<DraftLine>,
}

impl JournalDraft {
    /// `(Σ debit, Σ credit)` over the draft lines.
    pub fn totals(&self) -> DomainResult<(Decimal, Decimal)> {
        let debits = checked_sum(self.entries.iter().map(|l| l.debit))
            .ok_or_else(|| DomainError::validation("journal debit total overflows"))?;
        let credits = checked_sum(self.entries.iter().map(|l| l.credit))
            .ok_or_else(|| DomainError::validation("journal credit total overflows"))?;
        Ok((debits, credits))
    }

    /// Debits must equal credits, exactly.
    pub fn ensure_balanced(&self) -> DomainResult<()> {
        let (debits, credits) = self.totals()?;
        if debits != credits {
            return Err(DomainError::UnbalancedJournal { debits, credits });
        }
        Ok(())
    }

    /// Turn a balanced draft into an untagged journal header plus its lines,
    /// with generated ids.
    pub fn into_journal(self) -> DomainResult<(Journal, Vec<JournalEntry>)> {
        self.ensure_balanced()?;

        let journal = Journal {
            id: JournalId::new(),
            tenant_id: None,
            date: self.date,
            reference: self.reference,
            memo: self.memo,
        };

        let entries = self
            .entries
            .into_iter()
            .map(|line| JournalEntry {
                id: JournalEntryId::new(),
                journal_id: journal.id,
                account_id: line.account_id,
                debit: line.debit,
                credit: line.credit,
            })
            .collect();

        Ok((journal, entries))
    }
}

/// Journal header row. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journal {
    pub id: JournalId,
    pub tenant_id: Option<TenantId>,
    pub date: NaiveDate,
    pub reference: String,
    pub memo: Option<String>,
}

impl Record for Journal {
    const KIND: &'static str = "journal";

    fn tenant_field(&mut self) -> TenantField<'_> {
        TenantField::Present(&mut self.tenant_id)
    }
}

/// One line of a journal, owned exclusively by it.
///
/// Lines carry no tenant column; they inherit the tenant of their journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub journal_id: JournalId,
    pub account_id: AccountId,
    pub debit: Amount,
    pub credit: Amount,
}

impl Record for JournalEntry {
    const KIND: &'static str = "journal_entry";
}

/// A persisted journal together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedJournal {
    #[serde(flatten)]
    pub journal: Journal,
    pub entries: Vec<JournalEntry>,
}

/// Signed balance of `account_id` over `entries` (debit-positive),
/// normalized so `500.00` and `500.0000` both read `500`.
pub fn account_balance<'a>(
    account_id: AccountId,
    entries: impl IntoIterator<Item = &'a JournalEntry>,
) -> Decimal {
    entries
        .into_iter()
        .filter(|e| e.account_id == account_id)
        .fold(Decimal::ZERO, |acc, e| acc + e.debit.value() - e.credit.value())
        .normalize()
}
