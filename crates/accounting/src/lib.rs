//! Accounting module (double-entry ledger + payroll deduction registry).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod ledger;
pub mod payroll;

pub use ledger::{
    Account, AccountType, DraftLine, Journal, JournalDraft, JournalEntry, NewAccount,
    PostedJournal, account_balance,
};
pub use payroll::{Deduction, DeductionRegistry, PayrollError, TaxBracket};
