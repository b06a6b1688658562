//! Payroll deduction calculators, keyed by jurisdiction code.
//!
//! Each jurisdiction is a pure function from gross pay to a list of named
//! deductions. The registry is flat: no calculator hierarchy, no shared state.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use edufin_core::Amount;

/// One named deduction from gross pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
    pub name: String,
    pub amount: Amount,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayrollError {
    #[error("no deduction calculator registered for jurisdiction '{0}'")]
    UnknownJurisdiction(String),
}

type Calculator = Arc<dyn Fn(Amount) -> Vec<Deduction> + Send + Sync>;

/// Marginal bracket: `rate` applies to the part of gross pay above `from`
/// (up to the next bracket's `from`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxBracket {
    pub from: Decimal,
    pub rate: Decimal,
}

#[derive(Clone, Default)]
pub struct DeductionRegistry {
    calculators: HashMap<String, Calculator>,
}

impl core::fmt::Debug for DeductionRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut codes: Vec<_> = self.calculators.keys().collect();
        codes.sort();
        f.debug_struct("DeductionRegistry").field("jurisdictions", &codes).finish()
    }
}

impl DeductionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the calculator for a jurisdiction code.
    pub fn register<F>(&mut self, jurisdiction: impl Into<String>, calculator: F) -> &mut Self
    where
        F: Fn(Amount) -> Vec<Deduction> + Send + Sync + 'static,
    {
        self.calculators
            .insert(jurisdiction.into().to_uppercase(), Arc::new(calculator));
        self
    }

    pub fn compute(&self, jurisdiction: &str, gross_pay: Amount) -> Result<Vec<Deduction>, PayrollError> {
        let calculator = self
            .calculators
            .get(&jurisdiction.to_uppercase())
            .ok_or_else(|| PayrollError::UnknownJurisdiction(jurisdiction.to_string()))?;
        Ok(calculator(gross_pay))
    }

    pub fn jurisdictions(&self) -> Vec<String> {
        let mut codes: Vec<_> = self.calculators.keys().cloned().collect();
        codes.sort();
        codes
    }
}

/// Single deduction at a flat `rate` of gross pay.
pub fn flat_rate(name: &'static str, rate: Decimal) -> impl Fn(Amount) -> Vec<Deduction> + Send + Sync {
    move |gross| vec![deduction(name, gross.value() * rate)]
}

/// Single deduction computed over marginal `brackets` (sorted by `from`).
pub fn progressive(
    name: &'static str,
    mut brackets: Vec<TaxBracket>,
) -> impl Fn(Amount) -> Vec<Deduction> + Send + Sync {
    brackets.sort_by(|a, b| a.from.cmp(&b.from));
    move |gross| {
        let gross = gross.value();
        let mut total = Decimal::ZERO;
        for (idx, bracket) in brackets.iter().enumerate() {
            if gross <= bracket.from {
                break;
            }
            let upper = brackets
                .get(idx + 1)
                .map(|next| next.from.min(gross))
                .unwrap_or(gross);
            total += (upper - bracket.from) * bracket.rate;
        }
        vec![deduction(name, total)]
    }
}

fn deduction(name: &str, value: Decimal) -> Deduction {
    let rounded = value
        .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
        .max(Decimal::ZERO);
    Deduction {
        name: name.to_string(),
        amount: Amount::new(rounded).unwrap_or(Amount::ZERO),
    }
}
