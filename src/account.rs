use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::errors::{Result, StatementError};
use crate::types::AccountId;

/// snapshot of one revolving credit line, read from the account registry
///
/// The engine only reads this; the registry owns it. The live `balance`
/// field is used as the previous balance for an account's first-ever
/// statement, which can drift from a full ledger replay if the ledger's
/// history predates the snapshot. That fallback is deliberate: the replay
/// would not be reproducible from the engine's declared inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub credit_limit: Money,
    /// current aggregate balance as the registry sees it
    pub balance: Money,
    /// day-of-month the statement balance must be paid by; defaults to 25
    pub due_day: Option<u32>,
    /// day-of-month that closes a cycle; absent means last calendar day
    pub cut_off_day: Option<u32>,
    /// already-annualized effective rate; absent means 0%
    pub annual_rate: Option<Rate>,
    pub active: bool,
}

impl Account {
    /// validate day-of-month configuration and the credit limit
    pub fn validate(&self) -> Result<()> {
        if let Some(day) = self.cut_off_day {
            if !(1..=31).contains(&day) {
                return Err(StatementError::InvalidCycleDay { field: "cutoff", day });
            }
        }
        if let Some(day) = self.due_day {
            if !(1..=31).contains(&day) {
                return Err(StatementError::InvalidCycleDay { field: "due", day });
            }
        }
        if self.credit_limit < Money::ZERO {
            return Err(StatementError::InvalidAmount { amount: self.credit_limit });
        }
        Ok(())
    }

    /// effective annual rate, treating an unset rate as 0%
    pub fn rate(&self) -> Rate {
        self.annual_rate.unwrap_or(Rate::ZERO)
    }
}
