use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::StatementError;

/// unique identifier for a revolving credit account
pub type AccountId = Uuid;

/// ledger event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Charge,
    Payment,
}

/// a billing period tag in "YYYY-MM" form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTag {
    pub year: i32,
    pub month: u32,
}

impl PeriodTag {
    pub fn new(year: i32, month: u32) -> Result<Self, StatementError> {
        if !(1..=12).contains(&month) || !(1..=9999).contains(&year) {
            return Err(StatementError::InvalidPeriod {
                tag: format!("{year:04}-{month:02}"),
            });
        }
        Ok(Self { year, month })
    }
}

impl FromStr for PeriodTag {
    type Err = StatementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StatementError::InvalidPeriod { tag: s.to_string() };

        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        PeriodTag::new(year, month).map_err(|_| invalid())
    }
}

impl fmt::Display for PeriodTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
