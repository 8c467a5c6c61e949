use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, StatementError};
use crate::types::PeriodTag;

/// due day used when an account has none configured
const DEFAULT_DUE_DAY: u32 = 25;

/// resolved boundaries of one billing cycle
///
/// Computed from account configuration plus a period tag or reference
/// date; never persisted. The charge/payment window for the cycle is the
/// half-open `[previous_statement_date, statement_date)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingCycle {
    pub previous_statement_date: NaiveDate,
    pub statement_date: NaiveDate,
    pub next_statement_date: NaiveDate,
    pub due_date: NaiveDate,
    pub period_days: i64,
}

impl BillingCycle {
    /// resolve the cycle whose statement falls in the tagged month
    ///
    /// The statement date is the cutoff day clamped to the month's length
    /// (cutoff 31 in february lands on the 28th or 29th); no cutoff day
    /// means the last calendar day of the month.
    pub fn for_period(
        cut_off_day: Option<u32>,
        due_day: Option<u32>,
        tag: PeriodTag,
    ) -> Result<Self> {
        validate_cycle_days(cut_off_day, due_day)?;
        Ok(Self::build(cut_off_day, due_day, tag.year, tag.month))
    }

    /// resolve the most recent cycle cut on or before the reference date
    ///
    /// A reference day-of-month earlier than the cutoff falls back to the
    /// previous month's cutoff occurrence.
    pub fn as_of(
        cut_off_day: Option<u32>,
        due_day: Option<u32>,
        reference: NaiveDate,
    ) -> Result<Self> {
        validate_cycle_days(cut_off_day, due_day)?;

        let (mut year, mut month) = (reference.year(), reference.month());
        if statement_day_in(cut_off_day, year, month) > reference {
            (year, month) = previous_month(year, month);
        }
        Ok(Self::build(cut_off_day, due_day, year, month))
    }

    /// the half-open `[from, to)` event window for this cycle
    pub fn window(&self) -> (NaiveDate, NaiveDate) {
        (self.previous_statement_date, self.statement_date)
    }

    fn build(cut_off_day: Option<u32>, due_day: Option<u32>, year: i32, month: u32) -> Self {
        let statement_date = statement_day_in(cut_off_day, year, month);

        let (py, pm) = previous_month(year, month);
        let previous_statement_date = statement_day_in(cut_off_day, py, pm);

        let (ny, nm) = next_month(year, month);
        let next_statement_date = statement_day_in(cut_off_day, ny, nm);

        // due occurrence anchored on or after the statement date
        let due = due_day.unwrap_or(DEFAULT_DUE_DAY);
        let mut due_date = clamp_to_month(year, month, due);
        if due_date < statement_date {
            due_date = clamp_to_month(ny, nm, due);
        }

        let period_days = (statement_date - previous_statement_date).num_days();

        Self {
            previous_statement_date,
            statement_date,
            next_statement_date,
            due_date,
            period_days,
        }
    }
}

fn validate_cycle_days(cut_off_day: Option<u32>, due_day: Option<u32>) -> Result<()> {
    if let Some(day) = cut_off_day {
        if !(1..=31).contains(&day) {
            return Err(StatementError::InvalidCycleDay { field: "cutoff", day });
        }
    }
    if let Some(day) = due_day {
        if !(1..=31).contains(&day) {
            return Err(StatementError::InvalidCycleDay { field: "due", day });
        }
    }
    Ok(())
}

/// the cutoff occurrence inside one month, clamped to the month's length
fn statement_day_in(cut_off_day: Option<u32>, year: i32, month: u32) -> NaiveDate {
    match cut_off_day {
        Some(day) => clamp_to_month(year, month, day),
        None => last_day_of_month(year, month),
    }
}

fn clamp_to_month(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_else(|| last_day_of_month(year, month))
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (ny, nm) = next_month(year, month);
    // month is validated to 1..=12 before this is reached
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(NaiveDate::MIN)
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}
