use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{AccountId, EventKind};

/// one charge or payment against an account
///
/// Events are immutable facts; the engine only reads date-bounded,
/// account-filtered slices of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub account_id: AccountId,
    pub date: NaiveDate,
    pub kind: EventKind,
    pub amount: Money,
}

impl LedgerEvent {
    pub fn charge(account_id: AccountId, date: NaiveDate, amount: Money) -> Self {
        Self { account_id, date, kind: EventKind::Charge, amount }
    }

    pub fn payment(account_id: AccountId, date: NaiveDate, amount: Money) -> Self {
        Self { account_id, date, kind: EventKind::Payment, amount }
    }
}

/// project one account's events into the half-open window `[from, to)`,
/// ordered by date with payments before charges on the same date
///
/// The payment-first tie-break favors the account holder: a same-day
/// payment reduces the running balance before the charge lands on it.
/// Non-positive amounts are dropped (excluded upstream, filtered again
/// here so the walk never sees them).
pub fn window_events(
    events: &[LedgerEvent],
    account_id: AccountId,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<LedgerEvent> {
    let mut selected: Vec<LedgerEvent> = events
        .iter()
        .filter(|e| e.account_id == account_id)
        .filter(|e| e.amount.is_positive())
        .filter(|e| e.date >= from && e.date < to)
        .copied()
        .collect();

    selected.sort_by_key(|e| (e.date, tie_break(e.kind)));
    selected
}

fn tie_break(kind: EventKind) -> u8 {
    match kind {
        EventKind::Payment => 0,
        EventKind::Charge => 1,
    }
}

/// sum of payment events inside the closed window `[from, to]`
///
/// Used for the carry-over check against a prior statement's due window.
pub fn sum_payments(
    events: &[LedgerEvent],
    account_id: AccountId,
    from: NaiveDate,
    to: NaiveDate,
) -> Money {
    events
        .iter()
        .filter(|e| e.account_id == account_id && e.kind == EventKind::Payment)
        .filter(|e| e.amount.is_positive())
        .filter(|e| e.date >= from && e.date <= to)
        .fold(Money::ZERO, |acc, e| acc + e.amount)
}
