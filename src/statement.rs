use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cycle::BillingCycle;
use crate::decimal::{Money, Rate};
use crate::interest::InterestComponents;
use crate::ledger::LedgerEvent;
use crate::types::{AccountId, EventKind};

/// the persisted output of one billing cycle
///
/// Identity key is `(account_id, statement_date)`; at most one record
/// exists per key unless an explicit recompute overwrites it. All
/// currency fields hold cent-finalized values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRecord {
    pub account_id: AccountId,
    pub statement_date: NaiveDate,
    pub due_date: NaiveDate,
    pub previous_balance: Money,
    pub charges: Money,
    /// carried interest plus any carry-over from unpaid prior forgivable interest
    pub interests: Money,
    pub payments: Money,
    /// max(0, previous + charges + interests - payments)
    pub statement_balance: Money,
    /// interest on this cycle's charges, waived if paid in full by the due date
    pub forgivable_interest: Money,
    /// statement balance plus forgivable interest: exposure if grace is not earned
    pub installment_balance: Money,
    pub annual_rate: Rate,
    pub period_days: i64,
    /// payments observed between this statement date and its due date at
    /// computation time; informational, refreshed by recompute
    pub payments_in_due_window: Money,
}

impl StatementRecord {
    pub fn key(&self) -> (AccountId, NaiveDate) {
        (self.account_id, self.statement_date)
    }

    /// get json representation of the record
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("JSON error: {}", e))
    }
}

/// explicit inputs for one statement assembly; the assembler does no I/O
#[derive(Debug, Clone)]
pub struct StatementInputs<'a> {
    pub account_id: AccountId,
    pub cycle: BillingCycle,
    pub annual_rate: Rate,
    /// prior record's statement balance, or the account's live balance for
    /// a first-ever statement
    pub previous_balance: Money,
    pub window_events: &'a [LedgerEvent],
    pub interest: InterestComponents,
    /// unpaid forgivable interest carried in from the prior cycle
    pub carry_over: Money,
    pub payments_in_due_window: Money,
}

/// unpaid prior forgivable interest that becomes unconditional this cycle
///
/// Grace is earned only by paying the full forgivable amount inside the
/// prior due window; any shortfall carries over.
pub fn carry_over_shortfall(prior_forgivable: Money, paid_in_due_window: Money) -> Money {
    (prior_forgivable - paid_in_due_window).max(Money::ZERO).finalize()
}

/// combine cycle, window aggregates, and interest components into one
/// immutable record, finalizing every currency field to cents
pub fn assemble(inputs: StatementInputs<'_>) -> StatementRecord {
    let previous_balance = inputs.previous_balance.finalize();
    let charges = sum_by_kind(inputs.window_events, EventKind::Charge).finalize();
    let payments = sum_by_kind(inputs.window_events, EventKind::Payment).finalize();

    let interests = (inputs.interest.on_carried + inputs.carry_over).finalize();
    let forgivable_interest = inputs.interest.on_new.finalize();

    let statement_balance = (previous_balance + charges + interests - payments)
        .max(Money::ZERO)
        .finalize();
    let installment_balance = (statement_balance + forgivable_interest).finalize();

    StatementRecord {
        account_id: inputs.account_id,
        statement_date: inputs.cycle.statement_date,
        due_date: inputs.cycle.due_date,
        previous_balance,
        charges,
        interests,
        payments,
        statement_balance,
        forgivable_interest,
        installment_balance,
        annual_rate: inputs.annual_rate,
        period_days: inputs.cycle.period_days,
        payments_in_due_window: inputs.payments_in_due_window.finalize(),
    }
}

fn sum_by_kind(events: &[LedgerEvent], kind: EventKind) -> Money {
    events
        .iter()
        .filter(|e| e.kind == kind)
        .fold(Money::ZERO, |acc, e| acc + e.amount)
}
