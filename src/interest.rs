use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::decimal::{Money, Rate};
use crate::ledger::LedgerEvent;
use crate::types::EventKind;

/// day-weighted balance sums for one cycle, split into two tracks
///
/// `carried` weights the balance inherited from the prior statement;
/// `new` weights charges incurred during the current cycle. Keeping the
/// tracks apart is what lets interest on new purchases stay forgivable
/// while interest on an inherited balance accrues unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BalanceDays {
    pub carried: Decimal,
    pub new: Decimal,
}

impl BalanceDays {
    /// convert day-weighted sums into interest at annual_rate / 365,
    /// each component rounded to cents at output
    pub fn interest(&self, annual_rate: Rate) -> InterestComponents {
        let daily = annual_rate.daily_rate().as_decimal();
        InterestComponents {
            on_carried: Money::from_decimal(self.carried * daily).finalize(),
            on_new: Money::from_decimal(self.new * daily).finalize(),
        }
    }
}

/// interest split produced by the daily-balance walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestComponents {
    /// interest on the inherited balance; always charged
    pub on_carried: Money,
    /// interest on this cycle's charges; waived if paid in full by the due date
    pub on_new: Money,
}

/// walk ordered window events segment by segment, accumulating
/// day-weighted sums for the carried and new balance tracks
///
/// Events must be the output of [`crate::ledger::window_events`] for the
/// same `[from, to)` window: date-ascending, payments before charges on
/// ties. A payment drains the carried balance first and only its
/// remainder touches the new balance; neither track goes below zero.
pub fn accrue_balance_days(
    from: NaiveDate,
    to: NaiveDate,
    previous_balance: Money,
    events: &[LedgerEvent],
) -> BalanceDays {
    let mut carried = previous_balance.max(Money::ZERO);
    let mut new = Money::ZERO;
    let mut cursor = from;
    let mut days = BalanceDays::default();

    for event in events {
        accrue_segment(&mut days, carried, new, cursor, event.date);
        cursor = event.date;

        match event.kind {
            EventKind::Payment => {
                let applied = event.amount.min(carried);
                carried -= applied;
                new = (new - (event.amount - applied)).max(Money::ZERO);
            }
            EventKind::Charge => {
                new += event.amount;
            }
        }
    }

    accrue_segment(&mut days, carried, new, cursor, to);
    days
}

fn accrue_segment(
    days: &mut BalanceDays,
    carried: Money,
    new: Money,
    from: NaiveDate,
    to: NaiveDate,
) {
    let span = Decimal::from((to - from).num_days().max(0));
    days.carried += carried.as_decimal() * span;
    days.new += new.as_decimal() * span;
}
