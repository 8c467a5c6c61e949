pub mod account;
pub mod cycle;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod interest;
pub mod ledger;
pub mod statement;
pub mod types;

// re-export key types
pub use account::Account;
pub use cycle::BillingCycle;
pub use decimal::{Money, Rate};
pub use engine::{
    AccountReader, CycleRef, LedgerReader, SkipReason, StatementEngine, StatementOutcome,
    StatementStore,
};
pub use errors::{Result, StatementError};
pub use interest::{accrue_balance_days, BalanceDays, InterestComponents};
pub use ledger::{sum_payments, window_events, LedgerEvent};
pub use statement::{assemble, carry_over_shortfall, StatementInputs, StatementRecord};
pub use types::{AccountId, EventKind, PeriodTag};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
