use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;

use crate::account::Account;
use crate::cycle::BillingCycle;
use crate::decimal::Money;
use crate::errors::Result;
use crate::interest::accrue_balance_days;
use crate::ledger::{window_events, LedgerEvent};
use crate::statement::{assemble, carry_over_shortfall, StatementInputs, StatementRecord};
use crate::types::{AccountId, PeriodTag};

/// read access to the account registry
pub trait AccountReader {
    fn account(&self, id: AccountId) -> Result<Option<Account>>;
}

/// read access to the ledger
pub trait LedgerReader {
    /// events for one account in the half-open date window `[from, to)`
    fn events(&self, account_id: AccountId, from: NaiveDate, to: NaiveDate)
        -> Result<Vec<LedgerEvent>>;

    /// sum of payments in the closed date window `[from, to]`
    fn sum_payments(&self, account_id: AccountId, from: NaiveDate, to: NaiveDate)
        -> Result<Money>;
}

/// persistence for statement records, keyed by (account, statement date)
///
/// `put` with `overwrite = false` must insert-if-absent and fail with
/// `StatementError::StoreConflict` when it loses a race for the key;
/// with `overwrite = true` it is last-writer-wins.
pub trait StatementStore {
    fn find(&self, account_id: AccountId, statement_date: NaiveDate)
        -> Result<Option<StatementRecord>>;

    fn put(&self, record: StatementRecord, overwrite: bool) -> Result<()>;
}

impl<T: AccountReader + ?Sized> AccountReader for &T {
    fn account(&self, id: AccountId) -> Result<Option<Account>> {
        (**self).account(id)
    }
}

impl<T: LedgerReader + ?Sized> LedgerReader for &T {
    fn events(
        &self,
        account_id: AccountId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LedgerEvent>> {
        (**self).events(account_id, from, to)
    }

    fn sum_payments(
        &self,
        account_id: AccountId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Money> {
        (**self).sum_payments(account_id, from, to)
    }
}

impl<T: StatementStore + ?Sized> StatementStore for &T {
    fn find(
        &self,
        account_id: AccountId,
        statement_date: NaiveDate,
    ) -> Result<Option<StatementRecord>> {
        (**self).find(account_id, statement_date)
    }

    fn put(&self, record: StatementRecord, overwrite: bool) -> Result<()> {
        (**self).put(record, overwrite)
    }
}

/// which cycle to compute: an explicit period tag or an as-of date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleRef {
    Period(PeriodTag),
    AsOf(NaiveDate),
}

impl CycleRef {
    /// the cycle containing the time provider's current date
    pub fn today(time: &SafeTimeProvider) -> Self {
        CycleRef::AsOf(time.now().date_naive())
    }

    fn resolve(&self, account: &Account) -> Result<BillingCycle> {
        match *self {
            CycleRef::Period(tag) => {
                BillingCycle::for_period(account.cut_off_day, account.due_day, tag)
            }
            CycleRef::AsOf(reference) => {
                BillingCycle::as_of(account.cut_off_day, account.due_day, reference)
            }
        }
    }
}

/// result of one statement computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementOutcome {
    /// freshly computed and, unless previewing, written
    Computed(StatementRecord),
    /// already billed this cycle; returned unchanged, no recomputation
    Existing(StatementRecord),
    /// nothing to bill for this account
    Skipped(SkipReason),
}

impl StatementOutcome {
    pub fn record(&self) -> Option<&StatementRecord> {
        match self {
            StatementOutcome::Computed(r) | StatementOutcome::Existing(r) => Some(r),
            StatementOutcome::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AccountNotFound,
    AccountInactive,
}

/// idempotent statement engine over the three collaborator traits
///
/// Pure synchronous computation over immutable snapshots; two accounts
/// may be computed in parallel with no coordination. Same-key races are
/// resolved by the store's `put` contract, not serialized here.
pub struct StatementEngine<A, L, S> {
    accounts: A,
    ledger: L,
    store: S,
}

impl<A, L, S> StatementEngine<A, L, S>
where
    A: AccountReader,
    L: LedgerReader,
    S: StatementStore,
{
    pub fn new(accounts: A, ledger: L, store: S) -> Self {
        Self { accounts, ledger, store }
    }

    /// compute the statement for one account and cycle
    ///
    /// State machine per (account, statement date) key:
    /// - missing or inactive account: `Skipped`, nothing touched
    /// - no record yet: compute, insert-if-absent, `Computed`
    /// - record exists, `recompute` false: `Existing`, no write
    /// - record exists, `recompute` true: full recompute, overwrite in place
    pub fn compute(
        &self,
        account_id: AccountId,
        cycle_ref: CycleRef,
        recompute: bool,
    ) -> Result<StatementOutcome> {
        let Some(account) = self.accounts.account(account_id)? else {
            return Ok(StatementOutcome::Skipped(SkipReason::AccountNotFound));
        };
        if !account.active {
            return Ok(StatementOutcome::Skipped(SkipReason::AccountInactive));
        }
        account.validate()?;

        let cycle = cycle_ref.resolve(&account)?;

        if let Some(existing) = self.store.find(account_id, cycle.statement_date)? {
            if !recompute {
                return Ok(StatementOutcome::Existing(existing));
            }
            let record = self.build(&account, &cycle)?;
            self.store.put(record.clone(), true)?;
            return Ok(StatementOutcome::Computed(record));
        }

        let record = self.build(&account, &cycle)?;
        self.store.put(record.clone(), false)?;
        Ok(StatementOutcome::Computed(record))
    }

    /// compute without persisting anything
    pub fn preview(&self, account_id: AccountId, cycle_ref: CycleRef) -> Result<StatementOutcome> {
        let Some(account) = self.accounts.account(account_id)? else {
            return Ok(StatementOutcome::Skipped(SkipReason::AccountNotFound));
        };
        if !account.active {
            return Ok(StatementOutcome::Skipped(SkipReason::AccountInactive));
        }
        account.validate()?;

        let cycle = cycle_ref.resolve(&account)?;
        let record = self.build(&account, &cycle)?;
        Ok(StatementOutcome::Computed(record))
    }

    /// derive one record from the ledger and at most one prior record
    ///
    /// Reproducible from its reads alone: no running counters, no state
    /// kept between invocations.
    fn build(&self, account: &Account, cycle: &BillingCycle) -> Result<StatementRecord> {
        let (from, to) = cycle.window();
        let raw = self.ledger.events(account.id, from, to)?;
        let window = window_events(&raw, account.id, from, to);

        // one hop back, never a chain: the prior record already encodes
        // its own previous balance
        let prior = self.store.find(account.id, cycle.previous_statement_date)?;

        let previous_balance = match &prior {
            Some(p) => p.statement_balance,
            None => account.balance,
        };

        // grace check: payments strictly after the prior cutoff through
        // its due date, against the prior forgivable interest
        let carry_over = match &prior {
            Some(p) => {
                let paid = self.ledger.sum_payments(
                    account.id,
                    day_after(p.statement_date),
                    p.due_date,
                )?;
                carry_over_shortfall(p.forgivable_interest, paid)
            }
            None => Money::ZERO,
        };

        let days = accrue_balance_days(from, to, previous_balance, &window);
        let interest = days.interest(account.rate());

        let payments_in_due_window = self.ledger.sum_payments(
            account.id,
            day_after(cycle.statement_date),
            cycle.due_date,
        )?;

        Ok(assemble(StatementInputs {
            account_id: account.id,
            cycle: *cycle,
            annual_rate: account.rate(),
            previous_balance,
            window_events: &window,
            interest,
            carry_over,
            payments_in_due_window,
        }))
    }
}

fn day_after(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Rate;
    use crate::errors::StatementError;
    use crate::ledger;
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn money(s: &str) -> Money {
        Money::from_str_exact(s).unwrap()
    }

    fn period(s: &str) -> CycleRef {
        CycleRef::Period(s.parse().unwrap())
    }

    struct MemoryAccounts(HashMap<AccountId, Account>);

    impl MemoryAccounts {
        fn single(account: Account) -> Self {
            let mut map = HashMap::new();
            map.insert(account.id, account);
            Self(map)
        }
    }

    impl AccountReader for MemoryAccounts {
        fn account(&self, id: AccountId) -> Result<Option<Account>> {
            Ok(self.0.get(&id).cloned())
        }
    }

    struct MemoryLedger(RefCell<Vec<LedgerEvent>>);

    impl MemoryLedger {
        fn new(events: Vec<LedgerEvent>) -> Self {
            Self(RefCell::new(events))
        }

        fn push(&self, event: LedgerEvent) {
            self.0.borrow_mut().push(event);
        }
    }

    impl LedgerReader for MemoryLedger {
        fn events(
            &self,
            account_id: AccountId,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Vec<LedgerEvent>> {
            Ok(ledger::window_events(&self.0.borrow(), account_id, from, to))
        }

        fn sum_payments(
            &self,
            account_id: AccountId,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Money> {
            Ok(ledger::sum_payments(&self.0.borrow(), account_id, from, to))
        }
    }

    struct MemoryStore {
        records: RefCell<HashMap<(AccountId, NaiveDate), StatementRecord>>,
        writes: Cell<usize>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self { records: RefCell::new(HashMap::new()), writes: Cell::new(0) }
        }

        fn seed(&self, record: StatementRecord) {
            self.records.borrow_mut().insert(record.key(), record);
        }

        fn len(&self) -> usize {
            self.records.borrow().len()
        }
    }

    impl StatementStore for MemoryStore {
        fn find(
            &self,
            account_id: AccountId,
            statement_date: NaiveDate,
        ) -> Result<Option<StatementRecord>> {
            Ok(self.records.borrow().get(&(account_id, statement_date)).cloned())
        }

        fn put(&self, record: StatementRecord, overwrite: bool) -> Result<()> {
            let key = record.key();
            let mut records = self.records.borrow_mut();
            if !overwrite && records.contains_key(&key) {
                return Err(StatementError::StoreConflict {
                    account_id: key.0,
                    statement_date: key.1,
                });
            }
            records.insert(key, record);
            self.writes.set(self.writes.get() + 1);
            Ok(())
        }
    }

    /// store that claims absence but refuses the insert, as a concurrent
    /// writer winning the race would make it do
    struct RacyStore;

    impl StatementStore for RacyStore {
        fn find(&self, _: AccountId, _: NaiveDate) -> Result<Option<StatementRecord>> {
            Ok(None)
        }

        fn put(&self, record: StatementRecord, _overwrite: bool) -> Result<()> {
            Err(StatementError::StoreConflict {
                account_id: record.account_id,
                statement_date: record.statement_date,
            })
        }
    }

    fn account() -> Account {
        Account {
            id: Uuid::new_v4(),
            credit_limit: Money::from_major(5_000),
            balance: Money::from_major(1_000),
            due_day: Some(5),
            cut_off_day: Some(20),
            annual_rate: Some(Rate::from_percentage(dec!(36))),
            active: true,
        }
    }

    fn cycle_events(id: AccountId) -> Vec<LedgerEvent> {
        vec![
            LedgerEvent::charge(id, date(2024, 1, 25), Money::from_major(200)),
            LedgerEvent::payment(id, date(2024, 1, 30), Money::from_major(300)),
        ]
    }

    #[test]
    fn test_end_to_end_statement() {
        let account = account();
        let id = account.id;
        let accounts = MemoryAccounts::single(account);
        let ledger = MemoryLedger::new(cycle_events(id));
        let store = MemoryStore::new();
        let engine = StatementEngine::new(&accounts, &ledger, &store);

        let outcome = engine.compute(id, period("2024-02"), false).unwrap();
        let record = match outcome {
            StatementOutcome::Computed(r) => r,
            other => panic!("expected Computed, got {other:?}"),
        };

        // window jan 20 -> feb 20: carried 1000 for 10 days then 700 for
        // 21, new 200 from day 5 through the cutoff
        assert_eq!(record.previous_balance, money("1000.00"));
        assert_eq!(record.charges, money("200.00"));
        assert_eq!(record.payments, money("300.00"));
        assert_eq!(record.interests, money("24.36"));
        assert_eq!(record.forgivable_interest, money("5.13"));
        assert_eq!(record.statement_balance, money("924.36"));
        assert_eq!(record.installment_balance, money("929.49"));
        assert_eq!(record.statement_date, date(2024, 2, 20));
        assert_eq!(record.due_date, date(2024, 3, 5));
        assert_eq!(record.period_days, 31);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_determinism() {
        let account = account();
        let id = account.id;
        let accounts = MemoryAccounts::single(account);
        let ledger = MemoryLedger::new(cycle_events(id));
        let store = MemoryStore::new();
        let engine = StatementEngine::new(&accounts, &ledger, &store);

        let first = engine.preview(id, period("2024-02")).unwrap();
        let second = engine.preview(id, period("2024-02")).unwrap();

        let (first, second) = (first.record().unwrap(), second.record().unwrap());
        assert_eq!(first, second);
        assert_eq!(first.to_json_pretty(), second.to_json_pretty());
    }

    #[test]
    fn test_idempotent_compute_writes_once() {
        let account = account();
        let id = account.id;
        let accounts = MemoryAccounts::single(account);
        let ledger = MemoryLedger::new(cycle_events(id));
        let store = MemoryStore::new();
        let engine = StatementEngine::new(&accounts, &ledger, &store);

        let first = engine.compute(id, period("2024-02"), false).unwrap();
        let second = engine.compute(id, period("2024-02"), false).unwrap();

        let first_record = match first {
            StatementOutcome::Computed(r) => r,
            other => panic!("expected Computed, got {other:?}"),
        };
        let second_record = match second {
            StatementOutcome::Existing(r) => r,
            other => panic!("expected Existing, got {other:?}"),
        };
        assert_eq!(first_record, second_record);
        assert_eq!(store.writes.get(), 1);
    }

    #[test]
    fn test_recompute_overwrites_in_place() {
        let account = account();
        let id = account.id;
        let accounts = MemoryAccounts::single(account);
        let ledger = MemoryLedger::new(cycle_events(id));
        let store = MemoryStore::new();
        let engine = StatementEngine::new(&accounts, &ledger, &store);

        engine.compute(id, period("2024-02"), false).unwrap();

        // a late-posted charge lands in the closed window
        ledger.push(LedgerEvent::charge(id, date(2024, 2, 10), Money::from_major(50)));

        let outcome = engine.compute(id, period("2024-02"), true).unwrap();
        let record = match outcome {
            StatementOutcome::Computed(r) => r,
            other => panic!("expected Computed, got {other:?}"),
        };

        assert_eq!(record.charges, money("250.00"));
        assert_eq!(store.len(), 1);

        // steady state returns the overwritten record
        let cached = engine.compute(id, period("2024-02"), false).unwrap();
        assert_eq!(cached.record().unwrap().charges, money("250.00"));
    }

    #[test]
    fn test_previous_balance_from_prior_record() {
        let account = account();
        let id = account.id;
        let accounts = MemoryAccounts::single(account);
        let ledger = MemoryLedger::new(vec![]);
        let store = MemoryStore::new();
        let engine = StatementEngine::new(&accounts, &ledger, &store);

        let january = engine.compute(id, period("2024-01"), false).unwrap();
        let january_balance = january.record().unwrap().statement_balance;

        let february = engine.compute(id, period("2024-02"), false).unwrap();
        // prior record wins over the account's live balance field
        assert_eq!(february.record().unwrap().previous_balance, january_balance);
    }

    #[test]
    fn test_carry_over_activation() {
        let mut account = account();
        account.due_day = Some(15);
        account.balance = Money::ZERO;
        account.annual_rate = None;
        let id = account.id;

        let accounts = MemoryAccounts::single(account);
        let ledger = MemoryLedger::new(vec![
            // partial payment of the prior forgivable 10.00, inside its due window
            LedgerEvent::payment(id, date(2024, 2, 10), Money::from_major(6)),
        ]);
        let store = MemoryStore::new();

        let prior_cycle =
            BillingCycle::for_period(Some(20), Some(15), "2024-01".parse().unwrap()).unwrap();
        store.seed(StatementRecord {
            account_id: id,
            statement_date: prior_cycle.statement_date,
            due_date: prior_cycle.due_date, // 2024-02-15
            previous_balance: Money::ZERO,
            charges: money("500.00"),
            interests: Money::ZERO,
            payments: money("500.00"),
            statement_balance: Money::ZERO,
            forgivable_interest: money("10.00"),
            installment_balance: money("10.00"),
            annual_rate: Rate::ZERO,
            period_days: prior_cycle.period_days,
            payments_in_due_window: Money::ZERO,
        });

        let engine = StatementEngine::new(&accounts, &ledger, &store);
        let outcome = engine.compute(id, period("2024-02"), false).unwrap();
        let record = outcome.record().unwrap().clone();

        // shortfall of 4.00 becomes unconditional interest this cycle
        assert_eq!(record.interests, money("4.00"));
        assert_eq!(record.payments, money("6.00"));
        assert_eq!(record.statement_balance, Money::ZERO);
    }

    #[test]
    fn test_no_carry_over_when_paid_in_full() {
        let mut account = account();
        account.due_day = Some(15);
        account.balance = Money::ZERO;
        account.annual_rate = None;
        let id = account.id;

        let accounts = MemoryAccounts::single(account);
        let ledger = MemoryLedger::new(vec![
            LedgerEvent::payment(id, date(2024, 2, 10), Money::from_major(10)),
        ]);
        let store = MemoryStore::new();

        let prior_cycle =
            BillingCycle::for_period(Some(20), Some(15), "2024-01".parse().unwrap()).unwrap();
        store.seed(StatementRecord {
            account_id: id,
            statement_date: prior_cycle.statement_date,
            due_date: prior_cycle.due_date,
            previous_balance: Money::ZERO,
            charges: money("500.00"),
            interests: Money::ZERO,
            payments: money("500.00"),
            statement_balance: Money::ZERO,
            forgivable_interest: money("10.00"),
            installment_balance: money("10.00"),
            annual_rate: Rate::ZERO,
            period_days: prior_cycle.period_days,
            payments_in_due_window: Money::ZERO,
        });

        let engine = StatementEngine::new(&accounts, &ledger, &store);
        let outcome = engine.compute(id, period("2024-02"), false).unwrap();

        assert_eq!(outcome.record().unwrap().interests, Money::ZERO);
    }

    #[test]
    fn test_skips_missing_account() {
        let accounts = MemoryAccounts(HashMap::new());
        let ledger = MemoryLedger::new(vec![]);
        let store = MemoryStore::new();
        let engine = StatementEngine::new(&accounts, &ledger, &store);

        let outcome = engine.compute(Uuid::new_v4(), period("2024-02"), false).unwrap();
        assert_eq!(outcome, StatementOutcome::Skipped(SkipReason::AccountNotFound));
        assert_eq!(store.writes.get(), 0);
    }

    #[test]
    fn test_skips_inactive_account() {
        let mut account = account();
        account.active = false;
        let id = account.id;
        let accounts = MemoryAccounts::single(account);
        let ledger = MemoryLedger::new(cycle_events(id));
        let store = MemoryStore::new();
        let engine = StatementEngine::new(&accounts, &ledger, &store);

        let outcome = engine.compute(id, period("2024-02"), false).unwrap();
        assert_eq!(outcome, StatementOutcome::Skipped(SkipReason::AccountInactive));
        assert_eq!(store.writes.get(), 0);
    }

    #[test]
    fn test_preview_never_writes() {
        let account = account();
        let id = account.id;
        let accounts = MemoryAccounts::single(account);
        let ledger = MemoryLedger::new(cycle_events(id));
        let store = MemoryStore::new();
        let engine = StatementEngine::new(&accounts, &ledger, &store);

        let outcome = engine.preview(id, period("2024-02")).unwrap();
        assert!(matches!(outcome, StatementOutcome::Computed(_)));
        assert_eq!(store.writes.get(), 0);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_lost_insert_race_surfaces_conflict() {
        let account = account();
        let id = account.id;
        let accounts = MemoryAccounts::single(account);
        let ledger = MemoryLedger::new(cycle_events(id));
        let engine = StatementEngine::new(&accounts, &ledger, RacyStore);

        let result = engine.compute(id, period("2024-02"), false);
        assert!(matches!(result, Err(StatementError::StoreConflict { .. })));
    }

    #[test]
    fn test_invalid_period_tag() {
        assert!(matches!(
            "2024-13".parse::<PeriodTag>(),
            Err(StatementError::InvalidPeriod { .. })
        ));
    }

    #[test]
    fn test_invalid_account_configuration_propagates() {
        let mut account = account();
        account.cut_off_day = Some(40);
        let id = account.id;
        let accounts = MemoryAccounts::single(account);
        let ledger = MemoryLedger::new(vec![]);
        let store = MemoryStore::new();
        let engine = StatementEngine::new(&accounts, &ledger, &store);

        let result = engine.compute(id, period("2024-02"), false);
        assert!(matches!(result, Err(StatementError::InvalidCycleDay { .. })));
    }

    #[test]
    fn test_cycle_ref_today() {
        use chrono::TimeZone;

        let account = account();
        let id = account.id;
        let accounts = MemoryAccounts::single(account);
        let ledger = MemoryLedger::new(cycle_events(id));
        let store = MemoryStore::new();
        let engine = StatementEngine::new(&accounts, &ledger, &store);

        let time = SafeTimeProvider::new(TimeSource::Test(
            chrono::Utc.with_ymd_and_hms(2024, 2, 25, 12, 0, 0).unwrap(),
        ));

        let outcome = engine.compute(id, CycleRef::today(&time), false).unwrap();
        // feb 25 is past the feb 20 cutoff, so that cycle is the one billed
        assert_eq!(outcome.record().unwrap().statement_date, date(2024, 2, 20));
    }
}
