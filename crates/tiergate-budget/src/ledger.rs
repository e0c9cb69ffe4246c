use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jiff::civil::Date;
use tiergate_config::BudgetConfig;
use tiergate_core::{StateStore, load_or_warn};

use crate::{BudgetError, BudgetStatus, CostRecord, Reservation};

/// Source of the current local date
pub type Clock = Arc<dyn Fn() -> Date + Send + Sync>;

/// Slack allowed when comparing float sums against the cap
const AFFORD_TOLERANCE: f64 = 1e-9;

/// Today's date in the system time zone
pub fn system_today() -> Date {
    jiff::Zoned::now().date()
}

struct LedgerState {
    record: CostRecord,
    /// Sum of outstanding reservations; never persisted
    pending: f64,
}

/// Daily spend ledger
///
/// Every public operation first checks for a day rollover, so the reset
/// happens exactly once and before anything reads or writes the counters.
/// Each mutation is written through to the store.
pub struct BudgetLedger {
    state: Mutex<LedgerState>,
    store: Arc<dyn StateStore<CostRecord>>,
    warning_ratio: f64,
    clock: Clock,
}

impl BudgetLedger {
    pub fn new(config: &BudgetConfig, store: Arc<dyn StateStore<CostRecord>>) -> Self {
        Self::with_clock(config, store, Arc::new(system_today))
    }

    /// Construct with an explicit date source
    ///
    /// A persisted record keeps its counters, but the configured cap always
    /// replaces the stored one.
    pub fn with_clock(config: &BudgetConfig, store: Arc<dyn StateStore<CostRecord>>, clock: Clock) -> Self {
        let record = match load_or_warn(store.as_ref(), "cost ledger") {
            Some(mut record) => {
                record.daily_budget = config.daily_budget;
                record
            }
            None => CostRecord::fresh(config.daily_budget, clock()),
        };

        tracing::debug!(
            daily_budget = record.daily_budget,
            spent = record.current_cost,
            last_reset = %record.last_reset,
            "budget ledger loaded"
        );

        Self {
            state: Mutex::new(LedgerState { record, pending: 0.0 }),
            store,
            warning_ratio: config.warning_ratio,
            clock,
        }
    }

    /// Whether `estimated` fits under the cap alongside spend and reservations
    pub fn can_afford(&self, estimated: f64) -> bool {
        let state = self.lock();
        fits(&state, estimated)
    }

    /// Record a completed call's cost and persist
    ///
    /// # Errors
    ///
    /// Returns [`BudgetError::InvalidAmount`] for negative or non-finite costs
    pub fn record_spend(&self, actual: f64) -> Result<(), BudgetError> {
        validate(actual)?;
        let mut state = self.lock();
        self.commit(&mut state, actual);
        Ok(())
    }

    /// Budget left after spend and outstanding reservations, never negative
    pub fn remaining_budget(&self) -> f64 {
        remaining(&self.lock())
    }

    /// Atomically check affordability and hold `estimated` until settled
    ///
    /// # Errors
    ///
    /// Returns [`BudgetError::Exceeded`] when the amount does not fit, or
    /// [`BudgetError::InvalidAmount`] for negative or non-finite estimates
    pub fn try_reserve(self: &Arc<Self>, estimated: f64) -> Result<Reservation, BudgetError> {
        validate(estimated)?;

        let mut state = self.lock();
        if !fits(&state, estimated) {
            return Err(BudgetError::Exceeded {
                requested: estimated,
                remaining: remaining(&state),
            });
        }
        state.pending += estimated;
        drop(state);

        tracing::trace!(amount = estimated, "budget reserved");

        Ok(Reservation::new(Arc::clone(self), estimated))
    }

    pub fn status(&self) -> BudgetStatus {
        let state = self.lock();
        let record = &state.record;

        BudgetStatus {
            daily_budget: record.daily_budget,
            spent: record.current_cost,
            pending: state.pending,
            remaining: remaining(&state),
            calls_made: record.calls_made,
            last_reset: record.last_reset,
            utilization: utilization(record),
        }
    }

    /// Snapshot of the persisted counters
    pub fn record(&self) -> CostRecord {
        self.lock().record.clone()
    }

    /// Release a reservation and optionally commit a spend in its place
    pub(crate) fn settle_reservation(&self, held: f64, actual: Option<f64>) {
        let mut state = self.lock();
        state.pending = (state.pending - held).max(0.0);

        if let Some(actual) = actual {
            self.commit(&mut state, actual);
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.roll_over(&mut state);
        state
    }

    fn roll_over(&self, state: &mut LedgerState) {
        let today = (self.clock)();
        if state.record.last_reset == today {
            return;
        }

        tracing::info!(
            previous = %state.record.last_reset,
            %today,
            spent = state.record.current_cost,
            calls = state.record.calls_made,
            "new day, resetting budget ledger"
        );

        state.record = CostRecord::fresh(state.record.daily_budget, today);
        self.persist(&state.record);
    }

    fn commit(&self, state: &mut LedgerState, actual: f64) {
        let before = utilization(&state.record);

        state.record.current_cost += actual;
        state.record.calls_made += 1;
        self.persist(&state.record);

        let after = utilization(&state.record);
        if before < self.warning_ratio && after >= self.warning_ratio {
            tracing::warn!(
                spent = state.record.current_cost,
                daily_budget = state.record.daily_budget,
                utilization = after,
                "budget warning threshold crossed"
            );
        }

        tracing::debug!(
            cost = actual,
            spent = state.record.current_cost,
            calls = state.record.calls_made,
            "spend recorded"
        );
    }

    fn persist(&self, record: &CostRecord) {
        if let Err(e) = self.store.save(record) {
            tracing::warn!(error = %e, "failed to persist cost ledger");
        }
    }
}

impl std::fmt::Debug for BudgetLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetLedger")
            .field("warning_ratio", &self.warning_ratio)
            .finish_non_exhaustive()
    }
}

fn fits(state: &LedgerState, estimated: f64) -> bool {
    state.record.current_cost + state.pending + estimated <= state.record.daily_budget + AFFORD_TOLERANCE
}

fn remaining(state: &LedgerState) -> f64 {
    (state.record.daily_budget - state.record.current_cost - state.pending).max(0.0)
}

fn utilization(record: &CostRecord) -> f64 {
    if record.daily_budget > 0.0 {
        record.current_cost / record.daily_budget
    } else {
        0.0
    }
}

pub(crate) fn validate(amount: f64) -> Result<(), BudgetError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(BudgetError::InvalidAmount(amount))
    }
}
