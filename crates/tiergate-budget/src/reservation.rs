use std::sync::Arc;

use crate::{BudgetError, BudgetLedger, ledger::validate};

/// Budget held for an in-flight call
///
/// Settle it with the actual cost once the call finishes. A reservation
/// dropped without being settled records its full estimate, so a cancelled
/// request is never free.
#[must_use = "an unsettled reservation records its full estimate on drop"]
pub struct Reservation {
    ledger: Arc<BudgetLedger>,
    amount: f64,
    settled: bool,
}

impl Reservation {
    pub(crate) const fn new(ledger: Arc<BudgetLedger>, amount: f64) -> Self {
        Self {
            ledger,
            amount,
            settled: false,
        }
    }

    /// The held estimate
    pub const fn amount(&self) -> f64 {
        self.amount
    }

    /// Release the hold and record `actual` as one call
    ///
    /// # Errors
    ///
    /// Returns [`BudgetError::InvalidAmount`] for negative or non-finite
    /// costs; the estimate is then recorded on drop instead
    pub fn settle(mut self, actual: f64) -> Result<(), BudgetError> {
        validate(actual)?;
        self.settled = true;
        self.ledger.settle_reservation(self.amount, Some(actual));
        Ok(())
    }

    /// Release the hold without recording a call
    pub fn release(mut self) {
        self.settled = true;
        self.ledger.settle_reservation(self.amount, None);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(amount = self.amount, "reservation dropped unsettled, recording estimate");
            self.ledger.settle_reservation(self.amount, Some(self.amount));
        }
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("amount", &self.amount)
            .field("settled", &self.settled)
            .finish_non_exhaustive()
    }
}
