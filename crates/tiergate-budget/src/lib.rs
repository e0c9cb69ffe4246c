//! Budget ledger for Tiergate
//!
//! Tracks spend against a hard daily cap. The ledger is the only place that
//! answers "can we afford this?"; callers that need the answer to hold until
//! the call finishes take a [`Reservation`].

#![allow(clippy::must_use_candidate)]

mod error;
mod ledger;
mod record;
mod reservation;

pub use error::BudgetError;
pub use ledger::{BudgetLedger, Clock, system_today};
pub use record::{BudgetStatus, CostRecord};
pub use reservation::Reservation;
