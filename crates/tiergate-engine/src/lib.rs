//! Escalation engine for Tiergate
//!
//! Ties the budget ledger, backend selector, and result cache together
//! behind [`EscalationController::execute`]. The work itself is delegated
//! to [`TaskExecutor`] implementations looked up by task type.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod compress;
mod controller;
mod error;
mod executor;
pub mod parse;
mod process;
mod quality;
mod services;
mod stats;

pub use controller::{
    AttemptRecord, DEFAULT_QUALITY_REQUIREMENT, EscalationController, TaskOutcome, TaskRequest, initial_tier,
};
pub use error::EngineError;
pub use executor::{ExecutionOutcome, ExecutionRequest, ExecutorRegistry, TaskExecutor};
pub use process::ProcessExecutor;
pub use quality::QualityEvaluator;
pub use services::Services;
pub use stats::EngineStats;
