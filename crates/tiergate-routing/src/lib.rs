//! Backend routing for Tiergate
//!
//! Scores every configured backend for a request and picks the best one:
//! - **Fit**: closeness of the backend's quality to what the tier needs
//! - **Specialization** and **urgency** bonuses
//! - **History**: observed success and quality for the task type
//! - **Cost**: paid backends are penalized as they eat into the remaining budget
//!
//! Unavailable backends score zero. When nothing scores above zero the
//! configured fallback chain decides.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod availability;
pub mod catalog;
pub mod error;
pub mod history;
mod recommend;
pub mod selector;

pub use availability::{AvailabilityProbe, LiveAvailability, StaticAvailability};
pub use catalog::{BackendCatalog, BackendDescriptor};
pub use error::RoutingError;
pub use history::{ExecutionSample, HistorySnapshot, PerformanceAggregate, PerformanceHistory};
pub use recommend::Recommendations;
pub use selector::{BackendSelector, Selection, SelectionReason, SelectorStats, score_backend};
