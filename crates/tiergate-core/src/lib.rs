//! Shared building blocks for Tiergate
//!
//! Holds the enums every component agrees on (tiers, backend classes,
//! urgency), the token-rate pricing model used by both the budget ledger
//! and the backend selector, and the persistence abstraction the stateful
//! services are constructed with.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod error;
pub mod pricing;
pub mod store;
mod types;

pub use error::StoreError;
pub use pricing::{TokenRates, estimate_cost, estimate_task_cost, tokens_from_bytes};
pub use store::{JsonFileStore, MemoryStore, StateStore, load_or_warn};
pub use types::{BackendClass, Outputs, Params, Tier, TierPreference, Urgency};
