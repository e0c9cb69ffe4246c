//! Result cache for Tiergate
//!
//! Stores executor outputs keyed by a SHA-256 hash of the task signature,
//! the whitespace-normalized inputs, and the backend that produced them.
//! Entries never expire; the cache is bounded by count and evicts the
//! least-used, oldest entries first.

#![allow(clippy::must_use_candidate)]

mod error;
mod key;
mod store;

pub use error::CacheError;
pub use key::{compute_cache_key, normalize_inputs};
pub use store::{CacheEntry, CacheSnapshot, CacheStats, KeyGuard, ResultCache};
