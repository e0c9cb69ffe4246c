use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tiergate_config::CacheConfig;
use tiergate_core::{Outputs, Params, StateStore, load_or_warn};
use tokio::sync::OwnedMutexGuard;

use crate::{CacheError, compute_cache_key, normalize_inputs};

/// Persisted form of the cache: key to entry
pub type CacheSnapshot = BTreeMap<String, CacheEntry>;

/// One cached result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub signature: String,
    /// Inputs after whitespace normalization
    pub inputs: Params,
    pub outputs: Outputs,
    pub backend_id: String,
    pub created_at: Timestamp,
    pub hit_count: u64,
}

/// Cache counters since construction
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub entries: usize,
    pub max_entries: usize,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Bounded result cache
///
/// Lookups and inserts take a short synchronous lock on the entry map.
/// Callers that want at most one computation per key hold a [`KeyGuard`]
/// from [`ResultCache::lock_key`] across their get-compute-put sequence.
pub struct ResultCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    in_flight: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    store: Arc<dyn StateStore<CacheSnapshot>>,
    config: CacheConfig,
    counters: Counters,
    /// Hit counts changed since the last write
    dirty: AtomicBool,
}

impl ResultCache {
    /// Construct, loading persisted entries; unreadable state means an empty cache
    pub fn new(config: CacheConfig, store: Arc<dyn StateStore<CacheSnapshot>>) -> Self {
        let entries: HashMap<_, _> = load_or_warn(store.as_ref(), "result cache")
            .unwrap_or_default()
            .into_iter()
            .collect();

        tracing::debug!(entries = entries.len(), enabled = config.enabled, "result cache loaded");

        Self {
            entries: Mutex::new(entries),
            in_flight: DashMap::new(),
            store,
            config,
            counters: Counters::default(),
            dirty: AtomicBool::new(false),
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Look up outputs; a hit bumps the entry's hit count
    pub fn get(&self, signature: &str, inputs: &Params, backend_id: &str) -> Option<Outputs> {
        if !self.config.enabled {
            return None;
        }

        let key = compute_cache_key(signature, inputs, backend_id);
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(&key) {
            entry.hit_count += 1;
            self.dirty.store(true, Ordering::Relaxed);
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(cache_key = %key, signature, backend = backend_id, hits = entry.hit_count, "cache hit");
            Some(entry.outputs.clone())
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(cache_key = %key, signature, backend = backend_id, "cache miss");
            None
        }
    }

    /// Store outputs, evicting if the cache grew past its bound
    ///
    /// Replacing an existing key keeps its hit count and creation time.
    pub fn put(&self, signature: &str, inputs: &Params, outputs: Outputs, backend_id: &str) {
        if !self.config.enabled {
            return;
        }

        let key = compute_cache_key(signature, inputs, backend_id);
        let mut entries = self.entries();

        match entries.get_mut(&key) {
            Some(existing) => existing.outputs = outputs,
            None => {
                entries.insert(
                    key.clone(),
                    CacheEntry {
                        signature: signature.to_string(),
                        inputs: normalize_inputs(inputs),
                        outputs,
                        backend_id: backend_id.to_string(),
                        created_at: Timestamp::now(),
                        hit_count: 0,
                    },
                );
            }
        }

        tracing::debug!(cache_key = %key, signature, backend = backend_id, "cached result");

        self.evict(&mut entries);
        self.persist_logged(&entries);
    }

    /// Wait for exclusive use of the key for `(signature, inputs, backend_id)`
    ///
    /// A second caller for the same key waits here until the first drops its
    /// guard, and then observes the first caller's `put` as a hit.
    pub async fn lock_key(&self, signature: &str, inputs: &Params, backend_id: &str) -> KeyGuard<'_> {
        let key = compute_cache_key(signature, inputs, backend_id);
        let lock = Arc::clone(self.in_flight.entry(key.clone()).or_default().value());
        let guard = lock.lock_owned().await;

        KeyGuard {
            cache: self,
            key,
            guard: Some(guard),
        }
    }

    /// Write the current entries, including pending hit-count updates
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write
    pub fn flush(&self) -> Result<(), CacheError> {
        let entries = self.entries();
        self.persist(&entries)
    }

    /// Remove every entry and persist the empty cache
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write
    pub fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.entries();
        let removed = entries.len();
        entries.clear();
        tracing::info!(removed, "result cache cleared");
        self.persist(&entries)
    }

    pub fn stats(&self) -> CacheStats {
        let total_requests = self.counters.requests.load(Ordering::Relaxed);
        let hits = self.counters.hits.load(Ordering::Relaxed);

        CacheStats {
            total_requests,
            hits,
            misses: self.counters.misses.load(Ordering::Relaxed),
            hit_rate: if total_requests > 0 {
                hits as f64 / total_requests as f64
            } else {
                0.0
            },
            entries: self.len(),
            max_entries: self.config.max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry stored under a precomputed key
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries().get(key).cloned()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the least-hit, oldest entries until back under the retain target
    fn evict(&self, entries: &mut HashMap<String, CacheEntry>) {
        if entries.len() <= self.config.max_entries {
            return;
        }

        let target = retain_target(self.config.max_entries, self.config.retain_ratio);
        let mut ranked: Vec<_> = entries
            .iter()
            .map(|(key, entry)| (entry.hit_count, entry.created_at, key.clone()))
            .collect();
        ranked.sort_unstable();

        let excess = entries.len().saturating_sub(target);
        for (_, _, key) in ranked.into_iter().take(excess) {
            entries.remove(&key);
        }

        tracing::info!(evicted = excess, remaining = entries.len(), "result cache evicted entries");
    }

    fn persist(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), CacheError> {
        let snapshot: CacheSnapshot = entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        self.store.save(&snapshot)?;
        self.dirty.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn persist_logged(&self, entries: &HashMap<String, CacheEntry>) {
        if let Err(e) = self.persist(entries) {
            tracing::warn!(error = %e, "failed to persist result cache");
        }
    }
}

impl Drop for ResultCache {
    fn drop(&mut self) {
        if self.dirty.load(Ordering::Relaxed) {
            let entries = self.entries();
            self.persist_logged(&entries);
        }
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("entries", &self.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Exclusive hold on one cache key
///
/// Dropping the guard wakes the next waiter; the per-key lock is discarded
/// once nobody else is waiting on it.
pub struct KeyGuard<'a> {
    cache: &'a ResultCache,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.cache
            .in_flight
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl std::fmt::Debug for KeyGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGuard").field("key", &self.key).finish_non_exhaustive()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn retain_target(max_entries: usize, retain_ratio: f64) -> usize {
    (max_entries as f64 * retain_ratio.clamp(0.0, 1.0)).floor() as usize
}
