use std::sync::Arc;

use tiergate_budget::BudgetLedger;
use tiergate_cache::ResultCache;
use tiergate_config::Config;
use tiergate_core::{JsonFileStore, MemoryStore};
use tiergate_routing::{AvailabilityProbe, BackendCatalog, BackendSelector, PerformanceHistory};

/// The shared stateful services one or more controllers run against
///
/// Each is constructed once and shared by `Arc`; there is no process-wide
/// instance.
#[derive(Clone)]
pub struct Services {
    pub ledger: Arc<BudgetLedger>,
    pub cache: Arc<ResultCache>,
    pub selector: Arc<BackendSelector>,
}

impl Services {
    /// Services persisted as JSON files under the configured state directory
    pub fn open(config: &Config, availability: Arc<dyn AvailabilityProbe>) -> Self {
        let storage = &config.storage;
        tracing::debug!(state_dir = %storage.state_dir.display(), "opening persisted state");

        let ledger = BudgetLedger::new(&config.budget, Arc::new(JsonFileStore::new(storage.ledger_path())));
        let cache = ResultCache::new(config.cache.clone(), Arc::new(JsonFileStore::new(storage.cache_path())));
        let history = PerformanceHistory::new(Arc::new(JsonFileStore::new(storage.history_path())));

        Self::assemble(config, ledger, cache, history, availability)
    }

    /// Services that keep everything in memory
    pub fn in_memory(config: &Config, availability: Arc<dyn AvailabilityProbe>) -> Self {
        let ledger = BudgetLedger::new(&config.budget, Arc::new(MemoryStore::new()));
        let cache = ResultCache::new(config.cache.clone(), Arc::new(MemoryStore::new()));
        let history = PerformanceHistory::new(Arc::new(MemoryStore::new()));

        Self::assemble(config, ledger, cache, history, availability)
    }

    fn assemble(
        config: &Config,
        ledger: BudgetLedger,
        cache: ResultCache,
        history: PerformanceHistory,
        availability: Arc<dyn AvailabilityProbe>,
    ) -> Self {
        let catalog = Arc::new(BackendCatalog::from_config(&config.routing));
        let selector = BackendSelector::new(&config.routing, catalog, Arc::new(history), availability);

        Self {
            ledger: Arc::new(ledger),
            cache: Arc::new(cache),
            selector: Arc::new(selector),
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("budget", &self.ledger.status())
            .field("cache", &self.cache.stats())
            .field("selector", &self.selector.stats())
            .finish()
    }
}
