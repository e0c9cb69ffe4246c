use std::path::PathBuf;

use serde::Deserialize;

/// Persisted state location
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding the ledger, cache, and history files
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl StorageConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.state_dir.join("cost_ledger.json")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.state_dir.join("result_cache.json")
    }

    pub fn history_path(&self) -> PathBuf {
        self.state_dir.join("performance_history.json")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("./tiergate_state")
}
