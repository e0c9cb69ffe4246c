//! Persistence backends for service state
//!
//! Services receive a `StateStore` at construction instead of reaching for
//! a global file path. The file-backed store serializes writers through a
//! mutex and replaces the target atomically (write to a temp file in the
//! same directory, then rename) so a crash never leaves a half-written file.

use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

/// Load/save access to one persisted value
pub trait StateStore<T>: Send + Sync {
    /// Read the stored value, `None` if nothing has been stored yet
    fn load(&self) -> Result<Option<T>, StoreError>;

    /// Replace the stored value
    fn save(&self, value: &T) -> Result<(), StoreError>;
}

/// Load a value, degrading to `None` with a warning when the stored state
/// cannot be read
pub fn load_or_warn<T>(store: &dyn StateStore<T>, what: &str) -> Option<T> {
    match store.load() {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, state = what, "persisted state unreadable, starting fresh");
            None
        }
    }
}

/// JSON file store with atomic replacement
pub struct JsonFileStore<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl<T> StateStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<T>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save(&self, value: &T) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        serde_json::to_writer_pretty(&mut tmp, value)?;
        tmp.flush().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        Ok(())
    }
}

impl<T> std::fmt::Debug for JsonFileStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileStore").field("path", &self.path).finish()
    }
}

/// In-memory store, used for tests and ephemeral runs
#[derive(Debug)]
pub struct MemoryStore<T> {
    value: Mutex<Option<T>>,
    saves: std::sync::atomic::AtomicUsize,
}

impl<T> MemoryStore<T> {
    pub const fn new() -> Self {
        Self {
            value: Mutex::new(None),
            saves: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Start with an already-stored value
    pub fn with_value(value: T) -> Self {
        Self {
            value: Mutex::new(Some(value)),
            saves: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of times `save` has been called
    pub fn save_count(&self) -> usize {
        self.saves.load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StateStore<T> for MemoryStore<T>
where
    T: Clone + Send,
{
    fn load(&self) -> Result<Option<T>, StoreError> {
        Ok(self.value.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone())
    }

    fn save(&self, value: &T) -> Result<(), StoreError> {
        *self.value.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(value.clone());
        self.saves.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }
}
