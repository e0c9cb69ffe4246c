//! Routing-specific error types

use thiserror::Error;

/// Errors that can occur during backend selection
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Every candidate scored zero and no fallback backend is usable
    #[error("no backend available for task type: {task_type}")]
    NoBackendAvailable { task_type: String },

    /// A backend id that is not in the catalog
    #[error("unknown backend: {0}")]
    UnknownBackend(String),
}
