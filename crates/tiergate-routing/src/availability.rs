//! Backend availability
//!
//! A backend is usable when its credential variable (if any) is set and its
//! health endpoint (if any) answered the last probe. Probes are async and
//! cached; the selector only ever reads the cache.

use std::{collections::HashSet, time::Duration};

use dashmap::DashMap;

use crate::catalog::{BackendCatalog, BackendDescriptor};

/// Answers whether a backend can take work right now
pub trait AvailabilityProbe: Send + Sync {
    fn is_available(&self, backend: &BackendDescriptor) -> bool;
}

/// Environment credential check plus cached HTTP reachability
pub struct LiveAvailability {
    client: reqwest::Client,
    reachable: DashMap<String, bool>,
}

impl LiveAvailability {
    pub fn new(probe_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(probe_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build probe client, using defaults");
                reqwest::Client::new()
            });

        Self {
            client,
            reachable: DashMap::new(),
        }
    }

    /// Probe every backend with a health URL and cache the results
    pub async fn refresh(&self, catalog: &BackendCatalog) {
        let mut probes = tokio::task::JoinSet::new();

        for backend in catalog {
            let Some(url) = backend.health_url.clone() else {
                continue;
            };
            let client = self.client.clone();
            let id = backend.id.clone();

            probes.spawn(async move {
                let ok = match client.get(url.clone()).send().await {
                    Ok(response) => response.status().is_success(),
                    Err(e) => {
                        tracing::debug!(backend = %id, %url, error = %e, "health probe failed");
                        false
                    }
                };
                (id, ok)
            });
        }

        while let Some(result) = probes.join_next().await {
            match result {
                Ok((id, ok)) => {
                    tracing::info!(backend = %id, reachable = ok, "backend probed");
                    self.reachable.insert(id, ok);
                }
                Err(e) => tracing::warn!(error = %e, "health probe task failed"),
            }
        }
    }

    /// Override the cached reachability of one backend
    pub fn set_reachable(&self, backend_id: &str, reachable: bool) {
        self.reachable.insert(backend_id.to_string(), reachable);
    }

    fn has_credential(backend: &BackendDescriptor) -> bool {
        backend
            .credential_env
            .as_deref()
            .is_none_or(|var| std::env::var(var).is_ok_and(|value| !value.trim().is_empty()))
    }
}

impl AvailabilityProbe for LiveAvailability {
    fn is_available(&self, backend: &BackendDescriptor) -> bool {
        if !Self::has_credential(backend) {
            return false;
        }

        // Unprobed endpoints count as down
        backend.health_url.is_none() || self.reachable.get(&backend.id).is_some_and(|ok| *ok)
    }
}

impl std::fmt::Debug for LiveAvailability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveAvailability")
            .field("probed", &self.reachable.len())
            .finish_non_exhaustive()
    }
}

/// Fixed set of usable backends
#[derive(Debug, Clone, Default)]
pub struct StaticAvailability {
    available: HashSet<String>,
}

impl StaticAvailability {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            available: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Every backend in the catalog is usable
    pub fn all(catalog: &BackendCatalog) -> Self {
        Self::new(catalog.iter().map(|b| b.id.clone()))
    }
}

impl AvailabilityProbe for StaticAvailability {
    fn is_available(&self, backend: &BackendDescriptor) -> bool {
        self.available.contains(&backend.id)
    }
}
