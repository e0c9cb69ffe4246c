//! Task executor seam
//!
//! The controller never does the work itself. Each task type is dispatched
//! to a [`TaskExecutor`]; the registry falls back to a default executor for
//! unregistered task types.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use tiergate_config::TierConfig;
use tiergate_core::{Outputs, Params, Tier};
use tiergate_routing::BackendDescriptor;

/// Everything an executor needs for one attempt
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRequest<'a> {
    pub task_type: &'a str,
    /// Inputs after tier compression
    pub params: &'a Params,
    pub tier: Tier,
    pub limits: &'a TierConfig,
    pub backend: &'a BackendDescriptor,
}

/// Result of one executor call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub outputs: Outputs,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    pub const fn success(outputs: Outputs) -> Self {
        Self {
            success: true,
            outputs,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            outputs: Outputs::new(),
            error: Some(error.into()),
        }
    }
}

/// Performs the actual unit of work
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run one attempt; failures are reported in the outcome, not as errors
    async fn execute(&self, request: &ExecutionRequest<'_>) -> ExecutionOutcome;
}

/// Dispatch table from task type to executor
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    by_task: HashMap<String, Arc<dyn TaskExecutor>>,
    default: Option<Arc<dyn TaskExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn register(mut self, task_type: impl Into<String>, executor: Arc<dyn TaskExecutor>) -> Self {
        self.by_task.insert(task_type.into(), executor);
        self
    }

    /// Executor for task types without their own entry
    #[must_use]
    pub fn with_default(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.default = Some(executor);
        self
    }

    pub fn get(&self, task_type: &str) -> Option<&Arc<dyn TaskExecutor>> {
        self.by_task.get(task_type).or(self.default.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.by_task.is_empty() && self.default.is_none()
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut task_types: Vec<_> = self.by_task.keys().collect();
        task_types.sort();
        f.debug_struct("ExecutorRegistry")
            .field("task_types", &task_types)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl TaskExecutor for Echo {
        async fn execute(&self, _request: &ExecutionRequest<'_>) -> ExecutionOutcome {
            ExecutionOutcome::success(Outputs::from([("by".to_string(), self.0.to_string())]))
        }
    }

    #[test]
    fn dispatches_by_task_type_then_default() {
        let registry = ExecutorRegistry::new()
            .register("fix", Arc::new(Echo("fixer")))
            .with_default(Arc::new(Echo("generic")));

        assert!(registry.get("fix").is_some());
        assert!(registry.get("summarize").is_some());
        assert!(!registry.is_empty());
        assert!(ExecutorRegistry::new().get("fix").is_none());
    }

    #[test]
    fn failure_outcome_has_no_outputs() {
        let outcome = ExecutionOutcome::failure("boom");
        assert!(!outcome.success);
        assert!(outcome.outputs.is_empty());
        assert_eq!(outcome.error.as_deref(), Some("boom"));
    }
}
