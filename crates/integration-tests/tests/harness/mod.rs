//! Shared helpers for the end-to-end tests
#![allow(dead_code)]

pub mod config;
pub mod mock_executor;

use std::sync::Arc;

use mock_executor::MockExecutor;
use tiergate_config::Config;
use tiergate_core::Params;
use tiergate_engine::{EscalationController, ExecutorRegistry, Services, TaskRequest};
use tiergate_routing::{BackendCatalog, StaticAvailability};

/// Controller over in-memory services where every configured backend is up
pub fn controller(config: &Config, executor: &Arc<MockExecutor>) -> EscalationController {
    let catalog = BackendCatalog::from_config(&config.routing);
    let services = Services::in_memory(config, Arc::new(StaticAvailability::all(&catalog)));
    with_services(config, services, executor)
}

/// Controller over in-memory services where only `available` backends are up
pub fn controller_with_available(config: &Config, executor: &Arc<MockExecutor>, available: &[&str]) -> EscalationController {
    let services = Services::in_memory(config, Arc::new(StaticAvailability::new(available.iter().copied())));
    with_services(config, services, executor)
}

pub fn with_services(config: &Config, services: Services, executor: &Arc<MockExecutor>) -> EscalationController {
    let executors = ExecutorRegistry::new().with_default(Arc::clone(executor) as _);
    EscalationController::new(config, services, executors)
}

/// A "fix" request for the given source snippet
pub fn fix_request(code: &str) -> TaskRequest {
    let params = Params::from_iter([
        ("code".to_owned(), serde_json::json!(code)),
        ("error".to_owned(), serde_json::json!("NameError: name 'y' is not defined")),
    ]);
    TaskRequest::new("fix", params)
}
