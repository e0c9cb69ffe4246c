#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::{path::Path, sync::Arc};

use anyhow::Context;
use args::{Args, CacheAction, Command};
use clap::Parser;
use serde::Serialize;
use tiergate_config::Config;
use tiergate_core::Params;
use tiergate_engine::{EscalationController, ExecutorRegistry, Services, TaskRequest};
use tiergate_routing::{BackendCatalog, LiveAvailability};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize telemetry
    let _telemetry_guard = tiergate_telemetry::init(config.telemetry.as_ref(), &args.log)?;

    tracing::debug!(config_path = %args.config.display(), "configuration loaded");

    // Probe local backends before anything selects one
    let availability = Arc::new(LiveAvailability::new(config.routing.probe_timeout));
    availability
        .refresh(&BackendCatalog::from_config(&config.routing))
        .await;

    let services = Services::open(&config, availability);

    match args.command {
        Command::Run {
            task,
            params,
            quality,
            urgency,
            tier,
        } => {
            let params = read_params(&params)?;
            let mut request = TaskRequest::new(task, params)
                .with_quality(quality)
                .with_urgency(urgency.into());
            if let Some(tier) = tier {
                request = request.starting_at(tier.into());
            }

            // Set up graceful shutdown
            let shutdown = CancellationToken::new();
            let shutdown_clone = shutdown.clone();

            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown_clone.cancel();
            });

            let executors = ExecutorRegistry::from_config(&config.executor);
            let controller = EscalationController::new(&config, services.clone(), executors).with_shutdown(shutdown);

            let result = controller.execute(request).await;
            flush_cache(&services);

            let outcome = result?;
            print_json(&outcome)?;
        }
        Command::Status => {
            print_json(&Status {
                budget: services.ledger.status(),
                cache: services.cache.stats(),
                selector: services.selector.stats(),
                history_entries: services.selector.history().len(),
            })?;
        }
        Command::Recommend { task } => {
            let remaining = services.ledger.remaining_budget();
            print_json(&services.selector.recommend(&task, remaining))?;
        }
        Command::Cache { action } => match action {
            CacheAction::Stats => print_json(&services.cache.stats())?,
            CacheAction::Clear => {
                services.cache.clear()?;
                tracing::info!("result cache cleared");
                print_json(&services.cache.stats())?;
            }
        },
    }

    Ok(())
}

#[derive(Serialize)]
struct Status {
    budget: tiergate_budget::BudgetStatus,
    cache: tiergate_cache::CacheStats,
    selector: tiergate_routing::SelectorStats,
    history_entries: usize,
}

fn read_params(path: &Path) -> anyhow::Result<Params> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} must contain a JSON object", path.display()))
}

fn flush_cache(services: &Services) {
    if let Err(e) = services.cache.flush() {
        tracing::warn!(error = %e, "failed to flush result cache");
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received, finishing current attempt");
}
