mod harness;

use std::sync::Arc;

use harness::config::ConfigBuilder;
use harness::mock_executor::MockExecutor;
use tiergate_budget::{BudgetLedger, CostRecord};
use tiergate_config::BudgetConfig;
use tiergate_core::{MemoryStore, Tier};
use tiergate_engine::{EngineError, Services};
use tiergate_routing::StaticAvailability;

#[test]
fn one_dollar_budget_scenario() {
    let config = BudgetConfig {
        daily_budget: 1.0,
        ..BudgetConfig::default()
    };
    let ledger = BudgetLedger::new(&config, Arc::new(MemoryStore::<CostRecord>::new()));

    ledger.record_spend(0.30).unwrap();
    assert!((ledger.remaining_budget() - 0.70).abs() < 1e-9);

    assert!(!ledger.can_afford(0.80));
    assert!(ledger.can_afford(0.50));

    ledger.record_spend(0.50).unwrap();
    assert!((ledger.remaining_budget() - 0.20).abs() < 1e-9);
    assert_eq!(ledger.status().calls_made, 2);
}

#[tokio::test]
async fn budget_blocks_escalation_and_flags_result() {
    // Any attempt on this backend reserves at least the quick estimate of about $0.0086
    let config = ConfigBuilder::new()
        .with_paid_backend("paid", 0.9, 3.0, 15.0)
        .with_daily_budget(0.012)
        .build();
    let executor = Arc::new(MockExecutor::half_complete().with_reported_cost("$0.005"));
    let controller = harness::controller(&config, &executor);

    let outcome = controller
        .execute(harness::fix_request("print(y)").starting_at(Tier::Quick))
        .await
        .unwrap();

    assert_eq!(executor.call_count(), 1);
    assert!(outcome.possibly_suboptimal);
    assert!(!outcome.accepted);
    assert!(!outcome.escalation_used);
    assert!((outcome.cost_spent - 0.005).abs() < 1e-9);

    let ledger = &controller.services().ledger;
    assert!((ledger.remaining_budget() - 0.007).abs() < 1e-9);
    assert_eq!(controller.stats().budget_aborts, 1);
}

#[tokio::test]
async fn unaffordable_first_attempt_is_budget_exceeded() {
    let config = ConfigBuilder::new()
        .with_paid_backend("paid", 0.9, 3.0, 15.0)
        .with_daily_budget(0.005)
        .build();
    let executor = Arc::new(MockExecutor::complete());
    let controller = harness::controller(&config, &executor);

    let err = controller
        .execute(harness::fix_request("print(y)").starting_at(Tier::Quick))
        .await
        .unwrap_err();

    assert_eq!(executor.call_count(), 0);
    assert!(err.is_retryable());
    let EngineError::BudgetExceeded { tier, cost_spent, .. } = err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(tier, Tier::Quick);
    assert!(cost_spent.abs() < f64::EPSILON);
}

#[tokio::test]
async fn spent_budget_still_runs_free_backends() {
    let config = ConfigBuilder::new()
        .with_paid_backend("paid", 0.95, 3.0, 15.0)
        .with_free_backend("local", 0.65)
        .with_daily_budget(0.0)
        .build();
    let executor = Arc::new(MockExecutor::complete());
    let controller = harness::controller(&config, &executor);

    let outcome = controller.execute(harness::fix_request("print(y)")).await.unwrap();

    assert_eq!(executor.backends_seen(), vec!["local".to_owned()]);
    assert!(outcome.accepted);
    assert!(outcome.cost_spent.abs() < f64::EPSILON);
}

#[tokio::test]
async fn free_backend_escalates_under_a_tiny_budget() {
    // Every tier's cost target is above the budget, but a free backend reserves nothing
    let config = ConfigBuilder::new()
        .with_free_backend("local", 0.7)
        .with_daily_budget(0.001)
        .build();
    let executor = Arc::new(MockExecutor::half_complete());
    let controller = harness::controller(&config, &executor);

    let outcome = controller
        .execute(harness::fix_request("print(y)").starting_at(Tier::Quick))
        .await
        .unwrap();

    assert_eq!(executor.tiers_seen(), vec![Tier::Quick, Tier::Detailed, Tier::Comprehensive]);
    assert!(outcome.escalation_used);
    assert!(!outcome.possibly_suboptimal);
    assert!(outcome.cost_spent.abs() < f64::EPSILON);
    assert_eq!(controller.stats().budget_aborts, 0);
}

#[tokio::test]
async fn failed_paid_attempt_still_costs_its_estimate() {
    let config = ConfigBuilder::new()
        .with_paid_backend("paid", 0.9, 3.0, 15.0)
        .with_max_escalations(0)
        .build();
    let executor = Arc::new(MockExecutor::failing("rate limited"));
    let controller = harness::controller(&config, &executor);

    let err = controller
        .execute(harness::fix_request("print(y)").starting_at(Tier::Quick))
        .await
        .unwrap_err();

    // 500 + 2000 * 0.3 tokens, 60% input at $3/M and 40% output at $15/M
    let estimate = 660.0 * 3.0 / 1e6 + 440.0 * 15.0 / 1e6;
    assert!((err.cost_spent() - estimate).abs() < 1e-9);
    let status = controller.services().ledger.status();
    assert_eq!(status.calls_made, 1);
    assert!((status.spent - estimate).abs() < 1e-9);
}

#[tokio::test]
async fn spend_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigBuilder::new()
        .with_paid_backend("paid", 0.9, 3.0, 15.0)
        .with_state_dir(dir.path())
        .build();
    let availability = || Arc::new(StaticAvailability::new(["paid"]));

    {
        let executor = Arc::new(MockExecutor::complete().with_reported_cost("$0.25"));
        let services = Services::open(&config, availability());
        let controller = harness::with_services(&config, services, &executor);
        controller.execute(harness::fix_request("print(y)")).await.unwrap();
    }

    let executor = Arc::new(MockExecutor::complete());
    let services = Services::open(&config, availability());
    assert!((services.ledger.status().spent - 0.25).abs() < 1e-9);

    // Same request again is served from the persisted cache
    let controller = harness::with_services(&config, services, &executor);
    let outcome = controller.execute(harness::fix_request("print(y)")).await.unwrap();
    assert!(outcome.from_cache);
    assert_eq!(executor.call_count(), 0);
    assert!(dir.path().join("cost_ledger.json").exists());
    assert!(dir.path().join("performance_history.json").exists());
}
