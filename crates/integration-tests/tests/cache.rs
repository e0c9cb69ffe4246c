mod harness;

use std::sync::Arc;
use std::time::Duration;

use harness::config::ConfigBuilder;
use harness::mock_executor::MockExecutor;
use tiergate_core::Tier;

fn config() -> tiergate_config::Config {
    ConfigBuilder::new()
        .with_paid_backend("paid", 0.9, 3.0, 15.0)
        .build()
}

#[tokio::test]
async fn repeated_request_is_served_from_cache() {
    let config = config();
    let executor = Arc::new(MockExecutor::complete().with_reported_cost("$0.01"));
    let controller = harness::controller(&config, &executor);

    let first = controller.execute(harness::fix_request("print(y)")).await.unwrap();
    let second = controller.execute(harness::fix_request("print(y)")).await.unwrap();

    assert_eq!(executor.call_count(), 1);
    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(first.outputs, second.outputs);
    assert!(second.cost_spent.abs() < f64::EPSILON);

    let stats = controller.services().cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
    assert!((controller.services().ledger.status().spent - 0.01).abs() < 1e-9);
}

#[tokio::test]
async fn whitespace_variants_share_an_entry() {
    let config = config();
    let executor = Arc::new(MockExecutor::complete());
    let controller = harness::controller(&config, &executor);

    controller.execute(harness::fix_request("x = y  +  1")).await.unwrap();
    let outcome = controller
        .execute(harness::fix_request("  x = y +\n1 "))
        .await
        .unwrap();

    assert!(outcome.from_cache);
    assert_eq!(executor.call_count(), 1);
}

#[tokio::test]
async fn tiers_do_not_share_entries() {
    let config = config();
    let executor = Arc::new(MockExecutor::complete());
    let controller = harness::controller(&config, &executor);

    controller
        .execute(harness::fix_request("print(y)").starting_at(Tier::Quick))
        .await
        .unwrap();
    let outcome = controller
        .execute(harness::fix_request("print(y)").starting_at(Tier::Detailed))
        .await
        .unwrap();

    assert!(!outcome.from_cache);
    assert_eq!(executor.call_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_requests_execute_once() {
    let config = config();
    let executor = Arc::new(MockExecutor::complete().with_delay(Duration::from_millis(100)));
    let controller = Arc::new(harness::controller(&config, &executor));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.execute(harness::fix_request("print(y)")).await })
        })
        .collect();

    let mut cached = 0;
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        if outcome.from_cache {
            cached += 1;
        }
    }

    assert_eq!(executor.call_count(), 1);
    assert_eq!(cached, 7);
    assert_eq!(controller.stats().cache_hits, 7);
}
