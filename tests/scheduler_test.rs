//! Scheduler firing and shutdown

mod common;

use common::*;
use queue_relay::config::ScheduleConfig;
use queue_relay::relay::{DrainOrchestrator, Scheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

async fn wait_for_connects(source: &FakeSource, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while source.state.lock().connects < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("scheduler did not fire in time");
}

fn scheduler(source: &FakeSource, schedule: ScheduleConfig) -> Scheduler {
    let orchestrator = DrainOrchestrator::builder(source_config(), Arc::new(source.clone())).build();
    Scheduler::new(schedule, Arc::new(orchestrator))
}

#[tokio::test]
async fn test_run_on_startup_fires_immediately() {
    let source = FakeSource::with_messages(readings(2));
    let scheduler = scheduler(
        &source,
        ScheduleConfig {
            interval: Duration::from_secs(3600),
            run_on_startup: true,
        },
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    wait_for_connects(&source, 1).await;
    shutdown_tx.send(true).unwrap();
    let summary = handle.await.unwrap();

    assert_eq!(summary.cycles, 1);
    assert_eq!(source.completed().len(), 2);
}

#[tokio::test]
async fn test_fires_on_interval() {
    let source = FakeSource::default();
    let scheduler = scheduler(
        &source,
        ScheduleConfig {
            interval: Duration::from_millis(20),
            run_on_startup: false,
        },
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { scheduler.run(shutdown_rx).await });

    wait_for_connects(&source, 3).await;
    shutdown_tx.send(true).unwrap();
    let summary = handle.await.unwrap();

    assert!(summary.cycles >= 3);
    assert_eq!(summary.failed_cycles, 0);
}

#[tokio::test]
async fn test_stops_without_firing_when_shut_down_first() {
    let source = FakeSource::default();
    let scheduler = scheduler(
        &source,
        ScheduleConfig {
            interval: Duration::from_secs(3600),
            run_on_startup: false,
        },
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown_tx.send(true).unwrap();

    let summary = scheduler.run(shutdown_rx).await;

    assert_eq!(summary.cycles, 0);
    assert_eq!(source.state.lock().connects, 0);
}
