//! Fixed-interval trigger for drain cycles

use super::orchestrator::DrainOrchestrator;
use crate::config::ScheduleConfig;
use crate::document::format_timestamp;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Fires drain cycles on a fixed interval, one at a time
pub struct Scheduler {
    config: ScheduleConfig,
    orchestrator: Arc<DrainOrchestrator>,
}

/// Totals of a scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    /// Cycles fired
    pub cycles: u64,
    /// Cycles that did not reach the acknowledgment step
    pub failed_cycles: u64,
}

impl Scheduler {
    pub fn new(config: ScheduleConfig, orchestrator: Arc<DrainOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    /// Run until `shutdown` turns true or its sender is dropped
    ///
    /// A shutdown request never interrupts a running cycle; it is observed
    /// before the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> ScheduleSummary {
        let interval = self.config.interval;
        let first_tick = if self.config.run_on_startup {
            Instant::now()
        } else {
            Instant::now() + interval
        };
        let mut ticker = tokio::time::interval_at(first_tick, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_secs = interval.as_secs(),
            run_on_startup = self.config.run_on_startup,
            "Scheduler started"
        );

        let mut summary = ScheduleSummary::default();
        let mut last_fire: Option<DateTime<Utc>> = None;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                scheduled = ticker.tick() => {
                    let lag = Instant::now().saturating_duration_since(scheduled);
                    if lag > interval {
                        warn!(lag_ms = lag.as_millis() as u64, "Drain cycle is past due");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            let now = Utc::now();
            let last = last_fire
                .map(format_timestamp)
                .unwrap_or_else(|| "never".to_string());
            info!(last = %last, "Drain cycle triggered at {}", format_timestamp(now));
            last_fire = Some(now);

            let report = self.orchestrator.drain().await;
            summary.cycles += 1;
            if !report.is_success() {
                summary.failed_cycles += 1;
            }
        }

        info!(cycles = summary.cycles, "Scheduler stopped");
        summary
    }
}
