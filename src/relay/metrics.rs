//! Relay metrics collection

use crate::sink::SinkOutcome;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cycle duration samples kept for statistics
const DURATION_WINDOW: usize = 1000;

/// Relay metrics collector
#[derive(Debug, Clone)]
pub struct RelayMetrics {
    /// Drain cycles started
    pub cycles: Arc<AtomicU64>,
    /// Messages received from the source
    pub messages_received: Arc<AtomicU64>,
    /// Messages acknowledged
    pub messages_acknowledged: Arc<AtomicU64>,
    /// Acknowledgments that failed
    pub ack_failures: Arc<AtomicU64>,
    /// Documents persisted
    pub documents_persisted: Arc<AtomicU64>,
    pub storage_failures: Arc<AtomicU64>,
    /// Documents replicated
    pub documents_replicated: Arc<AtomicU64>,
    pub replication_failures: Arc<AtomicU64>,
    /// Alerts published
    pub alerts_published: Arc<AtomicU64>,
    pub alert_failures: Arc<AtomicU64>,
    cycle_durations: Arc<RwLock<VecDeque<Duration>>>,
    error_counts: Arc<RwLock<HashMap<String, u64>>>,
    start_time: Instant,
}

impl RelayMetrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self {
            cycles: Arc::new(AtomicU64::new(0)),
            messages_received: Arc::new(AtomicU64::new(0)),
            messages_acknowledged: Arc::new(AtomicU64::new(0)),
            ack_failures: Arc::new(AtomicU64::new(0)),
            documents_persisted: Arc::new(AtomicU64::new(0)),
            storage_failures: Arc::new(AtomicU64::new(0)),
            documents_replicated: Arc::new(AtomicU64::new(0)),
            replication_failures: Arc::new(AtomicU64::new(0)),
            alerts_published: Arc::new(AtomicU64::new(0)),
            alert_failures: Arc::new(AtomicU64::new(0)),
            cycle_durations: Arc::new(RwLock::new(VecDeque::with_capacity(DURATION_WINDOW))),
            error_counts: Arc::new(RwLock::new(HashMap::new())),
            start_time: Instant::now(),
        }
    }

    pub fn increment_cycles(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_received(&self, count: usize) {
        self.messages_received.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn add_acknowledged(&self, count: usize) {
        self.messages_acknowledged.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn add_ack_failures(&self, count: usize) {
        self.ack_failures.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record the storage outcome of a cycle
    pub fn record_storage(&self, outcome: &SinkOutcome) {
        self.documents_persisted
            .fetch_add(outcome.delivered() as u64, Ordering::Relaxed);
        self.storage_failures
            .fetch_add(outcome.failed() as u64, Ordering::Relaxed);
    }

    /// Record the replication outcome of a cycle
    pub fn record_replication(&self, outcome: &SinkOutcome) {
        self.documents_replicated
            .fetch_add(outcome.delivered() as u64, Ordering::Relaxed);
        self.replication_failures
            .fetch_add(outcome.failed() as u64, Ordering::Relaxed);
    }

    /// Record the outcome of one alert evaluation
    pub fn record_alert(&self, outcome: &SinkOutcome) {
        self.alerts_published
            .fetch_add(outcome.delivered() as u64, Ordering::Relaxed);
        self.alert_failures
            .fetch_add(outcome.failed() as u64, Ordering::Relaxed);
    }

    /// Record cycle duration
    pub fn record_cycle_duration(&self, duration: Duration) {
        let mut durations = self.cycle_durations.write();
        if durations.len() == DURATION_WINDOW {
            durations.pop_front();
        }
        durations.push_back(duration);
    }

    /// Record an error
    pub fn record_error(&self, error_type: &str) {
        let mut errors = self.error_counts.write();
        *errors.entry(error_type.to_string()).or_insert(0) += 1;
    }

    /// Statistics over the retained cycle durations
    pub fn cycle_stats(&self) -> CycleStats {
        let durations = self.cycle_durations.read();
        if durations.is_empty() {
            return CycleStats::default();
        }

        let mut sorted: Vec<Duration> = durations.iter().copied().collect();
        sorted.sort();

        let p50_idx = sorted.len() / 2;
        let p95_idx = ((sorted.len() - 1) as f64 * 0.95) as usize;
        let total: Duration = sorted.iter().sum();

        CycleStats {
            count: sorted.len(),
            p50: sorted[p50_idx],
            p95: sorted[p95_idx],
            max: sorted[sorted.len() - 1],
            mean: total / sorted.len() as u32,
        }
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            cycles: self.cycles.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_acknowledged: self.messages_acknowledged.load(Ordering::Relaxed),
            ack_failures: self.ack_failures.load(Ordering::Relaxed),
            documents_persisted: self.documents_persisted.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            documents_replicated: self.documents_replicated.load(Ordering::Relaxed),
            replication_failures: self.replication_failures.load(Ordering::Relaxed),
            alerts_published: self.alerts_published.load(Ordering::Relaxed),
            alert_failures: self.alert_failures.load(Ordering::Relaxed),
            cycle_stats: self.cycle_stats(),
            error_counts: self.error_counts.read().clone(),
        }
    }

    /// Reset metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.cycles,
            &self.messages_received,
            &self.messages_acknowledged,
            &self.ack_failures,
            &self.documents_persisted,
            &self.storage_failures,
            &self.documents_replicated,
            &self.replication_failures,
            &self.alerts_published,
            &self.alert_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.cycle_durations.write().clear();
        self.error_counts.write().clear();
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Cycle duration statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CycleStats {
    pub count: usize,
    pub p50: Duration,
    pub p95: Duration,
    pub max: Duration,
    pub mean: Duration,
}

/// Serializable view of [`RelayMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub cycles: u64,
    pub messages_received: u64,
    pub messages_acknowledged: u64,
    pub ack_failures: u64,
    pub documents_persisted: u64,
    pub storage_failures: u64,
    pub documents_replicated: u64,
    pub replication_failures: u64,
    pub alerts_published: u64,
    pub alert_failures: u64,
    pub cycle_stats: CycleStats,
    pub error_counts: HashMap<String, u64>,
}
