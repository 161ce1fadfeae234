//! Drain cycle orchestration, scheduling and bookkeeping

pub mod metrics;
pub mod orchestrator;
pub mod retry;
pub mod scheduler;

pub use metrics::{MetricsSnapshot, RelayMetrics};
pub use orchestrator::{DrainOrchestrator, DrainOrchestratorBuilder, DrainReport, DrainStatus};
pub use retry::{RetryExecutor, RetryPolicy, RetryResult};
pub use scheduler::{ScheduleSummary, Scheduler};
