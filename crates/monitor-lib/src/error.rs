//! Error taxonomy for the monitoring pipeline
//!
//! Each variant maps to one failure scope with a fixed recovery policy:
//! discovery and GPU query failures degrade the whole cycle, the rest are
//! isolated to a single container or record. None of them stop the loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Listing running containers failed; the cycle records nothing and
    /// discovery is retried on the next cycle.
    #[error("container discovery failed: {0}")]
    Discovery(String),

    /// A container name matched the prefix but not the naming scheme;
    /// the container is skipped for this cycle.
    #[error("container name `{0}` does not match the task naming scheme")]
    NameParse(String),

    /// Stats collection failed for one container; its record is omitted
    /// this cycle.
    #[error("stats collection failed for `{container}`: {reason}")]
    Stats { container: String, reason: String },

    /// The cycle-wide GPU telemetry query failed; every container's GPU
    /// fields become "N/A" for this cycle only.
    #[error("gpu telemetry query failed: {0}")]
    GpuQuery(String),

    /// Task metadata could not be read; the module resolves to "Unknown".
    #[error("task metadata unavailable for task {task_id}: {reason}")]
    Metadata { task_id: u64, reason: String },

    /// A record could not be appended to its sink or the fallback
    /// location; the record is dropped.
    #[error("failed to persist record for task {task_id}: {reason}")]
    Persistence { task_id: u64, reason: String },
}
