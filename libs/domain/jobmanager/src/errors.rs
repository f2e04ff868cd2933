use thiserror::Error;

use krakenhashes_infra_executor::ExecutorError;
use krakenhashes_infra_outfile::OutfileError;
use krakenhashes_infra_sync::SyncError;

#[derive(Error, Debug)]
pub enum JobManagerError {
    /// Defence-in-depth against coordinator bugs: the agent never runs two
    /// tasks at once, but an assignment arriving while one is active must
    /// still be rejected cleanly rather than queued or silently dropped.
    #[error("task {existing} is already active, rejecting {rejected}")]
    ConcurrentTaskRejected { existing: String, rejected: String },

    #[error("failed to prepare inputs for task {task_id}: {source}")]
    Preparation {
        task_id: String,
        #[source]
        source: SyncError,
    },

    #[error("failed to launch task {task_id}: {source}")]
    Launch {
        task_id: String,
        #[source]
        source: ExecutorError,
    },

    #[error("outfile store error for task {task_id}: {source}")]
    Outfile {
        task_id: String,
        #[source]
        source: OutfileError,
    },

    #[error("no cracking binary available for task {task_id}: {source}")]
    BinaryUnavailable {
        task_id: String,
        #[source]
        source: krakenhashes_domain_hardware::HardwareError,
    },

    #[error("no active task with id {0}")]
    NotFound(String),
}
