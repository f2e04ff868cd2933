//! Snapshot of a task's outcome, captured synchronously at task end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::progress::JobStatusTag;

/// Captured the instant a task reaches a terminal status, before
/// `activeJobs` is cleared, so a reconnect handler can answer "what
/// happened to the last task?" without racing the cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTaskInfo {
    pub task_id: String,
    pub job_execution_id: String,
    pub keyspace_processed: u64,
    pub effective_progress: u64,
    pub progress_percent: f64,
    pub total_effective_keyspace: Option<u64>,
    pub hash_rate: u64,
    pub cracked_count: u32,
    pub final_status: JobStatusTag,
    pub error_message: Option<String>,
    pub completed_at: DateTime<Utc>,
}
