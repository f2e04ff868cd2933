//! Per-tick snapshots parsed from the cracking subprocess's status stream.

use serde::{Deserialize, Serialize};

use crate::cracked::CrackedHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatusTag {
    Running,
    Completed,
    Failed,
    /// Carries only cracked hashes; aggregate progress fields are zeroed
    /// and must not overwrite the last known real progress downstream.
    Cracked,
}

impl JobStatusTag {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatusTag::Completed | JobStatusTag::Failed)
    }
}

/// Per-device speed/temperature sample attached to a progress tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetric {
    pub device_id: u32,
    pub hash_rate: u64,
    pub temperature_celsius: Option<f32>,
    pub utilization_percent: Option<f32>,
}

/// One parsed snapshot from the subprocess, corresponding to a single
/// status tick (or a cracks-only tick when `status == Cracked`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub task_id: String,
    pub keyspace_processed: u64,
    pub effective_progress: u64,
    pub progress_percent: f64,
    pub total_effective_keyspace: Option<u64>,
    pub hash_rate: u64,
    pub time_remaining_seconds: Option<u64>,
    pub cracked_count: u32,
    pub cracked_hashes: Vec<CrackedHash>,
    pub device_metrics: Vec<DeviceMetric>,
    pub status: JobStatusTag,
    pub error_message: Option<String>,
    /// Hashcat status code 6 ("all hashes cracked") is trusted as
    /// authoritative the moment it is observed; no re-verification against
    /// the central hash store is performed.
    pub all_hashes_cracked: bool,
    pub is_first_update: bool,
}

impl JobProgress {
    /// hashcat's terminal status code meaning every hash in the list has
    /// been recovered.
    pub const ALL_CRACKED_STATUS_CODE: i32 = 6;

    pub fn percent_from_totals(processed: u64, total: Option<u64>) -> f64 {
        match total {
            Some(total) if total > 0 => (processed as f64 / total as f64) * 100.0,
            _ => 0.0,
        }
    }
}
