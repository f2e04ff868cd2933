//! The set of inbound/outbound messages the Job Manager exchanges with the
//! coordinator over the framed transport.

use krakenhashes_domain_models::{CrackedHash, DeviceMetric, JobStatusTag};
use krakenhashes_infra_logbuffer::LogEntry;
use serde::{Deserialize, Serialize};

/// Sent by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutboundMessage {
    JobStatus {
        task_id: String,
        keyspace_processed: u64,
        effective_progress: u64,
        progress_percent: f64,
        total_effective_keyspace: Option<u64>,
        is_first_update: bool,
        hash_rate: u64,
        time_remaining_seconds: Option<u64>,
        cracked_count: u32,
        status: JobStatusTag,
        error_message: Option<String>,
        device_metrics: Vec<DeviceMetric>,
        all_hashes_cracked: bool,
    },
    CrackBatch {
        task_id: String,
        cracked_hashes: Vec<CrackedHash>,
    },
    CrackBatchesComplete {
        task_id: String,
    },
    AssignmentRejected {
        task_id: String,
        error: String,
    },
    OutputChunk {
        task_id: String,
        text: String,
        is_error: bool,
    },
    SpeedTestResult {
        task_id: String,
        hash_rate: u64,
        device_metrics: Vec<DeviceMetric>,
        estimated_total_keyspace: Option<u64>,
    },
    LogEntries {
        entries: Vec<LogEntry>,
    },
}

/// Received by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InboundMessage {
    JobTaskAssignment(krakenhashes_domain_models::TaskAssignment),
    CompletionAck {
        task_id: String,
    },
    StopJob {
        task_id: String,
    },
    RetransmitOutfile {
        task_id: String,
    },
    DeleteOutfile {
        task_id: String,
    },
    SpeedTestRequest {
        task_id: String,
        duration_seconds: u64,
    },
    LogRequest {
        hours_back: u32,
        include_all: bool,
    },
}
