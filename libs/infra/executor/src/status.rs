//! Parses one status-JSON line emitted by the cracking binary into a
//! [`JobProgress`].

use krakenhashes_domain_models::{CrackedHash, DeviceMetric, JobProgress, JobStatusTag};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawDevice {
    device_id: u32,
    speed: u64,
    temp: Option<f32>,
    util: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RawStatus {
    status: i32,
    progress: [u64; 2],
    devices: Vec<RawDevice>,
    #[serde(default)]
    time_estimated: Option<u64>,
    #[serde(default)]
    recovered_count: u32,
    #[serde(default)]
    message: Option<String>,
}

/// `None` if the line is not a well-formed status record (hashcat also
/// emits plain diagnostic text on the same stream).
pub fn parse_status_line(task_id: &str, line: &str, is_first_update: bool) -> Option<JobProgress> {
    let raw: RawStatus = serde_json::from_str(line.trim()).ok()?;

    let [processed, total] = raw.progress;
    let total = if total > 0 { Some(total) } else { None };
    let all_hashes_cracked = raw.status == JobProgress::ALL_CRACKED_STATUS_CODE;

    let status = if all_hashes_cracked {
        JobStatusTag::Completed
    } else if raw.status < 0 {
        JobStatusTag::Failed
    } else {
        JobStatusTag::Running
    };

    let device_metrics = raw
        .devices
        .into_iter()
        .map(|d| DeviceMetric {
            device_id: d.device_id,
            hash_rate: d.speed,
            temperature_celsius: d.temp,
            utilization_percent: d.util,
        })
        .collect::<Vec<_>>();

    let hash_rate = device_metrics.iter().map(|d| d.hash_rate).sum();

    Some(JobProgress {
        task_id: task_id.to_string(),
        keyspace_processed: processed,
        effective_progress: processed,
        progress_percent: if all_hashes_cracked {
            100.0
        } else {
            JobProgress::percent_from_totals(processed, total)
        },
        total_effective_keyspace: total,
        hash_rate,
        time_remaining_seconds: raw.time_estimated,
        cracked_count: raw.recovered_count,
        cracked_hashes: Vec::new(),
        device_metrics,
        status,
        error_message: raw.message,
        all_hashes_cracked,
        is_first_update,
    })
}

/// A tick that carries cracks only, with aggregate progress fields left at
/// zero so it cannot overwrite the last known real progress downstream.
pub fn cracks_only_tick(task_id: &str, cracked_hashes: Vec<CrackedHash>) -> JobProgress {
    let cracked_count = cracked_hashes.len() as u32;
    JobProgress {
        task_id: task_id.to_string(),
        keyspace_processed: 0,
        effective_progress: 0,
        progress_percent: 0.0,
        total_effective_keyspace: None,
        hash_rate: 0,
        time_remaining_seconds: None,
        cracked_count,
        cracked_hashes,
        device_metrics: Vec::new(),
        status: JobStatusTag::Cracked,
        error_message: None,
        all_hashes_cracked: false,
        is_first_update: false,
    }
}

/// A terminal tick synthesized when the subprocess exits non-zero without
/// ever emitting its own terminal status line (e.g. a mid-run crash).
pub fn crashed_tick(task_id: &str, exit_code: Option<i32>) -> JobProgress {
    JobProgress {
        task_id: task_id.to_string(),
        keyspace_processed: 0,
        effective_progress: 0,
        progress_percent: 0.0,
        total_effective_keyspace: None,
        hash_rate: 0,
        time_remaining_seconds: None,
        cracked_count: 0,
        cracked_hashes: Vec::new(),
        device_metrics: Vec::new(),
        status: JobStatusTag::Failed,
        error_message: Some(format!("subprocess crashed: exit {exit_code:?}")),
        all_hashes_cracked: false,
        is_first_update: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_running_status() {
        let line = r#"{"status":3,"progress":[500,1000],"devices":[{"device_id":0,"speed":123456,"temp":65.0,"util":98.0}]}"#;
        let progress = parse_status_line("t1", line, false).expect("parses");
        assert_eq!(progress.keyspace_processed, 500);
        assert_eq!(progress.total_effective_keyspace, Some(1000));
        assert_eq!(progress.progress_percent, 50.0);
        assert_eq!(progress.hash_rate, 123456);
        assert!(!progress.all_hashes_cracked);
        assert_eq!(progress.status, JobStatusTag::Running);
    }

    #[test]
    fn status_code_six_is_authoritative_completion() {
        let line = r#"{"status":6,"progress":[999,1000],"devices":[]}"#;
        let progress = parse_status_line("t1", line, false).expect("parses");
        assert!(progress.all_hashes_cracked);
        assert_eq!(progress.progress_percent, 100.0);
        assert_eq!(progress.status, JobStatusTag::Completed);
    }

    #[test]
    fn malformed_line_returns_none() {
        assert!(parse_status_line("t1", "not json at all", false).is_none());
    }

    #[test]
    fn crashed_tick_is_a_terminal_failure() {
        let tick = crashed_tick("t1", Some(139));
        assert_eq!(tick.status, JobStatusTag::Failed);
        assert!(tick.error_message.as_ref().unwrap().contains("139"));
    }

    #[test]
    fn cracks_only_tick_does_not_carry_aggregate_progress() {
        let cracked = CrackedHash {
            original_hash: "h".into(),
            plaintext: "p".into(),
            username: None,
            domain: None,
            hash_type_id: 0,
            timestamp: chrono::Utc::now(),
        };
        let tick = cracks_only_tick("t1", vec![cracked]);
        assert_eq!(tick.status, JobStatusTag::Cracked);
        assert_eq!(tick.progress_percent, 0.0);
        assert_eq!(tick.cracked_count, 1);
    }
}
