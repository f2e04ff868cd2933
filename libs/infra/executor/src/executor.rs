//! Top-level subprocess supervisor (C6): one entry per active task, plus
//! thin passthroughs to the outfile store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use krakenhashes_domain_models::{CrackedHash, DeviceMetric, JobProgress, TaskAssignment};
use krakenhashes_infra_outfile::{OutfileError, OutfileStore};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::args::{build_args, build_speed_test_args};
use crate::errors::ExecutorError;
use crate::process::{request_graceful_quit, spawn_supervised, OutputLine};

const GRACEFUL_STOP_WINDOW: Duration = Duration::from_secs(5);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Clone)]
struct ActiveTask {
    child: Arc<Mutex<Child>>,
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    already_running: Arc<AtomicBool>,
    last_progress: Arc<RwLock<Option<JobProgress>>>,
}

/// Both channels a freshly launched task hands back to its caller: parsed
/// progress ticks and raw output lines for remote log viewing.
pub struct ExecutionHandle {
    pub progress_rx: mpsc::Receiver<JobProgress>,
    pub output_rx: mpsc::Receiver<OutputLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeedTestResult {
    pub overall_hash_rate: u64,
    pub device_speeds: Vec<DeviceMetric>,
    pub estimated_total_keyspace: Option<u64>,
}

pub struct Executor {
    active: RwLock<HashMap<String, ActiveTask>>,
    outfile_store: Arc<OutfileStore>,
}

impl Executor {
    pub fn new(outfile_store: Arc<OutfileStore>) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            outfile_store,
        }
    }

    pub async fn execute_task(
        &self,
        assignment: &TaskAssignment,
        binary_path: &Path,
        working_dir: &Path,
        device_selection: &str,
        extra_params: &[String],
    ) -> Result<ExecutionHandle, ExecutorError> {
        if self.active.read().await.contains_key(&assignment.task_id) {
            return Err(ExecutorError::AlreadyActive(assignment.task_id.clone()));
        }

        let args = build_args(assignment, device_selection, extra_params);
        let hashcat_outfile_path = assignment.output_path.as_ref().map(std::path::PathBuf::from);

        let spawned = spawn_supervised(
            binary_path,
            working_dir,
            args,
            assignment.task_id.clone(),
            hashcat_outfile_path,
            self.outfile_store.clone(),
        )
        .await?;

        let active = ActiveTask {
            child: spawned.child,
            stdin: Arc::new(Mutex::new(spawned.stdin_sender)),
            already_running: spawned.already_running,
            last_progress: spawned.last_progress,
        };
        self.active
            .write()
            .await
            .insert(assignment.task_id.clone(), active);

        info!(task_id = %assignment.task_id, "subprocess launched");
        Ok(ExecutionHandle {
            progress_rx: spawned.progress_rx,
            output_rx: spawned.output_rx,
        })
    }

    pub async fn already_running(&self, task_id: &str) -> bool {
        match self.active.read().await.get(task_id) {
            Some(task) => task.already_running.load(Ordering::SeqCst),
            None => false,
        }
    }

    /// Sends the interactive quit keystroke, waits up to a bounded window
    /// for a clean exit, then forcibly kills.
    pub async fn stop_task(&self, task_id: &str) -> Result<(), ExecutorError> {
        let task = self
            .active
            .write()
            .await
            .remove(task_id)
            .ok_or_else(|| ExecutorError::NotFound(task_id.to_string()))?;

        request_graceful_quit(&mut *task.stdin.lock().await).await;

        let deadline = Instant::now() + GRACEFUL_STOP_WINDOW;
        loop {
            {
                let mut child = task.child.lock().await;
                if matches!(child.try_wait(), Ok(Some(_))) {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                warn!(task_id, "subprocess unresponsive to graceful quit, killing");
                let mut child = task.child.lock().await;
                let _ = child.start_kill();
                return Ok(());
            }
            sleep(STOP_POLL_INTERVAL).await;
        }
    }

    pub async fn get_task_progress(&self, task_id: &str) -> Result<Option<JobProgress>, ExecutorError> {
        let task = self
            .active
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| ExecutorError::NotFound(task_id.to_string()))?;
        let progress = task.last_progress.read().await.clone();
        Ok(progress)
    }

    pub async fn get_active_task_ids(&self) -> Vec<String> {
        self.active.read().await.keys().cloned().collect()
    }

    /// Kills every active subprocess and drops all bookkeeping. Used when
    /// the Job Manager needs to discard state it can no longer trust.
    pub async fn force_cleanup(&self) {
        let mut active = self.active.write().await;
        for (task_id, task) in active.drain() {
            let mut child = task.child.lock().await;
            if let Err(err) = child.start_kill() {
                warn!(task_id, %err, "failed to kill subprocess during force cleanup");
            }
        }
    }

    /// Runs a short benchmark; does not register the subprocess in
    /// `active` and never affects task state transitions.
    pub async fn run_speed_test(
        &self,
        assignment: &TaskAssignment,
        binary_path: &Path,
        working_dir: &Path,
        device_selection: &str,
        duration: Duration,
    ) -> Result<SpeedTestResult, ExecutorError> {
        let args = build_speed_test_args(assignment, device_selection, duration.as_secs());
        let probe_id = format!("speedtest-{}", assignment.task_id);

        let mut spawned = spawn_supervised(
            binary_path,
            working_dir,
            args,
            probe_id.clone(),
            None,
            self.outfile_store.clone(),
        )
        .await?;

        let mut last = None;
        let collection_window = duration + Duration::from_secs(5);
        let deadline = Instant::now() + collection_window;
        while Instant::now() < deadline {
            match tokio::time::timeout(
                deadline.saturating_duration_since(Instant::now()),
                spawned.progress_rx.recv(),
            )
            .await
            {
                Ok(Some(progress)) => last = Some(progress),
                Ok(None) => break,
                Err(_) => break,
            }
        }

        let _ = spawned.child.lock().await.start_kill();

        let progress = last.unwrap_or(JobProgress {
            task_id: probe_id,
            keyspace_processed: 0,
            effective_progress: 0,
            progress_percent: 0.0,
            total_effective_keyspace: None,
            hash_rate: 0,
            time_remaining_seconds: None,
            cracked_count: 0,
            cracked_hashes: Vec::new(),
            device_metrics: Vec::new(),
            status: krakenhashes_domain_models::JobStatusTag::Completed,
            error_message: None,
            all_hashes_cracked: false,
            is_first_update: true,
        });

        Ok(SpeedTestResult {
            overall_hash_rate: progress.hash_rate,
            device_speeds: progress.device_metrics,
            estimated_total_keyspace: progress.total_effective_keyspace,
        })
    }

    pub async fn retransmit_outfile(&self, task_id: &str) -> Result<Vec<CrackedHash>, OutfileError> {
        self.outfile_store.retransmit(task_id).await
    }

    pub async fn delete_outfile(&self, task_id: &str) -> Result<(), OutfileError> {
        self.outfile_store.delete(task_id).await
    }

    pub async fn get_pending_outfiles(
        &self,
        active_task_id: Option<&str>,
    ) -> Result<Vec<String>, OutfileError> {
        self.outfile_store.list_pending(active_task_id).await
    }

    pub async fn get_outfile_line_count(&self, task_id: &str) -> Result<usize, OutfileError> {
        self.outfile_store.line_count(task_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_task_on_unknown_id_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(OutfileStore::new(dir.path()));
        let executor = Executor::new(store);
        let result = executor.stop_task("missing").await;
        assert!(matches!(result, Err(ExecutorError::NotFound(_))));
    }

    #[tokio::test]
    async fn get_active_task_ids_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(OutfileStore::new(dir.path()));
        let executor = Executor::new(store);
        assert!(executor.get_active_task_ids().await.is_empty());
    }

    #[tokio::test]
    async fn outfile_passthroughs_reach_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(OutfileStore::new(dir.path()));
        let executor = Executor::new(store);

        let records = executor
            .retransmit_outfile("task-1")
            .await
            .expect("retransmit on absent file is empty, not an error");
        assert!(records.is_empty());
        assert_eq!(executor.get_outfile_line_count("task-1").await.unwrap(), 0);
    }
}
