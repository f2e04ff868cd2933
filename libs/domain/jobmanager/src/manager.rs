//! Top-level agent controller (spec component C8): accepts one assignment
//! at a time, prepares its inputs, drives the subprocess through the
//! Executor, and keeps the coordinator and the local state machine in sync.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Notify, RwLock};
use tracing::{error, info, warn};

use krakenhashes_domain_hardware::{DeviceDetector, HardwareMonitor};
use krakenhashes_domain_models::{
    CompletedTaskInfo, JobProgress, JobStatusTag, TaskAssignment,
};
use krakenhashes_domain_state::{State, TaskStateMachine};
use krakenhashes_infra_executor::Executor;
use krakenhashes_infra_sync::{
    cleanup_association_wordlist, ensure_association_wordlist, ensure_hashlist,
    ensure_rule_chunks, DataLayout, HttpSyncClient,
};
use krakenhashes_infra_transport::OutboundMessage;

use crate::callbacks::{AckResend, CoordinatorLink};
use crate::config::JobManagerConfig;
use crate::errors::JobManagerError;

struct ActiveJob {
    assignment: TaskAssignment,
    last_progress: Arc<RwLock<Option<JobProgress>>>,
    cancel: Arc<Notify>,
    association_wordlist: Option<PathBuf>,
}

struct Inner {
    config: JobManagerConfig,
    state: Arc<TaskStateMachine>,
    executor: Arc<Executor>,
    hardware: Arc<HardwareMonitor>,
    sync_client: Arc<HttpSyncClient>,
    layout: Arc<DataLayout>,
    coordinator: Arc<dyn CoordinatorLink>,
    extra_params: Vec<String>,
    active: RwLock<HashMap<String, ActiveJob>>,
    last_completed: RwLock<Option<CompletedTaskInfo>>,
    pending_completion: RwLock<Option<CompletedTaskInfo>>,
}

/// Cheap to clone: every clone shares the same underlying state via `Arc`.
#[derive(Clone)]
pub struct JobManager(Arc<Inner>);

impl JobManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Arc<TaskStateMachine>,
        executor: Arc<Executor>,
        hardware: Arc<HardwareMonitor>,
        sync_client: Arc<HttpSyncClient>,
        layout: Arc<DataLayout>,
        coordinator: Arc<dyn CoordinatorLink>,
        extra_params: Vec<String>,
        config: JobManagerConfig,
    ) -> Self {
        JobManager(Arc::new(Inner {
            config,
            state,
            executor,
            hardware,
            sync_client,
            layout,
            coordinator,
            extra_params,
            active: RwLock::new(HashMap::new()),
            last_completed: RwLock::new(None),
            pending_completion: RwLock::new(None),
        }))
    }

    /// Assignment pipeline, steps 1-6 of spec.md §4.7. Rejects outright if a
    /// task is already active; any preparation or launch failure is reported
    /// to the coordinator as `AssignmentRejected` before returning `Err`.
    pub async fn submit_assignment(&self, assignment: TaskAssignment) -> Result<(), JobManagerError> {
        let task_id = assignment.task_id.clone();

        if let Some(existing) = self.0.active.read().await.keys().next().cloned() {
            let err = JobManagerError::ConcurrentTaskRejected {
                existing,
                rejected: task_id.clone(),
            };
            self.0
                .coordinator
                .send_assignment_rejected(&task_id, err.to_string())
                .await;
            return Err(err);
        }

        if let Err(err) = self.prepare_and_launch(assignment).await {
            self.0
                .coordinator
                .send_assignment_rejected(&task_id, err.to_string())
                .await;
            return Err(err);
        }

        Ok(())
    }

    async fn prepare_and_launch(&self, assignment: TaskAssignment) -> Result<(), JobManagerError> {
        let task_id = assignment.task_id.clone();

        ensure_hashlist(&self.0.sync_client, &self.0.layout, &assignment)
            .await
            .map_err(|source| JobManagerError::Preparation {
                task_id: task_id.clone(),
                source,
            })?;

        ensure_rule_chunks(
            &self.0.sync_client,
            &self.0.layout,
            &assignment,
            self.0.config.use_jobdir_scoped_rules,
        )
        .await
        .map_err(|source| JobManagerError::Preparation {
            task_id: task_id.clone(),
            source,
        })?;

        let association_wordlist =
            ensure_association_wordlist(&self.0.sync_client, &self.0.layout, &assignment)
                .await
                .map_err(|source| JobManagerError::Preparation {
                    task_id: task_id.clone(),
                    source,
                })?;

        let detector = DeviceDetector::new(self.0.layout.root().to_path_buf())
            .with_preferred_version(assignment.preferred_binary_version.clone());
        let binary_path = detector
            .locate_binary()
            .map_err(|source| JobManagerError::BinaryUnavailable {
                task_id: task_id.clone(),
                source,
            })?;
        let working_dir = binary_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.0.layout.root().to_path_buf());
        let device_selection = self.0.hardware.device_selection_string();

        let handle = self
            .0
            .executor
            .execute_task(
                &assignment,
                &binary_path,
                &working_dir,
                &device_selection,
                &self.0.extra_params,
            )
            .await
            .map_err(|source| JobManagerError::Launch {
                task_id: task_id.clone(),
                source,
            })?;

        let cancel = Arc::new(Notify::new());
        let last_progress = Arc::new(RwLock::new(None));
        self.0.active.write().await.insert(
            task_id.clone(),
            ActiveJob {
                assignment: assignment.clone(),
                last_progress: last_progress.clone(),
                cancel: cancel.clone(),
                association_wordlist: association_wordlist.clone(),
            },
        );
        self.0.state.transition_to(State::Running, Some(task_id.clone()));

        let manager = self.clone();
        tokio::spawn(async move {
            manager
                .run_progress_monitor(
                    assignment,
                    binary_path,
                    working_dir,
                    device_selection,
                    association_wordlist,
                    handle.progress_rx,
                    handle.output_rx,
                    last_progress,
                    cancel,
                )
                .await;
        });

        info!(task_id = %task_id, "task accepted and subprocess launched");
        Ok(())
    }

    /// Signals the active job's monitor task to stop. The monitor performs
    /// the actual subprocess termination and synchronous cleanup; this just
    /// wakes it up.
    pub async fn stop_task(&self, task_id: &str) -> Result<(), JobManagerError> {
        let cancel = self
            .0
            .active
            .read()
            .await
            .get(task_id)
            .map(|job| job.cancel.clone())
            .ok_or_else(|| JobManagerError::NotFound(task_id.to_string()))?;
        cancel.notify_one();
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_progress_monitor(
        &self,
        assignment: TaskAssignment,
        binary_path: PathBuf,
        working_dir: PathBuf,
        device_selection: String,
        association_wordlist: Option<PathBuf>,
        mut progress_rx: mpsc::Receiver<JobProgress>,
        output_rx: mpsc::Receiver<krakenhashes_infra_executor::OutputLine>,
        last_progress: Arc<RwLock<Option<JobProgress>>>,
        cancel: Arc<Notify>,
    ) {
        let task_id = assignment.task_id.clone();
        let mut retries: u32 = 0;
        let mut last_status = JobStatusTag::Completed;
        let mut last_error: Option<String> = None;
        // `None` once the output reader exits, so the select arm below
        // stops polling it instead of busy-looping on a closed channel.
        let mut output_rx = Some(output_rx);

        let terminal = loop {
            tokio::select! {
                _ = cancel.notified() => {
                    let _ = self.0.executor.stop_task(&task_id).await;
                    break TerminalOutcome::Stopped;
                }
                maybe_line = recv_output(&mut output_rx) => {
                    match maybe_line {
                        Some(line) => {
                            self.0.coordinator.send_output(&task_id, line.text, line.is_error).await;
                        }
                        None => output_rx = None,
                    }
                }
                maybe = progress_rx.recv() => {
                    match maybe {
                        None => break TerminalOutcome::from_last(last_status, last_error.clone()),
                        Some(progress) => {
                            match progress.status {
                                JobStatusTag::Cracked => {
                                    if !progress.cracked_hashes.is_empty() {
                                        self.0
                                            .coordinator
                                            .send_crack_batch(&task_id, progress.cracked_hashes)
                                            .await;
                                    }
                                }
                                JobStatusTag::Running => {
                                    last_status = JobStatusTag::Running;
                                    *last_progress.write().await = Some(progress.clone());
                                    if !progress.cracked_hashes.is_empty() {
                                        self.0
                                            .coordinator
                                            .send_crack_batch(&task_id, progress.cracked_hashes.clone())
                                            .await;
                                    }
                                    self.0
                                        .coordinator
                                        .send_status(progress_to_status_message(&progress))
                                        .await;
                                }
                                JobStatusTag::Failed
                                    if self.0.executor.already_running(&task_id).await
                                        && retries < self.0.config.max_hashcat_retries =>
                                {
                                    retries += 1;
                                    warn!(task_id = %task_id, retries, "hashcat reported already running, retrying");
                                    self.0.active.write().await.remove(&task_id);
                                    tokio::time::sleep(self.0.config.hashcat_retry_delay).await;

                                    match self
                                        .0
                                        .executor
                                        .execute_task(
                                            &assignment,
                                            &binary_path,
                                            &working_dir,
                                            &device_selection,
                                            &self.0.extra_params,
                                        )
                                        .await
                                    {
                                        Ok(handle) => {
                                            progress_rx = handle.progress_rx;
                                            output_rx = Some(handle.output_rx);
                                            self.0.active.write().await.insert(
                                                task_id.clone(),
                                                ActiveJob {
                                                    assignment: assignment.clone(),
                                                    last_progress: last_progress.clone(),
                                                    cancel: cancel.clone(),
                                                    association_wordlist: association_wordlist.clone(),
                                                },
                                            );
                                        }
                                        Err(err) => {
                                            error!(task_id = %task_id, %err, "retry relaunch failed");
                                            break TerminalOutcome::Failed(Some(err.to_string()));
                                        }
                                    }
                                }
                                JobStatusTag::Completed | JobStatusTag::Failed => {
                                    last_status = progress.status;
                                    last_error = progress.error_message.clone();
                                    *last_progress.write().await = Some(progress.clone());
                                    if !progress.cracked_hashes.is_empty() {
                                        self.0
                                            .coordinator
                                            .send_crack_batch(&task_id, progress.cracked_hashes.clone())
                                            .await;
                                    }
                                    break TerminalOutcome::from_last(last_status, last_error.clone());
                                }
                            }
                        }
                    }
                }
            }
        };

        self.drain_and_finish(&task_id, &mut progress_rx, terminal).await;
    }

    /// Drains residual crack batches until the channel is idle for the
    /// configured quiescence window, emits `CrackBatchesComplete`, performs
    /// synchronous cleanup, and (for a successful run) waits for the
    /// coordinator's completion ACK before returning to Idle.
    async fn drain_and_finish(
        &self,
        task_id: &str,
        progress_rx: &mut mpsc::Receiver<JobProgress>,
        outcome: TerminalOutcome,
    ) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.0.config.drain_quiescence) => break,
                maybe = progress_rx.recv() => match maybe {
                    None => break,
                    Some(progress) => {
                        if !progress.cracked_hashes.is_empty() {
                            self.0.coordinator.send_crack_batch(task_id, progress.cracked_hashes).await;
                        }
                    }
                }
            }
        }
        self.0.coordinator.send_batches_complete(task_id).await;

        let (final_status, error_message) = outcome.into_status_and_message();
        let completed = self.synchronous_cleanup(task_id, final_status, error_message).await;

        match final_status {
            JobStatusTag::Completed => {
                self.0
                    .state
                    .transition_to(State::Completing, Some(task_id.to_string()));

                let coordinator = self.0.coordinator.clone();
                let status_message = completed_to_status_message(&completed);
                let resend: AckResend = Box::new(move || {
                    let coordinator = coordinator.clone();
                    let status_message = status_message.clone();
                    Box::pin(async move {
                        coordinator.send_status(status_message).await;
                    })
                });

                let acked = self.0.coordinator.wait_for_ack(task_id, resend).await;
                if acked {
                    *self.0.last_completed.write().await = Some(completed);
                } else {
                    warn!(task_id = %task_id, "completion ack not received, latching pending completion");
                    *self.0.pending_completion.write().await = Some(completed);
                    self.0.state.set_completion_pending(task_id.to_string());
                }
                self.0.state.transition_to(State::Idle, None);
            }
            JobStatusTag::Failed => {
                self.0
                    .state
                    .transition_to(State::Failed, Some(task_id.to_string()));
                self.0.state.transition_to(State::Idle, None);
            }
            JobStatusTag::Cracked | JobStatusTag::Running => {
                // Unreachable: the terminal-outcome translation never
                // produces these tags, but match exhaustively rather than
                // panic if that invariant is ever loosened.
                self.0.state.transition_to_idle();
            }
        }
    }

    /// Snapshots the task's final progress, removes it from the active set,
    /// and cleans up its association wordlist — in that order, so a
    /// reconnect handler querying status mid-cleanup never observes a task
    /// that is neither active nor accounted for. Success is only logged
    /// once every step above has completed.
    async fn synchronous_cleanup(
        &self,
        task_id: &str,
        final_status: JobStatusTag,
        error_message: Option<String>,
    ) -> CompletedTaskInfo {
        let job = self.0.active.write().await.remove(task_id);
        let last_progress = match &job {
            Some(job) => job.last_progress.read().await.clone(),
            None => None,
        };

        let completed = CompletedTaskInfo {
            task_id: task_id.to_string(),
            job_execution_id: job
                .as_ref()
                .map(|j| j.assignment.job_execution_id.clone())
                .unwrap_or_default(),
            keyspace_processed: last_progress.as_ref().map(|p| p.keyspace_processed).unwrap_or(0),
            effective_progress: last_progress.as_ref().map(|p| p.effective_progress).unwrap_or(0),
            progress_percent: last_progress.as_ref().map(|p| p.progress_percent).unwrap_or(0.0),
            total_effective_keyspace: last_progress.as_ref().and_then(|p| p.total_effective_keyspace),
            hash_rate: last_progress.as_ref().map(|p| p.hash_rate).unwrap_or(0),
            cracked_count: last_progress.as_ref().map(|p| p.cracked_count).unwrap_or(0),
            final_status,
            error_message,
            completed_at: Utc::now(),
        };

        if let Some(job) = &job {
            if job.assignment.is_association_mode() {
                if let Some(path) = &job.association_wordlist {
                    if let Err(err) = cleanup_association_wordlist(path).await {
                        warn!(task_id = %task_id, %err, "failed to clean up association wordlist");
                    }
                }
            }
        }

        info!(task_id = %task_id, status = ?completed.final_status, "task finished");
        completed
    }

    /// Background watchdog: forces a `Completing`-state task back to Idle if
    /// the coordinator never acknowledged completion within the detection
    /// window. Running-state stalls are the subprocess's own timeout to
    /// handle, not this watchdog's.
    pub fn spawn_watchdog(&self) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(manager.0.config.stuck_check_interval);
            loop {
                ticker.tick().await;
                manager.check_stuck_state().await;
            }
        })
    }

    async fn check_stuck_state(&self) {
        let info = self.0.state.get_state_info();
        if info.state != State::Completing {
            return;
        }
        if self.0.state.seconds_since_changed() <= self.0.config.stuck_detection_timeout.as_secs() as i64 {
            return;
        }
        if let Some(task_id) = info.task_id {
            warn!(task_id = %task_id, "stuck in Completing state past detection timeout, forcing recovery");
            self.0.active.write().await.remove(&task_id);
            self.0.state.set_completion_pending(task_id);
        }
        self.0.state.transition_to_idle();
    }

    /// Returns, in priority order: a latched pending completion, else the
    /// cached last-completed task while idle, else a live snapshot of the
    /// active task. `None` both when there is genuinely nothing to report
    /// and when state is inconsistent with `activeJobs` (logged, not
    /// panicked on).
    ///
    /// The last-completed tier is consume-on-read: once a caller observes it
    /// here, it is cleared, so a task's completion is reported at most once
    /// through this path (a latched pending completion is cleared instead by
    /// [`JobManager::acknowledge_completion`], not by this call).
    pub async fn get_current_task_status(&self) -> Option<CompletedTaskInfo> {
        if let Some(pending_id) = self.0.state.get_completion_pending() {
            let pending = self.0.pending_completion.read().await.clone();
            if let Some(info) = pending {
                if info.task_id == pending_id {
                    return Some(info);
                }
            }
        }

        let info = self.0.state.get_state_info();
        if info.state == State::Idle {
            return self.0.last_completed.write().await.take();
        }

        let Some(task_id) = info.task_id else {
            warn!(state = ?info.state, "state is non-idle but carries no task id");
            return None;
        };

        let active = self.0.active.read().await;
        match active.get(&task_id) {
            Some(job) => {
                let progress = job.last_progress.read().await.clone();
                Some(live_snapshot(&task_id, &job.assignment, progress.as_ref()))
            }
            None => {
                warn!(task_id = %task_id, state = ?info.state, "state references a task absent from activeJobs");
                None
            }
        }
    }

    /// Clears the completion-pending latch if it currently holds `task_id`.
    /// Called when a `CompletionAck` message arrives; a stale ack for a
    /// different task is a no-op.
    pub async fn acknowledge_completion(&self, task_id: &str) -> bool {
        let cleared = self.0.state.clear_completion_pending_for(task_id);
        if cleared {
            let mut pending = self.0.pending_completion.write().await;
            if pending.as_ref().map(|p| p.task_id.as_str()) == Some(task_id) {
                *pending = None;
            }
        }
        cleared
    }

    /// Forced recovery: empties `activeJobs` and delegates subprocess
    /// teardown to the Executor. Does not touch the state machine; callers
    /// that also need an unconditional drop to Idle should pair this with
    /// [`JobManager::transition_to_idle`].
    pub async fn force_cleanup(&self) {
        self.0.active.write().await.clear();
        self.0.executor.force_cleanup().await;
    }

    pub fn transition_to_idle(&self) {
        self.0.state.transition_to_idle();
    }

    /// Re-sends a task's stored cracks as a fresh `CrackBatch`, then signals
    /// `CrackBatchesComplete` again. The coordinator promises re-transmit is
    /// idempotent on its side; this never touches task state.
    pub async fn retransmit_outfile(&self, task_id: &str) -> Result<(), JobManagerError> {
        let cracked = self
            .0
            .executor
            .retransmit_outfile(task_id)
            .await
            .map_err(|source| JobManagerError::Outfile {
                task_id: task_id.to_string(),
                source,
            })?;
        if !cracked.is_empty() {
            self.0.coordinator.send_crack_batch(task_id, cracked).await;
        }
        self.0.coordinator.send_batches_complete(task_id).await;
        Ok(())
    }

    pub async fn delete_outfile(&self, task_id: &str) -> Result<(), JobManagerError> {
        self.0
            .executor
            .delete_outfile(task_id)
            .await
            .map_err(|source| JobManagerError::Outfile {
                task_id: task_id.to_string(),
                source,
            })
    }

    /// Runs a short benchmark using the currently active assignment's
    /// binary and device selection, then reports the result upstream.
    /// No-ops (with a coordinator-visible rejection) if no task is active,
    /// since a speed test needs an attack configuration to benchmark.
    pub async fn run_speed_test(
        &self,
        task_id: &str,
        duration_seconds: u64,
    ) -> Result<(), JobManagerError> {
        let assignment = {
            let active = self.0.active.read().await;
            active
                .get(task_id)
                .map(|job| job.assignment.clone())
                .ok_or_else(|| JobManagerError::NotFound(task_id.to_string()))?
        };

        let detector = DeviceDetector::new(self.0.layout.root().to_path_buf())
            .with_preferred_version(assignment.preferred_binary_version.clone());
        let binary_path = detector
            .locate_binary()
            .map_err(|source| JobManagerError::BinaryUnavailable {
                task_id: task_id.to_string(),
                source,
            })?;
        let working_dir = binary_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.0.layout.root().to_path_buf());
        let device_selection = self.0.hardware.device_selection_string();

        let result = self
            .0
            .executor
            .run_speed_test(
                &assignment,
                &binary_path,
                &working_dir,
                &device_selection,
                Duration::from_secs(duration_seconds),
            )
            .await
            .map_err(|source| JobManagerError::Launch {
                task_id: task_id.to_string(),
                source,
            })?;

        self.0
            .coordinator
            .send_speed_test_result(
                task_id,
                result.overall_hash_rate,
                result.device_speeds,
                result.estimated_total_keyspace,
            )
            .await;
        Ok(())
    }
}

/// What the monitor loop decided the task's outcome was, independent of how
/// it got there (terminal tick, channel closing, or cancellation).
enum TerminalOutcome {
    Completed,
    Failed(Option<String>),
    Stopped,
}

impl TerminalOutcome {
    fn from_last(status: JobStatusTag, error: Option<String>) -> Self {
        match status {
            JobStatusTag::Failed => TerminalOutcome::Failed(error),
            _ => TerminalOutcome::Completed,
        }
    }

    fn into_status_and_message(self) -> (JobStatusTag, Option<String>) {
        match self {
            TerminalOutcome::Completed => (JobStatusTag::Completed, None),
            TerminalOutcome::Failed(message) => (JobStatusTag::Failed, message),
            // JobStatusTag has no "stopped" variant; a coordinator-initiated
            // stop is reported upstream as a failure with an explanatory
            // message rather than inventing a wire-incompatible status.
            TerminalOutcome::Stopped => (
                JobStatusTag::Failed,
                Some("task stopped by coordinator".to_string()),
            ),
        }
    }
}

/// Awaits the next output line, or never resolves once the channel has
/// already been taken away (closed). Keeps the progress-monitor `select!`
/// from busy-spinning on an exhausted receiver.
async fn recv_output(
    output_rx: &mut Option<mpsc::Receiver<krakenhashes_infra_executor::OutputLine>>,
) -> Option<krakenhashes_infra_executor::OutputLine> {
    match output_rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn progress_to_status_message(progress: &JobProgress) -> OutboundMessage {
    OutboundMessage::JobStatus {
        task_id: progress.task_id.clone(),
        keyspace_processed: progress.keyspace_processed,
        effective_progress: progress.effective_progress,
        progress_percent: progress.progress_percent,
        total_effective_keyspace: progress.total_effective_keyspace,
        is_first_update: progress.is_first_update,
        hash_rate: progress.hash_rate,
        time_remaining_seconds: progress.time_remaining_seconds,
        cracked_count: progress.cracked_count,
        status: progress.status,
        error_message: progress.error_message.clone(),
        device_metrics: progress.device_metrics.clone(),
        all_hashes_cracked: progress.all_hashes_cracked,
    }
}

fn completed_to_status_message(completed: &CompletedTaskInfo) -> OutboundMessage {
    OutboundMessage::JobStatus {
        task_id: completed.task_id.clone(),
        keyspace_processed: completed.keyspace_processed,
        effective_progress: completed.effective_progress,
        progress_percent: completed.progress_percent,
        total_effective_keyspace: completed.total_effective_keyspace,
        is_first_update: false,
        hash_rate: completed.hash_rate,
        time_remaining_seconds: Some(0),
        cracked_count: completed.cracked_count,
        status: completed.final_status,
        error_message: completed.error_message.clone(),
        device_metrics: Vec::new(),
        all_hashes_cracked: completed.final_status == JobStatusTag::Completed,
    }
}

fn live_snapshot(task_id: &str, assignment: &TaskAssignment, progress: Option<&JobProgress>) -> CompletedTaskInfo {
    CompletedTaskInfo {
        task_id: task_id.to_string(),
        job_execution_id: assignment.job_execution_id.clone(),
        keyspace_processed: progress.map(|p| p.keyspace_processed).unwrap_or(0),
        effective_progress: progress.map(|p| p.effective_progress).unwrap_or(0),
        progress_percent: progress.map(|p| p.progress_percent).unwrap_or(0.0),
        total_effective_keyspace: progress.and_then(|p| p.total_effective_keyspace),
        hash_rate: progress.map(|p| p.hash_rate).unwrap_or(0),
        cracked_count: progress.map(|p| p.cracked_count).unwrap_or(0),
        final_status: JobStatusTag::Running,
        error_message: None,
        completed_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use krakenhashes_infra_outfile::OutfileStore;

    struct RecordingCoordinator {
        statuses: std::sync::Mutex<Vec<OutboundMessage>>,
        rejections: AtomicUsize,
    }

    impl RecordingCoordinator {
        fn new() -> Self {
            Self {
                statuses: std::sync::Mutex::new(Vec::new()),
                rejections: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl CoordinatorLink for RecordingCoordinator {
        async fn send_status(&self, status: OutboundMessage) {
            self.statuses.lock().expect("lock poisoned").push(status);
        }
        async fn send_crack_batch(&self, _task_id: &str, _cracked_hashes: Vec<krakenhashes_domain_models::CrackedHash>) {}
        async fn send_batches_complete(&self, _task_id: &str) {}
        async fn send_output(&self, _task_id: &str, _text: String, _is_error: bool) {}
        async fn send_assignment_rejected(&self, _task_id: &str, _error: String) {
            self.rejections.fetch_add(1, Ordering::SeqCst);
        }
        async fn send_speed_test_result(
            &self,
            _task_id: &str,
            _hash_rate: u64,
            _device_metrics: Vec<krakenhashes_domain_models::DeviceMetric>,
            _estimated_total_keyspace: Option<u64>,
        ) {
        }
        async fn send_log_entries(&self, _entries: Vec<krakenhashes_infra_logbuffer::LogEntry>) {}
        async fn wait_for_ack(&self, _task_id: &str, _resend: AckResend) -> bool {
            true
        }
    }

    fn manager_with(coordinator: Arc<RecordingCoordinator>) -> (JobManager, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let outfile_store = Arc::new(OutfileStore::new(dir.path()));
        let manager = JobManager::new(
            Arc::new(TaskStateMachine::new()),
            Arc::new(Executor::new(outfile_store)),
            Arc::new(HardwareMonitor::new(dir.path())),
            Arc::new(HttpSyncClient::new("http://localhost", "token")),
            Arc::new(DataLayout::new(dir.path())),
            coordinator,
            Vec::new(),
            JobManagerConfig::default(),
        );
        (manager, dir)
    }

    fn assignment(task_id: &str) -> TaskAssignment {
        TaskAssignment {
            task_id: task_id.to_string(),
            job_execution_id: "job-1".into(),
            hashlist_id: 1,
            hashlist_path: "hashlists/1.hash".into(),
            attack_mode: 0,
            hash_type: 0,
            wordlist_paths: vec![],
            rule_paths: vec![],
            mask: None,
            increment_mode: false,
            increment_min: None,
            increment_max: None,
            keyspace_start: 0,
            keyspace_end: 100,
            chunk_id: None,
            output_path: None,
            preferred_binary_version: None,
        }
    }

    #[tokio::test]
    async fn concurrent_assignment_is_rejected_without_touching_executor() {
        let coordinator = Arc::new(RecordingCoordinator::new());
        let (manager, _dir) = manager_with(coordinator.clone());

        manager
            .0
            .active
            .write()
            .await
            .insert(
                "already-active".into(),
                ActiveJob {
                    assignment: assignment("already-active"),
                    last_progress: Arc::new(RwLock::new(None)),
                    cancel: Arc::new(Notify::new()),
                    association_wordlist: None,
                },
            );

        let result = manager.submit_assignment(assignment("new-task")).await;
        assert!(matches!(result, Err(JobManagerError::ConcurrentTaskRejected { .. })));
        assert_eq!(coordinator.rejections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_task_on_unknown_id_returns_not_found() {
        let coordinator = Arc::new(RecordingCoordinator::new());
        let (manager, _dir) = manager_with(coordinator);
        let result = manager.stop_task("missing").await;
        assert!(matches!(result, Err(JobManagerError::NotFound(_))));
    }

    #[tokio::test]
    async fn status_is_none_when_idle_with_no_history() {
        let coordinator = Arc::new(RecordingCoordinator::new());
        let (manager, _dir) = manager_with(coordinator);
        assert!(manager.get_current_task_status().await.is_none());
    }

    #[tokio::test]
    async fn last_completed_is_reported_once_then_cleared() {
        let coordinator = Arc::new(RecordingCoordinator::new());
        let (manager, _dir) = manager_with(coordinator);
        *manager.0.last_completed.write().await = Some(CompletedTaskInfo {
            task_id: "t-1".into(),
            job_execution_id: "job-1".into(),
            keyspace_processed: 100,
            effective_progress: 100,
            progress_percent: 100.0,
            total_effective_keyspace: Some(100),
            hash_rate: 0,
            cracked_count: 0,
            final_status: JobStatusTag::Completed,
            error_message: None,
            completed_at: Utc::now(),
        });

        let first = manager.get_current_task_status().await;
        assert!(matches!(first, Some(info) if info.task_id == "t-1"));
        assert!(manager.get_current_task_status().await.is_none());
    }

    #[tokio::test]
    async fn acknowledge_completion_clears_only_the_matching_latch() {
        let coordinator = Arc::new(RecordingCoordinator::new());
        let (manager, _dir) = manager_with(coordinator);
        manager.0.state.set_completion_pending("t-1".into());

        assert!(!manager.acknowledge_completion("t-2").await);
        assert!(manager.acknowledge_completion("t-1").await);
        assert_eq!(manager.0.state.get_completion_pending(), None);
    }

    #[tokio::test]
    async fn force_cleanup_empties_active_jobs() {
        let coordinator = Arc::new(RecordingCoordinator::new());
        let (manager, _dir) = manager_with(coordinator);
        manager.0.active.write().await.insert(
            "t-1".into(),
            ActiveJob {
                assignment: assignment("t-1"),
                last_progress: Arc::new(RwLock::new(None)),
                cancel: Arc::new(Notify::new()),
                association_wordlist: None,
            },
        );
        manager.force_cleanup().await;
        assert!(manager.0.active.read().await.is_empty());
    }
}
