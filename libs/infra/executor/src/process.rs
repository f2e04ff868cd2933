//! Drives one supervised subprocess: reads its status stream, incrementally
//! harvests cracks from its native outfile, and forwards both onto a
//! bounded [`JobProgress`] channel.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use krakenhashes_domain_models::{CrackedHash, JobProgress};
use krakenhashes_infra_outfile::OutfileStore;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::errors::ExecutorError;
use crate::status::{cracks_only_tick, crashed_tick, parse_status_line};

const PROGRESS_CHANNEL_CAPACITY: usize = 64;
const OUTPUT_CHANNEL_CAPACITY: usize = 256;
const ALREADY_RUNNING_MARKERS: [&str; 2] = ["already an instance", "already running"];

/// One raw line of subprocess output, relayed upward for the coordinator's
/// remote log viewer. Distinct from [`JobProgress`], which only carries
/// lines that parsed as a status record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub text: String,
    pub is_error: bool,
}

pub struct SpawnedProcess {
    pub child: Arc<Mutex<Child>>,
    pub stdin_sender: Option<tokio::process::ChildStdin>,
    pub progress_rx: mpsc::Receiver<JobProgress>,
    pub output_rx: mpsc::Receiver<OutputLine>,
    pub already_running: Arc<AtomicBool>,
    pub last_progress: Arc<RwLock<Option<JobProgress>>>,
}

pub async fn spawn_supervised(
    binary_path: &Path,
    working_dir: &Path,
    args: Vec<String>,
    task_id: String,
    hashcat_outfile_path: Option<PathBuf>,
    outfile_store: Arc<OutfileStore>,
) -> Result<SpawnedProcess, ExecutorError> {
    let mut command = Command::new(binary_path);
    command
        .args(&args)
        .current_dir(working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|source| ExecutorError::SubprocessLaunchFailed {
            task_id: task_id.clone(),
            source,
        })?;

    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");
    let stdin = child.stdin.take();
    let child = Arc::new(Mutex::new(child));

    let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    let (output_tx, output_rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
    let already_running = Arc::new(AtomicBool::new(false));
    let last_progress = Arc::new(RwLock::new(None));

    spawn_stdout_reader(
        stdout,
        child.clone(),
        task_id.clone(),
        hashcat_outfile_path,
        outfile_store,
        progress_tx.clone(),
        output_tx.clone(),
        already_running.clone(),
        last_progress.clone(),
    );
    spawn_stderr_reader(stderr, task_id.clone(), output_tx, already_running.clone());

    Ok(SpawnedProcess {
        child,
        stdin_sender: stdin,
        progress_rx,
        output_rx,
        already_running,
        last_progress,
    })
}

#[allow(clippy::too_many_arguments)]
fn spawn_stdout_reader(
    stdout: tokio::process::ChildStdout,
    child: Arc<Mutex<Child>>,
    task_id: String,
    hashcat_outfile_path: Option<PathBuf>,
    outfile_store: Arc<OutfileStore>,
    progress_tx: mpsc::Sender<JobProgress>,
    output_tx: mpsc::Sender<OutputLine>,
    already_running: Arc<AtomicBool>,
    last_progress: Arc<RwLock<Option<JobProgress>>>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        let mut is_first_update = true;
        let mut cracks_seen = 0usize;
        let mut saw_terminal_tick = false;

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => {
                    warn!(task_id, %err, "error reading subprocess stdout");
                    break;
                }
            };

            let _ = output_tx
                .send(OutputLine {
                    text: line.clone(),
                    is_error: false,
                })
                .await;

            if ALREADY_RUNNING_MARKERS
                .iter()
                .any(|marker| line.to_lowercase().contains(marker))
            {
                already_running.store(true, Ordering::SeqCst);
                continue;
            }

            let Some(mut progress) = parse_status_line(&task_id, &line, is_first_update) else {
                continue;
            };
            is_first_update = false;

            if let Some(path) = &hashcat_outfile_path {
                let new_cracks = harvest_new_cracks(path, &mut cracks_seen).await;
                for cracked in &new_cracks {
                    if let Err(err) = outfile_store.append(&task_id, cracked).await {
                        warn!(task_id, %err, "failed to append crack to outfile store");
                    }
                }
                if !new_cracks.is_empty() && progress.status != krakenhashes_domain_models::JobStatusTag::Cracked {
                    progress.cracked_hashes = new_cracks;
                }
            }

            *last_progress.write().await = Some(progress.clone());
            let terminal = progress.status.is_terminal();
            if progress_tx.send(progress).await.is_err() {
                break;
            }
            if terminal {
                saw_terminal_tick = true;
                break;
            }
        }

        if !saw_terminal_tick {
            report_if_crashed(&task_id, &child, &progress_tx, &last_progress).await;
        }
        debug!(task_id, "stdout reader exiting");
    });
}

/// Called when the stdout stream ended without the subprocess ever emitting
/// its own terminal status line. Waits on the real exit status and, if it
/// is non-zero, synthesizes a `Failed` tick so a mid-run crash is reported
/// instead of silently falling through to "completed".
async fn report_if_crashed(
    task_id: &str,
    child: &Arc<Mutex<Child>>,
    progress_tx: &mpsc::Sender<JobProgress>,
    last_progress: &Arc<RwLock<Option<JobProgress>>>,
) {
    let status = child.lock().await.wait().await;
    let exit_code = match status {
        Ok(status) if status.success() => return,
        Ok(status) => status.code(),
        Err(err) => {
            warn!(task_id, %err, "failed to read subprocess exit status");
            None
        }
    };

    let err = ExecutorError::SubprocessCrashed {
        task_id: task_id.to_string(),
        exit_code,
        message: "exited without emitting a terminal status tick".to_string(),
    };
    warn!(task_id, %err, "subprocess crashed");
    let crashed = crashed_tick(task_id, exit_code);
    *last_progress.write().await = Some(crashed.clone());
    let _ = progress_tx.send(crashed).await;
}

fn spawn_stderr_reader(
    stderr: tokio::process::ChildStderr,
    task_id: String,
    output_tx: mpsc::Sender<OutputLine>,
    already_running: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if ALREADY_RUNNING_MARKERS
                .iter()
                .any(|marker| line.to_lowercase().contains(marker))
            {
                already_running.store(true, Ordering::SeqCst);
            }
            info!(task_id, stderr = %line, "subprocess stderr");
            let _ = output_tx
                .send(OutputLine {
                    text: line,
                    is_error: true,
                })
                .await;
        }
    });
}

/// Reads the hashcat-native outfile (`hash:plaintext` per line) and returns
/// any lines beyond the previously observed count.
async fn harvest_new_cracks(path: &Path, seen: &mut usize) -> Vec<CrackedHash> {
    let Ok(contents) = tokio::fs::read_to_string(path).await else {
        return Vec::new();
    };

    let lines: Vec<&str> = contents.lines().filter(|l| !l.is_empty()).collect();
    if lines.len() <= *seen {
        return Vec::new();
    }

    let fresh = &lines[*seen..];
    let records = fresh
        .iter()
        .filter_map(|line| {
            let (hash, plaintext) = line.split_once(':')?;
            Some(CrackedHash {
                original_hash: hash.to_string(),
                plaintext: plaintext.to_string(),
                username: None,
                domain: None,
                hash_type_id: 0,
                timestamp: chrono::Utc::now(),
            })
        })
        .collect::<Vec<_>>();

    *seen = lines.len();
    records
}

/// Sends hashcat's interactive quit command (`q`) over stdin, giving the
/// subprocess a chance to exit cleanly before it is killed.
pub async fn request_graceful_quit(stdin: &mut Option<tokio::process::ChildStdin>) {
    if let Some(stdin) = stdin {
        let _ = stdin.write_all(b"q\n").await;
        let _ = stdin.flush().await;
    }
}

pub fn cracks_only_progress(task_id: &str, cracked_hashes: Vec<CrackedHash>) -> JobProgress {
    cracks_only_tick(task_id, cracked_hashes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use krakenhashes_domain_models::JobStatusTag;

    #[tokio::test]
    async fn report_if_crashed_emits_a_failed_tick_for_nonzero_exit() {
        let child = Command::new("sh")
            .args(["-c", "exit 3"])
            .spawn()
            .expect("sh is available");
        let child = Arc::new(Mutex::new(child));
        let (progress_tx, mut progress_rx) = mpsc::channel(1);
        let last_progress = Arc::new(RwLock::new(None));

        report_if_crashed("t1", &child, &progress_tx, &last_progress).await;

        let tick = progress_rx.try_recv().expect("a crash tick was sent");
        assert_eq!(tick.status, JobStatusTag::Failed);
        assert!(tick.error_message.as_ref().unwrap().contains('3'));
        assert_eq!(last_progress.read().await.as_ref().unwrap().status, JobStatusTag::Failed);
    }

    #[tokio::test]
    async fn report_if_crashed_is_silent_on_clean_exit() {
        let child = Command::new("sh")
            .args(["-c", "exit 0"])
            .spawn()
            .expect("sh is available");
        let child = Arc::new(Mutex::new(child));
        let (progress_tx, mut progress_rx) = mpsc::channel(1);
        let last_progress = Arc::new(RwLock::new(None));

        report_if_crashed("t1", &child, &progress_tx, &last_progress).await;

        assert!(progress_rx.try_recv().is_err());
        assert!(last_progress.read().await.is_none());
    }
}
