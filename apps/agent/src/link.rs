//! [`CoordinatorLink`] implementation backed by an outbound message queue
//! drained by the websocket writer task in [`crate::connection`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use krakenhashes_domain_jobmanager::{AckResend, CoordinatorLink};
use krakenhashes_domain_models::{CrackedHash, DeviceMetric};
use krakenhashes_infra_logbuffer::LogEntry;
use krakenhashes_infra_transport::OutboundMessage;

const ACK_ATTEMPTS: u32 = 5;
const ACK_WAIT_INTERVAL: Duration = Duration::from_secs(10);

pub struct WsCoordinatorLink {
    outbound_tx: mpsc::UnboundedSender<OutboundMessage>,
    ack_waiters: Mutex<HashMap<String, oneshot::Sender<()>>>,
}

impl WsCoordinatorLink {
    pub fn new(outbound_tx: mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self {
            outbound_tx,
            ack_waiters: Mutex::new(HashMap::new()),
        }
    }

    fn send(&self, message: OutboundMessage) {
        if self.outbound_tx.send(message).is_err() {
            warn!("dropped outbound message: writer task is gone");
        }
    }

    /// Called by the read loop when a `CompletionAck` arrives.
    pub fn resolve_ack(&self, task_id: &str) {
        if let Some(sender) = self.ack_waiters.lock().expect("lock poisoned").remove(task_id) {
            let _ = sender.send(());
        }
    }
}

#[async_trait]
impl CoordinatorLink for WsCoordinatorLink {
    async fn send_status(&self, status: OutboundMessage) {
        self.send(status);
    }

    async fn send_crack_batch(&self, task_id: &str, cracked_hashes: Vec<CrackedHash>) {
        self.send(OutboundMessage::CrackBatch {
            task_id: task_id.to_string(),
            cracked_hashes,
        });
    }

    async fn send_batches_complete(&self, task_id: &str) {
        self.send(OutboundMessage::CrackBatchesComplete {
            task_id: task_id.to_string(),
        });
    }

    async fn send_output(&self, task_id: &str, text: String, is_error: bool) {
        self.send(OutboundMessage::OutputChunk {
            task_id: task_id.to_string(),
            text,
            is_error,
        });
    }

    async fn send_assignment_rejected(&self, task_id: &str, error: String) {
        self.send(OutboundMessage::AssignmentRejected {
            task_id: task_id.to_string(),
            error,
        });
    }

    async fn send_speed_test_result(
        &self,
        task_id: &str,
        hash_rate: u64,
        device_metrics: Vec<DeviceMetric>,
        estimated_total_keyspace: Option<u64>,
    ) {
        self.send(OutboundMessage::SpeedTestResult {
            task_id: task_id.to_string(),
            hash_rate,
            device_metrics,
            estimated_total_keyspace,
        });
    }

    async fn send_log_entries(&self, entries: Vec<LogEntry>) {
        self.send(OutboundMessage::LogEntries { entries });
    }

    async fn wait_for_ack(&self, task_id: &str, resend: AckResend) -> bool {
        for attempt in 0..ACK_ATTEMPTS {
            let (tx, rx) = oneshot::channel();
            self.ack_waiters
                .lock()
                .expect("lock poisoned")
                .insert(task_id.to_string(), tx);

            resend().await;

            if matches!(tokio::time::timeout(ACK_WAIT_INTERVAL, rx).await, Ok(Ok(()))) {
                return true;
            }
            warn!(task_id, attempt, "completion ack not received, retrying");
        }

        self.ack_waiters.lock().expect("lock poisoned").remove(task_id);
        false
    }
}
