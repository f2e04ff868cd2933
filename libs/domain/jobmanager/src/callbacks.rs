//! The coordinator-facing side of the Job Manager: a trait so the manager
//! itself never depends on how status/cracks/acks actually travel over the
//! wire. A production binary implements this over the transport contract
//! (C9); tests implement it over an in-memory channel.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use krakenhashes_domain_models::{CrackedHash, DeviceMetric};
use krakenhashes_infra_logbuffer::LogEntry;
use krakenhashes_infra_transport::OutboundMessage;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Re-issues the final `JobStatus` for a task. Handed to
/// [`CoordinatorLink::wait_for_ack`] so the generic ack-wait retry loop
/// never needs to know how to reconstruct the status it is resending.
pub type AckResend = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Everything the Job Manager needs to talk to the coordinator.
///
/// `send_status` and `send_crack_batch` are the two ordered callbacks from
/// the effectively-once crack delivery invariant: status never carries
/// cracks, crack batches never carry aggregate progress.
#[async_trait]
pub trait CoordinatorLink: Send + Sync {
    async fn send_status(&self, status: OutboundMessage);

    async fn send_crack_batch(&self, task_id: &str, cracked_hashes: Vec<CrackedHash>);

    async fn send_batches_complete(&self, task_id: &str);

    async fn send_output(&self, task_id: &str, text: String, is_error: bool);

    async fn send_assignment_rejected(&self, task_id: &str, error: String);

    async fn send_speed_test_result(
        &self,
        task_id: &str,
        hash_rate: u64,
        device_metrics: Vec<DeviceMetric>,
        estimated_total_keyspace: Option<u64>,
    );

    async fn send_log_entries(&self, entries: Vec<LogEntry>);

    /// Waits for the coordinator's completion ACK for `task_id`, calling
    /// `resend` on each retry to re-issue the final status. Returns `true`
    /// once the ack arrives, `false` on timeout or retry exhaustion.
    async fn wait_for_ack(&self, task_id: &str, resend: AckResend) -> bool;
}
