//! Reconnectable websocket control channel to the coordinator. Owns the
//! writer task (drains the outbound queue) and the reader loop (decodes
//! inbound frames and dispatches them to the job manager).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};
use url::Url;

use krakenhashes_domain_jobmanager::{CoordinatorLink, JobManager};
use krakenhashes_infra_logbuffer::RingLogBuffer;
use krakenhashes_infra_transport::{decode_payload, encode_frame, peek_frame_length, InboundMessage, OutboundMessage};

use crate::link::WsCoordinatorLink;

/// Runs until `shutdown` resolves, reconnecting with exponential backoff on
/// every disconnect.
pub async fn run(
    url: String,
    auth_token: String,
    agent_identifier: String,
    job_manager: JobManager,
    link: Arc<WsCoordinatorLink>,
    log_buffer: Arc<RingLogBuffer>,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    base_backoff: Duration,
    max_backoff: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut backoff = base_backoff;

    loop {
        if *shutdown.borrow() {
            return;
        }

        match connect(&url, &auth_token, &agent_identifier).await {
            Ok(stream) => {
                backoff = base_backoff;
                info!("connected to coordinator");
                if run_session(stream, &job_manager, &link, &log_buffer, &mut outbound_rx, &mut shutdown).await {
                    return;
                }
            }
            Err(err) => {
                warn!(%err, "failed to connect to coordinator");
            }
        }

        if *shutdown.borrow() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = shutdown.changed() => return,
        }
        backoff = std::cmp::min(backoff * 2, max_backoff);
    }
}

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(url: &str, auth_token: &str, agent_identifier: &str) -> anyhow::Result<WsStream> {
    let mut parsed = Url::parse(url)?;
    parsed
        .query_pairs_mut()
        .append_pair("agent", agent_identifier);
    let mut request = tokio_tungstenite::tungstenite::http::Request::builder()
        .uri(parsed.as_str())
        .header("Authorization", format!("Bearer {auth_token}"))
        .header("Host", parsed.host_str().unwrap_or_default())
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header(
            "Sec-WebSocket-Key",
            tokio_tungstenite::tungstenite::handshake::client::generate_key(),
        )
        .body(())?;
    let _ = &mut request;
    let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}

/// Drives one connected session until it drops or shutdown is requested.
/// Returns `true` once shutdown should stop the whole reconnect loop.
async fn run_session(
    stream: WsStream,
    job_manager: &JobManager,
    link: &Arc<WsCoordinatorLink>,
    log_buffer: &Arc<RingLogBuffer>,
    outbound_rx: &mut mpsc::UnboundedReceiver<OutboundMessage>,
    shutdown: &mut tokio::sync::watch::Receiver<bool>,
) -> bool {
    let (mut sink, mut stream) = stream.split();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    let _ = sink.close().await;
                    return true;
                }
            }
            outbound = outbound_rx.recv() => {
                let Some(message) = outbound else { return false };
                match encode_frame(&message) {
                    Ok(framed) => {
                        if sink.send(Message::Binary(framed)).await.is_err() {
                            return false;
                        }
                    }
                    Err(err) => warn!(%err, "failed to encode outbound message"),
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Binary(data))) => {
                        if let Err(err) = handle_frame(&data, job_manager, link, log_buffer).await {
                            warn!(%err, "failed to decode inbound frame");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return false,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        error!(%err, "websocket read error");
                        return false;
                    }
                }
            }
        }
    }
}

async fn handle_frame(
    data: &[u8],
    job_manager: &JobManager,
    link: &Arc<WsCoordinatorLink>,
    log_buffer: &Arc<RingLogBuffer>,
) -> anyhow::Result<()> {
    let length = peek_frame_length(data).ok_or_else(|| anyhow::anyhow!("frame shorter than length prefix"))?;
    let payload = data
        .get(4..4 + length)
        .ok_or_else(|| anyhow::anyhow!("frame declares {length} bytes but buffer is shorter"))?;
    let message: InboundMessage = decode_payload(payload)?;
    dispatch(message, job_manager, link, log_buffer).await;
    Ok(())
}

async fn dispatch(
    message: InboundMessage,
    job_manager: &JobManager,
    link: &Arc<WsCoordinatorLink>,
    log_buffer: &Arc<RingLogBuffer>,
) {
    match message {
        InboundMessage::JobTaskAssignment(assignment) => {
            if let Err(err) = job_manager.submit_assignment(assignment).await {
                warn!(%err, "assignment rejected");
            }
        }
        InboundMessage::CompletionAck { task_id } => {
            link.resolve_ack(&task_id);
            job_manager.acknowledge_completion(&task_id).await;
        }
        InboundMessage::StopJob { task_id } => {
            if let Err(err) = job_manager.stop_task(&task_id).await {
                warn!(%err, "stop request for unknown task");
            }
        }
        InboundMessage::RetransmitOutfile { task_id } => {
            if let Err(err) = job_manager.retransmit_outfile(&task_id).await {
                warn!(%err, "outfile retransmit failed");
            }
        }
        InboundMessage::DeleteOutfile { task_id } => {
            if let Err(err) = job_manager.delete_outfile(&task_id).await {
                warn!(%err, "outfile delete failed");
            }
        }
        InboundMessage::SpeedTestRequest { task_id, duration_seconds } => {
            if let Err(err) = job_manager.run_speed_test(&task_id, duration_seconds).await {
                warn!(%err, "speed test failed");
            }
        }
        InboundMessage::LogRequest { hours_back, include_all } => {
            let since = if include_all {
                Utc::now() - chrono::Duration::weeks(52)
            } else {
                Utc::now() - chrono::Duration::hours(i64::from(hours_back))
            };
            let entries = log_buffer.get_since(since);
            link.send_log_entries(entries).await;
        }
    }
}
