//! Agent process entry point: resolves configuration, detects hardware,
//! and runs the reconnectable coordinator control channel until shutdown.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use krakenhashes_agent::config::AgentConfig;
use krakenhashes_agent::connection;
use krakenhashes_agent::link::WsCoordinatorLink;
use krakenhashes_domain_hardware::{mock::mock_devices_from_env, HardwareMonitor};
use krakenhashes_domain_jobmanager::{JobManager, JobManagerConfig};
use krakenhashes_domain_state::TaskStateMachine;
use krakenhashes_infra_executor::Executor;
use krakenhashes_infra_logbuffer::{RingLogBuffer, RingLogLayer};
use krakenhashes_infra_outfile::OutfileStore;
use krakenhashes_infra_sync::{DataLayout, HttpSyncClient};

#[tokio::main]
async fn main() {
    let config = AgentConfig::parse();
    let log_buffer = Arc::new(RingLogBuffer::default());
    krakenhashes_shared_telemetry::init_tracing_with_layer(
        "krakenhashes_agent",
        Some(Box::new(RingLogLayer::new(log_buffer.clone()))),
    );

    info!(agent = %config.agent_identifier, "starting agent");

    let layout = Arc::new(DataLayout::new(config.data_dir.clone()));
    let sync_client = Arc::new(HttpSyncClient::new(
        config.orchestrator_url.clone(),
        config.auth_token.clone(),
    ));
    let outfile_store = Arc::new(OutfileStore::new(layout.root()));
    let executor = Arc::new(Executor::new(outfile_store));
    let state = Arc::new(TaskStateMachine::new());

    let hardware = Arc::new(HardwareMonitor::new(layout.root()));
    match mock_devices_from_env() {
        Some(devices) => {
            info!(count = devices.len(), "using mock hardware from environment");
            hardware.set_devices(devices);
        }
        None => {
            if let Err(err) = hardware.redetect().await {
                warn!(%err, "device detection failed; continuing with an empty device list");
            }
        }
    }

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let link = Arc::new(WsCoordinatorLink::new(outbound_tx));

    let job_manager = JobManager::new(
        state,
        executor,
        hardware,
        sync_client,
        layout,
        link.clone(),
        config.extra_params.clone(),
        JobManagerConfig::default(),
    );
    job_manager.spawn_watchdog();

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    if let Err(err) = ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    }) {
        warn!(%err, "failed to install Ctrl-C handler");
    }

    connection::run(
        config.orchestrator_url,
        config.auth_token,
        config.agent_identifier,
        job_manager,
        link,
        log_buffer,
        outbound_rx,
        Duration::from_secs(config.reconnect_backoff_secs),
        Duration::from_secs(config.max_reconnect_backoff_secs),
        shutdown_rx,
    )
    .await;

    info!("agent shut down");
}
