//! CLI/env configuration for the agent process.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about = "KrakenHashes agent: runs the local cracking binary under coordinator control"
)]
pub struct AgentConfig {
    /// Base websocket URL of the coordinator's agent control channel.
    #[arg(long, env = "ORCHESTRATOR_URL")]
    pub orchestrator_url: String,

    /// Bearer token presented on both the control channel and file sync
    /// requests.
    #[arg(long, env = "AGENT_AUTH_TOKEN")]
    pub auth_token: String,

    /// Stable identifier this agent reports to the coordinator.
    #[arg(long, env = "AGENT_IDENTIFIER", default_value = "agent-local")]
    pub agent_identifier: String,

    /// Root of the on-disk data layout (binaries, hashlists, rules, outfiles).
    #[arg(long, env = "AGENT_DATA_DIR", default_value = "agent-data")]
    pub data_dir: PathBuf,

    /// Extra command-line parameters appended to every hashcat invocation.
    #[arg(long, env = "AGENT_EXTRA_PARAMS", value_delimiter = ' ')]
    pub extra_params: Vec<String>,

    /// Base reconnect backoff; doubles on each consecutive failure up to
    /// `max_reconnect_backoff_secs`.
    #[arg(long, env = "AGENT_RECONNECT_BACKOFF_SECS", default_value_t = 1)]
    pub reconnect_backoff_secs: u64,

    #[arg(long, env = "AGENT_MAX_RECONNECT_BACKOFF_SECS", default_value_t = 60)]
    pub max_reconnect_backoff_secs: u64,
}
