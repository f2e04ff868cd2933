//! Agent library: configuration, the coordinator link, and the
//! reconnectable control-channel loop. `main.rs` wires these together with
//! the domain/infra crates and starts the process.

pub mod config;
pub mod connection;
pub mod link;

pub use config::AgentConfig;
pub use link::WsCoordinatorLink;
