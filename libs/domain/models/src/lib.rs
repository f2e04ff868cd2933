//! Shared data contracts for the agent-side execution subsystem.
//!
//! These types are the wire/shared vocabulary used across the hardware,
//! sync, executor, state, and job-manager crates. Nothing here owns
//! behavior beyond small, obviously-correct helpers.

pub mod assignment;
pub mod completed;
pub mod cracked;
pub mod device;
pub mod progress;

pub use assignment::{TaskAssignment, ASSOCIATION_ATTACK_MODE};
pub use completed::CompletedTaskInfo;
pub use cracked::CrackedHash;
pub use device::{Backend, Device, DeviceKind, PhysicalDevice, RuntimeOption};
pub use progress::{DeviceMetric, JobProgress, JobStatusTag};
