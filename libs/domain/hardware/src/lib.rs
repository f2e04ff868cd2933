//! Device detection and the live hardware monitor (spec components C1/C2).

pub mod detector;
pub mod errors;
pub mod grouping;
pub mod mock;
pub mod monitor;
pub mod parser;

pub use detector::DeviceDetector;
pub use errors::HardwareError;
pub use grouping::{filter_aliases_legacy, group_physical_devices};
pub use monitor::HardwareMonitor;
