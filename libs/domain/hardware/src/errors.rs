use thiserror::Error;

#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("no binary version directory found under {0}")]
    BinaryUnavailable(String),

    #[error("device report contained no parseable device")]
    NoDevicesFound,

    #[error("device enumeration timed out after {0:?}")]
    DetectionTimedOut(std::time::Duration),

    #[error("failed to launch device-listing subprocess: {0}")]
    Spawn(#[from] std::io::Error),
}
