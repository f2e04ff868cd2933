use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] bincode::Error),

    #[error("packet of {size} bytes exceeds the {limit} byte frame limit")]
    PacketTooLarge { size: usize, limit: usize },

    #[error("frame truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}
