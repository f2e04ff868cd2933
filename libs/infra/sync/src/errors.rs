use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("io error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("download cancelled")]
    Cancelled,

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}
