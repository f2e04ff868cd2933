//! Downloads a described file into the agent data directory, atomically
//! and idempotently. The exact wire protocol against the coordinator is
//! out of scope; this client assumes a synchronous, context-cancellable
//! call that fails with [`SyncError::DownloadFailed`].

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::descriptor::FileDescriptor;
use crate::errors::SyncError;

pub struct HttpSyncClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSyncClient {
    pub fn new(base_url: impl Into<String>, auth_token: impl AsRef<str>) -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(value) = reqwest::header::HeaderValue::from_str(&format!(
            "Bearer {}",
            auth_token.as_ref()
        )) {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("failed to build sync HTTP client");

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn resource_url(&self, descriptor: &FileDescriptor) -> String {
        format!(
            "{}/api/v1/agent/files/{:?}/{}",
            self.base_url, descriptor.file_type, descriptor.name
        )
        .to_lowercase()
    }
}

impl HttpSyncClient {
    #[instrument(skip(self), fields(file = %descriptor.name))]
    pub async fn fetch(&self, descriptor: &FileDescriptor) -> Result<Vec<u8>, SyncError> {
        let url = self.resource_url(descriptor);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::DownloadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::DownloadFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| SyncError::DownloadFailed(e.to_string()))
    }
}

/// Writes `bytes` to `dest` atomically: the payload lands fully formed or
/// not at all, even if the process is killed mid-write. Creates parent
/// directories as needed.
#[instrument(skip(bytes), fields(dest = %dest.display()))]
pub async fn write_atomically(dest: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| SyncError::Io {
                path: parent.display().to_string(),
                source,
            })?;
    }

    let tmp_path = dest.with_extension(format!(
        "{}.part",
        dest.extension().and_then(|e| e.to_str()).unwrap_or("tmp")
    ));

    {
        let mut file =
            tokio::fs::File::create(&tmp_path)
                .await
                .map_err(|source| SyncError::Io {
                    path: tmp_path.display().to_string(),
                    source,
                })?;
        file.write_all(bytes).await.map_err(|source| SyncError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
        file.flush().await.map_err(|source| SyncError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
    }

    tokio::fs::rename(&tmp_path, dest)
        .await
        .map_err(|source| SyncError::Io {
            path: dest.display().to_string(),
            source,
        })?;

    debug!("wrote {} bytes", bytes.len());
    Ok(())
}

/// An empty `expected_hex` means the descriptor carried no checksum and
/// verification is skipped.
pub fn verify_checksum(bytes: &[u8], expected_hex: &str) -> bool {
    if expected_hex.is_empty() {
        return true;
    }
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize()).eq_ignore_ascii_case(expected_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_checksum_skips_verification() {
        assert!(verify_checksum(b"anything", ""));
    }

    #[test]
    fn mismatched_checksum_fails() {
        assert!(!verify_checksum(b"payload", "deadbeef"));
    }

    #[tokio::test]
    async fn write_atomically_creates_parent_dirs_and_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/child.hash");
        write_atomically(&dest, b"hello world").await.unwrap();

        let contents = tokio::fs::read(&dest).await.unwrap();
        assert_eq!(contents, b"hello world");
        assert!(!dest.with_extension("hash.part").exists());
    }

    #[tokio::test]
    async fn write_atomically_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.rule");
        write_atomically(&dest, b"first").await.unwrap();
        write_atomically(&dest, b"second").await.unwrap();

        let contents = tokio::fs::read(&dest).await.unwrap();
        assert_eq!(contents, b"second");
    }
}
