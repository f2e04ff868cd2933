//! Job Manager preparation policy: what gets re-downloaded per task versus
//! what is kept idempotent across tasks.

use std::path::Path;

use krakenhashes_domain_models::TaskAssignment;
use tracing::{info, warn};

use crate::client::{verify_checksum, write_atomically, HttpSyncClient};
use crate::descriptor::FileDescriptor;
use crate::errors::SyncError;
use crate::paths::DataLayout;

/// Hashlists are always replaced: unlink whatever is on disk, then fetch a
/// fresh copy. Stale hashlists from a previous task must never leak into a
/// new one.
pub async fn ensure_hashlist(
    client: &HttpSyncClient,
    layout: &DataLayout,
    assignment: &TaskAssignment,
) -> Result<(), SyncError> {
    let dest = layout.hashlist_path(assignment.hashlist_id);
    if dest.exists() {
        tokio::fs::remove_file(&dest)
            .await
            .map_err(|source| SyncError::Io {
                path: dest.display().to_string(),
                source,
            })?;
    }

    let descriptor = FileDescriptor::hashlist(
        assignment.hashlist_id,
        dest.file_name().and_then(|n| n.to_str()).unwrap_or("hashlist"),
    );
    fetch_and_verify(client, &descriptor, &dest).await
}

/// Rule chunks are downloaded once and reused; a jobdir-scoped path is
/// preferred, falling back to the legacy shared chunk directory.
pub async fn ensure_rule_chunks(
    client: &HttpSyncClient,
    layout: &DataLayout,
    assignment: &TaskAssignment,
    use_jobdir_scope: bool,
) -> Result<Vec<std::path::PathBuf>, SyncError> {
    let mut resolved = Vec::with_capacity(assignment.rule_paths.len());

    for (index, rule_path) in assignment.rule_paths.iter().enumerate() {
        let dest = if use_jobdir_scope {
            layout.rule_chunk_path(&assignment.job_execution_id, index as u32)
        } else {
            layout.legacy_rule_chunk_path(index as u32)
        };

        if !dest.exists() {
            let name = Path::new(rule_path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(rule_path)
                .to_string();
            let descriptor = FileDescriptor::rule(name);
            fetch_and_verify(client, &descriptor, &dest).await?;
        } else {
            info!(chunk = index, "rule chunk already present, skipping download");
        }

        resolved.push(dest);
    }

    Ok(resolved)
}

/// Association wordlists (attack mode 9 only) are downloaded once and
/// removed after task completion by [`cleanup_association_wordlist`].
pub async fn ensure_association_wordlist(
    client: &HttpSyncClient,
    layout: &DataLayout,
    assignment: &TaskAssignment,
) -> Result<Option<std::path::PathBuf>, SyncError> {
    if !assignment.is_association_mode() {
        return Ok(None);
    }

    let Some(wordlist_path) = assignment.wordlist_paths.first() else {
        return Ok(None);
    };
    let name = Path::new(wordlist_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(wordlist_path)
        .to_string();

    let dest = layout.association_wordlist_path(assignment.hashlist_id, &name);
    if dest.exists() {
        info!("association wordlist already present, skipping download");
        return Ok(Some(dest));
    }

    let descriptor = FileDescriptor::association_wordlist(assignment.hashlist_id, name);
    fetch_and_verify(client, &descriptor, &dest).await?;
    Ok(Some(dest))
}

/// Called once a task reaches a terminal state. Hashlists are intentionally
/// left alone; they may be reused by a future task against the same list.
pub async fn cleanup_association_wordlist(path: &Path) -> Result<(), SyncError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SyncError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

async fn fetch_and_verify(
    client: &HttpSyncClient,
    descriptor: &FileDescriptor,
    dest: &Path,
) -> Result<(), SyncError> {
    let bytes = client.fetch(descriptor).await?;

    if descriptor.wants_integrity_check() {
        let expected = descriptor.md5.as_deref().unwrap_or_default();
        if !verify_checksum(&bytes, expected) {
            warn!(file = %descriptor.name, "checksum mismatch after download");
            return Err(SyncError::ChecksumMismatch {
                expected: expected.to_string(),
                actual: String::new(),
            });
        }
    }

    write_atomically(dest, &bytes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use krakenhashes_domain_models::TaskAssignment;

    fn assignment() -> TaskAssignment {
        TaskAssignment {
            task_id: "task-1".into(),
            job_execution_id: "job-1".into(),
            hashlist_id: 42,
            hashlist_path: "hashlists/42.hash".into(),
            attack_mode: 0,
            hash_type: 0,
            wordlist_paths: vec![],
            rule_paths: vec!["rules/one.rule".into()],
            mask: None,
            increment_mode: false,
            increment_min: None,
            increment_max: None,
            keyspace_start: 0,
            keyspace_end: 1000,
            chunk_id: Some(0),
            output_path: Some("outfiles/task-1.out".into()),
            preferred_binary_version: Some("6.2.6".into()),
        }
    }

    #[test]
    fn association_mode_detection_gates_wordlist_preparation() {
        let mut a = assignment();
        assert!(!a.is_association_mode());
        a.attack_mode = krakenhashes_domain_models::ASSOCIATION_ATTACK_MODE;
        assert!(a.is_association_mode());
    }

    #[tokio::test]
    async fn cleanup_is_idempotent_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");
        cleanup_association_wordlist(&path).await.unwrap();
    }
}
