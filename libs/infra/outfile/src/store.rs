//! Append-only, per-task crack outfile store.
//!
//! A task's outfile exists for as long as the coordinator has not
//! confirmed receipt of its crack data; reconnects may discover outfiles
//! belonging to tasks whose state has already moved on, and those
//! outfiles represent data the agent must still get rid of before
//! forgetting the task.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use krakenhashes_domain_models::CrackedHash;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::errors::OutfileError;

/// Guards concurrent appends to the same task's file; reads (retransmit,
/// line count) take the same lock so a reader never observes a
/// half-written line.
pub struct OutfileStore {
    root: PathBuf,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl OutfileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: RwLock::new(HashMap::new()),
        }
    }

    pub fn path_for(&self, task_id: &str) -> PathBuf {
        self.root.join(format!("{task_id}.out"))
    }

    async fn lock_for(&self, task_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(task_id) {
            return lock.clone();
        }
        let mut locks = self.locks.write().await;
        locks
            .entry(task_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Appends one record. The line is written with a single `write_all`
    /// call against an append-mode file descriptor so a crash mid-write
    /// never leaves a torn line visible to a subsequent reader.
    pub async fn append(&self, task_id: &str, cracked: &CrackedHash) -> Result<(), OutfileError> {
        let lock = self.lock_for(task_id).await;
        let _guard = lock.lock().await;

        let path = self.path_for(task_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| OutfileError::Io {
                    task_id: task_id.to_string(),
                    source,
                })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| OutfileError::Io {
                task_id: task_id.to_string(),
                source,
            })?;

        let mut line = cracked.to_outfile_line();
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| OutfileError::Io {
                task_id: task_id.to_string(),
                source,
            })?;
        file.flush().await.map_err(|source| OutfileError::Io {
            task_id: task_id.to_string(),
            source,
        })?;

        Ok(())
    }

    /// Reads every record currently on disk for `task_id`. Safe to call
    /// any time before [`Self::delete`].
    pub async fn retransmit(&self, task_id: &str) -> Result<Vec<CrackedHash>, OutfileError> {
        let lock = self.lock_for(task_id).await;
        let _guard = lock.lock().await;
        self.read_all(&self.path_for(task_id), task_id).await
    }

    pub async fn line_count(&self, task_id: &str) -> Result<usize, OutfileError> {
        let lock = self.lock_for(task_id).await;
        let _guard = lock.lock().await;
        let records = self.read_all(&self.path_for(task_id), task_id).await?;
        Ok(records.len())
    }

    /// Removes the outfile. Only safe once the coordinator has
    /// acknowledged ingestion of every record.
    pub async fn delete(&self, task_id: &str) -> Result<(), OutfileError> {
        let lock = self.lock_for(task_id).await;
        let _guard = lock.lock().await;
        match tokio::fs::remove_file(self.path_for(task_id)).await {
            Ok(()) => {
                debug!(task_id, "outfile deleted");
                Ok(())
            }
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(OutfileError::Io {
                task_id: task_id.to_string(),
                source,
            }),
        }
    }

    /// Task ids with an outfile still present on disk, plus `active_task_id`
    /// if given (even when that task has no outfile yet).
    pub async fn list_pending(
        &self,
        active_task_id: Option<&str>,
    ) -> Result<Vec<String>, OutfileError> {
        let mut pending = Vec::new();
        if tokio::fs::metadata(&self.root).await.is_ok() {
            let mut entries =
                tokio::fs::read_dir(&self.root)
                    .await
                    .map_err(|source| OutfileError::Io {
                        task_id: String::new(),
                        source,
                    })?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|source| OutfileError::Io {
                    task_id: String::new(),
                    source,
                })?
            {
                if let Some(id) = task_id_from_file_name(&entry.file_name()) {
                    pending.push(id);
                }
            }
        }

        if let Some(active) = active_task_id {
            if !pending.iter().any(|id| id == active) {
                pending.push(active.to_string());
            }
        }

        Ok(pending)
    }

    async fn read_all(&self, path: &Path, task_id: &str) -> Result<Vec<CrackedHash>, OutfileError> {
        let mut file = match tokio::fs::File::open(path).await {
            Ok(f) => f,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(OutfileError::Io {
                    task_id: task_id.to_string(),
                    source,
                })
            }
        };

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .await
            .map_err(|source| OutfileError::Io {
                task_id: task_id.to_string(),
                source,
            })?;

        let mut records = Vec::new();
        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            match CrackedHash::from_outfile_line(line) {
                Some(record) => records.push(record),
                None => warn!(task_id, "skipping unparsable outfile line"),
            }
        }
        Ok(records)
    }
}

fn task_id_from_file_name(name: &std::ffi::OsStr) -> Option<String> {
    let name = name.to_str()?;
    name.strip_suffix(".out").map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(hash: &str, plaintext: &str) -> CrackedHash {
        CrackedHash {
            original_hash: hash.to_string(),
            plaintext: plaintext.to_string(),
            username: None,
            domain: None,
            hash_type_id: 0,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_then_retransmit_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutfileStore::new(dir.path());
        store.append("task-1", &sample("h1", "p1")).await.unwrap();
        store.append("task-1", &sample("h2", "p2")).await.unwrap();

        let records = store.retransmit("task-1").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].original_hash, "h1");
        assert_eq!(store.line_count("task-1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn retransmit_on_absent_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutfileStore::new(dir.path());
        let records = store.retransmit("never-existed").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutfileStore::new(dir.path());
        store.append("task-1", &sample("h1", "p1")).await.unwrap();
        store.delete("task-1").await.unwrap();
        store.delete("task-1").await.unwrap();
        assert!(store.retransmit("task-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_pending_includes_active_task_with_no_outfile_yet() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutfileStore::new(dir.path());
        store.append("task-1", &sample("h1", "p1")).await.unwrap();

        let pending = store.list_pending(Some("task-2")).await.unwrap();
        assert!(pending.contains(&"task-1".to_string()));
        assert!(pending.contains(&"task-2".to_string()));
    }
}
