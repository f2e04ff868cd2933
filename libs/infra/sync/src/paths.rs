//! On-disk layout under the agent data directory.
//!
//! ```text
//! binaries/<version>/hashcat.bin | hashcat.exe
//! hashlists/<id>.hash
//! wordlists/association/<hashlistID>_<filename>
//! rules/chunks/job_<jobid>/chunk_<N>.rule
//! rules/chunks/chunk_<N>.rule                 (legacy)
//! outfiles/<task_id>.out
//! ```

use std::path::{Path, PathBuf};

pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn binary_dir(&self, version: &str) -> PathBuf {
        self.root.join("binaries").join(version)
    }

    pub fn binary_path(&self, version: &str, file_name: &str) -> PathBuf {
        self.binary_dir(version).join(file_name)
    }

    pub fn hashlist_path(&self, hashlist_id: i64) -> PathBuf {
        self.root
            .join("hashlists")
            .join(format!("{hashlist_id}.hash"))
    }

    pub fn association_wordlist_path(&self, hashlist_id: i64, file_name: &str) -> PathBuf {
        self.root
            .join("wordlists")
            .join("association")
            .join(format!("{hashlist_id}_{file_name}"))
    }

    /// Jobdir-scoped chunk path, preferred whenever a job id is known.
    pub fn rule_chunk_path(&self, job_id: &str, chunk_index: u32) -> PathBuf {
        self.root
            .join("rules")
            .join("chunks")
            .join(format!("job_{job_id}"))
            .join(format!("chunk_{chunk_index}.rule"))
    }

    /// Legacy, non-jobdir-scoped chunk path kept for assignments that
    /// predate per-job chunk directories.
    pub fn legacy_rule_chunk_path(&self, chunk_index: u32) -> PathBuf {
        self.root
            .join("rules")
            .join("chunks")
            .join(format!("chunk_{chunk_index}.rule"))
    }

    pub fn outfile_path(&self, task_id: &str) -> PathBuf {
        self.root.join("outfiles").join(format!("{task_id}.out"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_documented_shape() {
        let layout = DataLayout::new("/var/lib/agent");
        assert_eq!(
            layout.binary_path("6.2.6", "hashcat.bin"),
            PathBuf::from("/var/lib/agent/binaries/6.2.6/hashcat.bin")
        );
        assert_eq!(
            layout.hashlist_path(42),
            PathBuf::from("/var/lib/agent/hashlists/42.hash")
        );
        assert_eq!(
            layout.association_wordlist_path(42, "rockyou.txt"),
            PathBuf::from("/var/lib/agent/wordlists/association/42_rockyou.txt")
        );
        assert_eq!(
            layout.rule_chunk_path("job-7", 3),
            PathBuf::from("/var/lib/agent/rules/chunks/job_job-7/chunk_3.rule")
        );
        assert_eq!(
            layout.legacy_rule_chunk_path(3),
            PathBuf::from("/var/lib/agent/rules/chunks/chunk_3.rule")
        );
        assert_eq!(
            layout.outfile_path("task-9"),
            PathBuf::from("/var/lib/agent/outfiles/task-9.out")
        );
    }
}
