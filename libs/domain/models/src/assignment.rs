//! The inbound unit of work the coordinator hands to the agent.

use serde::{Deserialize, Serialize};

/// Immutable record describing one task's slice of keyspace.
///
/// `TaskID` is scoped to a single coordinator-issued unit of work;
/// `JobExecutionID` identifies the coordinator-side job this task belongs
/// to (many tasks share one job execution id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    #[serde(rename = "TaskID")]
    pub task_id: String,
    #[serde(rename = "JobExecutionID")]
    pub job_execution_id: String,

    #[serde(rename = "HashlistID")]
    pub hashlist_id: i64,
    #[serde(rename = "HashlistPath")]
    pub hashlist_path: String,

    #[serde(rename = "AttackMode")]
    pub attack_mode: i32,
    #[serde(rename = "HashType")]
    pub hash_type: i32,

    #[serde(rename = "WordlistPaths", default)]
    pub wordlist_paths: Vec<String>,
    #[serde(rename = "RulePaths", default)]
    pub rule_paths: Vec<String>,
    #[serde(rename = "Mask")]
    pub mask: Option<String>,

    #[serde(rename = "IncrementMode", default)]
    pub increment_mode: bool,
    #[serde(rename = "IncrementMin")]
    pub increment_min: Option<i32>,
    #[serde(rename = "IncrementMax")]
    pub increment_max: Option<i32>,

    #[serde(rename = "KeyspaceStart")]
    pub keyspace_start: u64,
    #[serde(rename = "KeyspaceEnd")]
    pub keyspace_end: u64,

    #[serde(rename = "ChunkID", default)]
    pub chunk_id: Option<u32>,
    #[serde(rename = "OutputPath", default)]
    pub output_path: Option<String>,

    #[serde(rename = "BinaryVersion")]
    pub preferred_binary_version: Option<String>,
}

/// Attack mode 9 is hashcat's "association" mode: each hash in the
/// hashlist is cracked against its own dedicated single-line wordlist.
pub const ASSOCIATION_ATTACK_MODE: i32 = 9;

impl TaskAssignment {
    pub fn is_association_mode(&self) -> bool {
        self.attack_mode == ASSOCIATION_ATTACK_MODE
    }

    pub fn keyspace_len(&self) -> u64 {
        self.keyspace_end.saturating_sub(self.keyspace_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let assignment = TaskAssignment {
            task_id: "t-1".into(),
            job_execution_id: "j-1".into(),
            hashlist_id: 42,
            hashlist_path: "hashlists/42.hash".into(),
            attack_mode: 0,
            hash_type: 1000,
            wordlist_paths: vec!["wordlists/rockyou.txt".into()],
            rule_paths: vec![],
            mask: None,
            increment_mode: false,
            increment_min: None,
            increment_max: None,
            keyspace_start: 0,
            keyspace_end: 1_000_000,
            chunk_id: None,
            output_path: None,
            preferred_binary_version: Some("6.2.6".into()),
        };

        let json = serde_json::to_string(&assignment).unwrap();
        let back: TaskAssignment = serde_json::from_str(&json).unwrap();
        assert_eq!(assignment, back);
    }

    #[test]
    fn association_mode_detected_by_attack_mode_nine() {
        let mut assignment = sample();
        assignment.attack_mode = 9;
        assert!(assignment.is_association_mode());
        assignment.attack_mode = 0;
        assert!(!assignment.is_association_mode());
    }

    fn sample() -> TaskAssignment {
        TaskAssignment {
            task_id: "t".into(),
            job_execution_id: "j".into(),
            hashlist_id: 1,
            hashlist_path: "hashlists/1.hash".into(),
            attack_mode: 0,
            hash_type: 0,
            wordlist_paths: vec![],
            rule_paths: vec![],
            mask: None,
            increment_mode: false,
            increment_min: None,
            increment_max: None,
            keyspace_start: 0,
            keyspace_end: 0,
            chunk_id: None,
            output_path: None,
            preferred_binary_version: None,
        }
    }
}
