//! A single cracked hash as emitted by the cracking binary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrackedHash {
    pub original_hash: String,
    pub plaintext: String,
    pub username: Option<String>,
    pub domain: Option<String>,
    pub hash_type_id: i32,
    pub timestamp: DateTime<Utc>,
}

impl CrackedHash {
    /// Encodes one record as a single outfile line: `hash:plaintext` with
    /// username/domain/timestamp carried as an appended JSON sidecar field
    /// so the line stays human-greppable while remaining unambiguous to
    /// parse back.
    pub fn to_outfile_line(&self) -> String {
        let meta = OutfileMeta {
            username: self.username.clone(),
            domain: self.domain.clone(),
            hash_type_id: self.hash_type_id,
            timestamp: self.timestamp,
        };
        let meta_json = serde_json::to_string(&meta).unwrap_or_default();
        format!("{}:{}\t{}", self.original_hash, self.plaintext, meta_json)
    }

    pub fn from_outfile_line(line: &str) -> Option<Self> {
        let (record, meta_json) = line.split_once('\t')?;
        let (hash, plaintext) = record.split_once(':')?;
        let meta: OutfileMeta = serde_json::from_str(meta_json).ok()?;
        Some(Self {
            original_hash: hash.to_string(),
            plaintext: plaintext.to_string(),
            username: meta.username,
            domain: meta.domain,
            hash_type_id: meta.hash_type_id,
            timestamp: meta.timestamp,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct OutfileMeta {
    username: Option<String>,
    domain: Option<String>,
    hash_type_id: i32,
    timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outfile_line_round_trips() {
        let cracked = CrackedHash {
            original_hash: "5f4dcc3b5aa765d61d8327deb882cf99".into(),
            plaintext: "password".into(),
            username: Some("bob".into()),
            domain: None,
            hash_type_id: 0,
            timestamp: Utc::now(),
        };
        let line = cracked.to_outfile_line();
        let back = CrackedHash::from_outfile_line(&line).expect("parses");
        assert_eq!(cracked, back);
    }

    #[test]
    fn plaintext_containing_colon_round_trips() {
        let cracked = CrackedHash {
            original_hash: "abc".into(),
            plaintext: "pa:ss:word".into(),
            username: None,
            domain: Some("CORP".into()),
            hash_type_id: 1000,
            timestamp: Utc::now(),
        };
        let line = cracked.to_outfile_line();
        let back = CrackedHash::from_outfile_line(&line).expect("parses");
        assert_eq!(cracked, back);
    }
}
