//! The file descriptor contract a [`crate::client::Downloader`] accepts.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Hashlist,
    Wordlist,
    Rule,
}

#[derive(Debug, Clone)]
pub struct FileDescriptor {
    pub name: String,
    pub file_type: FileType,
    pub category: Option<String>,
    pub id: Option<i64>,
    /// Empty or absent skips integrity verification after download.
    pub md5: Option<String>,
    pub attack_mode: Option<i32>,
}

impl FileDescriptor {
    pub fn hashlist(id: i64, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::Hashlist,
            category: None,
            id: Some(id),
            md5: None,
            attack_mode: None,
        }
    }

    pub fn rule(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::Rule,
            category: None,
            id: None,
            md5: None,
            attack_mode: None,
        }
    }

    pub fn association_wordlist(hashlist_id: i64, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_type: FileType::Wordlist,
            category: Some("association".to_string()),
            id: Some(hashlist_id),
            md5: None,
            attack_mode: Some(9),
        }
    }

    pub fn wants_integrity_check(&self) -> bool {
        self.md5.as_deref().is_some_and(|m| !m.is_empty())
    }
}
