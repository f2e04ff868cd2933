//! Idempotent file materialisation for hashlists, rule chunks, and
//! association wordlists referenced by a task assignment (spec component
//! C3), plus the on-disk layout they live under.

pub mod client;
pub mod descriptor;
pub mod errors;
pub mod paths;
pub mod prepare;

pub use client::HttpSyncClient;
pub use descriptor::{FileDescriptor, FileType};
pub use errors::SyncError;
pub use paths::DataLayout;
pub use prepare::{
    cleanup_association_wordlist, ensure_association_wordlist, ensure_hashlist, ensure_rule_chunks,
};
