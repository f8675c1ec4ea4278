//! Tree and repository-related DTOs.
//!
//! - `TreeEntry`: Single file/directory in a listing
//! - `LinkTarget`: Where a symlink chain ends
//! - `RepositoryInfo`: Repo metadata
//! - `CommitInfo`: Basic commit info (last commit in tree entries)

use serde::{Deserialize, Serialize};

use crate::git::{self, Commit, EntryMode};
use crate::git::repository::format_relative_time;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub path: String,
    pub oid: String,
    pub entry_type: EntryType,
    pub size: u64,
    /// Collapsed path through single-directory chains, empty for files.
    pub jumpable_path: String,
    pub last_commit: Option<CommitInfo>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Executable,
    Directory,
    Symlink,
    Submodule,
}

impl From<EntryMode> for EntryType {
    fn from(mode: EntryMode) -> Self {
        match mode {
            EntryMode::Blob => EntryType::File,
            EntryMode::Executable => EntryType::Executable,
            EntryMode::Symlink => EntryType::Symlink,
            EntryMode::Tree => EntryType::Directory,
            EntryMode::Commit => EntryType::Submodule,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub oid: String,
    pub message: String,
    pub author: String,
    pub timestamp: i64,
    pub relative_time: String,
}

impl From<&Commit> for CommitInfo {
    fn from(commit: &Commit) -> Self {
        let timestamp = commit.author().timestamp();
        CommitInfo {
            oid: commit.id().to_hex(),
            message: commit.summary().to_string(),
            author: commit.author().name.clone(),
            timestamp,
            relative_time: format_relative_time(timestamp),
        }
    }
}

impl TreeEntry {
    /// `dir` is the listed directory, empty for the root.
    pub fn from_entry(dir: &str, entry: &git::TreeEntry, last_commit: Option<CommitInfo>) -> crate::error::Result<Self> {
        let path = if dir.is_empty() {
            entry.name().to_string()
        } else {
            format!("{}/{}", dir.trim_end_matches('/'), entry.name())
        };
        Ok(TreeEntry {
            name: entry.name().to_string(),
            path,
            oid: entry.id().to_hex(),
            entry_type: entry.mode().into(),
            size: entry.size(),
            jumpable_path: entry.get_sub_jumpable_path_name()?,
            last_commit,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkTarget {
    pub link: String,
    pub target: String,
    pub oid: String,
    pub entry_type: EntryType,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub name: String,
    pub path: String,
    pub backend: String,
    pub default_branch: Option<String>,
    pub head_commit: Option<CommitInfo>,
    pub commit_count: Option<u64>,
}
