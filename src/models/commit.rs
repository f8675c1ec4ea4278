use serde::{Deserialize, Serialize};

use crate::git::repository::format_relative_time;
use crate::git::{Branch, Commit, Signature, Tag};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetail {
    pub oid: String,
    pub message: String,
    pub author: AuthorInfo,
    pub committer: AuthorInfo,
    pub timestamp: i64,
    pub relative_time: String,
    pub parent_count: usize,
    pub parents: Vec<String>,
    pub signed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorInfo {
    pub name: String,
    pub email: String,
}

impl From<&Signature> for AuthorInfo {
    fn from(sig: &Signature) -> Self {
        AuthorInfo {
            name: sig.name.clone(),
            email: sig.email.clone(),
        }
    }
}

impl From<&Commit> for CommitDetail {
    fn from(commit: &Commit) -> Self {
        let timestamp = commit.committer().timestamp();
        CommitDetail {
            oid: commit.id().to_hex(),
            message: commit.message().to_string(),
            author: commit.author().into(),
            committer: commit.committer().into(),
            timestamp,
            relative_time: format_relative_time(timestamp),
            parent_count: commit.parent_count(),
            parents: commit.parents().iter().map(|p| p.to_hex()).collect(),
            signed: commit.signature().is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitListResponse {
    pub commits: Vec<CommitDetail>,
    pub page: usize,
    pub page_size: usize,
    pub total: u64,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub oid: String,
    pub is_default: bool,
}

impl BranchInfo {
    pub fn new(branch: Branch, default: Option<&str>) -> Self {
        BranchInfo {
            is_default: default == Some(branch.name.as_str()),
            oid: branch.commit_id.to_hex(),
            name: branch.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagInfo {
    pub name: String,
    pub oid: String,
    pub target: String,
    pub annotated: bool,
    pub tagger: Option<AuthorInfo>,
    pub timestamp: Option<i64>,
    pub message: String,
}

impl From<Tag> for TagInfo {
    fn from(tag: Tag) -> Self {
        TagInfo {
            annotated: tag.is_annotated(),
            oid: tag.id.to_hex(),
            target: tag.object.to_hex(),
            tagger: tag.tagger.as_ref().map(AuthorInfo::from),
            timestamp: tag.tagger.as_ref().map(Signature::timestamp),
            message: tag.message.trim().to_string(),
            name: tag.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagListResponse {
    pub tags: Vec<TagInfo>,
    pub total: usize,
}
