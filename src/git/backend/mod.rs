//! Object and history access behind one trait.
//!
//! The tree, commit and cache layers only ever see `Arc<dyn Backend>`:
//! - `NativeBackend`: libgit2 through `git2`, one locked handle per repository
//! - `CliBackend`: the `git` executable through the process runner
//! - `MockBackend`: in-memory objects for tests, behind the `mock` feature
//!
//! Backends return plain records (`CommitData`, `RawTreeEntry`, `Tag`); the
//! model types wrap those with lazily resolved state.

mod cli;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod native;

pub use cli::CliBackend;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockBackend, MockCommit};
pub use native::NativeBackend;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{GitError, Result};
use crate::git::object_id::ObjectId;
use crate::git::signature::Signature;
use crate::git::tag::Tag;
use crate::git::tree_entry::EntryMode;
use crate::process::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Commit => "commit",
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
            ObjectKind::Tag => "tag",
        }
    }
}

impl FromStr for ObjectKind {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "commit" => Ok(ObjectKind::Commit),
            "tree" => Ok(ObjectKind::Tree),
            "blob" => Ok(ObjectKind::Blob),
            "tag" => Ok(ObjectKind::Tag),
            other => Err(GitError::Parse(format!("unknown object type {other:?}"))),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of a decoded tree, in on-disk order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTreeEntry {
    pub name: String,
    pub mode: EntryMode,
    pub id: ObjectId,
    /// Filled in when the backend gets it for free (`ls-tree -l`).
    pub size: Option<u64>,
}

/// Detached signature plus the exact bytes it signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitSignature {
    pub signature: String,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitData {
    pub id: ObjectId,
    pub tree_id: ObjectId,
    pub parents: Vec<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
    pub signature: Option<CommitSignature>,
}

/// Paths a commit changed relative to its first parent, each list sorted.
/// A root commit adds every path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitFileStatus {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

impl CommitFileStatus {
    pub fn sort(&mut self) {
        self.added.sort();
        self.removed.sort();
        self.modified.sort();
    }
}

/// How far `target` has moved away from `base`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Divergence {
    /// Commits in `target` missing from `base`.
    pub ahead: u64,
    /// Commits in `base` missing from `target`.
    pub behind: u64,
}

/// `git rev-list` arguments.
#[derive(Debug, Clone, Default)]
pub struct RevListQuery {
    /// Revisions, `a..b` and `a...b` ranges, or `^a` exclusions.
    pub revisions: Vec<String>,
    pub paths: Vec<String>,
    pub all: bool,
    pub skip: usize,
    pub max_count: Option<usize>,
}

impl RevListQuery {
    pub fn revision(rev: impl Into<String>) -> Self {
        RevListQuery {
            revisions: vec![rev.into()],
            ..Default::default()
        }
    }
}

/// `git log` filters. Values within a field are alternatives; fields combine
/// with AND. Matching is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub revision: String,
    pub all: bool,
    pub authors: Vec<String>,
    pub committers: Vec<String>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub grep: Vec<String>,
    pub max_count: usize,
}

impl LogFilter {
    /// In-process equivalent of the filter for backends without `git log`.
    pub fn matches(&self, commit: &CommitData) -> Result<bool> {
        if !any_contains(&self.authors, &ident(&commit.author))
            || !any_contains(&self.committers, &ident(&commit.committer))
            || !any_contains(&self.grep, &commit.message)
        {
            return Ok(false);
        }
        let when = commit.committer.timestamp();
        if let Some(after) = &self.after {
            if when < parse_date_bound(after)? {
                return Ok(false);
            }
        }
        if let Some(before) = &self.before {
            if when > parse_date_bound(before)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn ident(sig: &Signature) -> String {
    format!("{} <{}>", sig.name, sig.email)
}

fn any_contains(needles: &[String], haystack: &str) -> bool {
    if needles.is_empty() {
        return true;
    }
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .any(|n| haystack.contains(&n.to_lowercase()))
}

/// Unix seconds for the date forms accepted by `--after`/`--before`:
/// RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD`, or a bare timestamp.
pub fn parse_date_bound(s: &str) -> Result<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc().timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc().timestamp());
        }
    }
    if let Ok(secs) = s.parse::<i64>() {
        return Ok(secs);
    }
    Err(GitError::InvalidArgument(format!("unrecognized date {s:?}")))
}

/// Capabilities the model layers need from a git implementation.
pub trait Backend: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Full object name for any revision expression, without peeling.
    fn resolve(&self, ctx: &Context, rev: &str) -> Result<ObjectId>;

    fn object_kind(&self, ctx: &Context, id: &ObjectId) -> Result<ObjectKind>;

    fn object_size(&self, ctx: &Context, id: &ObjectId) -> Result<u64>;

    fn read_commit(&self, ctx: &Context, id: &ObjectId) -> Result<CommitData>;

    /// An annotated tag object.
    fn read_tag(&self, ctx: &Context, id: &ObjectId) -> Result<Tag>;

    fn read_tree(&self, ctx: &Context, id: &ObjectId) -> Result<Vec<RawTreeEntry>>;

    fn read_blob(&self, ctx: &Context, id: &ObjectId) -> Result<Vec<u8>>;

    /// Newest commit reachable from `start` that changed `path`, following
    /// a parent with an identical entry through merges.
    fn last_commit_for_path(&self, ctx: &Context, start: &ObjectId, path: &str) -> Result<ObjectId>;

    /// Fails with `NoMergeBase` for a three-dot range over unrelated histories.
    fn rev_list(&self, ctx: &Context, query: &RevListQuery) -> Result<Vec<ObjectId>>;

    fn count(&self, ctx: &Context, query: &RevListQuery) -> Result<u64> {
        Ok(self.rev_list(ctx, query)?.len() as u64)
    }

    fn log(&self, ctx: &Context, filter: &LogFilter) -> Result<Vec<ObjectId>>;

    /// Paths changed between two revisions, from their merge base when
    /// `from_merge_base` is set.
    fn changed_files(&self, ctx: &Context, base: &str, head: &str, from_merge_base: bool) -> Result<Vec<String>>;

    fn is_ancestor(&self, ctx: &Context, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool>;

    /// Full reference names under `prefix` with the commit they point at.
    fn references(&self, ctx: &Context, prefix: &str) -> Result<Vec<(String, ObjectId)>>;

    /// Target of a symbolic HEAD, `None` when detached.
    fn head_ref(&self, ctx: &Context) -> Result<Option<String>>;

    /// All tags, newest first.
    fn tags(&self, ctx: &Context) -> Result<Vec<Tag>>;

    fn commit_file_status(&self, ctx: &Context, id: &ObjectId) -> Result<CommitFileStatus>;

    fn diverging_commits(&self, ctx: &Context, base: &str, target: &str) -> Result<Divergence> {
        Ok(Divergence {
            ahead: self.count(ctx, &RevListQuery::revision(format!("{base}..{target}")))?,
            behind: self.count(ctx, &RevListQuery::revision(format!("{target}..{base}")))?,
        })
    }

    /// Closest non-tag reference containing `id`, shortened the way
    /// `git name-rev` prints it and without the `~n` suffix.
    fn nearest_branch(&self, ctx: &Context, id: &ObjectId) -> Result<Option<String>>;

    /// Tag pointing exactly at the commit `id`. Annotated tags win over
    /// lightweight ones, then the newest.
    fn exact_tag(&self, ctx: &Context, id: &ObjectId) -> Result<Option<String>>;

    /// True while HEAD is unborn.
    fn is_empty(&self, ctx: &Context) -> Result<bool>;
}

/// `refs/heads/x` prints as `x`, other refs lose only `refs/`.
pub fn short_ref_name(name: &str) -> &str {
    name.strip_prefix("refs/heads/")
        .or_else(|| name.strip_prefix("refs/"))
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(author: &str, message: &str, when: i64) -> CommitData {
        let sig = Signature::parse(&format!("{author} {when} +0000")).unwrap();
        CommitData {
            id: ObjectId::zero(),
            tree_id: ObjectId::zero(),
            parents: Vec::new(),
            author: sig.clone(),
            committer: sig,
            message: message.to_string(),
            signature: None,
        }
    }

    #[test]
    fn filter_ands_fields_and_ors_values() {
        let c = commit("Alice <alice@example.com>", "Fix parser crash", 1_700_000_000);
        let filter = LogFilter {
            authors: vec!["bob".into(), "ALICE".into()],
            grep: vec!["crash".into()],
            ..Default::default()
        };
        assert!(filter.matches(&c).unwrap());

        let filter = LogFilter {
            authors: vec!["alice".into()],
            grep: vec!["unrelated".into()],
            ..Default::default()
        };
        assert!(!filter.matches(&c).unwrap());
    }

    #[test]
    fn filter_date_bounds() {
        let c = commit("A <a@x>", "m", 1_700_000_000);
        let filter = LogFilter {
            after: Some("2023-11-01".into()),
            before: Some("2023-11-30".into()),
            ..Default::default()
        };
        assert!(filter.matches(&c).unwrap());
        let filter = LogFilter {
            after: Some("2024-01-01".into()),
            ..Default::default()
        };
        assert!(!filter.matches(&c).unwrap());
    }

    #[test]
    fn short_names_follow_name_rev() {
        assert_eq!(short_ref_name("refs/heads/feature/x"), "feature/x");
        assert_eq!(short_ref_name("refs/remotes/origin/main"), "remotes/origin/main");
        assert_eq!(short_ref_name("HEAD"), "HEAD");
    }

    #[test]
    fn date_bound_forms() {
        assert_eq!(parse_date_bound("1970-01-02").unwrap(), 86_400);
        assert_eq!(parse_date_bound("1970-01-01 00:01:00").unwrap(), 60);
        assert_eq!(parse_date_bound("1970-01-01T01:00:00+01:00").unwrap(), 0);
        assert_eq!(parse_date_bound("42").unwrap(), 42);
        assert!(parse_date_bound("last tuesday").is_err());
    }
}
