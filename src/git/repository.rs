use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::cache::{self, CacheService};
use crate::error::{GitError, Result};
use crate::git::backend::{Backend, CliBackend, CommitFileStatus, Divergence, NativeBackend, ObjectKind, RevListQuery};
use crate::git::commit::Commit;
use crate::git::last_commit_cache::LastCommitCache;
use crate::git::object_id::{HEX_LEN, ObjectId};
use crate::git::tag::{TAG_PREFIX, Tag};
use crate::git::tree::Tree;
use crate::process::Context;
use crate::settings::Settings;

pub const BRANCH_PREFIX: &str = "refs/heads/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Native,
    Cli,
}

impl FromStr for BackendKind {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "native" | "git2" => Ok(BackendKind::Native),
            "cli" | "git" => Ok(BackendKind::Cli),
            other => Err(GitError::InvalidArgument(format!("unknown backend {other:?}"))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Native => "native",
            BackendKind::Cli => "cli",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub name: String,
    pub commit_id: ObjectId,
}

struct Inner {
    path: PathBuf,
    backend: Arc<dyn Backend>,
    ctx: Context,
    settings: Arc<Settings>,
    cache: Option<Arc<dyn CacheService>>,
    tag_cache: Mutex<HashMap<ObjectId, Tag>>,
    last_commit_cache: RwLock<Option<Arc<LastCommitCache>>>,
}

/// Shared handle to one repository. Clones are cheap and see the same
/// caches.
#[derive(Clone)]
pub struct Repository {
    inner: Arc<Inner>,
}

impl Repository {
    pub fn open<P: AsRef<Path>>(
        path: P,
        settings: Arc<Settings>,
        kind: BackendKind,
        cache: Option<Arc<dyn CacheService>>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let backend: Arc<dyn Backend> = match kind {
            BackendKind::Native => Arc::new(NativeBackend::open(path)?),
            BackendKind::Cli => {
                if !path.is_dir() {
                    return Err(GitError::not_found(path.display().to_string()));
                }
                Arc::new(CliBackend::new(path, settings.clone()))
            }
        };
        Ok(Self::with_backend(path, backend, Context::background(), settings, cache))
    }

    pub fn with_backend(
        path: impl Into<PathBuf>,
        backend: Arc<dyn Backend>,
        ctx: Context,
        settings: Arc<Settings>,
        cache: Option<Arc<dyn CacheService>>,
    ) -> Self {
        Repository {
            inner: Arc::new(Inner {
                path: path.into(),
                backend,
                ctx,
                settings,
                cache,
                tag_cache: Mutex::new(HashMap::new()),
                last_commit_cache: RwLock::new(None),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }

    pub fn ctx(&self) -> &Context {
        &self.inner.ctx
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn cache(&self) -> Option<&dyn CacheService> {
        self.inner.cache.as_deref()
    }

    /// A full id for `rev`. Forty hex characters are taken as-is.
    pub fn convert_to_id(&self, rev: &str) -> Result<ObjectId> {
        if rev.len() == HEX_LEN {
            if let Ok(id) = ObjectId::from_hex(rev) {
                return Ok(id);
            }
        }
        self.backend().resolve(self.ctx(), rev)
    }

    pub fn get_commit(&self, rev: &str) -> Result<Commit> {
        self.get_commit_by_id(&self.convert_to_id(rev)?)
    }

    /// Annotated tags are peeled; the tag's message, tagger and signature
    /// replace the commit's.
    pub fn get_commit_by_id(&self, id: &ObjectId) -> Result<Commit> {
        match self.backend().object_kind(self.ctx(), id)? {
            ObjectKind::Commit => Ok(Commit::new(self.clone(), self.backend().read_commit(self.ctx(), id)?)),
            ObjectKind::Tag => {
                let tag = self.backend().read_tag(self.ctx(), id)?;
                let mut data = self.backend().read_commit(self.ctx(), &tag.object)?;
                data.message = tag.message.trim().to_string();
                if let Some(tagger) = tag.tagger {
                    data.author = tagger;
                }
                data.signature = tag.signature;
                Ok(Commit::new(self.clone(), data))
            }
            _ => Err(GitError::not_found(id.to_string())),
        }
    }

    pub fn get_branch_commit(&self, name: &str) -> Result<Commit> {
        self.get_commit_by_id(&self.get_ref_commit_id(&format!("{BRANCH_PREFIX}{name}"))?)
    }

    pub fn get_tag_commit(&self, name: &str) -> Result<Commit> {
        self.get_commit_by_id(&self.get_ref_commit_id(&format!("{TAG_PREFIX}{name}"))?)
    }

    /// Target of a full reference name.
    pub fn get_ref_commit_id(&self, name: &str) -> Result<ObjectId> {
        self.backend()
            .references(self.ctx(), name)?
            .into_iter()
            .find(|(refname, _)| refname == name)
            .map(|(_, id)| id)
            .ok_or_else(|| GitError::not_found(name))
    }

    /// The root tree for `rev`, peeling tags and commits.
    pub fn get_tree(&self, rev: &str) -> Result<Arc<Tree>> {
        let resolved = self.convert_to_id(rev)?;
        let mut id = resolved;
        loop {
            match self.backend().object_kind(self.ctx(), &id)? {
                ObjectKind::Tree => return Ok(Arc::new(Tree::resolved(self.clone(), id, resolved))),
                ObjectKind::Commit => id = self.backend().read_commit(self.ctx(), &id)?.tree_id,
                ObjectKind::Tag => id = self.backend().read_tag(self.ctx(), &id)?.object,
                ObjectKind::Blob => return Err(GitError::not_found(rev)),
            }
        }
    }

    /// A tree handle without checking that `id` exists.
    pub fn get_tree_by_id(&self, id: ObjectId) -> Arc<Tree> {
        Arc::new(Tree::new(self.clone(), id))
    }

    /// Uncached history walk behind `Commit::get_commit_by_path`.
    pub fn last_commit_for_path(&self, id: &ObjectId, path: &str) -> Result<Commit> {
        let last = self.backend().last_commit_for_path(self.ctx(), id, path)?;
        self.get_commit_by_id(&last)
    }

    pub fn last_commit_cache(&self) -> Option<Arc<LastCommitCache>> {
        self.inner
            .last_commit_cache
            .read()
            .ok()
            .and_then(|guard| guard.clone())
    }

    /// Installs the last-commit cache when the history at `sha` is long
    /// enough. The commit count is memoized under `cache_key`.
    pub fn enable_last_commit_cache(&self, cache_key: &str, full_name: &str, sha: &str) -> Result<()> {
        if self.last_commit_cache().is_some() {
            return Ok(());
        }
        let count: u64 = cache::get_or_compute(self.cache(), cache_key, self.settings().cache.ttl, || {
            self.get_commit(sha)?.commits_count()
        })?;
        let lcc = LastCommitCache::new(count, full_name, self.inner.cache.clone(), self.settings());
        let mut slot = self
            .inner
            .last_commit_cache
            .write()
            .map_err(|_| GitError::Internal("Lock poisoned".to_string()))?;
        *slot = lcc.map(Arc::new);
        Ok(())
    }

    /// Drops the tag cache and the last-commit cache.
    pub fn close(&self) {
        if let Ok(mut tags) = self.inner.tag_cache.lock() {
            tags.clear();
        }
        if let Ok(mut slot) = self.inner.last_commit_cache.write() {
            if let Some(lcc) = slot.take() {
                lcc.clear();
            }
        }
    }

    pub(crate) fn commits_for_query(&self, query: &RevListQuery) -> Result<Vec<Commit>> {
        self.backend()
            .rev_list(self.ctx(), query)?
            .iter()
            .map(|id| self.get_commit_by_id(id))
            .collect()
    }

    /// Commits reachable from `last` but not from `before`, newest first.
    /// Unrelated histories fall back to listing both.
    pub fn commits_between(&self, last: &Commit, before: Option<&Commit>) -> Result<Vec<Commit>> {
        self.commits_between_limit(last, before, None, 0)
    }

    pub fn commits_between_limit(
        &self,
        last: &Commit,
        before: Option<&Commit>,
        limit: Option<usize>,
        skip: usize,
    ) -> Result<Vec<Commit>> {
        let query = |revisions: Vec<String>| RevListQuery {
            revisions,
            skip,
            max_count: limit,
            ..Default::default()
        };
        let Some(before) = before else {
            return self.commits_for_query(&query(vec![last.id().to_hex()]));
        };
        match self.commits_for_query(&query(vec![format!("{}..{}", before.id(), last.id())])) {
            Err(GitError::NoMergeBase) => {
                self.commits_for_query(&query(vec![before.id().to_hex(), last.id().to_hex()]))
            }
            other => other,
        }
    }

    /// `before` may be empty for the whole history of `last`.
    pub fn commits_between_ids(&self, last: &str, before: &str) -> Result<Vec<Commit>> {
        let last = self.get_commit(last)?;
        if before.is_empty() {
            return self.commits_between(&last, None);
        }
        let before = self.get_commit(before)?;
        self.commits_between(&last, Some(&before))
    }

    pub fn commits_count_between(&self, start: &str, end: &str) -> Result<u64> {
        let query = RevListQuery::revision(format!("{start}..{end}"));
        match self.backend().count(self.ctx(), &query) {
            Err(GitError::NoMergeBase) => {
                let query = RevListQuery {
                    revisions: vec![start.to_string(), end.to_string()],
                    ..Default::default()
                };
                self.backend().count(self.ctx(), &query)
            }
            other => other,
        }
    }

    /// Files changed on `end` since it forked from `start`.
    pub fn files_count_between(&self, start: &str, end: &str) -> Result<usize> {
        let files = match self.backend().changed_files(self.ctx(), start, end, true) {
            Err(GitError::NoMergeBase) => self.backend().changed_files(self.ctx(), start, end, false)?,
            other => other?,
        };
        Ok(files.len())
    }

    pub fn file_commits_count(&self, revision: &str, file: &str) -> Result<u64> {
        let query = RevListQuery {
            revisions: vec![revision.to_string()],
            paths: vec![file.to_string()],
            ..Default::default()
        };
        self.backend().count(self.ctx(), &query)
    }

    /// One page (from 1) of the commits touching `file`, sized by
    /// `git.commits_range_size`.
    pub fn commits_by_file_and_range(&self, revision: &str, file: &str, page: usize) -> Result<Vec<Commit>> {
        let size = self.settings().git.commits_range_size;
        let query = RevListQuery {
            revisions: vec![revision.to_string()],
            paths: vec![file.to_string()],
            skip: page.saturating_sub(1) * size,
            max_count: Some(size),
            ..Default::default()
        };
        self.commits_for_query(&query)
    }

    pub fn all_commits_count(&self) -> Result<u64> {
        let query = RevListQuery {
            all: true,
            ..Default::default()
        };
        self.backend().count(self.ctx(), &query)
    }

    /// Commits `target` has that `base` lacks, and the reverse.
    pub fn get_diverging_commits(&self, base: &str, target: &str) -> Result<Divergence> {
        self.backend().diverging_commits(self.ctx(), base, target)
    }

    pub fn get_commit_file_status(&self, rev: &str) -> Result<CommitFileStatus> {
        self.get_commit(rev)?.get_file_status()
    }

    /// Whether the commit named by `rev` is reachable from the tip of `branch`.
    /// A missing branch contains nothing.
    pub fn is_commit_in_branch(&self, rev: &str, branch: &str) -> Result<bool> {
        let commit = self.get_commit(rev)?.id();
        let tip = match self.get_ref_commit_id(&format!("{BRANCH_PREFIX}{branch}")) {
            Ok(tip) => tip,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };
        self.backend().is_ancestor(self.ctx(), &commit, &tip)
    }

    /// True until the first commit lands on HEAD.
    pub fn is_empty(&self) -> Result<bool> {
        self.backend().is_empty(self.ctx())
    }

    /// Newest committer time over all branch tips.
    pub fn get_latest_commit_time(&self) -> Result<DateTime<FixedOffset>> {
        let mut latest: Option<DateTime<FixedOffset>> = None;
        for (_, id) in self.backend().references(self.ctx(), BRANCH_PREFIX)? {
            let when = self.backend().read_commit(self.ctx(), &id)?.committer.when;
            if latest.is_none_or(|l| when > l) {
                latest = Some(when);
            }
        }
        latest.ok_or_else(|| GitError::not_found(BRANCH_PREFIX))
    }

    /// Expands an abbreviated id or any other revision to a full object id.
    pub fn get_full_commit_id(&self, short_id: &str) -> Result<ObjectId> {
        self.backend().resolve(self.ctx(), short_id)
    }

    pub fn is_object_exist(&self, name: &str) -> Result<bool> {
        if name.is_empty() {
            return Ok(false);
        }
        not_found_as_false(self.backend().resolve(self.ctx(), name))
    }

    /// Whether the full reference `name` exists.
    pub fn is_reference_exist(&self, name: &str) -> Result<bool> {
        if name.is_empty() {
            return Ok(false);
        }
        not_found_as_false(self.get_ref_commit_id(name))
    }

    /// Full names of the references starting with `prefix` that point at
    /// `sha`. Annotated tags point at their tag object.
    pub fn get_refs_by_sha(&self, sha: &str, prefix: &str) -> Result<Vec<String>> {
        let id = ObjectId::from_hex(sha)?;
        Ok(self
            .backend()
            .references(self.ctx(), "refs/")?
            .into_iter()
            .filter(|(name, target)| *target == id && name.starts_with(prefix))
            .map(|(name, _)| name)
            .collect())
    }

    /// Tag name for a tag object id, or for a commit a lightweight tag
    /// points at.
    pub fn get_tag_name_by_sha(&self, sha: &str) -> Result<String> {
        if sha.len() < 5 {
            return Err(GitError::InvalidArgument(format!("SHA is too short: {sha}")));
        }
        let id = self.backend().resolve(self.ctx(), sha)?;
        if self.backend().object_kind(self.ctx(), &id)? == ObjectKind::Tag {
            return Ok(self.backend().read_tag(self.ctx(), &id)?.name);
        }
        self.backend()
            .references(self.ctx(), TAG_PREFIX)?
            .into_iter()
            .find(|(_, target)| *target == id)
            .map(|(name, _)| name.trim_start_matches(TAG_PREFIX).to_string())
            .ok_or_else(|| GitError::not_found(sha))
    }

    /// Branch that HEAD points at.
    pub fn get_default_branch(&self) -> Result<String> {
        match self.backend().head_ref(self.ctx())? {
            Some(head) => head
                .strip_prefix(BRANCH_PREFIX)
                .map(str::to_string)
                .ok_or_else(|| GitError::InvalidArgument(format!("HEAD is not a branch: {head}"))),
            None => Err(GitError::not_found("HEAD")),
        }
    }

    pub fn is_branch_exist(&self, name: &str) -> Result<bool> {
        not_found_as_false(self.get_ref_commit_id(&format!("{BRANCH_PREFIX}{name}")))
    }

    pub fn is_tag_exist(&self, name: &str) -> Result<bool> {
        not_found_as_false(self.get_ref_commit_id(&format!("{TAG_PREFIX}{name}")))
    }

    /// Sorted branches after `skip`, at most `limit` of them (0 for all),
    /// with the total count.
    pub fn get_branches(&self, skip: usize, limit: usize) -> Result<(Vec<Branch>, usize)> {
        let refs = self.backend().references(self.ctx(), BRANCH_PREFIX)?;
        let total = refs.len();
        let branches = paginate(refs, skip, limit)
            .into_iter()
            .map(|(name, commit_id)| Branch {
                name: name.trim_start_matches(BRANCH_PREFIX).to_string(),
                commit_id,
            })
            .collect();
        Ok((branches, total))
    }

    pub fn get_branch_names(&self, skip: usize, limit: usize) -> Result<(Vec<String>, usize)> {
        let (branches, total) = self.get_branches(skip, limit)?;
        Ok((branches.into_iter().map(|b| b.name).collect(), total))
    }

    /// Tag by short name. Annotated tag objects are cached per id.
    pub fn get_tag(&self, name: &str) -> Result<Tag> {
        let id = self.get_ref_commit_id(&format!("{TAG_PREFIX}{name}"))?;
        self.get_tag_with_id(&id, name)
    }

    pub fn get_tag_with_id(&self, id: &ObjectId, name: &str) -> Result<Tag> {
        if let Some(tag) = self.tag_cache()?.get(id) {
            return Ok(tag.clone());
        }
        let tag = match self.backend().object_kind(self.ctx(), id)? {
            ObjectKind::Tag => {
                let mut tag = self.backend().read_tag(self.ctx(), id)?;
                tag.name = name.to_string();
                tag
            }
            kind => {
                let commit = self.backend().read_commit(self.ctx(), id)?;
                Tag {
                    name: name.to_string(),
                    id: *id,
                    object: *id,
                    kind,
                    tagger: Some(commit.committer),
                    message: commit.message,
                    signature: None,
                }
            }
        };
        if tag.is_annotated() {
            self.tag_cache()?.insert(*id, tag.clone());
        }
        Ok(tag)
    }

    /// Tags newest first, one page (from 1) of `page_size`; page 0 returns
    /// all. The total is returned alongside.
    pub fn get_tag_infos(&self, page: usize, page_size: usize) -> Result<(Vec<Tag>, usize)> {
        let tags = self.backend().tags(self.ctx())?;
        let total = tags.len();
        if page == 0 {
            return Ok((tags, total));
        }
        Ok((paginate(tags, (page - 1) * page_size, page_size), total))
    }

    pub fn get_tags(&self, skip: usize, limit: usize) -> Result<Vec<String>> {
        let tags = self.backend().tags(self.ctx())?;
        Ok(paginate(tags, skip, limit).into_iter().map(|t| t.name).collect())
    }

    fn tag_cache(&self) -> Result<std::sync::MutexGuard<'_, HashMap<ObjectId, Tag>>> {
        self.inner
            .tag_cache
            .lock()
            .map_err(|_| GitError::Internal("Lock poisoned".to_string()))
    }
}

impl fmt::Debug for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("path", &self.inner.path)
            .field("backend", &self.inner.backend.name())
            .finish()
    }
}

fn not_found_as_false<T>(result: Result<T>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// `limit == 0` means no limit.
fn paginate<T>(items: Vec<T>, skip: usize, limit: usize) -> Vec<T> {
    let limit = if limit == 0 { usize::MAX } else { limit };
    items.into_iter().skip(skip).take(limit).collect()
}

pub fn format_relative_time(timestamp: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let diff = now - timestamp;

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        let mins = diff / 60;
        format!("{} minute{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if diff < 86400 {
        let hours = diff / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if diff < 2592000 {
        let days = diff / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else if diff < 31536000 {
        let months = diff / 2592000;
        format!("{} month{} ago", months, if months == 1 { "" } else { "s" })
    } else {
        let years = diff / 31536000;
        format!("{} year{} ago", years, if years == 1 { "" } else { "s" })
    }
}
