//! Commits and the queries that start from one.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::error::{GitError, Result};
use crate::git::backend::{CommitData, CommitFileStatus, CommitSignature, LogFilter, RevListQuery};
use crate::git::blob::Blob;
use crate::git::object_id::{ObjectId, is_valid_sha_pattern};
use crate::git::repository::Repository;
use crate::git::signature::Signature;
use crate::git::tree::Tree;
use crate::git::tree_entry::TreeEntry;

/// Upper bound on `search_commits` results.
pub const SEARCH_LIMIT: usize = 100;

const GITMODULES: &str = ".gitmodules";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubModule {
    pub name: String,
    pub url: String,
}

/// Parsed form of a free-text commit search such as
/// `fix author:alice after:2024-01-01`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCommitsOptions {
    pub keywords: Vec<String>,
    pub authors: Vec<String>,
    pub committers: Vec<String>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub all: bool,
}

impl SearchCommitsOptions {
    pub fn from_query(query: &str, all: bool) -> Self {
        let mut opts = SearchCommitsOptions {
            all,
            ..Default::default()
        };
        for word in query.split_whitespace() {
            if let Some(v) = word.strip_prefix("author:") {
                opts.authors.push(v.to_string());
            } else if let Some(v) = word.strip_prefix("committer:") {
                opts.committers.push(v.to_string());
            } else if let Some(v) = word.strip_prefix("after:") {
                opts.after = Some(v.to_string());
            } else if let Some(v) = word.strip_prefix("before:") {
                opts.before = Some(v.to_string());
            } else {
                opts.keywords.push(word.to_string());
            }
        }
        opts
    }

    fn filter(&self, revision: String) -> LogFilter {
        LogFilter {
            revision,
            all: self.all,
            authors: self.authors.clone(),
            committers: self.committers.clone(),
            after: self.after.clone(),
            before: self.before.clone(),
            grep: self.keywords.clone(),
            max_count: SEARCH_LIMIT,
        }
    }
}

#[derive(Clone)]
pub struct Commit {
    repo: Repository,
    data: Arc<CommitData>,
    tree: Arc<Tree>,
    submodules: Arc<OnceLock<HashMap<String, SubModule>>>,
}

impl Commit {
    pub(crate) fn new(repo: Repository, data: CommitData) -> Self {
        let tree = Arc::new(Tree::resolved(repo.clone(), data.tree_id, data.id));
        Commit {
            repo,
            data: Arc::new(data),
            tree,
            submodules: Arc::new(OnceLock::new()),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.data.id
    }

    pub fn author(&self) -> &Signature {
        &self.data.author
    }

    pub fn committer(&self) -> &Signature {
        &self.data.committer
    }

    pub fn message(&self) -> &str {
        &self.data.message
    }

    /// First line of the trimmed message.
    pub fn summary(&self) -> &str {
        self.data.message.trim().lines().next().unwrap_or_default()
    }

    pub fn signature(&self) -> Option<&CommitSignature> {
        self.data.signature.as_ref()
    }

    pub fn data(&self) -> &CommitData {
        &self.data
    }

    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.data.parents
    }

    pub fn parent_count(&self) -> usize {
        self.data.parents.len()
    }

    pub fn parent_id(&self, n: usize) -> Result<ObjectId> {
        self.data
            .parents
            .get(n)
            .copied()
            .ok_or_else(|| GitError::not_found(format!("{}^{}", self.id(), n + 1)))
    }

    pub fn parent(&self, n: usize) -> Result<Commit> {
        self.repo.get_commit_by_id(&self.parent_id(n)?)
    }

    /// Last commit reachable from this one that changed `path`.
    pub fn get_commit_by_path(&self, path: &str) -> Result<Commit> {
        match self.repo.last_commit_cache() {
            Some(cache) => cache.get_commit_by_path(&self.repo, &self.id().to_hex(), path),
            None => self.repo.last_commit_for_path(&self.id(), path),
        }
    }

    pub fn commits_count(&self) -> Result<u64> {
        let repo = &self.repo;
        repo.backend()
            .count(repo.ctx(), &RevListQuery::revision(self.id().to_hex()))
    }

    /// One page of history, `page` counting from 1.
    pub fn commits_by_range(&self, page: usize, page_size: usize) -> Result<Vec<Commit>> {
        let query = RevListQuery {
            revisions: vec![self.id().to_hex()],
            skip: page.saturating_sub(1) * page_size,
            max_count: Some(page_size),
            ..Default::default()
        };
        self.repo.commits_for_query(&query)
    }

    /// Commits after `rev` up to and including this one.
    pub fn commits_before_until(&self, rev: &str) -> Result<Vec<Commit>> {
        let end = self.repo.get_commit(rev)?;
        self.repo.commits_between(self, Some(&end))
    }

    pub fn search_commits(&self, opts: &SearchCommitsOptions) -> Result<Vec<Commit>> {
        let repo = &self.repo;
        let mut ids = repo.backend().log(repo.ctx(), &opts.filter(self.id().to_hex()))?;

        for keyword in opts.keywords.iter().filter(|k| is_valid_sha_pattern(k)) {
            let mut by_id = opts.filter(keyword.clone());
            by_id.all = false;
            by_id.grep.clear();
            by_id.max_count = 1;
            match repo.backend().log(repo.ctx(), &by_id) {
                Ok(found) => {
                    for id in found {
                        if !ids.contains(&id) {
                            ids.push(id);
                        }
                    }
                }
                Err(e) if e.is_not_found() || matches!(e, GitError::Run { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        ids.iter().map(|id| repo.get_commit_by_id(id)).collect()
    }

    pub fn files_changed_since_commit(&self, past: &str) -> Result<Vec<String>> {
        let repo = &self.repo;
        repo.backend()
            .changed_files(repo.ctx(), past, &self.id().to_hex(), false)
    }

    /// Whether `file`, or anything below it, differs from `past`.
    pub fn file_changed_since_commit(&self, file: &str, past: &str) -> Result<bool> {
        let prefix = format!("{}/", file.trim_end_matches('/'));
        Ok(self
            .files_changed_since_commit(past)?
            .iter()
            .any(|f| f == file || f.starts_with(&prefix)))
    }

    /// Whether `id` is a strict ancestor of this commit.
    pub fn has_previous_commit(&self, id: &ObjectId) -> Result<bool> {
        if *id == self.id() {
            return Ok(false);
        }
        let repo = &self.repo;
        repo.backend().is_ancestor(repo.ctx(), id, &self.id())
    }

    /// Paths added, removed and modified against the first parent.
    pub fn get_file_status(&self) -> Result<CommitFileStatus> {
        let repo = &self.repo;
        repo.backend().commit_file_status(repo.ctx(), &self.id())
    }

    /// Closest branch containing this commit, `None` when only tags do.
    pub fn get_branch_name(&self) -> Result<Option<String>> {
        let repo = &self.repo;
        repo.backend().nearest_branch(repo.ctx(), &self.id())
    }

    pub fn get_tag_name(&self) -> Result<Option<String>> {
        let repo = &self.repo;
        repo.backend().exact_tag(repo.ctx(), &self.id())
    }

    pub fn get_tree_entry_by_path(&self, path: &str) -> Result<TreeEntry> {
        self.tree.get_tree_entry_by_path(path)
    }

    /// The blob at `path`; directories and submodules are not blobs.
    pub fn get_blob_by_path(&self, path: &str) -> Result<Blob> {
        let entry = self.get_tree_entry_by_path(path)?;
        if entry.is_dir() || entry.is_sub_module() {
            return Err(GitError::path_not_found(path));
        }
        Ok(entry.blob())
    }

    pub fn has_file(&self, path: &str) -> Result<bool> {
        match self.get_blob_by_path(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// File content as text, at most `limit` bytes when `limit > 0`.
    pub fn get_file_content(&self, path: &str, limit: usize) -> Result<String> {
        let mut data = self.get_tree_entry_by_path(path)?.blob().data()?;
        if limit > 0 {
            data.truncate(limit);
        }
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Submodules declared in `.gitmodules`, keyed by path. Parsed once.
    pub fn get_sub_modules(&self) -> Result<&HashMap<String, SubModule>> {
        if let Some(modules) = self.submodules.get() {
            return Ok(modules);
        }
        let modules = match self.get_tree_entry_by_path(GITMODULES) {
            Ok(entry) => parse_gitmodules(&String::from_utf8_lossy(&entry.blob().data()?)),
            Err(e) if e.is_not_found() => HashMap::new(),
            Err(e) => return Err(e),
        };
        Ok(self.submodules.get_or_init(|| modules))
    }

    pub fn get_sub_module(&self, path: &str) -> Result<Option<SubModule>> {
        Ok(self.get_sub_modules()?.get(path).cloned())
    }
}

impl fmt::Debug for Commit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Commit")
            .field("id", &self.data.id)
            .field("summary", &self.summary())
            .finish()
    }
}

/// Collects `path`/`url` pairs from `[submodule ...]` sections. A section
/// ends at its `url` line; lines without `=` are ignored.
pub fn parse_gitmodules(content: &str) -> HashMap<String, SubModule> {
    let mut modules = HashMap::new();
    let mut in_module = false;
    let mut path = String::new();
    for line in content.lines() {
        if line.starts_with("[submodule") {
            in_module = true;
            path.clear();
            continue;
        }
        if !in_module {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "path" => path = value.trim().to_string(),
            "url" => {
                modules.insert(
                    path.clone(),
                    SubModule {
                        name: path.clone(),
                        url: value.trim().to_string(),
                    },
                );
                in_module = false;
            }
            _ => {}
        }
    }
    modules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::backend::{MockBackend, MockCommit};
    use pretty_assertions::assert_eq;

    #[test]
    fn search_query_parsing() {
        let opts = SearchCommitsOptions::from_query(
            "fix  author:alice author:bob committer:carol after:2024-01-01 before:2024-02-01 crash",
            true,
        );
        assert_eq!(
            opts,
            SearchCommitsOptions {
                keywords: vec!["fix".into(), "crash".into()],
                authors: vec!["alice".into(), "bob".into()],
                committers: vec!["carol".into()],
                after: Some("2024-01-01".into()),
                before: Some("2024-02-01".into()),
                all: true,
            }
        );
    }

    #[test]
    fn gitmodules_parsing() {
        let content = "\
[submodule \"lib\"]
\tpath = vendor/lib
\turl = https://example.com/lib.git
[submodule \"broken\"]
\tnonsense
\tpath = tools
\turl = ../tools.git
[core]
\turl = ignored
";
        let modules = parse_gitmodules(content);
        assert_eq!(modules.len(), 2);
        assert_eq!(modules["vendor/lib"].url, "https://example.com/lib.git");
        assert_eq!(modules["tools"].name, "tools");
    }

    fn history(mock: &std::sync::Arc<MockBackend>) -> (ObjectId, ObjectId, ObjectId) {
        let t1 = mock.tree(&[("a.txt", mock.blob("1"))]);
        let c1 = mock.commit(MockCommit::new(t1, &[], "first\n", 100).by("Alice <alice@example.com>"));
        let t2 = mock.tree(&[("a.txt", mock.blob("1")), ("b.txt", mock.blob("2"))]);
        let c2 = mock.commit(MockCommit::new(t2, &[c1], "add b: crash fix\n", 200).by("Bob <bob@example.com>"));
        let t3 = mock.tree(&[
            ("a.txt", mock.blob("1")),
            ("b.txt", mock.blob("2")),
            (".gitmodules", mock.blob("[submodule \"s\"]\n\tpath = s\n\turl = git://x/s\n")),
        ]);
        let c3 = mock.commit(MockCommit::new(t3, &[c2], "\n  third\nbody\n", 300).by("Alice <alice@example.com>"));
        mock.set_ref("refs/heads/main", c3);
        mock.set_head("main");
        (c1, c2, c3)
    }

    #[test]
    fn parents_and_summary() {
        let mock = MockBackend::new();
        let (_, c2, c3) = history(&mock);
        let commit = mock.repository().get_commit("main").unwrap();
        assert_eq!(commit.id(), c3);
        assert_eq!(commit.summary(), "third");
        assert_eq!(commit.parent_count(), 1);
        assert_eq!(commit.parent_id(0).unwrap(), c2);
        assert_eq!(commit.parent(0).unwrap().summary(), "add b: crash fix");
        assert!(commit.parent_id(1).unwrap_err().is_not_found());
    }

    #[test]
    fn last_commit_by_path() {
        let mock = MockBackend::new();
        let (c1, c2, c3) = history(&mock);
        let commit = mock.repository().get_commit("main").unwrap();
        assert_eq!(commit.get_commit_by_path("a.txt").unwrap().id(), c1);
        assert_eq!(commit.get_commit_by_path("b.txt").unwrap().id(), c2);
        assert_eq!(commit.get_commit_by_path(".gitmodules").unwrap().id(), c3);
        assert!(commit.get_commit_by_path("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn ranges_and_counts() {
        let mock = MockBackend::new();
        let (c1, c2, c3) = history(&mock);
        let commit = mock.repository().get_commit("main").unwrap();
        assert_eq!(commit.commits_count().unwrap(), 3);
        let page: Vec<ObjectId> = commit.commits_by_range(2, 2).unwrap().iter().map(Commit::id).collect();
        assert_eq!(page, [c1]);
        let until: Vec<ObjectId> = commit
            .commits_before_until(&c1.to_hex())
            .unwrap()
            .iter()
            .map(Commit::id)
            .collect();
        assert_eq!(until, [c3, c2]);
        assert!(commit.has_previous_commit(&c1).unwrap());
        assert!(!commit.has_previous_commit(&c3).unwrap());
    }

    #[test]
    fn search_by_keyword_author_and_sha() {
        let mock = MockBackend::new();
        let (c1, c2, _) = history(&mock);
        let commit = mock.repository().get_commit("main").unwrap();

        let found = commit
            .search_commits(&SearchCommitsOptions::from_query("CRASH", false))
            .unwrap();
        assert_eq!(found.iter().map(Commit::id).collect::<Vec<_>>(), [c2]);

        let found = commit
            .search_commits(&SearchCommitsOptions::from_query("author:alice", false))
            .unwrap();
        assert_eq!(found.len(), 2);

        let query = format!("{} author:alice", &c1.to_hex()[..8]);
        let found = commit
            .search_commits(&SearchCommitsOptions::from_query(&query, false))
            .unwrap();
        assert_eq!(found.iter().map(Commit::id).collect::<Vec<_>>(), [c1]);
    }

    #[test]
    fn files_and_submodules() {
        let mock = MockBackend::new();
        let (c1, _, _) = history(&mock);
        let commit = mock.repository().get_commit("main").unwrap();

        assert!(commit.has_file("b.txt").unwrap());
        assert!(!commit.has_file("zzz").unwrap());
        assert_eq!(commit.get_file_content(".gitmodules", 11).unwrap(), "[submodule ");
        assert_eq!(
            commit.files_changed_since_commit(&c1.to_hex()).unwrap(),
            [".gitmodules", "b.txt"]
        );
        assert!(commit.file_changed_since_commit("b.txt", &c1.to_hex()).unwrap());
        assert!(!commit.file_changed_since_commit("a.txt", &c1.to_hex()).unwrap());

        assert_eq!(commit.get_sub_module("s").unwrap().unwrap().url, "git://x/s");
        assert!(commit.get_sub_module("t").unwrap().is_none());
        let first = mock.repository().get_commit(&c1.to_hex()).unwrap();
        assert!(first.get_sub_modules().unwrap().is_empty());
    }

    #[test]
    fn file_status_branch_and_tag_names() {
        let mock = MockBackend::new();
        let (c1, c2, _) = history(&mock);
        let t = mock.tree(&[("b.txt", mock.blob("3"))]);
        let side = mock.commit(MockCommit::new(t, &[c2], "side
", 400));
        mock.set_ref("refs/heads/side", side);
        mock.annotated_tag("v1", c1, "one", 150);
        let repo = mock.repository();

        let status = repo.get_commit(&side.to_hex()).unwrap().get_file_status().unwrap();
        assert_eq!(status.added, Vec::<String>::new());
        assert_eq!(status.removed, ["a.txt"]);
        assert_eq!(status.modified, ["b.txt"]);
        let root = repo.get_commit(&c1.to_hex()).unwrap();
        assert_eq!(root.get_file_status().unwrap().added, ["a.txt"]);

        assert_eq!(repo.get_commit("main").unwrap().get_branch_name().unwrap().as_deref(), Some("main"));
        assert_eq!(repo.get_commit(&side.to_hex()).unwrap().get_branch_name().unwrap().as_deref(), Some("side"));
        assert_eq!(root.get_tag_name().unwrap().as_deref(), Some("v1"));
        assert_eq!(repo.get_commit("main").unwrap().get_tag_name().unwrap(), None);
    }
}
