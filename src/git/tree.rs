//! Tree objects with lazily decoded entries.
//!
//! A `Tree` reads its entry list from the backend on first use and keeps it.
//! Trees reached by descending (`sub_tree`, path lookups) remember the tree
//! they came from; symlink resolution walks those parents for `../`.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{GitError, Result};
use crate::git::backend::RawTreeEntry;
use crate::git::object_id::ObjectId;
use crate::git::repository::Repository;
use crate::git::tree_entry::{EntryMode, TreeEntry};

pub struct Tree {
    id: ObjectId,
    resolved_id: ObjectId,
    repo: Repository,
    parent: Option<Arc<Tree>>,
    entries: OnceLock<Arc<[RawTreeEntry]>>,
}

impl Tree {
    pub(crate) fn new(repo: Repository, id: ObjectId) -> Self {
        Self::resolved(repo, id, id)
    }

    /// A tree reached by peeling `resolved_id` (usually a commit).
    pub(crate) fn resolved(repo: Repository, id: ObjectId, resolved_id: ObjectId) -> Self {
        Tree {
            id,
            resolved_id,
            repo,
            parent: None,
            entries: OnceLock::new(),
        }
    }

    pub(crate) fn child(parent: &Arc<Tree>, id: ObjectId) -> Arc<Tree> {
        Arc::new(Tree {
            id,
            resolved_id: id,
            repo: parent.repo.clone(),
            parent: Some(parent.clone()),
            entries: OnceLock::new(),
        })
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The object this tree was obtained from, the tree itself unless peeled.
    pub fn resolved_id(&self) -> ObjectId {
        self.resolved_id
    }

    pub fn parent(&self) -> Option<&Arc<Tree>> {
        self.parent.as_ref()
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    fn raw_entries(&self) -> Result<&[RawTreeEntry]> {
        if let Some(entries) = self.entries.get() {
            return Ok(entries);
        }
        let decoded = self.repo.backend().read_tree(self.repo.ctx(), &self.id)?;
        Ok(self.entries.get_or_init(|| decoded.into()))
    }

    fn entry(self: &Arc<Self>, raw: &RawTreeEntry) -> TreeEntry {
        TreeEntry::new(self.clone(), raw.id, raw.name.clone(), raw.mode, raw.size)
    }

    /// Children in on-disk order.
    pub fn list_entries(self: &Arc<Self>) -> Result<Vec<TreeEntry>> {
        Ok(self.raw_entries()?.iter().map(|raw| self.entry(raw)).collect())
    }

    /// Descends into `rpath` one directory at a time.
    pub fn sub_tree(self: &Arc<Self>, rpath: &str) -> Result<Arc<Tree>> {
        let mut current = self.clone();
        for name in rpath.split('/').filter(|s| !s.is_empty()) {
            let id = current
                .raw_entries()?
                .iter()
                .find(|e| e.name == name)
                .filter(|e| e.mode == EntryMode::Tree)
                .map(|e| e.id)
                .ok_or_else(|| GitError::path_not_found(rpath))?;
            current = Tree::child(&current, id);
        }
        Ok(current)
    }

    /// Entry at `relpath`. The empty path is the tree itself as a directory
    /// entry.
    pub fn get_tree_entry_by_path(self: &Arc<Self>, relpath: &str) -> Result<TreeEntry> {
        if relpath.is_empty() {
            return Ok(self.root_entry());
        }

        let cleaned = clean_path(relpath);
        if cleaned.is_empty() {
            return Ok(self.root_entry());
        }

        let (dir, name) = cleaned.rsplit_once('/').unwrap_or(("", cleaned.as_str()));
        let tree = self.sub_tree(dir).map_err(|e| {
            if e.is_not_found() {
                GitError::path_not_found(relpath)
            } else {
                e
            }
        })?;

        tree.raw_entries()?
            .iter()
            .find(|e| e.name == name)
            .map(|raw| tree.entry(raw))
            .ok_or_else(|| GitError::path_not_found(relpath))
    }

    fn root_entry(self: &Arc<Self>) -> TreeEntry {
        TreeEntry::new(self.clone(), self.id, String::new(), EntryMode::Tree, None)
    }

    /// Every entry below this tree, depth first, named by its path from here
    /// and with its size resolved. A subtree id already walked is skipped.
    pub fn list_entries_recursive_with_size(self: &Arc<Self>) -> Result<Vec<TreeEntry>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(self.id);
        self.walk_into(String::new(), &mut seen, &mut out)?;
        Ok(out)
    }

    fn walk_into(
        self: &Arc<Self>,
        prefix: String,
        seen: &mut HashSet<ObjectId>,
        out: &mut Vec<TreeEntry>,
    ) -> Result<()> {
        self.repo.ctx().check("list tree recursively")?;
        for raw in self.raw_entries()? {
            if raw.mode == EntryMode::Tree && !seen.insert(raw.id) {
                continue;
            }
            let full_name = format!("{prefix}{}", raw.name);
            let entry = self.entry(raw).with_full_name(full_name.clone());
            entry.size();
            out.push(entry);
            if raw.mode == EntryMode::Tree {
                Tree::child(self, raw.id).walk_into(format!("{full_name}/"), seen, out)?;
            }
        }
        Ok(())
    }

    /// The subset of `names` that exist below this tree.
    pub fn ls_tree(self: &Arc<Self>, names: &[&str]) -> Result<Vec<String>> {
        let mut found = Vec::new();
        for name in names {
            match self.get_tree_entry_by_path(name) {
                Ok(_) => found.push(name.to_string()),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("id", &self.id)
            .field("resolved_id", &self.resolved_id)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// Lexical cleanup: drops empty and `.` segments and folds `dir/..`.
/// Leading `..` segments are kept so lookups of them fail.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." if parts.last().is_some_and(|p| *p != "..") => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::backend::MockBackend;
    use pretty_assertions::assert_eq;

    #[test]
    fn clean_path_cases() {
        assert_eq!(clean_path("a//b/./c"), "a/b/c");
        assert_eq!(clean_path("/a/b/"), "a/b");
        assert_eq!(clean_path("a/../b"), "b");
        assert_eq!(clean_path("../a"), "../a");
        assert_eq!(clean_path("."), "");
    }

    #[test]
    fn empty_path_is_synthetic_root() {
        let mock = MockBackend::new();
        let root = mock.tree(&[("a.txt", mock.blob("a"))]);
        let tree = mock.repository().get_tree_by_id(root);
        let entry = tree.get_tree_entry_by_path("").unwrap();
        assert_eq!(entry.id(), root);
        assert!(entry.is_dir());
        assert_eq!(entry.name(), "");
    }

    #[test]
    fn nested_lookup_and_not_found() {
        let mock = MockBackend::new();
        let leaf = mock.blob("fn main() {}");
        let src = mock.tree(&[("main.rs", leaf)]);
        let root = mock.tree(&[("src", src), ("README", mock.blob("r"))]);
        let tree = mock.repository().get_tree_by_id(root);

        assert_eq!(tree.get_tree_entry_by_path("src/main.rs").unwrap().id(), leaf);
        assert_eq!(tree.get_tree_entry_by_path("./src//main.rs").unwrap().id(), leaf);
        assert_eq!(tree.get_tree_entry_by_path("src").unwrap().id(), src);

        for missing in ["nope", "src/nope.rs", "nope/main.rs", "README/x"] {
            match tree.get_tree_entry_by_path(missing) {
                Err(GitError::NotFound { rel_path, .. }) => assert_eq!(rel_path, missing),
                other => panic!("{missing}: expected not found, got {other:?}"),
            }
        }
    }

    #[test]
    fn sub_tree_tracks_parents() {
        let mock = MockBackend::new();
        let c = mock.tree(&[("f", mock.blob("f"))]);
        let b = mock.tree(&[("c", c)]);
        let root = mock.tree(&[("b", b)]);
        let tree = mock.repository().get_tree_by_id(root);

        let sub = tree.sub_tree("b/c").unwrap();
        assert_eq!(sub.id(), c);
        let parent = sub.parent().unwrap();
        assert_eq!(parent.id(), b);
        assert_eq!(parent.parent().unwrap().id(), root);
        assert!(tree.sub_tree("b/c/f").unwrap_err().is_not_found());
        assert_eq!(tree.sub_tree("").unwrap().id(), root);
    }

    #[test]
    fn entries_are_decoded_once() {
        let mock = MockBackend::new();
        let root = mock.tree(&[("a", mock.blob("a")), ("b", mock.blob("b"))]);
        let tree = mock.repository().get_tree_by_id(root);
        tree.list_entries().unwrap();
        tree.get_tree_entry_by_path("b").unwrap();
        tree.list_entries().unwrap();
        assert_eq!(mock.tree_reads(), 1);
    }

    #[test]
    fn recursive_listing_with_shared_subtree() {
        let mock = MockBackend::new();
        let shared = mock.tree(&[("lib.rs", mock.blob("pub fn x() {}"))]);
        let root = mock.tree(&[
            ("a", shared),
            ("b", shared),
            ("top.txt", mock.blob("12345")),
        ]);
        let tree = mock.repository().get_tree_by_id(root);
        let entries = tree.list_entries_recursive_with_size().unwrap();
        let listed: Vec<(&str, u64)> = entries.iter().map(|e| (e.name(), e.size())).collect();
        assert_eq!(listed, [("a", 0), ("a/lib.rs", 13), ("top.txt", 5)]);
    }

    #[test]
    fn ls_tree_filters_existing() {
        let mock = MockBackend::new();
        let root = mock.tree(&[("docs", mock.tree(&[("x.md", mock.blob("x"))])), ("a", mock.blob("a"))]);
        let tree = mock.repository().get_tree_by_id(root);
        assert_eq!(tree.ls_tree(&["a", "b", "docs/x.md"]).unwrap(), ["a", "docs/x.md"]);
    }
}
