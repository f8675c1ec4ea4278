use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::error::{GitError, LinkError, Result};
use crate::git::backend::ObjectKind;
use crate::git::blob::Blob;
use crate::git::object_id::ObjectId;
use crate::git::tree::Tree;

/// Symlink chains longer than this are rejected.
pub const MAX_LINK_HOPS: usize = 999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryMode {
    Blob,
    Executable,
    Symlink,
    Tree,
    /// Gitlink to a submodule commit.
    Commit,
}

impl EntryMode {
    pub fn from_raw(mode: u32) -> Result<Self> {
        match mode & 0o170000 {
            0o040000 => Ok(EntryMode::Tree),
            0o120000 => Ok(EntryMode::Symlink),
            0o160000 => Ok(EntryMode::Commit),
            0o100000 if mode & 0o111 != 0 => Ok(EntryMode::Executable),
            0o100000 => Ok(EntryMode::Blob),
            _ => Err(GitError::Parse(format!("unknown tree entry mode {mode:o}"))),
        }
    }

    /// Octal text as printed by `ls-tree`.
    pub fn from_octal(s: &str) -> Result<Self> {
        let raw = u32::from_str_radix(s, 8)
            .map_err(|_| GitError::Parse(format!("bad tree entry mode {s:?}")))?;
        Self::from_raw(raw)
    }

    pub fn raw(&self) -> u32 {
        match self {
            EntryMode::Blob => 0o100644,
            EntryMode::Executable => 0o100755,
            EntryMode::Symlink => 0o120000,
            EntryMode::Tree => 0o040000,
            EntryMode::Commit => 0o160000,
        }
    }
}

/// A named child of a tree.
#[derive(Clone)]
pub struct TreeEntry {
    id: ObjectId,
    name: String,
    full_name: Option<String>,
    mode: EntryMode,
    tree: Arc<Tree>,
    size: OnceLock<u64>,
}

impl TreeEntry {
    pub(crate) fn new(tree: Arc<Tree>, id: ObjectId, name: String, mode: EntryMode, size: Option<u64>) -> Self {
        let cached = OnceLock::new();
        if let Some(size) = size {
            let _ = cached.set(size);
        }
        TreeEntry {
            id,
            name,
            full_name: None,
            mode,
            tree,
            size: cached,
        }
    }

    pub(crate) fn with_full_name(mut self, full_name: String) -> Self {
        self.full_name = Some(full_name);
        self
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Path from the walk root for recursive listings, otherwise the base name.
    pub fn name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.name)
    }

    pub fn base_name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> EntryMode {
        self.mode
    }

    /// The tree this entry was read from.
    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    /// Object size in bytes; 0 for directories and when the size is unknown.
    pub fn size(&self) -> u64 {
        if self.is_dir() {
            return 0;
        }
        if let Some(size) = self.size.get() {
            return *size;
        }
        let repo = self.tree.repo();
        match repo.backend().object_size(repo.ctx(), &self.id) {
            Ok(size) => *self.size.get_or_init(|| size),
            Err(e) => {
                tracing::debug!("size of {} ({}) unavailable: {}", self.name(), self.id, e);
                0
            }
        }
    }

    pub fn is_sub_module(&self) -> bool {
        self.mode == EntryMode::Commit
    }

    pub fn is_dir(&self) -> bool {
        self.mode == EntryMode::Tree
    }

    pub fn is_link(&self) -> bool {
        self.mode == EntryMode::Symlink
    }

    pub fn is_regular(&self) -> bool {
        self.mode == EntryMode::Blob
    }

    pub fn is_executable(&self) -> bool {
        self.mode == EntryMode::Executable
    }

    pub fn entry_type(&self) -> ObjectKind {
        match self.mode {
            EntryMode::Commit => ObjectKind::Commit,
            EntryMode::Tree => ObjectKind::Tree,
            _ => ObjectKind::Blob,
        }
    }

    pub fn blob(&self) -> Blob {
        Blob::new(self.tree.repo().clone(), self.id, self.name().to_string())
    }

    /// Resolves one level of symlink relative to the tree holding the link.
    pub fn follow_link(&self) -> Result<TreeEntry> {
        if !self.is_link() {
            return Err(GitError::broken_link(self.name(), LinkError::NotASymlink));
        }

        let repo = self.tree.repo();
        let data = repo.backend().read_blob(repo.ctx(), &self.id)?;
        let expected = self.size();
        if data.len() as u64 != expected {
            return Err(GitError::Parse(format!(
                "symlink {}: read {} of {} bytes",
                self.name(),
                data.len(),
                expected
            )));
        }
        let target = String::from_utf8(data).map_err(|_| {
            GitError::InvalidArgument(format!("symlink {} target is not UTF-8", self.name()))
        })?;

        if target.starts_with('/') {
            return Err(GitError::broken_link(self.name(), LinkError::OutsideRepository));
        }

        let mut tree = self.tree.clone();
        let mut rest = target.as_str();
        while let Some(stripped) = rest.strip_prefix("../") {
            tree = match tree.parent() {
                Some(parent) => parent.clone(),
                None => return Err(GitError::broken_link(self.name(), LinkError::OutsideRepository)),
            };
            rest = stripped;
        }

        tree.get_tree_entry_by_path(rest).map_err(|e| {
            if e.is_not_found() {
                GitError::broken_link(self.name(), LinkError::Broken)
            } else {
                e
            }
        })
    }

    /// Follows a chain of symlinks to its final non-link target.
    pub fn follow_links(&self) -> Result<TreeEntry> {
        if !self.is_link() {
            return Err(GitError::broken_link(self.name(), LinkError::NotASymlink));
        }
        let mut entry = self.clone();
        for _ in 0..MAX_LINK_HOPS {
            if !entry.is_link() {
                break;
            }
            let next = entry.follow_link()?;
            if next.id == entry.id {
                return Err(GitError::broken_link(entry.name(), LinkError::Recursive));
            }
            entry = next;
        }
        if entry.is_link() {
            return Err(GitError::broken_link(self.name(), LinkError::TooManyLevels));
        }
        Ok(entry)
    }

    /// `a/b/c` when `a` holds only `b` which holds only `c`; empty for
    /// files and submodules.
    pub fn get_sub_jumpable_path_name(&self) -> Result<String> {
        if self.is_sub_module() || !self.is_dir() {
            return Ok(String::new());
        }
        let tree = Tree::child(&self.tree, self.id);
        let entries = tree.list_entries()?;
        if let [only] = entries.as_slice() {
            if only.is_dir() {
                let nested = only.get_sub_jumpable_path_name()?;
                if !nested.is_empty() {
                    return Ok(format!("{}/{}", self.name(), nested));
                }
            }
        }
        Ok(self.name().to_string())
    }
}

impl fmt::Debug for TreeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeEntry")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Directories and submodules first, then byte-wise by name.
pub fn sort_entries(entries: &mut [TreeEntry]) {
    custom_sort_entries(entries, |a, b| a.cmp(b));
}

/// Directories and submodules first, then `cmp` on names. Stable.
pub fn custom_sort_entries<F>(entries: &mut [TreeEntry], cmp: F)
where
    F: Fn(&str, &str) -> Ordering,
{
    entries.sort_by(|a, b| {
        let a_dir = a.is_dir() || a.is_sub_module();
        let b_dir = b.is_dir() || b.is_sub_module();
        b_dir.cmp(&a_dir).then_with(|| cmp(a.name(), b.name()))
    });
}
