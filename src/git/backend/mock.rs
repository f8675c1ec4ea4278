//! In-memory backend for tests.
//!
//! Objects get the same ids git would give them (SHA-1 over the canonical
//! encoding), so fixtures can be compared with real repositories. History
//! queries run over the stored commit graph.

use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use sha1::{Digest, Sha1};

use crate::error::{GitError, Result};
use crate::git::backend::{
    Backend, CommitData, CommitFileStatus, LogFilter, ObjectKind, RawTreeEntry, RevListQuery, short_ref_name,
};
use crate::git::object_id::{ObjectId, is_valid_sha_pattern};
use crate::git::repository::Repository;
use crate::git::signature::Signature;
use crate::git::tag::{TAG_PREFIX, Tag};
use crate::git::tree_entry::EntryMode;
use crate::process::Context;
use crate::settings::Settings;

/// Commit fixture. `author` is `Name <email>`; `time` is Unix seconds UTC.
#[derive(Debug, Clone)]
pub struct MockCommit {
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
    pub message: String,
    pub author: String,
    pub time: i64,
}

impl MockCommit {
    pub fn new(tree: ObjectId, parents: &[ObjectId], message: &str, time: i64) -> Self {
        MockCommit {
            tree,
            parents: parents.to_vec(),
            message: message.to_string(),
            author: "Mock Author <mock@example.com>".to_string(),
            time,
        }
    }

    pub fn by(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self
    }
}

#[derive(Debug, Clone)]
enum MockObject {
    Blob(Vec<u8>),
    Tree(Vec<RawTreeEntry>),
    Commit(CommitData),
    Tag(Tag),
}

#[derive(Debug, Default)]
struct MockState {
    objects: HashMap<ObjectId, MockObject>,
    links: HashSet<ObjectId>,
    gitlinks: HashSet<ObjectId>,
    refs: BTreeMap<String, ObjectId>,
    head: Option<String>,
}

#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    tree_reads: AtomicUsize,
}

fn hash_object(kind: &str, body: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(format!("{kind} {}\0", body.len()).as_bytes());
    hasher.update(body);
    let digest = hasher.finalize();
    let mut raw = [0u8; 20];
    raw.copy_from_slice(&digest);
    ObjectId::from_bytes(&raw).unwrap_or_default()
}

fn encode_tree(entries: &[RawTreeEntry]) -> Vec<u8> {
    let mut body = Vec::new();
    for e in entries {
        body.extend_from_slice(format!("{:o} {}\0", e.mode.raw(), e.name).as_bytes());
        body.extend_from_slice(e.id.as_bytes());
    }
    body
}

fn encode_commit(c: &CommitData) -> Vec<u8> {
    let mut body = format!("tree {}\n", c.tree_id);
    for p in &c.parents {
        body.push_str(&format!("parent {p}\n"));
    }
    body.push_str(&format!("author {}\ncommitter {}\n\n{}", c.author, c.committer, c.message));
    body.into_bytes()
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A repository handle over this backend with default settings.
    pub fn repository(self: &Arc<Self>) -> Repository {
        self.repository_with(Arc::new(Settings::default()), None)
    }

    pub fn repository_with(
        self: &Arc<Self>,
        settings: Arc<Settings>,
        cache: Option<Arc<dyn crate::cache::CacheService>>,
    ) -> Repository {
        Repository::with_backend("mock://repo", self.clone(), Context::background(), settings, cache)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A test that panicked while holding the lock already failed.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, id: ObjectId, obj: MockObject) -> ObjectId {
        self.state().objects.entry(id).or_insert(obj);
        id
    }

    pub fn blob(&self, content: &str) -> ObjectId {
        self.blob_bytes(content.as_bytes())
    }

    pub fn blob_bytes(&self, data: &[u8]) -> ObjectId {
        self.insert(hash_object("blob", data), MockObject::Blob(data.to_vec()))
    }

    pub fn symlink(&self, target: &str) -> ObjectId {
        let id = self.blob(target);
        self.state().links.insert(id);
        id
    }

    /// A gitlink entry; the commit is not stored.
    pub fn submodule(&self, commit: &str) -> ObjectId {
        let id = ObjectId::from_hex(commit).unwrap_or_default();
        self.state().gitlinks.insert(id);
        id
    }

    /// Entries keep the given order.
    pub fn tree(&self, entries: &[(&str, ObjectId)]) -> ObjectId {
        let raw: Vec<RawTreeEntry> = {
            let state = self.state();
            entries
                .iter()
                .map(|(name, id)| {
                    let mode = if state.gitlinks.contains(id) {
                        EntryMode::Commit
                    } else if state.links.contains(id) {
                        EntryMode::Symlink
                    } else if matches!(state.objects.get(id), Some(MockObject::Tree(_))) {
                        EntryMode::Tree
                    } else {
                        EntryMode::Blob
                    };
                    RawTreeEntry {
                        name: name.to_string(),
                        mode,
                        id: *id,
                        size: None,
                    }
                })
                .collect()
        };
        self.insert(hash_object("tree", &encode_tree(&raw)), MockObject::Tree(raw))
    }

    pub fn commit(&self, commit: MockCommit) -> ObjectId {
        let sig = Signature::parse(&format!("{} {} +0000", commit.author, commit.time))
            .unwrap_or_else(|_| Signature {
                name: commit.author.clone(),
                email: String::new(),
                when: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH.fixed_offset(),
            });
        let mut data = CommitData {
            id: ObjectId::zero(),
            tree_id: commit.tree,
            parents: commit.parents,
            author: sig.clone(),
            committer: sig,
            message: commit.message,
            signature: None,
        };
        data.id = hash_object("commit", &encode_commit(&data));
        self.insert(data.id, MockObject::Commit(data.clone()))
    }

    pub fn set_ref(&self, name: &str, id: ObjectId) {
        self.state().refs.insert(name.to_string(), id);
    }

    /// Points HEAD at `refs/heads/<branch>`.
    pub fn set_head(&self, branch: &str) {
        self.state().head = Some(format!("refs/heads/{branch}"));
    }

    pub fn lightweight_tag(&self, name: &str, target: ObjectId) {
        self.set_ref(&format!("{TAG_PREFIX}{name}"), target);
    }

    pub fn annotated_tag(&self, name: &str, target: ObjectId, message: &str, time: i64) -> ObjectId {
        let tagger = Signature::parse(&format!("Mock Tagger <tagger@example.com> {time} +0000")).ok();
        let body = format!(
            "object {target}\ntype commit\ntag {name}\ntagger {}\n\n{message}",
            tagger.as_ref().map(Signature::to_string).unwrap_or_default()
        );
        let id = hash_object("tag", body.as_bytes());
        let tag = Tag::annotated(name.to_string(), id, target, tagger, message);
        self.insert(id, MockObject::Tag(tag));
        self.set_ref(&format!("{TAG_PREFIX}{name}"), id);
        id
    }

    /// How many times a tree has been decoded.
    pub fn tree_reads(&self) -> usize {
        self.tree_reads.load(Ordering::SeqCst)
    }

    fn object(&self, id: &ObjectId) -> Result<MockObject> {
        self.state()
            .objects
            .get(id)
            .cloned()
            .ok_or_else(|| GitError::not_found(id.to_string()))
    }

    fn commit_data(&self, id: &ObjectId) -> Result<CommitData> {
        match self.object(id)? {
            MockObject::Commit(c) => Ok(c),
            MockObject::Tag(t) => self.commit_data(&t.object),
            _ => Err(GitError::not_found(id.to_string())),
        }
    }

    fn tree_entries(&self, id: &ObjectId) -> Result<Vec<RawTreeEntry>> {
        match self.object(id)? {
            MockObject::Tree(entries) => Ok(entries),
            _ => Err(GitError::not_found(id.to_string())),
        }
    }

    fn entry_at(&self, tree: &ObjectId, path: &str) -> Result<Option<ObjectId>> {
        let mut current = *tree;
        for name in path.split('/').filter(|s| !s.is_empty()) {
            let entries = match self.tree_entries(&current) {
                Ok(entries) => entries,
                Err(e) if e.is_not_found() => return Ok(None),
                Err(e) => return Err(e),
            };
            match entries.iter().find(|e| e.name == name) {
                Some(e) => current = e.id,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn ancestors(&self, start: &[ObjectId]) -> Result<HashSet<ObjectId>> {
        let mut seen = HashSet::new();
        let mut stack: Vec<ObjectId> = start.to_vec();
        while let Some(id) = stack.pop() {
            if seen.insert(id) {
                stack.extend(self.commit_data(&id)?.parents);
            }
        }
        Ok(seen)
    }

    fn touches(&self, commit: &CommitData, paths: &[String]) -> Result<bool> {
        for path in paths {
            let current = self.entry_at(&commit.tree_id, path)?;
            if commit.parents.is_empty() {
                if current.is_some() {
                    return Ok(true);
                }
                continue;
            }
            let mut same = false;
            for parent in &commit.parents {
                let parent_tree = self.commit_data(parent)?.tree_id;
                if self.entry_at(&parent_tree, path)? == current {
                    same = true;
                    break;
                }
            }
            if !same {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn merge_bases(&self, a: ObjectId, b: ObjectId) -> Result<Vec<ObjectId>> {
        let common: HashSet<ObjectId> = self
            .ancestors(&[a])?
            .intersection(&self.ancestors(&[b])?)
            .copied()
            .collect();
        if common.is_empty() {
            return Err(GitError::NoMergeBase);
        }
        let mut best = Vec::new();
        for id in &common {
            let mut dominated = false;
            for other in common.iter().filter(|other| *other != id) {
                if self.ancestors(&[*other])?.contains(id) {
                    dominated = true;
                    break;
                }
            }
            if !dominated {
                best.push(*id);
            }
        }
        Ok(best)
    }

    /// Every non-tree entry under `tree`, keyed by full path.
    fn flatten(
        &self,
        tree: &ObjectId,
        prefix: &str,
        out: &mut BTreeMap<String, (ObjectId, EntryMode)>,
    ) -> Result<()> {
        for entry in self.tree_entries(tree)? {
            let path = format!("{prefix}{}", entry.name);
            if entry.mode == EntryMode::Tree {
                self.flatten(&entry.id, &format!("{path}/"), out)?;
            } else {
                out.insert(path, (entry.id, entry.mode));
            }
        }
        Ok(())
    }

    fn time_sorted(&self, ids: HashSet<ObjectId>) -> Result<Vec<ObjectId>> {
        let mut with_time = Vec::with_capacity(ids.len());
        for id in ids {
            with_time.push((self.commit_data(&id)?.committer.timestamp(), id));
        }
        with_time.sort_by(|a, b| b.cmp(a));
        Ok(with_time.into_iter().map(|(_, id)| id).collect())
    }
}

impl Backend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn resolve(&self, _ctx: &Context, rev: &str) -> Result<ObjectId> {
        let state = self.state();
        if let Ok(id) = ObjectId::from_hex(rev) {
            if state.objects.contains_key(&id) {
                return Ok(id);
            }
        }
        let head = state.head.clone();
        let candidates = [
            Some(rev.to_string()),
            Some(format!("refs/heads/{rev}")),
            Some(format!("{TAG_PREFIX}{rev}")),
            (rev == "HEAD").then_some(head).flatten(),
        ];
        for name in candidates.into_iter().flatten() {
            if let Some(id) = state.refs.get(&name) {
                return Ok(*id);
            }
        }
        if is_valid_sha_pattern(rev) {
            let matches: Vec<&ObjectId> = state
                .objects
                .keys()
                .filter(|id| id.to_hex().starts_with(rev))
                .collect();
            if let [only] = matches.as_slice() {
                return Ok(**only);
            }
        }
        Err(GitError::not_found(rev))
    }

    fn object_kind(&self, _ctx: &Context, id: &ObjectId) -> Result<ObjectKind> {
        Ok(match self.object(id)? {
            MockObject::Blob(_) => ObjectKind::Blob,
            MockObject::Tree(_) => ObjectKind::Tree,
            MockObject::Commit(_) => ObjectKind::Commit,
            MockObject::Tag(_) => ObjectKind::Tag,
        })
    }

    fn object_size(&self, _ctx: &Context, id: &ObjectId) -> Result<u64> {
        let len = match self.object(id)? {
            MockObject::Blob(data) => data.len(),
            MockObject::Tree(entries) => encode_tree(&entries).len(),
            MockObject::Commit(c) => encode_commit(&c).len(),
            MockObject::Tag(t) => t.message.len(),
        };
        Ok(len as u64)
    }

    fn read_commit(&self, _ctx: &Context, id: &ObjectId) -> Result<CommitData> {
        match self.object(id)? {
            MockObject::Commit(c) => Ok(c),
            _ => Err(GitError::not_found(id.to_string())),
        }
    }

    fn read_tag(&self, _ctx: &Context, id: &ObjectId) -> Result<Tag> {
        match self.object(id)? {
            MockObject::Tag(t) => Ok(t),
            _ => Err(GitError::not_found(id.to_string())),
        }
    }

    fn read_tree(&self, _ctx: &Context, id: &ObjectId) -> Result<Vec<RawTreeEntry>> {
        self.tree_reads.fetch_add(1, Ordering::SeqCst);
        self.tree_entries(id)
    }

    fn read_blob(&self, _ctx: &Context, id: &ObjectId) -> Result<Vec<u8>> {
        match self.object(id)? {
            MockObject::Blob(data) => Ok(data),
            _ => Err(GitError::not_found(id.to_string())),
        }
    }

    fn last_commit_for_path(&self, ctx: &Context, start: &ObjectId, path: &str) -> Result<ObjectId> {
        let mut queue = BinaryHeap::new();
        let mut seen = HashSet::new();
        let first = self.commit_data(start)?;
        queue.push((first.committer.timestamp(), first.id));

        while let Some((_, id)) = queue.pop() {
            ctx.check("last commit walk")?;
            if !seen.insert(id) {
                continue;
            }
            let commit = self.commit_data(&id)?;
            let current = self.entry_at(&commit.tree_id, path)?;
            if commit.parents.is_empty() {
                if current.is_some() {
                    return Ok(id);
                }
                continue;
            }
            let mut same_parent = None;
            for parent in &commit.parents {
                let parent = self.commit_data(parent)?;
                if self.entry_at(&parent.tree_id, path)? == current {
                    same_parent = Some(parent);
                    break;
                }
            }
            match same_parent {
                Some(parent) => queue.push((parent.committer.timestamp(), parent.id)),
                None => return Ok(id),
            }
        }
        Err(GitError::path_not_found(path))
    }

    fn rev_list(&self, ctx: &Context, query: &RevListQuery) -> Result<Vec<ObjectId>> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        if query.all {
            include.extend(self.state().refs.values().copied());
        }
        for rev in &query.revisions {
            if let Some((a, b)) = rev.split_once("...") {
                let (a, b) = (self.resolve(ctx, a)?, self.resolve(ctx, b)?);
                exclude.extend(self.merge_bases(a, b)?);
                include.extend([a, b]);
            } else if let Some((a, b)) = rev.split_once("..") {
                exclude.push(self.resolve(ctx, a)?);
                include.push(self.resolve(ctx, b)?);
            } else if let Some(a) = rev.strip_prefix('^') {
                exclude.push(self.resolve(ctx, a)?);
            } else {
                include.push(self.resolve(ctx, rev)?);
            }
        }

        let hidden = self.ancestors(&exclude)?;
        let visible: HashSet<ObjectId> = self
            .ancestors(&include)?
            .into_iter()
            .filter(|id| !hidden.contains(id))
            .collect();

        let mut out = Vec::new();
        for id in self.time_sorted(visible)? {
            if query.paths.is_empty() || self.touches(&self.commit_data(&id)?, &query.paths)? {
                out.push(id);
            }
        }
        Ok(out
            .into_iter()
            .skip(query.skip)
            .take(query.max_count.unwrap_or(usize::MAX))
            .collect())
    }

    fn log(&self, ctx: &Context, filter: &LogFilter) -> Result<Vec<ObjectId>> {
        let query = RevListQuery {
            revisions: vec![filter.revision.clone()],
            all: filter.all,
            ..Default::default()
        };
        let mut out = Vec::new();
        for id in self.rev_list(ctx, &query)? {
            if out.len() >= filter.max_count {
                break;
            }
            if filter.matches(&self.commit_data(&id)?)? {
                out.push(id);
            }
        }
        Ok(out)
    }

    fn changed_files(&self, ctx: &Context, base: &str, head: &str, from_merge_base: bool) -> Result<Vec<String>> {
        let head = self.resolve(ctx, head)?;
        let mut base = self.resolve(ctx, base)?;
        if from_merge_base {
            base = self
                .merge_bases(base, head)?
                .first()
                .copied()
                .ok_or(GitError::NoMergeBase)?;
        }
        let mut changed = Vec::new();
        diff_trees(
            self,
            Some(self.commit_data(&base)?.tree_id),
            Some(self.commit_data(&head)?.tree_id),
            "",
            &mut changed,
        )?;
        changed.sort();
        Ok(changed)
    }

    fn is_ancestor(&self, _ctx: &Context, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool> {
        Ok(self.ancestors(&[*descendant])?.contains(ancestor))
    }

    fn references(&self, _ctx: &Context, prefix: &str) -> Result<Vec<(String, ObjectId)>> {
        Ok(self
            .state()
            .refs
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, id)| (name.clone(), *id))
            .collect())
    }

    fn head_ref(&self, _ctx: &Context) -> Result<Option<String>> {
        Ok(self.state().head.clone())
    }

    fn tags(&self, _ctx: &Context) -> Result<Vec<Tag>> {
        let refs: Vec<(String, ObjectId)> = self
            .state()
            .refs
            .iter()
            .filter_map(|(name, id)| name.strip_prefix(TAG_PREFIX).map(|n| (n.to_string(), *id)))
            .collect();
        let mut tags = Vec::with_capacity(refs.len());
        for (name, id) in refs {
            let tag = match self.object(&id)? {
                MockObject::Tag(mut tag) => {
                    tag.name = name;
                    tag
                }
                MockObject::Commit(c) => Tag {
                    name,
                    id,
                    object: id,
                    kind: ObjectKind::Commit,
                    tagger: Some(c.committer),
                    message: c.message,
                    signature: None,
                },
                _ => continue,
            };
            tags.push(tag);
        }
        tags.sort_by_key(|t| std::cmp::Reverse(t.tagger.as_ref().map(Signature::timestamp)));
        Ok(tags)
    }

    fn commit_file_status(&self, ctx: &Context, id: &ObjectId) -> Result<CommitFileStatus> {
        let commit = self.read_commit(ctx, id)?;
        let mut old = BTreeMap::new();
        if let Some(parent) = commit.parents.first() {
            self.flatten(&self.commit_data(parent)?.tree_id, "", &mut old)?;
        }
        let mut new = BTreeMap::new();
        self.flatten(&commit.tree_id, "", &mut new)?;

        let mut status = CommitFileStatus::default();
        for (path, entry) in &new {
            match old.get(path) {
                None => status.added.push(path.clone()),
                Some(before) if before != entry => status.modified.push(path.clone()),
                Some(_) => {}
            }
        }
        status.removed = old.keys().filter(|path| !new.contains_key(*path)).cloned().collect();
        Ok(status)
    }

    fn nearest_branch(&self, _ctx: &Context, id: &ObjectId) -> Result<Option<String>> {
        self.commit_data(id)?;
        let refs: Vec<(String, ObjectId)> = self
            .state()
            .refs
            .iter()
            .filter(|(name, _)| !name.starts_with(TAG_PREFIX))
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        let below = self.ancestors(&[*id])?;
        let mut best: Option<(usize, String)> = None;
        for (name, tip) in refs {
            let reachable = self.ancestors(&[tip])?;
            if !reachable.contains(id) {
                continue;
            }
            let candidate = (reachable.difference(&below).count(), short_ref_name(&name).to_string());
            if best.as_ref().is_none_or(|b| candidate < *b) {
                best = Some(candidate);
            }
        }
        Ok(best.map(|(_, name)| name))
    }

    fn exact_tag(&self, ctx: &Context, id: &ObjectId) -> Result<Option<String>> {
        Ok(self
            .tags(ctx)?
            .into_iter()
            .filter(|tag| self.commit_data(&tag.id).is_ok_and(|c| c.id == *id))
            .max_by(|a, b| {
                (a.is_annotated(), a.tagger.as_ref().map(Signature::timestamp))
                    .cmp(&(b.is_annotated(), b.tagger.as_ref().map(Signature::timestamp)))
                    .then_with(|| b.name.cmp(&a.name))
            })
            .map(|tag| tag.name))
    }

    fn is_empty(&self, _ctx: &Context) -> Result<bool> {
        let state = self.state();
        Ok(state.head.as_ref().is_none_or(|head| !state.refs.contains_key(head)))
    }
}

fn diff_trees(
    mock: &MockBackend,
    old: Option<ObjectId>,
    new: Option<ObjectId>,
    prefix: &str,
    out: &mut Vec<String>,
) -> Result<()> {
    let list = |id: Option<ObjectId>| -> Result<Vec<RawTreeEntry>> {
        id.map_or(Ok(Vec::new()), |id| mock.tree_entries(&id))
    };
    let (old, new) = (list(old)?, list(new)?);
    let mut names: Vec<&str> = old.iter().chain(new.iter()).map(|e| e.name.as_str()).collect();
    names.sort();
    names.dedup();
    for name in names {
        let a = old.iter().find(|e| e.name == name);
        let b = new.iter().find(|e| e.name == name);
        if a.map(|e| (e.id, e.mode)) == b.map(|e| (e.id, e.mode)) {
            continue;
        }
        let path = format!("{prefix}{name}");
        let subtree = |e: Option<&RawTreeEntry>| e.filter(|e| e.mode == EntryMode::Tree).map(|e| e.id);
        let (sa, sb) = (subtree(a), subtree(b));
        if sa.is_some() || sb.is_some() {
            diff_trees(mock, sa, sb, &format!("{path}/"), out)?;
        }
        let is_file = |e: Option<&RawTreeEntry>| e.is_some_and(|e| e.mode != EntryMode::Tree);
        if is_file(a) || is_file(b) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_match_git() {
        let mock = MockBackend::new();
        assert_eq!(mock.blob("").to_string(), "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391");
        assert_eq!(mock.tree(&[]).to_string(), "4b825dc642cb6eb9a060e54bf8d69288fbee4904");
        let hello = mock.blob("hello\n");
        assert_eq!(hello.to_string(), "ce013625030ba8dba906f756967f9e9ca394464a");
    }

    #[test]
    fn resolves_refs_and_prefixes() {
        let mock = MockBackend::new();
        let ctx = Context::background();
        let tree = mock.tree(&[]);
        let c1 = mock.commit(MockCommit::new(tree, &[], "init", 100));
        mock.set_ref("refs/heads/main", c1);
        mock.set_head("main");
        assert_eq!(mock.resolve(&ctx, "main").unwrap(), c1);
        assert_eq!(mock.resolve(&ctx, "HEAD").unwrap(), c1);
        assert_eq!(mock.resolve(&ctx, &c1.short(10)).unwrap(), c1);
        assert!(mock.resolve(&ctx, "nope").unwrap_err().is_not_found());
    }

    #[test]
    fn unrelated_histories_have_no_merge_base() {
        let mock = MockBackend::new();
        let ctx = Context::background();
        let tree = mock.tree(&[]);
        let a = mock.commit(MockCommit::new(tree, &[], "a", 1));
        let b = mock.commit(MockCommit::new(tree, &[], "b", 2));
        let err = mock
            .rev_list(&ctx, &RevListQuery::revision(format!("{a}...{b}")))
            .unwrap_err();
        assert!(matches!(err, GitError::NoMergeBase));
        let two_dot = mock.rev_list(&ctx, &RevListQuery::revision(format!("{a}..{b}"))).unwrap();
        assert_eq!(two_dot, [b]);
    }
}
