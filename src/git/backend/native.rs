use std::collections::{BinaryHeap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use git2::{Delta, DiffOptions, ErrorCode, ObjectType, Oid, Repository, Sort};

use crate::error::{GitError, Result};
use crate::git::backend::{
    Backend, CommitData, CommitFileStatus, CommitSignature, Divergence, LogFilter, ObjectKind, RawTreeEntry,
    RevListQuery, short_ref_name,
};
use crate::git::object_id::ObjectId;
use crate::git::signature::Signature;
use crate::git::tag::{TAG_PREFIX, Tag};
use crate::git::tree_entry::EntryMode;
use crate::process::Context;

/// libgit2 access. `git2::Repository` is not `Sync`, so calls serialize on
/// one handle.
pub struct NativeBackend {
    repo: Mutex<Repository>,
    path: String,
}

impl std::fmt::Debug for NativeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBackend").field("path", &self.path).finish()
    }
}

impl NativeBackend {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let repo = Repository::open(&path).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                GitError::not_found(path_str.clone())
            } else {
                GitError::Native(e)
            }
        })?;
        Ok(Self {
            repo: Mutex::new(repo),
            path: path_str,
        })
    }

    fn with_repo<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Repository) -> Result<T>,
    {
        let repo = self
            .repo
            .lock()
            .map_err(|_| GitError::Internal("Lock poisoned".to_string()))?;
        f(&repo)
    }
}

fn missing(id: impl ToString) -> impl FnOnce(git2::Error) -> GitError {
    move |e| {
        if e.code() == ErrorCode::NotFound {
            GitError::not_found(id.to_string())
        } else {
            GitError::Native(e)
        }
    }
}

fn kind_of(kind: Option<ObjectType>) -> Result<ObjectKind> {
    match kind {
        Some(ObjectType::Commit) => Ok(ObjectKind::Commit),
        Some(ObjectType::Tree) => Ok(ObjectKind::Tree),
        Some(ObjectType::Blob) => Ok(ObjectKind::Blob),
        Some(ObjectType::Tag) => Ok(ObjectKind::Tag),
        other => Err(GitError::Parse(format!("unexpected object type {other:?}"))),
    }
}

fn commit_data(repo: &Repository, commit: &git2::Commit<'_>) -> Result<CommitData> {
    let signature = match repo.extract_signature(&commit.id(), None) {
        Ok((signature, payload)) => Some(CommitSignature {
            signature: String::from_utf8_lossy(&signature).into_owned(),
            payload: String::from_utf8_lossy(&payload).into_owned(),
        }),
        Err(e) if e.code() == ErrorCode::NotFound => None,
        Err(e) => return Err(e.into()),
    };
    Ok(CommitData {
        id: commit.id().into(),
        tree_id: commit.tree_id().into(),
        parents: commit.parent_ids().map(ObjectId::from).collect(),
        author: Signature::from_git2(&commit.author())?,
        committer: Signature::from_git2(&commit.committer())?,
        message: String::from_utf8_lossy(commit.message_raw_bytes()).into_owned(),
        signature,
    })
}

/// Id of the entry at `path` in `tree`, the tree itself for the empty path.
fn entry_at(tree: &git2::Tree<'_>, path: &str) -> Result<Option<Oid>> {
    if path.is_empty() {
        return Ok(Some(tree.id()));
    }
    match tree.get_path(Path::new(path)) {
        Ok(entry) => Ok(Some(entry.id())),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// True when `commit` differs from every parent at one of `paths`.
fn touches(repo: &Repository, commit: &git2::Commit<'_>, paths: &[String]) -> Result<bool> {
    let tree = commit.tree()?;
    for path in paths {
        let current = entry_at(&tree, path)?;
        if commit.parent_count() == 0 {
            if current.is_some() {
                return Ok(true);
            }
            continue;
        }
        let mut same = false;
        for parent in commit.parents() {
            if entry_at(&parent.tree()?, path)? == current {
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

fn resolve_in(repo: &Repository, rev: &str) -> Result<Oid> {
    repo.revparse_single(rev)
        .map(|obj| obj.id())
        .map_err(missing(rev))
}

fn commit_oid(repo: &Repository, rev: &str) -> Result<Oid> {
    let obj = repo.revparse_single(rev).map_err(missing(rev))?;
    Ok(obj.peel_to_commit()?.id())
}

fn tag_from_object(repo: &Repository, name: &str, id: Oid) -> Result<Option<Tag>> {
    let obj = repo.find_object(id, None)?;
    match obj.kind() {
        Some(ObjectType::Tag) => {
            let tag = repo.find_tag(id)?;
            let tagger = tag.tagger().map(|s| Signature::from_git2(&s)).transpose()?;
            let message = String::from_utf8_lossy(tag.message_bytes().unwrap_or_default()).into_owned();
            Ok(Some(Tag::annotated(
                name.to_string(),
                id.into(),
                tag.target_id().into(),
                tagger,
                &message,
            )))
        }
        Some(ObjectType::Commit) => {
            let commit = repo.find_commit(id)?;
            Ok(Some(Tag {
                name: name.to_string(),
                id: id.into(),
                object: id.into(),
                kind: ObjectKind::Commit,
                tagger: Some(Signature::from_git2(&commit.committer())?),
                message: String::from_utf8_lossy(commit.message_raw_bytes()).into_owned(),
                signature: None,
            }))
        }
        _ => Ok(None),
    }
}

impl Backend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn resolve(&self, _ctx: &Context, rev: &str) -> Result<ObjectId> {
        self.with_repo(|repo| resolve_in(repo, rev).map(ObjectId::from))
    }

    fn object_kind(&self, _ctx: &Context, id: &ObjectId) -> Result<ObjectKind> {
        self.with_repo(|repo| {
            let (_, kind) = repo.odb()?.read_header((*id).into()).map_err(missing(id))?;
            kind_of(Some(kind))
        })
    }

    fn object_size(&self, _ctx: &Context, id: &ObjectId) -> Result<u64> {
        self.with_repo(|repo| {
            let (size, _) = repo.odb()?.read_header((*id).into()).map_err(missing(id))?;
            Ok(size as u64)
        })
    }

    fn read_commit(&self, _ctx: &Context, id: &ObjectId) -> Result<CommitData> {
        self.with_repo(|repo| {
            let commit = repo.find_commit((*id).into()).map_err(missing(id))?;
            commit_data(repo, &commit)
        })
    }

    fn read_tag(&self, _ctx: &Context, id: &ObjectId) -> Result<Tag> {
        self.with_repo(|repo| {
            let tag = repo.find_tag((*id).into()).map_err(missing(id))?;
            let name = String::from_utf8_lossy(tag.name_bytes()).into_owned();
            tag_from_object(repo, &name, tag.id())?.ok_or_else(|| GitError::not_found(id.to_string()))
        })
    }

    fn read_tree(&self, _ctx: &Context, id: &ObjectId) -> Result<Vec<RawTreeEntry>> {
        self.with_repo(|repo| {
            let tree = repo.find_tree((*id).into()).map_err(missing(id))?;
            tree.iter()
                .map(|entry| -> Result<RawTreeEntry> {
                    Ok(RawTreeEntry {
                        name: String::from_utf8_lossy(entry.name_bytes()).into_owned(),
                        mode: EntryMode::from_raw(entry.filemode() as u32)?,
                        id: entry.id().into(),
                        size: None,
                    })
                })
                .collect()
        })
    }

    fn read_blob(&self, _ctx: &Context, id: &ObjectId) -> Result<Vec<u8>> {
        self.with_repo(|repo| {
            let blob = repo.find_blob((*id).into()).map_err(missing(id))?;
            Ok(blob.content().to_vec())
        })
    }

    fn last_commit_for_path(&self, ctx: &Context, start: &ObjectId, path: &str) -> Result<ObjectId> {
        self.with_repo(|repo| {
            let first = repo.find_commit((*start).into()).map_err(missing(start))?;
            let mut queue = BinaryHeap::new();
            let mut seen = HashSet::new();
            queue.push((first.time().seconds(), first.id()));

            while let Some((_, oid)) = queue.pop() {
                ctx.check("last commit walk")?;
                if !seen.insert(oid) {
                    continue;
                }
                let commit = repo.find_commit(oid)?;
                let current = entry_at(&commit.tree()?, path)?;
                if commit.parent_count() == 0 {
                    if current.is_some() {
                        return Ok(oid.into());
                    }
                    continue;
                }

                let mut same_parent = None;
                for parent in commit.parents() {
                    if entry_at(&parent.tree()?, path)? == current {
                        same_parent = Some(parent);
                        break;
                    }
                }
                match same_parent {
                    Some(parent) => queue.push((parent.time().seconds(), parent.id())),
                    None => return Ok(oid.into()),
                }
            }
            Err(GitError::path_not_found(path))
        })
    }

    fn rev_list(&self, ctx: &Context, query: &RevListQuery) -> Result<Vec<ObjectId>> {
        self.with_repo(|repo| {
            let mut walk = repo.revwalk()?;
            walk.set_sorting(Sort::TIME)?;
            if query.all {
                for reference in repo.references()? {
                    let reference = reference?;
                    if let Ok(commit) = reference.peel_to_commit() {
                        walk.push(commit.id())?;
                    }
                }
            }
            for rev in &query.revisions {
                if let Some((a, b)) = rev.split_once("...") {
                    let (a, b) = (commit_oid(repo, a)?, commit_oid(repo, b)?);
                    let bases = repo.merge_bases(a, b).map_err(|e| {
                        if e.code() == ErrorCode::NotFound {
                            GitError::NoMergeBase
                        } else {
                            GitError::Native(e)
                        }
                    })?;
                    walk.push(a)?;
                    walk.push(b)?;
                    for base in bases.iter() {
                        walk.hide(*base)?;
                    }
                } else if let Some((a, b)) = rev.split_once("..") {
                    walk.hide(commit_oid(repo, a)?)?;
                    walk.push(commit_oid(repo, b)?)?;
                } else if let Some(a) = rev.strip_prefix('^') {
                    walk.hide(commit_oid(repo, a)?)?;
                } else {
                    walk.push(commit_oid(repo, rev)?)?;
                }
            }

            let limit = query.max_count.unwrap_or(usize::MAX);
            let mut skipped = 0;
            let mut out = Vec::new();
            for oid in walk {
                ctx.check("rev-list")?;
                if out.len() >= limit {
                    break;
                }
                let oid = oid?;
                if !query.paths.is_empty() && !touches(repo, &repo.find_commit(oid)?, &query.paths)? {
                    continue;
                }
                if skipped < query.skip {
                    skipped += 1;
                    continue;
                }
                out.push(oid.into());
            }
            Ok(out)
        })
    }

    fn log(&self, ctx: &Context, filter: &LogFilter) -> Result<Vec<ObjectId>> {
        let query = RevListQuery {
            revisions: vec![filter.revision.clone()],
            all: filter.all,
            ..Default::default()
        };
        let candidates = self.rev_list(ctx, &query)?;
        self.with_repo(|repo| {
            let mut out = Vec::new();
            for id in candidates {
                if out.len() >= filter.max_count {
                    break;
                }
                let commit = repo.find_commit(id.into())?;
                if filter.matches(&commit_data(repo, &commit)?)? {
                    out.push(id);
                }
            }
            Ok(out)
        })
    }

    fn changed_files(&self, _ctx: &Context, base: &str, head: &str, from_merge_base: bool) -> Result<Vec<String>> {
        self.with_repo(|repo| {
            let head = commit_oid(repo, head)?;
            let mut base = commit_oid(repo, base)?;
            if from_merge_base {
                base = repo.merge_base(base, head).map_err(|e| {
                    if e.code() == ErrorCode::NotFound {
                        GitError::NoMergeBase
                    } else {
                        GitError::Native(e)
                    }
                })?;
            }
            let old = repo.find_commit(base)?.tree()?;
            let new = repo.find_commit(head)?.tree()?;
            let diff = repo.diff_tree_to_tree(Some(&old), Some(&new), None)?;
            let mut files: Vec<String> = diff
                .deltas()
                .filter_map(|delta| {
                    delta
                        .new_file()
                        .path()
                        .or_else(|| delta.old_file().path())
                        .map(|p| p.to_string_lossy().into_owned())
                })
                .collect();
            files.sort();
            files.dedup();
            Ok(files)
        })
    }

    fn is_ancestor(&self, _ctx: &Context, ancestor: &ObjectId, descendant: &ObjectId) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        self.with_repo(|repo| Ok(repo.graph_descendant_of((*descendant).into(), (*ancestor).into())?))
    }

    fn references(&self, _ctx: &Context, prefix: &str) -> Result<Vec<(String, ObjectId)>> {
        self.with_repo(|repo| {
            let mut refs = Vec::new();
            for reference in repo.references()? {
                let reference = reference?;
                let Some(name) = reference.name() else { continue };
                if !name.starts_with(prefix) {
                    continue;
                }
                if let Some(target) = reference.resolve().ok().and_then(|r| r.target()) {
                    refs.push((name.to_string(), target.into()));
                }
            }
            refs.sort();
            Ok(refs)
        })
    }

    fn head_ref(&self, _ctx: &Context) -> Result<Option<String>> {
        self.with_repo(|repo| {
            let head = repo.find_reference("HEAD")?;
            Ok(head.symbolic_target().map(str::to_string))
        })
    }

    fn tags(&self, _ctx: &Context) -> Result<Vec<Tag>> {
        self.with_repo(|repo| {
            let mut tags = Vec::new();
            for reference in repo.references_glob(&format!("{TAG_PREFIX}*"))? {
                let reference = reference?;
                let (Some(name), Some(target)) = (reference.name(), reference.target()) else {
                    continue;
                };
                let short = name.trim_start_matches(TAG_PREFIX);
                if let Some(tag) = tag_from_object(repo, short, target)? {
                    tags.push(tag);
                }
            }
            tags.sort_by_key(|t| std::cmp::Reverse(t.tagger.as_ref().map(Signature::timestamp)));
            Ok(tags)
        })
    }

    fn commit_file_status(&self, _ctx: &Context, id: &ObjectId) -> Result<CommitFileStatus> {
        self.with_repo(|repo| {
            let commit = repo.find_commit((*id).into()).map_err(missing(id))?;
            let old = match commit.parent_count() {
                0 => None,
                _ => Some(commit.parent(0)?.tree()?),
            };
            let mut opts = DiffOptions::new();
            opts.include_typechange(true);
            let diff = repo.diff_tree_to_tree(old.as_ref(), Some(&commit.tree()?), Some(&mut opts))?;

            let path = |file: git2::DiffFile<'_>| file.path().map(|p| p.to_string_lossy().into_owned());
            let mut status = CommitFileStatus::default();
            for delta in diff.deltas() {
                match delta.status() {
                    Delta::Added => status.added.extend(path(delta.new_file())),
                    Delta::Deleted => status.removed.extend(path(delta.old_file())),
                    Delta::Modified => status.modified.extend(path(delta.new_file())),
                    _ => {}
                }
            }
            status.sort();
            Ok(status)
        })
    }

    fn diverging_commits(&self, _ctx: &Context, base: &str, target: &str) -> Result<Divergence> {
        self.with_repo(|repo| {
            let (base, target) = (commit_oid(repo, base)?, commit_oid(repo, target)?);
            let (ahead, behind) = repo.graph_ahead_behind(target, base)?;
            Ok(Divergence {
                ahead: ahead as u64,
                behind: behind as u64,
            })
        })
    }

    fn nearest_branch(&self, ctx: &Context, id: &ObjectId) -> Result<Option<String>> {
        self.with_repo(|repo| {
            let target = repo.find_commit((*id).into()).map_err(missing(id))?.id();
            let mut best: Option<(usize, String)> = None;
            for reference in repo.references()? {
                ctx.check("name-rev")?;
                let reference = reference?;
                let Some(name) = reference.name() else { continue };
                if !name.starts_with("refs/") || name.starts_with(TAG_PREFIX) {
                    continue;
                }
                let Ok(tip) = reference.peel_to_commit() else { continue };
                let tip = tip.id();
                if tip != target && !repo.graph_descendant_of(tip, target)? {
                    continue;
                }
                let mut walk = repo.revwalk()?;
                walk.push(tip)?;
                walk.hide(target)?;
                let candidate = (walk.count(), short_ref_name(name).to_string());
                if best.as_ref().is_none_or(|b| candidate < *b) {
                    best = Some(candidate);
                }
            }
            Ok(best.map(|(_, name)| name))
        })
    }

    fn exact_tag(&self, _ctx: &Context, id: &ObjectId) -> Result<Option<String>> {
        self.with_repo(|repo| {
            let target: Oid = (*id).into();
            let mut matches = Vec::new();
            for reference in repo.references_glob(&format!("{TAG_PREFIX}*"))? {
                let reference = reference?;
                let Some(name) = reference.name().map(|n| n.trim_start_matches(TAG_PREFIX).to_string()) else {
                    continue;
                };
                if reference.peel_to_commit().ok().map(|c| c.id()) != Some(target) {
                    continue;
                }
                let rank = match reference.peel_to_tag() {
                    Ok(tag) => (true, tag.tagger().map(|s| s.when().seconds())),
                    Err(_) => (false, None),
                };
                matches.push((rank, name));
            }
            Ok(matches
                .into_iter()
                .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)))
                .map(|(_, name)| name))
        })
    }

    fn is_empty(&self, _ctx: &Context) -> Result<bool> {
        self.with_repo(|repo| match repo.head() {
            Ok(_) => Ok(false),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(true),
            Err(e) => Err(e.into()),
        })
    }
}
