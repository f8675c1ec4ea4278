#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use git2::{Oid, Signature, Time};
use tempfile::TempDir;

use git_access::cache::CacheService;
use git_access::git::{BackendKind, Repository};
use git_access::settings::Settings;

pub const ALICE: (&str, &str) = ("Alice", "alice@example.com");
pub const BOB: (&str, &str) = ("Bob", "bob@example.com");

/// A throwaway repository built through libgit2, with `main` as HEAD.
pub struct TestRepo {
    pub dir: TempDir,
    pub repo: git2::Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        repo.set_head("refs/heads/main").unwrap();
        TestRepo { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[cfg(unix)]
    pub fn symlink(&self, rel: &str, target: &str) {
        let path = self.dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(target, path).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.dir.path().join(rel)).unwrap();
    }

    pub fn commit(&self, message: &str, time: i64) -> Oid {
        self.commit_as(ALICE, message, time)
    }

    /// Stages the whole work tree and commits it on HEAD.
    pub fn commit_as(&self, who: (&str, &str), message: &str, time: i64) -> Oid {
        let mut index = self.repo.index().unwrap();
        index.add_all(["*"], git2::IndexAddOption::DEFAULT, None).unwrap();
        index.update_all(["*"], None).unwrap();
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();

        let sig = Signature::new(who.0, who.1, &Time::new(time, 0)).unwrap();
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    /// A root commit holding one file, pointed at by `refs/heads/<branch>`.
    pub fn orphan(&self, branch: &str, file: &str, content: &str, time: i64) -> Oid {
        let blob = self.repo.blob(content.as_bytes()).unwrap();
        let mut builder = self.repo.treebuilder(None).unwrap();
        builder.insert(file, blob, 0o100644).unwrap();
        let tree = self.repo.find_tree(builder.write().unwrap()).unwrap();
        let sig = Signature::new(BOB.0, BOB.1, &Time::new(time, 0)).unwrap();
        let oid = self
            .repo
            .commit(None, &sig, &sig, "orphan", &tree, &[])
            .unwrap();
        self.repo
            .reference(&format!("refs/heads/{branch}"), oid, true, "orphan")
            .unwrap();
        oid
    }

    /// Commits on `refs/heads/<branch>` on top of `parent`, touching only
    /// top-level files (`None` removes one). The work tree is left alone.
    pub fn commit_on(
        &self,
        branch: &str,
        parent: Oid,
        changes: &[(&str, Option<&str>)],
        message: &str,
        time: i64,
    ) -> Oid {
        let parent = self.repo.find_commit(parent).unwrap();
        let base = parent.tree().unwrap();
        let mut builder = self.repo.treebuilder(Some(&base)).unwrap();
        for &(name, content) in changes {
            match content {
                Some(content) => {
                    let blob = self.repo.blob(content.as_bytes()).unwrap();
                    builder.insert(name, blob, 0o100644).unwrap();
                }
                None => builder.remove(name).unwrap(),
            }
        }
        let tree = self.repo.find_tree(builder.write().unwrap()).unwrap();
        let sig = Signature::new(BOB.0, BOB.1, &Time::new(time, 0)).unwrap();
        let oid = self
            .repo
            .commit(None, &sig, &sig, message, &tree, &[&parent])
            .unwrap();
        self.repo
            .reference(&format!("refs/heads/{branch}"), oid, true, message)
            .unwrap();
        oid
    }

    pub fn lightweight_tag(&self, name: &str, target: Oid) {
        let obj = self.repo.find_object(target, None).unwrap();
        self.repo.tag_lightweight(name, &obj, false).unwrap();
    }

    pub fn annotated_tag(&self, name: &str, target: Oid, message: &str, time: i64) -> Oid {
        let obj = self.repo.find_object(target, None).unwrap();
        let sig = Signature::new("Rel Eng", "rel@example.com", &Time::new(time, 0)).unwrap();
        self.repo.tag(name, &obj, &sig, message, false).unwrap()
    }

    pub fn open(&self, kind: BackendKind) -> Repository {
        self.open_with(kind, Settings::default(), None)
    }

    pub fn open_with(
        &self,
        kind: BackendKind,
        settings: Settings,
        cache: Option<Arc<dyn CacheService>>,
    ) -> Repository {
        Repository::open(self.path(), Arc::new(settings), kind, cache).unwrap()
    }
}

pub fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

/// Native always; the CLI backend when a `git` executable is installed.
pub fn backends() -> Vec<BackendKind> {
    let mut kinds = vec![BackendKind::Native];
    if git_available() {
        kinds.push(BackendKind::Cli);
    } else {
        eprintln!("git executable not found, skipping cli backend");
    }
    kinds
}

pub fn hex(oid: Oid) -> String {
    oid.to_string()
}
