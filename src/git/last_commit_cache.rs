//! Memoized answers to "which commit last touched this path".
//!
//! Level 1 is the injected cache service, keyed by repository, revision
//! and path. Level 2 keeps the commit records already materialized for
//! level-1 hits so repeated hits skip the backend. Level 2 is bounded by
//! `settings.last_commit.records_capacity`.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use sha2::{Digest, Sha256};

use crate::cache::CacheService;
use crate::error::Result;
use crate::git::backend::CommitData;
use crate::git::commit::Commit;
use crate::git::object_id::ObjectId;
use crate::git::repository::Repository;
use crate::settings::Settings;

pub fn cache_key(repo_path: &str, revision: &str, entry_path: &str) -> String {
    let digest = Sha256::digest(format!("{repo_path}:{revision}:{entry_path}").as_bytes());
    format!("last_commit:{}", hex::encode(digest))
}

pub struct LastCommitCache {
    repo_path: String,
    ttl: Duration,
    cache: Arc<dyn CacheService>,
    commits: Cache<ObjectId, CommitData>,
}

impl LastCommitCache {
    /// `None` unless a cache is available, the feature is enabled, and the
    /// history is at least `settings.last_commit.commits_count` long.
    pub fn new(
        count: u64,
        repo_path: impl Into<String>,
        cache: Option<Arc<dyn CacheService>>,
        settings: &Settings,
    ) -> Option<Self> {
        let cache = cache?;
        if !settings.last_commit.enabled || count < settings.last_commit.commits_count {
            return None;
        }
        Some(LastCommitCache {
            repo_path: repo_path.into(),
            ttl: settings.last_commit.ttl,
            cache,
            commits: Cache::new(settings.last_commit.records_capacity),
        })
    }

    pub fn repo_path(&self) -> &str {
        &self.repo_path
    }

    pub fn put(&self, revision: &str, entry_path: &str, commit_id: &str) -> Result<()> {
        tracing::info!("LastCommitCache save: [{}:{}:{}]", revision, entry_path, commit_id);
        self.cache
            .put(&cache_key(&self.repo_path, revision, entry_path), commit_id.to_string(), self.ttl)?;
        Ok(())
    }

    /// `Ok(None)` on a level-1 miss.
    pub fn get(&self, repo: &Repository, revision: &str, entry_path: &str) -> Result<Option<Commit>> {
        let Some(commit_id) = self
            .cache
            .get(&cache_key(&self.repo_path, revision, entry_path))
            .filter(|id| !id.is_empty())
        else {
            return Ok(None);
        };
        tracing::info!("LastCommitCache hit level 1: [{}:{}:{}]", revision, entry_path, commit_id);

        let id = ObjectId::from_hex(&commit_id)?;
        if let Some(data) = self.commits.get(&id) {
            tracing::info!("LastCommitCache hit level 2: [{}:{}:{}]", revision, entry_path, commit_id);
            return Ok(Some(Commit::new(repo.clone(), data)));
        }

        let data = repo.backend().read_commit(repo.ctx(), &id)?;
        self.commits.insert(id, data.clone());
        Ok(Some(Commit::new(repo.clone(), data)))
    }

    /// Cached lookup falling back to a history walk. The result is written
    /// back; a failed write is logged and otherwise ignored.
    pub fn get_commit_by_path(&self, repo: &Repository, commit_id: &str, entry_path: &str) -> Result<Commit> {
        let id = ObjectId::from_hex(commit_id)?;
        if let Some(commit) = self.get(repo, &id.to_hex(), entry_path)? {
            return Ok(commit);
        }

        let last = repo.last_commit_for_path(&id, entry_path)?;
        if let Err(e) = self.put(&id.to_hex(), entry_path, &last.id().to_hex()) {
            tracing::error!(
                "Unable to cache {} as the last commit for {:?} in {} {}: {}",
                last.id(),
                entry_path,
                commit_id,
                self.repo_path,
                e
            );
        }
        Ok(last)
    }

    pub fn clear(&self) {
        self.commits.invalidate_all();
    }

    /// Level-2 records currently held, after pending evictions settle.
    pub fn records_len(&self) -> u64 {
        self.commits.run_pending_tasks();
        self.commits.entry_count()
    }
}

impl std::fmt::Debug for LastCommitCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LastCommitCache")
            .field("repo_path", &self.repo_path)
            .field("ttl", &self.ttl)
            .finish()
    }
}
