use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::git::Repository;
use crate::git::tree_entry::sort_entries;
use crate::models::{CommitDetail, CommitInfo, LinkTarget, TreeEntry};

pub fn routes(repo: Repository) -> Router {
    Router::new()
        .route("/api/v1/repository/tree", get(get_tree))
        .route("/api/v1/repository/last-commit", get(get_last_commit))
        .route("/api/v1/repository/follow", get(follow_link))
        .with_state(repo)
}

#[derive(Debug, Deserialize)]
struct TreeQuery {
    rev: Option<String>,
    #[serde(default)]
    path: String,
    #[serde(default = "default_true")]
    include_last_commit: bool,
}

fn default_true() -> bool {
    true
}

async fn get_tree(
    State(repo): State<Repository>,
    Query(query): Query<TreeQuery>,
) -> Result<Json<Vec<TreeEntry>>> {
    let commit = super::commit_for(&repo, query.rev.as_deref())?;
    let dir = query.path.trim_matches('/');
    let mut entries = commit.tree().sub_tree(dir)?.list_entries()?;
    sort_entries(&mut entries);

    let mut listing = Vec::with_capacity(entries.len());
    for entry in &entries {
        let last_commit = if query.include_last_commit {
            let path = if dir.is_empty() {
                entry.name().to_string()
            } else {
                format!("{dir}/{}", entry.name())
            };
            Some(CommitInfo::from(&commit.get_commit_by_path(&path)?))
        } else {
            None
        };
        listing.push(TreeEntry::from_entry(dir, entry, last_commit)?);
    }
    Ok(Json(listing))
}

#[derive(Debug, Deserialize)]
struct PathQuery {
    rev: Option<String>,
    path: String,
}

async fn get_last_commit(
    State(repo): State<Repository>,
    Query(query): Query<PathQuery>,
) -> Result<Json<CommitDetail>> {
    let commit = super::commit_for(&repo, query.rev.as_deref())?;
    let last = commit.get_commit_by_path(query.path.trim_matches('/'))?;
    Ok(Json(CommitDetail::from(&last)))
}

async fn follow_link(
    State(repo): State<Repository>,
    Query(query): Query<PathQuery>,
) -> Result<Json<LinkTarget>> {
    let commit = super::commit_for(&repo, query.rev.as_deref())?;
    let link = commit.get_tree_entry_by_path(&query.path)?;
    let target = link.follow_links()?;
    Ok(Json(LinkTarget {
        link: query.path,
        target: target.name().to_string(),
        oid: target.id().to_hex(),
        entry_type: target.mode().into(),
        size: target.size(),
    }))
}
