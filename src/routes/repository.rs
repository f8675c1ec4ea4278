use axum::{extract::State, routing::get, Json, Router};

use crate::error::Result;
use crate::git::Repository;
use crate::models::{CommitInfo, RepositoryInfo};

pub fn routes(repo: Repository) -> Router {
    Router::new()
        .route("/api/v1/repository", get(get_repository_info))
        .with_state(repo)
}

async fn get_repository_info(State(repo): State<Repository>) -> Result<Json<RepositoryInfo>> {
    let name = repo
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| repo.path().display().to_string());

    // An empty repository has no head commit yet.
    let head = super::commit_for(&repo, None).ok();
    let commit_count = match &head {
        Some(commit) => Some(commit.commits_count()?),
        None => None,
    };

    Ok(Json(RepositoryInfo {
        name,
        path: repo.path().display().to_string(),
        backend: repo.backend().name().to_string(),
        default_branch: repo.get_default_branch().ok(),
        head_commit: head.as_ref().map(CommitInfo::from),
        commit_count,
    }))
}
