use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::git::{Repository, SearchCommitsOptions};
use crate::models::{CommitDetail, CommitListResponse};

pub fn routes(repo: Repository) -> Router {
    Router::new()
        .route("/api/v1/commits", get(get_commits))
        .route("/api/v1/commits/search", get(search_commits))
        .with_state(repo)
}

#[derive(Debug, Deserialize)]
struct CommitsQuery {
    rev: Option<String>,
    #[serde(default = "default_page")]
    page: usize,
    page_size: Option<usize>,
}

fn default_page() -> usize {
    1
}

async fn get_commits(
    State(repo): State<Repository>,
    Query(query): Query<CommitsQuery>,
) -> Result<Json<CommitListResponse>> {
    let commit = super::commit_for(&repo, query.rev.as_deref())?;
    let page = query.page.max(1);
    let page_size = query
        .page_size
        .unwrap_or(repo.settings().git.commits_range_size)
        .max(1);

    let commits = commit.commits_by_range(page, page_size)?;
    let total = commit.commits_count()?;
    Ok(Json(CommitListResponse {
        commits: commits.iter().map(CommitDetail::from).collect(),
        page,
        page_size,
        total,
        has_more: ((page * page_size) as u64) < total,
    }))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    rev: Option<String>,
    #[serde(default)]
    q: String,
    #[serde(default)]
    all: bool,
}

async fn search_commits(
    State(repo): State<Repository>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<CommitDetail>>> {
    let commit = super::commit_for(&repo, query.rev.as_deref())?;
    let opts = SearchCommitsOptions::from_query(&query.q, query.all);
    let found = commit.search_commits(&opts)?;
    Ok(Json(found.iter().map(CommitDetail::from).collect()))
}
