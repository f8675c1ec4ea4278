//! Branch and tag listing endpoints.
//!
//! - GET /api/v1/branches
//!   All local branches by name, the one HEAD points at flagged.
//!
//! - GET /api/v1/tags?page=&page_size=
//!   Tags newest first. Page 0 (the default) returns every tag.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::git::Repository;
use crate::models::{BranchInfo, TagInfo, TagListResponse};

pub fn routes(repo: Repository) -> Router {
    Router::new()
        .route("/api/v1/branches", get(list_branches))
        .route("/api/v1/tags", get(list_tags))
        .with_state(repo)
}

async fn list_branches(State(repo): State<Repository>) -> Result<Json<Vec<BranchInfo>>> {
    let default = repo.get_default_branch().ok();
    let (branches, _) = repo.get_branches(0, 0)?;
    Ok(Json(
        branches
            .into_iter()
            .map(|b| BranchInfo::new(b, default.as_deref()))
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
struct TagsQuery {
    #[serde(default)]
    page: usize,
    #[serde(default = "default_page_size")]
    page_size: usize,
}

fn default_page_size() -> usize {
    50
}

async fn list_tags(
    State(repo): State<Repository>,
    Query(query): Query<TagsQuery>,
) -> Result<Json<TagListResponse>> {
    let (tags, total) = repo.get_tag_infos(query.page, query.page_size)?;
    Ok(Json(TagListResponse {
        tags: tags.into_iter().map(TagInfo::from).collect(),
        total,
    }))
}
