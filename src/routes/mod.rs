//! API route handlers - maps HTTP endpoints to repository operations.
//!
//! Each submodule defines routes for a feature area:
//! - `repository`: Basic repo info (GET /api/v1/repository)
//! - `tree`: Directory listing, last commit per path, symlink resolution
//! - `commits`: Commit history pages and search
//! - `branches`: Branch and tag listings

pub mod branches;
pub mod commits;
pub mod repository;
pub mod tree;

use axum::Router;

use crate::error::Result;
use crate::git::{Commit, Repository};

pub fn create_router(repo: Repository) -> Router {
    Router::new()
        .merge(repository::routes(repo.clone()))
        .merge(tree::routes(repo.clone()))
        .merge(commits::routes(repo.clone()))
        .merge(branches::routes(repo))
}

/// The commit named by `rev`, or the default branch head when absent.
fn commit_for(repo: &Repository, rev: Option<&str>) -> Result<Commit> {
    match rev.filter(|r| !r.is_empty()) {
        Some(rev) => repo.get_commit(rev),
        None => match repo.get_default_branch() {
            Ok(branch) => repo.get_branch_commit(&branch),
            Err(_) => repo.get_commit("HEAD"),
        },
    }
}
