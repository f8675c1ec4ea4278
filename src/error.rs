//! Error types for repository access and their HTTP response mapping.
//!
//! `GitError` covers every failure the access layer reports. Callers match on
//! the kind rather than on message text: `is_not_found()` separates "absent"
//! from "failed", `BrokenLink` carries a `LinkError` sub-reason, and
//! `Timeout`/`Cancelled` stay distinct from a non-zero exit (`Run`).
//!
//! Response mappings:
//! - `NotFound`, native not-found → 404
//! - `InvalidObjectId`, `InvalidArgument`, `BrokenLink`, `BrokenCommand` → 400
//! - `Timeout` → 504
//! - everything else → 500

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("object does not exist [id: {id}, rel_path: {rel_path}]")]
    NotFound { id: String, rel_path: String },

    #[error("invalid object id: {0:?}")]
    InvalidObjectId(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{name}: {reason}")]
    BrokenLink { name: String, reason: LinkError },

    #[error("broken command {command:?}, refusing to run with arguments {args:?}")]
    BrokenCommand { command: String, args: Vec<String> },

    #[error("{description}: exit status {code} - {stderr}")]
    Run {
        description: String,
        code: i32,
        stderr: String,
    },

    #[error("{description}: deadline exceeded")]
    Timeout { description: String },

    #[error("{description}: context cancelled")]
    Cancelled { description: String },

    #[error("no merge base found")]
    NoMergeBase,

    #[error("Git error: {0}")]
    Native(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a symlink could not be followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    NotASymlink,
    OutsideRepository,
    Broken,
    Recursive,
    TooManyLevels,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            LinkError::NotASymlink => "not a symlink",
            LinkError::OutsideRepository => "points outside of repo",
            LinkError::Broken => "broken link",
            LinkError::Recursive => "recursive link",
            LinkError::TooManyLevels => "too many levels of symbolic links",
        };
        f.write_str(msg)
    }
}

impl GitError {
    pub fn not_found(id: impl Into<String>) -> Self {
        GitError::NotFound {
            id: id.into(),
            rel_path: String::new(),
        }
    }

    pub fn path_not_found(rel_path: impl Into<String>) -> Self {
        GitError::NotFound {
            id: String::new(),
            rel_path: rel_path.into(),
        }
    }

    pub fn broken_link(name: impl Into<String>, reason: LinkError) -> Self {
        GitError::BrokenLink {
            name: name.into(),
            reason,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            GitError::NotFound { .. } => true,
            GitError::Native(e) => e.code() == git2::ErrorCode::NotFound,
            _ => false,
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            GitError::InvalidObjectId(_) | GitError::InvalidArgument(_) | GitError::BrokenCommand { .. }
        )
    }

    /// True when a subprocess exited with exactly `code`.
    pub fn is_exit_code(&self, code: i32) -> bool {
        matches!(self, GitError::Run { code: c, .. } if *c == code)
    }

    pub fn link_error(&self) -> Option<LinkError> {
        match self {
            GitError::BrokenLink { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn stderr(&self) -> Option<&str> {
        match self {
            GitError::Run { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

impl IntoResponse for GitError {
    fn into_response(self) -> Response {
        let status = if self.is_not_found() {
            StatusCode::NOT_FOUND
        } else if self.is_invalid_input() || matches!(self, GitError::BrokenLink { .. }) {
            StatusCode::BAD_REQUEST
        } else if matches!(self, GitError::Timeout { .. }) {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_not_found_counts_as_not_found() {
        let err = GitError::from(git2::Error::new(
            git2::ErrorCode::NotFound,
            git2::ErrorClass::Odb,
            "object not found",
        ));
        assert!(err.is_not_found());
        assert!(!GitError::NoMergeBase.is_not_found());
    }

    #[test]
    fn broken_link_message_names_entry() {
        let err = GitError::broken_link("docs/link", LinkError::Recursive);
        assert_eq!(err.to_string(), "docs/link: recursive link");
        assert_eq!(err.link_error(), Some(LinkError::Recursive));
    }

    #[test]
    fn exit_code_matching() {
        let err = GitError::Run {
            description: "git merge-base".into(),
            code: 1,
            stderr: String::new(),
        };
        assert!(err.is_exit_code(1));
        assert!(!err.is_exit_code(128));
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            GitError::path_not_found("a.txt").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GitError::InvalidObjectId("zz".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GitError::Timeout { description: "git log".into() }
                .into_response()
                .status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
