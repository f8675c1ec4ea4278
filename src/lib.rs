//! Read-only access to git repositories: object lookup, lazily decoded
//! trees, commit history queries and a cached "last commit for path"
//! answer, over libgit2 or the `git` executable.

pub mod cache;
pub mod error;
pub mod git;
pub mod models;
pub mod process;
pub mod proxy;
pub mod routes;
pub mod settings;

pub use error::{GitError, Result};
