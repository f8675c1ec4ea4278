//! Data transfer objects (DTOs) for API responses.
//!
//! - `tree`: TreeEntry, LinkTarget, RepositoryInfo, CommitInfo
//! - `commit`: CommitDetail, CommitListResponse, BranchInfo, TagInfo

pub mod commit;
pub mod tree;

pub use commit::*;
pub use tree::*;
