pub mod backend;
pub mod blob;
pub mod commit;
pub mod last_commit_cache;
pub mod object_id;
pub mod repository;
pub mod signature;
pub mod tag;
pub mod tree;
pub mod tree_entry;

pub use backend::{Backend, CommitFileStatus, Divergence, ObjectKind};
pub use blob::Blob;
pub use commit::{Commit, SearchCommitsOptions, SubModule};
pub use last_commit_cache::LastCommitCache;
pub use object_id::ObjectId;
pub use repository::{BackendKind, Branch, Repository};
pub use signature::Signature;
pub use tag::Tag;
pub use tree::Tree;
pub use tree_entry::{EntryMode, TreeEntry};
