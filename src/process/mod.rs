//! External process execution: cancellation contexts, the hardened command
//! builder, and git version detection.

mod command;
mod context;
mod version;

pub use command::{CmdArg, Command, RunOpts, sanitize_credential_urls};
pub use context::Context;
pub use version::{COMMIT_GRAPH_MIN_VERSION, GitVersion, is_repo_url_accessible, write_commit_graph};
