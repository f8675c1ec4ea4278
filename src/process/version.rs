use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{GitError, Result};
use crate::process::{Command, Context, RunOpts};
use crate::settings::Settings;

/// Commit-graph files need at least this version.
pub const COMMIT_GRAPH_MIN_VERSION: &str = "2.18";

/// Dotted numeric version. Missing components compare as zero.
#[derive(Debug, Clone)]
pub struct GitVersion(Vec<u64>);

impl GitVersion {
    pub fn detect(ctx: &Context, settings: &Settings) -> Result<Self> {
        let (stdout, _) =
            Command::new(ctx, settings, ["--version"]).run_std_string(RunOpts::default())?;
        let raw = stdout
            .trim()
            .strip_prefix("git version ")
            .ok_or_else(|| GitError::Parse(format!("unexpected version output: {}", stdout.trim())))?;
        raw.parse()
    }

    pub fn at_least(&self, other: &str) -> Result<bool> {
        Ok(*self >= other.parse::<GitVersion>()?)
    }
}

impl FromStr for GitVersion {
    type Err = GitError;

    /// Accepts `2.39.2`, `2.39.2.windows.1` and `2.24.3 (Apple Git-128)`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<u64> = s
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .split('.')
            .map_while(|p| p.parse().ok())
            .collect();
        if parts.is_empty() {
            return Err(GitError::Parse(format!("invalid git version: {s}")));
        }
        Ok(GitVersion(parts))
    }
}

impl Ord for GitVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| {
                let a = self.0.get(i).copied().unwrap_or(0);
                let b = other.0.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for GitVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GitVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for GitVersion {}

impl fmt::Display for GitVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// Writes the commit-graph file when the installed git supports it.
/// Returns whether anything was written.
pub fn write_commit_graph(ctx: &Context, settings: &Settings, repo_path: &Path) -> Result<bool> {
    if !GitVersion::detect(ctx, settings)?.at_least(COMMIT_GRAPH_MIN_VERSION)? {
        return Ok(false);
    }
    Command::new(ctx, settings, ["commit-graph", "write"]).run_std_string(RunOpts::in_dir(repo_path))?;
    Ok(true)
}

/// Whether `url` answers `ls-remote`, routed through the proxy when its host matches.
pub fn is_repo_url_accessible(ctx: &Context, settings: &Settings, url: &str) -> bool {
    let opts = RunOpts {
        extra_env: settings.proxy.env_for(url),
        ..Default::default()
    };
    Command::new(ctx, settings, ["ls-remote", "-q", "-h"])
        .add_dynamic_arguments([url, "HEAD"])
        .run_std_string(opts)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vendor_suffixes() {
        let v: GitVersion = "2.39.2.windows.1".parse().unwrap();
        assert_eq!(v.to_string(), "2.39.2");
        let v: GitVersion = "2.24.3 (Apple Git-128)".parse().unwrap();
        assert_eq!(v.to_string(), "2.24.3");
        assert!("garbage".parse::<GitVersion>().is_err());
    }

    #[test]
    fn compares_numerically() {
        let v: GitVersion = "2.18".parse().unwrap();
        assert!(v.at_least("2.18.0").unwrap());
        assert!(v.at_least("2.9").unwrap());
        assert!(!v.at_least("2.19").unwrap());
        assert!("2.100".parse::<GitVersion>().unwrap() > "2.18.5".parse().unwrap());
    }

    #[test]
    fn dash_url_is_not_passed_to_ls_remote() {
        assert!(!is_repo_url_accessible(
            &Context::background(),
            &Settings::default(),
            "--upload-pack=touch /tmp/pwned"
        ));
    }
}
