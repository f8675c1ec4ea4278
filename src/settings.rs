//! Process-wide configuration.
//!
//! Built once at startup (`Settings::from_env` or `Settings::default`) and
//! shared read-only as `Arc<Settings>` by the command runner, the backends,
//! and the last-commit cache.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub git: GitSettings,
    pub cache: CacheSettings,
    pub last_commit: LastCommitSettings,
    pub proxy: ProxySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    /// Executable used by the command runner.
    pub path: PathBuf,
    /// Exported as HOME to isolate the tool from the user's configuration.
    pub home_path: Option<PathBuf>,
    pub timeout: Duration,
    pub commits_range_size: usize,
    /// Prepended to every invocation, never shown in descriptions.
    pub global_args: Vec<String>,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("git"),
            home_path: None,
            timeout: Duration::from_secs(360),
            commits_range_size: 50,
            global_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// TTL for generic memoized values such as commit counts. Zero disables.
    pub ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(16 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LastCommitSettings {
    pub enabled: bool,
    pub ttl: Duration,
    /// Repositories with fewer commits skip the cache.
    pub commits_count: u64,
    /// Bound on the commit records kept in memory for level-1 hits.
    pub records_capacity: u64,
}

impl Default for LastCommitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(8760 * 60 * 60),
            commits_count: 1000,
            records_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub enabled: bool,
    pub url: Option<String>,
    /// Glob patterns matched against the host of a remote URL.
    pub hosts: Vec<String>,
}

impl Settings {
    /// Defaults overridden by `GIT_ACCESS_*` and the proxy variables.
    pub fn from_env() -> Self {
        let mut settings = Settings::default();

        if let Ok(path) = std::env::var("GIT_ACCESS_GIT_PATH") {
            settings.git.path = PathBuf::from(path);
        }
        if let Ok(home) = std::env::var("GIT_ACCESS_HOME") {
            settings.git.home_path = Some(PathBuf::from(home));
        }
        if let Some(secs) = env_parse::<u64>("GIT_ACCESS_TIMEOUT_SECS") {
            settings.git.timeout = Duration::from_secs(secs);
        }
        if let Some(enabled) = env_parse::<bool>("GIT_ACCESS_LAST_COMMIT_ENABLED") {
            settings.last_commit.enabled = enabled;
        }
        if let Some(count) = env_parse::<u64>("GIT_ACCESS_LAST_COMMIT_COUNT") {
            settings.last_commit.commits_count = count;
        }

        settings.proxy = ProxySettings::from_env();
        settings
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.git.timeout, Duration::from_secs(360));
        assert!(settings.last_commit.enabled);
        assert_eq!(settings.last_commit.commits_count, 1000);
        assert_eq!(settings.last_commit.ttl, Duration::from_secs(8760 * 3600));
        assert!(!settings.proxy.enabled);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"last_commit": {"commits_count": 10}}"#).unwrap();
        assert_eq!(settings.last_commit.commits_count, 10);
        assert!(settings.last_commit.enabled);
        assert_eq!(settings.git.path, PathBuf::from("git"));
    }
}
