//! Proxy selection for network-capable git invocations.

use glob::Pattern;

use crate::settings::ProxySettings;

impl ProxySettings {
    /// Reads `PROXY_ENABLED`, `PROXY_URL` and the comma separated `PROXY_HOSTS`.
    pub fn from_env() -> Self {
        let enabled = std::env::var("PROXY_ENABLED").is_ok_and(|v| v == "true");

        let url = std::env::var("PROXY_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .and_then(|v| {
                if host_of(&v).is_some() {
                    Some(v)
                } else {
                    tracing::error!("PROXY_URL is not a valid URL: {}", v);
                    None
                }
            });

        let hosts = std::env::var("PROXY_HOSTS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Self { enabled, url, hosts }
    }

    /// Configured proxy, else `http_proxy`, else `https_proxy`.
    pub fn proxy_url(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        if let Some(url) = &self.url {
            return Some(url.clone());
        }
        ["http_proxy", "https_proxy"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|v| !v.is_empty())
    }

    /// Whether traffic to `host` goes through the proxy.
    pub fn matches(&self, host: &str) -> bool {
        if !self.enabled {
            return false;
        }
        self.hosts.iter().any(|h| match Pattern::new(h) {
            Ok(pattern) => pattern.matches(host),
            Err(e) => {
                tracing::error!("Invalid proxy host pattern {}: {}", h, e);
                false
            }
        })
    }

    /// Environment additions for an invocation that talks to `remote_url`.
    pub fn env_for(&self, remote_url: &str) -> Vec<(String, String)> {
        match (host_of(remote_url), self.proxy_url()) {
            (Some(host), Some(proxy)) if self.matches(host) => {
                vec![("https_proxy".to_string(), proxy)]
            }
            _ => Vec::new(),
        }
    }
}

/// Host part of `scheme://[userinfo@]host[:port][/path]`.
pub fn host_of(url: &str) -> Option<&str> {
    let (scheme, rest) = url.split_once("://")?;
    if scheme.is_empty() {
        return None;
    }
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = match host_port.strip_prefix('[') {
        Some(v6) => v6.split(']').next().unwrap_or_default(),
        None => host_port.split(':').next().unwrap_or_default(),
    };
    (!host.is_empty()).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(hosts: &[&str]) -> ProxySettings {
        ProxySettings {
            enabled: true,
            url: Some("http://proxy.local:3128".into()),
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
        }
    }

    #[test]
    fn extracts_host() {
        assert_eq!(host_of("https://user:pw@git.example.com:8443/a.git"), Some("git.example.com"));
        assert_eq!(host_of("http://[::1]:80/"), Some("::1"));
        assert_eq!(host_of("git.example.com/a.git"), None);
    }

    #[test]
    fn glob_hosts() {
        let proxy = settings(&["*.example.com", "github.com"]);
        assert!(proxy.matches("git.example.com"));
        assert!(proxy.matches("github.com"));
        assert!(!proxy.matches("gitlab.com"));
    }

    #[test]
    fn disabled_never_matches() {
        let mut proxy = settings(&["*"]);
        proxy.enabled = false;
        assert!(!proxy.matches("github.com"));
        assert!(proxy.proxy_url().is_none());
        assert!(proxy.env_for("https://github.com/a/b").is_empty());
    }

    #[test]
    fn env_for_matching_remote() {
        let proxy = settings(&["github.com"]);
        assert_eq!(
            proxy.env_for("https://github.com/a/b.git"),
            vec![("https_proxy".to_string(), "http://proxy.local:3128".to_string())]
        );
        assert!(proxy.env_for("https://gitlab.com/a/b.git").is_empty());
    }
}
