//! Browser-style URL match patterns: `<scheme>://<host>/<path>`.
//!
//! - scheme `*` matches `http` and `https`, anything else must match exactly
//! - host `*` matches any host, `*.example.com` matches `example.com` and
//!   every subdomain, otherwise the host must match exactly
//! - path is a glob where `*` matches any run of characters; it is matched
//!   against the URL path plus query, never the fragment
//!
//! Path matching ignores ASCII case so that `twitch.tv/SomeChannel` and
//! `twitch.tv/somechannel` are the same tab.

use regex::Regex;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("pattern must contain the CHANNEL_NAME placeholder")]
    MissingPlaceholder,

    #[error("pattern is missing '://': {0}")]
    MissingScheme(String),

    #[error("pattern is missing a path: {0}")]
    MissingPath(String),

    #[error("invalid scheme '{0}'")]
    InvalidScheme(String),

    #[error("invalid host '{0}'")]
    InvalidHost(String),

    #[error("invalid path glob: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Debug, Clone)]
enum SchemeMatch {
    HttpOrHttps,
    Exact(String),
}

#[derive(Debug, Clone)]
enum HostMatch {
    Any,
    Exact(String),
    DomainAndSubdomains(String),
}

/// A compiled match pattern.
#[derive(Debug, Clone)]
pub struct MatchPattern {
    source: String,
    scheme: SchemeMatch,
    host: HostMatch,
    path: Regex,
}

impl MatchPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let (scheme, rest) = pattern
            .split_once("://")
            .ok_or_else(|| PatternError::MissingScheme(pattern.to_string()))?;

        let scheme = match scheme {
            "*" => SchemeMatch::HttpOrHttps,
            s if !s.is_empty()
                && s
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
            {
                SchemeMatch::Exact(s.to_ascii_lowercase())
            }
            s => return Err(PatternError::InvalidScheme(s.to_string())),
        };

        let slash = rest
            .find('/')
            .ok_or_else(|| PatternError::MissingPath(pattern.to_string()))?;
        let (host, path) = rest.split_at(slash);

        let host = match host {
            "*" => HostMatch::Any,
            h if h.starts_with("*.") && !h[2..].is_empty() && !h[2..].contains('*') => {
                HostMatch::DomainAndSubdomains(h[2..].to_ascii_lowercase())
            }
            h if !h.is_empty() && !h.contains('*') => HostMatch::Exact(h.to_ascii_lowercase()),
            h => return Err(PatternError::InvalidHost(h.to_string())),
        };

        Ok(Self {
            source: pattern.to_string(),
            scheme,
            host,
            path: glob_to_regex(path)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `url` is matched by this pattern. Unparseable URLs never match.
    pub fn matches(&self, url: &str) -> bool {
        let Ok(url) = Url::parse(url) else {
            return false;
        };

        let scheme_ok = match &self.scheme {
            SchemeMatch::HttpOrHttps => matches!(url.scheme(), "http" | "https"),
            SchemeMatch::Exact(s) => url.scheme() == s,
        };
        if !scheme_ok {
            return false;
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let host_ok = match &self.host {
            HostMatch::Any => true,
            HostMatch::Exact(h) => host == *h,
            HostMatch::DomainAndSubdomains(domain) => {
                host == *domain || host.ends_with(&format!(".{domain}"))
            }
        };
        if !host_ok {
            return false;
        }

        let path_and_query = match url.query() {
            Some(q) => format!("{}?{q}", url.path()),
            None => url.path().to_string(),
        };
        self.path.is_match(&path_and_query)
    }
}

fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let body = glob
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("(?i)^{body}$"))
}
