//! Configuration for the keyword pipeline.
//!
//! Defaults match the fetch limits the pipeline guarantees (10s deadline, 1.5 MiB body,
//! 5 redirect hops). Every knob can be overridden with a `KWPIPE_*` environment variable.

use kwpipe_core::{Error, Result};
use std::time::Duration;

pub const DEFAULT_MAX_BYTES: u64 = 1_572_864;
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_USER_AGENT: &str = "kwpipe/0.1 (+keyword-analyzer)";

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Overall deadline for one page fetch (every hop plus the body).
    pub fetch_timeout: Duration,
    /// Deadline for each robots.txt / sitemap.xml probe.
    pub probe_timeout: Duration,
    /// Hard cap on response body bytes.
    pub max_bytes: u64,
    /// Redirect hops followed before giving up.
    pub max_redirects: usize,
    pub user_agent: String,
    /// Skip the private-address guard. Only for local fixtures; `from_env` always leaves it off.
    pub allow_private_hosts: bool,
    /// Resolve hostnames and validate (then pin) the resolved addresses per hop.
    pub resolve_hosts: bool,
    /// Keep at most this many ranked findings (`None` keeps everything).
    pub max_keywords: Option<usize>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            max_bytes: DEFAULT_MAX_BYTES,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_private_hosts: false,
            resolve_hosts: false,
            max_keywords: None,
        }
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env(key).and_then(|s| s.parse::<u64>().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env(key).map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl AnalyzerConfig {
    /// Load configuration from `KWPIPE_*` environment variables, clamped to safe ranges.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            fetch_timeout: env_u64("KWPIPE_FETCH_TIMEOUT_MS")
                .map(|ms| Duration::from_millis(ms.clamp(100, 60_000)))
                .unwrap_or(d.fetch_timeout),
            probe_timeout: env_u64("KWPIPE_PROBE_TIMEOUT_MS")
                .map(|ms| Duration::from_millis(ms.clamp(100, 30_000)))
                .unwrap_or(d.probe_timeout),
            max_bytes: env_u64("KWPIPE_MAX_BYTES")
                .map(|n| n.clamp(1_024, 16 * 1_048_576))
                .unwrap_or(d.max_bytes),
            max_redirects: env_u64("KWPIPE_MAX_REDIRECTS")
                .map(|n| n.min(10) as usize)
                .unwrap_or(d.max_redirects),
            user_agent: env("KWPIPE_USER_AGENT").unwrap_or(d.user_agent),
            // Never read from the environment; only code can lift the address guard.
            allow_private_hosts: false,
            resolve_hosts: env_bool("KWPIPE_RESOLVE_HOSTS").unwrap_or(d.resolve_hosts),
            max_keywords: env_u64("KWPIPE_MAX_KEYWORDS")
                .filter(|n| *n > 0)
                .map(|n| n as usize),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout.is_zero() {
            return Err(Error::Config("fetch_timeout must be non-zero".to_string()));
        }
        if self.probe_timeout.is_zero() {
            return Err(Error::Config("probe_timeout must be non-zero".to_string()));
        }
        if self.max_bytes == 0 {
            return Err(Error::Config("max_bytes must be at least 1".to_string()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(Error::Config("user_agent must not be empty".to_string()));
        }
        if self.max_keywords == Some(0) {
            return Err(Error::Config("max_keywords must be at least 1".to_string()));
        }
        Ok(())
    }
}
