//! Runtime configuration for the relay.

use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5353;
pub const DEFAULT_UPSTREAM_ORIGIN: &str = "https://realmofthemadgod.appspot.com";
/// The upstream budget is undocumented; 9 per minute is a guess.
pub const DEFAULT_RATE_LIMIT: u32 = 9;
pub const DEFAULT_QUOTA_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// File whose presence marks a directory as the companion web page checkout.
pub const STATIC_MARKER_FILE: &str = "muledump.html";

#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the relay listens on. Default: `5353`.
    pub(crate) port: u16,
    /// Scheme and host of the upstream API.
    pub(crate) upstream_origin: String,
    /// Upstream requests allowed per quota window. Default: `9`.
    pub(crate) rate_limit: u32,
    /// Length of one quota window. Default: `60s`.
    pub(crate) quota_window: Duration,
    /// Timeout for a single upstream call. Default: `30s`.
    pub(crate) upstream_timeout: Duration,
    /// Directory served for paths the relay doesn't own.
    pub(crate) static_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            upstream_origin: DEFAULT_UPSTREAM_ORIGIN.to_string(),
            rate_limit: DEFAULT_RATE_LIMIT,
            quota_window: DEFAULT_QUOTA_WINDOW,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            static_dir: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_upstream_origin(mut self, origin: impl Into<String>) -> Self {
        self.upstream_origin = origin.into();
        self
    }

    pub fn with_rate_limit(mut self, limit: u32) -> Self {
        self.rate_limit = limit;
        self
    }

    pub fn with_quota_window(mut self, window: Duration) -> Self {
        self.quota_window = window;
        self
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn with_static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn upstream_origin(&self) -> &str {
        &self.upstream_origin
    }

    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    pub fn quota_window(&self) -> Duration {
        self.quota_window
    }

    pub fn upstream_timeout(&self) -> Duration {
        self.upstream_timeout
    }

    pub fn static_dir(&self) -> Option<&Path> {
        self.static_dir.as_deref()
    }
}

/// `dir` if it holds the companion web page, otherwise `None`.
pub fn detect_static_dir(dir: &Path) -> Option<PathBuf> {
    dir.join(STATIC_MARKER_FILE)
        .exists()
        .then(|| dir.to_path_buf())
}
