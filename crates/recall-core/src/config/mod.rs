//! Sync engine configuration.
//!
//! Timings, retry ceiling and the remote endpoint. Every value has a default,
//! so a host without any environment still gets a working offline engine.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::queue::DEFAULT_MAX_RETRIES;
use crate::util::{is_http_url, normalize_text_option};

const ENV_REMOTE_URL: &str = "RECALL_REMOTE_URL";
const ENV_REMOTE_API_KEY: &str = "RECALL_REMOTE_API_KEY";
const ENV_FLUSH_INTERVAL_SECS: &str = "RECALL_FLUSH_INTERVAL_SECS";
const ENV_REMOTE_TIMEOUT_SECS: &str = "RECALL_REMOTE_TIMEOUT_SECS";
const ENV_MAX_RETRIES: &str = "RECALL_MAX_RETRIES";

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_VISIBILITY_SETTLE: Duration = Duration::from_secs(1);
pub const DEFAULT_FOCUS_SETTLE: Duration = Duration::from_millis(500);
pub const DEFAULT_STARTUP_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(15);
/// Shortest periodic flush interval the engine will run with.
pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_COLLECTIONS: [&str; 2] = ["notes", "notecards"];

#[derive(Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Periodic flush interval
    pub flush_interval: Duration,
    /// Delay between a foreground visibility event and its flush
    pub visibility_settle: Duration,
    /// Delay between a focus event and its flush
    pub focus_settle: Duration,
    /// Grace period before the startup flush
    pub startup_delay: Duration,
    /// Failed attempts before an operation is abandoned
    pub max_retries: u32,
    /// Upper bound on a single remote call
    pub remote_timeout: Duration,
    /// Collections pulled by `sync_from_cloud`, in order
    pub collections: Vec<String>,
    pub remote_url: Option<String>,
    pub remote_api_key: Option<String>,
    /// Flush on reconnect and on enqueue from construction. When false those
    /// triggers wait for `SyncEngine::start` like the others.
    pub eager_triggers: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            visibility_settle: DEFAULT_VISIBILITY_SETTLE,
            focus_settle: DEFAULT_FOCUS_SETTLE,
            startup_delay: DEFAULT_STARTUP_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            collections: DEFAULT_COLLECTIONS.iter().map(ToString::to_string).collect(),
            remote_url: None,
            remote_api_key: None,
            eager_triggers: true,
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncConfig")
            .field("flush_interval", &self.flush_interval)
            .field("visibility_settle", &self.visibility_settle)
            .field("focus_settle", &self.focus_settle)
            .field("startup_delay", &self.startup_delay)
            .field("max_retries", &self.max_retries)
            .field("remote_timeout", &self.remote_timeout)
            .field("collections", &self.collections)
            .field("remote_url", &self.remote_url)
            .field(
                "remote_api_key",
                &self.remote_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("eager_triggers", &self.eager_triggers)
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from `RECALL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        parse_config(|name| values.get(name).cloned())
    }

    /// Whether a remote endpoint is configured.
    pub const fn has_remote(&self) -> bool {
        self.remote_url.is_some() && self.remote_api_key.is_some()
    }
}

/// Build a config from an arbitrary variable lookup.
///
/// Public for testability; callers can exercise parsing without touching the
/// process environment.
pub fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<SyncConfig> {
    let mut config = SyncConfig::default();

    let remote_url = normalize_text_option(lookup(ENV_REMOTE_URL))
        .map(|url| url.trim_end_matches('/').to_string());
    let remote_api_key = normalize_text_option(lookup(ENV_REMOTE_API_KEY));

    match (&remote_url, &remote_api_key) {
        (Some(url), Some(_)) if !is_http_url(url) => {
            return Err(Error::Config(format!(
                "{ENV_REMOTE_URL} must start with http:// or https://"
            )));
        }
        (Some(_), None) => {
            return Err(Error::Config(format!(
                "Remote configuration is incomplete. Missing: {ENV_REMOTE_API_KEY}"
            )));
        }
        (None, Some(_)) => {
            return Err(Error::Config(format!(
                "Remote configuration is incomplete. Missing: {ENV_REMOTE_URL}"
            )));
        }
        _ => {}
    }
    config.remote_url = remote_url;
    config.remote_api_key = remote_api_key;

    if let Some(secs) = parse_number::<u64>(&lookup, ENV_FLUSH_INTERVAL_SECS)? {
        if secs == 0 {
            return Err(Error::Config(format!(
                "{ENV_FLUSH_INTERVAL_SECS} must be greater than 0"
            )));
        }
        config.flush_interval = Duration::from_secs(secs);
    }

    if let Some(secs) = parse_number::<u64>(&lookup, ENV_REMOTE_TIMEOUT_SECS)? {
        if !(1..=300).contains(&secs) {
            return Err(Error::Config(format!(
                "{ENV_REMOTE_TIMEOUT_SECS} must be in [1, 300]"
            )));
        }
        config.remote_timeout = Duration::from_secs(secs);
    }

    if let Some(retries) = parse_number::<u32>(&lookup, ENV_MAX_RETRIES)? {
        if retries == 0 {
            return Err(Error::Config(format!("{ENV_MAX_RETRIES} must be at least 1")));
        }
        config.max_retries = retries;
    }

    Ok(config)
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    let Some(raw) = normalize_text_option(lookup(name)) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{name} must be an integer, got {raw:?}")))
}
