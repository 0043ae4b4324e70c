use logsift_search::{DEFAULT_PATH_PREFIX, Fallback, MatchMode, ScanSettings};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path prefix searched when a request does not name one.
    pub default_prefix: String,
    pub storage: StorageConfig,
    pub scan: ScanConfig,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            default_prefix: DEFAULT_PATH_PREFIX.to_string(),
            storage: StorageConfig::default(),
            scan: ScanConfig::default(),
        }
    }
}

/// Where the searched objects live, selected by the `type` key.
///
/// ```toml
/// [storage]
/// type = "s3"
/// bucket = "partner-logs"
/// region = "eu-west-1"
/// key_id = "AKIA..."
/// key_secret = "..."
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    S3 {
        bucket: String,
        #[serde(default)]
        prefix: Option<String>,
        #[serde(default = "default_region")]
        region: String,
        /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
        #[serde(default)]
        endpoint: Option<String>,
        key_id: String,
        key_secret: String,
    },
    Local {
        /// Relative roots resolve against the working directory.
        root: PathBuf,
    },
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self::Local { root: PathBuf::from(".") }
    }
}

impl StorageConfig {
    /// The `type` tag, for logging without leaking credentials.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::Local { .. } => "local",
        }
    }
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// The `[scan]` table. Durations are whole seconds (or milliseconds for the
/// retry hint) so they read naturally in TOML and environment variables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub page_size: usize,
    pub keepalive_secs: u64,
    pub progress_every: u64,
    pub progress_secs: u64,
    pub retry_ms: u64,
    pub suffix: String,
    pub match_mode: MatchMode,
    pub fallback: Fallback,
}
impl Default for ScanConfig {
    fn default() -> Self {
        ScanSettings::default().into()
    }
}

impl From<ScanSettings> for ScanConfig {
    fn from(settings: ScanSettings) -> Self {
        Self {
            page_size: settings.page_size,
            keepalive_secs: settings.keepalive_interval.as_secs(),
            progress_every: settings.progress_every,
            progress_secs: settings.progress_interval.as_secs(),
            retry_ms: u64::try_from(settings.retry_hint.as_millis()).unwrap_or(u64::MAX),
            suffix: settings.suffix,
            match_mode: settings.match_mode,
            fallback: settings.fallback,
        }
    }
}

impl From<&ScanConfig> for ScanSettings {
    fn from(config: &ScanConfig) -> Self {
        Self {
            page_size: config.page_size,
            keepalive_interval: Duration::from_secs(config.keepalive_secs),
            progress_every: config.progress_every,
            progress_interval: Duration::from_secs(config.progress_secs),
            retry_hint: Duration::from_millis(config.retry_ms),
            suffix: config.suffix.clone(),
            match_mode: config.match_mode,
            fallback: config.fallback,
        }
    }
}
