//! Configuration types for twic-dl
//!
//! Every stage takes its directories and knobs from [`Config`] explicitly, so each stage is a
//! function of its configuration and on-disk inputs. All fields have defaults; a JSON file
//! only needs to name the values it changes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default index page of The Week in Chess
pub const DEFAULT_SOURCE_URL: &str = "https://theweekinchess.com/twic";

/// The source site rejects requests without a browser-like agent
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Index Extractor settings
    #[serde(default)]
    pub index: IndexConfig,

    /// Archive Fetcher settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Combiner settings
    #[serde(default)]
    pub combine: CombineConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.index.source_url).map_err(|e| {
            Error::config(
                "index.source_url",
                format!("invalid URL {:?}: {}", self.index.source_url, e),
            )
        })?;

        if self.fetch.max_concurrent == 0 {
            return Err(Error::config("fetch.max_concurrent", "must be at least 1"));
        }
        if self.fetch.retry.max_attempts == 0 {
            return Err(Error::config(
                "fetch.retry.max_attempts",
                "must be at least 1",
            ));
        }
        let multiplier = self.fetch.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(Error::config(
                "fetch.retry.backoff_multiplier",
                format!("must be a finite number >= 1.0, got {}", multiplier),
            ));
        }
        if self.combine.progress_interval == 0 {
            return Err(Error::config(
                "combine.progress_interval",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Index Extractor configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index page URL (default: The Week in Chess archive page)
    #[serde(default = "default_source_url")]
    pub source_url: String,

    /// Directory receiving one JSON file per issue (default: "./twic_data")
    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: PathBuf,

    /// Timeout for the index page request (default: 30 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            metadata_dir: default_metadata_dir(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Archive Fetcher configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Directory receiving downloaded archives (default: "./twic_pgns")
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Number of download workers (default: 5)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Per-request timeout; a hung download fails after this long (default: 30 seconds)
    #[serde(default = "default_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Minimum pause between two requests of the same worker (default: 250ms)
    #[serde(default = "default_request_spacing", with = "duration_ms_serde")]
    pub request_spacing: Duration,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            archive_dir: default_archive_dir(),
            max_concurrent: default_max_concurrent(),
            request_timeout: default_timeout(),
            request_spacing: default_request_spacing(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient download failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per download, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    pub initial_delay: Duration,

    /// Upper bound for the delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Growth factor applied to the delay after each retry (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Combiner configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CombineConfig {
    /// Master database file (default: "./twic_master.pgn")
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Emit a progress report every N merged archives (default: 25)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            progress_interval: default_progress_interval(),
        }
    }
}

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_metadata_dir() -> PathBuf {
    PathBuf::from("twic_data")
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("twic_pgns")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("twic_master.pgn")
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_request_spacing() -> Duration {
    Duration::from_millis(250)
}

fn default_max_concurrent() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_progress_interval() -> usize {
    25
}

fn default_true() -> bool {
    true
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
