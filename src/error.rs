//! Error types for twic-dl
//!
//! Errors are split by the scope they affect:
//! - [`FetchError`] for network, timeout and HTTP status failures
//! - [`ParseError`] for index rows and metadata records that cannot be understood
//! - [`MalformedArchiveError`] for downloaded archives without exactly one payload
//!
//! Row-, task- and archive-scoped failures are recorded in the stage reports.
//! Anything that reaches the caller as an [`Error`] aborted the whole stage.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for twic-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for twic-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "fetch.max_concurrent")
        key: Option<String>,
    },

    /// Network, timeout or HTTP status failure
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Index page or metadata record could not be parsed
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Archive could not be opened or has an unexpected layout
    #[error("malformed archive: {0}")]
    MalformedArchive(#[from] MalformedArchiveError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stage input (metadata or archive directory) does not exist
    #[error("input not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// A stage output location cannot be written
    #[error("cannot write to {}: {reason}", path.display())]
    Unwritable {
        /// Directory or file that failed the write check
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Network-level failures while fetching a URL
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Request did not complete in time
    #[error("timeout fetching {url} (exceeded {}s)", after.as_secs())]
    Timeout {
        /// Requested URL
        url: String,
        /// Configured timeout that elapsed
        after: Duration,
    },

    /// Connection could not be established
    #[error("connection failed for {url}: {reason}")]
    Connect {
        /// Requested URL
        url: String,
        /// Underlying cause
        reason: String,
    },

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Any other request failure (invalid URL, redirect loop, TLS, ...)
    #[error("request to {url} failed: {reason}")]
    Request {
        /// Requested URL
        url: String,
        /// Underlying cause
        reason: String,
    },

    /// Response body could not be read to completion
    #[error("failed to read body from {url}: {reason}")]
    Body {
        /// Requested URL
        url: String,
        /// Underlying cause
        reason: String,
    },
}

impl FetchError {
    /// Classify a reqwest error for the given URL
    pub fn from_reqwest(url: &str, error: &reqwest::Error, timeout: Duration) -> Self {
        let url = url.to_string();
        if error.is_timeout() {
            FetchError::Timeout {
                url,
                after: timeout,
            }
        } else if error.is_connect() {
            FetchError::Connect {
                url,
                reason: error.to_string(),
            }
        } else if let Some(status) = error.status() {
            FetchError::Status {
                url,
                status: status.as_u16(),
            }
        } else if error.is_body() || error.is_decode() {
            FetchError::Body {
                url,
                reason: error.to_string(),
            }
        } else {
            FetchError::Request {
                url,
                reason: error.to_string(),
            }
        }
    }
}

/// Row- or record-scoped parse failures
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// The index page has no table at all
    #[error("no table found on the index page")]
    NoTable,

    /// First cell carries no issue number
    #[error("row {row}: no issue number in {text:?}")]
    MissingOrdinal {
        /// Zero-based row position within the table body
        row: usize,
        /// Text of the first cell
        text: String,
    },

    /// Date cell is not in any recognised format
    #[error("row {row}: unrecognised date {value:?}")]
    InvalidDate {
        /// Zero-based row position within the table body
        row: usize,
        /// Raw date text
        value: String,
    },

    /// Issue number already seen earlier on the same page
    #[error("row {row}: duplicate issue number {ordinal}")]
    DuplicateOrdinal {
        /// Zero-based row position within the table body
        row: usize,
        /// Repeated issue number
        ordinal: u32,
    },

    /// A persisted metadata record could not be read back
    #[error("invalid record {}: {reason}", path.display())]
    InvalidRecord {
        /// Metadata file
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },
}

/// Archive-scoped failures during combining
#[derive(Debug, Clone, Error)]
pub enum MalformedArchiveError {
    /// File could not be opened as a zip container
    #[error("cannot open {}: {reason}", path.display())]
    Open {
        /// Archive path
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// No PGN entry inside the container
    #[error("no PGN payload in {}", path.display())]
    NoPayload {
        /// Archive path
        path: PathBuf,
    },

    /// More than one PGN entry inside the container
    #[error("{count} PGN payloads in {}, expected exactly one", path.display())]
    MultiplePayloads {
        /// Archive path
        path: PathBuf,
        /// Number of candidate entries found
        count: usize,
    },

    /// Payload could not be decompressed
    #[error("failed to decompress {}: {reason}", path.display())]
    Decompress {
        /// Archive path
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// File name does not follow the archive naming convention
    #[error("{} does not carry an issue number", path.display())]
    UnknownName {
        /// Archive path
        path: PathBuf,
    },
}

impl Error {
    /// Build a configuration error for the given key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
