//! Metadata store: one JSON file per issue
//!
//! Files are named `twic_{ordinal:04}.json`, so re-running the extractor overwrites a record
//! instead of duplicating it. Writes go through a temporary `.part` file and a rename.

use crate::error::{Error, ParseError, Result};
use crate::types::{IssueRecord, Ordinal};
use crate::utils::write_atomic;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// File name of the metadata record for an issue
pub fn record_file_name(ordinal: Ordinal) -> String {
    format!("twic_{:04}.json", ordinal.get())
}

// The pattern is a literal; compiling it cannot fail
#[allow(clippy::unwrap_used)]
fn record_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^twic_(\d+)\.json$").unwrap())
}

/// Issue number encoded in a metadata file name
pub fn ordinal_from_record_name(name: &str) -> Option<Ordinal> {
    record_name_pattern()
        .captures(name)
        .and_then(|caps| caps[1].parse().ok())
        .map(Ordinal)
}

/// Directory of persisted issue records
#[derive(Clone, Debug)]
pub struct MetadataStore {
    dir: PathBuf,
}

impl MetadataStore {
    /// Store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for an issue
    pub fn path_for(&self, ordinal: Ordinal) -> PathBuf {
        self.dir.join(record_file_name(ordinal))
    }

    /// Write a record, replacing any earlier version
    pub fn save(&self, record: &IssueRecord) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let final_path = self.path_for(record.ordinal);
        let json = serde_json::to_string_pretty(record)?;
        write_atomic(&final_path, json.as_bytes())?;

        debug!(ordinal = %record.ordinal, path = ?final_path, "record saved");
        Ok(final_path)
    }

    /// Read one record back
    pub fn load(&self, path: &Path) -> Result<IssueRecord> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::Parse(ParseError::InvalidRecord {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })
    }

    /// Read every record, ordered by issue number
    ///
    /// A missing directory is fatal. Individual unreadable files are logged and skipped.
    pub fn load_all(&self) -> Result<Vec<IssueRecord>> {
        if !self.dir.is_dir() {
            return Err(Error::MissingInput(self.dir.clone()));
        }

        let mut records = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if ordinal_from_record_name(name).is_none() {
                continue;
            }

            match self.load(&path) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = ?path, error = %e, "skipping unreadable record"),
            }
        }

        records.sort_by_key(|r| r.ordinal);
        records.dedup_by_key(|r| r.ordinal);
        debug!(count = records.len(), dir = ?self.dir, "records loaded");
        Ok(records)
    }
}
