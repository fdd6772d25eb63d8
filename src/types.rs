//! Core types for twic-dl

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Issue number assigned by the source archive; the only stable key of a record
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ordinal(pub u32);

impl Ordinal {
    /// Create a new Ordinal
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the inner value
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl From<u32> for Ordinal {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Ordinal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Ordinal {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Kind of link published for an issue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// HTML page of the issue
    Detail,
    /// Compressed PGN download
    Archive,
    /// ChessBase (CBV) download
    Companion,
}

/// One row of the source index
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    /// Issue number
    pub ordinal: Ordinal,
    /// Text of the issue cell as displayed on the page
    pub label: String,
    /// Publication date
    pub date: NaiveDate,
    /// Link to the HTML issue page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_link: Option<String>,
    /// Link to the PGN archive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_link: Option<String>,
    /// Link to the CBV archive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companion_link: Option<String>,
    /// Number of games, when the page reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games: Option<u32>,
    /// Number of news stories, when the page reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stories: Option<u32>,
}

impl IssueRecord {
    /// Link of the given kind, if published
    pub fn link(&self, kind: ResourceKind) -> Option<&str> {
        match kind {
            ResourceKind::Detail => self.detail_link.as_deref(),
            ResourceKind::Archive => self.archive_link.as_deref(),
            ResourceKind::Companion => self.companion_link.as_deref(),
        }
    }
}

/// Fetch status of an archive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    /// Queued, not attempted yet
    Pending,
    /// Written under its final name (this run or an earlier one)
    Succeeded,
    /// All attempts failed
    Failed,
}

/// One downloaded archive corresponding to one issue's archive link
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveFile {
    /// Issue this archive belongs to
    pub ordinal: Ordinal,
    /// Source URL
    pub url: String,
    /// Final location on disk
    pub path: PathBuf,
    /// Size in bytes (0 unless succeeded)
    pub size: u64,
    /// Fetch status
    pub status: FetchStatus,
    /// Attempts made in this run (0 when skipped as already present)
    pub attempts: u32,
}

/// Overall outcome of a stage that did not abort
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Every unit of work completed
    Success,
    /// Some rows, downloads or archives were skipped or failed
    PartialFailure,
}

/// Pipeline stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Index Extractor
    Extract,
    /// Archive Fetcher
    Fetch,
    /// Combiner
    Combine,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Extract => write!(f, "extract"),
            Stage::Fetch => write!(f, "fetch"),
            Stage::Combine => write!(f, "combine"),
        }
    }
}

/// A skipped index row
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RowWarning {
    /// Zero-based row position within the table body
    pub row: usize,
    /// Why the row was skipped
    pub reason: String,
}

/// Result of an Index Extractor run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IndexReport {
    /// Records parsed and persisted, in page order
    pub records: Vec<IssueRecord>,
    /// Rows skipped because mandatory columns could not be parsed
    pub warnings: Vec<RowWarning>,
    /// Directory the records were written to
    pub metadata_dir: PathBuf,
}

impl IndexReport {
    /// Success unless rows had to be skipped
    pub fn status(&self) -> StageStatus {
        if self.warnings.is_empty() {
            StageStatus::Success
        } else {
            StageStatus::PartialFailure
        }
    }
}

/// A download that exhausted its attempts
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchFailure {
    /// Issue number
    pub ordinal: Ordinal,
    /// Source URL
    pub url: String,
    /// Last error seen
    pub error: String,
    /// Attempts made
    pub attempts: u32,
}

/// Result of an Archive Fetcher run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FetchReport {
    /// Records read from the metadata store
    pub total: usize,
    /// Archives downloaded in this run
    pub succeeded: usize,
    /// Archives already present and left untouched
    pub skipped: usize,
    /// Records without an archive link
    pub missing_link: usize,
    /// Downloads that exhausted their attempts
    pub failed: usize,
    /// Details of every failed download, ordered by issue number
    pub failures: Vec<FetchFailure>,
    /// Every archive handled in this run, ordered by issue number
    pub archives: Vec<ArchiveFile>,
}

impl FetchReport {
    /// Success unless a download failed
    pub fn status(&self) -> StageStatus {
        if self.failed == 0 {
            StageStatus::Success
        } else {
            StageStatus::PartialFailure
        }
    }

    /// Archive entry for an issue
    pub fn archive(&self, ordinal: Ordinal) -> Option<&ArchiveFile> {
        self.archives.iter().find(|a| a.ordinal == ordinal)
    }
}

/// An archive the Combiner could not merge
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveSkip {
    /// Archive path
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: String,
}

/// Result of a Combiner run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CombineReport {
    /// Archives appended in this run
    pub merged: usize,
    /// Archives already present in the output from an earlier run
    pub already_merged: usize,
    /// Archives skipped as malformed
    pub skipped: Vec<ArchiveSkip>,
    /// Archives represented in the output after this run
    pub total_records: usize,
    /// Bytes appended in this run
    pub bytes_written: u64,
    /// Size of the output after this run
    pub final_size: u64,
    /// Output file
    pub output_path: PathBuf,
}

impl CombineReport {
    /// Success unless an archive was skipped
    pub fn status(&self) -> StageStatus {
        if self.skipped.is_empty() {
            StageStatus::Success
        } else {
            StageStatus::PartialFailure
        }
    }
}

/// Event emitted while the pipeline runs
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Stage started
    StageStarted {
        /// Stage
        stage: Stage,
    },

    /// Index record written to the metadata store
    RecordSaved {
        /// Issue number
        ordinal: Ordinal,
    },

    /// Index row skipped
    RowSkipped {
        /// Row position
        row: usize,
        /// Reason
        reason: String,
    },

    /// Archive already on disk
    ArchiveSkipped {
        /// Issue number
        ordinal: Ordinal,
    },

    /// Archive written under its final name
    ArchiveDownloaded {
        /// Issue number
        ordinal: Ordinal,
        /// Size in bytes
        bytes: u64,
        /// Attempts used
        attempts: u32,
    },

    /// Archive download gave up
    ArchiveFailed {
        /// Issue number
        ordinal: Ordinal,
        /// Last error
        error: String,
    },

    /// Archive appended to the master database
    ArchiveMerged {
        /// Issue number
        ordinal: Ordinal,
        /// Bytes appended
        bytes: u64,
    },

    /// Archive could not be merged
    ArchiveMalformed {
        /// Archive path
        path: PathBuf,
        /// Reason
        reason: String,
    },

    /// Periodic Combiner progress
    CombineProgress {
        /// Archives represented in the output so far
        records: usize,
        /// Output size so far
        bytes: u64,
    },

    /// Stage finished without aborting
    StageFinished {
        /// Stage
        stage: Stage,
        /// Outcome
        status: StageStatus,
    },
}
