//! Archive naming convention
//!
//! Archives are stored as `twic{ordinal:04}.zip`, or `twic{ordinal:04}.pgn` when the index
//! links a bare PGN file. The name alone identifies the issue, which is what makes fetching
//! idempotent and lets the Combiner order archives without trusting directory order.

use crate::types::Ordinal;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Container format of a downloaded archive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// Zip container holding one PGN file
    Zip,
    /// Plain PGN file
    Pgn,
}

impl ArchiveFormat {
    /// File extension used on disk
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Pgn => "pgn",
        }
    }

    /// Format implied by a download URL; anything that is not a `.pgn` is treated as zip
    pub fn from_url(url: &str) -> Self {
        let path = url::Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| url.to_string());
        if path.to_ascii_lowercase().ends_with(".pgn") {
            ArchiveFormat::Pgn
        } else {
            ArchiveFormat::Zip
        }
    }
}

/// File name of the archive for an issue
///
/// # Examples
///
/// ```
/// use twic_dl::archive::{ArchiveFormat, archive_file_name};
/// use twic_dl::types::Ordinal;
///
/// assert_eq!(archive_file_name(Ordinal(921), ArchiveFormat::Zip), "twic0921.zip");
/// assert_eq!(archive_file_name(Ordinal(1612), ArchiveFormat::Pgn), "twic1612.pgn");
/// ```
pub fn archive_file_name(ordinal: Ordinal, format: ArchiveFormat) -> String {
    format!("twic{:04}.{}", ordinal.get(), format.extension())
}

// The pattern is a literal; compiling it cannot fail
#[allow(clippy::unwrap_used)]
fn archive_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^twic(\d+)\.(zip|pgn)$").unwrap())
}

/// Issue number and format encoded in an archive path
pub fn parse_archive_name(path: &Path) -> Option<(Ordinal, ArchiveFormat)> {
    let name = path.file_name()?.to_str()?;
    let caps = archive_name_pattern().captures(name)?;
    let ordinal = caps[1].parse().ok().map(Ordinal)?;
    let format = match &caps[2] {
        "pgn" => ArchiveFormat::Pgn,
        _ => ArchiveFormat::Zip,
    };
    Some((ordinal, format))
}
