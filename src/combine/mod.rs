//! Combiner
//!
//! Appends the PGN payload of every downloaded archive to the master database in ascending
//! issue order. After each block the sidecar marker records which issues the output holds and
//! how long it was at that point, so an interrupted run resumes where it stopped and a rerun
//! over the same archives leaves the output byte-identical.
//!
//! A run starts over from an empty output when the marker is missing or unreadable, when the
//! output is shorter than the committed length, or when a mergeable archive sorts before an
//! issue that is already in the output. Anything past the committed length is discarded.

mod payload;
mod progress;


pub use payload::{decode_payload, read_payload};
pub use progress::ProgressMarker;

use crate::archive::{ArchiveFormat, parse_archive_name};
use crate::config::CombineConfig;
use crate::error::{Error, MalformedArchiveError, Result};
use crate::types::{ArchiveSkip, CombineReport, Event, Ordinal, Stage};
use crate::utils::ensure_writable_dir;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Written after every payload; games of neighbouring issues end up one blank line apart
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// Archive found in the archive directory
#[derive(Clone, Debug)]
struct LocalArchive {
    ordinal: Ordinal,
    format: ArchiveFormat,
    path: PathBuf,
}

/// Combiner stage
pub struct Combiner {
    config: CombineConfig,
    archive_dir: PathBuf,
    event_tx: broadcast::Sender<Event>,
}

impl Combiner {
    /// Create the stage for the archives in `archive_dir`
    pub fn new(
        archive_dir: impl Into<PathBuf>,
        config: CombineConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            config,
            archive_dir: archive_dir.into(),
            event_tx,
        }
    }

    /// Merge every archive into the output file
    ///
    /// Blocking; async callers should run it on the blocking pool.
    pub fn combine(&self) -> Result<CombineReport> {
        let _ = self.event_tx.send(Event::StageStarted {
            stage: Stage::Combine,
        });

        if !self.archive_dir.is_dir() {
            return Err(Error::MissingInput(self.archive_dir.clone()));
        }

        let output = &self.config.output_path;
        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        ensure_writable_dir(parent)?;

        let output_key = std::fs::canonicalize(output).ok();
        let (archives, skipped) = self.scan(output_key.as_deref())?;
        info!(archives = archives.len(), dir = ?self.archive_dir, "found archives");

        let marker_path = ProgressMarker::path_for(output);
        let (mut file, mut marker) = open_output(output, &marker_path, &archives)?;

        let progress_interval = self.config.progress_interval.max(1);
        let mut report = CombineReport {
            skipped,
            output_path: output.clone(),
            ..Default::default()
        };

        for archive in &archives {
            if marker.merged.contains(&archive.ordinal) {
                report.already_merged += 1;
                continue;
            }

            let text = match read_payload(&archive.path, archive.format) {
                Ok(text) => text,
                Err(e) => {
                    warn!(ordinal = %archive.ordinal, error = %e, "skipping malformed archive");
                    self.skip(&mut report.skipped, &archive.path, e.to_string());
                    continue;
                }
            };

            let block = format!("{text}{BLOCK_SEPARATOR}");
            file.write_all(block.as_bytes())?;
            let bytes = block.len() as u64;

            marker.bytes += bytes;
            marker.merged.insert(archive.ordinal);
            marker.save(&marker_path)?;

            report.merged += 1;
            report.bytes_written += bytes;
            debug!(ordinal = %archive.ordinal, bytes, "merged archive");
            let _ = self.event_tx.send(Event::ArchiveMerged {
                ordinal: archive.ordinal,
                bytes,
            });

            if report.merged % progress_interval == 0 {
                info!(
                    records = marker.merged.len(),
                    bytes = marker.bytes,
                    "combine progress"
                );
                let _ = self.event_tx.send(Event::CombineProgress {
                    records: marker.merged.len(),
                    bytes: marker.bytes,
                });
            }
        }

        file.sync_all()?;
        report.total_records = marker.merged.len();
        report.final_size = file.metadata()?.len();

        let _ = self.event_tx.send(Event::StageFinished {
            stage: Stage::Combine,
            status: report.status(),
        });
        info!(
            merged = report.merged,
            already_merged = report.already_merged,
            skipped = report.skipped.len(),
            total_records = report.total_records,
            final_size = report.final_size,
            output = ?output,
            "combine summary"
        );
        Ok(report)
    }

    /// Archives in ascending issue order, plus the ones that cannot be placed in that order
    ///
    /// `output` is the canonical output path when it exists; that file is never an archive.
    fn scan(&self, output: Option<&Path>) -> Result<(Vec<LocalArchive>, Vec<ArchiveSkip>)> {
        let mut found = Vec::new();
        let mut skipped = Vec::new();
        for entry in std::fs::read_dir(&self.archive_dir)? {
            let path = entry?.path();
            if !path.is_file() || is_same_file(&path, output) {
                continue;
            }
            match parse_archive_name(&path) {
                Some((ordinal, format)) => found.push(LocalArchive {
                    ordinal,
                    format,
                    path,
                }),
                None if looks_like_archive(&path) => {
                    let e = MalformedArchiveError::UnknownName { path: path.clone() };
                    warn!(error = %e, "skipping archive without an issue number");
                    self.skip(&mut skipped, &path, e.to_string());
                }
                None => debug!(path = ?path, "ignoring unrelated file"),
            }
        }
        found.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.path.cmp(&b.path)));

        let mut archives: Vec<LocalArchive> = Vec::with_capacity(found.len());
        for archive in found {
            if archives.last().is_some_and(|prev| prev.ordinal == archive.ordinal) {
                let reason = format!("another archive for issue {} is merged", archive.ordinal);
                warn!(path = ?archive.path, "{reason}");
                self.skip(&mut skipped, &archive.path, reason);
                continue;
            }
            archives.push(archive);
        }
        Ok((archives, skipped))
    }

    fn skip(&self, skipped: &mut Vec<ArchiveSkip>, path: &Path, reason: String) {
        let _ = self.event_tx.send(Event::ArchiveMalformed {
            path: path.to_path_buf(),
            reason: reason.clone(),
        });
        skipped.push(ArchiveSkip {
            path: path.to_path_buf(),
            reason,
        });
    }
}

fn is_same_file(path: &Path, canonical: Option<&Path>) -> bool {
    canonical.is_some_and(|c| {
        c.file_name() == path.file_name() && std::fs::canonicalize(path).is_ok_and(|p| p == c)
    })
}

fn looks_like_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip") || ext.eq_ignore_ascii_case("pgn"))
}

/// Open the output positioned at its committed end, starting over when resuming is unsafe
fn open_output(
    output: &Path,
    marker_path: &Path,
    archives: &[LocalArchive],
) -> Result<(File, ProgressMarker)> {
    if let Some(marker) = ProgressMarker::load(marker_path) {
        if let Some(file) = resume_output(output, &marker, archives)? {
            return Ok((file, marker));
        }
    }

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(output)?;
    let marker = ProgressMarker::default();
    marker.save(marker_path)?;
    Ok((file, marker))
}

fn resume_output(
    output: &Path,
    marker: &ProgressMarker,
    archives: &[LocalArchive],
) -> Result<Option<File>> {
    let Ok(len) = std::fs::metadata(output).map(|m| m.len()) else {
        info!(output = ?output, "output missing, rebuilding");
        return Ok(None);
    };

    if len < marker.bytes {
        info!(len, committed = marker.bytes, "output shorter than committed, rebuilding");
        return Ok(None);
    }

    if let Some(last) = marker.last() {
        let earlier = archives.iter().find(|a| {
            a.ordinal < last
                && !marker.merged.contains(&a.ordinal)
                && read_payload(&a.path, a.format).is_ok()
        });
        if let Some(archive) = earlier {
            info!(ordinal = %archive.ordinal, last = %last, "new archive precedes merged issues, rebuilding");
            return Ok(None);
        }
    }

    let mut file = OpenOptions::new().write(true).open(output)?;
    if len > marker.bytes {
        warn!(discarded = len - marker.bytes, "discarding uncommitted output tail");
        file.set_len(marker.bytes)?;
    }
    file.seek(SeekFrom::End(0))?;
    info!(records = marker.merged.len(), bytes = marker.bytes, "resuming combine");
    Ok(Some(file))
}
