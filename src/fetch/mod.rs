//! Archive Fetcher
//!
//! Reads the persisted issue records, skips archives that are already on disk and downloads
//! the rest through a fixed pool of workers sharing one task queue. Each worker writes to a
//! task-private `.part` file and renames it into place only after the whole body arrived, so
//! an interrupted run never leaves a truncated archive under its final name.
//!
//! A download that keeps failing is reported and does not stop the others. The stage itself
//! only aborts when the record set cannot be read or the archive directory is unwritable.

mod worker;


use crate::archive::{ArchiveFormat, archive_file_name};
use crate::config::FetchConfig;
use crate::error::Result;
use crate::store::MetadataStore;
use crate::transport::Transport;
use crate::types::{ArchiveFile, Event, FetchReport, FetchStatus, IssueRecord, Stage};
use crate::utils::{ensure_writable_dir, non_empty_size, remove_partial_files};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, error, info};

use worker::{FetchTask, WorkerPool};

/// Archive Fetcher stage
pub struct ArchiveFetcher {
    pub(crate) config: FetchConfig,
    pub(crate) transport: Arc<dyn Transport>,
    event_tx: broadcast::Sender<Event>,
}

impl ArchiveFetcher {
    /// Create the stage
    pub fn new(
        config: FetchConfig,
        transport: Arc<dyn Transport>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            config,
            transport,
            event_tx,
        }
    }

    /// Final location of an issue's archive
    pub fn archive_path(&self, record: &IssueRecord) -> Option<PathBuf> {
        let url = record.archive_link.as_deref()?;
        let name = archive_file_name(record.ordinal, ArchiveFormat::from_url(url));
        Some(self.config.archive_dir.join(name))
    }

    /// Load every record from the metadata store and fetch its archive
    pub async fn run(self: &Arc<Self>, store: &MetadataStore) -> Result<FetchReport> {
        let records = store.load_all()?;
        info!(records = records.len(), dir = ?store.dir(), "loaded issue records");
        self.fetch_all(&records).await
    }

    /// Fetch the archives of `records`
    pub async fn fetch_all(self: &Arc<Self>, records: &[IssueRecord]) -> Result<FetchReport> {
        let _ = self.event_tx.send(Event::StageStarted {
            stage: Stage::Fetch,
        });

        let dir = &self.config.archive_dir;
        ensure_writable_dir(dir)?;
        let stale = remove_partial_files(dir)?;
        if stale > 0 {
            info!(stale, "removed partial downloads from an earlier run");
        }

        let (mut report, queue) = self.plan(records);
        let queued = queue.len();
        info!(
            total = report.total,
            queued,
            skipped = report.skipped,
            missing_link = report.missing_link,
            workers = self.config.max_concurrent.min(queued),
            "starting downloads"
        );

        if queued > 0 {
            let pool = Arc::new(WorkerPool {
                queue: Mutex::new(queue),
                report: Mutex::new(std::mem::take(&mut report)),
                queued,
                event_tx: self.event_tx.clone(),
            });

            let workers = self.config.max_concurrent.max(1).min(queued);
            let handles: Vec<_> = (0..workers)
                .map(|worker| tokio::spawn(Arc::clone(self).run_worker(worker, Arc::clone(&pool))))
                .collect();

            for result in futures::future::join_all(handles).await {
                if let Err(e) = result {
                    error!(error = %e, "download worker panicked");
                }
            }

            report = std::mem::take(&mut *pool.report.lock().await);
        }

        report.archives.sort_by_key(|a| a.ordinal);
        report.failures.sort_by_key(|f| f.ordinal);

        let _ = self.event_tx.send(Event::StageFinished {
            stage: Stage::Fetch,
            status: report.status(),
        });
        info!(
            total = report.total,
            downloaded = report.succeeded,
            skipped = report.skipped,
            missing_link = report.missing_link,
            failed = report.failed,
            dir = ?dir,
            "download summary"
        );
        Ok(report)
    }

    /// Split records into already-present archives and download tasks
    fn plan(&self, records: &[IssueRecord]) -> (FetchReport, VecDeque<FetchTask>) {
        let mut report = FetchReport {
            total: records.len(),
            ..Default::default()
        };
        let mut queue = VecDeque::new();

        for record in records {
            let (Some(url), Some(path)) = (record.archive_link.as_deref(), self.archive_path(record))
            else {
                debug!(ordinal = %record.ordinal, "no archive link");
                report.missing_link += 1;
                continue;
            };

            if let Some(size) = non_empty_size(&path) {
                debug!(ordinal = %record.ordinal, path = ?path, "archive already present");
                report.skipped += 1;
                report.archives.push(ArchiveFile {
                    ordinal: record.ordinal,
                    url: url.to_string(),
                    path,
                    size,
                    status: FetchStatus::Succeeded,
                    attempts: 0,
                });
                let _ = self.event_tx.send(Event::ArchiveSkipped {
                    ordinal: record.ordinal,
                });
                continue;
            }

            queue.push_back(FetchTask {
                ordinal: record.ordinal,
                url: url.to_string(),
                path,
            });
        }

        (report, queue)
    }
}
