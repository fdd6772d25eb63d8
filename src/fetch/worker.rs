//! Download workers draining the shared task queue

use crate::error::{Error, FetchError};
use crate::retry::{Retried, download_with_retry};
use crate::types::{ArchiveFile, Event, FetchFailure, FetchReport, FetchStatus, Ordinal};
use crate::utils::write_atomic_async;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use super::ArchiveFetcher;

/// One archive to download
#[derive(Clone, Debug)]
pub(crate) struct FetchTask {
    pub(crate) ordinal: Ordinal,
    pub(crate) url: String,
    pub(crate) path: PathBuf,
}

/// State shared by all workers of one run
pub(crate) struct WorkerPool {
    pub(crate) queue: Mutex<VecDeque<FetchTask>>,
    pub(crate) report: Mutex<FetchReport>,
    pub(crate) queued: usize,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl ArchiveFetcher {
    /// Worker loop: take tasks until the queue is empty
    pub(crate) async fn run_worker(self: Arc<Self>, worker: usize, pool: Arc<WorkerPool>) {
        let spacing = self.config.request_spacing;
        let mut handled = 0usize;

        loop {
            let task = { pool.queue.lock().await.pop_front() };
            let Some(task) = task else {
                break;
            };

            if handled > 0 && !spacing.is_zero() {
                tokio::time::sleep(spacing).await;
            }
            handled += 1;

            debug!(worker, ordinal = %task.ordinal, url = %task.url, "download started");
            let archive = self.download(&task).await;
            pool.record(archive, &task).await;
        }

        debug!(worker, handled, "worker finished");
    }

    /// Download one archive with retry, writing it under its final name only on success
    async fn download(&self, task: &FetchTask) -> Result<Retried<u64>, Retried<Error>> {
        let transport = &*self.transport;
        let timeout = self.config.request_timeout;
        let url = task.url.as_str();
        let path = task.path.as_path();

        download_with_retry(&self.config.retry, move || async move {
            fetch_to_disk(transport, url, path, timeout).await
        })
        .await
    }
}

async fn fetch_to_disk(
    transport: &dyn crate::transport::Transport,
    url: &str,
    path: &Path,
    timeout: std::time::Duration,
) -> Result<u64, Error> {
    let body = tokio::time::timeout(timeout, transport.get(url))
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.to_string(),
            after: timeout,
        })??;

    if body.is_empty() {
        return Err(FetchError::Body {
            url: url.to_string(),
            reason: "empty response".to_string(),
        }
        .into());
    }

    write_atomic_async(path, &body).await?;
    Ok(body.len() as u64)
}

impl WorkerPool {
    /// Fold one finished task into the shared report
    async fn record(&self, outcome: Result<Retried<u64>, Retried<Error>>, task: &FetchTask) {
        let mut report = self.report.lock().await;

        let archive = match outcome {
            Ok(Retried {
                value: size,
                attempts,
            }) => {
                report.succeeded += 1;
                let done = report.succeeded + report.failed;
                info!(
                    ordinal = %task.ordinal,
                    bytes = size,
                    attempts,
                    done,
                    queued = self.queued,
                    "archive downloaded"
                );
                let _ = self.event_tx.send(Event::ArchiveDownloaded {
                    ordinal: task.ordinal,
                    bytes: size,
                    attempts,
                });
                ArchiveFile {
                    ordinal: task.ordinal,
                    url: task.url.clone(),
                    path: task.path.clone(),
                    size,
                    status: FetchStatus::Succeeded,
                    attempts,
                }
            }
            Err(Retried { value: e, attempts }) => {
                report.failed += 1;
                let done = report.succeeded + report.failed;
                warn!(
                    ordinal = %task.ordinal,
                    error = %e,
                    attempts,
                    done,
                    queued = self.queued,
                    "archive download failed"
                );
                let _ = self.event_tx.send(Event::ArchiveFailed {
                    ordinal: task.ordinal,
                    error: e.to_string(),
                });
                report.failures.push(FetchFailure {
                    ordinal: task.ordinal,
                    url: task.url.clone(),
                    error: e.to_string(),
                    attempts,
                });
                ArchiveFile {
                    ordinal: task.ordinal,
                    url: task.url.clone(),
                    path: task.path.clone(),
                    size: 0,
                    status: FetchStatus::Failed,
                    attempts,
                }
            }
        };

        report.archives.push(archive);
    }
}
