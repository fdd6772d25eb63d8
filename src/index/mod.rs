//! Index Extractor
//!
//! Fetches the archive index page once, turns each table row into an [`IssueRecord`](crate::types::IssueRecord) and
//! persists every record as its own file in the metadata store. Failing to fetch the page
//! aborts the stage before anything is written; a row that cannot be parsed is skipped and
//! reported.

mod parse;


pub use parse::{IndexParser, MIN_CELLS, ParsedIndex, parse_count, parse_date, parse_ordinal};

use crate::config::IndexConfig;
use crate::error::{Error, FetchError, Result};
use crate::store::MetadataStore;
use crate::transport::Transport;
use crate::types::{Event, IndexReport, RowWarning, Stage};
use crate::utils::ensure_writable_dir;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use url::Url;

/// Index Extractor stage
pub struct IndexExtractor {
    config: IndexConfig,
    transport: Arc<dyn Transport>,
    event_tx: broadcast::Sender<Event>,
}

impl IndexExtractor {
    /// Create the stage
    pub fn new(
        config: IndexConfig,
        transport: Arc<dyn Transport>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            config,
            transport,
            event_tx,
        }
    }

    /// Fetch, parse and persist the index
    pub async fn extract(&self) -> Result<IndexReport> {
        let _ = self.event_tx.send(Event::StageStarted {
            stage: Stage::Extract,
        });

        let base = Url::parse(&self.config.source_url).map_err(|e| {
            Error::config(
                "index.source_url",
                format!("invalid URL {:?}: {}", self.config.source_url, e),
            )
        })?;
        let store = MetadataStore::new(&self.config.metadata_dir);
        ensure_writable_dir(store.dir())?;

        info!(url = %base, "fetching index page");
        let html = self.fetch_page(base.as_str()).await?;

        let parser = IndexParser::new()?;
        let parsed = parser.parse(&html, &base)?;
        info!(
            rows = parsed.rows.len(),
            rejected = parsed.rejected.len(),
            "index parsed"
        );

        let report = self.persist(&store, parsed);

        let _ = self.event_tx.send(Event::StageFinished {
            stage: Stage::Extract,
            status: report.status(),
        });
        info!(
            saved = report.records.len(),
            warnings = report.warnings.len(),
            dir = ?report.metadata_dir,
            "index extraction finished"
        );
        Ok(report)
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let body = tokio::time::timeout(self.config.timeout, self.transport.get(url))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                after: self.config.timeout,
            })??;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn persist(&self, store: &MetadataStore, parsed: ParsedIndex) -> IndexReport {
        let mut report = IndexReport {
            metadata_dir: store.dir().to_path_buf(),
            ..Default::default()
        };

        for (row, error) in parsed.rejected {
            warn!(row, error = %error, "skipping index row");
            self.row_warning(&mut report, row, error.to_string());
        }

        for (row, record) in parsed.rows {
            match store.save(&record) {
                Ok(_) => {
                    let _ = self.event_tx.send(Event::RecordSaved {
                        ordinal: record.ordinal,
                    });
                    report.records.push(record);
                }
                Err(e) => {
                    warn!(row, ordinal = %record.ordinal, error = %e, "failed to save record");
                    self.row_warning(&mut report, row, e.to_string());
                }
            }
        }

        report.warnings.sort_by_key(|w| w.row);
        report
    }

    fn row_warning(&self, report: &mut IndexReport, row: usize, reason: String) {
        let _ = self.event_tx.send(Event::RowSkipped {
            row,
            reason: reason.clone(),
        });
        report.warnings.push(RowWarning { row, reason });
    }
}
