//! Pipeline entry point tying the three stages to one configuration

use crate::combine::Combiner;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::ArchiveFetcher;
use crate::index::IndexExtractor;
use crate::store::MetadataStore;
use crate::transport::{HttpTransport, Transport};
use crate::types::{CombineReport, Event, FetchReport, IndexReport, StageStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Reports of a full extract, fetch and combine run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Index Extractor report
    pub index: IndexReport,
    /// Archive Fetcher report
    pub fetch: FetchReport,
    /// Combiner report
    pub combine: CombineReport,
}

impl PipelineReport {
    /// Partial failure if any stage reported one
    pub fn status(&self) -> StageStatus {
        let statuses = [
            self.index.status(),
            self.fetch.status(),
            self.combine.status(),
        ];
        if statuses.contains(&StageStatus::PartialFailure) {
            StageStatus::PartialFailure
        } else {
            StageStatus::Success
        }
    }
}

/// Runs the stages against a shared configuration and event channel
///
/// Stages only communicate through the metadata and archive directories, so each one can
/// also run on its own in a later process.
pub struct Harvester {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    event_tx: broadcast::Sender<Event>,
}

impl Harvester {
    /// Validate `config` and set up an HTTP transport
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let timeout = config.index.timeout.max(config.fetch.request_timeout);
        let transport = HttpTransport::new(timeout, &config.index.user_agent)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Use a caller-provided transport
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Self {
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            config: Arc::new(config),
            transport,
            event_tx,
        }
    }

    /// Subscribe to pipeline events
    ///
    /// Events sent before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch the index page and persist one record per issue
    pub async fn extract_index(&self) -> Result<IndexReport> {
        IndexExtractor::new(
            self.config.index.clone(),
            Arc::clone(&self.transport),
            self.event_tx.clone(),
        )
        .extract()
        .await
    }

    /// Download the archives of every persisted record
    pub async fn fetch_archives(&self) -> Result<FetchReport> {
        let store = MetadataStore::new(self.config.index.metadata_dir.clone());
        let fetcher = Arc::new(ArchiveFetcher::new(
            self.config.fetch.clone(),
            Arc::clone(&self.transport),
            self.event_tx.clone(),
        ));
        fetcher.run(&store).await
    }

    /// Merge downloaded archives into the master database
    pub async fn combine_archives(&self) -> Result<CombineReport> {
        let combiner = Combiner::new(
            self.config.fetch.archive_dir.clone(),
            self.config.combine.clone(),
            self.event_tx.clone(),
        );
        tokio::task::spawn_blocking(move || combiner.combine())
            .await
            .map_err(|e| Error::Other(format!("combine task failed: {}", e)))?
    }

    /// Run all three stages in order, stopping at the first fatal error
    pub async fn run(&self) -> Result<PipelineReport> {
        let index = self.extract_index().await?;
        let fetch = self.fetch_archives().await?;
        let combine = self.combine_archives().await?;
        Ok(PipelineReport {
            index,
            fetch,
            combine,
        })
    }
}
