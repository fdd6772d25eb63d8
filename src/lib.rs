//! # twic-dl
//!
//! Harvester for The Week in Chess archive: reads the issue index, downloads every weekly
//! PGN archive and merges them into one master database.
//!
//! ## Pipeline
//!
//! The three stages only talk to each other through directories on disk, so each can run on
//! its own and every stage is safe to rerun:
//! - **Index Extractor** - parses the index table into one JSON record per issue
//! - **Archive Fetcher** - downloads missing archives with bounded concurrency and retries
//! - **Combiner** - appends each archive's games to the master file in issue order
//!
//! ## Quick Start
//!
//! ```no_run
//! use twic_dl::{Config, Harvester};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let harvester = Harvester::new(Config::default())?;
//!
//!     let mut events = harvester.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = harvester.run().await?;
//!     println!("{} issues in {}", report.combine.total_records, report.combine.output_path.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive file naming
pub mod archive;
/// Combiner stage
pub mod combine;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Archive Fetcher stage
pub mod fetch;
/// Pipeline entry point
pub mod harvester;
/// Index Extractor stage
pub mod index;
/// Retry logic with exponential backoff
pub mod retry;
/// Issue record persistence
pub mod store;
/// HTTP transport
pub mod transport;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use combine::Combiner;
pub use config::{CombineConfig, Config, FetchConfig, IndexConfig, RetryConfig};
pub use error::{Error, FetchError, MalformedArchiveError, ParseError, Result};
pub use fetch::ArchiveFetcher;
pub use harvester::{Harvester, PipelineReport};
pub use index::IndexExtractor;
pub use store::MetadataStore;
pub use transport::{HttpTransport, Transport};
pub use types::{
    ArchiveFile, CombineReport, Event, FetchReport, FetchStatus, IndexReport, IssueRecord,
    Ordinal, Stage, StageStatus,
};

/// Wait for SIGTERM or SIGINT (Ctrl+C elsewhere)
///
/// Every stage commits its work atomically, so a caller can simply stop on this signal and
/// a later run picks up where this one ended.
pub async fn shutdown_signal() {
    wait_for_signal().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
