//! Test configuration helpers pointing every stage at a temporary directory

use std::path::Path;
use std::time::Duration;
use twic_dl::Config;

/// Configuration for a mock server at `server_uri` with all output under `root`
///
/// Retries are fast and unjittered so failure scenarios finish quickly.
pub fn test_config(root: &Path, server_uri: &str) -> Config {
    let mut config = Config::default();
    config.index.source_url = format!("{}/twic", server_uri);
    config.index.metadata_dir = root.join("twic_data");
    config.index.timeout = Duration::from_secs(5);
    config.fetch.archive_dir = root.join("twic_pgns");
    config.fetch.max_concurrent = 3;
    config.fetch.request_timeout = Duration::from_secs(5);
    config.fetch.request_spacing = Duration::ZERO;
    config.fetch.retry.initial_delay = Duration::from_millis(10);
    config.fetch.retry.jitter = false;
    config.combine.output_path = root.join("twic_master.pgn");
    config
}
