//! Sidecar resume marker for the master database

use crate::error::Result;
use crate::types::Ordinal;
use crate::utils::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// What the output file holds after the last committed block
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMarker {
    /// Issues whose payload is in the output
    pub merged: BTreeSet<Ordinal>,
    /// Output length right after the last committed block
    pub bytes: u64,
}

impl ProgressMarker {
    /// Sidecar path for an output file: `<output>.progress.json`
    pub fn path_for(output: &Path) -> PathBuf {
        let mut name = output
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".progress.json");
        output.with_file_name(name)
    }

    /// Read a marker; `None` when missing or unreadable
    pub fn load(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(marker) => Some(marker),
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "ignoring unreadable progress marker");
                None
            }
        }
    }

    /// Replace the marker on disk
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomic(path, &serde_json::to_vec(self)?)
    }

    /// Highest merged issue number
    pub fn last(&self) -> Option<Ordinal> {
        self.merged.last().copied()
    }
}
