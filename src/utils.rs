//! Utility functions for file operations

use crate::error::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Suffix of in-progress files; never visible under a final name
pub const PARTIAL_SUFFIX: &str = "part";

const WRITE_CHECK_FILE: &str = ".twic-dl-write-check";

/// Create `dir` if needed and confirm files can be created inside it
///
/// Stages call this once before doing any work so an unwritable destination aborts the
/// stage instead of failing every task individually.
pub fn ensure_writable_dir(dir: &Path) -> Result<()> {
    let unwritable = |e: std::io::Error| Error::Unwritable {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    };

    std::fs::create_dir_all(dir).map_err(unwritable)?;
    let check = dir.join(WRITE_CHECK_FILE);
    std::fs::write(&check, b"").map_err(unwritable)?;
    std::fs::remove_file(&check).map_err(unwritable)?;
    Ok(())
}

/// Path used while `final_path` is being written
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use twic_dl::utils::partial_path;
///
/// assert_eq!(
///     partial_path(Path::new("/data/twic0001.zip")),
///     Path::new("/data/twic0001.zip.part")
/// );
/// ```
#[must_use]
pub fn partial_path(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    final_path.with_file_name(name)
}

/// Write `bytes` to `final_path` through a temporary sibling and a rename
///
/// Readers either see the previous file or the complete new one.
pub fn write_atomic(final_path: &Path, bytes: &[u8]) -> Result<()> {
    let temp = partial_path(final_path);
    let result = (|| -> std::io::Result<()> {
        let mut file = std::fs::File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&temp, final_path)
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&temp);
        return Err(Error::Io(e));
    }
    Ok(())
}

/// Async variant of [`write_atomic`] for use inside download workers
pub async fn write_atomic_async(final_path: &Path, bytes: &[u8]) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let temp = partial_path(final_path);
    let result = async {
        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp, final_path).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(Error::Io(e));
    }
    Ok(())
}

/// Remove leftover in-progress files from an interrupted run
///
/// Returns the number of files removed.
pub fn remove_partial_files(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == PARTIAL_SUFFIX) {
            std::fs::remove_file(&path)?;
            tracing::debug!(path = ?path, "removed partial file");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Size of a file, or `None` if it does not exist or is empty
pub fn non_empty_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|m| m.is_file() && m.len() > 0)
        .map(|m| m.len())
}
