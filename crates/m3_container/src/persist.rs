//! Atomic persistence for built containers.

use crate::error::Result;
use camino::Utf8Path;
use std::io::Write;

/// Write `bytes` to `path` so that the destination either keeps its previous
/// content or receives the complete new content.
///
/// The data is written to a temporary file in the destination directory and
/// renamed over `path` once fully flushed. The temporary file is removed if any
/// step fails.
pub fn persist_atomically(path: &Utf8Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    tracing::debug!("Persisted {} bytes to {}", bytes.len(), path);
    Ok(())
}
