//! Applying packed mappings through an archive implementation.

use crate::error::{Error, Result};
use crate::mapping::{normalize_path, InstallSourceFile, PackedJobMapping};
use std::collections::HashMap;

/// An archive whose existing entries can be rewritten (an SFAR file on ME3).
///
/// Entry paths are the archive's own, e.g.
/// `/BIOGame/DLC/DLC_CON_MP1/CookedPCConsole/Startup.pcc`. Matching against
/// the mapping is case-insensitive and ignores leading separators.
pub trait ArchiveContainer {
    /// All entry paths in the archive.
    fn list_entries(&mut self) -> Result<Vec<String>>;

    /// Replace the content of an existing entry.
    fn replace_entry(&mut self, entry: &str, data: Vec<u8>) -> Result<()>;
}

/// Write every file of a packed job into `archive`.
///
/// `loader` produces the bytes of a source (usually
/// [`InstallMapping::load_source`](crate::InstallMapping::load_source)).
/// All entries are checked against the archive before the first write; if any
/// is missing the archive is left untouched. Returns the number of entries
/// written.
pub fn apply_packed_mapping<A, F>(
    job: &PackedJobMapping,
    archive: &mut A,
    mut loader: F,
) -> Result<usize>
where
    A: ArchiveContainer + ?Sized,
    F: FnMut(&InstallSourceFile) -> Result<Vec<u8>>,
{
    let entries: HashMap<String, String> = archive
        .list_entries()?
        .into_iter()
        .map(|entry| (normalize_path(&entry), entry))
        .collect();

    let missing: Vec<String> = job
        .files
        .iter()
        .filter(|(key, _)| !entries.contains_key(*key))
        .map(|(_, file)| file.destination.clone())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingArchiveEntry {
            archive: job.archive.clone(),
            entries: missing,
        });
    }

    tracing::info!(
        "Installing {} files into {} for job {}",
        job.files.len(),
        job.archive,
        job.header
    );
    for (key, file) in &job.files {
        let entry = &entries[key];
        let data = loader(&file.source)?;
        tracing::debug!("Replacing {} ({} bytes)", entry, data.len());
        archive.replace_entry(entry, data)?;
    }
    Ok(job.files.len())
}
