//! Hash manifest (`MD5T`) builder and reader.
//!
//! A manifest records the size and MD5 digest of every file in a reference
//! tree (typically a vanilla game installation) so that later runs can verify
//! files or detect modified ones.
//!
//! # Layout
//!
//! ```text
//! "MD5T"
//! i32    uncompressed length of the table block
//! bytes  compressed table block:
//!          i32 name count, then each relative path as ASCII + NUL
//!          i32 record count, then per record:
//!            i32 name index, i32 size, 16-byte binary MD5
//! ```
//!
//! A freshly built manifest has one record per name, and record `i` refers to
//! name `i`. The index field exists so that a manifest can hold several known
//! variants of the same file: [`HashManifest::to_bytes`] writes each unique
//! name once and points every record at it.

use crate::codec::{
    read_ascii_null, read_count_prefixed, read_i32_len, read_magic, write_ascii_null,
    write_count_prefixed, write_i32_len, write_magic,
};
use crate::compression::{BlockCompressor, Lzma};
use crate::error::{ContainerError, Result};
use binrw::{binrw, BinRead, BinWrite};
use camino::{Utf8Path, Utf8PathBuf};
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use walkdir::WalkDir;

/// Magic of a hash manifest container.
pub const MANIFEST_MAGIC: &[u8; 4] = b"MD5T";

const CONTAINER: &str = "MD5T";

/// One data-table record as stored on disk.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ManifestRecord {
    name_index: i32,
    size: i32,
    md5: [u8; 16],
}

/// A file known to the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Path relative to the manifest root.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// Binary MD5 digest of the file content.
    pub md5: [u8; 16],
}

impl ManifestEntry {
    /// The digest as a lowercase hex string.
    pub fn md5_hex(&self) -> String {
        hex::encode(self.md5)
    }
}

/// Outcome of comparing a manifest with a directory tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestVerification {
    /// Number of files that match at least one known variant.
    pub matched: usize,
    /// Paths with no file under the root.
    pub missing: Vec<String>,
    /// Paths whose file matches none of the known variants.
    pub modified: Vec<String>,
}

impl ManifestVerification {
    /// Returns true if every file is present and matches.
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.modified.is_empty()
    }
}

/// Options controlling how a directory is turned into a manifest.
#[derive(Debug, Clone)]
pub struct ManifestOptions {
    /// Separator written between path components. Manifests generated on
    /// Windows use `\`.
    pub separator: char,
    /// Relative path prefixes to leave out of the manifest, compared
    /// case-insensitively on `/`-separated paths (e.g. `BioGame/Config`).
    pub exclude_prefixes: Vec<String>,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            separator: '/',
            exclude_prefixes: Vec::new(),
        }
    }
}

impl ManifestOptions {
    fn is_excluded(&self, normalized: &str) -> bool {
        let lower = normalized.to_ascii_lowercase();
        self.exclude_prefixes.iter().any(|prefix| {
            let prefix = prefix.replace('\\', "/").trim_matches('/').to_ascii_lowercase();
            !prefix.is_empty()
                && (lower == prefix
                    || lower
                        .strip_prefix(&prefix)
                        .is_some_and(|rest| rest.starts_with('/')))
        })
    }
}

/// Compute the MD5 of a file's content as a lowercase hex string.
pub fn hash_file_contents(path: &Utf8Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Decode a 32-character hex digest (either case) into its 16 binary bytes.
pub fn decode_hex_digest(digest: &str) -> Result<[u8; 16]> {
    let mut out = [0u8; 16];
    hex::decode_to_slice(digest, &mut out).map_err(|e| ContainerError::Encode {
        what: format!("digest '{digest}'"),
        reason: e.to_string(),
    })?;
    Ok(out)
}

/// An in-memory hash manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashManifest {
    entries: Vec<ManifestEntry>,
}

impl HashManifest {
    /// Scan `root` and build a serialized manifest with the default options
    /// and LZMA compression.
    pub fn build(root: &Utf8Path) -> Result<Vec<u8>> {
        Self::build_with(root, &Lzma, &ManifestOptions::default())
    }

    /// Scan `root` and build a serialized manifest.
    pub fn build_with(
        root: &Utf8Path,
        compressor: &dyn BlockCompressor,
        options: &ManifestOptions,
    ) -> Result<Vec<u8>> {
        Self::from_directory(root, options)?.to_bytes_with(compressor)
    }

    /// Scan `root`, hashing every file.
    ///
    /// The tree is enumerated exactly once; the resulting order is the index
    /// order of the manifest. A file that disappears between enumeration and
    /// hashing fails the whole scan.
    pub fn from_directory(root: &Utf8Path, options: &ManifestOptions) -> Result<Self> {
        let files = enumerate_files(root, options)?;
        tracing::info!("Hashing {} files under {}", files.len(), root);

        let mut entries = Vec::with_capacity(files.len());
        for (relative, absolute) in files {
            let size = std::fs::metadata(&absolute)?.len();
            let md5 = decode_hex_digest(&hash_file_contents(&absolute)?)?;
            tracing::debug!("{} size={} md5={}", relative, size, hex::encode(md5));
            entries.push(ManifestEntry {
                path: relative,
                size,
                md5,
            });
        }

        Ok(Self { entries })
    }

    /// Create a manifest from already known entries.
    pub fn from_entries(entries: Vec<ManifestEntry>) -> Self {
        Self { entries }
    }

    /// Parse a serialized LZMA-compressed manifest.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::decode_with(bytes, &Lzma)
    }

    /// Parse a serialized manifest using the given decompressor.
    pub fn decode_with(bytes: &[u8], compressor: &dyn BlockCompressor) -> Result<Self> {
        Self::decode_inner(bytes, compressor).map_err(|e| e.within(CONTAINER))
    }

    fn decode_inner(bytes: &[u8], compressor: &dyn BlockCompressor) -> Result<Self> {
        let mut reader = Cursor::new(bytes);
        read_magic(&mut reader, MANIFEST_MAGIC)?;
        let table_len = read_i32_len(&mut reader, "table length")?;
        let compressed = &bytes[reader.position() as usize..];
        let table = compressor.decompress(compressed, table_len)?;

        let mut reader = Cursor::new(table.as_slice());
        let names = read_count_prefixed(&mut reader, read_ascii_null)?;
        let records = read_count_prefixed(&mut reader, |r| Ok(ManifestRecord::read(r)?))?;
        if reader.position() as usize != table.len() {
            return Err(ContainerError::format(
                CONTAINER,
                "trailing bytes after the data table",
            ));
        }
        if records.len() < names.len() {
            return Err(ContainerError::format(
                CONTAINER,
                format!(
                    "data table has {} records for {} names",
                    records.len(),
                    names.len()
                ),
            ));
        }

        let mut referenced = vec![false; names.len()];
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let index = usize::try_from(record.name_index)
                .ok()
                .filter(|&i| i < names.len())
                .ok_or_else(|| {
                    ContainerError::format(
                        CONTAINER,
                        format!("name index {} out of range", record.name_index),
                    )
                })?;
            let size = u64::try_from(record.size).map_err(|_| {
                ContainerError::format(CONTAINER, format!("negative file size {}", record.size))
            })?;
            referenced[index] = true;
            entries.push(ManifestEntry {
                path: names[index].clone(),
                size,
                md5: record.md5,
            });
        }
        if let Some(unused) = referenced.iter().position(|r| !r) {
            return Err(ContainerError::format(
                CONTAINER,
                format!("name '{}' has no data record", names[unused]),
            ));
        }

        Ok(Self { entries })
    }

    /// Serialize with LZMA compression.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.to_bytes_with(&Lzma)
    }

    /// Serialize the manifest.
    ///
    /// Each distinct path is written once to the name table, in order of first
    /// appearance; records are grouped by name so that a manifest without
    /// duplicates keeps record `i` aligned with name `i`.
    pub fn to_bytes_with(&self, compressor: &dyn BlockCompressor) -> Result<Vec<u8>> {
        let mut names: Vec<&str> = Vec::new();
        let mut grouped: Vec<Vec<&ManifestEntry>> = Vec::new();
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for entry in &self.entries {
            let index = *positions.entry(entry.path.as_str()).or_insert_with(|| {
                names.push(entry.path.as_str());
                grouped.push(Vec::new());
                names.len() - 1
            });
            grouped[index].push(entry);
        }

        let mut records = Vec::with_capacity(self.entries.len());
        for (index, group) in grouped.iter().enumerate() {
            for entry in group {
                let size = i32::try_from(entry.size).map_err(|_| ContainerError::Encode {
                    what: format!("size of '{}'", entry.path),
                    reason: format!("{} bytes exceeds the 32-bit size field", entry.size),
                })?;
                records.push(ManifestRecord {
                    name_index: index as i32,
                    size,
                    md5: entry.md5,
                });
            }
        }

        let mut table = Cursor::new(Vec::new());
        write_count_prefixed(&mut table, &names, |w, name| write_ascii_null(w, name))?;
        write_count_prefixed(&mut table, &records, |w, record| {
            record.write(w)?;
            Ok(())
        })?;
        let table = table.into_inner();

        let compressed = compressor.compress(&table)?;
        let mut out = Vec::with_capacity(compressed.len() + 8);
        write_magic(&mut out, MANIFEST_MAGIC)?;
        write_i32_len(&mut out, table.len(), "table length")?;
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    /// All entries in index order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the manifest has no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every known record for `path`, compared case-insensitively with either
    /// separator.
    pub fn find(&self, path: &str) -> Result<Vec<&ManifestEntry>> {
        let wanted = normalize_key(path);
        let found: Vec<_> = self
            .entries
            .iter()
            .filter(|e| normalize_key(&e.path) == wanted)
            .collect();
        if found.is_empty() {
            return Err(ContainerError::lookup(CONTAINER, path));
        }
        Ok(found)
    }

    /// Compare the files under `root` with the manifest.
    ///
    /// Records sharing a path are variants of one file: the file matches if
    /// its size and digest equal any of them. Each file is hashed at most
    /// once, and only when some variant has the same size.
    pub fn verify(&self, root: &Utf8Path) -> Result<ManifestVerification> {
        let mut keys: Vec<String> = Vec::new();
        let mut variants: HashMap<String, Vec<&ManifestEntry>> = HashMap::new();
        for entry in &self.entries {
            let key = normalize_key(&entry.path);
            variants
                .entry(key.clone())
                .or_insert_with(|| {
                    keys.push(key);
                    Vec::new()
                })
                .push(entry);
        }

        let mut report = ManifestVerification::default();
        for key in &keys {
            let group = &variants[key];
            let display = group[0].path.clone();
            let path = root.join(group[0].path.replace('\\', "/"));
            if !path.is_file() {
                report.missing.push(display);
                continue;
            }

            let size = std::fs::metadata(&path)?.len();
            let sized: Vec<_> = group.iter().filter(|e| e.size == size).collect();
            let matches = !sized.is_empty() && {
                let md5 = hash_file_contents(&path)?;
                sized.iter().any(|e| e.md5_hex() == md5)
            };
            if matches {
                report.matched += 1;
            } else {
                let display_path: &str = &display;
                tracing::debug!("{} matches none of {} known variants", display_path, group.len());
                report.modified.push(display);
            }
        }
        Ok(report)
    }

    /// Record an additional known variant of a file. Existing records are kept.
    pub fn add_record(&mut self, path: impl Into<String>, size: u64, md5_hex: &str) -> Result<()> {
        let md5 = decode_hex_digest(md5_hex)?;
        self.entries.push(ManifestEntry {
            path: path.into(),
            size,
            md5,
        });
        Ok(())
    }

    /// Remove every record whose path starts with `prefix` (case-insensitive).
    /// Returns the number of records removed.
    pub fn remove_prefix(&mut self, prefix: &str) -> usize {
        let options = ManifestOptions {
            exclude_prefixes: vec![prefix.to_string()],
            ..Default::default()
        };
        let before = self.entries.len();
        self.entries
            .retain(|e| !options.is_excluded(&e.path.replace('\\', "/")));
        before - self.entries.len()
    }
}

fn normalize_key(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_lowercase()
}

/// Enumerate all files under `root` once, returning `(relative, absolute)`
/// pairs in walk order.
fn enumerate_files(
    root: &Utf8Path,
    options: &ManifestOptions,
) -> Result<Vec<(String, Utf8PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root.as_std_path()).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let absolute = Utf8PathBuf::from_path_buf(entry.into_path()).map_err(|p| {
            ContainerError::Encode {
                what: format!("path {}", p.display()),
                reason: "path is not valid UTF-8".to_string(),
            }
        })?;
        let relative = absolute
            .strip_prefix(root)
            .map_err(|_| ContainerError::Encode {
                what: format!("path {absolute}"),
                reason: format!("not under {root}"),
            })?;

        let components: Vec<&str> = relative.components().map(|c| c.as_str()).collect();
        let normalized = components.join("/");
        if options.is_excluded(&normalized) {
            tracing::debug!("Excluding {} from manifest", normalized);
            continue;
        }

        let joined = components.join(&options.separator.to_string());
        files.push((joined, absolute));
    }
    Ok(files)
}
