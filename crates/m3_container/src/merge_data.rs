//! Compressed merge data (`CTMD`) container.
//!
//! Holds many named text fragments (string-table merge XMLs), each compressed
//! individually, behind a front-loaded header so that a single entry can be
//! located and decompressed without touching the others.
//!
//! # Layout
//!
//! ```text
//! "CTMD"
//! u8     version (1 or 2)
//! i32    entry count
//! per entry (header table):
//!   unicode name
//!   u64  absolute offset of the compressed payload
//!   i32  compressed size
//!   i32  decompressed size            (version 2 only)
//! per entry (payload, same order):
//!   compressed bytes
//! ```
//!
//! # Building
//!
//! Payload offsets depend on the compressed size of every earlier entry, so the
//! writer reserves each header slot with placeholder values, appends the
//! compressed payloads one by one, and seeks back to patch each slot as soon as
//! its payload has been written.
//!
//! # Versions
//!
//! Version 1 does not store decompressed sizes; readers must be given the
//! original file size externally (see
//! [`MergeBlobStore::read_entry_with_size`]). Version 2 adds the size to every
//! header slot and is what [`build_from_directory`] produces.

use crate::codec::{
    read_count_prefixed, read_header, read_unicode, write_header, write_i32_len, write_unicode,
};
use crate::compression::{BlockCompressor, Lzma};
use crate::error::{ContainerError, Result};
use binrw::{binrw, BinRead, BinWrite};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

/// Magic of a merge data container.
pub const MERGE_DATA_MAGIC: &[u8; 4] = b"CTMD";

/// Name of a prebuilt container inside a fragment directory. When present it
/// is used as-is instead of compressing the directory again.
pub const PREBUILT_CONTAINER_NAME: &str = "combined_tlk_merge.m3za";

const CONTAINER: &str = "CTMD";

/// Format version of a merge data container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeDataVersion {
    /// Legacy layout without decompressed sizes.
    V1,
    /// Layout with a decompressed size in every header slot.
    #[default]
    V2,
}

impl MergeDataVersion {
    pub fn as_byte(self) -> u8 {
        match self {
            MergeDataVersion::V1 => 1,
            MergeDataVersion::V2 => 2,
        }
    }

    fn from_byte(value: u8) -> Result<Self> {
        match value {
            1 => Ok(MergeDataVersion::V1),
            2 => Ok(MergeDataVersion::V2),
            other => Err(ContainerError::format(
                CONTAINER,
                format!("unsupported version {other}"),
            )),
        }
    }
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default)]
struct SlotV1 {
    offset: u64,
    compressed_size: i32,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default)]
struct SlotV2 {
    offset: u64,
    compressed_size: i32,
    decompressed_size: i32,
}

/// Location of one entry's compressed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeEntryInfo {
    /// Absolute offset from the start of the container.
    pub offset: u64,
    /// Size of the compressed payload.
    pub compressed_size: u32,
    /// Size of the original content, if the container records it.
    pub decompressed_size: Option<u32>,
}

fn write_slot<W: Write + Seek>(
    writer: &mut W,
    version: MergeDataVersion,
    info: &MergeEntryInfo,
) -> Result<()> {
    let compressed_size = info.compressed_size as i32;
    match version {
        MergeDataVersion::V1 => SlotV1 {
            offset: info.offset,
            compressed_size,
        }
        .write(writer)?,
        MergeDataVersion::V2 => SlotV2 {
            offset: info.offset,
            compressed_size,
            decompressed_size: info.decompressed_size.unwrap_or(0) as i32,
        }
        .write(writer)?,
    }
    Ok(())
}

fn read_slot<R: Read + Seek>(reader: &mut R, version: MergeDataVersion) -> Result<MergeEntryInfo> {
    let (offset, compressed_size, decompressed_size) = match version {
        MergeDataVersion::V1 => {
            let slot = SlotV1::read(reader)?;
            (slot.offset, slot.compressed_size, None)
        }
        MergeDataVersion::V2 => {
            let slot = SlotV2::read(reader)?;
            (slot.offset, slot.compressed_size, Some(slot.decompressed_size))
        }
    };

    let to_u32 = |value: i32, what: &str| {
        u32::try_from(value)
            .map_err(|_| ContainerError::format(CONTAINER, format!("negative {what}: {value}")))
    };
    Ok(MergeEntryInfo {
        offset,
        compressed_size: to_u32(compressed_size, "compressed size")?,
        decompressed_size: decompressed_size
            .map(|size| to_u32(size, "decompressed size"))
            .transpose()?,
    })
}

/// Entry names become file names on extraction, so each must be a single
/// plain path component.
fn check_entry_name(name: &str) -> Result<()> {
    let mut components = Utf8Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Utf8Component::Normal(part)), None) if part == name && !name.contains('\\') => {
            Ok(())
        }
        _ => Err(ContainerError::format(
            CONTAINER,
            format!("entry name '{name}' is not a plain file name"),
        )),
    }
}

type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Writes merge data containers.
///
/// ```no_run
/// use camino::Utf8Path;
/// use m3_container::merge_data::{MergeDataVersion, MergeDataWriter};
/// use std::io::Cursor;
///
/// # fn main() -> m3_container::Result<()> {
/// let mut out = Cursor::new(Vec::new());
/// MergeDataWriter::new()
///     .with_version(MergeDataVersion::V1)
///     .with_progress(|done, total| println!("{done}/{total}"))
///     .write_directory(Utf8Path::new("tlkmerge"), &mut out)?;
/// # Ok(())
/// # }
/// ```
pub struct MergeDataWriter {
    version: MergeDataVersion,
    compressor: Box<dyn BlockCompressor>,
    extension: Option<String>,
    progress_callback: Option<ProgressCallback>,
}

impl Default for MergeDataWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeDataWriter {
    /// A writer producing version 2 containers of `*.xml` fragments with LZMA.
    pub fn new() -> Self {
        Self {
            version: MergeDataVersion::default(),
            compressor: Box::new(Lzma),
            extension: Some("xml".to_string()),
            progress_callback: None,
        }
    }

    pub fn with_version(mut self, version: MergeDataVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_compressor(mut self, compressor: impl BlockCompressor + 'static) -> Self {
        self.compressor = Box::new(compressor);
        self
    }

    /// Only pick up fragment files with this extension (case-insensitive).
    /// `None` takes every file in the directory.
    pub fn with_extension(mut self, extension: Option<&str>) -> Self {
        self.extension = extension.map(str::to_string);
        self
    }

    /// Register a callback receiving `(entries_done, entries_total)`.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Compress every fragment file directly inside `input_dir` into `writer`.
    ///
    /// Entries are keyed by file name and written in file name order.
    pub fn write_directory<W: Write + Seek>(
        &self,
        input_dir: &Utf8Path,
        writer: &mut W,
    ) -> Result<()> {
        let files = self.list_fragments(input_dir)?;
        tracing::info!(
            "Compressing {} merge fragments from {}",
            files.len(),
            input_dir
        );
        let names: Vec<String> = files
            .iter()
            .map(|path| path.file_name().unwrap_or_default().to_string())
            .collect();
        self.write_with(writer, &names, |index| Ok(std::fs::read(&files[index])?))
    }

    /// Compress in-memory fragments into `writer`, in the given order.
    pub fn write_fragments<W: Write + Seek>(
        &self,
        writer: &mut W,
        fragments: &[(String, Vec<u8>)],
    ) -> Result<()> {
        let names: Vec<String> = fragments.iter().map(|(name, _)| name.clone()).collect();
        self.write_with(writer, &names, |index| Ok(fragments[index].1.clone()))
    }

    fn list_fragments(&self, input_dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
        let mut files = Vec::new();
        for entry in input_dir.read_dir_utf8()? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.into_path();
            if path.file_name() == Some(PREBUILT_CONTAINER_NAME) {
                continue;
            }
            let matches = match &self.extension {
                Some(ext) => path
                    .extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case(ext)),
                None => true,
            };
            if matches {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Two-pass write: reserve all header slots, then append payloads and
    /// backpatch each slot.
    fn write_with<W, F>(&self, writer: &mut W, names: &[String], mut load: F) -> Result<()>
    where
        W: Write + Seek,
        F: FnMut(usize) -> Result<Vec<u8>>,
    {
        let start = writer.stream_position()?;
        if start != 0 {
            return Err(ContainerError::Encode {
                what: "merge data container".to_string(),
                reason: format!("must start at offset 0 of the stream, not {start}"),
            });
        }

        for name in names {
            check_entry_name(name).map_err(|_| ContainerError::Encode {
                what: format!("entry '{name}'"),
                reason: "entry names must be plain file names".to_string(),
            })?;
        }

        write_header(writer, MERGE_DATA_MAGIC, self.version.as_byte())?;
        write_i32_len(writer, names.len(), "entry count")?;

        let placeholder = MergeEntryInfo {
            offset: 0,
            compressed_size: 0,
            decompressed_size: Some(0),
        };
        let mut slot_positions = Vec::with_capacity(names.len());
        for name in names {
            write_unicode(writer, name)?;
            slot_positions.push(writer.stream_position()?);
            write_slot(writer, self.version, &placeholder)?;
        }

        let total = names.len();
        for (index, name) in names.iter().enumerate() {
            self.emit_progress(index, total);

            let raw = load(index)?;
            let compressed = self.compressor.compress(&raw)?;
            let info = MergeEntryInfo {
                offset: writer.stream_position()?,
                compressed_size: u32::try_from(compressed.len())
                    .ok()
                    .filter(|&size| size <= i32::MAX as u32)
                    .ok_or_else(|| ContainerError::Encode {
                        what: format!("entry '{name}'"),
                        reason: "compressed size exceeds the 32-bit size field".to_string(),
                    })?,
                decompressed_size: Some(
                    u32::try_from(raw.len())
                        .ok()
                        .filter(|&size| size <= i32::MAX as u32)
                        .ok_or_else(|| ContainerError::Encode {
                            what: format!("entry '{name}'"),
                            reason: "size exceeds the 32-bit size field".to_string(),
                        })?,
                ),
            };
            writer.write_all(&compressed)?;
            let data_end = writer.stream_position()?;

            writer.seek(SeekFrom::Start(slot_positions[index]))?;
            write_slot(writer, self.version, &info)?;
            writer.seek(SeekFrom::Start(data_end))?;

            tracing::debug!(
                "Packed '{}' at {} ({} -> {} bytes)",
                name,
                info.offset,
                raw.len(),
                compressed.len()
            );
        }

        self.emit_progress(total, total);
        writer.flush()?;
        Ok(())
    }

    fn emit_progress(&self, done: usize, total: usize) {
        if let Some(callback) = &self.progress_callback {
            callback(done, total);
        }
    }
}

/// Build a merge data container from a directory of `*.xml` fragments.
///
/// If the directory already contains a prebuilt container
/// ([`PREBUILT_CONTAINER_NAME`]) its bytes are returned unchanged.
pub fn build_from_directory(input_dir: &Utf8Path) -> Result<Vec<u8>> {
    let prebuilt = input_dir.join(PREBUILT_CONTAINER_NAME);
    if prebuilt.is_file() {
        tracing::info!("Using prebuilt merge data container {}", prebuilt);
        let bytes = std::fs::read(&prebuilt)?;
        read_header(&mut Cursor::new(&bytes), MERGE_DATA_MAGIC).map_err(|e| e.within(CONTAINER))?;
        return Ok(bytes);
    }

    let mut out = Cursor::new(Vec::new());
    MergeDataWriter::new().write_directory(input_dir, &mut out)?;
    Ok(out.into_inner())
}

/// In-memory index of a merge data container.
///
/// The index is immutable once loaded and can be shared between threads; each
/// reader must bring its own stream handle, since a single handle cannot serve
/// concurrent seeks.
#[derive(Debug, Clone)]
pub struct MergeBlobStore {
    version: MergeDataVersion,
    names: Vec<String>,
    entries: HashMap<String, MergeEntryInfo>,
}

impl MergeBlobStore {
    /// Read the header of a container and build the offset index.
    ///
    /// Only the header is read; payloads are validated to lie within the
    /// stream but are not decompressed.
    pub fn read_index<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        Self::read_index_inner(reader).map_err(|e| e.within(CONTAINER))
    }

    fn read_index_inner<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let version = MergeDataVersion::from_byte(read_header(reader, MERGE_DATA_MAGIC)?)?;
        let records = read_count_prefixed(reader, |r| {
            let name = read_unicode(r)?;
            let info = read_slot(r, version)?;
            Ok((name, info))
        })?;
        let header_end = reader.stream_position()?;

        let mut names = Vec::with_capacity(records.len());
        let mut entries = HashMap::with_capacity(records.len());
        for (name, info) in records {
            check_entry_name(&name)?;
            let end = info.offset.checked_add(info.compressed_size as u64);
            if info.offset < header_end || end.map_or(true, |end| end > stream_len) {
                return Err(ContainerError::format(
                    CONTAINER,
                    format!(
                        "entry '{}' points outside the payload area ({}+{})",
                        name, info.offset, info.compressed_size
                    ),
                ));
            }
            if entries.insert(name.clone(), info).is_some() {
                return Err(ContainerError::format(
                    CONTAINER,
                    format!("duplicate entry '{name}'"),
                ));
            }
            names.push(name);
        }

        Ok(Self {
            version,
            names,
            entries,
        })
    }

    /// Format version of the loaded container.
    pub fn version(&self) -> MergeDataVersion {
        self.version
    }

    /// Entry names in header order.
    pub fn entry_names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Payload location of an entry.
    pub fn entry_info(&self, name: &str) -> Result<MergeEntryInfo> {
        self.entries
            .get(name)
            .copied()
            .ok_or_else(|| ContainerError::lookup(CONTAINER, name))
    }

    /// Decompress an entry and decode it as text.
    ///
    /// Version 1 containers do not know the decompressed size; use
    /// [`read_entry_with_size`](Self::read_entry_with_size) for them.
    pub fn read_entry<R: Read + Seek>(&self, name: &str, reader: &mut R) -> Result<String> {
        decode_text(&self.read_entry_bytes(name, None, reader)?)
    }

    /// Decompress an entry whose original size is known to the caller and
    /// decode it as text.
    pub fn read_entry_with_size<R: Read + Seek>(
        &self,
        name: &str,
        decompressed_size: usize,
        reader: &mut R,
    ) -> Result<String> {
        decode_text(&self.read_entry_bytes(name, Some(decompressed_size), reader)?)
    }

    /// Decompress an entry to raw bytes.
    ///
    /// `decompressed_size` is required for version 1 containers. For version 2
    /// it is optional and must match the stored size when given.
    pub fn read_entry_bytes<R: Read + Seek>(
        &self,
        name: &str,
        decompressed_size: Option<usize>,
        reader: &mut R,
    ) -> Result<Vec<u8>> {
        self.read_entry_bytes_with(name, decompressed_size, reader, &Lzma)
    }

    /// Like [`read_entry_bytes`](Self::read_entry_bytes), for containers
    /// written with another [`BlockCompressor`].
    pub fn read_entry_bytes_with<R: Read + Seek>(
        &self,
        name: &str,
        decompressed_size: Option<usize>,
        reader: &mut R,
        compressor: &dyn BlockCompressor,
    ) -> Result<Vec<u8>> {
        let info = self.entry_info(name)?;
        let size = match (info.decompressed_size, decompressed_size) {
            (Some(stored), Some(given)) if stored as usize != given => {
                return Err(ContainerError::format(
                    CONTAINER,
                    format!("entry '{name}' is {stored} bytes, caller expected {given}"),
                ));
            }
            (Some(stored), _) => stored as usize,
            (None, Some(given)) => given,
            (None, None) => {
                return Err(ContainerError::MissingDecompressedSize {
                    container: CONTAINER,
                    name: name.to_string(),
                    version: self.version.as_byte(),
                })
            }
        };

        reader.seek(SeekFrom::Start(info.offset))?;
        let mut compressed = vec![0u8; info.compressed_size as usize];
        reader
            .read_exact(&mut compressed)
            .map_err(|e| ContainerError::from(e).within(CONTAINER))?;
        compressor.decompress(&compressed, size)
    }

    /// Decompress every entry into `output_dir`, one file per entry.
    ///
    /// Only possible for containers that record decompressed sizes.
    pub fn extract_all<R: Read + Seek>(
        &self,
        reader: &mut R,
        output_dir: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>> {
        std::fs::create_dir_all(output_dir)?;
        let mut written = Vec::with_capacity(self.names.len());
        for name in &self.names {
            let bytes = self.read_entry_bytes(name, None, reader)?;
            let out = output_dir.join(name);
            tracing::info!("Decompressing {} to {}", name, out);
            std::fs::write(&out, bytes)?;
            written.push(out);
        }
        Ok(written)
    }
}

/// Decode fragment bytes as text, honouring a UTF-8 or UTF-16LE byte order
/// mark.
fn decode_text(bytes: &[u8]) -> Result<String> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return utf8(rest);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        if rest.len() % 2 != 0 {
            return Err(ContainerError::format(CONTAINER, "odd-length UTF-16 text"));
        }
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16(&units)
            .map_err(|e| ContainerError::format(CONTAINER, format!("invalid UTF-16 text: {e}")));
    }
    utf8(bytes)
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ContainerError::format(CONTAINER, format!("invalid UTF-8 text: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::read_i32_len;
    use byteorder::{ReadBytesExt, LE};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    fn fragment(tag: &str, len: usize) -> String {
        let open = format!("<{tag}>");
        let close = format!("</{tag}>");
        let body = "a".repeat(len - open.len() - close.len());
        format!("{open}{body}{close}")
    }

    #[test]
    fn test_build_and_read_example() {
        let (_dir, root) = temp_root();
        let x = fragment("x", 500);
        let y = fragment("y", 10);
        assert_eq!((x.len(), y.len()), (500, 10));
        std::fs::write(root.join("x.xml"), &x).unwrap();
        std::fs::write(root.join("y.xml"), &y).unwrap();
        std::fs::write(root.join("notes.txt"), "ignored").unwrap();

        let bytes = build_from_directory(&root).unwrap();
        let mut reader = Cursor::new(bytes);
        let store = MergeBlobStore::read_index(&mut reader).unwrap();

        assert_eq!(store.entry_names(), ["x.xml", "y.xml"]);
        assert_eq!(store.read_entry("x.xml", &mut reader).unwrap(), x);
        assert_eq!(store.read_entry("y.xml", &mut reader).unwrap(), y);

        let err = store.read_entry("missing.xml", &mut reader).unwrap_err();
        assert!(matches!(err, ContainerError::Lookup { container: "CTMD", .. }));
    }

    #[test]
    fn test_v1_layout_and_external_size() {
        let fragments = vec![
            ("a.xml".to_string(), b"<a/>".to_vec()),
            ("b.xml".to_string(), b"<bb/>".to_vec()),
        ];
        let mut out = Cursor::new(Vec::new());
        MergeDataWriter::new()
            .with_version(MergeDataVersion::V1)
            .write_fragments(&mut out, &fragments)
            .unwrap();
        let bytes = out.into_inner();

        // Walk the header by hand to check the exact layout
        let mut r = Cursor::new(bytes.as_slice());
        let version = read_header(&mut r, MERGE_DATA_MAGIC).unwrap();
        assert_eq!(version, 1);
        assert_eq!(read_i32_len(&mut r, "count").unwrap(), 2);
        assert_eq!(read_unicode(&mut r).unwrap(), "a.xml");
        let first_offset = r.read_u64::<LE>().unwrap();
        let first_size = r.read_i32::<LE>().unwrap() as u64;
        assert_eq!(read_unicode(&mut r).unwrap(), "b.xml");
        let second_offset = r.read_u64::<LE>().unwrap();
        r.read_i32::<LE>().unwrap();
        let header_end = r.position();

        assert_eq!(first_offset, header_end);
        assert_eq!(second_offset, first_offset + first_size);

        let mut reader = Cursor::new(bytes);
        let store = MergeBlobStore::read_index(&mut reader).unwrap();
        assert_eq!(store.version(), MergeDataVersion::V1);
        assert_eq!(store.entry_info("a.xml").unwrap().decompressed_size, None);

        let err = store.read_entry("a.xml", &mut reader).unwrap_err();
        assert!(matches!(err, ContainerError::MissingDecompressedSize { version: 1, .. }));

        let text = store.read_entry_with_size("b.xml", 5, &mut reader).unwrap();
        assert_eq!(text, "<bb/>");
    }

    #[test]
    fn test_v2_size_mismatch() {
        let mut out = Cursor::new(Vec::new());
        MergeDataWriter::new()
            .write_fragments(&mut out, &[("a.xml".to_string(), b"<a/>".to_vec())])
            .unwrap();
        let mut reader = Cursor::new(out.into_inner());
        let store = MergeBlobStore::read_index(&mut reader).unwrap();

        assert!(store.read_entry_with_size("a.xml", 4, &mut reader).is_ok());
        assert!(store.read_entry_with_size("a.xml", 7, &mut reader).is_err());
    }

    #[test]
    fn test_prebuilt_container_passthrough() {
        let (_dir, root) = temp_root();
        let mut out = Cursor::new(Vec::new());
        MergeDataWriter::new()
            .write_fragments(&mut out, &[("z.xml".to_string(), b"<z/>".to_vec())])
            .unwrap();
        let prebuilt = out.into_inner();
        std::fs::write(root.join(PREBUILT_CONTAINER_NAME), &prebuilt).unwrap();
        std::fs::write(root.join("other.xml"), "<other/>").unwrap();

        assert_eq!(build_from_directory(&root).unwrap(), prebuilt);
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let mut out = Cursor::new(Vec::new());
        let mut data = vec![0xEF, 0xBB, 0xBF];
        data.extend_from_slice(b"<x/>");
        MergeDataWriter::new()
            .write_fragments(&mut out, &[("x.xml".to_string(), data)])
            .unwrap();
        let mut reader = Cursor::new(out.into_inner());
        let store = MergeBlobStore::read_index(&mut reader).unwrap();
        assert_eq!(store.read_entry("x.xml", &mut reader).unwrap(), "<x/>");
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let mut out = Cursor::new(Vec::new());
        MergeDataWriter::new()
            .write_fragments(&mut out, &[("x.xml".to_string(), b"<x/>".repeat(50))])
            .unwrap();
        let mut bytes = out.into_inner();
        bytes.truncate(bytes.len() - 1);

        let err = MergeBlobStore::read_index(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ContainerError::Format { container: "CTMD", .. }));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bytes = b"CTMD\x07".to_vec();
        bytes.extend_from_slice(&0i32.to_le_bytes());
        let err = MergeBlobStore::read_index(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ContainerError::Format { .. }));
    }

    #[test]
    fn test_progress_reported() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut out = Cursor::new(Vec::new());
        MergeDataWriter::new()
            .with_progress(move |_, total| {
                assert_eq!(total, 2);
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .write_fragments(
                &mut out,
                &[
                    ("a.xml".to_string(), b"a".to_vec()),
                    ("b.xml".to_string(), b"b".to_vec()),
                ],
            )
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_extract_all() {
        let (_dir, root) = temp_root();
        let mut out = Cursor::new(Vec::new());
        MergeDataWriter::new()
            .write_fragments(
                &mut out,
                &[
                    ("a.xml".to_string(), b"<a/>".to_vec()),
                    ("b.xml".to_string(), b"<b/>".to_vec()),
                ],
            )
            .unwrap();
        let mut reader = Cursor::new(out.into_inner());
        let store = MergeBlobStore::read_index(&mut reader).unwrap();

        let written = store.extract_all(&mut reader, &root.join("out")).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(std::fs::read(root.join("out/b.xml")).unwrap(), b"<b/>");
    }

    /// Builds a single-entry v2 container without going through the writer.
    fn raw_container(name: &str, content: &[u8]) -> Vec<u8> {
        let compressed = Lzma.compress(content).unwrap();
        let mut out = Cursor::new(Vec::new());
        write_header(&mut out, MERGE_DATA_MAGIC, 2).unwrap();
        write_i32_len(&mut out, 1, "entry count").unwrap();
        write_unicode(&mut out, name).unwrap();
        let offset = out.position() + 16;
        let info = MergeEntryInfo {
            offset,
            compressed_size: compressed.len() as u32,
            decompressed_size: Some(content.len() as u32),
        };
        write_slot(&mut out, MergeDataVersion::V2, &info).unwrap();
        out.write_all(&compressed).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_traversal_entry_name_rejected() {
        let (_dir, root) = temp_root();
        for name in ["../escaped.xml", "sub/inner.xml", "/abs.xml", "..\\escaped.xml", ".."] {
            let bytes = raw_container(name, b"<x/>");
            let err = MergeBlobStore::read_index(&mut Cursor::new(bytes)).unwrap_err();
            assert!(
                matches!(err, ContainerError::Format { container: "CTMD", .. }),
                "{name}: {err:?}"
            );
        }
        assert!(!root.join("escaped.xml").exists());

        let ok = raw_container("plain.xml", b"<x/>");
        let mut reader = Cursor::new(ok);
        let store = MergeBlobStore::read_index(&mut reader).unwrap();
        store.extract_all(&mut reader, &root.join("out")).unwrap();
        assert_eq!(std::fs::read(root.join("out/plain.xml")).unwrap(), b"<x/>");
    }

    #[test]
    fn test_writer_rejects_nested_names() {
        let mut out = Cursor::new(Vec::new());
        let err = MergeDataWriter::new()
            .write_fragments(&mut out, &[("../up.xml".to_string(), b"<x/>".to_vec())])
            .unwrap_err();
        assert!(matches!(err, ContainerError::Encode { .. }));
    }

    /// Stores payloads uncompressed.
    struct Identity;

    impl BlockCompressor for Identity {
        fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
            Ok(data.to_vec())
        }

        fn decompress(&self, data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
            assert_eq!(data.len(), expected_size);
            Ok(data.to_vec())
        }
    }

    #[test]
    fn test_custom_compressor_round_trip() {
        let mut out = Cursor::new(Vec::new());
        MergeDataWriter::new()
            .with_compressor(Identity)
            .write_fragments(&mut out, &[("a.xml".to_string(), b"<plain/>".to_vec())])
            .unwrap();
        let bytes = out.into_inner();
        assert!(bytes.windows(8).any(|w| w == b"<plain/>"));

        let mut reader = Cursor::new(bytes);
        let store = MergeBlobStore::read_index(&mut reader).unwrap();
        let data = store
            .read_entry_bytes_with("a.xml", None, &mut reader, &Identity)
            .unwrap();
        assert_eq!(data, b"<plain/>");
    }

    fn fragments_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
        prop::collection::btree_map(
            "[A-Za-z0-9_]{1,12}\\.xml",
            prop::collection::vec(any::<u8>(), 1..512),
            1..6,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_v2_entries_round_trip(entries in fragments_strategy()) {
            let fragments: Vec<(String, Vec<u8>)> = entries.into_iter().collect();
            let mut out = Cursor::new(Vec::new());
            MergeDataWriter::new().write_fragments(&mut out, &fragments).unwrap();

            let mut reader = Cursor::new(out.into_inner());
            let store = MergeBlobStore::read_index(&mut reader).unwrap();
            let names: Vec<String> = fragments.iter().map(|(name, _)| name.clone()).collect();
            prop_assert_eq!(store.entry_names(), names.as_slice());
            for (name, data) in &fragments {
                let read = store.read_entry_bytes(name, None, &mut reader).unwrap();
                prop_assert_eq!(&read, data);
            }
        }

        #[test]
        fn prop_v1_entries_round_trip_with_sizes(entries in fragments_strategy()) {
            let fragments: Vec<(String, Vec<u8>)> = entries.into_iter().collect();
            let mut out = Cursor::new(Vec::new());
            MergeDataWriter::new()
                .with_version(MergeDataVersion::V1)
                .write_fragments(&mut out, &fragments)
                .unwrap();

            let mut reader = Cursor::new(out.into_inner());
            let store = MergeBlobStore::read_index(&mut reader).unwrap();
            for (name, data) in &fragments {
                let read = store
                    .read_entry_bytes(name, Some(data.len()), &mut reader)
                    .unwrap();
                prop_assert_eq!(&read, data);
            }
        }
    }
}
