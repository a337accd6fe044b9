//! Binary containers used by the mod installer.
//!
//! - [`manifest`]: `MD5T` hash manifests describing every file under a game
//!   root (path, size, MD5), stored as an LZMA-compressed table.
//! - [`merge_data`]: `CTMD` containers packing many string-table merge
//!   fragments, each compressed individually behind an offset index.
//!
//! Both are built on the primitives in [`codec`] (magic/version headers,
//! count-prefixed lists, ASCII and UTF-16 strings) and the compression seam in
//! [`compression`].
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use m3_container::manifest::HashManifest;
//!
//! # fn main() -> m3_container::Result<()> {
//! let bytes = HashManifest::build(Utf8Path::new("Mass Effect 3"))?;
//! let manifest = HashManifest::decode(&bytes)?;
//! for entry in manifest.entries() {
//!     println!("{} {} {}", entry.path, entry.size, entry.md5_hex());
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod compression;
pub mod error;
pub mod manifest;
pub mod merge_data;
pub mod persist;

pub use compression::{BlockCompressor, Lzma};
pub use error::{ContainerError, Result};
pub use manifest::{HashManifest, ManifestEntry, ManifestOptions, ManifestVerification};
pub use merge_data::{
    build_from_directory, MergeBlobStore, MergeDataVersion, MergeDataWriter, MergeEntryInfo,
};
pub use persist::persist_atomically;
