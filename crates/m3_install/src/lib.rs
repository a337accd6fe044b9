//! Installation planning for Mass Effect mods.
//!
//! Given a [`ModDefinition`](m3_mod_definition::ModDefinition), the user's
//! alternate [`Selections`] and an [`InstallTarget`], [`resolve`] produces an
//! [`InstallMapping`]: a conflict-free plan of which source goes to which
//! destination, split into loose files and archive entries.
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use m3_install::{resolve, InstallTarget, ResolveContext, Selections};
//! use m3_mod_definition::{JobHeader, ModDefinition};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let definition = ModDefinition::from_path(Utf8Path::new("mods/citadel/moddef.toml"))?;
//! let target = InstallTarget::probe(definition.game, Utf8Path::new("C:/Games/Mass Effect 3"))?;
//! let selections = Selections::new().select(JobHeader::Basegame, "Night lighting");
//!
//! let mapping = resolve(
//!     &definition,
//!     &selections,
//!     &target,
//!     &ResolveContext::new("mods/citadel"),
//! )?;
//! for (destination, file) in mapping.unpacked_files() {
//!     println!("{} <- {}", destination, file.source.describe());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod mapping;
pub mod packed;
pub mod resolver;
pub mod target;

pub use error::{Error, ResolveError, Result};
pub use mapping::{
    InstallMapping, InstallSourceFile, MappedFile, PackedJobMapping, ResolveContext, SkippedJob,
    UnpackedJobMapping,
};
pub use packed::{apply_packed_mapping, ArchiveContainer};
pub use resolver::{resolve, Selections};
pub use target::{DlcState, InstallTarget};
