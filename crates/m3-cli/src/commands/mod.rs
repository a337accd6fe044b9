mod config;
mod manifest;
mod merge_data;
mod merge_dlc;
mod resolve;

pub use config::{set_game_root, set_library_dir, show_config};
pub use manifest::{build_manifest, manifest_info, BuildManifestArgs, ManifestInfoArgs};
pub use merge_data::{extract_merge_data, pack_merge_data, ExtractMergeDataArgs, PackMergeDataArgs};
pub use merge_dlc::{merge_dlc_status, remove_merge_dlc, MergeDlcArgs};
pub use resolve::{resolve_mod, ResolveModArgs};
