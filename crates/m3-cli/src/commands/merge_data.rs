use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{human_size, require_exists};
use camino::{Utf8Path, Utf8PathBuf};
use colored::Colorize;
use m3_container::merge_data::PREBUILT_CONTAINER_NAME;
use m3_container::{persist_atomically, MergeBlobStore, MergeDataVersion, MergeDataWriter};
use miette::Result;
use std::fs::File;
use std::io::{BufReader, Cursor};

pub struct PackMergeDataArgs {
    pub input_dir: String,
    pub output: Option<String>,
    pub legacy: bool,
}

pub fn pack_merge_data(args: PackMergeDataArgs) -> Result<()> {
    let input_dir = Utf8PathBuf::from(&args.input_dir);
    require_exists(&input_dir)?;
    let output = args
        .output
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| input_dir.join(PREBUILT_CONTAINER_NAME));

    println_pad!(
        "{} {}",
        "📦 Packing merge fragments from:".bright_blue().bold(),
        input_dir.as_str().bright_cyan()
    );

    let bytes = pack_to_bytes(&input_dir, args.legacy)?;
    persist_atomically(&output, &bytes).map_err(CliError::from)?;

    println_pad!(
        "{} {} ({})",
        "✅ Merge data written to".bright_green().bold(),
        output.as_str().bright_white(),
        human_size(bytes.len() as u64)
    );
    Ok(())
}

/// Pack the `.xml` fragments of `input_dir`. A container already present in
/// the directory is never reused, so repacking picks up edited fragments.
fn pack_to_bytes(input_dir: &Utf8Path, legacy: bool) -> Result<Vec<u8>, CliError> {
    let version = if legacy {
        MergeDataVersion::V1
    } else {
        MergeDataVersion::V2
    };
    let mut out = Cursor::new(Vec::new());
    MergeDataWriter::new()
        .with_version(version)
        .write_directory(input_dir, &mut out)?;
    Ok(out.into_inner())
}

pub struct ExtractMergeDataArgs {
    pub file_path: String,
    pub output_dir: Option<String>,
    pub list_only: bool,
}

/// Compute the default output directory: parent folder + file stem
fn default_output_dir(file_path: &Utf8Path) -> Utf8PathBuf {
    let file_stem = file_path.file_stem().unwrap_or("extracted");
    match file_path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.join(file_stem),
        _ => Utf8PathBuf::from(file_stem),
    }
}

pub fn extract_merge_data(args: ExtractMergeDataArgs) -> Result<()> {
    let file_path = Utf8PathBuf::from(&args.file_path);
    require_exists(&file_path)?;

    let mut reader = BufReader::new(File::open(&file_path).map_err(CliError::from)?);
    let store = MergeBlobStore::read_index(&mut reader).map_err(CliError::from)?;

    println_pad!(
        "{} {} {}",
        "📦 Merge data:".bright_blue().bold(),
        file_path.as_str().bright_cyan().bold(),
        format!("(version {}, {} entries)", store.version().as_byte(), store.len()).dimmed()
    );

    if args.list_only {
        for name in store.entry_names() {
            let info = store.entry_info(name).map_err(CliError::from)?;
            let size = info
                .decompressed_size
                .map(|size| human_size(size as u64))
                .unwrap_or_else(|| "?".to_string());
            println_pad!(
                "   {} {} {}",
                "•".bright_cyan(),
                name.bright_white(),
                format!("({} -> {})", human_size(info.compressed_size as u64), size).dimmed()
            );
        }
        return Ok(());
    }

    let output_dir = args
        .output_dir
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| default_output_dir(&file_path));
    let written = store
        .extract_all(&mut reader, &output_dir)
        .map_err(CliError::from)?;

    println_pad!(
        "{} {} files to {}",
        "✅ Extracted".bright_green().bold(),
        written.len(),
        output_dir.as_str().bright_white()
    );
    Ok(())
}
