use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{human_size, require_exists};
use camino::{Utf8Path, Utf8PathBuf};
use colored::Colorize;
use m3_container::{persist_atomically, HashManifest, Lzma, ManifestOptions};
use miette::Result;

pub struct BuildManifestArgs {
    pub root: String,
    pub output: String,
    pub exclude: Vec<String>,
    pub windows_separators: bool,
}

pub fn build_manifest(args: BuildManifestArgs) -> Result<()> {
    let root = Utf8PathBuf::from(&args.root);
    require_exists(&root)?;

    println_pad!(
        "{} {}",
        "🧮 Hashing game files in:".bright_blue().bold(),
        root.as_str().bright_cyan()
    );

    let options = ManifestOptions {
        separator: if args.windows_separators { '\\' } else { '/' },
        exclude_prefixes: args.exclude,
    };
    let bytes = HashManifest::build_with(&root, &Lzma, &options).map_err(CliError::from)?;
    let output = Utf8PathBuf::from(&args.output);
    persist_atomically(&output, &bytes).map_err(CliError::from)?;

    println_pad!(
        "{} {} ({})",
        "✅ Manifest written to".bright_green().bold(),
        output.as_str().bright_white(),
        human_size(bytes.len() as u64)
    );
    Ok(())
}

pub struct ManifestInfoArgs {
    pub file_path: String,
    pub find: Option<String>,
    pub verify: Option<String>,
}

pub fn manifest_info(args: ManifestInfoArgs) -> Result<()> {
    let path = Utf8PathBuf::from(&args.file_path);
    require_exists(&path)?;
    let bytes = std::fs::read(&path).map_err(CliError::from)?;
    let manifest = HashManifest::decode(&bytes).map_err(CliError::from)?;

    let total: u64 = manifest.entries().iter().map(|e| e.size).sum();
    println_pad!(
        "{} {}",
        "📜 Manifest:".bright_blue().bold(),
        path.as_str().bright_cyan().bold()
    );
    println_pad!(
        "{} {} ({})",
        "🗂️ Files:".bright_green(),
        manifest.len().to_string().bright_white().bold(),
        human_size(total)
    );

    if let Some(find) = args.find {
        for entry in manifest.find(&find).map_err(CliError::from)? {
            println_pad!(
                "   {} {} {} {}",
                "•".bright_cyan(),
                entry.path.bright_white(),
                human_size(entry.size).dimmed(),
                entry.md5_hex().dimmed()
            );
        }
    }

    if let Some(root) = args.verify {
        verify_against(&manifest, &Utf8PathBuf::from(root))?;
    }
    Ok(())
}

/// Compare every manifest entry with the file under `root`.
fn verify_against(manifest: &HashManifest, root: &Utf8Path) -> Result<()> {
    require_exists(root)?;
    let report = manifest.verify(root).map_err(CliError::from)?;
    for path in &report.missing {
        println_pad!("   {} {}", "missing".bright_red(), path);
    }
    for path in &report.modified {
        println_pad!("   {} {}", "modified".bright_yellow(), path);
    }

    if report.is_clean() {
        println_pad!(
            "{} ({} files)",
            "✅ All files match the manifest".bright_green().bold(),
            report.matched
        );
    } else {
        println_pad!(
            "{} {} modified, {} missing",
            "⚠️ Verification:".bright_yellow().bold(),
            report.modified.len(),
            report.missing.len()
        );
    }
    Ok(())
}
