use clap::builder::{styling::AnsiColor, Styles};
use clap::ColorChoice;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{
    build_manifest, extract_merge_data, manifest_info, merge_dlc_status, pack_merge_data,
    remove_merge_dlc, resolve_mod, set_game_root, set_library_dir, show_config,
    BuildManifestArgs, ExtractMergeDataArgs, ManifestInfoArgs, MergeDlcArgs, PackMergeDataArgs,
    ResolveModArgs,
};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod errors;
mod utils;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build or inspect hash manifests (MD5T)
    Manifest {
        #[command(subcommand)]
        command: ManifestCommands,
    },
    /// Pack or extract string-table merge data (CTMD)
    Merge {
        #[command(subcommand)]
        command: MergeCommands,
    },
    /// Resolve a mod definition into an install plan for a game installation
    Resolve {
        /// The path to the moddef.json or moddef.toml file
        definition: String,

        /// The game installation root (defaults to the configured root)
        #[arg(short, long)]
        game_root: Option<String>,

        /// The mod's storage folder (defaults to the definition's folder)
        #[arg(short, long)]
        mod_root: Option<String>,

        /// Selected alternates, as JOB=ALTERNATE
        #[arg(short, long = "select")]
        selections: Vec<String>,
    },
    /// Inspect or remove the merge DLC of a game installation
    MergeDlc {
        #[command(subcommand)]
        command: MergeDlcCommands,
    },
    /// Show or change the configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ManifestCommands {
    /// Hash every file under a directory into a manifest
    Build {
        /// The directory to hash
        root: String,

        /// The manifest file to write
        #[arg(short, long)]
        output: String,

        /// Relative path prefixes to leave out (e.g. BioGame/Config)
        #[arg(short, long)]
        exclude: Vec<String>,

        /// Write paths with backslash separators
        #[arg(long)]
        windows_separators: bool,
    },
    /// Show information about a manifest
    Info {
        /// The path to the manifest file
        file_path: String,

        /// Show the entries for a path
        #[arg(short, long)]
        find: Option<String>,

        /// Check the files under this directory against the manifest
        #[arg(long)]
        verify: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum MergeCommands {
    /// Compress a directory of merge fragments into a container
    Pack {
        /// The directory holding the *.xml fragments
        input_dir: String,

        /// The container file to write (defaults to combined_tlk_merge.m3za in the input directory)
        #[arg(short, long)]
        output: Option<String>,

        /// Write the legacy version 1 layout without decompressed sizes
        #[arg(long)]
        legacy: bool,
    },
    /// Extract or list the entries of a container
    Extract {
        /// The path to the container file
        file_path: String,

        /// The directory to extract to
        #[arg(short, long)]
        output_dir: Option<String>,

        /// Only list the entries
        #[arg(short, long)]
        list: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum MergeDlcCommands {
    /// Show the merge DLC and its GUID
    Status {
        /// The game (ME2, ME3, LE2, LE3)
        game: String,

        #[arg(short, long)]
        game_root: Option<String>,
    },
    /// Delete the merge DLC folder
    Remove {
        /// The game (ME2, ME3, LE2, LE3)
        game: String,

        #[arg(short, long)]
        game_root: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,
    /// Set the installation root of a game
    SetGameRoot { game: String, path: String },
    /// Set the shared mod library directory
    SetLibrary { path: String },
}

fn parse_args() -> Args {
    // Configure colored/styled help output
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default())
        .placeholder(AnsiColor::Blue.on_default());

    let matches = Args::command()
        .styles(styles)
        .color(ColorChoice::Auto)
        .get_matches();

    Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
}

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "m3=info,m3_container=info,m3_install=info,m3_merge_dlc=info,m3_mod_definition=info".into()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_logging();

    let args = parse_args();

    match args.command {
        Commands::Manifest { command } => match command {
            ManifestCommands::Build {
                root,
                output,
                exclude,
                windows_separators,
            } => build_manifest(BuildManifestArgs {
                root,
                output,
                exclude,
                windows_separators,
            }),
            ManifestCommands::Info {
                file_path,
                find,
                verify,
            } => manifest_info(ManifestInfoArgs {
                file_path,
                find,
                verify,
            }),
        },
        Commands::Merge { command } => match command {
            MergeCommands::Pack {
                input_dir,
                output,
                legacy,
            } => pack_merge_data(PackMergeDataArgs {
                input_dir,
                output,
                legacy,
            }),
            MergeCommands::Extract {
                file_path,
                output_dir,
                list,
            } => extract_merge_data(ExtractMergeDataArgs {
                file_path,
                output_dir,
                list_only: list,
            }),
        },
        Commands::Resolve {
            definition,
            game_root,
            mod_root,
            selections,
        } => resolve_mod(ResolveModArgs {
            definition,
            game_root,
            mod_root,
            selections,
        }),
        Commands::MergeDlc { command } => match command {
            MergeDlcCommands::Status { game, game_root } => {
                merge_dlc_status(MergeDlcArgs { game, game_root })
            }
            MergeDlcCommands::Remove { game, game_root } => {
                remove_merge_dlc(MergeDlcArgs { game, game_root })
            }
        },
        Commands::Config { command } => match command {
            None | Some(ConfigCommands::Show) => show_config(),
            Some(ConfigCommands::SetGameRoot { game, path }) => set_game_root(game, path),
            Some(ConfigCommands::SetLibrary { path }) => set_library_dir(path),
        },
    }
}
