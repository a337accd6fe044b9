use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{game_root, parse_game};
use colored::Colorize;
use m3_install::InstallTarget;
use m3_merge_dlc::MergeDlc;
use miette::Result;

pub struct MergeDlcArgs {
    pub game: String,
    pub game_root: Option<String>,
}

fn target(args: MergeDlcArgs) -> Result<InstallTarget, CliError> {
    let game = parse_game(&args.game)?;
    let root = game_root(game, args.game_root)?;
    Ok(InstallTarget::new(game, root))
}

pub fn merge_dlc_status(args: MergeDlcArgs) -> Result<()> {
    let target = target(args)?;
    let path = MergeDlc::path_for(&target);

    if !path.exists() {
        println_pad!(
            "{} {}",
            "ℹ️ No merge DLC at".bright_blue(),
            path.as_str().bright_white()
        );
        return Ok(());
    }

    match MergeDlc::current_guid(&target) {
        Some(guid) => println_pad!(
            "{} {} {}",
            "🧬 Merge DLC:".bright_blue().bold(),
            path.as_str().bright_cyan(),
            guid.to_string().bright_white().bold()
        ),
        None => println_pad!(
            "{} {} {}",
            "🧬 Merge DLC:".bright_blue().bold(),
            path.as_str().bright_cyan(),
            "(no GUID)".bright_yellow()
        ),
    }
    Ok(())
}

pub fn remove_merge_dlc(args: MergeDlcArgs) -> Result<()> {
    let target = target(args)?;
    if MergeDlc::remove(&target).map_err(CliError::from)? {
        println_pad!("{}", "✅ Merge DLC removed".bright_green().bold());
    } else {
        println_pad!("{}", "ℹ️ No merge DLC to remove".bright_blue());
    }
    Ok(())
}
