use crate::errors::CliError;
use crate::println_pad;
use crate::utils::{config::load_config, game_root, require_exists};
use camino::Utf8PathBuf;
use colored::Colorize;
use m3_install::{resolve, InstallTarget, ResolveContext, Selections};
use m3_mod_definition::{JobHeader, ModDefinition};
use miette::Result;

pub struct ResolveModArgs {
    pub definition: String,
    pub game_root: Option<String>,
    pub mod_root: Option<String>,
    pub selections: Vec<String>,
}

/// Parse `JOB=ALTERNATE` selection arguments.
fn parse_selections(values: &[String]) -> Result<Selections, CliError> {
    let mut selections = Selections::new();
    for value in values {
        let (job, name) = value
            .split_once('=')
            .filter(|(job, name)| !job.trim().is_empty() && !name.trim().is_empty())
            .ok_or_else(|| CliError::invalid_selection(value.as_str()))?;
        let header = JobHeader::try_from(job.trim().to_string())
            .map_err(|_| CliError::invalid_selection(value.as_str()))?;
        selections.insert(header, name.trim());
    }
    Ok(selections)
}

pub fn resolve_mod(args: ResolveModArgs) -> Result<()> {
    let definition_path = Utf8PathBuf::from(&args.definition);
    require_exists(&definition_path)?;
    let definition = ModDefinition::from_path(&definition_path).map_err(CliError::from)?;

    let root = game_root(definition.game, args.game_root)?;
    let target = InstallTarget::probe(definition.game, &root).map_err(CliError::from)?;

    let mod_root = args.mod_root.map(Utf8PathBuf::from).unwrap_or_else(|| {
        definition_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_default()
    });
    let mut context = ResolveContext::new(mod_root);
    context.library_dir = load_config().mod_library_dir;

    let selections = parse_selections(&args.selections)?;
    tracing::debug!("Resolving with mod root {} and {:?}", context.mod_root, selections);
    let mapping =
        resolve(&definition, &selections, &target, &context).map_err(CliError::from)?;

    println_pad!(
        "{} {} {}",
        "🧩 Install plan for".bright_blue().bold(),
        definition.name.bright_cyan().bold(),
        format!("{} on {}", definition.version, target.game()).dimmed()
    );

    for job in mapping.unpacked_jobs() {
        println_pad!(
            "\n{} {}",
            job.header.to_string().bright_magenta().bold(),
            "(loose files)".dimmed()
        );
        for file in job.files.values() {
            let marker = if file.source.alt_applied { "*" } else { "•" };
            println_pad!(
                "   {} {} {} {}",
                marker.bright_cyan(),
                job.qualified_destination(mapping.game(), file).bright_white(),
                "<-".dimmed(),
                file.source.describe()
            );
        }
    }

    for job in mapping.packed_jobs() {
        println_pad!(
            "\n{} {}",
            job.header.to_string().bright_magenta().bold(),
            format!("(into {})", job.archive).dimmed()
        );
        for file in job.files.values() {
            println_pad!(
                "   {} {} {} {}",
                "•".bright_cyan(),
                file.destination.bright_white(),
                "<-".dimmed(),
                file.source.describe()
            );
        }
    }

    for skipped in mapping.skipped_jobs() {
        println_pad!(
            "\n{} {}: {}",
            "⚠️ Skipped".bright_yellow().bold(),
            skipped.header,
            skipped.reason
        );
    }

    let new_dlc = mapping.newly_introduced_dlc(&target);
    if !new_dlc.is_empty() {
        println_pad!(
            "\n{} {}",
            "🆕 New DLC folders:".bright_green(),
            new_dlc.join(", ").bright_white()
        );
    }
    println_pad!(
        "\n{} {}",
        "✅ Files planned:".bright_green().bold(),
        mapping.file_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selections() {
        let selections = parse_selections(&[
            "BASEGAME=Night lighting".to_string(),
            "DLC_CON_MP1 = HD".to_string(),
        ])
        .unwrap();
        assert!(selections.is_selected(&JobHeader::Basegame, "Night lighting"));
        assert!(selections.is_selected(&JobHeader::OfficialDlc("DLC_CON_MP1".to_string()), "HD"));

        for bad in ["BASEGAME", "=x", "BASEGAME=", "NOPE=x"] {
            assert!(matches!(
                parse_selections(&[bad.to_string()]),
                Err(CliError::InvalidSelection { .. })
            ));
        }
    }
}
