//! Mod definitions: what a mod installs, for which game, and which alternate
//! options the user may pick.
//!
//! Definitions are plain data. They can be loaded from JSON or TOML with
//! [`ModDefinition::from_path`], or parsed directly with `serde_json` / `toml`.

mod error;
mod game;
mod job;

pub use error::{ModDefinitionError, Result};
pub use game::Game;
pub use job::{
    AlternateOperation, AlternateOption, FileEntry, InstallationJob, JobHeader, SourceLocation,
};

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Describes a mod and everything it installs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModDefinition {
    /// The name of the mod
    ///
    /// Example: `Expanded Galaxy Mod`
    pub name: String,

    /// The version of the mod
    ///
    /// Example: `1.4.2`
    pub version: String,

    /// The game the mod targets
    pub game: Game,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Installation jobs, resolved in declaration order
    #[serde(default)]
    pub jobs: Vec<InstallationJob>,
}

impl ModDefinition {
    /// Load a definition from a `.json` or `.toml` file and validate it.
    pub fn from_path(path: &Utf8Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let definition: ModDefinition = match path.extension().map(str::to_ascii_lowercase) {
            Some(ext) if ext == "json" => serde_json::from_str(&contents)?,
            Some(ext) if ext == "toml" => toml::from_str(&contents)?,
            _ => return Err(ModDefinitionError::UnsupportedFormat(path.to_string())),
        };
        definition.validate()?;

        tracing::debug!(
            "Loaded mod definition '{}' {} with {} jobs from {}",
            definition.name,
            definition.version,
            definition.jobs.len(),
            path
        );
        Ok(definition)
    }

    /// Check structural rules that serde cannot express: one job per header
    /// and unique alternate names within a job.
    pub fn validate(&self) -> Result<()> {
        let mut headers = HashSet::new();
        for job in &self.jobs {
            if !headers.insert(&job.header) {
                return Err(ModDefinitionError::Invalid(format!(
                    "job header {} is declared more than once",
                    job.header
                )));
            }

            let mut names = HashSet::new();
            for alternate in &job.alternates {
                if !names.insert(alternate.name.as_str()) {
                    return Err(ModDefinitionError::Invalid(format!(
                        "alternate '{}' is declared more than once in job {}",
                        alternate.name, job.header
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn job(&self, header: &JobHeader) -> Option<&InstallationJob> {
        self.jobs.iter().find(|job| &job.header == header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_example_definition() -> ModDefinition {
        ModDefinition {
            name: "Citadel Overhaul".to_string(),
            version: "2.1.0".to_string(),
            game: Game::ME3,
            description: Some("Reworks the Citadel hub".to_string()),
            jobs: vec![
                InstallationJob {
                    header: JobHeader::Basegame,
                    files: vec![FileEntry {
                        destination: "BIOGame/CookedPCConsole/BioP_Cit.pcc".to_string(),
                        source: SourceLocation::ModStorage("BASEGAME/BioP_Cit.pcc".to_string()),
                    }],
                    alternates: vec![
                        AlternateOption {
                            name: "Night lighting".to_string(),
                            group: Some("lighting".to_string()),
                            description: None,
                            operations: vec![AlternateOperation::Replace {
                                destination: "BIOGame/CookedPCConsole/BioP_Cit.pcc".to_string(),
                                source: SourceLocation::ModStorage(
                                    "ALTERNATES/Night/BioP_Cit.pcc".to_string(),
                                ),
                            }],
                        },
                        AlternateOption {
                            name: "HD textures".to_string(),
                            group: None,
                            description: Some("Uses the shared texture library".to_string()),
                            operations: vec![AlternateOperation::AddMultiList {
                                root: SourceLocation::SharedLibrary("citadel".to_string()),
                                target_dir: "BIOGame/CookedPCConsole".to_string(),
                                files: vec![
                                    "Cit_Tex_01.tfc".to_string(),
                                    "Cit_Tex_02.tfc".to_string(),
                                ],
                            }],
                        },
                    ],
                },
                InstallationJob {
                    header: JobHeader::CustomDlc,
                    files: vec![FileEntry {
                        destination: "DLC_MOD_CitadelOverhaul/CookedPCConsole/Default.sfar"
                            .to_string(),
                        source: SourceLocation::ModStorage(
                            "DLC_MOD_CitadelOverhaul/CookedPCConsole/Default.sfar".to_string(),
                        ),
                    }],
                    alternates: vec![],
                },
                InstallationJob {
                    header: JobHeader::OfficialDlc("DLC_EXP_Pack003".to_string()),
                    files: vec![FileEntry {
                        destination: "BIOGame/DLC/DLC_EXP_Pack003/CookedPCConsole/BioD_CitHub.pcc"
                            .to_string(),
                        source: SourceLocation::ModStorage("CITADEL/BioD_CitHub.pcc".to_string()),
                    }],
                    alternates: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_json_parsing() {
        let definition: ModDefinition =
            serde_json::from_str(include_str!("../test-data/moddef.json")).unwrap();

        assert_eq!(definition, create_example_definition());
    }

    #[test]
    fn test_toml_parsing() {
        let definition: ModDefinition =
            toml::from_str(include_str!("../test-data/moddef.toml")).unwrap();

        assert_eq!(definition, create_example_definition());
    }

    #[test]
    fn test_from_path_picks_format() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        let json = root.join("moddef.json");
        std::fs::write(&json, include_str!("../test-data/moddef.json")).unwrap();
        assert_eq!(
            ModDefinition::from_path(&json).unwrap(),
            create_example_definition()
        );

        let other = root.join("moddef.ini");
        std::fs::write(&other, "[ModManager]").unwrap();
        assert!(matches!(
            ModDefinition::from_path(&other),
            Err(ModDefinitionError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_job_headers_differing_by_case_rejected() {
        let mut definition = create_example_definition();
        definition.jobs.push(InstallationJob {
            header: JobHeader::OfficialDlc("dlc_exp_pack003".to_string()),
            files: vec![],
            alternates: vec![],
        });
        assert!(matches!(
            definition.validate(),
            Err(ModDefinitionError::Invalid(_))
        ));
        assert!(definition
            .job(&JobHeader::OfficialDlc("DLC_EXP_PACK003".to_string()))
            .is_some());
    }

    #[test]
    fn test_duplicate_job_header_rejected() {
        let mut definition = create_example_definition();
        definition.jobs.push(InstallationJob {
            header: JobHeader::Basegame,
            files: vec![],
            alternates: vec![],
        });
        assert!(matches!(
            definition.validate(),
            Err(ModDefinitionError::Invalid(_))
        ));
    }

    #[test]
    fn test_minimal_definition() {
        let definition: ModDefinition = serde_json::from_str(
            r#"{ "name": "Tiny", "version": "1.0", "game": "LE1", "jobs": [ { "header": "BASEGAME" } ] }"#,
        )
        .unwrap();
        assert_eq!(definition.game, Game::LE1);
        assert!(definition.jobs[0].files.is_empty());
        assert!(definition.job(&JobHeader::Basegame).is_some());
        assert!(definition.job(&JobHeader::CustomDlc).is_none());
    }
}
