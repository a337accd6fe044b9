//! Turns a mod definition plus the user's alternate selections into an
//! [`InstallMapping`].
//!
//! Resolution runs per job in declaration order:
//!
//! 1. the job's declared files form the base set;
//! 2. selected alternates are applied in their declaration order, each
//!    running its operations in order;
//! 3. the job is classified as loose-file (unpacked) or archive (packed)
//!    delivery, or skipped when the official DLC it patches is missing;
//! 4. `CUSTOMDLC` jobs record the content folders they install.
//!
//! Finally the loose-file destinations of all jobs, qualified relative to the
//! game root, are checked for collisions across jobs. Packed entries live in
//! their own archive namespace and are not part of that check.

use crate::error::ResolveError;
use crate::mapping::{
    clean_path, normalize_path, FileMap, InstallMapping, InstallSourceFile, MappedFile,
    PackedJobMapping, ResolveContext, SkippedJob, UnpackedJobMapping,
};
use crate::target::{DlcState, InstallTarget};
use m3_mod_definition::{
    AlternateOperation, AlternateOption, Game, InstallationJob, JobHeader, ModDefinition,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

type Result<T> = std::result::Result<T, ResolveError>;

/// Alternate options the user picked, per job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selections {
    selected: BTreeMap<JobHeader, BTreeSet<String>>,
}

impl Selections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, job: JobHeader, alternate: impl Into<String>) -> Self {
        self.insert(job, alternate);
        self
    }

    pub fn insert(&mut self, job: JobHeader, alternate: impl Into<String>) {
        self.selected.entry(job).or_default().insert(alternate.into());
    }

    pub fn is_selected(&self, job: &JobHeader, alternate: &str) -> bool {
        self.selected
            .get(job)
            .is_some_and(|names| names.contains(alternate))
    }

    fn jobs(&self) -> impl Iterator<Item = (&JobHeader, &BTreeSet<String>)> {
        self.selected.iter()
    }
}

/// How a job's files reach the game.
enum Delivery {
    Unpacked,
    Packed(camino::Utf8PathBuf),
    Skip(String),
}

/// Resolve a mod into an installation plan for `target`.
///
/// Pure: reads nothing from disk. Relative sources are resolved against
/// `context` only when the mapping is consumed.
pub fn resolve(
    definition: &ModDefinition,
    selections: &Selections,
    target: &InstallTarget,
    context: &ResolveContext,
) -> Result<InstallMapping> {
    let game = target.game();
    if definition.game != game {
        return Err(ResolveError::GameMismatch {
            mod_game: definition.game,
            target_game: game,
        });
    }

    validate_selections(definition, selections)?;

    let mut mapping = InstallMapping {
        game,
        context: context.clone(),
        unpacked: Vec::new(),
        packed: Vec::new(),
        skipped_jobs: Vec::new(),
    };

    for job in &definition.jobs {
        let delivery = match classify(game, &job.header, target)? {
            Delivery::Skip(reason) => {
                tracing::warn!("Skipping job {}: {}", job.header, reason);
                mapping.skipped_jobs.push(SkippedJob {
                    header: job.header.clone(),
                    reason,
                });
                continue;
            }
            delivery => delivery,
        };

        let files = build_file_set(job, selections)?;
        tracing::debug!("Job {} resolved to {} files", job.header, files.len());

        match delivery {
            Delivery::Packed(archive) => mapping.packed.push(PackedJobMapping {
                header: job.header.clone(),
                archive,
                files,
            }),
            _ => {
                let dlc_folders = match job.header {
                    JobHeader::CustomDlc => dlc_folders(&files),
                    _ => Vec::new(),
                };
                mapping.unpacked.push(UnpackedJobMapping {
                    header: job.header.clone(),
                    files,
                    dlc_folders,
                });
            }
        }
    }

    check_cross_job_conflicts(&mapping)?;

    tracing::info!(
        "Resolved '{}' for {}: {} unpacked jobs, {} packed jobs, {} skipped, {} files",
        definition.name,
        game,
        mapping.unpacked.len(),
        mapping.packed.len(),
        mapping.skipped_jobs.len(),
        mapping.file_count()
    );
    Ok(mapping)
}

fn validate_selections(definition: &ModDefinition, selections: &Selections) -> Result<()> {
    for (header, names) in selections.jobs() {
        let unknown = |name: &String| ResolveError::UnknownAlternate {
            job: header.clone(),
            name: name.clone(),
        };
        let Some(job) = definition.job(header) else {
            return match names.iter().next() {
                Some(name) => Err(unknown(name)),
                None => Ok(()),
            };
        };

        let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for name in names {
            let alternate = job.alternate(name).ok_or_else(|| unknown(name))?;
            if let Some(group) = &alternate.group {
                groups.entry(group.as_str()).or_default().push(name.clone());
            }
        }

        if let Some((group, selected)) = groups.into_iter().find(|(_, s)| s.len() > 1) {
            return Err(ResolveError::ExclusiveGroupViolation {
                job: header.clone(),
                group: group.to_string(),
                selected,
            });
        }
    }
    Ok(())
}

fn classify(game: Game, header: &JobHeader, target: &InstallTarget) -> Result<Delivery> {
    let unsupported = || ResolveError::UnsupportedGameForJob {
        game,
        job: header.clone(),
    };

    match header {
        JobHeader::Basegame | JobHeader::Localization | JobHeader::CustomDlc => {
            Ok(Delivery::Unpacked)
        }
        JobHeader::BalanceChanges if game == Game::ME3 => Ok(Delivery::Unpacked),
        JobHeader::Me1Config if game == Game::ME1 => Ok(Delivery::Unpacked),
        JobHeader::TestPatch if game == Game::ME3 => {
            Ok(delivery_for_state(target.test_patch_state(), "test patch is not installed"))
        }
        JobHeader::OfficialDlc(folder) if !game.is_legendary() => {
            let state = target.dlc_state(folder);
            let reason = format!("DLC {folder} is not installed");
            if game == Game::ME3 {
                Ok(delivery_for_state(&state, &reason))
            } else if state == DlcState::NotInstalled {
                Ok(Delivery::Skip(reason))
            } else {
                // ME1 and ME2 never ship DLC in archives
                Ok(Delivery::Unpacked)
            }
        }
        _ => Err(unsupported()),
    }
}

fn delivery_for_state(state: &DlcState, missing_reason: &str) -> Delivery {
    match state {
        DlcState::Unpacked => Delivery::Unpacked,
        DlcState::Packed { archive } => Delivery::Packed(archive.clone()),
        DlcState::NotInstalled => Delivery::Skip(missing_reason.to_string()),
    }
}

/// Base files of the job with the selected alternates applied.
fn build_file_set(job: &InstallationJob, selections: &Selections) -> Result<FileMap> {
    let mut files = FileSet::new(&job.header);
    for entry in &job.files {
        files.add(
            &entry.destination,
            InstallSourceFile::base(entry.source.clone()),
            false,
        )?;
    }

    for alternate in job
        .alternates
        .iter()
        .filter(|alt| selections.is_selected(&job.header, &alt.name))
    {
        tracing::debug!("Applying alternate '{}' to job {}", alternate.name, job.header);
        apply_alternate(&mut files, alternate)?;
    }

    Ok(files.into_inner())
}

fn apply_alternate(files: &mut FileSet, alternate: &AlternateOption) -> Result<()> {
    let name = alternate.name.as_str();
    for operation in &alternate.operations {
        match operation {
            AlternateOperation::Add {
                destination,
                source,
                overrides_existing,
            } => files.add(
                destination,
                InstallSourceFile::from_alternate(source.clone(), name),
                *overrides_existing,
            )?,
            AlternateOperation::Remove { destination } => files.remove(destination),
            AlternateOperation::Replace {
                destination,
                source,
            } => files.replace(
                destination,
                InstallSourceFile::from_alternate(source.clone(), name),
            )?,
            AlternateOperation::AddMultiList {
                root,
                target_dir,
                files: listed,
            } => {
                for file in listed {
                    files.add(
                        &join_destination(target_dir, file),
                        InstallSourceFile::from_alternate(root.join(file), name),
                        false,
                    )?;
                }
            }
            AlternateOperation::RemoveMultiList {
                target_dir,
                files: listed,
            } => {
                for file in listed {
                    files.remove(&join_destination(target_dir, file));
                }
            }
        }
    }
    Ok(())
}

fn join_destination(dir: &str, file: &str) -> String {
    let dir = clean_path(dir);
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        clean_path(file)
    } else {
        format!("{}/{}", dir, clean_path(file))
    }
}

/// Case-insensitive file set of a single job under construction.
struct FileSet<'a> {
    job: &'a JobHeader,
    files: FileMap,
}

impl<'a> FileSet<'a> {
    fn new(job: &'a JobHeader) -> Self {
        Self {
            job,
            files: FileMap::new(),
        }
    }

    fn add(&mut self, destination: &str, source: InstallSourceFile, overrides: bool) -> Result<()> {
        let key = normalize_path(destination);
        if let Some(existing) = self.files.get(&key) {
            if !overrides {
                return Err(ResolveError::Conflict {
                    job: self.job.clone(),
                    destination: existing.destination.clone(),
                    existing: existing.source.describe(),
                    incoming: source.describe(),
                });
            }
            tracing::debug!("Overriding {} with {}", existing.destination, source.describe());
        }
        self.files.insert(
            key,
            MappedFile {
                destination: clean_path(destination),
                source,
            },
        );
        Ok(())
    }

    fn remove(&mut self, destination: &str) {
        if self.files.remove(&normalize_path(destination)).is_none() {
            tracing::debug!(
                "Nothing to remove at {} in job {}",
                destination,
                self.job
            );
        }
    }

    fn replace(&mut self, destination: &str, source: InstallSourceFile) -> Result<()> {
        match self.files.get_mut(&normalize_path(destination)) {
            Some(file) => {
                file.source = source;
                Ok(())
            }
            None => Err(ResolveError::ReplaceTargetMissing {
                job: self.job.clone(),
                alternate: source.alternate.unwrap_or_default(),
                destination: destination.to_string(),
            }),
        }
    }

    fn into_inner(self) -> FileMap {
        self.files
    }
}

/// Distinct first path segments of a `CUSTOMDLC` job, in sorted order.
fn dlc_folders(files: &FileMap) -> Vec<String> {
    let mut folders: BTreeMap<String, String> = BTreeMap::new();
    for file in files.values() {
        if let Some((folder, _)) = file.destination.split_once('/') {
            folders
                .entry(folder.to_lowercase())
                .or_insert_with(|| folder.to_string());
        }
    }
    folders.into_values().collect()
}

fn check_cross_job_conflicts(mapping: &InstallMapping) -> Result<()> {
    let mut seen: HashMap<String, (&JobHeader, &MappedFile)> = HashMap::new();
    for job in mapping.unpacked_jobs() {
        for file in job.files.values() {
            let qualified = job.qualified_destination(mapping.game(), file);
            let previous = seen.insert(normalize_path(&qualified), (&job.header, file));
            if let Some((other_job, other)) = previous {
                return Err(ResolveError::Conflict {
                    job: job.header.clone(),
                    destination: qualified,
                    existing: format!("{} (job {})", other.source.describe(), other_job),
                    incoming: file.source.describe(),
                });
            }
        }
    }
    Ok(())
}
