use std::fs;
use std::io;
use std::path::Path;

use log::debug;
use semver::Version;

use crate::config::{Config, SCHEMA_BATCH};
use crate::error::GraphMigError;
use crate::model::{DatabaseGraphVersion, DatabaseModel};
use crate::scanner::{LocalFolders, MigrationFile, MigrationScripts, Scanner};
use crate::session::{CypherValue, ReadSession};
use crate::target::{parse_version, TargetVersion};

/// Receives every migration file selected by [`Planner::plan`], in
/// execution order. The default implementation renders execution steps
/// (see [`crate::execution`]); custom builders can collect, filter or
/// reorder however they like. Any error aborts the remaining plan.
///
/// Closures of the matching shape implement the trait, which keeps
/// tests and one-off callers lightweight.
pub trait Builder {
    fn build(&mut self, file: &MigrationFile, version: &Version) -> Result<(), GraphMigError>;
}

impl<F> Builder for F
where
    F: FnMut(&MigrationFile, &Version) -> Result<(), GraphMigError>,
{
    fn build(&mut self, file: &MigrationFile, version: &Version) -> Result<(), GraphMigError> {
        self(file, version)
    }
}

/// Decides which migration files run, and in which order, to move the
/// graph from its recorded state to a target version.
pub struct Planner {
    config: Config,
}

impl Planner {
    /// Creates a planner over a validated configuration.
    pub fn new(config: Config) -> Result<Self, GraphMigError> {
        config.validate()?;
        Ok(Planner { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a scanner rooted at `base_dir`, which must exist and be
    /// a directory.
    pub fn new_scanner(&self, base_dir: impl AsRef<Path>) -> Result<Scanner<'_>, GraphMigError> {
        let base_dir = base_dir.as_ref();
        match fs::metadata(base_dir) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(GraphMigError::DirectoryMissing(base_dir.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
            Ok(meta) if !meta.is_dir() => {
                return Err(GraphMigError::NotADirectory(base_dir.to_path_buf()))
            }
            Ok(_) => {}
        }
        Scanner::new(&self.config, base_dir)
    }

    /// Builds the execution plan and feeds it to `builder`, one call
    /// per selected migration file.
    ///
    /// Upgrades come first, versions ascending and files ascending by
    /// timestamp within a version; downgrades follow, versions
    /// descending and files descending. With no target, the plan runs
    /// up to the highest version in the catalog. An empty database
    /// combined with a usable snapshot for the batch replaces all
    /// per-file work at and below the snapshot's version.
    pub fn plan(
        &self,
        local_folders: &LocalFolders,
        db_model: &DatabaseModel,
        target: Option<&TargetVersion>,
        batch: &str,
        builder: &mut dyn Builder,
    ) -> Result<(), GraphMigError> {
        let planner_cfg = &self.config.planner;

        // `schema` is the implicit batch running no auxiliary folders.
        let batch_folders: &[String] = if batch == SCHEMA_BATCH {
            &[]
        } else {
            planner_cfg
                .batches
                .get(batch)
                .map(|b| b.folders.as_slice())
                .ok_or_else(|| GraphMigError::UnknownBatch(batch.to_string()))?
        };

        let mut entries: Vec<&_> = local_folders.iter().collect();
        entries.sort_by(|a, b| a.version.cmp(&b.version));

        if let (Some(last), Some(target)) = (entries.last(), target) {
            if last.version < target.version {
                return Err(GraphMigError::TargetOutOfRange(target.version.to_string()));
            }
        }

        // Reserved knob; nothing wires it to configuration yet.
        let prevent_snapshot = false;

        struct VersionPlan {
            scripts: MigrationScripts,
            version: Version,
        }
        let mut plan: Vec<VersionPlan> = Vec::new();

        for entry in &entries {
            if !prevent_snapshot && !db_model.has_any_version() {
                if let Some(snapshot) = entry.snapshots.get(batch) {
                    let usable = match target {
                        None => true,
                        Some(t) if entry.version < t.version => true,
                        // A snapshot carries every revision of its own
                        // version, so it only fits an exact-version
                        // target when no revision is pinned.
                        Some(t) => entry.version == t.version && t.revision == 0,
                    };
                    if usable {
                        plan = vec![VersionPlan {
                            scripts: MigrationScripts {
                                up: vec![snapshot.clone()],
                                down: Vec::new(),
                            },
                            version: entry.version.clone(),
                        }];
                        continue;
                    }
                }
            }

            let mut files_to_run = self.plan_folder(
                &planner_cfg.schema_folder.folder_name,
                &entry.version,
                Some(&entry.schema_scripts),
                db_model,
                target,
            );
            for batch_folder in batch_folders {
                files_to_run.add(self.plan_folder(
                    batch_folder,
                    &entry.version,
                    entry.extra_folders.get(batch_folder),
                    db_model,
                    target,
                ));
            }

            if files_to_run.contains_migrations() {
                plan.push(VersionPlan {
                    scripts: files_to_run,
                    version: entry.version.clone(),
                });
            }
        }

        debug!(
            "plan covers {} version(s) for batch '{}'",
            plan.len(),
            batch
        );

        for version_plan in plan.iter_mut() {
            version_plan.scripts.sort_up_files();
            for file in &version_plan.scripts.up {
                builder.build(file, &version_plan.version)?;
            }
        }
        for version_plan in plan.iter_mut().rev() {
            version_plan.scripts.sort_down_files();
            for file in &version_plan.scripts.down {
                builder.build(file, &version_plan.version)?;
            }
        }

        Ok(())
    }

    /// Picks the files to run for one folder at one catalog version,
    /// given the target and what the database already recorded.
    fn plan_folder(
        &self,
        folder_name: &str,
        folder_version: &Version,
        folder_scripts: Option<&MigrationScripts>,
        db_model: &DatabaseModel,
        target: Option<&TargetVersion>,
    ) -> MigrationScripts {
        // Reserved knobs; nothing wires them to configuration yet.
        // `run_outdated` would re-run gaps in versions already
        // superseded; `prevent_rollback` would suppress downgrades.
        let run_outdated = false;
        let prevent_rollback = false;

        let Some(folder_scripts) = folder_scripts else {
            return MigrationScripts::default();
        };

        let executed = db_model.get_file_timestamps(folder_name, folder_version);
        let mut files_to_run = MigrationScripts::default();

        let below_target = match target {
            None => true,
            Some(t) => *folder_version < t.version,
        };

        if below_target {
            if db_model.contains_higher_version(folder_name, folder_version) && !run_outdated {
                // A later version of this folder is already applied;
                // this one is considered superseded.
                return files_to_run;
            }
            files_to_run.up = plan_upgrade(folder_scripts, executed, 0);
        } else if let Some(t) = target {
            if *folder_version == t.version {
                files_to_run.up = plan_upgrade(folder_scripts, executed, t.revision);
                files_to_run.down = plan_downgrade(folder_scripts, executed, t.revision);
            } else if !prevent_rollback {
                files_to_run.down = plan_downgrade(folder_scripts, executed, -1);
            }
        }

        files_to_run
    }

    /// Reads the graph's migration state: per folder, all non-tombstoned
    /// bookkeeping nodes grouped by version with their executed file
    /// timestamps.
    pub fn version(&self, session: &mut dyn ReadSession) -> Result<DatabaseModel, GraphMigError> {
        let planner_cfg = &self.config.planner;
        let mut model = DatabaseModel::new();

        let schema = &planner_cfg.schema_folder;
        let versions = query_version(session, &schema.node_labels)?;
        if !versions.is_empty() {
            model.insert(schema.folder_name.clone(), versions);
        }

        for (folder_name, detail) in &planner_cfg.folders {
            let versions = query_version(session, &detail.node_labels)?;
            if !versions.is_empty() {
                model.insert(folder_name.clone(), versions);
            }
        }

        debug!("database model: {model}");
        Ok(model)
    }
}

/// Up files to run: everything at or below the revision cap that the
/// database has not recorded. Cap zero means "no cap".
fn plan_upgrade(
    folder_scripts: &MigrationScripts,
    executed: Option<&std::collections::BTreeSet<i64>>,
    target_commit: i64,
) -> Vec<MigrationFile> {
    let cap = if target_commit == 0 {
        i64::MAX
    } else {
        target_commit
    };

    folder_scripts
        .up
        .iter()
        .filter(|f| f.timestamp <= cap && !executed.is_some_and(|e| e.contains(&f.timestamp)))
        .cloned()
        .collect()
}

/// Down files to run: everything above the revision cap that the
/// database recorded as executed. Cap zero means "no cap"; a negative
/// cap rolls back the whole version.
fn plan_downgrade(
    folder_scripts: &MigrationScripts,
    executed: Option<&std::collections::BTreeSet<i64>>,
    target_commit: i64,
) -> Vec<MigrationFile> {
    let cap = if target_commit == 0 {
        i64::MAX
    } else {
        target_commit
    };

    folder_scripts
        .down
        .iter()
        .filter(|f| f.timestamp > cap && executed.is_some_and(|e| e.contains(&f.timestamp)))
        .cloned()
        .collect()
}

fn query_version(
    session: &mut dyn ReadSession,
    node_labels: &[String],
) -> Result<Vec<DatabaseGraphVersion>, GraphMigError> {
    let query = format!(
        "MATCH (sm:{}) WHERE sm.deleted_at IS NULL \
         RETURN sm.version AS version, collect(sm.file) AS files",
        node_labels.join(":")
    );

    let rows = session.execute_read(&query, &[])?;
    let mut versions = Vec::with_capacity(rows.len());
    for row in rows {
        let version_str = match row.get("version") {
            Some(CypherValue::String(s)) => s.clone(),
            _ => String::new(),
        };
        if version_str.is_empty() {
            return Err(GraphMigError::InvalidVersionFromResponse(version_str));
        }
        let version = parse_version(&version_str)
            .map_err(|_| GraphMigError::InvalidVersionFromResponse(version_str.clone()))?;

        let mut file_timestamps = std::collections::BTreeSet::new();
        match row.get("files") {
            Some(CypherValue::List(values)) => {
                for value in values {
                    match value {
                        CypherValue::Integer(i) => {
                            file_timestamps.insert(*i);
                        }
                        // Files should never be floats, but a manually
                        // edited graph can hold them.
                        CypherValue::Float(f) => {
                            file_timestamps.insert(*f as i64);
                        }
                        other => {
                            return Err(GraphMigError::FileNumberTypeMismatch {
                                value: other.to_string(),
                                kind: other.type_name(),
                            })
                        }
                    }
                }
            }
            _ => return Err(GraphMigError::InvalidFilesList),
        }

        versions.push(DatabaseGraphVersion {
            version,
            file_timestamps,
        });
    }

    Ok(versions)
}
