use std::collections::BTreeMap;
use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

use crate::error::GraphMigError;

/// Base folder used when the configuration does not name one.
pub const DEFAULT_BASE_FOLDER: &str = "import";

/// Schema folder name used when the configuration does not name one.
pub const DEFAULT_SCHEMA_FOLDER: &str = "schema";

/// Extension of statement (Cypher) migration files.
pub const DEFAULT_STATEMENT_EXTENSION: &str = "cypher";

/// Extension of command migration files.
pub const DEFAULT_COMMAND_EXTENSION: &str = "run";

/// Label shared by every migration bookkeeping node whose folder does not
/// declare its own label set.
const BASE_NODE_LABEL: &str = "GraphToolMigration";

/// The batch name that always means "schema folder only".
pub const SCHEMA_BATCH: &str = "schema";

/// Reserved directory name holding snapshot files under the base folder.
pub const SNAPSHOTS_FOLDER: &str = "snapshots";

/// How migration files inside a folder are organized.
///
/// `UpDown` folders pair every forward script with a rollback script
/// sharing the same timestamp. `Change` folders hold forward-only
/// scripts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationType {
    UpDown,
    Change,
}

/// Top-level configuration. Only the planner section concerns this
/// crate; supervisor and server settings live with the external
/// collaborators that own those surfaces.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub planner: PlannerConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub base_folder: String,
    pub schema_folder: SchemaFolderConfig,
    /// Declared auxiliary folders, keyed by folder name.
    pub folders: BTreeMap<String, FolderDetail>,
    /// Declared batches, keyed by batch name. `schema` is implicit and
    /// must not be declared.
    pub batches: BTreeMap<String, BatchDetail>,
    /// Commands migration files may invoke: command token to absolute
    /// binary path.
    pub allowed_commands: BTreeMap<String, String>,
    pub statement_extension: String,
    pub command_extension: String,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            base_folder: String::new(),
            schema_folder: SchemaFolderConfig::default(),
            folders: BTreeMap::new(),
            batches: BTreeMap::new(),
            allowed_commands: BTreeMap::new(),
            statement_extension: String::new(),
            command_extension: String::new(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SchemaFolderConfig {
    pub folder_name: String,
    pub migration_type: Option<MigrationType>,
    pub node_labels: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FolderDetail {
    pub migration_type: Option<MigrationType>,
    #[serde(default)]
    pub node_labels: Vec<String>,
}

impl FolderDetail {
    pub fn new(migration_type: MigrationType) -> Self {
        FolderDetail {
            migration_type: Some(migration_type),
            node_labels: Vec::new(),
        }
    }

    pub fn with_labels(migration_type: MigrationType, labels: &[&str]) -> Self {
        FolderDetail {
            migration_type: Some(migration_type),
            node_labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BatchDetail {
    /// Auxiliary folders the batch runs, in order. The schema folder is
    /// always included implicitly ahead of these.
    pub folders: Vec<String>,
}

impl Config {
    /// Loads configuration from a TOML file, with `GRAPHMIG_*`
    /// environment variables layered on top, then normalizes and
    /// validates it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GraphMigError> {
        let figment = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("GRAPHMIG_").split("__"));
        Self::extract(figment)
    }

    /// Parses configuration from a TOML string. Intended for embedders
    /// and tests that assemble configuration programmatically.
    pub fn from_toml_str(toml: &str) -> Result<Self, GraphMigError> {
        Self::extract(Figment::new().merge(Toml::string(toml)))
    }

    fn extract(figment: Figment) -> Result<Self, GraphMigError> {
        let mut config: Config = figment
            .extract()
            .map_err(|e| GraphMigError::Config(e.to_string()))?;
        config.normalize()?;
        Ok(config)
    }

    /// Fills in defaults and derives node labels for folders that do not
    /// declare any, then validates the result.
    pub fn normalize(&mut self) -> Result<(), GraphMigError> {
        let planner = &mut self.planner;

        if planner.base_folder.trim().is_empty() {
            planner.base_folder = DEFAULT_BASE_FOLDER.to_string();
        }
        if planner.schema_folder.folder_name.trim().is_empty() {
            planner.schema_folder.folder_name = DEFAULT_SCHEMA_FOLDER.to_string();
        }
        if planner.statement_extension.trim().is_empty() {
            planner.statement_extension = DEFAULT_STATEMENT_EXTENSION.to_string();
        }
        if planner.command_extension.trim().is_empty() {
            planner.command_extension = DEFAULT_COMMAND_EXTENSION.to_string();
        }

        planner
            .schema_folder
            .migration_type
            .get_or_insert(MigrationType::UpDown);
        if planner.schema_folder.node_labels.is_empty() {
            planner.schema_folder.node_labels =
                derive_node_labels(&planner.schema_folder.folder_name);
        }

        for (folder_name, detail) in planner.folders.iter_mut() {
            detail.migration_type.get_or_insert(MigrationType::Change);
            if detail.node_labels.is_empty() {
                detail.node_labels = derive_node_labels(folder_name);
            }
        }

        self.validate()
    }

    /// Checks naming and reference rules. Does not require node labels:
    /// a folder with an empty label set only fails once an execution
    /// plan actually needs to record its migrations.
    pub fn validate(&self) -> Result<(), GraphMigError> {
        let planner = &self.planner;
        let schema_name = &planner.schema_folder.folder_name;

        if planner.base_folder.is_empty() {
            return Err(GraphMigError::Config("base folder name is empty".into()));
        }
        if schema_name.is_empty() {
            return Err(GraphMigError::Config("schema folder name is empty".into()));
        }
        if schema_name == SNAPSHOTS_FOLDER {
            return Err(GraphMigError::Config(format!(
                "schema folder cannot use reserved name '{SNAPSHOTS_FOLDER}'"
            )));
        }

        for folder_name in planner.folders.keys() {
            if folder_name.is_empty() {
                return Err(GraphMigError::Config("folder with empty name".into()));
            }
            if folder_name == SNAPSHOTS_FOLDER {
                return Err(GraphMigError::Config(format!(
                    "folder cannot use reserved name '{SNAPSHOTS_FOLDER}'"
                )));
            }
            if folder_name == schema_name {
                return Err(GraphMigError::Config(format!(
                    "folder '{folder_name}' collides with the schema folder"
                )));
            }
        }

        for (batch_name, batch) in &planner.batches {
            if batch_name.is_empty() {
                return Err(GraphMigError::Config("batch with empty name".into()));
            }
            if batch_name == SCHEMA_BATCH {
                return Err(GraphMigError::Config(format!(
                    "batch cannot use reserved name '{SCHEMA_BATCH}'"
                )));
            }
            let mut seen = Vec::with_capacity(batch.folders.len());
            for folder in &batch.folders {
                if !planner.folders.contains_key(folder) {
                    return Err(GraphMigError::Config(format!(
                        "batch '{batch_name}' references undeclared folder '{folder}'"
                    )));
                }
                if seen.contains(&folder) {
                    return Err(GraphMigError::Config(format!(
                        "duplicate folder '{folder}' in batch '{batch_name}'"
                    )));
                }
                seen.push(folder);
            }
        }

        for (command, path) in &planner.allowed_commands {
            if command.is_empty() {
                return Err(GraphMigError::Config("allowed command with empty name".into()));
            }
            if path.is_empty() || !Path::new(path).is_absolute() {
                return Err(GraphMigError::Config(format!(
                    "allowed command '{command}' must map to an absolute path, got '{path}'"
                )));
            }
        }

        if planner.statement_extension.is_empty() || planner.command_extension.is_empty() {
            return Err(GraphMigError::Config("file extensions cannot be empty".into()));
        }
        if planner.statement_extension == planner.command_extension {
            return Err(GraphMigError::Config(format!(
                "statement and command extensions must differ, both are '{}'",
                planner.statement_extension
            )));
        }

        Ok(())
    }
}

impl PlannerConfig {
    /// Migration type of the schema folder or a declared auxiliary
    /// folder. `None` for undeclared folders.
    pub(crate) fn migration_type_of(&self, folder_name: &str) -> Option<MigrationType> {
        if folder_name == self.schema_folder.folder_name {
            self.schema_folder.migration_type
        } else {
            self.folders.get(folder_name).and_then(|d| d.migration_type)
        }
    }

    /// Node labels recorded for migrations of the given folder. Empty
    /// for undeclared folders.
    pub(crate) fn node_labels_of(&self, folder_name: &str) -> &[String] {
        if folder_name == self.schema_folder.folder_name {
            &self.schema_folder.node_labels
        } else {
            self.folders
                .get(folder_name)
                .map(|d| d.node_labels.as_slice())
                .unwrap_or(&[])
        }
    }
}

/// Derives the default label set for a folder: the shared migration
/// label plus the folder name in pascal case with a `Version` suffix,
/// e.g. `schema` becomes `["GraphToolMigration", "SchemaVersion"]`.
fn derive_node_labels(folder_name: &str) -> Vec<String> {
    let pascal: String = folder_name
        .split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();

    vec![BASE_NODE_LABEL.to_string(), format!("{pascal}Version")]
}
