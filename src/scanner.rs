use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use log::{debug, info};
use regex::{Captures, Regex};
use semver::Version;

use crate::config::{Config, MigrationType, SCHEMA_BATCH, SNAPSHOTS_FOLDER};
use crate::error::GraphMigError;
use crate::target::{parse_version, TargetVersion};

/// Hidden marker file keeping a version folder in the catalog even when
/// it holds no up scripts. Matched case-insensitively.
const KEEP_VERSION_MARKER: &str = ".keep_version_folder";

/// Payload kind of a migration file, decided by its extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    Cypher,
    Command,
}

/// A single migration file with everything the planner and the builders
/// need to run it.
#[derive(Clone, Debug, PartialEq)]
pub struct MigrationFile {
    pub folder_name: String,
    pub path: PathBuf,
    pub file_type: FileType,
    /// The leading integer of the file name; orders files within a
    /// version. Zero only for snapshots.
    pub timestamp: i64,
    pub is_downgrade: bool,
    pub is_snapshot: bool,
}

/// Up and down scripts of one folder at one version. `Change` type
/// folders only ever populate the up side.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MigrationScripts {
    pub up: Vec<MigrationFile>,
    pub down: Vec<MigrationFile>,
}

impl MigrationScripts {
    /// True if there is at least one up or down migration.
    pub fn contains_migrations(&self) -> bool {
        !self.up.is_empty() || !self.down.is_empty()
    }

    /// Merges another script set into this one.
    pub fn add(&mut self, other: MigrationScripts) {
        self.up.extend(other.up);
        self.down.extend(other.down);
    }

    /// Sorts up files ascending by timestamp. The sort is stable, so
    /// files sharing a timestamp keep their folder iteration order.
    pub fn sort_up_files(&mut self) {
        self.up.sort_by_key(|f| f.timestamp);
    }

    /// Sorts down files descending by timestamp, stable as above.
    pub fn sort_down_files(&mut self) {
        self.down.sort_by_key(|f| std::cmp::Reverse(f.timestamp));
    }
}

/// All migration files of a single version across the schema folder,
/// the auxiliary folders, and any per-batch snapshots.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalVersionFolder {
    pub version: Version,
    pub schema_scripts: MigrationScripts,
    /// Auxiliary folder scripts at this version, keyed by folder name.
    pub extra_folders: BTreeMap<String, MigrationScripts>,
    /// Snapshot files at this version, keyed by batch name.
    pub snapshots: BTreeMap<String, MigrationFile>,
}

/// The scanned catalog: one entry per version found on disk. Not sorted
/// by default; call [`LocalFolders::sort_by_version`] before relying on
/// order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalFolders(Vec<LocalVersionFolder>);

impl LocalFolders {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LocalVersionFolder> {
        self.0.iter()
    }

    pub fn get(&self, index: usize) -> Option<&LocalVersionFolder> {
        self.0.get(index)
    }

    /// Sorts catalog entries ascending by version.
    pub fn sort_by_version(&mut self) {
        self.0.sort_by(|a, b| a.version.cmp(&b.version));
    }
}

impl<'a> IntoIterator for &'a LocalFolders {
    type Item = &'a LocalVersionFolder;
    type IntoIter = std::slice::Iter<'a, LocalVersionFolder>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Scans a base directory for migration folders, validating names and
/// up/down consistency, and generates new migration file stubs.
///
/// Produced by [`crate::planner::Planner::new_scanner`]; borrows the
/// planner's configuration for the folder layout, extensions and batch
/// names.
#[derive(Debug)]
pub struct Scanner<'a> {
    config: &'a Config,
    base_dir: PathBuf,
    up_down_pattern: Regex,
    change_pattern: Regex,
    snapshot_pattern: Regex,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(config: &'a Config, base_dir: &Path) -> Result<Self, GraphMigError> {
        let statement = regex::escape(&config.planner.statement_extension);
        let command = regex::escape(&config.planner.command_extension);
        let ext = format!("{statement}|{command}");

        let compile = |pattern: String| {
            Regex::new(&pattern)
                .map_err(|e| GraphMigError::Config(format!("invalid file name pattern: {e}")))
        };

        Ok(Scanner {
            config,
            base_dir: base_dir.to_path_buf(),
            up_down_pattern: compile(format!(
                r"(?i)^(?P<commit>\d+)_(?P<direction>up|down)_(?P<name>\w+)\.(?P<type>{ext})$"
            ))?,
            change_pattern: compile(format!(
                r"(?i)^(?P<commit>\d+)_(?P<name>\w+)\.(?P<type>{ext})$"
            ))?,
            snapshot_pattern: compile(format!(
                r"^(?P<batch>.+)_v(?P<version>[0-9.]+)\.(?P<type>{ext})$"
            ))?,
        })
    }

    /// Joins `dir` onto the base directory, dropping any path
    /// components that would escape it.
    fn resolve(&self, dir: &str) -> PathBuf {
        let cleaned: PathBuf = Path::new(dir)
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        self.base_dir.join(cleaned)
    }

    /// Scans the schema folder, every declared auxiliary folder and the
    /// snapshots directory, returning all migration files grouped per
    /// version. The result order follows directory enumeration; use
    /// [`LocalFolders::sort_by_version`] for version order.
    pub fn scan_folders(&self) -> Result<LocalFolders, GraphMigError> {
        info!(
            "scanning migration folders under '{}'",
            self.base_dir.display()
        );
        let mut local_folders = self.scan_schema_and_extra_folders()?;
        self.add_snapshots(&mut local_folders)?;
        debug!("found {} version folder(s)", local_folders.len());
        Ok(local_folders)
    }

    fn scan_schema_and_extra_folders(&self) -> Result<LocalFolders, GraphMigError> {
        let schema = &self.config.planner.schema_folder;
        let schema_type = schema.migration_type.unwrap_or(MigrationType::UpDown);

        let mut local_folders = LocalFolders::default();
        self.open_versions(&schema.folder_name, |version, dir_path| {
            let scripts = self.scan_typed_folder(&schema.folder_name, dir_path, schema_type)?;

            // Versions with no up scripts stay out of the catalog unless
            // the keep marker is present.
            if scripts.up.is_empty() && !has_keep_marker(dir_path)? {
                return Ok(());
            }

            local_folders.0.push(LocalVersionFolder {
                version: version.clone(),
                schema_scripts: scripts,
                extra_folders: BTreeMap::new(),
                snapshots: BTreeMap::new(),
            });
            Ok(())
        })?;

        for (folder_name, detail) in &self.config.planner.folders {
            let folder_type = detail.migration_type.unwrap_or(MigrationType::Change);
            self.open_versions(folder_name, |version, dir_path| {
                let entry = local_folders
                    .0
                    .iter_mut()
                    .find(|v| v.version == *version)
                    .ok_or_else(|| {
                        GraphMigError::UnspecifiedSchemaVersion(dir_path.to_path_buf())
                    })?;

                let scripts = self.scan_typed_folder(folder_name, dir_path, folder_type)?;
                entry.extra_folders.insert(folder_name.clone(), scripts);
                Ok(())
            })?;
        }

        Ok(local_folders)
    }

    /// Enumerates the per-version subdirectories of `folder_name` and
    /// calls `op` with each parsed version and its path.
    fn open_versions<F>(&self, folder_name: &str, mut op: F) -> Result<(), GraphMigError>
    where
        F: FnMut(&Version, &Path) -> Result<(), GraphMigError>,
    {
        let dir_path = self.resolve(folder_name);
        check_directory(&dir_path)?;

        for entry in fs::read_dir(&dir_path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if !name.starts_with('v') {
                return Err(GraphMigError::InvalidFolderName {
                    name,
                    dir: dir_path.clone(),
                });
            }
            let version = parse_version(&name).map_err(|e| match e {
                GraphMigError::InvalidVersion { input, source } => {
                    GraphMigError::InvalidVersionAt {
                        input,
                        path: dir_path.join(&name),
                        source,
                    }
                }
                other => other,
            })?;

            op(&version, &dir_path.join(&name))?;
        }

        Ok(())
    }

    fn scan_typed_folder(
        &self,
        folder_name: &str,
        dir_path: &Path,
        migration_type: MigrationType,
    ) -> Result<MigrationScripts, GraphMigError> {
        match migration_type {
            MigrationType::UpDown => self.scan_up_down_folder(folder_name, dir_path),
            MigrationType::Change => self.scan_folder(folder_name, dir_path, &self.change_pattern),
        }
    }

    /// Scans an `up_down` folder and verifies that every up script has
    /// exactly one down counterpart with the same timestamp.
    fn scan_up_down_folder(
        &self,
        folder_name: &str,
        dir_path: &Path,
    ) -> Result<MigrationScripts, GraphMigError> {
        let scripts = self.scan_folder(folder_name, dir_path, &self.up_down_pattern)?;

        let (up, down) = (scripts.up.len(), scripts.down.len());
        if up != down {
            return Err(GraphMigError::UpDownCountMismatch {
                dir: dir_path.to_path_buf(),
                up,
                down,
            });
        }

        // Up is sorted ascending, down descending: counterparts meet in
        // the middle.
        for (i, up_file) in scripts.up.iter().enumerate() {
            if scripts.down[down - i - 1].timestamp != up_file.timestamp {
                return Err(GraphMigError::MissingDownCounterpart(up_file.path.clone()));
            }
        }

        Ok(scripts)
    }

    fn scan_folder(
        &self,
        folder_name: &str,
        dir_path: &Path,
        pattern: &Regex,
    ) -> Result<MigrationScripts, GraphMigError> {
        check_directory(dir_path)?;

        let mut scripts = MigrationScripts::default();
        for entry in fs::read_dir(dir_path)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() || file_name.starts_with('.') {
                continue;
            }

            let path = dir_path.join(&file_name);
            let captures = pattern
                .captures(&file_name)
                .ok_or_else(|| GraphMigError::InvalidFileName(path.clone()))?;
            let file = self.parse_file_name(folder_name, path, &captures)?;

            if file.is_downgrade {
                if scripts.down.iter().any(|f| f.timestamp == file.timestamp) {
                    return Err(GraphMigError::DuplicateDownTimestamp {
                        timestamp: file.timestamp,
                        dir: dir_path.to_path_buf(),
                    });
                }
                scripts.down.push(file);
            } else {
                if scripts.up.iter().any(|f| f.timestamp == file.timestamp) {
                    return Err(GraphMigError::DuplicateUpTimestamp {
                        timestamp: file.timestamp,
                        dir: dir_path.to_path_buf(),
                    });
                }
                scripts.up.push(file);
            }
        }

        // Directory enumeration order is not lexical everywhere; sort
        // before anything downstream relies on it.
        scripts.sort_up_files();
        scripts.sort_down_files();
        Ok(scripts)
    }

    fn parse_file_name(
        &self,
        folder_name: &str,
        path: PathBuf,
        captures: &Captures<'_>,
    ) -> Result<MigrationFile, GraphMigError> {
        let timestamp: i64 = captures["commit"]
            .parse()
            .map_err(|source| GraphMigError::TimestampParse {
                path: path.clone(),
                source,
            })?;
        if timestamp == 0 {
            return Err(GraphMigError::ForbiddenZeroTimestamp(path));
        }

        let is_downgrade = captures
            .name("direction")
            .map(|m| m.as_str().eq_ignore_ascii_case("down"))
            .unwrap_or(false);

        Ok(MigrationFile {
            folder_name: folder_name.to_string(),
            path,
            file_type: self.file_type_of(&captures["type"]),
            timestamp,
            is_downgrade,
            is_snapshot: false,
        })
    }

    fn file_type_of(&self, extension: &str) -> FileType {
        if extension.eq_ignore_ascii_case(&self.config.planner.command_extension) {
            FileType::Command
        } else {
            FileType::Cypher
        }
    }

    /// Attaches snapshot files to the catalog entries whose version they
    /// name. A missing snapshots directory is fine; anything else about
    /// a snapshot that does not line up is an error.
    fn add_snapshots(&self, local_folders: &mut LocalFolders) -> Result<(), GraphMigError> {
        let dir_path = self.resolve(SNAPSHOTS_FOLDER);
        match fs::metadata(&dir_path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
            Ok(meta) if !meta.is_dir() => {
                return Err(GraphMigError::NotADirectory(dir_path));
            }
            Ok(_) => {}
        }

        for entry in fs::read_dir(&dir_path)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with('.') {
                continue;
            }

            let captures = self
                .snapshot_pattern
                .captures(&file_name)
                .ok_or_else(|| GraphMigError::InvalidSnapshotName(file_name.clone()))?;

            let batch_name = &captures["batch"];
            if batch_name != SCHEMA_BATCH
                && !self.config.planner.batches.contains_key(batch_name)
            {
                return Err(GraphMigError::UnknownSnapshotBatch {
                    batch: batch_name.to_string(),
                    name: file_name.clone(),
                });
            }

            let version = Version::parse(&captures["version"]).map_err(|source| {
                GraphMigError::InvalidSnapshotVersion {
                    name: file_name.clone(),
                    source,
                }
            })?;

            let entry_for_version = local_folders
                .0
                .iter_mut()
                .find(|v| v.version == version)
                .ok_or_else(|| GraphMigError::SnapshotVersionUnmatched {
                    version: version.to_string(),
                    name: file_name.clone(),
                })?;

            entry_for_version.snapshots.insert(
                batch_name.to_string(),
                MigrationFile {
                    folder_name: SNAPSHOTS_FOLDER.to_string(),
                    path: dir_path.join(&file_name),
                    file_type: self.file_type_of(&captures["type"]),
                    timestamp: 0,
                    is_downgrade: false,
                    is_snapshot: true,
                },
            );
        }

        Ok(())
    }

    /// Writes migration file stubs for the given folder and target.
    ///
    /// The target must carry a version and a non-zero revision; the
    /// revision becomes the new files' timestamp. `up_down` folders get
    /// an up/down pair, `change` folders a single file. The per-version
    /// directory is created when missing; existing files with the same
    /// name are overwritten. Returns the paths of all files written.
    pub fn generate_migration_files(
        &self,
        folder_name: &str,
        target: Option<&TargetVersion>,
        migration_name: &str,
        up_type: FileType,
        down_type: FileType,
    ) -> Result<Vec<PathBuf>, GraphMigError> {
        let migration_type = self
            .config
            .planner
            .migration_type_of(folder_name)
            .ok_or_else(|| GraphMigError::UnknownFolder(folder_name.to_string()))?;

        let target = match target {
            Some(t) if t.revision != 0 => t,
            _ => return Err(GraphMigError::InvalidVersionOrRevision),
        };

        let folder_dir = self.resolve(folder_name);
        if !folder_dir.is_dir() {
            return Err(GraphMigError::UnknownFolder(folder_name.to_string()));
        }

        let version_dir = folder_dir.join(format!("v{}", target.version));
        if !version_dir.exists() {
            fs::create_dir(&version_dir)?;
            set_mode(&version_dir, 0o755)?;
        }

        let mut paths = Vec::new();
        match migration_type {
            MigrationType::UpDown => {
                paths.push(self.write_stub(
                    &version_dir,
                    &format!("{}_up_{}", target.revision, migration_name),
                    up_type,
                )?);
                paths.push(self.write_stub(
                    &version_dir,
                    &format!("{}_down_{}", target.revision, migration_name),
                    down_type,
                )?);
            }
            MigrationType::Change => {
                paths.push(self.write_stub(
                    &version_dir,
                    &format!("{}_{}", target.revision, migration_name),
                    up_type,
                )?);
            }
        }

        info!(
            "generated {} migration file(s) in '{}'",
            paths.len(),
            version_dir.display()
        );
        Ok(paths)
    }

    fn write_stub(
        &self,
        version_dir: &Path,
        stem: &str,
        file_type: FileType,
    ) -> Result<PathBuf, GraphMigError> {
        let (extension, content) = match file_type {
            FileType::Cypher => (&self.config.planner.statement_extension, "return 1;\n"),
            FileType::Command => (&self.config.planner.command_extension, "exit\n"),
        };
        let path = version_dir.join(format!("{stem}.{extension}"));
        fs::write(&path, content)?;
        set_mode(&path, 0o644)?;
        Ok(path)
    }
}

/// Fails with the directory-shaped errors when `path` is missing or not
/// a directory.
fn check_directory(path: &Path) -> Result<(), GraphMigError> {
    match fs::metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(GraphMigError::DirectoryMissing(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
        Ok(meta) if !meta.is_dir() => Err(GraphMigError::NotADirectory(path.to_path_buf())),
        Ok(_) => Ok(()),
    }
}

fn has_keep_marker(dir_path: &Path) -> Result<bool, GraphMigError> {
    for entry in fs::read_dir(dir_path)? {
        let entry = entry?;
        if entry
            .file_name()
            .to_string_lossy()
            .eq_ignore_ascii_case(KEEP_VERSION_MARKER)
        {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), GraphMigError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), GraphMigError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Planner;
    use crate::test_support::{standard_config, standard_tree, write_file};

    fn scan(config: &Config, base: &Path) -> Result<LocalFolders, GraphMigError> {
        let planner = Planner::new(config.clone()).unwrap();
        let scanner = planner.new_scanner(base)?;
        let folders = scanner.scan_folders()?;
        Ok(folders)
    }

    fn migration(
        folder: &str,
        path: PathBuf,
        file_type: FileType,
        timestamp: i64,
        is_downgrade: bool,
    ) -> MigrationFile {
        MigrationFile {
            folder_name: folder.to_string(),
            path,
            file_type,
            timestamp,
            is_downgrade,
            is_snapshot: false,
        }
    }

    #[test]
    fn missing_base_directory() {
        let config = standard_config();
        let planner = Planner::new(config).unwrap();
        let err = planner.new_scanner("no/such/dir").unwrap_err();
        assert!(matches!(err, GraphMigError::DirectoryMissing(_)));
    }

    #[test]
    fn base_path_must_be_directory() {
        let tree = tempfile::TempDir::new().unwrap();
        let file = tree.path().join("base");
        fs::write(&file, "not a dir").unwrap();

        let planner = Planner::new(standard_config()).unwrap();
        let err = planner.new_scanner(&file).unwrap_err();
        assert!(matches!(err, GraphMigError::NotADirectory(_)));
    }

    #[test]
    fn full_standard_tree_scan() {
        let tree = standard_tree();
        let config = standard_config();
        let mut folders = scan(&config, tree.path()).unwrap();
        assert_eq!(folders.len(), 4);

        folders.sort_by_version();
        let base = tree.path();

        let v100 = folders.get(0).unwrap();
        assert_eq!(v100.version, Version::new(1, 0, 0));
        assert_eq!(
            v100.schema_scripts.up,
            vec![
                migration(
                    "schema",
                    base.join("schema/v1.0.0/1000_up_core.cypher"),
                    FileType::Cypher,
                    1000,
                    false
                ),
                migration(
                    "schema",
                    base.join("schema/v1.0.0/2000_up_test_cmd.run"),
                    FileType::Command,
                    2000,
                    false
                ),
            ]
        );
        assert_eq!(
            v100.schema_scripts.down,
            vec![
                migration(
                    "schema",
                    base.join("schema/v1.0.0/2000_down_test_cmd.cypher"),
                    FileType::Cypher,
                    2000,
                    true
                ),
                migration(
                    "schema",
                    base.join("schema/v1.0.0/1000_down_core.cypher"),
                    FileType::Cypher,
                    1000,
                    true
                ),
            ]
        );
        assert_eq!(
            v100.extra_folders["data"].up,
            vec![migration(
                "data",
                base.join("data/v1.0.0/1400_test.cypher"),
                FileType::Cypher,
                1400,
                false
            )]
        );
        assert!(v100.extra_folders["data"].down.is_empty());
        assert_eq!(v100.snapshots.len(), 2);
        assert!(v100.snapshots["schema"].is_snapshot);
        assert_eq!(v100.snapshots["schema"].file_type, FileType::Cypher);
        assert_eq!(v100.snapshots["seed"].file_type, FileType::Command);
        assert_eq!(
            v100.snapshots["seed"].path,
            base.join("snapshots/seed_v1.0.0.run")
        );

        let v101 = folders.get(1).unwrap();
        assert_eq!(v101.version, Version::new(1, 0, 1));
        assert_eq!(v101.schema_scripts.up.len(), 2);
        assert_eq!(
            v101.extra_folders["data"].up.iter().map(|f| f.timestamp).collect::<Vec<_>>(),
            [1300, 1400, 4800]
        );
        assert_eq!(
            v101.extra_folders["perf"].up.iter().map(|f| f.timestamp).collect::<Vec<_>>(),
            [1350, 2800]
        );
        assert_eq!(
            v101.extra_folders["perf"].down.iter().map(|f| f.timestamp).collect::<Vec<_>>(),
            [2800, 1350]
        );
        assert!(v101.snapshots.is_empty());

        let v102 = folders.get(2).unwrap();
        assert_eq!(v102.version, Version::new(1, 0, 2));
        assert_eq!(
            v102.schema_scripts.up.iter().map(|f| f.timestamp).collect::<Vec<_>>(),
            [1850, 2100, 2200]
        );
        assert_eq!(
            v102.schema_scripts.down.iter().map(|f| f.timestamp).collect::<Vec<_>>(),
            [2200, 2100, 1850]
        );
        assert!(!v102.extra_folders.contains_key("data"));
        assert_eq!(v102.snapshots.len(), 1);
        assert_eq!(
            v102.snapshots["perf-seed"].path,
            base.join("snapshots/perf-seed_v1.0.2.cypher")
        );

        // Kept alive by the marker file alone.
        let v103 = folders.get(3).unwrap();
        assert_eq!(v103.version, Version::new(1, 0, 3));
        assert!(v103.schema_scripts.up.is_empty());
        assert!(v103.schema_scripts.down.is_empty());
    }

    #[test]
    fn version_without_up_scripts_is_omitted() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.0/100_up_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.0/100_down_a.cypher", "return 1;\n");
        fs::create_dir_all(tree.path().join("schema/v1.0.1")).unwrap();

        let folders = scan(&standard_config_schema_only(), tree.path()).unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders.get(0).unwrap().version, Version::new(1, 0, 0));
    }

    #[test]
    fn keep_marker_is_case_insensitive() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.0/100_up_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.0/100_down_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.1/.KEEP_Version_Folder", "");

        let mut folders = scan(&standard_config_schema_only(), tree.path()).unwrap();
        folders.sort_by_version();
        assert_eq!(folders.len(), 2);
        assert_eq!(folders.get(1).unwrap().version, Version::new(1, 0, 1));
    }

    fn standard_config_schema_only() -> Config {
        Config::from_toml_str("").unwrap()
    }

    #[test]
    fn change_folder_without_schema_version_is_rejected() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.0/100_up_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.0/100_down_a.cypher", "return 1;\n");
        write_file(tree.path(), "data/v2.0.0/100_b.cypher", "return 1;\n");

        let err = scan(&standard_config(), tree.path()).unwrap_err();
        match err {
            GraphMigError::UnspecifiedSchemaVersion(path) => {
                assert!(path.ends_with("data/v2.0.0"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_down_counterpart() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.1/100_up_plan.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.1/100_down_plan.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.1/200_up_contract.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.1/300_down_contract.cypher", "return 1;\n");

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        match err {
            GraphMigError::MissingDownCounterpart(path) => {
                assert!(path.ends_with("schema/v1.0.1/200_up_contract.cypher"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn up_down_count_mismatch() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.1/100_up_plan.cypher", "return 1;\n");

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        match err {
            GraphMigError::UpDownCountMismatch { up, down, .. } => {
                assert_eq!((up, down), (1, 0));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn invalid_file_name() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.1/-1_up_plan.cypher", "return 1;\n");

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        assert!(matches!(err, GraphMigError::InvalidFileName(_)));
    }

    #[test]
    fn zero_timestamp_is_forbidden() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.1/00_up_plan.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.1/00_down_plan.cypher", "return 1;\n");

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        assert!(matches!(err, GraphMigError::ForbiddenZeroTimestamp(_)));
    }

    #[test]
    fn timestamp_overflow_bubbles_up() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(
            tree.path(),
            "schema/v1.0.1/922337203685477580777_up_plan.cypher",
            "return 1;\n",
        );

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        assert!(matches!(err, GraphMigError::TimestampParse { .. }));
    }

    #[test]
    fn duplicate_up_timestamp() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.1/1_up_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.1/1_up_b.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.1/1_down_a.cypher", "return 1;\n");

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        assert!(matches!(
            err,
            GraphMigError::DuplicateUpTimestamp { timestamp: 1, .. }
        ));
    }

    #[test]
    fn duplicate_down_timestamp() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.1/1_up_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.1/1_down_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.1/1_down_b.cypher", "return 1;\n");

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        assert!(matches!(
            err,
            GraphMigError::DuplicateDownTimestamp { timestamp: 1, .. }
        ));
    }

    #[test]
    fn version_folder_must_start_with_v() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/1.0.1/1_up_a.cypher", "return 1;\n");

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        match err {
            GraphMigError::InvalidFolderName { name, .. } => assert_eq!(name, "1.0.1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn version_folder_must_be_semver() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v-not-semver/1_up_a.cypher", "return 1;\n");

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        assert!(matches!(err, GraphMigError::InvalidVersionAt { .. }));
    }

    #[test]
    fn schema_folder_missing() {
        let tree = tempfile::TempDir::new().unwrap();
        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        assert!(matches!(err, GraphMigError::DirectoryMissing(_)));
    }

    #[test]
    fn schema_folder_is_a_file() {
        let tree = tempfile::TempDir::new().unwrap();
        fs::write(tree.path().join("schema"), "file").unwrap();

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        assert!(matches!(err, GraphMigError::NotADirectory(_)));
    }

    #[test]
    fn hidden_entries_are_ignored() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.0/1_up_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.0/1_down_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.0/.hidden.cypher", "");
        write_file(tree.path(), "schema/.DS_Store", "");

        let folders = scan(&standard_config_schema_only(), tree.path()).unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders.get(0).unwrap().schema_scripts.up.len(), 1);
    }

    #[test]
    fn snapshot_name_must_match_pattern() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.0/1_up_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.0/1_down_a.cypher", "return 1;\n");
        write_file(tree.path(), "snapshots/invalid_name.cypher", "");

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        match err {
            GraphMigError::InvalidSnapshotName(name) => assert_eq!(name, "invalid_name.cypher"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn snapshot_version_must_be_semver() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.0/1_up_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.0/1_down_a.cypher", "return 1;\n");
        write_file(tree.path(), "snapshots/schema_v1.1.1.1.1.1.1.cypher", "");

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        assert!(matches!(err, GraphMigError::InvalidSnapshotVersion { .. }));
    }

    #[test]
    fn snapshot_batch_must_be_declared() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.0/1_up_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.0/1_down_a.cypher", "return 1;\n");
        write_file(tree.path(), "snapshots/my_snapshot_v1.0.0.cypher", "");

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        match err {
            GraphMigError::UnknownSnapshotBatch { batch, .. } => assert_eq!(batch, "my_snapshot"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn snapshot_version_must_exist_in_schema() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.0/1_up_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.0/1_down_a.cypher", "return 1;\n");
        write_file(tree.path(), "snapshots/schema_v5.0.0.cypher", "");

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        match err {
            GraphMigError::SnapshotVersionUnmatched { version, name } => {
                assert_eq!(version, "5.0.0");
                assert_eq!(name, "schema_v5.0.0.cypher");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn snapshots_path_must_be_directory() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.0/1_up_a.cypher", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.0/1_down_a.cypher", "return 1;\n");
        fs::write(tree.path().join("snapshots"), "file").unwrap();

        let err = scan(&standard_config_schema_only(), tree.path()).unwrap_err();
        assert!(matches!(err, GraphMigError::NotADirectory(_)));
    }

    #[test]
    fn uppercase_direction_and_extension_are_accepted() {
        let tree = tempfile::TempDir::new().unwrap();
        write_file(tree.path(), "schema/v1.0.0/1_UP_a.CYPHER", "return 1;\n");
        write_file(tree.path(), "schema/v1.0.0/1_DOWN_a.cypher", "return 1;\n");

        let folders = scan(&standard_config_schema_only(), tree.path()).unwrap();
        let scripts = &folders.get(0).unwrap().schema_scripts;
        assert_eq!(scripts.up.len(), 1);
        assert!(!scripts.up[0].is_downgrade);
        assert_eq!(scripts.up[0].file_type, FileType::Cypher);
        assert!(scripts.down[0].is_downgrade);
    }

    mod generate {
        use super::*;

        #[test]
        fn unknown_folder() {
            let tree = standard_tree();
            let planner = Planner::new(standard_config()).unwrap();
            let scanner = planner.new_scanner(tree.path()).unwrap();

            let target = TargetVersion::parse("1.0.2+8050").unwrap();
            let err = scanner
                .generate_migration_files("cc", Some(&target), "name", FileType::Cypher, FileType::Cypher)
                .unwrap_err();
            assert_eq!(err.to_string(), "folder does not exist: cc");
        }

        #[test]
        fn missing_version_or_revision() {
            let tree = standard_tree();
            let planner = Planner::new(standard_config()).unwrap();
            let scanner = planner.new_scanner(tree.path()).unwrap();

            let err = scanner
                .generate_migration_files("schema", None, "name", FileType::Cypher, FileType::Cypher)
                .unwrap_err();
            assert!(matches!(err, GraphMigError::InvalidVersionOrRevision));

            let no_revision = TargetVersion::parse("1.0.0").unwrap();
            let err = scanner
                .generate_migration_files(
                    "schema",
                    Some(&no_revision),
                    "name",
                    FileType::Cypher,
                    FileType::Cypher,
                )
                .unwrap_err();
            assert!(matches!(err, GraphMigError::InvalidVersionOrRevision));
        }

        #[test]
        fn declared_folder_missing_on_disk() {
            let tree = standard_tree();
            let mut config = standard_config();
            config
                .planner
                .folders
                .insert("not-exist".to_string(), crate::config::FolderDetail::new(MigrationType::UpDown));

            let planner = Planner::new(config).unwrap();
            let scanner = planner.new_scanner(tree.path()).unwrap();

            let target = TargetVersion::parse("1.0.1+1").unwrap();
            let err = scanner
                .generate_migration_files(
                    "not-exist",
                    Some(&target),
                    "name",
                    FileType::Cypher,
                    FileType::Cypher,
                )
                .unwrap_err();
            assert_eq!(err.to_string(), "folder does not exist: not-exist");
        }

        #[test]
        fn up_down_pair_in_existing_version_folder() {
            let tree = standard_tree();
            let planner = Planner::new(standard_config()).unwrap();
            let scanner = planner.new_scanner(tree.path()).unwrap();

            let target = TargetVersion::parse("1.0.2+8050").unwrap();
            let paths = scanner
                .generate_migration_files(
                    "schema",
                    Some(&target),
                    "my-new-migration",
                    FileType::Cypher,
                    FileType::Command,
                )
                .unwrap();

            let up = tree.path().join("schema/v1.0.2/8050_up_my-new-migration.cypher");
            let down = tree.path().join("schema/v1.0.2/8050_down_my-new-migration.run");
            assert_eq!(paths, vec![up.clone(), down.clone()]);

            assert_eq!(fs::read_to_string(&up).unwrap(), "return 1;\n");
            assert_eq!(fs::read_to_string(&down).unwrap(), "exit\n");
            assert!(!tree
                .path()
                .join("schema/v1.0.2/8050_my-new-migration.run")
                .exists());
        }

        #[test]
        fn change_file_creates_version_folder() {
            let tree = standard_tree();
            let planner = Planner::new(standard_config()).unwrap();
            let scanner = planner.new_scanner(tree.path()).unwrap();

            let target = TargetVersion::parse("1.0.2+8050").unwrap();
            let paths = scanner
                .generate_migration_files(
                    "data",
                    Some(&target),
                    "my-new-migration",
                    FileType::Command,
                    FileType::Command,
                )
                .unwrap();

            let change = tree.path().join("data/v1.0.2/8050_my-new-migration.run");
            assert_eq!(paths, vec![change.clone()]);
            assert_eq!(fs::read_to_string(&change).unwrap(), "exit\n");

            assert!(!tree
                .path()
                .join("data/v1.0.2/8050_up_my-new-migration.run")
                .exists());
            assert!(!tree
                .path()
                .join("data/v1.0.2/8050_down_my-new-migration.run")
                .exists());
        }
    }
}
