use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while scanning migration folders, planning a run,
/// rendering execution steps or reading migration state from the graph.
///
/// Every operation in the crate aborts on the first error and returns it
/// unchanged; nothing is recovered internally.
#[derive(Error, Debug)]
pub enum GraphMigError {
    // Filesystem

    #[error("directory does not exist: '{}'", .0.display())]
    DirectoryMissing(PathBuf),

    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // Folder and file naming

    #[error("folder name '{name}' does not start with letter 'v' in '{}'", .dir.display())]
    InvalidFolderName { name: String, dir: PathBuf },

    #[error("invalid semantic version '{input}': {source}")]
    InvalidVersion {
        input: String,
        source: semver::Error,
    },

    #[error("invalid semantic version '{input}' at '{}': {source}", .path.display())]
    InvalidVersionAt {
        input: String,
        path: PathBuf,
        source: semver::Error,
    },

    #[error("version metadata is not numeric: '{0}'")]
    NonNumericRevision(String),

    #[error("file '{}' has invalid name", .0.display())]
    InvalidFileName(PathBuf),

    #[error("forbidden timestamp '0' in file '{}'", .0.display())]
    ForbiddenZeroTimestamp(PathBuf),

    #[error("invalid timestamp in file '{}': {source}", .path.display())]
    TimestampParse {
        path: PathBuf,
        source: ParseIntError,
    },

    // Up/down consistency

    #[error("inconsistent state in '{}': found {up} up and {down} down scripts", .dir.display())]
    UpDownCountMismatch {
        dir: PathBuf,
        up: usize,
        down: usize,
    },

    #[error("inconsistent state: missing down part of '{}'", .0.display())]
    MissingDownCounterpart(PathBuf),

    #[error("two up scripts share timestamp '{timestamp}' in folder '{}'", .dir.display())]
    DuplicateUpTimestamp { timestamp: i64, dir: PathBuf },

    #[error("two down scripts share timestamp '{timestamp}' in folder '{}'", .dir.display())]
    DuplicateDownTimestamp { timestamp: i64, dir: PathBuf },

    // Catalog vs schema folder

    #[error("unspecified schema for version of '{}'", .0.display())]
    UnspecifiedSchemaVersion(PathBuf),

    // Snapshots

    #[error("invalid snapshot name '{0}'")]
    InvalidSnapshotName(String),

    #[error("invalid snapshot version '{name}': {source}")]
    InvalidSnapshotVersion {
        name: String,
        source: semver::Error,
    },

    #[error("unknown batch name '{batch}' based on snapshot name '{name}'")]
    UnknownSnapshotBatch { batch: String, name: String },

    #[error("version '{version}' in snapshot '{name}' is not defined in schema")]
    SnapshotVersionUnmatched { version: String, name: String },

    // Planning

    #[error("unknown batch name '{0}'")]
    UnknownBatch(String),

    #[error("specified target version {0} does not exist")]
    TargetOutOfRange(String),

    // Generation

    #[error("folder does not exist: {0}")]
    UnknownFolder(String),

    #[error("invalid version or revision")]
    InvalidVersionOrRevision,

    // Rendering

    #[error("command '{command}' from file '{}' is not listed in the allowed commands", .path.display())]
    CommandNotAllowed { command: String, path: PathBuf },

    #[error("no commands to run in file '{}', use 'exit' command to ignore file", .0.display())]
    EmptyCommandFile(PathBuf),

    #[error("cannot determine node labels for folder '{0}'")]
    MissingLabels(String),

    // Database reads

    #[error("invalid version '{0}' from response")]
    InvalidVersionFromResponse(String),

    #[error("invalid version files in the response")]
    InvalidFilesList,

    #[error("file number '{value}' is of type {kind}, expected integer")]
    FileNumberTypeMismatch { value: String, kind: &'static str },

    // Configuration

    #[error("configuration error: {0}")]
    Config(String),

    // Opaque propagation for custom builders

    #[error("{0}")]
    Builder(String),
}
