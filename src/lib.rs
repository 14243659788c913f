//! Migration planning for Cypher-speaking labeled property graph
//! databases.
//!
//! Migration files live on disk under a base folder, grouped by
//! semantic version; the graph records which files already ran as
//! labeled bookkeeping nodes. This crate scans the folders
//! ([`Scanner`]), reads the recorded state ([`Planner::version`]), and
//! turns the difference into an ordered execution plan
//! ([`Planner::plan`]) rendered as Cypher buffers and external command
//! invocations ([`ExecutionSteps`]).
//!
//! Executing the plan, the CLI and HTTP surfaces, and the database
//! driver itself belong to embedding applications; the driver is
//! consumed only through the [`ReadSession`] capability.

pub mod config;
pub mod error;
pub mod execution;
pub mod model;
pub mod planner;
pub mod scanner;
pub mod session;
pub mod target;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{BatchDetail, Config, FolderDetail, MigrationType, PlannerConfig, SchemaFolderConfig};
pub use error::GraphMigError;
pub use execution::{ExecutionBuilder, ExecutionStep, ExecutionSteps};
pub use model::{DatabaseGraphVersion, DatabaseModel};
pub use planner::{Builder, Planner};
pub use scanner::{FileType, LocalFolders, LocalVersionFolder, MigrationFile, MigrationScripts, Scanner};
pub use session::{CypherValue, ReadSession, Row};
pub use target::TargetVersion;
