use std::fmt;
use std::fs;

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;

use crate::config::Config;
use crate::error::GraphMigError;
use crate::planner::{Builder, Planner};
use crate::scanner::{FileType, MigrationFile};
use crate::target::TargetVersion;

/// Splits a command line into tokens: a double-quoted run (no embedded
/// quotes) is one token, otherwise any run of non-whitespace is.
static COMMAND_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[^"]+"|\S+"#).expect("command token pattern is valid"));

/// One renderable unit of an execution plan: either a buffer of Cypher
/// text or an external command invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum ExecutionStep {
    Cypher(String),
    Command(Vec<String>),
}

impl ExecutionStep {
    pub fn is_cypher(&self) -> bool {
        matches!(self, ExecutionStep::Cypher(_))
    }

    pub fn cypher(&self) -> Option<&str> {
        match self {
            ExecutionStep::Cypher(buffer) => Some(buffer),
            ExecutionStep::Command(_) => None,
        }
    }

    pub fn command(&self) -> Option<&[String]> {
        match self {
            ExecutionStep::Cypher(_) => None,
            ExecutionStep::Command(args) => Some(args),
        }
    }
}

/// Append-only sequence of execution steps. Consecutive Cypher
/// additions coalesce into one buffer; commands always start a new
/// step and break the chain.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecutionSteps(Vec<ExecutionStep>);

impl ExecutionSteps {
    pub fn new() -> Self {
        ExecutionSteps::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.0
    }

    /// Appends Cypher text, reusing the trailing buffer when the last
    /// step is Cypher.
    pub fn add_cypher(&mut self, cypher: &str) {
        if cypher.is_empty() {
            return;
        }
        if let Some(ExecutionStep::Cypher(buffer)) = self.0.last_mut() {
            buffer.push_str(cypher);
            return;
        }
        self.0.push(ExecutionStep::Cypher(cypher.to_string()));
    }

    /// Appends a command step. Empty argument vectors are ignored.
    pub fn add_command(&mut self, args: Vec<String>) {
        if args.is_empty() {
            return;
        }
        self.0.push(ExecutionStep::Command(args));
    }
}

impl<'a> IntoIterator for &'a ExecutionSteps {
    type Item = &'a ExecutionStep;
    type IntoIter = std::slice::Iter<'a, ExecutionStep>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Dry-run text form: Cypher verbatim, commands prefixed with `>>> `.
/// Not suitable to pipe into a shell, but handy for review and logs.
impl fmt::Display for ExecutionSteps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.0 {
            match step {
                ExecutionStep::Cypher(buffer) => f.write_str(buffer)?,
                ExecutionStep::Command(args) if args[0] == "exit" => {
                    // A lone exit means the source file had nothing to do.
                    f.write_str("// Nothing to do in this file\n")?;
                }
                ExecutionStep::Command(args) => {
                    f.write_str(">>> ")?;
                    f.write_str(&args_to_string(args))?;
                    f.write_str("\n")?;
                }
            }
        }
        Ok(())
    }
}

fn args_to_string(args: &[String]) -> String {
    let quoted: Vec<String> = args
        .iter()
        .map(|arg| {
            if arg.contains(' ') {
                format!("\"{arg}\"")
            } else {
                arg.clone()
            }
        })
        .collect();
    quoted.join(" ")
}

fn parse_args(line: &str) -> Vec<String> {
    COMMAND_TOKEN
        .find_iter(line)
        .map(|token| token.as_str().trim_matches('"').to_string())
        .collect()
}

/// The default [`Builder`]: renders each planned migration file into
/// execution steps plus the bookkeeping statement that records (or
/// tombstones) it in the graph.
pub struct ExecutionBuilder<'a> {
    config: &'a Config,
    steps: &'a mut ExecutionSteps,
    absolute_paths: bool,
}

impl Planner {
    /// Creates the default builder writing into `steps`. With
    /// `absolute_paths`, `:source` directives carry absolute paths so
    /// the plan can run from any working directory.
    pub fn create_builder<'a>(
        &'a self,
        steps: &'a mut ExecutionSteps,
        absolute_paths: bool,
    ) -> ExecutionBuilder<'a> {
        ExecutionBuilder {
            config: self.config(),
            steps,
            absolute_paths,
        }
    }
}

impl Builder for ExecutionBuilder<'_> {
    fn build(&mut self, file: &MigrationFile, version: &Version) -> Result<(), GraphMigError> {
        let action = if file.is_snapshot {
            "Starting on"
        } else if file.file_type == FileType::Command && file.is_downgrade {
            "Downgrading with command from"
        } else if file.file_type == FileType::Command {
            "Running command from"
        } else if file.is_downgrade {
            "Downgrading"
        } else {
            "Importing"
        };

        let versioned = TargetVersion::new(version.clone(), file.timestamp);
        self.steps.add_cypher(&format!(
            "// {} folder {} - ver:{}\n",
            action, file.folder_name, versioned
        ));

        match file.file_type {
            FileType::Command => self.add_command_file(file)?,
            FileType::Cypher => {
                self.steps.add_cypher(":source ");
                if self.absolute_paths {
                    let absolute = std::path::absolute(&file.path)?;
                    self.steps.add_cypher(&absolute.to_string_lossy());
                } else {
                    self.steps.add_cypher(&file.path.to_string_lossy());
                }
                self.steps.add_cypher(";\n");
            }
        }

        // A snapshot already contains its own version bookkeeping.
        if file.is_snapshot {
            self.steps.add_cypher("\n");
            return Ok(());
        }

        let node_labels = self.config.planner.node_labels_of(&file.folder_name);
        if node_labels.is_empty() {
            return Err(GraphMigError::MissingLabels(file.folder_name.clone()));
        }
        let labels = node_labels.join(":");

        self.steps.add_cypher(&format!(
            ":params {{\"version\": \"{}\", \"file\": {}}}\n",
            version, file.timestamp
        ));
        if file.is_downgrade {
            self.steps.add_cypher(&format!(
                "MATCH (sm:{labels} {{version: $version, file: $file}}) \
                 SET sm.deleted_at = timestamp();"
            ));
        } else {
            self.steps.add_cypher(&format!(
                "MERGE (sm:{labels} {{version: $version, file: $file}}) \
                 ON CREATE SET sm.created_at = timestamp() \
                 SET sm.updated_at = timestamp(), sm.deleted_at = null;"
            ));
        }
        self.steps.add_cypher("\n\n");
        Ok(())
    }
}

impl ExecutionBuilder<'_> {
    /// Reads a command file and appends one command step per effective
    /// line. `exit` as the first command marks the file as an
    /// intentional no-op; unknown commands and files with nothing to
    /// run are errors.
    fn add_command_file(&mut self, file: &MigrationFile) -> Result<(), GraphMigError> {
        let content = fs::read_to_string(&file.path)?;

        let mut emitted = 0;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
                continue;
            }

            let mut args = parse_args(line);
            if args[0] == "exit" {
                if emitted == 0 {
                    emitted += 1;
                    self.steps.add_command(vec!["exit".to_string()]);
                }
                break;
            }

            let full_path = self
                .config
                .planner
                .allowed_commands
                .get(&args[0])
                .ok_or_else(|| GraphMigError::CommandNotAllowed {
                    command: args[0].clone(),
                    path: file.path.clone(),
                })?;
            args[0] = full_path.clone();

            emitted += 1;
            self.steps.add_command(args);
        }

        if emitted == 0 {
            return Err(GraphMigError::EmptyCommandFile(file.path.clone()));
        }
        Ok(())
    }
}
