use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use semver::Version;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// How many trailing timestamps the compact display form keeps before
/// summarizing the rest.
const DISPLAY_FILE_LIMIT: usize = 3;

/// All executed migration files of a single version, as recorded in the
/// graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseGraphVersion {
    pub version: Version,
    pub file_timestamps: BTreeSet<i64>,
}

impl DatabaseGraphVersion {
    pub fn new(version: Version, timestamps: impl IntoIterator<Item = i64>) -> Self {
        DatabaseGraphVersion {
            version,
            file_timestamps: timestamps.into_iter().collect(),
        }
    }
}

/// Migration state of the whole graph: executed file timestamps per
/// folder and version. Built by the database model reader; never
/// mutated by planning.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatabaseModel {
    folders: BTreeMap<String, Vec<DatabaseGraphVersion>>,
}

impl DatabaseModel {
    pub fn new() -> Self {
        DatabaseModel::default()
    }

    pub fn insert(
        &mut self,
        folder: impl Into<String>,
        versions: Vec<DatabaseGraphVersion>,
    ) -> &mut Self {
        self.folders.insert(folder.into(), versions);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// True if the folder has any recorded version strictly greater
    /// than `version`.
    pub fn contains_higher_version(&self, folder: &str, version: &Version) -> bool {
        self.folders
            .get(folder)
            .map(|versions| versions.iter().any(|v| *version < v.version))
            .unwrap_or(false)
    }

    /// Executed file timestamps of the given folder and version, if any
    /// are recorded.
    pub fn get_file_timestamps(&self, folder: &str, version: &Version) -> Option<&BTreeSet<i64>> {
        self.folders
            .get(folder)?
            .iter()
            .find(|v| v.version == *version)
            .map(|v| &v.file_timestamps)
    }

    /// True if any folder has at least one executed file recorded.
    pub fn has_any_version(&self) -> bool {
        self.folders
            .values()
            .flatten()
            .any(|v| !v.file_timestamps.is_empty())
    }

    /// Compact JSON form: per version, lists longer than
    /// [`DISPLAY_FILE_LIMIT`] keep only the trailing entries behind a
    /// `"... N more"` summary.
    fn to_compact_json(&self) -> String {
        let mut out = String::from("{");
        for (folder_index, (folder, versions)) in self.folders.iter().enumerate() {
            if folder_index > 0 {
                out.push(',');
            }
            out.push_str(&format!("\"{folder}\":{{"));
            for (version_index, version) in versions.iter().enumerate() {
                if version_index > 0 {
                    out.push(',');
                }
                out.push_str(&format!("\"{}\":[", version.version));

                let count = version.file_timestamps.len();
                let mut first = true;
                if count > DISPLAY_FILE_LIMIT {
                    out.push_str(&format!("\"... {} more\"", count - DISPLAY_FILE_LIMIT));
                    first = false;
                }
                let skip = count.saturating_sub(DISPLAY_FILE_LIMIT);
                for timestamp in version.file_timestamps.iter().skip(skip) {
                    if !first {
                        out.push(',');
                    }
                    first = false;
                    out.push_str(&timestamp.to_string());
                }
                out.push(']');
            }
            out.push('}');
        }
        out.push('}');
        out
    }
}

impl fmt::Display for DatabaseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_compact_json())
    }
}

impl Serialize for DatabaseModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct FolderVersions<'a>(&'a [DatabaseGraphVersion]);

        impl Serialize for FolderVersions<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for version in self.0 {
                    map.serialize_entry(&version.version.to_string(), &version.file_timestamps)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(self.folders.len()))?;
        for (folder, versions) in &self.folders {
            map.serialize_entry(folder, &FolderVersions(versions))?;
        }
        map.end()
    }
}
