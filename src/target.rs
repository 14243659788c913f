use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Version};
use serde::{Deserialize, Serialize};

use crate::error::GraphMigError;

/// Version and revision a migration run should end on.
///
/// The revision rides in the semver build-metadata slot and orders
/// migration files within a single version. Revision zero is the
/// sentinel for "unspecified, plan to the latest revision".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetVersion {
    pub version: Version,
    #[serde(rename = "rev", default, skip_serializing_if = "revision_is_zero")]
    pub revision: i64,
}

fn revision_is_zero(revision: &i64) -> bool {
    *revision == 0
}

impl TargetVersion {
    pub fn new(version: Version, revision: i64) -> Self {
        TargetVersion { version, revision }
    }

    /// Parses `input` as a semver version with an optional numeric
    /// revision in the build-metadata position. A leading `v` is
    /// accepted, matching the on-disk folder naming.
    pub fn parse(input: &str) -> Result<Self, GraphMigError> {
        let mut version = parse_version(input)?;

        let mut revision = 0;
        if !version.build.is_empty() {
            revision = version
                .build
                .parse()
                .map_err(|_| GraphMigError::NonNumericRevision(version.build.to_string()))?;
            version.build = BuildMetadata::EMPTY;
        }

        Ok(TargetVersion { version, revision })
    }

    /// Orders two targets, honoring the revision sentinel: within the
    /// same version, revision zero means "latest" and sorts above every
    /// concrete revision. Not exposed as `Ord` because of exactly that
    /// sentinel.
    pub fn compare(&self, other: &TargetVersion) -> Ordering {
        match self.version.cmp(&other.version) {
            Ordering::Equal => match (self.revision, other.revision) {
                (a, b) if a == b => Ordering::Equal,
                (0, _) => Ordering::Greater,
                (_, 0) => Ordering::Less,
                (a, b) => a.cmp(&b),
            },
            ordering => ordering,
        }
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.revision != 0 {
            write!(f, "{}+{:02}", self.version, self.revision)
        } else {
            write!(f, "{}", self.version)
        }
    }
}

impl FromStr for TargetVersion {
    type Err = GraphMigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetVersion::parse(s)
    }
}

/// Parses a semver version, tolerating the `v` prefix used by version
/// folder names and snapshot file names.
pub(crate) fn parse_version(input: &str) -> Result<Version, GraphMigError> {
    let bare = input.strip_prefix(['v', 'V']).unwrap_or(input);
    Version::parse(bare).map_err(|source| GraphMigError::InvalidVersion {
        input: input.to_string(),
        source,
    })
}
