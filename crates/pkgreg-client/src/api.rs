//! Registry wire types.
//!
//! JSON documents as the registry serves them, plus the [`Release`] view
//! the client hands back from release listings.

use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};

use crate::error::ResponseFault;
use pkgreg_core::Version;

/// Resource name of a release's source archive.
pub const SOURCE_ARCHIVE_RESOURCE: &str = "source-archive";

/// HTTP problem details attached to a withdrawn release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// One entry of a release listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub version: Version,
    pub status: ReleaseStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseStatus {
    Available { url: Option<String> },
    /// The registry reports the release as gone.
    Withdrawn { problem: Problem },
}

impl Release {
    pub fn is_available(&self) -> bool {
        matches!(self.status, ReleaseStatus::Available { .. })
    }
}

/// `GET /{scope}/{name}` response body.
#[derive(Debug, Deserialize)]
pub(crate) struct ReleasesDocument {
    #[serde(deserialize_with = "ordered_entries")]
    pub releases: Vec<(String, ReleaseEntry)>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReleaseEntry {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub problem: Option<Problem>,
}

impl ReleaseEntry {
    pub(crate) fn into_status(self) -> ReleaseStatus {
        match self.problem {
            Some(problem) => ReleaseStatus::Withdrawn { problem },
            None => ReleaseStatus::Available { url: self.url },
        }
    }
}

/// Keeps map entries in document order, duplicates included.
fn ordered_entries<'de, D>(deserializer: D) -> Result<Vec<(String, ReleaseEntry)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Vec<(String, ReleaseEntry)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of versions to releases")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry()? {
                entries.push(entry);
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(EntriesVisitor)
}

/// `GET /{scope}/{name}/{version}` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub resources: Vec<Resource>,
    /// Free-form package metadata (description, authors, …).
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// A downloadable artifact of a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    #[serde(rename = "type", default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
}

impl ReleaseMetadata {
    /// The `source-archive` resource; more than one is a protocol violation.
    pub fn source_archive(&self) -> Result<Option<&Resource>, ResponseFault> {
        let mut archives = self
            .resources
            .iter()
            .filter(|r| r.name == SOURCE_ARCHIVE_RESOURCE);
        let first = archives.next();
        let extra = archives.count();
        if extra > 0 {
            return Err(ResponseFault::DuplicateSourceArchive(extra + 1));
        }
        Ok(first)
    }
}

/// `GET /identifiers?url=…` response body.
#[derive(Debug, Deserialize)]
pub(crate) struct IdentifiersDocument {
    pub identifiers: Vec<String>,
}
