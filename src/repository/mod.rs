// src/repository/mod.rs

//! Metadata repositories
//!
//! This module provides:
//! - The [`MetadataRepository`] contract ("give me all units matching a query")
//! - In-memory, directory-backed (`content.json`) and remote repositories
//! - The local Maven repository bridge, indexed by GAV
//! - A registry of repository ids and a manager that opens repositories by location

mod client;
mod file;
mod local;
mod manager;
mod memory;
mod registry;
mod remote;

pub mod index;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::Result;
use crate::metadata::{InstallableUnit, Requirement};
use crate::version::{Version, VersionRange};

pub use client::{RepositoryClient, join_url};
pub use file::FileMetadataRepository;
pub use index::{ARTIFACTS_INDEX, METADATA_INDEX, RepositoryIndex};
pub use local::LocalMetadataRepository;
pub use manager::RepositoryManager;
pub use memory::MemoryMetadataRepository;
pub use registry::RepositoryRegistry;
pub use remote::RemoteMetadataRepository;

/// File holding the metadata of directory-backed and remote repositories
pub const CONTENT_FILE: &str = "content.json";

/// How a configured repository is accessed
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RepositoryKind {
    /// Directory with `content.json` and Maven-layout artifacts
    #[default]
    Local,
    /// HTTP(S) location serving `content.json`
    Remote,
    /// Local Maven repository with p2 index files
    Maven,
}

impl RepositoryKind {
    /// Guess the kind from a location: URLs are remote, paths local
    pub fn detect(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            RepositoryKind::Remote
        } else {
            RepositoryKind::Local
        }
    }
}

/// Type of repository a reference points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceType {
    Metadata,
    Artifact,
}

/// Pointer to another repository (not its content)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryReference {
    pub location: String,
    #[serde(rename = "type")]
    pub kind: ReferenceType,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl RepositoryReference {
    pub fn metadata(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            kind: ReferenceType::Metadata,
            enabled: true,
        }
    }

    pub fn artifact(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            kind: ReferenceType::Artifact,
            enabled: true,
        }
    }
}

/// Serialized form of a metadata repository (`content.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub references: Vec<RepositoryReference>,
    #[serde(default)]
    pub units: Vec<InstallableUnit>,
}

/// Unit selection for [`MetadataRepository::query`]
#[derive(Debug, Clone, PartialEq)]
pub enum UnitQuery {
    All,
    /// Every version of an id
    Id(String),
    /// Exactly one id and version
    IdVersion(String, Version),
    /// The highest version of an id
    Latest(String),
    /// Versions of an id within a range
    Range(String, VersionRange),
    /// Units with a capability satisfying the requirement
    Requirement(Requirement),
}

impl UnitQuery {
    fn matches(&self, unit: &InstallableUnit) -> bool {
        match self {
            UnitQuery::All => true,
            UnitQuery::Id(id) | UnitQuery::Latest(id) => unit.id == *id,
            UnitQuery::IdVersion(id, version) => unit.id == *id && unit.version == *version,
            UnitQuery::Range(id, range) => unit.id == *id && range.includes(&unit.version),
            UnitQuery::Requirement(requirement) => unit.satisfies(requirement),
        }
    }

    /// Evaluate the query over a set of units, preserving input order
    pub fn apply<'a>(&self, units: impl IntoIterator<Item = &'a Arc<InstallableUnit>>) -> Vec<Arc<InstallableUnit>> {
        let matched: Vec<Arc<InstallableUnit>> = units.into_iter().filter(|u| self.matches(u)).cloned().collect();
        if !matches!(self, UnitQuery::Latest(_)) {
            return matched;
        }
        let Some(highest) = matched.iter().map(|u| &u.version).max().cloned() else {
            return matched;
        };
        matched.into_iter().filter(|u| u.version == highest).collect()
    }
}

/// Read access to installable units
pub trait MetadataRepository: Send + Sync {
    /// Location the repository was loaded from; also the provenance of its units
    fn location(&self) -> &str;

    fn name(&self) -> &str {
        self.location()
    }

    fn units(&self) -> Vec<Arc<InstallableUnit>>;

    fn query(&self, query: &UnitQuery) -> Vec<Arc<InstallableUnit>> {
        query.apply(self.units().iter())
    }

    fn references(&self) -> Vec<RepositoryReference> {
        Vec::new()
    }

    fn properties(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }
}

/// Metadata repository that accepts new content
///
/// Mutations are held in memory until [`save`](Self::save).
pub trait WritableMetadataRepository: MetadataRepository {
    fn add_units(&mut self, units: &[Arc<InstallableUnit>]) -> Result<()>;

    fn add_references(&mut self, references: &[RepositoryReference]) -> Result<()>;

    fn set_property(&mut self, key: &str, value: &str) -> Result<()>;

    fn remove_all(&mut self) -> Result<()>;

    fn save(&mut self) -> Result<()>;
}
