// src/target_platform/mod.rs

//! Resolved target platforms
//!
//! A [`TargetPlatform`] is the result of resolving the reactor against the
//! configured repositories: the resolved units, their start levels and the
//! artifact provider that delivers their payloads. It is built once per
//! build by [`TargetPlatformFactory`] and read by everything downstream.
//!
//! Entries are looked up by [`ArtifactType`], id and version. Lookup
//! without a version (or with `0.0.0`) returns the *lowest* version of the
//! id; use [`TargetPlatform::latest`] for the highest.

mod factory;
mod filter;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::artifact::ArtifactProvider;
use crate::environment::TargetEnvironment;
use crate::metadata::unit::FEATURE_GROUP_SUFFIX;
use crate::metadata::{ArtifactKey, InstallableUnit};
use crate::progress::ProgressTracker;
use crate::resolver::{Defaults, ResolutionResult, StartLevel};
use crate::status::Status;
use crate::version::{Version, VersionRange};

pub use factory::{TargetPlatformContent, TargetPlatformFactory, prepare_available_units};
pub use filter::{FilterAction, ScopeType, TargetPlatformFilter, UnitPattern, apply_filters};

/// Kind of entry in a target platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ArtifactType {
    /// OSGi bundle, keyed by bundle symbolic name
    EclipsePlugin,
    /// Feature, keyed by feature id (without `.feature.group`)
    EclipseFeature,
    /// Any installable unit, keyed by unit id
    P2InstallableUnit,
}

type Versions = BTreeMap<Version, Arc<InstallableUnit>>;

pub struct TargetPlatform {
    environments: Vec<TargetEnvironment>,
    units: Vec<Arc<InstallableUnit>>,
    entries: BTreeMap<(ArtifactType, String), Versions>,
    start_levels: BTreeMap<String, StartLevel>,
    artifacts: Arc<dyn ArtifactProvider>,
    wildcard_qualifier: String,
}

impl TargetPlatform {
    pub fn new(result: ResolutionResult, artifacts: Arc<dyn ArtifactProvider>, defaults: &Defaults) -> Self {
        let mut entries: BTreeMap<(ArtifactType, String), Versions> = BTreeMap::new();
        let mut add = |kind: ArtifactType, id: &str, version: &Version, unit: &Arc<InstallableUnit>| {
            entries
                .entry((kind, id.to_string()))
                .or_default()
                .entry(version.clone())
                .or_insert_with(|| Arc::clone(unit));
        };
        for unit in &result.units {
            add(ArtifactType::P2InstallableUnit, &unit.id, &unit.version, unit);
            if let Some(bundle) = unit.bundle_capability() {
                add(ArtifactType::EclipsePlugin, &bundle.name, &bundle.version, unit);
            }
            if let Some(feature) = unit.id.strip_suffix(FEATURE_GROUP_SUFFIX) {
                add(ArtifactType::EclipseFeature, feature, &unit.version, unit);
            }
        }
        Self {
            environments: result.environments,
            units: result.units,
            entries,
            start_levels: result.start_levels,
            artifacts,
            wildcard_qualifier: defaults.wildcard_qualifier.clone(),
        }
    }

    pub fn environments(&self) -> &[TargetEnvironment] {
        &self.environments
    }

    pub fn units(&self) -> &[Arc<InstallableUnit>] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn artifacts(&self) -> &Arc<dyn ArtifactProvider> {
        &self.artifacts
    }

    /// Look up an entry
    ///
    /// - no version or `0.0.0`: the lowest version
    /// - version with the wildcard qualifier: the highest version with the
    ///   same major.minor.micro
    /// - any other version: exactly that version
    pub fn artifact(
        &self,
        kind: ArtifactType,
        id: &str,
        version: Option<&Version>,
    ) -> Option<&Arc<InstallableUnit>> {
        let versions = self.entries.get(&(kind, id.to_string()))?;
        match version {
            None => versions.values().next(),
            Some(v) if *v == Version::EMPTY => versions.values().next(),
            Some(v) if v.has_wildcard_qualifier(&self.wildcard_qualifier) => {
                let range = VersionRange::from_wildcard(v, &self.wildcard_qualifier);
                versions
                    .range(range.minimum().clone()..)
                    .rev()
                    .find(|(candidate, _)| range.includes(candidate))
                    .map(|(_, unit)| unit)
            }
            Some(v) => versions.get(v),
        }
    }

    /// Highest version of an entry
    pub fn latest(&self, kind: ArtifactType, id: &str) -> Option<&Arc<InstallableUnit>> {
        self.entries
            .get(&(kind, id.to_string()))
            .and_then(|versions| versions.values().next_back())
    }

    /// Every version of an entry, ascending
    pub fn versions(&self, kind: ArtifactType, id: &str) -> Vec<&Version> {
        self.entries
            .get(&(kind, id.to_string()))
            .map(|versions| versions.keys().collect())
            .unwrap_or_default()
    }

    pub fn start_level(&self, bundle_id: &str) -> Option<StartLevel> {
        self.start_levels.get(bundle_id).copied()
    }

    pub fn start_levels(&self) -> &BTreeMap<String, StartLevel> {
        &self.start_levels
    }

    /// Write the canonical bytes of an artifact into `sink`
    pub fn download(&self, key: &ArtifactKey, sink: &mut dyn Write, monitor: &dyn ProgressTracker) -> Status {
        self.artifacts.get_artifact(key, sink, monitor)
    }

    /// Local file of an artifact, if its provider is file-backed
    pub fn artifact_file(&self, key: &ArtifactKey) -> Option<PathBuf> {
        self.artifacts.artifact_file(key)
    }
}

impl std::fmt::Debug for TargetPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetPlatform")
            .field("environments", &self.environments)
            .field("units", &self.units.len())
            .field("artifacts", &self.artifacts.location())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemoryArtifactRepository;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn platform(units: &[(&str, &str)]) -> TargetPlatform {
        let units = units
            .iter()
            .map(|(id, version)| Arc::new(InstallableUnit::builder(*id, v(version)).bundle().build()))
            .collect();
        let result = ResolutionResult::new(TargetEnvironment::any(), units, Status::ok());
        TargetPlatform::new(
            result,
            Arc::new(MemoryArtifactRepository::new("memory:test")),
            &Defaults::default(),
        )
    }

    fn found(tp: &TargetPlatform, version: Option<&str>) -> Option<String> {
        let version = version.map(v);
        tp.artifact(ArtifactType::EclipsePlugin, "a", version.as_ref())
            .map(|u| u.version.to_string())
    }

    #[test]
    fn test_lookup_without_version_returns_lowest() {
        let tp = platform(&[("a", "2.0.0"), ("a", "1.0.0"), ("a", "1.5.0")]);
        assert_eq!(found(&tp, None).as_deref(), Some("1.0.0"));
        assert_eq!(found(&tp, Some("0.0.0")).as_deref(), Some("1.0.0"));
        assert_eq!(
            tp.latest(ArtifactType::EclipsePlugin, "a").map(|u| u.version.to_string()).as_deref(),
            Some("2.0.0")
        );
    }

    #[test]
    fn test_lookup_with_wildcard_qualifier() {
        let tp = platform(&[("a", "1.0.0.v1"), ("a", "1.0.0.v3"), ("a", "1.0.1.v9")]);
        assert_eq!(found(&tp, Some("1.0.0.qualifier")).as_deref(), Some("1.0.0.v3"));
        assert_eq!(found(&tp, Some("1.0.0.v1")).as_deref(), Some("1.0.0.v1"));
        assert_eq!(found(&tp, Some("1.0.0")), None);
        assert_eq!(found(&tp, Some("2.0.0.qualifier")), None);
    }

    #[test]
    fn test_feature_entries() {
        let feature = Arc::new(InstallableUnit::builder("f.feature.group", v("1.0")).build());
        let result = ResolutionResult::new(TargetEnvironment::any(), vec![feature], Status::ok());
        let tp = TargetPlatform::new(
            result,
            Arc::new(MemoryArtifactRepository::new("memory:test")),
            &Defaults::default(),
        );
        assert!(tp.artifact(ArtifactType::EclipseFeature, "f", None).is_some());
        assert!(tp.artifact(ArtifactType::P2InstallableUnit, "f.feature.group", None).is_some());
        assert!(tp.artifact(ArtifactType::EclipsePlugin, "f", None).is_none());
        assert_eq!(tp.versions(ArtifactType::EclipseFeature, "f").len(), 1);
    }
}
