// src/mirror/mod.rs

//! Mirroring of units and artifacts into a destination repository
//!
//! A mirror run:
//!
//! 1. picks the root units: the units matching the seeds, or every source
//!    unit when no seeds are given
//! 2. slices the source units from the roots for each environment
//! 3. drops, on request, the units already provided by repositories the
//!    destination references
//! 4. copies the remaining units (and, on request, the source repositories'
//!    references) into the destination metadata repository
//! 5. copies every stored form of every artifact of those units into the
//!    destination artifact repository, streaming each one from source to
//!    destination
//! 6. optionally compares each copied artifact with a baseline repository
//!
//! Per-artifact problems are collected in the returned [`Status`] and
//! reported to a [`MirrorLog`]; with `fail_on_error` the first error
//! aborts the run.

mod comparator;
mod log;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactProvider, ArtifactRepository, RemoteTransferPolicy, TransferPolicy};
use crate::ee::ResolutionHints;
use crate::environment::TargetEnvironment;
use crate::error::{Error, Result};
use crate::metadata::unit::FEATURE_GROUP_SUFFIX;
use crate::metadata::{ArtifactDescriptor, ArtifactFormat, ArtifactKey, InstallableUnit, VersionedId};
use crate::progress::{ProgressStyle, ProgressTracker, checkpoint};
use crate::repository::{MetadataRepository, ReferenceType, RepositoryReference, UnitQuery, WritableMetadataRepository};
use crate::resolver::{Defaults, ResolutionData, ResolutionStrategy, SlicerOptions, SlicerResolutionStrategy};
use crate::status::{Severity, Status};
use crate::version::{Version, VersionRange, WILDCARD_QUALIFIER};

pub use comparator::{ArtifactComparator, HashingSink, SHA256_COMPARATOR, Sha256Comparator, comparator, sha256_of};
pub use log::{MirrorLog, TracingMirrorLog};

/// Filter property that makes feature JAR units applicable
pub const PROP_INSTALL_FEATURES: &str = "org.eclipse.update.install.features";

/// Id suffix of source bundles and source features
pub const SOURCE_SUFFIX: &str = ".source";

/// Mirror configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorOptions {
    /// Copy the units as well as the artifacts
    pub mirror_metadata: bool,
    /// Include feature JAR units and their artifacts
    pub include_features: bool,
    pub include_optional: bool,
    /// Follow non-greedy requirements too
    pub include_non_greedy: bool,
    pub follow_strict_only: bool,
    pub follow_only_filtered_requirements: bool,
    pub latest_version_only: bool,
    /// Copy packed descriptors too
    pub include_packed: bool,
    /// Add the source unit of every mirrored unit
    pub include_all_source: bool,
    /// Follow bundle requirements of features regardless of `follow_strict_only`
    pub include_required_bundles: bool,
    /// Follow feature requirements of features regardless of `follow_strict_only`
    pub include_required_features: bool,
    /// Skip units provided by repositories the destination references
    pub filter_provided: bool,
    /// With `filter_provided`, add only the source references that provide
    /// mirrored units not provided by another reference
    pub add_only_providing_repo_references: bool,
    /// Copy only the form the remote transfer policy prefers
    pub preferred_format_only: bool,
    /// Copy the source repositories' references
    #[serde(alias = "references")]
    pub include_references: bool,
    /// Stop at the first error and fail the run
    pub fail_on_error: bool,
    /// Compare copied artifacts with the baseline
    pub compare: bool,
    pub comparator: String,
    /// Extra selection-context properties
    pub filter: BTreeMap<String, String>,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            mirror_metadata: true,
            include_features: false,
            include_optional: true,
            include_non_greedy: true,
            follow_strict_only: false,
            follow_only_filtered_requirements: false,
            latest_version_only: false,
            include_packed: true,
            include_all_source: false,
            include_required_bundles: false,
            include_required_features: false,
            filter_provided: false,
            add_only_providing_repo_references: false,
            preferred_format_only: false,
            include_references: false,
            fail_on_error: true,
            compare: false,
            comparator: SHA256_COMPARATOR.to_string(),
            filter: BTreeMap::new(),
        }
    }
}

impl MirrorOptions {
    fn slicer_options(&self) -> SlicerOptions {
        SlicerOptions {
            include_optional: self.include_optional,
            everything_greedy: self.include_non_greedy,
            consider_strict_dependency_only: self.follow_strict_only,
            follow_only_filtered_requirements: self.follow_only_filtered_requirements,
            latest_version_only: self.latest_version_only,
            include_required_bundles: self.include_required_bundles,
            include_required_features: self.include_required_features,
            follow_source_requirements: self.include_all_source,
            ..SlicerOptions::default()
        }
    }

    fn filter_properties(&self) -> BTreeMap<String, String> {
        let mut filter = self.filter.clone();
        filter.insert(PROP_INSTALL_FEATURES.to_string(), self.include_features.to_string());
        filter
    }
}

/// What a seed id names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SeedKind {
    #[default]
    Unit,
    /// Feature id; the unit is `<id>.feature.group`
    Feature,
    Plugin,
}

/// Unit requested as mirror root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSeed {
    #[serde(default, rename = "type")]
    pub kind: SeedKind,
    pub id: String,
    /// `None` selects the latest version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

impl MirrorSeed {
    pub fn new(kind: SeedKind, id: impl Into<String>, version: Option<Version>) -> Self {
        Self {
            kind,
            id: id.into(),
            version,
        }
    }

    pub fn unit_id(&self) -> String {
        match self.kind {
            SeedKind::Feature if !self.id.ends_with(FEATURE_GROUP_SUFFIX) => {
                format!("{}{}", self.id, FEATURE_GROUP_SUFFIX)
            }
            _ => self.id.clone(),
        }
    }

    fn query(&self) -> UnitQuery {
        let id = self.unit_id();
        match &self.version {
            None => UnitQuery::Latest(id),
            Some(v) if v.has_wildcard_qualifier(WILDCARD_QUALIFIER) => {
                UnitQuery::Range(id, VersionRange::from_wildcard(v, WILDCARD_QUALIFIER))
            }
            Some(v) => UnitQuery::IdVersion(id, v.clone()),
        }
    }
}

impl fmt::Display for MirrorSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unit_id())?;
        if let Some(version) = &self.version {
            write!(f, "/{version}")?;
        }
        Ok(())
    }
}

impl FromStr for MirrorSeed {
    type Err = Error;

    /// Parse `[feature:|plugin:]id[/version]`
    fn from_str(s: &str) -> Result<Self> {
        let (kind, rest) = match s.split_once(':') {
            Some((kind, rest)) => (
                kind.parse::<SeedKind>()
                    .map_err(|_| Error::ParseError(format!("Unknown seed type '{kind}' in '{s}'")))?,
                rest,
            ),
            None => (SeedKind::Unit, s),
        };
        let (id, version) = match rest.split_once('/') {
            Some((id, version)) => (id, Some(Version::parse(version)?)),
            None => (rest, None),
        };
        if id.trim().is_empty() {
            return Err(Error::ParseError(format!("Seed '{s}' has no id")));
        }
        Ok(Self::new(kind, id.trim(), version))
    }
}

/// Where a mirror run reads from
pub struct MirrorSources {
    pub metadata: Vec<Arc<dyn MetadataRepository>>,
    pub artifacts: Arc<dyn ArtifactProvider>,
    /// Repository copied artifacts are compared against
    pub baseline: Option<Arc<dyn ArtifactProvider>>,
    /// Repositories behind metadata references, by location
    pub referenced: BTreeMap<String, Arc<dyn MetadataRepository>>,
}

impl MirrorSources {
    fn all_units(&self) -> Vec<Arc<InstallableUnit>> {
        self.metadata.iter().flat_map(|r| r.units()).collect()
    }

    fn locations(&self) -> String {
        let locations: Vec<&str> = self.metadata.iter().map(|r| r.location()).collect();
        format!("[{}]", locations.join(", "))
    }

    /// References of all source repositories, without duplicates
    pub fn references(&self) -> Vec<RepositoryReference> {
        let mut references: Vec<RepositoryReference> = Vec::new();
        for reference in self.metadata.iter().flat_map(|r| r.references()) {
            if !references.contains(&reference) {
                references.push(reference);
            }
        }
        references
    }

    /// Ids of the units of a referenced repository and of the enabled
    /// metadata repositories it references in turn
    fn referenced_content(&self, location: &str, visited: &mut HashSet<String>) -> HashSet<VersionedId> {
        let mut content = HashSet::new();
        if !visited.insert(location.to_string()) {
            return content;
        }
        let Some(repository) = self.referenced.get(location) else {
            return content;
        };
        content.extend(repository.units().iter().map(|u| u.versioned_id()));
        for reference in repository.references() {
            if reference.kind == ReferenceType::Metadata && reference.enabled {
                content.extend(self.referenced_content(&reference.location, visited));
            }
        }
        content
    }
}

/// Id of the source unit belonging to `id`
fn source_unit_id(id: &str) -> String {
    match id.strip_suffix(FEATURE_GROUP_SUFFIX) {
        Some(feature) => format!("{feature}{SOURCE_SUFFIX}{FEATURE_GROUP_SUFFIX}"),
        None => format!("{id}{SOURCE_SUFFIX}"),
    }
}

/// Append the source unit with the same version of each unit, if available
fn add_source_units(
    mut units: Vec<Arc<InstallableUnit>>,
    available: &[Arc<InstallableUnit>],
) -> Vec<Arc<InstallableUnit>> {
    let mut present: HashSet<VersionedId> = units.iter().map(|u| u.versioned_id()).collect();
    let mut sources = Vec::new();
    for unit in &units {
        let wanted = VersionedId::new(source_unit_id(&unit.id), unit.version.clone());
        if present.contains(&wanted) {
            continue;
        }
        if let Some(source) = available.iter().find(|a| a.versioned_id() == wanted) {
            present.insert(wanted);
            sources.push(Arc::clone(source));
        }
    }
    debug!("Adding {} source units", sources.len());
    units.extend(sources);
    units
}

/// Outcome of a mirror run
#[derive(Debug, Clone)]
pub struct MirrorSummary {
    pub units: usize,
    /// Descriptors copied to the destination
    pub artifacts: usize,
    pub status: Status,
}

pub struct Mirror {
    options: MirrorOptions,
    environments: Vec<TargetEnvironment>,
    log: Arc<dyn MirrorLog>,
}

impl Mirror {
    pub fn new(options: MirrorOptions, environments: Vec<TargetEnvironment>) -> Self {
        Self {
            options,
            environments,
            log: Arc::new(TracingMirrorLog),
        }
    }

    pub fn with_log(mut self, log: Arc<dyn MirrorLog>) -> Self {
        self.log = log;
        self
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }

    /// Units matching the seeds, or every source unit without seeds
    pub fn root_units(&self, sources: &MirrorSources, seeds: &[MirrorSeed]) -> Result<Vec<Arc<InstallableUnit>>> {
        let all = sources.all_units();
        if seeds.is_empty() {
            return Ok(all);
        }
        let mut roots = Vec::new();
        for seed in seeds {
            let matched = seed.query().apply(all.iter());
            let matched = match seed.query() {
                UnitQuery::Range(id, _) => UnitQuery::Latest(id).apply(matched.iter()),
                _ => matched,
            };
            if matched.is_empty() {
                return Err(Error::MirrorError(format!(
                    "Could not find IU {} in any of the source repositories {}",
                    seed,
                    sources.locations()
                )));
            }
            debug!("Seed {} matched {} units", seed, matched.len());
            roots.extend(matched);
        }
        Ok(roots)
    }

    /// Units reachable from the roots in any of the environments
    pub fn units_to_mirror(
        &self,
        sources: &MirrorSources,
        seeds: &[MirrorSeed],
        monitor: &dyn ProgressTracker,
    ) -> Result<Vec<Arc<InstallableUnit>>> {
        let roots = self.root_units(sources, seeds)?;
        if roots.is_empty() {
            info!("No units to mirror");
            return Ok(Vec::new());
        }
        let mut data = ResolutionData::new(roots, sources.all_units(), ResolutionHints::Ignored);
        data.additional_filter_properties = self.options.filter_properties();
        let strategy = SlicerResolutionStrategy::new(data, self.options.slicer_options(), Defaults::default());
        let result = strategy.multi_platform_resolve(&self.environments, monitor)?;
        if self.options.include_all_source {
            return Ok(add_source_units(result.units, &sources.all_units()));
        }
        Ok(result.units)
    }

    /// Drop the units provided by referenced metadata repositories
    ///
    /// The destination's references are `explicit` plus `added`, the
    /// references this run adds. With `add_only_providing_repo_references`,
    /// `added` loses every entry whose repository provides none of the
    /// units, or only units another referenced repository provides too.
    fn filter_provided(
        &self,
        sources: &MirrorSources,
        units: &mut Vec<Arc<InstallableUnit>>,
        explicit: &[RepositoryReference],
        added: &mut Vec<RepositoryReference>,
    ) {
        let references: Vec<RepositoryReference> = explicit.iter().chain(added.iter()).cloned().collect();
        let mut locations: Vec<&str> = Vec::new();
        for reference in references.iter().filter(|r| r.kind == ReferenceType::Metadata) {
            if locations.contains(&reference.location.as_str()) {
                continue;
            }
            if sources.referenced.contains_key(&reference.location) {
                locations.push(&reference.location);
            } else {
                warn!("Referenced repository {} is not loaded; its units are not filtered", reference.location);
            }
        }
        let full: HashSet<VersionedId> = units.iter().map(|u| u.versioned_id()).collect();
        let before = units.len();
        units.retain(|unit| {
            !locations.iter().any(|location| {
                sources.referenced.get(*location).is_some_and(|r| {
                    !r.query(&UnitQuery::IdVersion(unit.id.clone(), unit.version.clone())).is_empty()
                })
            })
        });
        info!("{} units are provided by referenced repositories", before - units.len());

        if !self.options.add_only_providing_repo_references {
            return;
        }
        let removable: HashSet<String> = added
            .iter()
            .filter(|r| !explicit.iter().any(|e| e.location == r.location))
            .map(|r| r.location.clone())
            .collect();
        let provided: Vec<(String, HashSet<VersionedId>)> = locations
            .iter()
            .map(|location| (location.to_string(), sources.referenced_content(location, &mut HashSet::new())))
            .collect();
        let mut removed: HashSet<String> = HashSet::new();
        for (location, content) in &provided {
            if !removable.contains(location) {
                continue;
            }
            let used: Vec<&VersionedId> = content.intersection(&full).collect();
            let covering = provided.iter().find(|(other, other_content)| {
                other != location
                    && !removed.contains(other)
                    && !other_content.is_empty()
                    && used.iter().all(|id| other_content.contains(*id))
            });
            if used.is_empty() {
                info!("Remove reference {} because no units are contained in the repository.", location);
            } else if let Some((other, _)) = covering {
                info!(
                    "Remove reference {} because all units are also contained in reference {} already.",
                    location, other
                );
            } else {
                continue;
            }
            removed.insert(location.clone());
        }
        added.retain(|r| !removed.contains(&r.location));
    }

    /// Mirror into the destination repositories and save them
    ///
    /// Fails if metadata is to be mirrored but no source repository was
    /// given, or with `fail_on_error` on the first artifact error.
    pub fn mirror(
        &self,
        sources: &MirrorSources,
        seeds: &[MirrorSeed],
        destination_metadata: &mut dyn WritableMetadataRepository,
        destination_artifacts: &mut dyn ArtifactRepository,
        monitor: &dyn ProgressTracker,
    ) -> Result<MirrorSummary> {
        if self.options.mirror_metadata && sources.metadata.is_empty() {
            return Err(Error::MirrorError("No source metadata repositories specified".to_string()));
        }
        let mut units = self.units_to_mirror(sources, seeds, monitor)?;
        let mut added = if self.options.include_references {
            sources.references()
        } else {
            Vec::new()
        };
        if self.options.filter_provided {
            let explicit = destination_metadata.references();
            if !explicit.is_empty() || !added.is_empty() {
                self.filter_provided(sources, &mut units, &explicit, &mut added);
            }
        }
        info!(
            "Mirroring {} units from {} to {}",
            units.len(),
            sources.locations(),
            destination_metadata.location()
        );

        let mut status = Status::multi("Mirroring completed with problems");
        if self.options.mirror_metadata {
            destination_metadata.add_units(&units)?;
            if !added.is_empty() {
                info!("Adding references to the following repositories:");
                for reference in &added {
                    info!("  {}", reference.location);
                }
                destination_metadata.add_references(&added)?;
            }
        }

        let keys: BTreeSet<ArtifactKey> = units.iter().flat_map(|u| u.artifacts.iter().cloned()).collect();
        let copied = self.mirror_artifacts(sources, &keys, destination_artifacts, &mut status, monitor)?;
        if self.options.compare
            && let Some(baseline) = &sources.baseline
        {
            self.compare(baseline.as_ref(), &*destination_artifacts, &copied, &mut status, monitor)?;
        }

        if self.options.mirror_metadata {
            destination_metadata.save()?;
        }
        destination_artifacts.save()?;
        self.log.log(&status);
        if status.matches(Severity::Cancel) {
            return Err(Error::Cancelled);
        }
        if self.options.fail_on_error && status.matches(Severity::Error) {
            return Err(Error::MirrorError(status.collect_messages()));
        }
        info!("Mirrored {} units and {} artifacts", units.len(), copied.len());
        Ok(MirrorSummary {
            units: if self.options.mirror_metadata { units.len() } else { 0 },
            artifacts: copied.len(),
            status,
        })
    }

    /// Copy the artifacts of `keys`, returning the keys copied in canonical form
    fn mirror_artifacts(
        &self,
        sources: &MirrorSources,
        keys: &BTreeSet<ArtifactKey>,
        destination: &mut dyn ArtifactRepository,
        status: &mut Status,
        monitor: &dyn ProgressTracker,
    ) -> Result<Vec<ArtifactKey>> {
        monitor.set_length(keys.len() as u64);
        let mut copied = Vec::new();
        for key in keys {
            checkpoint(monitor)?;
            monitor.set_message(&key.to_string());
            let descriptors = match self.descriptors_to_copy(sources.artifacts.as_ref(), key) {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    let problem = Status::error(format!("Could not mirror artifact {key}: {e}"));
                    self.log.log(&problem);
                    status.add(problem);
                    if self.options.fail_on_error {
                        break;
                    }
                    monitor.increment(1);
                    continue;
                }
            };
            let mut failed = false;
            for descriptor in descriptors {
                let result = self.copy_descriptor(sources.artifacts.as_ref(), &descriptor, destination, monitor);
                self.log.log_descriptor(&descriptor, &result);
                if result.is_cancelled() {
                    status.add(result);
                    return Err(Error::Cancelled);
                }
                if result.matches(Severity::Error) {
                    failed = true;
                } else if descriptor.is_canonical() && result.is_ok() {
                    copied.push(key.clone());
                }
                status.add(result);
                if failed && self.options.fail_on_error {
                    break;
                }
            }
            monitor.increment(1);
            if failed && self.options.fail_on_error {
                break;
            }
        }
        Ok(copied)
    }

    fn descriptors_to_copy(
        &self,
        source: &dyn ArtifactProvider,
        key: &ArtifactKey,
    ) -> Result<Vec<Arc<ArtifactDescriptor>>> {
        if !source.capabilities().raw {
            return Ok(vec![Arc::new(ArtifactDescriptor::canonical(key.clone()))]);
        }
        let mut descriptors = source.descriptors(key)?;
        if descriptors.is_empty() {
            return Err(Error::NotFoundError(format!(
                "{key} is not available in {}",
                source.location()
            )));
        }
        if !self.options.include_packed {
            descriptors.retain(|d| d.format != ArtifactFormat::Packed);
        }
        if self.options.preferred_format_only {
            descriptors = vec![RemoteTransferPolicy.pick_format(&descriptors)?];
        }
        Ok(descriptors)
    }

    fn copy_descriptor(
        &self,
        source: &dyn ArtifactProvider,
        descriptor: &ArtifactDescriptor,
        destination: &mut dyn ArtifactRepository,
        monitor: &dyn ProgressTracker,
    ) -> Status {
        if destination.contains_descriptor(descriptor) {
            return Status::info(format!(
                "Artifact descriptor {} already exists in {}",
                descriptor,
                destination.location()
            ));
        }
        let mut sink = match destination.output_stream(descriptor) {
            Ok(sink) => sink,
            Err(e) => return Status::from_error(&e),
        };
        let transfer = monitor.child(&descriptor.to_string(), 0, ProgressStyle::Bytes);
        let result = if source.capabilities().raw {
            source.get_raw_artifact(descriptor, &mut sink, transfer.as_ref())
        } else {
            source.get_artifact(&descriptor.key, &mut sink, transfer.as_ref())
        };
        if !result.matches(Severity::Error) {
            if let Err(e) = sink.commit() {
                return Status::from_error(&e);
            }
            debug!("Mirrored {}", descriptor);
        }
        result
    }

    fn compare(
        &self,
        baseline: &dyn ArtifactProvider,
        destination: &dyn ArtifactProvider,
        keys: &[ArtifactKey],
        status: &mut Status,
        monitor: &dyn ProgressTracker,
    ) -> Result<()> {
        let comparator = comparator(&self.options.comparator)?;
        info!("Comparing {} artifacts with {} ({})", keys.len(), baseline.location(), comparator.id());
        for key in keys.iter().filter(|k| baseline.contains_key(k)) {
            checkpoint(monitor)?;
            let result = comparator.compare(baseline, destination, key, monitor);
            if result.severity() == Severity::Warning && self.options.fail_on_error {
                status.add(Status::error(result.message()));
            } else {
                status.add(result);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::log::testing::RecordingMirrorLog;
    use super::*;
    use crate::artifact::{ListCompositeArtifactProvider, MemoryArtifactRepository};
    use crate::metadata::Requirement;
    use crate::progress::{CancellationToken, SilentProgress};
    use crate::repository::{MemoryMetadataRepository, RepositoryReference};

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn bundle(id: &str, version: &str) -> InstallableUnit {
        InstallableUnit::builder(id, v(version))
            .bundle()
            .artifact(ArtifactKey::bundle(id, v(version)))
            .build()
    }

    struct Fixture {
        sources: MirrorSources,
        metadata: MemoryMetadataRepository,
        artifacts: MemoryArtifactRepository,
    }

    fn fixture(units: Vec<InstallableUnit>, packed: bool) -> Fixture {
        let mut source_artifacts = MemoryArtifactRepository::new("memory:source-artifacts");
        for unit in &units {
            for key in &unit.artifacts {
                source_artifacts.insert(ArtifactDescriptor::canonical(key.clone()), key.id.as_bytes().to_vec());
                if packed {
                    source_artifacts.insert(ArtifactDescriptor::packed(key.clone()), b"packed".to_vec());
                }
            }
        }
        let mut source = MemoryMetadataRepository::with_units("memory:source", units);
        source
            .add_references(&[RepositoryReference::metadata("https://example.org/updates")])
            .unwrap();
        Fixture {
            sources: MirrorSources {
                metadata: vec![Arc::new(source)],
                artifacts: Arc::new(source_artifacts),
                baseline: None,
                referenced: BTreeMap::new(),
            },
            metadata: MemoryMetadataRepository::new("memory:destination"),
            artifacts: MemoryArtifactRepository::new("memory:destination-artifacts"),
        }
    }

    fn run(mirror: &Mirror, f: &mut Fixture, seeds: &[MirrorSeed]) -> Result<MirrorSummary> {
        mirror.mirror(&f.sources, seeds, &mut f.metadata, &mut f.artifacts, &SilentProgress::new())
    }

    #[test]
    fn test_parse_seeds() {
        let seed: MirrorSeed = "feature:org.example.f/1.0.0".parse().unwrap();
        assert_eq!(seed.kind, SeedKind::Feature);
        assert_eq!(seed.unit_id(), "org.example.f.feature.group");
        assert_eq!(seed.to_string(), "org.example.f.feature.group/1.0.0");

        let seed: MirrorSeed = "org.example.a".parse().unwrap();
        assert_eq!(seed, MirrorSeed::new(SeedKind::Unit, "org.example.a", None));
        assert!("bogus:a".parse::<MirrorSeed>().is_err());
        assert!("/1.0".parse::<MirrorSeed>().is_err());
    }

    #[test]
    fn test_missing_seed_is_an_error() {
        let mut f = fixture(vec![bundle("a", "1.0")], false);
        let mirror = Mirror::new(MirrorOptions::default(), Vec::new());
        let err = run(&mirror, &mut f, &[MirrorSeed::new(SeedKind::Unit, "b", None)]).unwrap_err();
        assert!(err.to_string().contains("Could not find IU b in any of the source repositories [memory:source]"));
    }

    #[test]
    fn test_versionless_seed_selects_latest() {
        let f = fixture(vec![bundle("a", "1.0"), bundle("a", "2.0")], false);
        let mirror = Mirror::new(MirrorOptions::default(), Vec::new());
        let roots = mirror.root_units(&f.sources, &[MirrorSeed::new(SeedKind::Unit, "a", None)]).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].version, v("2.0"));

        let wildcard = MirrorSeed::new(SeedKind::Unit, "a", Some(v("1.0.0.qualifier")));
        let roots = mirror.root_units(&f.sources, &[wildcard]).unwrap();
        assert_eq!(roots[0].version, v("1.0"));
    }

    #[test]
    fn test_packed_forms_are_copied_by_default() {
        let mut f = fixture(vec![bundle("a", "1.0")], true);
        let summary = run(&Mirror::new(MirrorOptions::default(), Vec::new()), &mut f, &[]).unwrap();
        assert_eq!(summary.artifacts, 1);
        let key = ArtifactKey::bundle("a", v("1.0"));
        let descriptors = f.artifacts.descriptors(&key).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert!(descriptors.iter().any(|d| d.format == ArtifactFormat::Packed));

        let mut f = fixture(vec![bundle("a", "1.0")], true);
        let options = MirrorOptions {
            include_packed: false,
            ..Default::default()
        };
        run(&Mirror::new(options, Vec::new()), &mut f, &[]).unwrap();
        let descriptors = f.artifacts.descriptors(&key).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert!(descriptors[0].is_canonical());
    }

    #[test]
    fn test_preferred_format_only() {
        let mut f = fixture(vec![bundle("a", "1.0")], true);
        let options = MirrorOptions {
            preferred_format_only: true,
            ..Default::default()
        };
        run(&Mirror::new(options, Vec::new()), &mut f, &[]).unwrap();
        let descriptors = f.artifacts.descriptors(&ArtifactKey::bundle("a", v("1.0"))).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].format, ArtifactFormat::Packed);
    }

    #[test]
    fn test_existing_descriptor_is_info() {
        let mut f = fixture(vec![bundle("a", "1.0")], false);
        let key = ArtifactKey::bundle("a", v("1.0"));
        f.artifacts.insert(ArtifactDescriptor::canonical(key), b"a".to_vec());
        let log = Arc::new(RecordingMirrorLog::default());
        let mirror = Mirror::new(MirrorOptions::default(), Vec::new()).with_log(log.clone());
        let summary = run(&mirror, &mut f, &[]).unwrap();
        assert_eq!(summary.status.severity(), Severity::Info);
        assert_eq!(summary.artifacts, 0);
        let logged = log.descriptors.lock().unwrap();
        assert_eq!(logged[0].1, Severity::Info);
    }

    #[test]
    fn test_references_copied_on_request() {
        let mut f = fixture(vec![bundle("a", "1.0")], false);
        run(&Mirror::new(MirrorOptions::default(), Vec::new()), &mut f, &[]).unwrap();
        assert!(f.metadata.references().is_empty());

        let mut f = fixture(vec![bundle("a", "1.0")], false);
        let options = MirrorOptions {
            include_references: true,
            ..Default::default()
        };
        run(&Mirror::new(options, Vec::new()), &mut f, &[]).unwrap();
        assert_eq!(f.metadata.references().len(), 1);
    }

    #[test]
    fn test_missing_artifact_fails_or_is_reported() {
        let broken = InstallableUnit::builder("b", v("1.0"))
            .artifact(ArtifactKey::bundle("b", v("1.0")))
            .build();
        let mut f = fixture(vec![bundle("a", "1.0")], false);
        f.sources.metadata = vec![Arc::new(MemoryMetadataRepository::with_units(
            "memory:source",
            vec![bundle("a", "1.0"), broken.clone()],
        ))];
        let err = run(&Mirror::new(MirrorOptions::default(), Vec::new()), &mut f, &[]).unwrap_err();
        assert!(matches!(err, Error::MirrorError(_)));

        let mut f = fixture(vec![bundle("a", "1.0")], false);
        f.sources.metadata = vec![Arc::new(MemoryMetadataRepository::with_units(
            "memory:source",
            vec![bundle("a", "1.0"), broken],
        ))];
        let options = MirrorOptions {
            fail_on_error: false,
            ..Default::default()
        };
        let summary = run(&Mirror::new(options, Vec::new()), &mut f, &[]).unwrap();
        assert!(summary.status.is_error());
        assert_eq!(summary.artifacts, 1);
        assert_eq!(f.metadata.len(), 2);
    }

    #[test]
    fn test_compare_with_baseline() {
        let mut f = fixture(vec![bundle("a", "1.0")], false);
        let mut baseline = MemoryArtifactRepository::new("memory:baseline");
        baseline.insert(
            ArtifactDescriptor::canonical(ArtifactKey::bundle("a", v("1.0"))),
            b"rebuilt".to_vec(),
        );
        f.sources.baseline = Some(Arc::new(baseline));
        let options = MirrorOptions {
            compare: true,
            fail_on_error: false,
            ..Default::default()
        };
        let summary = run(&Mirror::new(options, Vec::new()), &mut f, &[]).unwrap();
        assert_eq!(summary.status.severity(), Severity::Warning);
        assert!(summary.status.collect_messages().contains("Difference found for"));
    }

    #[test]
    fn test_optional_requirements_followed() {
        let a = InstallableUnit::builder("a", v("1.0"))
            .requirement(Requirement::unit("b", VersionRange::ANY).optional())
            .build();
        let mut f = fixture(vec![a, bundle("b", "1.0"), bundle("c", "1.0")], false);
        let summary = run(
            &Mirror::new(MirrorOptions::default(), Vec::new()),
            &mut f,
            &[MirrorSeed::new(SeedKind::Unit, "a", None)],
        )
        .unwrap();
        assert_eq!(summary.units, 2);
        assert_eq!(summary.artifacts, 1);
    }

    #[test]
    fn test_no_sources_is_an_error() {
        let mut f = fixture(Vec::new(), false);
        f.sources.metadata.clear();
        let err = run(&Mirror::new(MirrorOptions::default(), Vec::new()), &mut f, &[]).unwrap_err();
        assert!(matches!(err, Error::MirrorError(_)));
    }

    #[test]
    fn test_empty_source_mirrors_nothing() {
        let mut f = fixture(Vec::new(), false);
        let summary = run(&Mirror::new(MirrorOptions::default(), Vec::new()), &mut f, &[]).unwrap();
        assert_eq!(summary.units, 0);
        assert!(f.metadata.is_empty());
    }

    #[test]
    fn test_cancellation() {
        let mut f = fixture(vec![bundle("a", "1.0")], false);
        let token = CancellationToken::new();
        token.cancel();
        let monitor = SilentProgress::new().with_cancellation(token);
        let mirror = Mirror::new(MirrorOptions::default(), Vec::new());
        let err = mirror
            .mirror(&f.sources, &[], &mut f.metadata, &mut f.artifacts, &monitor)
            .unwrap_err();
        assert!(err.is_cancellation());
    }

    fn unit_ids(repository: &MemoryMetadataRepository) -> Vec<String> {
        let mut ids: Vec<String> = repository.units().iter().map(|u| u.id.clone()).collect();
        ids.sort();
        ids
    }

    fn seed(id: &str) -> MirrorSeed {
        MirrorSeed::new(SeedKind::Unit, id, None)
    }

    #[test]
    fn test_artifacts_from_two_source_repositories() {
        let mut f = fixture(vec![bundle("a", "1.0"), bundle("b", "1.0")], false);
        let a = ArtifactKey::bundle("a", v("1.0"));
        let b = ArtifactKey::bundle("b", v("1.0"));
        let mut first = MemoryArtifactRepository::new("memory:first");
        first.insert(ArtifactDescriptor::canonical(a.clone()), b"a".to_vec());
        let mut second = MemoryArtifactRepository::new("memory:second");
        second.insert(ArtifactDescriptor::canonical(b.clone()), b"b".to_vec());
        second.insert(ArtifactDescriptor::packed(b.clone()), b"packed".to_vec());
        let delegates: Vec<Arc<dyn ArtifactProvider>> = vec![Arc::new(first), Arc::new(second)];
        f.sources.artifacts = ListCompositeArtifactProvider::create(delegates, Arc::new(RemoteTransferPolicy));

        let summary = run(&Mirror::new(MirrorOptions::default(), Vec::new()), &mut f, &[]).unwrap();
        assert_eq!(summary.artifacts, 2);
        assert_eq!(f.artifacts.descriptors(&a).unwrap().len(), 1);
        assert_eq!(f.artifacts.descriptors(&b).unwrap().len(), 2);

        let mut content = Vec::new();
        assert!(f.artifacts.get_artifact(&a, &mut content, &SilentProgress::new()).is_ok());
        assert_eq!(content, b"a");
        let mut content = Vec::new();
        assert!(f.artifacts.get_artifact(&b, &mut content, &SilentProgress::new()).is_ok());
        assert_eq!(content, b"b");
    }

    #[test]
    fn test_include_all_source() {
        let group = InstallableUnit::builder("f.feature.group", v("1.0"))
            .property("org.eclipse.equinox.p2.type.group", "true")
            .requirement(Requirement::unit("a", VersionRange::exact(v("1.0"))))
            .build();
        let units = vec![
            group,
            bundle("a", "1.0"),
            bundle("a.source", "1.0"),
            bundle("a.source", "2.0"),
            InstallableUnit::builder("f.source.feature.group", v("1.0")).build(),
            bundle("b.source", "1.0"),
        ];

        let mut f = fixture(units.clone(), false);
        run(&Mirror::new(MirrorOptions::default(), Vec::new()), &mut f, &[seed("f.feature.group")]).unwrap();
        assert_eq!(unit_ids(&f.metadata), vec!["a", "f.feature.group"]);

        let mut f = fixture(units, false);
        let options = MirrorOptions {
            include_all_source: true,
            ..Default::default()
        };
        let summary = run(&Mirror::new(options, Vec::new()), &mut f, &[seed("f.feature.group")]).unwrap();
        assert_eq!(
            unit_ids(&f.metadata),
            vec!["a", "a.source", "f.feature.group", "f.source.feature.group"]
        );
        assert_eq!(summary.artifacts, 2);
        assert!(f.metadata.units().iter().all(|u| u.version == v("1.0")));
    }

    #[test]
    fn test_include_required_bundles_and_features() {
        let group = InstallableUnit::builder("f.feature.group", v("1.0"))
            .property("org.eclipse.equinox.p2.type.group", "true")
            .requirement(Requirement::unit("a", VersionRange::parse("[1.0,2.0)").unwrap()))
            .requirement(Requirement::unit("g.feature.group", VersionRange::parse("[1.0,2.0)").unwrap()))
            .build();
        let units = vec![
            group,
            bundle("a", "1.0"),
            InstallableUnit::builder("g.feature.group", v("1.0")).build(),
        ];
        let strict = MirrorOptions {
            follow_strict_only: true,
            ..Default::default()
        };

        let mut f = fixture(units.clone(), false);
        run(&Mirror::new(strict.clone(), Vec::new()), &mut f, &[seed("f.feature.group")]).unwrap();
        assert_eq!(unit_ids(&f.metadata), vec!["f.feature.group"]);

        let mut f = fixture(units.clone(), false);
        let options = MirrorOptions {
            include_required_bundles: true,
            ..strict.clone()
        };
        run(&Mirror::new(options, Vec::new()), &mut f, &[seed("f.feature.group")]).unwrap();
        assert_eq!(unit_ids(&f.metadata), vec!["a", "f.feature.group"]);

        let mut f = fixture(units, false);
        let options = MirrorOptions {
            include_required_features: true,
            ..strict
        };
        run(&Mirror::new(options, Vec::new()), &mut f, &[seed("f.feature.group")]).unwrap();
        assert_eq!(unit_ids(&f.metadata), vec!["f.feature.group", "g.feature.group"]);
    }

    #[test]
    fn test_filter_provided_units() {
        let mut f = fixture(vec![bundle("a", "1.0"), bundle("b", "1.0")], false);
        f.metadata
            .add_references(&[RepositoryReference::metadata("memory:provided")])
            .unwrap();
        f.sources.referenced.insert(
            "memory:provided".to_string(),
            Arc::new(MemoryMetadataRepository::with_units("memory:provided", vec![bundle("b", "1.0")])),
        );

        let options = MirrorOptions {
            filter_provided: true,
            ..Default::default()
        };
        let summary = run(&Mirror::new(options, Vec::new()), &mut f, &[]).unwrap();
        assert_eq!(unit_ids(&f.metadata), vec!["a"]);
        assert_eq!(summary.artifacts, 1);
        assert!(!f.artifacts.contains_key(&ArtifactKey::bundle("b", v("1.0"))));
    }

    #[test]
    fn test_only_providing_references_are_added() {
        let mut source = MemoryMetadataRepository::with_units(
            "memory:source",
            vec![bundle("a", "1.0"), bundle("b", "1.0"), bundle("c", "1.0")],
        );
        source
            .add_references(&[
                RepositoryReference::metadata("memory:full"),
                RepositoryReference::metadata("memory:subset"),
                RepositoryReference::metadata("memory:unrelated"),
            ])
            .unwrap();
        let mut f = fixture(vec![bundle("a", "1.0"), bundle("b", "1.0"), bundle("c", "1.0")], false);
        f.sources.metadata = vec![Arc::new(source)];
        let referenced = [
            ("memory:full", vec![bundle("a", "1.0"), bundle("b", "1.0")]),
            ("memory:subset", vec![bundle("b", "1.0")]),
            ("memory:unrelated", vec![bundle("z", "1.0")]),
        ];
        for (location, units) in referenced {
            f.sources.referenced.insert(
                location.to_string(),
                Arc::new(MemoryMetadataRepository::with_units(location, units)),
            );
        }

        let options = MirrorOptions {
            include_references: true,
            filter_provided: true,
            add_only_providing_repo_references: true,
            ..Default::default()
        };
        let summary = run(&Mirror::new(options.clone(), Vec::new()), &mut f, &[]).unwrap();
        assert_eq!(unit_ids(&f.metadata), vec!["c"]);
        assert_eq!(summary.artifacts, 1);
        let locations: Vec<String> = f.metadata.references().into_iter().map(|r| r.location).collect();
        assert_eq!(locations, vec!["memory:full"]);

        let mut f2 = fixture(Vec::new(), false);
        f2.sources = MirrorSources {
            metadata: f.sources.metadata.clone(),
            artifacts: Arc::clone(&f.sources.artifacts),
            baseline: None,
            referenced: f.sources.referenced.clone(),
        };
        let options = MirrorOptions {
            add_only_providing_repo_references: false,
            ..options
        };
        run(&Mirror::new(options, Vec::new()), &mut f2, &[]).unwrap();
        assert_eq!(f2.metadata.references().len(), 3);
    }
}
