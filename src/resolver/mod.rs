// src/resolver/mod.rs

//! Target-platform resolution
//!
//! Two strategies compute the units of a target platform from a set of
//! root units:
//!
//! - [`SlicerResolutionStrategy`]: reachability closure. Follows every
//!   applicable requirement and keeps every match, so several versions of a
//!   unit can end up in the result. Unsatisfied requirements are warnings.
//! - [`ProjectorResolutionStrategy`]: picks one mutually consistent set and
//!   fails with an explanation when there is none.
//!
//! Both slice the available units first. The slice starts from the roots,
//! the mandatory execution-environment units and synthetic units carrying
//! the additional and mandatory requirements.
//!
//! # Example
//!
//! ```ignore
//! let data = ResolutionData::new(roots, available, hints);
//! let strategy = ProjectorResolutionStrategy::new(data, Defaults::default());
//! let result = strategy.resolve(&TargetEnvironment::new("linux", "gtk", "x86_64"), &monitor)?;
//! ```

mod conflict;
mod plan;
mod projector;
mod slicer;
mod start_level;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::ee::ResolutionHints;
use crate::environment::TargetEnvironment;
use crate::error::Result;
use crate::metadata::capability::NAMESPACE_OSGI_EE;
use crate::metadata::{InstallableUnit, Requirement, RequirementMatch};
use crate::progress::ProgressTracker;
use crate::version::{Version, VersionRange, WILDCARD_QUALIFIER};

pub use conflict::Conflict;
pub use plan::ResolutionResult;
pub use projector::ProjectorResolutionStrategy;
pub use slicer::{ContextPolicy, PermissivePolicy, Slice, SlicePolicy, Slicer, SlicerOptions, SlicerResolutionStrategy};
pub use start_level::{StartLevel, parse_configure_instruction, resolve_start_levels};

/// Computes the units of a target platform
pub trait ResolutionStrategy {
    /// Resolve for one target environment
    fn resolve(&self, environment: &TargetEnvironment, monitor: &dyn ProgressTracker) -> Result<ResolutionResult>;

    /// Resolve for each environment and merge the results
    fn multi_platform_resolve(
        &self,
        environments: &[TargetEnvironment],
        monitor: &dyn ProgressTracker,
    ) -> Result<ResolutionResult> {
        let mut merged: Option<ResolutionResult> = None;
        for environment in environments {
            let result = self.resolve(environment, monitor)?;
            match merged.as_mut() {
                Some(m) => m.merge(result),
                None => merged = Some(result),
            }
        }
        match merged {
            Some(result) => Ok(result),
            None => self.resolve(&TargetEnvironment::any(), monitor),
        }
    }
}

/// Which strategy to resolve with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StrategyKind {
    Slicer,
    #[default]
    Projector,
}

/// Create a strategy of the given kind
///
/// `options` only apply to the slicer.
pub fn new_strategy(
    kind: StrategyKind,
    data: ResolutionData,
    options: SlicerOptions,
    defaults: Defaults,
) -> Box<dyn ResolutionStrategy> {
    match kind {
        StrategyKind::Slicer => Box::new(SlicerResolutionStrategy::new(data, options, defaults)),
        StrategyKind::Projector => Box::new(ProjectorResolutionStrategy::new(data, defaults)),
    }
}

/// Explicit defaults for one resolution run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Version qualifier meaning "any qualifier"
    pub wildcard_qualifier: String,
    /// Start level of bundles without explicit configuration
    pub default_start_level: StartLevel,
    /// Start levels by bundle id
    pub start_levels: BTreeMap<String, StartLevel>,
}

impl Default for Defaults {
    fn default() -> Self {
        let start_levels = [
            ("org.eclipse.equinox.common", StartLevel::new(2, true)),
            ("org.eclipse.update.configurator", StartLevel::new(3, true)),
            ("org.eclipse.core.runtime", StartLevel::default_level(true)),
        ]
        .into_iter()
        .map(|(id, level)| (id.to_string(), level))
        .collect();
        Self {
            wildcard_qualifier: WILDCARD_QUALIFIER.to_string(),
            default_start_level: StartLevel::new(4, false),
            start_levels,
        }
    }
}

impl Defaults {
    /// Requirement for a root given by id and optional version
    ///
    /// No version means any version; a version with the wildcard qualifier
    /// matches its base version; any other version is matched exactly.
    pub fn seed_requirement(&self, id: &str, version: Option<&Version>) -> Requirement {
        let range = match version {
            None => VersionRange::ANY,
            Some(v) if v.has_wildcard_qualifier(&self.wildcard_qualifier) => {
                VersionRange::from_wildcard(v, &self.wildcard_qualifier)
            }
            Some(v) => VersionRange::exact(v.clone()),
        };
        Requirement::unit(id, range)
    }
}

/// Inputs of a resolution run
#[derive(Debug, Clone)]
pub struct ResolutionData {
    pub root_units: Vec<Arc<InstallableUnit>>,
    pub available_units: Vec<Arc<InstallableUnit>>,
    /// Requirements resolved in addition to those of the roots
    pub additional_requirements: Vec<Requirement>,
    pub hints: ResolutionHints,
    /// Properties merged with each environment's `osgi.*` properties
    pub additional_filter_properties: BTreeMap<String, String>,
}

impl ResolutionData {
    pub fn new(
        root_units: Vec<Arc<InstallableUnit>>,
        available_units: Vec<Arc<InstallableUnit>>,
        hints: ResolutionHints,
    ) -> Self {
        Self {
            root_units,
            available_units,
            additional_requirements: Vec::new(),
            hints,
            additional_filter_properties: BTreeMap::new(),
        }
    }

    pub fn with_additional_requirements(mut self, requirements: Vec<Requirement>) -> Self {
        self.additional_requirements = requirements;
        self
    }

    pub fn with_filter_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_filter_properties.insert(key.into(), value.into());
        self
    }

    /// Properties filters are evaluated against in `environment`
    pub fn selection_context(&self, environment: &TargetEnvironment) -> BTreeMap<String, String> {
        environment.selection_context(&self.additional_filter_properties)
    }

    /// Seeds and universe of the slice
    ///
    /// The universe holds the available units, the hint units and the
    /// synthetic seed units. Synthetic units never appear in a result.
    pub(crate) fn slice_input(&self) -> SliceInput {
        let mut seeds: Vec<Arc<InstallableUnit>> = self.root_units.clone();
        let mut synthetic = Vec::new();
        if !self.additional_requirements.is_empty() {
            let extra = Arc::new(synthetic_unit("tpforge-extra", &[], &self.additional_requirements));
            synthetic.push(Arc::clone(&extra));
            seeds.push(extra);
        }
        seeds.extend(self.hints.mandatory_units());
        let mandatory_requirements = self.hints.mandatory_requirements();
        if !mandatory_requirements.is_empty() {
            let ee = Arc::new(synthetic_unit("tpforge-ee", &[], &mandatory_requirements));
            synthetic.push(Arc::clone(&ee));
            seeds.push(ee);
        }

        let temporary = self.hints.temporary_additions();
        let mandatory = self.hints.mandatory_units();
        let universe = self
            .available_units
            .iter()
            .chain(temporary.iter())
            .chain(mandatory.iter())
            .cloned();
        SliceInput {
            seeds: dedup(seeds),
            index: CapabilityIndex::new(universe),
            synthetic,
        }
    }

    /// True if `osgi.ee` requirements are skipped
    pub(crate) fn ignores_ee(&self) -> bool {
        matches!(self.hints, ResolutionHints::Ignored)
    }
}

pub(crate) struct SliceInput {
    pub seeds: Vec<Arc<InstallableUnit>>,
    pub index: CapabilityIndex,
    pub synthetic: Vec<Arc<InstallableUnit>>,
}

/// Requirement on the `osgi.ee` namespace
pub fn is_ee_requirement(requirement: &Requirement) -> bool {
    matches!(&requirement.matches, RequirementMatch::Properties { namespace, .. } if namespace == NAMESPACE_OSGI_EE)
}

/// Unit named `<prefix>-<millis>` requiring each of `units` strictly plus `requirements`
pub(crate) fn synthetic_unit(
    prefix: &str,
    units: &[Arc<InstallableUnit>],
    requirements: &[Requirement],
) -> InstallableUnit {
    let millis = chrono::Utc::now().timestamp_millis().unsigned_abs().to_string();
    InstallableUnit::builder(format!("{prefix}-{millis}"), Version::with_qualifier(0, 0, 0, millis))
        .requirements(units.iter().map(|u| u.strict_requirement()))
        .requirements(requirements.iter().cloned())
        .build()
}

/// Render a selection context as `{k=v, ...}`
pub(crate) fn describe_context(context: &BTreeMap<String, String>) -> String {
    let entries: Vec<String> = context.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{{{}}}", entries.join(", "))
}

fn dedup(units: Vec<Arc<InstallableUnit>>) -> Vec<Arc<InstallableUnit>> {
    let mut seen = HashSet::new();
    units.into_iter().filter(|u| seen.insert(Arc::clone(u))).collect()
}

/// Units indexed by provided capability
///
/// Units are kept once, in first-seen order; match results follow that
/// order.
#[derive(Debug, Default)]
pub struct CapabilityIndex {
    units: Vec<Arc<InstallableUnit>>,
    by_name: HashMap<(String, String), Vec<usize>>,
    by_namespace: HashMap<String, Vec<usize>>,
}

impl CapabilityIndex {
    pub fn new(units: impl IntoIterator<Item = Arc<InstallableUnit>>) -> Self {
        let mut index = Self::default();
        let mut seen = HashSet::new();
        for unit in units {
            if !seen.insert(Arc::clone(&unit)) {
                continue;
            }
            let position = index.units.len();
            for capability in &unit.capabilities {
                let by_name = index
                    .by_name
                    .entry((capability.namespace.clone(), capability.name.clone()))
                    .or_default();
                if by_name.last() != Some(&position) {
                    by_name.push(position);
                }
                let by_namespace = index.by_namespace.entry(capability.namespace.clone()).or_default();
                if by_namespace.last() != Some(&position) {
                    by_namespace.push(position);
                }
            }
            index.units.push(unit);
        }
        debug!("Indexed {} units", index.units.len());
        index
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

    /// Positions of the units satisfying `requirement`
    pub(crate) fn match_positions(&self, requirement: &Requirement) -> Vec<usize> {
        let candidates = match &requirement.matches {
            RequirementMatch::Capability { namespace, name, .. } => {
                self.by_name.get(&(namespace.clone(), name.clone()))
            }
            RequirementMatch::Properties { namespace, .. } => self.by_namespace.get(namespace),
        };
        candidates
            .map(|positions| {
                positions
                    .iter()
                    .copied()
                    .filter(|&p| self.units[p].satisfies(requirement))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Units satisfying `requirement`
    pub fn matches(&self, requirement: &Requirement) -> Vec<Arc<InstallableUnit>> {
        self.match_positions(requirement)
            .into_iter()
            .map(|p| Arc::clone(&self.units[p]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ee::profiles;
    use crate::metadata::LdapFilter;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_seed_requirement_ranges() {
        let defaults = Defaults::default();
        let any = defaults.seed_requirement("a", None);
        assert_eq!(any.range(), Some(&VersionRange::ANY));

        let wildcard = defaults.seed_requirement("a", Some(&v("1.2.3.qualifier")));
        let range = wildcard.range().unwrap();
        assert!(range.includes(&v("1.2.3.v2024")));
        assert!(!range.includes(&v("1.2.4")));

        let exact = defaults.seed_requirement("a", Some(&v("1.2.3.v1")));
        assert!(exact.is_strict());
    }

    #[test]
    fn test_index_matches_in_insertion_order() {
        let b1 = Arc::new(InstallableUnit::builder("b", v("1.0")).bundle().build());
        let b2 = Arc::new(InstallableUnit::builder("b", v("1.5")).bundle().build());
        let index = CapabilityIndex::new(vec![Arc::clone(&b2), Arc::clone(&b1), Arc::clone(&b2)]);
        assert_eq!(index.len(), 2);

        let req = Requirement::capability("osgi.bundle", "b", VersionRange::parse("[1.0,2.0)").unwrap());
        let found = index.matches(&req);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].version, v("1.5"));

        let none = Requirement::capability("osgi.bundle", "c", VersionRange::ANY);
        assert!(index.matches(&none).is_empty());
    }

    #[test]
    fn test_slice_input_adds_synthetic_seeds() {
        let root = Arc::new(InstallableUnit::builder("root", v("1.0")).build());
        let hints = ResolutionHints::standard(profiles::lookup("JavaSE-1.8").unwrap());
        let data = ResolutionData::new(vec![Arc::clone(&root)], Vec::new(), hints)
            .with_additional_requirements(vec![Requirement::unit("extra", VersionRange::ANY)]);
        let input = data.slice_input();

        assert_eq!(input.seeds.len(), 3);
        assert!(Arc::ptr_eq(&input.seeds[0], &root));
        assert!(input.seeds[1].id.starts_with("tpforge-extra-"));
        assert!(input.seeds[2].id.starts_with("a.jre.javase"));
        assert_eq!(input.synthetic.len(), 1);
        assert_eq!(input.index.len(), 1);
    }

    #[test]
    fn test_ignored_hints_skip_ee_requirements() {
        let ee = Requirement::properties(NAMESPACE_OSGI_EE, LdapFilter::parse("(osgi.ee=JavaSE)").unwrap());
        assert!(is_ee_requirement(&ee));
        assert!(!is_ee_requirement(&Requirement::unit("a", VersionRange::ANY)));
        let data = ResolutionData::new(Vec::new(), Vec::new(), ResolutionHints::Ignored);
        assert!(data.ignores_ee());
    }

    #[test]
    fn test_describe_context() {
        let context = TargetEnvironment::new("linux", "gtk", "x86_64").to_filter_properties();
        assert_eq!(
            describe_context(&context),
            "{osgi.arch=x86_64, osgi.os=linux, osgi.ws=gtk}"
        );
    }
}
