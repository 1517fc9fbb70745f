// src/resolver/slicer.rs

//! Slicing: the reachability closure of a set of seed units
//!
//! The slicer walks requirements breadth-first from the seeds. Every
//! applicable unit matching an applicable, greedy requirement joins the
//! slice. Unmatched mandatory requirements are reported as warnings in the
//! slicer's status; unmatched optional ones are dropped silently.
//!
//! What counts as applicable is decided by a [`SlicePolicy`]:
//! [`ContextPolicy`] evaluates filters against one selection context,
//! [`PermissivePolicy`] implements the [`SlicerOptions`].

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::start_level::resolve_start_levels;
use super::{CapabilityIndex, Defaults, ResolutionData, ResolutionResult, ResolutionStrategy, describe_context};
use crate::environment::TargetEnvironment;
use crate::error::{Error, Result};
use crate::metadata::capability::{NAMESPACE_ECLIPSE_TYPE, NAMESPACE_IU_ID, TYPE_ECLIPSE_SOURCE};
use crate::metadata::unit::FEATURE_GROUP_SUFFIX;
use crate::metadata::{InstallableUnit, Requirement, VersionedId};
use crate::progress::ProgressTracker;
use crate::status::{Severity, Status};

/// Decides which units and requirements take part in slicing
pub trait SlicePolicy {
    fn is_unit_applicable(&self, unit: &InstallableUnit) -> bool;

    fn is_requirement_applicable(&self, unit: &InstallableUnit, requirement: &Requirement) -> bool;

    fn is_greedy(&self, requirement: &Requirement) -> bool {
        requirement.greedy
    }
}

/// Filters are evaluated against one selection context
#[derive(Debug, Clone)]
pub struct ContextPolicy {
    context: BTreeMap<String, String>,
    ignore_ee: bool,
}

impl ContextPolicy {
    pub fn new(context: BTreeMap<String, String>) -> Self {
        Self {
            context,
            ignore_ee: false,
        }
    }

    /// Skip `osgi.ee` requirements
    pub fn ignoring_ee_requirements(mut self, ignore: bool) -> Self {
        self.ignore_ee = ignore;
        self
    }
}

impl SlicePolicy for ContextPolicy {
    fn is_unit_applicable(&self, unit: &InstallableUnit) -> bool {
        unit.is_applicable(&self.context)
    }

    fn is_requirement_applicable(&self, _unit: &InstallableUnit, requirement: &Requirement) -> bool {
        if self.ignore_ee && super::is_ee_requirement(requirement) {
            return false;
        }
        requirement.filter.as_ref().is_none_or(|f| f.matches(&self.context))
    }
}

/// Options of the permissive slicer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicerOptions {
    /// Follow requirements with a minimum cardinality of zero
    pub include_optional: bool,
    /// Treat every requirement as greedy
    pub everything_greedy: bool,
    /// Only follow requirements pinning exactly one version
    pub consider_strict_dependency_only: bool,
    /// Only follow requirements that carry a filter
    pub follow_only_filtered_requirements: bool,
    /// Keep only the highest version of each id after slicing
    pub latest_version_only: bool,
    /// Value of every filter when there is no context to evaluate it against
    pub force_filter_to: bool,
    /// Follow bundle requirements of feature groups even when
    /// `consider_strict_dependency_only` would skip them
    pub include_required_bundles: bool,
    /// Same as `include_required_bundles` for requirements on other features
    pub include_required_features: bool,
    /// Follow optional, non-greedy requirements on source bundles
    pub follow_source_requirements: bool,
}

impl Default for SlicerOptions {
    fn default() -> Self {
        Self {
            include_optional: true,
            everything_greedy: true,
            consider_strict_dependency_only: false,
            follow_only_filtered_requirements: false,
            latest_version_only: false,
            force_filter_to: true,
            include_required_bundles: false,
            include_required_features: false,
            follow_source_requirements: true,
        }
    }
}

/// Policy implementing [`SlicerOptions`]
///
/// Filters are only evaluated when the context carries more than one
/// property; otherwise every filter evaluates to `force_filter_to`.
#[derive(Debug, Clone)]
pub struct PermissivePolicy {
    context: BTreeMap<String, String>,
    options: SlicerOptions,
    consider_filter: bool,
    ignore_ee: bool,
}

impl PermissivePolicy {
    pub fn new(context: BTreeMap<String, String>, options: SlicerOptions) -> Self {
        let consider_filter = context.len() > 1;
        Self {
            context,
            options,
            consider_filter,
            ignore_ee: false,
        }
    }

    pub fn ignoring_ee_requirements(mut self, ignore: bool) -> Self {
        self.ignore_ee = ignore;
        self
    }

    /// Unit requirement of a feature group covered by `include_required_*`
    fn is_included_group_member(&self, unit: &InstallableUnit, requirement: &Requirement) -> bool {
        if !unit.is_feature_group() || requirement.namespace() != NAMESPACE_IU_ID {
            return false;
        }
        match requirement.name() {
            Some(name) if name.ends_with(FEATURE_GROUP_SUFFIX) => self.options.include_required_features,
            Some(_) => self.options.include_required_bundles,
            None => false,
        }
    }
}

/// Optional, non-greedy requirement on the sources of everything
fn is_source_requirement(requirement: &Requirement) -> bool {
    requirement.is_optional()
        && !requirement.greedy
        && requirement.namespace() == NAMESPACE_ECLIPSE_TYPE
        && requirement.name() == Some(TYPE_ECLIPSE_SOURCE)
}

impl SlicePolicy for PermissivePolicy {
    fn is_unit_applicable(&self, unit: &InstallableUnit) -> bool {
        match &unit.filter {
            None => true,
            Some(filter) if self.consider_filter => filter.matches(&self.context),
            Some(_) => self.options.force_filter_to,
        }
    }

    fn is_requirement_applicable(&self, unit: &InstallableUnit, requirement: &Requirement) -> bool {
        if self.ignore_ee && super::is_ee_requirement(requirement) {
            return false;
        }
        if !self.options.include_optional && requirement.is_optional() {
            return false;
        }
        let only_filtered = self.options.follow_only_filtered_requirements;
        if self.is_included_group_member(unit, requirement) {
            return match &requirement.filter {
                None => !only_filtered,
                Some(filter) => !self.consider_filter || filter.matches(&self.context),
            };
        }
        if self.options.consider_strict_dependency_only && !requirement.is_strict() {
            return false;
        }
        if !self.options.follow_source_requirements && is_source_requirement(requirement) {
            return false;
        }
        match &requirement.filter {
            None => !only_filtered,
            Some(filter) if self.consider_filter => filter.matches(&self.context),
            Some(_) => self.options.force_filter_to,
        }
    }

    fn is_greedy(&self, requirement: &Requirement) -> bool {
        self.options.everything_greedy || requirement.greedy
    }
}

/// Result of slicing
#[derive(Debug, Clone, Default)]
pub struct Slice {
    /// Seeds and everything reachable from them, in discovery order
    pub units: Vec<Arc<InstallableUnit>>,
    /// Units matched by non-greedy requirements within the slice
    pub non_greedy_units: HashSet<Arc<InstallableUnit>>,
}

/// Breadth-first slicer over a capability index
pub struct Slicer<'a, P: SlicePolicy> {
    index: &'a CapabilityIndex,
    policy: P,
    status: Status,
    considered: HashSet<Arc<InstallableUnit>>,
    order: Vec<Arc<InstallableUnit>>,
    to_process: VecDeque<Arc<InstallableUnit>>,
    processed: HashSet<VersionedId>,
    considered_requirements: HashSet<Requirement>,
}

impl<'a, P: SlicePolicy> Slicer<'a, P> {
    pub fn new(index: &'a CapabilityIndex, policy: P) -> Self {
        Self {
            index,
            policy,
            status: Status::multi("Problems resolving provisioning plan."),
            considered: HashSet::new(),
            order: Vec::new(),
            to_process: VecDeque::new(),
            processed: HashSet::new(),
            considered_requirements: HashSet::new(),
        }
    }

    /// Warnings collected while slicing
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Compute the slice reachable from `seeds`
    ///
    /// Fails if a seed is not applicable in the context, and with
    /// [`Error::Cancelled`] when the monitor is cancelled.
    pub fn slice(&mut self, seeds: &[Arc<InstallableUnit>], monitor: &dyn ProgressTracker) -> Result<Slice> {
        if let Some(seed) = seeds.iter().find(|s| !self.policy.is_unit_applicable(s)) {
            let message = format!("The installable unit {seed} does not apply to the current context (missing root filter)");
            self.status.add(Status::error(message.clone()));
            return Err(Error::ResolutionError(message));
        }
        for seed in seeds {
            self.consider(Arc::clone(seed));
        }
        while let Some(unit) = self.to_process.pop_front() {
            if monitor.is_cancelled() {
                self.status.add(Status::cancel());
                return Err(Error::Cancelled);
            }
            self.process(&unit);
        }
        if self.status.matches(Severity::Warning) {
            debug!("Slicer reported problems:\n{}", self.status.collect_messages());
        }
        Ok(Slice {
            non_greedy_units: self.compute_non_greedy(),
            units: std::mem::take(&mut self.order),
        })
    }

    fn consider(&mut self, unit: Arc<InstallableUnit>) {
        if self.considered.insert(Arc::clone(&unit)) {
            self.order.push(Arc::clone(&unit));
            self.to_process.push_back(unit);
        }
    }

    fn process(&mut self, unit: &Arc<InstallableUnit>) {
        self.processed.insert(unit.versioned_id());
        if !self.policy.is_unit_applicable(unit) {
            return;
        }
        for requirement in unit.all_requirements() {
            if self.policy.is_requirement_applicable(unit, requirement) && self.policy.is_greedy(requirement) {
                self.expand(unit, requirement);
            }
        }
    }

    fn expand(&mut self, unit: &InstallableUnit, requirement: &Requirement) {
        if requirement.max == 0 || !self.considered_requirements.insert(requirement.clone()) {
            return;
        }
        let selected: Vec<Arc<InstallableUnit>> = self
            .index
            .matches(requirement)
            .into_iter()
            .filter(|m| self.policy.is_unit_applicable(m))
            .collect();
        if selected.is_empty() {
            if requirement.is_optional() {
                debug!("No unit found to satisfy optional dependency of {} on {}", unit, requirement);
            } else {
                self.status.add(Status::warning(format!(
                    "Unsatisfied dependency: [{}] requiredCapability: {}",
                    unit, requirement
                )));
            }
            return;
        }
        for candidate in selected {
            if !self.processed.contains(&candidate.versioned_id()) {
                self.consider(candidate);
            }
        }
    }

    fn compute_non_greedy(&self) -> HashSet<Arc<InstallableUnit>> {
        let within = CapabilityIndex::new(self.order.iter().cloned());
        let mut result = HashSet::new();
        for unit in &self.order {
            for requirement in unit.all_requirements() {
                if self.policy.is_requirement_applicable(unit, requirement) && !self.policy.is_greedy(requirement) {
                    result.extend(within.matches(requirement));
                }
            }
        }
        result
    }
}

/// Keep only the highest version of every id, in first-seen order
pub fn latest_version_only(units: Vec<Arc<InstallableUnit>>) -> Vec<Arc<InstallableUnit>> {
    let mut highest: HashMap<String, Arc<InstallableUnit>> = HashMap::new();
    for unit in &units {
        let keep = highest.get(&unit.id).is_none_or(|h| unit.version > h.version);
        if keep {
            highest.insert(unit.id.clone(), Arc::clone(unit));
        }
    }
    units
        .into_iter()
        .filter(|u| highest.get(&u.id).is_some_and(|h| Arc::ptr_eq(h, u)))
        .collect()
}

/// Permissive slicing of the available units
pub struct SlicerResolutionStrategy {
    data: ResolutionData,
    options: SlicerOptions,
    defaults: Defaults,
}

impl SlicerResolutionStrategy {
    pub fn new(data: ResolutionData, options: SlicerOptions, defaults: Defaults) -> Self {
        Self { data, options, defaults }
    }
}

impl ResolutionStrategy for SlicerResolutionStrategy {
    fn resolve(&self, environment: &TargetEnvironment, monitor: &dyn ProgressTracker) -> Result<ResolutionResult> {
        let context = self.data.selection_context(environment);
        debug!("Slicing for {}", describe_context(&context));
        let input = self.data.slice_input();
        let policy = PermissivePolicy::new(context, self.options.clone())
            .ignoring_ee_requirements(self.data.ignores_ee());
        let mut slicer = Slicer::new(&input.index, policy);
        let slice = slicer.slice(&input.seeds, monitor)?;
        let status = slicer.status().clone();
        if status.matches(Severity::Error) {
            return Err(Error::ResolutionError(status.collect_messages()));
        }
        if status.matches(Severity::Warning) {
            warn!("{}", status.collect_messages());
        }

        let temporary = self.data.hints.temporary_additions();
        let mut units: Vec<Arc<InstallableUnit>> = slice
            .units
            .into_iter()
            .filter(|u| !input.synthetic.contains(u) && !temporary.contains(u))
            .collect();
        if self.options.latest_version_only {
            units = latest_version_only(units);
        }
        info!("Sliced {} units for {}", units.len(), environment);

        let mut result = ResolutionResult::new(environment.clone(), units, status);
        result.start_levels = resolve_start_levels(&result.units, &self.defaults.start_levels);
        Ok(result)
    }
}
