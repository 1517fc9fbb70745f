// src/resolver/projector.rs

//! Consistent-set resolution
//!
//! The projector picks, from the slice, one set of units in which every
//! mandatory greedy requirement of every selected unit is satisfied, no two
//! versions of a singleton bundle coexist and no negative requirement is
//! violated. Candidates are tried highest version first; dead ends
//! backtrack to the most recent choice. Optional requirements are satisfied
//! afterwards wherever that keeps the set consistent.
//!
//! Every dead end is recorded as a [`Conflict`]; when no consistent set
//! exists the distinct conflicts are the explanation of the failure.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info};

use super::conflict::Conflict;
use super::slicer::{ContextPolicy, Slicer};
use super::start_level::resolve_start_levels;
use super::{
    CapabilityIndex, Defaults, ResolutionData, ResolutionResult, ResolutionStrategy, describe_context,
    is_ee_requirement, synthetic_unit,
};
use crate::ee::ResolutionHints;
use crate::environment::TargetEnvironment;
use crate::error::{Error, Result};
use crate::metadata::{InstallableUnit, Requirement, RequirementMatch};
use crate::progress::{ProgressTracker, checkpoint};
use crate::status::Severity;
use crate::version::Version;

/// Host bundle of the SWT implementation fragments
const SWT_HOST: &str = "org.eclipse.swt";

/// Give up after this many backtracking steps
const MAX_BACKTRACKS: usize = 10_000;

/// Requirement `.1` of the unit at position `.0`
type Obligation = (usize, usize);

#[derive(Debug, Clone, Default)]
struct Assignment {
    selected: BTreeSet<usize>,
    agenda: VecDeque<Obligation>,
    /// Mandatory non-greedy requirements, checked once the agenda is empty
    deferred: Vec<Obligation>,
    optional: Vec<Obligation>,
}

struct Choice {
    state: Assignment,
    candidates: Vec<usize>,
    next: usize,
}

enum Step {
    Done,
    Choose(Vec<usize>),
    Conflict(Conflict),
}

struct Projector<'a> {
    index: CapabilityIndex,
    seed: usize,
    /// Applicable requirements per unit position
    requirements: Vec<Vec<Requirement>>,
    /// Requirements with a maximum cardinality of zero
    negatives: Vec<Obligation>,
    hints: &'a ResolutionHints,
}

impl<'a> Projector<'a> {
    fn new(
        slice: &[Arc<InstallableUnit>],
        seed: Arc<InstallableUnit>,
        context: &BTreeMap<String, String>,
        hints: &'a ResolutionHints,
        ignore_ee: bool,
    ) -> Self {
        let universe = slice
            .iter()
            .filter(|u| u.is_applicable(context))
            .cloned()
            .chain(std::iter::once(Arc::clone(&seed)));
        let index = CapabilityIndex::new(universe);
        let seed_position = index.units().iter().position(|u| Arc::ptr_eq(u, &seed)).unwrap_or(0);

        let requirements: Vec<Vec<Requirement>> = index
            .units()
            .iter()
            .map(|unit| {
                unit.all_requirements()
                    .filter(|r| r.filter.as_ref().is_none_or(|f| f.matches(context)))
                    .filter(|r| !(ignore_ee && is_ee_requirement(r)))
                    .cloned()
                    .collect()
            })
            .collect();
        let negatives = requirements
            .iter()
            .enumerate()
            .flat_map(|(u, reqs)| {
                reqs.iter()
                    .enumerate()
                    .filter(|(_, r)| r.max == 0)
                    .map(move |(r, _)| (u, r))
            })
            .collect();
        Self {
            index,
            seed: seed_position,
            requirements,
            negatives,
            hints,
        }
    }

    fn unit(&self, position: usize) -> &Arc<InstallableUnit> {
        &self.index.units()[position]
    }

    fn requirement(&self, (unit, requirement): Obligation) -> &Requirement {
        &self.requirements[unit][requirement]
    }

    /// Matching units, highest version first
    fn candidates(&self, requirement: &Requirement) -> Vec<usize> {
        let mut candidates = self.index.match_positions(requirement);
        candidates.retain(|&p| p != self.seed);
        candidates.sort_by(|&a, &b| self.unit(b).version.cmp(&self.unit(a).version));
        candidates
    }

    fn is_satisfied(&self, state: &Assignment, requirement: &Requirement) -> bool {
        self.index
            .match_positions(requirement)
            .iter()
            .any(|p| state.selected.contains(p))
    }

    fn select(&self, state: &mut Assignment, position: usize) {
        if state.selected.insert(position) {
            for requirement in 0..self.requirements[position].len() {
                state.agenda.push_back((position, requirement));
            }
        }
    }

    /// Can `position` join the selected units?
    fn check(&self, state: &Assignment, position: usize) -> std::result::Result<(), Conflict> {
        let unit = self.unit(position);
        if unit.singleton {
            let clash = state.selected.iter().map(|&s| self.unit(s)).find(|other| {
                other.singleton && other.id == unit.id && other.version != unit.version
            });
            if let Some(other) = clash {
                return Err(Conflict::Singleton {
                    id: unit.id.clone(),
                    versions: vec![other.version.to_string(), unit.version.to_string()],
                });
            }
        }
        for &(owner, r) in &self.negatives {
            let requirement = self.requirement((owner, r));
            if state.selected.contains(&owner) && unit.satisfies(requirement) {
                return Err(Conflict::Excluded {
                    unit: unit.to_string(),
                    requirement: requirement.to_string(),
                    excluded_by: self.unit(owner).to_string(),
                });
            }
            if owner == position
                && let Some(&excluded) = state
                    .selected
                    .iter()
                    .find(|&&s| self.unit(s).satisfies(requirement))
            {
                return Err(Conflict::Excluded {
                    unit: self.unit(excluded).to_string(),
                    requirement: requirement.to_string(),
                    excluded_by: unit.to_string(),
                });
            }
        }
        Ok(())
    }

    fn missing(&self, obligation: Obligation) -> Conflict {
        let requirement = self.requirement(obligation);
        let required_by = self.unit(obligation.0).to_string();
        match &requirement.matches {
            RequirementMatch::Properties { filter, .. } if is_ee_requirement(requirement) => {
                Conflict::ExecutionEnvironment {
                    required_by,
                    filter: filter.to_string(),
                    active: self.hints.active_name(),
                }
            }
            _ => Conflict::MissingCapability {
                requirement: requirement.to_string(),
                required_by,
            },
        }
    }

    /// Work off the agenda until a choice is needed, a conflict occurs or nothing is left
    fn propagate(&self, state: &mut Assignment) -> Step {
        while let Some(obligation) = state.agenda.pop_front() {
            let requirement = self.requirement(obligation);
            if requirement.max == 0 {
                continue;
            }
            if requirement.is_optional() {
                state.optional.push(obligation);
                continue;
            }
            if !requirement.greedy {
                state.deferred.push(obligation);
                continue;
            }
            if self.is_satisfied(state, requirement) {
                continue;
            }
            let candidates = self.candidates(requirement);
            if candidates.is_empty() {
                return Step::Conflict(self.missing(obligation));
            }
            let mut viable = Vec::new();
            let mut rejected = None;
            for candidate in candidates {
                match self.check(state, candidate) {
                    Ok(()) => viable.push(candidate),
                    Err(conflict) => {
                        rejected.get_or_insert(conflict);
                    }
                }
            }
            match viable.as_slice() {
                [] => return Step::Conflict(rejected.unwrap_or_else(|| self.missing(obligation))),
                [only] => self.select(state, *only),
                _ => return Step::Choose(viable),
            }
        }
        match state
            .deferred
            .iter()
            .find(|&&ob| !self.is_satisfied(state, self.requirement(ob)))
        {
            Some(&unsatisfied) => Step::Conflict(self.missing(unsatisfied)),
            None => Step::Done,
        }
    }

    /// Depth-first search with chronological backtracking
    ///
    /// Returns `None` when every alternative ends in a conflict.
    fn search(
        &self,
        initial: Assignment,
        monitor: &dyn ProgressTracker,
        conflicts: &mut Vec<Conflict>,
    ) -> Result<Option<Assignment>> {
        let mut stack: Vec<Choice> = Vec::new();
        let mut state = initial;
        let mut backtracks = 0;
        loop {
            checkpoint(monitor)?;
            match self.propagate(&mut state) {
                Step::Done => return Ok(Some(state)),
                Step::Choose(candidates) => {
                    let saved = state.clone();
                    self.select(&mut state, candidates[0]);
                    stack.push(Choice {
                        state: saved,
                        candidates,
                        next: 1,
                    });
                }
                Step::Conflict(conflict) => {
                    debug!("Dead end: {}", conflict);
                    if !conflicts.contains(&conflict) {
                        conflicts.push(conflict);
                    }
                    loop {
                        let Some(choice) = stack.last_mut() else {
                            return Ok(None);
                        };
                        if choice.next < choice.candidates.len() {
                            backtracks += 1;
                            if backtracks > MAX_BACKTRACKS {
                                return Err(Error::ResolutionError(format!(
                                    "No consistent set of units found after {MAX_BACKTRACKS} attempts"
                                )));
                            }
                            let candidate = choice.candidates[choice.next];
                            choice.next += 1;
                            state = choice.state.clone();
                            self.select(&mut state, candidate);
                            break;
                        }
                        stack.pop();
                    }
                }
            }
        }
    }

    /// Extend a solution with optional greedy requirements where possible
    fn satisfy_optional(&self, mut state: Assignment, monitor: &dyn ProgressTracker) -> Result<Assignment> {
        let mut tried: HashSet<Obligation> = HashSet::new();
        loop {
            let pending: Vec<Obligation> = state.optional.iter().copied().filter(|ob| !tried.contains(ob)).collect();
            if pending.is_empty() {
                return Ok(state);
            }
            for obligation in pending {
                tried.insert(obligation);
                let requirement = self.requirement(obligation);
                if !requirement.greedy || self.is_satisfied(&state, requirement) {
                    continue;
                }
                for candidate in self.candidates(requirement) {
                    if self.check(&state, candidate).is_err() {
                        continue;
                    }
                    let mut trial = state.clone();
                    self.select(&mut trial, candidate);
                    if let Some(extended) = self.search(trial, monitor, &mut Vec::new())? {
                        state = extended;
                        break;
                    }
                    debug!("Optional {} does not fit, skipping it", self.unit(candidate));
                }
            }
        }
    }

    /// Selected units, without the seed, in slice order
    fn solve(&self, monitor: &dyn ProgressTracker) -> Result<std::result::Result<Vec<Arc<InstallableUnit>>, Vec<Conflict>>> {
        let mut initial = Assignment::default();
        self.select(&mut initial, self.seed);
        let mut conflicts = Vec::new();
        let Some(solution) = self.search(initial, monitor, &mut conflicts)? else {
            return Ok(Err(conflicts));
        };
        let solution = self.satisfy_optional(solution, monitor)?;
        Ok(Ok(solution
            .selected
            .iter()
            .filter(|&&p| p != self.seed)
            .map(|&p| Arc::clone(self.unit(p)))
            .collect()))
    }
}

/// Full resolution to one consistent set of units
pub struct ProjectorResolutionStrategy {
    data: ResolutionData,
    defaults: Defaults,
}

impl ProjectorResolutionStrategy {
    pub fn new(data: ResolutionData, defaults: Defaults) -> Self {
        Self { data, defaults }
    }

    /// Add the native SWT fragment the host bundle does not pull in by itself
    ///
    /// Only needed for SWT hosts before 3.104, and only when no root is SWT
    /// or one of its fragments.
    fn fix_swt(&self, units: &mut Vec<Arc<InstallableUnit>>, context: &BTreeMap<String, String>) -> Result<()> {
        let Some(host) = units.iter().find(|u| u.id == SWT_HOST) else {
            return Ok(());
        };
        if host.version >= Version::new(3, 104, 0) {
            return Ok(());
        }
        if self
            .data
            .root_units
            .iter()
            .any(|u| u.id == SWT_HOST || u.is_fragment_of(SWT_HOST))
        {
            return Ok(());
        }
        let fragment = self
            .data
            .available_units
            .iter()
            .filter(|u| {
                u.id.starts_with(SWT_HOST)
                    && u.is_applicable(context)
                    && u.provides_java_packages()
                    && u.is_fragment_of(SWT_HOST)
            })
            .fold(None::<&Arc<InstallableUnit>>, |best, u| match best {
                Some(b) if b.version >= u.version => Some(b),
                _ => Some(u),
            });
        let Some(fragment) = fragment else {
            return Err(Error::ResolutionError(format!(
                "Could not determine SWT implementation fragment bundle for environment {}",
                describe_context(context)
            )));
        };
        debug!("Adding SWT fragment {}", fragment);
        if !units.contains(fragment) {
            units.push(Arc::clone(fragment));
        }
        Ok(())
    }
}

impl ResolutionStrategy for ProjectorResolutionStrategy {
    fn resolve(&self, environment: &TargetEnvironment, monitor: &dyn ProgressTracker) -> Result<ResolutionResult> {
        let context = self.data.selection_context(environment);
        let input = self.data.slice_input();
        let policy = ContextPolicy::new(context.clone()).ignoring_ee_requirements(self.data.ignores_ee());
        let mut slicer = Slicer::new(&input.index, policy);
        let slice = slicer.slice(&input.seeds, monitor)?;
        let status = slicer.status().clone();
        if status.matches(Severity::Error) {
            return Err(Error::ResolutionError(status.collect_messages()));
        }
        if status.matches(Severity::Warning) {
            debug!("{}", status.collect_messages());
        }

        let mut seed_units = self.data.root_units.clone();
        for unit in self.data.hints.mandatory_units() {
            if !seed_units.contains(&unit) {
                seed_units.push(unit);
            }
        }
        let mut seed_requirements = self.data.additional_requirements.clone();
        seed_requirements.extend(self.data.hints.mandatory_requirements());
        let seed = Arc::new(synthetic_unit("tpforge-seed", &seed_units, &seed_requirements));

        let projector = Projector::new(
            &slice.units,
            seed,
            &context,
            &self.data.hints,
            self.data.ignores_ee(),
        );
        let mut units = match projector.solve(monitor)? {
            Ok(units) => units,
            Err(conflicts) => {
                let explanation: Vec<String> = conflicts.iter().map(|c| c.to_string()).collect();
                return Err(Error::ResolutionError(format!(
                    "Cannot resolve dependencies for environment {}:\n{}",
                    describe_context(&context),
                    explanation.join("\n")
                )));
            }
        };

        let temporary = self.data.hints.temporary_additions();
        units.retain(|u| !temporary.contains(u));
        self.fix_swt(&mut units, &context)?;
        info!("Resolved {} units for {}", units.len(), environment);

        let mut result = ResolutionResult::new(environment.clone(), units, status);
        result.start_levels = resolve_start_levels(&result.units, &self.defaults.start_levels);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ee::profiles;
    use crate::metadata::LdapFilter;
    use crate::metadata::capability::{NAMESPACE_JAVA_PACKAGE, NAMESPACE_OSGI_EE};
    use crate::progress::SilentProgress;
    use crate::version::VersionRange;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn range(s: &str) -> VersionRange {
        VersionRange::parse(s).unwrap()
    }

    fn bundle(id: &str, version: &str) -> InstallableUnit {
        InstallableUnit::builder(id, v(version)).bundle().build()
    }

    fn java8() -> ResolutionHints {
        ResolutionHints::standard(profiles::lookup("JavaSE-1.8").unwrap())
    }

    fn linux() -> TargetEnvironment {
        TargetEnvironment::new("linux", "gtk", "x86_64")
    }

    fn resolve(roots: Vec<InstallableUnit>, available: Vec<InstallableUnit>, hints: ResolutionHints) -> Result<ResolutionResult> {
        let data = ResolutionData::new(
            roots.into_iter().map(Arc::new).collect(),
            available.into_iter().map(Arc::new).collect(),
            hints,
        );
        ProjectorResolutionStrategy::new(data, Defaults::default()).resolve(&linux(), &SilentProgress::new())
    }

    fn ids(result: &ResolutionResult) -> Vec<String> {
        result.units.iter().map(|u| format!("{} {}", u.id, u.version)).collect()
    }

    #[test]
    fn test_picks_one_version_per_requirement() {
        let a = InstallableUnit::builder("a", v("1.0"))
            .bundle()
            .requires_bundle("b", range("[1.0,2.0)"))
            .build();
        let result = resolve(
            vec![a],
            vec![bundle("b", "1.2"), bundle("b", "1.5"), bundle("b", "2.5")],
            java8(),
        )
        .unwrap();
        assert_eq!(ids(&result), vec!["a 1.0.0", "a.jre.javase 1.8.0", "b 1.5.0"]);
    }

    #[test]
    fn test_missing_capability_is_fatal() {
        let a = InstallableUnit::builder("a", v("1.0"))
            .bundle()
            .requires_bundle("b", range("[1.0,2.0)"))
            .build();
        let err = resolve(vec![a], vec![bundle("b", "2.0")], java8()).unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, Error::ResolutionError(_)));
        assert!(message.contains("could not find required capability"));
        assert!(message.contains("osgi.bundle; b [1.0.0,2.0.0)"));
    }

    #[test]
    fn test_ee_mismatch_names_filter_and_active_ee() {
        let a = InstallableUnit::builder("a", v("1.0"))
            .bundle()
            .requirement(Requirement::properties(
                NAMESPACE_OSGI_EE,
                LdapFilter::parse("(&(osgi.ee=JavaSE)(version=11))").unwrap(),
            ))
            .build();
        let message = resolve(vec![a.clone()], Vec::new(), java8()).unwrap_err().to_string();
        assert!(message.contains("requires Execution Environment that matches (&(osgi.ee=JavaSE)(version=11))"));
        assert!(message.contains("a.jre.javase 1.8.0"));

        let ignored = resolve(vec![a], Vec::new(), ResolutionHints::Ignored).unwrap();
        assert_eq!(ids(&ignored), vec!["a 1.0.0"]);
    }

    #[test]
    fn test_backtracks_over_singleton_conflicts() {
        let a = InstallableUnit::builder("a", v("1.0"))
            .requires_bundle("x", range("[1.0,3.0)"))
            .requires_bundle("y", VersionRange::ANY)
            .build();
        let y = InstallableUnit::builder("y", v("1.0"))
            .bundle()
            .requires_bundle("x", range("[1.0,2.0)"))
            .build();
        let x1 = InstallableUnit::builder("x", v("1.0")).bundle().singleton(true).build();
        let x2 = InstallableUnit::builder("x", v("2.0")).bundle().singleton(true).build();
        let result = resolve(vec![a], vec![x2, x1, y], ResolutionHints::Ignored).unwrap();
        assert_eq!(result.units_of("x").map(|u| u.version.to_string()).collect::<Vec<_>>(), vec!["1.0.0"]);
        assert!(result.contains("y"));
    }

    #[test]
    fn test_unresolvable_singletons_are_explained() {
        let a = InstallableUnit::builder("a", v("1.0"))
            .requirement(Requirement::unit("x", VersionRange::exact(v("1.0"))))
            .requirement(Requirement::unit("x", VersionRange::exact(v("2.0"))))
            .build();
        let x1 = InstallableUnit::builder("x", v("1.0")).singleton(true).build();
        let x2 = InstallableUnit::builder("x", v("2.0")).singleton(true).build();
        let message = resolve(vec![a], vec![x1, x2], ResolutionHints::Ignored).unwrap_err().to_string();
        assert!(message.contains("Only one of the following can be installed at once"));
    }

    #[test]
    fn test_optional_requirements_are_best_effort() {
        let a = InstallableUnit::builder("a", v("1.0"))
            .requirement(Requirement::unit("present", VersionRange::ANY).optional())
            .requirement(Requirement::unit("absent", VersionRange::ANY).optional())
            .requirement(Requirement::unit("broken", VersionRange::ANY).optional())
            .build();
        let present = InstallableUnit::builder("present", v("1.0")).build();
        let broken = InstallableUnit::builder("broken", v("1.0"))
            .requires_bundle("nowhere", VersionRange::ANY)
            .build();
        let result = resolve(vec![a], vec![present, broken], ResolutionHints::Ignored).unwrap();
        assert_eq!(ids(&result), vec!["a 1.0.0", "present 1.0.0"]);
    }

    #[test]
    fn test_all_known_units_are_removed_from_result() {
        let a = InstallableUnit::builder("a", v("1.0")).bundle().build();
        let result = resolve(vec![a], Vec::new(), ResolutionHints::all_known()).unwrap();
        assert_eq!(ids(&result), vec!["a 1.0.0"]);
    }

    fn swt_fragment(os: &str) -> InstallableUnit {
        InstallableUnit::builder(format!("org.eclipse.swt.gtk.{os}.x86_64"), v("3.100.0"))
            .bundle()
            .fragment_of(SWT_HOST, range("[3.0.0,4.0.0)"))
            .provides(NAMESPACE_JAVA_PACKAGE, "org.eclipse.swt.widgets", v("0.0.0"))
            .filter(LdapFilter::parse(&format!("(osgi.os={os})")).unwrap())
            .build()
    }

    #[test]
    fn test_swt_fragment_is_added_for_old_hosts() {
        let a = InstallableUnit::builder("a", v("1.0"))
            .requires_bundle(SWT_HOST, VersionRange::ANY)
            .build();
        let available = vec![bundle(SWT_HOST, "3.100.0"), swt_fragment("linux"), swt_fragment("win32")];
        let result = resolve(vec![a.clone()], available, ResolutionHints::Ignored).unwrap();
        assert!(result.contains("org.eclipse.swt.gtk.linux.x86_64"));
        assert!(!result.contains("org.eclipse.swt.gtk.win32.x86_64"));

        let message = resolve(vec![a], vec![bundle(SWT_HOST, "3.100.0")], ResolutionHints::Ignored)
            .unwrap_err()
            .to_string();
        assert!(message.contains("Could not determine SWT implementation fragment bundle for environment"));
        assert!(message.contains("osgi.os=linux"));
    }

    #[test]
    fn test_swt_fix_skipped_for_new_hosts() {
        let a = InstallableUnit::builder("a", v("1.0"))
            .requires_bundle(SWT_HOST, VersionRange::ANY)
            .build();
        let result = resolve(vec![a], vec![bundle(SWT_HOST, "3.104.0")], ResolutionHints::Ignored).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_inapplicable_root_fails() {
        let a = InstallableUnit::builder("a", v("1.0"))
            .filter(LdapFilter::parse("(osgi.os=win32)").unwrap())
            .build();
        let message = resolve(vec![a], Vec::new(), ResolutionHints::Ignored).unwrap_err().to_string();
        assert!(message.contains("missing root filter"));
    }
}
