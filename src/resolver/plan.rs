// src/resolver/plan.rs

//! Resolution result data structures

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use super::start_level::StartLevel;
use crate::environment::TargetEnvironment;
use crate::metadata::InstallableUnit;
use crate::status::Status;

/// Units resolved for one or more target environments
#[derive(Debug, Clone, Default)]
pub struct ResolutionResult {
    pub environments: Vec<TargetEnvironment>,
    /// Resolved units in the order they were found
    pub units: Vec<Arc<InstallableUnit>>,
    /// Start levels of resolved bundles, by bundle id
    pub start_levels: BTreeMap<String, StartLevel>,
    /// Non-fatal problems reported while resolving
    pub status: Status,
}

impl ResolutionResult {
    pub fn new(environment: TargetEnvironment, units: Vec<Arc<InstallableUnit>>, status: Status) -> Self {
        Self {
            environments: vec![environment],
            units,
            start_levels: BTreeMap::new(),
            status,
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.units.iter().any(|u| u.id == id)
    }

    /// Every resolved version of an id
    pub fn units_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Arc<InstallableUnit>> {
        self.units.iter().filter(move |u| u.id == id)
    }

    /// Fold the result for another environment into this one
    ///
    /// Units already present are kept once; start levels found first win.
    pub fn merge(&mut self, other: ResolutionResult) {
        let mut seen: HashSet<Arc<InstallableUnit>> = self.units.iter().cloned().collect();
        for unit in other.units {
            if seen.insert(Arc::clone(&unit)) {
                self.units.push(unit);
            }
        }
        for (id, level) in other.start_levels {
            self.start_levels.entry(id).or_insert(level);
        }
        self.environments.extend(other.environments);
        self.status.merge(other.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn unit(id: &str, major: u32) -> Arc<InstallableUnit> {
        Arc::new(InstallableUnit::builder(id, Version::new(major, 0, 0)).build())
    }

    #[test]
    fn test_merge_deduplicates_units() {
        let linux = TargetEnvironment::new("linux", "gtk", "x86_64");
        let win = TargetEnvironment::new("win32", "win32", "x86_64");
        let mut result = ResolutionResult::new(linux, vec![unit("a", 1), unit("b", 1)], Status::ok());
        let mut other = ResolutionResult::new(win, vec![unit("a", 1), unit("c", 1)], Status::ok());
        other.status.add(Status::warning("Unsatisfied dependency"));
        result.merge(other);

        assert_eq!(result.len(), 3);
        assert_eq!(result.environments.len(), 2);
        assert!(result.contains("c"));
        assert_eq!(result.units_of("a").count(), 1);
        assert!(!result.status.is_ok());
    }
}
