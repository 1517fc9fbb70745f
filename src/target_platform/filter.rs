// src/target_platform/filter.rs

//! Target-platform filters
//!
//! A filter selects a scope of units and either removes all of them or
//! restricts the scope to the units that also match a second pattern:
//!
//! ```toml
//! [[filters]]
//! scope = { type = "osgi-bundle", id = "org.example.logging" }
//! action = "remove-all"
//!
//! [[filters]]
//! scope = { type = "java-package", id = "javax.annotation" }
//! action = { restrict = { version-range = "[1.2,1.3)" } }
//! ```
//!
//! Filters apply in order, each to the output of the previous one.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use crate::metadata::InstallableUnit;
use crate::metadata::capability::{NAMESPACE_IU_ID, NAMESPACE_JAVA_PACKAGE, NAMESPACE_OSGI_BUNDLE};
use crate::version::{Version, VersionRange};

/// What the id and version of a pattern refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ScopeType {
    /// The unit id and version
    #[default]
    P2InstallableUnit,
    /// The bundle symbolic name and bundle version
    OsgiBundle,
    /// Any exported Java package and its version
    JavaPackage,
}

impl ScopeType {
    fn namespace(self) -> &'static str {
        match self {
            ScopeType::P2InstallableUnit => NAMESPACE_IU_ID,
            ScopeType::OsgiBundle => NAMESPACE_OSGI_BUNDLE,
            ScopeType::JavaPackage => NAMESPACE_JAVA_PACKAGE,
        }
    }
}

/// Matches units by type, id and version
///
/// Absent fields match anything.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UnitPattern {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub scope_type: Option<ScopeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_range: Option<VersionRange>,
}

impl UnitPattern {
    pub fn new(scope_type: ScopeType, id: impl Into<String>) -> Self {
        Self {
            scope_type: Some(scope_type),
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_version_range(mut self, range: VersionRange) -> Self {
        self.version_range = Some(range);
        self
    }

    fn version_matches(&self, version: &Version) -> bool {
        self.version.as_ref().is_none_or(|v| v == version)
            && self.version_range.as_ref().is_none_or(|r| r.includes(version))
    }

    pub fn matches(&self, unit: &InstallableUnit) -> bool {
        let namespace = self.scope_type.unwrap_or_default().namespace();
        unit.capabilities.iter().any(|c| {
            c.namespace == namespace
                && self.id.as_deref().is_none_or(|id| c.name == id)
                && self.version_matches(&c.version)
        })
    }

    /// This pattern with type and id taken from `scope` where unset
    fn inheriting(&self, scope: &UnitPattern) -> UnitPattern {
        UnitPattern {
            scope_type: self.scope_type.or(scope.scope_type),
            id: self.id.clone().or_else(|| scope.id.clone()),
            version: self.version.clone(),
            version_range: self.version_range.clone(),
        }
    }
}

impl fmt::Display for UnitPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type={}", self.scope_type.unwrap_or_default())?;
        if let Some(id) = &self.id {
            write!(f, ", id={id}")?;
        }
        if let Some(version) = &self.version {
            write!(f, ", version={version}")?;
        }
        if let Some(range) = &self.version_range {
            write!(f, ", versionRange={range}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterAction {
    /// Drop every unit in scope
    RemoveAll,
    /// Keep only the units in scope that also match this pattern
    Restrict(UnitPattern),
}

/// One configured target-platform filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPlatformFilter {
    pub scope: UnitPattern,
    pub action: FilterAction,
}

impl TargetPlatformFilter {
    pub fn remove_all(scope: UnitPattern) -> Self {
        Self {
            scope,
            action: FilterAction::RemoveAll,
        }
    }

    pub fn restrict(scope: UnitPattern, restriction: UnitPattern) -> Self {
        Self {
            scope,
            action: FilterAction::Restrict(restriction),
        }
    }

    /// Apply this filter, keeping the order of the remaining units
    pub fn apply(&self, units: Vec<Arc<InstallableUnit>>) -> Vec<Arc<InstallableUnit>> {
        let in_scope = units.iter().filter(|u| self.scope.matches(u)).count();
        if in_scope == 0 {
            debug!("Filter {} matches no units", self);
            return units;
        }
        match &self.action {
            FilterAction::RemoveAll => {
                debug!("Filter {} removes {} units", self, in_scope);
                units.into_iter().filter(|u| !self.scope.matches(u)).collect()
            }
            FilterAction::Restrict(pattern) => {
                let restriction = pattern.inheriting(&self.scope);
                let kept: Vec<Arc<InstallableUnit>> = units
                    .into_iter()
                    .filter(|u| !self.scope.matches(u) || restriction.matches(u))
                    .collect();
                if !kept.iter().any(|u| self.scope.matches(u)) {
                    warn!("Removed all units in scope of target platform filter {}", self);
                }
                kept
            }
        }
    }
}

impl fmt::Display for TargetPlatformFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            FilterAction::RemoveAll => write!(f, "[scope: {}; remove all]", self.scope),
            FilterAction::Restrict(pattern) => write!(f, "[scope: {}; restrict to: {}]", self.scope, pattern),
        }
    }
}

/// Apply filters in order
pub fn apply_filters(
    units: Vec<Arc<InstallableUnit>>,
    filters: &[TargetPlatformFilter],
) -> Vec<Arc<InstallableUnit>> {
    filters.iter().fold(units, |units, filter| filter.apply(units))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn bundle(id: &str, version: &str) -> Arc<InstallableUnit> {
        Arc::new(
            InstallableUnit::builder(id, v(version))
                .bundle()
                .provides(NAMESPACE_JAVA_PACKAGE, &format!("{id}.api"), v(version))
                .build(),
        )
    }

    fn ids(units: &[Arc<InstallableUnit>]) -> Vec<String> {
        units.iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_remove_all() {
        let units = vec![bundle("a", "1.0"), bundle("a", "2.0"), bundle("b", "1.0")];
        let filter = TargetPlatformFilter::remove_all(UnitPattern::new(ScopeType::OsgiBundle, "a"));
        assert_eq!(ids(&filter.apply(units)), vec!["b 1.0.0"]);
    }

    #[test]
    fn test_restrict_inherits_scope() {
        let units = vec![bundle("a", "1.0"), bundle("a", "2.0"), bundle("b", "3.0")];
        let filter = TargetPlatformFilter::restrict(
            UnitPattern::new(ScopeType::P2InstallableUnit, "a"),
            UnitPattern::default().with_version_range(VersionRange::parse("[2.0,3.0)").unwrap()),
        );
        assert_eq!(ids(&filter.apply(units)), vec!["a 2.0.0", "b 3.0.0"]);
    }

    #[test]
    fn test_restrict_by_package() {
        let units = vec![bundle("a", "1.0"), bundle("a", "2.0")];
        let filter = TargetPlatformFilter::restrict(
            UnitPattern::new(ScopeType::JavaPackage, "a.api"),
            UnitPattern::default().with_version(v("1.0")),
        );
        assert_eq!(ids(&filter.apply(units)), vec!["a 1.0.0"]);
    }

    #[test]
    fn test_restrict_may_empty_scope() {
        let units = vec![bundle("a", "1.0"), bundle("b", "1.0")];
        let filter = TargetPlatformFilter::restrict(
            UnitPattern::new(ScopeType::OsgiBundle, "a"),
            UnitPattern::default().with_version(v("5.0")),
        );
        assert_eq!(ids(&apply_filters(units, &[filter])), vec!["b 1.0.0"]);
    }

    #[test]
    fn test_filters_from_toml() {
        #[derive(Deserialize)]
        struct Filters {
            filters: Vec<TargetPlatformFilter>,
        }
        let parsed: Filters = toml::from_str(
            r#"
            [[filters]]
            scope = { type = "osgi-bundle", id = "a" }
            action = "remove-all"

            [[filters]]
            scope = { type = "java-package", id = "a.api" }
            action = { restrict = { version-range = "[1.2,1.3)" } }
            "#,
        )
        .unwrap();
        assert_eq!(parsed.filters[0].action, FilterAction::RemoveAll);
        assert_eq!(
            parsed.filters[1].action,
            FilterAction::Restrict(UnitPattern::default().with_version_range(VersionRange::parse("[1.2,1.3)").unwrap()))
        );
        assert_eq!(parsed.filters[1].to_string(), "[scope: type=java-package, id=a.api; restrict to: type=p2-installable-unit, versionRange=[1.2.0,1.3.0)]");
    }
}
