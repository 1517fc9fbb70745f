// src/metadata/capability.rs

//! Provided capabilities and requirements of installable units

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::filter::LdapFilter;
use crate::version::{Version, VersionRange};

/// Namespace of unit identities (`id` + `version`)
pub const NAMESPACE_IU_ID: &str = "org.eclipse.equinox.p2.iu";
/// OSGi bundle symbolic names
pub const NAMESPACE_OSGI_BUNDLE: &str = "osgi.bundle";
/// Exported Java packages
pub const NAMESPACE_JAVA_PACKAGE: &str = "java.package";
/// Execution environments
pub const NAMESPACE_OSGI_EE: &str = "osgi.ee";
/// Fragment-to-host relation
pub const NAMESPACE_OSGI_FRAGMENT: &str = "osgi.fragment";
/// Eclipse artifact types, e.g. `source` for source bundles
pub const NAMESPACE_ECLIPSE_TYPE: &str = "org.eclipse.equinox.p2.eclipse.type";
pub const TYPE_ECLIPSE_SOURCE: &str = "source";

/// A capability offered by an installable unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvidedCapability {
    pub namespace: String,
    pub name: String,
    pub version: Version,
    /// Extra attributes matched by property requirements
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl ProvidedCapability {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, version: Version) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version,
            attributes: BTreeMap::new(),
        }
    }

    /// Attribute view used when evaluating property requirements
    ///
    /// Contains the explicit attributes plus `<namespace>=<name>` and
    /// `version=<version>`.
    pub fn match_properties(&self) -> BTreeMap<String, String> {
        let mut props = self.attributes.clone();
        props.insert(self.namespace.clone(), self.name.clone());
        props.insert("version".to_string(), self.version.to_string());
        props
    }
}

impl fmt::Display for ProvidedCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; {} {}", self.namespace, self.name, self.version)
    }
}

/// What a requirement matches against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RequirementMatch {
    /// Capability with this namespace and name whose version is in range
    Capability {
        namespace: String,
        name: String,
        range: VersionRange,
    },
    /// Any capability in the namespace whose properties satisfy the filter
    Properties { namespace: String, filter: LdapFilter },
}

/// A dependency of an installable unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub matches: RequirementMatch,
    /// Applicability filter evaluated against the selection context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<LdapFilter>,
    /// Minimum cardinality; 0 means optional
    #[serde(default = "default_min")]
    pub min: u32,
    /// Maximum cardinality; 0 means "must not be present"
    #[serde(default = "default_max")]
    pub max: u32,
    #[serde(default = "default_greedy")]
    pub greedy: bool,
}

fn default_min() -> u32 {
    1
}

fn default_max() -> u32 {
    1
}

fn default_greedy() -> bool {
    true
}

impl Requirement {
    /// Mandatory, greedy requirement on a named capability
    pub fn capability(namespace: impl Into<String>, name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            matches: RequirementMatch::Capability {
                namespace: namespace.into(),
                name: name.into(),
                range,
            },
            filter: None,
            min: 1,
            max: 1,
            greedy: true,
        }
    }

    /// Requirement on capability properties, e.g. an `osgi.ee` requirement
    pub fn properties(namespace: impl Into<String>, filter: LdapFilter) -> Self {
        Self {
            matches: RequirementMatch::Properties {
                namespace: namespace.into(),
                filter,
            },
            filter: None,
            min: 1,
            max: 1,
            greedy: true,
        }
    }

    /// Strict requirement on a unit identity
    pub fn unit(id: impl Into<String>, range: VersionRange) -> Self {
        Self::capability(NAMESPACE_IU_ID, id, range)
    }

    pub fn optional(mut self) -> Self {
        self.min = 0;
        self
    }

    pub fn non_greedy(mut self) -> Self {
        self.greedy = false;
        self
    }

    pub fn with_filter(mut self, filter: LdapFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// A requirement that forbids any match
    pub fn negative(mut self) -> Self {
        self.min = 0;
        self.max = 0;
        self
    }

    pub fn is_optional(&self) -> bool {
        self.min == 0
    }

    pub fn namespace(&self) -> &str {
        match &self.matches {
            RequirementMatch::Capability { namespace, .. } => namespace,
            RequirementMatch::Properties { namespace, .. } => namespace,
        }
    }

    /// Name of the required capability, if this is a named requirement
    pub fn name(&self) -> Option<&str> {
        match &self.matches {
            RequirementMatch::Capability { name, .. } => Some(name),
            RequirementMatch::Properties { .. } => None,
        }
    }

    pub fn range(&self) -> Option<&VersionRange> {
        match &self.matches {
            RequirementMatch::Capability { range, .. } => Some(range),
            RequirementMatch::Properties { .. } => None,
        }
    }

    /// True if the version range pins exactly one version
    pub fn is_strict(&self) -> bool {
        self.range().is_some_and(VersionRange::is_exact)
    }

    pub fn is_satisfied_by(&self, capability: &ProvidedCapability) -> bool {
        match &self.matches {
            RequirementMatch::Capability {
                namespace,
                name,
                range,
            } => {
                capability.namespace == *namespace
                    && capability.name == *name
                    && range.includes(&capability.version)
            }
            RequirementMatch::Properties { namespace, filter } => {
                capability.namespace == *namespace && filter.matches(&capability.match_properties())
            }
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.matches {
            RequirementMatch::Capability {
                namespace,
                name,
                range,
            } => write!(f, "{}; {} {}", namespace, name, range)?,
            RequirementMatch::Properties { namespace, filter } => write!(f, "{}; {}", namespace, filter)?,
        }
        if let Some(filter) = &self.filter {
            write!(f, " (filter: {})", filter)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_requirement() {
        let req = Requirement::capability(
            NAMESPACE_OSGI_BUNDLE,
            "org.example.b",
            VersionRange::parse("[1.0,2.0)").unwrap(),
        );
        let good = ProvidedCapability::new(NAMESPACE_OSGI_BUNDLE, "org.example.b", Version::parse("1.5").unwrap());
        let too_new = ProvidedCapability::new(NAMESPACE_OSGI_BUNDLE, "org.example.b", Version::new(2, 0, 0));
        let wrong_ns = ProvidedCapability::new(NAMESPACE_JAVA_PACKAGE, "org.example.b", Version::parse("1.5").unwrap());
        assert!(req.is_satisfied_by(&good));
        assert!(!req.is_satisfied_by(&too_new));
        assert!(!req.is_satisfied_by(&wrong_ns));
        assert_eq!(req.to_string(), "osgi.bundle; org.example.b [1.0.0,2.0.0)");
    }

    #[test]
    fn test_property_requirement() {
        let req = Requirement::properties(
            NAMESPACE_OSGI_EE,
            LdapFilter::parse("(&(osgi.ee=JavaSE)(version=1.8))").unwrap(),
        );
        let ee = ProvidedCapability::new(NAMESPACE_OSGI_EE, "JavaSE", Version::parse("1.8").unwrap());
        let other = ProvidedCapability::new(NAMESPACE_OSGI_EE, "JavaSE", Version::new(11, 0, 0));
        assert!(req.is_satisfied_by(&ee));
        assert!(!req.is_satisfied_by(&other));
        assert_eq!(req.name(), None);
    }

    #[test]
    fn test_flags() {
        let req = Requirement::unit("a", VersionRange::exact(Version::new(1, 0, 0)));
        assert!(req.is_strict());
        assert!(!req.is_optional());
        let req = req.optional().non_greedy();
        assert!(req.is_optional());
        assert!(!req.greedy);
        let req = Requirement::unit("b", VersionRange::ANY).negative();
        assert_eq!(req.max, 0);
        assert!(!req.is_strict());
    }
}
