// src/metadata/unit.rs

//! Installable units
//!
//! An [`InstallableUnit`] is the atomic resolvable entity: a bundle, a
//! feature group, a product or a synthetic execution-environment unit.
//! Units are immutable once built; they are shared as `Arc<InstallableUnit>`
//! between repositories, resolvers and target platforms.
//!
//! Identity is `id + version + provenance`: the same id and version
//! published by two repositories are distinct units until a caller
//! deduplicates them with [`InstallableUnit::versioned_id`].

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::artifact::ArtifactKey;
use super::capability::{
    NAMESPACE_IU_ID, NAMESPACE_JAVA_PACKAGE, NAMESPACE_OSGI_BUNDLE, NAMESPACE_OSGI_FRAGMENT, ProvidedCapability,
    Requirement,
};
use super::filter::{LdapFilter, PropertyLookup};
use crate::version::{Version, VersionRange};

/// Property marking units that only carry partial metadata
pub const PROP_PARTIAL_IU: &str = "org.eclipse.equinox.p2.partial.iu";
/// Property marking feature groups
pub const PROP_TYPE_GROUP: &str = "org.eclipse.equinox.p2.type.group";
/// Suffix of feature group unit ids
pub const FEATURE_GROUP_SUFFIX: &str = ".feature.group";
/// Suffix of feature JAR unit ids
pub const FEATURE_JAR_SUFFIX: &str = ".feature.jar";
/// Touchpoint phase holding start-level instructions
pub const PHASE_CONFIGURE: &str = "configure";

/// `id` + `version` pair, without provenance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionedId {
    pub id: String,
    pub version: Version,
}

impl VersionedId {
    pub fn new(id: impl Into<String>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }
}

impl fmt::Display for VersionedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// An installable unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallableUnit {
    pub id: String,
    pub version: Version,
    #[serde(default)]
    pub singleton: bool,
    #[serde(default)]
    pub capabilities: Vec<ProvidedCapability>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    /// Host requirement of a fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<Requirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<LdapFilter>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactKey>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Touchpoint instructions by phase (`configure`, `install`, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub instructions: BTreeMap<String, String>,
    /// Location of the repository this unit was read from
    #[serde(skip)]
    pub provenance: Option<String>,
}

impl PartialEq for InstallableUnit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.version == other.version && self.provenance == other.provenance
    }
}

impl Eq for InstallableUnit {}

impl Hash for InstallableUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.version.hash(state);
        self.provenance.hash(state);
    }
}

impl InstallableUnit {
    /// Start building a unit; the self-capability is added on `build`
    pub fn builder(id: impl Into<String>, version: Version) -> InstallableUnitBuilder {
        InstallableUnitBuilder::new(id.into(), version)
    }

    pub fn versioned_id(&self) -> VersionedId {
        VersionedId::new(self.id.clone(), self.version.clone())
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Units whose metadata is incomplete and must not be resolved against
    pub fn is_partial(&self) -> bool {
        self.property(PROP_PARTIAL_IU)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn is_feature_group(&self) -> bool {
        self.property(PROP_TYPE_GROUP)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
            || self.id.ends_with(FEATURE_GROUP_SUFFIX)
    }

    pub fn is_fragment(&self) -> bool {
        self.host.is_some()
            || self
                .capabilities
                .iter()
                .any(|c| c.namespace == NAMESPACE_OSGI_FRAGMENT)
    }

    /// True if this unit is a fragment attached to the given host bundle
    pub fn is_fragment_of(&self, host_id: &str) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.namespace == NAMESPACE_OSGI_FRAGMENT && c.name == host_id)
            || self.host.as_ref().and_then(Requirement::name) == Some(host_id)
    }

    pub fn provides_namespace(&self, namespace: &str) -> bool {
        self.capabilities.iter().any(|c| c.namespace == namespace)
    }

    pub fn provides_java_packages(&self) -> bool {
        self.provides_namespace(NAMESPACE_JAVA_PACKAGE)
    }

    /// Bundle symbolic name, if this unit is an OSGi bundle
    pub fn bundle_capability(&self) -> Option<&ProvidedCapability> {
        self.capabilities
            .iter()
            .find(|c| c.namespace == NAMESPACE_OSGI_BUNDLE)
    }

    /// True if any provided capability satisfies the requirement
    pub fn satisfies(&self, requirement: &Requirement) -> bool {
        self.capabilities.iter().any(|c| requirement.is_satisfied_by(c))
    }

    /// Applicability of the unit's own filter
    ///
    /// A unit without a filter applies everywhere.
    pub fn is_applicable<P: PropertyLookup + ?Sized>(&self, context: &P) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(context))
    }

    /// Requirements including the fragment host requirement
    pub fn all_requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().chain(self.host.iter())
    }

    /// Copy of this unit attributed to a repository location
    pub fn with_provenance(&self, location: impl Into<String>) -> Self {
        let mut unit = self.clone();
        unit.provenance = Some(location.into());
        unit
    }

    /// Strict requirement on exactly this unit
    pub fn strict_requirement(&self) -> Requirement {
        let mut req = Requirement::unit(self.id.clone(), VersionRange::exact(self.version.clone()));
        req.filter = self.filter.clone();
        req
    }
}

impl fmt::Display for InstallableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// Builder for [`InstallableUnit`]
#[derive(Debug, Clone)]
pub struct InstallableUnitBuilder {
    unit: InstallableUnit,
}

impl InstallableUnitBuilder {
    fn new(id: String, version: Version) -> Self {
        Self {
            unit: InstallableUnit {
                id,
                version,
                singleton: false,
                capabilities: Vec::new(),
                requirements: Vec::new(),
                host: None,
                filter: None,
                artifacts: Vec::new(),
                properties: BTreeMap::new(),
                instructions: BTreeMap::new(),
                provenance: None,
            },
        }
    }

    pub fn singleton(mut self, singleton: bool) -> Self {
        self.unit.singleton = singleton;
        self
    }

    pub fn capability(mut self, capability: ProvidedCapability) -> Self {
        self.unit.capabilities.push(capability);
        self
    }

    pub fn capabilities(mut self, capabilities: impl IntoIterator<Item = ProvidedCapability>) -> Self {
        self.unit.capabilities.extend(capabilities);
        self
    }

    pub fn provides(self, namespace: &str, name: &str, version: Version) -> Self {
        self.capability(ProvidedCapability::new(namespace, name, version))
    }

    /// Provide `osgi.bundle` with the unit's own id and version
    pub fn bundle(self) -> Self {
        let (id, version) = (self.unit.id.clone(), self.unit.version.clone());
        self.provides(NAMESPACE_OSGI_BUNDLE, &id, version)
    }

    pub fn requirement(mut self, requirement: Requirement) -> Self {
        self.unit.requirements.push(requirement);
        self
    }

    pub fn requirements(mut self, requirements: impl IntoIterator<Item = Requirement>) -> Self {
        self.unit.requirements.extend(requirements);
        self
    }

    pub fn requires_bundle(self, name: &str, range: VersionRange) -> Self {
        self.requirement(Requirement::capability(NAMESPACE_OSGI_BUNDLE, name, range))
    }

    pub fn requires_package(self, name: &str, range: VersionRange) -> Self {
        self.requirement(Requirement::capability(NAMESPACE_JAVA_PACKAGE, name, range))
    }

    /// Mark as fragment of `host` within `range`
    pub fn fragment_of(mut self, host: &str, range: VersionRange) -> Self {
        self.unit.host = Some(Requirement::capability(NAMESPACE_OSGI_BUNDLE, host, range));
        let version = self.unit.version.clone();
        self.provides(NAMESPACE_OSGI_FRAGMENT, host, version)
    }

    pub fn filter(mut self, filter: LdapFilter) -> Self {
        self.unit.filter = Some(filter);
        self
    }

    pub fn artifact(mut self, key: ArtifactKey) -> Self {
        self.unit.artifacts.push(key);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.unit.properties.insert(key.into(), value.into());
        self
    }

    pub fn instruction(mut self, phase: impl Into<String>, body: impl Into<String>) -> Self {
        self.unit.instructions.insert(phase.into(), body.into());
        self
    }

    pub fn provenance(mut self, location: impl Into<String>) -> Self {
        self.unit.provenance = Some(location.into());
        self
    }

    pub fn build(mut self) -> InstallableUnit {
        let id = self.unit.id.clone();
        let has_self = self
            .unit
            .capabilities
            .iter()
            .any(|c| c.namespace == NAMESPACE_IU_ID && c.name == id);
        if !has_self {
            let version = self.unit.version.clone();
            self.unit
                .capabilities
                .insert(0, ProvidedCapability::new(NAMESPACE_IU_ID, id, version));
        }
        self.unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_builder_adds_self_capability() {
        let unit = InstallableUnit::builder("a", v("1.0.0")).bundle().build();
        assert_eq!(unit.capabilities.len(), 2);
        assert_eq!(unit.capabilities[0].namespace, NAMESPACE_IU_ID);
        assert!(unit.satisfies(&Requirement::unit("a", VersionRange::ANY)));
        assert!(unit.satisfies(&Requirement::capability(NAMESPACE_OSGI_BUNDLE, "a", VersionRange::ANY)));
    }

    #[test]
    fn test_identity_includes_provenance() {
        let a = InstallableUnit::builder("a", v("1.0.0")).build();
        let b = a.with_provenance("file:/repo1");
        let c = a.with_provenance("file:/repo2");
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(b, a.with_provenance("file:/repo1"));
        assert_eq!(b.versioned_id(), c.versioned_id());
    }

    #[test]
    fn test_fragment_queries() {
        let fragment = InstallableUnit::builder("org.eclipse.swt.gtk.linux.x86_64", v("3.100.0"))
            .bundle()
            .fragment_of("org.eclipse.swt", VersionRange::parse("[3.0,4.0)").unwrap())
            .build();
        assert!(fragment.is_fragment());
        assert!(fragment.is_fragment_of("org.eclipse.swt"));
        assert!(!fragment.is_fragment_of("org.eclipse.jface"));
        assert_eq!(fragment.all_requirements().count(), 1);

        let host = InstallableUnit::builder("org.eclipse.swt", v("3.100.0")).bundle().build();
        assert!(!host.is_fragment());
    }

    #[test]
    fn test_applicability() {
        let unit = InstallableUnit::builder("a", v("1"))
            .filter(LdapFilter::parse("(osgi.os=linux)").unwrap())
            .build();
        let mut ctx = BTreeMap::new();
        ctx.insert("osgi.os".to_string(), "linux".to_string());
        assert!(unit.is_applicable(&ctx));
        ctx.insert("osgi.os".to_string(), "win32".to_string());
        assert!(!unit.is_applicable(&ctx));
    }

    #[test]
    fn test_partial_and_feature_group() {
        let partial = InstallableUnit::builder("p", v("1"))
            .property(PROP_PARTIAL_IU, "true")
            .build();
        assert!(partial.is_partial());
        let group = InstallableUnit::builder("f.feature.group", v("1")).build();
        assert!(group.is_feature_group());
    }

    #[test]
    fn test_json_round_trip_keeps_requirements() {
        let unit = InstallableUnit::builder("a", v("1.0.0"))
            .bundle()
            .requires_bundle("b", VersionRange::parse("[1.0,2.0)").unwrap())
            .artifact(ArtifactKey::bundle("a", v("1.0.0")))
            .build();
        let json = serde_json::to_string(&unit).unwrap();
        let back: InstallableUnit = serde_json::from_str(&json).unwrap();
        assert_eq!(back, unit);
        assert_eq!(back.requirements, unit.requirements);
        assert_eq!(back.artifacts, unit.artifacts);
    }
}
