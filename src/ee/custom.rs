// src/ee/custom.rs

//! Custom execution environments
//!
//! A custom profile has no built-in definition. Its content comes from the
//! capabilities of a specification unit found in the target platform: the
//! `osgi.ee` capabilities name the environments it implements and the
//! `java.package` capabilities are its system packages.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use super::{
    ExecutionEnvironment, PROP_EXECUTION_ENVIRONMENT, PROP_PROFILE_NAME, PROP_SYSTEM_CAPABILITIES, PROP_SYSTEM_PACKAGES,
    SystemPackage,
};
use crate::metadata::capability::{NAMESPACE_JAVA_PACKAGE, NAMESPACE_OSGI_EE};
use crate::metadata::unit::InstallableUnit;

static MAJOR_MINOR_ZERO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+\.\d+)\.0$").expect("valid regex"));
static J2SE_VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^1\.[0-5]$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCapabilityKind {
    OsgiEe,
    JavaPackage,
}

/// A capability read from a specification unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemCapability {
    pub kind: SystemCapabilityKind,
    pub name: String,
    pub version: Option<String>,
}

impl SystemCapability {
    pub fn new(kind: SystemCapabilityKind, name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            version,
        }
    }

    /// `osgi.ee` and `java.package` capabilities of a unit, in declaration order
    pub fn from_unit(unit: &InstallableUnit) -> Vec<SystemCapability> {
        unit.capabilities
            .iter()
            .filter_map(|c| {
                let kind = match c.namespace.as_str() {
                    NAMESPACE_OSGI_EE => SystemCapabilityKind::OsgiEe,
                    NAMESPACE_JAVA_PACKAGE => SystemCapabilityKind::JavaPackage,
                    _ => return None,
                };
                Some(SystemCapability::new(kind, c.name.clone(), Some(c.version.to_string())))
            })
            .collect()
    }
}

/// `1.8.0` -> `1.8`; anything else unchanged
fn normalize_version(version: &str) -> String {
    MAJOR_MINOR_ZERO
        .captures(version)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| version.to_string())
}

/// Execution environment name for an `osgi.ee` capability
fn environment_name(name: &str, version: &str) -> String {
    if name == "JavaSE" && J2SE_VERSION.is_match(version) {
        return format!("J2SE-{version}");
    }
    if name == "CDC/Foundation" {
        return format!("CDC-{version}/Foundation-{version}");
    }
    format!("{name}-{version}")
}

fn package_specifier(package: &SystemCapability) -> String {
    match &package.version {
        Some(version) => format!("{};version=\"{}\"", package.name, version),
        None => package.name.clone(),
    }
}

/// Build an execution environment from specification capabilities
pub fn custom_execution_environment(profile_name: &str, capabilities: &[SystemCapability]) -> ExecutionEnvironment {
    let mut system_packages = Vec::new();
    let mut package_specifiers = Vec::new();
    let mut environments = Vec::new();
    // osgi.ee name -> versions, in first-seen order
    let mut ee_versions: Vec<(String, Vec<String>)> = Vec::new();

    for capability in capabilities {
        match capability.kind {
            SystemCapabilityKind::JavaPackage => {
                if !system_packages.iter().any(|p: &SystemPackage| p.name == capability.name) {
                    system_packages.push(SystemPackage {
                        name: capability.name.clone(),
                        version: capability.version.clone(),
                    });
                }
                package_specifiers.push(package_specifier(capability));
            }
            SystemCapabilityKind::OsgiEe => {
                let version = normalize_version(capability.version.as_deref().unwrap_or("0.0.0"));
                environments.push(environment_name(&capability.name, &version));
                match ee_versions.iter_mut().find(|(name, _)| *name == capability.name) {
                    Some((_, versions)) => versions.push(version),
                    None => ee_versions.push((capability.name.clone(), vec![version])),
                }
            }
        }
    }

    let system_capabilities: Vec<String> = ee_versions
        .iter()
        .map(|(name, versions)| {
            if versions.len() <= 1 {
                format!("osgi.ee; osgi.ee=\"{name}\"; version:Version=\"{}\"", versions.join(", "))
            } else {
                format!("osgi.ee; osgi.ee=\"{name}\"; version:List<Version>=\"{}\"", versions.join(", "))
            }
        })
        .collect();

    let mut properties = BTreeMap::new();
    properties.insert(PROP_PROFILE_NAME.to_string(), profile_name.to_string());
    let mut set_if_not_empty = |key: &str, values: Vec<String>| {
        if !values.is_empty() {
            properties.insert(key.to_string(), values.join(","));
        }
    };
    set_if_not_empty(PROP_SYSTEM_PACKAGES, package_specifiers);
    set_if_not_empty(PROP_EXECUTION_ENVIRONMENT, environments);
    set_if_not_empty(PROP_SYSTEM_CAPABILITIES, system_capabilities);

    ExecutionEnvironment::new(profile_name, system_packages, properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn ee(name: &str, version: &str) -> SystemCapability {
        SystemCapability::new(SystemCapabilityKind::OsgiEe, name, Some(version.to_string()))
    }

    fn package(name: &str, version: Option<&str>) -> SystemCapability {
        SystemCapability::new(SystemCapabilityKind::JavaPackage, name, version.map(str::to_string))
    }

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version("1.8.0"), "1.8");
        assert_eq!(normalize_version("11.0.0"), "11.0");
        assert_eq!(normalize_version("1.8.1"), "1.8.1");
        assert_eq!(normalize_version("1.8"), "1.8");
    }

    #[test]
    fn test_environment_names() {
        assert_eq!(environment_name("JavaSE", "1.4"), "J2SE-1.4");
        assert_eq!(environment_name("JavaSE", "1.6"), "JavaSE-1.6");
        assert_eq!(environment_name("CDC/Foundation", "1.1"), "CDC-1.1/Foundation-1.1");
        assert_eq!(environment_name("OSGi/Minimum", "1.2"), "OSGi/Minimum-1.2");
    }

    #[test]
    fn test_custom_environment_properties() {
        let caps = vec![
            ee("JavaSE", "1.4.0"),
            ee("JavaSE", "1.5.0"),
            ee("OSGi/Minimum", "1.0.0"),
            package("javax.xml", Some("1.0.0")),
            package("org.w3c.dom", None),
        ];
        let env = custom_execution_environment("Custom-1.0", &caps);
        assert_eq!(env.profile_name(), "Custom-1.0");
        assert_eq!(env.system_packages().len(), 2);
        assert_eq!(
            env.property(PROP_EXECUTION_ENVIRONMENT),
            Some("J2SE-1.4,J2SE-1.5,OSGi/Minimum-1.0")
        );
        assert_eq!(
            env.property(PROP_SYSTEM_CAPABILITIES),
            Some(
                "osgi.ee; osgi.ee=\"JavaSE\"; version:List<Version>=\"1.4, 1.5\",\
                 osgi.ee; osgi.ee=\"OSGi/Minimum\"; version:Version=\"1.0\""
            )
        );
        assert_eq!(
            env.property(PROP_SYSTEM_PACKAGES),
            Some("javax.xml;version=\"1.0.0\",org.w3c.dom")
        );
        assert_eq!(env.compiler_target_level(), None);
    }

    #[test]
    fn test_from_unit() {
        let unit = InstallableUnit::builder("a.jre.custom", Version::new(1, 0, 0))
            .provides(NAMESPACE_OSGI_EE, "JavaSE", Version::parse("1.8").unwrap())
            .provides(NAMESPACE_JAVA_PACKAGE, "javax.xml", Version::EMPTY)
            .build();
        let caps = SystemCapability::from_unit(&unit);
        assert_eq!(caps.len(), 2);
        assert_eq!(caps[0].kind, SystemCapabilityKind::OsgiEe);
        assert_eq!(caps[0].version.as_deref(), Some("1.8.0"));
    }
}
