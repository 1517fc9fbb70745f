// src/ee/hints.rs

//! Execution-environment resolution hints
//!
//! The hints tell the resolver which synthetic JRE units must be assumed
//! present, which repository units are EE specifications to read rather
//! than install, and which repository units are JRE noise to ignore.
//!
//! Hints are chosen once per resolution run and never mutated; reading a
//! custom specification returns a new value.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use super::custom::{SystemCapability, custom_execution_environment};
use super::{EeMode, ExecutionEnvironment, profiles};
use crate::error::{Error, Result};
use crate::interop::manifest::{PROVIDE_CAPABILITY, parse_header};
use crate::metadata::capability::{NAMESPACE_IU_ID, NAMESPACE_JAVA_PACKAGE, NAMESPACE_OSGI_EE, ProvidedCapability, Requirement};
use crate::metadata::unit::InstallableUnit;
use crate::version::{Version, VersionRange};

/// Prefixes of JRE units published by repositories
const NON_APPLICABLE_PREFIXES: [&str; 2] = ["a.jre", "config.a.jre"];

const ATTR_SINGLE_VERSION: &str = "version:Version";
const ATTR_VERSION_LIST: &str = "version:List<Version>";

/// Resolution hints for one execution environment configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionHints {
    /// No EE constraint
    Ignored,
    /// Every known standard profile contributes a unit
    AllKnown { units: Vec<Arc<InstallableUnit>> },
    /// One standard profile
    Standard {
        environment: ExecutionEnvironment,
        unit: Arc<InstallableUnit>,
    },
    /// A profile read from a specification unit of the target platform
    Custom {
        profile_name: String,
        unit_id: String,
        unit_version: Version,
        /// Set once the specification unit has been read
        environment: Option<ExecutionEnvironment>,
    },
}

impl ResolutionHints {
    /// Hints for a configured mode and profile name
    ///
    /// In `standard` mode a profile name that is not a known standard profile
    /// is treated as custom.
    pub fn new(mode: EeMode, profile_name: &str) -> Result<Self> {
        match mode {
            EeMode::Ignored => Ok(Self::Ignored),
            EeMode::AllKnown => Ok(Self::all_known()),
            EeMode::Standard => match profiles::lookup(profile_name) {
                Some(environment) => Ok(Self::standard(environment)),
                None => {
                    info!("'{}' is not a standard execution environment, treating it as custom", profile_name);
                    Self::custom(profile_name)
                }
            },
            EeMode::Custom => Self::custom(profile_name),
        }
    }

    pub fn standard(environment: ExecutionEnvironment) -> Self {
        let unit = Arc::new(execution_environment_unit(&environment));
        Self::Standard { environment, unit }
    }

    pub fn all_known() -> Self {
        let units = profiles::all()
            .iter()
            .map(|ee| Arc::new(execution_environment_unit(ee)))
            .collect();
        Self::AllKnown { units }
    }

    /// Custom hints; the specification unit id and version derive from the profile name
    pub fn custom(profile_name: &str) -> Result<Self> {
        let (unit_id, unit_version) = unit_coordinates(profile_name)?;
        Ok(Self::Custom {
            profile_name: profile_name.to_string(),
            unit_id,
            unit_version,
            environment: None,
        })
    }

    /// Repository units that must never take part in resolution
    ///
    /// In custom mode the specification unit itself is exempt.
    pub fn is_non_applicable_unit(&self, unit: &InstallableUnit) -> bool {
        if self.is_ee_specification_unit(unit) {
            return false;
        }
        NON_APPLICABLE_PREFIXES.iter().any(|p| unit.id.starts_with(p))
    }

    /// True for the unit a custom profile is read from
    pub fn is_ee_specification_unit(&self, unit: &InstallableUnit) -> bool {
        match self {
            Self::Custom {
                unit_id, unit_version, ..
            } => unit.id == *unit_id && unit.version == *unit_version,
            _ => false,
        }
    }

    /// Synthetic units that are assumed present
    pub fn mandatory_units(&self) -> Vec<Arc<InstallableUnit>> {
        match self {
            Self::Ignored | Self::Custom { .. } => Vec::new(),
            Self::AllKnown { units } => units.clone(),
            Self::Standard { unit, .. } => vec![Arc::clone(unit)],
        }
    }

    /// Requirements every resolution must satisfy
    ///
    /// A custom profile requires its specification unit.
    pub fn mandatory_requirements(&self) -> Vec<Requirement> {
        match self {
            Self::Custom {
                unit_id, unit_version, ..
            } => vec![Requirement::unit(unit_id.clone(), VersionRange::exact(unit_version.clone()))],
            _ => Vec::new(),
        }
    }

    /// Units added for resolution only and removed from its result
    pub fn temporary_additions(&self) -> Vec<Arc<InstallableUnit>> {
        match self {
            Self::AllKnown { units } => units.clone(),
            _ => Vec::new(),
        }
    }

    /// Active execution environment, if known
    pub fn execution_environment(&self) -> Option<&ExecutionEnvironment> {
        match self {
            Self::Standard { environment, .. } => Some(environment),
            Self::Custom { environment, .. } => environment.as_ref(),
            _ => None,
        }
    }

    /// Human-readable name of the active EE for error messages
    pub fn active_name(&self) -> String {
        match self {
            Self::Ignored => "no execution environment".to_string(),
            Self::AllKnown { .. } => "all known execution environments".to_string(),
            Self::Standard { unit, .. } => unit.to_string(),
            Self::Custom {
                unit_id, unit_version, ..
            } => format!("{unit_id} {unit_version}"),
        }
    }

    /// Read the custom profile from the target-platform content
    ///
    /// Non-custom hints are returned unchanged. Custom hints fail unless
    /// exactly one specification unit is present.
    pub fn read_full_specification<'a>(
        &self,
        content: impl IntoIterator<Item = &'a Arc<InstallableUnit>>,
    ) -> Result<Self> {
        let Self::Custom {
            profile_name,
            unit_id,
            unit_version,
            ..
        } = self
        else {
            return Ok(self.clone());
        };
        let specs: Vec<&Arc<InstallableUnit>> = content
            .into_iter()
            .filter(|u| self.is_ee_specification_unit(u))
            .collect();
        let [spec] = specs.as_slice() else {
            return Err(Error::ResolutionError(format!(
                "Could not find specification for custom execution environment profile '{profile_name}' \
                 (expected exactly one unit {unit_id} {unit_version}, found {})",
                specs.len()
            )));
        };
        let capabilities = SystemCapability::from_unit(spec);
        debug!(
            "Read {} capabilities of custom profile '{}' from {}",
            capabilities.len(),
            profile_name,
            spec
        );
        Ok(Self::Custom {
            profile_name: profile_name.clone(),
            unit_id: unit_id.clone(),
            unit_version: unit_version.clone(),
            environment: Some(custom_execution_environment(profile_name, &capabilities)),
        })
    }
}

impl fmt::Display for ResolutionHints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignored => f.write_str("ignored execution environment"),
            Self::AllKnown { units } => write!(f, "all known execution environments ({})", units.len()),
            Self::Standard { environment, .. } => write!(f, "standard {environment}"),
            Self::Custom { profile_name, .. } => write!(f, "custom OSGi profile '{profile_name}'"),
        }
    }
}

/// `JavaSE-1.8` -> (`a.jre.javase`, `1.8`)
fn unit_coordinates(profile_name: &str) -> Result<(String, Version)> {
    let segments: Vec<&str> = profile_name.split('-').collect();
    let first = segments.first().copied().unwrap_or_default();
    let last = segments.last().copied().unwrap_or_default();
    let version = if segments.len() > 1 {
        Version::parse(last)?
    } else {
        Version::EMPTY
    };
    Ok((format!("a.jre.{}", first.to_lowercase()), version))
}

/// Synthetic unit representing a standard profile
///
/// Provides a self-capability, one `java.package` capability per system
/// package and the `osgi.ee` capabilities of the profile.
pub fn execution_environment_unit(environment: &ExecutionEnvironment) -> InstallableUnit {
    let (id, version) = match unit_coordinates(environment.profile_name()) {
        Ok(coordinates) => coordinates,
        Err(e) => {
            debug!("Profile name {} has no version: {}", environment.profile_name(), e);
            (format!("a.jre.{}", environment.profile_name().to_lowercase()), Version::EMPTY)
        }
    };
    let mut capabilities = vec![ProvidedCapability::new(NAMESPACE_IU_ID, id.clone(), version.clone())];
    for package in environment.system_packages() {
        let package_version = package
            .version
            .as_deref()
            .and_then(|v| Version::parse(v).ok())
            .unwrap_or(Version::EMPTY);
        capabilities.push(ProvidedCapability::new(
            NAMESPACE_JAVA_PACKAGE,
            package.name.clone(),
            package_version,
        ));
    }
    capabilities.extend(parse_system_capabilities(environment.system_capabilities()));

    InstallableUnit::builder(id, version)
        .singleton(false)
        .capabilities(capabilities)
        .build()
}

/// `osgi.ee` capabilities of a `Provide-Capability`-style declaration
///
/// Each entry may carry no version (capability at `0.0.0`), a single
/// `version:Version`, or a `version:List<Version>` yielding one capability
/// per version. An entry with both forms is malformed and dropped.
pub fn parse_system_capabilities(declaration: Option<&str>) -> Vec<ProvidedCapability> {
    let Some(declaration) = declaration.filter(|d| !d.trim().is_empty()) else {
        return Vec::new();
    };
    let elements = match parse_header(PROVIDE_CAPABILITY, declaration) {
        Ok(elements) => elements,
        Err(e) => {
            debug!("Ignoring malformed system capabilities: {}", e);
            return Vec::new();
        }
    };

    let mut capabilities = Vec::new();
    for element in elements {
        let Some(name) = element.attribute(NAMESPACE_OSGI_EE) else {
            continue;
        };
        let versions: Vec<&str> = match (
            element.attribute(ATTR_SINGLE_VERSION),
            element.attribute(ATTR_VERSION_LIST),
        ) {
            (None, None) => vec!["0.0.0"],
            (Some(single), None) => vec![single],
            (None, Some(list)) => list.split(',').map(str::trim).filter(|v| !v.is_empty()).collect(),
            (Some(_), Some(_)) => {
                debug!("Dropping osgi.ee capability {} with both version forms", name);
                continue;
            }
        };
        for version in versions {
            match Version::parse(version) {
                Ok(version) => capabilities.push(ProvidedCapability::new(NAMESPACE_OSGI_EE, name, version)),
                Err(e) => debug!("Skipping osgi.ee capability {} {}: {}", name, version, e),
            }
        }
    }
    capabilities
}
