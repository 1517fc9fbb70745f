// src/ee/mod.rs

//! Execution environments
//!
//! An execution environment (EE) is a named Java runtime profile such as
//! `JavaSE-17`. It declares the system packages and `osgi.ee` capabilities
//! the runtime provides, which the resolver treats as always present.
//!
//! Standard profiles are built in ([`profiles`]); custom profiles are read
//! from a specification unit in the target platform ([`custom`]). The
//! resolver consumes an EE through [`ResolutionHints`].

pub mod custom;
pub mod hints;
pub mod profiles;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use custom::{SystemCapability, SystemCapabilityKind};
pub use hints::ResolutionHints;

/// `org.osgi.framework.system.packages`
pub const PROP_SYSTEM_PACKAGES: &str = "org.osgi.framework.system.packages";
/// `org.osgi.framework.system.capabilities`
pub const PROP_SYSTEM_CAPABILITIES: &str = "org.osgi.framework.system.capabilities";
/// `org.osgi.framework.executionenvironment`
pub const PROP_EXECUTION_ENVIRONMENT: &str = "org.osgi.framework.executionenvironment";
/// `osgi.java.profile.name`
pub const PROP_PROFILE_NAME: &str = "osgi.java.profile.name";

/// How execution environments constrain resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EeMode {
    /// One profile; custom if the name is not a known standard profile
    #[default]
    Standard,
    /// Every known standard profile at once
    AllKnown,
    /// No EE constraint
    Ignored,
    /// Always read the profile from a specification unit
    Custom,
}

/// A package exported by the runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SystemPackage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl SystemPackage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }
}

/// A resolved execution environment profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEnvironment {
    profile_name: String,
    system_packages: Vec<SystemPackage>,
    /// Framework properties such as system capabilities
    properties: BTreeMap<String, String>,
    compiler_source_level: Option<String>,
    compiler_target_level: Option<String>,
}

impl ExecutionEnvironment {
    pub fn new(
        profile_name: impl Into<String>,
        system_packages: Vec<SystemPackage>,
        properties: BTreeMap<String, String>,
    ) -> Self {
        Self {
            profile_name: profile_name.into(),
            system_packages,
            properties,
            compiler_source_level: None,
            compiler_target_level: None,
        }
    }

    pub fn with_compiler_levels(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.compiler_source_level = Some(source.into());
        self.compiler_target_level = Some(target.into());
        self
    }

    pub fn profile_name(&self) -> &str {
        &self.profile_name
    }

    pub fn system_packages(&self) -> &[SystemPackage] {
        &self.system_packages
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// `Provide-Capability`-style `osgi.ee` declarations
    pub fn system_capabilities(&self) -> Option<&str> {
        self.property(PROP_SYSTEM_CAPABILITIES)
    }

    pub fn compiler_source_level(&self) -> Option<&str> {
        self.compiler_source_level.as_deref()
    }

    pub fn compiler_target_level(&self) -> Option<&str> {
        self.compiler_target_level.as_deref()
    }

    /// True if classes compiled for `target` run on this environment
    ///
    /// Custom profiles do not know their compiler level and accept anything.
    pub fn is_compatible_compiler_target_level(&self, target: &str) -> bool {
        let Some(own) = self.compiler_target_level.as_deref() else {
            return true;
        };
        let parse = |s: &str| crate::version::Version::parse(s.trim_start_matches("1.")).ok();
        match (parse(own), parse(target)) {
            (Some(own), Some(target)) => target <= own,
            _ => own == target,
        }
    }
}

impl fmt::Display for ExecutionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OSGi profile '{}'", self.profile_name)
    }
}
