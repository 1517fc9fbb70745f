// src/environment.rs

//! Target environments (os/ws/arch)
//!
//! A target platform is resolved once per environment. The environment
//! contributes the `osgi.os`, `osgi.ws` and `osgi.arch` properties to the
//! selection context that filters are evaluated against.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const PROP_OS: &str = "osgi.os";
pub const PROP_WS: &str = "osgi.ws";
pub const PROP_ARCH: &str = "osgi.arch";

/// An (os, ws, arch) triple; `None` components are unconstrained
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TargetEnvironment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ws: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

impl TargetEnvironment {
    pub fn new(os: &str, ws: &str, arch: &str) -> Self {
        let opt = |s: &str| if s.is_empty() || s == "*" { None } else { Some(s.to_string()) };
        Self {
            os: opt(os),
            ws: opt(ws),
            arch: opt(arch),
        }
    }

    /// Environment with no constraints
    pub fn any() -> Self {
        Self::default()
    }

    /// True if this environment, used as a pattern, matches the given triple
    ///
    /// A `None` component of the pattern matches any value.
    pub fn matches(&self, os: &str, ws: &str, arch: &str) -> bool {
        fn component(pattern: &Option<String>, value: &str) -> bool {
            pattern.as_deref().is_none_or(|p| p == value)
        }
        component(&self.os, os) && component(&self.ws, ws) && component(&self.arch, arch)
    }

    /// `osgi.os`/`osgi.ws`/`osgi.arch` for the set components
    pub fn to_filter_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        for (key, value) in [(PROP_OS, &self.os), (PROP_WS, &self.ws), (PROP_ARCH, &self.arch)] {
            if let Some(value) = value {
                props.insert(key.to_string(), value.clone());
            }
        }
        props
    }

    /// Merge a call-site filter map with this environment
    ///
    /// Environment properties win over same-named entries in `extra`.
    pub fn selection_context(&self, extra: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut context = extra.clone();
        context.extend(self.to_filter_properties());
        context
    }
}

impl fmt::Display for TargetEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let part = |p: &Option<String>| p.clone().unwrap_or_else(|| "*".to_string());
        write!(f, "{}/{}/{}", part(&self.os), part(&self.ws), part(&self.arch))
    }
}

impl FromStr for TargetEnvironment {
    type Err = Error;

    /// Parse `os/ws/arch`; `*` or an empty segment leaves the component open
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [os, ws, arch] => Ok(Self::new(os, ws, arch)),
            _ => Err(Error::ParseError(format!(
                "Invalid target environment '{s}': expected os/ws/arch"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_with_wildcards() {
        let env = TargetEnvironment::new("linux", "gtk", "");
        assert!(env.matches("linux", "gtk", "x86_64"));
        assert!(env.matches("linux", "gtk", "aarch64"));
        assert!(!env.matches("win32", "win32", "x86_64"));
        assert!(TargetEnvironment::any().matches("macosx", "cocoa", "aarch64"));
    }

    #[test]
    fn test_filter_properties() {
        let env: TargetEnvironment = "linux/gtk/x86_64".parse().unwrap();
        let props = env.to_filter_properties();
        assert_eq!(props.get(PROP_OS).map(String::as_str), Some("linux"));
        assert_eq!(props.get(PROP_WS).map(String::as_str), Some("gtk"));
        assert_eq!(props.get(PROP_ARCH).map(String::as_str), Some("x86_64"));
        assert_eq!(env.to_string(), "linux/gtk/x86_64");
    }

    #[test]
    fn test_selection_context_prefers_environment() {
        let env = TargetEnvironment::new("linux", "gtk", "x86_64");
        let mut extra = BTreeMap::new();
        extra.insert(PROP_OS.to_string(), "win32".to_string());
        extra.insert("org.eclipse.update.install.features".to_string(), "true".to_string());
        let ctx = env.selection_context(&extra);
        assert_eq!(ctx.get(PROP_OS).map(String::as_str), Some("linux"));
        assert_eq!(ctx.len(), 4);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("linux/gtk".parse::<TargetEnvironment>().is_err());
        let open: TargetEnvironment = "*/*/*".parse().unwrap();
        assert_eq!(open, TargetEnvironment::any());
        assert_eq!(open.to_string(), "*/*/*");
    }
}
