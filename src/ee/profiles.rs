// src/ee/profiles.rs

//! Built-in standard execution environment profiles
//!
//! Each profile lists the non-`java.*` packages the runtime exports (plus
//! the `java.*` packages for module-era profiles, as the framework does)
//! and declares its `osgi.ee` system capabilities.

use std::collections::BTreeMap;

use super::{
    ExecutionEnvironment, PROP_EXECUTION_ENVIRONMENT, PROP_PROFILE_NAME, PROP_SYSTEM_CAPABILITIES, PROP_SYSTEM_PACKAGES,
    SystemPackage,
};

struct Profile {
    name: &'static str,
    /// Java specification version (`1.8`, `11`, ...)
    java: &'static str,
    packages: &'static [&'static [&'static str]],
}

const OSGI_MINIMUM_VERSIONS: &str = "1.0, 1.1, 1.2";
const JRE_VERSIONS: &str = "1.0, 1.1";

const XML_PACKAGES: &[&str] = &[
    "javax.xml",
    "javax.xml.datatype",
    "javax.xml.namespace",
    "javax.xml.parsers",
    "javax.xml.transform",
    "javax.xml.transform.dom",
    "javax.xml.transform.sax",
    "javax.xml.transform.stream",
    "javax.xml.validation",
    "javax.xml.xpath",
    "org.w3c.dom",
    "org.w3c.dom.events",
    "org.w3c.dom.ls",
    "org.xml.sax",
    "org.xml.sax.ext",
    "org.xml.sax.helpers",
];

const SECURITY_PACKAGES: &[&str] = &[
    "javax.crypto",
    "javax.crypto.spec",
    "javax.net",
    "javax.net.ssl",
    "javax.security.auth",
    "javax.security.auth.callback",
    "javax.security.auth.login",
    "javax.security.auth.x500",
    "javax.security.cert",
    "org.ietf.jgss",
];

const DESKTOP_PACKAGES: &[&str] = &[
    "javax.accessibility",
    "javax.imageio",
    "javax.print",
    "javax.sound.sampled",
    "javax.swing",
    "javax.swing.event",
    "javax.swing.text",
];

const ENTERPRISE_PACKAGES: &[&str] = &[
    "javax.management",
    "javax.management.remote",
    "javax.naming",
    "javax.naming.directory",
    "javax.script",
    "javax.sql",
    "javax.tools",
    "javax.lang.model",
    "javax.annotation.processing",
];

/// Pre-module JavaSE 1.6+ only
const LEGACY_EE_PACKAGES: &[&str] = &["javax.annotation", "javax.activation", "javax.xml.bind", "javax.xml.ws"];

const JAVA_PACKAGES: &[&str] = &[
    "java.io",
    "java.lang",
    "java.lang.annotation",
    "java.lang.invoke",
    "java.lang.reflect",
    "java.math",
    "java.net",
    "java.nio",
    "java.nio.channels",
    "java.nio.charset",
    "java.nio.file",
    "java.security",
    "java.text",
    "java.time",
    "java.util",
    "java.util.concurrent",
    "java.util.function",
    "java.util.regex",
    "java.util.stream",
    "java.util.zip",
];

const PROFILES: &[Profile] = &[
    Profile {
        name: "J2SE-1.5",
        java: "1.5",
        packages: &[XML_PACKAGES, SECURITY_PACKAGES, DESKTOP_PACKAGES],
    },
    Profile {
        name: "JavaSE-1.6",
        java: "1.6",
        packages: &[XML_PACKAGES, SECURITY_PACKAGES, DESKTOP_PACKAGES, ENTERPRISE_PACKAGES, LEGACY_EE_PACKAGES],
    },
    Profile {
        name: "JavaSE-1.7",
        java: "1.7",
        packages: &[XML_PACKAGES, SECURITY_PACKAGES, DESKTOP_PACKAGES, ENTERPRISE_PACKAGES, LEGACY_EE_PACKAGES],
    },
    Profile {
        name: "JavaSE-1.8",
        java: "1.8",
        packages: &[XML_PACKAGES, SECURITY_PACKAGES, DESKTOP_PACKAGES, ENTERPRISE_PACKAGES, LEGACY_EE_PACKAGES],
    },
    Profile {
        name: "JavaSE-11",
        java: "11",
        packages: &[JAVA_PACKAGES, XML_PACKAGES, SECURITY_PACKAGES, DESKTOP_PACKAGES, ENTERPRISE_PACKAGES],
    },
    Profile {
        name: "JavaSE-17",
        java: "17",
        packages: &[JAVA_PACKAGES, XML_PACKAGES, SECURITY_PACKAGES, DESKTOP_PACKAGES, ENTERPRISE_PACKAGES],
    },
    Profile {
        name: "JavaSE-21",
        java: "21",
        packages: &[JAVA_PACKAGES, XML_PACKAGES, SECURITY_PACKAGES, DESKTOP_PACKAGES, ENTERPRISE_PACKAGES],
    },
];

/// Names of all built-in profiles, oldest first
pub fn known_profile_names() -> impl Iterator<Item = &'static str> {
    PROFILES.iter().map(|p| p.name)
}

pub fn is_known_profile(name: &str) -> bool {
    PROFILES.iter().any(|p| p.name == name)
}

/// Look up a built-in profile by name
pub fn lookup(name: &str) -> Option<ExecutionEnvironment> {
    PROFILES.iter().find(|p| p.name == name).map(build)
}

/// All built-in profiles, oldest first
pub fn all() -> Vec<ExecutionEnvironment> {
    PROFILES.iter().map(build).collect()
}

/// `1.0, 1.1, ..., 1.8, 9, ..., N` for a Java specification version
fn javase_versions(java: &str) -> Vec<String> {
    let mut versions: Vec<String> = Vec::new();
    let legacy_max = java
        .strip_prefix("1.")
        .and_then(|minor| minor.parse::<u32>().ok())
        .unwrap_or(8);
    for minor in 0..=legacy_max {
        versions.push(format!("1.{minor}"));
    }
    if let Ok(major) = java.parse::<u32>() {
        for v in 9..=major {
            versions.push(v.to_string());
        }
    }
    versions
}

fn build(profile: &Profile) -> ExecutionEnvironment {
    let packages: Vec<SystemPackage> = profile
        .packages
        .iter()
        .flat_map(|group| group.iter())
        .map(|name| SystemPackage::new(*name))
        .collect();

    let javase = javase_versions(profile.java);
    let capabilities = format!(
        "osgi.ee; osgi.ee=\"OSGi/Minimum\"; version:List<Version>=\"{OSGI_MINIMUM_VERSIONS}\", \
         osgi.ee; osgi.ee=\"JRE\"; version:List<Version>=\"{JRE_VERSIONS}\", \
         osgi.ee; osgi.ee=\"JavaSE\"; version:List<Version>=\"{}\"",
        javase.join(", ")
    );
    let environments: Vec<String> = javase
        .iter()
        .map(|v| match v.strip_prefix("1.").and_then(|m| m.parse::<u32>().ok()) {
            Some(minor) if minor <= 5 => format!("J2SE-{v}"),
            _ => format!("JavaSE-{v}"),
        })
        .collect();

    let mut properties = BTreeMap::new();
    properties.insert(PROP_PROFILE_NAME.to_string(), profile.name.to_string());
    properties.insert(PROP_SYSTEM_CAPABILITIES.to_string(), capabilities);
    properties.insert(PROP_EXECUTION_ENVIRONMENT.to_string(), environments.join(","));
    properties.insert(
        PROP_SYSTEM_PACKAGES.to_string(),
        packages.iter().map(|p| p.name.as_str()).collect::<Vec<_>>().join(","),
    );

    ExecutionEnvironment::new(profile.name, packages, properties).with_compiler_levels(profile.java, profile.java)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_profiles() {
        let ee = lookup("JavaSE-1.8").unwrap();
        assert_eq!(ee.profile_name(), "JavaSE-1.8");
        assert!(!ee.system_packages().is_empty());
        assert!(ee.system_capabilities().unwrap().contains("1.8"));
        assert_eq!(ee.compiler_target_level(), Some("1.8"));
        assert!(lookup("JavaSE-99").is_none());
        assert!(is_known_profile("JavaSE-17"));
        assert_eq!(known_profile_names().count(), all().len());
    }

    #[test]
    fn test_javase_versions() {
        assert_eq!(javase_versions("1.5"), vec!["1.0", "1.1", "1.2", "1.3", "1.4", "1.5"]);
        let v11 = javase_versions("11");
        assert_eq!(v11.first().map(String::as_str), Some("1.0"));
        assert!(v11.contains(&"1.8".to_string()));
        assert_eq!(v11.last().map(String::as_str), Some("11"));
    }

    #[test]
    fn test_execution_environment_names() {
        let ee = lookup("JavaSE-1.6").unwrap();
        let names = ee.property(PROP_EXECUTION_ENVIRONMENT).unwrap();
        assert!(names.starts_with("J2SE-1.0,"));
        assert!(names.contains("J2SE-1.5,JavaSE-1.6"));
    }
}
