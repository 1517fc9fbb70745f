// src/interop/manifest.rs

//! OSGi bundle manifests
//!
//! Parses `META-INF/MANIFEST.MF` text into headers and turns the headers
//! that matter for resolution into an [`InstallableUnit`]:
//!
//! - `Bundle-SymbolicName` (with the `singleton:=true` directive)
//! - `Bundle-Version`
//! - `Fragment-Host`
//! - `Require-Bundle` (`bundle-version`, `resolution:=optional`,
//!   `visibility:=reexport`)
//! - `Export-Package` / `Import-Package` (`version`, `resolution:=optional`)
//! - `Bundle-RequiredExecutionEnvironment`
//! - `Require-Capability` in the `osgi.ee` namespace
//!
//! Header values are split on top-level commas; commas and semicolons
//! inside double quotes are part of the value.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::metadata::artifact::ArtifactKey;
use crate::metadata::capability::{
    NAMESPACE_JAVA_PACKAGE, NAMESPACE_OSGI_BUNDLE, NAMESPACE_OSGI_EE, ProvidedCapability, Requirement,
};
use crate::metadata::filter::LdapFilter;
use crate::metadata::unit::InstallableUnit;
use crate::version::{Version, VersionRange};

pub const BUNDLE_SYMBOLIC_NAME: &str = "Bundle-SymbolicName";
pub const BUNDLE_VERSION: &str = "Bundle-Version";
pub const FRAGMENT_HOST: &str = "Fragment-Host";
pub const REQUIRE_BUNDLE: &str = "Require-Bundle";
pub const EXPORT_PACKAGE: &str = "Export-Package";
pub const IMPORT_PACKAGE: &str = "Import-Package";
pub const REQUIRE_CAPABILITY: &str = "Require-Capability";
pub const PROVIDE_CAPABILITY: &str = "Provide-Capability";
pub const BUNDLE_REQUIRED_EE: &str = "Bundle-RequiredExecutionEnvironment";

/// One comma-separated clause of a manifest header
///
/// `a;b;version="1.0";resolution:=optional` has values `[a, b]`, attribute
/// `version` and directive `resolution`. Typed attribute keys such as
/// `version:Version` are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ManifestElement {
    pub values: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub directives: BTreeMap<String, String>,
}

impl ManifestElement {
    /// First value of the clause
    pub fn value(&self) -> &str {
        self.values.first().map(String::as_str).unwrap_or("")
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn directive(&self, key: &str) -> Option<&str> {
        self.directives.get(key).map(String::as_str)
    }

    fn is_optional(&self) -> bool {
        self.directive("resolution") == Some("optional")
    }
}

/// Split on `separator` outside double quotes
fn split_unquoted(input: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c == separator && !in_quotes => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&input[start..]);
    parts
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

/// Parse a header value into its clauses
pub fn parse_header(header: &str, value: &str) -> Result<Vec<ManifestElement>> {
    let mut elements = Vec::new();
    for clause in split_unquoted(value, ',') {
        if clause.trim().is_empty() {
            continue;
        }
        let mut element = ManifestElement::default();
        for part in split_unquoted(clause, ';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some((key, val)) = part.split_once(":=") {
                element.directives.insert(key.trim().to_string(), unquote(val));
            } else if let Some((key, val)) = part.split_once('=') {
                element.attributes.insert(key.trim().to_string(), unquote(val));
            } else if element.attributes.is_empty() && element.directives.is_empty() {
                element.values.push(part.to_string());
            } else {
                return Err(Error::ParseError(format!(
                    "Invalid {header} clause '{}': value '{part}' after attributes",
                    clause.trim()
                )));
            }
        }
        if element.values.is_empty() {
            return Err(Error::ParseError(format!(
                "Invalid {header} clause '{}': missing value",
                clause.trim()
            )));
        }
        elements.push(element);
    }
    Ok(elements)
}

/// Main section headers of a manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    headers: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse manifest text; continuation lines start with a single space
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = BTreeMap::new();
        let mut current: Option<(String, String)> = None;
        for line in text.lines() {
            if let Some(continued) = line.strip_prefix(' ') {
                match current.as_mut() {
                    Some((_, value)) => value.push_str(continued),
                    None => return Err(Error::ParseError("Manifest starts with a continuation line".to_string())),
                }
                continue;
            }
            if let Some((name, value)) = current.take() {
                headers.insert(name, value);
            }
            if line.trim().is_empty() {
                // End of the main section
                if !headers.is_empty() {
                    break;
                }
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::ParseError(format!("Invalid manifest line '{line}'")))?;
            current = Some((name.trim().to_string(), value.trim_start().to_string()));
        }
        if let Some((name, value)) = current {
            headers.insert(name, value);
        }
        Ok(Self { headers })
    }

    pub fn from_headers(headers: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            headers: headers.into_iter().collect(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn elements(&self, name: &str) -> Result<Vec<ManifestElement>> {
        match self.header(name) {
            Some(value) => parse_header(name, value),
            None => Ok(Vec::new()),
        }
    }
}

/// A `Require-Bundle` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredBundle {
    pub name: String,
    pub range: VersionRange,
    pub optional: bool,
    pub reexport: bool,
}

/// A `Export-Package` or `Import-Package` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub name: String,
    pub range: VersionRange,
    pub optional: bool,
}

/// Resolution-relevant view of a bundle manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleManifest {
    pub symbolic_name: String,
    pub version: Version,
    pub singleton: bool,
    pub fragment_host: Option<(String, VersionRange)>,
    pub required_bundles: Vec<RequiredBundle>,
    pub exported_packages: Vec<PackageEntry>,
    pub imported_packages: Vec<PackageEntry>,
    pub required_execution_environments: Vec<String>,
    /// Filters of `Require-Capability: osgi.ee` clauses
    pub ee_requirements: Vec<LdapFilter>,
}

fn parse_range(value: Option<&str>) -> Result<VersionRange> {
    Ok(match value {
        Some(v) => VersionRange::parse(v)?,
        None => VersionRange::ANY,
    })
}

impl BundleManifest {
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_manifest(&Manifest::parse(text)?)
    }

    pub fn from_manifest(manifest: &Manifest) -> Result<Self> {
        let bsn = manifest
            .elements(BUNDLE_SYMBOLIC_NAME)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ParseError(format!("Manifest has no {BUNDLE_SYMBOLIC_NAME} header")))?;
        let version = match manifest.header(BUNDLE_VERSION) {
            Some(v) => Version::parse(v.trim())?,
            None => Version::EMPTY,
        };

        let fragment_host = match manifest.elements(FRAGMENT_HOST)?.into_iter().next() {
            Some(host) => Some((
                host.value().to_string(),
                parse_range(host.attribute("bundle-version"))?,
            )),
            None => None,
        };

        let mut required_bundles = Vec::new();
        for element in manifest.elements(REQUIRE_BUNDLE)? {
            for name in &element.values {
                required_bundles.push(RequiredBundle {
                    name: name.clone(),
                    range: parse_range(element.attribute("bundle-version"))?,
                    optional: element.is_optional(),
                    reexport: element.directive("visibility") == Some("reexport"),
                });
            }
        }

        let mut exported_packages = Vec::new();
        for element in manifest.elements(EXPORT_PACKAGE)? {
            let version = element
                .attribute("version")
                .or_else(|| element.attribute("specification-version"))
                .map(Version::parse)
                .transpose()?
                .unwrap_or(Version::EMPTY);
            for name in &element.values {
                exported_packages.push(PackageEntry {
                    name: name.clone(),
                    range: VersionRange::exact(version.clone()),
                    optional: false,
                });
            }
        }

        let mut imported_packages = Vec::new();
        for element in manifest.elements(IMPORT_PACKAGE)? {
            let range = parse_range(
                element
                    .attribute("version")
                    .or_else(|| element.attribute("specification-version")),
            )?;
            for name in &element.values {
                imported_packages.push(PackageEntry {
                    name: name.clone(),
                    range: range.clone(),
                    optional: element.is_optional(),
                });
            }
        }

        let required_execution_environments = manifest
            .elements(BUNDLE_REQUIRED_EE)?
            .into_iter()
            .flat_map(|e| e.values)
            .collect();

        let mut ee_requirements = Vec::new();
        for element in manifest.elements(REQUIRE_CAPABILITY)? {
            if element.value() != NAMESPACE_OSGI_EE {
                continue;
            }
            if let Some(filter) = element.directive("filter") {
                ee_requirements.push(LdapFilter::parse(filter)?);
            }
        }

        Ok(Self {
            symbolic_name: bsn.value().to_string(),
            version,
            singleton: bsn.directive("singleton") == Some("true"),
            fragment_host,
            required_bundles,
            exported_packages,
            imported_packages,
            required_execution_environments,
            ee_requirements,
        })
    }

    /// Requirement on one of the declared execution environments
    ///
    /// `Require-Capability: osgi.ee` takes precedence over
    /// `Bundle-RequiredExecutionEnvironment`.
    pub fn ee_requirement(&self) -> Option<Requirement> {
        if let Some(filter) = self.ee_requirements.first() {
            return Some(Requirement::properties(NAMESPACE_OSGI_EE, filter.clone()));
        }
        let terms: Vec<String> = self
            .required_execution_environments
            .iter()
            .filter_map(|name| bree_to_filter_term(name))
            .collect();
        let text = match terms.len() {
            0 => return None,
            1 => terms[0].clone(),
            _ => format!("(|{})", terms.concat()),
        };
        match LdapFilter::parse(&text) {
            Ok(filter) => Some(Requirement::properties(NAMESPACE_OSGI_EE, filter)),
            Err(e) => {
                debug!("Ignoring execution environments of {}: {}", self.symbolic_name, e);
                None
            }
        }
    }

    /// Installable unit for this bundle
    pub fn to_installable_unit(&self) -> InstallableUnit {
        let mut builder = InstallableUnit::builder(self.symbolic_name.clone(), self.version.clone())
            .singleton(self.singleton)
            .bundle()
            .artifact(ArtifactKey::bundle(self.symbolic_name.clone(), self.version.clone()));

        if let Some((host, range)) = &self.fragment_host {
            builder = builder.fragment_of(host, range.clone());
        }
        for bundle in &self.required_bundles {
            let mut req = Requirement::capability(NAMESPACE_OSGI_BUNDLE, bundle.name.clone(), bundle.range.clone());
            if bundle.optional {
                req = req.optional().non_greedy();
            }
            builder = builder.requirement(req);
        }
        for package in &self.exported_packages {
            builder = builder.capability(ProvidedCapability::new(
                NAMESPACE_JAVA_PACKAGE,
                package.name.clone(),
                package.range.minimum().clone(),
            ));
        }
        for package in &self.imported_packages {
            // A bundle importing a package it exports is satisfied by itself
            if self
                .exported_packages
                .iter()
                .any(|e| e.name == package.name && package.range.includes(e.range.minimum()))
            {
                continue;
            }
            let mut req = Requirement::capability(NAMESPACE_JAVA_PACKAGE, package.name.clone(), package.range.clone());
            if package.optional {
                req = req.optional().non_greedy();
            }
            builder = builder.requirement(req);
        }
        if let Some(req) = self.ee_requirement() {
            builder = builder.requirement(req);
        }
        builder.build()
    }
}

/// `JavaSE-1.8` -> `(&(osgi.ee=JavaSE)(version=1.8))`
///
/// Names that do not follow the `<name>-<version>` pattern are skipped.
pub fn bree_to_filter_term(name: &str) -> Option<String> {
    let name = name.trim();
    if let Some((cdc, foundation)) = name.split_once('/')
        && let (Some(("CDC", cdc_version)), Some(("Foundation", _))) = (cdc.rsplit_once('-'), foundation.rsplit_once('-'))
    {
        return Some(format!("(&(osgi.ee=CDC/Foundation)(version={cdc_version}))"));
    }
    let (ee, version) = name.rsplit_once('-')?;
    Version::parse(version).ok()?;
    let ee = match ee {
        "J2SE" => "JavaSE",
        other => other,
    };
    Some(format!("(&(osgi.ee={ee})(version={version}))"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::capability::NAMESPACE_OSGI_FRAGMENT;

    const MANIFEST: &str = r#"Manifest-Version: 1.0
Bundle-ManifestVersion: 2
Bundle-SymbolicName: org.example.a;singleton:=true
Bundle-Version: 1.2.0.qualifier
Require-Bundle: org.example.b;bundle-version="[1.0.0,2.0.0)",
 org.example.c;resolution:=optional;visibility:=reexport
Export-Package: org.example.a.api;version="1.2.0",org.example.a.internal;x-internal:=true
Import-Package: org.osgi.framework;version="1.8",
 javax.annotation;resolution:=optional
Bundle-RequiredExecutionEnvironment: JavaSE-1.8
"#;

    #[test]
    fn test_parse_header_with_quotes() {
        let elements = parse_header(
            PROVIDE_CAPABILITY,
            "osgi.ee; osgi.ee=\"JavaSE\"; version:List<Version>=\"1.0, 1.1\", osgi.ee; osgi.ee=\"OSGi/Minimum\"",
        )
        .unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].value(), "osgi.ee");
        assert_eq!(elements[0].attribute("osgi.ee"), Some("JavaSE"));
        assert_eq!(elements[0].attribute("version:List<Version>"), Some("1.0, 1.1"));
        assert_eq!(elements[1].attribute("osgi.ee"), Some("OSGi/Minimum"));
    }

    #[test]
    fn test_parse_header_rejects_missing_value() {
        assert!(parse_header(REQUIRE_BUNDLE, "bundle-version=1.0").is_err());
        assert!(parse_header(REQUIRE_BUNDLE, "").unwrap().is_empty());
    }

    #[test]
    fn test_bundle_manifest() {
        let manifest = BundleManifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.symbolic_name, "org.example.a");
        assert!(manifest.singleton);
        assert_eq!(manifest.version.qualifier(), "qualifier");
        assert_eq!(manifest.required_bundles.len(), 2);
        assert!(!manifest.required_bundles[0].optional);
        assert!(manifest.required_bundles[1].optional);
        assert!(manifest.required_bundles[1].reexport);
        assert_eq!(manifest.exported_packages.len(), 2);
        assert_eq!(manifest.imported_packages.len(), 2);
        assert!(manifest.imported_packages[1].optional);
        assert_eq!(manifest.required_execution_environments, vec!["JavaSE-1.8"]);
    }

    #[test]
    fn test_to_installable_unit() {
        let unit = BundleManifest::parse(MANIFEST).unwrap().to_installable_unit();
        assert!(unit.singleton);
        assert!(unit.bundle_capability().is_some());
        assert!(unit.provides_java_packages());
        let bundle_reqs: Vec<_> = unit
            .requirements
            .iter()
            .filter(|r| r.namespace() == NAMESPACE_OSGI_BUNDLE)
            .collect();
        assert_eq!(bundle_reqs.len(), 2);
        assert!(bundle_reqs[1].is_optional());
        assert!(!bundle_reqs[1].greedy);
        let ee = unit
            .requirements
            .iter()
            .find(|r| r.namespace() == NAMESPACE_OSGI_EE)
            .unwrap();
        let java8 = ProvidedCapability::new(NAMESPACE_OSGI_EE, "JavaSE", Version::parse("1.8").unwrap());
        assert!(ee.is_satisfied_by(&java8));
    }

    #[test]
    fn test_fragment_host() {
        let text = "Bundle-SymbolicName: org.eclipse.swt.gtk.linux.x86_64\n\
            Bundle-Version: 3.100.0\n\
            Fragment-Host: org.eclipse.swt;bundle-version=\"[3.0.0,4.0.0)\"\n";
        let unit = BundleManifest::parse(text).unwrap().to_installable_unit();
        assert!(unit.is_fragment_of("org.eclipse.swt"));
        assert!(unit.provides_namespace(NAMESPACE_OSGI_FRAGMENT));
    }

    #[test]
    fn test_bree_terms() {
        assert_eq!(
            bree_to_filter_term("J2SE-1.5").as_deref(),
            Some("(&(osgi.ee=JavaSE)(version=1.5))")
        );
        assert_eq!(
            bree_to_filter_term("CDC-1.1/Foundation-1.1").as_deref(),
            Some("(&(osgi.ee=CDC/Foundation)(version=1.1))")
        );
        assert_eq!(
            bree_to_filter_term("OSGi/Minimum-1.2").as_deref(),
            Some("(&(osgi.ee=OSGi/Minimum)(version=1.2))")
        );
        assert_eq!(bree_to_filter_term("garbage"), None);
    }

    #[test]
    fn test_missing_symbolic_name() {
        assert!(BundleManifest::parse("Bundle-Version: 1.0\n").is_err());
    }
}
