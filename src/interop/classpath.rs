// src/interop/classpath.rs

//! Eclipse `.classpath` files
//!
//! Only the entry kinds a build needs are kept: source folders, classpath
//! containers (JUnit and JRE get their own variants), libraries and
//! `M2_REPO` variables. Other variable entries are dropped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::error::{Error, Result};
use crate::gav::Gav;
use crate::metadata::capability::{NAMESPACE_OSGI_BUNDLE, Requirement};
use crate::version::VersionRange;

pub const CLASSPATH_FILE: &str = ".classpath";

pub const JUNIT_CONTAINER_PATH_PREFIX: &str = "org.eclipse.jdt.junit.JUNIT_CONTAINER/";
pub const JRE_CONTAINER_PATH: &str = "org.eclipse.jdt.launching.JRE_CONTAINER";
pub const JRE_CONTAINER_PATH_STANDARDVMTYPE_PREFIX: &str =
    "org.eclipse.jdt.launching.JRE_CONTAINER/org.eclipse.jdt.internal.debug.ui.launcher.StandardVMType/";
pub const M2_REPO_VARIABLE_PREFIX: &str = "M2_REPO/";

const DEFAULT_OUTPUT: &str = "bin";

pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClasspathEntry {
    SourceFolder {
        path: PathBuf,
        output: PathBuf,
        attributes: Attributes,
    },
    /// JUnit container; `junit` is the path segment after the prefix (`3`, `4`, `5`)
    JUnitContainer {
        path: String,
        junit: String,
        attributes: Attributes,
    },
    JreContainer {
        path: String,
        attributes: Attributes,
    },
    Container {
        path: String,
        attributes: Attributes,
    },
    Library {
        path: PathBuf,
        attributes: Attributes,
    },
    /// `M2_REPO` variable; the path is relative to the local Maven repository
    M2Variable {
        repository_path: String,
        attributes: Attributes,
    },
}

/// Bundle contributed by a JUnit container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JUnitBundle {
    pub id: &'static str,
    pub range: &'static str,
}

impl JUnitBundle {
    const fn new(id: &'static str, range: &'static str) -> Self {
        Self { id, range }
    }

    pub fn requirement(&self) -> Result<Requirement> {
        Ok(Requirement::capability(
            NAMESPACE_OSGI_BUNDLE,
            self.id,
            VersionRange::parse(self.range)?,
        ))
    }
}

const JUNIT3_BUNDLES: &[JUnitBundle] = &[JUnitBundle::new("org.junit", "[3.8.2,3.9)")];

const JUNIT4_BUNDLES: &[JUnitBundle] = &[
    JUnitBundle::new("org.junit", "[4.13.0,5.0.0)"),
    JUnitBundle::new("org.hamcrest.core", "[1.1.0,2.0.0)"),
];

const JUNIT5_BUNDLES: &[JUnitBundle] = &[
    JUnitBundle::new("junit-jupiter-api", "[5.0.0,6.0.0)"),
    JUnitBundle::new("junit-jupiter-engine", "[5.0.0,6.0.0)"),
    JUnitBundle::new("junit-jupiter-migrationsupport", "[5.0.0,6.0.0)"),
    JUnitBundle::new("junit-jupiter-params", "[5.0.0,6.0.0)"),
    JUnitBundle::new("junit-platform-commons", "[1.0.0,2.0.0)"),
    JUnitBundle::new("junit-platform-engine", "[1.0.0,2.0.0)"),
    JUnitBundle::new("junit-platform-launcher", "[1.0.0,2.0.0)"),
    JUnitBundle::new("junit-platform-runner", "[1.0.0,2.0.0)"),
    JUnitBundle::new("junit-platform-suite-api", "[1.0.0,2.0.0)"),
    JUnitBundle::new("junit-vintage-engine", "[4.12.0,6.0.0)"),
    JUnitBundle::new("org.opentest4j", "[1.0.0,2.0.0)"),
    JUnitBundle::new("org.apiguardian.api", "[1.0.0,2.0.0)"),
];

impl ClasspathEntry {
    pub fn attributes(&self) -> &Attributes {
        match self {
            ClasspathEntry::SourceFolder { attributes, .. }
            | ClasspathEntry::JUnitContainer { attributes, .. }
            | ClasspathEntry::JreContainer { attributes, .. }
            | ClasspathEntry::Container { attributes, .. }
            | ClasspathEntry::Library { attributes, .. }
            | ClasspathEntry::M2Variable { attributes, .. } => attributes,
        }
    }

    /// Container path, for the container variants
    pub fn container_path(&self) -> Option<&str> {
        match self {
            ClasspathEntry::JUnitContainer { path, .. }
            | ClasspathEntry::JreContainer { path, .. }
            | ClasspathEntry::Container { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Bundles of a JUnit container; empty for unknown JUnit versions
    pub fn junit_bundles(&self) -> &'static [JUnitBundle] {
        match self {
            ClasspathEntry::JUnitContainer { junit, .. } => match junit.as_str() {
                "3" => JUNIT3_BUNDLES,
                "4" => JUNIT4_BUNDLES,
                "5" => JUNIT5_BUNDLES,
                _ => &[],
            },
            _ => &[],
        }
    }

    /// Execution environment named by a JRE container
    pub fn jre_name(&self) -> Option<&str> {
        match self {
            ClasspathEntry::JreContainer { path, .. } => path.strip_prefix(JRE_CONTAINER_PATH_STANDARDVMTYPE_PREFIX),
            _ => None,
        }
    }

    pub fn is_module(&self) -> bool {
        matches!(self, ClasspathEntry::JreContainer { .. })
            && self.attributes().get("module").is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn limit_modules(&self) -> Vec<&str> {
        match self {
            ClasspathEntry::JreContainer { attributes, .. } => attributes
                .get("limit-modules")
                .map(|m| m.split(',').collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Maven coordinates of an `M2_REPO` entry laid out as
    /// `group/path/artifact/version/file`
    pub fn gav(&self) -> Option<Gav> {
        let ClasspathEntry::M2Variable { repository_path, .. } = self else {
            return None;
        };
        let segments: Vec<&str> = repository_path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 4 {
            return None;
        }
        let n = segments.len();
        let group = segments[..n - 3].join(".");
        Some(Gav::new(group, segments[n - 3], segments[n - 2]))
    }
}

/// Parse the `.classpath` of a project; a project without one has no entries
pub fn parse_project(basedir: &Path) -> Result<Vec<ClasspathEntry>> {
    let file = basedir.join(CLASSPATH_FILE);
    if !file.is_file() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(&file)?;
    parse(&text, basedir)
        .map_err(|e| Error::ParseError(format!("{}: {}", file.display(), e)))
}

struct RawEntry {
    kind: String,
    path: String,
    output: String,
    attributes: Attributes,
}

fn xml_error(e: impl std::fmt::Display) -> Error {
    Error::ParseError(format!("malformed .classpath: {e}"))
}

fn attribute(element: &BytesStart<'_>, name: &str) -> Result<String> {
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(attr.unescape_value().map_err(xml_error)?.into_owned());
        }
    }
    Ok(String::new())
}

fn read_entries(text: &str) -> Result<Vec<RawEntry>> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);
    let mut entries: Vec<RawEntry> = Vec::new();
    let mut in_entry = false;
    loop {
        let (element, has_body) = match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => (e, true),
            Event::Empty(e) => (e, false),
            Event::End(e) => {
                if e.name().as_ref() == b"classpathentry" {
                    in_entry = false;
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };
        match element.name().as_ref() {
            b"classpathentry" => {
                entries.push(RawEntry {
                    kind: attribute(&element, "kind")?,
                    path: attribute(&element, "path")?,
                    output: attribute(&element, "output")?,
                    attributes: Attributes::new(),
                });
                in_entry = has_body;
            }
            b"attribute" if in_entry => {
                let name = attribute(&element, "name")?;
                let value = attribute(&element, "value")?;
                if let Some(entry) = entries.last_mut() {
                    entry.attributes.insert(name, value);
                }
            }
            _ => {}
        }
    }
    Ok(entries)
}

/// Parse `.classpath` text; relative paths are resolved against `basedir`
pub fn parse(text: &str, basedir: &Path) -> Result<Vec<ClasspathEntry>> {
    let raw = read_entries(text)?;
    let default_output = raw
        .iter()
        .rev()
        .find(|e| e.kind == "output")
        .map(|e| e.path.clone())
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

    let mut entries = Vec::new();
    for entry in raw {
        let RawEntry {
            kind,
            path,
            output,
            attributes,
        } = entry;
        let parsed = match kind.as_str() {
            "src" => {
                let output = if output.trim().is_empty() {
                    default_output.clone()
                } else {
                    output
                };
                ClasspathEntry::SourceFolder {
                    path: basedir.join(path),
                    output: basedir.join(output),
                    attributes,
                }
            }
            "con" => {
                if let Some(junit) = path.strip_prefix(JUNIT_CONTAINER_PATH_PREFIX) {
                    ClasspathEntry::JUnitContainer {
                        junit: junit.to_string(),
                        path,
                        attributes,
                    }
                } else if path == JRE_CONTAINER_PATH || path.starts_with(JRE_CONTAINER_PATH_STANDARDVMTYPE_PREFIX) {
                    ClasspathEntry::JreContainer { path, attributes }
                } else {
                    ClasspathEntry::Container { path, attributes }
                }
            }
            "lib" => ClasspathEntry::Library {
                path: basedir.join(path),
                attributes,
            },
            "var" => match path.strip_prefix(M2_REPO_VARIABLE_PREFIX) {
                Some(repository_path) => ClasspathEntry::M2Variable {
                    repository_path: repository_path.to_string(),
                    attributes,
                },
                None => {
                    debug!("Ignoring classpath variable {}", path);
                    continue;
                }
            },
            _ => continue,
        };
        entries.push(parsed);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSPATH: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<classpath>
    <classpathentry kind="con" path="org.eclipse.jdt.launching.JRE_CONTAINER/org.eclipse.jdt.internal.debug.ui.launcher.StandardVMType/JavaSE-17">
        <attributes>
            <attribute name="module" value="true"/>
            <attribute name="limit-modules" value="java.base,java.xml"/>
        </attributes>
    </classpathentry>
    <classpathentry kind="con" path="org.eclipse.pde.core.requiredPlugins"/>
    <classpathentry kind="con" path="org.eclipse.jdt.junit.JUNIT_CONTAINER/4"/>
    <classpathentry kind="src" path="src"/>
    <classpathentry kind="src" output="bin_test" path="src_test">
        <attributes>
            <attribute name="test" value="true"/>
        </attributes>
    </classpathentry>
    <classpathentry kind="lib" path="lib/helper.jar"/>
    <classpathentry kind="var" path="M2_REPO/org/example/tools/util/1.2.0/util-1.2.0.jar"/>
    <classpathentry kind="var" path="ECLIPSE_HOME/plugins/x.jar"/>
    <classpathentry kind="output" path="target/classes"/>
</classpath>
"#;

    fn parsed() -> Vec<ClasspathEntry> {
        parse(CLASSPATH, Path::new("/project")).unwrap()
    }

    #[test]
    fn test_source_folders_and_outputs() {
        let entries = parsed();
        let sources: Vec<_> = entries
            .iter()
            .filter_map(|e| match e {
                ClasspathEntry::SourceFolder { path, output, attributes } => Some((path, output, attributes)),
                _ => None,
            })
            .collect();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].0, &PathBuf::from("/project/src"));
        assert_eq!(sources[0].1, &PathBuf::from("/project/target/classes"));
        assert_eq!(sources[1].1, &PathBuf::from("/project/bin_test"));
        assert_eq!(sources[1].2.get("test").map(String::as_str), Some("true"));
        assert!(sources[0].2.is_empty());
    }

    #[test]
    fn test_containers() {
        let entries = parsed();
        let jre = &entries[0];
        assert_eq!(jre.jre_name(), Some("JavaSE-17"));
        assert!(jre.is_module());
        assert_eq!(jre.limit_modules(), vec!["java.base", "java.xml"]);

        assert!(matches!(&entries[1], ClasspathEntry::Container { path, .. } if path == "org.eclipse.pde.core.requiredPlugins"));

        let junit = &entries[2];
        assert!(matches!(junit, ClasspathEntry::JUnitContainer { junit, .. } if junit == "4"));
        let ids: Vec<_> = junit.junit_bundles().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["org.junit", "org.hamcrest.core"]);
        assert!(junit.junit_bundles()[0].requirement().is_ok());
    }

    #[test]
    fn test_libraries_and_variables() {
        let entries = parsed();
        assert!(entries.iter().any(|e| matches!(e, ClasspathEntry::Library { path, .. } if path == Path::new("/project/lib/helper.jar"))));
        let m2: Vec<_> = entries.iter().filter_map(|e| e.gav()).collect();
        assert_eq!(m2, vec![Gav::new("org.example.tools", "util", "1.2.0")]);
        // non-M2 variables and the output entry are dropped
        assert_eq!(entries.len(), 7);
    }

    #[test]
    fn test_default_output_is_bin() {
        let entries = parse(r#"<classpath><classpathentry kind="src" path="src"/></classpath>"#, Path::new("p")).unwrap();
        assert!(matches!(&entries[0], ClasspathEntry::SourceFolder { output, .. } if output == Path::new("p/bin")));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(parse_project(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_xml() {
        assert!(parse("<classpath><classpathentry kind=\"src\"></other></classpath>", Path::new("p")).is_err());
    }
}
