// src/gav.rs

//! Maven coordinates (groupId:artifactId:version)
//!
//! A [`Gav`] addresses an artifact in a Maven repository. Its external form
//! is `groupId:artifactId:version`; empty segments are kept as `None` so that
//! `g::` and `g::` compare equal after a round-trip.
//!
//! # Repository layout
//!
//! [`Gav::relative_path`] derives the standard Maven layout path
//! `group/as/dirs/artifact/version/artifact-version[-classifier].ext`,
//! mapping OSGi packaging types to their file extension first.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extension used when none is given
pub const DEFAULT_EXTENSION: &str = "jar";

/// Packaging types and the file extension their artifacts are stored with
const TYPE_EXTENSIONS: &[(&str, &str)] = &[
    ("eclipse-plugin", "jar"),
    ("eclipse-test-plugin", "jar"),
    ("eclipse-feature", "jar"),
    ("eclipse-update-site", "zip"),
    ("eclipse-repository", "zip"),
    ("eclipse-application", "zip"),
    ("eclipse-product", "zip"),
    ("p2-installable-unit", "xml"),
    ("eclipse-target-definition", "target"),
];

/// Errors that can occur when parsing a GAV
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GavParseError {
    /// Fewer than two ':' separators
    #[error("Malformed GAV '{0}': expected groupId:artifactId:version")]
    MissingSeparator(String),
    /// More than two ':' separators
    #[error("Malformed GAV '{0}': too many ':' separators")]
    TooManySeparators(String),
}

/// Maven coordinate triple
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Gav {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
}

fn non_empty(s: impl Into<String>) -> Option<String> {
    let s = s.into();
    if s.is_empty() { None } else { Some(s) }
}

impl Gav {
    /// Create a GAV; empty strings are stored as `None`
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group_id: non_empty(group_id),
            artifact_id: non_empty(artifact_id),
            version: non_empty(version),
        }
    }

    /// Parse `groupId:artifactId:version`
    pub fn parse(line: &str) -> Result<Self, GavParseError> {
        let mut parts = line.split(':');
        let (Some(group), Some(artifact), Some(version)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(GavParseError::MissingSeparator(line.to_string()));
        };
        if parts.next().is_some() {
            return Err(GavParseError::TooManySeparators(line.to_string()));
        }
        Ok(Self::new(group, artifact, version))
    }

    pub fn group_id(&self) -> Option<&str> {
        self.group_id.as_deref()
    }

    pub fn artifact_id(&self) -> Option<&str> {
        self.artifact_id.as_deref()
    }

    /// Version, or `None` meaning "latest"
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Inverse of [`Gav::parse`]
    pub fn to_external_form(&self) -> String {
        format!(
            "{}:{}:{}",
            self.group_id.as_deref().unwrap_or(""),
            self.artifact_id.as_deref().unwrap_or(""),
            self.version.as_deref().unwrap_or("")
        )
    }

    /// Maven repository layout path of this artifact
    pub fn relative_path(&self, classifier: Option<&str>, extension: Option<&str>) -> String {
        let group = self.group_id.as_deref().unwrap_or("");
        let artifact = self.artifact_id.as_deref().unwrap_or("");
        let version = self.version.as_deref().unwrap_or("");

        let mut path = String::new();
        path.push_str(&group.replace('.', "/"));
        path.push('/');
        path.push_str(artifact);
        path.push('/');
        path.push_str(version);
        path.push('/');
        path.push_str(artifact);
        path.push('-');
        path.push_str(version);
        if let Some(classifier) = classifier.filter(|c| !c.is_empty()) {
            path.push('-');
            path.push_str(classifier);
        }
        path.push('.');
        path.push_str(extension_for(extension));
        path
    }
}

/// Map a packaging type or extension to the stored file extension
pub fn extension_for(extension: Option<&str>) -> &str {
    match extension {
        None | Some("") => DEFAULT_EXTENSION,
        Some(ext) => TYPE_EXTENSIONS
            .iter()
            .find(|(packaging, _)| *packaging == ext)
            .map(|(_, mapped)| *mapped)
            .unwrap_or(ext),
    }
}

impl fmt::Display for Gav {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_external_form())
    }
}

impl FromStr for Gav {
    type Err = GavParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gav::parse(s)
    }
}
