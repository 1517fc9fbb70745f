// src/metadata/artifact.rs

//! Artifact keys and descriptors
//!
//! An [`ArtifactKey`] names a payload (`classifier/id/version`). An
//! [`ArtifactDescriptor`] describes one stored form of that payload: its
//! format (canonical or packed) and repository properties such as checksums
//! and the Maven coordinates the artifact is published under. All
//! descriptors of one key decode to byte-identical content.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::gav::Gav;
use crate::version::Version;

/// Classifier of OSGi bundle artifacts
pub const CLASSIFIER_OSGI_BUNDLE: &str = "osgi.bundle";
/// Classifier of feature JARs
pub const CLASSIFIER_FEATURE: &str = "org.eclipse.update.feature";
/// Classifier of binary (root file) artifacts
pub const CLASSIFIER_BINARY: &str = "binary";

pub const PROP_FORMAT: &str = "format";
pub const PROP_ARTIFACT_SIZE: &str = "artifact.size";
pub const PROP_DOWNLOAD_SIZE: &str = "download.size";
pub const PROP_CHECKSUM_SHA256: &str = "download.checksum.sha-256";
pub const PROP_MAVEN_GROUP_ID: &str = "maven-groupId";
pub const PROP_MAVEN_ARTIFACT_ID: &str = "maven-artifactId";
pub const PROP_MAVEN_VERSION: &str = "maven-version";
pub const PROP_MAVEN_CLASSIFIER: &str = "maven-classifier";
pub const PROP_MAVEN_EXTENSION: &str = "maven-extension";

/// Stored form of an artifact
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactFormat {
    /// Directly usable payload
    Canonical,
    /// pack200 transfer encoding
    Packed,
    /// Any other processed form
    Other,
}

/// Address of an artifact payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub classifier: String,
    pub id: String,
    pub version: Version,
}

impl ArtifactKey {
    pub fn new(classifier: impl Into<String>, id: impl Into<String>, version: Version) -> Self {
        Self {
            classifier: classifier.into(),
            id: id.into(),
            version,
        }
    }

    pub fn bundle(id: impl Into<String>, version: Version) -> Self {
        Self::new(CLASSIFIER_OSGI_BUNDLE, id, version)
    }

    pub fn feature(id: impl Into<String>, version: Version) -> Self {
        Self::new(CLASSIFIER_FEATURE, id, version)
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.classifier, self.id, self.version)
    }
}

/// One stored form of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub key: ArtifactKey,
    pub format: ArtifactFormat,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl ArtifactDescriptor {
    pub fn new(key: ArtifactKey, format: ArtifactFormat) -> Self {
        let mut properties = BTreeMap::new();
        if format != ArtifactFormat::Canonical {
            properties.insert(PROP_FORMAT.to_string(), format.to_string());
        }
        Self {
            key,
            format,
            properties,
        }
    }

    pub fn canonical(key: ArtifactKey) -> Self {
        Self::new(key, ArtifactFormat::Canonical)
    }

    pub fn packed(key: ArtifactKey) -> Self {
        Self::new(key, ArtifactFormat::Packed)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn is_canonical(&self) -> bool {
        self.format == ArtifactFormat::Canonical
    }

    /// Record the Maven coordinates this artifact is stored under
    pub fn with_gav(mut self, gav: &Gav, classifier: Option<&str>, extension: Option<&str>) -> Self {
        let mut set = |k: &str, v: Option<&str>| {
            if let Some(v) = v.filter(|v| !v.is_empty()) {
                self.properties.insert(k.to_string(), v.to_string());
            }
        };
        set(PROP_MAVEN_GROUP_ID, gav.group_id());
        set(PROP_MAVEN_ARTIFACT_ID, gav.artifact_id());
        set(PROP_MAVEN_VERSION, gav.version());
        set(PROP_MAVEN_CLASSIFIER, classifier);
        set(PROP_MAVEN_EXTENSION, extension);
        self
    }

    /// Maven coordinates from the descriptor properties, if all are present
    pub fn gav(&self) -> Option<Gav> {
        Some(Gav::new(
            self.property(PROP_MAVEN_GROUP_ID)?,
            self.property(PROP_MAVEN_ARTIFACT_ID)?,
            self.property(PROP_MAVEN_VERSION)?,
        ))
    }

    pub fn maven_classifier(&self) -> Option<&str> {
        self.property(PROP_MAVEN_CLASSIFIER)
    }

    pub fn maven_extension(&self) -> Option<&str> {
        self.property(PROP_MAVEN_EXTENSION)
    }

    /// Identity of the stored form: key plus format
    pub fn same_form(&self, other: &ArtifactDescriptor) -> bool {
        self.key == other.key && self.format == other.format
    }
}

impl fmt::Display for ArtifactDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.format)
    }
}
