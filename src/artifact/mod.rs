// src/artifact/mod.rs

//! Artifact providers and repositories
//!
//! An [`ArtifactProvider`] delivers the bytes of artifacts into a sink.
//! Instead of a hierarchy of provider interfaces, every provider advertises
//! what it supports through [`ProviderCapabilities`]:
//!
//! - `raw`: descriptor queries and transfer of a specific stored form
//! - `file`: artifacts are backed by files on the local filesystem
//! - `remote`: access goes over the network (and fails when offline)
//!
//! Operations a provider does not support keep their default
//! implementations, which report [`Error::Unsupported`] or `None`.
//!
//! An [`ArtifactRepository`] additionally accepts new artifacts through an
//! [`ArtifactSink`] that only registers the artifact once committed.

mod composite;
mod file;
mod memory;
mod policy;
mod read_only;
mod remote;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::gav::Gav;
use crate::metadata::{ArtifactDescriptor, ArtifactFormat, ArtifactKey};
use crate::progress::ProgressTracker;
use crate::status::Status;

pub use composite::ListCompositeArtifactProvider;
pub use file::FileArtifactRepository;
pub use memory::MemoryArtifactRepository;
pub use policy::{LocalTransferPolicy, RemoteTransferPolicy, TransferPolicy};
pub use read_only::ReadOnlyArtifactRepository;
pub use remote::RemoteArtifactRepository;

/// Aggregate descriptor file of a repository
pub const ARTIFACTS_FILE: &str = "artifacts.json";
/// Maven classifier of per-GAV descriptor files in a local repository
pub const CLASSIFIER_P2_ARTIFACTS: &str = "p2artifacts";
/// Maven classifier and extension of packed artifacts
pub const CLASSIFIER_PACK200: &str = "pack200";
pub const EXTENSION_PACK200: &str = "jar.pack.gz";

/// What a provider supports beyond key lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderCapabilities {
    pub raw: bool,
    pub file: bool,
    pub remote: bool,
}

impl ProviderCapabilities {
    pub const fn raw() -> Self {
        Self {
            raw: true,
            file: false,
            remote: false,
        }
    }

    pub const fn raw_file() -> Self {
        Self {
            raw: true,
            file: true,
            remote: false,
        }
    }

    pub const fn raw_remote() -> Self {
        Self {
            raw: true,
            file: false,
            remote: true,
        }
    }
}

/// Source of artifact bytes
pub trait ArtifactProvider: Send + Sync {
    fn location(&self) -> &str;

    fn capabilities(&self) -> ProviderCapabilities;

    fn contains_key(&self, key: &ArtifactKey) -> bool;

    /// Every key this provider can deliver
    fn keys(&self) -> Vec<ArtifactKey>;

    /// Write the canonical bytes of an artifact into `sink`
    fn get_artifact(&self, key: &ArtifactKey, sink: &mut dyn Write, monitor: &dyn ProgressTracker) -> Status;

    /// Stored forms of an artifact
    fn descriptors(&self, _key: &ArtifactKey) -> Result<Vec<Arc<ArtifactDescriptor>>> {
        Err(Error::Unsupported(format!(
            "{} does not support artifact descriptor queries",
            self.location()
        )))
    }

    fn contains_descriptor(&self, _descriptor: &ArtifactDescriptor) -> bool {
        false
    }

    /// Write the bytes of one stored form, without decoding, into `sink`
    fn get_raw_artifact(
        &self,
        descriptor: &ArtifactDescriptor,
        _sink: &mut dyn Write,
        _monitor: &dyn ProgressTracker,
    ) -> Status {
        Status::error(format!(
            "{} does not support raw transfer of {}",
            self.location(),
            descriptor
        ))
    }

    /// Local file holding the canonical artifact
    fn artifact_file(&self, _key: &ArtifactKey) -> Option<PathBuf> {
        None
    }

    /// Local file holding a specific stored form
    fn raw_artifact_file(&self, _descriptor: &ArtifactDescriptor) -> Option<PathBuf> {
        None
    }
}

/// Destination for the bytes of one new artifact
///
/// Dropping a sink without calling [`commit`](Self::commit) discards
/// everything written to it.
pub trait ArtifactSink: Write {
    /// Register the written artifact with its repository
    fn commit(self: Box<Self>) -> Result<()>;
}

/// Provider that also stores artifacts
pub trait ArtifactRepository: ArtifactProvider {
    fn add_descriptor(&mut self, descriptor: ArtifactDescriptor) -> Result<()>;

    /// Sink for the bytes of `descriptor`; the descriptor is added on commit
    fn output_stream(&mut self, descriptor: &ArtifactDescriptor) -> Result<Box<dyn ArtifactSink + '_>>;

    fn remove_descriptor(&mut self, descriptor: &ArtifactDescriptor) -> Result<()>;

    fn remove_all(&mut self) -> Result<()>;

    fn set_property(&mut self, key: &str, value: &str) -> Result<()>;

    fn properties(&self) -> BTreeMap<String, String>;

    /// Every descriptor in the repository
    fn descriptor_queryable(&self) -> Result<Vec<Arc<ArtifactDescriptor>>>;

    fn save(&mut self) -> Result<()>;
}

/// Serialized descriptor set (`artifacts.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactsContent {
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub descriptors: Vec<ArtifactDescriptor>,
}

/// GAV used for artifacts published without Maven coordinates
pub fn default_gav(key: &ArtifactKey) -> Gav {
    Gav::new(format!("p2.{}", key.classifier), key.id.clone(), key.version.to_string())
}

/// Maven layout path of a stored artifact form
///
/// Packed artifacts are stored next to the canonical JAR under the
/// `pack200` classifier.
pub fn artifact_relative_path(descriptor: &ArtifactDescriptor) -> String {
    let gav = descriptor.gav().unwrap_or_else(|| default_gav(&descriptor.key));
    if descriptor.format == ArtifactFormat::Packed {
        return gav.relative_path(Some(CLASSIFIER_PACK200), Some(EXTENSION_PACK200));
    }
    gav.relative_path(descriptor.maven_classifier(), descriptor.maven_extension())
}

/// Transfer the canonical form of `key` from a raw-capable provider
///
/// Artifacts are never decoded here, so a key stored only in packed form
/// cannot be delivered as canonical bytes.
pub(crate) fn transfer_canonical(
    provider: &dyn ArtifactProvider,
    key: &ArtifactKey,
    sink: &mut dyn Write,
    monitor: &dyn ProgressTracker,
) -> Status {
    let descriptors = match provider.descriptors(key) {
        Ok(descriptors) if !descriptors.is_empty() => descriptors,
        Ok(_) => {
            return Status::error(format!(
                "Artifact {} is not available in {}",
                key,
                provider.location()
            ));
        }
        Err(e) => return Status::from_error(&e),
    };
    match descriptors.iter().find(|d| d.is_canonical()) {
        Some(canonical) => provider.get_raw_artifact(canonical, sink, monitor),
        None => Status::error(format!(
            "Artifact {} is only available in processed form in {}",
            key,
            provider.location()
        )),
    }
}
