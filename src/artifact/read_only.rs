// src/artifact/read_only.rs

//! Repository view over a provider that only allows reads
//!
//! Call sites that are typed to take an [`ArtifactRepository`] but only read
//! from it get this adapter. Every mutation fails with
//! [`Error::Unsupported`], and so does `descriptor_queryable`: listing every
//! descriptor of a remote provider would mean downloading every artifact.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use super::{ArtifactProvider, ArtifactRepository, ArtifactSink, ProviderCapabilities};
use crate::error::{Error, Result};
use crate::metadata::{ArtifactDescriptor, ArtifactKey};
use crate::progress::ProgressTracker;
use crate::status::Status;

pub struct ReadOnlyArtifactRepository {
    delegate: Arc<dyn ArtifactProvider>,
}

impl ReadOnlyArtifactRepository {
    pub fn new(delegate: Arc<dyn ArtifactProvider>) -> Self {
        Self { delegate }
    }

    fn unsupported<T>(&self, operation: &str) -> Result<T> {
        Err(Error::Unsupported(format!(
            "{} on read-only repository {}",
            operation,
            self.delegate.location()
        )))
    }
}

impl ArtifactProvider for ReadOnlyArtifactRepository {
    fn location(&self) -> &str {
        self.delegate.location()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.delegate.capabilities()
    }

    fn contains_key(&self, key: &ArtifactKey) -> bool {
        self.delegate.contains_key(key)
    }

    fn keys(&self) -> Vec<ArtifactKey> {
        self.delegate.keys()
    }

    fn get_artifact(&self, key: &ArtifactKey, sink: &mut dyn Write, monitor: &dyn ProgressTracker) -> Status {
        self.delegate.get_artifact(key, sink, monitor)
    }

    fn descriptors(&self, key: &ArtifactKey) -> Result<Vec<Arc<ArtifactDescriptor>>> {
        self.delegate.descriptors(key)
    }

    fn contains_descriptor(&self, descriptor: &ArtifactDescriptor) -> bool {
        self.delegate.contains_descriptor(descriptor)
    }

    fn get_raw_artifact(
        &self,
        descriptor: &ArtifactDescriptor,
        sink: &mut dyn Write,
        monitor: &dyn ProgressTracker,
    ) -> Status {
        self.delegate.get_raw_artifact(descriptor, sink, monitor)
    }

    fn artifact_file(&self, key: &ArtifactKey) -> Option<PathBuf> {
        self.delegate.artifact_file(key)
    }

    fn raw_artifact_file(&self, descriptor: &ArtifactDescriptor) -> Option<PathBuf> {
        self.delegate.raw_artifact_file(descriptor)
    }
}

impl ArtifactRepository for ReadOnlyArtifactRepository {
    fn add_descriptor(&mut self, _descriptor: ArtifactDescriptor) -> Result<()> {
        self.unsupported("add_descriptor")
    }

    fn output_stream(&mut self, _descriptor: &ArtifactDescriptor) -> Result<Box<dyn ArtifactSink + '_>> {
        self.unsupported("output_stream")
    }

    fn remove_descriptor(&mut self, _descriptor: &ArtifactDescriptor) -> Result<()> {
        self.unsupported("remove_descriptor")
    }

    fn remove_all(&mut self) -> Result<()> {
        self.unsupported("remove_all")
    }

    fn set_property(&mut self, _key: &str, _value: &str) -> Result<()> {
        self.unsupported("set_property")
    }

    fn properties(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn descriptor_queryable(&self) -> Result<Vec<Arc<ArtifactDescriptor>>> {
        self.unsupported("descriptor_queryable")
    }

    /// Nothing to persist
    fn save(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemoryArtifactRepository;
    use crate::progress::SilentProgress;
    use crate::version::Version;

    fn adapter() -> (ReadOnlyArtifactRepository, ArtifactDescriptor) {
        let key = ArtifactKey::bundle("a", Version::new(1, 0, 0));
        let descriptor = ArtifactDescriptor::canonical(key);
        let mut memory = MemoryArtifactRepository::new("memory:source");
        memory.insert(descriptor.clone(), b"bytes".to_vec());
        (ReadOnlyArtifactRepository::new(Arc::new(memory)), descriptor)
    }

    #[test]
    fn test_reads_are_delegated() {
        let (repo, descriptor) = adapter();
        assert!(repo.contains_key(&descriptor.key));
        assert!(repo.contains_descriptor(&descriptor));
        let mut out = Vec::new();
        assert!(repo.get_raw_artifact(&descriptor, &mut out, &SilentProgress::new()).is_ok());
        assert_eq!(out, b"bytes");
    }

    #[test]
    fn test_mutations_fail() {
        let (mut repo, descriptor) = adapter();
        assert!(matches!(repo.add_descriptor(descriptor.clone()), Err(Error::Unsupported(_))));
        assert!(matches!(repo.output_stream(&descriptor), Err(Error::Unsupported(_))));
        assert!(matches!(repo.remove_descriptor(&descriptor), Err(Error::Unsupported(_))));
        assert!(matches!(repo.remove_all(), Err(Error::Unsupported(_))));
        assert!(matches!(repo.set_property("k", "v"), Err(Error::Unsupported(_))));
        assert!(matches!(repo.descriptor_queryable(), Err(Error::Unsupported(_))));
        assert!(repo.contains_key(&descriptor.key));
    }
}
