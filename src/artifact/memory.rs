// src/artifact/memory.rs

//! Artifact repository held in memory

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;

use super::{ArtifactProvider, ArtifactRepository, ArtifactSink, ProviderCapabilities, transfer_canonical};
use crate::error::{Error, Result};
use crate::metadata::{ArtifactDescriptor, ArtifactKey};
use crate::progress::{ProgressTracker, checkpoint};
use crate::status::Status;

struct StoredForm {
    descriptor: Arc<ArtifactDescriptor>,
    content: Option<Vec<u8>>,
}

#[derive(Default)]
pub struct MemoryArtifactRepository {
    location: String,
    artifacts: BTreeMap<ArtifactKey, Vec<StoredForm>>,
    properties: BTreeMap<String, String>,
}

impl MemoryArtifactRepository {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    /// Store bytes for a descriptor, replacing any previous content of that form
    pub fn insert(&mut self, descriptor: ArtifactDescriptor, content: Vec<u8>) {
        self.store(descriptor, Some(content));
    }

    /// Stored bytes of one form
    pub fn content(&self, descriptor: &ArtifactDescriptor) -> Option<&[u8]> {
        self.find(descriptor).and_then(|f| f.content.as_deref())
    }

    fn store(&mut self, descriptor: ArtifactDescriptor, content: Option<Vec<u8>>) {
        let forms = self.artifacts.entry(descriptor.key.clone()).or_default();
        forms.retain(|f| !f.descriptor.same_form(&descriptor));
        forms.push(StoredForm {
            descriptor: Arc::new(descriptor),
            content,
        });
    }

    fn find(&self, descriptor: &ArtifactDescriptor) -> Option<&StoredForm> {
        self.artifacts
            .get(&descriptor.key)?
            .iter()
            .find(|f| f.descriptor.same_form(descriptor))
    }
}

impl ArtifactProvider for MemoryArtifactRepository {
    fn location(&self) -> &str {
        &self.location
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::raw()
    }

    fn contains_key(&self, key: &ArtifactKey) -> bool {
        self.artifacts.get(key).is_some_and(|forms| !forms.is_empty())
    }

    fn keys(&self) -> Vec<ArtifactKey> {
        self.artifacts.keys().cloned().collect()
    }

    fn get_artifact(&self, key: &ArtifactKey, sink: &mut dyn Write, monitor: &dyn ProgressTracker) -> Status {
        transfer_canonical(self, key, sink, monitor)
    }

    fn descriptors(&self, key: &ArtifactKey) -> Result<Vec<Arc<ArtifactDescriptor>>> {
        Ok(self
            .artifacts
            .get(key)
            .map(|forms| forms.iter().map(|f| Arc::clone(&f.descriptor)).collect())
            .unwrap_or_default())
    }

    fn contains_descriptor(&self, descriptor: &ArtifactDescriptor) -> bool {
        self.find(descriptor).is_some_and(|f| f.content.is_some())
    }

    fn get_raw_artifact(
        &self,
        descriptor: &ArtifactDescriptor,
        sink: &mut dyn Write,
        monitor: &dyn ProgressTracker,
    ) -> Status {
        if let Err(e) = checkpoint(monitor) {
            return Status::from_error(&e);
        }
        let Some(content) = self.find(descriptor).and_then(|f| f.content.as_ref()) else {
            return Status::error(format!("Artifact {} is not available in {}", descriptor, self.location));
        };
        match sink.write_all(content) {
            Ok(()) => {
                monitor.increment(content.len() as u64);
                Status::ok()
            }
            Err(e) => Status::error(format!("Failed to write {}: {e}", descriptor)),
        }
    }
}

/// Buffers bytes until committed
struct MemorySink<'a> {
    repository: &'a mut MemoryArtifactRepository,
    descriptor: ArtifactDescriptor,
    buffer: Vec<u8>,
}

impl Write for MemorySink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ArtifactSink for MemorySink<'_> {
    fn commit(self: Box<Self>) -> Result<()> {
        let sink = *self;
        sink.repository.store(sink.descriptor, Some(sink.buffer));
        Ok(())
    }
}

impl ArtifactRepository for MemoryArtifactRepository {
    fn add_descriptor(&mut self, descriptor: ArtifactDescriptor) -> Result<()> {
        let content = self.find(&descriptor).and_then(|f| f.content.clone());
        self.store(descriptor, content);
        Ok(())
    }

    fn output_stream(&mut self, descriptor: &ArtifactDescriptor) -> Result<Box<dyn ArtifactSink + '_>> {
        Ok(Box::new(MemorySink {
            repository: self,
            descriptor: descriptor.clone(),
            buffer: Vec::new(),
        }))
    }

    fn remove_descriptor(&mut self, descriptor: &ArtifactDescriptor) -> Result<()> {
        let Some(forms) = self.artifacts.get_mut(&descriptor.key) else {
            return Err(Error::NotFoundError(descriptor.to_string()));
        };
        forms.retain(|f| !f.descriptor.same_form(descriptor));
        if forms.is_empty() {
            self.artifacts.remove(&descriptor.key);
        }
        Ok(())
    }

    fn remove_all(&mut self) -> Result<()> {
        self.artifacts.clear();
        Ok(())
    }

    fn set_property(&mut self, key: &str, value: &str) -> Result<()> {
        self.properties.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn properties(&self) -> BTreeMap<String, String> {
        self.properties.clone()
    }

    fn descriptor_queryable(&self) -> Result<Vec<Arc<ArtifactDescriptor>>> {
        Ok(self
            .artifacts
            .values()
            .flatten()
            .map(|f| Arc::clone(&f.descriptor))
            .collect())
    }

    fn save(&mut self) -> Result<()> {
        Ok(())
    }
}
