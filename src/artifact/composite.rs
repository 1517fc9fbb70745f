// src/artifact/composite.rs

//! Provider aggregating a list of delegate providers
//!
//! Lookups are an OR over the delegates; transfers use the first delegate
//! that has the artifact. A list with a single delegate is never wrapped:
//! [`ListCompositeArtifactProvider::create`] hands back the delegate itself.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{ArtifactProvider, ProviderCapabilities, TransferPolicy};
use crate::error::Result;
use crate::metadata::{ArtifactDescriptor, ArtifactKey};
use crate::progress::ProgressTracker;
use crate::status::{Severity, Status};

pub struct ListCompositeArtifactProvider {
    location: String,
    delegates: Vec<Arc<dyn ArtifactProvider>>,
    policy: Arc<dyn TransferPolicy>,
}

impl ListCompositeArtifactProvider {
    /// Provider over `delegates`, or the only delegate if there is just one
    pub fn create(
        mut delegates: Vec<Arc<dyn ArtifactProvider>>,
        policy: Arc<dyn TransferPolicy>,
    ) -> Arc<dyn ArtifactProvider> {
        if delegates.len() == 1
            && let Some(only) = delegates.pop()
        {
            return only;
        }
        Arc::new(Self::new(delegates, policy))
    }

    pub fn new(delegates: Vec<Arc<dyn ArtifactProvider>>, policy: Arc<dyn TransferPolicy>) -> Self {
        let location = format!(
            "[{}]",
            delegates.iter().map(|d| d.location()).collect::<Vec<_>>().join(", ")
        );
        Self {
            location,
            delegates,
            policy,
        }
    }

    pub fn delegates(&self) -> &[Arc<dyn ArtifactProvider>] {
        &self.delegates
    }

    fn not_found(&self, artifact: &str) -> Status {
        Status::error(format!(
            "Artifact {} is not available in any of the following repositories: {}",
            artifact, self.location
        ))
    }
}

/// Wrap error and cancel statuses with the artifact and delegate that failed
fn improve_message_if_error(status: Status, delegate: &dyn ArtifactProvider, artifact: &str) -> Status {
    if !status.matches(Severity::Error) {
        return status;
    }
    let mut wrapped = Status::multi(format!(
        "An error occurred while transferring artifact {} from repository {}",
        artifact,
        delegate.location()
    ));
    wrapped.add(status);
    wrapped
}

impl ArtifactProvider for ListCompositeArtifactProvider {
    fn location(&self) -> &str {
        &self.location
    }

    /// Union of the delegates' capabilities
    fn capabilities(&self) -> ProviderCapabilities {
        self.delegates
            .iter()
            .map(|d| d.capabilities())
            .fold(ProviderCapabilities::default(), |acc, c| ProviderCapabilities {
                raw: acc.raw || c.raw,
                file: acc.file || c.file,
                remote: acc.remote || c.remote,
            })
    }

    fn contains_key(&self, key: &ArtifactKey) -> bool {
        self.delegates.iter().any(|d| d.contains_key(key))
    }

    fn keys(&self) -> Vec<ArtifactKey> {
        let mut keys: Vec<ArtifactKey> = self.delegates.iter().flat_map(|d| d.keys()).collect();
        keys.sort();
        keys.dedup();
        keys
    }

    fn get_artifact(&self, key: &ArtifactKey, sink: &mut dyn Write, monitor: &dyn ProgressTracker) -> Status {
        for delegate in &self.delegates {
            if !delegate.contains_key(key) {
                continue;
            }
            debug!("Transferring {} from {}", key, delegate.location());
            let status = if delegate.capabilities().raw {
                match delegate.descriptors(key).and_then(|formats| self.policy.pick_format(&formats)) {
                    Ok(preferred) if preferred.is_canonical() => delegate.get_raw_artifact(&preferred, sink, monitor),
                    Ok(_) | Err(_) => delegate.get_artifact(key, sink, monitor),
                }
            } else {
                delegate.get_artifact(key, sink, monitor)
            };
            return improve_message_if_error(status, delegate.as_ref(), &key.to_string());
        }
        self.not_found(&key.to_string())
    }

    /// Descriptors of all raw-capable delegates, one per stored form
    ///
    /// Delegates failing the query are skipped.
    fn descriptors(&self, key: &ArtifactKey) -> Result<Vec<Arc<ArtifactDescriptor>>> {
        let mut result: Vec<Arc<ArtifactDescriptor>> = Vec::new();
        for delegate in self.delegates.iter().filter(|d| d.capabilities().raw) {
            let descriptors = match delegate.descriptors(key) {
                Ok(descriptors) => descriptors,
                Err(e) => {
                    warn!("Skipping {} while querying descriptors of {}: {}", delegate.location(), key, e);
                    continue;
                }
            };
            for descriptor in descriptors {
                if !result.iter().any(|d| d.same_form(&descriptor)) {
                    result.push(descriptor);
                }
            }
        }
        Ok(result)
    }

    fn contains_descriptor(&self, descriptor: &ArtifactDescriptor) -> bool {
        self.delegates.iter().any(|d| d.contains_descriptor(descriptor))
    }

    fn get_raw_artifact(
        &self,
        descriptor: &ArtifactDescriptor,
        sink: &mut dyn Write,
        monitor: &dyn ProgressTracker,
    ) -> Status {
        for delegate in &self.delegates {
            if delegate.contains_descriptor(descriptor) {
                let status = delegate.get_raw_artifact(descriptor, sink, monitor);
                return improve_message_if_error(status, delegate.as_ref(), &descriptor.to_string());
            }
        }
        self.not_found(&descriptor.to_string())
    }

    fn artifact_file(&self, key: &ArtifactKey) -> Option<PathBuf> {
        self.delegates
            .iter()
            .filter(|d| d.capabilities().file)
            .find_map(|d| d.artifact_file(key))
    }

    fn raw_artifact_file(&self, descriptor: &ArtifactDescriptor) -> Option<PathBuf> {
        self.delegates
            .iter()
            .filter(|d| d.capabilities().file)
            .find_map(|d| d.raw_artifact_file(descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactRepository, LocalTransferPolicy, MemoryArtifactRepository};
    use crate::progress::SilentProgress;
    use crate::version::Version;

    fn key(id: &str) -> ArtifactKey {
        ArtifactKey::bundle(id, Version::new(1, 0, 0))
    }

    fn repo(location: &str, entries: &[(&str, &[u8])]) -> Arc<dyn ArtifactProvider> {
        let mut repo = MemoryArtifactRepository::new(location);
        for (id, content) in entries {
            repo.insert(ArtifactDescriptor::canonical(key(id)), content.to_vec());
        }
        Arc::new(repo)
    }

    fn policy() -> Arc<dyn TransferPolicy> {
        Arc::new(LocalTransferPolicy)
    }

    #[test]
    fn test_single_delegate_is_returned_directly() {
        let only = repo("memory:one", &[("a", b"a")]);
        let composite = ListCompositeArtifactProvider::create(vec![Arc::clone(&only)], policy());
        assert!(std::ptr::addr_eq(Arc::as_ptr(&composite), Arc::as_ptr(&only)));

        let direct = only.descriptors(&key("a")).unwrap();
        let through = composite.descriptors(&key("a")).unwrap();
        assert!(Arc::ptr_eq(&direct[0], &through[0]));
    }

    #[test]
    fn test_first_delegate_wins() {
        let composite = ListCompositeArtifactProvider::create(
            vec![repo("memory:1", &[("a", b"first")]), repo("memory:2", &[("a", b"second"), ("b", b"b")])],
            policy(),
        );
        assert!(composite.contains_key(&key("b")));
        assert_eq!(composite.keys().len(), 2);

        let mut out = Vec::new();
        assert!(composite.get_artifact(&key("a"), &mut out, &SilentProgress::new()).is_ok());
        assert_eq!(out, b"first");
        assert_eq!(composite.descriptors(&key("a")).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_artifact_names_repositories() {
        let composite = ListCompositeArtifactProvider::new(vec![repo("memory:1", &[]), repo("memory:2", &[])], policy());
        let status = composite.get_artifact(&key("x"), &mut Vec::new(), &SilentProgress::new());
        assert!(status.is_error());
        assert!(status.message().contains("[memory:1, memory:2]"));
    }

    #[test]
    fn test_delegate_errors_are_wrapped() {
        let mut broken = MemoryArtifactRepository::new("memory:broken");
        broken.add_descriptor(ArtifactDescriptor::canonical(key("a"))).unwrap();
        let composite =
            ListCompositeArtifactProvider::new(vec![Arc::new(broken), repo("memory:ok", &[])], policy());
        let status = composite.get_artifact(&key("a"), &mut Vec::new(), &SilentProgress::new());
        assert!(status.is_error());
        assert_eq!(
            status.message(),
            "An error occurred while transferring artifact osgi.bundle,a,1.0.0 from repository memory:broken"
        );
        assert_eq!(status.children().len(), 1);
    }

    #[test]
    fn test_file_access_skips_non_file_delegates() {
        let composite = ListCompositeArtifactProvider::new(vec![repo("memory:1", &[("a", b"a")])], policy());
        assert!(!composite.capabilities().file);
        assert!(composite.artifact_file(&key("a")).is_none());
    }

    struct FailingProvider;

    impl ArtifactProvider for FailingProvider {
        fn location(&self) -> &str {
            "memory:failing"
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities::raw()
        }

        fn contains_key(&self, _key: &ArtifactKey) -> bool {
            true
        }

        fn keys(&self) -> Vec<ArtifactKey> {
            Vec::new()
        }

        fn get_artifact(&self, key: &ArtifactKey, _sink: &mut dyn Write, _monitor: &dyn ProgressTracker) -> Status {
            Status::error(format!("{key} is unreadable"))
        }
    }

    #[test]
    fn test_failing_delegate_is_skipped_for_descriptors() {
        let composite = ListCompositeArtifactProvider::new(
            vec![Arc::new(FailingProvider), repo("memory:ok", &[("a", b"a")])],
            policy(),
        );
        let descriptors = composite.descriptors(&key("a")).unwrap();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].key, key("a"));
    }
}
