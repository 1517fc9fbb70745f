// src/artifact/remote.rs

//! Artifact repository served over HTTP
//!
//! Descriptors come from `<location>/artifacts.json`; bytes are streamed
//! from `<location>/<maven path>` straight into the caller's sink.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use tracing::info;

use super::{
    ARTIFACTS_FILE, ArtifactProvider, ArtifactsContent, ProviderCapabilities, artifact_relative_path,
    transfer_canonical,
};
use crate::error::{Error, Result};
use crate::metadata::{ArtifactDescriptor, ArtifactKey};
use crate::progress::ProgressTracker;
use crate::repository::{RepositoryClient, join_url};
use crate::status::Status;

pub struct RemoteArtifactRepository {
    location: String,
    client: Arc<RepositoryClient>,
    descriptors: BTreeMap<ArtifactKey, Vec<Arc<ArtifactDescriptor>>>,
}

impl RemoteArtifactRepository {
    /// Fetch the descriptor list; fails fast when the client is offline
    pub fn load(location: &str, client: Arc<RepositoryClient>) -> Result<Self> {
        let location = location.trim_end_matches('/').to_string();
        let content: ArtifactsContent = client.fetch_json(&join_url(&location, ARTIFACTS_FILE))?;
        let mut descriptors: BTreeMap<ArtifactKey, Vec<Arc<ArtifactDescriptor>>> = BTreeMap::new();
        for descriptor in content.descriptors {
            descriptors
                .entry(descriptor.key.clone())
                .or_default()
                .push(Arc::new(descriptor));
        }
        info!("Loaded {} artifact keys from {}", descriptors.len(), location);
        Ok(Self {
            location,
            client,
            descriptors,
        })
    }

    fn known(&self, descriptor: &ArtifactDescriptor) -> bool {
        self.descriptors
            .get(&descriptor.key)
            .is_some_and(|ds| ds.iter().any(|d| d.same_form(descriptor)))
    }
}

impl ArtifactProvider for RemoteArtifactRepository {
    fn location(&self) -> &str {
        &self.location
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::raw_remote()
    }

    fn contains_key(&self, key: &ArtifactKey) -> bool {
        self.descriptors.contains_key(key)
    }

    fn keys(&self) -> Vec<ArtifactKey> {
        self.descriptors.keys().cloned().collect()
    }

    fn get_artifact(&self, key: &ArtifactKey, sink: &mut dyn Write, monitor: &dyn ProgressTracker) -> Status {
        transfer_canonical(self, key, sink, monitor)
    }

    fn descriptors(&self, key: &ArtifactKey) -> Result<Vec<Arc<ArtifactDescriptor>>> {
        Ok(self.descriptors.get(key).cloned().unwrap_or_default())
    }

    fn contains_descriptor(&self, descriptor: &ArtifactDescriptor) -> bool {
        self.known(descriptor)
    }

    fn get_raw_artifact(
        &self,
        descriptor: &ArtifactDescriptor,
        sink: &mut dyn Write,
        monitor: &dyn ProgressTracker,
    ) -> Status {
        if !self.known(descriptor) {
            return Status::error(format!("Artifact {} is not available in {}", descriptor, self.location));
        }
        let url = join_url(&self.location, &artifact_relative_path(descriptor));
        match self.client.download_to(&url, sink, monitor) {
            Ok(_) => Status::ok(),
            Err(e @ Error::Cancelled) => Status::from_error(&e),
            Err(e) => Status::error(format!("Could not retrieve artifact from location {url}: {e}")),
        }
    }
}
