// src/repository/remote.rs

//! Metadata repository served over HTTP

use std::collections::BTreeMap;
use std::sync::Arc;

use super::client::{RepositoryClient, join_url};
use super::memory::MemoryMetadataRepository;
use super::{CONTENT_FILE, MetadataRepository, RepositoryContent, RepositoryReference};
use crate::error::Result;
use crate::metadata::InstallableUnit;

/// Read-only snapshot of a remote `content.json`
pub struct RemoteMetadataRepository {
    inner: MemoryMetadataRepository,
}

impl RemoteMetadataRepository {
    /// Fetch the repository content; fails fast when the client is offline
    pub fn load(location: &str, client: &RepositoryClient) -> Result<Self> {
        let content: RepositoryContent = client.fetch_json(&join_url(location, CONTENT_FILE))?;
        Ok(Self {
            inner: MemoryMetadataRepository::from_content(location.trim_end_matches('/'), content),
        })
    }
}

impl MetadataRepository for RemoteMetadataRepository {
    fn location(&self) -> &str {
        self.inner.location()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn units(&self) -> Vec<Arc<InstallableUnit>> {
        self.inner.units()
    }

    fn references(&self) -> Vec<RepositoryReference> {
        self.inner.references()
    }

    fn properties(&self) -> BTreeMap<String, String> {
        self.inner.properties()
    }
}
