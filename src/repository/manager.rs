// src/repository/manager.rs

//! Opens repositories by location
//!
//! Repositories are loaded once per build session and kept in bounded LRU
//! caches keyed by kind and location. Ids registered in the
//! [`RepositoryRegistry`] can be used in place of locations.

use std::sync::Arc;

use tracing::{debug, info};

use super::client::RepositoryClient;
use super::file::FileMetadataRepository;
use super::local::LocalMetadataRepository;
use super::registry::RepositoryRegistry;
use super::remote::RemoteMetadataRepository;
use super::{MetadataRepository, RepositoryKind};
use crate::artifact::{ArtifactProvider, FileArtifactRepository, RemoteArtifactRepository};
use crate::cache::SharedLruCache;
use crate::error::{Error, Result};

type CacheKey = (RepositoryKind, String);

pub struct RepositoryManager {
    client: Arc<RepositoryClient>,
    registry: RepositoryRegistry,
    metadata: SharedLruCache<CacheKey, Arc<dyn MetadataRepository>>,
    artifacts: SharedLruCache<CacheKey, Arc<dyn ArtifactProvider>>,
}

impl RepositoryManager {
    pub fn new(offline: bool, cache_capacity: usize) -> Result<Self> {
        Ok(Self {
            client: Arc::new(RepositoryClient::new(offline)?),
            registry: RepositoryRegistry::new(),
            metadata: SharedLruCache::new(cache_capacity),
            artifacts: SharedLruCache::new(cache_capacity),
        })
    }

    pub fn client(&self) -> &Arc<RepositoryClient> {
        &self.client
    }

    pub fn registry(&self) -> &RepositoryRegistry {
        &self.registry
    }

    pub fn is_offline(&self) -> bool {
        self.client.is_offline()
    }

    /// Location registered for an id, or the argument itself
    pub fn resolve_location(&self, id_or_location: &str) -> String {
        self.registry
            .location(id_or_location)
            .unwrap_or_else(|| id_or_location.to_string())
    }

    pub fn load_metadata(&self, location: &str, kind: RepositoryKind) -> Result<Arc<dyn MetadataRepository>> {
        let location = self.resolve_location(location);
        self.metadata.get_or_insert_with((kind, location.clone()), || {
            info!("Loading {} metadata repository {}", kind, location);
            let repository: Arc<dyn MetadataRepository> = match kind {
                RepositoryKind::Local => Arc::new(FileMetadataRepository::open(&location)?),
                RepositoryKind::Remote => Arc::new(RemoteMetadataRepository::load(&location, &self.client)?),
                RepositoryKind::Maven => Arc::new(LocalMetadataRepository::open(&location)?),
            };
            Ok::<_, Error>(repository)
        })
    }

    pub fn load_artifacts(&self, location: &str, kind: RepositoryKind) -> Result<Arc<dyn ArtifactProvider>> {
        let location = self.resolve_location(location);
        self.artifacts.get_or_insert_with((kind, location.clone()), || {
            info!("Loading {} artifact repository {}", kind, location);
            let provider: Arc<dyn ArtifactProvider> = match kind {
                RepositoryKind::Local | RepositoryKind::Maven => Arc::new(FileArtifactRepository::open(&location)?),
                RepositoryKind::Remote => {
                    Arc::new(RemoteArtifactRepository::load(&location, Arc::clone(&self.client))?)
                }
            };
            debug!("{} provides {} artifacts", location, provider.keys().len());
            Ok::<_, Error>(provider)
        })
    }
}
