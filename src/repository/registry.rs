// src/repository/registry.rs

//! Repository id to location mapping
//!
//! Written while repositories are registered at the start of a build and
//! read concurrently afterwards, so it sits behind an `RwLock`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

#[derive(Debug, Default)]
pub struct RepositoryRegistry {
    entries: RwLock<HashMap<String, String>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a repository; returns the location previously registered under the id
    pub fn register(&self, id: &str, location: &str) -> Option<String> {
        let previous = self.write().insert(id.to_string(), location.to_string());
        match &previous {
            Some(old) if old != location => debug!("Repository {} moved from {} to {}", id, old, location),
            Some(_) => {}
            None => debug!("Registered repository {} at {}", id, location),
        }
        previous
    }

    pub fn unregister(&self, id: &str) -> Option<String> {
        self.write().remove(id)
    }

    pub fn location(&self, id: &str) -> Option<String> {
        self.read().get(id).cloned()
    }

    /// Id a location is registered under, if any
    pub fn id_for(&self, location: &str) -> Option<String> {
        self.read()
            .iter()
            .find(|(_, loc)| loc.as_str() == location)
            .map(|(id, _)| id.clone())
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
