// src/repository/memory.rs

//! In-memory metadata repository

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::{MetadataRepository, RepositoryContent, RepositoryReference, WritableMetadataRepository};
use crate::error::Result;
use crate::metadata::InstallableUnit;

/// Units held in memory, in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemoryMetadataRepository {
    location: String,
    name: Option<String>,
    units: Vec<Arc<InstallableUnit>>,
    references: Vec<RepositoryReference>,
    properties: BTreeMap<String, String>,
}

impl MemoryMetadataRepository {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    /// Repository holding the given units, attributed to `location`
    pub fn with_units(location: impl Into<String>, units: impl IntoIterator<Item = InstallableUnit>) -> Self {
        let mut repo = Self::new(location);
        for unit in units {
            repo.insert(unit);
        }
        repo
    }

    /// Build from deserialized content; units get this location as provenance
    pub fn from_content(location: impl Into<String>, content: RepositoryContent) -> Self {
        let mut repo = Self::new(location);
        repo.name = content.name;
        repo.properties = content.properties;
        repo.references = content.references;
        for unit in content.units {
            repo.insert(unit);
        }
        debug!("Loaded {} units from {}", repo.units.len(), repo.location);
        repo
    }

    /// Serializable snapshot
    pub fn to_content(&self) -> RepositoryContent {
        RepositoryContent {
            name: self.name.clone(),
            properties: self.properties.clone(),
            references: self.references.clone(),
            units: self.units.iter().map(|u| u.as_ref().clone()).collect(),
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Add a unit unless one with the same id and version is present
    fn insert(&mut self, mut unit: InstallableUnit) -> bool {
        if self.units.iter().any(|u| u.id == unit.id && u.version == unit.version) {
            return false;
        }
        unit.provenance = Some(self.location.clone());
        self.units.push(Arc::new(unit));
        true
    }
}

impl MetadataRepository for MemoryMetadataRepository {
    fn location(&self) -> &str {
        &self.location
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.location)
    }

    fn units(&self) -> Vec<Arc<InstallableUnit>> {
        self.units.clone()
    }

    fn references(&self) -> Vec<RepositoryReference> {
        self.references.clone()
    }

    fn properties(&self) -> BTreeMap<String, String> {
        self.properties.clone()
    }
}

impl WritableMetadataRepository for MemoryMetadataRepository {
    fn add_units(&mut self, units: &[Arc<InstallableUnit>]) -> Result<()> {
        for unit in units {
            self.insert(unit.as_ref().clone());
        }
        Ok(())
    }

    fn add_references(&mut self, references: &[RepositoryReference]) -> Result<()> {
        for reference in references {
            if !self.references.contains(reference) {
                self.references.push(reference.clone());
            }
        }
        Ok(())
    }

    fn set_property(&mut self, key: &str, value: &str) -> Result<()> {
        self.properties.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_all(&mut self) -> Result<()> {
        self.units.clear();
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    #[test]
    fn test_units_get_provenance() {
        let repo = MemoryMetadataRepository::with_units(
            "memory:a",
            vec![InstallableUnit::builder("x", Version::new(1, 0, 0)).build()],
        );
        assert_eq!(repo.units()[0].provenance.as_deref(), Some("memory:a"));
    }

    #[test]
    fn test_duplicate_units_are_ignored() {
        let mut repo = MemoryMetadataRepository::new("memory:b");
        let unit = Arc::new(InstallableUnit::builder("x", Version::new(1, 0, 0)).build());
        repo.add_units(&[unit.clone(), unit]).unwrap();
        assert_eq!(repo.len(), 1);
        repo.add_references(&[RepositoryReference::metadata("https://r"), RepositoryReference::metadata("https://r")])
            .unwrap();
        assert_eq!(repo.references().len(), 1);
        repo.remove_all().unwrap();
        assert!(repo.is_empty());
    }
}
