// src/repository/file.rs

//! Directory-backed metadata repository
//!
//! Units, references and properties live in `<root>/content.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::memory::MemoryMetadataRepository;
use super::{CONTENT_FILE, MetadataRepository, RepositoryContent, RepositoryReference, WritableMetadataRepository};
use crate::error::{Error, Result};
use crate::metadata::InstallableUnit;

pub struct FileMetadataRepository {
    root: PathBuf,
    inner: MemoryMetadataRepository,
}

impl FileMetadataRepository {
    /// Open an existing repository
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let content_path = root.join(CONTENT_FILE);
        if !content_path.exists() {
            return Err(Error::NotFoundError(format!(
                "No metadata repository at {}",
                root.display()
            )));
        }
        let content = fs::read_to_string(&content_path)
            .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", content_path.display())))?;
        let content: RepositoryContent = serde_json::from_str(&content)?;
        info!("Loaded metadata repository {}", root.display());
        let inner = MemoryMetadataRepository::from_content(location_of(&root), content);
        Ok(Self { root, inner })
    }

    /// Create an empty repository; nothing is written until `save`
    pub fn create(root: impl Into<PathBuf>, name: &str) -> Self {
        let root = root.into();
        let mut inner = MemoryMetadataRepository::new(location_of(&root));
        inner.set_name(name);
        Self { root, inner }
    }

    /// Open the repository at `root`, or create an empty one
    pub fn open_or_create(root: impl Into<PathBuf>, name: &str) -> Result<Self> {
        let root = root.into();
        if root.join(CONTENT_FILE).exists() {
            Self::open(root)
        } else {
            Ok(Self::create(root, name))
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

fn location_of(root: &Path) -> String {
    root.to_string_lossy().into_owned()
}

impl MetadataRepository for FileMetadataRepository {
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

impl WritableMetadataRepository for FileMetadataRepository {
    fn add_units(&mut self, units: &[Arc<InstallableUnit>]) -> Result<()> {
        self.inner.add_units(units)
    }

    fn add_references(&mut self, references: &[RepositoryReference]) -> Result<()> {
        self.inner.add_references(references)
    }

    fn set_property(&mut self, key: &str, value: &str) -> Result<()> {
        self.inner.set_property(key, value)
    }

    fn remove_all(&mut self) -> Result<()> {
        self.inner.remove_all()
    }

    fn save(&mut self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", self.root.display())))?;
        let json = serde_json::to_string_pretty(&self.inner.to_content())?;
        let path = self.root.join(CONTENT_FILE);
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json)
            .map_err(|e| Error::IoError(format!("Failed to write {}: {e}", temp_path.display())))?;
        fs::rename(&temp_path, &path)
            .map_err(|e| Error::IoError(format!("Failed to move {}: {e}", temp_path.display())))?;
        debug!("Saved {} units to {}", self.inner.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_repository() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            FileMetadataRepository::open(dir.path()),
            Err(Error::NotFoundError(_))
        ));
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = TempDir::new().unwrap();
        let mut repo = FileMetadataRepository::create(dir.path(), "test");
        let unit = InstallableUnit::builder("org.example.a", Version::new(1, 0, 0))
            .bundle()
            .build();
        repo.add_units(&[Arc::new(unit)]).unwrap();
        repo.add_references(&[RepositoryReference::artifact("https://example.org/repo")])
            .unwrap();
        repo.set_property("p2.compressed", "false").unwrap();
        repo.save().unwrap();

        let reopened = FileMetadataRepository::open(dir.path()).unwrap();
        assert_eq!(reopened.name(), "test");
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.references().len(), 1);
        assert_eq!(reopened.properties().get("p2.compressed").map(String::as_str), Some("false"));
        let units = reopened.units();
        assert_eq!(units[0].provenance.as_deref(), Some(reopened.location()));
    }

    #[test]
    fn test_open_or_create() {
        let dir = TempDir::new().unwrap();
        let repo = FileMetadataRepository::open_or_create(dir.path().join("new"), "fresh").unwrap();
        assert!(repo.is_empty());
        assert!(!repo.root().exists());
    }
}
