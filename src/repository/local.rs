// src/repository/local.rs

//! Local Maven repository seen as a p2 metadata repository
//!
//! Units installed into the local Maven repository are stored next to the
//! Maven artifact they describe, as `<artifact>-<version>-p2metadata.json`.
//! `.meta/metadata.index` lists the GAVs that carry such a file.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::index::{METADATA_INDEX, RepositoryIndex};
use super::{MetadataRepository, RepositoryReference, WritableMetadataRepository};
use crate::error::{Error, Result};
use crate::gav::Gav;
use crate::metadata::InstallableUnit;
use crate::metadata::artifact::{PROP_MAVEN_ARTIFACT_ID, PROP_MAVEN_GROUP_ID, PROP_MAVEN_VERSION};

/// Directory holding the index files of a local repository
pub const META_DIR: &str = ".meta";
/// Maven classifier of per-GAV unit metadata files
pub const CLASSIFIER_P2_METADATA: &str = "p2metadata";
/// Group id prefix for units without Maven coordinates
const P2_GROUP_PREFIX: &str = "p2.";

/// GAV under which a unit is stored
///
/// Units published from a Maven build carry their coordinates as
/// properties; anything else is filed under `p2.installable-unit:<id>:<version>`.
pub fn unit_gav(unit: &InstallableUnit) -> Gav {
    match (
        unit.property(PROP_MAVEN_GROUP_ID),
        unit.property(PROP_MAVEN_ARTIFACT_ID),
        unit.property(PROP_MAVEN_VERSION),
    ) {
        (Some(g), Some(a), Some(v)) => Gav::new(g, a, v),
        _ => Gav::new(
            format!("{P2_GROUP_PREFIX}installable-unit"),
            unit.id.clone(),
            unit.version.to_string(),
        ),
    }
}

pub struct LocalMetadataRepository {
    root: PathBuf,
    location: String,
    index: RepositoryIndex,
    units: BTreeMap<Gav, Vec<Arc<InstallableUnit>>>,
    changed: BTreeSet<Gav>,
}

impl LocalMetadataRepository {
    /// Load every GAV listed in the index
    ///
    /// Index entries whose metadata file has disappeared are dropped from
    /// the index; the change is persisted on the next `save`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let location = root.to_string_lossy().into_owned();
        let index_path = root.join(META_DIR).join(METADATA_INDEX);
        let index_missing = !index_path.exists();
        let mut index = RepositoryIndex::load(index_path);
        let mut units = BTreeMap::new();
        let mut stale = Vec::new();

        for gav in index.gavs() {
            let path = metadata_path(&root, gav);
            if !path.exists() {
                warn!("Metadata for {} is listed in the index but missing at {}", gav, path.display());
                stale.push(gav.clone());
                continue;
            }
            let content = fs::read_to_string(&path)
                .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", path.display())))?;
            let loaded: Vec<InstallableUnit> = serde_json::from_str(&content)?;
            let loaded = loaded
                .into_iter()
                .map(|mut u| {
                    u.provenance = Some(location.clone());
                    Arc::new(u)
                })
                .collect();
            units.insert(gav.clone(), loaded);
        }
        for gav in &stale {
            index.remove_gav(gav);
        }

        let mut repository = Self {
            root,
            location,
            index,
            units,
            changed: BTreeSet::new(),
        };
        if index_missing && repository.root.is_dir() {
            let found = repository.rescan()?;
            if found > 0 {
                warn!("Index of {} was missing; recovered {} GAVs", repository.location, found);
            }
        }
        info!(
            "Opened local metadata repository {} ({} GAVs)",
            repository.root.display(),
            repository.units.len()
        );
        Ok(repository)
    }

    /// Walk the repository for metadata files the index does not list
    ///
    /// Found GAVs are loaded and added to the index. Returns how many were added.
    pub fn rescan(&mut self) -> Result<usize> {
        let suffix = format!("-{CLASSIFIER_P2_METADATA}.json");
        let mut found = 0;
        for entry in WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|e| e.file_name() != META_DIR)
            .filter_map(|e| e.ok())
        {
            let name = entry.file_name().to_string_lossy();
            if !entry.file_type().is_file() || !name.ends_with(&suffix) {
                continue;
            }
            let Some(gav) = gav_of_metadata_path(&self.root, entry.path()) else {
                debug!("Ignoring {} outside the Maven layout", entry.path().display());
                continue;
            };
            if self.units.contains_key(&gav) {
                continue;
            }
            let content = fs::read_to_string(entry.path())
                .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", entry.path().display())))?;
            let loaded: Vec<InstallableUnit> = serde_json::from_str(&content)?;
            let loaded = loaded
                .into_iter()
                .map(|u| Arc::new(u.with_provenance(self.location.clone())))
                .collect();
            self.units.insert(gav.clone(), loaded);
            self.index.add_gav(gav);
            found += 1;
        }
        Ok(found)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn gavs(&self) -> impl Iterator<Item = &Gav> {
        self.units.keys()
    }

    pub fn units_of(&self, gav: &Gav) -> &[Arc<InstallableUnit>] {
        self.units.get(gav).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record the units published for a Maven artifact, replacing earlier ones
    pub fn add_units_for(&mut self, gav: Gav, units: &[Arc<InstallableUnit>]) {
        let units = units
            .iter()
            .map(|u| Arc::new(u.with_provenance(self.location.clone())))
            .collect();
        self.units.insert(gav.clone(), units);
        self.changed.insert(gav);
    }
}

fn metadata_path(root: &Path, gav: &Gav) -> PathBuf {
    root.join(gav.relative_path(Some(CLASSIFIER_P2_METADATA), Some("json")))
}

/// GAV of `<group path>/<artifact>/<version>/<artifact>-<version>-p2metadata.json`
fn gav_of_metadata_path(root: &Path, path: &Path) -> Option<Gav> {
    let relative = path.strip_prefix(root).ok()?;
    let segments: Vec<&str> = relative.iter().map(|s| s.to_str()).collect::<Option<_>>()?;
    let [group @ .., artifact, version, _file] = segments.as_slice() else {
        return None;
    };
    if group.is_empty() {
        return None;
    }
    let gav = Gav::new(group.join("."), *artifact, *version);
    (metadata_path(root, &gav) == path).then_some(gav)
}

impl MetadataRepository for LocalMetadataRepository {
    fn location(&self) -> &str {
        &self.location
    }

    fn units(&self) -> Vec<Arc<InstallableUnit>> {
        self.units.values().flatten().cloned().collect()
    }
}

impl WritableMetadataRepository for LocalMetadataRepository {
    fn add_units(&mut self, units: &[Arc<InstallableUnit>]) -> Result<()> {
        let mut grouped: BTreeMap<Gav, Vec<Arc<InstallableUnit>>> = BTreeMap::new();
        for unit in units {
            grouped.entry(unit_gav(unit)).or_default().push(unit.clone());
        }
        for (gav, mut group) in grouped {
            if let Some(existing) = self.units.get(&gav) {
                for unit in existing {
                    if !group.iter().any(|u| u.id == unit.id && u.version == unit.version) {
                        group.push(unit.clone());
                    }
                }
            }
            self.add_units_for(gav, &group);
        }
        Ok(())
    }

    fn add_references(&mut self, _references: &[RepositoryReference]) -> Result<()> {
        Err(Error::Unsupported(
            "The local repository does not store repository references".to_string(),
        ))
    }

    fn set_property(&mut self, _key: &str, _value: &str) -> Result<()> {
        Err(Error::Unsupported(
            "The local repository does not store repository properties".to_string(),
        ))
    }

    fn remove_all(&mut self) -> Result<()> {
        Err(Error::Unsupported(
            "Removing all content of the local repository is not supported".to_string(),
        ))
    }

    fn save(&mut self) -> Result<()> {
        for gav in &self.changed {
            let Some(units) = self.units.get(gav) else { continue };
            let path = metadata_path(&self.root, gav);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", parent.display())))?;
            }
            let plain: Vec<&InstallableUnit> = units.iter().map(Arc::as_ref).collect();
            fs::write(&path, serde_json::to_string_pretty(&plain)?)
                .map_err(|e| Error::IoError(format!("Failed to write {}: {e}", path.display())))?;
            self.index.add_gav(gav.clone());
            debug!("Wrote {} units for {}", units.len(), gav);
        }
        self.index.save()?;
        self.changed.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;
    use tempfile::TempDir;

    fn unit(id: &str) -> Arc<InstallableUnit> {
        Arc::new(InstallableUnit::builder(id, Version::new(1, 0, 0)).bundle().build())
    }

    #[test]
    fn test_unit_gav() {
        let plain = InstallableUnit::builder("org.example.a", Version::new(1, 2, 3)).build();
        assert_eq!(unit_gav(&plain).to_external_form(), "p2.installable-unit:org.example.a:1.2.3");
        let maven = InstallableUnit::builder("org.example.a", Version::new(1, 2, 3))
            .property(PROP_MAVEN_GROUP_ID, "org.example")
            .property(PROP_MAVEN_ARTIFACT_ID, "a")
            .property(PROP_MAVEN_VERSION, "1.2.3-SNAPSHOT")
            .build();
        assert_eq!(unit_gav(&maven).to_external_form(), "org.example:a:1.2.3-SNAPSHOT");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let gav = Gav::parse("org.example:a:1.0.0").unwrap();
        let mut repo = LocalMetadataRepository::open(dir.path()).unwrap();
        repo.add_units_for(gav.clone(), &[unit("org.example.a"), unit("org.example.a.source")]);
        repo.save().unwrap();

        assert!(dir.path().join("org/example/a/1.0.0/a-1.0.0-p2metadata.json").exists());
        let reloaded = LocalMetadataRepository::open(dir.path()).unwrap();
        assert_eq!(reloaded.units_of(&gav).len(), 2);
        assert_eq!(reloaded.units().len(), 2);
        assert_eq!(reloaded.units()[0].provenance.as_deref(), Some(reloaded.location()));
    }

    #[test]
    fn test_missing_metadata_file_is_dropped() {
        let dir = TempDir::new().unwrap();
        let gav = Gav::parse("org.example:a:1.0.0").unwrap();
        let mut repo = LocalMetadataRepository::open(dir.path()).unwrap();
        repo.add_units_for(gav.clone(), &[unit("org.example.a")]);
        repo.save().unwrap();
        fs::remove_file(metadata_path(dir.path(), &gav)).unwrap();

        let mut reloaded = LocalMetadataRepository::open(dir.path()).unwrap();
        assert!(reloaded.units().is_empty());
        reloaded.save().unwrap();
        let index = RepositoryIndex::load(dir.path().join(META_DIR).join(METADATA_INDEX));
        assert!(index.is_empty());
    }

    #[test]
    fn test_lost_index_is_rebuilt_from_files() {
        let dir = TempDir::new().unwrap();
        let gav = Gav::parse("org.example:a:1.0.0").unwrap();
        let mut repo = LocalMetadataRepository::open(dir.path()).unwrap();
        repo.add_units_for(gav.clone(), &[unit("org.example.a")]);
        repo.save().unwrap();
        fs::remove_file(dir.path().join(META_DIR).join(METADATA_INDEX)).unwrap();

        let mut reloaded = LocalMetadataRepository::open(dir.path()).unwrap();
        assert_eq!(reloaded.units_of(&gav).len(), 1);
        assert_eq!(reloaded.rescan().unwrap(), 0);
        reloaded.save().unwrap();
        let index = RepositoryIndex::load(dir.path().join(META_DIR).join(METADATA_INDEX));
        assert!(index.contains(&gav));
    }

    #[test]
    fn test_add_units_merges_by_gav() {
        let dir = TempDir::new().unwrap();
        let mut repo = LocalMetadataRepository::open(dir.path()).unwrap();
        repo.add_units(&[unit("a")]).unwrap();
        repo.add_units(&[unit("a"), unit("b")]).unwrap();
        assert_eq!(repo.units().len(), 2);
        assert!(matches!(repo.remove_all(), Err(Error::Unsupported(_))));
    }
}
