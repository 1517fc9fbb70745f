// src/artifact/file.rs

//! Artifact repository in Maven layout on the local filesystem
//!
//! Artifacts are stored at the Maven path of their GAV below the root. The
//! descriptors of each GAV are kept in a `-p2artifacts.json` file next to
//! the artifact, and `.meta/artifacts.index` lists the GAVs that have one.
//! `save` also writes an aggregate `artifacts.json`, so the directory can
//! be served as a remote repository.
//!
//! Descriptor changes are held in memory until `save`; artifact bytes are
//! written to disk when their sink is committed.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{
    ARTIFACTS_FILE, ArtifactProvider, ArtifactRepository, ArtifactSink, ArtifactsContent, CLASSIFIER_P2_ARTIFACTS,
    ProviderCapabilities, artifact_relative_path, default_gav, transfer_canonical,
};
use crate::error::{Error, Result};
use crate::gav::Gav;
use crate::metadata::{ArtifactDescriptor, ArtifactKey};
use crate::progress::{ProgressTracker, checkpoint};
use crate::repository::index::{ARTIFACTS_INDEX, RepositoryIndex};
use crate::status::Status;

/// Directory below the root holding the index
const META_DIR: &str = ".meta";
const COPY_BUFFER_SIZE: usize = 8192;

struct KeyEntry {
    gav: Gav,
    descriptors: Vec<Arc<ArtifactDescriptor>>,
}

pub struct FileArtifactRepository {
    root: PathBuf,
    location: String,
    index: RepositoryIndex,
    entries: BTreeMap<ArtifactKey, KeyEntry>,
    /// GAVs whose descriptor file must be rewritten or removed on save
    changed: BTreeSet<Gav>,
    properties: BTreeMap<String, String>,
}

fn descriptors_path(root: &Path, gav: &Gav) -> PathBuf {
    root.join(gav.relative_path(Some(CLASSIFIER_P2_ARTIFACTS), Some("json")))
}

fn key_gav(descriptor: &ArtifactDescriptor) -> Gav {
    descriptor.gav().unwrap_or_else(|| default_gav(&descriptor.key))
}

impl FileArtifactRepository {
    /// Open the repository at `root`, creating nothing until `save`
    ///
    /// GAVs listed in the index whose descriptor file is missing are
    /// dropped from the index.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let location = root.to_string_lossy().into_owned();
        let mut index = RepositoryIndex::load(root.join(META_DIR).join(ARTIFACTS_INDEX));
        let mut entries: BTreeMap<ArtifactKey, KeyEntry> = BTreeMap::new();
        let mut stale = Vec::new();

        for gav in index.gavs() {
            let path = descriptors_path(&root, gav);
            if !path.exists() {
                warn!("Artifact descriptors for {} are missing at {}", gav, path.display());
                stale.push(gav.clone());
                continue;
            }
            let content = fs::read_to_string(&path)
                .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", path.display())))?;
            let descriptors: Vec<ArtifactDescriptor> = serde_json::from_str(&content)?;
            for descriptor in descriptors {
                entries
                    .entry(descriptor.key.clone())
                    .or_insert_with(|| KeyEntry {
                        gav: gav.clone(),
                        descriptors: Vec::new(),
                    })
                    .descriptors
                    .push(Arc::new(descriptor));
            }
        }
        let mut changed = BTreeSet::new();
        for gav in stale {
            index.remove_gav(&gav);
            changed.insert(gav);
        }

        let properties = match fs::read_to_string(root.join(ARTIFACTS_FILE)) {
            Ok(content) => serde_json::from_str::<ArtifactsContent>(&content)
                .map(|c| c.properties)
                .unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        };

        info!("Opened artifact repository {} ({} artifacts)", root.display(), entries.len());
        Ok(Self {
            root,
            location,
            index,
            entries,
            changed,
            properties,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File a stored form lives in, whether or not it exists yet
    pub fn location_file(&self, descriptor: &ArtifactDescriptor) -> PathBuf {
        self.root.join(artifact_relative_path(descriptor))
    }

    fn registered(&self, descriptor: &ArtifactDescriptor) -> bool {
        self.entries
            .get(&descriptor.key)
            .is_some_and(|e| e.descriptors.iter().any(|d| d.same_form(descriptor)))
    }

    fn register(&mut self, descriptor: ArtifactDescriptor) {
        let gav = key_gav(&descriptor);
        let entry = self.entries.entry(descriptor.key.clone()).or_insert_with(|| KeyEntry {
            gav: gav.clone(),
            descriptors: Vec::new(),
        });
        entry.descriptors.retain(|d| !d.same_form(&descriptor));
        entry.descriptors.push(Arc::new(descriptor));
        self.changed.insert(entry.gav.clone());
    }

    fn descriptors_of_gav(&self, gav: &Gav) -> Vec<&ArtifactDescriptor> {
        self.entries
            .values()
            .filter(|e| e.gav == *gav)
            .flat_map(|e| e.descriptors.iter().map(Arc::as_ref))
            .collect()
    }

    fn write_aggregate(&self) -> Result<()> {
        let content = ArtifactsContent {
            properties: self.properties.clone(),
            descriptors: self
                .entries
                .values()
                .flat_map(|e| e.descriptors.iter().map(|d| d.as_ref().clone()))
                .collect(),
        };
        fs::create_dir_all(&self.root)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", self.root.display())))?;
        let path = self.root.join(ARTIFACTS_FILE);
        fs::write(&path, serde_json::to_string_pretty(&content)?)
            .map_err(|e| Error::IoError(format!("Failed to write {}: {e}", path.display())))
    }
}

impl ArtifactProvider for FileArtifactRepository {
    fn location(&self) -> &str {
        &self.location
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::raw_file()
    }

    fn contains_key(&self, key: &ArtifactKey) -> bool {
        self.entries.contains_key(key)
    }

    fn keys(&self) -> Vec<ArtifactKey> {
        self.entries.keys().cloned().collect()
    }

    fn get_artifact(&self, key: &ArtifactKey, sink: &mut dyn Write, monitor: &dyn ProgressTracker) -> Status {
        transfer_canonical(self, key, sink, monitor)
    }

    fn descriptors(&self, key: &ArtifactKey) -> Result<Vec<Arc<ArtifactDescriptor>>> {
        Ok(self
            .entries
            .get(key)
            .map(|e| e.descriptors.clone())
            .unwrap_or_default())
    }

    /// Registered and present on disk
    fn contains_descriptor(&self, descriptor: &ArtifactDescriptor) -> bool {
        self.registered(descriptor) && self.location_file(descriptor).is_file()
    }

    fn get_raw_artifact(
        &self,
        descriptor: &ArtifactDescriptor,
        sink: &mut dyn Write,
        monitor: &dyn ProgressTracker,
    ) -> Status {
        let path = self.location_file(descriptor);
        match copy_file(&path, sink, monitor) {
            Ok(_) => Status::ok(),
            Err(Error::Cancelled) => Status::cancel(),
            Err(e) => Status::error(format!(
                "Could not retrieve artifact from location {}: {e}",
                path.display()
            )),
        }
    }

    fn artifact_file(&self, key: &ArtifactKey) -> Option<PathBuf> {
        let entry = self.entries.get(key)?;
        let canonical = entry.descriptors.iter().find(|d| d.is_canonical())?;
        self.raw_artifact_file(canonical)
    }

    fn raw_artifact_file(&self, descriptor: &ArtifactDescriptor) -> Option<PathBuf> {
        let path = self.location_file(descriptor);
        (self.registered(descriptor) && path.is_file()).then_some(path)
    }
}

fn copy_file(path: &Path, sink: &mut dyn Write, monitor: &dyn ProgressTracker) -> Result<u64> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; COPY_BUFFER_SIZE];
    let mut copied = 0u64;
    loop {
        checkpoint(monitor)?;
        let read = io::Read::read(&mut file, &mut buffer)?;
        if read == 0 {
            return Ok(copied);
        }
        sink.write_all(&buffer[..read])?;
        copied += read as u64;
        monitor.increment(read as u64);
    }
}

/// Writes to a unique `<target>.<uuid>.part` file and renames on commit
struct FileSink<'a> {
    repository: &'a mut FileArtifactRepository,
    descriptor: ArtifactDescriptor,
    target: PathBuf,
    part: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl Write for FileSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(writer) => writer.write(buf),
            None => Err(io::Error::other("artifact sink already closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl ArtifactSink for FileSink<'_> {
    fn commit(mut self: Box<Self>) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let file = writer
                .into_inner()
                .map_err(|e| Error::IoError(format!("Failed to write {}: {e}", self.part.display())))?;
            file.sync_all()?;
        }
        fs::rename(&self.part, &self.target).map_err(|e| {
            Error::IoError(format!("Failed to move {} to {}: {e}", self.part.display(), self.target.display()))
        })?;
        debug!("Stored {} at {}", self.descriptor, self.target.display());
        let descriptor = self.descriptor.clone();
        self.repository.register(descriptor);
        Ok(())
    }
}

impl Drop for FileSink<'_> {
    fn drop(&mut self) {
        if self.writer.take().is_some() {
            if let Err(e) = fs::remove_file(&self.part) {
                debug!("Could not remove {}: {e}", self.part.display());
            }
        }
    }
}

impl ArtifactRepository for FileArtifactRepository {
    fn add_descriptor(&mut self, descriptor: ArtifactDescriptor) -> Result<()> {
        self.register(descriptor);
        Ok(())
    }

    fn output_stream(&mut self, descriptor: &ArtifactDescriptor) -> Result<Box<dyn ArtifactSink + '_>> {
        let target = self.location_file(descriptor);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", parent.display())))?;
        }
        let mut part = target.clone().into_os_string();
        part.push(format!(".{}.part", uuid::Uuid::new_v4().simple()));
        let part = PathBuf::from(part);
        let file = File::create(&part)
            .map_err(|e| Error::IoError(format!("Could not create artifact file {}: {e}", part.display())))?;
        Ok(Box::new(FileSink {
            repository: self,
            descriptor: descriptor.clone(),
            target,
            part,
            writer: Some(BufWriter::new(file)),
        }))
    }

    fn remove_descriptor(&mut self, descriptor: &ArtifactDescriptor) -> Result<()> {
        let Some(entry) = self.entries.get_mut(&descriptor.key) else {
            return Err(Error::NotFoundError(descriptor.to_string()));
        };
        entry.descriptors.retain(|d| !d.same_form(descriptor));
        let gav = entry.gav.clone();
        if entry.descriptors.is_empty() {
            self.entries.remove(&descriptor.key);
        }
        let file = self.location_file(descriptor);
        if file.exists() {
            fs::remove_file(&file)
                .map_err(|e| Error::IoError(format!("Failed to delete {}: {e}", file.display())))?;
        }
        self.changed.insert(gav);
        Ok(())
    }

    fn remove_all(&mut self) -> Result<()> {
        let descriptors: Vec<ArtifactDescriptor> = self
            .entries
            .values()
            .flat_map(|e| e.descriptors.iter().map(|d| d.as_ref().clone()))
            .collect();
        for descriptor in descriptors {
            self.remove_descriptor(&descriptor)?;
        }
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
        Ok(self.entries.values().flat_map(|e| e.descriptors.iter().cloned()).collect())
    }

    fn save(&mut self) -> Result<()> {
        for gav in &self.changed {
            let path = descriptors_path(&self.root, gav);
            let descriptors = self.descriptors_of_gav(gav);
            if descriptors.is_empty() {
                self.index.remove_gav(gav);
                if path.exists() {
                    fs::remove_file(&path)
                        .map_err(|e| Error::IoError(format!("Failed to delete {}: {e}", path.display())))?;
                }
                continue;
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", parent.display())))?;
            }
            fs::write(&path, serde_json::to_string_pretty(&descriptors)?)
                .map_err(|e| Error::IoError(format!("Failed to write {}: {e}", path.display())))?;
            self.index.add_gav(gav.clone());
        }
        self.index.save()?;
        self.write_aggregate()?;
        debug!("Saved {} changed GAVs in {}", self.changed.len(), self.root.display());
        self.changed.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use crate::version::Version;
    use tempfile::TempDir;

    fn key() -> ArtifactKey {
        ArtifactKey::bundle("org.example.a", Version::new(1, 0, 0))
    }

    fn store(repo: &mut FileArtifactRepository, descriptor: &ArtifactDescriptor, content: &[u8]) {
        let mut sink = repo.output_stream(descriptor).unwrap();
        sink.write_all(content).unwrap();
        sink.commit().unwrap();
    }

    #[test]
    fn test_store_and_read_back() {
        let dir = TempDir::new().unwrap();
        let mut repo = FileArtifactRepository::open(dir.path()).unwrap();
        let descriptor = ArtifactDescriptor::canonical(key());
        store(&mut repo, &descriptor, b"bundle bytes");

        assert!(repo.contains_descriptor(&descriptor));
        let file = repo.artifact_file(&key()).unwrap();
        assert!(file.ends_with("p2/osgi/bundle/org.example.a/1.0.0/org.example.a-1.0.0.jar"));

        let mut out = Vec::new();
        assert!(repo.get_artifact(&key(), &mut out, &SilentProgress::new()).is_ok());
        assert_eq!(out, b"bundle bytes");
    }

    #[test]
    fn test_uncommitted_sink_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let mut repo = FileArtifactRepository::open(dir.path()).unwrap();
        let descriptor = ArtifactDescriptor::canonical(key());
        {
            let mut sink = repo.output_stream(&descriptor).unwrap();
            sink.write_all(b"partial").unwrap();
        }
        assert!(!repo.contains_key(&key()));
        assert!(!repo.location_file(&descriptor).exists());
    }

    #[test]
    fn test_descriptors_persist_on_save() {
        let dir = TempDir::new().unwrap();
        let mut repo = FileArtifactRepository::open(dir.path()).unwrap();
        store(&mut repo, &ArtifactDescriptor::canonical(key()), b"c");
        store(&mut repo, &ArtifactDescriptor::packed(key()), b"p");
        repo.set_property("publisher", "test").unwrap();
        assert!(FileArtifactRepository::open(dir.path()).unwrap().is_empty());

        repo.save().unwrap();
        let reopened = FileArtifactRepository::open(dir.path()).unwrap();
        assert_eq!(reopened.descriptors(&key()).unwrap().len(), 2);
        assert_eq!(reopened.properties().get("publisher").map(String::as_str), Some("test"));
        assert!(dir.path().join(ARTIFACTS_FILE).exists());
    }

    #[test]
    fn test_missing_descriptor_file_is_dropped_from_index() {
        let dir = TempDir::new().unwrap();
        let mut repo = FileArtifactRepository::open(dir.path()).unwrap();
        store(&mut repo, &ArtifactDescriptor::canonical(key()), b"c");
        repo.save().unwrap();
        fs::remove_file(descriptors_path(dir.path(), &default_gav(&key()))).unwrap();

        let mut reopened = FileArtifactRepository::open(dir.path()).unwrap();
        assert!(reopened.is_empty());
        reopened.save().unwrap();
        let index = RepositoryIndex::load(dir.path().join(META_DIR).join(ARTIFACTS_INDEX));
        assert!(index.is_empty());
    }

    #[test]
    fn test_remove_descriptor_deletes_file() {
        let dir = TempDir::new().unwrap();
        let mut repo = FileArtifactRepository::open(dir.path()).unwrap();
        let descriptor = ArtifactDescriptor::canonical(key());
        store(&mut repo, &descriptor, b"c");
        let file = repo.location_file(&descriptor);
        repo.remove_descriptor(&descriptor).unwrap();
        assert!(!file.exists());
        assert!(!repo.contains_key(&key()));
        assert!(matches!(repo.remove_descriptor(&descriptor), Err(Error::NotFoundError(_))));
    }
}
