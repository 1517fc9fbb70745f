// src/repository/index.rs

//! GAV index files of a local Maven repository
//!
//! A local repository records which Maven coordinates carry p2 metadata or
//! artifact descriptors in two index files (`metadata.index` and
//! `artifacts.index`), one GAV per line. Changes are applied in memory and
//! written only by [`RepositoryIndex::save`]; a crash before `save` loses
//! them.
//!
//! Loading never fails: a missing or unreadable file yields an empty index
//! and malformed lines are skipped.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::gav::Gav;

/// File name of the artifact descriptor index
pub const ARTIFACTS_INDEX: &str = "artifacts.index";
/// File name of the unit metadata index
pub const METADATA_INDEX: &str = "metadata.index";

/// Persistent set of GAVs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryIndex {
    /// Backing file; `None` for purely in-memory indexes
    path: Option<PathBuf>,
    gavs: BTreeSet<Gav>,
}

impl RepositoryIndex {
    /// In-memory index that is never persisted
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the index at `path`, tolerating a missing or corrupt file
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let gavs = match fs::read_to_string(&path) {
            Ok(content) => parse_lines(&path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                warn!("Ignoring unreadable repository index {}: {}", path.display(), e);
                BTreeSet::new()
            }
        };
        debug!("Loaded {} entries from {}", gavs.len(), path.display());
        Self { path: Some(path), gavs }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn gavs(&self) -> impl Iterator<Item = &Gav> {
        self.gavs.iter()
    }

    pub fn len(&self) -> usize {
        self.gavs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gavs.is_empty()
    }

    pub fn contains(&self, gav: &Gav) -> bool {
        self.gavs.contains(gav)
    }

    /// Returns true if the GAV was not yet present
    pub fn add_gav(&mut self, gav: Gav) -> bool {
        self.gavs.insert(gav)
    }

    /// Returns true if the GAV was present
    pub fn remove_gav(&mut self, gav: &Gav) -> bool {
        self.gavs.remove(gav)
    }

    /// Write the index; a no-op for in-memory indexes
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
            })?;
        }
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", temp_path.display())))?;
        for gav in &self.gavs {
            writeln!(file, "{}", gav.to_external_form())
                .map_err(|e| Error::IoError(format!("Failed to write {}: {e}", temp_path.display())))?;
        }
        file.sync_all()?;
        fs::rename(&temp_path, path).map_err(|e| {
            Error::IoError(format!("Failed to move {} to {}: {e}", temp_path.display(), path.display()))
        })?;
        debug!("Saved {} entries to {}", self.gavs.len(), path.display());
        Ok(())
    }
}

fn parse_lines(path: &Path, content: &str) -> BTreeSet<Gav> {
    let mut gavs = BTreeSet::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match Gav::parse(line) {
            Ok(gav) => {
                gavs.insert(gav);
            }
            Err(e) => warn!("Skipping entry in {}: {}", path.display(), e),
        }
    }
    gavs
}
