// src/config.rs
//! `tpforge.toml` configuration
//!
//! Sections:
//! - `[resolver]` - strategy, slicer options, execution environment
//! - `[[environments]]` - os/ws/arch triples to resolve for
//! - `[[repositories]]` - source repositories by id and location
//! - `[[filters]]` - target-platform filters
//! - `[mirror]` - mirror options and the comparison baseline
//! - `[defaults]` - wildcard qualifier and start levels
//! - `[properties]` - extra selection-context properties
//!
//! Top-level keys: `offline`, `cache_capacity`.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artifact::ArtifactProvider;
use crate::ee::{EeMode, ResolutionHints};
use crate::environment::TargetEnvironment;
use crate::error::{Error, Result};
use crate::metadata::InstallableUnit;
use crate::mirror::{MirrorOptions, comparator};
use crate::repository::{MetadataRepository, RepositoryKind, RepositoryManager};
use crate::resolver::{Defaults, SlicerOptions, StrategyKind};
use crate::target_platform::TargetPlatformFilter;

pub const DEFAULT_CONFIG_FILE: &str = "tpforge.toml";

fn default_cache_capacity() -> usize {
    32
}

fn default_ee_profile() -> String {
    "JavaSE-17".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Fail remote access instead of touching the network
    #[serde(default)]
    pub offline: bool,
    /// Capacity of the loaded-repository caches
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default)]
    pub resolver: ResolverSection,
    #[serde(default)]
    pub environments: Vec<TargetEnvironment>,
    #[serde(default)]
    pub repositories: Vec<RepositorySection>,
    #[serde(default)]
    pub filters: Vec<TargetPlatformFilter>,
    #[serde(default)]
    pub mirror: MirrorSection,
    #[serde(default)]
    pub defaults: Defaults,
    /// Extra selection-context properties
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            offline: false,
            cache_capacity: default_cache_capacity(),
            resolver: ResolverSection::default(),
            environments: Vec::new(),
            repositories: Vec::new(),
            filters: Vec::new(),
            mirror: MirrorSection::default(),
            defaults: Defaults::default(),
            properties: BTreeMap::new(),
        }
    }
}

/// Resolver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSection {
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default = "default_true")]
    pub include_optional: bool,
    #[serde(default = "default_true")]
    pub everything_greedy: bool,
    #[serde(default)]
    pub consider_strict_dependency_only: bool,
    #[serde(default)]
    pub follow_only_filtered_requirements: bool,
    #[serde(default)]
    pub latest_version_only: bool,
    /// Execution environment profile, e.g. `JavaSE-17`
    #[serde(default = "default_ee_profile")]
    pub ee_profile: String,
    #[serde(default)]
    pub ee_mode: EeMode,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            include_optional: true,
            everything_greedy: true,
            consider_strict_dependency_only: false,
            follow_only_filtered_requirements: false,
            latest_version_only: false,
            ee_profile: default_ee_profile(),
            ee_mode: EeMode::default(),
        }
    }
}

impl ResolverSection {
    pub fn slicer_options(&self) -> SlicerOptions {
        SlicerOptions {
            include_optional: self.include_optional,
            everything_greedy: self.everything_greedy,
            consider_strict_dependency_only: self.consider_strict_dependency_only,
            follow_only_filtered_requirements: self.follow_only_filtered_requirements,
            latest_version_only: self.latest_version_only,
            ..SlicerOptions::default()
        }
    }

    pub fn hints(&self) -> Result<ResolutionHints> {
        ResolutionHints::new(self.ee_mode, &self.ee_profile)
    }
}

/// A source repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySection {
    pub id: String,
    pub location: String,
    /// Detected from the location when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RepositoryKind>,
}

impl RepositorySection {
    pub fn kind(&self) -> RepositoryKind {
        self.kind.unwrap_or_else(|| RepositoryKind::detect(&self.location))
    }
}

/// Mirror settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MirrorSection {
    #[serde(flatten)]
    pub options: MirrorOptions,
    /// Repository copied artifacts are compared against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
}

/// Units and artifacts of the configured repositories
pub struct LoadedRepositories {
    pub metadata: Vec<Arc<dyn MetadataRepository>>,
    pub artifacts: Vec<Arc<dyn ArtifactProvider>>,
}

impl LoadedRepositories {
    pub fn units(&self) -> Vec<Arc<InstallableUnit>> {
        self.metadata.iter().flat_map(|r| r.units()).collect()
    }
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config file {}: {e}", path.display())))?;
        let config = Self::parse(&content)
            .map_err(|e| Error::ConfigError(format!("Invalid config file {}: {e}", path.display())))?;
        debug!(
            "Loaded {} with {} repositories and {} environments",
            path.display(),
            config.repositories.len(),
            config.environments.len()
        );
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(Error::ConfigError("cache_capacity must be at least 1".to_string()));
        }
        let mut ids = HashSet::new();
        for repository in &self.repositories {
            if repository.id.trim().is_empty() || repository.location.trim().is_empty() {
                return Err(Error::ConfigError(format!(
                    "Repository '{}' needs both an id and a location",
                    repository.id
                )));
            }
            if !ids.insert(repository.id.as_str()) {
                return Err(Error::ConfigError(format!("Duplicate repository id '{}'", repository.id)));
            }
        }
        comparator(&self.mirror.options.comparator)?;
        Ok(())
    }

    /// Environments to resolve for; no configured environment means one
    /// unconstrained environment
    pub fn environments(&self) -> Vec<TargetEnvironment> {
        if self.environments.is_empty() {
            vec![TargetEnvironment::any()]
        } else {
            self.environments.clone()
        }
    }

    /// Repository manager with every configured repository id registered
    pub fn repository_manager(&self) -> Result<RepositoryManager> {
        let manager = RepositoryManager::new(self.offline, self.cache_capacity)?;
        for repository in &self.repositories {
            manager.registry().register(&repository.id, &repository.location);
        }
        Ok(manager)
    }

    /// Load every configured repository
    pub fn load_repositories(&self, manager: &RepositoryManager) -> Result<LoadedRepositories> {
        let mut loaded = LoadedRepositories {
            metadata: Vec::with_capacity(self.repositories.len()),
            artifacts: Vec::with_capacity(self.repositories.len()),
        };
        for repository in &self.repositories {
            let kind = repository.kind();
            loaded.metadata.push(manager.load_metadata(&repository.id, kind)?);
            loaded.artifacts.push(manager.load_artifacts(&repository.id, kind)?);
        }
        Ok(loaded)
    }
}
