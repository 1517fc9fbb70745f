// src/commands/mirror.rs
//! Mirror command

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tpforge::artifact::{FileArtifactRepository, ListCompositeArtifactProvider, RemoteTransferPolicy};
use tpforge::config::Config;
use tpforge::mirror::{Mirror, MirrorSeed, MirrorSources};
use tpforge::progress::{ProgressStyle, terminal_progress};
use tpforge::repository::{
    FileMetadataRepository, MetadataRepository, ReferenceType, RepositoryKind, RepositoryManager, RepositoryReference,
};
use tpforge::status::Severity;
use tracing::{info, warn};

/// Metadata repositories behind `references`, following their own references
///
/// Repositories that fail to load are left out.
fn load_referenced(
    manager: &RepositoryManager,
    references: &[RepositoryReference],
) -> BTreeMap<String, Arc<dyn MetadataRepository>> {
    let mut loaded: BTreeMap<String, Arc<dyn MetadataRepository>> = BTreeMap::new();
    let mut pending: Vec<String> = references
        .iter()
        .filter(|r| r.kind == ReferenceType::Metadata)
        .map(|r| r.location.clone())
        .collect();
    while let Some(location) = pending.pop() {
        if loaded.contains_key(&location) {
            continue;
        }
        match manager.load_metadata(&location, RepositoryKind::detect(&location)) {
            Ok(repository) => {
                pending.extend(
                    repository
                        .references()
                        .into_iter()
                        .filter(|r| r.kind == ReferenceType::Metadata && r.enabled)
                        .map(|r| r.location),
                );
                loaded.insert(location, repository);
            }
            Err(e) => warn!("Could not load referenced repository {}: {}", location, e),
        }
    }
    loaded
}

/// Mirror the configured repositories into `destination`
pub fn cmd_mirror(config_path: &Path, destination: &Path, seeds: &[String], name: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    let seeds = seeds
        .iter()
        .map(|s| s.parse::<MirrorSeed>().with_context(|| format!("Invalid seed '{}'", s)))
        .collect::<Result<Vec<_>>>()?;

    let manager = config.repository_manager()?;
    let repositories = config.load_repositories(&manager)?;
    let baseline = match &config.mirror.baseline {
        Some(location) => Some(manager.load_artifacts(location, RepositoryKind::detect(location))?),
        None => None,
    };
    let mut sources = MirrorSources {
        metadata: repositories.metadata,
        artifacts: ListCompositeArtifactProvider::create(repositories.artifacts, Arc::new(RemoteTransferPolicy)),
        baseline,
        referenced: BTreeMap::new(),
    };

    info!("Mirroring into {}", destination.display());
    let mut destination_metadata = FileMetadataRepository::open_or_create(destination, name)?;
    if config.mirror.options.filter_provided {
        let mut references = destination_metadata.references();
        if config.mirror.options.include_references {
            references.extend(sources.references());
        }
        sources.referenced = load_referenced(&manager, &references);
    }
    let mut destination_artifacts = FileArtifactRepository::open(destination)?;
    let mirror = Mirror::new(config.mirror.options.clone(), config.environments());
    let progress = terminal_progress("Mirroring", 0, ProgressStyle::Bar);
    let summary = match mirror.mirror(
        &sources,
        &seeds,
        &mut destination_metadata,
        &mut destination_artifacts,
        progress.as_ref(),
    ) {
        Ok(summary) => summary,
        Err(e) => {
            progress.finish_with_error("Mirroring failed");
            return Err(e.into());
        }
    };
    progress.finish_with_message("Mirroring complete");

    println!(
        "Mirrored {} units and {} artifacts to {}",
        summary.units,
        summary.artifacts,
        destination.display()
    );
    for problem in summary.status.problems(Severity::Warning) {
        println!("  {}: {}", problem.severity(), problem.message());
    }
    Ok(())
}
