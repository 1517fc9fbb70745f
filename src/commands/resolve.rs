// src/commands/resolve.rs
//! Target-platform resolution command

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tpforge::config::Config;
use tpforge::ee::ResolutionHints;
use tpforge::interop::{BuildProperties, BundleManifest};
use tpforge::metadata::InstallableUnit;
use tpforge::mirror::MirrorSeed;
use tpforge::progress::{ProgressStyle, terminal_progress};
use tpforge::resolver::StrategyKind;
use tpforge::target_platform::{TargetPlatformContent, TargetPlatformFactory};
use tracing::info;

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Reactor unit of a plug-in project
///
/// The project's `javacTarget` must run on the resolution's execution
/// environment.
fn project_unit(project: &Path, hints: &ResolutionHints) -> Result<Arc<InstallableUnit>> {
    let path = project.join(MANIFEST_PATH);
    let text = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let manifest = BundleManifest::parse(&text).with_context(|| format!("Invalid manifest {}", path.display()))?;
    if let Some(environment) = hints.execution_environment() {
        BuildProperties::load(project)?
            .check_target_level(environment)
            .with_context(|| format!("Project {} cannot be built", project.display()))?;
    }
    Ok(Arc::new(manifest.to_installable_unit()))
}

/// Resolve the configured repositories for each environment
pub fn cmd_resolve(
    config_path: &Path,
    seeds: &[String],
    projects: &[PathBuf],
    strategy: Option<StrategyKind>,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let strategy = strategy.unwrap_or(config.resolver.strategy);
    let hints = config.resolver.hints()?;

    let reactor_units = projects.iter().map(|p| project_unit(p, &hints)).collect::<Result<Vec<_>>>()?;
    let mut additional_requirements = Vec::with_capacity(seeds.len());
    for seed in seeds {
        let seed: MirrorSeed = seed.parse().with_context(|| format!("Invalid seed '{}'", seed))?;
        additional_requirements.push(config.defaults.seed_requirement(&seed.unit_id(), seed.version.as_ref()));
    }
    if reactor_units.is_empty() && additional_requirements.is_empty() {
        anyhow::bail!("Nothing to resolve: give at least one --seed or --project");
    }

    let manager = config.repository_manager()?;
    let repositories = config.load_repositories(&manager)?;
    let external_units = repositories.units();
    info!(
        "Resolving with {} strategy against {} units from {} repositories",
        strategy,
        external_units.len(),
        repositories.metadata.len()
    );

    for environment in config.environments() {
        let content = TargetPlatformContent {
            reactor_units: reactor_units.clone(),
            external_units: external_units.clone(),
            additional_requirements: additional_requirements.clone(),
            filters: config.filters.clone(),
            filter_properties: config.properties.clone(),
            artifacts: repositories.artifacts.clone(),
        };
        let factory = TargetPlatformFactory::new(strategy, vec![environment.clone()])
            .with_options(config.resolver.slicer_options())
            .with_defaults(config.defaults.clone());
        let progress = terminal_progress(&format!("Resolving {}", environment), 0, ProgressStyle::Spinner);
        let platform = factory
            .create(content, &hints, progress.as_ref())
            .with_context(|| format!("Resolution failed for {}", environment))?;
        progress.finish_with_message(&format!("Resolved {} units for {}", platform.len(), environment));

        println!("Target platform for {} ({} units):", environment, platform.len());
        let mut units: Vec<_> = platform.units().iter().collect();
        units.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.version.cmp(&b.version)));
        for unit in units {
            match platform.start_level(&unit.id) {
                Some(level) => println!("  {} [{}]", unit, level),
                None => println!("  {}", unit),
            }
        }
    }
    Ok(())
}
