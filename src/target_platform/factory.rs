// src/target_platform/factory.rs

//! Target-platform assembly
//!
//! The units available for resolution are the reactor's own units plus the
//! external units of the configured repositories, cleaned up before any
//! resolution happens:
//!
//! 1. units that only pollute resolution (generic `a.jre.*` JRE units) are dropped
//! 2. partial units (incomplete metadata) are dropped
//! 3. external units with an id the reactor also builds are dropped
//! 4. the configured target-platform filters are applied to external units
//! 5. a custom execution environment is read from what remains

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};

use super::TargetPlatform;
use super::filter::{TargetPlatformFilter, apply_filters};
use crate::artifact::{ArtifactProvider, ListCompositeArtifactProvider, LocalTransferPolicy};
use crate::ee::ResolutionHints;
use crate::environment::TargetEnvironment;
use crate::error::Result;
use crate::metadata::{InstallableUnit, Requirement};
use crate::progress::ProgressTracker;
use crate::resolver::{Defaults, ResolutionData, SlicerOptions, StrategyKind, new_strategy};

/// Everything a target platform is built from
#[derive(Default)]
pub struct TargetPlatformContent {
    /// Units built by the reactor; these are the resolution roots
    pub reactor_units: Vec<Arc<InstallableUnit>>,
    /// Units of the configured repositories
    pub external_units: Vec<Arc<InstallableUnit>>,
    /// Explicitly requested dependencies of the reactor
    pub additional_requirements: Vec<Requirement>,
    pub filters: Vec<TargetPlatformFilter>,
    /// Extra selection-context properties, merged with each environment
    pub filter_properties: BTreeMap<String, String>,
    /// Providers of the external artifacts
    pub artifacts: Vec<Arc<dyn ArtifactProvider>>,
}

/// Clean up the available units and complete the hints
///
/// Returns reactor units followed by the remaining external units, and the
/// hints with a custom execution environment read from that content.
pub fn prepare_available_units(
    reactor: &[Arc<InstallableUnit>],
    external: &[Arc<InstallableUnit>],
    hints: &ResolutionHints,
    filters: &[TargetPlatformFilter],
) -> Result<(Vec<Arc<InstallableUnit>>, ResolutionHints)> {
    let reactor_ids: HashSet<&str> = reactor.iter().map(|u| u.id.as_str()).collect();
    let external: Vec<Arc<InstallableUnit>> = external
        .iter()
        .filter(|u| {
            if hints.is_non_applicable_unit(u) {
                debug!("Ignoring non-applicable unit {}", u);
                return false;
            }
            if u.is_partial() {
                debug!("Ignoring partial unit {}", u);
                return false;
            }
            if reactor_ids.contains(u.id.as_str()) {
                debug!("{} is shadowed by the reactor", u);
                return false;
            }
            true
        })
        .cloned()
        .collect();
    let external = apply_filters(external, filters);

    let available: Vec<Arc<InstallableUnit>> = reactor.iter().cloned().chain(external).collect();
    let hints = hints.read_full_specification(available.iter())?;
    Ok((available, hints))
}

/// Builds target platforms for a fixed set of environments
#[derive(Debug, Clone, Default)]
pub struct TargetPlatformFactory {
    pub strategy: StrategyKind,
    pub options: SlicerOptions,
    pub defaults: Defaults,
    pub environments: Vec<TargetEnvironment>,
}

impl TargetPlatformFactory {
    pub fn new(strategy: StrategyKind, environments: Vec<TargetEnvironment>) -> Self {
        Self {
            strategy,
            environments,
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: SlicerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Resolve the reactor against the content and build the target platform
    pub fn create(
        &self,
        content: TargetPlatformContent,
        hints: &ResolutionHints,
        monitor: &dyn ProgressTracker,
    ) -> Result<TargetPlatform> {
        let (available, hints) = prepare_available_units(
            &content.reactor_units,
            &content.external_units,
            hints,
            &content.filters,
        )?;
        info!(
            "Resolving {} reactor units against {} available units ({}, {})",
            content.reactor_units.len(),
            available.len(),
            self.strategy,
            hints
        );

        let mut data = ResolutionData::new(content.reactor_units, available, hints)
            .with_additional_requirements(content.additional_requirements);
        data.additional_filter_properties = content.filter_properties;
        let strategy = new_strategy(self.strategy, data, self.options.clone(), self.defaults.clone());
        let result = strategy.multi_platform_resolve(&self.environments, monitor)?;

        let artifacts = ListCompositeArtifactProvider::create(content.artifacts, Arc::new(LocalTransferPolicy));
        let platform = TargetPlatform::new(result, artifacts, &self.defaults);
        info!("Target platform contains {} units", platform.len());
        Ok(platform)
    }
}
