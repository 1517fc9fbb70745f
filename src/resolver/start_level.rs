// src/resolver/start_level.rs

//! Bundle start levels
//!
//! Start levels come from `configure` touchpoint instructions
//! (`setStartLevel(startLevel:N);markStarted(started:true);`), either on the
//! bundle itself or on a configuration unit attached to it as a fragment,
//! and otherwise from the [`Defaults`](super::Defaults) table. OSGi
//! fragments cannot be started and never get a start level.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::metadata::InstallableUnit;
use crate::metadata::unit::PHASE_CONFIGURE;

static START_LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:touchpoint\.eclipse\.)?setStartLevel\(startLevel:(\d+)\);").expect("valid regex")
});

static MARK_STARTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:touchpoint\.eclipse\.)?markStarted\(started:(true|false)\);").expect("valid regex")
});

/// Start level of a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StartLevel {
    /// `None` means the framework's default start level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default)]
    pub auto_start: bool,
}

impl StartLevel {
    pub fn new(level: u32, auto_start: bool) -> Self {
        Self {
            level: Some(level),
            auto_start,
        }
    }

    /// Framework default level, started or not
    pub fn default_level(auto_start: bool) -> Self {
        Self {
            level: None,
            auto_start,
        }
    }
}

impl fmt::Display for StartLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            Some(level) => write!(f, "{level}")?,
            None => f.write_str("default")?,
        }
        if self.auto_start {
            f.write_str(":start")?;
        }
        Ok(())
    }
}

/// Parse the body of a `configure` instruction
///
/// Returns `None` unless the body sets a start level; `markStarted`
/// defaults to `false`.
pub fn parse_configure_instruction(body: &str) -> Option<StartLevel> {
    let level = START_LEVEL.captures(body)?.get(1)?.as_str().parse::<u32>().ok()?;
    let auto_start = MARK_STARTED
        .captures(body)
        .and_then(|c| c.get(1))
        .is_some_and(|m| m.as_str().eq_ignore_ascii_case("true"));
    Some(StartLevel::new(level, auto_start))
}

fn configured_start_level(unit: &InstallableUnit) -> Option<StartLevel> {
    unit.instructions
        .get(PHASE_CONFIGURE)
        .and_then(|body| parse_configure_instruction(body))
}

/// Start levels of the bundles in a resolved unit set, by bundle id
///
/// Configuration attached to the bundle wins over the defaults table.
pub fn resolve_start_levels(
    units: &[Arc<InstallableUnit>],
    defaults: &BTreeMap<String, StartLevel>,
) -> BTreeMap<String, StartLevel> {
    let mut levels = BTreeMap::new();
    for bundle in units {
        if bundle.bundle_capability().is_none() || bundle.is_fragment() {
            continue;
        }
        let attached = units
            .iter()
            .filter(|u| u.bundle_capability().is_none() && u.is_fragment_of(&bundle.id))
            .find_map(|u| configured_start_level(u));
        let level = attached
            .or_else(|| configured_start_level(bundle))
            .or_else(|| defaults.get(&bundle.id).copied());
        if let Some(level) = level {
            levels.insert(bundle.id.clone(), level);
        }
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Requirement;
    use crate::metadata::capability::NAMESPACE_OSGI_BUNDLE;
    use crate::version::{Version, VersionRange};

    fn bundle(id: &str) -> InstallableUnit {
        InstallableUnit::builder(id, Version::new(1, 0, 0)).bundle().build()
    }

    #[test]
    fn test_parse_configure_instruction() {
        assert_eq!(
            parse_configure_instruction("setStartLevel(startLevel:2);markStarted(started:true);"),
            Some(StartLevel::new(2, true))
        );
        assert_eq!(
            parse_configure_instruction("touchpoint.eclipse.setStartLevel(startLevel:3);"),
            Some(StartLevel::new(3, false))
        );
        assert_eq!(parse_configure_instruction("markStarted(started:true);"), None);
        assert_eq!(parse_configure_instruction("setStartLevel(startLevel:x);"), None);
    }

    #[test]
    fn test_attached_configuration_wins() {
        let host = bundle("org.example.ds");
        let mut advice = InstallableUnit::builder("config.org.example.ds", Version::new(1, 0, 0))
            .instruction(PHASE_CONFIGURE, "setStartLevel(startLevel:1);markStarted(started:true);")
            .build();
        advice.host = Some(Requirement::capability(
            NAMESPACE_OSGI_BUNDLE,
            "org.example.ds",
            VersionRange::ANY,
        ));
        let units = vec![Arc::new(host), Arc::new(advice)];

        let mut defaults = BTreeMap::new();
        defaults.insert("org.example.ds".to_string(), StartLevel::new(4, false));
        let levels = resolve_start_levels(&units, &defaults);
        assert_eq!(levels.len(), 1);
        assert_eq!(levels["org.example.ds"], StartLevel::new(1, true));
    }

    #[test]
    fn test_fragments_get_no_start_level() {
        let fragment = InstallableUnit::builder("org.example.nl", Version::new(1, 0, 0))
            .bundle()
            .fragment_of("org.example.host", VersionRange::ANY)
            .instruction(PHASE_CONFIGURE, "setStartLevel(startLevel:2);")
            .build();
        let mut defaults = BTreeMap::new();
        defaults.insert("org.example.nl".to_string(), StartLevel::new(3, true));
        let levels = resolve_start_levels(&[Arc::new(fragment)], &defaults);
        assert!(levels.is_empty());
    }

    #[test]
    fn test_defaults_apply_to_resolved_bundles_only() {
        let mut defaults = BTreeMap::new();
        defaults.insert("org.example.common".to_string(), StartLevel::new(2, true));
        defaults.insert("org.example.absent".to_string(), StartLevel::new(3, true));
        let levels = resolve_start_levels(&[Arc::new(bundle("org.example.common"))], &defaults);
        assert_eq!(levels.keys().collect::<Vec<_>>(), vec!["org.example.common"]);
        assert_eq!(levels["org.example.common"].to_string(), "2:start");
    }
}
