// src/resolver/conflict.rs

//! Conflict types for target-platform resolution
//!
//! The projector records a conflict for every dead end it runs into; the
//! distinct conflicts of a failed resolution form its explanation.

use std::fmt;

/// A reason why a set of units cannot be installed together
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Conflict {
    /// No available unit provides a required capability
    MissingCapability { requirement: String, required_by: String },
    /// An `osgi.ee` requirement that the active execution environment does not provide
    ExecutionEnvironment {
        required_by: String,
        filter: String,
        active: String,
    },
    /// Two versions of a singleton bundle
    Singleton { id: String, versions: Vec<String> },
    /// A unit matched by a negative requirement of another selected unit
    Excluded {
        unit: String,
        requirement: String,
        excluded_by: String,
    },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conflict::MissingCapability {
                requirement,
                required_by,
            } => write!(
                f,
                "Missing requirement: {} requires '{}' but could not find required capability",
                required_by, requirement
            ),
            Conflict::ExecutionEnvironment {
                required_by,
                filter,
                active,
            } => write!(
                f,
                "Unit {} requires Execution Environment that matches {} but the current resolution context uses {}",
                required_by, filter, active
            ),
            Conflict::Singleton { id, versions } => {
                let units: Vec<String> = versions.iter().map(|v| format!("{id} {v}")).collect();
                write!(f, "Only one of the following can be installed at once: [{}]", units.join(", "))
            }
            Conflict::Excluded {
                unit,
                requirement,
                excluded_by,
            } => write!(
                f,
                "{} cannot be installed because {} excludes '{}'",
                unit, excluded_by, requirement
            ),
        }
    }
}
