// src/lib.rs

//! tpforge - target platforms for OSGi builds
//!
//! Resolves a reactor of OSGi bundles and features against p2-style
//! metadata and artifact repositories, and mirrors repositories.
//!
//! # Architecture
//!
//! - Installable units: immutable metadata with provided capabilities,
//!   requirements, environment filters and artifact keys
//! - Execution-environment hints: synthetic JRE units that bound resolution
//! - Artifact providers: one capability-flagged contract for in-memory,
//!   file, Maven-backed and remote stores, with composite aggregation
//! - Resolution strategies: permissive slicing or consistent projection,
//!   run once per (os, ws, arch) environment
//! - Mirroring: copies sliced units and every stored artifact form
//!   between repositories

pub mod artifact;
pub mod cache;
pub mod config;
pub mod ee;
pub mod environment;
mod error;
pub mod gav;
pub mod interop;
pub mod metadata;
pub mod mirror;
pub mod progress;
pub mod repository;
pub mod resolver;
pub mod status;
pub mod target_platform;
pub mod version;

pub use artifact::{ArtifactProvider, ArtifactRepository};
pub use config::Config;
pub use environment::TargetEnvironment;
pub use error::{Error, Result};
pub use gav::{Gav, GavParseError};
pub use metadata::{ArtifactDescriptor, ArtifactKey, InstallableUnit, Requirement};
pub use mirror::{Mirror, MirrorOptions, MirrorSeed};
pub use progress::{CliProgress, LogProgress, ProgressStyle, ProgressTracker, SilentProgress, terminal_progress};
pub use resolver::{Defaults, ResolutionStrategy, StrategyKind};
pub use status::{Severity, Status};
pub use target_platform::{TargetPlatform, TargetPlatformFactory};
pub use version::{Version, VersionRange};
