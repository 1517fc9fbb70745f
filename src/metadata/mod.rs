// src/metadata/mod.rs

//! p2-style metadata model
//!
//! Installable units, their capabilities and requirements, LDAP filters and
//! artifact keys/descriptors. Everything here is a plain value type; the
//! resolver and repositories share units as `Arc<InstallableUnit>`.

pub mod artifact;
pub mod capability;
pub mod filter;
pub mod unit;

pub use artifact::{ArtifactDescriptor, ArtifactFormat, ArtifactKey};
pub use capability::{ProvidedCapability, Requirement, RequirementMatch};
pub use filter::{LdapFilter, PropertyLookup};
pub use unit::{InstallableUnit, InstallableUnitBuilder, VersionedId};
