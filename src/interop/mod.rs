// src/interop/mod.rs

//! Project metadata read from Eclipse plug-in projects: bundle manifests,
//! `.classpath` and `build.properties`

pub mod build_properties;
pub mod classpath;
pub mod manifest;

pub use build_properties::BuildProperties;
pub use classpath::ClasspathEntry;
pub use manifest::{BundleManifest, Manifest, ManifestElement};
