// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::sync::Arc;

use tempfile::TempDir;
use tpforge::artifact::FileArtifactRepository;
use tpforge::metadata::{ArtifactDescriptor, ArtifactKey, InstallableUnit, Requirement};
use tpforge::repository::{FileMetadataRepository, WritableMetadataRepository};
use tpforge::{ArtifactRepository, Version, VersionRange};

pub fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

pub fn range(s: &str) -> VersionRange {
    VersionRange::parse(s).unwrap()
}

/// Bundle unit carrying its own artifact key
pub fn bundle(id: &str, version: &str) -> InstallableUnit {
    InstallableUnit::builder(id, v(version))
        .bundle()
        .artifact(ArtifactKey::bundle(id, v(version)))
        .build()
}

/// Feature group including exactly one version of each bundle
pub fn feature_group(id: &str, version: &str, bundles: &[(&str, &str)]) -> InstallableUnit {
    let mut builder = InstallableUnit::builder(format!("{id}.feature.group"), v(version))
        .property("org.eclipse.equinox.p2.type.group", "true");
    for (bundle_id, bundle_version) in bundles {
        builder = builder.requirement(Requirement::unit(*bundle_id, VersionRange::exact(v(bundle_version))));
    }
    builder.build()
}

pub fn shared(units: Vec<InstallableUnit>) -> Vec<Arc<InstallableUnit>> {
    units.into_iter().map(Arc::new).collect()
}

/// Store `content` as the canonical form of `key`
pub fn store_artifact(repository: &mut dyn ArtifactRepository, key: &ArtifactKey, content: &[u8]) {
    let descriptor = ArtifactDescriptor::canonical(key.clone());
    let mut sink = repository.output_stream(&descriptor).unwrap();
    sink.write_all(content).unwrap();
    sink.commit().unwrap();
}

/// Directory-backed source repository holding `units` and one JAR per artifact key
///
/// Each artifact's bytes are `"<id>-<version> jar"`.
pub fn create_file_repository(units: Vec<InstallableUnit>) -> TempDir {
    let dir = TempDir::new().unwrap();
    let mut artifacts = FileArtifactRepository::open(dir.path()).unwrap();
    for unit in &units {
        for key in &unit.artifacts {
            store_artifact(&mut artifacts, key, &jar_bytes(key));
        }
    }
    artifacts.save().unwrap();

    let mut metadata = FileMetadataRepository::create(dir.path(), "source");
    metadata.add_units(&shared(units)).unwrap();
    metadata.save().unwrap();
    dir
}

pub fn jar_bytes(key: &ArtifactKey) -> Vec<u8> {
    format!("{}-{} jar", key.id, key.version).into_bytes()
}
