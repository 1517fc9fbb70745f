// src/mirror/comparator.rs

//! Comparison of mirrored artifacts against a baseline repository

use std::io::{self, Write};

use sha2::{Digest, Sha256};

use crate::artifact::ArtifactProvider;
use crate::error::{Error, Result};
use crate::metadata::ArtifactKey;
use crate::progress::{ProgressStyle, ProgressTracker};
use crate::status::{Severity, Status};

/// Id of the SHA-256 comparator
pub const SHA256_COMPARATOR: &str = "sha-256";

/// Compares the canonical bytes of one artifact in two providers
pub trait ArtifactComparator: Send + Sync {
    fn id(&self) -> &str;

    /// OK if both providers deliver identical content, a warning otherwise
    fn compare(
        &self,
        baseline: &dyn ArtifactProvider,
        candidate: &dyn ArtifactProvider,
        key: &ArtifactKey,
        monitor: &dyn ProgressTracker,
    ) -> Status;
}

/// Look up a comparator by id
pub fn comparator(id: &str) -> Result<Box<dyn ArtifactComparator>> {
    match id {
        SHA256_COMPARATOR => Ok(Box::new(Sha256Comparator)),
        other => Err(Error::ConfigError(format!(
            "Unknown artifact comparator '{other}' (known: {SHA256_COMPARATOR})"
        ))),
    }
}

/// Sink that hashes what is written to it
#[derive(Default)]
pub struct HashingSink {
    hasher: Sha256,
    written: u64,
}

impl HashingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Lowercase hex digest
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl Write for HashingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Digest of the canonical bytes of `key` in `provider`
pub fn sha256_of(
    provider: &dyn ArtifactProvider,
    key: &ArtifactKey,
    monitor: &dyn ProgressTracker,
) -> std::result::Result<String, Status> {
    let mut sink = HashingSink::new();
    let child = monitor.child(&key.to_string(), 0, ProgressStyle::Bytes);
    let status = provider.get_artifact(key, &mut sink, child.as_ref());
    if status.matches(Severity::Error) {
        return Err(status);
    }
    Ok(sink.finish())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Comparator;

impl ArtifactComparator for Sha256Comparator {
    fn id(&self) -> &str {
        SHA256_COMPARATOR
    }

    fn compare(
        &self,
        baseline: &dyn ArtifactProvider,
        candidate: &dyn ArtifactProvider,
        key: &ArtifactKey,
        monitor: &dyn ProgressTracker,
    ) -> Status {
        let expected = match sha256_of(baseline, key, monitor) {
            Ok(digest) => digest,
            Err(status) => return status,
        };
        let actual = match sha256_of(candidate, key, monitor) {
            Ok(digest) => digest,
            Err(status) => return status,
        };
        if expected == actual {
            Status::ok()
        } else {
            Status::warning(format!(
                "Difference found for {key}: {} has sha-256 {actual}, baseline {} has {expected}",
                candidate.location(),
                baseline.location()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MemoryArtifactRepository;
    use crate::metadata::ArtifactDescriptor;
    use crate::progress::SilentProgress;
    use crate::version::Version;

    fn repository(location: &str, key: &ArtifactKey, content: &[u8]) -> MemoryArtifactRepository {
        let mut repo = MemoryArtifactRepository::new(location);
        repo.insert(ArtifactDescriptor::canonical(key.clone()), content.to_vec());
        repo
    }

    #[test]
    fn test_hashing_sink() {
        let mut sink = HashingSink::new();
        sink.write_all(b"abc").unwrap();
        assert_eq!(sink.written(), 3);
        assert_eq!(
            sink.finish(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_comparator() {
        let key = ArtifactKey::bundle("a", Version::new(1, 0, 0));
        let baseline = repository("memory:baseline", &key, b"same");
        let same = repository("memory:same", &key, b"same");
        let different = repository("memory:different", &key, b"other");
        let comparator = comparator(SHA256_COMPARATOR).unwrap();
        let monitor = SilentProgress::new();

        assert!(comparator.compare(&baseline, &same, &key, &monitor).is_ok());
        let status = comparator.compare(&baseline, &different, &key, &monitor);
        assert_eq!(status.severity(), Severity::Warning);
        assert!(status.message().contains("Difference found for"));
    }

    #[test]
    fn test_unknown_comparator() {
        assert!(matches!(comparator("md5"), Err(Error::ConfigError(_))));
    }
}
