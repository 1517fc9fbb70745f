// src/artifact/policy.rs

//! Choice of the stored form to transfer
//!
//! Local transfers want the directly usable canonical form. Remote
//! transfers prefer the packed form because it is smaller on the wire.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::metadata::{ArtifactDescriptor, ArtifactFormat};

pub trait TransferPolicy: Send + Sync {
    /// Pick one of the available forms; fails on an empty list
    fn pick_format(&self, formats: &[Arc<ArtifactDescriptor>]) -> Result<Arc<ArtifactDescriptor>>;
}

fn pick_in_order(formats: &[Arc<ArtifactDescriptor>], order: [ArtifactFormat; 2]) -> Result<Arc<ArtifactDescriptor>> {
    let Some(first) = formats.first() else {
        return Err(Error::InvalidArgument("List of artifact formats is empty".to_string()));
    };
    let preferred = order
        .iter()
        .find_map(|format| formats.iter().find(|d| d.format == *format))
        .unwrap_or(first);
    Ok(Arc::clone(preferred))
}

/// Canonical first, then packed, then whatever comes first
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransferPolicy;

impl TransferPolicy for LocalTransferPolicy {
    fn pick_format(&self, formats: &[Arc<ArtifactDescriptor>]) -> Result<Arc<ArtifactDescriptor>> {
        pick_in_order(formats, [ArtifactFormat::Canonical, ArtifactFormat::Packed])
    }
}

/// Packed first, then canonical, then whatever comes first
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteTransferPolicy;

impl TransferPolicy for RemoteTransferPolicy {
    fn pick_format(&self, formats: &[Arc<ArtifactDescriptor>]) -> Result<Arc<ArtifactDescriptor>> {
        pick_in_order(formats, [ArtifactFormat::Packed, ArtifactFormat::Canonical])
    }
}
