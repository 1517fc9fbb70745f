// src/mirror/log.rs

//! Reporting of per-artifact mirror results

use tracing::{debug, error, info, warn};

use crate::metadata::ArtifactDescriptor;
use crate::status::{Severity, Status};

/// Receives the outcome of every mirrored descriptor and overall problems
pub trait MirrorLog: Send + Sync {
    fn log_descriptor(&self, descriptor: &ArtifactDescriptor, status: &Status);

    fn log(&self, status: &Status);
}

/// Logs mirror results through `tracing`
///
/// Problems with single descriptors are usually harmless (a form already
/// present, a packed form that could not be read), so their warnings go
/// to `debug`. Errors are always logged as errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMirrorLog;

impl MirrorLog for TracingMirrorLog {
    fn log_descriptor(&self, descriptor: &ArtifactDescriptor, status: &Status) {
        match status.severity() {
            Severity::Ok => {}
            Severity::Info | Severity::Warning => debug!("{}: {}", descriptor, status.message()),
            Severity::Error => error!("{}: {}", descriptor, status.collect_messages()),
            Severity::Cancel => info!("Mirroring of {} cancelled", descriptor),
        }
    }

    fn log(&self, status: &Status) {
        for problem in status.problems(Severity::Info) {
            match problem.severity() {
                Severity::Info => info!("{}", problem.message()),
                Severity::Warning => warn!("{}", problem.message()),
                Severity::Error => error!("{}", problem.message()),
                _ => {}
            }
        }
    }
}
