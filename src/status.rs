// src/status.rs

//! Operation status values
//!
//! Multi-step operations (slicing, artifact transfer, mirroring) report a
//! [`Status`] instead of failing on the first problem. A status carries a
//! severity, a message and optional children; the severity of a parent is
//! the maximum of its own and its children's severities.
//!
//! `Cancel` ranks above `Error` so a cancelled operation is never mistaken
//! for a merely failed one.

use std::fmt;

use crate::error::Error;

/// Status severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Severity {
    #[default]
    Ok,
    Info,
    Warning,
    Error,
    Cancel,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Ok => "OK",
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Cancel => "CANCEL",
        };
        f.write_str(s)
    }
}

/// Result of a multi-step operation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Status {
    severity: Severity,
    message: String,
    children: Vec<Status>,
}

impl Status {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            children: Vec::new(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn cancel() -> Self {
        Self::new(Severity::Cancel, "Operation cancelled")
    }

    /// Create an empty multi-status that aggregates children
    pub fn multi(message: impl Into<String>) -> Self {
        Self::new(Severity::Ok, message)
    }

    /// Convert an error into a status, keeping cancellation distinct
    pub fn from_error(error: &Error) -> Self {
        if error.is_cancellation() {
            Self::cancel()
        } else {
            Self::error(error.to_string())
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn children(&self) -> &[Status] {
        &self.children
    }

    pub fn is_ok(&self) -> bool {
        self.severity == Severity::Ok
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_cancelled(&self) -> bool {
        self.severity == Severity::Cancel
    }

    /// True if the severity is at least `severity`
    pub fn matches(&self, severity: Severity) -> bool {
        self.severity >= severity
    }

    /// Add a child and raise this status' severity accordingly
    pub fn add(&mut self, child: Status) {
        if child.severity > self.severity {
            self.severity = child.severity;
        }
        self.children.push(child);
    }

    /// Add the children of another status, or the status itself if it has none
    pub fn merge(&mut self, other: Status) {
        if other.children.is_empty() {
            if !other.is_ok() {
                self.add(other);
            }
        } else {
            for child in other.children {
                self.add(child);
            }
        }
    }

    /// All leaf statuses with at least the given severity
    pub fn problems(&self, severity: Severity) -> Vec<&Status> {
        let mut result = Vec::new();
        self.collect_problems(severity, &mut result);
        result
    }

    fn collect_problems<'a>(&'a self, severity: Severity, out: &mut Vec<&'a Status>) {
        if self.children.is_empty() {
            if self.severity >= severity && self.severity != Severity::Ok {
                out.push(self);
            }
        } else {
            for child in &self.children {
                child.collect_problems(severity, out);
            }
        }
    }

    /// Render every problem on its own line, for log and error messages
    pub fn collect_messages(&self) -> String {
        let problems = self.problems(Severity::Info);
        if problems.is_empty() {
            return self.message.clone();
        }
        problems
            .iter()
            .map(|s| format!("{}: {}", s.severity, s.message))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.severity, self.message)?;
        for child in &self.children {
            write!(f, "\n  {}", child)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Ok < Severity::Info);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Cancel);
    }

    #[test]
    fn test_multi_status_takes_max_severity() {
        let mut status = Status::multi("mirror");
        status.add(Status::info("already there"));
        assert_eq!(status.severity(), Severity::Info);
        status.add(Status::error("broken"));
        status.add(Status::warning("odd"));
        assert_eq!(status.severity(), Severity::Error);
        assert_eq!(status.children().len(), 3);
    }

    #[test]
    fn test_cancellation_is_distinct_from_error() {
        let status = Status::from_error(&Error::Cancelled);
        assert!(status.is_cancelled());
        assert!(!status.is_error());
        let status = Status::from_error(&Error::IoError("disk".to_string()));
        assert!(status.is_error());
    }

    #[test]
    fn test_problems_and_messages() {
        let mut status = Status::multi("root");
        status.add(Status::ok());
        status.add(Status::warning("w1"));
        status.add(Status::error("e1"));
        assert_eq!(status.problems(Severity::Warning).len(), 2);
        assert_eq!(status.problems(Severity::Error).len(), 1);
        assert_eq!(status.collect_messages(), "WARNING: w1\nERROR: e1");
    }

    #[test]
    fn test_merge_skips_ok_status() {
        let mut status = Status::multi("root");
        status.merge(Status::ok());
        assert!(status.children().is_empty());
        let mut other = Status::multi("other");
        other.add(Status::warning("w"));
        status.merge(other);
        assert_eq!(status.children().len(), 1);
        assert_eq!(status.severity(), Severity::Warning);
    }
}
