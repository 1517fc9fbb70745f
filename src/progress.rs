// src/progress.rs

//! Progress reporting and cancellation for multi-step operations
//!
//! Slicing, resolution, artifact transfer and mirroring all take a
//! `&dyn ProgressTracker`. Besides reporting progress, the tracker carries a
//! [`CancellationToken`]; long-running loops call [`checkpoint`] between
//! units or artifacts so a cancellation request aborts promptly.
//!
//! Implementations:
//! - `SilentProgress`: no output, for library callers and tests
//! - `LogProgress`: logs to tracing roughly every 10%
//! - `CliProgress`: an indicatif progress bar for the command line
//!
//! [`terminal_progress`] picks the bar when stderr is a terminal and falls
//! back to logging otherwise.
//!
//! Child trackers share their parent's cancellation token, so cancelling the
//! top-level operation cancels every nested step.
//!
//! # Example
//!
//! ```ignore
//! use tpforge::progress::{checkpoint, ProgressTracker, SilentProgress};
//!
//! let monitor = SilentProgress::with_length(keys.len() as u64);
//! for key in keys {
//!     checkpoint(&monitor)?;
//!     // ... transfer artifact ...
//!     monitor.increment(1);
//! }
//! ```

use std::io::IsTerminal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use indicatif::{ProgressBar, ProgressStyle as BarStyle};
use tracing::info;

use crate::error::{Error, Result};

/// Progress reporting style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressStyle {
    /// Progress bar with percentage (for known totals)
    #[default]
    Bar,
    /// Spinner (for unknown totals or indeterminate progress)
    Spinner,
    /// Bytes transfer (shows bytes/total and speed)
    Bytes,
}

/// Shared cancellation flag
///
/// Cloning yields a handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every operation holding this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Core trait for progress tracking
///
/// Implementations are thread-safe (Send + Sync) so a monitor can be shared
/// with worker threads of the surrounding build.
pub trait ProgressTracker: Send + Sync {
    /// Set the current status message
    fn set_message(&self, message: &str);

    /// Increment progress by the given amount
    fn increment(&self, amount: u64);

    /// Set progress to a specific position
    fn set_position(&self, position: u64);

    /// Set the total (length) of the progress
    fn set_length(&self, length: u64);

    /// Get current position
    fn position(&self) -> u64;

    /// Get total length
    fn length(&self) -> u64;

    /// Finish progress successfully with a message
    fn finish_with_message(&self, message: &str);

    /// Finish progress with an error/abandonment message
    fn finish_with_error(&self, message: &str);

    /// Check if progress is finished
    fn is_finished(&self) -> bool;

    /// Token observed by this tracker and all of its children
    fn cancellation(&self) -> &CancellationToken;

    /// Create a child progress tracker (for nested operations)
    fn child(&self, message: &str, length: u64, style: ProgressStyle) -> Box<dyn ProgressTracker>;

    /// Check if cancellation was requested
    fn is_cancelled(&self) -> bool {
        self.cancellation().is_cancelled()
    }
}

/// Fail with [`Error::Cancelled`] if the monitor was cancelled
pub fn checkpoint(monitor: &dyn ProgressTracker) -> Result<()> {
    if monitor.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Silent progress tracker (no-op)
///
/// Use this for quiet mode, library usage, or when progress output
/// is not desired.
#[derive(Debug, Default)]
pub struct SilentProgress {
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
    cancel: CancellationToken,
}

impl SilentProgress {
    /// Create a new silent progress tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a known length
    pub fn with_length(length: u64) -> Self {
        Self {
            length: AtomicU64::new(length),
            ..Default::default()
        }
    }

    /// Observe an existing cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

impl ProgressTracker for SilentProgress {
    fn set_message(&self, _message: &str) {}

    fn increment(&self, amount: u64) {
        self.position.fetch_add(amount, Ordering::Relaxed);
    }

    fn set_position(&self, position: u64) {
        self.position.store(position, Ordering::Relaxed);
    }

    fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, _message: &str) {
        self.finished.store(true, Ordering::Relaxed);
    }

    fn finish_with_error(&self, _message: &str) {
        self.finished.store(true, Ordering::Relaxed);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn child(&self, _message: &str, length: u64, _style: ProgressStyle) -> Box<dyn ProgressTracker> {
        Box::new(SilentProgress::with_length(length).with_cancellation(self.cancel.clone()))
    }
}

/// Logging progress tracker
///
/// Logs progress updates to tracing at info level.
/// Useful for non-interactive environments such as CI builds.
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
    /// Only log every N increments
    log_interval: AtomicU64,
    cancel: CancellationToken,
}

impl LogProgress {
    /// Create a new logging progress tracker
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            position: AtomicU64::new(0),
            length: AtomicU64::new(length),
            finished: AtomicBool::new(false),
            log_interval: AtomicU64::new(default_interval(length)),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the logging interval
    pub fn with_log_interval(self, interval: u64) -> Self {
        self.log_interval.store(interval, Ordering::Relaxed);
        self
    }

    /// Observe an existing cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

/// Log about ten times over `length`
fn default_interval(length: u64) -> u64 {
    std::cmp::max(1, length / 10)
}

impl ProgressTracker for LogProgress {
    fn set_message(&self, message: &str) {
        info!("{}: {}", self.name, message);
    }

    fn increment(&self, amount: u64) {
        let old_pos = self.position.fetch_add(amount, Ordering::Relaxed);
        let new_pos = old_pos + amount;
        let length = self.length.load(Ordering::Relaxed);
        let log_interval = self.log_interval.load(Ordering::Relaxed);

        if length > 0 && log_interval > 0 {
            let old_interval = old_pos / log_interval;
            let new_interval = new_pos / log_interval;
            if new_interval > old_interval {
                let percent = (new_pos * 100) / length;
                info!("{}: {}% ({}/{})", self.name, percent, new_pos, length);
            }
        }
    }

    fn set_position(&self, position: u64) {
        self.position.store(position, Ordering::Relaxed);
    }

    fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
        self.log_interval.store(default_interval(length), Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        info!("{}: {}", self.name, message);
    }

    fn finish_with_error(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        info!("{}: ERROR - {}", self.name, message);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn child(&self, message: &str, length: u64, _style: ProgressStyle) -> Box<dyn ProgressTracker> {
        Box::new(
            LogProgress::new(format!("{}:{}", self.name, message), length)
                .with_cancellation(self.cancel.clone()),
        )
    }
}

/// Progress bar for interactive terminals
pub struct CliProgress {
    bar: ProgressBar,
    finished: AtomicBool,
    cancel: CancellationToken,
}

impl CliProgress {
    pub fn new(message: &str, length: u64, style: ProgressStyle) -> Self {
        let bar = match style {
            ProgressStyle::Spinner => ProgressBar::new_spinner(),
            _ => ProgressBar::new(length),
        };
        let template = match style {
            ProgressStyle::Bar => "{msg} [{bar:40.cyan/blue}] {pos}/{len}",
            ProgressStyle::Spinner => "{spinner} {msg}",
            ProgressStyle::Bytes => "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
        };
        if let Ok(bar_style) = BarStyle::with_template(template) {
            bar.set_style(bar_style.progress_chars("=> "));
        }
        bar.set_message(message.to_string());
        Self {
            bar,
            finished: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

impl ProgressTracker for CliProgress {
    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn increment(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn set_position(&self, position: u64) {
        self.bar.set_position(position);
    }

    fn set_length(&self, length: u64) {
        self.bar.set_length(length);
    }

    fn position(&self) -> u64 {
        self.bar.position()
    }

    fn length(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    fn finish_with_message(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        self.bar.finish_with_message(message.to_string());
    }

    fn finish_with_error(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        self.bar.abandon_with_message(format!("ERROR: {}", message));
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn child(&self, _message: &str, length: u64, _style: ProgressStyle) -> Box<dyn ProgressTracker> {
        // Nested steps stay quiet so the bar is not redrawn per artifact
        Box::new(SilentProgress::with_length(length).with_cancellation(self.cancel.clone()))
    }
}

/// Progress bar when stderr is a terminal, log output otherwise
pub fn terminal_progress(message: &str, length: u64, style: ProgressStyle) -> Box<dyn ProgressTracker> {
    progress_for(std::io::stderr().is_terminal(), message, length, style)
}

fn progress_for(interactive: bool, message: &str, length: u64, style: ProgressStyle) -> Box<dyn ProgressTracker> {
    if interactive {
        Box::new(CliProgress::new(message, length, style))
    } else {
        Box::new(LogProgress::new(message, length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_progress() {
        let progress = SilentProgress::with_length(100);

        progress.set_message("test");
        progress.increment(10);
        assert_eq!(progress.position(), 10);

        progress.set_position(50);
        assert_eq!(progress.position(), 50);

        assert!(!progress.is_finished());
        progress.finish_with_message("done");
        assert!(progress.is_finished());
    }

    #[test]
    fn test_log_progress() {
        let progress = LogProgress::new("test", 100);

        progress.increment(25);
        assert_eq!(progress.position(), 25);

        progress.increment(25);
        assert_eq!(progress.position(), 50);

        progress.finish_with_message("complete");
        assert!(progress.is_finished());
    }

    #[test]
    fn test_log_progress_interval_follows_length() {
        let progress = LogProgress::new("mirror", 0);
        assert_eq!(progress.log_interval.load(Ordering::Relaxed), 1);
        progress.set_length(200);
        assert_eq!(progress.log_interval.load(Ordering::Relaxed), 20);
        progress.increment(30);
        assert_eq!(progress.position(), 30);
    }

    #[test]
    fn test_non_interactive_progress_logs() {
        let progress = progress_for(false, "Mirroring", 0, ProgressStyle::Bar);
        progress.set_length(4);
        progress.increment(2);
        assert_eq!(progress.length(), 4);
        assert_eq!(progress.position(), 2);
        progress.finish_with_message("done");
        assert!(progress.is_finished());
    }

    #[test]
    fn test_child_shares_cancellation() {
        let parent = SilentProgress::with_length(10);
        let child = parent.child("sub-task", 100, ProgressStyle::Bar);

        child.increment(50);
        assert_eq!(child.position(), 50);
        assert_eq!(parent.position(), 0);

        assert!(!child.is_cancelled());
        parent.cancellation().cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_checkpoint() {
        let token = CancellationToken::new();
        let progress = LogProgress::new("mirror", 3).with_cancellation(token.clone());
        assert!(checkpoint(&progress).is_ok());
        token.cancel();
        assert!(matches!(checkpoint(&progress), Err(Error::Cancelled)));
    }
}
