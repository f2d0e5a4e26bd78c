//! Terminal progress reporting.
//!
//! Wraps `indicatif` behind the pipeline's [`Progress`] interface and owns
//! the cancellation flag. The flag is shared as an `Arc<AtomicBool>` so a
//! signal handler can set it from outside; the pipelines poll it at every
//! chunk boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar as Bar, ProgressStyle as Style};

use crate::volume::Progress;

/// Bar resolution; fractions map onto this many ticks.
const PROGRESS_SCALE: u64 = 10_000;

/// Template for the bar line.
const PROGRESS_TEMPLATE: &str = "{spinner:.green} {msg} [{bar:40.cyan/blue}] {percent}%";

/// Progress bar plus cancellation state for one operation.
pub struct TermProgress {
    bar: Bar,
    cancelled: Arc<AtomicBool>,
    can_cancel: AtomicBool,
}

impl TermProgress {
    /// Creates the bar with the given initial status line.
    pub fn new(status: &str) -> Result<Self> {
        let bar = Bar::new(PROGRESS_SCALE);
        bar.set_style(Style::with_template(PROGRESS_TEMPLATE)?.progress_chars("●○ "));
        bar.set_message(status.to_owned());

        Ok(Self { bar, cancelled: Arc::new(AtomicBool::new(false)), can_cancel: AtomicBool::new(false) })
    }

    /// Handle for a signal handler to request cancellation.
    #[must_use]
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Completes and releases the bar line.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Progress for TermProgress {
    fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_owned());
    }

    fn set_progress(&self, fraction: f64, info: &str) {
        self.bar.set_position((fraction.clamp(0.0, 1.0) * PROGRESS_SCALE as f64) as u64);
        if !info.is_empty() {
            self.bar.set_message(info.to_owned());
        }
    }

    fn set_can_cancel(&self, can_cancel: bool) {
        self.can_cancel.store(can_cancel, Ordering::Relaxed);
    }

    fn update(&self) {
        self.bar.tick();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_is_shared() {
        let progress = TermProgress::new("working").unwrap();
        assert!(!progress.is_cancelled());
        progress.cancel_flag().store(true, Ordering::Relaxed);
        assert!(progress.is_cancelled());
    }
}
