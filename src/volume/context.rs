//! Per-operation resource tracking.
//!
//! Each encrypt or decrypt owns one [`OperationContext`]. Every temporary
//! file the operation creates (the `.incomplete` output, a recombined
//! input, a deniability-stripped copy) is staged here, and anything still
//! staged when the context drops is removed. Promoting the output to its
//! final name unstages it, so no partial output ever survives under the
//! final name. Key material is not stored here; it lives in `Protected`
//! values whose drop guarantees zeroing on the same exit paths.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Tracks temp files for one operation and removes leftovers on drop.
pub struct OperationContext {
    staged: Vec<PathBuf>,
}

impl OperationContext {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { staged: Vec::new() }
    }

    /// Registers a temp file for cleanup.
    pub fn stage(&mut self, path: PathBuf) {
        self.staged.push(path);
    }

    /// Stops tracking a path without touching it (the file reached its
    /// final, intended state).
    pub fn unstage(&mut self, path: &Path) {
        self.staged.retain(|p| p != path);
    }

    /// Renames a staged temp file onto its final name and stops tracking it.
    pub fn promote(&mut self, from: &Path, to: &Path) -> std::io::Result<()> {
        fs::rename(from, to)?;
        self.staged.retain(|p| p != from);
        Ok(())
    }

    /// Removes every staged file now. Missing files are fine; other I/O
    /// failures are logged and skipped so cleanup never masks the original
    /// error.
    pub fn discard(&mut self) {
        for path in self.staged.drain(..) {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed intermediate file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => debug!(path = %path.display(), error = %e, "failed to remove intermediate file"),
            }
        }
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OperationContext {
    fn drop(&mut self) {
        self.discard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_removes_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.incomplete");
        fs::write(&path, b"partial").unwrap();

        {
            let mut ctx = OperationContext::new();
            ctx.stage(path.clone());
        }
        assert!(!path.exists());
    }

    #[test]
    fn promote_unstages_and_renames() {
        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("x.incomplete");
        let done = dir.path().join("x");
        fs::write(&tmp, b"complete").unwrap();

        let mut ctx = OperationContext::new();
        ctx.stage(tmp.clone());
        ctx.promote(&tmp, &done).unwrap();
        drop(ctx);

        assert!(!tmp.exists());
        assert!(done.exists());
    }

    #[test]
    fn discard_tolerates_missing_files() {
        let mut ctx = OperationContext::new();
        ctx.stage(PathBuf::from("/nonexistent/never/was"));
        ctx.discard();
    }
}
