//! Single pass-through error handler shared by every task.
//!
//! Tasks hand per-file failures here and keep going; nothing is retried and
//! no failure is treated as fatal. The caller decides what a non-zero count
//! means (the one-shot build fails, the dev server keeps serving).

use std::fmt::Display;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct Notifier {
    failures: AtomicUsize,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log a failure for `path` in `task` and count it.
    pub fn report(&self, task: &str, path: &Path, error: impl Display) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        tracing::error!("[{}] {}: {}", task, path.display(), error);
    }

    /// Log a warning that does not count as a failure.
    pub fn warn(&self, task: &str, path: &Path, message: impl Display) {
        tracing::warn!("[{}] {}: {}", task, path.display(), message);
    }

    /// Failures reported since creation or the last [`Notifier::reset`].
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.failures.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_reports_but_not_warnings() {
        let notifier = Notifier::new();

        notifier.report("styles", Path::new("a.scss"), "unexpected }");
        notifier.report("scripts", Path::new("a.js"), "unexpected token");
        notifier.warn("styles", Path::new("a.scss"), "!important used");

        assert_eq!(notifier.failures(), 2);

        notifier.reset();
        assert_eq!(notifier.failures(), 0);
    }
}
