//! Per-asset-class tasks.
//!
//! Every task walks its sources, transforms each file independently and
//! hands per-file failures to the [`Notifier`] instead of aborting.

pub mod clean;
pub mod copy;
pub mod images;
pub mod scripts;
pub mod styles;
pub mod templates;
#[cfg(feature = "tinypng")]
pub mod tinypng;

use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::cache::ContentCache;
use crate::config::{BuildMode, SiteConfig};
use crate::layout::Layout;
use crate::notifier::Notifier;

/// Everything a task needs to run.
#[derive(Clone, Copy)]
pub struct TaskContext<'a> {
    pub layout: &'a Layout,
    pub config: &'a SiteConfig,
    pub mode: BuildMode,
    pub notifier: &'a Notifier,
    pub cache: &'a ContentCache,
}

/// What happened to one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Written,
    Skipped,
    Failed,
}

/// Summary of one task run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskReport {
    pub task: &'static str,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl TaskReport {
    pub fn new(task: &'static str) -> Self {
        Self {
            task,
            ..Default::default()
        }
    }

    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Written => self.written += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    /// Fold another report's counts into this one.
    pub fn absorb(&mut self, other: &TaskReport) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Errors a task can hit on a single file.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Style error: {0}")]
    Style(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Remote service error: {0}")]
    Remote(String),

    #[error("No destination for {0}")]
    NoDestination(PathBuf),
}

/// Run `f` over `sources` in parallel, routing failures to the notifier.
pub(crate) fn run_files<F>(
    task: &'static str,
    sources: &[PathBuf],
    notifier: &Notifier,
    f: F,
) -> TaskReport
where
    F: Fn(&Path) -> Result<Outcome, TaskError> + Sync,
{
    let outcomes: Vec<Outcome> = sources
        .par_iter()
        .map(|source| match f(source) {
            Ok(outcome) => outcome,
            Err(e) => {
                notifier.report(task, source, &e);
                Outcome::Failed
            }
        })
        .collect();

    let mut report = TaskReport::new(task);
    for outcome in outcomes {
        report.record(outcome);
    }

    tracing::debug!(
        "[{}] {} written, {} skipped, {} failed",
        task,
        report.written,
        report.skipped,
        report.failed
    );

    report
}

/// Write `contents` to `path`, creating parent directories.
pub(crate) fn write_output(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}
