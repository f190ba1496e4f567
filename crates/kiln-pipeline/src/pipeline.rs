//! Build orchestration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use crate::cache::ContentCache;
use crate::config::{BuildMode, SiteConfig};
use crate::layout::{AssetClass, Layout};
use crate::notifier::Notifier;
use crate::tasks::clean::{self, CleanReport};
use crate::tasks::{copy, images, scripts, styles, templates, TaskContext, TaskReport};

/// Result of a build operation.
#[derive(Debug)]
pub struct BuildResult {
    /// One report per task that ran
    pub reports: Vec<TaskReport>,

    /// Total build time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

impl BuildResult {
    pub fn written(&self) -> usize {
        self.reports.iter().map(|r| r.written).sum()
    }

    pub fn failed(&self) -> usize {
        self.reports.iter().map(|r| r.failed).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs the per-class tasks for one project in one build mode.
pub struct Pipeline {
    config: SiteConfig,
    layout: Layout,
    mode: BuildMode,
    notifier: Notifier,
    cache: ContentCache,
}

impl Pipeline {
    /// Create a pipeline for the project rooted at `root`.
    pub fn new(root: &Path, config: SiteConfig, mode: BuildMode) -> Self {
        let layout = Layout::new(root, &config);
        Self {
            config,
            layout,
            mode,
            notifier: Notifier::new(),
            cache: ContentCache::new(),
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// True when a stylesheet on disk is exactly what the lint pass last
    /// saw or wrote, so a change event for it carries nothing new.
    pub fn is_linted(&self, path: &Path) -> bool {
        fs::read(path).is_ok_and(|bytes| self.cache.matches(styles::LINT_CACHE, path, &bytes))
    }

    fn context(&self) -> TaskContext<'_> {
        TaskContext {
            layout: &self.layout,
            config: &self.config,
            mode: self.mode,
            notifier: &self.notifier,
            cache: &self.cache,
        }
    }

    /// Remove previous output and forget cached state, so the next build
    /// regenerates everything it removed.
    pub fn clean(&self) -> CleanReport {
        let report = clean::clean(&self.layout, &self.notifier);
        self.cache.clear();
        report
    }

    /// Run the single-step transform for one asset class.
    ///
    /// Styles lint before they compile, as in the watch chain.
    pub fn run_class(&self, class: AssetClass) -> Vec<TaskReport> {
        let ctx = self.context();
        match class {
            AssetClass::Templates => vec![templates::compile(&ctx)],
            AssetClass::Styles => vec![styles::lint(&ctx), styles::compile(&ctx)],
            AssetClass::Scripts => vec![scripts::bundle(&ctx)],
            AssetClass::Images => vec![images::compress(&ctx)],
            AssetClass::Static => vec![copy::copy_static(&ctx)],
        }
    }

    /// Run every class in parallel. Does not clean first.
    pub fn build(&self) -> BuildResult {
        let start = Instant::now();
        tracing::info!("Building {} ({})", self.layout.dest.display(), self.mode);

        let reports: Vec<TaskReport> = AssetClass::ALL
            .par_iter()
            .flat_map_iter(|class| self.run_class(*class))
            .collect();

        for report in &reports {
            tracing::info!(
                "[{}] {} written, {} skipped, {} failed",
                report.task,
                report.written,
                report.skipped,
                report.failed
            );
        }

        BuildResult {
            reports,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.layout.dest.clone(),
        }
    }
}
