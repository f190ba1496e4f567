//! Removal of previous build output.
//!
//! Only the configured clean targets are touched: `*.html` files below the
//! document root and the generated asset directories. Images and anything
//! else in the output directory survive.

use std::fs;
use std::path::PathBuf;

use walkdir::WalkDir;

use crate::layout::{CleanTarget, Layout};
use crate::notifier::Notifier;

/// Paths removed by one clean run.
#[derive(Debug, Default)]
pub struct CleanReport {
    pub removed: Vec<PathBuf>,
    pub failed: usize,
}

pub fn clean(layout: &Layout, notifier: &Notifier) -> CleanReport {
    let mut report = CleanReport::default();

    for target in layout.clean_targets() {
        match target {
            CleanTarget::HtmlUnder(root) => {
                if !root.exists() {
                    continue;
                }
                let html_files = WalkDir::new(&root)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|p| p.extension().is_some_and(|ext| ext == "html"));

                for path in html_files {
                    match fs::remove_file(&path) {
                        Ok(()) => report.removed.push(path),
                        Err(e) => {
                            notifier.report("clean", &path, e);
                            report.failed += 1;
                        }
                    }
                }
            }
            CleanTarget::Dir(dir) => {
                if !dir.exists() {
                    continue;
                }
                match fs::remove_dir_all(&dir) {
                    Ok(()) => report.removed.push(dir),
                    Err(e) => {
                        notifier.report("clean", &dir, e);
                        report.failed += 1;
                    }
                }
            }
        }
    }

    tracing::debug!("Removed {} paths", report.removed.len());
    report
}
