//! Clean command.

use std::path::Path;

use anyhow::Result;
use kiln_pipeline::BuildMode;

/// Remove generated output.
pub fn run(config_path: &Path, mode: BuildMode) -> Result<()> {
    let pipeline = super::load_pipeline(config_path, mode)?;
    let report = pipeline.clean();

    for path in &report.removed {
        tracing::debug!("Removed {}", path.display());
    }
    tracing::info!("Removed {} paths", report.removed.len());

    if report.failed > 0 {
        anyhow::bail!("Could not remove {} paths", report.failed);
    }
    Ok(())
}
