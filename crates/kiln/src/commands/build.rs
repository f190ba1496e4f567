//! One-shot build command.

use std::path::Path;

use anyhow::Result;
use kiln_pipeline::BuildMode;

/// Run the build command.
pub async fn run(config_path: &Path, mode: BuildMode) -> Result<()> {
    let pipeline = super::load_pipeline(config_path, mode)?;

    let cleaned = pipeline.clean();
    tracing::debug!("Cleaned {} paths", cleaned.removed.len());

    let result = tokio::task::spawn_blocking(move || pipeline.build()).await?;

    tracing::info!(
        "Wrote {} files in {}ms",
        result.written(),
        result.duration_ms
    );
    tracing::info!("Output: {}", result.output_dir.display());

    if !result.is_success() {
        anyhow::bail!("Build finished with {} failed files", result.failed());
    }

    Ok(())
}
