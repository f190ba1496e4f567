pub mod build;
pub mod clean;
pub mod dev;
pub mod init;
pub mod serve;

use std::path::Path;

use anyhow::{Context, Result};
use kiln_pipeline::{BuildMode, Pipeline, SiteConfig};

/// Load kiln.toml and set up a pipeline rooted at the working directory.
pub fn load_pipeline(config_path: &Path, mode: BuildMode) -> Result<Pipeline> {
    let config = SiteConfig::load(config_path)?;
    let root = std::env::current_dir().context("Failed to resolve working directory")?;
    Ok(Pipeline::new(&root, config, mode))
}
