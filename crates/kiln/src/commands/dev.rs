//! Development server command.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use kiln_pipeline::BuildMode;
use kiln_server::{DevServer, DevServerConfig};

/// Clean, build everything, then watch and serve.
pub async fn run(config_path: &Path, mode: BuildMode, port: Option<u16>, open: bool) -> Result<()> {
    let pipeline = Arc::new(super::load_pipeline(config_path, mode)?);

    let mut config = DevServerConfig::from(&pipeline.config().server);
    if let Some(port) = port {
        config.port = port;
    }
    config.open = config.open && open;

    let builder = Arc::clone(&pipeline);
    let result = tokio::task::spawn_blocking(move || {
        builder.clean();
        builder.build()
    })
    .await?;

    if !result.is_success() {
        tracing::warn!(
            "Initial build had {} failures; serving anyway",
            result.failed()
        );
    }

    tracing::info!("Starting development server on port {}", config.port);
    DevServer::new(config, pipeline).start().await?;

    Ok(())
}
