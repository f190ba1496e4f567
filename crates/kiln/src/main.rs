//! Kiln CLI - front-end asset builder with a live-reload dev server.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kiln_pipeline::BuildMode;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Compile templates, styles, scripts and images into a static site")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to kiln.toml config file
    #[arg(short, long, default_value = "kiln.toml", global = true)]
    config: PathBuf,

    /// Build mode; `production` minifies and compresses. Defaults to NODE_ENV
    #[arg(long, global = true)]
    env: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean, build, then serve with live reload (default)
    Dev {
        /// Port to listen on (defaults to config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Clean and build once
    Build,

    /// Remove generated output
    Clean,

    /// Preview built output without watching
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// Directory to serve (defaults to the configured output)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Scaffold kiln.toml and a source tree
    Init {
        /// Overwrite existing files
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let mode = BuildMode::resolve(cli.env.as_deref());

    // Execute command
    match cli.command.unwrap_or(Commands::Dev {
        port: None,
        no_open: false,
    }) {
        Commands::Dev { port, no_open } => {
            commands::dev::run(&cli.config, mode, port, !no_open).await?;
        }
        Commands::Build => {
            commands::build::run(&cli.config, mode).await?;
        }
        Commands::Clean => {
            commands::clean::run(&cli.config, mode)?;
        }
        Commands::Serve { port, dir } => {
            commands::serve::run(&cli.config, port, dir).await?;
        }
        Commands::Init { yes } => {
            commands::init::run(yes).await?;
        }
    }

    Ok(())
}
