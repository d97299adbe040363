// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use field_capture::backends::camera::Facing;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "field-capture")]
#[command(about = "Capture and ingest media for field reports")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Configuration file (default: ~/.config/field-capture/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    Cameras {
        /// Image served as the virtual camera feed
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Validate, resize and stage files for a report
    Ingest {
        /// Files to add, in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Mark files as dropped rather than picked
        #[arg(long)]
        dropped: bool,

        /// JSON list of images already on the report
        #[arg(long)]
        existing: Option<PathBuf>,
    },

    /// Run a capture session and stage the result
    Capture {
        /// Number of stills to take
        #[arg(short, long, default_value = "1")]
        photos: usize,

        /// Record a video of this many seconds
        #[arg(short, long)]
        video_secs: Option<u64>,

        /// Camera to use (back or front)
        #[arg(short, long, default_value = "back")]
        facing: Facing,

        /// Turn the torch on before capturing
        #[arg(long)]
        torch: bool,

        /// Image served as the virtual camera feed
        #[arg(long)]
        source: Option<PathBuf>,
    },

    /// Show the configuration, or write the defaults
    Config {
        /// Write the default configuration to the config path
        #[arg(long)]
        write_defaults: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=field_capture=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let config = cli::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Cameras { source } => cli::list_cameras(source),
        Commands::Ingest {
            files,
            dropped,
            existing,
        } => cli::ingest_files(&config, files, dropped, existing),
        Commands::Capture {
            photos,
            video_secs,
            facing,
            torch,
            source,
        } => cli::capture(
            &config,
            cli::CaptureRequest {
                photos,
                video_secs,
                facing,
                torch,
                source,
            },
        ),
        Commands::Config { write_defaults } => {
            cli::show_config(&config, cli.config.as_deref(), write_defaults)
        }
    }
}
