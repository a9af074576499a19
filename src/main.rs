// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "multiview-depth")]
#[command(about = "Dense multi-view stereo depth from calibrated cameras")]
#[command(version = multiview_depth::constants::app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List GPU adapters usable for matching
    Devices,

    /// Estimate a point field for one set of images
    Run {
        /// Stage arguments (JSON)
        #[arg(short, long)]
        args: PathBuf,

        /// One image per camera, in camera order
        #[arg(short, long = "image", required = true, num_args = 1..)]
        images: Vec<PathBuf>,

        /// Adapter index (from 'multiview-depth devices')
        #[arg(short, long, default_value = "0")]
        device: usize,

        /// Run the matcher on the host instead of the GPU
        #[arg(long)]
        host: bool,

        /// Write the raw point field (W×H×f32x4, little endian) here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=multiview_depth=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => cli::list_devices(),
        Commands::Run {
            args,
            images,
            device,
            host,
            output,
        } => cli::run(&args, &images, device, host, output.as_deref()),
    }
}
