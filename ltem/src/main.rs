//! `ltem` command-line entry point.
//!
//! Reports and protocol responses go to stdout; logs go to stderr and the
//! rolling log file.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::log_setup::setup_logging;
use ltem::{detect_file, run_lines, save_gray_png, write_report, DetectionConfig, Server};

#[derive(Parser)]
#[command(name = "ltem")]
#[command(about = "Detect compact magnetic features in Lorentz TEM frames")]
#[command(version)]
struct Cli {
    /// YAML or JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer binary protocol requests on stdin/stdout.
    Serve,

    /// Answer `path L d sigma` text requests on stdin/stdout.
    Lines,

    /// Run the full pipeline on one frame and print the cluster report.
    Detect {
        /// Input frame (.pic or any standard image format).
        image: PathBuf,

        /// Write the core/perimeter visualization as a PNG.
        #[arg(long)]
        png: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => DetectionConfig::from_file(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => DetectionConfig::default(),
    };
    setup_logging(&config.log).context("failed to initialize logging")?;

    let stdin = io::stdin();
    let stdout = io::stdout();

    match cli.command {
        Commands::Serve => {
            let mut server = Server::new(config);
            server.serve(stdin.lock(), BufWriter::new(stdout.lock()))?;
        }
        Commands::Lines => {
            let mut out = BufWriter::new(stdout.lock());
            run_lines(stdin.lock(), &mut out, &config)?;
            out.flush()?;
        }
        Commands::Detect { image, png } => {
            let report = detect_file(&image, &config)
                .with_context(|| format!("failed to process '{}'", image.display()))?;

            let mut out = BufWriter::new(stdout.lock());
            write_report(&mut out, &report.outcome.kept)?;

            if let Some(png) = png {
                save_gray_png(&report.outcome.visualization(), &png)?;
                tracing::info!(path = %png.display(), "Visualization written");
            }
        }
    }

    Ok(())
}
