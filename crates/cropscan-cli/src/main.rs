//! cropscan - submit multispectral band images for crop health analysis
//!
//! Fills the upload form from command-line arguments, posts it to the
//! analysis server and prints the returned health status and result images.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cropscan_client::AnalyzeClient;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::commands::analyze::parse_key_val;
use crate::config::{FileConfig, Overrides};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "cropscan")]
#[command(author, version, about = "Crop health analysis upload CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Server URL [default: http://localhost:5000]
    #[arg(short, long, env = "CROPSCAN_SERVER")]
    server: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "CROPSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Output format [default: table]
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload band images and show the analysis result
    Analyze {
        /// File field as NAME=PATH (e.g. nir=bands/nir.tif), repeatable
        #[arg(short, long = "file", value_name = "NAME=PATH", value_parser = parse_key_val)]
        files: Vec<(String, String)>,

        /// Text field as NAME=VALUE, repeatable
        #[arg(long = "field", value_name = "NAME=VALUE", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,

        /// Download the result images into this directory
        #[arg(long)]
        save_dir: Option<PathBuf>,

        /// Form submission path on the server [default: /analyze]
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = FileConfig::discover(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            files,
            fields,
            save_dir,
            endpoint,
        } => {
            let settings = config.resolve(Overrides {
                server: cli.server,
                endpoint,
                format: cli.output,
                no_color: cli.no_color,
                save_dir,
            })?;
            debug!(
                server = %settings.client.connection.base_url,
                format = settings.format.as_str(),
                "Resolved settings"
            );
            let ctx = OutputContext::new(settings.format, settings.no_color, cli.quiet);
            let client = AnalyzeClient::with_config(settings.client)
                .context("Failed to create analysis client")?;
            commands::analyze(&client, &files, &fields, settings.save_dir.as_deref(), &ctx)
                .await?;
        }
    }

    Ok(())
}
