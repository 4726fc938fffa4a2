use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use encore::{DiskStorage, Site};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(version, about = "Build and serve a band site.")]
struct Args {
    /// The site root, holding `encore.toml` and the source directory.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site into the output directory.
    Build {
        /// Minify HTML and CSS, regardless of `encore.toml`.
        #[arg(long)]
        minify: bool,
    },

    /// Serve the site from memory, rebuilding on changes.
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the upcoming gigs as JSON.
    Gigs,
}

fn init_logging() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set up logging")?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let args = Args::parse();
    let root = fs::canonicalize(&args.root)
        .with_context(|| format!("site root '{}' not found", args.root.display()))?;
    let mut site = Site::load(&root)?;

    match args.command {
        Command::Build { minify } => {
            if minify {
                site.set_minify(true);
            }

            let storage = DiskStorage::new(site.output_path().to_owned());
            let report = site.build(&storage, Utc::now())?;

            info!(
                pages = report.pages,
                stylesheets = report.stylesheets,
                assets = report.assets,
                gigs = report.gigs,
                "built site into {}",
                site.output_path().display()
            );
        }
        Command::Serve { port } => {
            if let Some(port) = port {
                site.set_port(port);
            }

            site.serve().await?;
        }
        Command::Gigs => {
            let gigs = site.try_gigs(Utc::now())?;

            println!("{}", serde_json::to_string_pretty(&gigs)?);
        }
    }

    Ok(())
}
