//! mdlg CLI - Mandragore illumination catalog

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mdlg::config::{load_config, DataLayout};

mod commands;

#[derive(Parser)]
#[command(name = "mdlg")]
#[command(version)]
#[command(about = "Mandragore illumination catalog - build and query the image/scene/descriptor database")]
#[command(long_about = r#"
mdlg keeps a SQLite catalog of illuminated manuscript images, the scenes
located in them and the descriptors attached to each scene.

Example usage:
  mdlg --root ./data reset --yes
  mdlg --root ./data mandragore
  mdlg images -s localized -d 'classID==lion*' -l 20
"#)]
struct Cli {
    /// Data root holding mdlg.db and import/ (defaults to $MDLG_DATA)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Path to the config file
    #[arg(long, global = true, env = "MDLG_CONFIG", default_value = "mdlg.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete the catalog database and create an empty schema
    Reset {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Load the mandragore dumps found under <root>/import/mandragore-dumps
    Mandragore {
        /// Use the reorganized tab-separated files instead of the BnF export
        #[arg(long)]
        reorganized: bool,
    },

    /// List images matching the filters
    ///
    /// Filter format is [field==](value|pat*tern|v1,v2,...) or `localized`;
    /// the field defaults to the table key.
    Images {
        /// Filter on images
        #[arg(short, long)]
        images: Vec<String>,

        /// Filter on scenes
        #[arg(short, long)]
        scenes: Vec<String>,

        /// Filter on descriptors
        #[arg(short, long)]
        descriptors: Vec<String>,

        /// Maximum number of images
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show row counts per table
    Stats,

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = load_config(Some(&cli.config))?;
    let env_root = std::env::var_os("MDLG_DATA").map(PathBuf::from);
    let layout = DataLayout::resolve(cli.root, config.as_ref(), env_root);
    tracing::debug!("data layout: {:?}", layout);

    let result = match cli.command {
        Commands::Reset { yes } => commands::run_reset(&layout, yes),
        Commands::Mandragore { reorganized } => commands::run_mandragore(&layout, reorganized),
        Commands::Images {
            images,
            scenes,
            descriptors,
            limit,
            json,
        } => commands::run_images(&layout, &images, &scenes, &descriptors, limit, json),
        Commands::Stats => commands::run_stats(&layout),
        Commands::Version => commands::run_version(),
    };

    if let Err(e) = result {
        mdlg::ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
