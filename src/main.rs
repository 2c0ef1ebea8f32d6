// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand, ValueEnum};
use frame_annotator::SeekPolicy;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "frame-annotator")]
#[command(about = "Frame-accurate video stills with categories and filters")]
#[command(version = frame_annotator::constants::app_info::version())]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// First frame presented at or after the timestamp
    FirstAtOrAfter,
    /// Frame closest to the timestamp
    Nearest,
}

impl From<PolicyArg> for SeekPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::FirstAtOrAfter => SeekPolicy::FirstAtOrAfter,
            PolicyArg::Nearest => SeekPolicy::Nearest,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show stream properties of a video file
    Probe {
        video: PathBuf,
    },

    /// Extract one frame, optionally filtered
    Extract {
        video: PathBuf,

        /// Timestamp in seconds
        #[arg(short, long)]
        at: f64,

        /// Frame chosen between two presentation times
        #[arg(short, long, value_enum)]
        policy: Option<PolicyArg>,

        /// Brightness offset (-255..=255)
        #[arg(long, allow_hyphen_values = true)]
        brightness: Option<f64>,

        /// Contrast gain (0..=3)
        #[arg(long)]
        contrast: Option<f64>,

        /// Apply CLAHE with this clip limit (1..=40)
        #[arg(long)]
        clahe: Option<f64>,

        /// CLAHE tile grid size
        #[arg(long, default_value = "8")]
        grid: u32,

        /// Apply gray-world white balance
        #[arg(long)]
        white_balance: bool,

        /// Output image (.png or .jpg; default: <video>_<timestamp>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Capture several frames and export them as a gallery
    Gallery {
        video: PathBuf,

        /// Timestamps in seconds, comma separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        at: Vec<f64>,

        /// Category name for every captured frame (created if missing)
        #[arg(short, long)]
        category: Option<String>,

        /// Export directory
        #[arg(short, long)]
        output: PathBuf,

        /// Also write a gallery snapshot to this file
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Manage the stored category list
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// List stored categories
    List,

    /// Add a category
    Add {
        name: String,

        /// Color as #rrggbb
        #[arg(short, long)]
        color: Option<String>,
    },

    /// Remove a category by name
    Remove {
        name: String,
    },

    /// Remove every stored category
    Reset,

    /// Write the category list to a JSON file
    Export {
        path: PathBuf,
    },

    /// Read a category list from a JSON file
    Import {
        path: PathBuf,

        /// Keep existing categories and add new names only
        #[arg(long)]
        merge: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=frame_annotator=debug, RUST_LOG=info
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
        Commands::Probe { video } => cli::probe(video),
        Commands::Extract {
            video,
            at,
            policy,
            brightness,
            contrast,
            clahe,
            grid,
            white_balance,
            output,
        } => cli::extract(cli::ExtractArgs {
            video,
            at,
            policy: policy.map(SeekPolicy::from),
            brightness,
            contrast,
            clahe: clahe.map(|clip| (clip, grid)),
            white_balance,
            output,
        }),
        Commands::Gallery {
            video,
            at,
            category,
            output,
            snapshot,
        } => cli::gallery(video, at, category, output, snapshot),
        Commands::Categories { action } => match action {
            CategoryAction::List => cli::list_categories(),
            CategoryAction::Add { name, color } => cli::add_category(&name, color.as_deref()),
            CategoryAction::Remove { name } => cli::remove_category(&name),
            CategoryAction::Reset => cli::reset_categories(),
            CategoryAction::Export { path } => cli::export_categories(&path),
            CategoryAction::Import { path, merge } => cli::import_categories(&path, merge),
        },
    }
}
