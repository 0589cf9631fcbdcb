use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pescascore",
    version,
    about = "Fishing probability for Espírito Santo beaches"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the beach database file
    #[arg(short, long, global = true)]
    pub beaches: Option<PathBuf>,

    /// Increase log verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score a site now or at a given time
    Score {
        /// REGIÃO/Cidade/Praia, a location name ("Vitória-ES") or "lat,lon"
        site: String,

        /// Local time as "YYYY-MM-DD HH:MM" (default: now)
        #[arg(short, long)]
        at: Option<String>,
    },
    /// Project the next days for a site
    Forecast {
        site: String,

        /// Number of days, including today
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Best beaches of a region
    Rank {
        /// Region code, e.g. ES
        #[arg(default_value = "ES")]
        region: String,

        #[arg(short = 'n', long, default_value_t = 5)]
        top: usize,

        #[arg(short, long)]
        at: Option<String>,
    },
    /// Find beaches by name or city
    Search { query: String },
    /// Lunar phases for the coming days
    Moon {
        #[arg(short, long, default_value_t = 7)]
        days: u32,
    },
    /// Re-run interactive setup
    Init,
    /// Validate config and test connections
    Check,
}
