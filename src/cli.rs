//! Command-line interface definitions for the scrape binary.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! The causes endpoint can also be provided via an environment variable.

use clap::{Parser, ValueEnum};

use crate::scrapers::DEFAULT_RECENT_LIMIT;

/// Foundations with a built-in scraper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Gates Foundation grants database (JSON API)
    Gates,
    /// Chan Zuckerberg Initiative grants table (HTML)
    ChanZuckerberg,
}

/// Command-line arguments for a single scrape run.
///
/// # Examples
///
/// ```sh
/// # Daily run: newest 25 Gates Foundation grants to stdout
/// philanthropy_scrape --source gates
///
/// # Full CZI backfill into a file
/// philanthropy_scrape --source chan-zuckerberg --all -o czi.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Which foundation to scrape
    #[arg(short, long, value_enum)]
    pub source: SourceKind,

    /// Number of newest records to fetch
    #[arg(short, long, default_value_t = DEFAULT_RECENT_LIMIT, conflicts_with = "all")]
    pub recent: usize,

    /// Fetch every record the source exposes instead of the newest ones
    #[arg(long)]
    pub all: bool,

    /// Optional path to a config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Cause reference endpoint (overrides the config file)
    #[arg(long, env = "CAUSES_URL")]
    pub causes_url: Option<String>,

    /// Write normalized records to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,
}
