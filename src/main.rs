//! Scrape one foundation, normalize its grants, and emit them as JSON.
//!
//! ## Usage
//!
//! ```sh
//! philanthropy_scrape --source gates --recent 25 -o ./out/gates.json
//! ```

use std::error::Error;

use clap::Parser;
use reqwest::Client;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use philanthropy_scrape::api::{HttpCauseSource, RetrySource};
use philanthropy_scrape::classifier::CauseClassifier;
use philanthropy_scrape::cli::{Cli, SourceKind};
use philanthropy_scrape::config::{AppConfig, load_config};
use philanthropy_scrape::normalizer::BatchOutcome;
use philanthropy_scrape::outputs::json;
use philanthropy_scrape::scrapers::chan_zuckerberg::ChanZuckerberg;
use philanthropy_scrape::scrapers::gates::GatesFoundation;
use philanthropy_scrape::scrapers::{ContributionSource, get_all_data, get_recent_data};
use philanthropy_scrape::utils::truncate_for_log;

const USER_AGENT: &str = concat!("philanthropy_scrape/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = match &args.config {
        Some(path) => load_config(path).await?,
        None => AppConfig::default(),
    };
    if let Some(url) = &args.causes_url {
        config.causes_url = url.clone();
    }

    let client = Client::builder().user_agent(USER_AGENT).build()?;
    let causes = HttpCauseSource::with_client(client.clone(), config.causes_url.clone());
    let classifier = CauseClassifier::new(RetrySource::new(causes, config.retry.clone()));

    let outcome = match args.source {
        SourceKind::Gates => run(&GatesFoundation::new(client), &classifier, &args, &config).await,
        SourceKind::ChanZuckerberg => {
            run(&ChanZuckerberg::new(client), &classifier, &args, &config).await
        }
    };

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Scrape failed");
            return Err(e);
        }
    };

    for failure in &outcome.errors {
        warn!(
            index = failure.index,
            title = %truncate_for_log(failure.title.as_deref().unwrap_or("<untitled>"), 80),
            error = %failure.error,
            "Record skipped"
        );
    }

    match &args.output {
        Some(path) => json::write_records(&outcome.records, path).await?,
        None => json::print_records(&outcome.records).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        successful = outcome.records.len(),
        failed = outcome.errors.len(),
        "Execution complete"
    );
    Ok(())
}

#[instrument(level = "info", skip_all, fields(source = source.name()))]
async fn run<P, S>(
    source: &P,
    classifier: &CauseClassifier<S>,
    args: &Cli,
    config: &AppConfig,
) -> Result<BatchOutcome, Box<dyn Error>>
where
    P: ContributionSource,
    S: philanthropy_scrape::api::CauseSource,
{
    let outcome = if args.all {
        info!("Fetching all records");
        get_all_data(source, classifier, config.concurrency).await?
    } else {
        info!(limit = args.recent, "Fetching recent records");
        get_recent_data(source, classifier, args.recent, config.concurrency).await?
    };
    Ok(outcome)
}
