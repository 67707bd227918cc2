//! Raw-data producers for foundation grant databases.
//!
//! Each producer knows how to get raw records out of one foundation's site
//! and which [`SourceConfig`] turns them into contributions. Producers never
//! normalize themselves; the shared [`Normalizer`] does that.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Gates Foundation | [`gates`] | JSON search API | 12 grants per page, relative URLs |
//! | Chan Zuckerberg Initiative | [`chan_zuckerberg`] | HTML table | Amounts as display strings, year ranges as dates |
//!
//! # Common Patterns
//!
//! Each producer implements [`ContributionSource`]:
//! - `fetch_recent(limit)`: the newest `limit` raw records, for daily runs
//! - `fetch_all()`: every record the source exposes
//!
//! [`get_recent_data`] and [`get_all_data`] combine a producer with a
//! classifier and return a [`BatchOutcome`]. Nothing here runs on its own;
//! the binary or another orchestrator calls these explicitly.

use tracing::{info, instrument};

use crate::api::CauseSource;
use crate::classifier::CauseClassifier;
use crate::error::{PipelineError, SourceError};
use crate::models::RawRecord;
use crate::normalizer::{BatchOutcome, Normalizer, SourceConfig};

pub mod chan_zuckerberg;
pub mod gates;

/// Records fetched by a daily run when no limit is given.
pub const DEFAULT_RECENT_LIMIT: usize = 25;

/// A producer of raw donation records.
pub trait ContributionSource {
    /// Short, stable name used in logs and output paths.
    fn name(&self) -> &'static str;

    /// Identifiers and parsing rules for this source's records.
    fn config(&self) -> SourceConfig;

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<RawRecord>, SourceError>;

    async fn fetch_all(&self) -> Result<Vec<RawRecord>, SourceError>;
}

/// Fetch the newest `limit` records from `source` and normalize them.
///
/// # Arguments
///
/// * `source` - Producer to fetch from
/// * `classifier` - Shared classifier used to tag every record
/// * `limit` - Maximum number of raw records to fetch
/// * `concurrency` - Records normalized at once
///
/// # Returns
///
/// The batch outcome, or a [`PipelineError`] if the producer or the cause
/// reference list failed as a whole.
#[instrument(level = "info", skip_all, fields(source = source.name(), limit = limit))]
pub async fn get_recent_data<P, S>(
    source: &P,
    classifier: &CauseClassifier<S>,
    limit: usize,
    concurrency: usize,
) -> Result<BatchOutcome, PipelineError>
where
    P: ContributionSource,
    S: CauseSource,
{
    let records = source.fetch_recent(limit).await?;
    info!(count = records.len(), "Fetched recent raw records");
    normalize(source, classifier, records, concurrency).await
}

/// Fetch every record from `source` and normalize them.
///
/// Same contract as [`get_recent_data`] without the limit.
#[instrument(level = "info", skip_all, fields(source = source.name()))]
pub async fn get_all_data<P, S>(
    source: &P,
    classifier: &CauseClassifier<S>,
    concurrency: usize,
) -> Result<BatchOutcome, PipelineError>
where
    P: ContributionSource,
    S: CauseSource,
{
    let records = source.fetch_all().await?;
    info!(count = records.len(), "Fetched all raw records");
    normalize(source, classifier, records, concurrency).await
}

async fn normalize<P, S>(
    source: &P,
    classifier: &CauseClassifier<S>,
    records: Vec<RawRecord>,
    concurrency: usize,
) -> Result<BatchOutcome, PipelineError>
where
    P: ContributionSource,
    S: CauseSource,
{
    let normalizer = Normalizer::new(classifier, source.config()).with_concurrency(concurrency);
    Ok(normalizer.normalize_batch(records).await?)
}
