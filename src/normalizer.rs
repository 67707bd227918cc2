//! Raw record to [`NormalizedContribution`] transformation.
//!
//! One shared [`Normalizer`] serves every producer. What differs between
//! sources lives in [`SourceConfig`]: the two identifiers, how to resolve the
//! record URL, and how to parse amounts and dates the producer could not.

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::api::CauseSource;
use crate::classifier::CauseClassifier;
use crate::error::{MalformedRecordError, NormalizeError, ReferenceFetchError};
use crate::models::{
    ContributionType, Currency, DEFAULT_IMPACT_SCORE, NormalizedContribution, RawAmount, RawRecord,
};
use crate::utils::{format_description, iso_datetime, parse_amount};
use crate::validate::MAX_IMAGE_LEN;

/// Records normalized at once when no concurrency is configured.
pub const DEFAULT_CONCURRENCY: usize = 12;

/// Maps a raw record URL to the absolute URL stored in `source_urls`.
pub type UrlResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;
/// Parses an amount display string into whole currency units.
pub type AmountParser = Arc<dyn Fn(&str) -> Option<i64> + Send + Sync>;
/// Parses a raw date into an ISO-8601 datetime with an explicit offset.
pub type DateParser = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Per-source normalization settings.
#[derive(Clone)]
pub struct SourceConfig {
    pub fund_id: String,
    pub billionaire_id: String,
    pub resolve_url: UrlResolver,
    pub parse_amount: AmountParser,
    pub parse_date: DateParser,
}

impl SourceConfig {
    /// Identity URL resolution, [`parse_amount`] and [`iso_datetime`].
    pub fn new(fund_id: impl Into<String>, billionaire_id: impl Into<String>) -> Self {
        Self {
            fund_id: fund_id.into(),
            billionaire_id: billionaire_id.into(),
            resolve_url: Arc::new(|raw: &str| raw.to_string()),
            parse_amount: Arc::new(parse_amount),
            parse_date: Arc::new(iso_datetime),
        }
    }

    /// Resolve relative record URLs against `base`. Absolute URLs pass
    /// through unchanged.
    pub fn with_base_url(self, base: &str) -> Self {
        let base = Url::parse(base).ok();
        self.with_url_resolver(move |raw| {
            if Url::parse(raw).is_ok() {
                return raw.to_string();
            }
            base.as_ref()
                .and_then(|b| b.join(raw).ok())
                .map(|u| u.to_string())
                .unwrap_or_else(|| raw.to_string())
        })
    }

    /// Replace URL resolution entirely.
    pub fn with_url_resolver(
        mut self,
        resolver: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        self.resolve_url = Arc::new(resolver);
        self
    }

    /// Replace the parser used for amounts given as text.
    pub fn with_amount_parser(
        mut self,
        parser: impl Fn(&str) -> Option<i64> + Send + Sync + 'static,
    ) -> Self {
        self.parse_amount = Arc::new(parser);
        self
    }

    /// Replace the parser used for raw dates.
    pub fn with_date_parser(
        mut self,
        parser: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.parse_date = Arc::new(parser);
        self
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("fund_id", &self.fund_id)
            .field("billionaire_id", &self.billionaire_id)
            .finish_non_exhaustive()
    }
}

/// A record that could not be normalized, reported instead of aborting the
/// batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    /// Position of the record in the input batch.
    pub index: usize,
    pub title: Option<String>,
    pub error: NormalizeError,
}

/// Result of normalizing a batch: successes in input order plus per-record
/// failures.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub records: Vec<NormalizedContribution>,
    pub errors: Vec<RecordFailure>,
}

impl BatchOutcome {
    /// Number of input records, successful or not.
    pub fn total(&self) -> usize {
        self.records.len() + self.errors.len()
    }
}

/// Turns raw records from one source into validated contributions.
pub struct Normalizer<'a, S> {
    classifier: &'a CauseClassifier<S>,
    config: SourceConfig,
    concurrency: usize,
}

impl<'a, S> Normalizer<'a, S>
where
    S: CauseSource,
{
    /// Create a normalizer that tags records with `classifier` and applies
    /// the source rules in `config`.
    ///
    /// # Arguments
    ///
    /// * `classifier` - Shared classifier; its reference list is loaded at most once
    /// * `config` - Identifiers and parsers for the producing source
    pub fn new(classifier: &'a CauseClassifier<S>, config: SourceConfig) -> Self {
        Self {
            classifier,
            config,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Set how many records [`Normalizer::normalize_batch`] processes at
    /// once. Values below 1 are raised to 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Normalize one record.
    ///
    /// # Arguments
    ///
    /// * `record` - Raw record from a producer; it is not modified
    ///
    /// # Returns
    ///
    /// A contribution that passes [`NormalizedContribution::validate`], or a
    /// [`NormalizeError`] naming the missing or invalid field, the broken
    /// contract rule, or the reference fetch failure.
    pub async fn normalize(
        &self,
        record: &RawRecord,
    ) -> Result<NormalizedContribution, NormalizeError> {
        let title = record
            .title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(MalformedRecordError::MissingField("title"))?;

        let amount = match &record.amount {
            None => return Err(MalformedRecordError::MissingField("amount").into()),
            Some(RawAmount::Number(n)) if n.is_finite() => n.round() as i64,
            Some(RawAmount::Number(n)) => {
                return Err(MalformedRecordError::InvalidField {
                    field: "amount",
                    reason: format!("{n} is not a finite number"),
                }
                .into());
            }
            Some(RawAmount::Text(text)) => (self.config.parse_amount)(text).ok_or_else(|| {
                MalformedRecordError::InvalidField {
                    field: "amount",
                    reason: format!("could not parse {text:?}"),
                }
            })?,
        };

        let raw_date = record
            .date
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .ok_or(MalformedRecordError::MissingField("date"))?;
        let date_of_investment =
            (self.config.parse_date)(raw_date).ok_or_else(|| MalformedRecordError::InvalidField {
                field: "date",
                reason: format!("could not parse {raw_date:?}"),
            })?;

        let raw_url = record
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(MalformedRecordError::MissingField("url"))?;

        let description = format_description(record.description.as_deref().unwrap_or_default());
        let related_causes = self.classifier.classify(&record.search_text()).await?;

        let image = record
            .thumbnail_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .and_then(|u| {
                let len = u.chars().count();
                if len < MAX_IMAGE_LEN {
                    Some(u.to_string())
                } else {
                    warn!(len, "Dropping oversized image url");
                    None
                }
            });

        let contribution = NormalizedContribution {
            kind: ContributionType::Donation,
            title: title.to_string(),
            billionaire: self.config.billionaire_id.clone(),
            date_of_investment,
            amount,
            amount_is_estimate: false,
            currency: Currency::Usd,
            related_causes,
            impact_score: DEFAULT_IMPACT_SCORE,
            source_urls: vec![(self.config.resolve_url)(raw_url)],
            organization_website: None,
            description,
            image,
            philanthropic_foundation: self.config.fund_id.clone(),
        };

        contribution.validate()?;
        debug!(title = %contribution.title, causes = ?contribution.related_causes, "Record normalized");
        Ok(contribution)
    }

    /// Normalize a batch with partial-failure semantics.
    ///
    /// The reference list is loaded up front; if that fails no record can be
    /// classified and the whole batch fails with the typed fetch error.
    /// Otherwise each record succeeds or is reported individually, and
    /// successful records keep their input order.
    ///
    /// # Returns
    ///
    /// Successful contributions plus one [`RecordFailure`] per rejected
    /// record, or the [`ReferenceFetchError`] that prevented classification.
    #[instrument(level = "info", skip_all, fields(records = records.len(), fund_id = %self.config.fund_id))]
    pub async fn normalize_batch(
        &self,
        records: Vec<RawRecord>,
    ) -> Result<BatchOutcome, ReferenceFetchError> {
        self.classifier.causes().await?;

        let results: Vec<(usize, Option<String>, Result<NormalizedContribution, NormalizeError>)> =
            stream::iter(records.into_iter().enumerate())
                .map(|(index, record)| async move {
                    let result = self.normalize(&record).await;
                    (index, record.title, result)
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut outcome = BatchOutcome::default();
        for (index, title, result) in results {
            match result {
                Ok(contribution) => outcome.records.push(contribution),
                Err(error) => {
                    warn!(index, title = ?title, error = %error, "Skipping record");
                    outcome.errors.push(RecordFailure { index, title, error });
                }
            }
        }

        info!(
            total = outcome.total(),
            successful = outcome.records.len(),
            failed = outcome.errors.len(),
            "Normalized batch"
        );
        Ok(outcome)
    }
}
