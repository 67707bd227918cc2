//! Error types for the normalization pipeline.
//!
//! The taxonomy mirrors the three ways a scrape can go wrong:
//! - [`ReferenceFetchError`]: the cause reference list could not be loaded
//! - [`MalformedRecordError`]: a raw record is unusable as input
//! - [`ValidationError`]: an assembled contribution breaks the output contract
//!
//! [`NormalizeError`], [`SourceError`] and [`PipelineError`] wrap these at the
//! per-record, per-producer and per-batch level respectively.

use std::time::Duration;

use thiserror::Error;

/// Failure to load the cause reference list.
///
/// Payloads are kept as plain strings so the error is `Clone`: one failed
/// fetch is handed to every caller that was waiting on it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReferenceFetchError {
    #[error("cause reference request failed: {0}")]
    Request(String),
    #[error("cause reference endpoint returned HTTP {status}")]
    Status { status: u16 },
    #[error("cause reference response has an unexpected shape: {0}")]
    Shape(String),
    #[error("cause reference request timed out after {0:?}")]
    Timeout(Duration),
    #[error("cause reference fetch gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        last: Box<ReferenceFetchError>,
    },
}

impl ReferenceFetchError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Transport failures, timeouts, server errors (5xx) and rate limiting
    /// (429) are transient. Other statuses such as 401 or 404 will not change
    /// on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(_) | Self::Timeout(_) => true,
            Self::Status { status } => *status >= 500 || *status == 429,
            Self::Shape(_) | Self::Exhausted { .. } => false,
        }
    }
}

/// A raw record that cannot be turned into a contribution.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MalformedRecordError {
    #[error("record is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("record field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// A contribution that does not satisfy the downstream output contract.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("contribution is not a JSON object")]
    NotAnObject,
    #[error("contribution is missing field `{0}`")]
    MissingField(&'static str),
    #[error("field `{field}` should be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("field `{field}` should be {expected:?}, found {found:?}")]
    WrongConstant {
        field: &'static str,
        expected: &'static str,
        found: String,
    },
    #[error("title must be longer than 4 characters, got {0}")]
    TitleTooShort(usize),
    #[error("identifier `{field}` must be 36 characters, got {len}")]
    BadIdentifier { field: &'static str, len: usize },
    #[error("date_of_investment {0:?} is not ISO-8601 with an explicit offset")]
    BadDate(String),
    #[error("amount must be greater than 1, got {0}")]
    AmountTooSmall(f64),
    #[error("impact_score must be within 0..=5, got {0}")]
    ImpactScoreOutOfRange(i64),
    #[error("source_urls must not be empty")]
    EmptySourceUrls,
    #[error("source url {0:?} is not absolute")]
    BadSourceUrl(String),
    #[error("image url must be shorter than 500 characters, got {0}")]
    ImageTooLong(usize),
}

/// Per-record failure of [`crate::normalizer::Normalizer::normalize`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum NormalizeError {
    #[error(transparent)]
    Malformed(#[from] MalformedRecordError),
    #[error("normalized contribution failed validation: {0}")]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Reference(#[from] ReferenceFetchError),
}

/// Failure of a raw-data producer.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not parse response from {url}: {reason}")]
    Parse { url: String, reason: String },
    #[error("invalid selector {0:?}")]
    Selector(String),
}

/// Failure of a whole batch run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Reference(#[from] ReferenceFetchError),
}
