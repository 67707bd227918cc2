//! # Philanthropy Scrape
//!
//! Collects philanthropic donation records from foundation websites and JSON
//! APIs, normalizes them into one canonical contribution schema, and tags
//! each record with the causes its text mentions.
//!
//! ## Architecture
//!
//! 1. **Producing**: a [`scrapers::ContributionSource`] fetches raw records
//! 2. **Classifying**: [`classifier::CauseClassifier`] loads the cause
//!    reference list once and infers causes from free text
//! 3. **Normalizing**: [`normalizer::Normalizer`] assembles
//!    [`models::NormalizedContribution`] records, reporting bad records
//!    individually instead of failing the batch
//! 4. **Validating**: [`validate`] checks the output contract before the
//!    records are handed downstream
//!
//! Nothing in the library performs I/O on load; callers drive every fetch.

pub mod api;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod normalizer;
pub mod outputs;
pub mod scrapers;
pub mod utils;
pub mod validate;

pub use classifier::CauseClassifier;
pub use error::{
    MalformedRecordError, NormalizeError, PipelineError, ReferenceFetchError, SourceError,
    ValidationError,
};
pub use models::{Cause, NormalizedContribution, RawRecord};
pub use normalizer::{BatchOutcome, Normalizer, SourceConfig};
