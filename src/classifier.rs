//! Cause inference from free text.
//!
//! [`CauseClassifier`] owns a lazily loaded copy of the cause reference list
//! and tags text with the causes it mentions, in two explicit passes:
//!
//! 1. **Expansion**: [`SynonymLexicon::infer`] maps trigger keywords found in
//!    the text to canonical cause names ("malaria" implies "health").
//! 2. **Matching**: a known cause matches when its name occurs in the text or
//!    in one of the inferred canonical names.
//!
//! # Reference cache
//!
//! The list is fetched on first use and cached for the lifetime of the
//! classifier. Loading is single-flight: the first caller fetches while
//! holding the cache lock, callers arriving meanwhile wait for that fetch and
//! reuse its outcome. A failed fetch is handed to the callers that waited on
//! it but is never cached, so a later call fetches again.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use itertools::Itertools;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::api::CauseSource;
use crate::error::ReferenceFetchError;
use crate::models::Cause;

/// Fixed mapping from canonical cause name to trigger keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymLexicon {
    entries: Vec<(String, Vec<String>)>,
}

impl SynonymLexicon {
    /// Build a lexicon from `(cause, triggers)` pairs. Names and triggers are
    /// lowercased; blank ones are dropped so they cannot match everything.
    pub fn new<I, C, T, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (C, T)>,
        C: AsRef<str>,
        T: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .filter_map(|(cause, triggers)| {
                let cause = cause.as_ref().trim().to_lowercase();
                let triggers: Vec<String> = triggers
                    .into_iter()
                    .map(|t| t.as_ref().trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect();
                (!cause.is_empty() && !triggers.is_empty()).then_some((cause, triggers))
            })
            .collect();
        Self { entries }
    }

    /// A lexicon with no entries; only direct name matches apply.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Canonical cause names whose triggers occur in `lowered`, which must
    /// already be lowercase.
    pub fn infer(&self, lowered: &str) -> BTreeSet<&str> {
        self.entries
            .iter()
            .filter(|(_, triggers)| triggers.iter().any(|t| lowered.contains(t.as_str())))
            .map(|(cause, _)| cause.as_str())
            .collect()
    }

    /// Number of canonical causes with at least one trigger.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SynonymLexicon {
    fn default() -> Self {
        Self::new([
            (
                "health",
                vec!["malaria", "pathogen", "vaccine", "medical", "pneumonia"],
            ),
            ("technology", vec!["innovation"]),
            ("housing", vec!["apartment"]),
            ("science", vec!["laboratory", "scientific", "genetic"]),
            ("food", vec!["farmer", "agriculture", "agricultural"]),
            ("public services", vec!["sanitation"]),
            ("covid-19", vec!["sars2-cov2"]),
        ])
    }
}

enum CacheState {
    Empty,
    Ready(Arc<Vec<Cause>>),
    Failed(ReferenceFetchError),
}

/// Tags text with known causes. See the module docs for cache semantics.
pub struct CauseClassifier<S> {
    source: S,
    lexicon: SynonymLexicon,
    cache: Mutex<CacheState>,
    /// Completed fetches, successful or not.
    fetches: AtomicUsize,
}

impl<S> CauseClassifier<S>
where
    S: CauseSource,
{
    /// Create a classifier over `source` with the default synonym lexicon.
    /// Nothing is fetched until the first call that needs the reference list.
    pub fn new(source: S) -> Self {
        Self::with_lexicon(source, SynonymLexicon::default())
    }

    /// Create a classifier with a custom synonym lexicon.
    pub fn with_lexicon(source: S, lexicon: SynonymLexicon) -> Self {
        Self {
            source,
            lexicon,
            cache: Mutex::new(CacheState::Empty),
            fetches: AtomicUsize::new(0),
        }
    }

    /// The underlying reference source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Whether the reference list has been loaded successfully.
    pub async fn is_warm(&self) -> bool {
        matches!(*self.cache.lock().await, CacheState::Ready(_))
    }

    /// The cached reference list, fetching it if needed.
    ///
    /// # Returns
    ///
    /// The shared list, or the error of the fetch this call waited on.
    pub async fn causes(&self) -> Result<Arc<Vec<Cause>>, ReferenceFetchError> {
        let seen = self.fetches.load(Ordering::Acquire);
        let mut state = self.cache.lock().await;

        match &*state {
            CacheState::Ready(causes) => return Ok(Arc::clone(causes)),
            // A fetch finished while we were queued on the lock: share its
            // outcome instead of hammering the endpoint again.
            CacheState::Failed(e) if self.fetches.load(Ordering::Acquire) > seen => {
                return Err(e.clone());
            }
            _ => {}
        }

        let result = self.source.fetch_causes().await;
        self.fetches.fetch_add(1, Ordering::Release);

        match result {
            Ok(causes) => {
                info!(count = causes.len(), "Cause reference list cached");
                let causes = Arc::new(causes);
                *state = CacheState::Ready(Arc::clone(&causes));
                Ok(causes)
            }
            Err(e) => {
                warn!(error = %e, "Cause reference list unavailable");
                *state = CacheState::Failed(e.clone());
                Err(e)
            }
        }
    }

    /// Names of the known causes mentioned by `text`.
    ///
    /// # Arguments
    ///
    /// * `text` - Free text; case is ignored
    ///
    /// # Returns
    ///
    /// Matching cause names as spelled in the reference list, in list order
    /// and without duplicates. Empty text yields an empty list. Fails only if
    /// the reference list cannot be loaded.
    #[instrument(level = "debug", skip_all, fields(text_len = text.len()))]
    pub async fn classify(&self, text: &str) -> Result<Vec<String>, ReferenceFetchError> {
        let causes = self.causes().await?;
        let matched = match_causes(&causes, &self.lexicon, text);
        debug!(matched = ?matched, "Classified text");
        Ok(matched)
    }
}

/// The pure part of classification, usable with any reference list.
pub fn match_causes(causes: &[Cause], lexicon: &SynonymLexicon, text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    if lowered.trim().is_empty() {
        return Vec::new();
    }
    let inferred = lexicon.infer(&lowered);

    causes
        .iter()
        .filter(|cause| {
            let name = cause.name.trim().to_lowercase();
            !name.is_empty()
                && (lowered.contains(&name) || inferred.iter().any(|c| c.contains(&name)))
        })
        .map(|cause| cause.name.clone())
        .unique()
        .collect()
}
