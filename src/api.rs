//! Cause reference list retrieval with timeout and exponential backoff.
//!
//! This module provides the classifier's view of the external causes
//! endpoint. It follows a trait-based design:
//! - [`CauseSource`]: core trait, "give me the current list of causes"
//! - [`HttpCauseSource`]: GETs the JSON envelope `{ "data": [...] }`
//! - [`RetrySource`]: decorator adding a per-attempt timeout and retries
//!
//! # Retry Strategy
//!
//! - Only transient failures are retried (transport, 5xx or 429, timeout)
//! - Exponential backoff starting at `base_delay`, capped at `max_delay`
//! - Random jitter (0..=`jitter`) added to prevent thundering herd
//! - Exhaustion surfaces as [`ReferenceFetchError::Exhausted`]

use std::fmt;
use std::time::{Duration as StdDuration, Instant};

use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};
use tracing::{error, info, instrument, warn};

use crate::error::ReferenceFetchError;
use crate::models::{Cause, CausesEnvelope};
use crate::utils::truncate_for_log;

/// Default location of the shared cause reference list.
pub const DEFAULT_CAUSES_URL: &str = "https://api.silobase.com/data/billionaireboard/causes";

/// Anything that can produce the cause reference list.
///
/// An empty `Ok` list means "no causes exist"; failures are always `Err`.
pub trait CauseSource {
    async fn fetch_causes(&self) -> Result<Vec<Cause>, ReferenceFetchError>;
}

/// Fetches causes over HTTP from a JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpCauseSource {
    client: Client,
    url: String,
}

impl HttpCauseSource {
    /// Create a source for `url` with a default [`Client`].
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), url)
    }

    /// Create a source for `url` that shares an existing [`Client`], so its
    /// connection pool and user agent are reused.
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl Default for HttpCauseSource {
    fn default() -> Self {
        Self::new(DEFAULT_CAUSES_URL)
    }
}

impl CauseSource for HttpCauseSource {
    #[instrument(level = "info", skip_all, fields(url = %self.url))]
    async fn fetch_causes(&self) -> Result<Vec<Cause>, ReferenceFetchError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ReferenceFetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReferenceFetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ReferenceFetchError::Request(e.to_string()))?;
        let causes = parse_causes(&body)?;
        info!(count = causes.len(), "Fetched cause reference list");
        Ok(causes)
    }
}

/// Parse the causes endpoint body.
///
/// # Arguments
///
/// * `body` - Raw response text, expected to be `{ "data": [{ "name": ... }] }`
///
/// # Returns
///
/// The causes in endpoint order. A missing or null `data` field is a
/// [`ReferenceFetchError::Shape`]; an empty array is a valid answer.
pub fn parse_causes(body: &str) -> Result<Vec<Cause>, ReferenceFetchError> {
    serde_json::from_str::<CausesEnvelope>(body)
        .map(|envelope| envelope.data)
        .map_err(|e| {
            ReferenceFetchError::Shape(format!("{e}; body: {}", truncate_for_log(body, 200)))
        })
}

/// Timeout and backoff parameters for [`RetrySource`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    /// Upper bound on a single attempt.
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_ms: 250,
            timeout_ms: 20_000,
        }
    }
}

impl RetryPolicy {
    /// Upper bound on a single attempt.
    pub fn timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.timeout_ms)
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    ///
    /// ```text
    /// delay = min(base_delay * 2^(attempt-1), max_delay)
    /// ```
    pub fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = attempt.saturating_sub(1).min(31) as u32;
        let delay = StdDuration::from_millis(self.base_delay_ms).saturating_mul(1 << shift);
        delay.min(StdDuration::from_millis(self.max_delay_ms))
    }
}

/// Wrapper that adds a per-attempt timeout and retry with exponential
/// backoff to any [`CauseSource`].
pub struct RetrySource<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetrySource<S>
where
    S: CauseSource,
{
    /// Wrap `inner` so every fetch follows `policy`.
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

impl<S> fmt::Debug for RetrySource<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySource")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<S> CauseSource for RetrySource<S>
where
    S: CauseSource,
{
    #[instrument(level = "info", skip_all)]
    async fn fetch_causes(&self) -> Result<Vec<Cause>, ReferenceFetchError> {
        let total_t0 = Instant::now();
        let limit = self.policy.timeout();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            let result = match timeout(limit, self.inner.fetch_causes()).await {
                Ok(result) => result,
                Err(_) => Err(ReferenceFetchError::Timeout(limit)),
            };

            let e = match result {
                Ok(causes) => return Ok(causes),
                Err(e) => e,
            };

            attempt += 1;
            let attempt_dt = attempt_t0.elapsed();
            let total_dt = total_t0.elapsed();

            if !e.is_transient() {
                error!(attempt, error = %e, "cause fetch failed permanently");
                return Err(e);
            }

            if attempt > self.policy.max_retries {
                error!(
                    attempt,
                    max = self.policy.max_retries,
                    elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                    elapsed_ms_total = total_dt.as_millis() as u64,
                    error = %e,
                    "cause fetch exhausted retries"
                );
                return Err(ReferenceFetchError::Exhausted {
                    attempts: attempt,
                    last: Box::new(e),
                });
            }

            let mut delay = self.policy.backoff(attempt);
            if self.policy.jitter_ms > 0 {
                let jitter_ms: u64 = rng().random_range(0..=self.policy.jitter_ms);
                delay += StdDuration::from_millis(jitter_ms);
            }

            warn!(
                attempt,
                max = self.policy.max_retries,
                elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                elapsed_ms_total = total_dt.as_millis() as u64,
                ?delay,
                error = %e,
                "cause fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_ms: 0,
            timeout_ms: 1_000,
        }
    }

    /// Replays a scripted sequence of results, then keeps returning the last.
    struct ScriptedSource {
        script: Mutex<Vec<Result<Vec<Cause>, ReferenceFetchError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(mut script: Vec<Result<Vec<Cause>, ReferenceFetchError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl CauseSource for ScriptedSource {
        async fn fetch_causes(&self) -> Result<Vec<Cause>, ReferenceFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop().unwrap()
            } else {
                script[0].clone()
            }
        }
    }

    struct SlowSource;

    impl CauseSource for SlowSource {
        async fn fetch_causes(&self) -> Result<Vec<Cause>, ReferenceFetchError> {
            sleep(StdDuration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    fn health() -> Vec<Cause> {
        vec![Cause {
            name: "Health".to_string(),
        }]
    }

    #[test]
    fn test_parse_causes() {
        let causes = parse_causes(r#"{"data": [{"name": "Health"}, {"name": "Science"}]}"#).unwrap();
        assert_eq!(causes.len(), 2);
        assert_eq!(causes[1].name, "Science");
    }

    #[test]
    fn test_parse_causes_empty_is_ok() {
        assert!(parse_causes(r#"{"data": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_causes_missing_data_is_shape_error() {
        assert!(matches!(
            parse_causes(r#"{"error": "nope"}"#),
            Err(ReferenceFetchError::Shape(_))
        ));
        assert!(matches!(
            parse_causes(r#"{"data": null}"#),
            Err(ReferenceFetchError::Shape(_))
        ));
        assert!(matches!(
            parse_causes("<html>"),
            Err(ReferenceFetchError::Shape(_))
        ));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), StdDuration::from_secs(1));
        assert_eq!(policy.backoff(2), StdDuration::from_secs(2));
        assert_eq!(policy.backoff(4), StdDuration::from_secs(8));
        assert_eq!(policy.backoff(10), StdDuration::from_secs(30));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let inner = ScriptedSource::new(vec![
            Err(ReferenceFetchError::Status { status: 503 }),
            Err(ReferenceFetchError::Request("connection reset".into())),
            Ok(health()),
        ]);
        let source = RetrySource::new(inner, fast_policy(5));

        let causes = source.fetch_causes().await.unwrap();
        assert_eq!(causes, health());
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts_with_typed_error() {
        let inner = ScriptedSource::new(vec![Err(ReferenceFetchError::Status { status: 500 })]);
        let source = RetrySource::new(inner, fast_policy(2));

        let err = source.fetch_causes().await.unwrap_err();
        match err {
            ReferenceFetchError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(*last, ReferenceFetchError::Status { status: 500 });
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shape_errors_are_not_retried() {
        let inner = ScriptedSource::new(vec![Err(ReferenceFetchError::Shape("bad".into()))]);
        let source = RetrySource::new(inner, fast_policy(5));

        let err = source.fetch_causes().await.unwrap_err();
        assert!(matches!(err, ReferenceFetchError::Shape(_)));
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let inner = ScriptedSource::new(vec![Err(ReferenceFetchError::Status { status: 404 })]);
        let source = RetrySource::new(inner, fast_policy(5));

        let err = source.fetch_causes().await.unwrap_err();
        assert_eq!(err, ReferenceFetchError::Status { status: 404 });
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_distinct_error() {
        let policy = RetryPolicy {
            timeout_ms: 10,
            ..fast_policy(0)
        };
        let source = RetrySource::new(SlowSource, policy);

        let err = source.fetch_causes().await.unwrap_err();
        match err {
            ReferenceFetchError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 1);
                assert_eq!(*last, ReferenceFetchError::Timeout(StdDuration::from_millis(10)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
