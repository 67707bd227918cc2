//! Gates Foundation grants database scraper.
//!
//! The committed-grants database on gatesfoundation.org is backed by a JSON
//! search endpoint. Each POST returns one page of twelve grants, newest
//! first:
//!
//! ```text
//! { "results": [ { "title": ..., "description": ..., "amount": 7517993,
//!                  "date": "2020-05-18T00:00:00-05:00", "topics": ["Malaria"],
//!                  "url": "/How-We-Work/...", "thumbnailUrl": "" }, ... ] }
//! ```
//!
//! Grant URLs are site-relative and get resolved against [`BASE_URL`].

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::error::SourceError;
use crate::models::RawRecord;
use crate::normalizer::SourceConfig;

use super::ContributionSource;

pub const FUND_ID: &str = "3b7ac2c2-760f-4cc6-a71a-887fe10a052f";
pub const BILLIONAIRE_ID: &str = "31bfe210-0592-480a-9fc8-67c54e7c9c05";

pub const BASE_URL: &str = "https://www.gatesfoundation.org";
pub const SEARCH_URL: &str = "https://www.gatesfoundation.org/services/gfo/search.ashx";

pub const RESULTS_PER_PAGE: usize = 12;
/// 21,846 grants at the default page size as of June 2020.
pub const TOTAL_PAGES: u32 = 1814;

#[derive(Debug, Clone)]
pub struct GatesFoundation {
    client: Client,
    search_url: String,
    total_pages: u32,
}

impl GatesFoundation {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            search_url: SEARCH_URL.to_string(),
            total_pages: TOTAL_PAGES,
        }
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    pub fn with_total_pages(mut self, pages: u32) -> Self {
        self.total_pages = pages;
        self
    }

    /// Fetch one page (1-based) of grants.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_page(&self, page: u32) -> Result<Vec<RawRecord>, SourceError> {
        let response = self
            .client
            .post(&self.search_url)
            .header(CONTENT_TYPE, "application/json")
            .body(search_query(page).to_string())
            .send()
            .await
            .map_err(|source| SourceError::Request {
                url: self.search_url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: self.search_url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| SourceError::Request {
            url: self.search_url.clone(),
            source,
        })?;
        let records = parse_results(&body, &self.search_url)?;
        debug!(count = records.len(), "Parsed Gates Foundation page");
        Ok(records)
    }

    async fn collect_pages(
        &self,
        last: u32,
        limit: Option<usize>,
    ) -> Result<Vec<RawRecord>, SourceError> {
        walk_pages(last, limit, |page| self.fetch_page(page)).await
    }
}

/// Walk pages `1..=last` until `limit` records are collected or a page comes
/// back empty.
///
/// A failing first page is an error; later failures are logged and skipped
/// so earlier pages are not lost.
///
/// # Arguments
///
/// * `last` - Highest page number to request
/// * `limit` - Stop once this many records are collected (`None` for all)
/// * `fetch` - Fetches one 1-based page
///
/// # Returns
///
/// At most `limit` records, in page order.
pub async fn walk_pages<F, Fut>(
    last: u32,
    limit: Option<usize>,
    mut fetch: F,
) -> Result<Vec<RawRecord>, SourceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<RawRecord>, SourceError>>,
{
    let mut records = Vec::new();

    for page in 1..=last {
        match fetch(page).await {
            Ok(batch) if batch.is_empty() => {
                info!(page, "Reached end of Gates Foundation results");
                break;
            }
            Ok(batch) => records.extend(batch),
            Err(e) if page == 1 => return Err(e),
            Err(e) => {
                warn!(page, error = %e, "Gates Foundation page failed; skipping");
            }
        }

        if limit.is_some_and(|limit| records.len() >= limit) {
            break;
        }
    }

    if let Some(limit) = limit {
        records.truncate(limit);
    }
    Ok(records)
}

impl Default for GatesFoundation {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl ContributionSource for GatesFoundation {
    fn name(&self) -> &'static str {
        "gates-foundation"
    }

    fn config(&self) -> SourceConfig {
        SourceConfig::new(FUND_ID, BILLIONAIRE_ID).with_base_url(BASE_URL)
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<RawRecord>, SourceError> {
        let pages = limit.div_ceil(RESULTS_PER_PAGE).max(1) as u32;
        self.collect_pages(pages.min(self.total_pages), Some(limit))
            .await
    }

    async fn fetch_all(&self) -> Result<Vec<RawRecord>, SourceError> {
        self.collect_pages(self.total_pages, None).await
    }
}

/// The search request body for one page of grants, newest first.
pub fn search_query(page: u32) -> Value {
    json!({
        "facetsToRender": [
            "gfocategories",
            "gfotopics",
            "gfoyear",
            "gforegions",
            "gfothumbnailurl",
            "gfograntee_website"
        ],
        "fieldQueries": "(@gfomediatype==\"Grant\")",
        "freeTextQuery": "",
        "page": page.max(1),
        "resultsPerPage": RESULTS_PER_PAGE.to_string(),
        "sortBy": "gfodate",
        "sortDirection": "desc"
    })
}

/// Extract raw records from a search response. Entries that are not JSON
/// objects are skipped; odd fields inside an entry are read as absent.
pub fn parse_results(body: &str, url: &str) -> Result<Vec<RawRecord>, SourceError> {
    let value: Value = serde_json::from_str(body).map_err(|e| SourceError::Parse {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let results = match value.get("results") {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(_) => {
            return Err(SourceError::Parse {
                url: url.to_string(),
                reason: "`results` is not an array".to_string(),
            });
        }
    };

    Ok(results
        .iter()
        .enumerate()
        .filter_map(|(i, item)| {
            if !item.is_object() {
                warn!(index = i, "Skipping non-object search result");
                return None;
            }
            serde_json::from_value(item.clone()).ok()
        })
        .collect())
}
