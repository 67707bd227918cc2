//! Chan Zuckerberg Initiative grants table scraper.
//!
//! The grants page renders every grant as a table row whose cells carry
//! `list-N` classes, each wrapping one or more `.td-searchable` spans:
//!
//! | Cell | Content |
//! |------|---------|
//! | `.list-0` | grantee, used as the title |
//! | `.list-1` | description |
//! | `.list-2` | amount (`"$1,234,567"`) then year range (`"2018 - 2020"`) |
//! | `.list-3` | topic |
//!
//! Amounts stay display strings and are parsed by the normalizer. Only a
//! year range is published, so dates use the fixed year-end convention of
//! [`year_range_to_date`]. Grants have no page of their own; every record
//! points at the grants page.

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, instrument, warn};

use crate::error::SourceError;
use crate::models::{RawAmount, RawRecord};
use crate::normalizer::SourceConfig;
use crate::utils::year_range_to_date;

use super::ContributionSource;

pub const FUND_ID: &str = "9b4a1c89-a28d-4196-aa42-5d108aff7b5d";
pub const BILLIONAIRE_ID: &str = "3b7bb5fe-04df-4ae9-af6f-9c054ecf29a8";

pub const GRANTS_URL: &str = "https://chanzuckerberg.com/grants-ventures/grants/";

#[derive(Debug, Clone)]
pub struct ChanZuckerberg {
    client: Client,
    page_url: String,
}

impl ChanZuckerberg {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            page_url: GRANTS_URL.to_string(),
        }
    }

    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = url.into();
        self
    }

    #[instrument(level = "info", skip_all, fields(url = %self.page_url))]
    async fn fetch_table(&self) -> Result<Vec<RawRecord>, SourceError> {
        let response = self
            .client
            .get(&self.page_url)
            .send()
            .await
            .map_err(|source| SourceError::Request {
                url: self.page_url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: self.page_url.clone(),
                status: status.as_u16(),
            });
        }

        let html = response.text().await.map_err(|source| SourceError::Request {
            url: self.page_url.clone(),
            source,
        })?;
        let records = parse_grants_table(&html, &self.page_url)?;
        info!(count = records.len(), "Parsed CZI grants table");
        Ok(records)
    }
}

impl Default for ChanZuckerberg {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl ContributionSource for ChanZuckerberg {
    fn name(&self) -> &'static str {
        "chan-zuckerberg"
    }

    fn config(&self) -> SourceConfig {
        SourceConfig::new(FUND_ID, BILLIONAIRE_ID).with_date_parser(year_range_to_date)
    }

    async fn fetch_recent(&self, limit: usize) -> Result<Vec<RawRecord>, SourceError> {
        let mut records = self.fetch_table().await?;
        records.truncate(limit);
        Ok(records)
    }

    async fn fetch_all(&self) -> Result<Vec<RawRecord>, SourceError> {
        self.fetch_table().await
    }
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|_| SourceError::Selector(css.to_string()))
}

/// Parse every grant row of the table. Rows without a grantee cell (the
/// header, spacer rows) are skipped.
pub fn parse_grants_table(html: &str, page_url: &str) -> Result<Vec<RawRecord>, SourceError> {
    let document = Html::parse_document(html);
    let row_selector = selector("tr")?;
    let cells: Vec<Selector> = (0..4)
        .map(|n| selector(&format!(".list-{n} .td-searchable")))
        .collect::<Result<_, _>>()?;

    let mut records = Vec::new();
    for (i, row) in document.select(&row_selector).enumerate() {
        let [grantee, description, money, topics] = [0, 1, 2, 3].map(|n| cell_texts(row, &cells[n]));

        let Some(title) = grantee.into_iter().next() else {
            continue;
        };

        let mut money = money.into_iter();
        let amount = money.next();
        let date = money.next();
        if amount.is_none() || date.is_none() {
            warn!(row = i, %title, "Grant row is missing amount or years");
        }

        records.push(RawRecord {
            title: Some(title),
            description: description.into_iter().next(),
            amount: amount.map(RawAmount::Text),
            date,
            topics: topics.into_iter().take(1).collect(),
            url: Some(page_url.to_string()),
            thumbnail_url: None,
        });
    }
    Ok(records)
}

/// Trimmed, whitespace-collapsed text of every match inside `row`.
fn cell_texts(row: ElementRef<'_>, selector: &Selector) -> Vec<String> {
    row.select(selector)
        .map(|el| el.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .collect()
}
