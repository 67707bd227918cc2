//! Data models for raw donation records and their normalized representation.
//!
//! This module defines the core data structures used throughout the crate:
//! - [`Cause`] / [`CausesEnvelope`]: the cause reference list
//! - [`RawRecord`]: loosely typed data as collected by a scraper
//! - [`NormalizedContribution`]: the canonical record handed downstream
//!
//! `NormalizedContribution` keeps the downstream JSON field names verbatim,
//! including the one camelCase field, `organizationWebsite`.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named philanthropic category from the shared reference list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Cause {
    pub name: String,
}

/// The JSON envelope returned by the causes endpoint: `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
pub struct CausesEnvelope {
    pub data: Vec<Cause>,
}

/// An amount as supplied by a producer.
///
/// API producers hand over numbers; HTML producers usually only have the
/// display string and delegate parsing to the normalizer.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

/// A source-specific, loosely structured donation record.
///
/// Every field is optional and a field of the wrong JSON type is read as
/// absent, so one odd record never fails the page it came from.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub amount: Option<RawAmount>,
    #[serde(default, deserialize_with = "lenient")]
    pub date: Option<String>,
    #[serde(default, alias = "topic", deserialize_with = "lenient_topics")]
    pub topics: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(
        default,
        rename = "thumbnailUrl",
        alias = "thumbnail_url",
        deserialize_with = "lenient"
    )]
    pub thumbnail_url: Option<String>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Accepts a single string, an array (non-string entries skipped), or
/// anything else as "no topics".
fn lenient_topics<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let topics = match Value::deserialize(deserializer)? {
        Value::String(s) => vec![s],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(topics
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

/// The kind of contribution. Only donations are collected today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionType {
    Donation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[serde(rename = "USD")]
    Usd,
}

/// Default `impact_score`: the middle of the 0..=5 scale.
pub const DEFAULT_IMPACT_SCORE: u8 = 3;

/// A single normalized donation, attributable to one billionaire and one
/// foundation, in the shape the downstream ingestion service expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedContribution {
    #[serde(rename = "type")]
    pub kind: ContributionType,
    pub title: String,
    /// 36-character billionaire identifier.
    pub billionaire: String,
    /// ISO-8601 datetime with an explicit offset.
    pub date_of_investment: String,
    /// Whole currency units.
    pub amount: i64,
    pub amount_is_estimate: bool,
    pub currency: Currency,
    pub related_causes: Vec<String>,
    pub impact_score: u8,
    pub source_urls: Vec<String>,
    #[serde(rename = "organizationWebsite")]
    pub organization_website: Option<String>,
    pub description: String,
    pub image: Option<String>,
    /// 36-character foundation identifier.
    pub philanthropic_foundation: String,
}

impl RawRecord {
    /// Title, description and topics joined into one space-separated string,
    /// skipping whatever is absent.
    pub fn search_text(&self) -> String {
        self.title
            .iter()
            .chain(self.description.iter())
            .chain(self.topics.iter())
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_record_from_gates_payload() {
        let json = r#"{
            "amount": 7517993,
            "categories": ["Global Health"],
            "date": "2020-05-18T00:00:00-05:00",
            "description": "to establish local laboratory capacity to support malaria surveillance in Tanzania.",
            "grantee": "National Institute for Medical Research",
            "thumbnailUrl": "",
            "title": "National Institute for Medical Research",
            "topics": ["Malaria"],
            "url": "/How-We-Work/Quick-Links/Grants-Database/Grants/2020/05/INV-002202",
            "year": "2020"
        }"#;

        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(
            record.title.as_deref(),
            Some("National Institute for Medical Research")
        );
        assert_eq!(record.amount, Some(RawAmount::Number(7517993.0)));
        assert_eq!(record.topics, vec!["Malaria".to_string()]);
        assert_eq!(record.thumbnail_url.as_deref(), Some(""));
    }

    #[test]
    fn test_topics_accepts_scalar_and_alias() {
        let record: RawRecord = serde_json::from_str(r#"{"topic": "Education"}"#).unwrap();
        assert_eq!(record.topics, vec!["Education".to_string()]);
    }

    #[test]
    fn test_malformed_fields_are_read_as_absent() {
        let json = r#"{
            "title": 42,
            "description": null,
            "amount": {"value": 1},
            "topics": {"nested": true},
            "url": ["not", "a", "string"]
        }"#;

        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.title, None);
        assert_eq!(record.description, None);
        assert_eq!(record.amount, None);
        assert!(record.topics.is_empty());
        assert_eq!(record.url, None);
    }

    #[test]
    fn test_topics_drop_blank_and_non_string_entries() {
        let record: RawRecord =
            serde_json::from_str(r#"{"topics": ["", "Malaria", 3, "  "]}"#).unwrap();
        assert_eq!(record.topics, vec!["Malaria".to_string()]);
    }

    #[test]
    fn test_amount_accepts_display_string() {
        let record: RawRecord = serde_json::from_str(r#"{"amount": "$1,234"}"#).unwrap();
        assert_eq!(record.amount, Some(RawAmount::Text("$1,234".to_string())));
    }

    #[test]
    fn test_search_text_skips_missing_parts() {
        let record = RawRecord {
            title: Some("Grant".to_string()),
            description: None,
            topics: vec!["Health".to_string(), "Science".to_string()],
            ..Default::default()
        };
        assert_eq!(record.search_text(), "Grant Health Science");
    }

    #[test]
    fn test_contribution_serializes_downstream_field_names() {
        let contribution = NormalizedContribution {
            kind: ContributionType::Donation,
            title: "Test grant".to_string(),
            billionaire: "31bfe210-0592-480a-9fc8-67c54e7c9c05".to_string(),
            date_of_investment: "2020-05-18T00:00:00-05:00".to_string(),
            amount: 100,
            amount_is_estimate: false,
            currency: Currency::Usd,
            related_causes: vec!["Health".to_string()],
            impact_score: DEFAULT_IMPACT_SCORE,
            source_urls: vec!["https://example.org/grant".to_string()],
            organization_website: None,
            description: "A grant.".to_string(),
            image: None,
            philanthropic_foundation: "3b7ac2c2-760f-4cc6-a71a-887fe10a052f".to_string(),
        };

        let value = serde_json::to_value(&contribution).unwrap();
        assert_eq!(value["type"], "donation");
        assert_eq!(value["currency"], "USD");
        assert!(value["organizationWebsite"].is_null());
        assert!(value.get("kind").is_none());
    }

    #[test]
    fn test_causes_envelope_ignores_extra_fields() {
        let json = r#"{"data": [{"id": 1, "name": "Health", "slug": "health"}]}"#;
        let envelope: CausesEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.data, vec![Cause { name: "Health".to_string() }]);
    }
}
