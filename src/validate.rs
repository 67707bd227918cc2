//! Structural validation of normalized contributions.
//!
//! The checks run over the serialized JSON form, which is what the
//! downstream ingestion service receives, so they also catch wrong types in
//! contributions that did not come from this crate.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::models::NormalizedContribution;

static ISO_8601_WITH_OFFSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})[+-](\d{2}):(\d{2})")
        .expect("valid datetime regex")
});

const ID_LEN: usize = 36;
const MIN_TITLE_LEN: usize = 5;
/// Images must be strictly shorter than this many characters.
pub const MAX_IMAGE_LEN: usize = 500;

impl NormalizedContribution {
    /// Check this contribution against the downstream contract.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let value = serde_json::to_value(self).map_err(|_| ValidationError::NotAnObject)?;
        validate_contribution(&value)
    }
}

/// Validate a contribution in its JSON form.
///
/// # Arguments
///
/// * `value` - A serialized contribution, as the downstream service sees it
///
/// # Returns
///
/// `Ok(())` if every rule holds, otherwise the first [`ValidationError`] found.
pub fn validate_contribution(value: &Value) -> Result<(), ValidationError> {
    let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;

    let kind = required_str(obj, "type")?;
    if kind != "donation" {
        return Err(ValidationError::WrongConstant {
            field: "type",
            expected: "donation",
            found: kind.to_string(),
        });
    }

    let title = required_str(obj, "title")?;
    let title_len = title.chars().count();
    if title_len < MIN_TITLE_LEN {
        return Err(ValidationError::TitleTooShort(title_len));
    }

    check_identifier(required_str(obj, "billionaire")?, "billionaire")?;

    let date = required_str(obj, "date_of_investment")?;
    if !ISO_8601_WITH_OFFSET.is_match(date) {
        return Err(ValidationError::BadDate(date.to_string()));
    }

    let amount = required(obj, "amount")?
        .as_f64()
        .ok_or(ValidationError::WrongType {
            field: "amount",
            expected: "a number",
        })?;
    if amount <= 1.0 {
        return Err(ValidationError::AmountTooSmall(amount));
    }

    if !required(obj, "amount_is_estimate")?.is_boolean() {
        return Err(ValidationError::WrongType {
            field: "amount_is_estimate",
            expected: "a boolean",
        });
    }

    if let Some(causes) = optional(obj, "related_causes") {
        let all_strings = causes
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string));
        if !all_strings {
            return Err(ValidationError::WrongType {
                field: "related_causes",
                expected: "an array of strings",
            });
        }
    }

    let score = required(obj, "impact_score")?
        .as_i64()
        .ok_or(ValidationError::WrongType {
            field: "impact_score",
            expected: "an integer",
        })?;
    if !(0..=5).contains(&score) {
        return Err(ValidationError::ImpactScoreOutOfRange(score));
    }

    let urls = required(obj, "source_urls")?
        .as_array()
        .ok_or(ValidationError::WrongType {
            field: "source_urls",
            expected: "an array of strings",
        })?;
    if urls.is_empty() {
        return Err(ValidationError::EmptySourceUrls);
    }
    for url in urls {
        let url = url.as_str().ok_or(ValidationError::WrongType {
            field: "source_urls",
            expected: "an array of strings",
        })?;
        if !url.contains("http") || !url.contains("://") {
            return Err(ValidationError::BadSourceUrl(url.to_string()));
        }
    }

    if let Some(description) = optional(obj, "description") {
        if !description.is_string() {
            return Err(ValidationError::WrongType {
                field: "description",
                expected: "a string",
            });
        }
    }

    if let Some(image) = optional(obj, "image") {
        let image = image.as_str().ok_or(ValidationError::WrongType {
            field: "image",
            expected: "a string",
        })?;
        let len = image.chars().count();
        if len >= MAX_IMAGE_LEN {
            return Err(ValidationError::ImageTooLong(len));
        }
    }

    if let Some(foundation) = optional(obj, "philanthropic_foundation") {
        let foundation = foundation.as_str().ok_or(ValidationError::WrongType {
            field: "philanthropic_foundation",
            expected: "a string",
        })?;
        check_identifier(foundation, "philanthropic_foundation")?;
    }

    Ok(())
}

fn required<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, ValidationError> {
    optional(obj, field).ok_or(ValidationError::MissingField(field))
}

/// Present and not null.
fn optional<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    obj.get(field).filter(|v| !v.is_null())
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, ValidationError> {
    required(obj, field)?
        .as_str()
        .ok_or(ValidationError::WrongType {
            field,
            expected: "a string",
        })
}

fn check_identifier(id: &str, field: &'static str) -> Result<(), ValidationError> {
    let len = id.chars().count();
    if len != ID_LEN {
        return Err(ValidationError::BadIdentifier { field, len });
    }
    Ok(())
}
