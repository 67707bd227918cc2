//! Text and value helpers shared by the normalizer and the scrapers.
//!
//! - Description formatting (sentence capitalization, trailing period)
//! - Amount parsing from display strings such as `"$1,234,567"`
//! - Date helpers: RFC 3339 passthrough and the year-range convention
//! - String truncation for logging

use chrono::{DateTime, SecondsFormat};
use once_cell::sync::Lazy;
use regex::Regex;

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("valid year regex"));

/// Fixed time-of-day used when a producer only knows the year.
const YEAR_ONLY_SUFFIX: &str = "-12-31T22:28:08+00:00";

/// Uppercase the first letter of every sentence.
///
/// A sentence starts at the beginning of the text and after `.`, `!` or `?`
/// followed by whitespace, so `3.5 million` and `e.g.x` are left alone.
/// Leading punctuation such as quotes is skipped; a sentence that starts with
/// a digit is not touched.
pub fn capitalize_sentences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_start = true;
    let mut after_terminator = false;

    for ch in text.chars() {
        if at_start && ch.is_alphanumeric() {
            out.extend(ch.to_uppercase());
            at_start = false;
            after_terminator = false;
            continue;
        }

        if matches!(ch, '.' | '!' | '?') {
            after_terminator = true;
        } else if ch.is_whitespace() {
            if after_terminator {
                at_start = true;
            }
        } else if !at_start {
            after_terminator = false;
        }
        out.push(ch);
    }
    out
}

/// Format a free-text description: trim, capitalize sentences, and make sure
/// it ends with a period. Blank input stays empty rather than becoming `"."`.
///
/// ```ignore
/// assert_eq!(format_description("hello world"), "Hello world.");
/// assert_eq!(format_description("already done."), "Already done.");
/// ```
pub fn format_description(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let mut formatted = capitalize_sentences(trimmed);
    if !formatted.ends_with('.') {
        formatted.push('.');
    }
    formatted
}

/// Parse a display amount into whole currency units.
///
/// Strips `$`, `,` and whitespace, then parses as an integer. Values with a
/// decimal part are rounded. Returns `None` for anything else.
pub fn parse_amount(display: &str) -> Option<i64> {
    let cleaned: String = display
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<i64>().ok().or_else(|| {
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v.round() as i64)
    })
}

/// Turn a coarse year or year range (`"2018 - 2020"`) into a timestamp.
///
/// This is a deliberate, lossy convention: only the first year survives and
/// the result is always `{year}-12-31T22:28:08+00:00`.
pub fn year_range_to_date(range: &str) -> Option<String> {
    YEAR
        .find(range)
        .map(|year| format!("{}{}", year.as_str(), YEAR_ONLY_SUFFIX))
}

/// Validate an RFC 3339 datetime and re-emit it with its original offset.
///
/// Fractional seconds are dropped so the output always has the
/// `YYYY-MM-DDTHH:MM:SS±HH:MM` shape the validator expects.
///
/// ```ignore
/// assert_eq!(
///     iso_datetime("2020-05-18T00:00:00-05:00").as_deref(),
///     Some("2020-05-18T00:00:00-05:00")
/// );
/// ```
pub fn iso_datetime(raw: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and byte count
/// indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_description_appends_period() {
        assert_eq!(format_description("hello world"), "Hello world.");
    }

    #[test]
    fn test_format_description_keeps_existing_period() {
        assert_eq!(format_description("already done."), "Already done.");
        assert_eq!(format_description("Already done."), "Already done.");
    }

    #[test]
    fn test_format_description_blank() {
        assert_eq!(format_description(""), "");
        assert_eq!(format_description("   "), "");
    }

    #[test]
    fn test_capitalize_sentences() {
        assert_eq!(
            capitalize_sentences("to fund research. it will help! really? yes"),
            "To fund research. It will help! Really? Yes"
        );
        assert_eq!(
            capitalize_sentences("grant of 3.5 million for vaccines"),
            "Grant of 3.5 million for vaccines"
        );
        assert_eq!(capitalize_sentences("\"quoted\" start"), "\"Quoted\" start");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234,567"), Some(1234567));
        assert_eq!(parse_amount("$ 250,000"), Some(250000));
        assert_eq!(parse_amount("1,500.60"), Some(1501));
        assert_eq!(parse_amount("$"), None);
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn test_year_range_to_date() {
        assert_eq!(
            year_range_to_date("2018 - 2020").as_deref(),
            Some("2018-12-31T22:28:08+00:00")
        );
        assert_eq!(
            year_range_to_date("2021").as_deref(),
            Some("2021-12-31T22:28:08+00:00")
        );
        assert_eq!(year_range_to_date("ongoing"), None);
    }

    #[test]
    fn test_iso_datetime() {
        assert_eq!(
            iso_datetime("2020-05-18T00:00:00-05:00").as_deref(),
            Some("2020-05-18T00:00:00-05:00")
        );
        assert_eq!(
            iso_datetime("2020-05-18T00:00:00Z").as_deref(),
            Some("2020-05-18T00:00:00+00:00")
        );
        assert_eq!(
            iso_datetime("2020-05-18T00:00:00.500-05:00").as_deref(),
            Some("2020-05-18T00:00:00-05:00")
        );
        assert_eq!(iso_datetime("May 18, 2020"), None);
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 100), "short");
        let long = "a".repeat(500);
        let result = truncate_for_log(&long, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }
}
