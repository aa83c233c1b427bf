//! Raw field values and their conversion to stored column values.
//!
//! The item source hands the indexer a list of raw values per field; this
//! module coerces them to the field's declared type. A value that cannot be
//! converted is logged and skipped without failing the item.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rusqlite::types::Value;

use crate::config::FieldType;

/// Maximum stored length of a string value, in characters.
pub(crate) const MAX_STRING_CHARS: usize = 255;

/// Maximum length of the denormalized excerpt for fulltext fields.
pub(crate) const EXCERPT_CHARS: usize = 30;

/// A pre-tokenized word with a relevance score carried over from upstream
/// processing (e.g. markup-aware extraction that boosts headings).
#[derive(Debug, Clone, PartialEq)]
pub struct ValueToken {
    pub text: String,
    pub score: f64,
}

impl ValueToken {
    pub fn new(text: impl Into<String>, score: f64) -> Self {
        ValueToken {
            text: text.into(),
            score,
        }
    }
}

/// A raw value supplied by the item source for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    /// Pre-tokenized fulltext input with per-token scores.
    Tokens(Vec<ValueToken>),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    /// A calendar date or datetime string, parsed on conversion.
    Date(String),
    /// Seconds since the Unix epoch.
    Timestamp(i64),
}

impl FieldValue {
    /// Plain-text rendering used when a non-text value lands in a fulltext
    /// field, or for the denormalized excerpt.
    pub(crate) fn as_text(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Tokens(tokens) => tokens
                .iter()
                .map(|t| t.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Decimal(d) => d.to_string(),
            FieldValue::Boolean(b) => (if *b { "1" } else { "0" }).to_string(),
            FieldValue::Date(s) => s.clone(),
            FieldValue::Timestamp(t) => t.to_string(),
        }
    }
}

/// Convert a raw value to the column value for a field of the given type.
/// Returns `None` (after logging) when the value cannot be represented.
pub(crate) fn to_column_value(field_type: FieldType, value: &FieldValue) -> Option<Value> {
    match field_type {
        FieldType::Fulltext | FieldType::String => {
            let mut text = value.as_text();
            if text.chars().count() > MAX_STRING_CHARS {
                log::warn!(
                    "string value longer than {} characters was truncated",
                    MAX_STRING_CHARS
                );
                text = truncate_chars(&text, MAX_STRING_CHARS);
            }
            Some(Value::Text(text))
        }
        FieldType::Integer => match value {
            FieldValue::Integer(i) => Some(Value::Integer(*i)),
            FieldValue::Timestamp(t) => Some(Value::Integer(*t)),
            FieldValue::Decimal(d) => Some(Value::Integer(*d as i64)),
            FieldValue::Boolean(b) => Some(Value::Integer(i64::from(*b))),
            FieldValue::Text(s) | FieldValue::Date(s) => match s.trim().parse::<i64>() {
                Ok(i) => Some(Value::Integer(i)),
                Err(_) => {
                    log::warn!("cannot convert '{}' to an integer value", s);
                    None
                }
            },
            FieldValue::Tokens(_) => {
                log::warn!("cannot convert tokenized text to an integer value");
                None
            }
        },
        FieldType::Decimal => match value {
            FieldValue::Decimal(d) => Some(Value::Real(*d)),
            FieldValue::Integer(i) => Some(Value::Real(*i as f64)),
            FieldValue::Timestamp(t) => Some(Value::Real(*t as f64)),
            FieldValue::Boolean(b) => Some(Value::Real(if *b { 1.0 } else { 0.0 })),
            FieldValue::Text(s) | FieldValue::Date(s) => match s.trim().parse::<f64>() {
                Ok(d) => Some(Value::Real(d)),
                Err(_) => {
                    log::warn!("cannot convert '{}' to a decimal value", s);
                    None
                }
            },
            FieldValue::Tokens(_) => {
                log::warn!("cannot convert tokenized text to a decimal value");
                None
            }
        },
        FieldType::Boolean => match value {
            FieldValue::Boolean(b) => Some(Value::Integer(i64::from(*b))),
            FieldValue::Integer(i) => Some(Value::Integer(i64::from(*i != 0))),
            FieldValue::Text(s) => match s.trim() {
                "1" | "true" => Some(Value::Integer(1)),
                "0" | "false" | "" => Some(Value::Integer(0)),
                other => {
                    log::warn!("cannot convert '{}' to a boolean value", other);
                    None
                }
            },
            other => {
                log::warn!("cannot convert {:?} to a boolean value", other);
                None
            }
        },
        FieldType::Date => match value {
            FieldValue::Timestamp(t) => Some(Value::Integer(*t)),
            FieldValue::Integer(i) => Some(Value::Integer(*i)),
            FieldValue::Text(s) | FieldValue::Date(s) => match parse_date(s) {
                Some(t) => Some(Value::Integer(t)),
                None => {
                    log::warn!("cannot parse '{}' as a date", s);
                    None
                }
            },
            other => {
                log::warn!("cannot convert {:?} to a date value", other);
                None
            }
        },
    }
}

/// Parse a date string into epoch seconds.
///
/// Numeric strings are taken as epoch values directly; everything else goes
/// through the calendar parsers.
pub(crate) fn parse_date(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(t) = s.parse::<i64>() {
        return Some(t);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive).timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&naive).timestamp());
    }
    None
}

/// Truncate a string to at most `max` characters, on a character boundary.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_truncation() {
        let long = "x".repeat(300);
        let value = to_column_value(FieldType::String, &FieldValue::Text(long)).unwrap();
        match value {
            Value::Text(s) => assert_eq!(s.chars().count(), MAX_STRING_CHARS),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_boolean_conversion() {
        assert_eq!(
            to_column_value(FieldType::Boolean, &FieldValue::Boolean(true)),
            Some(Value::Integer(1))
        );
        assert_eq!(
            to_column_value(FieldType::Boolean, &FieldValue::Integer(5)),
            Some(Value::Integer(1))
        );
        assert_eq!(
            to_column_value(FieldType::Boolean, &FieldValue::Text("false".into())),
            Some(Value::Integer(0))
        );
        assert_eq!(
            to_column_value(FieldType::Boolean, &FieldValue::Text("maybe".into())),
            None
        );
    }

    #[test]
    fn test_numeric_string_parses_as_epoch() {
        assert_eq!(parse_date("1700000000"), Some(1_700_000_000));
    }

    #[test]
    fn test_calendar_date_parsing() {
        assert_eq!(parse_date("1970-01-02"), Some(86_400));
        assert_eq!(parse_date("1970-01-01 00:01:00"), Some(60));
        assert_eq!(parse_date("1970-01-01T00:00:30+00:00"), Some(30));
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn test_integer_coercion_from_string() {
        assert_eq!(
            to_column_value(FieldType::Integer, &FieldValue::Text(" 42 ".into())),
            Some(Value::Integer(42))
        );
        assert_eq!(
            to_column_value(FieldType::Integer, &FieldValue::Text("forty-two".into())),
            None
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let s = "日本語テキスト";
        assert_eq!(truncate_chars(s, 3), "日本語");
    }
}
