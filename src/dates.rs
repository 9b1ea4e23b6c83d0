//! Lenient date decoding for persisted records.
//!
//! Stored dates have been written in several shapes over time: RFC 3339
//! strings, `dd/mm/yyyy` strings, epoch milliseconds and `{ "seconds": n }`
//! objects. All of them decode to UTC instants; writes always use RFC 3339.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse a date-like JSON value into a UTC instant
pub fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => parse_instant_str(raw),
        Value::Number(number) => {
            let millis = number.as_i64().or_else(|| number.as_f64().map(|f| f as i64))?;
            Utc.timestamp_millis_opt(millis).single()
        }
        Value::Object(map) => {
            let seconds = map.get("seconds")?.as_i64()?;
            Utc.timestamp_opt(seconds, 0).single()
        }
        _ => None,
    }
}

/// Parse a date-like string into a UTC instant
///
/// Date-only inputs are taken as local midnight.
pub fn parse_instant_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return local_to_utc(naive);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M") {
        return local_to_utc(naive);
    }

    let date = parse_date_str(raw)?;
    local_to_utc(date.and_hms_opt(0, 0, 0)?)
}

/// Parse `YYYY-MM-DD`, `dd/mm/yyyy` (optionally followed by a time), or the
/// date part of an RFC 3339 timestamp
pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }

    let head = raw.split_whitespace().next().unwrap_or(raw);
    if let Ok(date) = NaiveDate::parse_from_str(head, "%d/%m/%Y") {
        return Some(date);
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|parsed| parsed.with_timezone(&Local).date_naive())
}

fn local_to_utc(naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// Serde adapter: required instant in any supported shape
pub fn deserialize_instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_instant(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized date value: {value}")))
}

/// Serde adapter: calendar date in any supported shape
pub fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let date = match &value {
        Value::String(raw) => parse_date_str(raw),
        other => parse_instant(other).map(|instant| instant.with_timezone(&Local).date_naive()),
    };
    date.ok_or_else(|| serde::de::Error::custom(format!("unrecognized date value: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rfc3339_and_epoch_forms_agree() {
        let expected = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap();

        assert_eq!(parse_instant(&json!("2025-06-01T12:30:00Z")), Some(expected));
        assert_eq!(
            parse_instant(&json!("2025-06-01T09:30:00-03:00")),
            Some(expected)
        );
        assert_eq!(
            parse_instant(&json!(expected.timestamp_millis())),
            Some(expected)
        );
        assert_eq!(
            parse_instant(&json!({ "seconds": expected.timestamp(), "nanoseconds": 0 })),
            Some(expected)
        );
    }

    #[test]
    fn day_first_strings_are_local_dates() {
        let parsed = parse_instant(&json!("01/06/2025")).expect("parse");
        assert_eq!(
            parsed.with_timezone(&Local).date_naive(),
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
        );
        assert_eq!(
            parse_date_str("01/06/2025 14:00"),
            NaiveDate::from_ymd_opt(2025, 6, 1)
        );
    }

    #[test]
    fn unusable_values_are_rejected() {
        assert_eq!(parse_instant(&json!(null)), None);
        assert_eq!(parse_instant(&json!("")), None);
        assert_eq!(parse_instant(&json!("not a date")), None);
        assert_eq!(parse_instant(&json!({ "nanos": 5 })), None);
        assert_eq!(parse_date_str("31/02/2025"), None);
    }
}
