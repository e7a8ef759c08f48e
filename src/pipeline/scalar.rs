//! Scalar coercion and kind checks.
//!
//! `coerce_value` is total: anything it cannot convert comes back unchanged so
//! the validator's kind check reports the real problem.
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

use crate::ir::Primitive;

static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+$").expect("integer pattern"));
static NUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(\d+\.?\d*|\.\d+)([eE][-+]?\d+)?$").expect("numeric pattern"));
static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").expect("uuid pattern")
});

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];
const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

// ————————————————————————————————————————————————————————————————————————————
// COERCION
// ————————————————————————————————————————————————————————————————————————————

/// Coerce one scalar toward `primitive`. Never fails; `null` stays `null`.
pub fn coerce_value(value: &Value, primitive: Primitive) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    let coerced = match primitive {
        Primitive::Integer => coerce_integer(value),
        Primitive::Number | Primitive::Decimal => coerce_number(value),
        Primitive::Boolean => coerce_boolean(value),
        Primitive::Date => value.as_str().and_then(parse_date).map(|d| d.format(DATE_FORMAT).to_string().into()),
        Primitive::DateTime => value.as_str().and_then(parse_datetime).map(format_datetime),
        Primitive::Time => value.as_str().and_then(parse_time).map(format_time),
        Primitive::Uuid => value
            .as_str()
            .filter(|s| UUID.is_match(s))
            .map(|s| Value::from(s.to_ascii_lowercase())),
        Primitive::String => match value {
            Value::Number(n) => Some(Value::from(n.to_string())),
            Value::Bool(b) => Some(Value::from(b.to_string())),
            _ => None,
        },
        Primitive::Unknown => None,
    };
    coerced.unwrap_or_else(|| value.clone())
}

fn coerce_integer(value: &Value) -> Option<Value> {
    let s = value.as_str()?.trim();
    if !INTEGER.is_match(s) {
        return None;
    }
    s.parse::<i64>().ok().map(Value::from)
}

fn coerce_number(value: &Value) -> Option<Value> {
    let s = value.as_str()?.trim();
    if !NUMERIC.is_match(s) {
        return None;
    }
    if INTEGER.is_match(s) {
        if let Ok(i) = s.parse::<i64>() {
            return Some(Value::from(i));
        }
    }
    let f = s.parse::<f64>().ok()?;
    Number::from_f64(f).map(Value::Number)
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    let s = value.as_str()?.trim().to_ascii_lowercase();
    match s.as_str() {
        "true" | "1" | "yes" => Some(Value::Bool(true)),
        "false" | "0" | "no" => Some(Value::Bool(false)),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
}

/// RFC 3339, or a naive `YYYY-MM-DD[T ]HH:MM:SS` taken as UTC, or a bare date at midnight UTC.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn format_datetime(dt: DateTime<Utc>) -> Value {
    Value::from(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    TIME_FORMATS.iter().find_map(|format| NaiveTime::parse_from_str(s, format).ok())
}

fn format_time(t: NaiveTime) -> Value {
    Value::from(t.format("%H:%M:%S%.f").to_string())
}

// ————————————————————————————————————————————————————————————————————————————
// KIND CHECKS
// ————————————————————————————————————————————————————————————————————————————

/// Whether a non-null `value` already has the JSON form of `primitive`.
pub fn matches_primitive(value: &Value, primitive: Primitive) -> bool {
    match primitive {
        Primitive::String => value.is_string(),
        Primitive::Integer => value.is_i64() || value.is_u64(),
        Primitive::Number | Primitive::Decimal => value.is_number(),
        Primitive::Boolean => value.is_boolean(),
        Primitive::Date => value.as_str().is_some_and(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok()),
        Primitive::DateTime => value.as_str().is_some_and(|s| parse_datetime(s).is_some()),
        Primitive::Time => value.as_str().is_some_and(|s| parse_time(s).is_some()),
        Primitive::Uuid => value.as_str().is_some_and(|s| UUID.is_match(s)),
        Primitive::Unknown => true,
    }
}

/// JSON kind name used in `type_invalid` metadata.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_rules() {
        assert_eq!(coerce_value(&Value::Null, Primitive::Integer), Value::Null);
        assert_eq!(coerce_value(&json!("42"), Primitive::Integer), json!(42));
        assert_eq!(coerce_value(&json!("-7"), Primitive::Integer), json!(-7));
        assert_eq!(coerce_value(&json!("abc"), Primitive::Integer), json!("abc"));
        assert_eq!(coerce_value(&json!("4.2"), Primitive::Integer), json!("4.2"));
        assert_eq!(coerce_value(&json!(5), Primitive::Integer), json!(5));
        // overflow stays a string for the validator to reject
        assert_eq!(coerce_value(&json!("99999999999999999999"), Primitive::Integer), json!("99999999999999999999"));
    }

    #[test]
    fn number_rules() {
        assert_eq!(coerce_value(&json!("3.5"), Primitive::Number), json!(3.5));
        assert_eq!(coerce_value(&json!("10"), Primitive::Decimal), json!(10));
        assert_eq!(coerce_value(&json!("1e3"), Primitive::Number), json!(1000.0));
        assert_eq!(coerce_value(&json!("12abc"), Primitive::Number), json!("12abc"));
        assert_eq!(coerce_value(&json!(2.25), Primitive::Number), json!(2.25));
    }

    #[test]
    fn boolean_rules() {
        for truthy in ["true", "TRUE", "1", "Yes"] {
            assert_eq!(coerce_value(&json!(truthy), Primitive::Boolean), json!(true));
        }
        for falsy in ["false", "0", "NO"] {
            assert_eq!(coerce_value(&json!(falsy), Primitive::Boolean), json!(false));
        }
        assert_eq!(coerce_value(&json!("maybe"), Primitive::Boolean), json!("maybe"));
        assert_eq!(coerce_value(&json!(1), Primitive::Boolean), json!(1));
    }

    #[test]
    fn temporal_rules() {
        assert_eq!(coerce_value(&json!("2024-03-01"), Primitive::Date), json!("2024-03-01"));
        assert_eq!(coerce_value(&json!("2024-03-01T10:00:00Z"), Primitive::Date), json!("2024-03-01"));
        assert_eq!(coerce_value(&json!("2024-03-01 10:30:00"), Primitive::DateTime), json!("2024-03-01T10:30:00Z"));
        assert_eq!(coerce_value(&json!("2024-03-01T12:00:00+02:00"), Primitive::DateTime), json!("2024-03-01T10:00:00Z"));
        assert_eq!(coerce_value(&json!("09:15"), Primitive::Time), json!("09:15:00"));
        assert_eq!(coerce_value(&json!("yesterday"), Primitive::Date), json!("yesterday"));
    }

    #[test]
    fn uuid_and_string_rules() {
        let id = "6F9619FF-8B86-D011-B42D-00C04FC964FF";
        assert_eq!(coerce_value(&json!(id), Primitive::Uuid), json!(id.to_ascii_lowercase()));
        assert_eq!(coerce_value(&json!("not-a-uuid"), Primitive::Uuid), json!("not-a-uuid"));
        assert_eq!(coerce_value(&Value::Null, Primitive::Uuid), Value::Null);
        assert_eq!(coerce_value(&json!(12), Primitive::String), json!("12"));
        assert_eq!(coerce_value(&json!(false), Primitive::String), json!("false"));
        assert_eq!(coerce_value(&Value::Null, Primitive::String), Value::Null);
        assert_eq!(coerce_value(&json!([1]), Primitive::String), json!([1]));
    }

    #[test]
    fn coercion_is_idempotent() {
        let samples = [json!("2024-03-01 10:30:00"), json!("42"), json!("yes"), json!("09:15:30.250")];
        let kinds = [Primitive::DateTime, Primitive::Integer, Primitive::Boolean, Primitive::Time];
        for (sample, kind) in samples.iter().zip(kinds) {
            let once = coerce_value(sample, kind);
            assert_eq!(coerce_value(&once, kind), once);
        }
    }

    #[test]
    fn kind_checks() {
        assert!(matches_primitive(&json!(3), Primitive::Integer));
        assert!(!matches_primitive(&json!(3.5), Primitive::Integer));
        assert!(matches_primitive(&json!(3), Primitive::Number));
        assert!(matches_primitive(&json!("2024-02-29"), Primitive::Date));
        assert!(!matches_primitive(&json!("2023-02-29"), Primitive::Date));
        assert!(matches_primitive(&json!({"any": 1}), Primitive::Unknown));
        assert_eq!(json_kind(&json!(1.5)), "number");
        assert_eq!(json_kind(&json!(1)), "integer");
    }
}
