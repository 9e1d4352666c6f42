//! Conversions between runtime value types.
//!
//! Every function here follows one fixed table; there is no locale-dependent parsing.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::{EvalError, EvalResult};
use crate::value::Value;

const EPSILON: f64 = 1.0e-12;
const DAY_MS: i64 = 86_400_000;
const HALF_DAY_MS: i64 = 43_200_000;

// Well beyond the representable date range; rejected before any millisecond arithmetic.
const MAX_DAYS: f64 = 1.0e8;

fn epoch() -> NaiveDateTime {
    NaiveDateTime::default()
}

pub fn to_boolean(value: &Value) -> EvalResult<bool> {
    Ok(match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.abs() > EPSILON && !n.is_nan(),
        Value::Text(s) => !s.is_empty(),
        Value::Date(_) => true,
        Value::NodeSet(set) => !set.is_empty(),
        Value::Custom(c) => c.to_boolean()?,
    })
}

pub fn to_numeric(value: &Value) -> EvalResult<f64> {
    match value {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => Ok(*n),
        Value::Text(s) => Ok(parse_numeric(s)),
        Value::Date(dt) => Ok(days_since_epoch(*dt) as f64),
        Value::NodeSet(_) => to_numeric(&value.unpack()),
        Value::Custom(c) => c.to_numeric(),
    }
}

pub fn to_text(value: &Value) -> EvalResult<String> {
    match value {
        Value::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Value::Number(n) => Ok(format_number(*n)),
        Value::Text(s) => Ok(s.clone()),
        Value::Date(dt) => Ok(format_date(*dt)),
        Value::NodeSet(_) => to_text(&value.unpack()),
        Value::Custom(c) => c.to_text(),
    }
}

/// Converts to a date-time. Numbers must be whole day counts; strings must be ISO-8601.
pub fn to_date(value: &Value) -> EvalResult<NaiveDateTime> {
    match value {
        Value::Date(dt) => Ok(*dt),
        Value::Number(n) => date_from_days(*n),
        Value::Text(s) => parse_date(s).ok_or_else(|| EvalError::mismatch("converting to date")),
        Value::NodeSet(_) => to_date(&value.unpack()),
        Value::Bool(_) | Value::Custom(_) => Err(EvalError::mismatch("converting to date")),
    }
}

/// Strict lexical parse: only digits, `.` and `-` are accepted, everything else is NaN.
pub fn parse_numeric(text: &str) -> f64 {
    let s = text.trim();
    if s.is_empty()
        || !s
            .chars()
            .all(|c| c == '-' || c == '.' || c.is_ascii_digit())
    {
        return f64::NAN;
    }
    s.parse().unwrap_or(f64::NAN)
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.abs() < EPSILON {
        "0".to_string()
    } else if n.is_infinite() {
        if n < 0.0 { "-Infinity" } else { "Infinity" }.to_string()
    } else if (n - n.trunc()).abs() < EPSILON {
        format!("{:.0}", n.trunc())
    } else {
        // `f64`'s `Display` is the shortest round-trip form and never uses exponents.
        n.to_string()
    }
}

/// `YYYY-MM-DD` at midnight, otherwise `YYYY-MM-DDTHH:MM:SS[.fff]`.
pub fn format_date(dt: NaiveDateTime) -> String {
    if dt.time() == NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
    }
}

pub fn days_since_epoch(dt: NaiveDateTime) -> i64 {
    (dt.date() - epoch().date()).num_days()
}

/// Day `days` after the epoch, at midnight. The half-day offset keeps the result on the right
/// day regardless of where the day boundary falls.
pub fn date_from_days(days: f64) -> EvalResult<NaiveDateTime> {
    if !days.is_finite() || (days - days.trunc()).abs() > EPSILON {
        return Err(EvalError::mismatch("converting non-integer to date"));
    }
    if days.abs() > MAX_DAYS {
        return Err(EvalError::mismatch("date out of range"));
    }
    let ms = (days.trunc() as i64)
        .checked_mul(DAY_MS)
        .and_then(|ms| ms.checked_add(HALF_DAY_MS))
        .ok_or_else(|| EvalError::mismatch("date out of range"))?;
    let shifted = epoch()
        .checked_add_signed(Duration::milliseconds(ms))
        .ok_or_else(|| EvalError::mismatch("date out of range"))?;
    Ok(shifted.date().and_time(NaiveTime::MIN))
}

/// Parses `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS[.fff]` or an RFC 3339 timestamp (normalized to UTC).
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let s = text.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_time(NaiveTime::MIN));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::NodeSet;
    use xform_model::TreeReference;

    #[test]
    fn numeric_parse_is_strict() {
        assert!(parse_numeric("abc").is_nan());
        assert_eq!(parse_numeric(" 12.5 "), 12.5);
        assert_eq!(parse_numeric("-3"), -3.0);
        assert!(parse_numeric("1e5").is_nan());
        assert!(parse_numeric("+1").is_nan());
        assert!(parse_numeric("").is_nan());
        assert!(parse_numeric("1-2").is_nan());
    }

    #[test]
    fn boolean_conversion() {
        assert!(!to_boolean(&Value::Number(0.0)).unwrap());
        assert!(!to_boolean(&Value::Number(1e-13)).unwrap());
        assert!(!to_boolean(&Value::Number(f64::NAN)).unwrap());
        assert!(to_boolean(&Value::Number(-2.0)).unwrap());
        assert!(!to_boolean(&Value::Text(String::new())).unwrap());
        assert!(to_boolean(&Value::Text("false".into())).unwrap());

        let set: NodeSet = [
            (TreeReference::path("/a"), Value::Text(String::new())),
            (TreeReference::path("/b"), Value::Text(String::new())),
        ]
        .into_iter()
        .collect();
        assert!(to_boolean(&Value::NodeSet(set)).unwrap());
        assert!(!to_boolean(&Value::NodeSet(NodeSet::new())).unwrap());
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(1e-13), "0");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(42.0), "42");
        assert_eq!(format_number(-7.0), "-7");
        assert_eq!(format_number(3.5), "3.5");
        assert_eq!(format_number(3.0000000000000004), "3");
        assert_eq!(format_number(-2.0000000000000004), "-2");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(1e21), "1000000000000000000000");
    }

    #[test]
    fn dates_from_day_counts() {
        let d = date_from_days(0.0).unwrap();
        assert_eq!(format_date(d), "1970-01-01");
        let d = date_from_days(14_000.0).unwrap();
        assert_eq!(days_since_epoch(d), 14_000);
        let d = date_from_days(-1.0).unwrap();
        assert_eq!(format_date(d), "1969-12-31");
        assert!(matches!(
            date_from_days(1.5),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn dates_from_strings() {
        let d = to_date(&Value::Text("2009-03-07".into())).unwrap();
        assert_eq!(to_text(&Value::Date(d)).unwrap(), "2009-03-07");
        let dt = to_date(&Value::Text("2009-03-07T10:30:00".into())).unwrap();
        assert_eq!(format_date(dt), "2009-03-07T10:30:00.000");
        assert!(to_date(&Value::Text("March 7".into())).is_err());
        assert!(to_date(&Value::Bool(true)).is_err());
    }

    #[test]
    fn date_to_number_counts_days() {
        let d = parse_date("1970-01-11").unwrap();
        assert_eq!(to_numeric(&Value::Date(d)).unwrap(), 10.0);
    }
}
