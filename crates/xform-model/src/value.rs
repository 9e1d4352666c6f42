use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Declared data type of an instance node. Computed values are wrapped into this type before
/// they are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    /// Untyped; computed values are stored as text.
    #[default]
    Unspecified,
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    SelectOne,
    SelectMulti,
    GeoPoint,
}

/// A typed answer stored on a leaf of the instance tree.
///
/// Unanswered leaves hold no `AnswerValue` at all; there is no "empty" variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum AnswerValue {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Choice value of a select-one question.
    Choice(String),
    /// Choice values of a select-multi question, in selection order.
    Choices(Vec<String>),
    /// Latitude, longitude and optionally altitude and accuracy.
    GeoPoint(Vec<f64>),
}

impl AnswerValue {
    /// Text shown to a user (and the serialized form used by expressions).
    ///
    /// Multi-select answers are space separated, matching what `selected()` expects.
    pub fn display_text(&self) -> String {
        match self {
            AnswerValue::Text(s) | AnswerValue::Choice(s) => s.clone(),
            AnswerValue::Integer(n) => n.to_string(),
            AnswerValue::Decimal(n) => n.to_string(),
            AnswerValue::Boolean(b) => b.to_string(),
            AnswerValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            AnswerValue::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            AnswerValue::Choices(items) => items.join(" "),
            AnswerValue::GeoPoint(coords) => coords
                .iter()
                .map(f64::to_string)
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// The data type this answer naturally belongs to.
    pub fn data_type(&self) -> DataType {
        match self {
            AnswerValue::Text(_) => DataType::Text,
            AnswerValue::Integer(_) => DataType::Integer,
            AnswerValue::Decimal(_) => DataType::Decimal,
            AnswerValue::Boolean(_) => DataType::Boolean,
            AnswerValue::Date(_) => DataType::Date,
            AnswerValue::DateTime(_) => DataType::DateTime,
            AnswerValue::Choice(_) => DataType::SelectOne,
            AnswerValue::Choices(_) => DataType::SelectMulti,
            AnswerValue::GeoPoint(_) => DataType::GeoPoint,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        AnswerValue::Text(value)
    }
}

impl From<i64> for AnswerValue {
    fn from(value: i64) -> Self {
        AnswerValue::Integer(value)
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        AnswerValue::Decimal(value)
    }
}

impl From<bool> for AnswerValue {
    fn from(value: bool) -> Self {
        AnswerValue::Boolean(value)
    }
}

impl From<NaiveDate> for AnswerValue {
    fn from(value: NaiveDate) -> Self {
        AnswerValue::Date(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_text_matches_expression_serialization() {
        assert_eq!(
            AnswerValue::Choices(vec!["a".into(), "b c".into()]).display_text(),
            "a b c"
        );
        let d = NaiveDate::from_ymd_opt(2009, 3, 7).unwrap();
        assert_eq!(AnswerValue::Date(d).display_text(), "2009-03-07");
        assert_eq!(AnswerValue::Integer(-4).display_text(), "-4");
        assert_eq!(
            AnswerValue::GeoPoint(vec![1.5, -2.0]).display_text(),
            "1.5 -2"
        );
    }
}
