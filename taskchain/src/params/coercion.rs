//! Conversion of raw context values into declared parameter types.
//!
//! Coerced values stay JSON so they can be written back into params and
//! snapshots unchanged. Decimals and dates are represented as canonical
//! strings.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Number, Value};
use thiserror::Error;

use crate::locale::Locale;
use crate::params::node::ParamType;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("could not coerce into {} {}", .kind.article(), .kind.label())]
pub struct CoercionError {
    pub kind: ParamType,
}

impl CoercionError {
    fn new(kind: ParamType) -> Self {
        Self { kind }
    }

    /// Translated message, e.g. `could not coerce into an integer`.
    pub fn message(&self, locale: &Locale) -> String {
        let key = if self.kind.article() == "an" {
            "taskchain.coercions.into_an"
        } else {
            "taskchain.coercions.into_a"
        };
        locale.translate(key, &[("type", self.kind.label().to_string())])
    }
}

pub fn coerce(kind: ParamType, value: &Value) -> Result<Value, CoercionError> {
    let coerced = match kind {
        ParamType::Virtual => Some(value.clone()),
        ParamType::String => into_string(value),
        ParamType::Integer => into_integer(value),
        ParamType::Float => into_float(value),
        ParamType::BigDecimal => into_decimal(value),
        ParamType::Boolean => into_boolean(value),
        ParamType::Array => into_array(value),
        ParamType::Hash => into_hash(value),
        ParamType::Date => into_date(value),
        ParamType::DateTime => into_datetime(value),
    };
    coerced.ok_or_else(|| CoercionError::new(kind))
}

fn into_string(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

fn into_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::Number(n) => {
            let f = n.as_f64()?;
            let whole = f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64;
            whole.then(|| Value::from(f as i64))
        }
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn into_float(value: &Value) -> Option<Value> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Number::from_f64(f).map(Value::Number)
}

fn into_decimal(value: &Value) -> Option<Value> {
    static DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("decimal pattern")
    });

    match value {
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::String(s) => {
            let trimmed = s.trim();
            DECIMAL
                .is_match(trimmed)
                .then(|| Value::String(trimmed.trim_start_matches('+').to_string()))
        }
        _ => None,
    }
}

fn into_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(Value::Bool(true)),
            Some(0) => Some(Value::Bool(false)),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Some(Value::Bool(true)),
            "false" | "f" | "no" | "n" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

fn into_array(value: &Value) -> Option<Value> {
    match value {
        Value::Array(_) => Some(value.clone()),
        Value::String(s) if s.trim_start().starts_with('[') => {
            serde_json::from_str::<Value>(s).ok().filter(Value::is_array)
        }
        Value::Object(_) | Value::Null => None,
        scalar => Some(Value::Array(vec![scalar.clone()])),
    }
}

fn into_hash(value: &Value) -> Option<Value> {
    match value {
        Value::Object(_) => Some(value.clone()),
        Value::String(s) if s.trim_start().starts_with('{') => {
            serde_json::from_str::<Value>(s).ok().filter(Value::is_object)
        }
        _ => None,
    }
}

fn into_date(value: &Value) -> Option<Value> {
    let text = value.as_str()?.trim();
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))?;
    Some(Value::String(date.format("%Y-%m-%d").to_string()))
}

fn into_datetime(value: &Value) -> Option<Value> {
    let parsed: DateTime<Utc> = match value {
        Value::Number(n) => DateTime::from_timestamp(n.as_i64()?, 0)?,
        Value::String(s) => {
            let text = s.trim();
            DateTime::parse_from_rfc3339(text)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
                        .iter()
                        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                        .map(|naive| naive.and_utc())
                })?
        }
        _ => return None,
    };
    Some(Value::String(parsed.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn integers_accept_numeric_strings_and_whole_floats() {
        assert_eq!(coerce(ParamType::Integer, &json!("42")), Ok(json!(42)));
        assert_eq!(coerce(ParamType::Integer, &json!(3.0)), Ok(json!(3)));
        assert!(coerce(ParamType::Integer, &json!(3.5)).is_err());
        assert!(coerce(ParamType::Integer, &json!("4x")).is_err());
        assert!(coerce(ParamType::Integer, &json!(true)).is_err());
    }

    #[test]
    fn floats_and_decimals() {
        assert_eq!(coerce(ParamType::Float, &json!("1.25")), Ok(json!(1.25)));
        assert_eq!(coerce(ParamType::BigDecimal, &json!("+10.50")), Ok(json!("10.50")));
        assert_eq!(coerce(ParamType::BigDecimal, &json!(7)), Ok(json!("7")));
        assert!(coerce(ParamType::BigDecimal, &json!("1.2.3")).is_err());
    }

    #[test]
    fn booleans_accept_common_spellings() {
        assert_eq!(coerce(ParamType::Boolean, &json!("Yes")), Ok(json!(true)));
        assert_eq!(coerce(ParamType::Boolean, &json!("f")), Ok(json!(false)));
        assert_eq!(coerce(ParamType::Boolean, &json!(1)), Ok(json!(true)));
        assert!(coerce(ParamType::Boolean, &json!("maybe")).is_err());
    }

    #[test]
    fn arrays_parse_json_and_wrap_scalars() {
        assert_eq!(coerce(ParamType::Array, &json!("[1,2]")), Ok(json!([1, 2])));
        assert_eq!(coerce(ParamType::Array, &json!("sku-1")), Ok(json!(["sku-1"])));
        assert!(coerce(ParamType::Array, &json!({"a": 1})).is_err());
    }

    #[test]
    fn hashes_parse_json_objects() {
        assert_eq!(coerce(ParamType::Hash, &json!(r#"{"a":1}"#)), Ok(json!({"a": 1})));
        assert!(coerce(ParamType::Hash, &json!("[1]")).is_err());
        assert!(coerce(ParamType::Hash, &json!(5)).is_err());
    }

    #[test]
    fn dates_are_canonicalized() {
        assert_eq!(coerce(ParamType::Date, &json!("2024-02-29")), Ok(json!("2024-02-29")));
        assert!(coerce(ParamType::Date, &json!("2023-02-29")).is_err());
        assert_eq!(
            coerce(ParamType::DateTime, &json!("2024-01-02 03:04:05")),
            Ok(json!("2024-01-02T03:04:05Z"))
        );
        assert_eq!(
            coerce(ParamType::DateTime, &json!("2024-01-02T03:04:05+02:00")),
            Ok(json!("2024-01-02T01:04:05Z"))
        );
    }

    #[test]
    fn error_message_uses_article() {
        let locale = Locale::default();
        let err = coerce(ParamType::Integer, &json!("x")).expect_err("integer");
        assert_eq!(err.message(&locale), "could not coerce into an integer");
        assert_eq!(err.to_string(), "could not coerce into an integer");
        let err = coerce(ParamType::Hash, &json!(1)).expect_err("hash");
        assert_eq!(err.message(&locale), "could not coerce into a hash");
    }
}
