//! Value conversion between declared types
//!
//! Used by the LOSS equality mode: two values of different types are
//! "practically equal" when the source value converts into the target
//! type and the result equals the target value.

use crate::value::{DataType, Value};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

/// The value cannot be represented in the requested type
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot cast the value ({value}) of type {from} to {to}")]
pub struct CastError {
    pub value: String,
    pub from: DataType,
    pub to: DataType,
}

impl CastError {
    fn new(value: &Value, to: DataType) -> Self {
        Self {
            value: value.to_string(),
            from: value.data_type(),
            to,
        }
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Convert a value into the target type
pub fn cast(value: &Value, target: DataType) -> Result<Value, CastError> {
    if value.data_type() == target {
        return Ok(value.clone());
    }
    let fail = || CastError::new(value, target);

    match target {
        DataType::Text => match value {
            Value::Blob(_) => Err(fail()),
            other => Ok(Value::Text(other.to_string())),
        },
        DataType::CaseInsensitiveText => match value {
            Value::Blob(_) => Err(fail()),
            other => Ok(Value::CaseInsensitiveText(other.to_string())),
        },
        DataType::Integer => match value {
            Value::Boolean(b) => Ok(Value::Integer(i64::from(*b))),
            Value::Double(d) => {
                // i64::MAX as f64 rounds up to 2^63, which is out of range
                if d.fract() == 0.0 && *d >= i64::MIN as f64 && *d < i64::MAX as f64 {
                    Ok(Value::Integer(*d as i64))
                } else {
                    Err(fail())
                }
            }
            Value::Text(s) | Value::CaseInsensitiveText(s) => {
                s.trim().parse::<i64>().map(Value::Integer).map_err(|_| fail())
            }
            _ => Err(fail()),
        },
        DataType::Double => match value {
            Value::Boolean(b) => Ok(Value::Double(if *b { 1.0 } else { 0.0 })),
            Value::Integer(i) => {
                let d = *i as f64;
                if d as i128 == i128::from(*i) {
                    Ok(Value::Double(d))
                } else {
                    Err(fail())
                }
            }
            Value::Text(s) | Value::CaseInsensitiveText(s) => {
                s.trim().parse::<f64>().map(Value::Double).map_err(|_| fail())
            }
            _ => Err(fail()),
        },
        DataType::Boolean => match value {
            Value::Integer(0) => Ok(Value::Boolean(false)),
            Value::Integer(1) => Ok(Value::Boolean(true)),
            Value::Text(s) | Value::CaseInsensitiveText(s) => {
                match s.trim().to_lowercase().as_str() {
                    "true" | "t" | "yes" | "y" | "1" => Ok(Value::Boolean(true)),
                    "false" | "f" | "no" | "n" | "0" => Ok(Value::Boolean(false)),
                    _ => Err(fail()),
                }
            }
            _ => Err(fail()),
        },
        DataType::Date => match value {
            Value::Timestamp(ts) => {
                if ts.time() == NaiveTime::MIN {
                    Ok(Value::Date(ts.date()))
                } else {
                    Err(fail())
                }
            }
            Value::Text(s) | Value::CaseInsensitiveText(s) => parse_date(s.trim())
                .map(Value::Date)
                .ok_or_else(fail),
            _ => Err(fail()),
        },
        DataType::Timestamp => match value {
            Value::Date(d) => Ok(Value::Timestamp(d.and_time(NaiveTime::MIN))),
            Value::Text(s) | Value::CaseInsensitiveText(s) => parse_timestamp(s.trim())
                .map(Value::Timestamp)
                .ok_or_else(fail),
            _ => Err(fail()),
        },
        DataType::Blob => match value {
            Value::Text(s) | Value::CaseInsensitiveText(s) => Ok(Value::Blob(s.as_bytes().to_vec())),
            _ => Err(fail()),
        },
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| parse_date(s).map(|d| d.and_time(NaiveTime::MIN)))
}
