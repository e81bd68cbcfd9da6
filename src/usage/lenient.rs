//! Numeric helpers that keep "unknown" distinct from zero.
//!
//! Every number that crosses a boundary (remote payloads, host events, the
//! state file) goes through these. Non-numeric, NaN and infinite inputs all
//! become `None`; nothing is ever defaulted to `0` on the way in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// `Some(value)` only for finite numbers.
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Interpret a JSON value as a finite number. Numeric strings are accepted.
pub fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().and_then(finite),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(finite),
        _ => None,
    }
}

/// Interpret a JSON value as a non-negative count, rounding fractional input.
pub fn count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    number(value)
        .filter(|n| *n >= 0.0)
        .map(|n| n.round() as u64)
}

/// Interpret a JSON value as text. Numbers are rendered, other shapes dropped.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts epoch milliseconds or an RFC 3339 string.
pub fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        other => number(other).and_then(|ms| DateTime::from_timestamp_millis(ms as i64)),
    }
}

pub fn de_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number))
}

pub fn de_opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(count))
}

pub fn de_opt_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(text))
}

pub fn de_opt_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(timestamp))
}

/// Persisted statistics are repaired to zero rather than rejected, so one bad
/// field never discards a whole session.
pub fn de_f64_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(de_opt_f64(deserializer)?.unwrap_or(0.0))
}

pub fn de_u64_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(de_opt_u64(deserializer)?.unwrap_or(0))
}

/// A `session id -> amount` map where entries without a finite amount are dropped.
pub fn de_finite_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, f64>, D::Error> {
    Ok(object_entries(deserializer)?
        .into_iter()
        .filter_map(|(key, value)| number(&value).map(|amount| (key, amount)))
        .collect())
}

/// A `key -> T` map where entries that fail to decode are dropped.
pub fn de_lossy_map<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    Ok(object_entries(deserializer)?
        .into_iter()
        .filter_map(|(key, value)| serde_json::from_value(value).ok().map(|v| (key, v)))
        .collect())
}

// Anything that is not a JSON object reads as an empty map.
fn object_entries<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<serde_json::Map<String, Value>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    })
}
