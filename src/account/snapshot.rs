use serde::{Deserialize, Serialize};

use crate::error::{CostError, Result};
use crate::usage::lenient;

/// Point-in-time read of the account's cumulative totals.
///
/// Every numeric field is optional: a missing, null, non-numeric or
/// non-finite value on the wire stays `None` and is never read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSnapshot {
    #[serde(deserialize_with = "lenient::de_opt_text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient::de_opt_text")]
    pub created_at: Option<String>,
    #[serde(rename = "daily_budget_usd", deserialize_with = "lenient::de_opt_f64")]
    pub daily_budget: Option<f64>,
    #[serde(rename = "daily_spent_usd", deserialize_with = "lenient::de_opt_f64")]
    pub daily_spent: Option<f64>,
    #[serde(rename = "weekly_budget_usd", deserialize_with = "lenient::de_opt_f64")]
    pub weekly_budget: Option<f64>,
    #[serde(rename = "weekly_spent_usd", deserialize_with = "lenient::de_opt_f64")]
    pub weekly_spent: Option<f64>,
    #[serde(deserialize_with = "lenient::de_opt_text")]
    pub weekly_window_start: Option<String>,
    #[serde(deserialize_with = "lenient::de_opt_text")]
    pub weekly_window_end: Option<String>,
    #[serde(rename = "total_spent_usd", deserialize_with = "lenient::de_opt_f64")]
    pub total_spent: Option<f64>,
}

impl AccountSnapshot {
    /// Decode the account endpoint's response body. The body must be a JSON
    /// object; individual fields are decoded leniently.
    pub fn from_json(body: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        if !value.is_object() {
            return Err(CostError::Decode(format!(
                "expected a JSON object, got {}",
                json_kind(&value)
            )));
        }
        Ok(serde_json::from_value(value)?)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
