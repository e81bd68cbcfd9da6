//! The persisted accounting record and its storage.

mod store;

pub use store::{JsonFileStore, MemoryStore, StateStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::account::AccountSnapshot;
use crate::usage::{lenient, AggregateStats, SessionStats};

/// Everything the accountant remembers across restarts.
///
/// Loaded in full before every mutation and written back in full after it.
/// Keys written by older releases (`data`, `lastUserTotals`, `providerStats`)
/// are still read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistentState {
    #[serde(deserialize_with = "lenient::de_opt_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(alias = "data", deserialize_with = "de_opt_snapshot")]
    pub last_snapshot: Option<AccountSnapshot>,
    #[serde(deserialize_with = "lenient::de_opt_text")]
    pub last_session_id: Option<String>,
    /// Account total at each session's most recent user turn
    #[serde(alias = "lastUserTotals", deserialize_with = "lenient::de_finite_map")]
    pub baseline_by_session: BTreeMap<String, f64>,
    /// Cost attributed to each session so far
    #[serde(deserialize_with = "lenient::de_finite_map")]
    pub session_totals: BTreeMap<String, f64>,
    #[serde(deserialize_with = "lenient::de_lossy_map")]
    pub session_stats: BTreeMap<String, SessionStats>,
    /// Rollups keyed by scope: `__all__` or a provider id
    #[serde(alias = "providerStats", deserialize_with = "lenient::de_lossy_map")]
    pub aggregate_stats: BTreeMap<String, AggregateStats>,
}

impl PersistentState {
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    pub fn stats_for(&self, session_id: &str) -> SessionStats {
        self.session_stats
            .get(session_id)
            .copied()
            .unwrap_or_default()
    }
}

fn de_opt_snapshot<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<AccountSnapshot>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_object())
        .and_then(|v| serde_json::from_value(v).ok()))
}
