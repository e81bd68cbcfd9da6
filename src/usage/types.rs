use serde::{Deserialize, Serialize};

use super::lenient;

/// Scope key of the cross-session rollup.
pub const ALL_SCOPE: &str = "__all__";

/// Token counts reported for a single assistant turn.
///
/// Each side is `None` when the host did not report it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenCounts {
    pub input: Option<u64>,
    pub output: Option<u64>,
    pub cache_read: Option<u64>,
    pub cache_write: Option<u64>,
}

impl TokenCounts {
    /// Cache read + write. A missing side counts as zero only when the other
    /// side is present; with neither, the total is unknown.
    pub fn cache_total(&self) -> Option<u64> {
        match (self.cache_read, self.cache_write) {
            (None, None) => None,
            (read, write) => Some(read.unwrap_or(0).saturating_add(write.unwrap_or(0))),
        }
    }
}

/// Accumulated statistics for one session or one aggregate scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionStats {
    #[serde(alias = "input", deserialize_with = "lenient::de_u64_or_zero")]
    pub input_tokens: u64,
    #[serde(alias = "output", deserialize_with = "lenient::de_u64_or_zero")]
    pub output_tokens: u64,
    #[serde(alias = "cache", deserialize_with = "lenient::de_u64_or_zero")]
    pub cache_tokens: u64,
    /// Sum of first-token latencies in milliseconds
    #[serde(deserialize_with = "lenient::de_f64_or_zero")]
    pub latency_sum: f64,
    #[serde(deserialize_with = "lenient::de_u64_or_zero")]
    pub latency_count: u64,
    #[serde(deserialize_with = "lenient::de_f64_or_zero")]
    pub cost: f64,
}

/// Aggregates share the session shape.
pub type AggregateStats = SessionStats;

impl SessionStats {
    /// Mean first-token latency, undefined until one latency was recorded.
    pub fn average_latency(&self) -> Option<f64> {
        if self.latency_count == 0 {
            return None;
        }
        lenient::finite(self.latency_sum / self.latency_count as f64)
    }

    pub fn record_tokens(&mut self, tokens: &TokenCounts) {
        if let Some(input) = tokens.input {
            self.input_tokens = self.input_tokens.saturating_add(input);
        }
        if let Some(output) = tokens.output {
            self.output_tokens = self.output_tokens.saturating_add(output);
        }
        if let Some(cache) = tokens.cache_total() {
            self.cache_tokens = self.cache_tokens.saturating_add(cache);
        }
    }

    pub fn record_latency(&mut self, latency_ms: f64) {
        if latency_ms.is_finite() {
            self.latency_sum += latency_ms;
            self.latency_count += 1;
        }
    }

    /// Raw addition; negative deltas (credits, refunds) are kept as-is.
    pub fn add_cost(&mut self, delta: f64) {
        if delta.is_finite() {
            self.cost += delta;
        }
    }

    pub fn merge(&mut self, other: &SessionStats) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.cache_tokens = self.cache_tokens.saturating_add(other.cache_tokens);
        self.latency_sum += other.latency_sum;
        self.latency_count = self.latency_count.saturating_add(other.latency_count);
        self.cost += other.cost;
    }

    pub fn is_empty(&self) -> bool {
        *self == SessionStats::default()
    }
}
