//! Turning cumulative account totals into per-turn charges.
//!
//! The account endpoint only reports a running total. A user turn pins that
//! total as the session's baseline; a completed assistant turn is charged
//! `current total - baseline`. Assistant turns never move the baseline, so
//! consecutive assistant turns without a user turn in between are all
//! measured against the same baseline.

use serde::Serialize;

use super::lenient::finite;
use super::types::{AggregateStats, SessionStats, TokenCounts, ALL_SCOPE};
use crate::account::AccountSnapshot;
use crate::state::PersistentState;

/// One completed assistant turn, as seen by the accumulator.
#[derive(Debug, Clone, Copy)]
pub struct AssistantTurn<'a> {
    pub session_id: &'a str,
    pub provider_id: &'a str,
    pub tokens: TokenCounts,
    /// Milliseconds from message creation to the first streamed part
    pub first_token_latency: Option<f64>,
}

/// What an assistant turn added to the books.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnCharge {
    pub session_id: String,
    /// `None` when either the fresh total or the baseline is unknown
    pub delta: Option<f64>,
    /// Session's cumulative attributed cost after this turn
    pub session_total: Option<f64>,
    pub tokens: TokenCounts,
    pub first_token_latency: Option<f64>,
}

/// Statistics handed to report rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReport {
    pub session_id: Option<String>,
    pub session: SessionStats,
    pub scope: String,
    pub aggregate: AggregateStats,
}

/// Applies turns to a [`PersistentState`]. Holds no state of its own beyond
/// the aggregate scope it reports on.
#[derive(Debug, Clone)]
pub struct DeltaAccumulator {
    scope: String,
}

impl DeltaAccumulator {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Pin the session baseline to the snapshot total.
    ///
    /// An unknown total leaves an existing baseline untouched. Either way the
    /// session gets a zero cost total and zeroed statistics if it had none.
    pub fn apply_user_turn(
        &self,
        state: &mut PersistentState,
        session_id: &str,
        snapshot: Option<&AccountSnapshot>,
    ) {
        if let Some(total) = snapshot.and_then(|s| s.total_spent).and_then(finite) {
            state
                .baseline_by_session
                .insert(session_id.to_string(), total);
        }

        state
            .session_totals
            .entry(session_id.to_string())
            .or_insert(0.0);
        state
            .session_stats
            .entry(session_id.to_string())
            .or_default();
    }

    /// Charge a completed assistant turn to its session and aggregates.
    ///
    /// Cost is skipped when the delta is unknown; tokens and latency are
    /// recorded regardless. Negative deltas are applied unclamped.
    pub fn apply_assistant_turn(
        &self,
        state: &mut PersistentState,
        turn: &AssistantTurn<'_>,
        snapshot: Option<&AccountSnapshot>,
    ) -> TurnCharge {
        let total = snapshot.and_then(|s| s.total_spent).and_then(finite);
        let baseline = state
            .baseline_by_session
            .get(turn.session_id)
            .copied()
            .and_then(finite);
        let delta = match (total, baseline) {
            (Some(total), Some(baseline)) => finite(total - baseline),
            _ => None,
        };

        if let Some(delta) = delta {
            *state
                .session_totals
                .entry(turn.session_id.to_string())
                .or_insert(0.0) += delta;
        }

        let latency = turn.first_token_latency.and_then(finite);
        let record = |stats: &mut SessionStats| {
            stats.record_tokens(&turn.tokens);
            if let Some(latency) = latency {
                stats.record_latency(latency);
            }
            if let Some(delta) = delta {
                stats.add_cost(delta);
            }
        };

        record(
            state
                .session_stats
                .entry(turn.session_id.to_string())
                .or_default(),
        );
        for scope in aggregate_scopes(turn.provider_id) {
            record(state.aggregate_stats.entry(scope.to_string()).or_default());
        }

        TurnCharge {
            session_id: turn.session_id.to_string(),
            delta,
            session_total: state.session_totals.get(turn.session_id).copied(),
            tokens: turn.tokens,
            first_token_latency: latency,
        }
    }

    /// Session statistics plus the aggregate for this accumulator's scope.
    ///
    /// State written before aggregates existed has no rollup; in that case the
    /// aggregate is summed from every session on the fly.
    pub fn report(&self, state: &PersistentState, session_id: Option<&str>) -> UsageReport {
        let session = session_id
            .map(|id| state.stats_for(id))
            .unwrap_or_default();

        let aggregate = match state.aggregate_stats.get(&self.scope) {
            Some(stats) => *stats,
            None => state
                .session_stats
                .values()
                .fold(SessionStats::default(), |mut acc, stats| {
                    acc.merge(stats);
                    acc
                }),
        };

        UsageReport {
            session_id: session_id.map(str::to_string),
            session,
            scope: self.scope.clone(),
            aggregate,
        }
    }

    /// Forget one session. Aggregates keep what the session contributed.
    pub fn clear_session(&self, state: &mut PersistentState, session_id: &str) {
        state.baseline_by_session.remove(session_id);
        state.session_totals.remove(session_id);
        state.session_stats.remove(session_id);
    }

    /// Forget every session and every aggregate.
    pub fn clear_all(&self, state: &mut PersistentState) {
        state.baseline_by_session.clear();
        state.session_totals.clear();
        state.session_stats.clear();
        state.aggregate_stats.clear();
        state.last_session_id = None;
    }
}

impl Default for DeltaAccumulator {
    fn default() -> Self {
        Self::new(ALL_SCOPE)
    }
}

fn aggregate_scopes(provider_id: &str) -> impl Iterator<Item = &str> {
    std::iter::once(ALL_SCOPE).chain((provider_id != ALL_SCOPE).then_some(provider_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(total: f64) -> AccountSnapshot {
        AccountSnapshot {
            total_spent: Some(total),
            ..Default::default()
        }
    }

    fn turn(session_id: &str) -> AssistantTurn<'_> {
        AssistantTurn {
            session_id,
            provider_id: "packycode",
            tokens: TokenCounts::default(),
            first_token_latency: None,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_user_turn_sets_baseline_and_floor() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();

        acc.apply_user_turn(&mut state, "s1", Some(&snapshot(10.0)));

        assert_eq!(state.baseline_by_session["s1"], 10.0);
        assert_eq!(state.session_totals["s1"], 0.0);
        assert!(state.session_stats["s1"].is_empty());
    }

    #[test]
    fn test_user_turn_with_unknown_total_keeps_baseline() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();
        acc.apply_user_turn(&mut state, "s1", Some(&snapshot(10.0)));

        acc.apply_user_turn(&mut state, "s1", None);
        acc.apply_user_turn(&mut state, "s1", Some(&AccountSnapshot::default()));
        acc.apply_user_turn(&mut state, "s1", Some(&snapshot(f64::NAN)));

        assert_eq!(state.baseline_by_session["s1"], 10.0);
    }

    #[test]
    fn test_user_turn_does_not_reset_existing_totals() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();
        state.session_totals.insert("s1".to_string(), 0.75);

        acc.apply_user_turn(&mut state, "s1", Some(&snapshot(11.0)));
        assert_eq!(state.session_totals["s1"], 0.75);
    }

    #[test]
    fn test_assistant_turn_charges_delta() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();
        acc.apply_user_turn(&mut state, "s1", Some(&snapshot(10.00)));

        let charge = acc.apply_assistant_turn(&mut state, &turn("s1"), Some(&snapshot(10.25)));

        assert!(approx(charge.delta.unwrap(), 0.25));
        assert!(approx(charge.session_total.unwrap(), 0.25));
        assert!(approx(state.session_stats["s1"].cost, 0.25));
        assert!(approx(state.aggregate_stats[ALL_SCOPE].cost, 0.25));
        assert!(approx(state.aggregate_stats["packycode"].cost, 0.25));
        // Only a user turn moves the baseline.
        assert_eq!(state.baseline_by_session["s1"], 10.00);
    }

    #[test]
    fn test_tokens_and_cache_accumulate() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();
        let mut t = turn("s1");
        t.tokens = TokenCounts {
            input: Some(120),
            output: Some(340),
            cache_read: Some(50),
            cache_write: Some(0),
        };

        acc.apply_assistant_turn(&mut state, &t, None);

        let stats = state.session_stats["s1"];
        assert_eq!(stats.input_tokens, 120);
        assert_eq!(stats.output_tokens, 340);
        assert_eq!(stats.cache_tokens, 50);
        assert_eq!(state.aggregate_stats[ALL_SCOPE].cache_tokens, 50);
    }

    #[test]
    fn test_unavailable_snapshot_skips_cost_only() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();
        acc.apply_user_turn(&mut state, "s1", Some(&snapshot(10.0)));

        let mut t = turn("s1");
        t.tokens.input = Some(100);
        t.first_token_latency = Some(420.0);
        let charge = acc.apply_assistant_turn(&mut state, &t, None);

        assert_eq!(charge.delta, None);
        assert_eq!(charge.session_total, Some(0.0));
        let stats = state.session_stats["s1"];
        assert_eq!(stats.cost, 0.0);
        assert_eq!(stats.input_tokens, 100);
        assert_eq!(stats.latency_count, 1);
        assert_eq!(stats.average_latency(), Some(420.0));
    }

    #[test]
    fn test_missing_baseline_skips_cost() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();

        let charge = acc.apply_assistant_turn(&mut state, &turn("s1"), Some(&snapshot(10.25)));

        assert_eq!(charge.delta, None);
        assert_eq!(charge.session_total, None);
        assert_eq!(state.session_stats["s1"].cost, 0.0);
        assert!(!state.session_totals.contains_key("s1"));
    }

    #[test]
    fn test_consecutive_assistant_turns_share_baseline() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();
        acc.apply_user_turn(&mut state, "s1", Some(&snapshot(10.0)));

        let first = acc.apply_assistant_turn(&mut state, &turn("s1"), Some(&snapshot(10.5)));
        let second = acc.apply_assistant_turn(&mut state, &turn("s1"), Some(&snapshot(11.0)));

        assert!(approx(first.delta.unwrap(), 0.5));
        assert!(approx(second.delta.unwrap(), 1.0));
        assert!(approx(state.session_stats["s1"].cost, 1.5));
    }

    #[test]
    fn test_cost_is_sum_of_deltas_over_user_assistant_pairs() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();
        let totals = [(10.0, 10.2), (10.2, 10.9), (11.5, 11.55)];

        let mut expected = 0.0;
        for (before, after) in totals {
            acc.apply_user_turn(&mut state, "s1", Some(&snapshot(before)));
            acc.apply_assistant_turn(&mut state, &turn("s1"), Some(&snapshot(after)));
            expected += after - before;
        }

        assert!(approx(state.session_stats["s1"].cost, expected));
        assert!(approx(state.session_totals["s1"], expected));
    }

    #[test]
    fn test_negative_delta_is_not_clamped() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();
        acc.apply_user_turn(&mut state, "s1", Some(&snapshot(10.0)));

        let charge = acc.apply_assistant_turn(&mut state, &turn("s1"), Some(&snapshot(9.5)));

        assert!(approx(charge.delta.unwrap(), -0.5));
        assert!(approx(state.session_stats["s1"].cost, -0.5));
    }

    #[test]
    fn test_sessions_are_isolated_but_aggregate_spans_them() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();
        acc.apply_user_turn(&mut state, "s1", Some(&snapshot(10.0)));
        acc.apply_user_turn(&mut state, "s2", Some(&snapshot(20.0)));

        acc.apply_assistant_turn(&mut state, &turn("s1"), Some(&snapshot(10.1)));
        acc.apply_assistant_turn(&mut state, &turn("s2"), Some(&snapshot(20.3)));

        assert!(approx(state.session_stats["s1"].cost, 0.1));
        assert!(approx(state.session_stats["s2"].cost, 0.3));
        assert!(approx(state.aggregate_stats[ALL_SCOPE].cost, 0.4));
    }

    #[test]
    fn test_report_uses_scope_bucket() {
        let acc = DeltaAccumulator::new("packycode");
        let mut state = PersistentState::default();
        acc.apply_user_turn(&mut state, "s1", Some(&snapshot(1.0)));
        acc.apply_assistant_turn(&mut state, &turn("s1"), Some(&snapshot(1.5)));

        let mut other = turn("s1");
        other.provider_id = "other";
        acc.apply_assistant_turn(&mut state, &other, Some(&snapshot(2.0)));

        let report = acc.report(&state, Some("s1"));
        assert_eq!(report.scope, "packycode");
        assert!(approx(report.aggregate.cost, 0.5));
        assert!(approx(report.session.cost, 1.5));
    }

    #[test]
    fn test_report_falls_back_to_summing_sessions() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();
        state.session_stats.insert(
            "s1".to_string(),
            SessionStats {
                input_tokens: 10,
                cost: 0.1,
                ..Default::default()
            },
        );
        state.session_stats.insert(
            "s2".to_string(),
            SessionStats {
                input_tokens: 5,
                cost: 0.2,
                ..Default::default()
            },
        );

        let report = acc.report(&state, Some("s1"));
        assert_eq!(report.aggregate.input_tokens, 15);
        assert!(approx(report.aggregate.cost, 0.3));
        assert_eq!(report.session.input_tokens, 10);
    }

    #[test]
    fn test_report_unknown_session_is_empty() {
        let acc = DeltaAccumulator::default();
        let report = acc.report(&PersistentState::default(), Some("missing"));
        assert!(report.session.is_empty());
        assert!(report.aggregate.is_empty());
    }

    #[test]
    fn test_clear_session_is_idempotent() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();
        acc.apply_user_turn(&mut state, "s1", Some(&snapshot(10.0)));
        acc.apply_user_turn(&mut state, "s2", Some(&snapshot(10.0)));
        acc.apply_assistant_turn(&mut state, &turn("s1"), Some(&snapshot(10.5)));

        acc.clear_session(&mut state, "s1");
        let once = state.clone();
        acc.clear_session(&mut state, "s1");

        assert_eq!(state, once);
        assert!(!state.session_stats.contains_key("s1"));
        assert!(!state.baseline_by_session.contains_key("s1"));
        assert!(state.session_stats.contains_key("s2"));
        assert!(approx(state.aggregate_stats[ALL_SCOPE].cost, 0.5));
    }

    #[test]
    fn test_clear_all_then_report_is_empty() {
        let acc = DeltaAccumulator::default();
        let mut state = PersistentState::default();
        state.last_session_id = Some("s1".to_string());
        acc.apply_user_turn(&mut state, "s1", Some(&snapshot(10.0)));
        acc.apply_assistant_turn(&mut state, &turn("s1"), Some(&snapshot(10.5)));

        acc.clear_all(&mut state);
        acc.clear_all(&mut state);

        assert_eq!(state.last_session_id, None);
        let report = acc.report(&state, Some("s1"));
        assert!(report.session.is_empty());
        assert!(report.aggregate.is_empty());
    }
}
