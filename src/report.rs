//! Plain-text rendering of reports and per-turn notifications.
//!
//! Unknown values render as `-`. Nothing here touches state or the network.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::account::AccountSnapshot;
use crate::usage::{lenient, SessionStats, TurnCharge, UsageReport, ALL_SCOPE};

pub const TOAST_TITLE: &str = "PackyCost";
pub const CLEAR_SESSION_TEXT: &str = "PackyCost: usage records for this session were cleared.";
pub const CLEAR_ALL_TEXT: &str = "PackyCost: usage records for all sessions were cleared.";

const DIVIDER: &str = "------------------------------------";

/// Everything a usage report shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    /// Fresh snapshot, or the last persisted one when the poll failed
    pub snapshot: Option<AccountSnapshot>,
    /// `true` when `snapshot` did not come from this poll
    pub snapshot_cached: bool,
    pub usage: UsageReport,
}

/// `$12.34`, or `-` when unknown.
pub fn money(value: Option<f64>) -> String {
    match value.and_then(lenient::finite) {
        Some(amount) => format!("${:.2}", amount),
        None => "-".to_string(),
    }
}

/// `$0.1234`, or `-` when unknown. Used for per-turn and per-session figures.
pub fn money_fine(value: Option<f64>) -> String {
    match value.and_then(lenient::finite) {
        Some(amount) => format!("${:.4}", amount),
        None => "-".to_string(),
    }
}

/// Accumulated cost; nothing spent renders as `-`.
pub fn stat_money(value: f64) -> String {
    if value.is_finite() && value > 0.0 {
        format!("${:.4}", value)
    } else {
        "-".to_string()
    }
}

/// Thousands-separated count; zero and unknown render as `-`.
pub fn count(value: Option<u64>) -> String {
    match value {
        Some(n) if n > 0 => group_thousands(n),
        _ => "-".to_string(),
    }
}

pub fn latency_ms(value: Option<f64>) -> String {
    match value.and_then(lenient::finite) {
        Some(ms) => format!("{} ms", ms.round() as i64),
        None => "-".to_string(),
    }
}

/// `2026/2/5` in local time, or `-` when the value is not a recognizable date.
pub fn format_date(value: Option<&str>) -> String {
    value
        .and_then(parse_local_date)
        .map(|date| date.format("%Y/%-m/%-d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// `start ~ end`, or `-` unless both ends are known.
pub fn format_range(start: Option<&str>, end: Option<&str>) -> String {
    let start = format_date(start);
    let end = format_date(end);
    if start == "-" || end == "-" {
        return "-".to_string();
    }
    format!("{} ~ {}", start, end)
}

pub fn render_report(view: &ReportView) -> String {
    let mut lines = Vec::new();

    match &view.snapshot {
        Some(snapshot) => {
            lines.push("Account".to_string());
            lines.push(format!("- Email: {}", snapshot.email.as_deref().unwrap_or("-")));
            lines.push(format!(
                "- Registered: {}",
                format_date(snapshot.created_at.as_deref())
            ));
            lines.push(String::new());
            lines.push("Usage".to_string());
            lines.push(format!("- Daily budget: {}", money(snapshot.daily_budget)));
            lines.push(format!(
                "- This week: {} / {}",
                money(snapshot.weekly_spent),
                money(snapshot.weekly_budget)
            ));
            lines.push(format!(
                "  Window: {}",
                format_range(
                    snapshot.weekly_window_start.as_deref(),
                    snapshot.weekly_window_end.as_deref()
                )
            ));
            lines.push(format!("- Today: {}", money(snapshot.daily_spent)));
            lines.push(format!("- Total: {}", money(snapshot.total_spent)));
            if view.snapshot_cached {
                lines.push("Account request failed; figures are from the last successful poll.".to_string());
            } else {
                lines.push("Figures above are reported by the PackyCode account.".to_string());
            }
        }
        None => lines.push("Account request failed.".to_string()),
    }

    lines.push(DIVIDER.to_string());
    lines.push(stats_line("Session", &view.usage.session));
    lines.push(stats_line(&scope_label(&view.usage.scope), &view.usage.aggregate));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Body of the notification shown after an accounted assistant turn.
pub fn render_toast(charge: &TurnCharge, snapshot: Option<&AccountSnapshot>) -> String {
    let tokens = &charge.tokens;
    let metrics = format!(
        "in {} | out {} | cache {} | first token {}",
        count(tokens.input),
        count(tokens.output),
        count(tokens.cache_total()),
        latency_ms(charge.first_token_latency)
    );
    let cost = format!(
        "This turn: {} | Session: {}",
        money_fine(charge.delta),
        money_fine(charge.session_total)
    );
    let today = format!(
        "Today: {} / {}",
        money_fine(snapshot.and_then(|s| s.daily_spent)),
        money_fine(snapshot.and_then(|s| s.daily_budget))
    );
    format!("{}\n{}\n{}", metrics, cost, today)
}

fn stats_line(label: &str, stats: &SessionStats) -> String {
    format!(
        "{}: in {} | out {} | cache {} | first token {} avg | cost {}",
        label,
        count(Some(stats.input_tokens)),
        count(Some(stats.output_tokens)),
        count(Some(stats.cache_tokens)),
        latency_ms(stats.average_latency()),
        stat_money(stats.cost)
    )
}

fn scope_label(scope: &str) -> String {
    if scope == ALL_SCOPE {
        "All providers".to_string()
    } else {
        format!("Provider {}", scope)
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn parse_local_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Local).date_naive());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, pattern) {
            return Some(dt.date());
        }
    }
    let millis = value.parse::<f64>().ok().and_then(lenient::finite)?;
    DateTime::from_timestamp_millis(millis as i64).map(|dt| dt.with_timezone(&Local).date_naive())
}
