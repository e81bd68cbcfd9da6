use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;

use packycost::host::NullNotifier;
use packycost::report::{self as render, ReportView};
use packycost::SessionStats;

use crate::cli::AppContext;

/// Poll the account, persist the snapshot and print the usage report
pub async fn run(ctx: &AppContext, session: Option<&str>, json: bool) -> Result<()> {
    let service = ctx.service(Arc::new(NullNotifier));
    let view = service.report(session).await;

    if json {
        let out = serde_json::to_string_pretty(&view).context("Failed to encode report")?;
        println!("{}", out);
        return Ok(());
    }

    print_report(&view);
    Ok(())
}

fn print_report(view: &ReportView) {
    println!("\n{}", "  PackyCost Usage".bold().bright_yellow());
    println!("{}", "  ─────────────────────────────".dimmed());

    match &view.snapshot {
        Some(snapshot) => {
            println!(
                "\n  {} {}",
                "Account:".bold(),
                snapshot.email.as_deref().unwrap_or("-").cyan()
            );
            println!(
                "    {:<14} {}",
                "Registered",
                render::format_date(snapshot.created_at.as_deref())
            );
            println!(
                "    {:<14} {}",
                "Daily budget",
                render::money(snapshot.daily_budget).bright_yellow()
            );
            println!(
                "    {:<14} {} / {}",
                "This week",
                render::money(snapshot.weekly_spent).bright_yellow(),
                render::money(snapshot.weekly_budget)
            );
            println!(
                "    {:<14} {}",
                "Window",
                render::format_range(
                    snapshot.weekly_window_start.as_deref(),
                    snapshot.weekly_window_end.as_deref()
                )
                .dimmed()
            );
            println!(
                "    {:<14} {}",
                "Today",
                render::money(snapshot.daily_spent).bright_yellow()
            );
            println!(
                "    {:<14} {}",
                "Total",
                render::money(snapshot.total_spent).bright_yellow()
            );
            if view.snapshot_cached {
                println!(
                    "\n  {}",
                    "Account request failed; showing the last successful poll.".yellow()
                );
            }
        }
        None => println!("\n  {}", "Account request failed.".red()),
    }

    let session_label = match view.usage.session_id.as_deref() {
        Some(id) => format!("Session {}", id),
        None => "Session".to_string(),
    };
    println!();
    print_stats(&session_label, &view.usage.session);
    let scope_label = if view.usage.scope == packycost::usage::ALL_SCOPE {
        "All providers".to_string()
    } else {
        format!("Provider {}", view.usage.scope)
    };
    print_stats(&scope_label, &view.usage.aggregate);
    println!();
}

fn print_stats(label: &str, stats: &SessionStats) {
    println!("  {}", label.bold());
    println!(
        "    in {}  out {}  cache {}  first token {}  cost {}",
        render::count(Some(stats.input_tokens)).cyan(),
        render::count(Some(stats.output_tokens)).cyan(),
        render::count(Some(stats.cache_tokens)).cyan(),
        render::latency_ms(stats.average_latency()).dimmed(),
        render::stat_money(stats.cost).bright_yellow()
    );
}
