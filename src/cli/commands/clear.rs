use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Confirm;
use std::sync::Arc;

use packycost::host::NullNotifier;

use crate::cli::AppContext;

/// Clear one session, or everything after confirmation
pub async fn run(ctx: &AppContext, session: Option<&str>, all: bool, yes: bool) -> Result<()> {
    let service = ctx.service(Arc::new(NullNotifier));

    if all {
        if !yes {
            let confirmed = Confirm::new()
                .with_prompt("Clear usage records for every session?")
                .default(false)
                .interact()
                .context("Failed to read confirmation")?;
            if !confirmed {
                println!("[packycost] Clear cancelled.");
                return Ok(());
            }
        }
        service.clear_all().await;
        println!("{} All usage records cleared.", "[packycost]".green());
        return Ok(());
    }

    if let Some(session_id) = session {
        service.clear_session(session_id).await;
        println!(
            "{} Usage records for session {} cleared.",
            "[packycost]".green(),
            session_id.cyan()
        );
    }

    Ok(())
}
