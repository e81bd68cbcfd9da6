use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use packycost::host::{HostEvent, HostMessage, JsonLinesNotifier};
use packycost::EventOutcome;

use crate::cli::AppContext;

/// Run the host protocol loop until stdin closes.
pub async fn run(ctx: &AppContext) -> Result<()> {
    let notifier = Arc::new(JsonLinesNotifier::stdout());
    let service = ctx.service(notifier.clone());

    tracing::info!(
        state = %ctx.state_file().display(),
        endpoint = %ctx.config.endpoint,
        "Watching host events"
    );

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("Failed to read host events")?;
        if read == 0 {
            break;
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping host event that is not valid UTF-8");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        let event: HostEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed host event");
                continue;
            }
        };

        if let EventOutcome::CommandHandled {
            command,
            session_id,
        } = service.handle_event(event).await
        {
            notifier.emit(&HostMessage::CommandHandled {
                command,
                session_id,
            });
        }
    }

    tracing::debug!("Host event stream closed");
    Ok(())
}
