use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;

use super::events::CommandKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Info,
    /// The account could not be read, so the turn's cost is unknown
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toast {
    pub title: String,
    pub message: String,
    pub variant: ToastVariant,
    pub duration_ms: u64,
}

/// One line written back to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostMessage {
    Toast(Toast),
    #[serde(rename_all = "camelCase")]
    SessionMessage { session_id: String, text: String },
    /// The command was fully handled; the host must not process it further.
    #[serde(rename_all = "camelCase")]
    CommandHandled {
        command: CommandKind,
        session_id: Option<String>,
    },
}

/// Pushes rendered text to the host. Fire-and-forget: implementations
/// swallow their own failures.
pub trait Notifier: Send + Sync {
    fn toast(&self, toast: Toast);
    fn post_to_session(&self, session_id: &str, text: &str);
}

/// Writes [`HostMessage`]s as JSON lines.
pub struct JsonLinesNotifier<W: Write + Send> {
    out: Mutex<W>,
}

impl JsonLinesNotifier<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesNotifier<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn emit(&self, message: &HostMessage) {
        let line = match serde_json::to_string(message) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode host message");
                return;
            }
        };

        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            tracing::debug!(error = %e, "Host output closed, message dropped");
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> Notifier for JsonLinesNotifier<W> {
    fn toast(&self, toast: Toast) {
        self.emit(&HostMessage::Toast(toast));
    }

    fn post_to_session(&self, session_id: &str, text: &str) {
        self.emit(&HostMessage::SessionMessage {
            session_id: session_id.to_string(),
            text: text.to_string(),
        });
    }
}

/// Drops everything; used when output goes straight to the terminal instead.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn toast(&self, toast: Toast) {
        tracing::debug!(title = %toast.title, "Toast dropped");
    }

    fn post_to_session(&self, session_id: &str, _text: &str) {
        tracing::debug!(session_id, "Session message dropped");
    }
}
