use serde::{Deserialize, Serialize};

use crate::usage::{lenient, TokenCounts};

/// One line of the host event feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostEvent {
    PartObserved(PartObserved),
    TurnCompleted(TurnCompleted),
    Command(CommandInvocation),
    #[serde(other)]
    Unknown,
}

/// A streamed part of a message became visible.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartObserved {
    pub message_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Epoch milliseconds
    #[serde(default, deserialize_with = "lenient::de_opt_f64")]
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[serde(other)]
    Other,
}

/// A message update. Assistant messages count as completed only once
/// `completed_at` is set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnCompleted {
    pub role: Role,
    pub message_id: String,
    pub session_id: String,
    #[serde(default)]
    pub provider_id: Option<String>,
    /// Epoch milliseconds
    #[serde(default, deserialize_with = "lenient::de_opt_f64")]
    pub created_at: Option<f64>,
    /// Epoch milliseconds
    #[serde(default, deserialize_with = "lenient::de_opt_f64")]
    pub completed_at: Option<f64>,
    #[serde(default)]
    pub tokens: Option<TokenPayload>,
}

impl TurnCompleted {
    pub fn token_counts(&self) -> TokenCounts {
        self.tokens
            .as_ref()
            .map(TokenCounts::from)
            .unwrap_or_default()
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TokenPayload {
    #[serde(deserialize_with = "lenient::de_opt_u64")]
    pub input: Option<u64>,
    #[serde(deserialize_with = "lenient::de_opt_u64")]
    pub output: Option<u64>,
    pub cache: Option<CachePayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CachePayload {
    #[serde(deserialize_with = "lenient::de_opt_u64")]
    pub read: Option<u64>,
    #[serde(deserialize_with = "lenient::de_opt_u64")]
    pub write: Option<u64>,
}

impl From<&TokenPayload> for TokenCounts {
    fn from(payload: &TokenPayload) -> Self {
        let cache = payload.cache.clone().unwrap_or_default();
        TokenCounts {
            input: payload.input,
            output: payload.output,
            cache_read: cache.read,
            cache_write: cache.write,
        }
    }
}

/// Commands the host forwards instead of handling itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandKind {
    #[serde(alias = "cost")]
    ReportCurrentUsage,
    #[serde(alias = "clearcost")]
    ClearCurrentSessionUsage,
    #[serde(alias = "clearallcost")]
    ClearAllUsage,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandInvocation {
    pub command: CommandKind,
    #[serde(default)]
    pub session_id: Option<String>,
}
