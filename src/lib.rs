//! Delta cost accounting for coding-agent sessions billed through a
//! cumulative account balance.
//!
//! The remote account only exposes running totals. Each user turn records the
//! current total as the session's baseline; each completed assistant turn is
//! charged the difference between a fresh total and that baseline. Token
//! counts and first-token latency are accumulated alongside, per session and
//! per aggregate scope, in a JSON state file that survives restarts.

pub mod account;
pub mod config;
pub mod error;
pub mod host;
pub mod report;
pub mod service;
pub mod state;
pub mod usage;

pub use account::{AccountSnapshot, HttpSnapshotSource, SnapshotSource};
pub use config::Config;
pub use error::{CostError, Result};
pub use host::{HostEvent, HostMessage, Notifier};
pub use report::ReportView;
pub use service::{AccountingService, EventOutcome};
pub use state::{JsonFileStore, MemoryStore, PersistentState, StateStore};
pub use usage::{DedupGate, DeltaAccumulator, EventCorrelator, SessionStats, TokenCounts};
