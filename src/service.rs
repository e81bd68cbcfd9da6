//! The accountant: routes host events through the dedup gate, the correlator
//! and the accumulator, and keeps the state file in step.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::account::{AccountSnapshot, SnapshotSource};
use crate::config::Config;
use crate::host::{
    CommandInvocation, CommandKind, HostEvent, Notifier, PartObserved, Role, Toast, ToastVariant,
    TurnCompleted,
};
use crate::report::{self, ReportView, CLEAR_ALL_TEXT, CLEAR_SESSION_TEXT, TOAST_TITLE};
use crate::state::{PersistentState, StateStore};
use crate::usage::{AssistantTurn, DedupGate, DeltaAccumulator, EventCorrelator, TurnCharge};

const UNKNOWN_PROVIDER: &str = "unknown";

/// What happened to one host event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// Not relevant: unknown type, other role, other provider, or a partial update
    Ignored,
    /// A streamed part was timestamped for latency
    Observed,
    /// A user turn pinned the session baseline
    Recorded,
    /// A completion that was already accounted
    Duplicate,
    Accounted(TurnCharge),
    /// The command ran; the host must not process it further
    CommandHandled {
        command: CommandKind,
        session_id: Option<String>,
    },
}

pub struct AccountingService {
    config: Config,
    source: Arc<dyn SnapshotSource>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    accumulator: DeltaAccumulator,
    correlator: Mutex<EventCorrelator>,
    dedup: Mutex<DedupGate>,
    write_lock: tokio::sync::Mutex<()>,
}

impl AccountingService {
    pub fn new(
        config: Config,
        source: Arc<dyn SnapshotSource>,
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let accumulator = DeltaAccumulator::new(config.report_scope());
        Self {
            config,
            source,
            store,
            notifier,
            accumulator,
            correlator: Mutex::new(EventCorrelator::new()),
            dedup: Mutex::new(DedupGate::new()),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn handle_event(&self, event: HostEvent) -> EventOutcome {
        match event {
            HostEvent::PartObserved(part) => self.observe_part(&part),
            HostEvent::TurnCompleted(turn) => match turn.role {
                Role::User => self.user_turn(&turn).await,
                Role::Assistant => self.assistant_turn(&turn).await,
                Role::Other => EventOutcome::Ignored,
            },
            HostEvent::Command(invocation) => self.handle_command(invocation).await,
            HostEvent::Unknown => EventOutcome::Ignored,
        }
    }

    pub fn observe_part(&self, part: &PartObserved) -> EventOutcome {
        let Some(timestamp) = part.timestamp else {
            return EventOutcome::Ignored;
        };
        lock(&self.correlator).observe_part(&part.message_id, timestamp);
        EventOutcome::Observed
    }

    async fn user_turn(&self, turn: &TurnCompleted) -> EventOutcome {
        let snapshot = self.source.fetch().await;

        self.mutate(|state| {
            self.accumulator
                .apply_user_turn(state, &turn.session_id, snapshot.as_ref());
            if snapshot.is_some() {
                state.last_snapshot = snapshot.clone();
            }
            state.last_session_id = Some(turn.session_id.clone());
        })
        .await;

        tracing::debug!(session_id = %turn.session_id, "User turn recorded");
        EventOutcome::Recorded
    }

    async fn assistant_turn(&self, turn: &TurnCompleted) -> EventOutcome {
        let provider_id = turn.provider_id.as_deref().unwrap_or(UNKNOWN_PROVIDER);
        if let Some(key) = self.config.provider_key.as_deref() {
            if provider_id != key {
                tracing::debug!(provider_id, "Turn from another provider ignored");
                return EventOutcome::Ignored;
            }
        }
        if !turn.is_completed() {
            return EventOutcome::Ignored;
        }
        if !lock(&self.dedup).should_notify(&turn.message_id) {
            tracing::debug!(message_id = %turn.message_id, "Duplicate completion suppressed");
            return EventOutcome::Duplicate;
        }

        let latency = lock(&self.correlator).first_token_latency(&turn.message_id, turn.created_at);
        let snapshot = self.source.fetch().await;

        let assistant = AssistantTurn {
            session_id: &turn.session_id,
            provider_id,
            tokens: turn.token_counts(),
            first_token_latency: latency,
        };
        let charge = self
            .mutate(|state| {
                let charge =
                    self.accumulator
                        .apply_assistant_turn(state, &assistant, snapshot.as_ref());
                if snapshot.is_some() {
                    state.last_snapshot = snapshot.clone();
                }
                state.last_session_id = Some(turn.session_id.clone());
                charge
            })
            .await;

        let variant = if snapshot.is_some() {
            ToastVariant::Info
        } else {
            ToastVariant::Warning
        };
        self.notifier.toast(Toast {
            title: TOAST_TITLE.to_string(),
            message: report::render_toast(&charge, snapshot.as_ref()),
            variant,
            duration_ms: self.config.toast_duration_ms,
        });

        tracing::info!(
            session_id = %charge.session_id,
            delta = ?charge.delta,
            "Assistant turn accounted"
        );
        EventOutcome::Accounted(charge)
    }

    pub async fn handle_command(&self, invocation: CommandInvocation) -> EventOutcome {
        let CommandInvocation {
            command,
            session_id,
        } = invocation;

        match command {
            CommandKind::ReportCurrentUsage => {
                let view = self.report(session_id.as_deref()).await;
                let target = session_id.as_deref().or(view.usage.session_id.as_deref());
                if let Some(target) = target {
                    self.notifier
                        .post_to_session(target, &report::render_report(&view));
                }
            }
            CommandKind::ClearCurrentSessionUsage => {
                let target = self
                    .mutate(|state| {
                        let target = session_id
                            .clone()
                            .or_else(|| state.last_session_id.clone());
                        if let Some(id) = target.as_deref() {
                            self.accumulator.clear_session(state, id);
                        }
                        target
                    })
                    .await;
                if let Some(target) = target {
                    tracing::info!(session_id = %target, "Session usage cleared");
                    self.notifier.post_to_session(&target, CLEAR_SESSION_TEXT);
                }
            }
            CommandKind::ClearAllUsage => {
                self.clear_all().await;
                if let Some(target) = session_id.as_deref() {
                    self.notifier.post_to_session(target, CLEAR_ALL_TEXT);
                }
            }
        }

        EventOutcome::CommandHandled {
            command,
            session_id,
        }
    }

    /// Poll the account and build a report for `session_id`, or for the last
    /// active session when none is given.
    ///
    /// A successful poll is persisted; a failed one falls back to the last
    /// persisted snapshot and leaves the state file untouched.
    pub async fn report(&self, session_id: Option<&str>) -> ReportView {
        let fresh = self.source.fetch().await;

        let state = match &fresh {
            Some(snapshot) => {
                self.mutate(|state| {
                    state.last_snapshot = Some(snapshot.clone());
                    state.clone()
                })
                .await
            }
            None => self.read().await,
        };

        let session_id = session_id
            .map(str::to_string)
            .or_else(|| state.last_session_id.clone());
        let usage = self.accumulator.report(&state, session_id.as_deref());

        let (snapshot, snapshot_cached) = match fresh {
            Some(snapshot) => (Some(snapshot), false),
            None => {
                let cached: Option<AccountSnapshot> = state.last_snapshot;
                let is_cached = cached.is_some();
                (cached, is_cached)
            }
        };

        ReportView {
            snapshot,
            snapshot_cached,
            usage,
        }
    }

    pub async fn clear_session(&self, session_id: &str) {
        self.mutate(|state| self.accumulator.clear_session(state, session_id))
            .await;
        tracing::info!(session_id, "Session usage cleared");
    }

    pub async fn clear_all(&self) {
        self.mutate(|state| self.accumulator.clear_all(state)).await;
        tracing::info!("All usage cleared");
    }

    async fn read(&self) -> PersistentState {
        let _guard = self.write_lock.lock().await;
        self.store.load()
    }

    /// Load, apply `f`, stamp and save, all under the write lock.
    async fn mutate<T>(&self, f: impl FnOnce(&mut PersistentState) -> T) -> T {
        let _guard = self.write_lock.lock().await;
        let mut state = self.store.load();
        let result = f(&mut state);
        state.touch();
        self.store.save(&state);
        result
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
