use std::collections::{HashMap, VecDeque};

/// Upper bound on messages tracked at once. Messages that never complete
/// would otherwise accumulate for the life of the process.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Tracks the earliest part timestamp of each in-flight message, from which
/// first-token latency is derived once the message completes.
///
/// When full, the message that started being tracked first is dropped.
#[derive(Debug)]
pub struct EventCorrelator {
    first_part: HashMap<String, f64>,
    /// Tracked message ids in insertion order
    order: VecDeque<String>,
    capacity: usize,
}

impl EventCorrelator {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            first_part: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a part timestamp, keeping the minimum seen for the message.
    pub fn observe_part(&mut self, message_id: &str, timestamp: f64) {
        if !timestamp.is_finite() {
            return;
        }

        if let Some(current) = self.first_part.get_mut(message_id) {
            if timestamp < *current {
                *current = timestamp;
            }
            return;
        }

        if self.first_part.len() >= self.capacity {
            self.evict_oldest();
        }
        self.first_part.insert(message_id.to_string(), timestamp);
        self.order.push_back(message_id.to_string());
    }

    pub fn earliest_part(&self, message_id: &str) -> Option<f64> {
        self.first_part.get(message_id).copied()
    }

    /// Take the first-token latency for a completed message, releasing its entry.
    ///
    /// Returns `max(0, earliest part - created_at)` in the timestamps' unit, or
    /// `None` when either side is unknown.
    pub fn first_token_latency(&mut self, message_id: &str, created_at: Option<f64>) -> Option<f64> {
        let first_part = self.first_part.remove(message_id)?;
        self.order.retain(|id| id != message_id);
        let created_at = created_at.filter(|c| c.is_finite())?;
        Some((first_part - created_at).max(0.0))
    }

    pub fn len(&self) -> usize {
        self.first_part.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_part.is_empty()
    }

    fn evict_oldest(&mut self) {
        if let Some(id) = self.order.pop_front() {
            tracing::debug!(message_id = %id, "Evicting untracked message from latency correlator");
            self.first_part.remove(&id);
        }
    }
}

impl Default for EventCorrelator {
    fn default() -> Self {
        Self::new()
    }
}
