use std::collections::HashSet;

/// First-call-wins gate over completed message ids.
///
/// Hosts re-deliver completion events; only the first delivery of a message
/// may be accounted and notified. The set lives in memory only, so a restart
/// opens the gate again.
#[derive(Debug, Default)]
pub struct DedupGate {
    seen: HashSet<String>,
}

impl DedupGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` exactly once per message id.
    pub fn should_notify(&mut self, message_id: &str) -> bool {
        if self.seen.contains(message_id) {
            return false;
        }
        self.seen.insert(message_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
