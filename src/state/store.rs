use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::PersistentState;
use crate::error::{CostError, Result};

/// Whole-record storage for [`PersistentState`].
///
/// `load` never fails: an absent, unreadable or malformed store reads as the
/// empty state. `save` is best-effort; failures are logged and dropped so a
/// lost write never interrupts event handling.
pub trait StateStore: Send + Sync {
    fn load(&self) -> PersistentState;
    fn save(&self, state: &PersistentState);
}

/// Pretty-printed JSON file, replaced wholesale on every save.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<PersistentState>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CostError::io(&self.path, e)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn write(&self, state: &PersistentState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| CostError::io(parent, e))?;
            }
        }

        let json = serde_json::to_string_pretty(state)?;

        // Sibling file first, then rename over the target.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| CostError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| CostError::io(&self.path, e))?;
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> PersistentState {
        match self.read() {
            Ok(Some(state)) => state,
            Ok(None) => PersistentState::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Unreadable state file, starting empty");
                PersistentState::default()
            }
        }
    }

    fn save(&self, state: &PersistentState) {
        if let Err(e) = self.write(state) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to save state");
        }
    }
}

/// In-process store, for embedding and tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<PersistentState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistentState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> PersistentState {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn save(&self, state: &PersistentState) {
        match self.state.lock() {
            Ok(mut current) => *current = state.clone(),
            Err(poisoned) => *poisoned.into_inner() = state.clone(),
        }
    }
}
