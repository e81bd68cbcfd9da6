pub mod commands;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use packycost::config::{config_path, load_config};
use packycost::{AccountingService, Config, HttpSnapshotSource, JsonFileStore, Notifier};

/// Resolved settings shared by every subcommand.
pub struct AppContext {
    pub config: Config,
    pub config_file: Option<PathBuf>,
}

impl AppContext {
    pub fn load(
        config_file: Option<&Path>,
        state_path: Option<String>,
        api_key: Option<String>,
        endpoint: Option<String>,
    ) -> Self {
        let config = load_config(config_file).with_overrides(endpoint, api_key, state_path);
        Self {
            config,
            config_file: config_path(config_file),
        }
    }

    pub fn state_file(&self) -> PathBuf {
        self.config.state_file()
    }

    pub fn service(&self, notifier: Arc<dyn Notifier>) -> AccountingService {
        AccountingService::new(
            self.config.clone(),
            Arc::new(HttpSnapshotSource::from_config(&self.config)),
            Arc::new(JsonFileStore::new(self.state_file())),
            notifier,
        )
    }
}
