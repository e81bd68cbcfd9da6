use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::usage::lenient;

pub const APP_NAME: &str = "packycost";
const CONFIG_NAME: &str = "config";
const STATE_FILE_NAME: &str = "state.json";

pub const DEFAULT_ENDPOINT: &str = "https://codex.packycode.com/api/backend/users/info";
pub const DEFAULT_TOAST_DURATION_MS: u64 = 7000;

/// User configuration, stored as TOML by confy.
///
/// Unknown or invalid values fall back to defaults in [`Config::resolve`];
/// loading never fails the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Account info endpoint polled for cumulative totals
    pub endpoint: String,
    /// Bearer key for the endpoint; without it no snapshot is fetched
    pub api_key: Option<String>,
    /// Only assistant turns from this provider are accounted
    pub provider_key: Option<String>,
    /// How long notifications stay on screen
    #[serde(deserialize_with = "de_duration_ms")]
    pub toast_duration_ms: u64,
    /// Override for the state file location (`~` is expanded)
    pub state_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            provider_key: None,
            toast_duration_ms: DEFAULT_TOAST_DURATION_MS,
            state_path: None,
        }
    }
}

impl Config {
    /// Normalize user input: trim strings, drop blanks, replace an endpoint
    /// that is not a valid URL with the default.
    pub fn resolve(self) -> Self {
        let endpoint = non_blank(Some(self.endpoint))
            .filter(|e| match reqwest::Url::parse(e) {
                Ok(_) => true,
                Err(err) => {
                    tracing::warn!(endpoint = %e, error = %err, "Invalid endpoint, using default");
                    false
                }
            })
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Self {
            endpoint,
            api_key: non_blank(self.api_key),
            provider_key: non_blank(self.provider_key),
            toast_duration_ms: self.toast_duration_ms,
            state_path: non_blank(self.state_path),
        }
    }

    /// Apply command-line / environment overrides on top of the file values.
    pub fn with_overrides(
        mut self,
        endpoint: Option<String>,
        api_key: Option<String>,
        state_path: Option<String>,
    ) -> Self {
        if let Some(endpoint) = non_blank(endpoint) {
            self.endpoint = endpoint;
        }
        if let Some(api_key) = non_blank(api_key) {
            self.api_key = Some(api_key);
        }
        if let Some(state_path) = non_blank(state_path) {
            self.state_path = Some(state_path);
        }
        self.resolve()
    }

    /// State file location: `state_path` if set, else `<config dir>/packycost/state.json`.
    pub fn state_file(&self) -> PathBuf {
        match &self.state_path {
            Some(path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
            None => dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_NAME)
                .join(STATE_FILE_NAME),
        }
    }

    /// Aggregate scope reported by default: the provider filter, else every provider.
    pub fn report_scope(&self) -> &str {
        self.provider_key
            .as_deref()
            .unwrap_or(crate::usage::ALL_SCOPE)
    }

    /// The API key with everything but the last four characters hidden.
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| {
            let chars: Vec<char> = key.chars().collect();
            if chars.len() <= 4 {
                "****".to_string()
            } else {
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("****{}", tail)
            }
        })
    }
}

/// Load config from `path`, or from confy's default location.
///
/// A missing file is created with defaults; an unreadable or invalid one is
/// logged and replaced by defaults in memory.
pub fn load_config(path: Option<&Path>) -> Config {
    let loaded = match path {
        Some(path) => confy::load_path::<Config>(path),
        None => confy::load::<Config>(APP_NAME, CONFIG_NAME),
    };

    match loaded {
        Ok(config) => config.resolve(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    }
}

/// Location of the config file that [`load_config`] reads.
pub fn config_path(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => Some(path.to_path_buf()),
        None => confy::get_configuration_file_path(APP_NAME, CONFIG_NAME).ok(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn de_duration_ms<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(lenient::de_opt_u64(deserializer)?.unwrap_or(DEFAULT_TOAST_DURATION_MS))
}
