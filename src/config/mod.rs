//! Typed configuration from environment variables or a TOML file.
//!
//! Nothing here is required: every field has a default, and the catcher
//! itself works without any configuration. `Config::apply` is the one place
//! that touches process-wide state (the panic hook).

use crate::error::{Error, Result};
use crate::hook::{self, HookMode};
use crate::telemetry::TelemetryConfig;
use serde::Deserialize;
use std::env::VarError;
use std::path::Path;

pub const LOG_LEVEL_VAR: &str = "CATCHER_LOG_LEVEL";
pub const HOOK_MODE_VAR: &str = "CATCHER_HOOK_MODE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub hook_mode: HookMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            hook_mode: HookMode::default(),
        }
    }
}

/// Top-level TOML wrapper.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    catcher: Config,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to defaults; a malformed hook mode or a
    /// value that is not valid UTF-8 is an error.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let hook_mode = match env_var(HOOK_MODE_VAR)? {
            Some(value) => value.parse()?,
            None => defaults.hook_mode,
        };
        Ok(Self {
            log_level: env_var(LOG_LEVEL_VAR)?.unwrap_or(defaults.log_level),
            hook_mode,
        })
    }

    /// Like [`from_env`](Self::from_env), after loading `.env` from the
    /// working directory if there is one.
    pub fn from_dotenv() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Parse the `[catcher]` table of a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| Error::Config(format!("bad config: {e}")))?;
        Ok(file.catcher)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("bad config {}: {e}", path.display())))?;
        Ok(file.catcher)
    }

    pub fn telemetry(&self) -> TelemetryConfig {
        TelemetryConfig {
            log_level: self.log_level.clone(),
        }
    }

    /// Install the catch-scope panic hook with the configured mode.
    pub fn apply(&self) {
        hook::install(self.hook_mode);
    }
}

fn env_var(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(Error::Config(format!(
            "environment variable {name} is not valid UTF-8"
        ))),
    }
}
