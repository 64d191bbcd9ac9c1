//! Application-level configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{players::Rgb, session::SessionSettings};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_BUZZ_BACK_CONFIG_PATH";
const DEFAULT_BOARD_PATH: &str = "config/board.json";
const DEFAULT_SLOTS: u8 = 8;
const DEFAULT_REARM_DELAY_MS: u64 = 4_000;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Number of buzzer slots wired to the control board.
    pub slots: u8,
    /// Cooldown before buzzers are re-armed after a wrong answer.
    pub rearm_delay_ms: u64,
    /// Indicator colour of unbound slots.
    pub default_colour: Rgb,
    /// JSON board produced by the content loader.
    pub board_path: PathBuf,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        slots = app_config.slots,
                        rearm_delay_ms = app_config.rearm_delay_ms,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    fn parse(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Settings handed to the game session.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            slots: self.slots,
            default_colour: self.default_colour,
            rearm_delay: Duration::from_millis(self.rearm_delay_ms),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    slots: u8,
    rearm_delay_ms: u64,
    default_colour: Rgb,
    board_path: PathBuf,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            slots: DEFAULT_SLOTS,
            rearm_delay_ms: DEFAULT_REARM_DELAY_MS,
            default_colour: Rgb::WHITE,
            board_path: PathBuf::from(DEFAULT_BOARD_PATH),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            slots: value.slots,
            rearm_delay_ms: value.rearm_delay_ms,
            default_colour: value.default_colour,
            board_path: value.board_path,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = AppConfig::parse(r##"{"slots": 4, "default_colour": "#101010"}"##).unwrap();
        assert_eq!(config.slots, 4);
        assert_eq!(config.rearm_delay_ms, DEFAULT_REARM_DELAY_MS);
        assert_eq!(config.default_colour.to_string(), "#101010");
        assert_eq!(config.board_path, PathBuf::from(DEFAULT_BOARD_PATH));
    }

    #[test]
    fn invalid_colour_is_a_parse_error() {
        assert!(AppConfig::parse(r#"{"default_colour": "white"}"#).is_err());
    }

    #[test]
    fn session_settings_follow_config() {
        let settings = AppConfig::default().session_settings();
        assert_eq!(settings.slots, 8);
        assert_eq!(settings.rearm_delay, Duration::from_millis(4_000));
        assert_eq!(settings.default_colour, Rgb::WHITE);
    }
}
