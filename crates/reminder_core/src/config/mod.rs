use crate::error::AppError;
use crate::storage::json_store::app_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "REMINDAPP_CONFIG_PATH";
const MIRROR_FILE_NAME: &str = "worker.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Notification permission. When off, no timer is armed and nothing is
    /// fired or marked; reminders wait until it is turned back on.
    #[serde(default = "enabled")]
    pub notifications: bool,
    /// Host the background worker in `watch`.
    #[serde(default = "enabled")]
    pub worker: bool,
    /// Worker falls back to a pending-count notification while its mirror
    /// is empty.
    #[serde(default = "enabled")]
    pub legacy_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_path: Option<PathBuf>,
}

fn enabled() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notifications: true,
            worker: true,
            legacy_fallback: true,
            mirror_path: None,
        }
    }
}

impl Config {
    /// Where the worker keeps its mirror.
    pub fn resolved_mirror_path(&self) -> Result<PathBuf, AppError> {
        match &self.mirror_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dir()?.join(MIRROR_FILE_NAME)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub notifications: Option<bool>,
    pub worker: Option<bool>,
    pub legacy_fallback: Option<bool>,
    pub mirror_path: Option<PathBuf>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    Ok(app_dir()?.join(CONFIG_FILE_NAME))
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(notifications) = overrides.notifications {
        merged.notifications = notifications;
    }
    if let Some(worker) = overrides.worker {
        merged.worker = worker;
    }
    if let Some(legacy_fallback) = overrides.legacy_fallback {
        merged.legacy_fallback = legacy_fallback;
    }
    if let Some(mirror_path) = overrides.mirror_path.as_ref() {
        merged.mirror_path = Some(mirror_path.clone());
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::{
        Config, ConfigOverrides, load_config_from_path, load_config_with_fallback_from_path,
        merge_overrides,
    };
    use std::fs;
    use std::path::PathBuf;

    #[test]
    fn load_config_missing_returns_defaults_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config_with_fallback_from_path(&dir.path().join("config.json"));

        assert_eq!(result.config, Config::default());
        assert!(result.error.is_none());
    }

    #[test]
    fn load_config_invalid_returns_defaults_and_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ invalid json ").unwrap();

        let result = load_config_with_fallback_from_path(&path);

        assert_eq!(result.config, Config::default());
        assert_eq!(result.error.map(|err| err.code()), Some("invalid_data"));
    }

    #[test]
    fn load_config_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "worker": false, "mirror_path": "/tmp/mirror.json" }"#).unwrap();

        let loaded = load_config_from_path(&path).unwrap();

        assert!(loaded.notifications);
        assert!(!loaded.worker);
        assert!(loaded.legacy_fallback);
        assert_eq!(loaded.mirror_path, Some(PathBuf::from("/tmp/mirror.json")));
    }

    #[test]
    fn explicit_mirror_path_wins() {
        let config = Config {
            mirror_path: Some(PathBuf::from("/tmp/mirror.json")),
            ..Config::default()
        };
        assert_eq!(
            config.resolved_mirror_path().unwrap(),
            PathBuf::from("/tmp/mirror.json")
        );
    }

    #[test]
    fn merge_overrides_replaces_only_given_fields() {
        let base = Config {
            notifications: true,
            worker: true,
            legacy_fallback: false,
            mirror_path: None,
        };
        let overrides = ConfigOverrides {
            worker: Some(false),
            mirror_path: Some(PathBuf::from("/tmp/m.json")),
            ..ConfigOverrides::default()
        };

        let merged = merge_overrides(&base, &overrides);

        assert!(merged.notifications);
        assert!(!merged.worker);
        assert!(!merged.legacy_fallback);
        assert_eq!(merged.mirror_path, Some(PathBuf::from("/tmp/m.json")));
        assert!(base.worker);
    }

    #[test]
    fn merge_overrides_with_empty_overrides_returns_clone() {
        let base = Config::default();
        assert_eq!(merge_overrides(&base, &ConfigOverrides::default()), base);
    }
}
