//! Configuration system (layered: defaults < config file < env).

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StepwiseError;

/// Global default config (lazy-initialized from file and env).
static DEFAULT_CONFIG: OnceLock<StepwiseConfig> = OnceLock::new();

/// Points at a config file, replacing the per-user default location.
pub const CONFIG_PATH_VAR: &str = "STEPWISE_CONFIG";
pub const MAX_ITERATIONS_VAR: &str = "STEPWISE_MAX_ITERATIONS";
pub const MAX_RETRIES_VAR: &str = "STEPWISE_MAX_RETRIES";
pub const STRICT_VAR: &str = "STEPWISE_STRICT";
pub const TIMEOUT_MS_VAR: &str = "STEPWISE_TIMEOUT_MS";

/// Defaults for [`GenerateOptions`](crate::generation::GenerateOptions).
///
/// Resolution order, later layers winning:
/// 1. Built-in defaults
/// 2. TOML file at `$STEPWISE_CONFIG`, or `config.toml` in the per-user
///    config directory
/// 3. `STEPWISE_*` environment variables (a `.env` file is loaded first)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StepwiseConfig {
    pub max_iterations: usize,
    pub max_retries: usize,
    pub strict: bool,
    pub timeout_ms: Option<u64>,
}

impl Default for StepwiseConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_retries: 1,
            strict: true,
            timeout_ms: None,
        }
    }
}

impl StepwiseConfig {
    /// Resolve every layer from the process environment.
    pub fn load() -> Result<Self, StepwiseError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Resolve every layer, reading variables through `lookup`.
    pub fn load_with<F>(lookup: F) -> Result<Self, StepwiseError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match lookup(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => match Self::default_path() {
                Some(path) => Self::read_optional(&path)?.unwrap_or_default(),
                None => Self::default(),
            },
        };
        base.apply_env(lookup)
    }

    /// Get (or create) the global default config.
    ///
    /// An unreadable configuration is logged and replaced by the defaults.
    pub fn global() -> &'static StepwiseConfig {
        DEFAULT_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                warn!(error = %e, "ignoring invalid stepwise configuration");
                Self::default()
            })
        })
    }

    /// `config.toml` in the per-user config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "stepwise")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, StepwiseError> {
        toml::from_str(raw)
            .map_err(|e| StepwiseError::Configuration(format!("invalid config file: {e}")))
    }

    /// Load a config file that must exist.
    pub fn from_file(path: &Path) -> Result<Self, StepwiseError> {
        Self::read_optional(path)?.ok_or_else(|| {
            StepwiseError::Configuration(format!("config file not found: {}", path.display()))
        })
    }

    fn read_optional(path: &Path) -> Result<Option<Self>, StepwiseError> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw).map(Some),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StepwiseError::Configuration(format!(
                "cannot read {}: {err}",
                path.display()
            ))),
        }
    }

    /// Overlay `STEPWISE_*` variables read through `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, StepwiseError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, MAX_ITERATIONS_VAR)? {
            self.max_iterations = v;
        }
        if let Some(v) = parse_var(&lookup, MAX_RETRIES_VAR)? {
            self.max_retries = v;
        }
        if let Some(raw) = lookup(STRICT_VAR) {
            self.strict = parse_bool(STRICT_VAR, &raw)?;
        }
        if let Some(v) = parse_var(&lookup, TIMEOUT_MS_VAR)? {
            self.timeout_ms = Some(v);
        }
        Ok(self)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, StepwiseError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| StepwiseError::Configuration(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, StepwiseError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(StepwiseError::Configuration(format!(
            "{key}={raw:?}: expected a boolean"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let config = StepwiseConfig::default()
            .apply_env(env(&[(MAX_ITERATIONS_VAR, "8"), (STRICT_VAR, "off"), (TIMEOUT_MS_VAR, "250")]))
            .unwrap();
        assert_eq!(config.max_iterations, 8);
        assert_eq!(config.max_retries, 1);
        assert!(!config.strict);
        assert_eq!(config.timeout_ms, Some(250));
    }

    #[test]
    fn malformed_values_are_configuration_errors() {
        let err = StepwiseConfig::default()
            .apply_env(env(&[(MAX_RETRIES_VAR, "many")]))
            .unwrap_err();
        assert!(matches!(err, StepwiseError::Configuration(ref m) if m.contains(MAX_RETRIES_VAR)));

        assert!(StepwiseConfig::default().apply_env(env(&[(STRICT_VAR, "maybe")])).is_err());
        assert!(StepwiseConfig::from_toml_str("max_iteration = 3").is_err());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = StepwiseConfig::from_toml_str("max_retries = 4").unwrap();
        assert_eq!(config, StepwiseConfig { max_retries: 4, ..Default::default() });
    }
}
