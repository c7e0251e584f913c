use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "testpulse.yaml";
pub const DEFAULT_DB_PATH: &str = ".testpulse/results.db";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// Upper bound on how long a write waits for the SQLite lock.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            busy_timeout_ms: 5000,
        }
    }
}

/// Defaults for the analytics queries when the caller does not pass its own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Number of most recent finalized runs considered for flaky detection.
    pub window: u32,
    pub min_fails: u32,
    /// Number of entries in the slowest-tests ranking.
    pub top_n: u32,
    /// Number of runs in the pass-rate trend.
    pub trend_limit: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            window: 20,
            min_fails: 2,
            top_n: 5,
            trend_limit: 10,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.busy_timeout_ms == 0 {
            return Err(ConfigError("store.busy_timeout_ms must be positive".into()));
        }
        let a = &self.analytics;
        for (name, v) in [
            ("analytics.window", a.window),
            ("analytics.top_n", a.top_n),
            ("analytics.trend_limit", a.trend_limit),
        ] {
            if v == 0 {
                return Err(ConfigError(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }

    /// Overlay `TESTPULSE_DB` and `TESTPULSE_BUSY_TIMEOUT_MS`.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|k| std::env::var(k).ok());
    }

    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TESTPULSE_DB") {
            if !v.trim().is_empty() {
                self.store.path = PathBuf::from(v);
            }
        }
        if let Some(v) = lookup("TESTPULSE_BUSY_TIMEOUT_MS") {
            match v.parse() {
                Ok(n) => self.store.busy_timeout_ms = n,
                Err(_) => tracing::warn!(
                    event = "config_env_ignored",
                    var = "TESTPULSE_BUSY_TIMEOUT_MS",
                    value = %v,
                    "not an integer"
                ),
            }
        }
    }
}

pub fn load_config(path: &Path, strict: bool) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;

    let mut ignored_keys = std::collections::BTreeSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(&raw);

    let mut cfg: Config = if raw.trim().is_empty() {
        Config::default()
    } else {
        serde_ignored::deserialize(deserializer, |p| {
            ignored_keys.insert(p.to_string());
        })
        .map_err(|e| ConfigError(format!("failed to parse YAML {}: {}", path.display(), e)))?
    };

    if !ignored_keys.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "unknown fields in strict mode: {:?} (file: {})",
                ignored_keys,
                path.display()
            )));
        }
        tracing::warn!(
            event = "config_unknown_keys",
            keys = ?ignored_keys,
            file = %path.display(),
            "ignored unknown config fields"
        );
    }

    // A relative store path is relative to the config file, not the cwd.
    if cfg.store.path.is_relative() {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            cfg.store.path = dir.join(&cfg.store.path);
        }
    }

    cfg.validate()?;
    Ok(cfg)
}

/// Load `explicit` if given, else `testpulse.yaml` in the working directory
/// when present, else the defaults.
pub fn load_or_default(explicit: Option<&Path>, strict: bool) -> Result<Config, ConfigError> {
    match explicit {
        Some(p) => load_config(p, strict),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if p.exists() {
                load_config(p, strict)
            } else {
                Ok(Config::default())
            }
        }
    }
}
