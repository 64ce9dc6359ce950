//! Pool and store configuration, persisted as JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::bvh::{BuildSettings, BvhOptions};
use crate::resources::DEFAULT_ERROR_LOG_CAPACITY;
use crate::util::Result;

/// Environment variable overriding [`Config::workers`].
pub const WORKERS_ENV: &str = "SCRIPTRACE_WORKERS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Worker thread count; `None` uses one per logical CPU.
    pub workers: Option<usize>,
    pub error_log_capacity: usize,
    /// Collect emissive triangles when building BVHs.
    pub collect_emitters: bool,
    pub build: BuildSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: None,
            error_log_capacity: DEFAULT_ERROR_LOG_CAPACITY,
            collect_emitters: true,
            build: BuildSettings::default(),
        }
    }
}

impl Config {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Load from a JSON file, falling back to defaults if it is missing or
    /// unreadable. Environment overrides are applied either way.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let mut config = match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Using default config");
                Self::default()
            }
        };
        config.apply_env();
        config
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Apply `SCRIPTRACE_WORKERS` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(WORKERS_ENV) {
            match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => self.workers = Some(n),
                _ => tracing::warn!(%value, "Ignoring invalid {WORKERS_ENV}"),
            }
        }
    }

    /// Effective pool size, at least one.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    pub fn bvh_options(&self) -> BvhOptions {
        BvhOptions { collect_emitters: self.collect_emitters }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.error_log_capacity, 128);
        assert!(config.collect_emitters);
        assert!(config.worker_count() >= 1);
        assert_eq!(Config { workers: Some(0), ..Default::default() }.worker_count(), 1);
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scriptrace.json");

        let mut config = Config { workers: Some(3), ..Default::default() };
        config.build.max_leaf_size = 8;
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "workers": 2, "build": { "bins": 4 } }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.workers, Some(2));
        assert_eq!(config.build.bins, 4);
        assert_eq!(config.build.max_leaf_size, 4);
        assert_eq!(config.error_log_capacity, 128);
    }

    #[test]
    fn test_corrupt_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ nope").unwrap();

        assert!(Config::load(&path).is_err());
        assert_eq!(Config::load_or_default(&path).error_log_capacity, 128);
    }

    #[test]
    fn test_env_override() {
        let mut config = Config::default();
        config.apply_env_with(|key| (key == WORKERS_ENV).then(|| "6".to_string()));
        assert_eq!(config.worker_count(), 6);

        config.apply_env_with(|_| Some("zero".to_string()));
        assert_eq!(config.workers, Some(6));
    }
}
