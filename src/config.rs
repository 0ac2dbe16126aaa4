//! Store configuration.

use crate::error::{DbError, DbResult};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_regex_cache_size() -> usize {
    128
}

/// Options for opening a [`DocStore`](crate::DocStore).
///
/// ```toml
/// path = "./data/app.db"   # omit for an in-memory store
/// busy_timeout_ms = 5000
/// regex_cache_size = 128
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Database file; `None` opens a private in-memory database.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// How long a statement waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Number of compiled `$regex` patterns kept per connection.
    #[serde(default = "default_regex_cache_size")]
    pub regex_cache_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            regex_cache_size: default_regex_cache_size(),
        }
    }
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    pub fn from_toml_str(source: &str) -> DbResult<Self> {
        let config: StoreConfig =
            toml::from_str(source).map_err(|e| DbError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn load<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let source = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            DbError::ConfigError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> DbResult<()> {
        self.regex_cache_capacity().map(|_| ())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub(crate) fn regex_cache_capacity(&self) -> DbResult<NonZeroUsize> {
        NonZeroUsize::new(self.regex_cache_size).ok_or_else(|| {
            DbError::ConfigError("regex_cache_size must be greater than zero".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert!(config.path.is_none());
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.regex_cache_size, 128);
    }

    #[test]
    fn test_from_toml() {
        let config = StoreConfig::from_toml_str(
            r#"
            path = "/tmp/app.db"
            busy_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.path, Some(PathBuf::from("/tmp/app.db")));
        assert_eq!(config.busy_timeout_ms, 250);
        assert_eq!(config.regex_cache_size, 128);
    }

    #[test]
    fn test_empty_toml_is_in_memory() {
        assert_eq!(StoreConfig::from_toml_str("").unwrap(), StoreConfig::in_memory());
    }

    #[test]
    fn test_rejects_zero_cache() {
        assert!(matches!(
            StoreConfig::from_toml_str("regex_cache_size = 0"),
            Err(DbError::ConfigError(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(matches!(
            StoreConfig::from_toml_str("pth = \"x\""),
            Err(DbError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("docsql.toml");
        std::fs::write(&file, "busy_timeout_ms = 10\n").unwrap();
        let config = StoreConfig::load(&file).unwrap();
        assert_eq!(config.busy_timeout_ms, 10);

        assert!(StoreConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
