//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use docsync_core::{CACHE_DIR_ENV, CACHE_FILE};
use std::path::PathBuf;

/// Environment variable overriding the mirror worker count.
pub const CONCURRENCY_ENV: &str = "DOCSYNC_CONCURRENCY";

/// Environment variable overriding the commit attempt budget.
pub const MAX_ATTEMPTS_ENV: &str = "DOCSYNC_MAX_ATTEMPTS";

/// Default number of mirror workers.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Default number of commit attempts before giving up.
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 10;

/// Configuration for mirror and commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Number of documents fetched in parallel during a mirror.
    pub concurrency: usize,
    /// Number of commit attempts before reporting a conflict.
    pub max_commit_attempts: u32,
    /// Cache file location; the platform default when `None`.
    pub cache_path: Option<PathBuf>,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            max_commit_attempts: DEFAULT_MAX_COMMIT_ATTEMPTS,
            cache_path: None,
        }
    }

    /// Sets the mirror worker count (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Sets the commit attempt budget (at least 1).
    pub fn with_max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }

    /// Sets the cache file location.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Creates a configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a variable is set to an invalid value.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SyncResult<Self> {
        let mut config = Self::new();
        if let Some(value) = lookup(CONCURRENCY_ENV) {
            config.concurrency = parse_positive(CONCURRENCY_ENV, &value)?;
        }
        if let Some(value) = lookup(MAX_ATTEMPTS_ENV) {
            config.max_commit_attempts = parse_positive(MAX_ATTEMPTS_ENV, &value)?;
        }
        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|d| !d.is_empty()) {
            config.cache_path = Some(PathBuf::from(dir).join(CACHE_FILE));
        }
        Ok(config)
    }
}

fn parse_positive<T>(key: &str, value: &str) -> SyncResult<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match value.trim().parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(SyncError::config(format!(
            "{key} must be a positive integer, got {value:?}"
        ))),
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.concurrency, 20);
        assert_eq!(config.max_commit_attempts, 10);
        assert!(config.cache_path.is_none());
    }

    #[test]
    fn builder() {
        let config = SyncConfig::new()
            .with_concurrency(0)
            .with_max_commit_attempts(3)
            .with_cache_path("/tmp/tree.json");
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.max_commit_attempts, 3);
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/tree.json")));
    }

    #[test]
    fn environment_overrides() {
        let config = SyncConfig::from_lookup(lookup(&[
            (CONCURRENCY_ENV, "4"),
            (MAX_ATTEMPTS_ENV, " 2 "),
            (CACHE_DIR_ENV, "/var/cache/docsync"),
        ]))
        .unwrap();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.max_commit_attempts, 2);
        assert_eq!(
            config.cache_path,
            Some(PathBuf::from("/var/cache/docsync/tree.json"))
        );
    }

    #[test]
    fn invalid_environment_values() {
        for bad in ["0", "-1", "many", ""] {
            let err = SyncConfig::from_lookup(lookup(&[(CONCURRENCY_ENV, bad)])).unwrap_err();
            assert!(matches!(err, SyncError::Config { .. }), "{bad}");
        }
    }
}
