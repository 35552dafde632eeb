//! Service configuration.

use std::path::PathBuf;

use vitrine_core::ConfigError;
use vitrine_storage::CacheConfig;

/// Which result store backs the query cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    /// Process-local map. Lost on restart.
    Memory,
    /// LMDB environment on disk.
    Lmdb,
}

impl CacheBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackendKind::Memory => "memory",
            CacheBackendKind::Lmdb => "lmdb",
        }
    }
}

impl std::str::FromStr for CacheBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(CacheBackendKind::Memory),
            "lmdb" => Ok(CacheBackendKind::Lmdb),
            _ => Err(ConfigError::InvalidValue {
                field: "VITRINE_CACHE_BACKEND".to_string(),
                value: s.to_string(),
                reason: "expected 'memory' or 'lmdb'".to_string(),
            }),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Result store backend
    pub cache_backend: CacheBackendKind,

    /// Directory of the LMDB environment. Required for the LMDB backend.
    pub cache_path: Option<PathBuf>,

    /// LMDB map size in megabytes
    pub cache_max_size_mb: usize,

    /// Query cache settings
    pub cache: CacheConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_backend: CacheBackendKind::Memory,
            cache_path: None,
            cache_max_size_mb: 512,
            cache: CacheConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Use the in-memory result store.
    pub fn with_memory_cache(mut self) -> Self {
        self.cache_backend = CacheBackendKind::Memory;
        self.cache_path = None;
        self
    }

    /// Use an LMDB result store rooted at `path`.
    pub fn with_lmdb_cache(mut self, path: impl Into<PathBuf>, max_size_mb: usize) -> Self {
        self.cache_backend = CacheBackendKind::Lmdb;
        self.cache_path = Some(path.into());
        self.cache_max_size_mb = max_size_mb;
        self
    }

    /// Replace the query cache settings.
    pub fn with_cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `VITRINE_CACHE_BACKEND`: `memory` or `lmdb` (default: memory)
    /// - `VITRINE_CACHE_PATH`: LMDB directory
    /// - `VITRINE_CACHE_MAX_SIZE_MB`: LMDB map size (default: 512)
    /// - plus everything [`CacheConfig::from_env`] reads
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let cache_backend = match lookup("VITRINE_CACHE_BACKEND") {
            Some(raw) => raw.parse()?,
            None => defaults.cache_backend,
        };

        let cache_path = lookup("VITRINE_CACHE_PATH")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let cache_max_size_mb = match lookup("VITRINE_CACHE_MAX_SIZE_MB") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidValue {
                    field: "VITRINE_CACHE_MAX_SIZE_MB".to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })?,
            None => defaults.cache_max_size_mb,
        };

        let config = Self {
            cache_backend,
            cache_path,
            cache_max_size_mb,
            cache: CacheConfig::from_lookup(&lookup)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;

        if self.cache_backend == CacheBackendKind::Lmdb {
            if self.cache_path.is_none() {
                return Err(ConfigError::MissingRequired {
                    field: "VITRINE_CACHE_PATH".to_string(),
                });
            }
            if self.cache_max_size_mb == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "VITRINE_CACHE_MAX_SIZE_MB".to_string(),
                    value: "0".to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup_from(pairs: &[(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        let env: HashMap<&'static str, &'static str> = pairs.iter().copied().collect();
        move |key| env.get(key).map(|v| v.to_string())
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup_from(&[])).expect("defaults should load");
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.cache_backend, CacheBackendKind::Memory);
    }

    #[test]
    fn test_lmdb_from_lookup() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("VITRINE_CACHE_BACKEND", "LMDB"),
            ("VITRINE_CACHE_PATH", "/var/lib/vitrine/cache"),
            ("VITRINE_CACHE_MAX_SIZE_MB", "64"),
            ("VITRINE_CACHE_TTL_SECS", "30"),
        ]))
        .expect("config should load");

        assert_eq!(config.cache_backend, CacheBackendKind::Lmdb);
        assert_eq!(
            config.cache_path,
            Some(PathBuf::from("/var/lib/vitrine/cache"))
        );
        assert_eq!(config.cache_max_size_mb, 64);
        assert_eq!(config.cache.entry_ttl, Duration::from_secs(30));
    }

    #[test]
    fn test_lmdb_requires_path() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("VITRINE_CACHE_BACKEND", "lmdb")]))
            .expect_err("lmdb without a path must fail");
        assert!(matches!(err, ConfigError::MissingRequired { .. }));
    }

    #[test]
    fn test_unknown_backend() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("VITRINE_CACHE_BACKEND", "redis")]))
            .expect_err("unknown backend must fail");
        assert!(matches!(err, ConfigError::InvalidValue { ref value, .. } if value == "redis"));
    }

    #[test]
    fn test_bad_cache_setting_propagates() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("VITRINE_PAGE_SIZE", "0")]))
            .expect_err("zero page size must fail");
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_builders() {
        let config = ServiceConfig::default()
            .with_lmdb_cache("/tmp/cache", 16)
            .with_cache_config(CacheConfig::new().with_page_size(5));
        assert_eq!(config.cache_backend, CacheBackendKind::Lmdb);
        assert_eq!(config.cache.page_size, 5);
        assert!(config.validate().is_ok());

        let config = config.with_memory_cache();
        assert!(config.cache_path.is_none());
        assert!(config.validate().is_ok());
    }
}
