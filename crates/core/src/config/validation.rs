//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_version` is 0
    /// - a cache prefix is empty, or both prefixes are equal
    /// - `origin` is not an http(s) URL
    /// - `root_document`, a precache entry, or a path prefix is not root-relative
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_version == 0 {
            return Err(invalid("cache_version", "must be greater than 0"));
        }

        if self.static_cache_prefix.is_empty() {
            return Err(invalid("static_cache_prefix", "must not be empty"));
        }
        if self.dynamic_cache_prefix.is_empty() {
            return Err(invalid("dynamic_cache_prefix", "must not be empty"));
        }
        if self.static_cache_prefix == self.dynamic_cache_prefix {
            return Err(invalid("dynamic_cache_prefix", "must differ from static_cache_prefix"));
        }

        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(invalid("origin", format!("unsupported scheme: {}", origin.scheme())));
        }

        if !self.root_document.starts_with('/') {
            return Err(invalid("root_document", "must start with '/'"));
        }

        // Absolute third-party URLs are allowed in the manifest, anything else must be root-relative.
        if let Some(entry) = self
            .precache
            .iter()
            .find(|u| !u.starts_with('/') && url::Url::parse(u).is_err())
        {
            return Err(invalid("precache", format!("entry {entry:?} is neither root-relative nor absolute")));
        }

        if let Some(prefix) = self.static_path_prefixes.iter().find(|p| !p.starts_with('/')) {
            return Err(invalid("static_path_prefixes", format!("{prefix:?} must start with '/'")));
        }
        if !self.api_path_prefix.starts_with('/') {
            return Err(invalid("api_path_prefix", "must start with '/'"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.precache.is_empty() {
            tracing::warn!("precache manifest is empty; navigations will not work offline");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_field(config: AppConfig) -> String {
        match config.validate() {
            Err(ConfigError::Invalid { field, .. }) => field,
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_version_zero() {
        let config = AppConfig { cache_version: 0, ..Default::default() };
        assert_eq!(invalid_field(config), "cache_version");
    }

    #[test]
    fn test_validate_same_prefixes() {
        let config = AppConfig { dynamic_cache_prefix: "static".into(), ..Default::default() };
        assert_eq!(invalid_field(config), "dynamic_cache_prefix");
    }

    #[test]
    fn test_validate_origin() {
        let config = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert_eq!(invalid_field(config), "origin");

        let config = AppConfig { origin: "ftp://example.com".into(), ..Default::default() };
        assert_eq!(invalid_field(config), "origin");
    }

    #[test]
    fn test_validate_precache_entries() {
        let config = AppConfig { precache: vec!["static/js/main.js".into()], ..Default::default() };
        assert_eq!(invalid_field(config), "precache");

        let config = AppConfig {
            precache: vec!["/".into(), "https://cdnjs.cloudflare.com/lib.js".into()],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_prefixes() {
        let config = AppConfig { static_path_prefixes: vec!["static/".into()], ..Default::default() };
        assert_eq!(invalid_field(config), "static_path_prefixes");

        let config = AppConfig { api_path_prefix: "api/".into(), ..Default::default() };
        assert_eq!(invalid_field(config), "api_path_prefix");
    }

    #[test]
    fn test_validate_timeout_bounds() {
        let config = AppConfig { timeout_ms: 50, ..Default::default() };
        assert_eq!(invalid_field(config), "timeout_ms");

        let config = AppConfig { timeout_ms: 301_000, ..Default::default() };
        assert_eq!(invalid_field(config), "timeout_ms");

        let config = AppConfig { timeout_ms: 100, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_max_bytes() {
        let config = AppConfig { max_bytes: 0, ..Default::default() };
        assert_eq!(invalid_field(config), "max_bytes");

        let config = AppConfig { max_bytes: 51 * 1024 * 1024, ..Default::default() };
        assert_eq!(invalid_field(config), "max_bytes");
    }

    #[test]
    fn test_validate_empty_user_agent() {
        let config = AppConfig { user_agent: String::new(), ..Default::default() };
        assert_eq!(invalid_field(config), "user_agent");
    }
}
