//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

use crate::worker::{CacheNames, RoutePolicy};

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via SWCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the worker is registered for. Root-relative URLs resolve against it.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Cache version tag. Bumping it on deploy retires every older cache.
    #[serde(default = "default_cache_version")]
    pub cache_version: u32,

    #[serde(default = "default_static_prefix")]
    pub static_cache_prefix: String,

    #[serde(default = "default_dynamic_prefix")]
    pub dynamic_cache_prefix: String,

    /// Root-relative URLs fetched and stored at install time.
    ///
    /// Must match the build output; one missing file fails the install.
    #[serde(default = "default_precache")]
    pub precache: Vec<String>,

    /// Document served for every navigation request.
    #[serde(default = "default_root_document")]
    pub root_document: String,

    /// Path prefixes routed as static assets.
    #[serde(default = "default_static_path_prefixes")]
    pub static_path_prefixes: Vec<String>,

    /// Third-party hosts routed as static assets.
    #[serde(default = "default_static_hosts")]
    pub static_hosts: Vec<String>,

    /// Path prefix routed network-first.
    #[serde(default = "default_api_path_prefix")]
    pub api_path_prefix: String,

    /// Fallback notification title when a push payload has none.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Icon and badge used for push notifications.
    #[serde(default = "default_notification_icon")]
    pub notification_icon: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SWCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SWCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via SWCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:4173".into()
}

fn default_cache_version() -> u32 {
    1
}

fn default_static_prefix() -> String {
    "static".into()
}

fn default_dynamic_prefix() -> String {
    "dynamic".into()
}

fn default_precache() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/static/js/main.js",
        "/static/css/main.css",
        "/assets/images/logo - sentientlabs.png",
        "/assets/fonts/Gilroy-Regular.ttf",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_root_document() -> String {
    "/index.html".into()
}

fn default_static_path_prefixes() -> Vec<String> {
    vec!["/static/".into(), "/assets/".into()]
}

fn default_static_hosts() -> Vec<String> {
    vec!["cdnjs.cloudflare.com".into()]
}

fn default_api_path_prefix() -> String {
    "/api/".into()
}

fn default_app_name() -> String {
    "SentientLabs".into()
}

fn default_notification_icon() -> String {
    "/assets/images/logo - sentientlabs.png".into()
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            cache_version: default_cache_version(),
            static_cache_prefix: default_static_prefix(),
            dynamic_cache_prefix: default_dynamic_prefix(),
            precache: default_precache(),
            root_document: default_root_document(),
            static_path_prefixes: default_static_path_prefixes(),
            static_hosts: default_static_hosts(),
            api_path_prefix: default_api_path_prefix(),
            app_name: default_app_name(),
            notification_icon: default_notification_icon(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Current static and dynamic cache names for the configured version.
    pub fn cache_names(&self) -> CacheNames {
        CacheNames::new(&self.static_cache_prefix, &self.dynamic_cache_prefix, self.cache_version)
    }

    /// Request classification rules.
    pub fn route_policy(&self) -> RoutePolicy {
        RoutePolicy {
            static_path_prefixes: self.static_path_prefixes.clone(),
            static_hosts: self.static_hosts.iter().map(|h| h.to_lowercase()).collect(),
            api_path_prefix: self.api_path_prefix.clone(),
        }
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an absolute URL.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWCACHE_`
    /// 2. TOML file from `SWCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
