//! Server settings.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed with `PORTCULLIS__` (nested keys separated
//! by `__`, e.g. `PORTCULLIS__SERVER__PORT=9000`).

use std::net::{AddrParseError, SocketAddr};
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use portcullis_core::cache::{CachePolicy, CachePolicyTable, CacheRoute, ResponseCacheConfig};
use portcullis_core::classify::DEFAULT_SENSITIVE_PATTERNS;
use portcullis_core::limiter::{DEFAULT_IDLE_TIMEOUT, DEFAULT_SWEEP_INTERVAL};
use portcullis_core::{ClassPolicies, PortcullisError, RateLimitPolicy};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the settings file.
pub const CONFIG_PATH_ENV: &str = "PORTCULLIS_CONFIG";

/// Settings file used when [`CONFIG_PATH_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/portcullis.toml";

const ENV_PREFIX: &str = "PORTCULLIS";
const ENV_SEPARATOR: &str = "__";

/// Error loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error(transparent)]
    Invalid(#[from] PortcullisError),

    #[error("invalid listen address: {0}")]
    Address(#[from] AddrParseError),
}

/// Root settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub rate_limit: RateLimitSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerSettings {
    /// Returns the listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr, SettingsError> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Requests allowed per window, plus burst capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PolicySettings {
    pub requests: u32,
    pub window_secs: u64,
    pub burst: u32,
}

impl From<PolicySettings> for RateLimitPolicy {
    fn from(p: PolicySettings) -> Self {
        RateLimitPolicy::new(p.requests, Duration::from_secs(p.window_secs), p.burst)
    }
}

impl From<RateLimitPolicy> for PolicySettings {
    fn from(p: RateLimitPolicy) -> Self {
        Self {
            requests: p.requests,
            window_secs: p.window_secs(),
            burst: p.burst,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub general: PolicySettings,
    pub sensitive: PolicySettings,
    /// Path fragments that select the sensitive class.
    pub sensitive_patterns: Vec<String>,
    pub sweep_interval_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            general: RateLimitPolicy::general().into(),
            sensitive: RateLimitPolicy::sensitive().into(),
            sensitive_patterns: DEFAULT_SENSITIVE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL.as_secs(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT.as_secs(),
        }
    }
}

impl RateLimitSettings {
    /// Returns validated class policies.
    pub fn class_policies(&self) -> Result<ClassPolicies, PortcullisError> {
        let policies = ClassPolicies {
            general: self.general.into(),
            sensitive: self.sensitive.into(),
        };
        policies.validate()?;
        Ok(policies)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Policy override for a path prefix. Unset fields inherit the cache defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheRouteSettings {
    pub path_prefix: String,
    pub ttl_secs: Option<u64>,
    pub vary_headers: Vec<String>,
    pub conditional: Option<bool>,
    pub stale_window_secs: Option<u64>,
    pub allow_authenticated: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub default_ttl_secs: u64,
    pub stale_window_secs: u64,
    /// Maximum number of stored responses.
    pub max_capacity: u64,
    pub max_body_bytes: usize,
    pub store_timeout_ms: u64,
    pub default_vary_headers: Vec<String>,
    pub skip_patterns: Vec<String>,
    pub cacheable_statuses: Vec<u16>,
    pub conditional: bool,
    pub routes: Vec<CacheRouteSettings>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = ResponseCacheConfig::default();
        let policy = CachePolicy::default();
        Self {
            enabled: true,
            default_ttl_secs: policy.ttl.as_secs(),
            stale_window_secs: policy.stale_window.as_secs(),
            max_capacity: 10_000,
            max_body_bytes: defaults.max_body_bytes,
            store_timeout_ms: defaults.store_timeout.as_millis() as u64,
            default_vary_headers: defaults.default_vary_headers,
            skip_patterns: defaults.skip_patterns,
            cacheable_statuses: defaults.cacheable_statuses,
            conditional: policy.conditional,
            routes: Vec::new(),
        }
    }
}

impl CacheSettings {
    /// Policy applied to paths no route matches.
    pub fn default_policy(&self) -> CachePolicy {
        CachePolicy {
            ttl: Duration::from_secs(self.default_ttl_secs),
            vary_headers: Vec::new(),
            conditional: self.conditional,
            stale_window: Duration::from_secs(self.stale_window_secs),
            allow_authenticated: false,
        }
    }

    /// Builds the response cache configuration, validating route prefixes.
    pub fn response_cache_config(&self) -> Result<ResponseCacheConfig, PortcullisError> {
        if self.default_ttl_secs == 0 {
            return Err(PortcullisError::invalid_policy(
                "cache.default_ttl_secs",
                "must be at least 1",
            ));
        }

        let default = self.default_policy();
        let routes = self
            .routes
            .iter()
            .map(|route| {
                let policy = CachePolicy {
                    ttl: route.ttl_secs.map_or(default.ttl, Duration::from_secs),
                    vary_headers: route.vary_headers.clone(),
                    conditional: route.conditional.unwrap_or(default.conditional),
                    stale_window: route
                        .stale_window_secs
                        .map_or(default.stale_window, Duration::from_secs),
                    allow_authenticated: route.allow_authenticated,
                };
                CacheRoute::new(route.path_prefix.clone(), policy)
            })
            .collect();

        Ok(ResponseCacheConfig {
            policies: CachePolicyTable::new(default, routes)?,
            default_vary_headers: self.default_vary_headers.clone(),
            skip_patterns: self.skip_patterns.clone(),
            cacheable_statuses: self.cacheable_statuses.clone(),
            max_body_bytes: self.max_body_bytes,
            store_timeout: Duration::from_millis(self.store_timeout_ms),
        })
    }
}

impl Settings {
    /// Loads settings from the file named by `PORTCULLIS_CONFIG` (or the
    /// default path) and the environment, then validates them.
    pub fn load() -> Result<Self, SettingsError> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Loads settings from `path` (if it exists) and the environment.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Checks policies and route prefixes.
    pub fn validate(&self) -> Result<(), PortcullisError> {
        self.rate_limit.class_policies()?;
        self.cache.response_cache_config()?;
        Ok(())
    }
}
