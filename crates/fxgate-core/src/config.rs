//! Centralized configuration for fxgate.
//!
//! Compile-time defaults live on the unit structs below. Runtime settings are
//! collected in [`ServiceConfig`], which the gateway binary fills from its
//! command line and environment.

use crate::error::{FxError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "fxgate";
    pub const DATA_DIR_NAME: &'static str = "fxgate";
    pub const DATABASE_FILENAME: &'static str = "analytics.db";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const UPSTREAM_BASE_URL: &'static str = "https://api.frankfurter.app";
    pub const USER_AGENT: &'static str = concat!("fxgate/", env!("CARGO_PKG_VERSION"));
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
    pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(10);
    pub const CIRCUIT_BREAKER_FAILURE_THRESHOLD: u32 = 5;
    pub const CIRCUIT_BREAKER_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);
}

/// Rate cache configuration.
pub struct CacheConfig;

impl CacheConfig {
    /// Latest rates are republished once per working day; keep them briefly.
    pub const LATEST_TTL: Duration = Duration::from_secs(600);
    /// Rates for past dates never change.
    pub const HISTORICAL_TTL: Duration = Duration::from_secs(86_400);
    pub const MAX_ENTRIES: u64 = 1_000;
}

/// Analytics store configuration.
pub struct AnalyticsConfig;

impl AnalyticsConfig {
    pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
    pub const UNKNOWN_DEVICE: &'static str = "Unknown";
}

/// Dashboard rendering configuration.
pub struct DashboardConfig;

impl DashboardConfig {
    pub const TOP_DEVICES: usize = 5;
    pub const RECENT_ROWS: usize = 100;
    pub const NO_DATA: &'static str = "No data available";
}

/// Runtime configuration for a [`RatesService`](crate::RatesService).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the Frankfurter-compatible upstream API.
    pub upstream_url: String,
    /// Per-request timeout for upstream calls.
    pub request_timeout: Duration,
    /// Maximum attempts per upstream call (including the first).
    pub max_attempts: u32,
    /// TTL of the cached latest snapshot.
    pub latest_ttl: Duration,
    /// TTL of cached dated lookups and series.
    pub historical_ttl: Duration,
    /// Path of the SQLite analytics database. `None` keeps it in memory.
    pub database_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            upstream_url: NetworkConfig::UPSTREAM_BASE_URL.to_string(),
            request_timeout: NetworkConfig::REQUEST_TIMEOUT,
            max_attempts: NetworkConfig::MAX_RETRIES,
            latest_ttl: CacheConfig::LATEST_TTL,
            historical_ttl: CacheConfig::HISTORICAL_TTL,
            database_path: default_database_path(),
        }
    }
}

impl ServiceConfig {
    /// Start a builder from the defaults.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: ServiceConfig::default(),
        }
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.upstream_url).map_err(|e| FxError::Config {
            message: format!("Invalid upstream URL {}: {}", self.upstream_url, e),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FxError::Config {
                message: format!("Unsupported upstream scheme: {}", url.scheme()),
            });
        }
        if self.max_attempts == 0 {
            return Err(FxError::Config {
                message: "max_attempts must be at least 1".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(FxError::Config {
                message: "request_timeout must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug, Clone)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn upstream_url(mut self, url: impl Into<String>) -> Self {
        self.config.upstream_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn latest_ttl(mut self, ttl: Duration) -> Self {
        self.config.latest_ttl = ttl;
        self
    }

    pub fn historical_ttl(mut self, ttl: Duration) -> Self {
        self.config.historical_ttl = ttl;
        self
    }

    /// Persist analytics at `path`.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = Some(path.into());
        self
    }

    /// Keep analytics in an in-memory database.
    pub fn in_memory_database(mut self) -> Self {
        self.config.database_path = None;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<ServiceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Default analytics database location under the user data directory.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| {
        dir.join(AppConfig::DATA_DIR_NAME)
            .join(AppConfig::DATABASE_FILENAME)
    })
}
