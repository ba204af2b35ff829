//! Engine configuration
//!
//! Loaded from TOML. Every section is optional except the signing secret:
//!
//! ```toml
//! [signing]
//! secret = "change-me-to-at-least-32-random-bytes"
//!
//! [tokens]
//! ttl_secs = 3600
//!
//! [cache]
//! ttl_secs = 30
//! capacity = 10000
//!
//! [logging]
//! level = "info"
//! ```

use crate::core::error::{IamError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Recommended minimum signing secret length in bytes
pub const RECOMMENDED_SECRET_LENGTH: usize = 32;

/// Upper bound on cache entry lifetime
pub const MAX_CACHE_TTL_SECS: u64 = 3600;

/// Upper bound on token lifetime (ten years)
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub signing: SigningConfig,
    pub tokens: TokenConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Shared symmetric secret for artifact signatures
    #[serde(skip_serializing)]
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Lifetime of issued tokens in seconds
    pub ttl_secs: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        TokenConfig { ttl_secs: 3600 }
    }
}

impl TokenConfig {
    /// Saturates instead of panicking on values `validate` would reject
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.ttl_secs).unwrap_or(chrono::Duration::MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of cache entries in seconds
    pub ttl_secs: u64,
    /// Maximum number of entries for the in-memory cache
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: 30,
            capacity: 10_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `tracing` filter directive
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Config with the given secret and defaults everywhere else
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Config {
            signing: SigningConfig {
                secret: secret.into(),
            },
            ..Default::default()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(raw).map_err(|e| IamError::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| IamError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.signing.secret.is_empty() {
            return Err(IamError::Config("signing.secret is not configured".to_string()));
        }
        if self.signing.secret.len() < RECOMMENDED_SECRET_LENGTH {
            warn!(
                "signing secret is shorter than recommended ({} bytes)",
                RECOMMENDED_SECRET_LENGTH
            );
        }
        if self.tokens.ttl_secs <= 0 || self.tokens.ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(IamError::Config(format!(
                "tokens.ttl_secs must be between 1 and {}",
                MAX_TOKEN_TTL_SECS
            )));
        }
        if self.cache.ttl_secs == 0 || self.cache.ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(IamError::Config(format!(
                "cache.ttl_secs must be between 1 and {}",
                MAX_CACHE_TTL_SECS
            )));
        }
        if self.cache.capacity == 0 {
            return Err(IamError::Config("cache.capacity must be positive".to_string()));
        }
        Ok(())
    }
}
