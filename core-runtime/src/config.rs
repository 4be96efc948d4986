//! # Identity Configuration
//!
//! Externally supplied settings for the identity core: the identity pool,
//! its region and the optional developer-authenticated ("custom") provider.
//!
//! ## Overview
//!
//! Configuration is assembled with a builder and validated fail-fast, so a
//! misconfigured host learns about it at startup with an actionable message
//! instead of at the first token operation. The core never parses
//! configuration files; hosts either call the builder directly or hand over
//! their key/value metadata through [`IdentityConfig::from_lookup`].
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::IdentityConfig;
//!
//! let config = IdentityConfig::builder()
//!     .identity_pool_id("us-east-1:0b3c6a2e-1b7f-4a55-9d0e-5c8f1d2a3b4c")
//!     .region("us-east-1")
//!     .custom_provider("login.example.app", "https://auth.example.com/identity")
//!     .build()
//!     .expect("valid configuration");
//!
//! assert_eq!(config.custom_provider_id(), Some("login.example.app"));
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::IdentityConfig;
//!
//! // Missing region
//! IdentityConfig::builder()
//!     .identity_pool_id("us-east-1:0b3c6a2e-1b7f-4a55-9d0e-5c8f1d2a3b4c")
//!     .build()
//!     .expect("Should fail - region is required");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;

/// Lookup key for the identity pool id.
pub const KEY_POOL_ID: &str = "identity.pool_id";
/// Lookup key for the region.
pub const KEY_REGION: &str = "identity.region";
/// Lookup key for the custom provider id.
pub const KEY_CUSTOM_PROVIDER_ID: &str = "identity.custom_provider.id";
/// Lookup key for the custom provider's remote function reference.
pub const KEY_CUSTOM_PROVIDER_FUNCTION: &str = "identity.custom_provider.function";

const MAX_EVENT_BUFFER_SIZE: usize = 10_000;

/// Descriptor of the developer-authenticated provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomProviderConfig {
    /// Provider name used as the login-map key
    pub id: String,
    /// Reference to the remote function performing the token exchange
    pub remote_function: String,
}

/// Identity core configuration.
///
/// Use [`IdentityConfig::builder`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Identity pool id, usually `<region>:<uuid>`
    pub identity_pool_id: String,

    /// Region hosting the identity pool
    pub region: String,

    /// Optional developer-authenticated provider
    pub custom_provider: Option<CustomProviderConfig>,

    /// Capacity of the identity event bus
    pub event_buffer_size: usize,
}

impl IdentityConfig {
    /// Creates a new builder for constructing an `IdentityConfig`.
    pub fn builder() -> IdentityConfigBuilder {
        IdentityConfigBuilder::default()
    }

    /// Builds a configuration from host key/value metadata.
    ///
    /// The custom provider is configured only when both of its keys are
    /// present.
    ///
    /// ```
    /// use core_runtime::config::IdentityConfig;
    /// use std::collections::HashMap;
    ///
    /// let metadata = HashMap::from([
    ///     ("identity.pool_id", "eu-west-1:7d3f9a8e-2c41-4b1e-9a77-0f6c2e8d1b55"),
    ///     ("identity.region", "eu-west-1"),
    /// ]);
    ///
    /// let config = IdentityConfig::from_lookup(|key| metadata.get(key).map(|v| v.to_string()))
    ///     .unwrap();
    /// assert!(config.custom_provider.is_none());
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(pool_id) = lookup(KEY_POOL_ID) {
            builder = builder.identity_pool_id(pool_id);
        }
        if let Some(region) = lookup(KEY_REGION) {
            builder = builder.region(region);
        }

        match (
            lookup(KEY_CUSTOM_PROVIDER_ID),
            lookup(KEY_CUSTOM_PROVIDER_FUNCTION),
        ) {
            (Some(id), Some(function)) => builder = builder.custom_provider(id, function),
            (None, None) => {}
            (Some(_), None) => {
                return Err(Error::Config(format!(
                    "{} is set but {} is missing",
                    KEY_CUSTOM_PROVIDER_ID, KEY_CUSTOM_PROVIDER_FUNCTION
                )))
            }
            (None, Some(_)) => {
                return Err(Error::Config(format!(
                    "{} is set but {} is missing",
                    KEY_CUSTOM_PROVIDER_FUNCTION, KEY_CUSTOM_PROVIDER_ID
                )))
            }
        }

        builder.build()
    }

    /// Builds a configuration from `IDLINK_*` environment variables.
    ///
    /// | Variable | Lookup key |
    /// |----------|------------|
    /// | `IDLINK_POOL_ID` | `identity.pool_id` |
    /// | `IDLINK_REGION` | `identity.region` |
    /// | `IDLINK_CUSTOM_PROVIDER_ID` | `identity.custom_provider.id` |
    /// | `IDLINK_CUSTOM_PROVIDER_FUNCTION` | `identity.custom_provider.function` |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(env_var_for(key)).ok())
    }

    /// Id of the custom provider, if configured.
    pub fn custom_provider_id(&self) -> Option<&str> {
        self.custom_provider.as_ref().map(|p| p.id.as_str())
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Pool id and region are not empty
    /// - A region-qualified pool id matches the configured region
    /// - Custom provider fields are not empty
    /// - Event buffer size is within `1..=10_000`
    pub fn validate(&self) -> Result<()> {
        if self.identity_pool_id.trim().is_empty() {
            return Err(Error::Config(
                "Identity pool id cannot be empty".to_string(),
            ));
        }

        if self.region.trim().is_empty() {
            return Err(Error::Config("Region cannot be empty".to_string()));
        }

        if let Some((pool_region, _)) = self.identity_pool_id.split_once(':') {
            if pool_region != self.region {
                return Err(Error::Config(format!(
                    "Identity pool {} belongs to region {}, but region is set to {}",
                    self.identity_pool_id, pool_region, self.region
                )));
            }
        }

        if let Some(custom) = &self.custom_provider {
            if custom.id.trim().is_empty() {
                return Err(Error::Config(
                    "Custom provider id cannot be empty".to_string(),
                ));
            }
            if custom.remote_function.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Custom provider {} requires a remote function reference",
                    custom.id
                )));
            }
        }

        if self.event_buffer_size == 0 || self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size must be between 1 and {} (got {})",
                MAX_EVENT_BUFFER_SIZE, self.event_buffer_size
            )));
        }

        Ok(())
    }
}

fn env_var_for(key: &str) -> &'static str {
    match key {
        KEY_POOL_ID => "IDLINK_POOL_ID",
        KEY_REGION => "IDLINK_REGION",
        KEY_CUSTOM_PROVIDER_ID => "IDLINK_CUSTOM_PROVIDER_ID",
        KEY_CUSTOM_PROVIDER_FUNCTION => "IDLINK_CUSTOM_PROVIDER_FUNCTION",
        _ => "IDLINK_UNKNOWN",
    }
}

/// Builder for [`IdentityConfig`].
#[derive(Debug, Default)]
pub struct IdentityConfigBuilder {
    identity_pool_id: Option<String>,
    region: Option<String>,
    custom_provider: Option<CustomProviderConfig>,
    event_buffer_size: Option<usize>,
}

impl IdentityConfigBuilder {
    /// Sets the identity pool id.
    pub fn identity_pool_id(mut self, pool_id: impl Into<String>) -> Self {
        self.identity_pool_id = Some(pool_id.into());
        self
    }

    /// Sets the region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Configures the developer-authenticated provider.
    ///
    /// # Arguments
    ///
    /// * `id` - Provider name used as the login-map key
    /// * `remote_function` - Reference to the remote exchange function
    pub fn custom_provider(mut self, id: impl Into<String>, remote_function: impl Into<String>) -> Self {
        self.custom_provider = Some(CustomProviderConfig {
            id: id.into(),
            remote_function: remote_function.into(),
        });
        self
    }

    /// Sets the identity event bus capacity (default 100).
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `IdentityConfig`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when a required value is missing or the
    /// assembled configuration fails [`IdentityConfig::validate`].
    pub fn build(self) -> Result<IdentityConfig> {
        let identity_pool_id = self.identity_pool_id.ok_or_else(|| {
            Error::Config(
                "Identity pool id is required. Use .identity_pool_id() to set it.".to_string(),
            )
        })?;

        let region = self.region.ok_or_else(|| {
            Error::Config("Region is required. Use .region() to set it.".to_string())
        })?;

        let config = IdentityConfig {
            identity_pool_id,
            region,
            custom_provider: self.custom_provider,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
