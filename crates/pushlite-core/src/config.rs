//! Configuration types for the PushLite client
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::device::DeviceInfo;

/// Name reported to the remote service in the `User-Agent` header
pub const SDK_NAME: &str = "PushLite";

/// Version reported in the registration payload and `X-SDK-Version` header
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Main PushLite configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushLiteConfig {
    /// Remote application settings
    pub app: AppConfig,

    /// Static device metadata
    #[serde(default)]
    pub device: DeviceInfo,

    /// Durable key/value store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl PushLiteConfig {
    /// Create a configuration with default device, store and engine settings
    pub fn new(app: AppConfig) -> Self {
        Self {
            app,
            device: DeviceInfo::default(),
            state_store: StateStoreConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.app.validate()?;
        self.engine.validate()?;
        self.state_store.validate()?;
        Ok(())
    }
}

/// Remote application settings
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application id assigned by the remote service (`etAppId`)
    pub app_id: String,

    /// Bearer token for the device API
    pub access_token: String,

    /// Base endpoint, e.g. `https://mc.example.com`
    pub base_endpoint: String,

    /// Account (member) id
    #[serde(default)]
    pub mid: String,
}

// The access token must never reach the logs
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("app_id", &self.app_id)
            .field("access_token", &"<REDACTED>")
            .field("base_endpoint", &self.base_endpoint)
            .field("mid", &self.mid)
            .finish()
    }
}

impl AppConfig {
    /// Create a new application configuration
    ///
    /// A single trailing `/` on the endpoint is stripped so that call paths
    /// can be appended verbatim.
    pub fn new(
        app_id: impl Into<String>,
        access_token: impl Into<String>,
        base_endpoint: impl Into<String>,
    ) -> Self {
        let mut base_endpoint = base_endpoint.into();
        if base_endpoint.ends_with('/') {
            base_endpoint.pop();
        }

        Self {
            app_id: app_id.into(),
            access_token: access_token.into(),
            base_endpoint,
            mid: String::new(),
        }
    }

    /// Set the account (member) id
    pub fn with_mid(mut self, mid: impl Into<String>) -> Self {
        self.mid = mid.into();
        self
    }

    /// Base endpoint without a trailing slash
    pub fn endpoint(&self) -> &str {
        self.base_endpoint.trim_end_matches('/')
    }

    /// Validate the application configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.app_id.trim().is_empty() {
            return Err(crate::Error::config("app_id cannot be empty"));
        }
        if self.access_token.is_empty() {
            return Err(crate::Error::config("access_token cannot be empty"));
        }
        if !self.base_endpoint.starts_with("https://") && !self.base_endpoint.starts_with("http://")
        {
            return Err(crate::Error::config(format!(
                "base_endpoint must use http or https, got: {}",
                self.base_endpoint
            )));
        }
        Ok(())
    }
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based key/value store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,
}

impl StateStoreConfig {
    /// Validate the state store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } if path.trim().is_empty() => {
                Err(crate::Error::config("state store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Quiet period before batched mutations are registered (milliseconds)
    ///
    /// Every mutation restarts this timer, so a steady stream of mutations
    /// closer together than the quiet period defers the sync indefinitely.
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,

    /// Upper bound on how long a background-execution token is held
    /// while a close event is in flight (seconds)
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Capacity of the monitoring event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Capacity of the coordinator's command channel
    #[serde(default = "default_command_channel_capacity")]
    pub command_channel_capacity: usize,

    /// Prefix for every persisted key
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl EngineConfig {
    /// Quiet period as a `Duration`
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    /// Grace period as a `Duration`
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.quiet_period_ms == 0 {
            return Err(crate::Error::config("quiet_period_ms must be > 0"));
        }
        if self.grace_period_secs == 0 {
            return Err(crate::Error::config("grace_period_secs must be > 0"));
        }
        if self.event_channel_capacity == 0 || self.command_channel_capacity == 0 {
            return Err(crate::Error::config("channel capacities must be > 0"));
        }
        if self.namespace.trim().is_empty() {
            return Err(crate::Error::config("namespace cannot be empty"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: default_quiet_period_ms(),
            grace_period_secs: default_grace_period_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            command_channel_capacity: default_command_channel_capacity(),
            namespace: default_namespace(),
        }
    }
}

fn default_quiet_period_ms() -> u64 {
    5_000
}

fn default_grace_period_secs() -> u64 {
    25
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_command_channel_capacity() -> usize {
    256
}

fn default_namespace() -> String {
    "com.pushlite".to_string()
}
