//! Configuration types for the ad bridge
//!
//! - [`SdkConfig`]: what the application configures before start
//! - [`StartOptions`]: the bit flags the native start call understands
//! - [`FrameworkParams`]: plugin/framework identification sent at start
//! - [`StartRequest`]: the frozen bundle handed to the adapter exactly once
//! - [`BridgeSettings`]: ambient knobs for the dispatch machinery

use serde::{Deserialize, Serialize};

/// SDK configuration as seen by the application
///
/// Once the lifecycle reaches `Started` this value is frozen; see
/// [`SdkLifecycle`](crate::lifecycle::SdkLifecycle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Publisher app id, fixed at the first successful configure
    pub app_id: String,

    /// Whether the native SDK requests ads on its own
    pub auto_requesting_enabled: bool,

    /// Whether native debug logging is switched on
    pub logging_enabled: bool,

    /// Whether the SDK has been started
    pub started: bool,
}

impl SdkConfig {
    /// Create a fresh configuration for an app id
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            auto_requesting_enabled: true,
            logging_enabled: false,
            started: false,
        }
    }

    /// Derive the native start flags
    pub fn start_options(&self) -> StartOptions {
        let mut options = StartOptions::NONE;
        if !self.auto_requesting_enabled {
            options = options.with(StartOptions::DISABLE_AUTOMATIC_REQUESTING);
        }
        options
    }
}

/// Bit flags passed to the native start call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StartOptions(u32);

impl StartOptions {
    /// No options
    pub const NONE: StartOptions = StartOptions(0);

    /// Turn off automatic ad requesting
    pub const DISABLE_AUTOMATIC_REQUESTING: StartOptions = StartOptions(1 << 0);

    /// Raw flag bits
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Build from raw bits; unknown bits are kept
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Union of two flag sets
    pub fn with(self, other: StartOptions) -> Self {
        Self(self.0 | other.0)
    }

    /// Check whether every bit of `other` is set
    pub fn contains(self, other: StartOptions) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the native SDK should request ads on its own
    pub fn auto_requesting_enabled(self) -> bool {
        !self.contains(Self::DISABLE_AUTOMATIC_REQUESTING)
    }
}

/// Plugin identification forwarded to the native start call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkParams {
    /// Version of this bridge
    pub plugin_sdk_version: String,

    /// Version of the host framework embedding the bridge
    pub plugin_framework_version: String,
}

impl FrameworkParams {
    /// Encode as the JSON object the native layer expects
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// The frozen configuration handed to the adapter on start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    /// Publisher app id
    pub app_id: String,
    /// Start flags
    pub options: StartOptions,
    /// Plugin identification
    pub framework_params: FrameworkParams,
}

/// Ambient settings for the dispatch machinery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Capacity of the global impression broadcast channel
    ///
    /// Slow subscribers that fall further behind than this lose the oldest
    /// notices (they observe a lag error), never the placement listeners.
    #[serde(default = "default_impression_channel_capacity")]
    pub impression_channel_capacity: usize,

    /// Name of the dedicated worker thread used when `start()` runs outside
    /// a tokio runtime
    #[serde(default = "default_worker_thread_name")]
    pub worker_thread_name: String,

    /// Bridge version reported to the native layer
    #[serde(default = "default_plugin_sdk_version")]
    pub plugin_sdk_version: String,

    /// Host framework version reported to the native layer
    #[serde(default = "default_framework_version")]
    pub framework_version: String,
}

impl BridgeSettings {
    /// Validate the settings
    pub fn validate(&self) -> crate::Result<()> {
        if self.impression_channel_capacity == 0 {
            return Err(crate::Error::config(
                "impression_channel_capacity must be > 0",
            ));
        }
        if self.worker_thread_name.trim().is_empty() {
            return Err(crate::Error::config("worker_thread_name cannot be empty"));
        }
        Ok(())
    }

    /// Set the host framework version
    pub fn with_framework_version(mut self, version: impl Into<String>) -> Self {
        self.framework_version = version.into();
        self
    }

    /// Framework params derived from these settings
    pub fn framework_params(&self) -> FrameworkParams {
        FrameworkParams {
            plugin_sdk_version: self.plugin_sdk_version.clone(),
            plugin_framework_version: self.framework_version.clone(),
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            impression_channel_capacity: default_impression_channel_capacity(),
            worker_thread_name: default_worker_thread_name(),
            plugin_sdk_version: default_plugin_sdk_version(),
            framework_version: default_framework_version(),
        }
    }
}

fn default_impression_channel_capacity() -> usize {
    256
}

fn default_worker_thread_name() -> String {
    "adbridge-dispatch".to_string()
}

fn default_plugin_sdk_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_framework_version() -> String {
    "unknown".to_string()
}
