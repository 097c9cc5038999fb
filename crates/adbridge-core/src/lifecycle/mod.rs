//! SDK lifecycle state machine
//!
//! ```text
//! Unconfigured ──configure(app_id)──► Configured ──start()──► Started
//! ```
//!
//! The machine only moves forward. Once `Started`, the configuration is
//! frozen: further `configure` and `set_option` calls change nothing and
//! report that they were ignored.
//!
//! ## Synchronization
//!
//! All transitions go through one mutex. The frozen configuration is
//! published through a `OnceLock`, so any thread that observes `Started`
//! also observes the complete configuration that was started with.

use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::SdkConfig;
use crate::error::{Error, Result};

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Unconfigured,
    Configured,
    Started,
}

/// A pre-start option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdkOption {
    /// Stop the native SDK from requesting ads on its own
    DisableAutoRequesting,
    /// Turn on native debug logging
    EnableLogging,
}

/// Result of a `set_option` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionOutcome {
    /// The option now applies
    Applied,
    /// Ignored: configuration is frozen
    IgnoredAlreadyStarted,
    /// Ignored: nothing to apply it to yet
    IgnoredNotConfigured,
}

/// Result of a `configure` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    /// The app id was recorded
    Configured,
    /// An app id was already recorded; nothing changed
    AlreadyConfigured,
}

/// Result of a successful `start` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// This call performed the transition
    Started,
    /// The SDK was already started; nothing happened
    AlreadyStarted,
}

/// One-way configuration/start state machine
#[derive(Debug, Default)]
pub struct SdkLifecycle {
    pending: Mutex<Option<SdkConfig>>,
    frozen: OnceLock<SdkConfig>,
}

impl SdkLifecycle {
    /// Create an unconfigured lifecycle
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase
    pub fn state(&self) -> LifecycleState {
        if self.frozen.get().is_some() {
            return LifecycleState::Started;
        }
        let pending = self.pending.lock();
        match (self.frozen.get(), pending.as_ref()) {
            (Some(_), _) => LifecycleState::Started,
            (None, Some(_)) => LifecycleState::Configured,
            (None, None) => LifecycleState::Unconfigured,
        }
    }

    /// Whether `start` has completed
    pub fn is_started(&self) -> bool {
        self.frozen.get().is_some()
    }

    /// Snapshot of the configuration, if any
    pub fn config(&self) -> Option<SdkConfig> {
        if let Some(frozen) = self.frozen.get() {
            return Some(frozen.clone());
        }
        let pending = self.pending.lock();
        self.frozen.get().cloned().or_else(|| pending.clone())
    }

    /// The configuration the SDK was started with
    pub fn frozen_config(&self) -> Option<&SdkConfig> {
        self.frozen.get()
    }

    /// Record the app id
    ///
    /// An empty app id is rejected in every phase. Once an app id has been
    /// recorded, later calls leave it untouched.
    pub fn configure(&self, app_id: &str) -> Result<ConfigureOutcome> {
        if app_id.is_empty() {
            return Err(Error::config("App ID cannot be empty"));
        }

        let mut pending = self.pending.lock();
        if let Some(frozen) = self.frozen.get() {
            if frozen.app_id != app_id {
                warn!(current = %frozen.app_id, ignored = %app_id, "SDK already started, app id is immutable");
            }
            return Ok(ConfigureOutcome::AlreadyConfigured);
        }
        match pending.as_ref() {
            Some(existing) => {
                if existing.app_id != app_id {
                    warn!(current = %existing.app_id, ignored = %app_id, "app id already configured, keeping the first one");
                }
                Ok(ConfigureOutcome::AlreadyConfigured)
            }
            None => {
                info!(app_id, "SDK configured");
                *pending = Some(SdkConfig::new(app_id));
                Ok(ConfigureOutcome::Configured)
            }
        }
    }

    /// Apply a pre-start option
    pub fn set_option(&self, option: SdkOption) -> OptionOutcome {
        let mut pending = self.pending.lock();
        if self.frozen.get().is_some() {
            warn!(?option, "SDK already started, ignoring option");
            return OptionOutcome::IgnoredAlreadyStarted;
        }
        let Some(config) = pending.as_mut() else {
            warn!(?option, "SDK not configured, ignoring option");
            return OptionOutcome::IgnoredNotConfigured;
        };
        match option {
            SdkOption::DisableAutoRequesting => config.auto_requesting_enabled = false,
            SdkOption::EnableLogging => config.logging_enabled = true,
        }
        debug!(?option, "option applied");
        OptionOutcome::Applied
    }

    /// Move `Configured → Started`
    ///
    /// `on_start` receives the final configuration and runs exactly once, with
    /// the transition lock held; concurrent `start`/`set_option` calls wait for
    /// it. If it fails the lifecycle stays `Configured` and the error is
    /// returned. Calling `start` again after success is a no-op.
    pub fn start<F>(&self, on_start: F) -> Result<StartOutcome>
    where
        F: FnOnce(&SdkConfig) -> Result<()>,
    {
        let pending = self.pending.lock();
        if self.frozen.get().is_some() {
            debug!("start() called on a started SDK, ignoring");
            return Ok(StartOutcome::AlreadyStarted);
        }
        let Some(config) = pending.as_ref() else {
            return Err(Error::NotConfigured);
        };

        let mut final_config = config.clone();
        final_config.started = true;
        on_start(&final_config)?;

        info!(app_id = %final_config.app_id,
              auto_requesting = final_config.auto_requesting_enabled,
              logging = final_config.logging_enabled,
              "SDK started");
        // Only ever set here, under the transition lock.
        let _ = self.frozen.set(final_config);
        Ok(StartOutcome::Started)
    }
}
