//! Application-facing facade
//!
//! [`AdBridge`] is the one object an application holds. It owns the
//! lifecycle, the placement registry, the dispatch worker and the native
//! adapter, and is meant to be created once at startup and shared (for
//! example in an `Arc`).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use adbridge_core::{AdBridge, BridgeSettings, Event, EditorAdapter};
//!
//! # fn main() -> adbridge_core::Result<()> {
//! let bridge = AdBridge::new(Arc::new(EditorAdapter::new()), BridgeSettings::default())?;
//!
//! bridge.rewarded().set_listener("MainMenuRewarded", |event: Event| {
//!     println!("{} -> {}", event.placement_id, event.tag());
//! });
//!
//! bridge.configure("12345")?.disable_auto_requesting().enable_logs();
//! bridge.start()?;
//! bridge.rewarded().load("MainMenuRewarded")?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::codec::Event;
use crate::config::{BridgeSettings, SdkConfig, StartRequest};
use crate::dispatch::{DispatchStats, Dispatcher, ImpressionNotice, WorkerHandle};
use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleState, OptionOutcome, SdkLifecycle, SdkOption};
use crate::registry::{DeliveryOutcome, PlacementRegistry, PlacementState};
use crate::traits::{AdFormat, InboundMessage, InboundSink, NativeAdapter, PlacementListener};

/// The ad bridge
pub struct AdBridge {
    adapter: Arc<dyn NativeAdapter>,
    settings: BridgeSettings,
    lifecycle: SdkLifecycle,
    dispatcher: Dispatcher,
    sink: InboundSink,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<InboundMessage>>>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl AdBridge {
    /// Create a bridge over a native adapter
    ///
    /// The placement registry exists from this point on, so listeners can be
    /// registered before `start`.
    pub fn new(adapter: Arc<dyn NativeAdapter>, settings: BridgeSettings) -> Result<Self> {
        settings.validate()?;

        let registry = Arc::new(PlacementRegistry::new());
        let sequence = Arc::clone(registry.sequence());
        let dispatcher = Dispatcher::new(registry, settings.impression_channel_capacity);
        let (tx, rx) = mpsc::unbounded_channel();

        debug!(adapter = adapter.adapter_name(), "ad bridge created");
        Ok(Self {
            adapter,
            settings,
            lifecycle: SdkLifecycle::new(),
            dispatcher,
            sink: InboundSink::new(tx, sequence),
            inbound: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
        })
    }

    /// Record the publisher app id
    ///
    /// Fails only for an empty app id. After the first successful call the
    /// app id is fixed; later calls succeed without changing it.
    pub fn configure(&self, app_id: &str) -> Result<&Self> {
        self.lifecycle.configure(app_id)?;
        Ok(self)
    }

    /// Disable automatic ad requesting; ignored once started
    pub fn disable_auto_requesting(&self) -> &Self {
        self.lifecycle.set_option(SdkOption::DisableAutoRequesting);
        self
    }

    /// Enable native debug logging; ignored once started
    pub fn enable_logs(&self) -> &Self {
        self.lifecycle.set_option(SdkOption::EnableLogging);
        self
    }

    /// Apply an option and report whether it took effect
    pub fn set_option(&self, option: SdkOption) -> OptionOutcome {
        self.lifecycle.set_option(option)
    }

    /// Start the SDK
    ///
    /// On the first successful call: the dispatch worker is started, then the
    /// frozen configuration is forwarded to the adapter together with the
    /// inbound sink. Later calls do nothing.
    pub fn start(&self) -> Result<()> {
        self.lifecycle.start(|config| self.bring_up(config))?;
        Ok(())
    }

    /// Configure and start in one call
    pub fn start_with_app_id(&self, app_id: &str) -> Result<()> {
        self.configure(app_id)?;
        self.start()
    }

    /// Present the mediation test suite
    ///
    /// Allowed in any phase, but only meaningful once started.
    pub fn show_test_suite(&self) -> Result<()> {
        if !self.lifecycle.is_started() {
            warn!("Test suite requested before start; it will not show meaningful information");
        }
        self.adapter.show_test_suite()
    }

    /// Lifecycle phase
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Snapshot of the SDK configuration
    pub fn config(&self) -> Option<SdkConfig> {
        self.lifecycle.config()
    }

    /// Interstitial placements
    pub fn interstitial(&self) -> Placements<'_> {
        self.placements(AdFormat::Interstitial)
    }

    /// Rewarded placements
    pub fn rewarded(&self) -> Placements<'_> {
        self.placements(AdFormat::Rewarded)
    }

    /// Banner placements
    pub fn banner(&self) -> Placements<'_> {
        self.placements(AdFormat::Banner)
    }

    /// Placements of any format
    pub fn placements(&self, format: AdFormat) -> Placements<'_> {
        Placements {
            bridge: self,
            format,
        }
    }

    /// Subscribe to impressions from every placement
    pub fn subscribe_impressions(&self) -> broadcast::Receiver<ImpressionNotice> {
        self.dispatcher.subscribe_impressions()
    }

    /// Impressions from every placement, as a stream
    ///
    /// A subscriber that falls behind sees a lag error item, then resumes.
    pub fn impression_stream(&self) -> BroadcastStream<ImpressionNotice> {
        BroadcastStream::new(self.subscribe_impressions())
    }

    /// Handle for delivering native payloads
    pub fn inbound_sink(&self) -> InboundSink {
        self.sink.clone()
    }

    /// Route an already decoded event, bypassing the worker
    pub fn route(&self, format: AdFormat, event: Event) -> DeliveryOutcome {
        self.dispatcher.route(format, event)
    }

    /// Dispatch counters
    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    /// Stop the dispatch worker; later deliveries are discarded
    pub fn shutdown(&self) {
        let worker = self.worker.lock().take();
        if let Some(mut worker) = worker {
            info!("stopping dispatch worker");
            worker.stop();
        }
    }

    fn bring_up(&self, config: &SdkConfig) -> Result<()> {
        {
            let mut worker = self.worker.lock();
            if worker.is_none() {
                let inbound = self
                    .inbound
                    .lock()
                    .take()
                    .ok_or_else(|| Error::Other("inbound channel already consumed".into()))?;
                *worker = Some(self.dispatcher.clone().spawn_worker(inbound, &self.settings)?);
            }
        }

        if config.logging_enabled {
            self.adapter.set_debug_logging(true)?;
        }

        let request = StartRequest {
            app_id: config.app_id.clone(),
            options: config.start_options(),
            framework_params: self.settings.framework_params(),
        };
        debug!(adapter = self.adapter.adapter_name(), options = request.options.bits(), "forwarding start");
        self.adapter.start(&request, self.sink.clone())
    }

    fn require_started(&self, operation: &'static str) -> Result<()> {
        if self.lifecycle.is_started() {
            Ok(())
        } else {
            Err(Error::NotStarted(operation))
        }
    }
}

impl Drop for AdBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Placement operations for one ad format
#[derive(Clone, Copy)]
pub struct Placements<'a> {
    bridge: &'a AdBridge,
    format: AdFormat,
}

impl Placements<'_> {
    /// The ad format these placements belong to
    pub fn format(&self) -> AdFormat {
        self.format
    }

    /// Request an ad
    pub fn load(&self, placement_id: &str) -> Result<()> {
        check_placement_id(placement_id)?;
        self.bridge.require_started("load")?;
        debug!(format = %self.format, placement_id, "load");
        self.bridge.adapter.load(self.format, placement_id)
    }

    /// Show an ad; having no listener registered is fine
    pub fn show(&self, placement_id: &str) -> Result<()> {
        check_placement_id(placement_id)?;
        self.bridge.require_started("show")?;
        debug!(format = %self.format, placement_id, "show");
        self.bridge.adapter.show(self.format, placement_id)
    }

    /// Tear down a banner so the next `show` creates a fresh view
    ///
    /// Only banners can be destroyed. The placement reports unavailable
    /// afterwards, until the native layer announces a new ad.
    pub fn destroy(&self, placement_id: &str) -> Result<()> {
        check_placement_id(placement_id)?;
        if self.format != AdFormat::Banner {
            return Err(Error::invalid_argument(format!(
                "{} placements cannot be destroyed",
                self.format
            )));
        }
        self.bridge.require_started("destroy")?;
        debug!(placement_id, "destroy banner");
        self.bridge.adapter.destroy_banner(placement_id)?;
        self.bridge
            .dispatcher
            .registry()
            .reset_availability(self.format, placement_id);
        Ok(())
    }

    /// Whether an ad is ready to show
    pub fn is_available(&self, placement_id: &str) -> bool {
        self.bridge
            .dispatcher
            .registry()
            .is_available(self.format, placement_id)
    }

    /// Register the listener for a placement, replacing any previous one
    pub fn set_listener<L>(&self, placement_id: &str, listener: L)
    where
        L: PlacementListener + 'static,
    {
        self.bridge
            .dispatcher
            .registry()
            .set_listener(self.format, placement_id, Arc::new(listener));
    }

    /// Remove the listener for a placement
    ///
    /// Notifications the native layer delivered before this call still reach
    /// the removed listener.
    pub fn clear_listener(&self, placement_id: &str) -> bool {
        self.bridge
            .dispatcher
            .registry()
            .clear_listener(self.format, placement_id)
    }

    /// Snapshot of a placement, if it has been seen
    pub fn state(&self, placement_id: &str) -> Option<PlacementState> {
        self.bridge.dispatcher.registry().state(self.format, placement_id)
    }

    /// Known placement ids
    pub fn ids(&self) -> Vec<String> {
        self.bridge.dispatcher.registry().placements(self.format)
    }
}

fn check_placement_id(placement_id: &str) -> Result<()> {
    if placement_id.trim().is_empty() {
        return Err(Error::invalid_argument("placement id cannot be empty"));
    }
    Ok(())
}
