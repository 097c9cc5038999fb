//! Dispatch router
//!
//! The Dispatcher is responsible for:
//! - Decoding inbound native payloads into [`Event`]s
//! - Applying each event to its placement in the [`PlacementRegistry`]
//! - Publishing impressions on the global impression stream
//! - Keeping counters for diagnostics
//!
//! ## Architecture
//!
//! ```text
//! native thread(s) ──► InboundSink ──► mpsc (unbounded) ──┐
//!                                                         ▼
//!                                              ┌────────────────────┐
//!                                              │ dispatch worker    │
//!                                              │ decode → route     │
//!                                              └────────────────────┘
//!                                                 │              │
//!                                                 ▼              ▼
//!                                      PlacementRegistry   broadcast<ImpressionNotice>
//!                                      (state + listener)  (any-impression stream)
//! ```
//!
//! A single worker consumes the channel, so payloads are applied in the order
//! the native layer delivered them. `route` may also be called directly from
//! any thread; per-placement ordering is then held by the registry's entry
//! lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::codec::{self, CallbackTag, Event};
use crate::config::BridgeSettings;
use crate::error::{Error, Result};
use crate::impression::ImpressionRecord;
use crate::registry::{DeliveryOutcome, PlacementRegistry};
use crate::traits::{AdFormat, InboundMessage};

/// An impression seen on any placement
#[derive(Debug, Clone, PartialEq)]
pub struct ImpressionNotice {
    /// Format of the placement
    pub format: AdFormat,
    /// Placement that produced the impression
    pub placement_id: String,
    /// Kind of the event that carried it
    pub tag: CallbackTag,
    /// The impression itself
    pub impression: ImpressionRecord,
    /// When the dispatcher routed it
    pub received_at: DateTime<Utc>,
}

/// Dispatch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Payloads taken off the inbound channel
    pub received: u64,
    /// Events applied to a placement
    pub routed: u64,
    /// Payloads dropped because they failed to decode
    pub undecodable: u64,
    /// Events applied to a placement with no listener
    pub without_listener: u64,
    /// Listener invocations that panicked
    pub listener_panics: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    routed: AtomicU64,
    undecodable: AtomicU64,
    without_listener: AtomicU64,
    listener_panics: AtomicU64,
}

/// Routes decoded events to placements
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<PlacementRegistry>,
    impressions: broadcast::Sender<ImpressionNotice>,
    counters: Arc<Counters>,
}

impl Dispatcher {
    /// Create a dispatcher over a registry
    pub fn new(registry: Arc<PlacementRegistry>, impression_capacity: usize) -> Self {
        let (impressions, _) = broadcast::channel(impression_capacity.max(1));
        Self {
            registry,
            impressions,
            counters: Arc::new(Counters::default()),
        }
    }

    /// The registry this dispatcher writes to
    pub fn registry(&self) -> &Arc<PlacementRegistry> {
        &self.registry
    }

    /// Route one event to its placement in `format`
    ///
    /// Availability is updated before the listener runs. If the event carries
    /// an impression, a copy is published on the impression stream after the
    /// listener returns.
    pub fn route(&self, format: AdFormat, event: Event) -> DeliveryOutcome {
        self.route_sequenced(format, event, None)
    }

    fn route_sequenced(&self, format: AdFormat, event: Event, seq: Option<u64>) -> DeliveryOutcome {
        let notice = event.impression().map(|impression| ImpressionNotice {
            format,
            placement_id: event.placement_id.clone(),
            tag: event.tag(),
            impression: impression.clone(),
            received_at: Utc::now(),
        });

        let outcome = self.registry.apply_sequenced(format, event, seq);
        self.counters.routed.fetch_add(1, Ordering::Relaxed);
        match outcome {
            DeliveryOutcome::Delivered => {}
            DeliveryOutcome::NoListener => {
                self.counters.without_listener.fetch_add(1, Ordering::Relaxed);
            }
            DeliveryOutcome::ListenerPanicked => {
                self.counters.listener_panics.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(notice) = notice {
            // No subscribers is fine; the stream is fire-and-forget.
            let _ = self.impressions.send(notice);
        }

        outcome
    }

    /// Decode and route one inbound payload
    ///
    /// Undecodable payloads are logged and dropped; `None` is returned and no
    /// placement is touched.
    pub fn handle(&self, message: InboundMessage) -> Option<DeliveryOutcome> {
        self.counters.received.fetch_add(1, Ordering::Relaxed);
        let outcome = match codec::decode_from(message.format, &message.payload) {
            Ok(event) => Some(self.route_sequenced(message.format, event, Some(message.seq))),
            Err(e) => {
                self.counters.undecodable.fetch_add(1, Ordering::Relaxed);
                warn!(format = %message.format, error = %e, "dropping undecodable native payload");
                None
            }
        };
        self.registry.sequence().mark_applied(message.seq);
        outcome
    }

    /// Subscribe to impressions from every placement
    pub fn subscribe_impressions(&self) -> broadcast::Receiver<ImpressionNotice> {
        self.impressions.subscribe()
    }

    /// Current counters
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            received: self.counters.received.load(Ordering::Relaxed),
            routed: self.counters.routed.load(Ordering::Relaxed),
            undecodable: self.counters.undecodable.load(Ordering::Relaxed),
            without_listener: self.counters.without_listener.load(Ordering::Relaxed),
            listener_panics: self.counters.listener_panics.load(Ordering::Relaxed),
        }
    }

    /// Worker loop: consume inbound payloads until shutdown
    ///
    /// Stops when `shutdown` fires (or its sender is dropped) or when every
    /// inbound sender is gone.
    pub async fn run(
        self,
        mut inbound: mpsc::UnboundedReceiver<InboundMessage>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        info!("dispatch worker started");
        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("shutdown signal received, dispatch worker stopping");
                    break;
                }

                message = inbound.recv() => match message {
                    Some(message) => {
                        self.handle(message);
                    }
                    None => {
                        info!("inbound channel closed, dispatch worker stopping");
                        break;
                    }
                },
            }
        }
        let stats = self.stats();
        debug!(?stats, "dispatch worker stopped");
    }

    /// Start the worker on the current tokio runtime, or on a dedicated
    /// thread when called from outside one
    pub(crate) fn spawn_worker(
        self,
        inbound: mpsc::UnboundedReceiver<InboundMessage>,
        settings: &BridgeSettings,
    ) -> Result<WorkerHandle> {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            debug!("spawning dispatch worker on the current tokio runtime");
            runtime.spawn(self.run(inbound, shutdown_rx));
            return Ok(WorkerHandle {
                shutdown: Some(shutdown_tx),
                thread: None,
            });
        }

        debug!(thread = %settings.worker_thread_name, "spawning dedicated dispatch thread");
        let thread = thread::Builder::new()
            .name(settings.worker_thread_name.clone())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to create dispatch runtime: {}", e);
                        return;
                    }
                };
                runtime.block_on(self.run(inbound, shutdown_rx));
            })
            .map_err(Error::from)?;

        Ok(WorkerHandle {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }
}

/// Owner's handle on a running dispatch worker
#[derive(Debug)]
pub(crate) struct WorkerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Signal the worker to stop and, for a dedicated thread, wait for it
    pub(crate) fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            // A listener calling shutdown() runs on the worker thread itself.
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                error!("dispatch thread panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
