// # Native Adapter Trait
//
// Defines the surface of the platform-specific component that actually talks
// to mediation networks.
//
// ## Implementations
//
// - In-process recording adapter: `crate::native::EditorAdapter`
// - Platform bindings (JNI / Objective-C) live outside this crate
//
// ## Data Flow
//
// ```text
// application ──► AdBridge ──► NativeAdapter::start/load/show   (outbound)
// native thread ──► InboundSink::deliver ──► dispatch worker    (inbound)
// ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::config::StartRequest;
use crate::impression::PlacementType;
use crate::registry::DeliverySequence;

/// Ad format; each has its own placement namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdFormat {
    Interstitial,
    Rewarded,
    Banner,
}

impl AdFormat {
    /// Every format, in registry slot order
    pub const ALL: [AdFormat; 3] = [AdFormat::Interstitial, AdFormat::Rewarded, AdFormat::Banner];

    /// Stable lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            AdFormat::Interstitial => "interstitial",
            AdFormat::Rewarded => "rewarded",
            AdFormat::Banner => "banner",
        }
    }

    /// Slot index into per-format tables
    pub(crate) fn index(self) -> usize {
        match self {
            AdFormat::Interstitial => 0,
            AdFormat::Rewarded => 1,
            AdFormat::Banner => 2,
        }
    }

    /// Impression placement type served through this format
    pub fn placement_type(self) -> PlacementType {
        match self {
            AdFormat::Interstitial => PlacementType::Interstitial,
            AdFormat::Rewarded => PlacementType::Rewarded,
            AdFormat::Banner => PlacementType::Banner,
        }
    }
}

impl fmt::Display for AdFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interstitial" => Ok(AdFormat::Interstitial),
            "rewarded" => Ok(AdFormat::Rewarded),
            "banner" => Ok(AdFormat::Banner),
            other => Err(crate::Error::invalid_argument(format!(
                "unknown ad format: {other}"
            ))),
        }
    }
}

/// One undecoded notification from the native layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Format of the receiver channel the payload arrived on
    pub format: AdFormat,
    /// Opaque structured-text payload
    pub payload: String,
    /// Delivery order stamped by the sink
    pub seq: u64,
}

/// Handle the native layer uses to deliver notifications
///
/// Cheap to clone and safe to call from any thread, including threads that
/// are not part of a tokio runtime. Delivery never blocks.
#[derive(Debug, Clone)]
pub struct InboundSink {
    tx: mpsc::UnboundedSender<InboundMessage>,
    sequence: Arc<DeliverySequence>,
}

impl InboundSink {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<InboundMessage>,
        sequence: Arc<DeliverySequence>,
    ) -> Self {
        Self { tx, sequence }
    }

    /// Deliver a raw payload received on the `format` channel
    ///
    /// Returns `false` if the dispatch worker has shut down and the payload
    /// was discarded.
    pub fn deliver(&self, format: AdFormat, payload: impl Into<String>) -> bool {
        let payload = payload.into();
        let sent = self.sequence.stamp(|seq| {
            self.tx.send(InboundMessage {
                format,
                payload,
                seq,
            })
        });
        trace!(%format, "inbound payload queued");
        match sent {
            Ok(()) => true,
            Err(_) => {
                warn!(%format, "dispatch worker is gone, discarding inbound payload");
                false
            }
        }
    }

    /// Whether the dispatch worker is still accepting payloads
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Trait for native boundary adapter implementations
///
/// All calls are fire-and-forget: the only synchronous answer is whether the
/// call could be dispatched. Results arrive later as notifications through
/// the [`InboundSink`] handed over in [`NativeAdapter::start`].
///
/// # Thread Safety
///
/// Calls come from application threads; implementations must be
/// `Send + Sync`.
///
/// # Responsibilities
///
/// Adapters own network I/O, rendering and timeouts. They must not decode
/// payloads, track availability or invoke application listeners; that
/// belongs to the dispatch core.
pub trait NativeAdapter: Send + Sync {
    /// Start the native SDK
    ///
    /// Called exactly once per bridge, after the dispatch worker is running.
    /// The adapter keeps `sink` and uses it for every notification.
    ///
    /// The bridge's lifecycle lock is held for the duration of this call, so
    /// the adapter must not call back into `configure`, `start`, `state` or
    /// `config` on the same bridge from inside it. Delivering through `sink`
    /// is fine.
    fn start(&self, request: &StartRequest, sink: InboundSink) -> crate::Result<()>;

    /// Request an ad for a placement
    fn load(&self, format: AdFormat, placement_id: &str) -> crate::Result<()>;

    /// Show a previously loaded ad
    fn show(&self, format: AdFormat, placement_id: &str) -> crate::Result<()>;

    /// Destroy a banner view; the next `show` for it starts from scratch
    fn destroy_banner(&self, placement_id: &str) -> crate::Result<()>;

    /// Toggle the native SDK's own debug logging
    fn set_debug_logging(&self, enabled: bool) -> crate::Result<()>;

    /// Present the mediation test suite
    fn show_test_suite(&self) -> crate::Result<()>;

    /// Adapter name (for logging)
    fn adapter_name(&self) -> &'static str;
}
