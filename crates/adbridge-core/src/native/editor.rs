// # Editor Adapter
//
// In-process NativeAdapter for hosts with no native mediation SDK: desktop
// builds, editors, CI and tests.
//
// ## Behavior
//
// - Every outbound call is recorded, in order
// - Nothing is requested or rendered; a warning says so once per start
// - The inbound sink received at start is kept so the host (or a test) can
//   inject notifications exactly as a native layer would, from any thread

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::StartRequest;
use crate::error::{Error, Result};
use crate::traits::{AdFormat, InboundSink, NativeAdapter};

/// An outbound call as seen by the adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCall {
    Start(StartRequest),
    Load { format: AdFormat, placement_id: String },
    Show { format: AdFormat, placement_id: String },
    DestroyBanner { placement_id: String },
    SetDebugLogging(bool),
    ShowTestSuite,
}

/// Recording adapter with an injectable inbound side
#[derive(Debug, Default)]
pub struct EditorAdapter {
    calls: Mutex<Vec<OutboundCall>>,
    sink: Mutex<Option<InboundSink>>,
    refuse_start: AtomicBool,
}

impl EditorAdapter {
    /// Create an adapter with no recorded calls
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `start` fail, as a native layer that cannot initialize
    pub fn refuse_start(&self, refuse: bool) {
        self.refuse_start.store(refuse, Ordering::SeqCst);
    }

    /// Every outbound call so far, oldest first
    pub fn calls(&self) -> Vec<OutboundCall> {
        self.calls.lock().clone()
    }

    /// Number of `start` calls received
    pub fn start_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, OutboundCall::Start(_)))
            .count()
    }

    /// The sink handed over at start, if started
    pub fn sink(&self) -> Option<InboundSink> {
        self.sink.lock().clone()
    }

    /// Inject a notification as the native layer would
    ///
    /// Returns `false` if the adapter was never started or the dispatch
    /// worker is gone.
    pub fn deliver(&self, format: AdFormat, payload: impl Into<String>) -> bool {
        match self.sink() {
            Some(sink) => sink.deliver(format, payload),
            None => {
                warn!(%format, "notification injected before start, discarding");
                false
            }
        }
    }

    fn record(&self, call: OutboundCall) {
        debug!(?call, "outbound call");
        self.calls.lock().push(call);
    }
}

impl NativeAdapter for EditorAdapter {
    fn start(&self, request: &StartRequest, sink: InboundSink) -> Result<()> {
        if self.refuse_start.swap(false, Ordering::SeqCst) {
            return Err(Error::native(self.adapter_name(), "start refused"));
        }
        warn!("Start received, but no native mediation SDK is present; ads will not be requested or shown");
        self.record(OutboundCall::Start(request.clone()));
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn load(&self, format: AdFormat, placement_id: &str) -> Result<()> {
        self.record(OutboundCall::Load {
            format,
            placement_id: placement_id.to_string(),
        });
        Ok(())
    }

    fn show(&self, format: AdFormat, placement_id: &str) -> Result<()> {
        self.record(OutboundCall::Show {
            format,
            placement_id: placement_id.to_string(),
        });
        Ok(())
    }

    fn destroy_banner(&self, placement_id: &str) -> Result<()> {
        self.record(OutboundCall::DestroyBanner {
            placement_id: placement_id.to_string(),
        });
        Ok(())
    }

    fn set_debug_logging(&self, enabled: bool) -> Result<()> {
        self.record(OutboundCall::SetDebugLogging(enabled));
        Ok(())
    }

    fn show_test_suite(&self) -> Result<()> {
        warn!("Test suite requested, but no native mediation SDK is present");
        self.record(OutboundCall::ShowTestSuite);
        Ok(())
    }

    fn adapter_name(&self) -> &'static str {
        "editor"
    }
}
