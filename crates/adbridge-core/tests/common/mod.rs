//! Test doubles and common utilities for bridge contract tests
//!
//! These helpers drive the bridge through the same inbound sink a real
//! native adapter would use.

#![allow(dead_code)]

use adbridge_core::traits::{AdFormat, PlacementListener};
use adbridge_core::{AdBridge, BridgeSettings, CallbackTag, EditorAdapter, Event};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// A listener that records every event it receives
#[derive(Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<Event>>>,
    call_count: Arc<AtomicUsize>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Tags received so far
    pub fn tags(&self) -> Vec<CallbackTag> {
        self.events.lock().iter().map(Event::tag).collect()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Block until `count` events arrived or the timeout expires
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.call_count() >= count {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        self.call_count() >= count
    }
}

impl PlacementListener for RecordingListener {
    fn on_event(&self, event: Event) {
        self.events.lock().push(event);
        self.call_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// A listener that always panics
pub struct PanickingListener;

impl PlacementListener for PanickingListener {
    fn on_event(&self, event: Event) {
        panic!("listener blew up on {}", event.tag());
    }
}

/// Bridge over an editor adapter, not yet configured
pub fn new_bridge() -> (AdBridge, Arc<EditorAdapter>) {
    let adapter = Arc::new(EditorAdapter::new());
    let bridge = AdBridge::new(adapter.clone(), BridgeSettings::default())
        .expect("default settings are valid");
    (bridge, adapter)
}

/// Bridge that has been configured and started
pub fn started_bridge(app_id: &str) -> (AdBridge, Arc<EditorAdapter>) {
    let (bridge, adapter) = new_bridge();
    bridge.start_with_app_id(app_id).expect("start succeeds");
    (bridge, adapter)
}

/// Payload without extra fields
pub fn payload(tag: &str, placement_id: &str) -> String {
    json!({ "callback": tag, "placement_id": placement_id }).to_string()
}

/// Payload carrying an error message
pub fn error_payload(tag: &str, placement_id: &str, error: &str) -> String {
    json!({ "callback": tag, "placement_id": placement_id, "error": error }).to_string()
}

/// Payload carrying impression data shaped like the native SDK emits it
pub fn impression_payload(tag: &str, placement_id: &str, format: AdFormat) -> String {
    json!({
        "callback": tag,
        "placement_id": placement_id,
        "impression_data": {
            "advertiserDomain": "example.com",
            "campaignId": "cmp-7",
            "countryCode": "DE",
            "creativeId": "cr-1",
            "currency": "USD",
            "demandSource": "Network A",
            "impressionDepth": 3,
            "impressionId": "imp-99",
            "netPayout": "0.0125",
            "networkInstanceId": "inst-5",
            "priceAccuracy": 2,
            "placementType": format.placement_type().ordinal(),
            "renderingSDK": "NetworkSDK",
            "renderingSDKVersion": "9.1.0",
            "variantId": "v2"
        }
    })
    .to_string()
}

/// Deliver a payload through the adapter's sink
pub fn deliver(adapter: &EditorAdapter, format: AdFormat, payload: String) {
    assert!(adapter.deliver(format, payload), "inbound sink is open");
}

/// Poll a condition until it holds or the timeout expires
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub const WAIT: Duration = Duration::from_secs(5);
