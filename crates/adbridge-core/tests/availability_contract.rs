//! Contract Test: Placement Availability
//!
//! Constraints verified:
//! - `available` sets availability; `unavailable`, `show`, `hide` and
//!   `failed` clear it; every other kind leaves it alone
//! - Unknown placements report unavailable
//! - Formats keep separate tables for the same placement id
//! - Listeners may query availability and re-register from inside a callback
//! - A listener change does not affect payloads already queued for dispatch

mod common;

use adbridge_core::traits::AdFormat;
use adbridge_core::{AdBridge, CallbackTag, EditorAdapter, Event};
use common::*;
use std::sync::{Arc, Barrier};
use std::sync::atomic::{AtomicBool, Ordering};

#[test]
fn unknown_placement_is_unavailable() {
    let (bridge, _adapter) = new_bridge();

    for format in AdFormat::ALL {
        assert!(!bridge.placements(format).is_available("never-seen"));
        assert!(bridge.placements(format).state("never-seen").is_none());
    }
}

#[test]
fn availability_follows_the_ad_lifecycle() {
    let (bridge, adapter) = started_bridge("42");
    let listener = RecordingListener::new();
    bridge.interstitial().set_listener("I1", listener.clone());
    let mut expected = 0;
    let mut step = |raw: String, available: bool| {
        deliver(&adapter, AdFormat::Interstitial, raw);
        expected += 1;
        assert!(listener.wait_for(expected, WAIT));
        assert_eq!(bridge.interstitial().is_available("I1"), available);
    };

    step(payload("request_start", "I1"), false);
    step(payload("loaded", "I1"), false);
    step(payload("available", "I1"), true);
    step(payload("click", "I1"), true);
    step(error_payload("error", "I1", "bad state"), true);
    step(payload("rewarded_result_complete", "I1"), true);
    step(payload("show", "I1"), false);
    step(payload("available", "I1"), true);
    step(payload("hide", "I1"), false);
    step(payload("available", "I1"), true);
    step(error_payload("failed", "I1", "no fill"), false);
    step(payload("available", "I1"), true);
    step(payload("unavailable", "I1"), false);
}

#[test]
fn formats_do_not_share_placements() {
    let (bridge, adapter) = started_bridge("42");

    deliver(&adapter, AdFormat::Banner, payload("available", "shared"));
    assert!(eventually(WAIT, || bridge.banner().is_available("shared")));

    assert!(!bridge.rewarded().is_available("shared"));
    assert!(!bridge.interstitial().is_available("shared"));
    assert_eq!(bridge.banner().ids(), vec!["shared".to_string()]);
    assert!(bridge.rewarded().ids().is_empty());
}

#[test]
fn availability_tracks_without_listener() {
    let (bridge, adapter) = started_bridge("42");

    deliver(&adapter, AdFormat::Rewarded, payload("available", "R1"));
    assert!(eventually(WAIT, || bridge.stats().without_listener == 1));

    let state = bridge.rewarded().state("R1").expect("placement created");
    assert!(state.is_available);
    assert!(!state.has_listener);
}

#[test]
fn listener_can_query_availability_from_callback() {
    let (bridge, adapter) = started_bridge("42");
    let bridge = Arc::new(bridge);
    let seen_available = Arc::new(AtomicBool::new(false));

    {
        let inner = Arc::downgrade(&bridge);
        let seen = seen_available.clone();
        bridge.rewarded().set_listener("R1", move |event: Event| {
            if event.tag() == CallbackTag::Available {
                if let Some(bridge) = inner.upgrade() {
                    seen.store(bridge.rewarded().is_available("R1"), Ordering::SeqCst);
                }
            }
        });
    }

    deliver(&adapter, AdFormat::Rewarded, payload("available", "R1"));
    assert!(eventually(WAIT, || seen_available.load(Ordering::SeqCst)));
}

#[test]
fn listener_can_replace_itself_from_callback() {
    let (bridge, adapter) = started_bridge("42");
    let bridge = Arc::new(bridge);
    let replacement = RecordingListener::new();

    {
        let inner = Arc::downgrade(&bridge);
        let replacement = replacement.clone();
        bridge.interstitial().set_listener("I1", move |_event: Event| {
            if let Some(bridge) = inner.upgrade() {
                bridge.interstitial().set_listener("I1", replacement.clone());
            }
        });
    }

    deliver(&adapter, AdFormat::Interstitial, payload("loaded", "I1"));
    assert!(eventually(WAIT, || bridge.stats().routed == 1));
    deliver(&adapter, AdFormat::Interstitial, payload("show", "I1"));

    assert!(replacement.wait_for(1, WAIT));
    assert_eq!(replacement.tags(), vec![CallbackTag::Shown]);
}

#[test]
fn cleared_listener_stops_receiving() {
    let (bridge, adapter) = started_bridge("42");
    let listener = RecordingListener::new();
    bridge.banner().set_listener("B1", listener.clone());

    deliver(&adapter, AdFormat::Banner, payload("show", "B1"));
    assert!(listener.wait_for(1, WAIT));

    assert!(bridge.banner().clear_listener("B1"));
    assert!(!bridge.banner().clear_listener("B1"));

    deliver(&adapter, AdFormat::Banner, payload("click", "B1"));
    assert!(eventually(WAIT, || bridge.stats().without_listener == 1));
    assert_eq!(listener.call_count(), 1);
}

/// Occupy the dispatch worker with a listener on `BLOCK` until released
fn hold_worker(bridge: &AdBridge, adapter: &EditorAdapter) -> Arc<Barrier> {
    let gate = Arc::new(Barrier::new(2));
    let held = gate.clone();
    bridge.banner().set_listener("BLOCK", move |_event: Event| {
        held.wait();
        held.wait();
    });
    deliver(adapter, AdFormat::Banner, payload("show", "BLOCK"));
    gate.wait();
    gate
}

#[test]
fn clearing_does_not_drop_an_already_delivered_event() {
    let (bridge, adapter) = started_bridge("42");
    let listener = RecordingListener::new();
    bridge.rewarded().set_listener("P1", listener.clone());

    let gate = hold_worker(&bridge, &adapter);
    deliver(&adapter, AdFormat::Rewarded, payload("available", "P1"));
    assert!(bridge.rewarded().clear_listener("P1"));
    gate.wait();

    assert!(listener.wait_for(1, WAIT));
    assert_eq!(listener.tags(), vec![CallbackTag::Available]);
    assert!(eventually(WAIT, || bridge.stats().routed == 2));
    assert_eq!(bridge.stats().without_listener, 0);

    deliver(&adapter, AdFormat::Rewarded, payload("unavailable", "P1"));
    assert!(eventually(WAIT, || bridge.stats().without_listener == 1));
    assert_eq!(listener.call_count(), 1);
}

#[test]
fn replacement_applies_to_events_delivered_after_it() {
    let (bridge, adapter) = started_bridge("42");
    let old = RecordingListener::new();
    let new = RecordingListener::new();
    bridge.interstitial().set_listener("I1", old.clone());

    let gate = hold_worker(&bridge, &adapter);
    deliver(&adapter, AdFormat::Interstitial, payload("available", "I1"));
    bridge.interstitial().set_listener("I1", new.clone());
    deliver(&adapter, AdFormat::Interstitial, payload("show", "I1"));
    gate.wait();

    assert!(new.wait_for(1, WAIT));
    assert_eq!(old.tags(), vec![CallbackTag::Available]);
    assert_eq!(new.tags(), vec![CallbackTag::Shown]);
}
