//! Contract Test: SDK Lifecycle
//!
//! Constraints verified:
//! - The first non-empty app id wins; empty app ids are rejected
//! - Options only take effect before start
//! - The adapter is started exactly once, with the frozen configuration
//! - A failed native start leaves the SDK startable again
//! - Placement operations require a started SDK
//! - Concurrent starts reach the adapter once, with one consistent snapshot
//! - Destroying a banner resets its availability
//! - An adapter may deliver notifications from inside its own start

mod common;

use adbridge_core::traits::{AdFormat, InboundSink, NativeAdapter};
use adbridge_core::{
    AdBridge, BridgeSettings, CallbackTag, EditorAdapter, Error, LifecycleState, OptionOutcome,
    OutboundCall, SdkOption, StartOptions, StartRequest,
};
use common::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn first_app_id_wins() {
    let (bridge, adapter) = new_bridge();

    assert!(matches!(bridge.configure(""), Err(Error::Config(_))));
    assert_eq!(bridge.state(), LifecycleState::Unconfigured);

    bridge.configure("first").unwrap();
    bridge.configure("second").unwrap();
    bridge.start().unwrap();

    let config = bridge.config().expect("configured");
    assert_eq!(config.app_id, "first");
    assert!(config.started);
    assert_eq!(adapter.start_count(), 1);
}

#[test]
fn start_without_configure_fails() {
    let (bridge, adapter) = new_bridge();

    assert!(matches!(bridge.start(), Err(Error::NotConfigured)));
    assert_eq!(bridge.state(), LifecycleState::Unconfigured);
    assert!(adapter.calls().is_empty());
}

#[test]
fn options_are_frozen_at_start() {
    let (bridge, adapter) = new_bridge();
    bridge.configure("42").unwrap();
    bridge.start().unwrap();

    assert_eq!(
        bridge.set_option(SdkOption::DisableAutoRequesting),
        OptionOutcome::IgnoredAlreadyStarted
    );
    bridge.enable_logs();

    let config = bridge.config().unwrap();
    assert!(config.auto_requesting_enabled);
    assert!(!config.logging_enabled);

    match &adapter.calls()[..] {
        [OutboundCall::Start(request)] => {
            assert_eq!(request.app_id, "42");
            assert_eq!(request.options, StartOptions::NONE);
        }
        other => panic!("unexpected outbound calls: {other:?}"),
    }
}

#[test]
fn options_before_configure_are_ignored() {
    let (bridge, _adapter) = new_bridge();

    assert_eq!(
        bridge.set_option(SdkOption::EnableLogging),
        OptionOutcome::IgnoredNotConfigured
    );
    bridge.configure("42").unwrap();
    assert_eq!(bridge.set_option(SdkOption::EnableLogging), OptionOutcome::Applied);
    assert!(bridge.config().unwrap().logging_enabled);
}

#[test]
fn logging_is_enabled_before_native_start() {
    let (bridge, adapter) = new_bridge();
    bridge.configure("42").unwrap().enable_logs().disable_auto_requesting();
    bridge.start().unwrap();

    let calls = adapter.calls();
    assert_eq!(calls[0], OutboundCall::SetDebugLogging(true));
    assert!(matches!(
        &calls[1],
        OutboundCall::Start(request) if request.options == StartOptions::DISABLE_AUTOMATIC_REQUESTING
    ));
}

#[test]
fn repeated_start_is_a_no_op() {
    let (bridge, adapter) = started_bridge("42");

    bridge.start().unwrap();
    bridge.start_with_app_id("other").unwrap();

    assert_eq!(adapter.start_count(), 1);
    assert_eq!(bridge.config().unwrap().app_id, "42");
}

#[test]
fn failed_native_start_can_be_retried() {
    let (bridge, adapter) = new_bridge();
    bridge.configure("42").unwrap();

    adapter.refuse_start(true);
    assert!(matches!(bridge.start(), Err(Error::Native { .. })));
    assert_eq!(bridge.state(), LifecycleState::Configured);

    adapter.refuse_start(false);
    bridge.start().unwrap();
    assert_eq!(bridge.state(), LifecycleState::Started);
    assert_eq!(adapter.start_count(), 1);
}

#[test]
fn placement_operations_require_start() {
    let (bridge, adapter) = new_bridge();
    bridge.configure("42").unwrap();

    for format in AdFormat::ALL {
        let placements = bridge.placements(format);
        assert!(matches!(placements.load("P1"), Err(Error::NotStarted(_))));
        assert!(matches!(placements.show("P1"), Err(Error::NotStarted(_))));
    }
    assert!(adapter.calls().is_empty());

    bridge.start().unwrap();
    bridge.interstitial().load("P1").unwrap();
    bridge.banner().show("B1").unwrap();

    let calls = adapter.calls();
    assert!(calls.contains(&OutboundCall::Load {
        format: AdFormat::Interstitial,
        placement_id: "P1".into()
    }));
    assert!(calls.contains(&OutboundCall::Show {
        format: AdFormat::Banner,
        placement_id: "B1".into()
    }));
}

#[test]
fn test_suite_is_callable_in_any_phase() {
    let (bridge, adapter) = new_bridge();

    bridge.show_test_suite().unwrap();
    bridge.start_with_app_id("42").unwrap();
    bridge.show_test_suite().unwrap();

    let suites = adapter
        .calls()
        .into_iter()
        .filter(|call| *call == OutboundCall::ShowTestSuite)
        .count();
    assert_eq!(suites, 2);
}

#[test]
fn concurrent_starts_reach_the_adapter_once() {
    let (bridge, adapter) = new_bridge();
    bridge.configure("42").unwrap();
    let bridge = Arc::new(bridge);
    let gate = Arc::new(Barrier::new(8));

    let starters: Vec<_> = (0..8)
        .map(|_| {
            let bridge = Arc::clone(&bridge);
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                gate.wait();
                bridge.start()
            })
        })
        .collect();
    for starter in starters {
        starter.join().expect("starter thread").unwrap();
    }

    assert_eq!(adapter.start_count(), 1);
    assert_eq!(bridge.state(), LifecycleState::Started);
}

#[test]
fn option_racing_start_is_either_in_or_out() {
    for _ in 0..50 {
        let (bridge, adapter) = new_bridge();
        bridge.configure("42").unwrap();
        let bridge = Arc::new(bridge);
        let gate = Arc::new(Barrier::new(2));

        let setter = {
            let bridge = Arc::clone(&bridge);
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                gate.wait();
                bridge.set_option(SdkOption::DisableAutoRequesting)
            })
        };
        gate.wait();
        bridge.start().unwrap();
        let outcome = setter.join().expect("setter thread");

        let config = bridge.config().unwrap();
        let sent = adapter
            .calls()
            .into_iter()
            .find_map(|call| match call {
                OutboundCall::Start(request) => Some(request.options),
                _ => None,
            })
            .expect("adapter started");
        if outcome == OptionOutcome::Applied {
            assert!(!config.auto_requesting_enabled);
            assert_eq!(sent, StartOptions::DISABLE_AUTOMATIC_REQUESTING);
        } else {
            assert_eq!(outcome, OptionOutcome::IgnoredAlreadyStarted);
            assert!(config.auto_requesting_enabled);
            assert_eq!(sent, StartOptions::NONE);
        }
    }
}

#[test]
fn destroyed_banner_is_unavailable_until_shown_again() {
    let (bridge, adapter) = new_bridge();
    bridge.configure("42").unwrap();
    assert!(matches!(bridge.banner().destroy("B1"), Err(Error::NotStarted("destroy"))));

    bridge.start().unwrap();
    deliver(&adapter, AdFormat::Banner, payload("available", "B1"));
    assert!(eventually(WAIT, || bridge.banner().is_available("B1")));

    bridge.banner().destroy("B1").unwrap();
    assert!(!bridge.banner().is_available("B1"));
    bridge.banner().show("B1").unwrap();

    let calls = adapter.calls();
    let destroyed = calls
        .iter()
        .position(|call| *call == OutboundCall::DestroyBanner { placement_id: "B1".into() })
        .expect("destroy forwarded");
    assert_eq!(
        calls[destroyed + 1],
        OutboundCall::Show {
            format: AdFormat::Banner,
            placement_id: "B1".into()
        }
    );
}

/// Adapter whose native layer announces a banner while it is still starting
struct EagerAdapter(EditorAdapter);

impl NativeAdapter for EagerAdapter {
    fn start(&self, request: &StartRequest, sink: InboundSink) -> adbridge_core::Result<()> {
        assert!(sink.deliver(AdFormat::Banner, payload("available", "B1")));
        self.0.start(request, sink)
    }

    fn load(&self, format: AdFormat, placement_id: &str) -> adbridge_core::Result<()> {
        self.0.load(format, placement_id)
    }

    fn show(&self, format: AdFormat, placement_id: &str) -> adbridge_core::Result<()> {
        self.0.show(format, placement_id)
    }

    fn destroy_banner(&self, placement_id: &str) -> adbridge_core::Result<()> {
        self.0.destroy_banner(placement_id)
    }

    fn set_debug_logging(&self, enabled: bool) -> adbridge_core::Result<()> {
        self.0.set_debug_logging(enabled)
    }

    fn show_test_suite(&self) -> adbridge_core::Result<()> {
        self.0.show_test_suite()
    }

    fn adapter_name(&self) -> &'static str {
        "eager"
    }
}

#[test]
fn adapter_may_deliver_while_starting() {
    let bridge = AdBridge::new(
        Arc::new(EagerAdapter(EditorAdapter::new())),
        BridgeSettings::default(),
    )
    .unwrap();
    let listener = RecordingListener::new();
    bridge.banner().set_listener("B1", listener.clone());

    bridge.start_with_app_id("42").unwrap();

    assert!(listener.wait_for(1, WAIT));
    assert_eq!(listener.tags(), vec![CallbackTag::Available]);
    assert!(bridge.banner().is_available("B1"));
}
