//! Minimal embedding example for adbridge-core
//!
//! This example plugs a simulated native SDK into the bridge and walks a
//! rewarded placement through load, show and reward. The simulated SDK
//! answers from its own threads, the way a real one does.

use adbridge_core::traits::{AdFormat, InboundSink, NativeAdapter};
use adbridge_core::{AdBridge, BridgeSettings, Event, EventKind, Result, StartRequest};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

/// Native SDK stand-in that replies to every request on a background thread
#[derive(Default)]
struct SimulatedSdk {
    sink: Mutex<Option<InboundSink>>,
}

impl SimulatedSdk {
    fn reply(&self, format: AdFormat, payloads: Vec<String>) {
        let Some(sink) = self.sink.lock().clone() else {
            return;
        };
        std::thread::spawn(move || {
            for payload in payloads {
                std::thread::sleep(Duration::from_millis(20));
                sink.deliver(format, payload);
            }
        });
    }
}

fn callback(tag: &str, placement_id: &str) -> String {
    json!({ "callback": tag, "placement_id": placement_id }).to_string()
}

fn callback_with_impression(tag: &str, placement_id: &str) -> String {
    json!({
        "callback": tag,
        "placement_id": placement_id,
        "impression_data": {
            "demandSource": "Simulated Network",
            "impressionId": "demo-1",
            "netPayout": "0.02",
            "currency": "USD",
            "priceAccuracy": 2,
            "placementType": 2,
            "impressionDepth": 1
        }
    })
    .to_string()
}

impl NativeAdapter for SimulatedSdk {
    fn start(&self, request: &StartRequest, sink: InboundSink) -> Result<()> {
        println!(
            "[Native] start app_id={} options={:#x} params={}",
            request.app_id,
            request.options.bits(),
            request.framework_params.to_json()?
        );
        *self.sink.lock() = Some(sink);
        Ok(())
    }

    fn load(&self, format: AdFormat, placement_id: &str) -> Result<()> {
        println!("[Native] load {format} {placement_id}");
        self.reply(
            format,
            vec![
                callback("request_start", placement_id),
                callback("loaded", placement_id),
                callback("available", placement_id),
            ],
        );
        Ok(())
    }

    fn show(&self, format: AdFormat, placement_id: &str) -> Result<()> {
        println!("[Native] show {format} {placement_id}");
        self.reply(
            format,
            vec![
                callback("unavailable", placement_id),
                callback_with_impression("show", placement_id),
                callback_with_impression("rewarded_result_complete", placement_id),
                callback_with_impression("hide", placement_id),
            ],
        );
        Ok(())
    }

    fn destroy_banner(&self, placement_id: &str) -> Result<()> {
        println!("[Native] destroy banner {placement_id}");
        Ok(())
    }

    fn set_debug_logging(&self, enabled: bool) -> Result<()> {
        println!("[Native] debug logging {enabled}");
        Ok(())
    }

    fn show_test_suite(&self) -> Result<()> {
        println!("[Native] test suite");
        Ok(())
    }

    fn adapter_name(&self) -> &'static str {
        "simulated"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Embedded adbridge-core Example ===\n");

    println!("1. Creating bridge...");
    let bridge = AdBridge::new(Arc::new(SimulatedSdk::default()), BridgeSettings::default())?;

    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();
    bridge
        .rewarded()
        .set_listener("MainMenuRewarded", move |event: Event| {
            println!("[Listener] {} {}", event.placement_id, event.tag());
            if matches!(event.kind, EventKind::Hidden { .. }) {
                let _ = done_tx.send(());
            }
        });

    let mut impressions = bridge.impression_stream();
    let impression_listener = tokio::spawn(async move {
        while let Some(Ok(notice)) = impressions.next().await {
            println!(
                "[Impression] {} {} via {} payout={:?}",
                notice.format,
                notice.placement_id,
                notice.tag,
                notice.impression.net_payout()
            );
        }
    });

    println!("2. Configuring and starting...");
    bridge.configure("12345")?.disable_auto_requesting().enable_logs();
    bridge.start()?;

    println!("3. Loading...");
    bridge.rewarded().load("MainMenuRewarded")?;
    while !bridge.rewarded().is_available("MainMenuRewarded") {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    println!("4. Showing...");
    bridge.rewarded().show("MainMenuRewarded")?;
    let _ = tokio::time::timeout(Duration::from_secs(2), done_rx.recv()).await;

    println!("\n5. Shutting down...");
    bridge.shutdown();
    drop(bridge);
    let _ = tokio::time::timeout(Duration::from_millis(100), impression_listener).await;

    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- The bridge is an ordinary value owned by the application");
    println!("- Native callbacks arrive on foreign threads and are routed in order");
    println!("- Impressions are also available as a stream");

    Ok(())
}
