// # adbridge-replay - Notification Replay Tool
//
// A thin shell around adbridge-core. It feeds a capture of native SDK
// notifications through the same inbound path a device build uses, so
// decode and routing behavior can be inspected off-device.
//
// The tool is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering a logging listener for every captured placement
// 4. Starting the bridge against the editor adapter and replaying the capture
//
// ## Configuration
//
// - `ADBRIDGE_REPLAY_FILE`: Capture file, one `<format>\t<json>` per line (required)
// - `ADBRIDGE_APP_ID`: App id used to configure the SDK (default `replay`)
// - `ADBRIDGE_LOG_LEVEL`: trace, debug, info, warn or error (default `info`)
// - `ADBRIDGE_DRAIN_TIMEOUT_SECS`: How long to wait for dispatch to finish (default 10)
//
// ## Example
//
// ```bash
// export ADBRIDGE_REPLAY_FILE=./session.tsv
// export ADBRIDGE_LOG_LEVEL=debug
//
// adbridge-replay
// ```

mod capture;

use adbridge_core::{AdBridge, BridgeSettings, EditorAdapter, Event};
use anyhow::Result;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Replay finished
/// - 1: Configuration or capture error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum ReplayExitCode {
    Finished = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<ReplayExitCode> for ExitCode {
    fn from(code: ReplayExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    replay_file: PathBuf,
    app_id: String,
    log_level: String,
    drain_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            replay_file: env::var("ADBRIDGE_REPLAY_FILE")
                .map(PathBuf::from)
                .map_err(|_| {
                    anyhow::anyhow!(
                        "ADBRIDGE_REPLAY_FILE is required. \
                        Set it via: export ADBRIDGE_REPLAY_FILE=./session.tsv"
                    )
                })?,
            app_id: env::var("ADBRIDGE_APP_ID").unwrap_or_else(|_| "replay".to_string()),
            log_level: env::var("ADBRIDGE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            drain_timeout_secs: env::var("ADBRIDGE_DRAIN_TIMEOUT_SECS")
                .ok()
                .map(|s| s.parse().unwrap_or(10))
                .unwrap_or(10),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if !self.replay_file.is_file() {
            anyhow::bail!(
                "ADBRIDGE_REPLAY_FILE does not point to a file: {}",
                self.replay_file.display()
            );
        }

        if self.app_id.trim().is_empty() {
            anyhow::bail!("ADBRIDGE_APP_ID cannot be empty");
        }

        if !(1..=600).contains(&self.drain_timeout_secs) {
            anyhow::bail!(
                "ADBRIDGE_DRAIN_TIMEOUT_SECS must be between 1 and 600 seconds. Got: {}",
                self.drain_timeout_secs
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "ADBRIDGE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ReplayExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return ReplayExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ReplayExitCode::ConfigError.into();
    }

    let lines = match capture::load(&config.replay_file) {
        Ok(lines) => lines,
        Err(e) => {
            error!("Capture error: {:#}", e);
            return ReplayExitCode::ConfigError.into();
        }
    };
    info!(
        "Loaded {} notification(s) from {}",
        lines.len(),
        config.replay_file.display()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ReplayExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_replay(&config, lines).await {
            error!("Replay error: {:#}", e);
            ReplayExitCode::RuntimeError
        } else {
            ReplayExitCode::Finished
        }
    });

    result.into()
}

/// Replay a parsed capture through a fresh bridge
async fn run_replay(config: &Config, lines: Vec<capture::CapturedLine>) -> Result<()> {
    let adapter = Arc::new(EditorAdapter::new());
    let bridge = AdBridge::new(adapter.clone(), BridgeSettings::default())?;

    let placements = capture::placements(&lines);
    for (format, placement_id) in &placements {
        let format = *format;
        bridge
            .placements(format)
            .set_listener(placement_id, move |event: Event| {
                let error = event.error_message().unwrap_or_default();
                let impression = event
                    .impression()
                    .and_then(|record| record.impression_id())
                    .unwrap_or_default();
                info!(
                    %format,
                    placement_id = %event.placement_id,
                    callback = %event.tag(),
                    error,
                    impression,
                    "event"
                );
            });
    }
    info!("Registered listeners for {} placement(s)", placements.len());

    bridge.start_with_app_id(&config.app_id)?;

    let sink = bridge.inbound_sink();
    let mut delivered = 0u64;
    for line in lines {
        if sink.deliver(line.format, line.payload) {
            delivered += 1;
        } else {
            warn!("line {}: inbound sink closed, skipping", line.line);
        }
    }

    let drain = Duration::from_secs(config.drain_timeout_secs);
    let drained = tokio::time::timeout(drain, async {
        loop {
            let stats = bridge.stats();
            if stats.routed + stats.undecodable >= delivered {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if drained.is_err() {
        anyhow::bail!("dispatch did not drain within {:?}", drain);
    }

    for (format, placement_id) in &placements {
        let available = bridge.placements(*format).is_available(placement_id);
        println!("{format}\t{placement_id}\tavailable={available}");
    }

    let stats = bridge.stats();
    println!(
        "received={} routed={} undecodable={} without_listener={} listener_panics={}",
        stats.received, stats.routed, stats.undecodable, stats.without_listener, stats.listener_panics
    );

    bridge.shutdown();
    info!("Replay finished");
    Ok(())
}
