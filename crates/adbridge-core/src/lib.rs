// # adbridge-core
//
// Core library for bridging a native ad-mediation SDK into an application.
//
// ## Architecture Overview
//
// - **NativeAdapter**: Trait for the outbound half of the native boundary
// - **InboundSink**: Where the native side pushes `(format, payload)` callbacks
// - **codec**: Decodes callback payloads into typed `Event`s
// - **PlacementRegistry**: Per-format availability and listener tables
// - **Dispatcher**: Single worker that decodes and routes callbacks in order
// - **SdkLifecycle**: Configure → options → start state machine
// - **AdBridge**: The facade an application holds
//
// ## Design Principles
//
// 1. **No global state**: one `AdBridge` value owns everything
// 2. **Ordered delivery**: events for a placement reach its listener in arrival order
// 3. **Isolation**: a bad payload or a panicking listener never stops dispatch
// 4. **Library-First**: the replay tool is a thin shell around this crate

pub mod bridge;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod impression;
pub mod lifecycle;
pub mod native;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use bridge::{AdBridge, Placements};
pub use codec::{CallbackTag, Event, EventKind};
pub use config::{BridgeSettings, FrameworkParams, SdkConfig, StartOptions, StartRequest};
pub use dispatch::{DispatchStats, Dispatcher, ImpressionNotice};
pub use error::{DecodeError, Error, Result};
pub use impression::{ImpressionRecord, PlacementType, PriceAccuracy};
pub use lifecycle::{LifecycleState, OptionOutcome, SdkLifecycle, SdkOption};
pub use native::{EditorAdapter, OutboundCall};
pub use registry::{DeliveryOutcome, DeliverySequence, PlacementRegistry, PlacementState};
pub use traits::{AdFormat, ChannelListener, InboundMessage, InboundSink, ListenerHandle, NativeAdapter, PlacementListener};
