//! Boundary traits and types for the ad bridge
//!
//! - [`NativeAdapter`]: outbound calls into the native mediation SDK
//! - [`InboundSink`]: how the native side hands notifications back
//! - [`PlacementListener`]: application callbacks for one placement

pub mod native_adapter;
pub mod listener;

pub use native_adapter::{AdFormat, InboundMessage, InboundSink, NativeAdapter};
pub use listener::{ChannelListener, ListenerHandle, PlacementListener};
