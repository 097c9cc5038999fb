//! Application-facing listener trait
//!
//! A listener is attached to one `(format, placement id)` pair and receives
//! every [`Event`] routed to it, by value, in the order the native layer
//! emitted them.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::codec::Event;

/// Callback capability for one placement
///
/// Invoked on the dispatch worker, never concurrently for the same
/// placement. A panic inside `on_event` is caught and logged by the
/// dispatcher; it does not affect placement state or later deliveries.
///
/// Any `Fn(Event) + Send + Sync` closure is a listener.
pub trait PlacementListener: Send + Sync {
    /// Handle one routed event
    fn on_event(&self, event: Event);
}

impl<F> PlacementListener for F
where
    F: Fn(Event) + Send + Sync,
{
    fn on_event(&self, event: Event) {
        self(event)
    }
}

/// Shared handle to a registered listener
pub type ListenerHandle = Arc<dyn PlacementListener>;

/// Listener that forwards every event into an unbounded channel
///
/// Handy for applications that want to consume events from their own task
/// instead of the dispatch worker.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelListener {
    /// Create a listener and the receiver it feeds
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PlacementListener for ChannelListener {
    fn on_event(&self, event: Event) {
        // Receiver gone means the application stopped listening.
        let _ = self.tx.send(event);
    }
}
