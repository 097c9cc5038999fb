//! Placement registry
//!
//! One namespace per [`AdFormat`], each mapping placement id to the state the
//! dispatcher maintains for it: current availability and the registered
//! listener.
//!
//! ## Locking
//!
//! ```text
//! tables[format]  RwLock<HashMap<id, Arc<PlacementEntry>>>  (lookup/insert)
//!   └─ entry.delivery   Mutex<()>     serializes apply() per placement
//!   └─ entry.listener   RwLock<..>    swapped by the application
//!   └─ entry.available  AtomicBool    read lock-free by the application
//! ```
//!
//! `apply` holds the entry's delivery lock across the availability update and
//! the listener call, so two events for the same placement are never applied
//! concurrently or out of order. Other placements are unaffected. The listener
//! slot is only locked long enough to pick the handle, so a listener may
//! re-register itself or query availability from inside its callback.
//!
//! Listener changes are ordered against the inbound queue through a
//! [`DeliverySequence`]: a payload goes to the listener that was registered
//! when the native layer delivered it, even if it is applied after a later
//! `set_listener` or `clear_listener`.
//!
//! Entries are created lazily and never removed.

use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error};

use crate::codec::Event;
use crate::traits::{AdFormat, ListenerHandle, PlacementListener};

/// Snapshot of one placement's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementState {
    /// Whether an ad is ready to show
    pub is_available: bool,
    /// Whether a listener is registered
    pub has_listener: bool,
}

/// What happened when an event was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The listener ran to completion
    Delivered,
    /// No listener registered; the event was dropped
    NoListener,
    /// The listener panicked; state was still updated
    ListenerPanicked,
}

/// Ordering point shared by the inbound sink and the registry
///
/// Every delivered payload gets the next sequence number while the counter
/// lock is held, so channel order and sequence order agree. Listener changes
/// read the counter to learn which payloads were already in the pipeline.
#[derive(Debug, Default)]
pub struct DeliverySequence {
    next: Mutex<u64>,
    /// Every payload numbered below this has been applied
    applied: AtomicU64,
}

impl DeliverySequence {
    /// Number the next payload and hand it to `send`, under the counter lock
    pub(crate) fn stamp<T>(&self, send: impl FnOnce(u64) -> T) -> T {
        let mut next = self.next.lock();
        let seq = *next;
        *next += 1;
        send(seq)
    }

    /// First sequence number not yet handed out
    fn cutoff(&self) -> u64 {
        *self.next.lock()
    }

    /// Record that the payload numbered `seq` has been applied
    pub(crate) fn mark_applied(&self, seq: u64) {
        self.applied.fetch_max(seq + 1, Ordering::AcqRel);
    }

    fn applied(&self) -> u64 {
        self.applied.load(Ordering::Acquire)
    }
}

/// Current listener plus the ones it replaced while payloads delivered
/// before the change were still queued
#[derive(Default)]
struct ListenerSlot {
    current: Option<ListenerHandle>,
    /// `(cutoff, listener)`: payloads numbered below `cutoff` go to `listener`.
    /// Cutoffs are non-decreasing.
    retired: VecDeque<(u64, Option<ListenerHandle>)>,
}

impl ListenerSlot {
    fn replace(
        &mut self,
        listener: Option<ListenerHandle>,
        cutoff: u64,
        applied: u64,
    ) -> Option<ListenerHandle> {
        self.prune(applied);
        let previous = std::mem::replace(&mut self.current, listener);
        if cutoff > applied {
            self.retired.push_back((cutoff, previous.clone()));
        }
        previous
    }

    fn prune(&mut self, applied: u64) {
        while self.retired.front().is_some_and(|(cutoff, _)| *cutoff <= applied) {
            self.retired.pop_front();
        }
    }

    /// Listener that was registered when payload `seq` was delivered;
    /// unsequenced events go to the current one
    fn listener_for(&self, seq: Option<u64>) -> Option<ListenerHandle> {
        if let Some(seq) = seq
            && let Some((_, listener)) = self.retired.iter().find(|(cutoff, _)| seq < *cutoff)
        {
            return listener.clone();
        }
        self.current.clone()
    }
}

#[derive(Default)]
struct PlacementEntry {
    available: AtomicBool,
    listener: RwLock<ListenerSlot>,
    delivery: Mutex<()>,
}

impl PlacementEntry {
    fn snapshot(&self) -> PlacementState {
        PlacementState {
            is_available: self.available.load(Ordering::Acquire),
            has_listener: self.listener.read().current.is_some(),
        }
    }
}

type PlacementTable = RwLock<HashMap<String, Arc<PlacementEntry>>>;

/// Per-format placement state
#[derive(Default)]
pub struct PlacementRegistry {
    tables: [PlacementTable; 3],
    sequence: Arc<DeliverySequence>,
}

impl PlacementRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence shared with the inbound sink feeding this registry
    pub fn sequence(&self) -> &Arc<DeliverySequence> {
        &self.sequence
    }

    /// Register (or replace) the listener for a placement
    ///
    /// The new listener receives payloads delivered after this call. Payloads
    /// already queued still go to the listener that was registered when they
    /// were delivered.
    pub fn set_listener(
        &self,
        format: AdFormat,
        placement_id: &str,
        listener: Arc<dyn PlacementListener>,
    ) {
        let entry = self.entry(format, placement_id);
        let replaced = self.swap_listener(&entry, Some(listener)).is_some();
        debug!(%format, placement_id, replaced, "listener registered");
    }

    /// Remove the listener for a placement
    ///
    /// Returns `true` if a listener was registered. Payloads delivered before
    /// this call, queued or in flight, still reach the old listener.
    pub fn clear_listener(&self, format: AdFormat, placement_id: &str) -> bool {
        let Some(entry) = self.lookup(format, placement_id) else {
            return false;
        };
        let removed = self.swap_listener(&entry, None).is_some();
        debug!(%format, placement_id, removed, "listener cleared");
        removed
    }

    /// Whether an ad is ready for a placement; unknown placements are not
    pub fn is_available(&self, format: AdFormat, placement_id: &str) -> bool {
        self.lookup(format, placement_id)
            .is_some_and(|entry| entry.available.load(Ordering::Acquire))
    }

    /// Mark a known placement unavailable outside of any event
    pub fn reset_availability(&self, format: AdFormat, placement_id: &str) {
        if let Some(entry) = self.lookup(format, placement_id) {
            entry.available.store(false, Ordering::Release);
        }
    }

    /// Snapshot of a placement, if it has been seen
    pub fn state(&self, format: AdFormat, placement_id: &str) -> Option<PlacementState> {
        self.lookup(format, placement_id).map(|entry| entry.snapshot())
    }

    /// Placement ids known for a format, sorted
    pub fn placements(&self, format: AdFormat) -> Vec<String> {
        let mut ids: Vec<String> = self.tables[format.index()].read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Apply an event to its placement and hand it to the current listener
    ///
    /// Creates the placement on first sight. Listener panics are caught here
    /// and reported as [`DeliveryOutcome::ListenerPanicked`].
    pub fn apply(&self, format: AdFormat, event: Event) -> DeliveryOutcome {
        self.apply_sequenced(format, event, None)
    }

    /// Apply an event that arrived through the inbound sink as payload `seq`
    pub(crate) fn apply_sequenced(
        &self,
        format: AdFormat,
        event: Event,
        seq: Option<u64>,
    ) -> DeliveryOutcome {
        let entry = self.entry(format, &event.placement_id);
        let _delivery = entry.delivery.lock();

        if let Some(available) = event.availability_effect() {
            entry.available.store(available, Ordering::Release);
        }

        let listener = {
            let mut slot = entry.listener.write();
            slot.prune(self.sequence.applied());
            slot.listener_for(seq)
        };
        let Some(listener) = listener else {
            debug!(%format, placement_id = %event.placement_id, callback = %event.tag(),
                "no listener registered, dropping event");
            return DeliveryOutcome::NoListener;
        };

        let placement_id = event.placement_id.clone();
        let tag = event.tag();
        match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(%format, %placement_id, callback = %tag, %reason, "listener panicked");
                DeliveryOutcome::ListenerPanicked
            }
        }
    }

    fn swap_listener(
        &self,
        entry: &PlacementEntry,
        listener: Option<ListenerHandle>,
    ) -> Option<ListenerHandle> {
        // Cutoff is read under the slot lock so retired cutoffs stay ordered.
        let mut slot = entry.listener.write();
        let cutoff = self.sequence.cutoff();
        slot.replace(listener, cutoff, self.sequence.applied())
    }

    fn lookup(&self, format: AdFormat, placement_id: &str) -> Option<Arc<PlacementEntry>> {
        self.tables[format.index()].read().get(placement_id).cloned()
    }

    fn entry(&self, format: AdFormat, placement_id: &str) -> Arc<PlacementEntry> {
        if let Some(entry) = self.lookup(format, placement_id) {
            return entry;
        }
        let mut table = self.tables[format.index()].write();
        table
            .entry(placement_id.to_string())
            .or_insert_with(|| {
                debug!(%format, placement_id, "placement created");
                Arc::new(PlacementEntry::default())
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EventKind;

    fn recorder() -> (Arc<dyn PlacementListener>, Arc<Mutex<Vec<Event>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: Arc<dyn PlacementListener> = Arc::new(move |event: Event| sink.lock().push(event));
        (listener, seen)
    }

    #[test]
    fn availability_follows_events() {
        let registry = PlacementRegistry::new();
        assert!(!registry.is_available(AdFormat::Rewarded, "P1"));

        registry.apply(AdFormat::Rewarded, Event::new("P1", EventKind::Available));
        assert!(registry.is_available(AdFormat::Rewarded, "P1"));

        registry.apply(AdFormat::Rewarded, Event::new("P1", EventKind::Loaded));
        assert!(registry.is_available(AdFormat::Rewarded, "P1"));

        registry.apply(AdFormat::Rewarded, Event::new("P1", EventKind::Shown { impression: None }));
        assert!(!registry.is_available(AdFormat::Rewarded, "P1"));
    }

    #[test]
    fn formats_are_separate_namespaces() {
        let registry = PlacementRegistry::new();
        registry.apply(AdFormat::Interstitial, Event::new("shared", EventKind::Available));
        assert!(registry.is_available(AdFormat::Interstitial, "shared"));
        assert!(!registry.is_available(AdFormat::Banner, "shared"));
        assert!(registry.placements(AdFormat::Banner).is_empty());
    }

    #[test]
    fn missing_listener_drops_but_updates_state() {
        let registry = PlacementRegistry::new();
        let outcome = registry.apply(AdFormat::Banner, Event::new("B1", EventKind::Available));
        assert_eq!(outcome, DeliveryOutcome::NoListener);
        assert_eq!(
            registry.state(AdFormat::Banner, "B1"),
            Some(PlacementState {
                is_available: true,
                has_listener: false
            })
        );
    }

    #[test]
    fn reregistering_replaces_listener() {
        let registry = PlacementRegistry::new();
        let (first, first_seen) = recorder();
        let (second, second_seen) = recorder();

        registry.set_listener(AdFormat::Rewarded, "P1", first);
        registry.set_listener(AdFormat::Rewarded, "P1", second);
        registry.apply(AdFormat::Rewarded, Event::new("P1", EventKind::Loaded));

        assert!(first_seen.lock().is_empty());
        assert_eq!(second_seen.lock().len(), 1);

        assert!(registry.clear_listener(AdFormat::Rewarded, "P1"));
        assert!(!registry.clear_listener(AdFormat::Rewarded, "P1"));
        assert_eq!(
            registry.apply(AdFormat::Rewarded, Event::new("P1", EventKind::Loaded)),
            DeliveryOutcome::NoListener
        );
    }

    #[test]
    fn panicking_listener_is_contained() {
        let registry = PlacementRegistry::new();
        let listener: Arc<dyn PlacementListener> = Arc::new(|_event: Event| panic!("boom"));
        registry.set_listener(AdFormat::Interstitial, "I1", listener);

        let outcome = registry.apply(AdFormat::Interstitial, Event::new("I1", EventKind::Available));
        assert_eq!(outcome, DeliveryOutcome::ListenerPanicked);
        assert!(registry.is_available(AdFormat::Interstitial, "I1"));

        let outcome = registry.apply(AdFormat::Interstitial, Event::new("I1", EventKind::Unavailable));
        assert_eq!(outcome, DeliveryOutcome::ListenerPanicked);
        assert!(!registry.is_available(AdFormat::Interstitial, "I1"));
    }

    #[test]
    fn listener_may_query_its_own_placement() {
        let registry = Arc::new(PlacementRegistry::new());
        let observed = Arc::new(Mutex::new(None));
        let (reg, out) = (Arc::clone(&registry), Arc::clone(&observed));
        let listener: Arc<dyn PlacementListener> = Arc::new(move |event: Event| {
            *out.lock() = Some(reg.is_available(AdFormat::Rewarded, &event.placement_id));
        });
        registry.set_listener(AdFormat::Rewarded, "P1", listener);
        registry.apply(AdFormat::Rewarded, Event::new("P1", EventKind::Available));
        assert_eq!(*observed.lock(), Some(true));
    }

    #[test]
    fn queued_payload_reaches_listener_cleared_after_delivery() {
        let registry = PlacementRegistry::new();
        let (old, old_seen) = recorder();
        registry.set_listener(AdFormat::Rewarded, "P1", old);

        let queued = registry.sequence().stamp(|seq| seq);
        assert!(registry.clear_listener(AdFormat::Rewarded, "P1"));
        let later = registry.sequence().stamp(|seq| seq);

        let outcome = registry.apply_sequenced(
            AdFormat::Rewarded,
            Event::new("P1", EventKind::Available),
            Some(queued),
        );
        assert_eq!(outcome, DeliveryOutcome::Delivered);
        registry.sequence().mark_applied(queued);

        let outcome = registry.apply_sequenced(
            AdFormat::Rewarded,
            Event::new("P1", EventKind::Loaded),
            Some(later),
        );
        assert_eq!(outcome, DeliveryOutcome::NoListener);
        assert_eq!(old_seen.lock().len(), 1);
        assert!(!registry.state(AdFormat::Rewarded, "P1").unwrap().has_listener);
    }

    #[test]
    fn each_payload_goes_to_the_listener_of_its_delivery() {
        let registry = PlacementRegistry::new();
        let (first, first_seen) = recorder();
        let (second, second_seen) = recorder();
        let (third, third_seen) = recorder();
        let sequence = Arc::clone(registry.sequence());

        registry.set_listener(AdFormat::Banner, "B1", first);
        let s0 = sequence.stamp(|seq| seq);
        registry.set_listener(AdFormat::Banner, "B1", second);
        let s1 = sequence.stamp(|seq| seq);
        registry.set_listener(AdFormat::Banner, "B1", third);
        let s2 = sequence.stamp(|seq| seq);

        for seq in [s0, s1, s2] {
            registry.apply_sequenced(AdFormat::Banner, Event::new("B1", EventKind::Available), Some(seq));
            sequence.mark_applied(seq);
        }
        assert_eq!(first_seen.lock().len(), 1);
        assert_eq!(second_seen.lock().len(), 1);
        assert_eq!(third_seen.lock().len(), 1);

        // Everything applied: retired listeners are released.
        let (fourth, _) = recorder();
        registry.set_listener(AdFormat::Banner, "B1", fourth);
        let entry = registry.lookup(AdFormat::Banner, "B1").unwrap();
        assert!(entry.listener.read().retired.is_empty());
    }

    #[test]
    fn reset_availability_clears_known_placement() {
        let registry = PlacementRegistry::new();
        registry.apply(AdFormat::Banner, Event::new("B1", EventKind::Available));
        registry.reset_availability(AdFormat::Banner, "B1");
        assert!(!registry.is_available(AdFormat::Banner, "B1"));

        registry.reset_availability(AdFormat::Banner, "never-seen");
        assert_eq!(registry.state(AdFormat::Banner, "never-seen"), None);
    }
}
