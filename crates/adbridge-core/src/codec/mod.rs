//! Event envelope codec
//!
//! Turns the opaque notifications produced by the native layer into typed
//! [`Event`]s, and back (the canonical encoding is what test fixtures and the
//! replay tool write).
//!
//! ## Payload shape
//!
//! ```text
//! {
//!   "callback": "show",                 // required, closed vocabulary
//!   "placement_id": "MainMenuRewarded", // required
//!   "error": "no fill",                 // Failed / Error only
//!   "impression_data": { ... }          // show-related kinds only
//! }
//! ```
//!
//! Unknown `callback` tags are a [`DecodeError::UnknownKind`]; nothing is
//! ever mapped to a default event.

mod wire;

use std::fmt;
use std::str::FromStr;

use crate::error::DecodeError;
use crate::impression::ImpressionRecord;

pub use wire::{decode, decode_from, encode, SCHEMA_VERSION};

/// The closed vocabulary of native `callback` tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackTag {
    Available,
    Unavailable,
    RequestStarted,
    Loaded,
    Shown,
    Clicked,
    Hidden,
    Failed,
    Error,
    RewardedComplete,
    RewardedIncomplete,
}

impl CallbackTag {
    /// Every tag
    pub const ALL: [CallbackTag; 11] = [
        CallbackTag::Available,
        CallbackTag::Unavailable,
        CallbackTag::RequestStarted,
        CallbackTag::Loaded,
        CallbackTag::Shown,
        CallbackTag::Clicked,
        CallbackTag::Hidden,
        CallbackTag::Failed,
        CallbackTag::Error,
        CallbackTag::RewardedComplete,
        CallbackTag::RewardedIncomplete,
    ];

    /// Wire spelling
    pub fn as_str(self) -> &'static str {
        match self {
            CallbackTag::Available => "available",
            CallbackTag::Unavailable => "unavailable",
            CallbackTag::RequestStarted => "request_start",
            CallbackTag::Loaded => "loaded",
            CallbackTag::Shown => "show",
            CallbackTag::Clicked => "click",
            CallbackTag::Hidden => "hide",
            CallbackTag::Failed => "failed",
            CallbackTag::Error => "error",
            CallbackTag::RewardedComplete => "rewarded_result_complete",
            CallbackTag::RewardedIncomplete => "rewarded_result_incomplete",
        }
    }

    /// Whether events of this kind carry an error message
    pub fn carries_error(self) -> bool {
        matches!(self, CallbackTag::Failed | CallbackTag::Error)
    }

    /// Whether events of this kind may carry an impression record
    pub fn carries_impression(self) -> bool {
        matches!(
            self,
            CallbackTag::Shown
                | CallbackTag::Clicked
                | CallbackTag::Hidden
                | CallbackTag::RewardedComplete
                | CallbackTag::RewardedIncomplete
        )
    }
}

impl fmt::Display for CallbackTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallbackTag {
    type Err = DecodeError;

    /// Exact, case-sensitive match against the wire vocabulary
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CallbackTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| DecodeError::UnknownKind(s.to_string()))
    }
}

/// What happened to a placement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Available,
    Unavailable,
    RequestStarted,
    Loaded,
    Shown { impression: Option<ImpressionRecord> },
    Clicked { impression: Option<ImpressionRecord> },
    Hidden { impression: Option<ImpressionRecord> },
    Failed { error_message: String },
    Error { error_message: String },
    RewardedComplete { impression: Option<ImpressionRecord> },
    RewardedIncomplete { impression: Option<ImpressionRecord> },
}

/// A decoded notification for one placement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Placement the event belongs to
    pub placement_id: String,
    /// Kind and kind-specific payload
    pub kind: EventKind,
}

impl Event {
    /// Create an event
    pub fn new(placement_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            placement_id: placement_id.into(),
            kind,
        }
    }

    /// Callback tag of this event's kind
    pub fn tag(&self) -> CallbackTag {
        match &self.kind {
            EventKind::Available => CallbackTag::Available,
            EventKind::Unavailable => CallbackTag::Unavailable,
            EventKind::RequestStarted => CallbackTag::RequestStarted,
            EventKind::Loaded => CallbackTag::Loaded,
            EventKind::Shown { .. } => CallbackTag::Shown,
            EventKind::Clicked { .. } => CallbackTag::Clicked,
            EventKind::Hidden { .. } => CallbackTag::Hidden,
            EventKind::Failed { .. } => CallbackTag::Failed,
            EventKind::Error { .. } => CallbackTag::Error,
            EventKind::RewardedComplete { .. } => CallbackTag::RewardedComplete,
            EventKind::RewardedIncomplete { .. } => CallbackTag::RewardedIncomplete,
        }
    }

    /// Error message, for `Failed` and `Error`
    pub fn error_message(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Failed { error_message } | EventKind::Error { error_message } => {
                Some(error_message)
            }
            _ => None,
        }
    }

    /// Impression record, for show-related kinds that carry one
    pub fn impression(&self) -> Option<&ImpressionRecord> {
        match &self.kind {
            EventKind::Shown { impression }
            | EventKind::Clicked { impression }
            | EventKind::Hidden { impression }
            | EventKind::RewardedComplete { impression }
            | EventKind::RewardedIncomplete { impression } => impression.as_ref(),
            _ => None,
        }
    }

    /// Availability after this event: `Some(true)` for `Available`,
    /// `Some(false)` when the ad is consumed or revoked, `None` when the kind
    /// leaves availability alone
    pub fn availability_effect(&self) -> Option<bool> {
        match self.kind {
            EventKind::Available => Some(true),
            EventKind::Unavailable
            | EventKind::Shown { .. }
            | EventKind::Hidden { .. }
            | EventKind::Failed { .. } => Some(false),
            _ => None,
        }
    }
}
