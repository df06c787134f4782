//! # Islands
//!
//! An island is an independently mounted interactive region inside an
//! otherwise server-rendered page. Each island is described once by an
//! [`IslandSpec`] and becomes an [`Island`] every time its selector resolves
//! to a fresh element after a page load or fragment swap.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Attribute stored on an island's root element once it has been mounted.
///
/// Living on the element means it survives re-scans of the same markup and
/// disappears together with the element when the host swaps it out.
pub const MOUNTED_MARKER: &str = "data-island-mounted";

/// Stable identifier for an island (usually the element id without `#`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IslandId(String);

impl IslandId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IslandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque handle to an element owned by the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRef(pub u64);

/// Where a mount pass looks for island roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The whole document (initial page load)
    Document,
    /// A subtree the host just inserted (fragment loaded)
    Subtree(ElementRef),
}

/// Options for presence-style islands: a push-stream that degrades to polling.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceOptions {
    /// Push-stream endpoint path
    pub stream_path: String,
    /// Fragment endpoint polled after a fallback
    pub poll_path: String,
    /// Fixed polling interval
    pub poll_interval: Duration,
    /// Element id that polled fragments are swapped into
    pub swap_target: String,
}

/// Options for one-shot reply islands (a single streamed chat answer).
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyOptions {
    /// Event name that marks the stream as logically complete
    pub complete_event: String,
}

/// Options for voice capture islands.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceOptions {
    pub upload_path: String,
    /// Region refreshed after a successful upload
    pub timeline_region: String,
    /// Selector of the toggle control choosing the audio mode
    pub mode_toggle: String,
    pub provider: String,
    pub channel: String,
    /// Ordered container/codec preferences, most preferred first
    pub mime_preferences: Vec<String>,
}

/// What kind of behavior an island carries.
#[derive(Debug, Clone, PartialEq)]
pub enum IslandKind {
    Presence(PresenceOptions),
    Reply(ReplyOptions),
    Voice(VoiceOptions),
}

impl IslandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IslandKind::Presence(_) => "presence",
            IslandKind::Reply(_) => "reply",
            IslandKind::Voice(_) => "voice",
        }
    }
}

/// Static description of an island: how to find it and what it does.
#[derive(Debug, Clone, PartialEq)]
pub struct IslandSpec {
    pub id: IslandId,
    pub selector: String,
    pub kind: IslandKind,
}

/// A mounted island: a spec bound to the element it was found on.
#[derive(Debug, Clone)]
pub struct Island {
    pub spec: IslandSpec,
    pub root: ElementRef,
    pub mounted_at: DateTime<Utc>,
}

impl Island {
    pub fn new(spec: IslandSpec, root: ElementRef) -> Self {
        Self {
            spec,
            root,
            mounted_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &IslandId {
        &self.spec.id
    }
}
