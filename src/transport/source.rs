//! Push-stream ports and the signals streams report back.

use crate::error::RuntimeResult;
use crate::mount::IslandId;
use std::fmt;

/// Identity token of one Connection. Every signal carries the generation of
/// the connection that produced it; signals from older generations are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a push-stream is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    /// Endpoint path, or an absolute URL discovered from a response header
    pub path: String,
    /// Sent as the `correlation_id` query parameter when present
    pub correlation_id: Option<String>,
}

impl StreamTarget {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            correlation_id: None,
        }
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// What happened on a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    /// The transport accepted the connection
    Opened,
    /// A named event with its raw data
    Message { name: String, data: String },
    /// Disconnect, network failure or end of stream
    Failed { reason: String },
}

/// A stream callback, addressed to the connection that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSignal {
    pub island: IslandId,
    pub generation: Generation,
    pub kind: SignalKind,
}

/// A live stream. Closing is synchronous from the caller's point of view;
/// any signal already in flight is discarded by the generation check.
pub trait StreamHandle {
    fn close(&mut self);
}

/// Opens push-streams and reports their activity as [`StreamSignal`]s.
pub trait PushStreamSource {
    /// Whether the platform can open push-streams at all.
    fn supports_push(&self) -> bool;

    fn open(
        &mut self,
        island: &IslandId,
        generation: Generation,
        target: &StreamTarget,
    ) -> RuntimeResult<Box<dyn StreamHandle>>;
}
