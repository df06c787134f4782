//! # Runtime Statistics
//!
//! Counters collected while the runtime handles events. Everything runs on one
//! thread, so unlike a server's shared metrics there is no `Arc<RwLock<_>>`
//! here: the controller owns the counters and hands out copies.

use serde::Serialize;

/// Counters for everything observable the runtime does.
///
/// ## Why these counters matter:
/// - **stale_signals**: late callbacks from replaced connections (never rendered)
/// - **fallbacks**: islands degraded from push to polling
/// - **uploads_***: voice notes sent and their outcomes
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeStats {
    /// Islands attached (one per DOM attachment)
    pub mounts: u64,

    /// Islands whose resources were released
    pub releases: u64,

    /// Stream events rendered into an island
    pub renders: u64,

    /// Signals dropped because their connection was no longer current
    pub stale_signals: u64,

    /// Connections that degraded to polling
    pub fallbacks: u64,

    /// One-shot connections that ended on a failure status
    pub terminal_failures: u64,

    /// Streams that reached their completion event
    pub completions: u64,

    /// Upload requests issued
    pub uploads_attempted: u64,

    /// Uploads answered with a success status
    pub uploads_succeeded: u64,

    /// Uploads that failed on the network or with an error status
    pub uploads_failed: u64,

    /// Region refresh requests sent to the host page
    pub region_refreshes: u64,
}

impl RuntimeStats {
    /// Fraction of attempted uploads that failed (0.0 to 1.0).
    pub fn upload_failure_rate(&self) -> f64 {
        if self.uploads_attempted > 0 {
            self.uploads_failed as f64 / self.uploads_attempted as f64
        } else {
            0.0
        }
    }
}
