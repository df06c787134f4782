//! # Host Page Contract
//!
//! The host page renders HTML on the server, swaps fragments into the DOM and
//! owns a declarative fetch-and-swap mechanism. The runtime never touches the
//! DOM directly: everything it needs from the page goes through [`HostPage`].

use crate::mount::{ElementRef, Scope};
use crate::voice::VoicePresentation;
use std::time::Duration;

/// A change to an island's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOp {
    /// Replace the island's content with an HTML fragment
    Replace(String),
    /// Append text (incremental reply chunks)
    Append(String),
}

/// Parameters handed to the host when an island degrades to polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingSpec {
    /// Fragment endpoint to fetch
    pub path: String,
    /// Fixed interval between fetches
    pub interval: Duration,
    /// Element id the fetched fragment is swapped into
    pub target: String,
}

impl PollingSpec {
    /// Trigger expression for the host's declarative polling (`every 20s`).
    pub fn trigger(&self) -> String {
        format!("every {}s", self.interval.as_secs())
    }

    /// CSS selector for the swap target.
    pub fn target_selector(&self) -> String {
        format!("#{}", self.target)
    }
}

/// Everything the runtime asks of the host page.
///
/// ## Contract:
/// - Queries never mutate the page.
/// - Markers live on the element, so a swapped-in copy of the same markup
///   starts without them.
/// - `switch_to_polling` hands the island over to host-owned refreshes;
///   `cancel_polling` takes it back.
pub trait HostPage {
    /// Find the first element matching `selector` inside `scope`.
    fn query(&self, scope: &Scope, selector: &str) -> Option<ElementRef>;

    fn has_marker(&self, element: &ElementRef, marker: &str) -> bool;

    fn set_marker(&mut self, element: &ElementRef, marker: &str);

    /// Whether `element` sits inside the region with id `region_id`.
    fn within_region(&self, element: &ElementRef, region_id: &str) -> bool;

    fn apply(&mut self, element: &ElementRef, op: RenderOp);

    /// Update the island's visible status indicator.
    fn set_status(&mut self, element: &ElementRef, status: &str);

    fn present_voice(&mut self, element: &ElementRef, view: &VoicePresentation);

    /// Read a checkbox-style toggle inside the island.
    fn toggle_checked(&self, element: &ElementRef, selector: &str) -> bool;

    /// Ask the host to re-fetch and swap the region with id `region_id`.
    fn refresh_region(&mut self, region_id: &str);

    fn switch_to_polling(&mut self, element: &ElementRef, spec: &PollingSpec);

    fn cancel_polling(&mut self, element: &ElementRef);
}
