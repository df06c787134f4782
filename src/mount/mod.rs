//! # Mounting
//!
//! Finds island roots after page loads and fragment swaps, initializes each
//! one exactly once and releases its resources when the host replaces it.

pub mod controller;
pub mod island;

pub use controller::{MountController, Ports, VoiceAction};
pub use island::{
    ElementRef, Island, IslandId, IslandKind, IslandSpec, PresenceOptions, ReplyOptions, Scope,
    VoiceOptions, MOUNTED_MARKER,
};
