//! # Alphonse UI Runtime
//!
//! Client runtime core for the Alphonse web shell. The host page is rendered on
//! the server and swaps HTML fragments in and out; this crate owns the
//! behavior that lives inside those fragments.
//!
//! ## Application Architecture:
//! - **mount**: exactly-once initialization of islands across fragment swaps
//! - **transport**: push-stream connections with fallback to host-owned polling
//! - **voice**: microphone capture and upload state machine
//! - **host**: the host page contract (queries, renders, declarative polling)
//! - **runtime**: the single-threaded event loop that drives everything
//! - **http**: `reqwest` adapters for streams, uploads and a headless host
//! - **config**: layered configuration (defaults, `config.toml`, environment)
//! - **error**: the shared error taxonomy
//! - **stats**: counters for mounts, renders, fallbacks and uploads

pub mod config;
pub mod error;
pub mod host;
pub mod http;
pub mod mount;
pub mod runtime;
pub mod stats;
pub mod transport;
pub mod voice;

#[cfg(test)]
pub(crate) mod testing;

pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use mount::{MountController, Ports};
pub use runtime::{Runtime, RuntimeEvent, RuntimeHandle};
