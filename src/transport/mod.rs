//! # Transport
//!
//! Push-stream connections for islands, with generation-checked dispatch and
//! degradation to host-owned polling.

pub mod connection;
pub mod event;
pub mod manager;
pub mod render;
pub mod source;

pub use connection::{ConnectionState, ConnectionStatus, FailurePolicy};
pub use event::StreamEvent;
pub use manager::{DispatchOutcome, OpenOutcome, TransportManager};
pub use source::{
    Generation, PushStreamSource, SignalKind, StreamHandle, StreamSignal, StreamTarget,
};
