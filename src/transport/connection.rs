//! # Connections
//!
//! One active push-stream or polling loop for one island.
//!
//! ## State Graph:
//! ```text
//! idle -> connecting -> open -> closed
//!            |            |
//!            +--> error <-+
//!                   |
//!                   +--> closed
//! ```
//! Transitions only move forward. `error -> closed` happens immediately and
//! ends the connection for good; the island may then build a new one.

use crate::error::{RuntimeError, RuntimeResult};
use crate::host::PollingSpec;
use crate::mount::{ElementRef, IslandId};
use crate::transport::render::EventHandlers;
use crate::transport::source::{Generation, StreamHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Error,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Error => "error",
            ConnectionState::Closed => "closed",
        }
    }

    /// Whether the graph allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Idle, Closed)
                | (Connecting, Open)
                | (Connecting, Error)
                | (Connecting, Closed)
                | (Open, Error)
                | (Open, Closed)
                | (Error, Closed)
        )
    }
}

/// Status shown in the island's status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    ParseError,
    Disconnected,
    Complete,
    Polling,
    Unsupported,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::ParseError => "parse error",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Complete => "complete",
            ConnectionStatus::Polling => "polling",
            ConnectionStatus::Unsupported => "unsupported",
        }
    }
}

/// What happens when a connection fails.
#[derive(Debug, Clone, PartialEq)]
pub enum FailurePolicy {
    /// Presence-style islands hand their content to host-owned polling
    FallbackToPolling(PollingSpec),
    /// One-shot islands show the failure and stop
    Terminal,
}

/// The transport behind a connection.
pub enum ConnectionMode {
    Push(Box<dyn StreamHandle>),
    Polling(PollingSpec),
}

impl ConnectionMode {
    pub fn is_polling(&self) -> bool {
        matches!(self, ConnectionMode::Polling(_))
    }
}

/// One push-stream or polling loop owned by one island.
pub struct Connection {
    pub island: IslandId,
    pub root: ElementRef,
    pub generation: Generation,
    pub correlation_id: Option<String>,
    pub handlers: EventHandlers,
    pub policy: FailurePolicy,
    /// Event name that ends the stream successfully, if any
    pub complete_event: Option<String>,
    mode: Option<ConnectionMode>,
    state: ConnectionState,
}

impl Connection {
    pub fn new(
        island: IslandId,
        root: ElementRef,
        generation: Generation,
        handlers: EventHandlers,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            island,
            root,
            generation,
            correlation_id: None,
            handlers,
            policy,
            complete_event: None,
            mode: None,
            state: ConnectionState::Idle,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_polling(&self) -> bool {
        self.mode.as_ref().is_some_and(ConnectionMode::is_polling)
    }

    pub fn attach(&mut self, mode: ConnectionMode) {
        self.mode = Some(mode);
    }

    /// Move along the state graph, refusing backwards moves.
    pub fn transition(&mut self, next: ConnectionState) -> RuntimeResult<()> {
        if self.state == next {
            return Ok(());
        }
        if !self.state.can_transition_to(next) {
            return Err(RuntimeError::InvalidTransition(format!(
                "connection {} for {}: {} -> {}",
                self.generation,
                self.island,
                self.state.as_str(),
                next.as_str()
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Release the underlying transport and end in `closed`.
    ///
    /// Returns the polling spec if the connection was a polling loop, so the
    /// caller can hand the island back from the host.
    pub fn shutdown(&mut self) -> Option<PollingSpec> {
        let released = match self.mode.take() {
            Some(ConnectionMode::Push(mut handle)) => {
                handle.close();
                None
            }
            Some(ConnectionMode::Polling(spec)) => Some(spec),
            None => None,
        };
        // Every live state has an edge to closed.
        self.state = ConnectionState::Closed;
        released
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("island", &self.island)
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("polling", &self.is_polling())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> Connection {
        Connection::new(
            IslandId::new("presence-panel"),
            ElementRef(1),
            Generation(1),
            EventHandlers::new(),
            FailurePolicy::Terminal,
        )
    }

    #[test]
    fn test_forward_transitions() {
        let mut conn = connection();
        assert!(conn.transition(ConnectionState::Connecting).is_ok());
        assert!(conn.transition(ConnectionState::Open).is_ok());
        assert!(conn.transition(ConnectionState::Error).is_ok());
        assert!(conn.transition(ConnectionState::Closed).is_ok());
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_backward_transitions_are_rejected() {
        let mut conn = connection();
        conn.transition(ConnectionState::Connecting).unwrap();
        conn.transition(ConnectionState::Open).unwrap();

        let err = conn.transition(ConnectionState::Connecting).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidTransition(_)));
        assert_eq!(conn.state(), ConnectionState::Open);
    }

    #[test]
    fn test_error_only_leads_to_closed() {
        let mut conn = connection();
        conn.transition(ConnectionState::Connecting).unwrap();
        conn.transition(ConnectionState::Error).unwrap();

        assert!(conn.transition(ConnectionState::Open).is_err());
        assert!(conn.transition(ConnectionState::Closed).is_ok());
        assert!(conn.transition(ConnectionState::Open).is_err());
    }

    #[test]
    fn test_error_is_not_reachable_from_idle() {
        let mut conn = connection();
        assert!(conn.transition(ConnectionState::Error).is_err());
    }

    #[test]
    fn test_shutdown_returns_polling_spec() {
        let mut conn = connection();
        let spec = PollingSpec {
            path: "/ui/presence".to_string(),
            interval: std::time::Duration::from_secs(20),
            target: "presence-panel".to_string(),
        };
        conn.attach(ConnectionMode::Polling(spec.clone()));
        assert!(conn.is_polling());
        assert_eq!(conn.shutdown(), Some(spec));
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.shutdown(), None);
    }
}
