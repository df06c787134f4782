//! # Transport Manager
//!
//! Owns at most one [`Connection`] per island. Opens push-streams, dispatches
//! their events to render callbacks and degrades islands to host-owned polling
//! when a stream is unsupported, breaks, or sends something unreadable.
//!
//! ## Failure Handling:
//! - **Unsupported / disconnected / parse error** on a presence island: the
//!   connection ends and the island switches to polling
//! - **Same failures on a one-shot reply island**: terminal status, nothing else
//! - **Completion event**: status "complete", connection closed, no polling
//!
//! ## Stale Callbacks:
//! Every signal carries the [`Generation`] of the connection that produced it.
//! Signals whose generation is not the island's current connection are
//! dropped before any decoding or rendering happens.

use crate::error::RuntimeError;
use crate::host::{HostPage, PollingSpec};
use crate::mount::{ElementRef, Island, IslandId, IslandKind};
use crate::transport::connection::{
    Connection, ConnectionMode, ConnectionState, ConnectionStatus, FailurePolicy,
};
use crate::transport::event::StreamEvent;
use crate::transport::render::EventHandlers;
use crate::transport::source::{
    Generation, PushStreamSource, SignalKind, StreamSignal, StreamTarget,
};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Result of [`TransportManager::open`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A push-stream is being established
    Streaming(Generation),
    /// The island went straight to polling
    Polling(Generation),
    /// The island cannot stream and has no fallback
    Terminated,
}

/// Result of [`TransportManager::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Opened,
    Rendered,
    /// No handler for this event name
    Ignored,
    /// The signal belongs to a connection that is no longer current
    Stale,
    Completed,
    /// The connection failed and the island now polls
    FellBack(Generation),
    /// The connection failed and the island shows a terminal status
    Terminated,
}

pub struct TransportManager {
    source: Box<dyn PushStreamSource>,
    connections: HashMap<IslandId, Connection>,
    next_generation: u64,
}

impl TransportManager {
    pub fn new(source: Box<dyn PushStreamSource>) -> Self {
        Self {
            source,
            connections: HashMap::new(),
            next_generation: 1,
        }
    }

    /// Open a push-stream for `island`, closing any connection it already has.
    pub fn open(
        &mut self,
        host: &mut dyn HostPage,
        island: &Island,
        target: StreamTarget,
    ) -> OpenOutcome {
        let id = island.id().clone();
        self.close(host, &id);

        let policy = failure_policy(&island.spec.kind);
        let generation = self.bump();

        if !self.source.supports_push() {
            info!(island = %id, "Push-streams unsupported, using fallback");
            return match policy {
                FailurePolicy::FallbackToPolling(spec) => {
                    OpenOutcome::Polling(self.start_polling(host, id, island.root, spec))
                }
                FailurePolicy::Terminal => {
                    host.set_status(&island.root, ConnectionStatus::Unsupported.label());
                    OpenOutcome::Terminated
                }
            };
        }

        let mut conn = Connection::new(
            id.clone(),
            island.root,
            generation,
            EventHandlers::for_kind(&island.spec.kind),
            policy,
        );
        conn.correlation_id = target.correlation_id.clone();
        conn.complete_event = complete_event(&island.spec.kind);
        step(&mut conn, ConnectionState::Connecting);

        match self.source.open(&id, generation, &target) {
            Ok(handle) => {
                conn.attach(ConnectionMode::Push(handle));
                host.set_status(&island.root, ConnectionStatus::Connected.label());
                debug!(
                    island = %id,
                    generation = %generation,
                    path = %target.path,
                    "Stream opening"
                );
                self.connections.insert(id, conn);
                OpenOutcome::Streaming(generation)
            }
            Err(err) => {
                self.connections.insert(id.clone(), conn);
                match self.fail(host, &id, err) {
                    DispatchOutcome::FellBack(next) => OpenOutcome::Polling(next),
                    _ => OpenOutcome::Terminated,
                }
            }
        }
    }

    /// Route a stream signal to its connection, if that connection is current.
    pub fn dispatch(&mut self, host: &mut dyn HostPage, signal: StreamSignal) -> DispatchOutcome {
        let is_current = self
            .connections
            .get(&signal.island)
            .is_some_and(|conn| conn.generation == signal.generation && !conn.is_polling());
        if !is_current {
            debug!(
                island = %signal.island,
                generation = %signal.generation,
                "Dropping signal from stale connection"
            );
            return DispatchOutcome::Stale;
        }

        match signal.kind {
            SignalKind::Opened => {
                if let Some(conn) = self.connections.get_mut(&signal.island) {
                    step(conn, ConnectionState::Open);
                }
                DispatchOutcome::Opened
            }
            SignalKind::Message { name, data } => {
                self.on_message(host, &signal.island, &name, &data)
            }
            SignalKind::Failed { reason } => {
                self.fail(host, &signal.island, RuntimeError::Transport(reason))
            }
        }
    }

    /// Release the island's connection. Safe to call when there is none.
    pub fn close(&mut self, host: &mut dyn HostPage, island: &IslandId) -> bool {
        let Some(mut conn) = self.connections.remove(island) else {
            return false;
        };
        if conn.shutdown().is_some() {
            host.cancel_polling(&conn.root);
        }
        debug!(island = %island, generation = %conn.generation, "Connection closed");
        true
    }

    pub fn close_all(&mut self, host: &mut dyn HostPage) {
        let islands: Vec<IslandId> = self.connections.keys().cloned().collect();
        for island in islands {
            self.close(host, &island);
        }
    }

    pub fn state(&self, island: &IslandId) -> Option<ConnectionState> {
        self.connections.get(island).map(Connection::state)
    }

    /// Correlation id the island's current stream is scoped to.
    pub fn correlation_id(&self, island: &IslandId) -> Option<&str> {
        self.connections.get(island)?.correlation_id.as_deref()
    }

    pub fn generation(&self, island: &IslandId) -> Option<Generation> {
        self.connections.get(island).map(|conn| conn.generation)
    }

    pub fn is_polling(&self, island: &IslandId) -> bool {
        self.connections
            .get(island)
            .is_some_and(Connection::is_polling)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn on_message(
        &mut self,
        host: &mut dyn HostPage,
        island: &IslandId,
        name: &str,
        data: &str,
    ) -> DispatchOutcome {
        let Some(conn) = self.connections.get_mut(island) else {
            return DispatchOutcome::Stale;
        };

        if conn.complete_event.as_deref() == Some(name) {
            let Some(mut conn) = self.connections.remove(island) else {
                return DispatchOutcome::Stale;
            };
            conn.shutdown();
            host.set_status(&conn.root, ConnectionStatus::Complete.label());
            info!(island = %island, generation = %conn.generation, "Stream complete");
            return DispatchOutcome::Completed;
        }

        let Some(render) = conn.handlers.get(name) else {
            debug!(island = %island, event = %name, "No handler for event");
            return DispatchOutcome::Ignored;
        };

        let rendered = StreamEvent::decode(name, data, conn.correlation_id.as_deref())
            .and_then(|event| render(&event));
        match rendered {
            Ok(op) => {
                step(conn, ConnectionState::Open);
                host.apply(&conn.root, op);
                DispatchOutcome::Rendered
            }
            Err(err) => self.fail(host, island, err),
        }
    }

    /// End the island's connection on an error, then apply its failure policy.
    fn fail(
        &mut self,
        host: &mut dyn HostPage,
        island: &IslandId,
        err: RuntimeError,
    ) -> DispatchOutcome {
        let Some(mut conn) = self.connections.remove(island) else {
            return DispatchOutcome::Stale;
        };

        let status = match err {
            RuntimeError::MalformedPayload(_) => ConnectionStatus::ParseError,
            _ => ConnectionStatus::Disconnected,
        };
        warn!(
            island = %island,
            generation = %conn.generation,
            error = %err,
            "Connection failed"
        );

        step(&mut conn, ConnectionState::Error);
        host.set_status(&conn.root, status.label());
        conn.shutdown();

        match conn.policy.clone() {
            FailurePolicy::FallbackToPolling(spec) => {
                DispatchOutcome::FellBack(self.start_polling(host, island.clone(), conn.root, spec))
            }
            FailurePolicy::Terminal => DispatchOutcome::Terminated,
        }
    }

    /// Hand the island to the host's declarative polling as a new connection.
    fn start_polling(
        &mut self,
        host: &mut dyn HostPage,
        island: IslandId,
        root: ElementRef,
        spec: PollingSpec,
    ) -> Generation {
        let generation = self.bump();
        let mut conn = Connection::new(
            island.clone(),
            root,
            generation,
            EventHandlers::new(),
            FailurePolicy::Terminal,
        );
        step(&mut conn, ConnectionState::Connecting);
        host.switch_to_polling(&root, &spec);
        info!(
            island = %island,
            generation = %generation,
            path = %spec.path,
            trigger = %spec.trigger(),
            "Switched to polling"
        );
        conn.attach(ConnectionMode::Polling(spec));
        step(&mut conn, ConnectionState::Open);
        host.set_status(&root, ConnectionStatus::Polling.label());
        self.connections.insert(island, conn);
        generation
    }

    fn bump(&mut self) -> Generation {
        let generation = Generation(self.next_generation);
        self.next_generation += 1;
        generation
    }
}

/// Failure policy for an island kind.
pub fn failure_policy(kind: &IslandKind) -> FailurePolicy {
    match kind {
        IslandKind::Presence(options) => FailurePolicy::FallbackToPolling(PollingSpec {
            path: options.poll_path.clone(),
            interval: options.poll_interval,
            target: options.swap_target.clone(),
        }),
        IslandKind::Reply(_) | IslandKind::Voice(_) => FailurePolicy::Terminal,
    }
}

fn complete_event(kind: &IslandKind) -> Option<String> {
    match kind {
        IslandKind::Reply(options) => Some(options.complete_event.clone()),
        _ => None,
    }
}

/// Apply a transition the caller knows is allowed; log if it is not.
fn step(conn: &mut Connection, next: ConnectionState) {
    if let Err(err) = conn.transition(next) {
        error!(error = %err, "Unexpected connection transition");
    }
}
