//! # Runtime Event Loop
//!
//! Every host notification and every asynchronous platform result becomes a
//! [`RuntimeEvent`] on one channel. The loop handles them one at a time, to
//! completion, on a current-thread executor.
//!
//! ## Event Sources:
//! - **Host page**: page load, fragment load, before-swap, unload
//! - **Adapters**: stream signals, capture events, upload results
//! - **User input**: voice button presses, chat posts announcing a reply stream

use crate::mount::{IslandId, MountController, Scope, VoiceAction};
use crate::stats::RuntimeStats;
use crate::transport::source::StreamSignal;
use crate::voice::devices::{CaptureEvent, UploadOutcome};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    PageLoaded,
    FragmentLoaded {
        scope: Scope,
    },
    /// The host is about to replace the content of the element with this id
    BeforeSwap {
        target: String,
    },
    Unload,
    Stream(StreamSignal),
    Voice {
        island: IslandId,
        action: VoiceAction,
    },
    Capture {
        island: IslandId,
        correlation_id: String,
        event: CaptureEvent,
    },
    UploadFinished {
        island: IslandId,
        correlation_id: String,
        outcome: UploadOutcome,
    },
    /// A chat post answered with a stream URL for its reply
    ReplyStream {
        island: IslandId,
        stream_url: String,
        /// Correlation id from the chat post acknowledgement
        correlation_id: Option<String>,
    },
}

impl RuntimeEvent {
    fn name(&self) -> &'static str {
        match self {
            RuntimeEvent::PageLoaded => "page_loaded",
            RuntimeEvent::FragmentLoaded { .. } => "fragment_loaded",
            RuntimeEvent::BeforeSwap { .. } => "before_swap",
            RuntimeEvent::Unload => "unload",
            RuntimeEvent::Stream(_) => "stream",
            RuntimeEvent::Voice { .. } => "voice",
            RuntimeEvent::Capture { .. } => "capture",
            RuntimeEvent::UploadFinished { .. } => "upload_finished",
            RuntimeEvent::ReplyStream { .. } => "reply_stream",
        }
    }
}

/// Cloneable sender used by adapters and the embedding application.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    sender: mpsc::UnboundedSender<RuntimeEvent>,
}

impl RuntimeHandle {
    /// Queue an event. Returns `false` once the runtime has stopped.
    pub fn send(&self, event: RuntimeEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

pub fn channel() -> (RuntimeHandle, mpsc::UnboundedReceiver<RuntimeEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (RuntimeHandle { sender }, receiver)
}

pub struct Runtime {
    controller: MountController,
    events: mpsc::UnboundedReceiver<RuntimeEvent>,
}

impl Runtime {
    pub fn new(controller: MountController, events: mpsc::UnboundedReceiver<RuntimeEvent>) -> Self {
        Self { controller, events }
    }

    pub fn controller(&self) -> &MountController {
        &self.controller
    }

    /// Handle one event. Returns `false` when the runtime should stop.
    pub fn handle_event(&mut self, event: RuntimeEvent) -> bool {
        debug!(event = event.name(), "Handling event");
        match event {
            RuntimeEvent::PageLoaded => {
                let mounted = self.controller.mount(Scope::Document);
                info!(count = mounted.len(), "Page loaded");
            }
            RuntimeEvent::FragmentLoaded { scope } => {
                self.controller.mount(scope);
            }
            RuntimeEvent::BeforeSwap { target } => {
                self.controller.before_swap(&target);
            }
            RuntimeEvent::Unload => {
                self.controller.release_all();
                return false;
            }
            RuntimeEvent::Stream(signal) => {
                self.controller.handle_stream(signal);
            }
            RuntimeEvent::Voice { island, action } => {
                self.controller.handle_voice(&island, action);
            }
            RuntimeEvent::Capture {
                island,
                correlation_id,
                event,
            } => {
                self.controller.handle_capture(&island, &correlation_id, event);
            }
            RuntimeEvent::UploadFinished {
                island,
                correlation_id,
                outcome,
            } => {
                self.controller.handle_upload(&island, &correlation_id, outcome);
            }
            RuntimeEvent::ReplyStream {
                island,
                stream_url,
                correlation_id,
            } => {
                let opened = self
                    .controller
                    .open_reply(&island, &stream_url, correlation_id.as_deref());
                if opened.is_none() {
                    warn!(island = %island, stream_url, "Reply stream not opened");
                }
            }
        }
        true
    }

    /// Run until `Unload` or until every handle is dropped.
    pub async fn run(mut self) -> RuntimeStats {
        while let Some(event) = self.events.recv().await {
            if !self.handle_event(event) {
                info!("Runtime unloaded");
                return self.controller.stats();
            }
        }
        info!("Event channel closed, releasing islands");
        self.controller.release_all();
        self.controller.stats()
    }
}
