//! # Mount Controller
//!
//! Owns every platform port and every mounted island.
//!
//! ## Lifecycle:
//! 1. **Mount**: after a page load or fragment swap, each registered selector
//!    is resolved inside the new content. A root that already carries the
//!    mounted marker is skipped; otherwise the marker is set and the island
//!    attached (stream opened, recorder prepared).
//! 2. **Run**: stream signals, capture events and upload results are routed to
//!    the island they name.
//! 3. **Release**: before the host swaps the content container, islands inside
//!    it close their connections and drop their recordings. Swaps into any
//!    other target (including an island's own polling target) leave islands
//!    alone.

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::host::HostPage;
use crate::mount::island::{
    ElementRef, Island, IslandId, IslandKind, IslandSpec, Scope, MOUNTED_MARKER,
};
use crate::stats::RuntimeStats;
use crate::transport::connection::{ConnectionState, ConnectionStatus};
use crate::transport::manager::{DispatchOutcome, OpenOutcome, TransportManager};
use crate::transport::source::{PushStreamSource, StreamSignal, StreamTarget};
use crate::voice::devices::{CaptureEvent, MediaDevices, UploadOutcome, Uploader};
use crate::voice::pipeline::{VoiceOutcome, VoicePipeline, VoicePorts, VoiceState};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// The platform the controller runs against.
pub struct Ports {
    pub host: Box<dyn HostPage>,
    pub source: Box<dyn PushStreamSource>,
    pub devices: Box<dyn MediaDevices>,
    pub uploader: Box<dyn Uploader>,
}

/// User input on a voice island.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceAction {
    /// The record button: start when idle, stop when recording
    Toggle,
    Start,
    Stop,
}

pub struct MountController {
    host: Box<dyn HostPage>,
    devices: Box<dyn MediaDevices>,
    uploader: Box<dyn Uploader>,
    transport: TransportManager,
    specs: Vec<IslandSpec>,
    swap_container: String,
    islands: HashMap<IslandId, Island>,
    voice: HashMap<IslandId, VoicePipeline>,
    stats: RuntimeStats,
}

impl MountController {
    pub fn new(config: &RuntimeConfig, ports: Ports) -> Self {
        Self::with_specs(
            config.island_specs(),
            config.regions.swap_container.clone(),
            ports,
        )
    }

    pub fn with_specs(specs: Vec<IslandSpec>, swap_container: String, ports: Ports) -> Self {
        Self {
            host: ports.host,
            devices: ports.devices,
            uploader: ports.uploader,
            transport: TransportManager::new(ports.source),
            specs,
            swap_container,
            islands: HashMap::new(),
            voice: HashMap::new(),
            stats: RuntimeStats::default(),
        }
    }

    /// Mount every registered island found in `scope` that is not mounted yet.
    ///
    /// Returns the ids attached by this pass. Running the same pass twice over
    /// unchanged markup attaches nothing the second time.
    pub fn mount(&mut self, scope: Scope) -> Vec<IslandId> {
        let mut mounted = Vec::new();
        for spec in self.specs.clone() {
            let Some(root) = self.host.query(&scope, &spec.selector) else {
                continue;
            };
            if self.host.has_marker(&root, MOUNTED_MARKER) {
                debug!(island = %spec.id, "Already mounted, skipping");
                continue;
            }
            self.host.set_marker(&root, MOUNTED_MARKER);

            // The previous element for this id was swapped out without a
            // release (a swap outside the content container).
            if self.islands.get(&spec.id).is_some_and(|old| old.root != root) {
                self.release(&spec.id);
            }

            let island = Island::new(spec, root);
            let id = island.id().clone();
            info!(island = %id, kind = island.spec.kind.as_str(), "Mounting island");
            self.attach(&island);
            self.islands.insert(id.clone(), island);
            self.stats.mounts += 1;
            mounted.push(id);
        }
        mounted
    }

    /// The host is about to replace the content of `target`.
    pub fn before_swap(&mut self, target: &str) -> Vec<IslandId> {
        if target != self.swap_container {
            debug!(target, "Swap outside the content container, islands kept");
            return Vec::new();
        }

        let doomed: Vec<IslandId> = self
            .islands
            .values()
            .filter(|island| self.host.within_region(&island.root, target))
            .map(|island| island.id().clone())
            .collect();
        for id in &doomed {
            self.release(id);
        }
        doomed
    }

    /// Close the island's connection and drop its recording. Safe to repeat.
    pub fn release(&mut self, id: &IslandId) -> bool {
        let Some(island) = self.islands.remove(id) else {
            return false;
        };
        self.transport.close(self.host.as_mut(), id);
        if let Some(mut pipeline) = self.voice.remove(id) {
            pipeline.release(self.devices.as_mut());
        }
        self.stats.releases += 1;
        info!(island = %id, root = island.root.0, "Island released");
        true
    }

    /// Release everything (page unload).
    pub fn release_all(&mut self) {
        let ids: Vec<IslandId> = self.islands.keys().cloned().collect();
        for id in ids {
            self.release(&id);
        }
        self.transport.close_all(self.host.as_mut());
    }

    pub fn handle_stream(&mut self, signal: StreamSignal) -> DispatchOutcome {
        let outcome = self.transport.dispatch(self.host.as_mut(), signal);
        match outcome {
            DispatchOutcome::Rendered => self.stats.renders += 1,
            DispatchOutcome::Stale => self.stats.stale_signals += 1,
            DispatchOutcome::FellBack(_) => self.stats.fallbacks += 1,
            DispatchOutcome::Terminated => self.stats.terminal_failures += 1,
            DispatchOutcome::Completed => self.stats.completions += 1,
            DispatchOutcome::Opened | DispatchOutcome::Ignored => {}
        }
        outcome
    }

    /// Open the reply stream announced by a chat post response.
    ///
    /// `correlation_id` is the one the chat post was acknowledged with; the
    /// stream is scoped to it and bare payloads are tagged with it.
    pub fn open_reply(
        &mut self,
        id: &IslandId,
        stream_url: &str,
        correlation_id: Option<&str>,
    ) -> Option<OpenOutcome> {
        let island = match self.islands.get(id) {
            Some(island) if matches!(island.spec.kind, IslandKind::Reply(_)) => island.clone(),
            Some(island) => {
                warn!(island = %id, kind = island.spec.kind.as_str(), "Not a reply island");
                return None;
            }
            None => {
                warn!(island = %id, "Reply stream for an island that is not mounted");
                return None;
            }
        };

        self.host
            .set_status(&island.root, ConnectionStatus::Connecting.label());
        let target = match correlation_id {
            Some(correlation_id) => StreamTarget::new(stream_url).with_correlation(correlation_id),
            None => StreamTarget::new(stream_url),
        };
        let outcome = self.transport.open(self.host.as_mut(), &island, target);
        self.record_open(outcome);
        info!(
            island = %id,
            stream_url,
            correlation_id = self.transport.correlation_id(id).unwrap_or("-"),
            "Reply stream requested"
        );
        Some(outcome)
    }

    pub fn handle_voice(&mut self, id: &IslandId, action: VoiceAction) -> VoiceOutcome {
        let Some(pipeline) = self.voice.get_mut(id) else {
            debug!(island = %id, "Voice action for an island that is not mounted");
            return VoiceOutcome::Ignored;
        };
        let mut ports = VoicePorts {
            host: self.host.as_mut(),
            devices: self.devices.as_mut(),
            uploader: self.uploader.as_mut(),
        };
        let outcome = match action {
            VoiceAction::Toggle => pipeline.toggle(&mut ports),
            VoiceAction::Start => pipeline.start(&mut ports),
            VoiceAction::Stop => pipeline.stop(&mut ports),
        };
        self.record_submission(&outcome);
        outcome
    }

    pub fn handle_capture(
        &mut self,
        id: &IslandId,
        correlation_id: &str,
        event: CaptureEvent,
    ) -> VoiceOutcome {
        let Some(pipeline) = self.voice.get_mut(id) else {
            // The island is gone; a late grant must still give the microphone back.
            if event == CaptureEvent::Started {
                self.devices.release(id, correlation_id);
            }
            return VoiceOutcome::Stale;
        };
        let mut ports = VoicePorts {
            host: self.host.as_mut(),
            devices: self.devices.as_mut(),
            uploader: self.uploader.as_mut(),
        };
        let outcome = pipeline.on_capture(&mut ports, correlation_id, event);
        self.record_submission(&outcome);
        outcome
    }

    pub fn handle_upload(
        &mut self,
        id: &IslandId,
        correlation_id: &str,
        outcome: UploadOutcome,
    ) -> VoiceOutcome {
        let Some(pipeline) = self.voice.get_mut(id) else {
            return VoiceOutcome::Stale;
        };
        let result = pipeline.on_upload_finished(self.host.as_mut(), correlation_id, outcome);
        match &result {
            VoiceOutcome::Uploaded => {
                self.stats.uploads_succeeded += 1;
                self.stats.region_refreshes += 1;
            }
            VoiceOutcome::UploadFailed(_) => self.stats.uploads_failed += 1,
            _ => {}
        }
        result
    }

    pub fn is_mounted(&self, id: &IslandId) -> bool {
        self.islands.contains_key(id)
    }

    pub fn island(&self, id: &IslandId) -> Option<&Island> {
        self.islands.get(id)
    }

    pub fn root_of(&self, id: &IslandId) -> Option<ElementRef> {
        self.islands.get(id).map(|island| island.root)
    }

    pub fn mounted_ids(&self) -> Vec<IslandId> {
        let mut ids: Vec<IslandId> = self.islands.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn voice_state(&self, id: &IslandId) -> Option<VoiceState> {
        self.voice.get(id).map(VoicePipeline::state)
    }

    pub fn connection_state(&self, id: &IslandId) -> Option<ConnectionState> {
        self.transport.state(id)
    }

    pub fn transport(&self) -> &TransportManager {
        &self.transport
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats.clone()
    }

    fn attach(&mut self, island: &Island) {
        match &island.spec.kind {
            IslandKind::Presence(options) => {
                let outcome = self.transport.open(
                    self.host.as_mut(),
                    island,
                    StreamTarget::new(options.stream_path.clone()),
                );
                self.record_open(outcome);
            }
            IslandKind::Reply(_) => {
                // Streams open per chat message, see `open_reply`.
                self.host.set_status(&island.root, "waiting");
            }
            IslandKind::Voice(options) => {
                let mut pipeline =
                    VoicePipeline::new(island.id().clone(), island.root, options.clone());
                pipeline.detect_capture(&*self.devices);
                pipeline.render(self.host.as_mut());
                self.voice.insert(island.id().clone(), pipeline);
            }
        }
    }

    fn record_open(&mut self, outcome: OpenOutcome) {
        match outcome {
            OpenOutcome::Streaming(_) => {}
            OpenOutcome::Polling(_) => self.stats.fallbacks += 1,
            OpenOutcome::Terminated => self.stats.terminal_failures += 1,
        }
    }

    fn record_submission(&mut self, outcome: &VoiceOutcome) {
        match outcome {
            VoiceOutcome::Uploading => self.stats.uploads_attempted += 1,
            VoiceOutcome::UploadFailed(err) => {
                self.stats.uploads_attempted += 1;
                self.stats.uploads_failed += 1;
                debug!(error = %err, "Upload rejected before sending");
            }
            VoiceOutcome::Failed(RuntimeError::EmptyCapture) => {
                debug!("Empty capture discarded");
            }
            _ => {}
        }
    }
}
