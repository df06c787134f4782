//! # Voice Capture Pipeline
//!
//! Recording and upload state machine for one voice island.
//!
//! ## State Machine:
//! - `idle --start--> recording`: microphone requested; denial returns to idle
//! - `recording --data--> recording`: fragment appended
//! - `recording --stop--> uploading`: fragments assembled and submitted; an
//!   empty payload returns to idle without any upload
//! - `uploading --success--> idle`: timeline region refreshed
//! - `uploading --failure--> idle`: reason surfaced, no retry
//!
//! Start requests while recording or uploading are ignored. The microphone is
//! released on every path out of `recording`. Capture and upload results carry
//! the recording's correlation id; results for any other id are stale.

use crate::error::RuntimeError;
use crate::host::HostPage;
use crate::mount::{ElementRef, IslandId, VoiceOptions};
use crate::voice::devices::{CaptureEvent, MediaDevices, UploadOutcome, Uploader};
use crate::voice::mime::negotiate;
use crate::voice::presentation::present;
use crate::voice::recording::{Recording, RecordingPhase};
use crate::voice::upload::{AudioMode, UploadRequest};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Recording,
    Uploading,
}

impl VoiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceState::Idle => "idle",
            VoiceState::Recording => "recording",
            VoiceState::Uploading => "uploading",
        }
    }
}

/// The collaborators a pipeline step may call.
pub struct VoicePorts<'a> {
    pub host: &'a mut dyn HostPage,
    pub devices: &'a mut dyn MediaDevices,
    pub uploader: &'a mut dyn Uploader,
}

/// What a pipeline step did.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceOutcome {
    /// Request not valid in the current state
    Ignored,
    /// Result for a recording that is no longer current
    Stale,
    /// Microphone requested
    Started,
    /// Device granted, recorder running
    Capturing,
    Appended,
    /// Recorder asked to stop; a `Stopped` event will follow
    Stopping,
    /// Back to idle without an upload
    Failed(RuntimeError),
    /// Upload submitted
    Uploading,
    Uploaded,
    UploadFailed(RuntimeError),
}

pub struct VoicePipeline {
    island: IslandId,
    root: ElementRef,
    options: VoiceOptions,
    state: VoiceState,
    recording: Option<Recording>,
    last_error: Option<String>,
    capture_supported: bool,
}

impl VoicePipeline {
    pub fn new(island: IslandId, root: ElementRef, options: VoiceOptions) -> Self {
        Self {
            island,
            root,
            options,
            state: VoiceState::Idle,
            recording: None,
            last_error: None,
            capture_supported: true,
        }
    }

    /// Check the platform once at mount; without a capture API the island
    /// shows why it cannot record before anyone presses the button.
    pub fn detect_capture(&mut self, devices: &dyn MediaDevices) {
        self.capture_supported = devices.capture_supported();
        if !self.capture_supported {
            let err = RuntimeError::Unsupported("Audio recording".to_string());
            self.last_error = Some(surface(&err));
        }
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn recording(&self) -> Option<&Recording> {
        self.recording.as_ref()
    }

    /// Push the current presentation to the host.
    pub fn render(&self, host: &mut dyn HostPage) {
        let awaiting_device = self
            .recording
            .as_ref()
            .is_some_and(|rec| rec.phase() == RecordingPhase::AwaitingDevice);
        let view = present(
            self.state,
            awaiting_device,
            self.capture_supported,
            self.last_error.as_deref(),
        );
        host.present_voice(&self.root, &view);
    }

    /// The record button: start when idle, stop when recording.
    pub fn toggle(&mut self, ports: &mut VoicePorts<'_>) -> VoiceOutcome {
        match self.state {
            VoiceState::Idle => self.start(ports),
            VoiceState::Recording => self.stop(ports),
            VoiceState::Uploading => VoiceOutcome::Ignored,
        }
    }

    pub fn start(&mut self, ports: &mut VoicePorts<'_>) -> VoiceOutcome {
        if self.state != VoiceState::Idle {
            debug!(island = %self.island, state = self.state.as_str(), "Start ignored");
            return VoiceOutcome::Ignored;
        }
        if !ports.devices.capture_supported() {
            return self.abort(
                ports.host,
                RuntimeError::Unsupported("Audio recording".to_string()),
            );
        }

        let mime_type = negotiate(&self.options.mime_preferences, &*ports.devices);
        let recording = Recording::new(mime_type);
        info!(
            island = %self.island,
            correlation_id = %recording.correlation_id,
            mime_type = %recording.mime_type,
            "Requesting microphone"
        );

        if let Err(err) =
            ports
                .devices
                .request_capture(&self.island, &recording.correlation_id, &recording.mime_type)
        {
            ports.devices.release(&self.island, &recording.correlation_id);
            return self.abort(ports.host, err);
        }

        self.recording = Some(recording);
        self.state = VoiceState::Recording;
        self.last_error = None;
        self.render(ports.host);
        VoiceOutcome::Started
    }

    pub fn stop(&mut self, ports: &mut VoicePorts<'_>) -> VoiceOutcome {
        if self.state != VoiceState::Recording {
            return VoiceOutcome::Ignored;
        }
        let Some(recording) = self.recording.as_ref() else {
            return VoiceOutcome::Ignored;
        };

        match recording.phase() {
            // Nothing was captured; a late grant for this id is released as stale.
            RecordingPhase::AwaitingDevice => self.finish_capture(ports),
            _ => {
                ports
                    .devices
                    .stop_capture(&self.island, &recording.correlation_id);
                VoiceOutcome::Stopping
            }
        }
    }

    /// Handle an asynchronous result from the capture device.
    pub fn on_capture(
        &mut self,
        ports: &mut VoicePorts<'_>,
        correlation_id: &str,
        event: CaptureEvent,
    ) -> VoiceOutcome {
        let is_current = self.state == VoiceState::Recording
            && self
                .recording
                .as_ref()
                .is_some_and(|rec| rec.correlation_id == correlation_id);
        if !is_current {
            if event == CaptureEvent::Started {
                // A grant nobody is waiting for must not keep the device open.
                ports.devices.release(&self.island, correlation_id);
            }
            debug!(island = %self.island, correlation_id, "Dropping stale capture event");
            return VoiceOutcome::Stale;
        }
        let Some(recording) = self.recording.as_mut() else {
            return VoiceOutcome::Stale;
        };

        match event {
            CaptureEvent::Started => {
                if let Err(err) = recording.device_started() {
                    debug!(island = %self.island, error = %err, "Duplicate device start");
                    return VoiceOutcome::Ignored;
                }
                self.render(ports.host);
                VoiceOutcome::Capturing
            }
            CaptureEvent::Denied { reason } => {
                ports.devices.release(&self.island, correlation_id);
                self.recording = None;
                self.abort(ports.host, RuntimeError::PermissionDenied(reason))
            }
            CaptureEvent::Data(bytes) => match recording.append(&bytes) {
                Ok(true) => VoiceOutcome::Appended,
                Ok(false) => VoiceOutcome::Ignored,
                Err(err) => {
                    debug!(island = %self.island, error = %err, "Fragment dropped");
                    VoiceOutcome::Ignored
                }
            },
            CaptureEvent::Stopped => self.finish_capture(ports),
        }
    }

    /// Handle the end of an upload.
    pub fn on_upload_finished(
        &mut self,
        host: &mut dyn HostPage,
        correlation_id: &str,
        outcome: UploadOutcome,
    ) -> VoiceOutcome {
        let is_current = self.state == VoiceState::Uploading
            && self
                .recording
                .as_ref()
                .is_some_and(|rec| rec.correlation_id == correlation_id);
        if !is_current {
            debug!(island = %self.island, correlation_id, "Dropping stale upload result");
            return VoiceOutcome::Stale;
        }

        self.recording = None;
        self.state = VoiceState::Idle;

        match outcome.error() {
            None => {
                self.last_error = None;
                host.refresh_region(&self.options.timeline_region);
                info!(island = %self.island, correlation_id, "Upload complete");
                self.render(host);
                VoiceOutcome::Uploaded
            }
            Some(err) => {
                warn!(island = %self.island, correlation_id, error = %err, "Upload failed");
                self.last_error = Some(surface(&err));
                self.render(host);
                VoiceOutcome::UploadFailed(err)
            }
        }
    }

    /// Drop the island's recording, releasing the microphone if it is live.
    pub fn release(&mut self, devices: &mut dyn MediaDevices) {
        if let Some(recording) = self.recording.take() {
            if self.state == VoiceState::Recording {
                devices.stop_capture(&self.island, &recording.correlation_id);
                devices.release(&self.island, &recording.correlation_id);
            }
            debug!(
                island = %self.island,
                correlation_id = %recording.correlation_id,
                state = self.state.as_str(),
                "Recording released"
            );
        }
        self.state = VoiceState::Idle;
    }

    /// Leave `recording`: release the device, then upload or return to idle.
    fn finish_capture(&mut self, ports: &mut VoicePorts<'_>) -> VoiceOutcome {
        let Some(mut recording) = self.recording.take() else {
            return VoiceOutcome::Ignored;
        };
        ports.devices.release(&self.island, &recording.correlation_id);
        debug!(
            island = %self.island,
            correlation_id = %recording.correlation_id,
            chunks = recording.chunk_count(),
            bytes = recording.buffered_bytes(),
            "Capture finished"
        );

        let payload = match recording.finalize() {
            Ok(payload) => payload,
            Err(err) => return self.abort(ports.host, err),
        };
        if payload.is_empty() {
            return self.abort(ports.host, RuntimeError::EmptyCapture);
        }

        let toggled = ports.host.toggle_checked(&self.root, &self.options.mode_toggle);
        let audio_mode = AudioMode::from_toggle(toggled);
        info!(
            island = %self.island,
            correlation_id = %recording.correlation_id,
            bytes = payload.bytes.len(),
            duration_s = recording.capture_duration_seconds(),
            audio_mode = %audio_mode,
            "Uploading recording"
        );
        let request = UploadRequest::new(
            &self.options.upload_path,
            payload,
            audio_mode,
            &recording.correlation_id,
            &self.options.provider,
            &self.options.channel,
        );

        self.recording = Some(recording);
        self.state = VoiceState::Uploading;
        self.last_error = None;
        self.render(ports.host);

        match ports.uploader.submit(&self.island, request) {
            Ok(()) => VoiceOutcome::Uploading,
            Err(err) => {
                warn!(island = %self.island, error = %err, "Upload could not be submitted");
                self.recording = None;
                self.state = VoiceState::Idle;
                self.last_error = Some(surface(&err));
                self.render(ports.host);
                VoiceOutcome::UploadFailed(err)
            }
        }
    }

    /// Return to idle and show `err`.
    fn abort(&mut self, host: &mut dyn HostPage, err: RuntimeError) -> VoiceOutcome {
        warn!(island = %self.island, error = %err, "Voice capture stopped");
        self.recording = None;
        self.state = VoiceState::Idle;
        self.last_error = Some(surface(&err));
        self.render(host);
        VoiceOutcome::Failed(err)
    }
}

/// User-facing text for a pipeline error.
fn surface(err: &RuntimeError) -> String {
    match err {
        RuntimeError::Transport(reason) => format!("Upload failed: {}", reason),
        other => other.user_message(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{voice_island, FakeDevices, FakePage, FakeUploader};

    struct Rig {
        page: FakePage,
        devices: FakeDevices,
        uploader: FakeUploader,
        pipeline: VoicePipeline,
    }

    impl Rig {
        fn new(devices: FakeDevices) -> Self {
            let page = FakePage::new();
            let island = voice_island(&page);
            let crate::mount::IslandKind::Voice(options) = island.spec.kind.clone() else {
                panic!("voice island expected");
            };
            Self {
                pipeline: VoicePipeline::new(island.id().clone(), island.root, options),
                page,
                devices,
                uploader: FakeUploader::new(),
            }
        }

        fn step<T>(&mut self, f: impl FnOnce(&mut VoicePipeline, &mut VoicePorts<'_>) -> T) -> T {
            let mut host = self.page.clone();
            let mut devices = self.devices.clone();
            let mut uploader = self.uploader.clone();
            let mut ports = VoicePorts {
                host: &mut host,
                devices: &mut devices,
                uploader: &mut uploader,
            };
            f(&mut self.pipeline, &mut ports)
        }

        fn correlation_id(&self) -> String {
            self.pipeline
                .recording()
                .map(|rec| rec.correlation_id.clone())
                .expect("active recording")
        }

        fn capture(&mut self, event: CaptureEvent) -> VoiceOutcome {
            let id = self.correlation_id();
            self.step(|pipeline, ports| pipeline.on_capture(ports, &id, event))
        }

        fn finish_upload(&mut self, outcome: UploadOutcome) -> VoiceOutcome {
            let id = self.correlation_id();
            let mut host = self.page.clone();
            self.pipeline.on_upload_finished(&mut host, &id, outcome)
        }
    }

    fn supported() -> FakeDevices {
        FakeDevices::new(&["audio/webm;codecs=opus", "audio/webm"])
    }

    #[test]
    fn test_record_stop_upload_success() {
        let mut rig = Rig::new(supported());

        assert_eq!(rig.step(|p, ports| p.start(ports)), VoiceOutcome::Started);
        assert_eq!(rig.devices.requests()[0].2.as_str(), "audio/webm;codecs=opus");
        assert_eq!(rig.capture(CaptureEvent::Started), VoiceOutcome::Capturing);
        assert_eq!(rig.capture(CaptureEvent::Data(vec![1, 2])), VoiceOutcome::Appended);
        assert_eq!(rig.capture(CaptureEvent::Data(vec![3])), VoiceOutcome::Appended);

        assert_eq!(rig.step(|p, ports| p.stop(ports)), VoiceOutcome::Stopping);
        assert_eq!(rig.capture(CaptureEvent::Stopped), VoiceOutcome::Uploading);
        assert_eq!(rig.pipeline.state(), VoiceState::Uploading);

        let submitted = rig.uploader.submitted();
        assert_eq!(submitted.len(), 1);
        let request = &submitted[0].1;
        assert_eq!(request.audio, vec![1, 2, 3]);
        assert_eq!(request.file_name, "voice.webm");
        assert_eq!(request.audio_mode, AudioMode::Transcript);
        assert_eq!(request.correlation_id, rig.correlation_id());
        assert_eq!(request.provider, "webui");
        assert_eq!(rig.devices.releases().len(), 1);

        let outcome = rig.finish_upload(UploadOutcome::Response {
            status: 200,
            body: None,
        });
        assert_eq!(outcome, VoiceOutcome::Uploaded);
        assert_eq!(rig.pipeline.state(), VoiceState::Idle);
        assert!(rig.pipeline.recording().is_none());
        assert!(rig.pipeline.last_error().is_none());
        assert_eq!(rig.page.refreshes(), vec!["chat-timeline".to_string()]);
        assert!(rig.page.last_voice(rig.pipeline.root).unwrap().error.is_none());
    }

    #[test]
    fn test_start_is_ignored_while_busy() {
        let mut rig = Rig::new(supported());
        rig.step(|p, ports| p.start(ports));
        assert_eq!(rig.step(|p, ports| p.start(ports)), VoiceOutcome::Ignored);
        assert_eq!(rig.devices.requests().len(), 1);

        rig.capture(CaptureEvent::Started);
        rig.capture(CaptureEvent::Data(vec![9]));
        rig.step(|p, ports| p.stop(ports));
        rig.capture(CaptureEvent::Stopped);

        assert_eq!(rig.step(|p, ports| p.start(ports)), VoiceOutcome::Ignored);
        assert_eq!(rig.step(|p, ports| p.toggle(ports)), VoiceOutcome::Ignored);
        assert_eq!(rig.devices.requests().len(), 1);
    }

    #[test]
    fn test_empty_capture_never_uploads() {
        let mut rig = Rig::new(supported());
        rig.step(|p, ports| p.start(ports));
        rig.capture(CaptureEvent::Started);
        rig.capture(CaptureEvent::Data(Vec::new()));
        rig.step(|p, ports| p.stop(ports));

        let outcome = rig.capture(CaptureEvent::Stopped);
        assert_eq!(outcome, VoiceOutcome::Failed(RuntimeError::EmptyCapture));
        assert!(rig.uploader.submitted().is_empty());
        assert_eq!(rig.pipeline.state(), VoiceState::Idle);
        assert_eq!(rig.pipeline.last_error(), Some("No audio captured."));
        assert_eq!(rig.devices.releases().len(), 1);
    }

    #[test]
    fn test_permission_denied_returns_to_idle() {
        let mut rig = Rig::new(supported());
        rig.step(|p, ports| p.start(ports));

        let outcome = rig.capture(CaptureEvent::Denied {
            reason: "NotAllowedError".to_string(),
        });
        assert!(matches!(outcome, VoiceOutcome::Failed(RuntimeError::PermissionDenied(_))));
        assert_eq!(rig.pipeline.state(), VoiceState::Idle);
        assert!(rig.pipeline.last_error().unwrap().contains("NotAllowedError"));
        assert_eq!(rig.devices.requests().len(), 1);

        // No automatic retry, but the user can start again.
        assert_eq!(rig.step(|p, ports| p.start(ports)), VoiceOutcome::Started);
    }

    #[test]
    fn test_upload_failure_surfaces_server_reason() {
        let mut rig = Rig::new(supported());
        rig.page.set_toggle("#audio-mode-toggle", true);
        rig.step(|p, ports| p.start(ports));
        rig.capture(CaptureEvent::Started);
        rig.capture(CaptureEvent::Data(vec![7; 16]));
        rig.step(|p, ports| p.stop(ports));
        rig.capture(CaptureEvent::Stopped);
        assert_eq!(rig.uploader.submitted()[0].1.audio_mode, AudioMode::Voice);

        let outcome = rig.finish_upload(UploadOutcome::Response {
            status: 413,
            body: Some(r#"{"error":"too large"}"#.to_string()),
        });

        assert!(matches!(outcome, VoiceOutcome::UploadFailed(_)));
        assert_eq!(rig.pipeline.state(), VoiceState::Idle);
        assert!(rig.pipeline.last_error().unwrap().contains("too large"));
        assert!(rig.page.refreshes().is_empty());
        assert_eq!(rig.devices.releases().len(), 1);
        assert_eq!(rig.step(|p, ports| p.start(ports)), VoiceOutcome::Started);
    }

    #[test]
    fn test_network_failure_is_recoverable() {
        let mut rig = Rig::new(supported());
        rig.step(|p, ports| p.start(ports));
        rig.capture(CaptureEvent::Started);
        rig.capture(CaptureEvent::Data(vec![1]));
        rig.capture(CaptureEvent::Stopped);

        let outcome = rig.finish_upload(UploadOutcome::Network {
            reason: "connection refused".to_string(),
        });
        assert!(matches!(outcome, VoiceOutcome::UploadFailed(RuntimeError::Transport(_))));
        assert_eq!(rig.pipeline.last_error(), Some("Upload failed: connection refused"));
    }

    #[test]
    fn test_stop_before_grant_releases_late_device() {
        let mut rig = Rig::new(supported());
        rig.step(|p, ports| p.start(ports));
        let id = rig.correlation_id();

        let outcome = rig.step(|p, ports| p.stop(ports));
        assert_eq!(outcome, VoiceOutcome::Failed(RuntimeError::EmptyCapture));

        let late = rig.step(|p, ports| p.on_capture(ports, &id, CaptureEvent::Started));
        assert_eq!(late, VoiceOutcome::Stale);
        assert_eq!(rig.devices.releases(), vec![id.clone(), id]);
        assert!(rig.uploader.submitted().is_empty());
    }

    #[test]
    fn test_refused_request_releases_device() {
        let mut rig = Rig::new(supported());
        rig.devices.fail_request();

        let outcome = rig.step(|p, ports| p.start(ports));

        assert!(matches!(outcome, VoiceOutcome::Failed(RuntimeError::PermissionDenied(_))));
        assert_eq!(rig.devices.releases().len(), 1);
        assert_eq!(rig.pipeline.state(), VoiceState::Idle);
        assert!(rig.pipeline.last_error().unwrap().starts_with("Microphone unavailable"));
    }

    #[test]
    fn test_submit_failure_returns_to_idle() {
        let mut rig = Rig::new(supported());
        rig.uploader.fail_next();
        rig.step(|p, ports| p.start(ports));
        rig.capture(CaptureEvent::Started);
        rig.capture(CaptureEvent::Data(vec![1, 1]));

        let outcome = rig.capture(CaptureEvent::Stopped);

        assert!(matches!(outcome, VoiceOutcome::UploadFailed(_)));
        assert_eq!(rig.pipeline.state(), VoiceState::Idle);
        assert!(rig.pipeline.recording().is_none());
        assert_eq!(rig.pipeline.last_error(), Some("Upload failed: uploader offline"));
        assert_eq!(rig.devices.releases().len(), 1);
    }

    #[test]
    fn test_unsupported_capture_stays_idle() {
        let mut rig = Rig::new(FakeDevices::unsupported());
        let outcome = rig.step(|p, ports| p.start(ports));
        assert!(matches!(outcome, VoiceOutcome::Failed(RuntimeError::Unsupported(_))));
        assert!(rig.devices.requests().is_empty());
        assert_eq!(rig.pipeline.state(), VoiceState::Idle);
    }

    #[test]
    fn test_release_while_recording_stops_tracks() {
        let mut rig = Rig::new(supported());
        rig.step(|p, ports| p.start(ports));
        rig.capture(CaptureEvent::Started);

        let mut devices = rig.devices.clone();
        rig.pipeline.release(&mut devices);

        assert_eq!(rig.pipeline.state(), VoiceState::Idle);
        assert_eq!(rig.devices.stops().len(), 1);
        assert_eq!(rig.devices.releases().len(), 1);
    }

    #[test]
    fn test_late_upload_result_is_stale() {
        let mut rig = Rig::new(supported());
        rig.step(|p, ports| p.start(ports));
        rig.capture(CaptureEvent::Started);
        rig.capture(CaptureEvent::Data(vec![1]));
        rig.capture(CaptureEvent::Stopped);
        let id = rig.correlation_id();

        let mut devices = rig.devices.clone();
        rig.pipeline.release(&mut devices);

        let mut host = rig.page.clone();
        let outcome = rig.pipeline.on_upload_finished(
            &mut host,
            &id,
            UploadOutcome::Response { status: 200, body: None },
        );
        assert_eq!(outcome, VoiceOutcome::Stale);
        assert!(rig.page.refreshes().is_empty());
    }
}
