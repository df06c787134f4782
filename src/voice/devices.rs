//! Capture and upload ports used by the voice pipeline.
//!
//! Both are asynchronous on the platform side: requests return immediately
//! and their results come back later as [`CaptureEvent`]s and
//! [`UploadOutcome`]s tagged with the recording's correlation id.

use crate::error::{RuntimeError, RuntimeResult};
use crate::mount::IslandId;
use crate::voice::mime::MimeType;
use crate::voice::upload::UploadRequest;

/// Asynchronous results from the capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Microphone granted and the recorder is running
    Started,
    /// Access refused or hardware failure
    Denied { reason: String },
    /// An encoded fragment
    Data(Vec<u8>),
    /// The recorder stopped (user request or external) and flushed its data
    Stopped,
}

/// Microphone and recorder access.
pub trait MediaDevices {
    /// Whether the platform has a media-capture API at all.
    fn capture_supported(&self) -> bool;

    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Type the recorder uses when none is requested.
    fn default_mime_type(&self) -> Option<String>;

    /// Ask for the microphone and start recording once granted.
    fn request_capture(
        &mut self,
        island: &IslandId,
        correlation_id: &str,
        mime_type: &MimeType,
    ) -> RuntimeResult<()>;

    /// Stop the recorder; a `Stopped` event follows after the last `Data`.
    fn stop_capture(&mut self, island: &IslandId, correlation_id: &str);

    /// Stop every hardware track behind the recording.
    fn release(&mut self, island: &IslandId, correlation_id: &str);
}

/// How an upload ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The server answered; `body` is the raw response text, if any
    Response { status: u16, body: Option<String> },
    /// No response (connection refused, reset, timeout)
    Network { reason: String },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Response { status, .. } if (200..300).contains(status))
    }

    /// The error to surface, or `None` on success.
    pub fn error(&self) -> Option<RuntimeError> {
        if self.is_success() {
            return None;
        }
        match self {
            UploadOutcome::Response { status, body } => {
                Some(RuntimeError::from_upload_response(*status, body.as_deref()))
            }
            UploadOutcome::Network { reason } => Some(RuntimeError::Transport(reason.clone())),
        }
    }
}

/// Sends finalized recordings to the upload endpoint.
pub trait Uploader {
    fn submit(&mut self, island: &IslandId, request: UploadRequest) -> RuntimeResult<()>;
}

/// Media devices for platforms without any capture API.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapture;

impl MediaDevices for NoCapture {
    fn capture_supported(&self) -> bool {
        false
    }

    fn is_type_supported(&self, _mime_type: &str) -> bool {
        false
    }

    fn default_mime_type(&self) -> Option<String> {
        None
    }

    fn request_capture(
        &mut self,
        _island: &IslandId,
        _correlation_id: &str,
        _mime_type: &MimeType,
    ) -> RuntimeResult<()> {
        Err(RuntimeError::Unsupported("Audio recording".to_string()))
    }

    fn stop_capture(&mut self, _island: &IslandId, _correlation_id: &str) {}

    fn release(&mut self, _island: &IslandId, _correlation_id: &str) {}
}
