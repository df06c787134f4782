//! # Voice Capture
//!
//! Microphone capture for voice islands: negotiate a container format, buffer
//! encoded fragments while recording, and upload the assembled payload once.
//!
//! ## Module Layout:
//! - **pipeline**: the idle/recording/uploading state machine
//! - **recording**: one capture session and its correlation id
//! - **chunks**: ordered fragment buffer
//! - **mime**: container/codec negotiation
//! - **upload**: the multipart submission
//! - **devices**: capture and upload ports
//! - **presentation**: what the island shows for each state

pub mod chunks;
pub mod devices;
pub mod mime;
pub mod pipeline;
pub mod presentation;
pub mod recording;
pub mod upload;

pub use devices::{CaptureEvent, MediaDevices, NoCapture, UploadOutcome, Uploader};
pub use mime::MimeType;
pub use pipeline::{VoiceOutcome, VoicePipeline, VoicePorts, VoiceState};
pub use presentation::VoicePresentation;
pub use upload::{AudioMode, UploadRequest};
