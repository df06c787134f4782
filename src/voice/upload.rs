//! # Upload Requests
//!
//! The multipart submission sent once a recording is finalized.
//!
//! ## Form Fields:
//! - `audio`: the payload, named `voice.<ext>` with the negotiated media type
//! - `audio_mode`: how the agent should treat the audio
//! - `correlation_id`: the recording's correlation identifier
//! - `provider` / `channel`: fixed provenance naming the web UI

use crate::voice::mime::MimeType;
use crate::voice::recording::AudioPayload;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the agent should treat an uploaded recording, chosen by the island's
/// toggle control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    /// Transcribe and handle the text as a chat message (toggle off)
    Transcript,
    /// Keep the audio as a voice note (toggle on)
    Voice,
}

impl AudioMode {
    pub fn from_toggle(checked: bool) -> Self {
        if checked {
            AudioMode::Voice
        } else {
            AudioMode::Transcript
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioMode::Transcript => "transcript",
            AudioMode::Voice => "voice",
        }
    }
}

impl fmt::Display for AudioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub upload_path: String,
    pub audio: Vec<u8>,
    pub mime_type: MimeType,
    pub file_name: String,
    pub audio_mode: AudioMode,
    pub correlation_id: String,
    pub provider: String,
    pub channel: String,
}

impl UploadRequest {
    pub fn new(
        upload_path: impl Into<String>,
        payload: AudioPayload,
        audio_mode: AudioMode,
        correlation_id: impl Into<String>,
        provider: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        let file_name = format!("voice.{}", payload.mime_type.extension());
        Self {
            upload_path: upload_path.into(),
            audio: payload.bytes,
            mime_type: payload.mime_type,
            file_name,
            audio_mode,
            correlation_id: correlation_id.into(),
            provider: provider.into(),
            channel: channel.into(),
        }
    }

    /// The text fields of the form, in submission order.
    pub fn text_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("audio_mode", self.audio_mode.as_str().to_string()),
            ("correlation_id", self.correlation_id.clone()),
            ("provider", self.provider.clone()),
            ("channel", self.channel.clone()),
        ]
    }
}
