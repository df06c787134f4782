//! # Media Type Negotiation
//!
//! Picks the container/codec the recorder should produce. The choice is made
//! once, when a recording starts, and decides both the encoded bytes and the
//! filename extension sent with the upload, so the server can tell the format
//! without sniffing.

use crate::voice::devices::MediaDevices;
use std::fmt;

/// Preference order used when no configuration overrides it.
pub const DEFAULT_MIME_PREFERENCES: &[&str] = &[
    "audio/webm;codecs=opus",
    "audio/webm",
    "audio/ogg;codecs=opus",
    "audio/mp4",
    "audio/mpeg",
];

/// Used when the platform neither supports a preference nor reports a default.
pub const FALLBACK_MIME_TYPE: &str = "audio/webm";

/// A negotiated media type such as `audio/webm;codecs=opus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType(String);

impl MimeType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The type without parameters, lowercased (`audio/webm`).
    pub fn essence(&self) -> String {
        self.0
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    }

    /// Filename extension matching the container.
    pub fn extension(&self) -> &'static str {
        match self.essence().as_str() {
            "audio/webm" | "video/webm" => "webm",
            "audio/ogg" | "application/ogg" => "ogg",
            "audio/mp4" | "audio/x-m4a" | "video/mp4" => "m4a",
            "audio/aac" => "aac",
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            _ => "webm",
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Select the first preference the device supports, else its default.
pub fn negotiate(preferences: &[String], devices: &dyn MediaDevices) -> MimeType {
    preferences
        .iter()
        .map(|candidate| candidate.trim())
        .find(|candidate| !candidate.is_empty() && devices.is_type_supported(candidate))
        .map(MimeType::new)
        .or_else(|| devices.default_mime_type().map(MimeType::new))
        .unwrap_or_else(|| MimeType::new(FALLBACK_MIME_TYPE))
}

pub fn default_preferences() -> Vec<String> {
    DEFAULT_MIME_PREFERENCES.iter().map(|m| m.to_string()).collect()
}
