//! # Recordings
//!
//! One capture session, created per button press and destroyed once its
//! upload completes or fails.
//!
//! ## Recording Lifecycle:
//! 1. **AwaitingDevice**: microphone requested, nothing captured yet
//! 2. **Capturing**: the device is live, fragments accumulate
//! 3. **Finalized**: fragments assembled into one payload, never appended again

use crate::error::{RuntimeError, RuntimeResult};
use crate::voice::chunks::ChunkBuffer;
use crate::voice::mime::MimeType;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingPhase {
    AwaitingDevice,
    Capturing,
    Finalized,
}

impl RecordingPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingPhase::AwaitingDevice => "awaiting_device",
            RecordingPhase::Capturing => "capturing",
            RecordingPhase::Finalized => "finalized",
        }
    }
}

/// Assembled audio ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub mime_type: MimeType,
}

impl AudioPayload {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug)]
pub struct Recording {
    /// Generated when the recording starts; stable through the upload
    pub correlation_id: String,

    /// Negotiated once, when the recording starts
    pub mime_type: MimeType,

    pub created_at: DateTime<Utc>,

    chunks: ChunkBuffer,
    phase: RecordingPhase,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl Recording {
    pub fn new(mime_type: MimeType) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            mime_type,
            created_at: Utc::now(),
            chunks: ChunkBuffer::new(),
            phase: RecordingPhase::AwaitingDevice,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn phase(&self) -> RecordingPhase {
        self.phase
    }

    /// The device is live.
    ///
    /// ## State Transition:
    /// AwaitingDevice → Capturing
    pub fn device_started(&mut self) -> RuntimeResult<()> {
        match self.phase {
            RecordingPhase::AwaitingDevice => {
                self.phase = RecordingPhase::Capturing;
                self.started_at = Some(Utc::now());
                Ok(())
            }
            other => Err(RuntimeError::InvalidTransition(format!(
                "recording {} cannot start from {}",
                self.correlation_id,
                other.as_str()
            ))),
        }
    }

    /// Append an encoded fragment. Only a capturing recording accepts data.
    pub fn append(&mut self, data: &[u8]) -> RuntimeResult<bool> {
        if self.phase != RecordingPhase::Capturing {
            return Err(RuntimeError::InvalidTransition(format!(
                "recording {} cannot accept audio while {}",
                self.correlation_id,
                self.phase.as_str()
            )));
        }
        Ok(self.chunks.append(data))
    }

    /// Assemble all fragments into one payload and clear them.
    ///
    /// ## State Transition:
    /// AwaitingDevice/Capturing → Finalized. A recording is finalized at most
    /// once, which is what keeps it to a single upload attempt.
    pub fn finalize(&mut self) -> RuntimeResult<AudioPayload> {
        if self.phase == RecordingPhase::Finalized {
            return Err(RuntimeError::InvalidTransition(format!(
                "recording {} already finalized",
                self.correlation_id
            )));
        }
        self.phase = RecordingPhase::Finalized;
        self.ended_at = Some(Utc::now());
        Ok(AudioPayload {
            bytes: self.chunks.assemble(),
            mime_type: self.mime_type.clone(),
        })
    }

    pub fn buffered_bytes(&self) -> usize {
        self.chunks.total_bytes()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Seconds of actual capture (from device start to finalize, or now).
    pub fn capture_duration_seconds(&self) -> f64 {
        match self.started_at {
            Some(started) => {
                let end = self.ended_at.unwrap_or_else(Utc::now);
                end.signed_duration_since(started).num_milliseconds() as f64 / 1000.0
            }
            None => 0.0,
        }
    }
}
