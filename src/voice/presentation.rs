//! Pure mapping from pipeline state to what the voice island shows.

use crate::voice::pipeline::VoiceState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePresentation {
    pub button_label: &'static str,
    /// Button rendered in its "recording" style
    pub button_active: bool,
    pub button_disabled: bool,
    pub status: &'static str,
    pub error: Option<String>,
}

pub fn present(
    state: VoiceState,
    awaiting_device: bool,
    capture_supported: bool,
    error: Option<&str>,
) -> VoicePresentation {
    let (button_label, button_active, button_disabled, status) = match state {
        VoiceState::Idle if !capture_supported => ("Record", false, true, "Unavailable"),
        VoiceState::Idle => ("Record", false, false, "Ready"),
        VoiceState::Recording if awaiting_device => {
            ("Stop", true, false, "Waiting for microphone…")
        }
        VoiceState::Recording => ("Stop", true, false, "Recording…"),
        VoiceState::Uploading => ("Uploading…", false, true, "Uploading…"),
    };

    VoicePresentation {
        button_label,
        button_active,
        button_disabled,
        status,
        error: error.map(str::to_string),
    }
}
