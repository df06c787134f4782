//! # Configuration Management
//!
//! This module loads the runtime configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `ALPHONSE_UI_BASE_URL` (server base URL only)
//! 2. Environment variables (`APP_SERVER__BASE_URL`, `APP_PRESENCE__POLL_INTERVAL_SECS`, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! Nested keys use `__` so that keys with underscores (`poll_interval_secs`)
//! survive the mapping.

use crate::mount::{
    IslandId, IslandKind, IslandSpec, PresenceOptions, ReplyOptions, VoiceOptions,
};
use crate::voice::mime::default_preferences;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Top-level runtime configuration.
///
/// Each section maps to one island kind, plus the server the runtime talks to
/// and the page regions it watches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    pub server: ServerConfig,
    pub presence: PresenceConfig,
    pub reply: ReplyConfig,
    pub voice: VoiceConfig,
    pub regions: RegionsConfig,
}

/// Where the backend lives.
///
/// ## Common values:
/// - `base_url = "http://localhost:5001"`: local agent backend (development)
/// - `base_url = "https://alphonse.example.org"`: deployed shell
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub base_url: String,
}

/// The agent presence panel: a push-stream that degrades to polling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceConfig {
    pub selector: String,
    pub stream_path: String,
    /// Fragment endpoint polled after a fallback
    pub poll_path: String,
    pub poll_interval_secs: u64,
    /// Element id polled fragments are swapped into
    pub swap_target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplyConfig {
    pub selector: String,
    pub complete_event: String,
}

/// Voice capture island settings.
///
/// ## Fields:
/// - `upload_path`: multipart endpoint receiving finished recordings
/// - `timeline_region`: region id refreshed after a successful upload
/// - `mode_toggle`: selector of the checkbox choosing `voice` vs `transcript`
/// - `provider` / `channel`: provenance fields sent with every upload
/// - `mime_preferences`: container/codec candidates, most preferred first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VoiceConfig {
    pub selector: String,
    pub upload_path: String,
    pub timeline_region: String,
    pub mode_toggle: String,
    pub provider: String,
    pub channel: String,
    pub mime_preferences: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionsConfig {
    /// Id of the container whose content swaps tear islands down
    pub swap_container: String,
    /// Fragment endpoint re-fetched when the timeline region refreshes
    pub timeline_path: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                base_url: "http://localhost:5001".to_string(),
            },
            presence: PresenceConfig {
                selector: "#presence-panel".to_string(),
                stream_path: "/ui/presence/stream".to_string(),
                poll_path: "/ui/presence".to_string(),
                poll_interval_secs: 20,
                swap_target: "presence-panel".to_string(),
            },
            reply: ReplyConfig {
                selector: "#chat-reply".to_string(),
                complete_event: "done".to_string(),
            },
            voice: VoiceConfig {
                selector: "#voice-capture".to_string(),
                upload_path: "/chat/voice".to_string(),
                timeline_region: "chat-timeline".to_string(),
                mode_toggle: "#audio-mode-toggle".to_string(),
                provider: "webui".to_string(),
                channel: "webui".to_string(),
                mime_preferences: default_preferences(),
            },
            regions: RegionsConfig {
                swap_container: "main-content".to_string(),
                timeline_path: "/chat/timeline".to_string(),
            },
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Apply `ALPHONSE_UI_BASE_URL` if set
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__BASE_URL=http://10.0.0.5:5001`
    /// - `APP_PRESENCE__POLL_INTERVAL_SECS=30`
    /// - `APP_REGIONS__SWAP_CONTAINER=app`
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&RuntimeConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(base_url) = env::var("ALPHONSE_UI_BASE_URL") {
            settings = settings.set_override("server.base_url", base_url)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - The base URL is http(s)
    /// - Every selector and endpoint path is present
    /// - The poll interval is not zero
    /// - At least one MIME preference is listed
    pub fn validate(&self) -> Result<()> {
        let base_url = self.server.base_url.as_str();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "Server base URL must be http(s), got '{}'",
                base_url
            ));
        }

        let required = [
            ("presence.selector", &self.presence.selector),
            ("presence.stream_path", &self.presence.stream_path),
            ("presence.poll_path", &self.presence.poll_path),
            ("presence.swap_target", &self.presence.swap_target),
            ("reply.selector", &self.reply.selector),
            ("reply.complete_event", &self.reply.complete_event),
            ("voice.selector", &self.voice.selector),
            ("voice.upload_path", &self.voice.upload_path),
            ("voice.timeline_region", &self.voice.timeline_region),
            ("regions.swap_container", &self.regions.swap_container),
            ("regions.timeline_path", &self.regions.timeline_path),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(anyhow::anyhow!("{} cannot be empty", key));
            }
        }

        if self.presence.poll_interval_secs == 0 {
            return Err(anyhow::anyhow!("Poll interval must be greater than 0"));
        }

        if self.voice.mime_preferences.is_empty() {
            return Err(anyhow::anyhow!("At least one MIME preference is required"));
        }

        Ok(())
    }

    /// Apply a partial JSON override and re-validate.
    ///
    /// Only the fields present are changed, e.g.
    /// `{"presence": {"poll_interval_secs": 30}}`. On a validation failure the
    /// previous configuration is kept.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial: serde_json::Value = serde_json::from_str(json_str)?;
        let mut updated = self.clone();

        if let Some(server) = partial.get("server") {
            if let Some(base_url) = server.get("base_url").and_then(|v| v.as_str()) {
                updated.server.base_url = base_url.to_string();
            }
        }

        if let Some(presence) = partial.get("presence") {
            if let Some(stream_path) = presence.get("stream_path").and_then(|v| v.as_str()) {
                updated.presence.stream_path = stream_path.to_string();
            }
            if let Some(poll_path) = presence.get("poll_path").and_then(|v| v.as_str()) {
                updated.presence.poll_path = poll_path.to_string();
            }
            if let Some(secs) = presence.get("poll_interval_secs").and_then(|v| v.as_u64()) {
                updated.presence.poll_interval_secs = secs;
            }
        }

        if let Some(reply) = partial.get("reply") {
            if let Some(event) = reply.get("complete_event").and_then(|v| v.as_str()) {
                updated.reply.complete_event = event.to_string();
            }
        }

        if let Some(voice) = partial.get("voice") {
            if let Some(upload_path) = voice.get("upload_path").and_then(|v| v.as_str()) {
                updated.voice.upload_path = upload_path.to_string();
            }
            if let Some(region) = voice.get("timeline_region").and_then(|v| v.as_str()) {
                updated.voice.timeline_region = region.to_string();
            }
            if let Some(prefs) = voice.get("mime_preferences").and_then(|v| v.as_array()) {
                updated.voice.mime_preferences = prefs
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
            }
        }

        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.presence.poll_interval_secs)
    }

    /// The island registry: one spec per island kind.
    pub fn island_specs(&self) -> Vec<IslandSpec> {
        vec![
            IslandSpec {
                id: island_id(&self.presence.selector),
                selector: self.presence.selector.clone(),
                kind: IslandKind::Presence(PresenceOptions {
                    stream_path: self.presence.stream_path.clone(),
                    poll_path: self.presence.poll_path.clone(),
                    poll_interval: self.poll_interval(),
                    swap_target: self.presence.swap_target.clone(),
                }),
            },
            IslandSpec {
                id: island_id(&self.reply.selector),
                selector: self.reply.selector.clone(),
                kind: IslandKind::Reply(ReplyOptions {
                    complete_event: self.reply.complete_event.clone(),
                }),
            },
            IslandSpec {
                id: island_id(&self.voice.selector),
                selector: self.voice.selector.clone(),
                kind: IslandKind::Voice(VoiceOptions {
                    upload_path: self.voice.upload_path.clone(),
                    timeline_region: self.voice.timeline_region.clone(),
                    mode_toggle: self.voice.mode_toggle.clone(),
                    provider: self.voice.provider.clone(),
                    channel: self.voice.channel.clone(),
                    mime_preferences: self.voice.mime_preferences.clone(),
                }),
            },
        ]
    }
}

/// `#presence-panel` → `presence-panel`
fn island_id(selector: &str) -> IslandId {
    IslandId::new(selector.trim_start_matches(['#', '.']))
}
