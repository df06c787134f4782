//! Render callbacks registered per named stream event.

use crate::error::RuntimeResult;
use crate::host::RenderOp;
use crate::mount::IslandKind;
use crate::transport::event::{ChunkPayload, PresencePayload, StreamEvent};
use std::collections::HashMap;

/// Turns a decoded event into a change to the island. An `Err` means the
/// payload did not have the expected shape.
pub type RenderFn = fn(&StreamEvent) -> RuntimeResult<RenderOp>;

/// Render callbacks keyed by stream event name.
#[derive(Clone, Default)]
pub struct EventHandlers {
    handlers: HashMap<String, RenderFn>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, name: impl Into<String>, render: RenderFn) -> Self {
        self.handlers.insert(name.into(), render);
        self
    }

    pub fn get(&self, name: &str) -> Option<RenderFn> {
        self.handlers.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// The handlers an island of `kind` listens with.
    pub fn for_kind(kind: &IslandKind) -> Self {
        match kind {
            IslandKind::Presence(_) => Self::new().on("presence", render_presence),
            IslandKind::Reply(_) => Self::new().on("chunk", render_chunk),
            IslandKind::Voice(_) => Self::new(),
        }
    }
}

impl std::fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("EventHandlers").field("events", &names).finish()
    }
}

/// Render a presence snapshot as the island's whole content.
pub fn render_presence(event: &StreamEvent) -> RuntimeResult<RenderOp> {
    let presence: PresencePayload = event.payload_as()?;
    Ok(RenderOp::Replace(presence_markup(&presence)))
}

/// Append an incremental reply chunk.
pub fn render_chunk(event: &StreamEvent) -> RuntimeResult<RenderOp> {
    let chunk: ChunkPayload = event.payload_as()?;
    Ok(RenderOp::Append(chunk.chunk))
}

pub fn presence_markup(presence: &PresencePayload) -> String {
    let timestamp = presence.timestamp.as_deref().unwrap_or("");
    format!(
        concat!(
            r#"<div class="presence" data-status="{status}">"#,
            r#"<span class="presence-status">{status}</span>"#,
            r#"<span class="presence-note">{note}</span>"#,
            r#"<time>{timestamp}</time>"#,
            "</div>",
        ),
        status = escape_html(&presence.status),
        note = escape_html(&presence.note),
        timestamp = escape_html(timestamp),
    )
}

/// Minimal HTML escaping for text that ends up inside markup or attributes.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_render_escapes_text() {
        let event = StreamEvent::decode(
            "presence",
            r#"{"status":"idle","note":"<b>away</b>","timestamp":"T1"}"#,
            None,
        )
        .unwrap();

        let RenderOp::Replace(html) = render_presence(&event).unwrap() else {
            panic!("presence should replace the island content");
        };
        assert!(html.contains(r#"data-status="idle""#));
        assert!(html.contains("&lt;b&gt;away&lt;/b&gt;"));
        assert!(html.contains("<time>T1</time>"));
    }

    #[test]
    fn test_chunk_render_appends() {
        let event = StreamEvent::decode("chunk", r#"{"chunk":"Hel"}"#, None).unwrap();
        assert_eq!(render_chunk(&event).unwrap(), RenderOp::Append("Hel".to_string()));
    }

    #[test]
    fn test_presence_without_status_is_an_error() {
        let event = StreamEvent::decode("presence", r#"{"note":"x"}"#, None).unwrap();
        assert!(render_presence(&event).is_err());
    }

    #[test]
    fn test_handlers_per_kind() {
        let reply = IslandKind::Reply(crate::mount::ReplyOptions {
            complete_event: "done".to_string(),
        });
        let handlers = EventHandlers::for_kind(&reply);
        assert!(handlers.get("chunk").is_some());
        assert!(handlers.get("presence").is_none());
    }
}
