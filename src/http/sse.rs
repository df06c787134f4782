//! Server-Sent Events push-streams.
//!
//! Each opened stream is one spawned task that reads the response body,
//! splits it into events and forwards them to the runtime as
//! [`StreamSignal`]s. Closing the handle aborts the task; anything it already
//! queued is dropped by the generation check.

use crate::error::RuntimeResult;
use crate::http::resolve_url;
use crate::mount::IslandId;
use crate::runtime::{RuntimeEvent, RuntimeHandle};
use crate::transport::source::{
    Generation, PushStreamSource, SignalKind, StreamHandle, StreamSignal, StreamTarget,
};
use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::Url;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// SSE event name used when the server sends none.
const DEFAULT_EVENT: &str = "message";

pub struct SsePushSource {
    client: reqwest::Client,
    base_url: String,
    events: RuntimeHandle,
}

impl SsePushSource {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        events: RuntimeHandle,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            events,
        }
    }

    fn stream_url(&self, target: &StreamTarget) -> RuntimeResult<Url> {
        let mut url = resolve_url(&self.base_url, &target.path)?;
        if let Some(correlation_id) = &target.correlation_id {
            url.query_pairs_mut()
                .append_pair("correlation_id", correlation_id);
        }
        Ok(url)
    }
}

struct SseHandle {
    task: JoinHandle<()>,
}

impl StreamHandle for SseHandle {
    fn close(&mut self) {
        self.task.abort();
    }
}

impl Drop for SseHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl PushStreamSource for SsePushSource {
    fn supports_push(&self) -> bool {
        true
    }

    fn open(
        &mut self,
        island: &IslandId,
        generation: Generation,
        target: &StreamTarget,
    ) -> RuntimeResult<Box<dyn StreamHandle>> {
        let url = self.stream_url(target)?;
        debug!(island = %island, generation = %generation, url = %url, "Opening event stream");

        let task = tokio::spawn(read_stream(
            self.client.clone(),
            url,
            island.clone(),
            generation,
            self.events.clone(),
        ));
        Ok(Box::new(SseHandle { task }))
    }
}

async fn read_stream(
    client: reqwest::Client,
    url: Url,
    island: IslandId,
    generation: Generation,
    events: RuntimeHandle,
) {
    let signal = |kind: SignalKind| {
        RuntimeEvent::Stream(StreamSignal {
            island: island.clone(),
            generation,
            kind,
        })
    };

    let response = match client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
    {
        Ok(response) => response,
        Err(e) => {
            warn!(
                island = %island,
                generation = %generation,
                error = %e,
                "Event stream request failed"
            );
            events.send(signal(SignalKind::Failed {
                reason: e.to_string(),
            }));
            return;
        }
    };

    if !events.send(signal(SignalKind::Opened)) {
        return;
    }

    let stream = response.bytes_stream().eventsource();
    let mut stream = std::pin::pin!(stream);
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                let name = if event.event.is_empty() {
                    DEFAULT_EVENT.to_string()
                } else {
                    event.event
                };
                if !events.send(signal(SignalKind::Message {
                    name,
                    data: event.data,
                })) {
                    return;
                }
            }
            Err(e) => {
                events.send(signal(SignalKind::Failed {
                    reason: format!("Stream error: {}", e),
                }));
                return;
            }
        }
    }

    events.send(signal(SignalKind::Failed {
        reason: "stream ended".to_string(),
    }));
}
