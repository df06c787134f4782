//! Multipart voice uploads over `reqwest`.

use crate::error::RuntimeResult;
use crate::http::resolve_url;
use crate::mount::IslandId;
use crate::runtime::{RuntimeEvent, RuntimeHandle};
use crate::voice::devices::{UploadOutcome, Uploader};
use crate::voice::upload::UploadRequest;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use tracing::{debug, warn};

pub struct HttpUploader {
    client: reqwest::Client,
    base_url: String,
    events: RuntimeHandle,
}

impl HttpUploader {
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
}

/// The multipart body for a finished recording.
pub fn build_form(request: &UploadRequest) -> RuntimeResult<Form> {
    let audio = Part::bytes(request.audio.clone())
        .file_name(request.file_name.clone())
        .mime_str(request.mime_type.as_str())?;

    let form = request
        .text_fields()
        .into_iter()
        .fold(Form::new().part("audio", audio), |form, (name, value)| {
            form.text(name, value)
        });
    Ok(form)
}

/// POST one form and classify the answer. Never retries.
pub async fn upload(client: &reqwest::Client, url: Url, form: Form) -> UploadOutcome {
    match client.post(url).multipart(form).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .ok()
                .filter(|text| !text.trim().is_empty());
            UploadOutcome::Response { status, body }
        }
        Err(e) => UploadOutcome::Network {
            reason: e.to_string(),
        },
    }
}

impl Uploader for HttpUploader {
    fn submit(&mut self, island: &IslandId, request: UploadRequest) -> RuntimeResult<()> {
        let url = resolve_url(&self.base_url, &request.upload_path)?;
        let form = build_form(&request)?;
        debug!(
            island = %island,
            correlation_id = %request.correlation_id,
            bytes = request.audio.len(),
            url = %url,
            "Submitting upload"
        );

        let client = self.client.clone();
        let events = self.events.clone();
        let island = island.clone();
        let correlation_id = request.correlation_id;
        tokio::spawn(async move {
            let outcome = upload(&client, url, form).await;
            if let Some(err) = outcome.error() {
                warn!(
                    island = %island,
                    correlation_id = %correlation_id,
                    error = %err,
                    "Upload rejected"
                );
            }
            events.send(RuntimeEvent::UploadFinished {
                island,
                correlation_id,
                outcome,
            });
        });
        Ok(())
    }
}
