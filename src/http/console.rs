//! Headless host page.
//!
//! Stands in for a browser when the runtime runs as a standalone process:
//! every configured island selector resolves to one element, renders go to
//! the log, and declarative polling is a tokio interval task per island.

use crate::host::{HostPage, PollingSpec, RenderOp};
use crate::http::resolve_url;
use crate::mount::{ElementRef, Scope};
use crate::voice::VoicePresentation;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use reqwest::Url;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct ConsoleHost {
    client: reqwest::Client,
    base_url: String,
    /// Id of the container every island lives in
    container: String,
    elements: HashMap<String, ElementRef>,
    /// Fragment endpoint for each refreshable region
    regions: HashMap<String, String>,
    markers: HashSet<(ElementRef, String)>,
    toggles: HashMap<String, bool>,
    pollers: HashMap<ElementRef, JoinHandle<()>>,
    /// Last fragment swapped into each target id
    swapped: Arc<Mutex<HashMap<String, String>>>,
}

impl ConsoleHost {
    pub fn new<I>(
        client: reqwest::Client,
        base_url: impl Into<String>,
        container: impl Into<String>,
        selectors: I,
    ) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let elements = selectors
            .into_iter()
            .enumerate()
            .map(|(index, selector)| (selector, ElementRef(index as u64 + 1)))
            .collect();
        Self {
            client,
            base_url: base_url.into(),
            container: container.into(),
            elements,
            regions: HashMap::new(),
            markers: HashSet::new(),
            toggles: HashMap::new(),
            pollers: HashMap::new(),
            swapped: Arc::default(),
        }
    }

    /// Fetch `path` whenever region `region_id` is refreshed.
    pub fn with_region(mut self, region_id: impl Into<String>, path: impl Into<String>) -> Self {
        self.regions.insert(region_id.into(), path.into());
        self
    }

    pub fn set_toggle(&mut self, selector: impl Into<String>, checked: bool) {
        self.toggles.insert(selector.into(), checked);
    }

    pub fn is_polling(&self, element: &ElementRef) -> bool {
        self.pollers.contains_key(element)
    }

    /// The fragment most recently swapped into `target_id` by a refresh or poll.
    pub fn swapped_fragment(&self, target_id: &str) -> Option<String> {
        let swapped = self.swapped.lock().ok()?;
        swapped.get(target_id).cloned()
    }

    fn fetch_fragment(&self, target_id: &str, path: &str) {
        let url = match resolve_url(&self.base_url, path) {
            Ok(url) => url,
            Err(e) => {
                warn!(path, error = %e, "Cannot fetch fragment");
                return;
            }
        };
        let client = self.client.clone();
        let swapped = self.swapped.clone();
        let target_id = target_id.to_string();
        tokio::spawn(async move {
            swap_fragment(&client, url, &target_id, &swapped).await;
        });
    }
}

/// GET a fragment and swap it into `target_id`, logging it like a render.
async fn swap_fragment(
    client: &reqwest::Client,
    url: Url,
    target_id: &str,
    swapped: &Mutex<HashMap<String, String>>,
) {
    let response = match client
        .get(url.clone())
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
    {
        Ok(response) => response,
        Err(e) => {
            warn!(url = %url, swap_target = target_id, error = %e, "Fragment fetch failed");
            return;
        }
    };
    match response.text().await {
        Ok(html) => {
            info!(swap_target = target_id, html = %html, "Swap");
            if let Ok(mut swapped) = swapped.lock() {
                swapped.insert(target_id.to_string(), html);
            }
        }
        Err(e) => warn!(
            url = %url,
            swap_target = target_id,
            error = %e,
            "Fragment body unreadable"
        ),
    }
}

impl Drop for ConsoleHost {
    fn drop(&mut self) {
        for (_, poller) in self.pollers.drain() {
            poller.abort();
        }
    }
}

impl HostPage for ConsoleHost {
    fn query(&self, scope: &Scope, selector: &str) -> Option<ElementRef> {
        let element = self.elements.get(selector).copied()?;
        match scope {
            Scope::Document => Some(element),
            Scope::Subtree(root) if *root == element => Some(element),
            Scope::Subtree(_) => None,
        }
    }

    fn has_marker(&self, element: &ElementRef, marker: &str) -> bool {
        self.markers.contains(&(*element, marker.to_string()))
    }

    fn set_marker(&mut self, element: &ElementRef, marker: &str) {
        self.markers.insert((*element, marker.to_string()));
    }

    fn within_region(&self, _element: &ElementRef, region_id: &str) -> bool {
        region_id == self.container
    }

    fn apply(&mut self, element: &ElementRef, op: RenderOp) {
        match op {
            RenderOp::Replace(html) => info!(element = element.0, html = %html, "Render"),
            RenderOp::Append(text) => info!(element = element.0, text = %text, "Append"),
        }
    }

    fn set_status(&mut self, element: &ElementRef, status: &str) {
        info!(element = element.0, status, "Status");
    }

    fn present_voice(&mut self, element: &ElementRef, view: &VoicePresentation) {
        info!(
            element = element.0,
            button = view.button_label,
            disabled = view.button_disabled,
            status = view.status,
            error = view.error.as_deref().unwrap_or(""),
            "Voice"
        );
    }

    fn toggle_checked(&self, _element: &ElementRef, selector: &str) -> bool {
        self.toggles.get(selector).copied().unwrap_or(false)
    }

    fn refresh_region(&mut self, region_id: &str) {
        match self.regions.get(region_id) {
            Some(path) => self.fetch_fragment(region_id, path),
            None => debug!(region_id, "No fragment endpoint for region"),
        }
    }

    fn switch_to_polling(&mut self, element: &ElementRef, spec: &PollingSpec) {
        self.cancel_polling(element);
        let url = match resolve_url(&self.base_url, &spec.path) {
            Ok(url) => url,
            Err(e) => {
                warn!(element = element.0, error = %e, "Cannot poll");
                return;
            }
        };

        let client = self.client.clone();
        let swapped = self.swapped.clone();
        let period = spec.interval;
        let target_id = spec.target.clone();
        let poller = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                swap_fragment(&client, url.clone(), &target_id, &swapped).await;
            }
        });
        info!(
            element = element.0,
            trigger = %spec.trigger(),
            path = %spec.path,
            swap_target = %spec.target_selector(),
            "Polling started"
        );
        self.pollers.insert(*element, poller);
    }

    fn cancel_polling(&mut self, element: &ElementRef) {
        if let Some(poller) = self.pollers.remove(element) {
            poller.abort();
            debug!(element = element.0, "Polling cancelled");
        }
    }
}
