//! In-memory fakes for every platform port.
//!
//! Each fake is a cheap handle over shared state, so a test keeps one clone
//! for assertions and hands another to the code under test.

use crate::config::RuntimeConfig;
use crate::error::{RuntimeError, RuntimeResult};
use crate::host::{HostPage, PollingSpec, RenderOp};
use crate::mount::{ElementRef, Island, IslandId, IslandSpec, Scope};
use crate::transport::source::{Generation, PushStreamSource, StreamHandle, StreamTarget};
use crate::voice::devices::{MediaDevices, Uploader};
use crate::voice::mime::MimeType;
use crate::voice::upload::UploadRequest;
use crate::voice::VoicePresentation;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

struct Node {
    selector: String,
    parent: Option<ElementRef>,
    markers: HashSet<String>,
    attached: bool,
}

#[derive(Default)]
struct PageState {
    next_id: u64,
    nodes: HashMap<ElementRef, Node>,
    toggles: HashMap<String, bool>,
    marker_writes: usize,
    statuses: Vec<(ElementRef, String)>,
    applied: Vec<(ElementRef, RenderOp)>,
    voice: Vec<(ElementRef, VoicePresentation)>,
    refreshes: Vec<String>,
    polling: Vec<(ElementRef, PollingSpec)>,
    cancelled: Vec<ElementRef>,
}

impl PageState {
    fn is_attached(&self, element: ElementRef) -> bool {
        let mut current = Some(element);
        while let Some(el) = current {
            match self.nodes.get(&el) {
                Some(node) if node.attached => current = node.parent,
                _ => return false,
            }
        }
        true
    }

    /// `element` itself or any of its ancestors satisfies `pred`.
    fn lineage_any(&self, element: ElementRef, pred: impl Fn(ElementRef, &Node) -> bool) -> bool {
        let mut current = Some(element);
        while let Some(el) = current {
            let Some(node) = self.nodes.get(&el) else {
                return false;
            };
            if pred(el, node) {
                return true;
            }
            current = node.parent;
        }
        false
    }
}

/// A tiny element tree with recorded side effects.
#[derive(Clone, Default)]
pub struct FakePage {
    state: Rc<RefCell<PageState>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_element(&self, selector: &str, parent: Option<ElementRef>) -> ElementRef {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let element = ElementRef(state.next_id);
        state.nodes.insert(
            element,
            Node {
                selector: selector.to_string(),
                parent,
                markers: HashSet::new(),
                attached: true,
            },
        );
        element
    }

    /// A container element with id `region_id`.
    pub fn add_region(&self, region_id: &str, parent: Option<ElementRef>) -> ElementRef {
        self.add_element(&format!("#{}", region_id), parent)
    }

    /// Remove an element (and so its subtree) from the page.
    pub fn detach(&self, element: ElementRef) {
        if let Some(node) = self.state.borrow_mut().nodes.get_mut(&element) {
            node.attached = false;
        }
    }

    pub fn set_toggle(&self, selector: &str, checked: bool) {
        self.state
            .borrow_mut()
            .toggles
            .insert(selector.to_string(), checked);
    }

    pub fn marker_writes(&self) -> usize {
        self.state.borrow().marker_writes
    }

    pub fn statuses(&self, element: ElementRef) -> Vec<String> {
        self.state
            .borrow()
            .statuses
            .iter()
            .filter(|(el, _)| *el == element)
            .map(|(_, status)| status.clone())
            .collect()
    }

    pub fn last_status(&self, element: ElementRef) -> Option<String> {
        self.statuses(element).pop()
    }

    pub fn applied(&self) -> Vec<(ElementRef, RenderOp)> {
        self.state.borrow().applied.clone()
    }

    pub fn last_voice(&self, element: ElementRef) -> Option<VoicePresentation> {
        self.state
            .borrow()
            .voice
            .iter()
            .rev()
            .find(|(el, _)| *el == element)
            .map(|(_, view)| view.clone())
    }

    pub fn refreshes(&self) -> Vec<String> {
        self.state.borrow().refreshes.clone()
    }

    pub fn polling(&self) -> Vec<(ElementRef, PollingSpec)> {
        self.state.borrow().polling.clone()
    }

    pub fn cancelled_polling(&self) -> Vec<ElementRef> {
        self.state.borrow().cancelled.clone()
    }
}

impl HostPage for FakePage {
    fn query(&self, scope: &Scope, selector: &str) -> Option<ElementRef> {
        let state = self.state.borrow();
        let mut matches: Vec<ElementRef> = state
            .nodes
            .iter()
            .filter(|(el, node)| node.selector == selector && state.is_attached(**el))
            .map(|(el, _)| *el)
            .filter(|el| match scope {
                Scope::Document => true,
                Scope::Subtree(root) => state.lineage_any(*el, |candidate, _| candidate == *root),
            })
            .collect();
        matches.sort_by_key(|el| el.0);
        matches.first().copied()
    }

    fn has_marker(&self, element: &ElementRef, marker: &str) -> bool {
        self.state
            .borrow()
            .nodes
            .get(element)
            .is_some_and(|node| node.markers.contains(marker))
    }

    fn set_marker(&mut self, element: &ElementRef, marker: &str) {
        let mut state = self.state.borrow_mut();
        state.marker_writes += 1;
        if let Some(node) = state.nodes.get_mut(element) {
            node.markers.insert(marker.to_string());
        }
    }

    fn within_region(&self, element: &ElementRef, region_id: &str) -> bool {
        let selector = format!("#{}", region_id);
        self.state
            .borrow()
            .lineage_any(*element, |_, node| node.selector == selector)
    }

    fn apply(&mut self, element: &ElementRef, op: RenderOp) {
        self.state.borrow_mut().applied.push((*element, op));
    }

    fn set_status(&mut self, element: &ElementRef, status: &str) {
        self.state
            .borrow_mut()
            .statuses
            .push((*element, status.to_string()));
    }

    fn present_voice(&mut self, element: &ElementRef, view: &VoicePresentation) {
        self.state.borrow_mut().voice.push((*element, view.clone()));
    }

    fn toggle_checked(&self, _element: &ElementRef, selector: &str) -> bool {
        self.state
            .borrow()
            .toggles
            .get(selector)
            .copied()
            .unwrap_or(false)
    }

    fn refresh_region(&mut self, region_id: &str) {
        self.state.borrow_mut().refreshes.push(region_id.to_string());
    }

    fn switch_to_polling(&mut self, element: &ElementRef, spec: &PollingSpec) {
        self.state.borrow_mut().polling.push((*element, spec.clone()));
    }

    fn cancel_polling(&mut self, element: &ElementRef) {
        self.state.borrow_mut().cancelled.push(*element);
    }
}

#[derive(Default)]
struct SourceState {
    supports_push: bool,
    fail_next: bool,
    opened: Vec<(IslandId, Generation, StreamTarget)>,
    closed: Vec<Generation>,
}

/// Push-stream source that records opens and closes.
#[derive(Clone)]
pub struct FakeSource {
    state: Rc<RefCell<SourceState>>,
}

impl FakeSource {
    pub fn new(supports_push: bool) -> Self {
        Self {
            state: Rc::new(RefCell::new(SourceState {
                supports_push,
                ..SourceState::default()
            })),
        }
    }

    pub fn fail_next_open(&self) {
        self.state.borrow_mut().fail_next = true;
    }

    pub fn opened(&self) -> Vec<(IslandId, Generation, StreamTarget)> {
        self.state.borrow().opened.clone()
    }

    pub fn closed(&self) -> Vec<Generation> {
        self.state.borrow().closed.clone()
    }
}

struct FakeHandle {
    generation: Generation,
    state: Rc<RefCell<SourceState>>,
}

impl StreamHandle for FakeHandle {
    fn close(&mut self) {
        self.state.borrow_mut().closed.push(self.generation);
    }
}

impl PushStreamSource for FakeSource {
    fn supports_push(&self) -> bool {
        self.state.borrow().supports_push
    }

    fn open(
        &mut self,
        island: &IslandId,
        generation: Generation,
        target: &StreamTarget,
    ) -> RuntimeResult<Box<dyn StreamHandle>> {
        let mut state = self.state.borrow_mut();
        if std::mem::take(&mut state.fail_next) {
            return Err(RuntimeError::Transport("connection refused".to_string()));
        }
        state
            .opened
            .push((island.clone(), generation, target.clone()));
        Ok(Box::new(FakeHandle {
            generation,
            state: Rc::clone(&self.state),
        }))
    }
}

#[derive(Default)]
struct DeviceState {
    capture_supported: bool,
    supported_types: Vec<String>,
    default_type: Option<String>,
    fail_request: bool,
    requests: Vec<(IslandId, String, MimeType)>,
    stops: Vec<String>,
    releases: Vec<String>,
}

/// Capture device that records requests, stops and releases.
#[derive(Clone)]
pub struct FakeDevices {
    state: Rc<RefCell<DeviceState>>,
}

impl FakeDevices {
    pub fn new(supported_types: &[&str]) -> Self {
        Self {
            state: Rc::new(RefCell::new(DeviceState {
                capture_supported: true,
                supported_types: supported_types.iter().map(|t| t.to_string()).collect(),
                ..DeviceState::default()
            })),
        }
    }

    /// A platform without any capture API.
    pub fn unsupported() -> Self {
        let devices = Self::new(&[]);
        devices.state.borrow_mut().capture_supported = false;
        devices
    }

    pub fn with_default_type(self, mime_type: &str) -> Self {
        self.state.borrow_mut().default_type = Some(mime_type.to_string());
        self
    }

    pub fn fail_request(&self) {
        self.state.borrow_mut().fail_request = true;
    }

    pub fn requests(&self) -> Vec<(IslandId, String, MimeType)> {
        self.state.borrow().requests.clone()
    }

    pub fn stops(&self) -> Vec<String> {
        self.state.borrow().stops.clone()
    }

    pub fn releases(&self) -> Vec<String> {
        self.state.borrow().releases.clone()
    }
}

impl MediaDevices for FakeDevices {
    fn capture_supported(&self) -> bool {
        self.state.borrow().capture_supported
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.state
            .borrow()
            .supported_types
            .iter()
            .any(|t| t == mime_type)
    }

    fn default_mime_type(&self) -> Option<String> {
        self.state.borrow().default_type.clone()
    }

    fn request_capture(
        &mut self,
        island: &IslandId,
        correlation_id: &str,
        mime_type: &MimeType,
    ) -> RuntimeResult<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_request {
            return Err(RuntimeError::PermissionDenied("no input device".to_string()));
        }
        state
            .requests
            .push((island.clone(), correlation_id.to_string(), mime_type.clone()));
        Ok(())
    }

    fn stop_capture(&mut self, _island: &IslandId, correlation_id: &str) {
        self.state
            .borrow_mut()
            .stops
            .push(correlation_id.to_string());
    }

    fn release(&mut self, _island: &IslandId, correlation_id: &str) {
        self.state
            .borrow_mut()
            .releases
            .push(correlation_id.to_string());
    }
}

#[derive(Default)]
struct UploaderState {
    submitted: Vec<(IslandId, UploadRequest)>,
    fail_next: bool,
}

/// Uploader that keeps every submitted request.
#[derive(Clone, Default)]
pub struct FakeUploader {
    state: Rc<RefCell<UploaderState>>,
}

impl FakeUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.state.borrow_mut().fail_next = true;
    }

    pub fn submitted(&self) -> Vec<(IslandId, UploadRequest)> {
        self.state.borrow().submitted.clone()
    }
}

impl Uploader for FakeUploader {
    fn submit(&mut self, island: &IslandId, request: UploadRequest) -> RuntimeResult<()> {
        let mut state = self.state.borrow_mut();
        if std::mem::take(&mut state.fail_next) {
            return Err(RuntimeError::Transport("uploader offline".to_string()));
        }
        state.submitted.push((island.clone(), request));
        Ok(())
    }
}

fn default_spec(kind: &str) -> IslandSpec {
    RuntimeConfig::default()
        .island_specs()
        .into_iter()
        .find(|spec| spec.kind.as_str() == kind)
        .expect("default config registers every island kind")
}

fn island_on(page: &FakePage, kind: &str) -> Island {
    let spec = default_spec(kind);
    let root = page.add_element(&spec.selector, None);
    Island::new(spec, root)
}

pub fn presence_island(page: &FakePage) -> Island {
    island_on(page, "presence")
}

pub fn reply_island(page: &FakePage) -> Island {
    island_on(page, "reply")
}

pub fn voice_island(page: &FakePage) -> Island {
    island_on(page, "voice")
}
