//! In-process document with a head and a body.
//!
//! Keeps small indices (tag, attributes, parent/child links) for the elements
//! the loader injects and mirrors every change as [`DOMUpdate`] batches to
//! subscribers. Element `load`/`error` events are produced by fetching the
//! element's `src`/`href` through a [`Fetcher`].

use super::{CrossOrigin, DOMUpdate, Document, InsertionPoint, NodeKey};
use crate::net::Fetcher;
use futures::FutureExt as _;
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use url::Url;

const UPDATE_CAPACITY: usize = 256;

/// Mutable indices behind a [`MemoryDocument`].
#[derive(Debug)]
struct MemoryDocumentState {
    /// Node -> lowercase tag name.
    tag_by_key: HashMap<NodeKey, String>,
    /// Node -> attributes, names lowercased.
    attrs_by_key: HashMap<NodeKey, BTreeMap<String, String>>,
    /// Parent -> children in insertion order.
    children_by_parent: HashMap<NodeKey, Vec<NodeKey>>,
    /// Child -> parent, present only for attached nodes.
    parent_by_child: HashMap<NodeKey, NodeKey>,
    /// Font faces added to the registry, in registration order.
    fonts: Vec<Url>,
    next_key: u64,
}

impl Default for MemoryDocumentState {
    fn default() -> Self {
        let mut state = Self {
            tag_by_key: HashMap::new(),
            attrs_by_key: HashMap::new(),
            children_by_parent: HashMap::new(),
            parent_by_child: HashMap::new(),
            fonts: Vec::new(),
            next_key: NodeKey::BODY.0 + 1,
        };
        state.tag_by_key.insert(NodeKey::ROOT, String::from("html"));
        for (node, tag) in [(NodeKey::HEAD, "head"), (NodeKey::BODY, "body")] {
            state.tag_by_key.insert(node, String::from(tag));
            state.parent_by_child.insert(node, NodeKey::ROOT);
            state
                .children_by_parent
                .entry(NodeKey::ROOT)
                .or_default()
                .push(node);
        }
        state
    }
}

impl MemoryDocumentState {
    fn allocate(&mut self) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key = self.next_key.wrapping_add(1);
        key
    }

    fn is_attached(&self, node: NodeKey) -> bool {
        self.parent_by_child.contains_key(&node)
    }

    fn url_of(&self, node: NodeKey) -> Option<&String> {
        let attrs = self.attrs_by_key.get(&node)?;
        attrs.get("src").or_else(|| attrs.get("href"))
    }

    /// Remove a node (and its descendants) from all indices.
    fn remove_recursively(&mut self, node: NodeKey) {
        if let Some(children) = self.children_by_parent.remove(&node) {
            for child in children {
                self.remove_recursively(child);
            }
        }
        if let Some(parent) = self.parent_by_child.remove(&node) {
            if let Some(siblings) = self.children_by_parent.get_mut(&parent) {
                siblings.retain(|sibling| *sibling != node);
            }
        }
        self.tag_by_key.remove(&node);
        self.attrs_by_key.remove(&node);
    }
}

/// In-memory [`Document`] implementation.
pub struct MemoryDocument {
    base_url: Url,
    fetcher: Arc<dyn Fetcher>,
    state: Mutex<MemoryDocumentState>,
    ready: watch::Sender<bool>,
    updates: broadcast::Sender<Vec<DOMUpdate>>,
}

impl MemoryDocument {
    /// Create a document that is already interactively ready.
    #[must_use]
    pub fn new(base_url: Url, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_ready_state(base_url, fetcher, true)
    }

    /// Create a document that is still loading; scripts waiting for readiness
    /// stay parked until [`MemoryDocument::mark_ready`] is called.
    #[must_use]
    pub fn loading(base_url: Url, fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_ready_state(base_url, fetcher, false)
    }

    fn with_ready_state(base_url: Url, fetcher: Arc<dyn Fetcher>, ready: bool) -> Self {
        let (ready, _) = watch::channel(ready);
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            base_url,
            fetcher,
            state: Mutex::new(MemoryDocumentState::default()),
            ready,
            updates,
        }
    }

    /// Flip the document to interactively ready, releasing deferred scripts.
    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    /// Receive every change applied to the document from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<DOMUpdate>> {
        self.updates.subscribe()
    }

    /// Attached elements with the given tag, in insertion order (head first).
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeKey> {
        let tag = tag.to_ascii_lowercase();
        let state = self.lock();
        attached_elements(&state)
            .into_iter()
            .filter(|node| state.tag_by_key.get(node) == Some(&tag))
            .collect()
    }

    /// Value of an attribute on an element.
    pub fn attribute(&self, element: NodeKey, name: &str) -> Option<String> {
        self.lock()
            .attrs_by_key
            .get(&element)
            .and_then(|attrs| attrs.get(&name.to_ascii_lowercase()))
            .cloned()
    }

    /// Whether the element is currently attached under head or body.
    pub fn parent_of(&self, element: NodeKey) -> Option<InsertionPoint> {
        match self.lock().parent_by_child.get(&element) {
            Some(&NodeKey::HEAD) => Some(InsertionPoint::Head),
            Some(&NodeKey::BODY) => Some(InsertionPoint::Body),
            _ => None,
        }
    }

    /// Font faces in the registry.
    pub fn fonts(&self) -> Vec<Url> {
        self.lock().fonts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryDocumentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, batch: Vec<DOMUpdate>) {
        // Nobody listening is fine.
        drop(self.updates.send(batch));
    }

    fn resolve(&self, url: &str) -> Result<Url, String> {
        self.base_url
            .join(url)
            .map_err(|err| format!("invalid URL {url}: {err}"))
    }

    fn fetch_ok(&self, url: Url) -> BoxFuture<'static, Result<(), String>> {
        let fetch = self.fetcher.fetch(&url);
        async move {
            let response = fetch.await.map_err(|err| format!("{err:#}"))?;
            if response.is_success() {
                Ok(())
            } else {
                Err(format!("HTTP error! status: {}", response.status))
            }
        }
        .boxed()
    }
}

/// Children of head then body.
fn attached_elements(state: &MemoryDocumentState) -> Vec<NodeKey> {
    [NodeKey::HEAD, NodeKey::BODY]
        .iter()
        .filter_map(|parent| state.children_by_parent.get(parent))
        .flatten()
        .copied()
        .collect()
}

impl Document for MemoryDocument {
    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    fn ready(&self) -> BoxFuture<'static, ()> {
        let mut receiver = self.ready.subscribe();
        async move {
            loop {
                let is_ready = *receiver.borrow_and_update();
                if is_ready || receiver.changed().await.is_err() {
                    return;
                }
            }
        }
        .boxed()
    }

    fn find_by_url(&self, url: &str) -> Vec<NodeKey> {
        let state = self.lock();
        attached_elements(&state)
            .into_iter()
            .filter(|node| state.url_of(*node).is_some_and(|value| value == url))
            .collect()
    }

    fn create_element(&self, tag: &str) -> NodeKey {
        let mut state = self.lock();
        let node = state.allocate();
        state.tag_by_key.insert(node, tag.to_ascii_lowercase());
        state.attrs_by_key.insert(node, BTreeMap::new());
        node
    }

    fn set_attribute(&self, element: NodeKey, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let attached = {
            let mut state = self.lock();
            let Some(attrs) = state.attrs_by_key.get_mut(&element) else {
                return;
            };
            attrs.insert(name.clone(), value.to_owned());
            state.is_attached(element)
        };
        if attached {
            self.publish(vec![DOMUpdate::SetAttr {
                node: element,
                name,
                value: value.to_owned(),
            }]);
        }
    }

    fn append(&self, element: NodeKey, parent: InsertionPoint) {
        let parent_key = parent.node();
        let batch = {
            let mut state = self.lock();
            let Some(tag) = state.tag_by_key.get(&element).cloned() else {
                return;
            };
            if state.is_attached(element) {
                return;
            }
            state.parent_by_child.insert(element, parent_key);
            let children = state.children_by_parent.entry(parent_key).or_default();
            children.push(element);
            let pos = children.len() - 1;
            let mut batch = vec![DOMUpdate::InsertElement {
                parent: parent_key,
                node: element,
                tag,
                pos,
            }];
            if let Some(attrs) = state.attrs_by_key.get(&element) {
                batch.extend(attrs.iter().map(|(name, value)| DOMUpdate::SetAttr {
                    node: element,
                    name: name.clone(),
                    value: value.clone(),
                }));
            }
            batch
        };
        self.publish(batch);
    }

    fn remove(&self, element: NodeKey) -> bool {
        if matches!(element, NodeKey::ROOT | NodeKey::HEAD | NodeKey::BODY) {
            return false;
        }
        let attached = {
            let mut state = self.lock();
            if !state.tag_by_key.contains_key(&element) {
                return false;
            }
            let attached = state.is_attached(element);
            state.remove_recursively(element);
            attached
        };
        if attached {
            self.publish(vec![DOMUpdate::RemoveNode { node: element }]);
        }
        true
    }

    fn element_loaded(&self, element: NodeKey) -> BoxFuture<'static, Result<(), String>> {
        let target = self.lock().url_of(element).cloned();
        let resolved = target
            .ok_or_else(|| String::from("element has no src or href"))
            .and_then(|url| self.resolve(&url));
        match resolved {
            Ok(url) => self.fetch_ok(url),
            Err(err) => async move { Err::<(), String>(err) }.boxed(),
        }
    }

    fn load_font(
        &self,
        url: &Url,
        _cross_origin: Option<CrossOrigin>,
    ) -> BoxFuture<'static, Result<(), String>> {
        self.fetch_ok(url.clone())
    }

    fn register_font(&self, url: &Url) {
        let mut state = self.lock();
        if !state.fonts.contains(url) {
            state.fonts.push(url.clone());
        }
    }
}
