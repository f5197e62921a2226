//! The slice of a host document the loader touches.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub type NodeId = usize;
pub type ListenerId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    Body,
    Node(NodeId),
}

/// Element to create: tag, optional id, attributes and inline style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementSpec {
    pub tag: String,
    pub id: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub style: Vec<(String, String)>,
    pub text: Option<String>,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.push((name.to_string(), value.into()));
        self
    }

    pub fn style(mut self, property: &str, value: impl Into<String>) -> Self {
        self.style.push((property.to_string(), value.into()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }
}

/// DOM operations the loader needs from the page that embeds it.
pub trait HostPage {
    fn element_by_id(&self, id: &str) -> Option<NodeId>;
    fn create_element(&mut self, parent: Parent, spec: ElementSpec) -> NodeId;
    fn set_style(&mut self, node: NodeId, property: &str, value: &str);
    fn remove(&mut self, node: NodeId);
    /// `postMessage` into the frame's content window.
    fn post_message(&mut self, frame: NodeId, message: Value, target_origin: &str);
    fn add_message_listener(&mut self) -> ListenerId;
    fn remove_message_listener(&mut self, listener: ListenerId);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub id: Option<String>,
    pub parent: Parent,
    pub attributes: BTreeMap<String, String>,
    pub style: BTreeMap<String, String>,
    pub text: Option<String>,
}

impl Element {
    pub fn style(&self, property: &str) -> Option<&str> {
        self.style.get(property).map(String::as_str)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub frame: NodeId,
    pub message: Value,
    pub target_origin: String,
}

/// Headless page that records everything done to it.
#[derive(Debug, Default)]
pub struct InMemoryPage {
    nodes: BTreeMap<NodeId, Element>,
    next_node: NodeId,
    listeners: BTreeSet<ListenerId>,
    next_listener: ListenerId,
    posted: Vec<PostedMessage>,
}

impl InMemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(&node)
    }

    pub fn count_tag(&self, tag: &str) -> usize {
        self.nodes.values().filter(|e| e.tag == tag).count()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn posted(&self) -> &[PostedMessage] {
        &self.posted
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn remove_subtree(&mut self, node: NodeId) {
        let children: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, e)| e.parent == Parent::Node(node))
            .map(|(id, _)| *id)
            .collect();
        for child in children {
            self.remove_subtree(child);
        }
        self.nodes.remove(&node);
    }
}

impl HostPage for InMemoryPage {
    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, e)| e.id.as_deref() == Some(id))
            .map(|(node, _)| *node)
    }

    fn create_element(&mut self, parent: Parent, spec: ElementSpec) -> NodeId {
        let node = self.next_node;
        self.next_node += 1;
        self.nodes.insert(
            node,
            Element {
                tag: spec.tag,
                id: spec.id,
                parent,
                attributes: spec.attributes.into_iter().collect(),
                style: spec.style.into_iter().collect(),
                text: spec.text,
            },
        );
        node
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        if let Some(element) = self.nodes.get_mut(&node) {
            element
                .style
                .insert(property.to_string(), value.to_string());
        }
    }

    fn remove(&mut self, node: NodeId) {
        self.remove_subtree(node);
    }

    fn post_message(&mut self, frame: NodeId, message: Value, target_origin: &str) {
        // A detached frame has no content window; the message is lost.
        if self.nodes.contains_key(&frame) {
            self.posted.push(PostedMessage {
                frame,
                message,
                target_origin: target_origin.to_string(),
            });
        }
    }

    fn add_message_listener(&mut self) -> ListenerId {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.insert(id);
        id
    }

    fn remove_message_listener(&mut self, listener: ListenerId) {
        self.listeners.remove(&listener);
    }
}
