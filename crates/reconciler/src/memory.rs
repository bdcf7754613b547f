//! In-memory host tree.
//!
//! [`MemoryHost`] is a complete [`HostBinder`] backed by a node table. It
//! records every mutation it receives, can print or snapshot any subtree,
//! dispatches events to registered handlers, and can be told to fail on
//! selected operations.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use itertools::Itertools;
use serde::Serialize;
use tendril_core::{Description, ElementType, Error, Handler, PropValue, Result};
use tracing::debug;

use crate::host::{default_event_name, HostBinder};

/// Handle to a node owned by a [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One mutation received by a [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    Create {
        node: NodeId,
        kind: String,
    },
    Insert {
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    },
    Remove {
        parent: NodeId,
        child: NodeId,
    },
    SetProperty {
        node: NodeId,
        key: String,
        value: PropValue,
    },
    ClearProperty {
        node: NodeId,
        key: String,
    },
    AddHandler {
        node: NodeId,
        event: String,
    },
    RemoveHandler {
        node: NodeId,
        event: String,
    },
}

impl Mutation {
    /// Node the mutation targets (the child for structural mutations).
    pub const fn node(&self) -> NodeId {
        match self {
            Self::Create { node, .. }
            | Self::SetProperty { node, .. }
            | Self::ClearProperty { node, .. }
            | Self::AddHandler { node, .. }
            | Self::RemoveHandler { node, .. } => *node,
            Self::Insert { child, .. } | Self::Remove { child, .. } => *child,
        }
    }

    /// Whether the mutation changes the shape of the tree.
    pub const fn is_structural(&self) -> bool {
        matches!(self, Self::Create { .. } | Self::Insert { .. } | Self::Remove { .. })
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { node, kind } => write!(f, "create {node} <{kind}>"),
            Self::Insert {
                parent,
                child,
                before: Some(before),
            } => write!(f, "insert {child} into {parent} before {before}"),
            Self::Insert {
                parent,
                child,
                before: None,
            } => write!(f, "append {child} to {parent}"),
            Self::Remove { parent, child } => write!(f, "remove {child} from {parent}"),
            Self::SetProperty { node, key, value } => write!(f, "set {node}.{key} = {value:?}"),
            Self::ClearProperty { node, key } => write!(f, "clear {node}.{key}"),
            Self::AddHandler { node, event } => write!(f, "listen {node} @{event}"),
            Self::RemoveHandler { node, event } => write!(f, "unlisten {node} @{event}"),
        }
    }
}

/// Serializable view of a host subtree. Node ids are left out so
/// snapshots of different hosts compare equal when their trees do.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostSnapshot {
    pub kind: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, PropValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<HostSnapshot>,
}

impl HostSnapshot {
    /// The snapshot a fully committed render of `description` produces
    /// under the default event naming convention.
    pub fn of_description(description: &Description) -> Self {
        let mut props = BTreeMap::new();
        let mut events = BTreeSet::new();
        for (key, value) in description.props().iter() {
            match (value.as_handler(), default_event_name(key)) {
                (Some(_), Some(event)) => {
                    events.insert(event);
                }
                _ => {
                    props.insert(key.to_string(), value.clone());
                }
            }
        }
        Self {
            kind: description.kind().to_string(),
            props,
            events: events.into_iter().collect(),
            children: description.children().iter().map(Self::of_description).collect(),
        }
    }
}

#[derive(Debug, Default)]
struct HostNode {
    kind: String,
    props: BTreeMap<String, PropValue>,
    handlers: BTreeMap<String, Vec<Handler>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Host tree kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: Vec<HostNode>,
    mutations: Vec<Mutation>,
    fail_create: BTreeSet<String>,
    fail_property: BTreeSet<String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached container to mount renders into. Not logged as a
    /// mutation.
    pub fn create_container(&mut self, kind: &str) -> NodeId {
        self.alloc(kind)
    }

    /// Make `create_node` fail for the given type tag.
    pub fn fail_on_create(&mut self, kind: impl Into<String>) {
        self.fail_create.insert(kind.into());
    }

    /// Make `set_property` fail for the given key.
    pub fn fail_on_property(&mut self, key: impl Into<String>) {
        self.fail_property.insert(key.into());
    }

    pub fn clear_failures(&mut self) {
        self.fail_create.clear();
        self.fail_property.clear();
    }

    /// Mutations received so far.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Drain the mutation log.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.mutations)
    }

    /// Number of nodes ever created, containers included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn kind(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|entry| entry.kind.as_str())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|entry| entry.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|entry| entry.children.as_slice())
            .unwrap_or_default()
    }

    pub fn property(&self, node: NodeId, key: &str) -> Option<&PropValue> {
        self.nodes.get(node.0).and_then(|entry| entry.props.get(key))
    }

    /// Handlers registered for an event, in registration order.
    pub fn handlers(&self, node: NodeId, event: &str) -> &[Handler] {
        self.nodes
            .get(node.0)
            .and_then(|entry| entry.handlers.get(event))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First node of the given kind in a subtree, in document order.
    pub fn find(&self, root: NodeId, kind: &str) -> Option<NodeId> {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.kind(node) == Some(kind) {
                return Some(node);
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        None
    }

    /// Concatenated text of every text node in a subtree.
    pub fn text_content(&self, root: NodeId) -> String {
        let mut text = String::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.kind(node) == Some(ElementType::TEXT_TAG) {
                if let Some(value) = self.property(node, tendril_core::TEXT_VALUE_KEY) {
                    text.push_str(&value.to_string());
                }
            }
            stack.extend(self.children(node).iter().rev().copied());
        }
        text
    }

    /// Invoke every handler registered for `event` on `node`. Returns the
    /// number of handlers called.
    pub fn dispatch(&self, node: NodeId, event: &str, payload: &PropValue) -> usize {
        let handlers = self.handlers(node, event).to_vec();
        debug!(node = %node, event, handlers = handlers.len(), "dispatching event");
        handlers.iter().for_each(|handler| handler.call(payload));
        handlers.len()
    }

    /// Snapshot a subtree, or `None` if the node does not exist.
    pub fn snapshot(&self, node: NodeId) -> Option<HostSnapshot> {
        let entry = self.nodes.get(node.0)?;
        let events = entry
            .handlers
            .iter()
            .filter(|(_, handlers)| !handlers.is_empty())
            .map(|(event, _)| event.clone())
            .collect();
        let children = entry
            .children
            .iter()
            .filter_map(|&child| self.snapshot(child))
            .collect();
        Some(HostSnapshot {
            kind: entry.kind.clone(),
            props: entry.props.clone(),
            events,
            children,
        })
    }

    /// Print a subtree, one node per line, indented by depth.
    pub fn render_tree(&self, root: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![(root, 0_usize)];
        while let Some((node, depth)) = stack.pop() {
            let Some(entry) = self.nodes.get(node.0) else {
                continue;
            };
            out.push_str(&"  ".repeat(depth));
            out.push_str(&Self::render_line(entry));
            out.push('\n');
            let depth = depth.saturating_add(1);
            stack.extend(entry.children.iter().rev().map(|&child| (child, depth)));
        }
        out
    }

    fn render_line(entry: &HostNode) -> String {
        if entry.kind == ElementType::TEXT_TAG {
            let value = entry
                .props
                .get(tendril_core::TEXT_VALUE_KEY)
                .map(ToString::to_string)
                .unwrap_or_default();
            return format!("{value:?}");
        }
        let attributes = entry
            .props
            .iter()
            .map(|(key, value)| format!(" {key}={:?}", value.to_string()))
            .chain(
                entry
                    .handlers
                    .iter()
                    .filter(|(_, handlers)| !handlers.is_empty())
                    .map(|(event, _)| format!(" @{event}")),
            )
            .join("");
        format!("<{}{attributes}>", entry.kind)
    }

    fn alloc(&mut self, kind: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(HostNode {
            kind: kind.to_string(),
            ..HostNode::default()
        });
        id
    }

    fn node_mut(&mut self, node: NodeId, operation: &str) -> Result<&mut HostNode> {
        self.nodes
            .get_mut(node.0)
            .ok_or_else(|| Error::host_failed(operation, format!("unknown node {node}")))
    }

    fn check(&self, node: NodeId, operation: &str) -> Result<&HostNode> {
        self.nodes
            .get(node.0)
            .ok_or_else(|| Error::host_failed(operation, format!("unknown node {node}")))
    }
}

impl HostBinder for MemoryHost {
    type Node = NodeId;

    fn create_node(&mut self, kind: &ElementType) -> Result<NodeId> {
        if self.fail_create.contains(kind.as_str()) {
            return Err(Error::host_failed(
                "create_node",
                format!("cannot create '{kind}'"),
            ));
        }
        let node = self.alloc(kind.as_str());
        self.mutations.push(Mutation::Create {
            node,
            kind: kind.to_string(),
        });
        Ok(node)
    }

    fn insert(&mut self, parent: &NodeId, child: &NodeId, before: Option<&NodeId>) -> Result<()> {
        if self.check(*child, "insert")?.parent.is_some() {
            return Err(Error::host_failed(
                "insert",
                format!("node {child} is already attached"),
            ));
        }
        let siblings = &self.check(*parent, "insert")?.children;
        let position = match before {
            None => siblings.len(),
            Some(anchor) => siblings
                .iter()
                .position(|candidate| candidate == anchor)
                .ok_or_else(|| {
                    Error::host_failed("insert", format!("{anchor} is not a child of {parent}"))
                })?,
        };
        self.node_mut(*parent, "insert")?
            .children
            .insert(position, *child);
        self.node_mut(*child, "insert")?.parent = Some(*parent);
        self.mutations.push(Mutation::Insert {
            parent: *parent,
            child: *child,
            before: before.copied(),
        });
        Ok(())
    }

    fn remove(&mut self, parent: &NodeId, child: &NodeId) -> Result<()> {
        let siblings = &mut self.node_mut(*parent, "remove")?.children;
        let position = siblings
            .iter()
            .position(|candidate| candidate == child)
            .ok_or_else(|| {
                Error::host_failed("remove", format!("{child} is not a child of {parent}"))
            })?;
        siblings.remove(position);
        self.node_mut(*child, "remove")?.parent = None;
        self.mutations.push(Mutation::Remove {
            parent: *parent,
            child: *child,
        });
        Ok(())
    }

    fn set_property(&mut self, node: &NodeId, key: &str, value: &PropValue) -> Result<()> {
        if self.fail_property.contains(key) {
            return Err(Error::host_failed(
                "set_property",
                format!("cannot set '{key}' on {node}"),
            ));
        }
        self.node_mut(*node, "set_property")?
            .props
            .insert(key.to_string(), value.clone());
        self.mutations.push(Mutation::SetProperty {
            node: *node,
            key: key.to_string(),
            value: value.clone(),
        });
        Ok(())
    }

    fn clear_property(&mut self, node: &NodeId, key: &str) -> Result<()> {
        self.node_mut(*node, "clear_property")?.props.remove(key);
        self.mutations.push(Mutation::ClearProperty {
            node: *node,
            key: key.to_string(),
        });
        Ok(())
    }

    fn add_event_handler(&mut self, node: &NodeId, event: &str, handler: &Handler) -> Result<()> {
        self.node_mut(*node, "add_event_handler")?
            .handlers
            .entry(event.to_string())
            .or_default()
            .push(handler.clone());
        self.mutations.push(Mutation::AddHandler {
            node: *node,
            event: event.to_string(),
        });
        Ok(())
    }

    fn remove_event_handler(
        &mut self,
        node: &NodeId,
        event: &str,
        handler: &Handler,
    ) -> Result<()> {
        let registered = self
            .node_mut(*node, "remove_event_handler")?
            .handlers
            .get_mut(event)
            .ok_or_else(|| {
                Error::host_failed("remove_event_handler", format!("no '{event}' handlers on {node}"))
            })?;
        let position = registered
            .iter()
            .position(|candidate| candidate.same_as(handler))
            .ok_or_else(|| {
                Error::host_failed(
                    "remove_event_handler",
                    format!("handler for '{event}' is not registered on {node}"),
                )
            })?;
        registered.remove(position);
        self.mutations.push(Mutation::RemoveHandler {
            node: *node,
            event: event.to_string(),
        });
        Ok(())
    }
}
