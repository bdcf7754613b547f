//! Host binder contract.
//!
//! The engine never touches a host tree directly. Every node creation and
//! mutation goes through a [`HostBinder`] owned by the engine's caller,
//! which makes the same engine drive a DOM, a terminal buffer or the
//! in-memory [`MemoryHost`](crate::memory::MemoryHost) used in tests.
//!
//! Mutations that make nodes visible (`insert`, `remove`, and property
//! patches on attached nodes) are only issued during commit. Node creation
//! and the initial properties of a fresh, still detached node are issued
//! while units are processed.

use std::fmt;

use tendril_core::{ElementType, Handler, PropValue, Result};

/// Prefix that marks an event property under the default convention.
pub const EVENT_PREFIX: &str = "on";

/// Capability interface for creating and mutating host nodes.
pub trait HostBinder {
    /// Handle to a host node. Cloning a handle never clones the node.
    type Node: Clone + PartialEq + fmt::Debug;

    /// Instantiate a detached host node for the given type tag.
    fn create_node(&mut self, kind: &ElementType) -> Result<Self::Node>;

    /// Attach `child` under `parent`, before `before` when given, otherwise
    /// as the last child.
    fn insert(
        &mut self,
        parent: &Self::Node,
        child: &Self::Node,
        before: Option<&Self::Node>,
    ) -> Result<()>;

    /// Detach `child` from `parent`.
    fn remove(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<()>;

    /// Set a plain property.
    fn set_property(&mut self, node: &Self::Node, key: &str, value: &PropValue) -> Result<()>;

    /// Clear a plain property that is no longer present.
    fn clear_property(&mut self, node: &Self::Node, key: &str) -> Result<()>;

    /// Register an event handler.
    fn add_event_handler(&mut self, node: &Self::Node, event: &str, handler: &Handler)
    -> Result<()>;

    /// Unregister a previously added event handler.
    fn remove_event_handler(
        &mut self,
        node: &Self::Node,
        event: &str,
        handler: &Handler,
    ) -> Result<()>;

    /// Classify a property key: `Some(event)` for event properties,
    /// `None` for plain ones.
    fn event_name(&self, key: &str) -> Option<String> {
        default_event_name(key)
    }
}

/// Default classification: keys starting with `on` are events, named by the
/// rest of the key in lower case (`onInput` -> `input`).
pub fn default_event_name(key: &str) -> Option<String> {
    key.strip_prefix(EVENT_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(str::to_lowercase)
}
