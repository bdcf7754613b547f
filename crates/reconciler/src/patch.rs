//! Property patches between two generations of a node.

use tendril_core::{Handler, PropValue, Props, Result};
use tracing::trace;

use crate::host::HostBinder;

/// One host operation of a property patch.
#[derive(Debug, Clone, PartialEq)]
pub enum PropOp {
    /// Unregister an old handler that is gone or rebound.
    RemoveHandler { event: String, handler: Handler },
    /// Clear a plain property that is no longer present.
    Clear { key: String },
    /// Set a plain property that is new or changed.
    Set { key: String, value: PropValue },
    /// Register a handler that is new or rebound.
    AddHandler { event: String, handler: Handler },
}

impl PropOp {
    /// Key or event name the operation targets.
    pub fn target(&self) -> &str {
        match self {
            Self::RemoveHandler { event, .. } | Self::AddHandler { event, .. } => event,
            Self::Clear { key } | Self::Set { key, .. } => key,
        }
    }
}

/// Compute the ordered patch turning `old` into `new`.
///
/// Operations come in four groups, in this order: handler removals, plain
/// clears, plain sets, handler additions. A rebound handler is therefore
/// always removed before its replacement is added.
///
/// A key is an event property when `event_name` classifies it as one and
/// its value is a [`Handler`]; every other key is plain.
pub fn diff_props<F>(old: &Props, new: &Props, event_name: F) -> Vec<PropOp>
where
    F: Fn(&str) -> Option<String>,
{
    let event_of = |key: &str, value: &PropValue| {
        value.as_handler().and_then(|handler| {
            event_name(key).map(|event| (event, handler.clone()))
        })
    };
    let changed = |props: &Props, key: &str, value: &PropValue| props.get(key) != Some(value);

    let mut ops = Vec::new();

    for (key, value) in old.iter() {
        if let Some((event, handler)) = event_of(key, value) {
            if changed(new, key, value) {
                ops.push(PropOp::RemoveHandler { event, handler });
            }
        }
    }

    for (key, value) in old.iter() {
        if event_of(key, value).is_none() {
            let gone = new
                .get(key)
                .is_none_or(|next| event_of(key, next).is_some());
            if gone {
                ops.push(PropOp::Clear {
                    key: key.to_string(),
                });
            }
        }
    }

    for (key, value) in new.iter() {
        if event_of(key, value).is_none() && changed(old, key, value) {
            ops.push(PropOp::Set {
                key: key.to_string(),
                value: value.clone(),
            });
        }
    }

    for (key, value) in new.iter() {
        if let Some((event, handler)) = event_of(key, value) {
            if changed(old, key, value) {
                ops.push(PropOp::AddHandler { event, handler });
            }
        }
    }

    ops
}

/// Apply a patch to a host node, stopping at the first failure.
pub fn apply_ops<B: HostBinder>(host: &mut B, node: &B::Node, ops: &[PropOp]) -> Result<()> {
    for op in ops {
        trace!(node = ?node, op = op.target(), "applying property op");
        match op {
            PropOp::RemoveHandler { event, handler } => {
                host.remove_event_handler(node, event, handler)?;
            }
            PropOp::Clear { key } => host.clear_property(node, key)?,
            PropOp::Set { key, value } => host.set_property(node, key, value)?,
            PropOp::AddHandler { event, handler } => {
                host.add_event_handler(node, event, handler)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::default_event_name;

    fn diff(old: &Props, new: &Props) -> Vec<PropOp> {
        diff_props(old, new, default_event_name)
    }

    #[test]
    fn test_identical_props_produce_empty_patch() {
        let handler = Handler::new(|_| {});
        let props = Props::new().with("id", "foo").with("onClick", handler);
        assert!(diff(&props, &props.clone()).is_empty());
    }

    #[test]
    fn test_changed_plain_property_is_set() {
        let old = Props::new().with("id", "a").with("title", "t");
        let new = Props::new().with("id", "b").with("title", "t");
        assert_eq!(
            diff(&old, &new),
            vec![PropOp::Set {
                key: "id".into(),
                value: "b".into()
            }]
        );
    }

    #[test]
    fn test_removed_plain_property_is_cleared() {
        let old = Props::new().with("id", "a");
        let ops = diff(&old, &Props::new());
        assert_eq!(ops, vec![PropOp::Clear { key: "id".into() }]);
    }

    #[test]
    fn test_rebound_handler_removed_before_added() {
        let f = Handler::new(|_| {});
        let g = Handler::new(|_| {});
        let old = Props::new().with("onClick", f.clone());
        let new = Props::new().with("onClick", g.clone());
        assert_eq!(
            diff(&old, &new),
            vec![
                PropOp::RemoveHandler {
                    event: "click".into(),
                    handler: f
                },
                PropOp::AddHandler {
                    event: "click".into(),
                    handler: g
                },
            ]
        );
    }

    #[test]
    fn test_groups_are_ordered() {
        let f = Handler::new(|_| {});
        let g = Handler::new(|_| {});
        let old = Props::new()
            .with("onInput", f)
            .with("stale", 1)
            .with("value", "a");
        let new = Props::new().with("onChange", g).with("value", "b");
        let kinds: Vec<_> = diff(&old, &new)
            .iter()
            .map(|op| match op {
                PropOp::RemoveHandler { .. } => "remove",
                PropOp::Clear { .. } => "clear",
                PropOp::Set { .. } => "set",
                PropOp::AddHandler { .. } => "add",
            })
            .collect();
        assert_eq!(kinds, vec!["remove", "clear", "set", "add"]);
    }

    #[test]
    fn test_non_handler_event_key_is_plain() {
        let new = Props::new().with("onclick", "alert()");
        assert_eq!(
            diff(&Props::new(), &new),
            vec![PropOp::Set {
                key: "onclick".into(),
                value: "alert()".into()
            }]
        );
    }

    #[test]
    fn test_plain_value_replaced_by_handler_is_cleared() {
        let handler = Handler::new(|_| {});
        let old = Props::new().with("onClick", "legacy");
        let new = Props::new().with("onClick", handler.clone());
        assert_eq!(
            diff(&old, &new),
            vec![
                PropOp::Clear {
                    key: "onClick".into()
                },
                PropOp::AddHandler {
                    event: "click".into(),
                    handler
                },
            ]
        );
    }
}
