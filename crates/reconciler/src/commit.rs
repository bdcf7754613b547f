//! Commit phase: apply a finished generation to the host tree.
//!
//! The commit runs in one uninterrupted pass. Deletions go first, then the
//! pending tree is walked in child-then-sibling order and each unit's effect
//! is applied. The first host failure stops the pass; mutations already
//! applied stay applied.
//!
//! Nodes attached directly under a mount are tracked in [`MountedNodes`]
//! as the pass goes, so after a failed pass the engine still knows what
//! the mount holds.

use serde::Serialize;
use tendril_core::{Error, Props, Result};
use tracing::{debug, trace};

use crate::host::HostBinder;
use crate::patch::{apply_ops, diff_props};
use crate::unit::{Effect, Generation, UnitId, WorkUnit};

/// Counts of host mutations issued by one commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitSummary {
    /// Host nodes detached by the deletion pass.
    pub removed: usize,
    /// Host nodes inserted for placed units.
    pub placed: usize,
    /// Reused nodes that received a non-empty patch.
    pub updated: usize,
    /// Reused nodes whose properties did not change.
    pub unchanged: usize,
    /// Property operations issued to reused nodes.
    pub property_ops: usize,
}

impl CommitSummary {
    /// Whether the commit issued no host mutation at all.
    pub const fn is_noop(&self) -> bool {
        self.removed == 0 && self.placed == 0 && self.property_ops == 0
    }

    /// Merge another summary into this one.
    pub fn merge(&mut self, other: &Self) {
        self.removed = self.removed.saturating_add(other.removed);
        self.placed = self.placed.saturating_add(other.placed);
        self.updated = self.updated.saturating_add(other.updated);
        self.unchanged = self.unchanged.saturating_add(other.unchanged);
        self.property_ops = self.property_ops.saturating_add(other.property_ops);
    }
}

/// Host nodes attached directly under a mount, as `(mount, node)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedNodes<N> {
    attached: Vec<(N, N)>,
}

impl<N> MountedNodes<N> {
    pub const fn new() -> Self {
        Self {
            attached: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attached.len()
    }

    /// `(mount, node)` pairs in attachment order.
    pub fn iter(&self) -> impl Iterator<Item = (&N, &N)> {
        self.attached.iter().map(|(mount, node)| (mount, node))
    }
}

impl<N: Clone + PartialEq> MountedNodes<N> {
    fn attach(&mut self, mount: &N, node: &N) {
        self.attached.push((mount.clone(), node.clone()));
    }

    fn detach(&mut self, node: &N) {
        self.attached.retain(|(_, attached)| attached != node);
    }
}

impl<N> Default for MountedNodes<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove every tracked node from its mount.
///
/// Entries are dropped as their removal succeeds, so a failed call leaves
/// exactly the nodes still attached.
///
/// # Errors
///
/// Returns the first host failure.
pub fn unmount_all<B: HostBinder>(
    host: &mut B,
    mounted: &mut MountedNodes<B::Node>,
) -> Result<usize> {
    let mut removed = 0_usize;
    while let Some((mount, node)) = mounted.attached.last().cloned() {
        trace!(node = ?node, "unmounting leftover host node");
        host.remove(&mount, &node)?;
        mounted.attached.pop();
        removed = removed.saturating_add(1);
    }
    Ok(removed)
}

/// Apply the deletion queue and every effect of `pending` to the host.
///
/// `mounted` follows every removal and insertion made directly under the
/// mount, including those made before a failure.
///
/// # Errors
///
/// Returns the first host failure, or [`Error::Internal`] if the pending
/// tree references a unit or host node that does not exist.
pub fn commit<B: HostBinder>(
    host: &mut B,
    pending: &Generation<B::Node>,
    current: Option<&Generation<B::Node>>,
    mounted: &mut MountedNodes<B::Node>,
) -> Result<CommitSummary> {
    let mut summary = CommitSummary::default();

    for &deletion in pending.deletions() {
        let (old, parent_node) = current
            .and_then(|generation| {
                generation.resolve(deletion).map(|unit| {
                    (unit, generation.parent_host(deletion.unit()))
                })
            })
            .ok_or_else(|| Error::internal("deletion refers to a retired unit"))?;
        let node = old
            .host()
            .ok_or_else(|| Error::internal("deleted unit has no host node"))?;
        let parent_node =
            parent_node.ok_or_else(|| Error::internal("deleted unit has no parent host node"))?;
        trace!(node = ?node, "removing host node");
        host.remove(parent_node, node)?;
        mounted.detach(node);
        summary.removed = summary.removed.saturating_add(1);
    }

    for id in pending.preorder() {
        let unit = unit_at(pending, id)?;
        match unit.effect() {
            Effect::None => {}
            Effect::Place => {
                let node = attached_host(unit)?;
                let parent_node = pending
                    .parent_host(id)
                    .ok_or_else(|| Error::internal("placed unit has no parent host node"))?;
                let anchor = insertion_anchor(pending, unit);
                trace!(node = ?node, before = ?anchor, "inserting host node");
                host.insert(parent_node, node, anchor)?;
                if unit.parent() == Some(pending.root()) {
                    mounted.attach(parent_node, node);
                }
                summary.placed = summary.placed.saturating_add(1);
            }
            Effect::Update => {
                let node = attached_host(unit)?;
                let old_props = previous_props(unit, current)?;
                let ops = diff_props(old_props, unit.props(), |key| host.event_name(key));
                if ops.is_empty() {
                    summary.unchanged = summary.unchanged.saturating_add(1);
                } else {
                    apply_ops(host, node, &ops)?;
                    summary.updated = summary.updated.saturating_add(1);
                    summary.property_ops = summary.property_ops.saturating_add(ops.len());
                }
            }
        }
    }

    debug!(
        epoch = pending.epoch(),
        removed = summary.removed,
        placed = summary.placed,
        updated = summary.updated,
        unchanged = summary.unchanged,
        property_ops = summary.property_ops,
        "commit applied"
    );
    Ok(summary)
}

fn unit_at<N>(generation: &Generation<N>, id: UnitId) -> Result<&WorkUnit<N>> {
    generation
        .get(id)
        .ok_or_else(|| Error::internal(format!("unit {} is missing", id.index())))
}

fn attached_host<N>(unit: &WorkUnit<N>) -> Result<&N> {
    unit.host()
        .ok_or_else(|| Error::internal("unit reached commit without a host node"))
}

fn previous_props<'a, N>(
    unit: &WorkUnit<N>,
    current: Option<&'a Generation<N>>,
) -> Result<&'a Props> {
    unit.alternate()
        .and_then(|alternate| current.and_then(|generation| generation.resolve(alternate)))
        .map(WorkUnit::props)
        .ok_or_else(|| Error::internal("updated unit has no committed counterpart"))
}

/// Host node of the nearest following sibling that is already attached.
///
/// Updated siblings keep their node in the host tree, so inserting before
/// the first of them keeps the placed node at its position. `None` means
/// append.
fn insertion_anchor<'a, N>(generation: &'a Generation<N>, unit: &WorkUnit<N>) -> Option<&'a N> {
    std::iter::successors(
        unit.sibling().and_then(|id| generation.get(id)),
        |sibling| sibling.sibling().and_then(|id| generation.get(id)),
    )
    .find(|sibling| sibling.effect() == Effect::Update)
    .and_then(WorkUnit::host)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::memory::{MemoryHost, Mutation};
    use crate::scheduler::perform_unit;
    use tendril_core::{build, leaf, Child, Description};

    fn reconcile_all(
        host: &mut MemoryHost,
        epoch: u64,
        tree: &Description,
        mount: crate::memory::NodeId,
        current: Option<&Generation<crate::memory::NodeId>>,
    ) -> Generation<crate::memory::NodeId> {
        let alternate = current.map(|generation| generation.handle(generation.root()));
        let mut pending = Generation::new_root(epoch, tree.clone(), mount, alternate);
        let mut cursor = Some(pending.root());
        while let Some(id) = cursor {
            cursor = perform_unit(host, &mut pending, current, id).unwrap().next;
        }
        pending
    }

    fn row(kinds: &[&str]) -> Description {
        let children: Vec<Child> = kinds.iter().map(|kind| leaf(*kind).unwrap().into()).collect();
        build("div", Props::new(), children).unwrap()
    }

    #[test]
    fn test_first_commit_inserts_in_order() {
        let mut host = MemoryHost::new();
        let mount = host.create_container("root");
        let mut mounted = MountedNodes::new();
        let pending = reconcile_all(&mut host, 1, &row(&["a", "b"]), mount, None);
        host.take_mutations();

        let summary = commit(&mut host, &pending, None, &mut mounted).unwrap();
        assert_eq!(summary.placed, 3);
        assert_eq!(host.render_tree(mount), "<root>\n  <div>\n    <a>\n    <b>\n");
    }

    #[test]
    fn test_type_change_keeps_position() {
        let mut host = MemoryHost::new();
        let mount = host.create_container("root");
        let mut mounted = MountedNodes::new();
        let first = reconcile_all(&mut host, 1, &row(&["a", "b", "c"]), mount, None);
        commit(&mut host, &first, None, &mut mounted).unwrap();

        let second = reconcile_all(&mut host, 2, &row(&["a", "x", "c"]), mount, Some(&first));
        let summary = commit(&mut host, &second, Some(&first), &mut mounted).unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.placed, 1);
        assert_eq!(summary.unchanged, 3);
        assert_eq!(host.render_tree(mount), "<root>\n  <div>\n    <a>\n    <x>\n    <c>\n");
    }

    #[test]
    fn test_deletions_applied_before_placements() {
        let mut host = MemoryHost::new();
        let mount = host.create_container("root");
        let mut mounted = MountedNodes::new();
        let first = reconcile_all(&mut host, 1, &row(&["a"]), mount, None);
        commit(&mut host, &first, None, &mut mounted).unwrap();

        let second = reconcile_all(&mut host, 2, &row(&["b"]), mount, Some(&first));
        host.take_mutations();
        commit(&mut host, &second, Some(&first), &mut mounted).unwrap();
        let mutations = host.take_mutations();
        assert!(matches!(mutations.first(), Some(Mutation::Remove { .. })));
        assert!(matches!(mutations.last(), Some(Mutation::Insert { .. })));
    }

    #[test]
    fn test_identical_generation_commits_nothing() {
        let mut host = MemoryHost::new();
        let mount = host.create_container("root");
        let mut mounted = MountedNodes::new();
        let tree = build("p", Props::new().with("id", "x"), ["hi"]).unwrap();
        let first = reconcile_all(&mut host, 1, &tree, mount, None);
        commit(&mut host, &first, None, &mut mounted).unwrap();

        let second = reconcile_all(&mut host, 2, &tree, mount, Some(&first));
        host.take_mutations();
        let summary = commit(&mut host, &second, Some(&first), &mut mounted).unwrap();
        assert!(summary.is_noop());
        assert_eq!(summary.unchanged, 2);
        assert!(host.mutations().is_empty());
    }

    #[test]
    fn test_mounted_nodes_follow_top_level_replacement() {
        let mut host = MemoryHost::new();
        let mount = host.create_container("root");
        let mut mounted = MountedNodes::new();
        let first = reconcile_all(&mut host, 1, &row(&["a"]), mount, None);
        commit(&mut host, &first, None, &mut mounted).unwrap();
        let div = host.children(mount)[0];
        assert_eq!(mounted.iter().collect::<Vec<_>>(), vec![(&mount, &div)]);

        let second = reconcile_all(&mut host, 2, &leaf("section").unwrap(), mount, Some(&first));
        commit(&mut host, &second, Some(&first), &mut mounted).unwrap();
        let section = host.children(mount)[0];
        assert_ne!(section, div);
        assert_eq!(mounted.iter().collect::<Vec<_>>(), vec![(&mount, &section)]);
    }

    #[test]
    fn test_failed_commit_leaves_mounted_nodes_accurate() {
        let mut host = MemoryHost::new();
        let mount = host.create_container("root");
        let mut mounted = MountedNodes::new();
        let first = reconcile_all(&mut host, 1, &row(&["a", "b"]), mount, None);
        commit(&mut host, &first, None, &mut mounted).unwrap();
        let div = host.children(mount)[0];

        let styled = build(
            "div",
            Props::new().with("style", "bold"),
            vec![Child::from(leaf("a").unwrap())],
        )
        .unwrap();
        let second = reconcile_all(&mut host, 2, &styled, mount, Some(&first));
        host.fail_on_property("style");
        assert!(commit(&mut host, &second, Some(&first), &mut mounted).is_err());
        assert_eq!(host.children(div).len(), 1);
        assert_eq!(mounted.len(), 1);

        let removed = unmount_all(&mut host, &mut mounted).unwrap();
        assert_eq!(removed, 1);
        assert!(mounted.is_empty());
        assert!(host.children(mount).is_empty());
    }
}
