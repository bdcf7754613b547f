//! Positional child reconciliation.

use std::ops::AddAssign;

use serde::Serialize;
use tendril_core::{Error, Result};
use tracing::trace;

use crate::unit::{Generation, UnitId, WorkUnit};

/// Classification counts produced by reconciling one or more parents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Children that reuse an old unit of the same type.
    pub updated: usize,
    /// Children that need a new host node.
    pub placed: usize,
    /// Old children queued for deletion.
    pub deleted: usize,
}

impl ReconcileSummary {
    /// Total number of new units emitted.
    pub const fn emitted(&self) -> usize {
        self.updated.saturating_add(self.placed)
    }

    /// Merge another summary into this one.
    pub fn merge(&mut self, other: &Self) {
        self.updated = self.updated.saturating_add(other.updated);
        self.placed = self.placed.saturating_add(other.placed);
        self.deleted = self.deleted.saturating_add(other.deleted);
    }
}

impl AddAssign for ReconcileSummary {
    fn add_assign(&mut self, other: Self) {
        self.merge(&other);
    }
}

/// Build the child chain of `parent` in `pending` from its child
/// descriptions, matching them by position against the children of the
/// parent's alternate in `current`.
///
/// At each position a new description whose type equals the old unit's
/// type becomes an update reusing the old host node. Otherwise the old
/// unit (if any) is queued for deletion and the description (if any) is
/// placed fresh. Both cursors advance together on every step.
///
/// # Errors
///
/// Returns [`Error::Internal`] when `parent` is not part of `pending`.
pub fn reconcile_children<N: Clone>(
    pending: &mut Generation<N>,
    current: Option<&Generation<N>>,
    parent: UnitId,
) -> Result<ReconcileSummary> {
    let (descriptions, alternate) = pending
        .get(parent)
        .map(|unit| (unit.child_descriptions().to_vec(), unit.alternate()))
        .ok_or_else(|| Error::internal(format!("unit {} is not in the pending tree", parent.index())))?;

    // Only a matching epoch yields a baseline; anything else diffs against nothing.
    let baseline = current.and_then(|generation| {
        alternate
            .and_then(|handle| generation.resolve(handle))
            .map(|old_parent| (generation, old_parent.child()))
    });
    let mut old_cursor = baseline.and_then(|(_, first)| first);

    let mut summary = ReconcileSummary::default();
    let mut previous: Option<UnitId> = None;
    let mut index = 0_usize;

    loop {
        let description = descriptions.get(index);
        let old = baseline.and_then(|(generation, _)| {
            old_cursor.and_then(|id| generation.get(id).map(|unit| (generation, id, unit)))
        });

        if description.is_none() && old.is_none() {
            break;
        }

        let same_type = match (description, old) {
            (Some(description), Some((_, _, unit))) => unit.kind() == Some(description.kind()),
            _ => false,
        };

        let emitted = match (description, old) {
            (Some(description), Some((generation, id, unit))) if same_type => {
                summary.updated = summary.updated.saturating_add(1);
                Some(WorkUnit::updated(
                    description.clone(),
                    unit.host().cloned(),
                    generation.handle(id),
                ))
            }
            (Some(description), _) => {
                summary.placed = summary.placed.saturating_add(1);
                Some(WorkUnit::placed(description.clone()))
            }
            (None, _) => None,
        };

        if !same_type {
            if let Some((generation, id, unit)) = old {
                trace!(
                    parent = parent.index(),
                    position = index,
                    kind = ?unit.kind(),
                    "queueing old unit for deletion"
                );
                pending.queue_deletion(generation.handle(id));
                summary.deleted = summary.deleted.saturating_add(1);
            }
        }

        if let Some(mut unit) = emitted {
            unit.parent = Some(parent);
            let id = pending.push(unit);
            let link = match previous {
                None => pending.get_mut(parent).map(|unit| &mut unit.child),
                Some(previous) => pending.get_mut(previous).map(|unit| &mut unit.sibling),
            };
            if let Some(slot) = link {
                *slot = Some(id);
            }
            previous = Some(id);
        }

        old_cursor = old.and_then(|(_, _, unit)| unit.sibling());
        index = index.saturating_add(1);
    }

    trace!(
        parent = parent.index(),
        updated = summary.updated,
        placed = summary.placed,
        deleted = summary.deleted,
        "reconciled children"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::unit::Effect;
    use tendril_core::{build, leaf, text, Child, Description, Props};

    /// Reconcile every unit of a fresh generation and give each created unit
    /// a distinct host id, standing in for node creation.
    fn build_generation(
        epoch: u64,
        tree: &Description,
        current: Option<&Generation<u32>>,
    ) -> (Generation<u32>, ReconcileSummary) {
        let alternate = current.map(|generation| generation.handle(generation.root()));
        let mut generation = Generation::new_root(epoch, tree.clone(), 0, alternate);
        let mut summary = ReconcileSummary::default();
        let mut cursor = Some(generation.root());
        let mut next_host = u32::try_from(epoch).unwrap() * 100;
        while let Some(id) = cursor {
            let unit = generation.get_mut(id).unwrap();
            if unit.host.is_none() {
                next_host += 1;
                unit.host = Some(next_host);
            }
            summary += reconcile_children(&mut generation, current, id).unwrap();
            cursor = generation.next_unit(id);
        }
        (generation, summary)
    }

    fn list(items: &[&str]) -> Description {
        let children: Vec<Child> = items.iter().map(|kind| leaf(*kind).unwrap().into()).collect();
        build("ul", Props::new(), children).unwrap()
    }

    fn effects(generation: &Generation<u32>) -> Vec<Effect> {
        generation
            .preorder()
            .skip(1)
            .map(|id| generation.get(id).unwrap().effect())
            .collect()
    }

    #[test]
    fn test_first_render_places_everything() {
        let (generation, summary) = build_generation(1, &list(&["li", "li"]), None);
        assert_eq!(summary, ReconcileSummary { updated: 0, placed: 3, deleted: 0 });
        assert_eq!(effects(&generation), vec![Effect::Place; 3]);
        assert!(generation.deletions().is_empty());
    }

    #[test]
    fn test_same_types_reuse_host_nodes() {
        let (old, _) = build_generation(1, &list(&["li", "li"]), None);
        let (new, summary) = build_generation(2, &list(&["li", "li"]), Some(&old));
        assert_eq!(summary.updated, 3);
        assert_eq!(summary.placed, 0);

        let old_hosts: Vec<_> = old.preorder().map(|id| old.get(id).unwrap().host).collect();
        let new_hosts: Vec<_> = new.preorder().map(|id| new.get(id).unwrap().host).collect();
        assert_eq!(old_hosts, new_hosts);
    }

    #[test]
    fn test_type_change_deletes_and_places_at_same_position() {
        let (old, _) = build_generation(1, &list(&["li", "li", "li"]), None);
        let (new, summary) = build_generation(2, &list(&["li", "p", "li"]), Some(&old));
        assert_eq!(summary, ReconcileSummary { updated: 3, placed: 1, deleted: 1 });
        assert_eq!(
            effects(&new),
            vec![Effect::Update, Effect::Update, Effect::Place, Effect::Update]
        );
        let deleted = old.resolve(new.deletions()[0]).unwrap();
        assert_eq!(deleted.kind().map(ToString::to_string), Some("li".to_string()));
    }

    #[test]
    fn test_shrinking_queues_trailing_units() {
        let (old, _) = build_generation(1, &list(&["li", "li", "li", "li"]), None);
        let (new, summary) = build_generation(2, &list(&["li"]), Some(&old));
        assert_eq!(summary.deleted, 3);
        let ul = new.get(new.root()).unwrap().child().unwrap();
        assert_eq!(new.children(ul).count(), 1);

        let old_ul = old.get(old.root()).unwrap().child().unwrap();
        let trailing: Vec<_> = old.children(old_ul).skip(1).map(|id| old.handle(id)).collect();
        assert_eq!(new.deletions(), trailing.as_slice());

        // Dropped units stay as committed; only the queue marks them deleted
        for alternate in new.deletions() {
            assert_eq!(old.resolve(*alternate).unwrap().effect(), Effect::Place);
        }
    }

    #[test]
    fn test_growing_places_trailing_units() {
        let (old, _) = build_generation(1, &list(&["li"]), None);
        let (new, summary) = build_generation(2, &list(&["li", "li", "li"]), Some(&old));
        assert_eq!(summary, ReconcileSummary { updated: 2, placed: 2, deleted: 0 });
        assert_eq!(
            effects(&new),
            vec![Effect::Update, Effect::Update, Effect::Place, Effect::Place]
        );
    }

    #[test]
    fn test_text_and_element_are_different_types() {
        let old_tree = build("p", Props::new(), ["hello"]).unwrap();
        let new_tree = build("p", Props::new(), vec![Child::from(leaf("span").unwrap())]).unwrap();
        let (old, _) = build_generation(1, &old_tree, None);
        let (_, summary) = build_generation(2, &new_tree, Some(&old));
        assert_eq!(summary, ReconcileSummary { updated: 1, placed: 1, deleted: 1 });
    }

    #[test]
    fn test_alternate_from_retired_generation_diffs_against_nothing() {
        let (old, _) = build_generation(1, &text("x"), None);
        let (other, _) = build_generation(5, &text("x"), None);
        let mut pending = Generation::new_root(9, text("x"), 0, Some(old.handle(old.root())));
        let root = pending.root();
        let summary = reconcile_children(&mut pending, Some(&other), root).unwrap();
        assert_eq!(summary, ReconcileSummary { updated: 0, placed: 1, deleted: 0 });
        assert!(pending.deletions().is_empty());
    }

    #[test]
    fn test_unknown_parent_is_internal_error() {
        let mut pending: Generation<u32> = Generation::new_root(1, text("x"), 0, None);
        let result = reconcile_children(&mut pending, None, UnitId(42));
        assert!(matches!(result, Err(Error::Internal(_))));
    }
}
