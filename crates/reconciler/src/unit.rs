//! Work units and the per-generation arena that owns them.
//!
//! A [`Generation`] is a flat arena of [`WorkUnit`]s linked by
//! parent/child/sibling indices. Links never cross arenas: the only way
//! to reach the previous generation is an [`Alternate`] handle, which is
//! resolved through a shared borrow of the committed generation and stops
//! resolving once that generation has been retired.

use std::slice;

use serde::Serialize;
use tendril_core::{Description, ElementType, Props};

/// Index of a unit inside its generation's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UnitId(pub(crate) usize);

impl UnitId {
    /// Position in the arena.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Read-only back-link to a unit of the previously committed generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Alternate {
    epoch: u64,
    unit: UnitId,
}

impl Alternate {
    /// Epoch of the generation this handle points into.
    pub const fn epoch(self) -> u64 {
        self.epoch
    }

    /// Unit inside that generation.
    pub const fn unit(self) -> UnitId {
        self.unit
    }
}

/// Commit action recorded for a unit during reconciliation.
///
/// There is no delete variant. A unit dropped from the tree belongs to the
/// committed generation, which stays read-only while the next one is built,
/// so it keeps its old effect. Its deletion is recorded as an [`Alternate`]
/// in the pending generation's [`Generation::deletions`] queue, and the
/// commit removes every queued unit before applying any other effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Nothing to apply. Only the root of a generation carries this.
    None,
    /// Reuse the old host node and patch its properties.
    Update,
    /// Insert a freshly created host node.
    Place,
}

/// What a unit renders.
#[derive(Debug, Clone)]
pub enum Source {
    /// Root of a generation; its only child is the rendered tree.
    Root(Description),
    /// An element or text node.
    Element(Description),
}

/// One node's rendering state for one generation.
#[derive(Debug, Clone)]
pub struct WorkUnit<N> {
    pub(crate) source: Source,
    pub(crate) props: Props,
    pub(crate) host: Option<N>,
    pub(crate) parent: Option<UnitId>,
    pub(crate) child: Option<UnitId>,
    pub(crate) sibling: Option<UnitId>,
    pub(crate) alternate: Option<Alternate>,
    pub(crate) effect: Effect,
}

impl<N> WorkUnit<N> {
    /// A unit reusing the host node of its previous counterpart.
    pub(crate) fn updated(description: Description, host: Option<N>, alternate: Alternate) -> Self {
        Self {
            props: description.props().clone(),
            source: Source::Element(description),
            host,
            parent: None,
            child: None,
            sibling: None,
            alternate: Some(alternate),
            effect: Effect::Update,
        }
    }

    /// A unit that needs a new host node.
    pub(crate) fn placed(description: Description) -> Self {
        Self {
            props: description.props().clone(),
            source: Source::Element(description),
            host: None,
            parent: None,
            child: None,
            sibling: None,
            alternate: None,
            effect: Effect::Place,
        }
    }

    /// Type tag, or `None` for a generation root.
    pub fn kind(&self) -> Option<&ElementType> {
        match &self.source {
            Source::Root(_) => None,
            Source::Element(description) => Some(description.kind()),
        }
    }

    /// Description rendered by this unit, or `None` for a generation root.
    pub fn description(&self) -> Option<&Description> {
        match &self.source {
            Source::Root(_) => None,
            Source::Element(description) => Some(description),
        }
    }

    /// Properties carried into this generation. Empty for a root.
    pub const fn props(&self) -> &Props {
        &self.props
    }

    /// Child descriptions to reconcile under this unit.
    pub fn child_descriptions(&self) -> &[Description] {
        match &self.source {
            Source::Root(tree) => slice::from_ref(tree),
            Source::Element(description) => description.children(),
        }
    }

    pub const fn is_root(&self) -> bool {
        matches!(self.source, Source::Root(_))
    }

    pub const fn host(&self) -> Option<&N> {
        self.host.as_ref()
    }

    pub const fn parent(&self) -> Option<UnitId> {
        self.parent
    }

    pub const fn child(&self) -> Option<UnitId> {
        self.child
    }

    pub const fn sibling(&self) -> Option<UnitId> {
        self.sibling
    }

    pub const fn alternate(&self) -> Option<Alternate> {
        self.alternate
    }

    pub const fn effect(&self) -> Effect {
        self.effect
    }
}

/// Arena holding every unit of one generation plus its deletion queue.
#[derive(Debug, Clone)]
pub struct Generation<N> {
    epoch: u64,
    units: Vec<WorkUnit<N>>,
    deletions: Vec<Alternate>,
}

impl<N> Generation<N> {
    /// Start a generation whose root renders `tree` into `mount`.
    pub fn new_root(epoch: u64, tree: Description, mount: N, alternate: Option<Alternate>) -> Self {
        let root = WorkUnit {
            source: Source::Root(tree),
            props: Props::new(),
            host: Some(mount),
            parent: None,
            child: None,
            sibling: None,
            alternate,
            effect: Effect::None,
        };
        Self {
            epoch,
            units: vec![root],
            deletions: Vec::new(),
        }
    }

    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Root unit. Always the first entry of the arena.
    pub const fn root(&self) -> UnitId {
        UnitId(0)
    }

    pub fn get(&self, id: UnitId) -> Option<&WorkUnit<N>> {
        self.units.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: UnitId) -> Option<&mut WorkUnit<N>> {
        self.units.get_mut(id.0)
    }

    pub(crate) fn push(&mut self, unit: WorkUnit<N>) -> UnitId {
        let id = UnitId(self.units.len());
        self.units.push(unit);
        id
    }

    /// Number of units, root included.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Back-link handle for one of this generation's units.
    pub const fn handle(&self, id: UnitId) -> Alternate {
        Alternate {
            epoch: self.epoch,
            unit: id,
        }
    }

    /// Resolve a back-link. Handles minted by another generation resolve
    /// to `None`.
    pub fn resolve(&self, alternate: Alternate) -> Option<&WorkUnit<N>> {
        if alternate.epoch == self.epoch {
            self.get(alternate.unit)
        } else {
            None
        }
    }

    /// Old units with no surviving counterpart, in discovery order.
    pub fn deletions(&self) -> &[Alternate] {
        &self.deletions
    }

    pub(crate) fn queue_deletion(&mut self, alternate: Alternate) {
        self.deletions.push(alternate);
    }

    pub(crate) fn clear_deletions(&mut self) {
        self.deletions.clear();
    }

    /// Host node of a unit's parent.
    pub fn parent_host(&self, id: UnitId) -> Option<&N> {
        self.get(id)
            .and_then(WorkUnit::parent)
            .and_then(|parent| self.get(parent))
            .and_then(WorkUnit::host)
    }

    /// Unit to process after `id`: its child, else the sibling of the
    /// nearest ancestor-or-self that has one, else `None`.
    pub fn next_unit(&self, id: UnitId) -> Option<UnitId> {
        let unit = self.get(id)?;
        if let Some(child) = unit.child {
            return Some(child);
        }
        let mut cursor = Some(unit);
        while let Some(current) = cursor {
            if let Some(sibling) = current.sibling {
                return Some(sibling);
            }
            cursor = current.parent.and_then(|parent| self.get(parent));
        }
        None
    }

    /// Units in child-then-sibling order, starting at the root.
    pub fn preorder(&self) -> impl Iterator<Item = UnitId> + '_ {
        std::iter::successors(Some(self.root()), |&id| self.next_unit(id))
            .take_while(|&id| self.get(id).is_some())
    }

    /// Ordered child ids of a unit.
    pub fn children(&self, id: UnitId) -> impl Iterator<Item = UnitId> + '_ {
        let first = self.get(id).and_then(WorkUnit::child);
        std::iter::successors(first, |&child| self.get(child).and_then(WorkUnit::sibling))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use tendril_core::{build, leaf, Child};

    fn linked(tree: &Description) -> Generation<u32> {
        let mut generation = Generation::new_root(1, tree.clone(), 0, None);
        let mut queue = vec![generation.root()];
        while let Some(parent) = queue.pop() {
            let children = generation.get(parent).unwrap().child_descriptions().to_vec();
            let mut previous: Option<UnitId> = None;
            for description in children {
                let mut unit = WorkUnit::placed(description);
                unit.parent = Some(parent);
                let id = generation.push(unit);
                match previous {
                    None => generation.get_mut(parent).unwrap().child = Some(id),
                    Some(prev) => generation.get_mut(prev).unwrap().sibling = Some(id),
                }
                previous = Some(id);
                queue.push(id);
            }
        }
        generation
    }

    fn sample() -> Description {
        build(
            "div",
            Props::new(),
            vec![
                Child::from(build("a", Props::new(), ["bar"]).unwrap()),
                Child::from(leaf("b").unwrap()),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_preorder_visits_child_before_sibling() {
        let generation = linked(&sample());
        let kinds: Vec<_> = generation
            .preorder()
            .map(|id| {
                generation
                    .get(id)
                    .and_then(WorkUnit::kind)
                    .map_or_else(|| "root".to_string(), ToString::to_string)
            })
            .collect();
        assert_eq!(kinds, vec!["root", "div", "a", "#text", "b"]);
    }

    #[test]
    fn test_next_unit_climbs_to_ancestor_sibling() {
        let generation = linked(&sample());
        let ids: Vec<_> = generation.preorder().collect();
        let text = ids[3];
        let b = ids[4];
        assert_eq!(generation.next_unit(text), Some(b));
        assert_eq!(generation.next_unit(b), None);
    }

    #[test]
    fn test_alternate_from_other_epoch_does_not_resolve() {
        let old = linked(&sample());
        let handle = old.handle(old.root());
        assert!(old.resolve(handle).is_some());

        let newer: Generation<u32> = Generation::new_root(2, sample(), 0, Some(handle));
        assert!(newer.resolve(handle).is_none());
    }

    #[test]
    fn test_root_children_are_the_rendered_tree() {
        let tree = sample();
        let generation: Generation<u32> = Generation::new_root(1, tree.clone(), 7, None);
        let root = generation.get(generation.root()).unwrap();
        assert!(root.is_root());
        assert_eq!(root.host(), Some(&7));
        assert_eq!(root.child_descriptions(), slice::from_ref(&tree));
        assert!(root.props().is_empty());
    }

    #[test]
    fn test_parent_host_and_children() {
        let generation = linked(&sample());
        let div = generation.get(generation.root()).unwrap().child().unwrap();
        assert_eq!(generation.parent_host(div), Some(&0));
        assert_eq!(generation.children(div).count(), 2);
    }
}
