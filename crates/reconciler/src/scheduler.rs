//! Cooperative scheduling primitives.
//!
//! The engine processes one unit at a time and checks a [`Deadline`]
//! before each unit. Suspension only ever happens between units.

use std::cell::Cell;
use std::time::{Duration, Instant};

use serde::Serialize;
use tendril_core::{Error, Props, Result};
use tracing::trace;

use crate::commit::CommitSummary;
use crate::config::EngineConfig;
use crate::host::HostBinder;
use crate::patch::{apply_ops, diff_props};
use crate::reconciler::{reconcile_children, ReconcileSummary};
use crate::unit::{Generation, UnitId};

/// Source of the "time remaining" answer the scheduler yields on.
pub trait Deadline {
    /// Time left in the current slice.
    fn time_remaining(&self) -> Duration;
}

impl<F> Deadline for F
where
    F: Fn() -> Duration,
{
    fn time_remaining(&self) -> Duration {
        self()
    }
}

/// A deadline that never runs out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl Deadline for Unbounded {
    fn time_remaining(&self) -> Duration {
        Duration::MAX
    }
}

/// Wall-clock slice ending at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct SliceDeadline {
    end: Instant,
}

impl SliceDeadline {
    pub const fn until(end: Instant) -> Self {
        Self { end }
    }

    /// Slice of the given length starting now.
    pub fn from_now(slice: Duration) -> Self {
        let now = Instant::now();
        Self {
            end: now.checked_add(slice).unwrap_or(now),
        }
    }
}

impl Deadline for SliceDeadline {
    fn time_remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }
}

/// Deterministic deadline: answers "plenty of time" to the first `units`
/// queries and "no time" afterwards.
///
/// The scheduler asks once per unit, so a budget of `n` lets exactly `n`
/// units run.
#[derive(Debug, Default)]
pub struct UnitBudget {
    remaining: Cell<usize>,
}

impl UnitBudget {
    pub const fn new(units: usize) -> Self {
        Self {
            remaining: Cell::new(units),
        }
    }

    /// Queries left before the budget is exhausted.
    pub fn remaining(&self) -> usize {
        self.remaining.get()
    }
}

impl Deadline for UnitBudget {
    fn time_remaining(&self) -> Duration {
        match self.remaining.get().checked_sub(1) {
            Some(left) => {
                self.remaining.set(left);
                Duration::MAX
            }
            None => Duration::ZERO,
        }
    }
}

/// Logical phase of the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No pending generation.
    #[default]
    Idle,
    /// A pending generation is under construction.
    Reconciling,
}

/// Outcome of one `tick`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Units processed.
    pub units: usize,
    /// Host nodes created while processing units.
    pub created: usize,
    /// Classification of the children reconciled.
    pub reconciled: ReconcileSummary,
    /// Whether the tick stopped with work left.
    pub yielded: bool,
    /// Summary of the commit, if the tick finished a generation.
    pub committed: Option<CommitSummary>,
    /// Phase after the tick.
    pub phase: Phase,
}

impl TickReport {
    /// Fold a later report into this one. The later phase and yield flag win.
    pub fn merge(&mut self, later: &Self) {
        self.units = self.units.saturating_add(later.units);
        self.created = self.created.saturating_add(later.created);
        self.reconciled.merge(&later.reconciled);
        self.yielded = later.yielded;
        self.phase = later.phase;
        self.committed = match (self.committed, later.committed) {
            (Some(mut earlier), Some(next)) => {
                earlier.merge(&next);
                Some(earlier)
            }
            (earlier, next) => next.or(earlier),
        };
    }

    pub const fn did_commit(&self) -> bool {
        self.committed.is_some()
    }
}

/// Whether the scheduler must stop before starting another unit.
pub fn should_yield<D: Deadline + ?Sized>(
    deadline: &D,
    config: &EngineConfig,
    processed: usize,
) -> bool {
    if config.max_units_per_tick.is_some_and(|cap| processed >= cap) {
        return true;
    }
    deadline.time_remaining() < config.min_slice_remaining()
}

/// Result of processing one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitOutcome {
    /// Next unit to process, or `None` once the tree is built.
    pub next: Option<UnitId>,
    /// Whether a host node was created for this unit.
    pub created: bool,
    /// Classification of this unit's children.
    pub reconciled: ReconcileSummary,
}

/// Process one unit: make sure it owns a host node, reconcile its
/// children, and pick the next unit.
///
/// A freshly created node receives its initial properties right away. It
/// is still detached, so nothing becomes visible before commit.
///
/// # Errors
///
/// Returns the host failure if node creation or the initial patch fails,
/// or [`Error::Internal`] when `id` is not in `pending`.
pub fn perform_unit<B: HostBinder>(
    host: &mut B,
    pending: &mut Generation<B::Node>,
    current: Option<&Generation<B::Node>>,
    id: UnitId,
) -> Result<UnitOutcome> {
    let unit = pending
        .get(id)
        .ok_or_else(|| Error::internal(format!("unit {} is missing", id.index())))?;

    let created = match (unit.host(), unit.description()) {
        (Some(_), _) => false,
        (None, Some(description)) => {
            let description = description.clone();
            trace!(unit = id.index(), kind = %description.kind(), "creating host node");
            let node = host.create_node(description.kind())?;
            let ops = diff_props(&Props::new(), description.props(), |key| host.event_name(key));
            apply_ops(host, &node, &ops)?;
            if let Some(unit) = pending.get_mut(id) {
                unit.host = Some(node);
            }
            true
        }
        (None, None) => return Err(Error::internal("generation root has no mount node")),
    };

    let reconciled = reconcile_children(pending, current, id)?;
    let next = pending.next_unit(id);
    trace!(unit = id.index(), next = ?next.map(UnitId::index), "unit done");

    Ok(UnitOutcome {
        next,
        created,
        reconciled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_budget_counts_down() {
        let budget = UnitBudget::new(2);
        assert_eq!(budget.time_remaining(), Duration::MAX);
        assert_eq!(budget.time_remaining(), Duration::MAX);
        assert_eq!(budget.time_remaining(), Duration::ZERO);
        assert_eq!(budget.remaining(), 0);
    }

    #[test]
    fn test_expired_slice_has_no_time() {
        let deadline = SliceDeadline::until(Instant::now());
        assert_eq!(deadline.time_remaining(), Duration::ZERO);
    }

    #[test]
    fn test_should_yield_below_threshold() {
        let config = EngineConfig::default();
        let short = || Duration::from_micros(999);
        let enough = || Duration::from_millis(1);
        assert!(should_yield(&short, &config, 0));
        assert!(!should_yield(&enough, &config, 0));
        assert!(!should_yield(&Unbounded, &config, 10_000));
    }

    #[test]
    fn test_should_yield_at_unit_cap_without_querying_clock() {
        let config = EngineConfig {
            max_units_per_tick: Some(2),
            ..EngineConfig::default()
        };
        let budget = UnitBudget::new(5);
        assert!(!should_yield(&budget, &config, 1));
        assert!(should_yield(&budget, &config, 2));
        assert_eq!(budget.remaining(), 4);
    }

    #[test]
    fn test_report_merge_keeps_latest_phase() {
        let mut total = TickReport {
            units: 3,
            yielded: true,
            phase: Phase::Reconciling,
            ..TickReport::default()
        };
        let later = TickReport {
            units: 2,
            committed: Some(CommitSummary {
                placed: 4,
                ..CommitSummary::default()
            }),
            phase: Phase::Idle,
            ..TickReport::default()
        };
        total.merge(&later);
        assert_eq!(total.units, 5);
        assert!(!total.yielded);
        assert_eq!(total.phase, Phase::Idle);
        assert_eq!(total.committed.map(|summary| summary.placed), Some(4));
    }
}
