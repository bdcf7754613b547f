//! The rendering engine: render entry point, cooperative tick, and commit.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use tendril_core::{Description, Error, Result, ResultExt};
use tracing::{debug, info, warn};

use crate::commit::{commit, unmount_all, CommitSummary, MountedNodes};
use crate::config::EngineConfig;
use crate::host::HostBinder;
use crate::scheduler::{
    perform_unit, should_yield, Deadline, Phase, TickReport, Unbounded, UnitOutcome,
};
use crate::unit::{Generation, UnitId};

/// Clonable handle for requesting a render from outside the engine, such
/// as from an event handler.
///
/// Requests are applied at the start of the next tick and right after a
/// commit finishes. Only the latest request survives.
pub struct RenderHandle<N> {
    slot: Rc<Cell<Option<(Description, N)>>>,
}

impl<N> RenderHandle<N> {
    fn new() -> Self {
        Self {
            slot: Rc::new(Cell::new(None)),
        }
    }

    /// Queue a render of `description` into `mount`, replacing any request
    /// not yet applied.
    pub fn request(&self, description: Description, mount: N) {
        if self.slot.replace(Some((description, mount))).is_some() {
            debug!("render request superseded by a newer one");
        }
    }

    /// Whether a request is waiting.
    pub fn is_pending(&self) -> bool {
        let request = self.slot.take();
        let pending = request.is_some();
        self.slot.set(request);
        pending
    }

    fn take(&self) -> Option<(Description, N)> {
        self.slot.take()
    }
}

impl<N> Clone for RenderHandle<N> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<N> fmt::Debug for RenderHandle<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderHandle").finish_non_exhaustive()
    }
}

/// Incremental renderer driving a [`HostBinder`].
///
/// Holds the last committed generation, the generation under construction
/// (if any), and the pointer to the next unit of work. Created empty and
/// idle.
pub struct Engine<B: HostBinder> {
    host: B,
    config: EngineConfig,
    current: Option<Generation<B::Node>>,
    pending: Option<Generation<B::Node>>,
    next_unit: Option<UnitId>,
    next_epoch: u64,
    requests: RenderHandle<B::Node>,
    mounted: MountedNodes<B::Node>,
}

impl<B: HostBinder> Engine<B> {
    /// Create an engine with the default configuration.
    pub fn new(host: B) -> Self {
        Self::with_config(host, EngineConfig::default())
    }

    fn with_config(host: B, config: EngineConfig) -> Self {
        Self {
            host,
            config,
            current: None,
            pending: None,
            next_unit: None,
            next_epoch: 1,
            requests: RenderHandle::new(),
            mounted: MountedNodes::new(),
        }
    }

    /// Start building an engine.
    pub fn builder(host: B) -> EngineBuilder<B> {
        EngineBuilder::new(host)
    }

    /// Begin a new pending generation rendering `description` into `mount`.
    ///
    /// Any pending generation is discarded; the new one is diffed against
    /// the last committed tree. No host mutation happens until a later
    /// tick finishes and commits it.
    pub fn render(&mut self, description: Description, mount: B::Node) {
        if let Some(abandoned) = self.pending.take() {
            warn!(
                epoch = abandoned.epoch(),
                built = abandoned.len(),
                "preempting unfinished generation"
            );
        }

        let epoch = self.next_epoch;
        self.next_epoch = self.next_epoch.wrapping_add(1);
        let alternate = self
            .current
            .as_ref()
            .map(|current| current.handle(current.root()));

        info!(
            epoch,
            nodes = description.node_count(),
            diffed = alternate.is_some(),
            "render requested"
        );

        let generation = Generation::new_root(epoch, description, mount, alternate);
        self.next_unit = Some(generation.root());
        self.pending = Some(generation);
    }

    /// Perform as much work as `deadline` allows.
    ///
    /// Units are processed one at a time until the deadline or the
    /// configured unit cap says stop. Once the pending tree is fully built
    /// it is committed in the same tick.
    ///
    /// # Errors
    ///
    /// Returns the host failure that aborted the pending generation. The
    /// engine is idle again. A failure while building units keeps the last
    /// committed tree current; a failure during commit discards it, and the
    /// next commit unmounts the leftovers and places a fresh tree.
    pub fn tick<D: Deadline + ?Sized>(&mut self, deadline: &D) -> Result<TickReport> {
        self.apply_requested_render();

        let mut report = TickReport::default();
        while let Some(id) = self.next_unit {
            if should_yield(deadline, &self.config, report.units) {
                report.yielded = true;
                break;
            }
            let outcome = self.perform(id).inspect_error(|e| self.abort(e))?;
            report.units = report.units.saturating_add(1);
            if outcome.created {
                report.created = report.created.saturating_add(1);
            }
            report.reconciled.merge(&outcome.reconciled);
            self.next_unit = outcome.next;
        }

        if self.next_unit.is_none() {
            if let Some(mut pending) = self.pending.take() {
                let summary = self
                    .commit_pending(&pending)
                    .inspect_error(|e| self.abort_commit(pending.epoch(), e))?;
                pending.clear_deletions();
                info!(
                    epoch = pending.epoch(),
                    units = pending.len(),
                    removed = summary.removed,
                    placed = summary.placed,
                    updated = summary.updated,
                    "generation committed"
                );
                self.current = Some(pending);
                report.committed = Some(summary);
                self.apply_requested_render();
            }
        }

        report.phase = self.phase();
        debug!(
            units = report.units,
            yielded = report.yielded,
            committed = report.did_commit(),
            phase = ?report.phase,
            "tick finished"
        );
        Ok(report)
    }

    /// Tick with an unbounded deadline until the engine is idle.
    ///
    /// # Errors
    ///
    /// Returns the first error `tick` returns.
    pub fn flush(&mut self) -> Result<TickReport> {
        let mut total = self.tick(&Unbounded)?;
        while !self.is_idle() {
            let report = self.tick(&Unbounded)?;
            total.merge(&report);
        }
        Ok(total)
    }

    pub fn phase(&self) -> Phase {
        if self.pending.is_some() {
            Phase::Reconciling
        } else {
            Phase::Idle
        }
    }

    /// Whether there is no pending generation and no queued render request.
    pub fn is_idle(&self) -> bool {
        self.pending.is_none() && !self.requests.is_pending()
    }

    /// Handle for queueing renders from callbacks.
    pub fn render_handle(&self) -> RenderHandle<B::Node> {
        self.requests.clone()
    }

    pub const fn host(&self) -> &B {
        &self.host
    }

    /// Mutable host access. Mutating nodes the engine manages leaves the
    /// committed tree out of sync with the host.
    pub fn host_mut(&mut self) -> &mut B {
        &mut self.host
    }

    /// Last committed generation. `None` before the first commit and after
    /// a failed one.
    pub const fn current(&self) -> Option<&Generation<B::Node>> {
        self.current.as_ref()
    }

    /// Generation under construction.
    pub const fn pending(&self) -> Option<&Generation<B::Node>> {
        self.pending.as_ref()
    }

    /// Nodes this engine has attached directly under a mount.
    pub const fn mounted(&self) -> &MountedNodes<B::Node> {
        &self.mounted
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Consume the engine and return its host.
    pub fn into_host(self) -> B {
        self.host
    }

    fn perform(&mut self, id: UnitId) -> Result<UnitOutcome> {
        let pending = self
            .pending
            .as_mut()
            .ok_or_else(|| Error::internal("next unit set without a pending generation"))?;
        perform_unit(&mut self.host, pending, self.current.as_ref(), id)
    }

    fn apply_requested_render(&mut self) {
        if let Some((description, mount)) = self.requests.take() {
            self.render(description, mount);
        }
    }

    fn abort(&mut self, error: &Error) {
        let epoch = self.pending.as_ref().map(Generation::epoch);
        warn!(epoch = ?epoch, error = %error, "aborting pending generation");
        self.pending = None;
        self.next_unit = None;
    }

    /// Commit `pending`, first unmounting whatever a failed commit left
    /// behind when there is no committed baseline.
    fn commit_pending(&mut self, pending: &Generation<B::Node>) -> Result<CommitSummary> {
        let leftovers = if self.current.is_none() {
            unmount_all(&mut self.host, &mut self.mounted)?
        } else {
            0
        };
        let mut summary = commit(
            &mut self.host,
            pending,
            self.current.as_ref(),
            &mut self.mounted,
        )?;
        summary.removed = summary.removed.saturating_add(leftovers);
        Ok(summary)
    }

    /// The host tree no longer matches `current` after a partial commit, so
    /// the next generation is built from scratch and remounted.
    fn abort_commit(&mut self, epoch: u64, error: &Error) {
        warn!(
            epoch,
            error = %error,
            leftovers = self.mounted.len(),
            "commit failed; host tree partially updated, next commit remounts"
        );
        self.pending = None;
        self.next_unit = None;
        self.current = None;
    }
}

impl<B: HostBinder + fmt::Debug> fmt::Debug for Engine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("host", &self.host)
            .field("config", &self.config)
            .field("phase", &self.phase())
            .field("next_epoch", &self.next_epoch)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder<B: HostBinder> {
    host: B,
    config: EngineConfig,
}

impl<B: HostBinder> EngineBuilder<B> {
    pub fn new(host: B) -> Self {
        Self {
            host,
            config: EngineConfig::default(),
        }
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the minimum remaining slice time needed to start a unit.
    #[must_use]
    pub fn min_slice_remaining(mut self, slice: std::time::Duration) -> Self {
        self.config.min_slice_remaining_us = u64::try_from(slice.as_micros()).unwrap_or(u64::MAX);
        self
    }

    /// Cap the number of units processed per tick.
    #[must_use]
    pub fn max_units_per_tick(mut self, units: usize) -> Self {
        self.config.max_units_per_tick = Some(units);
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is invalid.
    pub fn build(self) -> Result<Engine<B>> {
        self.config
            .validate()
            .log_failure("rejecting engine configuration")?;
        Ok(Engine::with_config(self.host, self.config))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::memory::{MemoryHost, Mutation};
    use crate::scheduler::UnitBudget;
    use tendril_core::{build, Props};

    fn engine() -> (Engine<MemoryHost>, crate::memory::NodeId) {
        let mut host = MemoryHost::new();
        let mount = host.create_container("root");
        (Engine::new(host), mount)
    }

    #[test]
    fn test_new_engine_is_idle() {
        let (engine, _) = engine();
        assert!(engine.is_idle());
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(engine.current().is_none());
    }

    #[test]
    fn test_render_does_not_touch_host() {
        let (mut engine, mount) = engine();
        engine.render(build("p", Props::new(), ["x"]).unwrap(), mount);
        assert_eq!(engine.phase(), Phase::Reconciling);
        assert!(engine.host().mutations().is_empty());
    }

    #[test]
    fn test_zero_budget_makes_no_progress() {
        let (mut engine, mount) = engine();
        engine.render(build("p", Props::new(), ["x"]).unwrap(), mount);
        let report = engine.tick(&UnitBudget::new(0)).unwrap();
        assert_eq!(report.units, 0);
        assert!(report.yielded);
        assert_eq!(report.phase, Phase::Reconciling);
    }

    #[test]
    fn test_flush_commits() {
        let (mut engine, mount) = engine();
        engine.render(build("p", Props::new(), ["x"]).unwrap(), mount);
        let report = engine.flush().unwrap();
        assert_eq!(report.units, 3);
        assert_eq!(report.created, 2);
        assert!(report.did_commit());
        assert!(engine.is_idle());
        assert_eq!(engine.host().render_tree(mount), "<root>\n  <p>\n    \"x\"\n");
    }

    #[test]
    fn test_queued_request_applied_on_next_tick() {
        let (mut engine, mount) = engine();
        let handle = engine.render_handle();
        handle.request(build("p", Props::new(), ["x"]).unwrap(), mount);
        assert!(handle.is_pending());
        assert!(!engine.is_idle());

        engine.flush().unwrap();
        assert!(!handle.is_pending());
        assert!(engine.host().mutations().iter().any(Mutation::is_structural));
    }

    #[test]
    fn test_failed_commit_discards_baseline_and_remounts() {
        let (mut engine, mount) = engine();
        engine.render(build("p", Props::new(), ["x"]).unwrap(), mount);
        engine.flush().unwrap();
        let first = engine.host().children(mount)[0];

        engine.host_mut().fail_on_property("id");
        engine.render(build("p", Props::new().with("id", "y"), ["x"]).unwrap(), mount);
        assert!(engine.flush().is_err());
        assert!(engine.current().is_none());
        assert_eq!(engine.mounted().len(), 1);

        engine.host_mut().clear_failures();
        engine.render(build("p", Props::new(), ["z"]).unwrap(), mount);
        let report = engine.flush().unwrap();
        let summary = report.committed.unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.placed, 2);
        assert_ne!(engine.host().children(mount)[0], first);
        assert_eq!(engine.host().render_tree(mount), "<root>\n  <p>\n    \"z\"\n");
    }

    #[test]
    fn test_builder_rejects_zero_unit_cap() {
        let result = Engine::builder(MemoryHost::new()).max_units_per_tick(0).build();
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_builder_applies_config() {
        let engine = Engine::builder(MemoryHost::new())
            .min_slice_remaining(std::time::Duration::from_micros(250))
            .max_units_per_tick(3)
            .build()
            .unwrap();
        assert_eq!(engine.config().min_slice_remaining_us, 250);
        assert_eq!(engine.config().max_units_per_tick, Some(3));
    }
}
