//! Interruptible reconciliation of description trees onto a host tree.
//!
//! This crate turns [`Description`](tendril_core::Description) trees into
//! host mutations in two phases:
//!
//! - **Reconcile**: a pending generation of work units is built one unit
//!   per step, each unit diffed by position against the last committed
//!   generation. This phase can stop between any two units and resume on
//!   the next tick.
//! - **Commit**: once every unit is built, deletions and then placements
//!   and property patches are applied to the host in one pass.
//!
//! # Key Concepts
//!
//! ## Generations
//!
//! `current` is the last committed work-unit tree and is read-only while
//! `pending` is built. Each pending unit links back to its counterpart in
//! `current` through an [`Alternate`] handle.
//!
//! ## Effects
//!
//! - `Update` - same type at the same position; reuse the host node
//! - `Place` - new or changed type; create and insert a host node
//! - deletions - old units without a counterpart, removed before anything
//!   else is applied
//!
//! # Example
//!
//! ```
//! use tendril_core::{build, Props};
//! use tendril_reconciler::{Engine, MemoryHost, UnitBudget};
//!
//! let mut host = MemoryHost::new();
//! let mount = host.create_container("root");
//! let mut engine = Engine::new(host);
//!
//! engine.render(build("p", Props::new().with("id", "greeting"), ["hello"])?, mount);
//!
//! // Two units fit in this slice: nothing is visible yet.
//! let report = engine.tick(&UnitBudget::new(2))?;
//! assert!(report.yielded);
//! assert!(engine.host().children(mount).is_empty());
//!
//! engine.flush()?;
//! assert_eq!(engine.host().text_content(mount), "hello");
//! # Ok::<(), tendril_core::Error>(())
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod commit;
pub mod config;
pub mod engine;
pub mod host;
pub mod memory;
pub mod patch;
pub mod reconciler;
pub mod scheduler;
pub mod unit;

// Re-export main types
pub use commit::{commit, unmount_all, CommitSummary, MountedNodes};
pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder, RenderHandle};
pub use host::{default_event_name, HostBinder, EVENT_PREFIX};
pub use memory::{HostSnapshot, MemoryHost, Mutation, NodeId};
pub use patch::{apply_ops, diff_props, PropOp};
pub use reconciler::{reconcile_children, ReconcileSummary};
pub use scheduler::{
    perform_unit, should_yield, Deadline, Phase, SliceDeadline, TickReport, Unbounded, UnitBudget,
    UnitOutcome,
};
pub use unit::{Alternate, Effect, Generation, Source, UnitId, WorkUnit};
