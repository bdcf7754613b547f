#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # tendril
//!
//! Interruptible reconciliation of declarative UI trees.
//!
//! This library re-exports the tendril workspace crates and adds the scene
//! runner and demo scenes behind the `tendril` binary.

// Re-export all crates
pub use tendril_core;
pub use tendril_reconciler;

pub mod cli;
pub mod commands;
pub mod demo;
pub mod scene;
