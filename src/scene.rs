//! Scene runner: render a sequence of JSON descriptions into a memory host.
//!
//! Each scene file is one render. Scenes are rendered in order against the
//! same engine, so every file after the first is diffed against the tree
//! the previous one committed.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::{Path, PathBuf};

use serde::Serialize;
use tendril_core::{Description, Error, Result, ResultExt};
use tendril_reconciler::{
    Engine, EngineConfig, HostSnapshot, MemoryHost, Mutation, NodeId, TickReport, Unbounded,
    UnitBudget,
};
use tracing::info;

/// Kind of the container every scene is mounted into.
pub const MOUNT_KIND: &str = "root";

/// How the engine is driven between renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Slicing {
    /// One unbounded tick per render.
    #[default]
    Unbounded,
    /// Ticks of at most this many units until the render commits.
    Units(usize),
}

/// Output of one rendered scene.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutput {
    /// Where the description came from.
    pub source: String,
    /// Ticks needed to commit.
    pub ticks: usize,
    /// Merged report of those ticks.
    pub report: TickReport,
    /// Host mutations issued while rendering this scene.
    pub mutations: Vec<Mutation>,
    /// Host tree after the commit.
    pub tree: Option<HostSnapshot>,
    /// Printed host tree after the commit.
    #[serde(skip)]
    pub rendered: String,
}

/// Drives an engine over a [`MemoryHost`] one scene at a time.
#[derive(Debug)]
pub struct SceneRunner {
    engine: Engine<MemoryHost>,
    mount: NodeId,
    slicing: Slicing,
}

impl SceneRunner {
    /// Create a runner with a fresh host and mount container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the config or slicing is invalid.
    pub fn new(config: EngineConfig, slicing: Slicing) -> Result<Self> {
        if slicing == Slicing::Units(0) {
            return Err(Error::invalid_config("units per tick must be greater than 0"));
        }
        let mut host = MemoryHost::new();
        let mount = host.create_container(MOUNT_KIND);
        let engine = Engine::builder(host).with_config(config).build()?;
        Ok(Self {
            engine,
            mount,
            slicing,
        })
    }

    pub const fn mount(&self) -> NodeId {
        self.mount
    }

    pub const fn engine(&self) -> &Engine<MemoryHost> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine<MemoryHost> {
        &mut self.engine
    }

    /// Render a description and tick until the engine is idle.
    ///
    /// # Errors
    ///
    /// Returns the host failure that aborted the render.
    pub fn render(&mut self, source: &str, description: Description) -> Result<GenerationOutput> {
        self.engine.host_mut().take_mutations();
        self.engine.render(description, self.mount);
        self.settle(source)
    }

    /// Tick until idle, applying any queued render requests.
    ///
    /// # Errors
    ///
    /// Returns the host failure that aborted the render.
    pub fn settle(&mut self, source: &str) -> Result<GenerationOutput> {
        let mut report = TickReport::default();
        let mut ticks = 0_usize;
        while !self.engine.is_idle() {
            let tick = match self.slicing {
                Slicing::Unbounded => self.engine.tick(&Unbounded),
                Slicing::Units(units) => self.engine.tick(&UnitBudget::new(units)),
            }
            .log_failure("render aborted")?;
            report.merge(&tick);
            ticks = ticks.saturating_add(1);
        }

        let host = self.engine.host_mut();
        let mutations = host.take_mutations();
        let tree = host.snapshot(self.mount);
        let rendered = host.render_tree(self.mount);
        info!(source, ticks, mutations = mutations.len(), "scene settled");

        Ok(GenerationOutput {
            source: source.to_string(),
            ticks,
            report,
            mutations,
            tree,
            rendered,
        })
    }
}

/// Load a JSON description file.
///
/// # Errors
///
/// Returns [`Error::FileReadFailed`] if the file cannot be read, and
/// everything [`Description::from_json_str`] returns.
pub fn load_description(path: &Path) -> Result<Description> {
    let source = std::fs::read_to_string(path)
        .map_err(|e| Error::file_read_failed(path, e.to_string()))?;
    Description::from_json_str(&source)
}

/// Render each scene file in order on one runner.
///
/// # Errors
///
/// Stops at the first file that fails to load or render.
pub fn run_scenes(
    paths: &[PathBuf],
    config: EngineConfig,
    slicing: Slicing,
) -> Result<Vec<GenerationOutput>> {
    let mut runner = SceneRunner::new(config, slicing)?;
    paths
        .iter()
        .map(|path| {
            let description = load_description(path)?;
            runner.render(&path.display().to_string(), description)
        })
        .collect()
}
