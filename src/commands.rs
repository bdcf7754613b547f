//! CLI command handlers.
//!
//! Every handler returns `anyhow::Result` and reports failures to the caller.
//! Rendered trees and mutations go to stdout; logs go to stderr.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tendril_reconciler::EngineConfig;
use tracing::info;

use crate::cli::Commands;
use crate::demo::run_demo;
use crate::scene::{run_scenes, GenerationOutput, Slicing};

/// Execute a CLI command.
///
/// This is the main command dispatcher that routes to the appropriate handler.
pub fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Render {
            files,
            units_per_tick,
            config,
            json,
        } => cmd_render(&files, units_per_tick, config.as_deref(), json),

        Commands::Demo {
            units_per_tick,
            json,
        } => cmd_demo(units_per_tick, json),
    }
}

fn cmd_render(
    files: &[PathBuf],
    units_per_tick: Option<u64>,
    config: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = match config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load engine config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let slicing = slicing(units_per_tick)?;
    info!(files = files.len(), ?slicing, "rendering scenes");

    let outputs = run_scenes(files, config, slicing).context("Render failed")?;
    print_outputs(&outputs, json)
}

fn cmd_demo(units_per_tick: Option<u64>, json: bool) -> Result<()> {
    let slicing = slicing(units_per_tick)?;
    let outputs = run_demo(EngineConfig::default(), slicing).context("Demo failed")?;
    print_outputs(&outputs, json)
}

fn slicing(units_per_tick: Option<u64>) -> Result<Slicing> {
    units_per_tick.map_or(Ok(Slicing::Unbounded), |units| {
        let units = usize::try_from(units).context("--units-per-tick is too large")?;
        Ok(Slicing::Units(units))
    })
}

fn print_outputs(outputs: &[GenerationOutput], json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(outputs).context("Failed to serialize render output")?;
        println!("{rendered}");
        return Ok(());
    }

    for output in outputs {
        println!(
            "== {} ({} ticks, {} units)",
            output.source, output.ticks, output.report.units
        );
        if output.mutations.is_empty() {
            println!("  no mutations");
        }
        for mutation in &output.mutations {
            println!("  {mutation}");
        }
        print!("{}", output.rendered);
    }
    Ok(())
}
