//! # tendril
//!
//! Command-line entry point. Parses arguments, sets up logging and hands the
//! command to the dispatcher in [`tendril::commands`].
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`), so stdout
//! only carries rendered output.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tendril::cli::Cli;
use tendril::commands::execute_command;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();
    info!(version = env!("CARGO_PKG_VERSION"), "tendril starting");

    execute_command(cli.command)
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
