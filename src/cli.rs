//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tendril - interruptible UI reconciliation
#[derive(Parser, Debug)]
#[command(name = "tendril")]
#[command(version)]
#[command(about = "Render declarative trees into a host tree, one unit of work at a time")]
#[command(
    long_about = "tendril reconciles JSON element descriptions against the previously committed tree and prints the host mutations each render issues."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render scene files in order into an in-memory host
    Render {
        /// JSON description files; each one is rendered over the previous
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Process at most this many units per tick
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        units_per_tick: Option<u64>,

        /// Engine configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Run the built-in greeting and input-echo scenes
    Demo {
        /// Process at most this many units per tick
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        units_per_tick: Option<u64>,

        /// Print results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_parses_files_and_options() {
        let cli = Cli::try_parse_from([
            "tendril", "render", "a.json", "b.json", "-u", "3", "--json",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Render {
                ref files,
                units_per_tick: Some(3),
                config: None,
                json: true,
            } if files == &[PathBuf::from("a.json"), PathBuf::from("b.json")]
        ));
    }

    #[test]
    fn test_zero_units_per_tick_is_rejected() {
        let result = Cli::try_parse_from(["tendril", "demo", "--units-per-tick", "0"]);
        assert!(result.is_err());
    }
}
