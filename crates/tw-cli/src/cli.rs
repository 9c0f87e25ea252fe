//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Timing mark collector.
///
/// Distills timing snapshots into grouped marks and delivers them to a
/// collector under a debounced reporting policy.
#[derive(Debug, Parser)]
#[command(name = "tw", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the grouped timeline derived from a timing snapshot.
    Show {
        /// Path to a JSON timing snapshot.
        snapshot: PathBuf,

        /// Emit raw JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Deliver the derived timeline to a collector.
    Report {
        /// Path to a JSON timing snapshot.
        snapshot: PathBuf,

        /// Collector URL; falls back to the configured endpoint.
        #[arg(long)]
        url: Option<String>,

        /// Flush right away instead of waiting out the debounce window.
        #[arg(long)]
        immediate: bool,
    },
}
