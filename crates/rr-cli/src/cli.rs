//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Race replay engine.
///
/// Replays a recorded telemetry log, reconstructing ranking, laps,
/// sectors, gaps, and wear estimates per vehicle, with caution detection
/// and pit advisories from an external classifier.
#[derive(Debug, Parser)]
#[command(name = "rr", version, about, long_about = None)]
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
    /// Load a telemetry log and print a summary.
    Inspect {
        /// Path to the JSONL telemetry log.
        file: PathBuf,
    },

    /// List the caution periods detected in a log.
    Cautions {
        /// Path to the JSONL telemetry log.
        file: PathBuf,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Replay the log tick by tick, printing one frame per tick.
    Replay {
        /// Path to the JSONL telemetry log.
        file: PathBuf,

        /// Playback rate multiplier (1-25).
        #[arg(long, default_value_t = 1)]
        rate: u32,

        /// Milliseconds between ticks; 0 replays as fast as possible.
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Stop after this many ticks instead of at the log end.
        #[arg(long)]
        ticks: Option<u64>,

        /// Emit one JSON snapshot per tick.
        #[arg(long)]
        json: bool,
    },

    /// Print the reconstructed race state at one cursor position.
    Snapshot {
        /// Path to the JSONL telemetry log.
        file: PathBuf,

        /// Cursor index to reconstruct at (clamped to the log).
        #[arg(long)]
        at: usize,

        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}
