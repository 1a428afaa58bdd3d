//! Command line interface for the `resequencer` binary.
//!
//! The binary replays captured responses through a response queue so the
//! delivery order can be inspected offline.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Command line arguments for the `resequencer` binary.
#[derive(Debug, Parser)]
#[command(
    name = "resequencer",
    version,
    about = "Replay sequence-numbered responses in causal order"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Feed JSON-lines responses through a queue and print the delivery order.
    Replay {
        /// File with one JSON response per line; reads stdin when omitted.
        input: Option<PathBuf>,
        /// Force out responses still blocked by a gap once input ends.
        #[arg(short, long)]
        force: bool,
        /// Forced-flush delay in milliseconds.
        #[arg(long, default_value_t = 10_000)]
        flush_timeout_ms: u64,
    },
}
