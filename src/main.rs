//! Binary replaying captured responses through a response queue.
//!
//! Parses CLI arguments and prints the order in which responses would be
//! applied.

mod cli;
mod replay;

use std::{
    fs::File,
    io::{self, BufReader},
    time::Duration,
};

use clap::Parser;

use crate::{
    cli::{Cli, Command},
    replay::{ReplayOptions, replay},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they never mix with the delivery order on stdout.
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let Command::Replay {
        input,
        force,
        flush_timeout_ms,
    } = Cli::parse().command;
    let options = ReplayOptions {
        force,
        flush_timeout: Duration::from_millis(flush_timeout_ms),
    };
    let stdout = io::stdout().lock();
    let summary = match input {
        Some(path) => replay(BufReader::new(File::open(path)?), stdout, options)?,
        None => replay(io::stdin().lock(), stdout, options)?,
    };
    eprintln!("#ACK {} ({} still queued)", summary.ack, summary.queued);
    Ok(())
}
