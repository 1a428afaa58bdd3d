//! Offline replay of captured responses.
//!
//! Each input line holds one JSON response in arrival order. Lines are fed
//! through a [`ResponseQueue`] exactly as a transport would deliver them and
//! every released response is written out as `#<n> <id>`, or `- <id>` for
//! unordered responses.

use std::{
    io::{self, BufRead, Write},
    time::Duration,
};

use resequencer::{
    error::{ConfigError, WireError},
    queue::{ResponseProcessor, ResponseQueue},
    response::Response,
    sequence::SequenceNo,
};
use thiserror::Error;
use tracing::info;

/// Errors aborting a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("line {line}: {source}")]
    Wire {
        line: usize,
        #[source]
        source: WireError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Replay settings taken from the command line.
#[derive(Clone, Copy, Debug)]
pub struct ReplayOptions {
    pub force: bool,
    pub flush_timeout: Duration,
}

/// Outcome of a replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplaySummary {
    pub delivered: usize,
    pub ack: SequenceNo,
    pub queued: usize,
}

struct Printer<W> {
    out: W,
    delivered: usize,
}

impl<W: Write> ResponseProcessor<Response> for Printer<W> {
    type Error = io::Error;

    fn process_response(&mut self, response: Response) -> io::Result<bool> {
        let id = response.id.as_deref().unwrap_or("");
        match response.sequence_no {
            Some(seq) => writeln!(self.out, "#{seq} {id}")?,
            None => writeln!(self.out, "- {id}")?,
        }
        self.delivered += 1;
        Ok(!response.is_error())
    }
}

/// Replay every line of `input`, writing the delivery order to `out`.
///
/// # Errors
///
/// Returns [`ReplayError`] on unreadable input, malformed JSON or write
/// failures.
pub fn replay<Rd: BufRead, W: Write>(
    input: Rd,
    out: W,
    options: ReplayOptions,
) -> Result<ReplaySummary, ReplayError> {
    let mut queue = ResponseQueue::builder()
        .flush_timeout(options.flush_timeout)
        .build()?;
    let mut printer = Printer { out, delivered: 0 };

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = Response::from_json(&line).map_err(|source| ReplayError::Wire {
            line: index + 1,
            source,
        })?;
        queue.process(Some(response), &mut printer)?;
    }

    if options.force && !queue.is_empty() {
        queue.force_flush(&mut printer)?;
    }

    let summary = ReplaySummary {
        delivered: printer.delivered,
        ack: queue.last_processed(),
        queued: queue.size(),
    };
    info!(
        delivered = summary.delivered,
        ack = %summary.ack,
        queued = summary.queued,
        "replay finished"
    );
    Ok(summary)
}
