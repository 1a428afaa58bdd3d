//! Metric helpers for `resequencer`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. With the
//! `metrics` feature disabled the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the counter tracking responses handed to a processor.
pub const RESPONSES_PROCESSED: &str = "resequencer_responses_processed_total";
/// Name of the counter tracking stale or duplicate responses.
pub const RESPONSES_DISCARDED: &str = "resequencer_responses_discarded_total";
/// Name of the counter tracking passes that stopped at a sequence gap.
pub const GAPS_DETECTED: &str = "resequencer_gaps_detected_total";
/// Name of the counter tracking timeout-driven flushes.
pub const FORCED_FLUSHES: &str = "resequencer_forced_flushes_total";
/// Name of the gauge tracking responses waiting in a queue.
pub const QUEUE_DEPTH: &str = "resequencer_queue_depth";

/// Reason a response was dropped without being processed.
#[derive(Clone, Copy, Debug)]
pub enum DiscardReason {
    /// The sequence number was already applied.
    Stale,
    /// The same sequence number is already waiting in the queue.
    Duplicate,
    /// The sequence number is the reserved [`SequenceNo::MAX`](crate::sequence::SequenceNo::MAX).
    OutOfRange,
}

impl DiscardReason {
    #[cfg(feature = "metrics")]
    fn as_str(self) -> &'static str {
        match self {
            DiscardReason::Stale => "stale",
            DiscardReason::Duplicate => "duplicate",
            DiscardReason::OutOfRange => "out_of_range",
        }
    }
}

/// Record a response handed to a processor.
pub fn inc_processed(forced: bool) {
    #[cfg(feature = "metrics")]
    counter!(RESPONSES_PROCESSED, "forced" => if forced { "true" } else { "false" }).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = forced;
}

/// Record a discarded response.
pub fn inc_discarded(reason: DiscardReason) {
    #[cfg(feature = "metrics")]
    counter!(RESPONSES_DISCARDED, "reason" => reason.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = reason;
}

/// Record a processing pass that stopped at a gap.
pub fn inc_gaps() {
    #[cfg(feature = "metrics")]
    counter!(GAPS_DETECTED).increment(1);
}

/// Record a forced flush.
pub fn inc_forced_flushes() {
    #[cfg(feature = "metrics")]
    counter!(FORCED_FLUSHES).increment(1);
}

/// Apply a queue's change in length to the shared depth gauge.
///
/// Every queue reports only its own delta, so the gauge holds the number of
/// responses waiting across all queues in the process.
#[cfg_attr(
    feature = "metrics",
    expect(
        clippy::cast_precision_loss,
        reason = "queue depths stay far below f64's exact integer range"
    )
)]
pub fn adjust_queue_depth(previous: usize, current: usize) {
    #[cfg(feature = "metrics")]
    if current > previous {
        gauge!(QUEUE_DEPTH).increment((current - previous) as f64);
    } else if previous > current {
        gauge!(QUEUE_DEPTH).decrement((previous - current) as f64);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = (previous, current);
}
