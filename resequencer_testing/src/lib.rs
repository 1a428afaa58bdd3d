//! Utilities for exercising response queues and channels in tests.
//!
//! [`RecordingProcessor`] keeps every response it applies in a shared log so
//! tests can inspect delivery order even after the processor has been moved
//! into a [`ResponseChannel`](resequencer::ResponseChannel). The response
//! builders keep test setup short.
//!
//! ```rust
//! use resequencer::ResponseQueue;
//! use resequencer_testing::{RecordingProcessor, seq};
//!
//! let recorder = RecordingProcessor::new();
//! let mut processor = recorder.clone();
//! let mut queue = ResponseQueue::new();
//! queue.add(seq(2));
//! queue.process(Some(seq(1)), &mut processor).unwrap();
//! assert_eq!(recorder.sequence_nos(), [Some(1), Some(2)]);
//! ```

pub mod logging;
mod recording;

pub use logging::{LoggerHandle, logger};
pub use recording::{ProcessingFailed, RecordingProcessor};
use resequencer::Response;

/// A response carrying sequence number `n`.
#[must_use]
pub fn seq(n: u64) -> Response { Response::sequenced(n).with_id(format!("r{n}")) }

/// A `combined` response carrying sequence number `n`.
#[must_use]
pub fn combined(n: u64) -> Response { seq(n).with_combined(true) }

/// A response without a sequence number.
#[must_use]
pub fn unordered(id: &str) -> Response { Response::unordered().with_id(id) }

/// A response reporting an error from the peer.
#[must_use]
pub fn failed(n: u64) -> Response {
    let mut response = seq(n);
    response.error = Some(serde_json::json!({ "code": 5, "message": "peer failure" }));
    response
}
