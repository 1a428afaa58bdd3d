//! Shared utilities for integration tests.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::time::Duration;

use resequencer::{ResponseChannel, ResponseQueue};
use resequencer_testing::RecordingProcessor;

/// Shared result type for integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Flush delay used by channel tests; short enough to read clearly in
/// assertions, long enough to distinguish from zero.
pub const FLUSH_TIMEOUT: Duration = Duration::from_millis(500);

/// Spawn a channel with a recording processor, returning a recorder clone for
/// assertions.
pub fn recording_channel() -> TestResult<(
    ResponseChannel<resequencer::Response, RecordingProcessor>,
    RecordingProcessor,
)> {
    let recorder = RecordingProcessor::new();
    let queue = ResponseQueue::builder().flush_timeout(FLUSH_TIMEOUT).build()?;
    Ok((ResponseChannel::spawn(queue, recorder.clone()), recorder))
}
