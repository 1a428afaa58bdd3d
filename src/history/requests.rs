//! Window of request sequence numbers the peer has already handled.

use std::{collections::BTreeSet, num::NonZeroUsize};

use crate::sequence::SequenceNo;

/// Default number of processed request numbers remembered per session.
pub const DEFAULT_REQUEST_WINDOW: NonZeroUsize = NonZeroUsize::new(100).unwrap();

/// Remembers which requests were processed so retries can be recognised.
///
/// Only the most recent `window` numbers are kept; older ones are forgotten.
#[derive(Clone, Debug)]
pub struct RequestHistory {
    processed: BTreeSet<SequenceNo>,
    window: NonZeroUsize,
}

impl Default for RequestHistory {
    fn default() -> Self { Self::with_window(DEFAULT_REQUEST_WINDOW) }
}

impl RequestHistory {
    /// Create a history remembering at most `window` request numbers.
    #[must_use]
    pub fn with_window(window: NonZeroUsize) -> Self {
        Self {
            processed: BTreeSet::new(),
            window,
        }
    }

    /// Record `sequence_no` as processed.
    pub fn mark_processed(&mut self, sequence_no: SequenceNo) {
        self.processed.insert(sequence_no);
        while self.processed.len() > self.window.get() {
            self.processed.pop_first();
        }
    }

    /// Returns true if `sequence_no` was processed and is still remembered.
    #[must_use]
    pub fn is_processed(&self, sequence_no: SequenceNo) -> bool {
        self.processed.contains(&sequence_no)
    }
}
