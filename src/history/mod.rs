//! Peer-side bookkeeping for responses the client has not yet acknowledged.
//!
//! The peer keeps every sequenced response it sends until a request arrives
//! whose `#ACK` covers it. That lets the peer answer a retried request with
//! the response it already produced, and rebuild the client's queue after a
//! reconnect by sending one `combined` response in place of everything
//! unconfirmed.

pub mod requests;

use std::{collections::VecDeque, num::NonZeroUsize};

pub use requests::RequestHistory;
use tracing::{debug, warn};

use crate::{response::Response, sequence::SequenceNo};

/// Default number of unacknowledged responses retained per session.
pub const DEFAULT_RESPONSE_CAPACITY: NonZeroUsize = NonZeroUsize::new(50).unwrap();

#[derive(Clone, Debug)]
struct Recorded {
    sequence_no: SequenceNo,
    request_sequence_no: Option<SequenceNo>,
    response: Response,
}

/// Bounded, ordered store of responses awaiting acknowledgement.
///
/// # Examples
///
/// ```
/// use resequencer::{history::ResponseHistory, response::Response, sequence::SequenceNo};
///
/// let mut history = ResponseHistory::default();
/// history.register(Response::sequenced(1u64), Some(SequenceNo::new(10)));
/// history.register(Response::sequenced(2u64), Some(SequenceNo::new(11)));
///
/// assert_eq!(history.confirm_processed(SequenceNo::new(1)), 1);
/// assert!(history.response_for_request(SequenceNo::new(10)).is_none());
/// assert!(history.response_for_request(SequenceNo::new(11)).is_some());
/// ```
#[derive(Clone, Debug)]
pub struct ResponseHistory {
    entries: VecDeque<Recorded>,
    capacity: NonZeroUsize,
}

impl Default for ResponseHistory {
    fn default() -> Self { Self::with_capacity(DEFAULT_RESPONSE_CAPACITY) }
}

impl ResponseHistory {
    /// Create a history that retains at most `capacity` responses.
    #[must_use]
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.get()),
            capacity,
        }
    }

    /// Number of retained responses.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Returns true when every sent response has been acknowledged.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Remember a sent response, optionally linked to the request it answers.
    ///
    /// Responses without a sequence number are not tracked and the call
    /// returns `false`. Registering a number twice replaces the earlier
    /// response. When the history is full the oldest response is evicted.
    pub fn register(&mut self, response: Response, request_sequence_no: Option<SequenceNo>) -> bool {
        let Some(sequence_no) = response.sequence_no else {
            return false;
        };
        let recorded = Recorded {
            sequence_no,
            request_sequence_no,
            response,
        };
        match self
            .entries
            .binary_search_by_key(&sequence_no, |entry| entry.sequence_no)
        {
            Ok(index) => self.entries[index] = recorded,
            Err(index) => self.entries.insert(index, recorded),
        }
        while self.entries.len() > self.capacity.get() {
            if let Some(evicted) = self.entries.pop_front() {
                warn!(
                    sequence_no = %evicted.sequence_no,
                    capacity = self.capacity.get(),
                    "response history full; evicting unacknowledged response"
                );
            }
        }
        true
    }

    /// Drop every response the client has acknowledged with `ack`.
    ///
    /// Returns the number of responses removed.
    pub fn confirm_processed(&mut self, ack: SequenceNo) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.sequence_no > ack);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!(%ack, removed, "acknowledged responses removed from history");
        }
        removed
    }

    /// The response produced for request `request_sequence_no`, if retained.
    #[must_use]
    pub fn response_for_request(&self, request_sequence_no: SequenceNo) -> Option<&Response> {
        self.entries
            .iter()
            .find(|entry| entry.request_sequence_no == Some(request_sequence_no))
            .map(|entry| &entry.response)
    }

    /// Unacknowledged responses in ascending sequence order.
    pub fn unconfirmed(&self) -> impl Iterator<Item = &Response> {
        self.entries.iter().map(|entry| &entry.response)
    }

    /// Merge every unacknowledged response into one `combined` response.
    ///
    /// The result carries the highest retained sequence number. Adapter data
    /// is merged with later responses winning, events are concatenated in
    /// order, and the last reported error is kept. Returns `None` when
    /// nothing is outstanding.
    #[must_use]
    pub fn combined_unconfirmed(&self) -> Option<Response> {
        let last = self.entries.back()?;
        let mut combined = Response::sequenced(last.sequence_no).with_combined(true);
        for entry in &self.entries {
            let response = &entry.response;
            combined.adapter_data.extend(
                response
                    .adapter_data
                    .iter()
                    .map(|(id, data)| (id.clone(), data.clone())),
            );
            combined.events.extend(response.events.iter().cloned());
            if response.error.is_some() {
                combined.error.clone_from(&response.error);
            }
            combined.extra.extend(
                response
                    .extra
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            );
        }
        Some(combined)
    }
}
