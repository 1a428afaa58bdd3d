//! Ordering buffer for sequence-numbered responses.
//!
//! [`ResponseQueue`] accepts responses in whatever order the transport
//! delivers them and releases them to a [`ResponseProcessor`] in ascending
//! sequence order. Responses without a sequence number pass straight through
//! at the position they arrived. A gap in the sequence holds back everything
//! behind it until the missing response arrives or the flush deadline
//! expires, at which point [`ResponseQueue::force_flush`] releases the rest
//! regardless of order.
//!
//! The queue only tracks the flush deadline; something else has to wait for
//! it. [`ResponseChannel`](crate::channel::ResponseChannel) does this on a
//! tokio runtime.

pub mod builder;
pub mod processor;

use std::time::Duration;

pub use builder::ResponseQueueBuilder;
pub use processor::ResponseProcessor;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    metrics::{self, DiscardReason},
    request::{ACK_HEADER, HttpRequestOptions, Request},
    sequence::{SequenceNo, Sequenced},
};

/// Delay before a blocked queue is forced through.
pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on the missing numbers reported by
/// [`ResponseQueue::missing_sequence_nos`].
pub const MAX_REPORTED_MISSING: usize = 64;

#[derive(Debug)]
struct Entry<R> {
    id: u64,
    response: R,
}

impl<R: Sequenced> Entry<R> {
    fn sequence_no(&self) -> Option<SequenceNo> { self.response.sequence_no() }
}

/// Reorders responses by sequence number and releases them in causal order.
///
/// # Examples
///
/// ```
/// use resequencer::{queue::ResponseQueue, response::Response, sequence::SequenceNo};
///
/// let mut queue = ResponseQueue::new();
/// let mut order = Vec::new();
/// let mut apply = |response: Response| {
///     order.push(response.sequence_no);
///     Ok::<_, std::convert::Infallible>(true)
/// };
///
/// queue.add(Response::sequenced(2u64));
/// queue.add(Response::sequenced(1u64));
/// queue.process(None, &mut apply).expect("infallible");
///
/// assert_eq!(queue.size(), 0);
/// assert_eq!(queue.last_processed(), SequenceNo::new(2));
/// assert_eq!(order, [Some(SequenceNo::new(1)), Some(SequenceNo::new(2))]);
/// ```
#[derive(Debug)]
pub struct ResponseQueue<R> {
    entries: Vec<Entry<R>>,
    last_processed: SequenceNo,
    next_expected: SequenceNo,
    force: bool,
    flush_timeout: Duration,
    flush_deadline: Option<Instant>,
    next_entry_id: u64,
    reported_depth: usize,
}

impl<R: Sequenced> Default for ResponseQueue<R> {
    fn default() -> Self { Self::new() }
}

impl<R: Sequenced> ResponseQueue<R> {
    /// Create an empty queue using [`DEFAULT_FLUSH_TIMEOUT`].
    #[must_use]
    pub fn new() -> Self { Self::with_flush_timeout(DEFAULT_FLUSH_TIMEOUT) }

    /// Start building a queue with custom settings.
    #[must_use]
    pub fn builder() -> ResponseQueueBuilder<R> { ResponseQueueBuilder::default() }

    pub(crate) fn with_flush_timeout(flush_timeout: Duration) -> Self {
        Self {
            entries: Vec::new(),
            last_processed: SequenceNo::ZERO,
            next_expected: SequenceNo::FIRST,
            force: false,
            flush_timeout,
            flush_deadline: None,
            next_entry_id: 0,
            reported_depth: 0,
        }
    }

    /// Number of responses waiting to be handed to the processor.
    #[must_use]
    pub fn size(&self) -> usize { self.entries.len() }

    /// Returns true when no response is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Highest sequence number applied so far; zero before the first one.
    #[must_use]
    pub fn last_processed(&self) -> SequenceNo { self.last_processed }

    /// Sequence number the queue waits for before releasing held responses.
    #[must_use]
    pub fn next_expected(&self) -> SequenceNo { self.next_expected }

    /// Returns true while a forced flush is running.
    #[must_use]
    pub fn is_forcing(&self) -> bool { self.force }

    /// Configured forced-flush delay.
    #[must_use]
    pub fn flush_timeout(&self) -> Duration { self.flush_timeout }

    /// Instant at which the pending forced flush falls due, if one is armed.
    #[must_use]
    pub fn flush_deadline(&self) -> Option<Instant> { self.flush_deadline }

    /// Returns true if a forced flush is armed and `now` has reached it.
    #[must_use]
    pub fn is_flush_due(&self, now: Instant) -> bool {
        self.flush_deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Sequence numbers currently waiting, in queue order.
    #[must_use]
    pub fn outstanding_sequence_nos(&self) -> Vec<SequenceNo> {
        self.entries.iter().filter_map(Entry::sequence_no).collect()
    }

    /// Sequence numbers blocking the queue: those between the expected number
    /// and the highest queued one that have not arrived.
    ///
    /// At most [`MAX_REPORTED_MISSING`] numbers are returned.
    #[must_use]
    pub fn missing_sequence_nos(&self) -> Vec<SequenceNo> {
        let mut missing = Vec::new();
        let mut cursor = self.next_expected;
        for seq in self.entries.iter().filter_map(Entry::sequence_no) {
            while cursor < seq && missing.len() < MAX_REPORTED_MISSING {
                missing.push(cursor);
                cursor = cursor.next();
            }
            if missing.len() == MAX_REPORTED_MISSING {
                break;
            }
            cursor = cursor.max(seq.next());
        }
        missing
    }

    /// Queue a response without processing anything.
    ///
    /// Responses whose sequence number was already applied are dropped
    /// silently, so adding the same response twice has no further effect once
    /// it has been processed. The reserved [`SequenceNo::MAX`] is dropped with
    /// a warning. A `combined` response advances the counters so
    /// that it absorbs every earlier number still missing.
    pub fn add(&mut self, response: R) {
        self.enqueue(response);
        self.sync_flush_timer(Instant::now());
    }

    /// Optionally queue `response`, then release every response that is in
    /// order.
    ///
    /// Returns the processor's verdict for `response`, or `true` when no
    /// response was supplied or it was discarded as stale.
    ///
    /// # Errors
    ///
    /// Propagates the first processor error. Responses released before the
    /// failure stay applied; responses behind it stay queued.
    pub fn process<P>(&mut self, response: Option<R>, processor: &mut P) -> Result<bool, P::Error>
    where
        P: ResponseProcessor<R>,
    {
        let target = response.and_then(|response| self.enqueue(response));
        let result = self.release(target, processor);
        self.sync_flush_timer(Instant::now());
        result
    }

    /// Release every queued response regardless of gaps.
    ///
    /// Called when the flush deadline expires. Logs the numbers that never
    /// arrived before giving up on them.
    ///
    /// # Errors
    ///
    /// Propagates the first processor error; the remaining responses stay
    /// queued and the deadline is re-armed.
    pub fn force_flush<P>(&mut self, processor: &mut P) -> Result<(), P::Error>
    where
        P: ResponseProcessor<R>,
    {
        self.flush_deadline = None;
        if self.entries.is_empty() {
            return Ok(());
        }

        warn!(
            expected = %self.next_expected,
            last_processed = %self.last_processed,
            outstanding = ?self.outstanding_sequence_nos(),
            missing = ?self.missing_sequence_nos(),
            "forcing response queue flush past missing sequence numbers"
        );
        metrics::inc_forced_flushes();

        self.force = true;
        let result = self.release(None, processor);
        self.force = false;
        self.sync_flush_timer(Instant::now());
        result.map(|_| ())
    }

    /// Drop every queued response without applying it and disarm the flush
    /// deadline. The counters are left untouched.
    ///
    /// Returns the number of responses dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        self.sync_flush_timer(Instant::now());
        dropped
    }

    /// Stamp the acknowledgement into a request body.
    pub fn prepare_request(&self, request: &mut Request) { request.ack = Some(self.last_processed); }

    /// Stamp the acknowledgement into transport headers.
    pub fn prepare_http_request(&self, options: &mut HttpRequestOptions) {
        options.set_header(ACK_HEADER, self.last_processed.to_string());
    }

    /// Insert `response` in order and return its entry id, or `None` if it
    /// was discarded.
    fn enqueue(&mut self, response: R) -> Option<u64> {
        let sequence_no = response.sequence_no();
        if let Some(seq) = sequence_no {
            if seq == SequenceNo::MAX {
                warn!(sequence_no = %seq, "discarding response with reserved sequence number");
                metrics::inc_discarded(DiscardReason::OutOfRange);
                return None;
            }
            if seq <= self.last_processed {
                debug!(
                    sequence_no = %seq,
                    last_processed = %self.last_processed,
                    "discarding already processed response"
                );
                metrics::inc_discarded(DiscardReason::Stale);
                return None;
            }
            if response.is_combined() {
                self.last_processed = self.last_processed.max(seq.prev());
                self.next_expected = self.next_expected.max(seq);
                debug!(
                    sequence_no = %seq,
                    next_expected = %self.next_expected,
                    "combined response advanced expected sequence"
                );
            }
        }

        let id = self.next_entry_id;
        self.next_entry_id += 1;
        let entry = Entry { id, response };

        let Some(seq) = sequence_no else {
            self.entries.push(entry);
            return Some(id);
        };
        if self.entries.is_empty() {
            self.entries.push(entry);
            return Some(id);
        }

        let last_processed = self.last_processed;
        self.entries
            .retain(|queued| queued.sequence_no().is_none_or(|queued| queued > last_processed));
        if self.entries.iter().any(|queued| queued.sequence_no() == Some(seq)) {
            debug!(sequence_no = %seq, "discarding duplicate queued response");
            metrics::inc_discarded(DiscardReason::Duplicate);
            return None;
        }
        let position = self
            .entries
            .iter()
            .position(|queued| queued.sequence_no().is_some_and(|queued| queued > seq))
            .unwrap_or(self.entries.len());
        self.entries.insert(position, entry);
        Some(id)
    }

    /// Walk the queue once, handing in-order responses to `processor`.
    fn release<P>(&mut self, target: Option<u64>, processor: &mut P) -> Result<bool, P::Error>
    where
        P: ResponseProcessor<R>,
    {
        let mut success = true;
        let mut deferred = Vec::new();
        let mut blocked = false;
        let mut pending = std::mem::take(&mut self.entries).into_iter();

        while let Some(entry) = pending.next() {
            if blocked {
                deferred.push(entry);
                continue;
            }
            let sequence_no = entry.sequence_no();
            if let Some(seq) = sequence_no {
                if seq <= self.last_processed {
                    debug!(sequence_no = %seq, "dropping stale queued response");
                    metrics::inc_discarded(DiscardReason::Stale);
                    continue;
                }
                if !self.force && seq != self.next_expected {
                    debug!(
                        expected = %self.next_expected,
                        found = %seq,
                        "sequence gap detected; deferring remaining responses"
                    );
                    metrics::inc_gaps();
                    blocked = true;
                    deferred.push(entry);
                    continue;
                }
            }

            let id = entry.id;
            match processor.process_response(entry.response) {
                Ok(verdict) => {
                    if target == Some(id) {
                        success = verdict;
                    }
                    if let Some(seq) = sequence_no {
                        self.last_processed = seq;
                        self.next_expected = seq.next();
                    }
                    metrics::inc_processed(self.force);
                }
                Err(error) => {
                    deferred.extend(pending);
                    self.entries = deferred;
                    return Err(error);
                }
            }
        }

        self.entries = deferred;
        Ok(success)
    }

    /// Keep exactly one flush deadline armed while responses are waiting.
    fn sync_flush_timer(&mut self, now: Instant) {
        if self.entries.is_empty() {
            self.flush_deadline = None;
        } else if self.flush_deadline.is_none() {
            self.flush_deadline = Some(now + self.flush_timeout);
        }
        metrics::adjust_queue_depth(self.reported_depth, self.entries.len());
        self.reported_depth = self.entries.len();
    }
}

impl<R> Drop for ResponseQueue<R> {
    fn drop(&mut self) { metrics::adjust_queue_depth(self.reported_depth, 0); }
}

#[cfg(test)]
mod tests;
