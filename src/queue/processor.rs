//! Consumer side of the response queue.

/// Applies responses released by a [`ResponseQueue`](super::ResponseQueue).
///
/// The queue calls [`process_response`](Self::process_response) once per
/// response, synchronously and in final delivery order. The returned flag
/// reports application-level success and is only surfaced to the caller of
/// [`ResponseQueue::process`](super::ResponseQueue::process) for the response
/// that call supplied. It has no effect on the queue's bookkeeping.
///
/// Each call should apply its response atomically. An `Err` stops the current
/// pass; the failing response counts as handed off but its sequence number is
/// not recorded as applied.
///
/// Closures returning `Result<bool, E>` implement the trait directly:
///
/// ```
/// use resequencer::{queue::ResponseQueue, response::Response};
///
/// let mut applied = Vec::new();
/// let mut queue = ResponseQueue::new();
/// queue.add(Response::sequenced(2u64));
/// let ok = queue
///     .process(Some(Response::sequenced(1u64)), &mut |response: Response| {
///         applied.push(response.sequence_no);
///         Ok::<_, std::convert::Infallible>(true)
///     })
///     .expect("infallible");
/// assert!(ok);
/// assert_eq!(applied.len(), 2);
/// ```
pub trait ResponseProcessor<R> {
    /// Failure raised while applying a response.
    type Error;

    /// Apply a single response.
    ///
    /// # Errors
    ///
    /// Implementations return an error when the response cannot be applied;
    /// the queue propagates it unchanged.
    fn process_response(&mut self, response: R) -> Result<bool, Self::Error>;
}

impl<R, E, F> ResponseProcessor<R> for F
where
    F: FnMut(R) -> Result<bool, E>,
{
    type Error = E;

    fn process_response(&mut self, response: R) -> Result<bool, E> { self(response) }
}
