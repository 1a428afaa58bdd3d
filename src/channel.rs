//! Per-session response channel with a background forced-flush task.
//!
//! [`ResponseChannel`] owns one [`ResponseQueue`] together with the
//! [`ResponseProcessor`] that applies its responses. Transport callbacks and
//! the flush task share them behind a single mutex, so every queue operation
//! is serialised no matter which task or thread triggers it.
//!
//! The flush task sleeps until the queue's flush deadline. Each operation
//! that may move the deadline wakes it so it can re-read the deadline. When
//! the deadline passes the task runs [`ResponseQueue::force_flush`].

use std::{
    fmt::Display,
    future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::{
    select,
    sync::Notify,
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    error::ChannelError,
    queue::{ResponseProcessor, ResponseQueue},
    request::{HttpRequestOptions, Request},
    sequence::{SequenceNo, Sequenced},
};

struct State<R, P> {
    queue: ResponseQueue<R>,
    processor: P,
    closed: bool,
}

struct Shared<R, P> {
    state: Mutex<State<R, P>>,
    rearm: Notify,
}

impl<R, P> Shared<R, P> {
    fn lock(&self) -> MutexGuard<'_, State<R, P>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R, P> Shared<R, P>
where
    R: Sequenced,
    P: ResponseProcessor<R>,
    P::Error: Display,
{
    fn flush_if_due(&self, now: Instant) {
        let mut guard = self.lock();
        let State {
            queue,
            processor,
            closed,
        } = &mut *guard;
        if *closed || !queue.is_flush_due(now) {
            return;
        }
        if let Err(error) = queue.force_flush(processor) {
            error!(%error, remaining = queue.size(), "forced flush failed to apply response");
        }
    }
}

/// A response queue bound to its processor and driven by a flush task.
///
/// Create one per session with [`ResponseChannel::spawn`]; the channel must
/// be created inside a tokio runtime. Dropping the channel cancels the flush
/// task; [`ResponseChannel::close`] additionally waits for it to finish.
///
/// # Examples
///
/// ```
/// use std::convert::Infallible;
///
/// use resequencer::{channel::ResponseChannel, queue::ResponseQueue, response::Response};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let channel = ResponseChannel::spawn(ResponseQueue::new(), |_: Response| {
///     Ok::<_, Infallible>(true)
/// });
/// channel.add(Response::sequenced(2u64)).expect("channel open");
/// assert_eq!(channel.size(), 1);
/// channel
///     .process(Some(Response::sequenced(1u64)))
///     .expect("channel open");
/// assert_eq!(channel.size(), 0);
/// channel.close().await;
/// # }
/// ```
pub struct ResponseChannel<R, P> {
    shared: Arc<Shared<R, P>>,
    shutdown: CancellationToken,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl<R, P> ResponseChannel<R, P>
where
    R: Sequenced + Send + 'static,
    P: ResponseProcessor<R> + Send + 'static,
    P::Error: Display,
{
    /// Bind `queue` to `processor` and start the flush task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(queue: ResponseQueue<R>, processor: P) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                queue,
                processor,
                closed: false,
            }),
            rearm: Notify::new(),
        });
        let shutdown = CancellationToken::new();
        let flush_task = tokio::spawn(run_flush_task(Arc::clone(&shared), shutdown.clone()));
        debug!("response channel opened");
        Self {
            shared,
            shutdown,
            flush_task: Mutex::new(Some(flush_task)),
        }
    }
}

impl<R, P> ResponseChannel<R, P>
where
    R: Sequenced,
    P: ResponseProcessor<R>,
{
    /// Queue a response without processing anything.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] after [`close`](Self::close).
    pub fn add(&self, response: R) -> Result<(), ChannelError<P::Error>> {
        {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(ChannelError::Closed);
            }
            state.queue.add(response);
        }
        self.shared.rearm.notify_one();
        Ok(())
    }

    /// Optionally queue `response`, then apply every response that is in
    /// order. See [`ResponseQueue::process`].
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] after [`close`](Self::close) and
    /// [`ChannelError::Processing`] when the processor fails.
    pub fn process(&self, response: Option<R>) -> Result<bool, ChannelError<P::Error>> {
        let result = {
            let mut guard = self.shared.lock();
            let State {
                queue,
                processor,
                closed,
            } = &mut *guard;
            if *closed {
                return Err(ChannelError::Closed);
            }
            queue.process(response, processor)
        };
        self.shared.rearm.notify_one();
        result.map_err(ChannelError::Processing)
    }

    /// Number of responses waiting to be applied.
    #[must_use]
    pub fn size(&self) -> usize { self.shared.lock().queue.size() }

    /// Highest sequence number applied so far.
    #[must_use]
    pub fn last_processed(&self) -> SequenceNo { self.shared.lock().queue.last_processed() }

    /// Instant at which the pending forced flush falls due, if any.
    #[must_use]
    pub fn flush_deadline(&self) -> Option<Instant> { self.shared.lock().queue.flush_deadline() }

    /// Stamp the acknowledgement into a request body.
    pub fn prepare_request(&self, request: &mut Request) {
        self.shared.lock().queue.prepare_request(request);
    }

    /// Stamp the acknowledgement into transport headers.
    pub fn prepare_http_request(&self, options: &mut HttpRequestOptions) {
        self.shared.lock().queue.prepare_http_request(options);
    }

    /// Run `f` with exclusive access to the processor.
    pub fn with_processor<T>(&self, f: impl FnOnce(&mut P) -> T) -> T {
        f(&mut self.shared.lock().processor)
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.shared.lock().closed }

    /// Stop accepting responses and wait for the flush task to exit.
    ///
    /// Responses still queued are dropped immediately without being applied.
    pub async fn close(&self) {
        let dropped = {
            let mut state = self.shared.lock();
            state.closed = true;
            state.queue.clear()
        };
        self.shutdown.cancel();
        let handle = self
            .flush_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && let Err(error) = handle.await
        {
            warn!(%error, "flush task terminated abnormally");
        }
        debug!(dropped, "response channel closed");
    }
}

impl<R, P> Drop for ResponseChannel<R, P> {
    fn drop(&mut self) { self.shutdown.cancel(); }
}

async fn run_flush_task<R, P>(shared: Arc<Shared<R, P>>, shutdown: CancellationToken)
where
    R: Sequenced,
    P: ResponseProcessor<R>,
    P::Error: Display,
{
    loop {
        let deadline = shared.lock().queue.flush_deadline();
        let rearmed = shared.rearm.notified();
        select! {
            biased;
            () = shutdown.cancelled() => break,
            () = rearmed => {}
            () = sleep_until_deadline(deadline) => shared.flush_if_due(Instant::now()),
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
