//! Builder for configuring response queues.

use std::{marker::PhantomData, time::Duration};

use super::{DEFAULT_FLUSH_TIMEOUT, ResponseQueue};
use crate::{error::ConfigError, sequence::Sequenced};

/// Builder for [`ResponseQueue`].
///
/// The only tunable is the forced-flush delay, which defaults to
/// [`DEFAULT_FLUSH_TIMEOUT`]. Construct via [`ResponseQueue::builder`] or
/// [`Default::default`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use resequencer::{queue::ResponseQueue, response::Response};
///
/// let queue = ResponseQueue::<Response>::builder()
///     .flush_timeout(Duration::from_millis(250))
///     .build()
///     .expect("failed to build ResponseQueue");
/// assert_eq!(queue.flush_timeout(), Duration::from_millis(250));
/// ```
#[derive(Debug)]
pub struct ResponseQueueBuilder<R> {
    flush_timeout: Duration,
    _responses: PhantomData<fn() -> R>,
}

impl<R: Sequenced> Default for ResponseQueueBuilder<R> {
    fn default() -> Self {
        Self {
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            _responses: PhantomData,
        }
    }
}

impl<R: Sequenced> ResponseQueueBuilder<R> {
    /// Set how long a gap may block the queue before it is forced through.
    #[must_use]
    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout = timeout;
        self
    }

    /// Build the configured [`ResponseQueue`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidFlushTimeout`] if the timeout is zero.
    pub fn build(self) -> Result<ResponseQueue<R>, ConfigError> {
        if self.flush_timeout.is_zero() {
            return Err(ConfigError::InvalidFlushTimeout(self.flush_timeout));
        }
        Ok(ResponseQueue::with_flush_timeout(self.flush_timeout))
    }
}
