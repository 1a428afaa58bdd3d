//! Canonical error types for the crate.
//!
//! Stale and out-of-order responses are not errors: the queue absorbs them.
//! The types here cover configuration mistakes, wire decoding failures and
//! failures surfaced by a [`ResponseChannel`](crate::channel::ResponseChannel).

use std::time::Duration;

use thiserror::Error;

/// Errors returned when building a queue or history from configuration.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A forced flush with no delay would bypass gap detection entirely.
    #[error("invalid flush timeout {0:?}; must be greater than zero")]
    InvalidFlushTimeout(Duration),
    /// A history must be able to retain at least one response.
    #[error("invalid {kind} history capacity {capacity}; must be greater than zero")]
    InvalidCapacity { kind: &'static str, capacity: usize },
}

/// Errors produced while encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// The payload was not valid JSON for the expected message.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
    /// The message could not be rendered as JSON.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Errors surfaced by a [`ResponseChannel`](crate::channel::ResponseChannel).
#[derive(Debug, Error)]
pub enum ChannelError<E> {
    /// The channel was closed and no longer accepts responses.
    #[error("response channel closed")]
    Closed,
    /// The processor failed while applying a response.
    #[error("response processing failed: {0}")]
    Processing(#[source] E),
}

impl<E> ChannelError<E> {
    /// Returns true if the error reports a closed channel.
    #[must_use]
    pub fn is_closed(&self) -> bool { matches!(self, Self::Closed) }

    /// Return the processor error, if any.
    #[must_use]
    pub fn into_processing(self) -> Option<E> {
        match self {
            Self::Processing(error) => Some(error),
            Self::Closed => None,
        }
    }
}
