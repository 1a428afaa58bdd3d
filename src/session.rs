//! Peer-side sessions and the registry that tracks them.
//!
//! A [`PeerSession`] numbers outgoing responses, remembers them until the
//! client acknowledges them and recognises retried requests. The
//! [`SessionRegistry`] stores non-owning weak references to live sessions so
//! transport handlers can look them up without keeping them alive. Dead
//! entries are pruned opportunistically or lazily at lookup time.

use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
        Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use derive_more::Display;
use tracing::debug;

use crate::{
    error::ConfigError,
    history::{
        DEFAULT_RESPONSE_CAPACITY,
        RequestHistory,
        ResponseHistory,
        requests::DEFAULT_REQUEST_WINDOW,
    },
    request::Request,
    response::Response,
    sequence::SequenceNo,
};

/// Identifier of a UI session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
#[display("SessionId({_0})")]
pub struct SessionId(String);

impl SessionId {
    /// Create a new [`SessionId`] with the provided value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self { Self::new(value) }
}

/// How the peer should answer an incoming request.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestDisposition {
    /// The request is new and must be processed.
    Fresh,
    /// The request was already processed and must not run again. Carries the
    /// stored response to resend, or `None` once it has been acknowledged.
    Replay(Option<Response>),
    /// The client asked to resynchronise; send the combined response, or an
    /// empty reply when nothing is outstanding.
    Resync(Option<Response>),
}

#[derive(Debug)]
struct Histories {
    responses: ResponseHistory,
    requests: RequestHistory,
}

/// Server-side state for one client session.
///
/// # Examples
///
/// ```
/// use resequencer::{
///     request::Request,
///     response::Response,
///     session::{PeerSession, RequestDisposition},
/// };
///
/// let session = PeerSession::new("ui-1");
/// let request = Request::new("ui-1").with_sequence_no(1u64);
/// assert_eq!(session.handle_request(&request), RequestDisposition::Fresh);
///
/// let sent = session.respond(Response::unordered(), request.sequence_no);
/// assert_eq!(sent.sequence_no.map(|seq| seq.get()), Some(1));
///
/// // The client retries the same request.
/// assert_eq!(session.handle_request(&request), RequestDisposition::Replay(Some(sent)));
/// ```
#[derive(Debug)]
pub struct PeerSession {
    id: SessionId,
    next_sequence_no: AtomicU64,
    histories: Mutex<Histories>,
}

impl PeerSession {
    /// Create a session with default history limits.
    #[must_use]
    pub fn new(id: impl Into<SessionId>) -> Self {
        Self::with_histories(id.into(), ResponseHistory::default(), RequestHistory::default())
    }

    /// Start building a session with custom history limits.
    #[must_use]
    pub fn builder(id: impl Into<SessionId>) -> PeerSessionBuilder { PeerSessionBuilder::new(id) }

    fn with_histories(id: SessionId, responses: ResponseHistory, requests: RequestHistory) -> Self {
        Self {
            id,
            next_sequence_no: AtomicU64::new(SequenceNo::FIRST.get()),
            histories: Mutex::new(Histories {
                responses,
                requests,
            }),
        }
    }

    fn histories(&self) -> MutexGuard<'_, Histories> {
        self.histories.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Identifier of this session.
    #[must_use]
    pub fn id(&self) -> &SessionId { &self.id }

    /// Allocate the next response sequence number.
    pub fn next_sequence_no(&self) -> SequenceNo {
        SequenceNo::new(self.next_sequence_no.fetch_add(1, Ordering::Relaxed))
    }

    /// Number the response, remember it until acknowledged and mark the
    /// request it answers as processed.
    ///
    /// Returns the numbered response, ready to send.
    pub fn respond(&self, mut response: Response, request_sequence_no: Option<SequenceNo>) -> Response {
        response.sequence_no = Some(self.next_sequence_no());
        let mut histories = self.histories();
        histories
            .responses
            .register(response.clone(), request_sequence_no);
        if let Some(seq) = request_sequence_no {
            histories.requests.mark_processed(seq);
        }
        response
    }

    /// Drop every response covered by `ack`.
    pub fn confirm_processed(&self, ack: SequenceNo) -> usize {
        self.histories().responses.confirm_processed(ack)
    }

    /// Apply the request's acknowledgement and decide how to answer it.
    #[must_use]
    pub fn handle_request(&self, request: &Request) -> RequestDisposition {
        let mut histories = self.histories();
        if let Some(ack) = request.ack {
            histories.responses.confirm_processed(ack);
        }
        if request.sync_response_queue {
            debug!(session = %self.id, outstanding = histories.responses.len(), "resynchronising response queue");
            return RequestDisposition::Resync(histories.responses.combined_unconfirmed());
        }
        let Some(seq) = request.sequence_no else {
            return RequestDisposition::Fresh;
        };
        if !histories.requests.is_processed(seq) {
            return RequestDisposition::Fresh;
        }
        let response = histories.responses.response_for_request(seq).cloned();
        debug!(
            session = %self.id,
            request = %seq,
            retained = response.is_some(),
            "request already processed; replaying response"
        );
        RequestDisposition::Replay(response)
    }

    /// Number of responses awaiting acknowledgement.
    #[must_use]
    pub fn unconfirmed_len(&self) -> usize { self.histories().responses.len() }
}

/// Builder for [`PeerSession`].
#[derive(Debug)]
pub struct PeerSessionBuilder {
    id: SessionId,
    response_capacity: usize,
    request_window: usize,
}

impl PeerSessionBuilder {
    fn new(id: impl Into<SessionId>) -> Self {
        Self {
            id: id.into(),
            response_capacity: DEFAULT_RESPONSE_CAPACITY.get(),
            request_window: DEFAULT_REQUEST_WINDOW.get(),
        }
    }

    /// Set how many unacknowledged responses are retained.
    #[must_use]
    pub fn response_capacity(mut self, capacity: usize) -> Self {
        self.response_capacity = capacity;
        self
    }

    /// Set how many processed request numbers are remembered.
    #[must_use]
    pub fn request_window(mut self, window: usize) -> Self {
        self.request_window = window;
        self
    }

    /// Build the configured [`PeerSession`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCapacity`] if either limit is zero.
    pub fn build(self) -> Result<PeerSession, ConfigError> {
        let responses = NonZeroUsize::new(self.response_capacity).ok_or(
            ConfigError::InvalidCapacity {
                kind: "response",
                capacity: self.response_capacity,
            },
        )?;
        let requests = NonZeroUsize::new(self.request_window).ok_or(
            ConfigError::InvalidCapacity {
                kind: "request",
                capacity: self.request_window,
            },
        )?;
        Ok(PeerSession::with_histories(
            self.id,
            ResponseHistory::with_capacity(responses),
            RequestHistory::with_window(requests),
        ))
    }
}

/// Concurrent registry of peer sessions keyed by [`SessionId`].
#[derive(Default)]
pub struct SessionRegistry(DashMap<SessionId, Weak<PeerSession>>);

impl SessionRegistry {
    /// Retrieve the session for `id` if it is still alive.
    pub fn get(&self, id: &SessionId) -> Option<Arc<PeerSession>> {
        let guard = self.0.get(id);
        let session = guard.as_ref().and_then(|weak| weak.upgrade());
        drop(guard);
        if session.is_none() {
            self.0.remove_if(id, |_, weak| weak.strong_count() == 0);
        }
        session
    }

    /// Insert a newly opened session.
    pub fn insert(&self, session: &Arc<PeerSession>) {
        self.0.insert(session.id().clone(), Arc::downgrade(session));
    }

    /// Remove a session, typically on logout or expiry.
    pub fn remove(&self, id: &SessionId) { self.0.remove(id); }

    /// Remove all stale weak references.
    ///
    /// `DashMap::retain` acquires per-bucket write locks, so other operations
    /// may contend briefly while the registry is pruned.
    pub fn prune(&self) { self.0.retain(|_, weak| weak.strong_count() > 0); }

    /// Prune stale weak references, then return the IDs of the live sessions.
    #[must_use]
    pub fn active_ids(&self) -> Vec<SessionId> {
        let mut ids = Vec::with_capacity(self.0.len());
        self.0.retain(|id, weak| {
            if weak.strong_count() > 0 {
                ids.push(id.clone());
                true
            } else {
                false
            }
        });
        ids
    }
}
