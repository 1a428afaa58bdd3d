#![doc(html_root_url = "https://docs.rs/resequencer/latest")]
//! Public API for the `resequencer` library.
//!
//! This crate keeps a client's view of a remote model in causal order when
//! responses arrive over a transport that may reorder, duplicate or lose
//! them. The client side is the [`ResponseQueue`] and its tokio driver
//! [`ResponseChannel`]; the peer side numbers responses and keeps them until
//! they are acknowledged ([`PeerSession`]).

pub mod channel;
pub mod error;
pub mod history;
pub mod metrics;
pub mod queue;
pub mod request;
pub mod response;
pub mod sequence;
pub mod session;

pub use channel::ResponseChannel;
pub use error::{ChannelError, ConfigError, WireError};
pub use history::{RequestHistory, ResponseHistory};
pub use queue::{DEFAULT_FLUSH_TIMEOUT, ResponseProcessor, ResponseQueue, ResponseQueueBuilder};
pub use request::{ACK_FIELD, ACK_HEADER, HttpRequestOptions, Request};
pub use response::Response;
pub use sequence::{SequenceNo, Sequenced};
pub use session::{PeerSession, RequestDisposition, SessionId, SessionRegistry};
