//! Wire representation of requests sent to the peer.
//!
//! Every outgoing request tells the peer the highest response sequence
//! number the client has applied. JSON requests carry it in the `#ACK`
//! field; transports that prefer header metadata (uploads, for instance)
//! carry it in the [`ACK_HEADER`] header instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{error::WireError, sequence::SequenceNo};

/// Request body field carrying the acknowledgement.
pub const ACK_FIELD: &str = "#ACK";

/// HTTP header carrying the acknowledgement.
pub const ACK_HEADER: &str = "X-Scout-#ACK";

/// A JSON request sent to the peer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Session the request belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_session_id: Option<String>,
    /// Request sequence number, used by the peer to detect retries.
    #[serde(rename = "#", default, skip_serializing_if = "Option::is_none")]
    pub sequence_no: Option<SequenceNo>,
    /// Highest response sequence number applied by the client.
    #[serde(rename = "#ACK", default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<SequenceNo>,
    /// Events raised by the client since the last request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Value>,
    /// Asks the peer to resend every response not yet acknowledged.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sync_response_queue: bool,
    /// Long-poll request for background job results.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub poll_for_background_jobs: bool,
    /// Any other fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Request {
    /// Create an empty request for `ui_session_id`.
    #[must_use]
    pub fn new(ui_session_id: impl Into<String>) -> Self {
        Self {
            ui_session_id: Some(ui_session_id.into()),
            ..Self::default()
        }
    }

    /// Create a request asking the peer to resynchronise the response queue.
    #[must_use]
    pub fn sync_response_queue(ui_session_id: impl Into<String>) -> Self {
        Self {
            sync_response_queue: true,
            ..Self::new(ui_session_id)
        }
    }

    /// Set the request sequence number.
    #[must_use]
    pub fn with_sequence_no(mut self, sequence_no: impl Into<SequenceNo>) -> Self {
        self.sequence_no = Some(sequence_no.into());
        self
    }

    /// Decode a request from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Decode`] if `json` is not a valid request.
    pub fn from_json(json: &str) -> Result<Self, WireError> {
        serde_json::from_str(json).map_err(WireError::Decode)
    }

    /// Encode the request as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Encode`] if serialisation fails.
    pub fn to_json(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Encode)
    }
}

/// Transport options for a raw HTTP request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpRequestOptions {
    /// Target URL.
    pub url: String,
    /// Header names and values, in name order.
    pub headers: BTreeMap<String, String>,
}

impl HttpRequestOptions {
    /// Create options targeting `url` without headers.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
        }
    }

    /// Set or replace a header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Look up a header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> { self.headers.get(name).map(String::as_str) }

    /// Parse the acknowledgement header, if present and numeric.
    #[must_use]
    pub fn ack(&self) -> Option<SequenceNo> {
        self.header(ACK_HEADER)?.parse::<u64>().ok().map(SequenceNo::new)
    }
}
