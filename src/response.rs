//! Wire representation of responses sent by the peer.
//!
//! Responses are JSON objects. Only two fields matter for ordering: `#`, the
//! peer-assigned sequence number, and `combined`, which marks a response
//! standing in for several server turns. Everything else is carried through
//! untouched to the processor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::WireError,
    sequence::{SequenceNo, Sequenced},
};

/// Wire field holding the sequence number.
pub const SEQUENCE_FIELD: &str = "#";

/// Wire field marking a combined response.
pub const COMBINED_FIELD: &str = "combined";

/// A response as received from the peer.
///
/// # Examples
///
/// ```
/// use resequencer::{response::Response, sequence::SequenceNo};
///
/// let response = Response::from_json(r##"{"#": 3, "events": [{"type": "property"}]}"##)
///     .expect("valid response");
/// assert_eq!(response.sequence_no, Some(SequenceNo::new(3)));
/// assert!(!response.combined);
/// assert_eq!(response.events.len(), 1);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Optional response identifier used for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Sequence number assigned by the peer; absent for unordered responses.
    #[serde(rename = "#", default, skip_serializing_if = "Option::is_none")]
    pub sequence_no: Option<SequenceNo>,
    /// Set when this response replaces every earlier unconfirmed response.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub combined: bool,
    /// Adapter state keyed by adapter id.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub adapter_data: Map<String, Value>,
    /// Events to apply, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Value>,
    /// Error payload reported by the peer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Any other fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Response {
    /// Create an empty response carrying `sequence_no`.
    #[must_use]
    pub fn sequenced(sequence_no: impl Into<SequenceNo>) -> Self {
        Self {
            sequence_no: Some(sequence_no.into()),
            ..Self::default()
        }
    }

    /// Create an empty response without ordering requirements.
    #[must_use]
    pub fn unordered() -> Self { Self::default() }

    /// Set the diagnostic identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Mark the response as combined.
    #[must_use]
    pub fn with_combined(mut self, combined: bool) -> Self {
        self.combined = combined;
        self
    }

    /// Append an event.
    #[must_use]
    pub fn with_event(mut self, event: Value) -> Self {
        self.events.push(event);
        self
    }

    /// Returns true when the peer reported an error.
    #[must_use]
    pub fn is_error(&self) -> bool { self.error.is_some() }

    /// Decode a response from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Decode`] if `json` is not a valid response.
    pub fn from_json(json: &str) -> Result<Self, WireError> {
        serde_json::from_str(json).map_err(WireError::Decode)
    }

    /// Decode a response from an already parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Decode`] if `value` is not a valid response.
    pub fn from_value(value: Value) -> Result<Self, WireError> {
        serde_json::from_value(value).map_err(WireError::Decode)
    }

    /// Encode the response as JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Encode`] if serialisation fails.
    pub fn to_json(&self) -> Result<String, WireError> {
        serde_json::to_string(self).map_err(WireError::Encode)
    }
}

impl Sequenced for Response {
    fn sequence_no(&self) -> Option<SequenceNo> { self.sequence_no }

    fn is_combined(&self) -> bool { self.combined }
}
