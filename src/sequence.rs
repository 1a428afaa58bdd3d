//! Sequence numbers assigned by the remote peer.
//!
//! [`SequenceNo`] wraps the positive integer carried in the `#` field of a
//! response. [`Sequenced`] abstracts over response types so the queue can
//! order them without knowing their concrete representation.

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Peer-assigned position of a response in the causal order.
///
/// The value `0` never identifies a real response; it is the starting point
/// of the "last processed" counter. [`SequenceNo::MAX`] is reserved as well:
/// nothing can follow it, so a queue rejects it.
///
/// # Examples
///
/// ```
/// use resequencer::sequence::SequenceNo;
/// let seq = SequenceNo::new(4);
/// assert_eq!(seq.get(), 4);
/// assert_eq!(seq.next(), SequenceNo::new(5));
/// assert_eq!(seq.prev(), SequenceNo::new(3));
/// ```
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    From,
)]
#[serde(transparent)]
#[display("{_0}")]
pub struct SequenceNo(u64);

impl SequenceNo {
    /// Counter value before any response has been applied.
    pub const ZERO: Self = Self(0);

    /// First number a peer hands out.
    pub const FIRST: Self = Self(1);

    /// Reserved upper bound; never accepted as a response number.
    pub const MAX: Self = Self(u64::MAX);

    /// Construct a sequence number from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self { Self(value) }

    /// Return the underlying numeric value.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }

    /// The number following this one, saturating at `u64::MAX`.
    #[must_use]
    pub const fn next(self) -> Self { Self(self.0.saturating_add(1)) }

    /// The number preceding this one, saturating at zero.
    #[must_use]
    pub const fn prev(self) -> Self { Self(self.0.saturating_sub(1)) }
}

impl From<SequenceNo> for u64 {
    fn from(value: SequenceNo) -> Self { value.0 }
}

/// Access the ordering metadata of a response.
///
/// The queue never inspects anything else about the responses it holds.
pub trait Sequenced {
    /// Sequence number assigned by the peer, if the response is ordered.
    fn sequence_no(&self) -> Option<SequenceNo>;

    /// Whether the response stands in for every earlier sequence number.
    fn is_combined(&self) -> bool { false }
}

impl Sequenced for SequenceNo {
    fn sequence_no(&self) -> Option<SequenceNo> { Some(*self) }
}

impl<T: Sequenced> Sequenced for Box<T> {
    fn sequence_no(&self) -> Option<SequenceNo> { (**self).sequence_no() }

    fn is_combined(&self) -> bool { (**self).is_combined() }
}
