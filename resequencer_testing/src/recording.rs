use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

use resequencer::{Response, ResponseProcessor};

/// Error returned for responses the recorder was told to reject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessingFailed(pub Option<u64>);

impl fmt::Display for ProcessingFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(seq) => write!(f, "failed to apply response #{seq}"),
            None => f.write_str("failed to apply unordered response"),
        }
    }
}

impl std::error::Error for ProcessingFailed {}

#[derive(Default)]
struct Log {
    applied: Vec<Response>,
    fail_on: HashSet<u64>,
}

/// Processor that records every response it applies.
///
/// Clones share the same log. Responses carrying an `error` payload are
/// applied but reported as unsuccessful, mirroring how a session treats peer
/// errors.
#[derive(Clone, Default)]
pub struct RecordingProcessor(Arc<Mutex<Log>>);

impl RecordingProcessor {
    /// Create a recorder with an empty log.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    fn log(&self) -> MutexGuard<'_, Log> { self.0.lock().expect("recording log poisoned") }

    /// Make the recorder fail when it is handed sequence number `seq`.
    pub fn fail_on(&self, seq: u64) { self.log().fail_on.insert(seq); }

    /// Every applied response, in delivery order.
    #[must_use]
    pub fn applied(&self) -> Vec<Response> { self.log().applied.clone() }

    /// Sequence numbers of applied responses, in delivery order.
    #[must_use]
    pub fn sequence_nos(&self) -> Vec<Option<u64>> {
        self.log()
            .applied
            .iter()
            .map(|response| response.sequence_no.map(|seq| seq.get()))
            .collect()
    }

    /// Ids of applied responses, in delivery order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.log()
            .applied
            .iter()
            .map(|response| response.id.clone().unwrap_or_default())
            .collect()
    }

    /// Number of responses applied so far.
    #[must_use]
    pub fn count(&self) -> usize { self.log().applied.len() }
}

impl ResponseProcessor<Response> for RecordingProcessor {
    type Error = ProcessingFailed;

    fn process_response(&mut self, response: Response) -> Result<bool, ProcessingFailed> {
        let seq = response.sequence_no.map(|seq| seq.get());
        let mut log = self.log();
        if seq.is_some_and(|seq| log.fail_on.contains(&seq)) {
            return Err(ProcessingFailed(seq));
        }
        let success = !response.is_error();
        log.applied.push(response);
        Ok(success)
    }
}
