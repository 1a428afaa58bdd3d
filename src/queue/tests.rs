//! Unit tests for response ordering, gap handling and forced flushes.

use std::{convert::Infallible, time::Duration};

use proptest::{
    prelude::{Just, Strategy, any},
    test_runner::{Config as ProptestConfig, RngAlgorithm, TestCaseError, TestRng, TestRunner},
};
use rstest::{fixture, rstest};
use tokio::time::Instant;
use tracing_test::traced_test;

use super::*;
use crate::{error::ConfigError, response::Response};

/// Records the sequence numbers and ids of every response it is handed.
#[derive(Default)]
struct Recorder {
    seen: Vec<Option<u64>>,
    ids: Vec<Option<String>>,
    verdict: bool,
    fail_on: Option<u64>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            verdict: true,
            ..Self::default()
        }
    }

    fn failing_on(seq: u64) -> Self {
        Self {
            fail_on: Some(seq),
            ..Self::new()
        }
    }
}

impl ResponseProcessor<Response> for Recorder {
    type Error = String;

    fn process_response(&mut self, response: Response) -> Result<bool, String> {
        let seq = response.sequence_no.map(SequenceNo::get);
        if seq.is_some() && seq == self.fail_on {
            return Err(format!("cannot apply #{}", seq.unwrap_or_default()));
        }
        self.seen.push(seq);
        self.ids.push(response.id);
        Ok(self.verdict)
    }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
fn queue() -> ResponseQueue<Response> { ResponseQueue::new() }

fn seq(n: u64) -> Response { Response::sequenced(n) }

fn combined(n: u64) -> Response { Response::sequenced(n).with_combined(true) }

fn unordered(id: &str) -> Response { Response::unordered().with_id(id) }

#[rstest]
fn out_of_order_pair_is_released_ascending(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    queue.add(seq(2));
    queue.add(seq(1));
    assert_eq!(queue.size(), 2);

    let ok = queue.process(None, &mut recorder).expect("process");

    assert!(ok);
    assert_eq!(recorder.seen, [Some(1), Some(2)]);
    assert_eq!(queue.last_processed(), SequenceNo::new(2));
    assert_eq!(queue.next_expected(), SequenceNo::new(3));
    assert_eq!(queue.size(), 0);
}

#[rstest]
fn duplicate_after_processing_is_ignored(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    queue.add(seq(1));
    queue.process(None, &mut recorder).expect("process");
    assert_eq!(queue.last_processed(), SequenceNo::new(1));

    queue.add(seq(1));
    assert_eq!(queue.size(), 0);
    queue.process(Some(seq(1)), &mut recorder).expect("process");
    assert_eq!(recorder.seen, [Some(1)]);
}

#[rstest]
fn duplicate_while_queued_keeps_one_copy(mut queue: ResponseQueue<Response>) {
    queue.add(seq(3));
    queue.add(seq(5));
    queue.add(seq(3));
    assert_eq!(queue.size(), 2);
    assert_eq!(
        queue.outstanding_sequence_nos(),
        [SequenceNo::new(3), SequenceNo::new(5)]
    );
}

#[rstest]
fn reserved_sequence_number_is_rejected(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    queue.add(seq(1));
    queue.add(Response::sequenced(SequenceNo::MAX));
    queue
        .process(Some(Response::sequenced(SequenceNo::MAX).with_combined(true)), &mut recorder)
        .expect("process");

    assert_eq!(recorder.seen, [Some(1)]);
    assert_eq!(queue.last_processed(), SequenceNo::new(1));
    assert!(queue.last_processed() < queue.next_expected());
    assert!(queue.is_empty());
}

#[rstest]
fn gap_blocks_later_responses(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    queue.add(seq(1));
    queue.add(seq(3));

    queue.process(None, &mut recorder).expect("process");

    assert_eq!(recorder.seen, [Some(1)]);
    assert_eq!(queue.size(), 1);
    assert_eq!(queue.missing_sequence_nos(), [SequenceNo::new(2)]);
    assert!(queue.flush_deadline().is_some());

    queue.process(Some(seq(2)), &mut recorder).expect("process");
    assert_eq!(recorder.seen, [Some(1), Some(2), Some(3)]);
    assert_eq!(queue.size(), 0);
    assert!(queue.flush_deadline().is_none());
}

#[rstest]
fn forced_flush_releases_past_gap(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    queue.add(seq(3));
    queue.add(unordered("u"));
    queue.add(seq(5));
    queue.process(None, &mut recorder).expect("process");
    assert!(recorder.seen.is_empty());
    assert_eq!(queue.size(), 3);

    queue.force_flush(&mut recorder).expect("flush");

    assert_eq!(recorder.seen, [Some(3), None, Some(5)]);
    assert_eq!(queue.size(), 0);
    assert_eq!(queue.last_processed(), SequenceNo::new(5));
    assert_eq!(queue.next_expected(), SequenceNo::new(6));
    assert!(!queue.is_forcing());
    assert!(queue.flush_deadline().is_none());
}

#[rstest]
fn forced_flush_on_empty_queue_is_noop(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    queue.force_flush(&mut recorder).expect("flush");
    assert!(recorder.seen.is_empty());
    assert!(queue.flush_deadline().is_none());
}

#[rstest]
#[traced_test]
fn forced_flush_logs_missing_numbers(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    queue.add(seq(2));
    queue.add(seq(4));
    queue.force_flush(&mut recorder).expect("flush");

    assert!(logs_contain("forcing response queue flush"));
    assert!(logs_contain("missing=[SequenceNo(1), SequenceNo(3)]"));
}

#[rstest]
fn combined_response_fast_forwards(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    queue.add(seq(1));
    queue.add(seq(2));
    queue.process(None, &mut recorder).expect("process");
    queue.add(seq(4));
    queue.process(None, &mut recorder).expect("process");
    assert_eq!(queue.size(), 1);

    queue.add(combined(5));
    assert_eq!(queue.last_processed(), SequenceNo::new(4));
    assert_eq!(queue.next_expected(), SequenceNo::new(5));
    assert_eq!(queue.outstanding_sequence_nos(), [SequenceNo::new(5)]);

    queue.process(None, &mut recorder).expect("process");
    assert_eq!(recorder.seen, [Some(1), Some(2), Some(5)]);
    assert_eq!(queue.last_processed(), SequenceNo::new(5));
}

#[rstest]
fn combined_response_on_empty_queue(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    let ok = queue.process(Some(combined(9)), &mut recorder).expect("process");
    assert!(ok);
    assert_eq!(recorder.seen, [Some(9)]);
    assert_eq!(queue.next_expected(), SequenceNo::new(10));
}

#[rstest]
fn combined_without_sequence_is_plain_unordered(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    let response = Response::unordered().with_combined(true);
    queue.process(Some(response), &mut recorder).expect("process");
    assert_eq!(recorder.seen, [None]);
    assert_eq!(queue.last_processed(), SequenceNo::ZERO);
    assert_eq!(queue.next_expected(), SequenceNo::FIRST);
}

#[rstest]
fn unordered_response_is_never_deferred(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    queue.add(unordered("first"));
    queue.add(seq(1));
    queue.add(unordered("second"));

    queue.process(None, &mut recorder).expect("process");
    assert_eq!(recorder.seen, [None, Some(1), None]);
    assert_eq!(
        recorder.ids,
        [Some("first".to_owned()), None, Some("second".to_owned())]
    );
}

#[rstest]
fn unordered_behind_gap_waits_with_it(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    queue.add(seq(2));
    queue.add(unordered("late"));

    queue.process(None, &mut recorder).expect("process");
    assert!(recorder.seen.is_empty());
    assert_eq!(queue.size(), 2);
}

#[rstest]
#[case::accepted(true)]
#[case::rejected(false)]
fn returns_verdict_for_supplied_response(
    mut queue: ResponseQueue<Response>,
    #[case] verdict: bool,
) {
    let mut recorder = Recorder::new();
    queue.add(seq(1));
    recorder.verdict = verdict;
    let result = queue.process(Some(seq(2)), &mut recorder).expect("process");
    assert_eq!(result, verdict);
}

#[rstest]
fn verdict_defaults_to_true_for_deferred_response(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    recorder.verdict = false;
    let result = queue.process(Some(seq(4)), &mut recorder).expect("process");
    assert!(result);
    assert_eq!(queue.size(), 1);
}

#[rstest]
fn processor_error_keeps_remaining_responses(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::failing_on(2);
    queue.add(seq(1));
    queue.add(seq(2));
    queue.add(seq(3));

    let err = queue
        .process(None, &mut recorder)
        .expect_err("processing #2 must fail");

    assert_eq!(err, "cannot apply #2");
    assert_eq!(recorder.seen, [Some(1)]);
    assert_eq!(queue.last_processed(), SequenceNo::new(1));
    assert_eq!(queue.outstanding_sequence_nos(), [SequenceNo::new(3)]);
    assert!(queue.flush_deadline().is_some());
}

#[rstest]
fn flush_deadline_tracks_queue_contents(mut queue: ResponseQueue<Response>) {
    let before = Instant::now();
    queue.add(seq(2));
    let deadline = queue.flush_deadline().expect("deadline armed");
    assert!(deadline >= before + DEFAULT_FLUSH_TIMEOUT);
    assert!(!queue.is_flush_due(before));
    assert!(queue.is_flush_due(deadline));

    queue.add(seq(3));
    assert_eq!(queue.flush_deadline(), Some(deadline));

    let mut recorder = Recorder::new();
    queue.process(Some(seq(1)), &mut recorder).expect("process");
    assert!(queue.flush_deadline().is_none());
}

#[rstest]
fn clear_drops_queue_and_disarms_deadline(mut queue: ResponseQueue<Response>) {
    let mut recorder = Recorder::new();
    queue.process(Some(seq(1)), &mut recorder).expect("process");
    queue.add(seq(3));
    queue.add(unordered("u"));
    assert!(queue.flush_deadline().is_some());

    assert_eq!(queue.clear(), 2);
    assert!(queue.is_empty());
    assert!(queue.flush_deadline().is_none());
    assert_eq!(queue.last_processed(), SequenceNo::new(1));
}

#[test]
fn builder_rejects_zero_timeout() {
    let err = ResponseQueue::<Response>::builder()
        .flush_timeout(Duration::ZERO)
        .build()
        .expect_err("zero timeout must be rejected");
    assert_eq!(err, ConfigError::InvalidFlushTimeout(Duration::ZERO));
}

#[rstest]
fn acknowledgement_reports_last_processed(mut queue: ResponseQueue<Response>) {
    let mut request = Request::new("ui");
    queue.prepare_request(&mut request);
    assert_eq!(request.ack, Some(SequenceNo::ZERO));

    let mut recorder = Recorder::new();
    queue.process(Some(seq(1)), &mut recorder).expect("process");
    queue.prepare_request(&mut request);
    let mut options = HttpRequestOptions::new("upload/ui/1");
    queue.prepare_http_request(&mut options);

    assert_eq!(request.ack, Some(SequenceNo::new(1)));
    assert_eq!(options.header(ACK_HEADER), Some("1"));
}

#[test]
fn closures_act_as_processors() {
    let mut queue = ResponseQueue::new();
    let mut count = 0usize;
    queue
        .process(Some(seq(1)), &mut |_: Response| {
            count += 1;
            Ok::<_, Infallible>(true)
        })
        .expect("infallible");
    assert_eq!(count, 1);
}

#[test]
fn missing_numbers_are_capped() {
    let mut queue = ResponseQueue::new();
    queue.add(seq(1_000));
    assert_eq!(queue.missing_sequence_nos().len(), MAX_REPORTED_MISSING);
}

fn deterministic_runner(cases: u32) -> TestRunner {
    let config = ProptestConfig {
        cases,
        ..ProptestConfig::default()
    };
    let rng = TestRng::deterministic_rng(RngAlgorithm::ChaCha);
    TestRunner::new_with_rng(config, rng)
}

fn permutation_strategy() -> impl Strategy<Value = Vec<u64>> {
    (1u64..=24).prop_flat_map(|len| Just((1..=len).collect::<Vec<_>>()).prop_shuffle())
}

#[test]
fn any_arrival_order_is_released_ascending() {
    let mut runner = deterministic_runner(128);
    runner
        .run(&permutation_strategy(), |arrival| {
            let mut queue = ResponseQueue::new();
            let mut recorder = Recorder::new();
            for n in &arrival {
                queue.add(seq(*n));
            }
            queue
                .process(None, &mut recorder)
                .map_err(TestCaseError::fail)?;

            let expected: Vec<_> = (1..=arrival.len() as u64).map(Some).collect();
            if recorder.seen != expected {
                return Err(TestCaseError::fail(format!(
                    "arrival {arrival:?} released {:?}",
                    recorder.seen
                )));
            }
            if queue.size() != 0 {
                return Err(TestCaseError::fail("queue not drained"));
            }
            Ok(())
        })
        .expect("ordering property");
}

#[test]
fn interleaved_processing_never_reorders() {
    let mut runner = deterministic_runner(128);
    let strategy = permutation_strategy()
        .prop_flat_map(|arrival| {
            let len = arrival.len();
            (Just(arrival), proptest::collection::vec(any::<bool>(), len))
        });
    runner
        .run(&strategy, |(arrival, process_after)| {
            let mut queue = ResponseQueue::new();
            let mut recorder = Recorder::new();
            for (n, process) in arrival.iter().zip(&process_after) {
                if *process {
                    queue
                        .process(Some(seq(*n)), &mut recorder)
                        .map_err(TestCaseError::fail)?;
                } else {
                    queue.add(seq(*n));
                }
                let applied = recorder.seen.len();
                if queue.size() + applied > arrival.len() {
                    return Err(TestCaseError::fail("size overcounts queued responses"));
                }
            }
            queue
                .process(None, &mut recorder)
                .map_err(TestCaseError::fail)?;
            let expected: Vec<_> = (1..=arrival.len() as u64).map(Some).collect();
            if recorder.seen != expected {
                return Err(TestCaseError::fail(format!(
                    "arrival {arrival:?} released {:?}",
                    recorder.seen
                )));
            }
            Ok(())
        })
        .expect("interleaving property");
}
