// test-only module included via protocol/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use crate::core::response::StatusResponse;
use crate::core::session::{ProtocolVersion, Session};
use crate::core::vote::Vote;
use crate::error::{ProtocolError, Result};
use crate::protocol::dispatcher::{FailureLog, InboundDispatcher, Reply};
use crate::protocol::notify::VoteEvent;
use crate::protocol::throttle::ErrorLogThrottle;
use crate::utils::time::ManualClock;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const REMOTE: &str = "192.0.2.10:51234";

fn recording_dispatcher() -> (InboundDispatcher, Arc<Mutex<Vec<VoteEvent>>>, Arc<ManualClock>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let recorded = events.clone();
    let sink = move |event: VoteEvent| -> Result<()> {
        recorded.lock().unwrap().push(event);
        Ok(())
    };
    let clock = Arc::new(ManualClock::new(50_000));
    let throttle = ErrorLogThrottle::new(Duration::from_millis(2000), 5, clock.clone());
    (
        InboundDispatcher::with_throttle(Arc::new(sink), throttle),
        events,
        clock,
    )
}

fn session(version: Option<ProtocolVersion>) -> Session {
    let mut session = Session::new("challenge");
    if let Some(v) = version {
        session.negotiate(v);
    }
    session
}

fn vote() -> Vote {
    Vote::new("A", "B", "C", "D", None)
}

#[test]
fn test_v1_vote_notifies_and_closes() {
    let (dispatcher, events, _) = recording_dispatcher();
    let mut session = session(Some(ProtocolVersion::One));

    let reply = dispatcher.on_vote_decoded(&mut session, vote(), REMOTE);

    assert_eq!(reply, Reply::Close);
    assert!(session.has_completed_vote());
    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![VoteEvent {
            service_name: "A".into(),
            username: "B".into()
        }]
    );
    assert_eq!(dispatcher.metrics().snapshot().votes_v1, 1);
}

#[test]
fn test_v2_vote_responds_ok_once() {
    let (dispatcher, events, _) = recording_dispatcher();
    let mut session = session(Some(ProtocolVersion::Two));

    let reply = dispatcher.on_vote_decoded(&mut session, vote(), REMOTE);

    assert_eq!(reply, Reply::Respond(StatusResponse::ok()));
    assert_eq!(events.lock().unwrap().len(), 1);
    assert_eq!(dispatcher.metrics().snapshot().votes_v2, 1);
}

#[test]
fn test_v2_failure_carries_kind_and_message() {
    let (dispatcher, _, _) = recording_dispatcher();
    let session = session(Some(ProtocolVersion::Two));
    let err = ProtocolError::MalformedVote("expected 5 fields, got 4".into());

    let outcome = dispatcher.on_failure(&session, &err, REMOTE);

    match outcome.reply {
        Reply::Respond(StatusResponse::Error { cause, error }) => {
            assert_eq!(cause, "MalformedVoteError");
            assert!(error.contains("got 4"));
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    assert_eq!(outcome.logged, Some(FailureLog::Unprocessed));
}

#[test]
fn test_v1_and_unnegotiated_failures_close_silently() {
    let (dispatcher, _, _) = recording_dispatcher();
    let err = ProtocolError::Framing {
        remote: REMOTE.into(),
        len: 512,
    };

    for version in [Some(ProtocolVersion::One), None] {
        let outcome = dispatcher.on_failure(&session(version), &err, REMOTE);
        assert_eq!(outcome.reply, Reply::Close);
    }
}

#[test]
fn test_failure_after_completed_vote_logs_already_processed() {
    let (dispatcher, _, _) = recording_dispatcher();
    let mut session = session(Some(ProtocolVersion::Two));
    dispatcher.on_vote_decoded(&mut session, vote(), REMOTE);

    let err = ProtocolError::ConnectionClosed;
    let outcome = dispatcher.on_failure(&session, &err, REMOTE);

    assert_eq!(outcome.logged, Some(FailureLog::AlreadyProcessed));
}

#[test]
fn test_sink_failure_takes_failure_path() {
    let sink = |_event: VoteEvent| -> Result<()> {
        Err(ProtocolError::Notification("subscriber panicked".into()))
    };
    let dispatcher = InboundDispatcher::new(Arc::new(sink));
    let mut session = session(Some(ProtocolVersion::Two));

    let reply = dispatcher.on_vote_decoded(&mut session, vote(), REMOTE);

    assert!(!session.has_completed_vote());
    match reply {
        Reply::Respond(StatusResponse::Error { cause, .. }) => {
            assert_eq!(cause, "NotificationError")
        }
        other => panic!("unexpected reply: {other:?}"),
    }
    let snapshot = dispatcher.metrics().snapshot();
    assert_eq!(snapshot.votes_total(), 0);
    assert_eq!(snapshot.vote_failures, 1);
}

#[test]
fn test_error_storm_logs_five_per_window() {
    let (dispatcher, _, clock) = recording_dispatcher();
    let err = ProtocolError::MalformedVote("missing VOTE opcode".into());

    let logged = (0..6)
        .filter(|_| {
            clock.advance(10);
            dispatcher
                .on_failure(&session(Some(ProtocolVersion::One)), &err, REMOTE)
                .logged
                .is_some()
        })
        .count();
    assert_eq!(logged, 5);
    assert_eq!(dispatcher.metrics().snapshot().error_logs_suppressed, 1);

    // Replies are unaffected by log suppression
    let outcome = dispatcher.on_failure(&session(Some(ProtocolVersion::Two)), &err, REMOTE);
    assert!(outcome.logged.is_none());
    assert!(matches!(outcome.reply, Reply::Respond(_)));

    clock.advance(2001);
    let outcome = dispatcher.on_failure(&session(None), &err, REMOTE);
    assert_eq!(outcome.logged, Some(FailureLog::Unprocessed));
}

/// Collects formatted log output in memory
#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLog {
    type Writer = CapturedLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn test_vote_log_line_carries_fields_once() {
    let (dispatcher, _, _) = recording_dispatcher();
    let mut session = session(Some(ProtocolVersion::One));
    let log = CapturedLog::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(log.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        dispatcher.on_vote_decoded(&mut session, vote(), REMOTE);
    });

    let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("Got a vote record"));
    assert_eq!(output.matches(REMOTE).count(), 1);
    assert_eq!(output.matches("username:B").count(), 1);
    assert!(output.contains("protocol v1"));
}
