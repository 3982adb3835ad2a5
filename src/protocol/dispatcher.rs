use crate::core::response::StatusResponse;
use crate::core::session::{ProtocolVersion, Session};
use crate::core::vote::Vote;
use crate::error::{error_chain, ProtocolError};
use crate::protocol::notify::{NotificationSink, VoteEvent};
use crate::protocol::throttle::ErrorLogThrottle;
use crate::utils::metrics::Metrics;
use std::sync::Arc;
use tracing::{error, info};

/// What the connection driver must do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Close without writing anything
    Close,
    /// Write the status, wait for the flush, then close
    Respond(StatusResponse),
}

/// Which failure line was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureLog {
    /// The vote had already been dispatched when the error happened
    AlreadyProcessed,
    /// No vote was completed on the connection
    Unprocessed,
}

/// Result of the failure path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureOutcome {
    pub reply: Reply,
    /// `None` when the throttle suppressed the log line
    pub logged: Option<FailureLog>,
}

/// Handles decoded votes and failures for every connection.
///
/// Holds no per-connection state: the [`Session`] is passed into each call.
/// The only shared mutable state is the error-log throttle and the metrics.
pub struct InboundDispatcher {
    sink: Arc<dyn NotificationSink>,
    throttle: ErrorLogThrottle,
    metrics: Arc<Metrics>,
}

impl InboundDispatcher {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_throttle(sink, ErrorLogThrottle::default())
    }

    pub fn with_throttle(sink: Arc<dyn NotificationSink>, throttle: ErrorLogThrottle) -> Self {
        Self {
            sink,
            throttle,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Notify subscribers about `vote` and decide the success reply.
    ///
    /// The notification is emitted before the reply is returned, so it is
    /// always ordered before anything written to the client. A sink failure
    /// takes the failure path instead.
    pub fn on_vote_decoded(&self, session: &mut Session, vote: Vote, remote: &str) -> Reply {
        let version = session.version().unwrap_or(ProtocolVersion::One);
        info!(version = %version, remote, vote = %vote, "Got a vote record");

        if let Err(e) = self.sink.notify(VoteEvent::from(vote)) {
            return self.on_failure(session, &e, remote).reply;
        }

        session.complete_vote();
        self.metrics.vote_received(version);

        match session.version() {
            Some(ProtocolVersion::Two) => Reply::Respond(StatusResponse::ok()),
            _ => Reply::Close,
        }
    }

    /// Decide the reply for a failed connection and log it unless throttled.
    ///
    /// v2 sessions get a structured error; v1 and not-yet-negotiated sessions
    /// are closed without a payload since the legacy protocol cannot carry one.
    pub fn on_failure(
        &self,
        session: &Session,
        error: &ProtocolError,
        remote: &str,
    ) -> FailureOutcome {
        self.metrics.vote_failure();

        let reply = match session.version() {
            Some(ProtocolVersion::Two) => Reply::Respond(StatusResponse::from_error(error)),
            _ => Reply::Close,
        };

        if self.throttle.should_throttle() {
            self.metrics.error_log_suppressed();
            return FailureOutcome {
                reply,
                logged: None,
            };
        }

        let detail = error_chain(error);
        let logged = if session.has_completed_vote() {
            error!(
                remote,
                kind = error.kind(),
                error = %detail,
                "Vote processed, however an error occurred with a vote from {}",
                remote
            );
            FailureLog::AlreadyProcessed
        } else {
            error!(
                remote,
                kind = error.kind(),
                error = %detail,
                "Unable to process vote from {}",
                remote
            );
            FailureLog::Unprocessed
        };

        FailureOutcome {
            reply,
            logged: Some(logged),
        }
    }
}
