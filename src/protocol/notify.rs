use crate::core::vote::Vote;
use crate::error::{constants, ProtocolError, Result};
use tokio::sync::mpsc;

/// What subscribers learn about a vote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteEvent {
    pub service_name: String,
    pub username: String,
}

impl From<Vote> for VoteEvent {
    fn from(vote: Vote) -> Self {
        let (service_name, username) = vote.into_notification_parts();
        Self {
            service_name,
            username,
        }
    }
}

/// Receives one event per successfully decoded vote.
///
/// Called from connection tasks; implementations hand the event to whatever
/// context the host runs its subscribers on and return without waiting for
/// them. An error is treated as a failed vote on that connection.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: VoteEvent) -> Result<()>;
}

impl<F> NotificationSink for F
where
    F: Fn(VoteEvent) -> Result<()> + Send + Sync,
{
    fn notify(&self, event: VoteEvent) -> Result<()> {
        self(event)
    }
}

/// Queues events for a host task that owns the receiving end
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<VoteEvent>,
}

impl ChannelSink {
    /// Create the sink and the receiver the host drains on its main task
    pub fn new() -> (Self, mpsc::UnboundedReceiver<VoteEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: VoteEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| ProtocolError::Notification(constants::ERR_SINK_CLOSED.to_string()))
    }
}
