use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;

/// Length of the random challenge sent in the greeting
pub const CHALLENGE_LENGTH: usize = 32;

/// Wire protocol spoken on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Fixed 256-byte RSA frame, no structured response
    One,
    /// JSON status responses
    Two,
}

impl ProtocolVersion {
    /// Label used in log lines
    pub fn human_readable(self) -> &'static str {
        match self {
            ProtocolVersion::One => "protocol v1",
            ProtocolVersion::Two => "protocol v2",
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            ProtocolVersion::One => 1,
            ProtocolVersion::Two => 2,
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.human_readable())
    }
}

/// Per-connection state, created at accept time and dropped with the connection.
///
/// The version is negotiated at most once and `has_completed_vote` only ever
/// moves from `false` to `true`.
#[derive(Debug, Clone)]
pub struct Session {
    version: Option<ProtocolVersion>,
    has_completed_vote: bool,
    challenge: String,
}

impl Session {
    pub fn new(challenge: impl Into<String>) -> Self {
        Self {
            version: None,
            has_completed_vote: false,
            challenge: challenge.into(),
        }
    }

    /// Session with a freshly generated greeting challenge
    pub fn with_random_challenge() -> Self {
        Self::new(generate_challenge())
    }

    /// Record the negotiated version. Returns `false` if one was already set,
    /// in which case the existing version is kept.
    pub fn negotiate(&mut self, version: ProtocolVersion) -> bool {
        if self.version.is_some() {
            return false;
        }
        self.version = Some(version);
        true
    }

    /// `None` until the differentiator has seen enough bytes
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    pub fn has_completed_vote(&self) -> bool {
        self.has_completed_vote
    }

    /// Mark the vote as dispatched; later calls are no-ops
    pub fn complete_vote(&mut self) {
        self.has_completed_vote = true;
    }

    pub fn challenge(&self) -> &str {
        &self.challenge
    }
}

/// Random alphanumeric token for the `VOTIFIER 2 <challenge>` greeting
pub fn generate_challenge() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CHALLENGE_LENGTH)
        .map(char::from)
        .collect()
}
