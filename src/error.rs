//! # Error Types
//!
//! Error handling for the vote receiver.
//!
//! Every failure on a connection is represented by a [`ProtocolError`] and
//! ends up in the dispatcher's failure path, which decides the wire-visible
//! response and whether the failure is logged.
//!
//! ## Error Categories
//! - **Framing**: oversized legacy frames (likely attack traffic)
//! - **Corrupted frames**: RSA decryption failures (wrong key or damaged payload)
//! - **Malformed votes**: plaintext that is not a valid `VOTE` record
//! - **Downstream**: notification sink failures, I/O while responding
//!
//! ## Example Usage
//! ```rust
//! use votifier_protocol::error::{error_chain, ProtocolError};
//!
//! let err = ProtocolError::MalformedVote("expected 5 fields, got 4".into());
//! assert_eq!(err.kind(), "MalformedVoteError");
//! assert!(error_chain(&err).contains("got 4"));
//! ```

use std::error::Error as StdError;
use std::io;
use thiserror::Error;

/// Boxed error used at collaborator seams (key providers, external decoders).
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Error message constants shared by decoders and tests.
pub mod constants {
    /// Legacy frame longer than the fixed block size
    pub const ERR_FRAME_TOO_LONG: &str = "too long, possible attack";
    /// Plaintext does not start with the VOTE opcode
    pub const ERR_MISSING_OPCODE: &str = "missing VOTE opcode";
    /// Notification receiver has gone away
    pub const ERR_SINK_CLOSED: &str = "notification receiver closed";
}

/// Primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Frame from {remote} is {len} bytes, too long, possible attack")]
    Framing { remote: String, len: usize },

    #[error("Could not decrypt data from {remote}. Make sure the public key on the list is correct")]
    CorruptedFrame {
        remote: String,
        #[source]
        source: BoxError,
    },

    #[error("Malformed vote: {0}")]
    MalformedVote(String),

    #[error("Vote notification failed: {0}")]
    Notification(String),

    #[error("Unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out (no activity)")]
    ConnectionTimeout,

    #[error("Key error: {0}")]
    KeyError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// Stable name of the error kind, reported as `cause` to v2 clients
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::Io(_) => "IoError",
            ProtocolError::Serialization(_) => "SerializationError",
            ProtocolError::Framing { .. } => "FramingError",
            ProtocolError::CorruptedFrame { .. } => "CorruptedFrameError",
            ProtocolError::MalformedVote(_) => "MalformedVoteError",
            ProtocolError::Notification(_) => "NotificationError",
            ProtocolError::UnsupportedVersion(_) => "UnsupportedVersionError",
            ProtocolError::ConnectionClosed => "ConnectionClosedError",
            ProtocolError::ConnectionTimeout => "ConnectionTimeoutError",
            ProtocolError::KeyError(_) => "KeyError",
            ProtocolError::ConfigError(_) => "ConfigError",
        }
    }
}

/// Render an error followed by every chained `source()`, separated by `": "`.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        current = cause.source();
    }
    rendered
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupted_frame_chain_includes_cause() {
        let err = ProtocolError::CorruptedFrame {
            remote: "127.0.0.1:4000".into(),
            source: Box::new(io::Error::other("decryption error")),
        };

        let rendered = error_chain(&err);
        assert!(rendered.contains("127.0.0.1:4000"));
        assert!(rendered.ends_with(": decryption error"));
        assert_eq!(err.kind(), "CorruptedFrameError");
    }

    #[test]
    fn test_framing_message_mentions_attack() {
        let err = ProtocolError::Framing {
            remote: "10.0.0.1:1".into(),
            len: 300,
        };
        assert!(err.to_string().contains(constants::ERR_FRAME_TOO_LONG));
        assert_eq!(err.kind(), "FramingError");
    }
}
