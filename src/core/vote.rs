use crate::error::{constants, ProtocolError, Result};
use std::fmt;

/// Opcode that must open every legacy vote plaintext
pub const VOTE_OPCODE: &str = "VOTE";

/// Number of newline separated fields a legacy vote carries
pub const LEGACY_FIELD_COUNT: usize = 5;

/// A decoded vote. Immutable once a decoder has built it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    service_name: String,
    username: String,
    address: String,
    timestamp: String,
    token: Option<String>,
}

impl Vote {
    pub fn new(
        service_name: impl Into<String>,
        username: impl Into<String>,
        address: impl Into<String>,
        timestamp: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            username: username.into(),
            address: address.into(),
            timestamp: timestamp.into(),
            token,
        }
    }

    /// Parse the decrypted plaintext of a legacy frame.
    ///
    /// Bytes are read as ASCII; anything outside the ASCII range becomes
    /// `U+FFFD` rather than failing. Fields are split on `\n`, so the trailing
    /// newline a well-behaved client sends yields an extra empty field that is
    /// ignored.
    pub fn from_plaintext(plaintext: &[u8]) -> Result<Self> {
        let text: String = plaintext
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
            .collect();

        let fields: Vec<&str> = text.split('\n').collect();
        if fields.len() < LEGACY_FIELD_COUNT {
            return Err(ProtocolError::MalformedVote(format!(
                "expected {LEGACY_FIELD_COUNT} fields, got {}",
                fields.len()
            )));
        }

        if fields[0] != VOTE_OPCODE {
            return Err(ProtocolError::MalformedVote(
                constants::ERR_MISSING_OPCODE.to_string(),
            ));
        }

        Ok(Self::new(fields[1], fields[2], fields[3], fields[4], None))
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Only token-based protocol variants carry a token
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Split the vote into `(service_name, username)` for notification
    pub(crate) fn into_notification_parts(self) -> (String, String) {
        (self.service_name, self.username)
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Vote (from:{} username:{} address:{} timeStamp:{}",
            self.service_name, self.username, self.address, self.timestamp
        )?;
        if self.token.is_some() {
            write!(f, " token:<present>")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_formed_plaintext() {
        let vote = Vote::from_plaintext(b"VOTE\nA\nB\nC\nD\n").unwrap();
        assert_eq!(vote, Vote::new("A", "B", "C", "D", None));
        assert_eq!(vote.token(), None);
    }

    #[test]
    fn test_parse_without_trailing_newline() {
        let vote = Vote::from_plaintext(b"VOTE\nsite\nsteve\n1.2.3.4\n1700000000").unwrap();
        assert_eq!(vote.service_name(), "site");
        assert_eq!(vote.timestamp(), "1700000000");
    }

    #[test]
    fn test_wrong_opcode_rejected() {
        let err = Vote::from_plaintext(b"PING\na\nb\nc\nd").unwrap_err();
        match err {
            ProtocolError::MalformedVote(msg) => assert_eq!(msg, "missing VOTE opcode"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_four_fields_rejected() {
        let err = Vote::from_plaintext(b"VOTE\nA\nB\nC").unwrap_err();
        match err {
            ProtocolError::MalformedVote(msg) => assert_eq!(msg, "expected 5 fields, got 4"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_ascii_bytes_are_replaced() {
        let vote = Vote::from_plaintext(b"VOTE\nsvc\nst\xC3\xA9ve\naddr\nts\n").unwrap();
        assert_eq!(vote.username(), "st\u{FFFD}\u{FFFD}ve");
    }

    #[test]
    fn test_display_lists_fields() {
        let rendered = Vote::new("A", "B", "C", "D", None).to_string();
        assert_eq!(rendered, "Vote (from:A username:B address:C timeStamp:D)");
    }
}
