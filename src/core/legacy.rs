use crate::core::vote::Vote;
use crate::error::{ProtocolError, Result};
use crate::utils::keys::KeyProvider;
use bytes::BytesMut;
use std::sync::Arc;
use tokio_util::codec::Decoder;
use tracing::debug;

/// Size of the encrypted legacy block
pub const LEGACY_FRAME_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    AwaitingFrame,
    /// A vote was emitted; everything after it is dropped
    Consumed,
}

/// One-shot decoder for the fixed-size RSA frame of protocol v1.
///
/// Waits silently until 256 bytes are buffered, rejects anything longer,
/// decrypts the block and parses the `VOTE` record. After one vote it never
/// decodes again on the same connection.
pub struct LegacyFrameDecoder {
    keys: Arc<dyn KeyProvider>,
    remote: String,
    state: FrameState,
}

impl LegacyFrameDecoder {
    pub fn new(keys: Arc<dyn KeyProvider>, remote: impl Into<String>) -> Self {
        Self {
            keys,
            remote: remote.into(),
            state: FrameState::AwaitingFrame,
        }
    }

    /// Whether the single frame has already produced a vote
    pub fn is_consumed(&self) -> bool {
        self.state == FrameState::Consumed
    }
}

impl Decoder for LegacyFrameDecoder {
    type Item = Vote;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Vote>> {
        if self.is_consumed() {
            if !src.is_empty() {
                debug!(remote = %self.remote, bytes = src.len(), "Discarding bytes after legacy vote");
                src.clear();
            }
            return Ok(None);
        }

        if src.len() < LEGACY_FRAME_SIZE {
            return Ok(None);
        }

        if src.len() > LEGACY_FRAME_SIZE {
            let len = src.len();
            src.clear();
            return Err(ProtocolError::Framing {
                remote: self.remote.clone(),
                len,
            });
        }

        let block = src.split_to(LEGACY_FRAME_SIZE);
        src.clear();

        let plaintext =
            self.keys
                .decrypt(&block)
                .map_err(|source| ProtocolError::CorruptedFrame {
                    remote: self.remote.clone(),
                    source,
                })?;

        let vote = Vote::from_plaintext(&plaintext)?;
        self.state = FrameState::Consumed;
        Ok(Some(vote))
    }

    /// The peer is gone: drop whatever is left without decoding it
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Vote>> {
        src.clear();
        Ok(None)
    }
}
