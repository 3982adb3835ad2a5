use crate::core::legacy::LegacyFrameDecoder;
use crate::core::response::StatusResponse;
use crate::core::session::ProtocolVersion;
use crate::core::vote::Vote;
use crate::error::{ProtocolError, Result};
use crate::utils::keys::KeyProvider;
use bytes::{BufMut, BytesMut};
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

/// First two bytes of every v2 packet
pub const V2_MAGIC: u16 = 0x733A;

/// Boxed decoder for the v2 wire format
pub type ModernDecoder = Box<dyn Decoder<Item = Vote, Error = ProtocolError> + Send>;

/// Builds a v2 decoder for a connection.
///
/// The v2 format (JSON payload signed with a per-service token) is provided
/// by the host; the decoder receives the greeting challenge it must verify.
pub trait ModernDecoderFactory: Send + Sync {
    fn create(&self, challenge: &str, remote: &str) -> ModernDecoder;
}

/// Frames written by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// `VOTIFIER 2 <challenge>\n`, sent right after accept
    Greeting(String),
    /// v2 status object followed by `\r\n`
    Status(StatusResponse),
}

enum DecoderState {
    Differentiating,
    Legacy(LegacyFrameDecoder),
    Modern(ModernDecoder),
}

/// Per-connection codec: picks v1 or v2 from the first two bytes, then
/// delegates to the matching decoder for the rest of the connection.
pub struct VotifierCodec {
    keys: Arc<dyn KeyProvider>,
    modern: Option<Arc<dyn ModernDecoderFactory>>,
    remote: String,
    challenge: String,
    version: Option<ProtocolVersion>,
    state: DecoderState,
}

impl VotifierCodec {
    pub fn new(
        keys: Arc<dyn KeyProvider>,
        remote: impl Into<String>,
        challenge: impl Into<String>,
    ) -> Self {
        Self {
            keys,
            modern: None,
            remote: remote.into(),
            challenge: challenge.into(),
            version: None,
            state: DecoderState::Differentiating,
        }
    }

    /// Install the v2 decoder factory; without one v2 clients get `UnsupportedVersion`
    pub fn with_modern_decoder(mut self, factory: Option<Arc<dyn ModernDecoderFactory>>) -> Self {
        self.modern = factory;
        self
    }

    /// Version chosen by the differentiator, if it has run
    pub fn version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    fn differentiate(&mut self, src: &mut BytesMut) -> Result<()> {
        let magic = u16::from_be_bytes([src[0], src[1]]);
        if magic == V2_MAGIC {
            self.version = Some(ProtocolVersion::Two);
            match &self.modern {
                Some(factory) => {
                    let decoder = factory.create(&self.challenge, &self.remote);
                    self.state = DecoderState::Modern(decoder);
                }
                None => {
                    src.clear();
                    return Err(ProtocolError::UnsupportedVersion(ProtocolVersion::Two.as_u8()));
                }
            }
        } else {
            self.version = Some(ProtocolVersion::One);
            self.state = DecoderState::Legacy(LegacyFrameDecoder::new(
                self.keys.clone(),
                self.remote.clone(),
            ));
        }
        debug!(remote = %self.remote, version = ?self.version, "Protocol negotiated");
        Ok(())
    }
}

impl Decoder for VotifierCodec {
    type Item = Vote;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Vote>> {
        if matches!(self.state, DecoderState::Differentiating) {
            if src.len() < 2 {
                return Ok(None);
            }
            self.differentiate(src)?;
        }

        match &mut self.state {
            DecoderState::Differentiating => Ok(None),
            DecoderState::Legacy(decoder) => decoder.decode(src),
            DecoderState::Modern(decoder) => decoder.decode(src),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Vote>> {
        match &mut self.state {
            DecoderState::Differentiating => {
                src.clear();
                Ok(None)
            }
            DecoderState::Legacy(decoder) => decoder.decode_eof(src),
            DecoderState::Modern(decoder) => decoder.decode_eof(src),
        }
    }
}

impl Encoder<Outbound> for VotifierCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Outbound, dst: &mut BytesMut) -> Result<()> {
        match item {
            Outbound::Greeting(challenge) => {
                dst.reserve(12 + challenge.len());
                dst.put_slice(b"VOTIFIER 2 ");
                dst.put_slice(challenge.as_bytes());
                dst.put_u8(b'\n');
            }
            Outbound::Status(status) => {
                let json = serde_json::to_vec(&status)?;
                dst.reserve(json.len() + 2);
                dst.put_slice(&json);
                dst.put_slice(b"\r\n");
            }
        }
        Ok(())
    }
}
