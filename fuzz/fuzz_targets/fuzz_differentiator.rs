#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use tokio_util::codec::Decoder;
use votifier_protocol::core::codec::VotifierCodec;
use votifier_protocol::error::BoxError;
use votifier_protocol::KeyProvider;

struct EchoKeys;

impl KeyProvider for EchoKeys {
    fn decrypt(&self, block: &[u8]) -> Result<Vec<u8>, BoxError> {
        Ok(block.to_vec())
    }
}

fuzz_target!(|data: &[u8]| {
    // Feed arbitrary chunks through the per-connection codec until it stops
    let mut codec = VotifierCodec::new(Arc::new(EchoKeys), "fuzz", "challenge");
    let mut buf = BytesMut::new();
    for chunk in data.chunks(64) {
        buf.extend_from_slice(chunk);
        if codec.decode(&mut buf).is_err() {
            return;
        }
    }
    let _ = codec.decode_eof(&mut buf);
});
