#![no_main]

use libfuzzer_sys::fuzz_target;
use votifier_protocol::Vote;

fuzz_target!(|data: &[u8]| {
    // Decrypted legacy blocks are attacker-controlled: parse must never panic
    let _ = Vote::from_plaintext(data);
});
