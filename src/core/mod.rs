//! # Core Protocol Components
//!
//! Vote records, per-connection sessions, and the byte-level codecs.
//!
//! ## Components
//! - **Vote**: immutable decoded vote record
//! - **Session**: negotiated protocol version and completion flag for one connection
//! - **Legacy**: one-shot decoder for the fixed 256-byte RSA frame
//! - **Codec**: protocol differentiator plus the outbound greeting/status encoder
//! - **Response**: v2 status objects
//!
//! ## Wire Format (v1)
//! ```text
//! RSA-PKCS1v15( "VOTE\n" service "\n" username "\n" address "\n" timestamp "\n" )  -> 256 bytes
//! ```
//!
//! ## Security
//! - Frames longer than 256 bytes are rejected before decryption
//! - Decrypted plaintext is parsed as ASCII, never trusted as UTF-8
//! - The legacy decoder accepts a single frame per connection

pub mod codec;
pub mod legacy;
pub mod response;
pub mod session;
pub mod vote;
