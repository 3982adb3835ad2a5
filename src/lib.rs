//! # votifier-protocol
//!
//! Server side of the Votifier vote notification protocol.
//!
//! Remote vote sites connect over TCP and deliver one vote per connection,
//! either as a 256-byte RSA-encrypted legacy frame (v1) or through the v2
//! format. Every decoded vote is handed to a [`NotificationSink`] exactly once;
//! every connection ends with a well-formed reply: a plain close for v1 and a
//! JSON status object for v2.
//!
//! ## Layout
//! - [`core`]: votes, sessions, the legacy decoder and the per-connection codec
//! - [`protocol`]: the shared dispatcher, error-log throttle and notification sinks
//! - [`transport`]: the TCP server
//! - [`utils`]: RSA keys, logging, metrics, clocks
//! - [`config`]: TOML / environment configuration
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use votifier_protocol::config::VotifierConfig;
//! use votifier_protocol::protocol::notify::ChannelSink;
//! use votifier_protocol::{InboundDispatcher, RsaKeyProvider, VoteServer};
//!
//! # async fn run() -> votifier_protocol::error::Result<()> {
//! let config = VotifierConfig::default();
//! let keys = Arc::new(RsaKeyProvider::load_or_generate(&config.keys.directory)?);
//! let (sink, mut events) = ChannelSink::new();
//! let dispatcher = Arc::new(InboundDispatcher::new(Arc::new(sink)));
//!
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         println!("{} voted on {}", event.username, event.service_name);
//!     }
//! });
//!
//! VoteServer::bind(&config.server, keys, dispatcher).await?.run().await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::core::session::{ProtocolVersion, Session};
pub use crate::core::vote::Vote;
pub use crate::protocol::dispatcher::{InboundDispatcher, Reply};
pub use crate::protocol::notify::{NotificationSink, VoteEvent};
pub use crate::transport::VoteServer;
pub use crate::utils::keys::{KeyProvider, RsaKeyProvider};
