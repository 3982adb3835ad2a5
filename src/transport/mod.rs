//! # Transport Layer
//!
//! TCP listener that feeds connections into the vote pipeline.

pub mod tcp;

pub use tcp::VoteServer;
