//! # Vote Handling
//!
//! The shared inbound dispatcher and its collaborators.
//!
//! ## Components
//! - **Dispatcher**: turns a decoded vote or a failure into a reply, emits the notification
//! - **Throttle**: bounds failure log volume across all connections
//! - **Notify**: notification sink seam and the channel-backed sink

pub mod dispatcher;
pub mod notify;
pub mod throttle;

#[cfg(test)]
mod tests;
