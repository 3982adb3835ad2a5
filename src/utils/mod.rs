//! # Utility Modules
//!
//! Supporting utilities for keys, logging, metrics and time.
//!
//! ## Components
//! - **Keys**: RSA key provider for the legacy frame
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Thread-safe observability counters
//! - **Time**: Millisecond clocks, including a manual clock for tests
//!
//! ## Security
//! - 2048-bit RSA keys only (one legacy frame is one RSA block)
//! - Private keys are written as PKCS#8 PEM

pub mod keys;
pub mod logging;
pub mod metrics;
pub mod time;

pub use keys::{KeyProvider, RsaKeyProvider};
pub use time::{Clock, ManualClock, SystemClock};
