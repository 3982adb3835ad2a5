//! Observability and Metrics
//!
//! Counters for connections, votes and failures of the vote receiver.
//!
//! Uses atomic counters for thread-safe metrics collection.

use crate::core::session::ProtocolVersion;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector shared by the dispatcher and the server
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently open connections
    pub connections_active: AtomicU64,
    /// Connections refused because the server was full
    pub connections_refused: AtomicU64,
    /// Votes decoded from legacy frames
    pub votes_v1: AtomicU64,
    /// Votes decoded from v2 packets
    pub votes_v2: AtomicU64,
    /// Connections that ended in the failure path
    pub vote_failures: AtomicU64,
    /// Failures whose log line was suppressed by the throttle
    pub error_logs_suppressed: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            connections_refused: AtomicU64::new(0),
            votes_v1: AtomicU64::new(0),
            votes_v2: AtomicU64::new(0),
            vote_failures: AtomicU64::new(0),
            error_logs_suppressed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new connection
    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection closed
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn connection_refused(&self) {
        self.connections_refused.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dispatched vote
    pub fn vote_received(&self, version: ProtocolVersion) {
        match version {
            ProtocolVersion::One => self.votes_v1.fetch_add(1, Ordering::Relaxed),
            ProtocolVersion::Two => self.votes_v2.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn vote_failure(&self) {
        self.vote_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn error_log_suppressed(&self) {
        self.error_logs_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_refused: self.connections_refused.load(Ordering::Relaxed),
            votes_v1: self.votes_v1.load(Ordering::Relaxed),
            votes_v2: self.votes_v2.load(Ordering::Relaxed),
            vote_failures: self.vote_failures.load(Ordering::Relaxed),
            error_logs_suppressed: self.error_logs_suppressed.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            connections_refused = snapshot.connections_refused,
            votes_v1 = snapshot.votes_v1,
            votes_v2 = snapshot.votes_v2,
            vote_failures = snapshot.vote_failures,
            error_logs_suppressed = snapshot.error_logs_suppressed,
            uptime_seconds = snapshot.uptime_seconds,
            "Vote receiver metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub connections_refused: u64,
    pub votes_v1: u64,
    pub votes_v2: u64,
    pub vote_failures: u64,
    pub error_logs_suppressed: u64,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    pub fn votes_total(&self) -> u64 {
        self.votes_v1 + self.votes_v2
    }
}
