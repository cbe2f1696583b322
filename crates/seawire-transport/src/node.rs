//! Per-node liveness bookkeeping.

use std::time::{Duration, Instant};
use url::Url;

/// Revival backoff for nodes that failed.
///
/// A dead node is skipped by selection until its revival deadline passes;
/// repeated failures push the deadline out exponentially, capped at
/// `max_dead_timeout`.
#[derive(Debug, Clone)]
pub struct RevivalConfig {
    /// Time a node stays dead after its first failure
    ///
    /// Default: 60 seconds
    pub dead_timeout: Duration,
    /// Upper bound on the revival deadline
    ///
    /// Default: 30 minutes
    pub max_dead_timeout: Duration,
}

impl Default for RevivalConfig {
    fn default() -> Self {
        Self {
            dead_timeout: Duration::from_secs(60),
            max_dead_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl RevivalConfig {
    /// How long a node stays dead after its n-th consecutive failure.
    ///
    /// ```text
    /// timeout = min(dead_timeout * 2^(failures - 1), max_dead_timeout)
    /// ```
    pub fn timeout_for(&self, failed_attempts: u32) -> Duration {
        let shift = failed_attempts.saturating_sub(1).min(16);
        self.dead_timeout
            .saturating_mul(1u32 << shift)
            .min(self.max_dead_timeout)
    }
}

/// A single addressable instance in the cluster.
///
/// Created when the pool is seeded or reseeded by a sniff; mutated only by
/// the pipeline's mark-alive / mark-dead accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub uri: Url,
    pub is_alive: bool,
    /// Revival deadline, set while the node is dead
    pub dead_until: Option<Instant>,
    /// Consecutive failures, drives the revival backoff
    pub failed_attempts: u32,
}

impl Node {
    pub fn new(uri: Url) -> Self {
        Self {
            uri,
            is_alive: true,
            dead_until: None,
            failed_attempts: 0,
        }
    }

    /// Whether selection may surface this node right now.
    pub fn is_available(&self, now: Instant) -> bool {
        self.is_alive || self.dead_until.map_or(true, |until| until <= now)
    }

    pub fn mark_alive(&mut self) {
        self.is_alive = true;
        self.failed_attempts = 0;
        self.dead_until = None;
    }

    pub fn mark_dead(&mut self, now: Instant, revival: &RevivalConfig) {
        self.is_alive = false;
        self.failed_attempts += 1;
        self.dead_until = Some(now + revival.timeout_for(self.failed_attempts));
    }
}
