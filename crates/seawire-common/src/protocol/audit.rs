//! Append-only trail of pipeline events, attached to every response.

use std::time::Instant;
use url::Url;

/// Kind of event recorded while one request moves through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    SniffOnStartup,
    SniffSuccess,
    SniffFailure,
    PingSuccess,
    PingFailure,
    HealthyResponse,
    BadResponse,
    MaxRetriesReached,
    MaxTimeoutReached,
    NoNodesAttempted,
    CancellationRequested,
    MarkAlive,
    MarkDead,
}

impl AuditKind {
    /// Event name for logs and diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::SniffOnStartup => "sniff_on_startup",
            AuditKind::SniffSuccess => "sniff_success",
            AuditKind::SniffFailure => "sniff_failure",
            AuditKind::PingSuccess => "ping_success",
            AuditKind::PingFailure => "ping_failure",
            AuditKind::HealthyResponse => "healthy_response",
            AuditKind::BadResponse => "bad_response",
            AuditKind::MaxRetriesReached => "max_retries_reached",
            AuditKind::MaxTimeoutReached => "max_timeout_reached",
            AuditKind::NoNodesAttempted => "no_nodes_attempted",
            AuditKind::CancellationRequested => "cancellation_requested",
            AuditKind::MarkAlive => "mark_alive",
            AuditKind::MarkDead => "mark_dead",
        }
    }
}

/// One recorded pipeline event.
///
/// Events are appended in order within a request; timestamps are taken
/// from the monotonic clock, so the trail is timestamp-monotonic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub kind: AuditKind,
    /// Node involved, when the event concerns one
    pub node: Option<Url>,
    pub timestamp: Instant,
    /// Rendered error, for failure events
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(kind: AuditKind) -> Self {
        Self {
            kind,
            node: None,
            timestamp: Instant::now(),
            error: None,
        }
    }

    pub fn with_node(mut self, node: Url) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
