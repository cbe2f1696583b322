//! Error taxonomy for the request pipeline.
//!
//! Two layers: [`PipelineError`] describes one failed step (one node
//! attempt, a sniff, a ping) and carries its own recoverability;
//! [`TransportError`] is the terminal failure of a whole request and
//! aggregates every attempt error plus the call details with the audit
//! trail.

use std::fmt;
use thiserror::Error;
use url::Url;

use super::response::CallDetails;

/// Classified failure kinds raised while driving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A node produced an unusable response or the exchange itself failed
    BadResponse,
    /// The cluster rejected our credentials
    BadAuthentication,
    /// A liveness probe failed
    PingFailure,
    /// Refreshing cluster membership failed on every candidate node
    SniffFailure,
    /// The one-shot startup sniff could not complete
    SniffOnStartupFailure,
    /// The wall-clock budget for the whole request ran out
    MaxTimeoutReached,
    /// The retry budget ran out
    MaxRetriesReached,
    /// The pool yielded no nodes at all
    NoNodesAttempted,
    /// The caller cancelled the request
    Cancelled,
    /// Anything that is not a classified pipeline failure
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadResponse => "bad response",
            ErrorKind::BadAuthentication => "bad authentication",
            ErrorKind::PingFailure => "ping failure",
            ErrorKind::SniffFailure => "sniff failure",
            ErrorKind::SniffOnStartupFailure => "sniff on startup failure",
            ErrorKind::MaxTimeoutReached => "max timeout reached",
            ErrorKind::MaxRetriesReached => "max retries reached",
            ErrorKind::NoNodesAttempted => "no nodes attempted",
            ErrorKind::Cancelled => "request cancelled",
            ErrorKind::Unexpected => "unexpected failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One failed pipeline step.
///
/// `recoverable` decides the outer loop's branch: `true` means another
/// node is worth trying, `false` terminates the request immediately.
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct PipelineError {
    pub kind: ErrorKind,
    pub recoverable: bool,
    pub message: String,
    /// Node involved, when the failure concerns one
    pub node: Option<Url>,
    /// HTTP status, when the failure came with a response
    pub status_code: Option<u16>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PipelineError {
    pub fn new(kind: ErrorKind, recoverable: bool, message: impl Into<String>) -> Self {
        Self {
            kind,
            recoverable,
            message: message.into(),
            node: None,
            status_code: None,
            source: None,
        }
    }

    /// Connection-level or unusable-response failure; another node may do
    /// better.
    pub fn bad_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadResponse, true, message)
    }

    /// Credential rejection. Retrying against another node cannot help.
    pub fn bad_authentication(status: u16) -> Self {
        Self::new(
            ErrorKind::BadAuthentication,
            false,
            format!("node rejected credentials with status {status}"),
        )
        .with_status(status)
    }

    /// Probe failure wrapping the underlying transport error; inherits its
    /// recoverability.
    pub fn ping_failure(source: PipelineError) -> Self {
        let recoverable = source.recoverable;
        let node = source.node.clone();
        let mut err = Self::new(
            ErrorKind::PingFailure,
            recoverable,
            format!("liveness probe failed: {}", source.message),
        );
        err.node = node;
        err.status_code = source.status_code;
        err.source = Some(Box::new(source));
        err
    }

    pub fn sniff_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SniffFailure, false, message)
    }

    pub fn sniff_on_startup_failure(source: PipelineError) -> Self {
        let mut err = Self::new(
            ErrorKind::SniffOnStartupFailure,
            false,
            format!("startup sniff failed: {}", source.message),
        );
        err.source = Some(Box::new(source));
        err
    }

    pub fn max_retries(attempts: usize) -> Self {
        Self::new(
            ErrorKind::MaxRetriesReached,
            false,
            format!("retry budget exhausted after {attempts} attempts"),
        )
    }

    pub fn max_timeout(elapsed: std::time::Duration) -> Self {
        Self::new(
            ErrorKind::MaxTimeoutReached,
            false,
            format!("request exceeded its wall-clock budget after {elapsed:?}"),
        )
    }

    pub fn no_nodes() -> Self {
        Self::new(
            ErrorKind::NoNodesAttempted,
            false,
            "the node pool yielded no candidates",
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, false, "cancellation was requested")
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, false, message)
    }

    pub fn with_node(mut self, node: Url) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

/// Terminal failure of one logical request.
///
/// Carries the terminal [`PipelineError`], every recoverable failure seen
/// on the way, and the [`CallDetails`] (with audit trail) describing what
/// was attempted.
#[derive(Error, Debug)]
#[error("request failed: {error}")]
pub struct TransportError {
    pub error: PipelineError,
    /// Recoverable failures accumulated before the terminal one
    pub attempts: Vec<PipelineError>,
    pub details: Option<CallDetails>,
}

impl TransportError {
    pub fn new(
        error: PipelineError,
        attempts: Vec<PipelineError>,
        details: Option<CallDetails>,
    ) -> Self {
        Self {
            error,
            attempts,
            details,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.is_cancelled()
    }

    pub fn audit_trail(&self) -> &[super::audit::AuditEvent] {
        self.details
            .as_ref()
            .map(|d| d.audit_trail.as_slice())
            .unwrap_or(&[])
    }
}
