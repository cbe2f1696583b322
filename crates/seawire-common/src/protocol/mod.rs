//! Seawire Protocol Definitions
//!
//! This module defines the data contracts shared by the transport core and
//! its callers:
//!
//! - **[`RequestData`]**: one logical request (method, path, body, per-call
//!   overrides), immutable once handed to the pipeline
//! - **[`Response`]** / **[`ResponseBody`]**: the typed result of a request,
//!   with the body materialised according to a caller-selected
//!   [`BodyTarget`]
//! - **[`CallDetails`]**: the audit metadata attached to every response,
//!   successful or not
//! - **[`AuditEvent`]** / **[`AuditKind`]**: the ordered trail of pipeline
//!   events recorded while serving one request
//! - **[`PipelineError`]** / **[`TransportError`]**: the error taxonomy,
//!   with explicit recoverable/non-recoverable classification
//!
//! # Error Handling
//!
//! Failures are classified per attempt: *recoverable* means another node is
//! worth trying, *non-recoverable* terminates the request immediately
//! (e.g. bad credentials). Only the terminal error is returned to the
//! caller; it carries every accumulated attempt error plus the audit trail.

pub mod audit;
pub mod error;
pub mod request;
pub mod response;

pub use audit::{AuditEvent, AuditKind};
pub use error::{ErrorKind, PipelineError, TransportError};
pub use request::{HttpMethod, RequestData};
pub use response::{BodyTarget, CallDetails, Response, ResponseBody};
