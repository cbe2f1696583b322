//! Request description handed to the pipeline.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::error::PipelineError;
use super::response::{BodyTarget, CallDetails};

/// HTTP method of a request against a cluster node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request hook invoked instead of the configured codec.
///
/// Produces an intermediate JSON value which is then converted into the
/// caller's document type. Keeps [`RequestData`] free of type parameters.
pub type ConverterFn =
    dyn Fn(&CallDetails, &Bytes) -> Result<serde_json::Value, PipelineError> + Send + Sync;

/// One logical request as seen by the pipeline.
///
/// Immutable after construction: the pipeline may execute it against
/// several nodes, but never mutates the description itself. Per-call
/// overrides left unset fall back to the transport configuration.
///
/// # Example
///
/// ```
/// use seawire_common::{BodyTarget, HttpMethod, RequestData};
/// use std::time::Duration;
///
/// let request = RequestData::new(HttpMethod::Post, "/library/_search")
///     .with_body(br#"{"query":{"match_all":{}}}"#.to_vec())
///     .with_request_timeout(Duration::from_secs(5))
///     .with_target(BodyTarget::Text);
/// assert_eq!(request.method, HttpMethod::Post);
/// ```
#[derive(Clone)]
pub struct RequestData {
    /// HTTP method
    pub method: HttpMethod,
    /// Path plus query string, starting with `/`
    pub path: String,
    /// Optional request body
    pub body: Option<Bytes>,
    /// How the response body should be materialised
    pub target: BodyTarget,
    /// Status codes treated as success; `-1` allows any status
    pub allowed_status_codes: Vec<i32>,
    /// Status codes for which document deserialization is skipped
    pub skip_deserialization_for_status_codes: Vec<u16>,
    /// Per-request deserialization hook
    pub custom_converter: Option<Arc<ConverterFn>>,
    /// Override of the configured request timeout
    pub request_timeout: Option<Duration>,
    /// Override of the configured ping timeout
    pub ping_timeout: Option<Duration>,
    /// Override of the configured sniff timeout
    pub sniff_timeout: Option<Duration>,
    /// Override of the configured retry budget
    pub max_retries: Option<usize>,
    /// Force body buffering for this request
    pub disable_direct_streaming: bool,
}

impl RequestData {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            target: BodyTarget::Document,
            allowed_status_codes: Vec::new(),
            skip_deserialization_for_status_codes: Vec::new(),
            custom_converter: None,
            request_timeout: None,
            ping_timeout: None,
            sniff_timeout: None,
            max_retries: None,
            disable_direct_streaming: false,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_target(mut self, target: BodyTarget) -> Self {
        self.target = target;
        self
    }

    /// Status codes that count as success even outside `2xx`.
    ///
    /// `-1` is a wildcard: any status code is accepted.
    pub fn with_allowed_status_codes(mut self, codes: Vec<i32>) -> Self {
        self.allowed_status_codes = codes;
        self
    }

    pub fn with_skip_deserialization(mut self, codes: Vec<u16>) -> Self {
        self.skip_deserialization_for_status_codes = codes;
        self
    }

    pub fn with_custom_converter(mut self, converter: Arc<ConverterFn>) -> Self {
        self.custom_converter = Some(converter);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = Some(timeout);
        self
    }

    pub fn with_sniff_timeout(mut self, timeout: Duration) -> Self {
        self.sniff_timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn with_disable_direct_streaming(mut self, disable: bool) -> Self {
        self.disable_direct_streaming = disable;
        self
    }

    /// Whether `status` satisfies the per-request allow-list.
    pub fn status_allowed(&self, status: u16) -> bool {
        self.allowed_status_codes
            .iter()
            .any(|&c| c == -1 || c == status as i32)
    }
}

impl fmt::Debug for RequestData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestData")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("body_len", &self.body.as_ref().map(|b| b.len()))
            .field("target", &self.target)
            .field("allowed_status_codes", &self.allowed_status_codes)
            .field(
                "skip_deserialization_for_status_codes",
                &self.skip_deserialization_for_status_codes,
            )
            .field("has_custom_converter", &self.custom_converter.is_some())
            .field("request_timeout", &self.request_timeout)
            .field("ping_timeout", &self.ping_timeout)
            .field("sniff_timeout", &self.sniff_timeout)
            .field("max_retries", &self.max_retries)
            .field("disable_direct_streaming", &self.disable_direct_streaming)
            .finish()
    }
}
