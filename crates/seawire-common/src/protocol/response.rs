//! Typed responses and the call metadata attached to them.

use bytes::Bytes;
use std::fmt;
use url::Url;

use super::audit::AuditEvent;
use super::request::HttpMethod;
use crate::http::BodyStream;

/// Connection-level status codes: a node answering with one of these is
/// treated like a node that failed to answer at all.
const GATEWAY_STATUS_CODES: [u16; 3] = [502, 503, 504];

/// How the caller wants the response body materialised.
///
/// A closed set: the builder dispatches on this tag, there is no runtime
/// type inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyTarget {
    /// UTF-8 text of the buffered body
    Text,
    /// The buffered body verbatim
    Binary,
    /// No body; the stream is drained and discarded
    Empty,
    /// The raw stream, ownership transferred to the caller
    Stream,
    /// A document deserialized through the codec
    #[default]
    Document,
}

/// Materialised response body, one variant per [`BodyTarget`].
pub enum ResponseBody<T> {
    Text(String),
    Binary(Bytes),
    Empty,
    Stream(BodyStream),
    /// `None` when the status code was on the skip-deserialization list,
    /// the body was empty, or the request did not succeed
    Document(Option<T>),
}

impl<T> ResponseBody<T> {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ResponseBody::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn document(&self) -> Option<&T> {
        match self {
            ResponseBody::Document(doc) => doc.as_ref(),
            _ => None,
        }
    }
}

impl<T> fmt::Debug for ResponseBody<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Text(s) => f.debug_tuple("Text").field(&s.len()).finish(),
            ResponseBody::Binary(b) => f.debug_tuple("Binary").field(&b.len()).finish(),
            ResponseBody::Empty => f.write_str("Empty"),
            ResponseBody::Stream(_) => f.write_str("Stream"),
            ResponseBody::Document(doc) => {
                f.debug_tuple("Document").field(&doc.is_some()).finish()
            }
        }
    }
}

/// Audit metadata describing how one request was served.
///
/// Attached to every response and to every terminal error. The trail is
/// never empty once a request reaches a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct CallDetails {
    pub success: bool,
    /// `None` for genuine connection failures
    pub status_code: Option<u16>,
    pub method: HttpMethod,
    /// Full URL of the terminal attempt, when a node was reached
    pub uri: Option<Url>,
    pub request_body: Option<Bytes>,
    /// Buffered response body, recorded when buffering was in effect
    pub response_body: Option<Bytes>,
    /// Deprecation warnings surfaced by the cluster
    pub warnings: Vec<String>,
    pub audit_trail: Vec<AuditEvent>,
    /// Rendered terminal error, when the request failed
    pub error: Option<String>,
}

impl CallDetails {
    /// The success rule: `2xx`, `HEAD` + 404, an allow-listed status, or
    /// the `-1` wildcard.
    pub fn evaluate_success(method: HttpMethod, status: u16, allowed: &[i32]) -> bool {
        if (200..300).contains(&status) {
            return true;
        }
        if method == HttpMethod::Head && status == 404 {
            return true;
        }
        allowed.iter().any(|&c| c == -1 || c == status as i32)
    }

    /// Whether `status` is a server-side answer we understand, as opposed
    /// to a gateway-level symptom of a dying node.
    pub fn is_known_error_status(status: u16) -> bool {
        (400..600).contains(&status) && !GATEWAY_STATUS_CODES.contains(&status)
    }

    /// Whether the outcome is either a success or a server-side answer we
    /// understand. Gateway-level statuses and missing statuses are neither:
    /// they mean the node itself is suspect and failover should continue.
    pub fn success_or_known_error(&self) -> bool {
        if self.success {
            return true;
        }
        self.status_code.map_or(false, Self::is_known_error_status)
    }

    pub fn body_as_text(&self) -> Option<String> {
        self.response_body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

/// A typed response together with its [`CallDetails`].
#[derive(Debug)]
pub struct Response<T = serde_json::Value> {
    body: ResponseBody<T>,
    call: CallDetails,
}

impl<T> Response<T> {
    pub fn new(body: ResponseBody<T>, call: CallDetails) -> Self {
        Self { body, call }
    }

    pub fn body(&self) -> &ResponseBody<T> {
        &self.body
    }

    pub fn into_body(self) -> ResponseBody<T> {
        self.body
    }

    pub fn call(&self) -> &CallDetails {
        &self.call
    }

    pub fn call_mut(&mut self) -> &mut CallDetails {
        &mut self.call
    }

    pub fn success(&self) -> bool {
        self.call.success
    }

    pub fn status_code(&self) -> Option<u16> {
        self.call.status_code
    }

    pub fn document(&self) -> Option<&T> {
        self.body.document()
    }
}
