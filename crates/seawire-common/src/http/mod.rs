//! The HTTP contract consumed by the request pipeline.
//!
//! # Architecture
//!
//! The pipeline never talks to a socket itself. It hands a node URL and a
//! request description to a [`NodeTransport`], which performs exactly one
//! HTTP exchange and returns a [`RawResponse`]: status code, deprecation
//! warnings, and the response body as an unread [`BodyStream`].
//!
//! # Contract
//!
//! - HTTP status codes never surface as errors; any answered exchange is
//!   `Ok`, whatever the status.
//! - Transport-level failures (connect refused, reset, timeout) surface as
//!   [`PipelineError`](crate::protocol::PipelineError) with recoverability
//!   classified by the implementation.
//! - Cancellation is honored at the implementation's suspension points and
//!   surfaces as `ErrorKind::Cancelled`, aborting in-flight I/O.
//!
//! # Components
//!
//! - **[`NodeTransport`]**: the trait implemented by concrete transports
//! - **[`HyperTransport`]**: the default hyper/http1 implementation
//! - **[`BodyStream`]** / **[`RawResponse`]**: the raw exchange result

mod hyper_transport;

pub use hyper_transport::HyperTransport;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::protocol::{HttpMethod, PipelineError};

/// An unread response body.
///
/// Ownership semantics follow the response builder: the builder consumes
/// the stream on every path except when the caller asked for the stream
/// itself.
pub struct BodyStream {
    inner: Box<dyn AsyncRead + Send + Unpin>,
}

impl BodyStream {
    pub fn new(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            inner: Box::new(reader),
        }
    }

    /// A replayable stream over already-buffered bytes.
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self::new(io::Cursor::new(bytes))
    }

    /// Read the remainder of the stream into `buf`, returning the number
    /// of bytes appended.
    pub async fn read_into(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        self.inner.read_to_end(buf).await
    }

    /// Consume and discard the remainder of the stream.
    pub async fn drain(mut self) -> io::Result<u64> {
        tokio::io::copy(&mut self.inner, &mut tokio::io::sink()).await
    }
}

impl AsyncRead for BodyStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.inner).poll_read(cx, buf)
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BodyStream")
    }
}

/// The result of one answered HTTP exchange.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    /// `Warning` headers surfaced by the node
    pub warnings: Vec<String>,
    pub body: BodyStream,
}

/// Performs one HTTP exchange against a single node.
#[async_trait]
pub trait NodeTransport: Send + Sync {
    /// Execute `method path` against `node`, bounded by `timeout`.
    ///
    /// Returns `Ok` for any HTTP status; `Err` only for transport-level
    /// failures, with recoverability classified.
    async fn perform(
        &self,
        node: &Url,
        method: HttpMethod,
        path: &str,
        body: Option<Bytes>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_body_stream_from_bytes_reads_back() {
        let mut stream = BodyStream::from_bytes(Bytes::from_static(b"{\"status\":\"green\"}"));
        let mut buf = Vec::new();
        let n = stream.read_into(&mut buf).await.unwrap();
        assert_eq!(n, 18);
        assert_eq!(buf, b"{\"status\":\"green\"}");
    }

    #[tokio::test]
    async fn test_body_stream_drain() {
        let stream = BodyStream::from_bytes(Bytes::from_static(b"payload"));
        let drained = stream.drain().await.unwrap();
        assert_eq!(drained, 7);
    }

    #[tokio::test]
    async fn test_body_stream_empty() {
        let mut stream = BodyStream::from_bytes(Bytes::new());
        let mut buf = Vec::new();
        assert_eq!(stream.read_into(&mut buf).await.unwrap(), 0);
        assert!(buf.is_empty());
    }
}
