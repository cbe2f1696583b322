//! Default [`NodeTransport`] backed by hyper's http1 client.
//!
//! One TCP connection per exchange: requests to the same node never
//! serialize behind a shared connection, and a failed connection cannot
//! poison later attempts. The per-call timeout covers connect, handshake
//! and the response head; body streaming is owned by the response builder.

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use http_body_util::{BodyStream as HttpBodyStream, Full};
use hyper_util::rt::TokioIo;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{BodyStream, NodeTransport, RawResponse};
use crate::auth::AuthConfig;
use crate::protocol::{ErrorKind, HttpMethod, PipelineError};

impl From<HttpMethod> for hyper::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => hyper::Method::GET,
            HttpMethod::Head => hyper::Method::HEAD,
            HttpMethod::Post => hyper::Method::POST,
            HttpMethod::Put => hyper::Method::PUT,
            HttpMethod::Delete => hyper::Method::DELETE,
        }
    }
}

/// Connection-per-request HTTP/1.1 transport.
pub struct HyperTransport {
    auth: AuthConfig,
}

impl HyperTransport {
    pub fn new() -> Self {
        Self {
            auth: AuthConfig::None,
        }
    }

    pub fn with_auth(auth: AuthConfig) -> Self {
        Self { auth }
    }

    fn endpoint(node: &Url) -> Result<(String, u16), PipelineError> {
        if node.scheme() != "http" {
            // TLS negotiation is out of scope; refuse rather than mislead.
            return Err(PipelineError::new(
                ErrorKind::BadResponse,
                false,
                format!("unsupported scheme '{}' in node url {node}", node.scheme()),
            )
            .with_node(node.clone()));
        }
        let host = node.host_str().ok_or_else(|| {
            PipelineError::new(
                ErrorKind::BadResponse,
                false,
                format!("node url {node} has no host"),
            )
            .with_node(node.clone())
        })?;
        Ok((host.to_string(), node.port().unwrap_or(80)))
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeTransport for HyperTransport {
    async fn perform(
        &self,
        node: &Url,
        method: HttpMethod,
        path: &str,
        body: Option<Bytes>,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, PipelineError> {
        let (host, port) = Self::endpoint(node)?;

        let stream = tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::cancelled()),
            result = tokio::time::timeout(timeout, TcpStream::connect((host.as_str(), port))) => {
                match result {
                    Err(_) => {
                        return Err(PipelineError::bad_response(format!(
                            "connection to {node} timed out after {timeout:?}"
                        ))
                        .with_node(node.clone()))
                    }
                    Ok(Err(e)) => {
                        return Err(PipelineError::bad_response(format!(
                            "failed to connect to {node}: {e}"
                        ))
                        .with_node(node.clone())
                        .with_source(e))
                    }
                    Ok(Ok(stream)) => stream,
                }
            }
        };

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, Full<Bytes>>(io)
            .await
            .map_err(|e| {
                PipelineError::bad_response(format!("http handshake with {node} failed: {e}"))
                    .with_node(node.clone())
                    .with_source(e)
            })?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                tracing::debug!(error = %err, "node connection closed with error");
            }
        });

        let authority = match node.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.clone(),
        };
        let mut builder = hyper::Request::builder()
            .method(hyper::Method::from(method))
            .uri(path)
            .header(hyper::header::HOST, authority)
            .header(hyper::header::ACCEPT, "application/json");
        if let Some(value) = self.auth.header_value() {
            builder = builder.header(hyper::header::AUTHORIZATION, value);
        }
        if body.is_some() {
            builder = builder.header(hyper::header::CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(Full::new(body.unwrap_or_default()))
            .map_err(|e| {
                PipelineError::new(
                    ErrorKind::BadResponse,
                    false,
                    format!("could not build request for {node}{path}: {e}"),
                )
                .with_node(node.clone())
                .with_source(e)
            })?;

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(PipelineError::cancelled()),
            result = tokio::time::timeout(timeout, sender.send_request(request)) => {
                match result {
                    Err(_) => {
                        return Err(PipelineError::bad_response(format!(
                            "request to {node} timed out after {timeout:?}"
                        ))
                        .with_node(node.clone()))
                    }
                    Ok(Err(e)) => {
                        return Err(PipelineError::bad_response(format!(
                            "exchange with {node} failed: {e}"
                        ))
                        .with_node(node.clone())
                        .with_source(e))
                    }
                    Ok(Ok(response)) => response,
                }
            }
        };

        let status = response.status().as_u16();
        let warnings = response
            .headers()
            .get_all(hyper::header::WARNING)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_owned))
            .collect();

        let frames = HttpBodyStream::new(response.into_body())
            .map_err(std::io::Error::other)
            .try_filter_map(|frame| std::future::ready(Ok(frame.into_data().ok())));
        let frames: Pin<Box<dyn futures::Stream<Item = Result<Bytes, std::io::Error>> + Send>> =
            Box::pin(frames);

        Ok(RawResponse {
            status,
            warnings,
            body: BodyStream::new(StreamReader::new(frames)),
        })
    }
}
