//! Response materialisation.
//!
//! Turns one raw HTTP exchange into a typed [`Response`]. The body is
//! buffered into memory when direct streaming is disabled or the caller
//! asked for text/bytes; otherwise it is consumed lazily. The builder owns
//! the stream on every path except [`BodyTarget::Stream`], where ownership
//! transfers to the caller.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use url::Url;

use seawire_common::{
    BodyStream, BodyTarget, CallDetails, PipelineError, RawResponse, RequestData, Response,
    ResponseBody,
};

use crate::config::TransportConfig;

pub struct ResponseBuilder;

impl ResponseBuilder {
    /// Materialise a typed response from an answered exchange.
    pub async fn build<T: DeserializeOwned>(
        config: &TransportConfig,
        request: &RequestData,
        node: &Url,
        raw: RawResponse,
    ) -> Result<Response<T>, PipelineError> {
        let RawResponse {
            status,
            warnings,
            mut body,
        } = raw;

        for warning in &warnings {
            tracing::warn!(node = %node, warning = %warning, "deprecation warning from cluster");
        }

        let success =
            CallDetails::evaluate_success(request.method, status, &request.allowed_status_codes);
        let buffering = request.disable_direct_streaming
            || config.disable_direct_streaming
            || matches!(request.target, BodyTarget::Text | BodyTarget::Binary);

        let mut details = CallDetails {
            success,
            status_code: Some(status),
            method: request.method,
            uri: node.join(&request.path).ok(),
            request_body: request.body.clone(),
            response_body: None,
            warnings,
            audit_trail: Vec::new(),
            error: None,
        };

        let buffered: Option<Bytes> = if buffering {
            let bytes = Self::buffer(config, node, &mut body).await?;
            details.response_body = Some(bytes.clone());
            Some(bytes)
        } else {
            None
        };

        let response_body = match request.target {
            BodyTarget::Text => {
                let bytes = buffered.unwrap_or_default();
                ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned())
            }
            BodyTarget::Binary => ResponseBody::Binary(buffered.unwrap_or_default()),
            BodyTarget::Empty => {
                if buffered.is_none() {
                    let _ = body.drain().await;
                }
                ResponseBody::Empty
            }
            BodyTarget::Stream => match buffered {
                // replay the buffered bytes so the caller still gets a stream
                Some(bytes) => ResponseBody::Stream(BodyStream::from_bytes(bytes)),
                None => ResponseBody::Stream(body),
            },
            BodyTarget::Document => {
                let bytes = match buffered {
                    Some(bytes) => bytes,
                    None => Self::buffer(config, node, &mut body).await?,
                };
                let skipped = request
                    .skip_deserialization_for_status_codes
                    .contains(&status)
                    || config
                        .skip_deserialization_for_status_codes
                        .contains(&status);

                let document = if skipped || bytes.is_empty() {
                    None
                } else if let Some(converter) = &request.custom_converter {
                    let value = converter(&details, &bytes)?;
                    Some(serde_json::from_value(value).map_err(|e| {
                        PipelineError::unexpected(format!(
                            "custom converter produced an incompatible document: {e}"
                        ))
                        .with_source(e)
                    })?)
                } else {
                    Some(config.codec.decode(&bytes)?)
                };
                ResponseBody::Document(document)
            }
        };

        Ok(Response::new(response_body, details))
    }

    async fn buffer(
        config: &TransportConfig,
        node: &Url,
        body: &mut BodyStream,
    ) -> Result<Bytes, PipelineError> {
        let mut buf = config.buffer_factory.create(None);
        body.read_into(&mut buf).await.map_err(|e| {
            PipelineError::bad_response(format!("failed to read response body from {node}: {e}"))
                .with_node(node.clone())
                .with_source(e)
        })?;
        Ok(Bytes::from(buf))
    }
}
