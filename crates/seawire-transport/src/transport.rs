//! The outer request loop.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use seawire_common::{
    HyperTransport, NodeTransport, RequestData, Response, TransportError,
};

use crate::config::TransportConfig;
use crate::pipeline::RequestPipeline;
use crate::pool::NodePool;

/// Client-side transport for a clustered search engine.
///
/// Owns the configuration, the shared node pool and the startup barrier;
/// each request runs through its own [`RequestPipeline`]. Many requests
/// may run concurrently; within one request, failover is serial.
///
/// # Example
///
/// ```no_run
/// use seawire_transport::{NodePool, Transport, TransportConfig};
/// use seawire_common::{HttpMethod, RequestData};
/// use url::Url;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = NodePool::static_pool(vec![
///     Url::parse("http://10.0.0.1:9200")?,
///     Url::parse("http://10.0.0.2:9200")?,
/// ]);
/// let transport = Transport::new(TransportConfig::new(pool));
///
/// let response: seawire_common::Response =
///     transport.request(RequestData::new(HttpMethod::Get, "/_cluster/health")).await?;
/// assert!(response.success());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Transport {
    config: Arc<TransportConfig>,
    node_transport: Arc<dyn NodeTransport>,
    first_use: Arc<OnceCell<()>>,
}

impl Transport {
    /// Transport backed by the default hyper node transport.
    pub fn new(config: TransportConfig) -> Self {
        let node_transport = Arc::new(HyperTransport::with_auth(config.auth.clone()));
        Self::with_node_transport(config, node_transport)
    }

    /// Transport over a caller-supplied [`NodeTransport`].
    pub fn with_node_transport(
        config: TransportConfig,
        node_transport: Arc<dyn NodeTransport>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            node_transport,
            first_use: Arc::new(OnceCell::new()),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<NodePool> {
        &self.config.pool
    }

    /// Execute one logical request.
    pub async fn request<T: DeserializeOwned>(
        &self,
        request: RequestData,
    ) -> Result<Response<T>, TransportError> {
        self.request_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Execute one logical request under a cancellation token.
    ///
    /// The token is honored at every suspension point; a cancelled request
    /// still carries its audit trail on the returned error.
    pub async fn request_with_cancellation<T: DeserializeOwned>(
        &self,
        request: RequestData,
        cancel: CancellationToken,
    ) -> Result<Response<T>, TransportError> {
        if let Some(hook) = &self.config.on_request_data_created {
            hook(&request);
        }

        let mut pipeline = RequestPipeline::new(
            self.config.clone(),
            self.node_transport.clone(),
            self.first_use.clone(),
        );

        match pipeline.execute::<T>(&request, &cancel).await {
            Ok(response) => {
                if let Some(hook) = &self.config.on_request_completed {
                    hook(response.call());
                }
                Ok(response)
            }
            Err(error) => {
                let details = pipeline.failure_details(&request, &error);
                if let Some(hook) = &self.config.on_request_completed {
                    hook(&details);
                }
                Err(TransportError::new(
                    error,
                    pipeline.take_failures(),
                    Some(details),
                ))
            }
        }
    }
}
