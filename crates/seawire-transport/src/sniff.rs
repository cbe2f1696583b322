//! Cluster membership refresh.
//!
//! A sniff asks any answering node for the addresses of every node in the
//! cluster (`GET /_nodes/http`) and replaces the pool membership with the
//! result. Sniffs run out-of-band with their own timeout and fire on three
//! occasions: once at process startup, when the membership is older than
//! the configured lifespan, and after a node failure.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

use seawire_common::{HttpMethod, NodeTransport, PipelineError};

use crate::pool::NodePool;

/// Why a sniff is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffReason {
    Startup,
    Stale,
    Failure,
}

impl SniffReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SniffReason::Startup => "startup",
            SniffReason::Stale => "stale",
            SniffReason::Failure => "failure",
        }
    }
}

impl fmt::Display for SniffReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct SniffResponse {
    nodes: HashMap<String, SniffedNode>,
}

#[derive(Debug, Deserialize)]
struct SniffedNode {
    #[serde(default)]
    http: Option<SniffedHttp>,
}

#[derive(Debug, Deserialize)]
struct SniffedHttp {
    publish_address: String,
}

/// A publish address is `host:port`, sometimes prefixed `name/host:port`.
fn parse_publish_address(addr: &str) -> Option<Url> {
    let addr = addr.rsplit('/').next().unwrap_or(addr);
    Url::parse(&format!("http://{addr}")).ok()
}

/// Refreshes the pool membership from the cluster.
pub struct Sniffer {
    transport: Arc<dyn NodeTransport>,
    pool: Arc<NodePool>,
    timeout: Duration,
}

impl Sniffer {
    pub fn new(transport: Arc<dyn NodeTransport>, pool: Arc<NodePool>, timeout: Duration) -> Self {
        Self {
            transport,
            pool,
            timeout,
        }
    }

    /// Ask the cluster for its membership and reseed the pool.
    ///
    /// Candidates are tried in pool order; the first answering node wins.
    /// If every candidate fails the sniff itself has failed, which is not
    /// recoverable within the current request.
    pub async fn sniff(
        &self,
        reason: SniffReason,
        cancel: &CancellationToken,
    ) -> Result<usize, PipelineError> {
        let candidates = self
            .pool
            .next_batch(Instant::now(), self.pool.node_count().max(1));
        let mut last_error: Option<PipelineError> = None;

        for node in candidates {
            if cancel.is_cancelled() {
                return Err(PipelineError::cancelled());
            }
            match self.sniff_node(&node, cancel).await {
                Ok(uris) if !uris.is_empty() => {
                    let count = uris.len();
                    self.pool.reseed(uris, Instant::now());
                    tracing::info!(
                        reason = reason.as_str(),
                        nodes = count,
                        "cluster membership refreshed"
                    );
                    return Ok(count);
                }
                Ok(_) => {
                    last_error = Some(
                        PipelineError::bad_response(format!(
                            "node {node} reported an empty membership"
                        ))
                        .with_node(node.clone()),
                    );
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(node = %node, error = %e, "membership request failed");
                    last_error = Some(e);
                }
            }
        }

        let mut error = PipelineError::sniff_failure(format!(
            "no node answered the membership request ({reason} sniff)"
        ));
        if let Some(source) = last_error {
            error = error.with_source(source);
        }
        Err(error)
    }

    async fn sniff_node(
        &self,
        node: &Url,
        cancel: &CancellationToken,
    ) -> Result<Vec<Url>, PipelineError> {
        let mut raw = self
            .transport
            .perform(node, HttpMethod::Get, "/_nodes/http", None, self.timeout, cancel)
            .await?;

        if !(200..300).contains(&raw.status) {
            return Err(PipelineError::bad_response(format!(
                "membership request to {node} returned status {}",
                raw.status
            ))
            .with_node(node.clone())
            .with_status(raw.status));
        }

        let mut buf = Vec::new();
        raw.body.read_into(&mut buf).await.map_err(|e| {
            PipelineError::bad_response(format!(
                "failed to read membership response from {node}: {e}"
            ))
            .with_node(node.clone())
            .with_source(e)
        })?;

        let parsed: SniffResponse = serde_json::from_slice(&buf).map_err(|e| {
            PipelineError::bad_response(format!(
                "membership response from {node} was malformed: {e}"
            ))
            .with_node(node.clone())
            .with_source(e)
        })?;

        let mut uris: Vec<Url> = parsed
            .nodes
            .values()
            .filter_map(|n| n.http.as_ref())
            .filter_map(|h| parse_publish_address(&h.publish_address))
            .collect();
        // membership arrives in map order; keep the pool deterministic
        uris.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(uris)
    }
}
