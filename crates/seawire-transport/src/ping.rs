//! Cheap per-node liveness probe.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use seawire_common::{HttpMethod, NodeTransport, PipelineError};

/// Probes a node with a minimal `HEAD /` before the real call is spent on
/// it.
pub struct Pinger {
    transport: Arc<dyn NodeTransport>,
    timeout: Duration,
}

impl Pinger {
    pub fn new(transport: Arc<dyn NodeTransport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// Probe `node`. A failed probe wraps the underlying failure and keeps
    /// its recoverability; credential rejections are terminal.
    pub async fn ping(&self, node: &Url, cancel: &CancellationToken) -> Result<(), PipelineError> {
        match self
            .transport
            .perform(node, HttpMethod::Head, "/", None, self.timeout, cancel)
            .await
        {
            Ok(raw) if (200..300).contains(&raw.status) => Ok(()),
            Ok(raw) if raw.status == 401 || raw.status == 403 => {
                Err(PipelineError::bad_authentication(raw.status).with_node(node.clone()))
            }
            Ok(raw) => Err(PipelineError::ping_failure(
                PipelineError::bad_response(format!("probe returned status {}", raw.status))
                    .with_node(node.clone())
                    .with_status(raw.status),
            )),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => Err(PipelineError::ping_failure(e)),
        }
    }
}
