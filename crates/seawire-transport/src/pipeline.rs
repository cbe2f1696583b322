//! The per-request state machine.
//!
//! One pipeline instance serves one logical request: bootstrap the pool if
//! this is the first use of the process, re-sniff stale membership, then
//! walk the candidate nodes (optional ping, the real call, mark-alive or
//! mark-dead) until a terminal state is reached. Every step appends to the
//! audit trail that ships with the response or the terminal error.
//!
//! Failover is serial by design: each attempt teaches us something about
//! the cluster before the next node is tried. Recoverable failures are
//! accumulated and advance the loop; a non-recoverable failure, an
//! exhausted retry budget, the wall-clock cap or a cancellation ends it.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use url::Url;

use seawire_common::{
    AuditEvent, AuditKind, CallDetails, NodeTransport, PipelineError, RequestData, Response,
};

use crate::config::TransportConfig;
use crate::ping::Pinger;
use crate::response::ResponseBuilder;
use crate::sniff::{SniffReason, Sniffer};

pub struct RequestPipeline {
    config: Arc<TransportConfig>,
    transport: Arc<dyn NodeTransport>,
    /// One-shot cross-request barrier gating the startup sniff
    first_use: Arc<OnceCell<()>>,
    audit: Vec<AuditEvent>,
    /// Recoverable failures accumulated across attempts
    failures: Vec<PipelineError>,
    started_at: Instant,
    sniffed_on_fault: bool,
    last_node: Option<Url>,
    last_status: Option<u16>,
}

impl RequestPipeline {
    pub(crate) fn new(
        config: Arc<TransportConfig>,
        transport: Arc<dyn NodeTransport>,
        first_use: Arc<OnceCell<()>>,
    ) -> Self {
        Self {
            config,
            transport,
            first_use,
            audit: Vec::new(),
            failures: Vec::new(),
            started_at: Instant::now(),
            sniffed_on_fault: false,
            last_node: None,
            last_status: None,
        }
    }

    pub(crate) async fn execute<T: DeserializeOwned>(
        &mut self,
        request: &RequestData,
        cancel: &CancellationToken,
    ) -> Result<Response<T>, PipelineError> {
        self.bootstrap(request, cancel).await?;
        self.sniff_if_stale(request, cancel).await?;

        let pool = self.config.pool.clone();
        let now = Instant::now();
        let live = pool.available_count(now);
        let max_retries = request
            .max_retries
            .or(self.config.max_retries)
            .unwrap_or_else(|| live.saturating_sub(1));
        let budget = max_retries.saturating_add(1).min(live.max(1));

        let batch = pool.next_batch(now, budget);
        if batch.is_empty() {
            self.record(AuditEvent::new(AuditKind::NoNodesAttempted));
            return Err(PipelineError::no_nodes());
        }

        let mut attempts = 0usize;
        for node in batch {
            if cancel.is_cancelled() {
                self.record(AuditEvent::new(AuditKind::CancellationRequested));
                return Err(PipelineError::cancelled());
            }
            if let Some(cap) = self.config.max_retry_timeout {
                let elapsed = self.started_at.elapsed();
                if elapsed >= cap {
                    self.record(AuditEvent::new(AuditKind::MaxTimeoutReached));
                    return Err(PipelineError::max_timeout(elapsed));
                }
            }

            attempts += 1;
            self.last_node = Some(node.clone());
            tracing::debug!(node = %node, attempt = attempts, "attempting node");

            if self.config.pings_enabled() {
                let pinger = Pinger::new(
                    self.transport.clone(),
                    self.config.effective_ping_timeout(request),
                );
                match pinger.ping(&node, cancel).await {
                    Ok(()) => {
                        self.record(AuditEvent::new(AuditKind::PingSuccess).with_node(node.clone()))
                    }
                    Err(e) if e.is_cancelled() => {
                        self.record(
                            AuditEvent::new(AuditKind::CancellationRequested)
                                .with_node(node.clone()),
                        );
                        return Err(e);
                    }
                    Err(e) => {
                        self.record(
                            AuditEvent::new(AuditKind::PingFailure)
                                .with_node(node.clone())
                                .with_error(e.to_string()),
                        );
                        self.last_status = e.status_code.or(self.last_status);
                        if !e.recoverable {
                            return Err(e);
                        }
                        // the main call still runs against this node; its
                        // outcome, not the ping's, drives the liveness marking
                        self.failures.push(e);
                        self.sniff_on_fault(request, cancel).await?;
                    }
                }
            }

            if cancel.is_cancelled() {
                self.record(
                    AuditEvent::new(AuditKind::CancellationRequested).with_node(node.clone()),
                );
                return Err(PipelineError::cancelled());
            }

            match self.attempt::<T>(request, &node, cancel).await? {
                Some(response) => return Ok(response),
                None => continue,
            }
        }

        self.record(AuditEvent::new(AuditKind::MaxRetriesReached));
        Err(PipelineError::max_retries(attempts))
    }

    /// One exchange against one node.
    ///
    /// `Ok(Some(_))` is a terminal response (healthy or known error),
    /// `Ok(None)` means advance to the next node, `Err` ends the request.
    async fn attempt<T: DeserializeOwned>(
        &mut self,
        request: &RequestData,
        node: &Url,
        cancel: &CancellationToken,
    ) -> Result<Option<Response<T>>, PipelineError> {
        let timeout = self.config.effective_request_timeout(request);
        let raw = self
            .transport
            .perform(
                node,
                request.method,
                &request.path,
                request.body.clone(),
                timeout,
                cancel,
            )
            .await;

        let raw = match raw {
            Ok(raw) => raw,
            Err(e) if e.is_cancelled() => {
                self.record(
                    AuditEvent::new(AuditKind::CancellationRequested).with_node(node.clone()),
                );
                return Err(e);
            }
            Err(e) => {
                self.record(
                    AuditEvent::new(AuditKind::BadResponse)
                        .with_node(node.clone())
                        .with_error(e.to_string()),
                );
                self.mark_dead(node);
                self.last_status = e.status_code;
                if e.recoverable {
                    self.failures.push(e);
                    self.sniff_on_fault(request, cancel).await?;
                    return Ok(None);
                }
                return Err(e);
            }
        };

        let status = raw.status;
        self.last_status = Some(status);

        // credentials rejected: the node is healthy, the request is not
        if (status == 401 || status == 403) && !request.status_allowed(status) {
            self.record(
                AuditEvent::new(AuditKind::BadResponse)
                    .with_node(node.clone())
                    .with_error(format!("status {status}")),
            );
            self.mark_alive(node);
            return Err(PipelineError::bad_authentication(status).with_node(node.clone()));
        }

        // gateway-level status: the node itself is suspect, advance without
        // touching the body
        let success =
            CallDetails::evaluate_success(request.method, status, &request.allowed_status_codes);
        if !success && !CallDetails::is_known_error_status(status) {
            self.record(
                AuditEvent::new(AuditKind::BadResponse)
                    .with_node(node.clone())
                    .with_error(format!("status {status}")),
            );
            self.mark_dead(node);
            self.failures.push(
                PipelineError::bad_response(format!("node {node} returned status {status}"))
                    .with_node(node.clone())
                    .with_status(status),
            );
            self.sniff_on_fault(request, cancel).await?;
            return Ok(None);
        }

        let mut response =
            match ResponseBuilder::build::<T>(self.config.as_ref(), request, node, raw).await {
                Ok(response) => response,
                Err(e) => {
                    // the node answered; the payload did not survive materialisation
                    self.record(
                        AuditEvent::new(AuditKind::BadResponse)
                            .with_node(node.clone())
                            .with_error(e.to_string()),
                    );
                    self.mark_alive(node);
                    return Err(e);
                }
            };

        if response.success() {
            self.record(AuditEvent::new(AuditKind::HealthyResponse).with_node(node.clone()));
            self.mark_alive(node);
            response.call_mut().audit_trail = std::mem::take(&mut self.audit);
            Ok(Some(response))
        } else {
            // a server-side answer we understand; terminal, but not a success
            self.record(
                AuditEvent::new(AuditKind::BadResponse)
                    .with_node(node.clone())
                    .with_error(format!("status {status}")),
            );
            self.mark_alive(node);
            response.call_mut().error = Some(format!("node returned status {status}"));
            response.call_mut().audit_trail = std::mem::take(&mut self.audit);
            Ok(Some(response))
        }
    }

    /// Startup sniff behind the process-wide one-shot barrier.
    ///
    /// Exactly one request performs it; concurrent requests wait on the
    /// same cell and drop through once it resolves. A failed startup sniff
    /// is surfaced to the triggering requests and retried by the next one.
    async fn bootstrap(
        &mut self,
        request: &RequestData,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        if !self.config.sniffs_on_startup() || !self.config.pool.is_sniffable() {
            return Ok(());
        }
        if self.first_use.initialized() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            self.record(AuditEvent::new(AuditKind::CancellationRequested));
            return Err(PipelineError::cancelled());
        }

        self.record(AuditEvent::new(AuditKind::SniffOnStartup));
        let cell = self.first_use.clone();
        let sniffer = self.sniffer(request);
        let result = cell
            .get_or_try_init(|| async {
                sniffer.sniff(SniffReason::Startup, cancel).await.map(|_| ())
            })
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_cancelled() => {
                self.record(AuditEvent::new(AuditKind::CancellationRequested));
                Err(e)
            }
            Err(e) => {
                self.record(AuditEvent::new(AuditKind::SniffFailure).with_error(e.to_string()));
                Err(PipelineError::sniff_on_startup_failure(e))
            }
        }
    }

    async fn sniff_if_stale(
        &mut self,
        request: &RequestData,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let Some(lifespan) = self.config.sniff_lifespan else {
            return Ok(());
        };
        if !self.config.pool.is_sniffable() || !self.config.pool.is_stale(lifespan, Instant::now())
        {
            return Ok(());
        }
        if cancel.is_cancelled() {
            self.record(AuditEvent::new(AuditKind::CancellationRequested));
            return Err(PipelineError::cancelled());
        }

        match self.sniffer(request).sniff(SniffReason::Stale, cancel).await {
            Ok(_) => {
                self.record(AuditEvent::new(AuditKind::SniffSuccess));
                Ok(())
            }
            Err(e) if e.is_cancelled() => {
                self.record(AuditEvent::new(AuditKind::CancellationRequested));
                Err(e)
            }
            Err(e) => {
                self.record(AuditEvent::new(AuditKind::SniffFailure).with_error(e.to_string()));
                Err(e)
            }
        }
    }

    /// At most one sniff per request, and only for sniffable pools.
    async fn sniff_on_fault(
        &mut self,
        request: &RequestData,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        if self.sniffed_on_fault
            || !self.config.sniffs_on_fault()
            || !self.config.pool.is_sniffable()
        {
            return Ok(());
        }
        if cancel.is_cancelled() {
            self.record(AuditEvent::new(AuditKind::CancellationRequested));
            return Err(PipelineError::cancelled());
        }
        self.sniffed_on_fault = true;

        match self
            .sniffer(request)
            .sniff(SniffReason::Failure, cancel)
            .await
        {
            Ok(_) => {
                self.record(AuditEvent::new(AuditKind::SniffSuccess));
                Ok(())
            }
            Err(e) if e.is_cancelled() => {
                self.record(AuditEvent::new(AuditKind::CancellationRequested));
                Err(e)
            }
            Err(e) => {
                // every candidate was tried and none answered
                self.record(AuditEvent::new(AuditKind::SniffFailure).with_error(e.to_string()));
                Err(e)
            }
        }
    }

    fn sniffer(&self, request: &RequestData) -> Sniffer {
        Sniffer::new(
            self.transport.clone(),
            self.config.pool.clone(),
            self.config.effective_sniff_timeout(request),
        )
    }

    fn mark_alive(&mut self, node: &Url) {
        self.config.pool.mark_alive(node);
        self.record(AuditEvent::new(AuditKind::MarkAlive).with_node(node.clone()));
    }

    fn mark_dead(&mut self, node: &Url) {
        self.config.pool.mark_dead(node, Instant::now());
        tracing::warn!(node = %node, "node marked dead");
        self.record(AuditEvent::new(AuditKind::MarkDead).with_node(node.clone()));
    }

    fn record(&mut self, event: AuditEvent) {
        tracing::debug!(event = event.kind.as_str(), "pipeline event");
        self.audit.push(event);
    }

    /// Call details for a request that ended in a terminal error.
    pub(crate) fn failure_details(
        &mut self,
        request: &RequestData,
        error: &PipelineError,
    ) -> CallDetails {
        CallDetails {
            success: false,
            status_code: error.status_code.or(self.last_status),
            method: request.method,
            uri: self
                .last_node
                .as_ref()
                .and_then(|n| n.join(&request.path).ok()),
            request_body: request.body.clone(),
            response_body: None,
            warnings: Vec::new(),
            audit_trail: std::mem::take(&mut self.audit),
            error: Some(error.to_string()),
        }
    }

    pub(crate) fn take_failures(&mut self) -> Vec<PipelineError> {
        std::mem::take(&mut self.failures)
    }
}
