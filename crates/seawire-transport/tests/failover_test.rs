//! Failover Pipeline Tests
//!
//! These tests drive the full transport loop against a scripted in-memory
//! node transport and verify:
//! - node selection, liveness marking and timed revival
//! - failover across recoverable failures and the retry budget
//! - terminal handling of non-recoverable failures
//! - audit-trail completeness and ordering
//! - sniffing (startup barrier, on-failure) and cancellation

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

use seawire_common::{
    AuditKind, BodyStream, BodyTarget, ErrorKind, HttpMethod, NodeTransport, PipelineError,
    RawResponse, RequestData, Response,
};
use seawire_transport::{NodePool, Transport, TransportConfig};

#[derive(Debug, Deserialize, PartialEq)]
struct Health {
    status: String,
}

/// Scripted behaviour of one node.
#[derive(Clone)]
enum Outcome {
    Ok { status: u16, body: &'static str },
    Refuse,
    Fatal(&'static str),
}

#[derive(Clone)]
struct NodeScript {
    call: Outcome,
    ping: Outcome,
    sniff: Outcome,
}

impl NodeScript {
    fn answering(status: u16, body: &'static str) -> Self {
        Self {
            call: Outcome::Ok { status, body },
            ping: Outcome::Ok { status: 200, body: "" },
            sniff: Outcome::Refuse,
        }
    }

    fn refusing() -> Self {
        Self {
            call: Outcome::Refuse,
            ping: Outcome::Refuse,
            sniff: Outcome::Refuse,
        }
    }

    fn with_sniff(mut self, sniff: Outcome) -> Self {
        self.sniff = sniff;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CallRecord {
    host: String,
    method: HttpMethod,
    path: String,
}

/// In-memory [`NodeTransport`] answering from per-node scripts.
struct MockTransport {
    scripts: HashMap<String, NodeScript>,
    calls: Mutex<Vec<CallRecord>>,
}

impl MockTransport {
    fn new(scripts: Vec<(&Url, NodeScript)>) -> Arc<Self> {
        Arc::new(Self {
            scripts: scripts
                .into_iter()
                .map(|(url, script)| (url.host_str().unwrap().to_string(), script))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_to(&self, path: &str) -> usize {
        self.calls().iter().filter(|c| c.path == path).count()
    }
}

#[async_trait]
impl NodeTransport for MockTransport {
    async fn perform(
        &self,
        node: &Url,
        method: HttpMethod,
        path: &str,
        _body: Option<Bytes>,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<RawResponse, PipelineError> {
        let host = node.host_str().unwrap().to_string();
        self.calls.lock().unwrap().push(CallRecord {
            host: host.clone(),
            method,
            path: path.to_string(),
        });

        let script = self
            .scripts
            .get(&host)
            .cloned()
            .unwrap_or_else(NodeScript::refusing);
        let outcome = if path == "/_nodes/http" {
            script.sniff
        } else if method == HttpMethod::Head && path == "/" {
            script.ping
        } else {
            script.call
        };

        match outcome {
            Outcome::Ok { status, body } => Ok(RawResponse {
                status,
                warnings: Vec::new(),
                body: BodyStream::from_bytes(Bytes::from_static(body.as_bytes())),
            }),
            Outcome::Refuse => Err(PipelineError::bad_response(format!(
                "failed to connect to {node}: connection refused"
            ))
            .with_node(node.clone())),
            Outcome::Fatal(message) => Err(PipelineError::new(
                seawire_common::ErrorKind::BadResponse,
                false,
                message,
            )
            .with_node(node.clone())),
        }
    }
}

fn url(host: &str) -> Url {
    Url::parse(&format!("http://{host}:9200")).unwrap()
}

fn audit_kinds(events: &[seawire_common::AuditEvent]) -> Vec<AuditKind> {
    events.iter().map(|e| e.kind).collect()
}

fn count_kind(events: &[seawire_common::AuditEvent], kind: AuditKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

// ----------------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_single_node_happy_path() {
    let a = url("node-a");
    let mock = MockTransport::new(vec![(
        &a,
        NodeScript::answering(200, r#"{"status":"green"}"#),
    )]);
    let transport = Transport::with_node_transport(
        TransportConfig::new(NodePool::single_node(a.clone())),
        mock.clone(),
    );

    let response: Response<Health> = transport
        .request(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap();

    assert!(response.success());
    assert_eq!(response.document().unwrap().status, "green");
    assert_eq!(mock.calls().len(), 1);

    let kinds = audit_kinds(&response.call().audit_trail);
    assert_eq!(kinds, vec![AuditKind::HealthyResponse, AuditKind::MarkAlive]);
}

#[tokio::test]
async fn test_failover_then_success() {
    let a = url("node-a");
    let b = url("node-b");
    let mock = MockTransport::new(vec![
        (&a, NodeScript::refusing()),
        (&b, NodeScript::answering(200, r#"{"status":"green"}"#)),
    ]);
    let pool = NodePool::static_pool(vec![a.clone(), b.clone()]);
    let config = TransportConfig::new(pool).with_ping_enabled(false);
    let transport = Transport::with_node_transport(config, mock.clone());

    let before = Instant::now();
    let response: Response<Health> = transport
        .request(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap();

    assert!(response.success());
    let trail = &response.call().audit_trail;
    assert_eq!(count_kind(trail, AuditKind::MarkDead), 1);
    assert_eq!(count_kind(trail, AuditKind::MarkAlive), 1);

    let dead = trail
        .iter()
        .find(|e| e.kind == AuditKind::MarkDead)
        .unwrap();
    assert_eq!(dead.node.as_ref().unwrap(), &a);
    let alive = trail
        .iter()
        .find(|e| e.kind == AuditKind::MarkAlive)
        .unwrap();
    assert_eq!(alive.node.as_ref().unwrap(), &b);

    // the failed node is dead for about one base revival timeout
    let nodes = transport.pool().nodes();
    let node_a = nodes.iter().find(|n| n.uri == a).unwrap();
    assert!(!node_a.is_alive);
    assert_eq!(node_a.failed_attempts, 1);
    let dead_until = node_a.dead_until.unwrap();
    let remaining = dead_until.duration_since(before);
    assert!(remaining > Duration::from_secs(59) && remaining <= Duration::from_secs(61));
}

#[tokio::test]
async fn test_all_nodes_dead_exhausts_budget() {
    let a = url("node-a");
    let b = url("node-b");
    let mock = MockTransport::new(vec![
        (&a, NodeScript::refusing()),
        (&b, NodeScript::refusing()),
    ]);
    let config = TransportConfig::new(NodePool::static_pool(vec![a.clone(), b.clone()]))
        .with_ping_enabled(false)
        .with_max_retries(1);
    let transport = Transport::with_node_transport(config, mock.clone());

    let error = transport
        .request::<Health>(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::MaxRetriesReached);
    assert_eq!(error.attempts.len(), 2);
    assert!(error
        .attempts
        .iter()
        .all(|e| e.kind == ErrorKind::BadResponse && e.recoverable));

    let details = error.details.as_ref().unwrap();
    assert!(!details.success);
    assert_eq!(count_kind(&details.audit_trail, AuditKind::MarkDead), 2);
    assert_eq!(
        count_kind(&details.audit_trail, AuditKind::MaxRetriesReached),
        1
    );
    assert_eq!(mock.calls().len(), 2);
}

#[tokio::test]
async fn test_bad_authentication_is_terminal() {
    let a = url("node-a");
    let b = url("node-b");
    let mock = MockTransport::new(vec![
        (&a, NodeScript::answering(401, r#"{"error":"unauthorized"}"#)),
        (&b, NodeScript::answering(200, r#"{"status":"green"}"#)),
    ]);
    let config = TransportConfig::new(NodePool::static_pool(vec![a.clone(), b.clone()]))
        .with_ping_enabled(false);
    let transport = Transport::with_node_transport(config, mock.clone());

    let error = transport
        .request::<Health>(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::BadAuthentication);
    assert!(!error.error.recoverable);
    assert_eq!(error.error.status_code, Some(401));
    // no attempt on the second node
    assert_eq!(mock.calls().len(), 1);
    assert_eq!(mock.calls()[0].host, "node-a");
}

#[tokio::test]
async fn test_head_404_is_success() {
    let a = url("node-a");
    let mock = MockTransport::new(vec![(&a, NodeScript::answering(404, ""))]);
    let transport = Transport::with_node_transport(
        TransportConfig::new(NodePool::single_node(a.clone())),
        mock.clone(),
    );

    let response: Response<Health> = transport
        .request(RequestData::new(HttpMethod::Head, "/library/_doc/9"))
        .await
        .unwrap();

    assert!(response.success());
    assert_eq!(response.status_code(), Some(404));
    assert!(response.document().is_none());
    assert_eq!(
        count_kind(&response.call().audit_trail, AuditKind::MarkDead),
        0
    );
    assert_eq!(mock.calls().len(), 1);
}

/// Answers pings, then cancels the shared token before the real call.
struct CancelAfterPing {
    token: CancellationToken,
    calls: Mutex<Vec<CallRecord>>,
}

#[async_trait]
impl NodeTransport for CancelAfterPing {
    async fn perform(
        &self,
        node: &Url,
        method: HttpMethod,
        path: &str,
        _body: Option<Bytes>,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<RawResponse, PipelineError> {
        self.calls.lock().unwrap().push(CallRecord {
            host: node.host_str().unwrap().to_string(),
            method,
            path: path.to_string(),
        });
        if method == HttpMethod::Head && path == "/" {
            self.token.cancel();
            return Ok(RawResponse {
                status: 200,
                warnings: Vec::new(),
                body: BodyStream::from_bytes(Bytes::new()),
            });
        }
        panic!("no call should be issued after cancellation");
    }
}

#[tokio::test]
async fn test_cancellation_after_ping_stops_the_request() {
    let a = url("node-a");
    let b = url("node-b");
    let token = CancellationToken::new();
    let mock = Arc::new(CancelAfterPing {
        token: token.clone(),
        calls: Mutex::new(Vec::new()),
    });
    let config = TransportConfig::new(NodePool::static_pool(vec![a.clone(), b.clone()]));
    let transport = Transport::with_node_transport(config, mock.clone());

    let error = transport
        .request_with_cancellation::<Health>(
            RequestData::new(HttpMethod::Get, "/_cluster/health"),
            token,
        )
        .await
        .unwrap_err();

    assert!(error.is_cancelled());
    assert_eq!(error.kind(), ErrorKind::Cancelled);
    assert_eq!(
        count_kind(error.audit_trail(), AuditKind::CancellationRequested),
        1
    );

    // one ping on the first node, nothing else anywhere
    let calls = mock.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, HttpMethod::Head);
    assert_eq!(calls[0].host, "node-a");
}

// ----------------------------------------------------------------------------
// Invariants and properties
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_audit_trail_is_monotonic_and_non_empty() {
    let a = url("node-a");
    let b = url("node-b");
    let mock = MockTransport::new(vec![
        (&a, NodeScript::refusing()),
        (&b, NodeScript::answering(200, r#"{"status":"yellow"}"#)),
    ]);
    let config = TransportConfig::new(NodePool::static_pool(vec![a, b])).with_ping_enabled(false);
    let transport = Transport::with_node_transport(config, mock);

    let response: Response<Health> = transport
        .request(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap();

    let trail = &response.call().audit_trail;
    assert!(!trail.is_empty());
    for pair in trail.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[tokio::test]
async fn test_default_budget_visits_every_live_node() {
    let a = url("node-a");
    let b = url("node-b");
    let c = url("node-c");
    let mock = MockTransport::new(vec![
        (&a, NodeScript::refusing()),
        (&b, NodeScript::refusing()),
        (&c, NodeScript::refusing()),
    ]);
    let config = TransportConfig::new(NodePool::static_pool(vec![a, b, c]))
        .with_ping_enabled(false);
    let transport = Transport::with_node_transport(config, mock.clone());

    let error = transport
        .request::<Health>(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::MaxRetriesReached);
    // exactly N attempts with N live nodes and no override
    assert_eq!(mock.calls().len(), 3);
    assert_eq!(count_kind(error.audit_trail(), AuditKind::MarkDead), 3);
}

#[tokio::test]
async fn test_max_retries_zero_means_one_attempt() {
    let a = url("node-a");
    let b = url("node-b");
    let mock = MockTransport::new(vec![
        (&a, NodeScript::refusing()),
        (&b, NodeScript::refusing()),
    ]);
    let config = TransportConfig::new(NodePool::static_pool(vec![a, b]))
        .with_ping_enabled(false)
        .with_max_retries(0);
    let transport = Transport::with_node_transport(config, mock.clone());

    let error = transport
        .request::<Health>(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::MaxRetriesReached);
    assert_eq!(mock.calls().len(), 1);
}

#[tokio::test]
async fn test_known_server_error_is_a_response_not_an_error() {
    let a = url("node-a");
    let mock = MockTransport::new(vec![(
        &a,
        NodeScript::answering(404, r#"{"found":false}"#),
    )]);
    let transport = Transport::with_node_transport(
        TransportConfig::new(NodePool::single_node(a.clone())),
        mock.clone(),
    );

    let response: Response<serde_json::Value> = transport
        .request(RequestData::new(HttpMethod::Get, "/library/_doc/9"))
        .await
        .unwrap();

    assert!(!response.success());
    assert_eq!(response.status_code(), Some(404));
    assert!(response.call().error.is_some());
    // the error body is still materialised for inspection
    assert_eq!(response.document().unwrap()["found"], false);
    // the node answered: it stays alive, no retry happened
    assert_eq!(count_kind(&response.call().audit_trail, AuditKind::MarkAlive), 1);
    assert_eq!(count_kind(&response.call().audit_trail, AuditKind::MarkDead), 0);
    assert_eq!(mock.calls().len(), 1);
    assert!(transport.pool().nodes()[0].is_alive);
}

#[tokio::test]
async fn test_allowed_status_turns_error_into_success() {
    let a = url("node-a");
    let mock = MockTransport::new(vec![(
        &a,
        NodeScript::answering(404, r#"{"status":"missing"}"#),
    )]);
    let transport = Transport::with_node_transport(
        TransportConfig::new(NodePool::single_node(a.clone())),
        mock,
    );

    let response: Response<Health> = transport
        .request(
            RequestData::new(HttpMethod::Get, "/library/_doc/9")
                .with_allowed_status_codes(vec![404]),
        )
        .await
        .unwrap();

    assert!(response.success());
    assert_eq!(response.document().unwrap().status, "missing");
}

#[tokio::test]
async fn test_gateway_status_fails_over() {
    let a = url("node-a");
    let b = url("node-b");
    let mock = MockTransport::new(vec![
        (&a, NodeScript::answering(503, "busy")),
        (&b, NodeScript::answering(200, r#"{"status":"green"}"#)),
    ]);
    let config = TransportConfig::new(NodePool::static_pool(vec![a.clone(), b])).with_ping_enabled(false);
    let transport = Transport::with_node_transport(config, mock.clone());

    let response: Response<Health> = transport
        .request(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap();

    assert!(response.success());
    let trail = &response.call().audit_trail;
    assert_eq!(count_kind(trail, AuditKind::MarkDead), 1);
    assert_eq!(count_kind(trail, AuditKind::MarkAlive), 1);
    assert_eq!(mock.calls().len(), 2);
}

#[tokio::test]
async fn test_non_recoverable_transport_failure_stops_failover() {
    let a = url("node-a");
    let b = url("node-b");
    let mock = MockTransport::new(vec![
        (
            &a,
            NodeScript {
                call: Outcome::Fatal("tls handshake rejected"),
                ping: Outcome::Ok { status: 200, body: "" },
                sniff: Outcome::Refuse,
            },
        ),
        (&b, NodeScript::answering(200, r#"{"status":"green"}"#)),
    ]);
    let config = TransportConfig::new(NodePool::static_pool(vec![a, b])).with_ping_enabled(false);
    let transport = Transport::with_node_transport(config, mock.clone());

    let error = transport
        .request::<Health>(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::BadResponse);
    assert!(!error.error.recoverable);
    assert_eq!(mock.calls().len(), 1);
}

#[tokio::test]
async fn test_empty_pool_reports_no_nodes() {
    let mock = MockTransport::new(vec![]);
    let transport = Transport::with_node_transport(
        TransportConfig::new(NodePool::static_pool(Vec::new())),
        mock,
    );

    let error = transport
        .request::<Health>(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::NoNodesAttempted);
    assert_eq!(
        count_kind(error.audit_trail(), AuditKind::NoNodesAttempted),
        1
    );
}

#[tokio::test]
async fn test_wall_clock_cap() {
    let a = url("node-a");
    let mock = MockTransport::new(vec![(
        &a,
        NodeScript::answering(200, r#"{"status":"green"}"#),
    )]);
    let config = TransportConfig::new(NodePool::single_node(a))
        .with_max_retry_timeout(Duration::ZERO);
    let transport = Transport::with_node_transport(config, mock.clone());

    let error = transport
        .request::<Health>(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::MaxTimeoutReached);
    assert_eq!(
        count_kind(error.audit_trail(), AuditKind::MaxTimeoutReached),
        1
    );
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_text_round_trips_utf8() {
    let a = url("node-a");
    let body = "taxonomy \u{2713} r\u{00e9}sum\u{00e9}";
    let mock = MockTransport::new(vec![(
        &a,
        NodeScript::answering(200, "taxonomy \u{2713} r\u{00e9}sum\u{00e9}"),
    )]);
    let transport = Transport::with_node_transport(
        TransportConfig::new(NodePool::single_node(a)),
        mock,
    );

    let response: Response = transport
        .request(RequestData::new(HttpMethod::Get, "/doc").with_target(BodyTarget::Text))
        .await
        .unwrap();
    assert_eq!(response.body().as_text(), Some(body));
}

#[tokio::test]
async fn test_callbacks_fire_exactly_once() {
    let a = url("node-a");
    let created = Arc::new(AtomicUsize::new(0));
    let completed = Arc::new(AtomicUsize::new(0));

    let mock = MockTransport::new(vec![(
        &a,
        NodeScript::answering(200, r#"{"status":"green"}"#),
    )]);
    let created_hook = created.clone();
    let completed_hook = completed.clone();
    let config = TransportConfig::new(NodePool::single_node(a))
        .on_request_data_created(Arc::new(move |_| {
            created_hook.fetch_add(1, Ordering::SeqCst);
        }))
        .on_request_completed(Arc::new(move |details| {
            assert!(!details.audit_trail.is_empty());
            completed_hook.fetch_add(1, Ordering::SeqCst);
        }));
    let transport = Transport::with_node_transport(config, mock);

    let _: Response<Health> = transport
        .request(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap();

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_completed_callback_fires_on_failure_too() {
    let a = url("node-a");
    let completed = Arc::new(AtomicUsize::new(0));

    let mock = MockTransport::new(vec![(&a, NodeScript::refusing())]);
    let completed_hook = completed.clone();
    let config = TransportConfig::new(NodePool::single_node(a))
        .on_request_completed(Arc::new(move |details| {
            assert!(!details.success);
            completed_hook.fetch_add(1, Ordering::SeqCst);
        }));
    let transport = Transport::with_node_transport(config, mock);

    let _ = transport
        .request::<Health>(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap_err();
    assert_eq!(completed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_recoverable_ping_failure_still_attempts_the_call() {
    let a = url("node-a");
    let b = url("node-b");
    let mock = MockTransport::new(vec![
        (
            &a,
            NodeScript {
                call: Outcome::Ok { status: 200, body: r#"{"status":"green"}"# },
                ping: Outcome::Refuse,
                sniff: Outcome::Refuse,
            },
        ),
        (&b, NodeScript::answering(200, r#"{"status":"green"}"#)),
    ]);
    let config = TransportConfig::new(NodePool::static_pool(vec![a.clone(), b.clone()]));
    let transport = Transport::with_node_transport(config, mock.clone());

    let response: Response<Health> = transport
        .request(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap();

    // the failed probe is recorded, but the call runs and its success wins
    assert!(response.success());
    let trail = &response.call().audit_trail;
    assert_eq!(count_kind(trail, AuditKind::PingFailure), 1);
    assert_eq!(count_kind(trail, AuditKind::MarkDead), 0);
    assert_eq!(count_kind(trail, AuditKind::MarkAlive), 1);
    assert!(mock
        .calls()
        .iter()
        .any(|c| c.host == "node-a" && c.path == "/_cluster/health"));
    // the second node was never needed
    assert!(!mock.calls().iter().any(|c| c.host == "node-b"));
}

#[tokio::test]
async fn test_ping_and_call_failure_drives_one_mark_dead() {
    let a = url("node-a");
    let b = url("node-b");
    let mock = MockTransport::new(vec![
        (&a, NodeScript::refusing()),
        (&b, NodeScript::answering(200, r#"{"status":"green"}"#)),
    ]);
    let config = TransportConfig::new(NodePool::static_pool(vec![a.clone(), b.clone()]));
    let transport = Transport::with_node_transport(config, mock.clone());

    let response: Response<Health> = transport
        .request(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap();

    assert!(response.success());
    let trail = &response.call().audit_trail;
    // both the probe and the call failed on the first node, but only the
    // call drives the mark-dead accounting
    assert_eq!(count_kind(trail, AuditKind::PingFailure), 1);
    assert_eq!(count_kind(trail, AuditKind::BadResponse), 1);
    assert_eq!(count_kind(trail, AuditKind::MarkDead), 1);
    let dead = trail
        .iter()
        .find(|e| e.kind == AuditKind::MarkDead)
        .unwrap();
    assert_eq!(dead.node.as_ref().unwrap(), &a);
    assert_eq!(count_kind(trail, AuditKind::MarkAlive), 1);
    // the real call was issued on the failing node despite the failed probe
    assert!(mock
        .calls()
        .iter()
        .any(|c| c.host == "node-a" && c.path == "/_cluster/health"));
}

// ----------------------------------------------------------------------------
// Sniffing
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_startup_sniff_replaces_membership() {
    let seed = url("seed");
    let a = url("node-a");
    let mock = MockTransport::new(vec![
        (
            &seed,
            NodeScript::answering(200, "").with_sniff(Outcome::Ok {
                status: 200,
                body: r#"{"nodes":{"n1":{"http":{"publish_address":"node-a:9200"}}}}"#,
            }),
        ),
        (&a, NodeScript::answering(200, r#"{"status":"green"}"#)),
    ]);
    let config =
        TransportConfig::new(NodePool::sniffing(vec![seed.clone()])).with_ping_enabled(false);
    let transport = Transport::with_node_transport(config, mock.clone());

    let response: Response<Health> = transport
        .request(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap();

    assert!(response.success());
    assert_eq!(mock.calls_to("/_nodes/http"), 1);
    let members: Vec<Url> = transport.pool().nodes().iter().map(|n| n.uri.clone()).collect();
    assert_eq!(members, vec![a]);
    assert_eq!(
        count_kind(&response.call().audit_trail, AuditKind::SniffOnStartup),
        1
    );
}

#[tokio::test]
async fn test_startup_sniff_runs_once_across_requests() {
    let seed = url("seed");
    let mock = MockTransport::new(vec![(
        &seed,
        NodeScript::answering(200, r#"{"status":"green"}"#).with_sniff(Outcome::Ok {
            status: 200,
            body: r#"{"nodes":{"n1":{"http":{"publish_address":"seed:9200"}}}}"#,
        }),
    )]);
    let config =
        TransportConfig::new(NodePool::sniffing(vec![seed.clone()])).with_ping_enabled(false);
    let transport = Transport::with_node_transport(config, mock.clone());

    let (first, second) = tokio::join!(
        transport.request::<Health>(RequestData::new(HttpMethod::Get, "/_cluster/health")),
        transport.request::<Health>(RequestData::new(HttpMethod::Get, "/_cluster/health")),
    );
    first.unwrap();
    second.unwrap();

    let _: Response<Health> = transport
        .request(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap();

    assert_eq!(mock.calls_to("/_nodes/http"), 1);
}

#[tokio::test]
async fn test_startup_sniff_failure_is_terminal() {
    let seed = url("seed");
    let mock = MockTransport::new(vec![(
        &seed,
        NodeScript::answering(200, r#"{"status":"green"}"#).with_sniff(Outcome::Refuse),
    )]);
    let config =
        TransportConfig::new(NodePool::sniffing(vec![seed.clone()])).with_ping_enabled(false);
    let transport = Transport::with_node_transport(config, mock);

    let error = transport
        .request::<Health>(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::SniffOnStartupFailure);
    assert_eq!(
        count_kind(error.audit_trail(), AuditKind::SniffOnStartup),
        1
    );
    assert_eq!(count_kind(error.audit_trail(), AuditKind::SniffFailure), 1);
}

#[tokio::test]
async fn test_sniff_on_fault_refreshes_membership() {
    let a = url("node-a");
    let b = url("node-b");
    let mock = MockTransport::new(vec![
        (&a, NodeScript::refusing()),
        (
            &b,
            NodeScript::answering(200, r#"{"status":"green"}"#).with_sniff(Outcome::Ok {
                status: 200,
                body: r#"{"nodes":{"n1":{"http":{"publish_address":"node-b:9200"}}}}"#,
            }),
        ),
    ]);
    let config = TransportConfig::new(NodePool::sniffing(vec![a.clone(), b.clone()]))
        .with_sniff_on_startup(false)
        .with_ping_enabled(false);
    let transport = Transport::with_node_transport(config, mock.clone());

    let response: Response<Health> = transport
        .request(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap();

    assert!(response.success());
    let trail = &response.call().audit_trail;
    assert_eq!(count_kind(trail, AuditKind::SniffSuccess), 1);
    // membership was replaced by the sniff triggered by the first failure
    let members: Vec<Url> = transport.pool().nodes().iter().map(|n| n.uri.clone()).collect();
    assert_eq!(members, vec![b]);
}

#[tokio::test]
async fn test_sniff_on_fault_is_suppressed_for_static_pools() {
    let a = url("node-a");
    let b = url("node-b");
    let mock = MockTransport::new(vec![
        (&a, NodeScript::refusing()),
        (&b, NodeScript::answering(200, r#"{"status":"green"}"#)),
    ]);
    let config = TransportConfig::new(NodePool::static_pool(vec![a, b]))
        .with_sniff_on_connection_fault(true)
        .with_ping_enabled(false);
    let transport = Transport::with_node_transport(config, mock.clone());

    let response: Response<Health> = transport
        .request(RequestData::new(HttpMethod::Get, "/_cluster/health"))
        .await
        .unwrap();

    assert!(response.success());
    assert_eq!(mock.calls_to("/_nodes/http"), 0);
}

#[tokio::test]
async fn test_pre_cancelled_token_short_circuits() {
    let a = url("node-a");
    let mock = MockTransport::new(vec![(
        &a,
        NodeScript::answering(200, r#"{"status":"green"}"#),
    )]);
    let transport = Transport::with_node_transport(
        TransportConfig::new(NodePool::single_node(a)),
        mock.clone(),
    );

    let token = CancellationToken::new();
    token.cancel();
    let error = transport
        .request_with_cancellation::<Health>(
            RequestData::new(HttpMethod::Get, "/_cluster/health"),
            token,
        )
        .await
        .unwrap_err();

    assert!(error.is_cancelled());
    assert_eq!(
        count_kind(error.audit_trail(), AuditKind::CancellationRequested),
        1
    );
    assert!(mock.calls().is_empty());
}
