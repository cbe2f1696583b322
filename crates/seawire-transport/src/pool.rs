//! Node pool with round-robin selection and timed revival.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use url::Url;

use crate::node::{Node, RevivalConfig};

/// Behavioural flavour of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// One node, never rotated
    SingleNode,
    /// Fixed membership, rotated round-robin
    Static,
    /// Membership refreshed at runtime by sniffing
    Sniffing,
    /// Prefers one node until it dies, no rotation
    Sticky,
}

struct PoolInner {
    nodes: Vec<Node>,
    last_sniff: Instant,
}

/// The set of nodes this client considers, plus their liveness state.
///
/// Shared process-wide: alive/dead bits and the round-robin cursor are
/// visible to every request. The lock is held only for the swap or the
/// bookkeeping write, never across I/O; selection copies a snapshot so a
/// concurrent reseed cannot mutate an iteration in progress.
pub struct NodePool {
    kind: PoolKind,
    revival: RevivalConfig,
    cursor: AtomicUsize,
    inner: RwLock<PoolInner>,
}

impl NodePool {
    fn new(kind: PoolKind, uris: Vec<Url>) -> Self {
        Self {
            kind,
            revival: RevivalConfig::default(),
            cursor: AtomicUsize::new(0),
            inner: RwLock::new(PoolInner {
                nodes: uris.into_iter().map(Node::new).collect(),
                last_sniff: Instant::now(),
            }),
        }
    }

    pub fn single_node(uri: Url) -> Self {
        Self::new(PoolKind::SingleNode, vec![uri])
    }

    pub fn static_pool(uris: Vec<Url>) -> Self {
        Self::new(PoolKind::Static, uris)
    }

    pub fn sniffing(uris: Vec<Url>) -> Self {
        Self::new(PoolKind::Sniffing, uris)
    }

    pub fn sticky(uris: Vec<Url>) -> Self {
        Self::new(PoolKind::Sticky, uris)
    }

    pub fn with_revival(mut self, revival: RevivalConfig) -> Self {
        self.revival = revival;
        self
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    /// Whether membership may be refreshed at runtime.
    pub fn is_sniffable(&self) -> bool {
        self.kind == PoolKind::Sniffing
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn available_count(&self, now: Instant) -> usize {
        self.inner
            .read()
            .nodes
            .iter()
            .filter(|n| n.is_available(now))
            .count()
    }

    /// Snapshot of every node, dead or alive.
    pub fn nodes(&self) -> Vec<Node> {
        self.inner.read().nodes.clone()
    }

    /// Candidate nodes for one request, in selection order.
    ///
    /// Surfaces only available nodes, rotated by the shared cursor and
    /// bounded by `budget`. When every node is dead, the one with the
    /// earliest revival deadline is surfaced alone as a last resort.
    pub fn next_batch(&self, now: Instant, budget: usize) -> Vec<Url> {
        let inner = self.inner.read();
        let len = inner.nodes.len();
        if len == 0 {
            return Vec::new();
        }

        let start = match self.kind {
            PoolKind::Sticky => self.cursor.load(Ordering::Relaxed),
            _ => self.cursor.fetch_add(1, Ordering::Relaxed),
        };

        let mut batch = Vec::new();
        for i in 0..len {
            let node = &inner.nodes[(start.wrapping_add(i)) % len];
            if node.is_available(now) {
                batch.push(node.uri.clone());
                if batch.len() >= budget.max(1) {
                    break;
                }
            }
        }
        if batch.is_empty() {
            // last-resort revival of the least-dead node
            if let Some(node) = inner.nodes.iter().min_by_key(|n| n.dead_until.unwrap_or(now))
            {
                batch.push(node.uri.clone());
            }
        }
        batch
    }

    pub fn mark_alive(&self, uri: &Url) {
        let mut inner = self.inner.write();
        if let Some(node) = inner.nodes.iter_mut().find(|n| &n.uri == uri) {
            node.mark_alive();
        }
    }

    pub fn mark_dead(&self, uri: &Url, now: Instant) {
        let mut inner = self.inner.write();
        if let Some(node) = inner.nodes.iter_mut().find(|n| &n.uri == uri) {
            node.mark_dead(now, &self.revival);
        }
    }

    /// Replace the membership wholesale after a sniff.
    ///
    /// The cursor is preserved modulo the new length so rotation continues
    /// rather than restarting.
    pub fn reseed(&self, uris: Vec<Url>, now: Instant) {
        let mut inner = self.inner.write();
        let fresh: Vec<Node> = uris.into_iter().map(Node::new).collect();
        let len = fresh.len().max(1);
        self.cursor
            .store(self.cursor.load(Ordering::Relaxed) % len, Ordering::Relaxed);
        inner.nodes = fresh;
        inner.last_sniff = now;
    }

    /// Whether the membership is older than `lifespan`.
    pub fn is_stale(&self, lifespan: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.inner.read().last_sniff) >= lifespan
    }
}
