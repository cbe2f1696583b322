//! Seawire Transport
//!
//! The failover request pipeline of the seawire search-cluster client: one
//! logical request in, one node attempt after another until a terminal
//! state, a typed response with a full audit trail out.
//!
//! # Overview
//!
//! - **[`NodePool`]**: the nodes this client considers, with round-robin
//!   selection, timed revival of dead nodes, and runtime reseeding
//! - **[`Sniffer`]**: refreshes pool membership from the cluster at
//!   startup, on staleness, and after node failures
//! - **[`Pinger`]**: cheap liveness probe ahead of the real call
//! - **[`RequestPipeline`]**: the per-request state machine composing the
//!   above with the HTTP transport
//! - **[`ResponseBuilder`]**: materialises typed responses from raw
//!   exchanges
//! - **[`Transport`]**: the outer loop callers hold on to
//!
//! # Failure Model
//!
//! Failures are classified per attempt as recoverable (try the next node)
//! or not (terminate). A request that exhausts its retry budget fails with
//! the accumulated attempt errors; a request answered with a server-side
//! error the client understands *succeeds* with `success == false` and the
//! caller inspects the call details.

pub mod config;
pub mod node;
pub mod ping;
pub mod pipeline;
pub mod pool;
pub mod response;
pub mod sniff;
pub mod transport;

pub use config::{RequestCompletedHook, RequestDataHook, TransportConfig};
pub use node::{Node, RevivalConfig};
pub use ping::Pinger;
pub use pipeline::RequestPipeline;
pub use pool::{NodePool, PoolKind};
pub use response::ResponseBuilder;
pub use sniff::{SniffReason, Sniffer};
pub use transport::Transport;
