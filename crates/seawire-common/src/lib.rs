//! Seawire Common Types and Transport Contracts
//!
//! This crate provides the protocol definitions and the low-level HTTP
//! contract for the seawire search-cluster client. It contains everything
//! the request pipeline consumes but does not own:
//!
//! - **Protocol Layer**: request descriptions, typed responses, call
//!   details, the audit-event vocabulary, and the error taxonomy
//! - **Transport Layer**: the [`NodeTransport`] trait that performs one
//!   HTTP exchange against a single node, plus the hyper-based
//!   implementation used by default
//! - **Codec**: the serializer seam used to materialise typed documents
//! - **Auth**: optional credentials rendered as an `Authorization` header
//!
//! # Architecture
//!
//! The request pipeline in `seawire-transport` drives these types: it
//! builds a [`RequestData`], selects a node, performs the exchange through
//! a [`NodeTransport`], and materialises a [`Response`] carrying
//! [`CallDetails`] with the full [`AuditEvent`] trail.
//!
//! Status codes never surface as errors from a [`NodeTransport`]; only
//! transport-level failures (connect, reset, timeout) do, classified as
//! recoverable or not via [`PipelineError`].
//!
//! # Example
//!
//! ```
//! use seawire_common::{HttpMethod, RequestData};
//!
//! let request = RequestData::new(HttpMethod::Get, "/_cluster/health")
//!     .with_allowed_status_codes(vec![404]);
//! assert_eq!(request.path, "/_cluster/health");
//! ```

pub mod auth;
pub mod buffer;
pub mod codec;
pub mod http;
pub mod protocol;

pub use auth::AuthConfig;
pub use buffer::{BufferFactory, HeapBufferFactory};
pub use codec::{Codec, JsonCodec};
pub use http::{BodyStream, HyperTransport, NodeTransport, RawResponse};
pub use protocol::*;
