//! Transport configuration.
//!
//! Defaults are resolved against the pool: sniffing is on for sniffable
//! pools, pings are on whenever failing over is possible, and the retry
//! budget follows the live node count unless overridden here or per
//! request.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use seawire_common::{
    AuthConfig, BufferFactory, CallDetails, Codec, HeapBufferFactory, RequestData,
};

use crate::pool::NodePool;

/// Hook invoked once per request, before the first attempt.
pub type RequestDataHook = Arc<dyn Fn(&RequestData) + Send + Sync>;
/// Hook invoked exactly once per request, after the terminal state.
pub type RequestCompletedHook = Arc<dyn Fn(&CallDetails) + Send + Sync>;

/// Configuration of one [`Transport`](crate::Transport).
pub struct TransportConfig {
    /// The node pool requests fail over across
    pub pool: Arc<NodePool>,
    /// Retry budget override
    ///
    /// Default: live node count - 1
    pub max_retries: Option<usize>,
    /// Wall-clock cap for one whole request, across all attempts
    pub max_retry_timeout: Option<Duration>,
    /// Sniff once at process startup
    ///
    /// Default: on for sniffable pools
    pub sniff_on_startup: Option<bool>,
    /// Sniff after a node failure
    ///
    /// Default: on for sniffable pools
    pub sniff_on_connection_fault: Option<bool>,
    /// Re-sniff when the membership is older than this
    ///
    /// Default: off
    pub sniff_lifespan: Option<Duration>,
    /// Probe a node before the real call
    ///
    /// Default: on when the pool is sniffable or holds more than one node
    pub ping_enabled: Option<bool>,
    /// Default: 60 seconds
    pub request_timeout: Duration,
    /// Default: 2 seconds
    pub ping_timeout: Duration,
    /// Default: 2 seconds
    pub sniff_timeout: Duration,
    /// Buffer every response body, regardless of the requested shape
    pub disable_direct_streaming: bool,
    /// Status codes for which document deserialization is skipped
    pub skip_deserialization_for_status_codes: Vec<u16>,
    pub auth: AuthConfig,
    pub codec: Codec,
    pub buffer_factory: Arc<dyn BufferFactory>,
    pub on_request_data_created: Option<RequestDataHook>,
    pub on_request_completed: Option<RequestCompletedHook>,
}

impl TransportConfig {
    pub fn new(pool: NodePool) -> Self {
        Self {
            pool: Arc::new(pool),
            max_retries: None,
            max_retry_timeout: None,
            sniff_on_startup: None,
            sniff_on_connection_fault: None,
            sniff_lifespan: None,
            ping_enabled: None,
            request_timeout: Duration::from_secs(60),
            ping_timeout: Duration::from_secs(2),
            sniff_timeout: Duration::from_secs(2),
            disable_direct_streaming: false,
            skip_deserialization_for_status_codes: Vec::new(),
            auth: AuthConfig::None,
            codec: Codec::new(),
            buffer_factory: Arc::new(HeapBufferFactory),
            on_request_data_created: None,
            on_request_completed: None,
        }
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn with_max_retry_timeout(mut self, timeout: Duration) -> Self {
        self.max_retry_timeout = Some(timeout);
        self
    }

    pub fn with_sniff_on_startup(mut self, enabled: bool) -> Self {
        self.sniff_on_startup = Some(enabled);
        self
    }

    pub fn with_sniff_on_connection_fault(mut self, enabled: bool) -> Self {
        self.sniff_on_connection_fault = Some(enabled);
        self
    }

    pub fn with_sniff_lifespan(mut self, lifespan: Duration) -> Self {
        self.sniff_lifespan = Some(lifespan);
        self
    }

    pub fn with_ping_enabled(mut self, enabled: bool) -> Self {
        self.ping_enabled = Some(enabled);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    pub fn with_sniff_timeout(mut self, timeout: Duration) -> Self {
        self.sniff_timeout = timeout;
        self
    }

    pub fn with_disable_direct_streaming(mut self, disable: bool) -> Self {
        self.disable_direct_streaming = disable;
        self
    }

    pub fn with_skip_deserialization(mut self, codes: Vec<u16>) -> Self {
        self.skip_deserialization_for_status_codes = codes;
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_buffer_factory(mut self, factory: Arc<dyn BufferFactory>) -> Self {
        self.buffer_factory = factory;
        self
    }

    pub fn on_request_data_created(mut self, hook: RequestDataHook) -> Self {
        self.on_request_data_created = Some(hook);
        self
    }

    pub fn on_request_completed(mut self, hook: RequestCompletedHook) -> Self {
        self.on_request_completed = Some(hook);
        self
    }

    pub fn sniffs_on_startup(&self) -> bool {
        self.sniff_on_startup
            .unwrap_or_else(|| self.pool.is_sniffable())
    }

    pub fn sniffs_on_fault(&self) -> bool {
        self.sniff_on_connection_fault
            .unwrap_or_else(|| self.pool.is_sniffable())
    }

    pub fn pings_enabled(&self) -> bool {
        self.ping_enabled
            .unwrap_or_else(|| self.pool.is_sniffable() || self.pool.node_count() > 1)
    }

    pub fn effective_request_timeout(&self, request: &RequestData) -> Duration {
        request.request_timeout.unwrap_or(self.request_timeout)
    }

    pub fn effective_ping_timeout(&self, request: &RequestData) -> Duration {
        request.ping_timeout.unwrap_or(self.ping_timeout)
    }

    pub fn effective_sniff_timeout(&self, request: &RequestData) -> Duration {
        request.sniff_timeout.unwrap_or(self.sniff_timeout)
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("pool_kind", &self.pool.kind())
            .field("node_count", &self.pool.node_count())
            .field("max_retries", &self.max_retries)
            .field("max_retry_timeout", &self.max_retry_timeout)
            .field("sniff_on_startup", &self.sniff_on_startup)
            .field("sniff_on_connection_fault", &self.sniff_on_connection_fault)
            .field("sniff_lifespan", &self.sniff_lifespan)
            .field("ping_enabled", &self.ping_enabled)
            .field("request_timeout", &self.request_timeout)
            .field("ping_timeout", &self.ping_timeout)
            .field("sniff_timeout", &self.sniff_timeout)
            .field("disable_direct_streaming", &self.disable_direct_streaming)
            .field(
                "skip_deserialization_for_status_codes",
                &self.skip_deserialization_for_status_codes,
            )
            .finish_non_exhaustive()
    }
}
