//! Pluggable allocation of response-buffering memory.
//!
//! Buffered response bodies are read into buffers handed out by a
//! [`BufferFactory`], so deployments that buffer large bodies at high
//! request rates can plug a pooled allocator without touching the
//! pipeline.

/// Source of buffers used when a response body is materialised in memory.
pub trait BufferFactory: Send + Sync {
    /// Allocate a buffer, optionally sized for an expected body length.
    fn create(&self, capacity_hint: Option<usize>) -> Vec<u8>;
}

/// Plain heap allocation, the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapBufferFactory;

impl BufferFactory for HeapBufferFactory {
    fn create(&self, capacity_hint: Option<usize>) -> Vec<u8> {
        Vec::with_capacity(capacity_hint.unwrap_or(1024))
    }
}
