//! Shared building blocks for pemvault crates.
//!
//! - [`buffer_pool`]: pooled byte buffers for certificate read/encode paths
//! - [`lifecycle`]: process-wide cancellation and task tracking

pub mod buffer_pool;
pub mod lifecycle;

pub use buffer_pool::{BufferPool, PoolStats, PooledBuffer};
pub use lifecycle::Lifecycle;
