//! Buffer pooling for certificate reads and encoding.
//!
//! Every certificate served over the API is read into a buffer and then
//! base64-encoded into another one. Under concurrent request load that is a
//! steady stream of short-lived allocations of roughly the same size, so the
//! buffers are recycled through a shared pool instead.
//!
//! # Behaviour
//!
//! - Buffers are allocated with the pool's configured size (the per-file limit)
//! - Released buffers are cleared and kept, up to `max_pooled` of them
//! - Buffers that grew past `max_buffer_size` are dropped on release
//! - Release is tied to [`PooledBuffer`]'s `Drop`, so every exit path returns
//!   the buffer, including early returns on error

use bytes::BytesMut;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Default buffer size (16 KB).
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Default number of idle buffers kept by a pool.
pub const DEFAULT_MAX_POOLED: usize = 64;

/// Buffers larger than `buffer_size * OVERSIZE_FACTOR` are not pooled.
pub const OVERSIZE_FACTOR: usize = 4;

struct PoolInner {
    buffers: Mutex<VecDeque<BytesMut>>,
    buffer_size: usize,
    max_pooled: usize,
    max_buffer_size: usize,
    allocated: AtomicUsize,
    reused: AtomicUsize,
    dropped: AtomicUsize,
}

impl PoolInner {
    fn get(&self, min_capacity: usize) -> BytesMut {
        let recycled = {
            let mut buffers = self.buffers.lock();
            match buffers.iter().position(|b| b.capacity() >= min_capacity) {
                Some(idx) => buffers.remove(idx),
                None => buffers.pop_front(),
            }
        };

        if let Some(mut buf) = recycled {
            buf.clear();
            if min_capacity > buf.capacity() {
                buf.reserve(min_capacity);
            }
            self.reused.fetch_add(1, Ordering::Relaxed);
            return buf;
        }

        self.allocated.fetch_add(1, Ordering::Relaxed);
        BytesMut::with_capacity(min_capacity.max(self.buffer_size))
    }

    fn put(&self, mut buf: BytesMut) {
        if buf.capacity() > self.max_buffer_size {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let mut buffers = self.buffers.lock();
        if buffers.len() >= self.max_pooled {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        buf.clear();
        buffers.push_back(buf);
    }
}

/// Shared pool of reusable byte buffers.
///
/// Cloning is cheap and yields a handle to the same pool.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Create a pool handing out buffers of `buffer_size` bytes.
    pub fn new(buffer_size: usize) -> Self {
        let buffer_size = buffer_size.max(1);
        Self::with_limits(
            buffer_size,
            DEFAULT_MAX_POOLED,
            buffer_size.saturating_mul(OVERSIZE_FACTOR),
        )
    }

    /// Create a pool with explicit limits.
    pub fn with_limits(buffer_size: usize, max_pooled: usize, max_buffer_size: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                buffers: Mutex::new(VecDeque::with_capacity(max_pooled)),
                buffer_size,
                max_pooled,
                max_buffer_size,
                allocated: AtomicUsize::new(0),
                reused: AtomicUsize::new(0),
                dropped: AtomicUsize::new(0),
            }),
        }
    }

    /// Acquire a buffer of the pool's configured size.
    #[inline]
    pub fn acquire(&self) -> PooledBuffer {
        self.acquire_with_capacity(self.inner.buffer_size)
    }

    /// Acquire a buffer with at least the given capacity.
    pub fn acquire_with_capacity(&self, min_capacity: usize) -> PooledBuffer {
        PooledBuffer {
            buffer: self.inner.get(min_capacity),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Size of freshly allocated buffers.
    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    /// Drop every idle buffer.
    pub fn clear(&self) {
        self.inner.buffers.lock().clear();
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            pooled: self.inner.buffers.lock().len(),
            allocated: self.inner.allocated.load(Ordering::Relaxed),
            reused: self.inner.reused.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("buffer_size", &self.inner.buffer_size)
            .field("max_pooled", &self.inner.max_pooled)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A pooled buffer that returns to its pool on drop.
pub struct PooledBuffer {
    buffer: BytesMut,
    pool: Arc<PoolInner>,
}

impl PooledBuffer {
    /// Take the buffer out of the pool wrapper.
    ///
    /// The buffer will NOT be returned to the pool.
    pub fn take(mut self) -> BytesMut {
        std::mem::take(&mut self.buffer)
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buffer);
        // zero capacity means the buffer was taken
        if buf.capacity() > 0 {
            self.pool.put(buf);
        }
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl AsRef<[u8]> for PooledBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.buffer
    }
}

/// Buffer pool statistics.
#[derive(Debug, Clone, Copy)]
pub struct PoolStats {
    /// Number of idle buffers currently in the pool.
    pub pooled: usize,
    /// Total buffers allocated (lifetime).
    pub allocated: usize,
    /// Total buffers reused from pool (lifetime).
    pub reused: usize,
    /// Total buffers dropped (too large or pool full).
    pub dropped: usize,
}

impl PoolStats {
    /// Calculate the hit rate (reused / (allocated + reused)).
    pub fn hit_rate(&self) -> f64 {
        let total = self.allocated + self.reused;
        if total == 0 {
            0.0
        } else {
            self.reused as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn test_pooled_buffer_basic() {
        let pool = BufferPool::new(1024);
        let mut buf = pool.acquire();
        assert!(buf.capacity() >= 1024);
        assert!(buf.is_empty());

        buf.put_slice(b"hello");
        assert_eq!(buf.len(), 5);
        assert_eq!(&buf[..], b"hello");
    }

    #[test]
    fn test_buffer_reuse() {
        let pool = BufferPool::new(1024);

        {
            let mut buf = pool.acquire();
            buf.put_slice(b"test data");
        }
        assert_eq!(pool.stats().pooled, 1);

        {
            let buf = pool.acquire();
            assert!(buf.capacity() >= 1024);
            assert!(buf.is_empty(), "recycled buffers come back cleared");
        }

        let stats = pool.stats();
        assert_eq!(stats.allocated, 1);
        assert_eq!(stats.reused, 1);
    }

    #[test]
    fn test_clones_share_pool() {
        let pool = BufferPool::new(256);
        let other = pool.clone();

        drop(pool.acquire());
        assert_eq!(other.stats().pooled, 1);
    }

    #[test]
    fn test_oversized_buffer_not_pooled() {
        let pool = BufferPool::with_limits(64, 4, 128);

        {
            let mut buf = pool.acquire();
            buf.put_slice(&[0u8; 512]);
        }

        let stats = pool.stats();
        assert_eq!(stats.pooled, 0);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_buffer_take() {
        let pool = BufferPool::new(1024);

        let mut buf = pool.acquire();
        buf.put_slice(b"kept");
        let taken = buf.take();
        assert_eq!(&taken[..], b"kept");

        assert_eq!(pool.stats().pooled, 0);
    }

    #[test]
    fn test_released_on_error_path() {
        fn failing(pool: &BufferPool) -> Result<(), &'static str> {
            let mut buf = pool.acquire();
            buf.put_slice(b"partial");
            Err("read failed")
        }

        let pool = BufferPool::new(1024);
        assert!(failing(&pool).is_err());
        assert_eq!(pool.stats().pooled, 1);
    }

    #[test]
    fn test_pool_max_size() {
        let pool = BufferPool::with_limits(1024, 4, 4096);

        let buffers: Vec<_> = (0..6).map(|_| pool.acquire()).collect();
        drop(buffers);

        let stats = pool.stats();
        assert_eq!(stats.pooled, 4);
        assert_eq!(stats.dropped, 2);
    }

    #[test]
    fn test_hit_rate() {
        let stats = PoolStats {
            pooled: 5,
            allocated: 10,
            reused: 90,
            dropped: 0,
        };

        assert!((stats.hit_rate() - 0.9).abs() < 0.01);
    }
}
