//! Outbound buffer pool.
//!
//! Pre-allocates a few buffers per size class and hands them out as
//! [`PooledBuffer`]s, which return to their lock-free freelist when dropped,
//! whether or not the send succeeded.
//!
//! | Class | Frames |
//! |-------|--------|
//! | 64    | `RPOS` query |
//! | 512   | `RREF` request (413), `DREF` (509) |
//! | 1472  | anything else up to one unfragmented datagram |

use crossbeam::queue::ArrayQueue;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Buffer sizes served from the freelists.
pub const SIZE_CLASSES: [usize; 3] = [64, 512, 1472];

struct SizeClass {
    size: usize,
    free: ArrayQueue<Vec<u8>>,
}

/// Fixed-capacity pool of send buffers.
pub struct BufferPool {
    classes: Vec<SizeClass>,
    /// Count of acquisitions that found their class empty (diagnostic)
    exhausted_count: AtomicU64,
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferPool")
            .field("available", &self.available())
            .field("exhausted_count", &self.exhausted_count())
            .finish()
    }
}

impl BufferPool {
    /// Create a pool with `per_class` buffers in each size class.
    ///
    /// `per_class` is clamped to at least one.
    pub fn new(per_class: usize) -> Arc<Self> {
        let per_class = per_class.max(1);
        let classes = SIZE_CLASSES
            .iter()
            .map(|&size| {
                let free = ArrayQueue::new(per_class);
                for _ in 0..per_class {
                    if free.push(vec![0u8; size]).is_err() {
                        break;
                    }
                }
                SizeClass { size, free }
            })
            .collect();
        Arc::new(Self {
            classes,
            exhausted_count: AtomicU64::new(0),
        })
    }

    /// Buffers currently idle across all classes.
    pub fn available(&self) -> usize {
        self.classes.iter().map(|class| class.free.len()).sum()
    }

    /// Acquisitions that had to allocate because their class was empty.
    pub fn exhausted_count(&self) -> u64 {
        self.exhausted_count.load(Ordering::Relaxed)
    }

    /// Take a zeroed buffer of exactly `len` bytes.
    ///
    /// Lengths above the largest class are allocated directly and never pooled.
    pub fn acquire(self: &Arc<Self>, len: usize) -> PooledBuffer {
        let class = self.classes.iter().position(|class| class.size >= len);
        let mut data = match class.and_then(|index| self.classes.get(index)) {
            Some(size_class) => match size_class.free.pop() {
                Some(buf) => buf,
                None => {
                    self.exhausted_count.fetch_add(1, Ordering::Relaxed);
                    vec![0u8; size_class.size]
                }
            },
            None => vec![0u8; len],
        };
        if let Some(frame) = data.get_mut(..len) {
            frame.fill(0);
        }
        PooledBuffer {
            data,
            len,
            class,
            pool: Arc::clone(self),
        }
    }

    fn release(&self, class: usize, data: Vec<u8>) {
        if let Some(size_class) = self.classes.get(class) {
            // A full freelist means this buffer was allocated on exhaustion.
            drop(size_class.free.push(data));
        }
    }
}

/// A send buffer borrowed from a [`BufferPool`]. Derefs to the frame bytes.
pub struct PooledBuffer {
    data: Vec<u8>,
    len: usize,
    class: Option<usize>,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    /// Shrink the frame to the first `len` bytes.
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.len)
            .field("class", &self.class)
            .finish()
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data.get(..self.len).unwrap_or(&[])
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data.get_mut(..self.len).unwrap_or(&mut [])
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(class) = self.class {
            self.pool.release(class, std::mem::take(&mut self.data));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_creation() {
        let pool = BufferPool::new(4);
        assert_eq!(pool.available(), 4 * SIZE_CLASSES.len());
        assert_eq!(pool.exhausted_count(), 0);
    }

    #[test]
    fn test_buffer_returns_on_drop() {
        let pool = BufferPool::new(2);
        let before = pool.available();
        {
            let buf = pool.acquire(413);
            assert_eq!(buf.len(), 413);
            assert_eq!(pool.available(), before - 1);
        }
        assert_eq!(pool.available(), before);
    }

    #[test]
    fn test_exhaustion_allocates_and_counts() {
        let pool = BufferPool::new(1);
        let first = pool.acquire(509);
        let second = pool.acquire(509);
        assert_eq!(second.len(), 509);
        assert_eq!(pool.exhausted_count(), 1);
        drop(first);
        drop(second);
        // the overflow buffer is discarded, capacity stays fixed
        assert_eq!(pool.available(), SIZE_CLASSES.len());
    }

    #[test]
    fn test_reused_buffers_are_zeroed() {
        let pool = BufferPool::new(1);
        {
            let mut buf = pool.acquire(8);
            buf.fill(0xAA);
        }
        let buf = pool.acquire(8);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_oversized_request_is_not_pooled() {
        let pool = BufferPool::new(1);
        let before = pool.available();
        let buf = pool.acquire(4096);
        assert_eq!(buf.len(), 4096);
        assert_eq!(pool.available(), before);
        assert_eq!(pool.exhausted_count(), 0);
    }

    #[test]
    fn test_truncate() {
        let pool = BufferPool::new(1);
        let mut buf = pool.acquire(64);
        buf.truncate(9);
        assert_eq!(buf.len(), 9);
        buf.truncate(100);
        assert_eq!(buf.len(), 9);
    }
}
