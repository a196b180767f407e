use std::fmt::{Debug, Formatter};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use tracing::{debug, trace};
use crate::buffers::fixed_buffer::FixedBuf;

/// A pool of [FixedBuf]s, keyed by buffer capacity. A stream typically uses two sizes: MTU
///  sized buffers for datagrams and max-segment-size buffers for segment bodies.
///
/// Buffers are handed out as [PooledBuf], which returns its buffer to the pool when it is
///  dropped, so a buffer has exactly one owner at any time and cannot be returned twice.
pub struct BufferPool {
    max_pool_size_per_capacity: usize,
    buffers: Mutex<FxHashMap<usize, Vec<FixedBuf>>>,
}

impl BufferPool {
    pub fn new(max_pool_size_per_capacity: usize) -> Arc<BufferPool> {
        Arc::new(BufferPool {
            max_pool_size_per_capacity,
            buffers: Default::default(),
        })
    }

    /// returns an empty buffer with the given capacity
    pub fn get_from_pool(self: &Arc<Self>, capacity: usize) -> PooledBuf {
        PooledBuf {
            buf: Some(self._get_from_pool(capacity)),
            pool: self.clone(),
        }
    }

    fn _get_from_pool(&self, capacity: usize) -> FixedBuf {
        {
            let mut buffers = self.buffers.lock().unwrap();
            if let Some(buffer) = buffers.get_mut(&capacity).and_then(|b| b.pop()) {
                trace!("returning buffer from pool");
                return buffer;
            }
        }

        debug!("no buffer of capacity {} in pool: creating new buffer", capacity);
        FixedBuf::new(capacity)
    }

    fn return_to_pool(&self, mut buffer: FixedBuf) {
        buffer.clear();

        let mut buffers = self.buffers.lock().unwrap();
        let pooled = buffers.entry(buffer.capacity()).or_default();
        if pooled.len() < self.max_pool_size_per_capacity {
            trace!("returning buffer to pool");
            pooled.push(buffer);
        }
        else {
            debug!("pool is full: discarding returned buffer");
        }
    }

    /// number of buffers of a given capacity that are currently available in the pool
    pub fn num_pooled(&self, capacity: usize) -> usize {
        self.buffers.lock().unwrap()
            .get(&capacity)
            .map(|b| b.len())
            .unwrap_or(0)
    }
}

/// A buffer borrowed from a [BufferPool]. It derefs to [FixedBuf], and it goes back to its
///  pool when it is dropped.
pub struct PooledBuf {
    // always `Some` until the buffer is dropped
    buf: Option<FixedBuf>,
    pool: Arc<BufferPool>,
}

impl Drop for PooledBuf {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.return_to_pool(buf);
        }
    }
}

impl Deref for PooledBuf {
    type Target = FixedBuf;

    fn deref(&self) -> &FixedBuf {
        self.buf.as_ref().expect("buffer is present until drop")
    }
}

impl DerefMut for PooledBuf {
    fn deref_mut(&mut self) -> &mut FixedBuf {
        self.buf.as_mut().expect("buffer is present until drop")
    }
}

impl Debug for PooledBuf {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.deref().fmt(f)
    }
}

impl AsRef<[u8]> for PooledBuf {
    fn as_ref(&self) -> &[u8] {
        self.deref().as_ref()
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;
    use super::*;

    #[test]
    fn test_return_on_drop() {
        let pool = BufferPool::new(10);

        {
            let mut buf = pool.get_from_pool(10);
            buf.put_u8(1);
            buf.put_u8(2);
            assert_eq!(pool.num_pooled(10), 0);
        }

        assert_eq!(pool.num_pooled(10), 1);
        let buf = pool.get_from_pool(10);
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 10);
        assert_eq!(pool.num_pooled(10), 0);
    }

    #[test]
    fn test_keyed_by_capacity() {
        let pool = BufferPool::new(10);

        drop(pool.get_from_pool(10));
        drop(pool.get_from_pool(20));

        assert_eq!(pool.num_pooled(10), 1);
        assert_eq!(pool.num_pooled(20), 1);

        let buf = pool.get_from_pool(20);
        assert_eq!(buf.capacity(), 20);
        assert_eq!(pool.num_pooled(10), 1);
        assert_eq!(pool.num_pooled(20), 0);
    }

    #[test]
    fn test_pool_size_is_capped() {
        let pool = BufferPool::new(2);

        let buffers = (0..5)
            .map(|_| pool.get_from_pool(8))
            .collect::<Vec<_>>();
        drop(buffers);

        assert_eq!(pool.num_pooled(8), 2);
    }
}
