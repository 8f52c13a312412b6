//! Export staging buffer pool
//!
//! Encoding stages its output through a bounded pool of reusable
//! buffers, the conversion-side stand-in for a GPU buffer allocator.
//! A lease is acquired at the start of a conversion and released by
//! scope exit on every path, success or failure. An exhausted pool is a
//! reported `GpuResourceUnavailable`, never a crash.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use meshport_core::{Error, Result};

/// Bounded pool of reusable staging buffers
#[derive(Clone)]
pub struct ExportBufferPool {
    inner: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ExportBufferPool {
    /// Create a pool of `count` buffers
    pub fn new(count: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(vec![Vec::new(); count])),
        }
    }

    /// Lease one staging buffer, failing when the pool is exhausted
    pub fn acquire(&self) -> Result<BufferLease> {
        let mut available = self.inner.lock();
        match available.pop() {
            Some(buffer) => Ok(BufferLease {
                buffer: Some(buffer),
                pool: Arc::clone(&self.inner),
            }),
            None => {
                warn!("export buffer pool exhausted");
                Err(Error::GpuResourceUnavailable)
            }
        }
    }

    /// Number of buffers currently leasable
    pub fn available(&self) -> usize {
        self.inner.lock().len()
    }
}

/// Scoped lease of one staging buffer; returns it to the pool on drop
#[derive(Debug)]
pub struct BufferLease {
    buffer: Option<Vec<u8>>,
    pool: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl BufferLease {
    /// The leased buffer, cleared of any previous contents
    pub fn buffer(&mut self) -> &mut Vec<u8> {
        // The Option is only empty after drop, which cannot be observed.
        let buffer = self.buffer.get_or_insert_with(Vec::new);
        buffer
    }
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        if let Some(mut buffer) = self.buffer.take() {
            buffer.clear();
            self.pool.lock().push(buffer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshport_core::ErrorKind;

    #[test]
    fn test_acquire_and_release() {
        let pool = ExportBufferPool::new(1);
        assert_eq!(pool.available(), 1);

        {
            let mut lease = pool.acquire().unwrap();
            lease.buffer().extend_from_slice(b"staged");
            assert_eq!(pool.available(), 0);
        }

        // Returned cleared after scope exit.
        assert_eq!(pool.available(), 1);
        let mut lease = pool.acquire().unwrap();
        assert!(lease.buffer().is_empty());
    }

    #[test]
    fn test_exhaustion_is_reported_not_fatal() {
        let pool = ExportBufferPool::new(1);
        let _held = pool.acquire().unwrap();

        let err = pool.acquire().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GpuResourceUnavailable);
    }

    #[test]
    fn test_release_happens_on_failure_paths_too() {
        let pool = ExportBufferPool::new(1);
        let result: Result<()> = (|| {
            let _lease = pool.acquire()?;
            Err(Error::encoding("simulated failure"))
        })();

        assert!(result.is_err());
        assert_eq!(pool.available(), 1);
    }
}
