use crate::prelude::ServiceError;

/// Simple scoped buffer pool that prevents unbounded allocations.
pub struct BufferPool<T> {
    buffers: Vec<Vec<T>>,
    max_capacity: usize,
    outstanding: usize,
}

impl<T: Clone + Default> BufferPool<T> {
    pub fn with_capacity(max_capacity: usize) -> Self {
        Self {
            buffers: Vec::with_capacity(max_capacity),
            max_capacity,
            outstanding: 0,
        }
    }

    /// Hands out a zeroed buffer of `length`, reusing a released one if possible.
    pub fn checkout(&mut self, length: usize) -> Result<Vec<T>, ServiceError> {
        if let Some(mut buffer) = self.buffers.pop() {
            buffer.clear();
            buffer.resize(length, T::default());
            self.outstanding += 1;
            Ok(buffer)
        } else if self.outstanding < self.max_capacity {
            self.outstanding += 1;
            Ok(vec![T::default(); length])
        } else {
            Err(ServiceError::InvalidState("buffer pool depleted".to_string()))
        }
    }

    /// Returns a buffer back to the pool for reuse.
    pub fn release(&mut self, mut buffer: Vec<T>) {
        buffer.clear();
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.buffers.len() < self.max_capacity {
            self.buffers.push(buffer);
        }
    }

    pub fn reset(&mut self) {
        self.buffers.clear();
        self.outstanding = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_refuses_more_than_its_capacity() {
        let mut pool: BufferPool<f32> = BufferPool::with_capacity(1);
        let buffer = pool.checkout(4).unwrap();
        assert!(pool.checkout(4).is_err());
        pool.release(buffer);
        let reused = pool.checkout(2).unwrap();
        assert_eq!(reused, vec![0.0, 0.0]);
    }
}
