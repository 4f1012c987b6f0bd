use log::trace;

/// Default capacity, sized to the trace window the device dashboard used.
pub const DEFAULT_CAPACITY: usize = 300;

/// Fixed-capacity ring of raw load-cell samples.
///
/// Overflow overwrites the oldest samples; the logical content is always the
/// last `min(total_written, capacity)` samples in arrival order.
#[derive(Debug, Clone)]
pub struct SampleRing {
    storage: Vec<i16>,
    capacity: usize,
    write_index: usize,
    total_written: u64,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            storage: vec![0; capacity],
            capacity,
            write_index: 0,
            total_written: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid samples currently held.
    pub fn len(&self) -> usize {
        self.total_written.min(self.capacity as u64) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.total_written == 0
    }

    /// Append a batch, overwriting the oldest samples on wrap.
    ///
    /// A batch longer than the capacity keeps only its final `capacity`
    /// samples; the earlier ones are logically overwritten before they are
    /// ever observable, same as writing the whole batch and letting the
    /// ring wrap past them.
    pub fn write(&mut self, batch: &[i16]) {
        self.total_written = self.total_written.saturating_add(batch.len() as u64);

        let tail = if batch.len() > self.capacity {
            trace!(
                "batch of {} exceeds ring capacity {}, keeping tail",
                batch.len(),
                self.capacity
            );
            &batch[batch.len() - self.capacity..]
        } else {
            batch
        };

        for &sample in tail {
            self.storage[self.write_index] = sample;
            self.write_index = (self.write_index + 1) % self.capacity;
        }
    }

    /// Most recently written sample, `None` before the first write.
    pub fn last(&self) -> Option<i16> {
        if self.total_written == 0 {
            return None;
        }
        let idx = (self.write_index + self.capacity - 1) % self.capacity;
        Some(self.storage[idx])
    }

    /// Materialize the valid samples oldest first.
    ///
    /// Each call walks the storage afresh; there is no iteration state
    /// shared between callers.
    pub fn snapshot(&self) -> Vec<i16> {
        let len = self.len();
        let mut out = Vec::with_capacity(len);
        // oldest sample sits at write_index once the ring has wrapped,
        // at index 0 before that
        let start = if self.total_written >= self.capacity as u64 {
            self.write_index
        } else {
            0
        };
        for i in 0..len {
            out.push(self.storage[(start + i) % self.capacity]);
        }
        out
    }
}

impl Default for SampleRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
