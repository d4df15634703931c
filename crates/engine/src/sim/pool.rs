/// Free-list of reusable vectors.
///
/// Buffers move out on `acquire` and back on `release`, so a caller cannot
/// keep a pooled buffer and also hand it back. `outstanding` counts buffers
/// currently handed out; at the end of a frame it must be zero.
#[derive(Debug)]
pub struct Pool<T> {
    free: Vec<Vec<T>>,
    capacity: usize,
    outstanding: usize,
    allocations: u64,
}

impl<T> Pool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(capacity),
            capacity,
            outstanding: 0,
            allocations: 0,
        }
    }

    pub fn acquire(&mut self) -> Vec<T> {
        self.outstanding = self.outstanding.saturating_add(1);
        match self.free.pop() {
            Some(buffer) => buffer,
            None => {
                self.allocations = self.allocations.saturating_add(1);
                Vec::new()
            }
        }
    }

    /// Clears `buffer` and keeps it for reuse unless the pool is full.
    pub fn release(&mut self, mut buffer: Vec<T>) {
        buffer.clear();
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.free.len() < self.capacity {
            self.free.push(buffer);
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Total fresh allocations since creation; stays flat once warm.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    pub fn free_buffers_are_empty(&self) -> bool {
        self.free.iter().all(Vec::is_empty)
    }
}
