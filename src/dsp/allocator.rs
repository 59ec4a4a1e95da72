//! Pool of pre-allocated delay lines.
//!
//! All lines are allocated once at construction. Voices check lines out when
//! their family becomes active and hand them back on an instrument switch, so
//! the audio thread never allocates and no line is ever owned twice.

use log::{debug, warn};

use super::delay::DelayLine;

pub struct DelayAllocator {
    available: Vec<DelayLine>,
    capacity: usize,
}

impl DelayAllocator {
    pub fn new(capacity: usize) -> Self {
        // Reverse so checkout hands out ids in ascending order.
        let available: Vec<DelayLine> = (0..capacity).rev().map(DelayLine::new).collect();
        debug!("delay pool ready: {} lines", capacity);
        Self {
            available,
            capacity,
        }
    }

    /// Check out a cleared line, or `None` when the pool is empty.
    pub fn get_delay_line(&mut self) -> Option<DelayLine> {
        let mut line = self.available.pop()?;
        line.clear();
        line.set_delay(0);
        Some(line)
    }

    /// Return a line to the pool.
    pub fn release_delay_line(&mut self, line: DelayLine) {
        if self.available.len() >= self.capacity || line.id() >= self.capacity {
            // Foreign line: pushing it would grow the pool past its allocation.
            warn!("dropping delay line {} not owned by this pool", line.id());
            return;
        }
        self.available.push(line);
    }

    pub fn available(&self) -> usize {
        self.available.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn checked_out(&self) -> usize {
        self.capacity - self.available.len()
    }
}
