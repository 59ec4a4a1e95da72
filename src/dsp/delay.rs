//! Masked ring-buffer delay line.

/*
Waveguide Delay Lines
=====================

A digital waveguide models a vibrating string or air column as travelling
waves. Each travelling wave is just a delay line: what goes in comes out
N samples later. Close the loop through a filter and you get a resonator
whose period is the total loop delay.

Vocabulary
----------

  capacity      Fixed number of slots in the ring (2048). Power of two, so
                wrapping is a bitwise AND with `capacity - 1` instead of `%`.

  write cursor  Index of the most recently pushed sample. `push` advances
                the cursor first, then writes.

  delay         How many pushes ago the sample returned by `last` was
                written. Delay 0 returns the newest sample.

  read-before-write
                Waveguide loops read the line, run the filters, then push
                the result. The read sees the previous push, so the loop
                pays one extra sample of latency on top of the line delay.
                Voices subtract it from their loop length.

Why a fixed capacity
--------------------

At 48 kHz, 2048 samples is ~43 ms, a period of ~23 Hz. Every note of a
piano keyboard fits, and the buffer never grows on the audio thread.
*/

pub const DELAY_CAPACITY: usize = 2048;
const DELAY_MASK: usize = DELAY_CAPACITY - 1;

/// Fixed-capacity delay line owned by exactly one voice at a time.
///
/// Lines are not `Clone`: ownership moves between the [`DelayAllocator`]
/// and the voice that checked it out.
///
/// [`DelayAllocator`]: super::allocator::DelayAllocator
pub struct DelayLine {
    id: usize,
    buffer: Box<[f32; DELAY_CAPACITY]>,
    write_pos: usize,
    delay: usize,
}

impl DelayLine {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            buffer: Box::new([0.0; DELAY_CAPACITY]),
            write_pos: 0,
            delay: 0,
        }
    }

    /// Pool slot this line was created for
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn capacity(&self) -> usize {
        DELAY_CAPACITY
    }

    #[inline]
    pub fn push(&mut self, sample: f32) {
        self.write_pos = (self.write_pos + 1) & DELAY_MASK;
        self.buffer[self.write_pos] = sample;
    }

    /// Sample written `delay` pushes ago.
    #[inline]
    pub fn last(&self) -> f32 {
        self.buffer[(self.write_pos.wrapping_sub(self.delay)) & DELAY_MASK]
    }

    /// Push then read: a plain `delay`-sample delay.
    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        self.push(sample);
        self.last()
    }

    /// Set the read offset, clamped to `[0, capacity - 1]`.
    pub fn set_delay(&mut self, delay: i32) {
        self.delay = delay.clamp(0, DELAY_MASK as i32) as usize;
    }

    pub fn delay(&self) -> usize {
        self.delay
    }

    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Zero the contents. The delay setting is kept.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

impl std::fmt::Debug for DelayLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayLine")
            .field("id", &self.id)
            .field("delay", &self.delay)
            .finish()
    }
}
