use crate::dsp::{DelayAllocator, DelayLine};
use crate::NUM_MIDI_CHANNELS;

/// Per-block control state shared by every voice of the active family.
///
/// Bend and pressure are per MIDI channel so each voice follows the
/// controller of the channel it was started on.
#[derive(Debug, Clone, Copy)]
pub struct BlockCtx {
    /// Pitch bend per channel, -1.0 to +1.0
    pub pitch_bend: [f32; NUM_MIDI_CHANNELS],
    /// Channel pressure per channel, 0.0 to 1.0
    pub pressure: [f32; NUM_MIDI_CHANNELS],
}

impl BlockCtx {
    pub fn new() -> Self {
        Self {
            pitch_bend: [0.0; NUM_MIDI_CHANNELS],
            pressure: [0.0; NUM_MIDI_CHANNELS],
        }
    }

    #[inline]
    pub fn bend(&self, channel: u8) -> f32 {
        self.pitch_bend[channel as usize % NUM_MIDI_CHANNELS]
    }

    #[inline]
    pub fn pressure(&self, channel: u8) -> f32 {
        self.pressure[channel as usize % NUM_MIDI_CHANNELS]
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for BlockCtx {
    fn default() -> Self {
        Self::new()
    }
}

/// A waveguide voice: one delay-line loop (or two) plus its excitation.
///
/// Implementors supply the per-sample loop in [`process_single`] and the
/// once-per-block retune in [`begin_block`]. Block rendering, silence
/// reporting and delay-line bookkeeping come from the provided methods.
///
/// [`process_single`]: WaveguideVoice::process_single
/// [`begin_block`]: WaveguideVoice::begin_block
pub trait WaveguideVoice: Send {
    fn delay_slots(&self) -> &[Option<DelayLine>];
    fn delay_slots_mut(&mut self) -> &mut [Option<DelayLine>];

    fn note_on(&mut self, channel: u8, note: u8, velocity: f32);
    fn note_off(&mut self);

    /// Block-rate update: pitch bend, vibrato, tremolo. Also resets the
    /// peak tracker used for silence detection.
    fn begin_block(&mut self, block_len: usize, ctx: &BlockCtx);

    /// Render one sample of the loop.
    fn process_single(&mut self) -> f32;

    /// Called after a block; true when the voice has gone silent.
    fn end_block(&mut self) -> bool;

    /// Whether this voice may be (re)used for `note`.
    fn can_play(&self, note: u8) -> bool;

    /// Whether this voice is currently sounding `note`.
    fn is_playing(&self, note: u8) -> bool;

    /// Hard reset: clear filter and delay state immediately.
    fn panic(&mut self);

    fn note(&self) -> u8;
    fn channel(&self) -> u8;

    /// Largest magnitude rendered in the last block.
    fn peak(&self) -> f32;

    fn has_delay_lines(&self) -> bool {
        self.delay_slots().iter().all(Option::is_some)
    }

    /// Fill every empty slot from the pool. False (and nothing kept) when
    /// the pool runs dry.
    fn attach_delay_lines(&mut self, pool: &mut DelayAllocator) -> bool {
        for slot in self.delay_slots_mut() {
            if slot.is_none() {
                *slot = pool.get_delay_line();
            }
        }
        if self.has_delay_lines() {
            return true;
        }
        self.detach_delay_lines(pool);
        false
    }

    fn detach_delay_lines(&mut self, pool: &mut DelayAllocator) {
        for slot in self.delay_slots_mut() {
            if let Some(line) = slot.take() {
                pool.release_delay_line(line);
            }
        }
    }

    /// Overwrite `buffer`. Returns true when the voice is silent.
    fn process(&mut self, buffer: &mut [f32], ctx: &BlockCtx) -> bool {
        if !self.has_delay_lines() {
            buffer.fill(0.0);
            return true;
        }
        self.begin_block(buffer.len(), ctx);
        for sample in buffer.iter_mut() {
            *sample = self.process_single();
        }
        self.end_block()
    }

    /// Mix into `buffer`. Returns true when the voice is silent.
    fn add_to(&mut self, buffer: &mut [f32], ctx: &BlockCtx) -> bool {
        if !self.has_delay_lines() {
            return true;
        }
        self.begin_block(buffer.len(), ctx);
        for sample in buffer.iter_mut() {
            *sample += self.process_single();
        }
        self.end_block()
    }
}
