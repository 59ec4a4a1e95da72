
use crate::dsp::DelayAllocator;
use crate::error::{EngineError, EngineResult};
use crate::synth::factory::VoiceFactory;
use crate::synth::voice::{BlockCtx, WaveguideVoice};
use crate::NUM_POLYPHONY;

const SLOT_MASK: usize = NUM_POLYPHONY - 1;

/// Fixed-capacity voice manager for one instrument family.
///
/// Voices live in a fixed array and are referred to by index from two
/// stacks: `used` (sounding, rendered every block) and `unused` (free).
/// Every index is in exactly one of them at all times. When the free stack
/// is empty a note-on steals a sounding voice instead of dropping the event.
pub struct PolySynth<V: WaveguideVoice> {
    voices: [V; NUM_POLYPHONY],
    used: [usize; NUM_POLYPHONY],
    used_len: usize,
    unused: [usize; NUM_POLYPHONY],
    unused_len: usize,
    round_robin: usize,
}

impl<V: WaveguideVoice> PolySynth<V> {
    pub fn new<F>(factory: F) -> Self
    where
        F: VoiceFactory<Voice = V>,
    {
        let mut poly = Self {
            voices: std::array::from_fn(|i| factory.create_voice(i)),
            used: [0; NUM_POLYPHONY],
            used_len: 0,
            unused: [0; NUM_POLYPHONY],
            unused_len: 0,
            round_robin: 0,
        };
        poly.reset_stacks();
        poly
    }

    fn reset_stacks(&mut self) {
        self.used_len = 0;
        // Popped from the back, so voice 0 goes out first.
        for (slot, index) in self.unused.iter_mut().zip((0..NUM_POLYPHONY).rev()) {
            *slot = index;
        }
        self.unused_len = NUM_POLYPHONY;
    }

    /// Start `note`. Never drops the event: with no free voice, a sounding
    /// one is retriggered. Returns true when a voice was stolen.
    ///
    /// Stealing is not a pure rotation: a used voice that reports
    /// `can_play(note)` (gone quiet, or already on this note) is taken
    /// first, and the round-robin victim only when none does.
    pub fn note_on(&mut self, channel: u8, note: u8, velocity: u8) -> bool {
        let velocity = velocity as f32 / 127.0;
        if self.unused_len > 0 {
            self.unused_len -= 1;
            let index = self.unused[self.unused_len];
            self.voices[index].note_on(channel, note, velocity);
            self.used[self.used_len] = index;
            self.used_len += 1;
            return false;
        }

        // Prefer a voice that has died away or already plays this note.
        let reusable = self.used[..self.used_len]
            .iter()
            .copied()
            .find(|&i| self.voices[i].can_play(note));
        let index = match reusable {
            Some(index) => index,
            None => {
                let index = self.round_robin;
                self.round_robin = (self.round_robin + 1) & SLOT_MASK;
                index
            }
        };
        self.voices[index].note_on(channel, note, velocity);
        true
    }

    /// Release every sounding voice playing `note`, on any channel.
    pub fn note_off(&mut self, note: u8) {
        for &index in &self.used[..self.used_len] {
            let voice = &mut self.voices[index];
            if voice.is_playing(note) {
                voice.note_off();
            }
        }
    }

    pub fn all_notes_off(&mut self) {
        for &index in &self.used[..self.used_len] {
            self.voices[index].note_off();
        }
    }

    /// Render one block into `buffer`, overwriting it.
    ///
    /// The first sounding voice writes, the rest mix in. Voices that report
    /// silence go back on the free stack by swap-remove.
    pub fn process(&mut self, buffer: &mut [f32], ctx: &BlockCtx) {
        if self.used_len == 0 {
            buffer.fill(0.0);
            return;
        }

        let mut written = false;
        let mut i = 0;
        while i < self.used_len {
            let voice = &mut self.voices[self.used[i]];
            let silent = if written {
                voice.add_to(buffer, ctx)
            } else {
                written = true;
                voice.process(buffer, ctx)
            };
            if silent {
                self.retire(i);
            } else {
                i += 1;
            }
        }
    }

    fn retire(&mut self, used_pos: usize) {
        let index = self.used[used_pos];
        self.unused[self.unused_len] = index;
        self.unused_len += 1;
        self.used_len -= 1;
        self.used.swap(used_pos, self.used_len);
    }

    /// Hard-stop everything and return all voices to the free stack.
    pub fn force_stop_all(&mut self) {
        for &index in &self.used[..self.used_len] {
            self.voices[index].panic();
        }
        self.reset_stacks();
    }

    /// Give every voice its delay lines. All-or-nothing: on shortage the
    /// family keeps no lines at all.
    pub fn attach_delay_lines(&mut self, pool: &mut DelayAllocator) -> EngineResult<()> {
        let available = pool.available();
        let requested: usize = self.voices.iter().map(|v| v.delay_slots().len()).sum();
        for voice in self.voices.iter_mut() {
            if !voice.attach_delay_lines(pool) {
                self.detach_delay_lines(pool);
                return Err(EngineError::DelayPoolExhausted {
                    requested,
                    available,
                });
            }
        }
        Ok(())
    }

    pub fn detach_delay_lines(&mut self, pool: &mut DelayAllocator) {
        for voice in self.voices.iter_mut() {
            voice.detach_delay_lines(pool);
        }
    }

    pub fn voices(&self) -> &[V] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [V] {
        &mut self.voices
    }

    /// Indices of the sounding voices, in rendering order.
    pub fn used_voices(&self) -> &[usize] {
        &self.used[..self.used_len]
    }

    /// Indices of the free voices; the last one is handed out next.
    pub fn unused_voices(&self) -> &[usize] {
        &self.unused[..self.unused_len]
    }

    pub fn active_count(&self) -> usize {
        self.used_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::DelayLine;

    /// Minimal voice: rings for a fixed number of blocks after note-on.
    struct Countdown {
        lines: [Option<DelayLine>; 1],
        note: u8,
        channel: u8,
        blocks_left: u32,
        held: bool,
        panicked: bool,
    }

    impl Countdown {
        fn new(_index: usize) -> Self {
            Self {
                lines: [None],
                note: 0,
                channel: 0,
                blocks_left: 0,
                held: false,
                panicked: false,
            }
        }
    }

    impl WaveguideVoice for Countdown {
        fn delay_slots(&self) -> &[Option<DelayLine>] {
            &self.lines
        }
        fn delay_slots_mut(&mut self) -> &mut [Option<DelayLine>] {
            &mut self.lines
        }
        fn note_on(&mut self, channel: u8, note: u8, _velocity: f32) {
            self.channel = channel;
            self.note = note;
            self.blocks_left = 3;
            self.held = true;
        }
        fn note_off(&mut self) {
            self.held = false;
        }
        fn begin_block(&mut self, _block_len: usize, _ctx: &BlockCtx) {}
        fn process_single(&mut self) -> f32 {
            if self.blocks_left > 0 {
                1.0
            } else {
                0.0
            }
        }
        fn end_block(&mut self) -> bool {
            if !self.held {
                self.blocks_left = self.blocks_left.saturating_sub(1);
            }
            self.blocks_left == 0
        }
        fn can_play(&self, note: u8) -> bool {
            self.blocks_left == 0 || self.note == note
        }
        fn is_playing(&self, note: u8) -> bool {
            self.note == note
        }
        fn panic(&mut self) {
            self.blocks_left = 0;
            self.panicked = true;
        }
        fn note(&self) -> u8 {
            self.note
        }
        fn channel(&self) -> u8 {
            self.channel
        }
        fn peak(&self) -> f32 {
            self.blocks_left as f32
        }
    }

    fn attached() -> (PolySynth<Countdown>, DelayAllocator) {
        let mut pool = DelayAllocator::new(NUM_POLYPHONY);
        let mut poly = PolySynth::new(Countdown::new);
        poly.attach_delay_lines(&mut pool).unwrap();
        (poly, pool)
    }

    fn assert_partition(poly: &PolySynth<Countdown>) {
        let mut seen = [0u8; NUM_POLYPHONY];
        for &i in poly.used_voices().iter().chain(poly.unused_voices()) {
            seen[i] += 1;
        }
        assert!(seen.iter().all(|&n| n == 1), "voice bookkeeping broken: {:?}", seen);
    }

    #[test]
    fn empty_synth_writes_silence() {
        let (mut poly, _pool) = attached();
        let mut buffer = [1.0f32; 16];
        poly.process(&mut buffer, &BlockCtx::new());
        assert!(buffer.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn voices_mix_additively() {
        let (mut poly, _pool) = attached();
        poly.note_on(0, 60, 100);
        poly.note_on(0, 64, 100);
        poly.note_on(0, 67, 100);
        let mut buffer = [9.0f32; 16];
        poly.process(&mut buffer, &BlockCtx::new());
        assert!(buffer.iter().all(|s| *s == 3.0), "got {:?}", &buffer[..4]);
    }

    #[test]
    fn overflow_steals_instead_of_dropping() {
        let (mut poly, _pool) = attached();
        for n in 0..NUM_POLYPHONY as u8 {
            assert!(!poly.note_on(0, 60 + n, 100));
        }
        assert!(poly.note_on(0, 90, 100), "ninth note was not a steal");
        assert_eq!(poly.active_count(), NUM_POLYPHONY);
        assert!(poly.voices().iter().any(|v| v.note() == 90));
        assert_partition(&poly);
    }

    #[test]
    fn round_robin_walks_the_slots() {
        let (mut poly, _pool) = attached();
        for n in 0..NUM_POLYPHONY as u8 {
            poly.note_on(0, 40 + n, 100);
        }
        poly.note_on(0, 100, 100);
        poly.note_on(0, 101, 100);
        assert_eq!(poly.voices()[0].note(), 100);
        assert_eq!(poly.voices()[1].note(), 101);
    }

    #[test]
    fn steal_reuses_voice_already_on_the_note() {
        let (mut poly, _pool) = attached();
        for n in 0..NUM_POLYPHONY as u8 {
            poly.note_on(0, 40 + n, 100);
        }
        assert!(poly.note_on(2, 45, 100));
        assert_eq!(poly.voices()[5].channel(), 2);
        assert_eq!(poly.voices()[0].note(), 40, "round-robin victim taken anyway");
        assert_partition(&poly);
    }

    #[test]
    fn silent_voices_return_to_pool() {
        let (mut poly, _pool) = attached();
        poly.note_on(0, 60, 100);
        poly.note_on(1, 62, 100);
        poly.note_off(60);
        let ctx = BlockCtx::new();
        let mut buffer = [0.0f32; 8];
        for _ in 0..3 {
            poly.process(&mut buffer, &ctx);
            assert_partition(&poly);
        }
        assert_eq!(poly.active_count(), 1);
        assert_eq!(poly.voices()[poly.used_voices()[0]].note(), 62);

        // The freed voice is the next one handed out.
        let freed = *poly.unused_voices().last().unwrap();
        poly.note_on(0, 72, 100);
        assert_eq!(poly.voices()[freed].note(), 72);
        assert_partition(&poly);
    }

    #[test]
    fn note_off_reaches_every_channel() {
        let (mut poly, _pool) = attached();
        poly.note_on(0, 60, 100);
        poly.note_on(5, 60, 100);
        poly.note_off(60);
        assert!(poly.voices().iter().all(|v| !v.held));
    }

    #[test]
    fn force_stop_resets_everything() {
        let (mut poly, _pool) = attached();
        poly.note_on(0, 60, 100);
        poly.note_on(0, 61, 100);
        poly.force_stop_all();
        assert_eq!(poly.active_count(), 0);
        assert_eq!(poly.unused_voices().len(), NUM_POLYPHONY);
        assert_eq!(poly.voices().iter().filter(|v| v.panicked).count(), 2);
        assert_partition(&poly);
    }

    #[test]
    fn attach_is_all_or_nothing() {
        let mut pool = DelayAllocator::new(NUM_POLYPHONY - 1);
        let mut poly = PolySynth::new(Countdown::new);
        let err = poly.attach_delay_lines(&mut pool).unwrap_err();
        assert_eq!(
            err,
            EngineError::DelayPoolExhausted {
                requested: NUM_POLYPHONY,
                available: NUM_POLYPHONY - 1
            }
        );
        assert_eq!(pool.available(), NUM_POLYPHONY - 1);
        assert!(poly.voices().iter().all(|v| !v.has_delay_lines()));
    }
}
