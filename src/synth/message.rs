#[cfg(feature = "rtrb")]
use rtrb::Consumer;

use crate::synth::engine::Instrument;

/// Control-thread events for the audio thread, drained once per block.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SynthMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { note: u8 },
    /// Bend in -1.0..=1.0 of the configured bend range
    PitchBend { channel: u8, amount: f32 },
    /// Aftertouch in 0.0..=1.0
    ChannelPressure { channel: u8, amount: f32 },
    /// Touch-strip position in 0.0..=1.0
    TouchPosition { x: f32 },
    SetInstrument(Instrument),
    AllNotesOff,
}

pub trait MessageReceiver {
    fn pop(&mut self) -> Option<SynthMessage>;
}

#[cfg(feature = "rtrb")]
impl MessageReceiver for Consumer<SynthMessage> {
    fn pop(&mut self) -> Option<SynthMessage> {
        Consumer::pop(self).ok()
    }
}
