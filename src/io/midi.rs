/// Channel-voice MIDI messages the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ChannelPressure { channel: u8, value: u8 },
    /// Centred: -8192..=8191
    PitchBend { channel: u8, value: i16 },
    ProgramChange { channel: u8, program: u8 },
}

impl MidiEvent {
    /// Parse one raw message. Running status and system messages are not
    /// handled; anything unrecognised or truncated yields `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        let channel = status & 0x0F;
        let data = |i: usize| bytes.get(i).map(|b| b & 0x7F);
        match status & 0xF0 {
            0x80 => Some(MidiEvent::NoteOff {
                channel,
                key: data(1)?,
                velocity: data(2)?,
            }),
            0x90 => Some(MidiEvent::NoteOn {
                channel,
                key: data(1)?,
                velocity: data(2)?,
            }),
            0xB0 => Some(MidiEvent::ControlChange {
                channel,
                controller: data(1)?,
                value: data(2)?,
            }),
            0xC0 => Some(MidiEvent::ProgramChange {
                channel,
                program: data(1)?,
            }),
            0xD0 => Some(MidiEvent::ChannelPressure {
                channel,
                value: data(1)?,
            }),
            0xE0 => {
                let raw = (data(2)? as i16) << 7 | data(1)? as i16;
                Some(MidiEvent::PitchBend {
                    channel,
                    value: raw - 8192,
                })
            }
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::ChannelPressure { channel, .. }
            | MidiEvent::PitchBend { channel, .. }
            | MidiEvent::ProgramChange { channel, .. } => channel,
        }
    }
}
