use crate::io::midi::MidiEvent;
use crate::synth::engine::Instrument;
use crate::synth::message::SynthMessage;

/// Controller carrying the touch-strip position.
pub const CC_TOUCH_POSITION: u8 = 1;
pub const CC_ALL_NOTES_OFF: u8 = 123;

/// Translate a MIDI event into an engine message.
///
/// Note-on with velocity 0 is a note-off. Program changes select the
/// instrument family by index.
pub fn midi_to_synth(midi: MidiEvent) -> Option<SynthMessage> {
    match midi {
        MidiEvent::NoteOn { key, velocity: 0, .. } | MidiEvent::NoteOff { key, .. } => {
            Some(SynthMessage::NoteOff { note: key })
        }
        MidiEvent::NoteOn {
            channel,
            key,
            velocity,
        } => Some(SynthMessage::NoteOn {
            channel,
            note: key,
            velocity,
        }),
        MidiEvent::PitchBend { channel, value } => Some(SynthMessage::PitchBend {
            channel,
            amount: (value as f32 / 8192.0).clamp(-1.0, 1.0),
        }),
        MidiEvent::ChannelPressure { channel, value } => Some(SynthMessage::ChannelPressure {
            channel,
            amount: value as f32 / 127.0,
        }),
        MidiEvent::ControlChange {
            controller: CC_TOUCH_POSITION,
            value,
            ..
        } => Some(SynthMessage::TouchPosition {
            x: value as f32 / 127.0,
        }),
        MidiEvent::ControlChange {
            controller: CC_ALL_NOTES_OFF,
            ..
        } => Some(SynthMessage::AllNotesOff),
        MidiEvent::ProgramChange { program, .. } => Instrument::from_index(program)
            .ok()
            .map(SynthMessage::SetInstrument),
        MidiEvent::ControlChange { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_velocity_note_on_releases() {
        let msg = midi_to_synth(MidiEvent::NoteOn {
            channel: 2,
            key: 64,
            velocity: 0,
        });
        assert_eq!(msg, Some(SynthMessage::NoteOff { note: 64 }));
    }

    #[test]
    fn channel_is_kept_for_notes_and_bend() {
        let msg = midi_to_synth(MidiEvent::NoteOn {
            channel: 9,
            key: 50,
            velocity: 90,
        });
        assert_eq!(
            msg,
            Some(SynthMessage::NoteOn {
                channel: 9,
                note: 50,
                velocity: 90
            })
        );
        let bend = midi_to_synth(MidiEvent::PitchBend {
            channel: 4,
            value: -8192,
        });
        assert_eq!(
            bend,
            Some(SynthMessage::PitchBend {
                channel: 4,
                amount: -1.0
            })
        );
    }

    #[test]
    fn program_change_selects_instrument() {
        let msg = midi_to_synth(MidiEvent::ProgramChange {
            channel: 0,
            program: 2,
        });
        assert_eq!(msg, Some(SynthMessage::SetInstrument(Instrument::Bow)));
        let out_of_range = midi_to_synth(MidiEvent::ProgramChange {
            channel: 0,
            program: 40,
        });
        assert_eq!(out_of_range, None);
    }

    #[test]
    fn unmapped_controllers_are_dropped() {
        let msg = midi_to_synth(MidiEvent::ControlChange {
            channel: 0,
            controller: 74,
            value: 10,
        });
        assert_eq!(msg, None);
    }
}
