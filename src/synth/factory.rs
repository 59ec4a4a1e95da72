use crate::synth::voice::WaveguideVoice;

/// Builds the voices of one instrument family.
///
/// PolySynth calls this once per slot at construction with the slot index,
/// which voices use to decorrelate their noise seeds. Any
/// `Fn(usize) -> V` closure works:
///
/// ```ignore
/// let poly = PolySynth::new(|i| PluckString::new(48_000.0, i));
/// ```
pub trait VoiceFactory {
    type Voice: WaveguideVoice;

    fn create_voice(&self, index: usize) -> Self::Voice;
}

impl<F, T> VoiceFactory for F
where
    F: Fn(usize) -> T,
    T: WaveguideVoice,
{
    type Voice = T;

    fn create_voice(&self, index: usize) -> Self::Voice {
        self(index)
    }
}
