//! State shared by every engine: output slot and amplitude envelope.

use crate::envelopes::{EnvelopeGenerator, EnvelopeStage};

use super::ParamSpec;

pub const DEFAULT_ATTACK_MS: f64 = 20.0;
pub const DEFAULT_RELEASE_MS: f64 = 300.0;

/// Length of the crossfade applied after a retrigger or release.
pub const DECLICK_SAMPLES: u32 = 64;

pub const ATTACK: ParamSpec = ParamSpec::new("ATTACK", "Attack", 0.0, 5000.0, DEFAULT_ATTACK_MS, "ms");
pub const RELEASE: ParamSpec =
    ParamSpec::new("RELEASE", "Release", 0.0, 5000.0, DEFAULT_RELEASE_MS, "ms");

/// The host-facing part of an engine.
///
/// Owns the buffer slot the engine writes to and the amplitude envelope
/// `0 -> 1 (attack), hold 1, 1 -> 0 (release)`. Each retrigger or release
/// crossfades from the amplitude that was playing so the output never jumps.
///
/// # Examples
///
/// ```
/// use multiengine::engine::EngineBase;
///
/// let mut base = EngineBase::<44100>::new(0);
/// assert!(base.is_silent());
///
/// base.note_on();
/// let amp: Vec<f64> = (0..1000).map(|_| base.next_amp()).collect();
/// assert!(amp[999] > amp[10]);
///
/// base.note_off();
/// while !base.is_silent() {
///     base.next_amp();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct EngineBase<const SAMPLE_RATE: u32> {
    track: usize,
    envelope: EnvelopeGenerator,
    attack_ms: f64,
    release_ms: f64,
    amplitude: f64,
    declick_from: f64,
    declick_pos: u32,
}

impl<const SAMPLE_RATE: u32> EngineBase<SAMPLE_RATE> {
    /// Creates a silent base writing to buffer slot `track`.
    pub fn new(track: usize) -> Self {
        let mut envelope = amp_envelope::<SAMPLE_RATE>(DEFAULT_ATTACK_MS, DEFAULT_RELEASE_MS);
        envelope.stop();
        Self {
            track,
            envelope,
            attack_ms: DEFAULT_ATTACK_MS,
            release_ms: DEFAULT_RELEASE_MS,
            amplitude: 0.0,
            declick_from: 0.0,
            declick_pos: DECLICK_SAMPLES,
        }
    }

    pub fn track(&self) -> usize {
        self.track
    }

    pub fn set_track(&mut self, track: usize) {
        self.track = track;
    }

    pub fn attack_ms(&self) -> f64 {
        self.attack_ms
    }

    pub fn release_ms(&self) -> f64 {
        self.release_ms
    }

    /// Changes the attack time, keeping the envelope where it is.
    pub fn set_attack_ms(&mut self, ms: f64) {
        self.attack_ms = ms.max(0.0);
        self.rebuild();
    }

    /// Changes the release time, keeping the envelope where it is.
    pub fn set_release_ms(&mut self, ms: f64) {
        self.release_ms = ms.max(0.0);
        self.rebuild();
    }

    fn rebuild(&mut self) {
        let cursor = self.envelope.cursor();
        self.envelope = amp_envelope::<SAMPLE_RATE>(self.attack_ms, self.release_ms);
        self.envelope.set_cursor(cursor);
    }

    /// Applies `ATTACK`/`RELEASE`. Returns `false` for any other key.
    pub(crate) fn update(&mut self, key: &str, value: f64) -> bool {
        match key {
            "ATTACK" => self.set_attack_ms(value),
            "RELEASE" => self.set_release_ms(value),
            _ => return false,
        }
        true
    }

    pub fn envelope(&self) -> &EnvelopeGenerator {
        &self.envelope
    }

    /// Restarts the amplitude envelope from its attack.
    pub fn note_on(&mut self) {
        self.arm_declick();
        self.envelope.reset();
    }

    /// Moves the amplitude envelope into its release.
    pub fn note_off(&mut self) {
        self.arm_declick();
        self.envelope.release();
    }

    fn arm_declick(&mut self) {
        self.declick_from = self.amplitude;
        self.declick_pos = 0;
    }

    /// Advances the amplitude envelope by one sample.
    #[inline]
    pub fn next_amp(&mut self) -> f64 {
        let raw = self.envelope.next();
        let amp = if self.declick_pos < DECLICK_SAMPLES {
            let k = f64::from(self.declick_pos) / f64::from(DECLICK_SAMPLES);
            self.declick_pos += 1;
            self.declick_from * (1.0 - k) + raw * k
        } else {
            raw
        };
        self.amplitude = amp;
        amp
    }

    /// The amplitude most recently returned by [`next_amp`](Self::next_amp).
    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn is_silent(&self) -> bool {
        self.envelope.is_silent()
    }

    /// Writes `value` into this engine's buffer slot, if the buffer has one.
    #[inline]
    pub fn write(&self, buffer: &mut [f64], value: f64) {
        if let Some(slot) = buffer.get_mut(self.track) {
            *slot = value;
        }
    }

    /// Current content of this engine's buffer slot, or 0.0 if out of range.
    #[inline]
    pub fn read(&self, buffer: &[f64]) -> f64 {
        buffer.get(self.track).copied().unwrap_or(0.0)
    }
}

fn amp_envelope<const SAMPLE_RATE: u32>(attack_ms: f64, release_ms: f64) -> EnvelopeGenerator {
    let sample_rate = SAMPLE_RATE as f64;
    let samples = |ms: f64| crate::core::pitch::ms_to_samples(ms, sample_rate).max(1);
    EnvelopeGenerator::from_array([
        EnvelopeStage::new(0.0, samples(attack_ms)),
        EnvelopeStage::sustain(1.0),
        EnvelopeStage::new(1.0, samples(release_ms)),
        EnvelopeStage::new(0.0, 0),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_base_is_silent() {
        let mut base = EngineBase::<44100>::new(3);
        assert!(base.is_silent());
        assert_eq!(base.next_amp(), 0.0);
        assert_eq!(base.track(), 3);
    }

    #[test]
    fn test_attack_reaches_sustain() {
        let mut base = EngineBase::<1000>::new(0);
        base.set_attack_ms(10.0);
        base.note_on();
        let attack: Vec<f64> = (0..10).map(|_| base.next_amp()).collect();
        assert!(attack.windows(2).all(|w| w[1] > w[0]));

        // past the attack and the de-click ramp
        for _ in 10..DECLICK_SAMPLES {
            base.next_amp();
        }
        assert_eq!(base.next_amp(), 1.0);
        assert_eq!(base.next_amp(), 1.0);
        assert!(!base.is_silent());
    }

    #[test]
    fn test_release_fades_to_silence() {
        let mut base = EngineBase::<1000>::new(0);
        base.set_attack_ms(1.0);
        base.set_release_ms(100.0);
        base.note_on();
        for _ in 0..100 {
            base.next_amp();
        }
        base.note_off();
        let mut previous = base.amplitude();
        let mut ticks = 0;
        while !base.is_silent() {
            let amp = base.next_amp();
            assert!(amp <= previous + 1e-12);
            previous = amp;
            ticks += 1;
        }
        assert_eq!(ticks, 101);
        assert_eq!(base.next_amp(), 0.0);
    }

    #[test]
    fn test_zero_times_never_sustain() {
        let mut base = EngineBase::<44100>::new(0);
        base.set_attack_ms(0.0);
        base.set_release_ms(0.0);
        assert!(base.envelope().stages()[0].duration >= 1);
        assert!(base.envelope().stages()[2].duration >= 1);
    }

    #[test]
    fn test_retrigger_crossfades() {
        let mut base = EngineBase::<44100>::new(0);
        base.set_attack_ms(0.0);
        base.note_on();
        for _ in 0..200 {
            base.next_amp();
        }
        assert_eq!(base.amplitude(), 1.0);

        // the raw envelope restarts at 0 but the output ramps from 1
        base.note_on();
        let first = base.next_amp();
        assert_eq!(first, 1.0);
        let mut previous = first;
        for _ in 0..DECLICK_SAMPLES {
            let amp = base.next_amp();
            assert!((amp - previous).abs() < 0.05);
            previous = amp;
        }
    }

    #[test]
    fn test_rebuild_preserves_cursor() {
        let mut base = EngineBase::<1000>::new(0);
        base.note_on();
        for _ in 0..100 {
            base.next_amp();
        }
        let cursor = base.envelope().cursor();
        base.set_release_ms(1000.0);
        assert_eq!(base.envelope().cursor(), cursor);
        assert_eq!(base.release_ms(), 1000.0);
    }

    #[test]
    fn test_out_of_range_track_is_ignored() {
        let base = EngineBase::<44100>::new(8);
        let mut buffer = [0.5; 4];
        base.write(&mut buffer, 1.0);
        assert_eq!(buffer, [0.5; 4]);
        assert_eq!(base.read(&buffer), 0.0);
    }

    #[test]
    fn test_update_reports_handled_keys() {
        let mut base = EngineBase::<1000>::new(0);
        assert!(base.update("ATTACK", 5.0));
        assert!(base.update("RELEASE", 50.0));
        assert_eq!(base.attack_ms(), 5.0);
        assert_eq!(base.release_ms(), 50.0);
        assert!(!base.update("CUTOFF", 10.0));
    }
}
