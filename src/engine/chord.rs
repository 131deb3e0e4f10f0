//! Four-voice chord engine.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::base::{ATTACK, RELEASE};
use super::params::{self, ParamSpec};
use super::{EngineBase, VoiceEngine};
use crate::Result;
use crate::core::pitch::{midi_to_hz, semitone_ratio};
use crate::dsp::{
    EffectsChain, Filter, FxType, MultiFx, MultiModeFilter, REFERENCE_HZ, WaveOscillator,
    WaveShape,
};

const VOICES: usize = 4;

/// Semitone offsets of the four voices, indexed by [`ChordType`].
pub const CHORD_TABLE: [[i32; VOICES]; 6] = [
    [0, 4, 7, 12],  // Major
    [0, 3, 7, 12],  // Minor
    [0, 5, 7, 12],  // Sus4
    [0, 7, 12, 19], // Power
    [0, 4, 7, 11],  // Maj7
    [0, 3, 7, 10],  // Min7
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChordType {
    #[default]
    Major,
    Minor,
    Sus4,
    Power,
    Maj7,
    Min7,
}

impl ChordType {
    pub const ALL: [ChordType; 6] = [
        ChordType::Major,
        ChordType::Minor,
        ChordType::Sus4,
        ChordType::Power,
        ChordType::Maj7,
        ChordType::Min7,
    ];

    /// Maps a parameter index to a chord, clamping out-of-range values.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn intervals(self) -> &'static [i32; VOICES] {
        &CHORD_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            ChordType::Major => "Maj",
            ChordType::Minor => "Min",
            ChordType::Sus4 => "Sus4",
            ChordType::Power => "Pwr",
            ChordType::Maj7 => "Maj7",
            ChordType::Min7 => "Min7",
        }
    }
}

/// One oscillator of the chord.
///
/// State survives between notes so a legato note can glide from wherever the
/// previous one left off.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SubVoice {
    /// Read position in cycles (0.0 to 1.0)
    pub phase: f64,
    /// Frequency sounding right now, in Hz
    pub current_frequency: f64,
    /// Frequency the voice glides toward, in Hz
    pub target_frequency: f64,
}

const PARAM_COUNT: usize = 12;

static PARAMS: [ParamSpec; PARAM_COUNT] = [
    ATTACK,
    RELEASE,
    ParamSpec::new("BODY", "Body", -24.0, 24.0, 0.0, "st"),
    ParamSpec::new("CHORD", "Chord", 0.0, 5.0, 0.0, ""),
    ParamSpec::new("WAVE", "Wave", 0.0, 6.0, 0.0, ""),
    ParamSpec::percent("MORPH", "Morph", 0.0),
    ParamSpec::new("VOICES", "Voices", 1.0, 4.0, 4.0, ""),
    ParamSpec::percent("DETUNE", "Detune", 0.0),
    ParamSpec::new("GLIDE", "Glide", 0.0, 2000.0, 50.0, "ms"),
    ParamSpec::new("CUTOFF", "LPF | HPF", -100.0, 100.0, 0.0, ""),
    ParamSpec::new("FX_TYPE", "FX type", 0.0, 4.0, 0.0, ""),
    ParamSpec::percent("FX_AMOUNT", "FX edit", 0.0),
];

/// Plays a chord from a single note.
///
/// Up to four sub-voices follow the intervals of the selected [`ChordType`],
/// spread apart by the detune amount. A new note played while the previous one
/// is still sounding glides there instead of retriggering.
///
/// # Examples
///
/// ```
/// use multiengine::engine::{ChordEngine, VoiceEngine};
/// use rand::SeedableRng;
///
/// let rng = rand::rngs::StdRng::seed_from_u64(1);
/// let mut engine = ChordEngine::<44100, _>::with_rng(rng);
/// engine.update("CHORD", 1.0)?; // minor
/// engine.update("GLIDE", 0.0)?;
///
/// engine.note_on(57, 0.8);
/// let target = engine.voices()[1].target_frequency;
/// assert!((target - 261.63).abs() < 0.01); // minor third above A3
/// # Ok::<(), multiengine::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ChordEngine<const SAMPLE_RATE: u32, R: Rng = StdRng> {
    base: EngineBase<SAMPLE_RATE>,
    voices: [SubVoice; VOICES],
    oscillator: WaveOscillator<SAMPLE_RATE>,
    filter: MultiModeFilter<SAMPLE_RATE>,
    fx: MultiFx<SAMPLE_RATE>,
    rng: R,

    last_note: Option<u8>,
    held_notes: u32,
    velocity: f64,

    values: [f64; PARAM_COUNT],
    body: f64,
    chord: ChordType,
    voice_count: usize,
    detune: f64,
    glide_ms: f64,
    glide_rate: f64,
    fx_amount: f64,
}

impl<const SAMPLE_RATE: u32> ChordEngine<SAMPLE_RATE, StdRng> {
    /// Creates an engine whose voice phases are seeded from system entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl<const SAMPLE_RATE: u32> Default for ChordEngine<SAMPLE_RATE, StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SAMPLE_RATE: u32, R: Rng> ChordEngine<SAMPLE_RATE, R> {
    /// Creates an engine drawing voice phases from `rng`.
    pub fn with_rng(rng: R) -> Self {
        let mut engine = Self {
            base: EngineBase::new(0),
            voices: [SubVoice::default(); VOICES],
            oscillator: WaveOscillator::default(),
            filter: MultiModeFilter::default(),
            fx: MultiFx::new(),
            rng,
            last_note: None,
            held_notes: 0,
            velocity: 1.0,
            values: [0.0; PARAM_COUNT],
            body: 0.0,
            chord: ChordType::Major,
            voice_count: VOICES,
            detune: 0.0,
            glide_ms: 0.0,
            glide_rate: 1.0,
            fx_amount: 0.0,
        };
        for (index, spec) in PARAMS.iter().enumerate() {
            engine.apply(index, spec.default);
        }
        tracing::debug!(sample_rate = SAMPLE_RATE, "chord engine created");
        engine
    }

    /// Routes output to buffer slot `track`.
    pub fn with_track(mut self, track: usize) -> Self {
        self.base.set_track(track);
        self
    }

    fn apply(&mut self, index: usize, value: f64) {
        self.values[index] = value;
        match PARAMS[index].key {
            "BODY" => self.body = value,
            "CHORD" => self.chord = ChordType::from_index(value.round() as usize),
            "WAVE" => self
                .oscillator
                .set_shape(WaveShape::from_index(value.round() as usize)),
            "MORPH" => self.oscillator.set_morph(value / 100.0),
            "VOICES" => self.voice_count = (value.round() as usize).clamp(1, VOICES),
            "DETUNE" => self.detune = value / 100.0,
            "GLIDE" => {
                self.glide_ms = value;
                self.glide_rate = if value > 0.0 {
                    (1.0 / (value * 0.001 * SAMPLE_RATE as f64)).clamp(0.0001, 1.0)
                } else {
                    1.0
                };
            }
            "CUTOFF" => {
                self.filter.apply_cutoff_control(value);
            }
            "FX_TYPE" => self.fx.set_type(FxType::from_index(value.round() as usize)),
            "FX_AMOUNT" => self.fx_amount = value / 100.0,
            key => {
                let handled = self.base.update(key, value);
                debug_assert!(handled, "declared parameter {key} has no handler");
            }
        }
    }

    pub fn voices(&self) -> &[SubVoice] {
        &self.voices
    }

    /// Number of sub-voices currently driven.
    pub fn voice_count(&self) -> usize {
        self.voice_count
    }

    pub fn chord(&self) -> ChordType {
        self.chord
    }

    pub fn last_note(&self) -> Option<u8> {
        self.last_note
    }

    pub fn held_notes(&self) -> u32 {
        self.held_notes
    }

    pub fn velocity(&self) -> f64 {
        self.velocity
    }

    /// Fraction of the remaining distance each voice covers per sample.
    pub fn glide_rate(&self) -> f64 {
        self.glide_rate
    }

    /// Position of voice `index` in the detune spread, from -1.0 to 1.0.
    fn spread(index: usize, count: usize) -> f64 {
        if count > 1 {
            (index as f64 / (count - 1) as f64 - 0.5) * 2.0
        } else {
            0.0
        }
    }
}

impl<const SAMPLE_RATE: u32, R: Rng> VoiceEngine<SAMPLE_RATE> for ChordEngine<SAMPLE_RATE, R> {
    fn name(&self) -> &'static str {
        "Chord"
    }

    fn note_on(&mut self, note: u8, velocity: f64) {
        self.velocity = velocity;

        let glide =
            self.glide_ms > 0.0 && self.last_note != Some(note) && self.base.amplitude() > 0.01;
        if !glide {
            self.base.note_on();
        }

        let base_freq = midi_to_hz(f64::from(note) + self.body);
        let intervals = self.chord.intervals();
        for (voice, &interval) in self.voices.iter_mut().zip(intervals).take(self.voice_count) {
            voice.target_frequency = base_freq * semitone_ratio(f64::from(interval));
            if !glide || voice.current_frequency == 0.0 {
                voice.current_frequency = voice.target_frequency;
                voice.phase = self.rng.gen_range(0.0..1.0);
            }
        }

        self.last_note = Some(note);
        self.held_notes += 1;
    }

    fn note_off(&mut self, _note: u8, _velocity: f64) {
        self.held_notes = self.held_notes.saturating_sub(1);
        if self.held_notes == 0 {
            self.base.note_off();
        }
    }

    fn sample(&mut self, buffer: &mut [f64], envelope_amplitude: f64) {
        if envelope_amplitude == 0.0 {
            let out = self.fx.apply(self.base.read(buffer), self.fx_amount);
            self.base.write(buffer, out);
            return;
        }

        let count = self.voice_count;
        let detune = self.detune * 0.08;
        let mut mix = 0.0;
        for (index, voice) in self.voices.iter_mut().take(count).enumerate() {
            voice.current_frequency +=
                (voice.target_frequency - voice.current_frequency) * self.glide_rate;

            let frequency = voice.current_frequency * (1.0 + Self::spread(index, count) * detune);
            mix += self
                .oscillator
                .sample(&mut voice.phase, frequency / REFERENCE_HZ);
        }

        let scale = if count > 0 { 1.0 / count as f64 } else { 1.0 };
        let out = self.filter.process(mix * scale) * envelope_amplitude * self.velocity;
        let out = self.fx.apply(out, self.fx_amount);
        self.base.write(buffer, out);
    }

    fn update(&mut self, key: &str, value: f64) -> Result<()> {
        let (spec, value) = params::resolve(self.name(), &PARAMS, key, value)?;
        if let Some(index) = PARAMS.iter().position(|p| p.key == spec.key) {
            self.apply(index, value);
        }
        Ok(())
    }

    fn params(&self) -> &'static [ParamSpec] {
        &PARAMS
    }

    fn param(&self, key: &str) -> Option<f64> {
        PARAMS
            .iter()
            .position(|p| p.key == key)
            .map(|index| self.values[index])
    }

    fn base(&self) -> &EngineBase<SAMPLE_RATE> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EngineBase<SAMPLE_RATE> {
        &mut self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44100;

    type Engine = ChordEngine<SR>;

    fn engine() -> Engine {
        ChordEngine::with_rng(StdRng::seed_from_u64(42))
    }

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn run(engine: &mut Engine, samples: usize) {
        let mut buffer = [0.0; 1];
        for _ in 0..samples {
            engine.tick(&mut buffer);
        }
    }

    #[test]
    fn test_defaults() {
        let engine = engine();
        assert_eq!(engine.param("GLIDE"), Some(50.0));
        assert_eq!(engine.param("VOICES"), Some(4.0));
        assert_eq!(engine.param("ATTACK"), Some(20.0));
        assert_eq!(engine.param("NOPE"), None);
        assert_eq!(engine.voice_count(), 4);
        assert_eq!(engine.chord(), ChordType::Major);
        assert!(engine.is_silent());
    }

    #[test]
    fn test_chord_table() {
        assert_eq!(ChordType::Major.intervals(), &[0, 4, 7, 12]);
        assert_eq!(ChordType::Minor.intervals(), &[0, 3, 7, 12]);
        assert_eq!(ChordType::Sus4.intervals(), &[0, 5, 7, 12]);
        assert_eq!(ChordType::Power.intervals(), &[0, 7, 12, 19]);
        assert_eq!(ChordType::Maj7.intervals(), &[0, 4, 7, 11]);
        assert_eq!(ChordType::Min7.intervals(), &[0, 3, 7, 10]);
    }

    #[test]
    fn test_major_targets() {
        let mut engine = engine();
        engine.update("GLIDE", 0.0).unwrap();
        engine.note_on(60, 1.0);

        let base = midi_to_hz(60.0);
        let expected = [1.0, 2f64.powf(4.0 / 12.0), 2f64.powf(7.0 / 12.0), 2.0];
        for (voice, ratio) in engine.voices().iter().zip(expected) {
            assert!(approx_eq(voice.target_frequency, base * ratio));
            assert_eq!(voice.current_frequency, voice.target_frequency);
        }
    }

    #[test]
    fn test_body_transposes() {
        let mut engine = engine();
        engine.update("BODY", -12.0).unwrap();
        engine.note_on(69, 1.0);
        assert!(approx_eq(engine.voices()[0].target_frequency, 220.0));
    }

    #[test]
    fn test_out_of_range_selections_clamp() {
        let mut engine = engine();
        engine.update("CHORD", 17.0).unwrap();
        engine.update("VOICES", 0.0).unwrap();
        assert_eq!(engine.chord(), ChordType::Min7);
        assert_eq!(engine.voice_count(), 1);
        assert_eq!(engine.param("CHORD"), Some(5.0));
    }

    #[test]
    fn test_legato_glides() {
        let mut engine = engine();
        engine.update("GLIDE", 100.0).unwrap();
        engine.note_on(60, 1.0);
        run(&mut engine, 4410);
        assert!(engine.base().amplitude() > 0.01);

        engine.note_on(67, 1.0);
        let voice = engine.voices()[0];
        assert!(voice.current_frequency < voice.target_frequency);

        let mut previous = (voice.target_frequency - voice.current_frequency).abs();
        for _ in 0..2000 {
            run(&mut engine, 1);
            let voice = engine.voices()[0];
            let distance = (voice.target_frequency - voice.current_frequency).abs();
            if previous < 1e-9 {
                break;
            }
            assert!(distance < previous);
            previous = distance;
        }
    }

    #[test]
    fn test_same_note_retriggers() {
        let mut engine = engine();
        engine.note_on(60, 1.0);
        run(&mut engine, 4410);
        engine.note_on(60, 1.0);
        assert_eq!(engine.base().envelope().cursor().stage, 0);
    }

    #[test]
    fn test_legato_keeps_envelope_running() {
        let mut engine = engine();
        engine.note_on(60, 1.0);
        run(&mut engine, 4410);
        let cursor = engine.base().envelope().cursor();
        engine.note_on(64, 1.0);
        assert_eq!(engine.base().envelope().cursor(), cursor);
        assert_eq!(engine.last_note(), Some(64));
    }

    #[test]
    fn test_held_note_counting() {
        let mut engine = engine();
        engine.note_on(60, 1.0);
        engine.note_on(64, 1.0);
        run(&mut engine, 4410);
        assert_eq!(engine.held_notes(), 2);

        engine.note_off(60, 0.0);
        run(&mut engine, 100);
        assert_eq!(engine.base().envelope().cursor().stage, 1);

        engine.note_off(64, 0.0);
        assert_eq!(engine.base().envelope().cursor().stage, 2);

        // a stray note-off never goes below zero
        engine.note_off(64, 0.0);
        assert_eq!(engine.held_notes(), 0);
    }

    #[test]
    fn test_single_voice_has_no_detune() {
        assert_eq!(Engine::spread(0, 1), 0.0);
        assert_eq!(Engine::spread(0, 4), -1.0);
        assert_eq!(Engine::spread(3, 4), 1.0);
        assert!(approx_eq(Engine::spread(1, 3), 0.0));
    }

    #[test]
    fn test_detune_spreads_rendered_frequencies() {
        let advances = |detune: f64| {
            let mut engine = engine();
            engine.update("GLIDE", 0.0).unwrap();
            engine.update("DETUNE", detune).unwrap();
            engine.note_on(60, 1.0);

            let mut buffer = [0.0; 1];
            let before: Vec<f64> = engine.voices().iter().map(|v| v.phase).collect();
            engine.sample(&mut buffer, 1.0);
            engine
                .voices()
                .iter()
                .zip(before)
                .map(|(v, phase)| (v.phase - phase).rem_euclid(1.0))
                .collect::<Vec<f64>>()
        };

        let targets: Vec<f64> = {
            let mut engine = engine();
            engine.update("GLIDE", 0.0).unwrap();
            engine.note_on(60, 1.0);
            engine.voices().iter().map(|v| v.target_frequency).collect()
        };

        // 100% detune moves the outer voices 8% apart either way
        for (index, advance) in advances(100.0).into_iter().enumerate() {
            let expected = targets[index] * (1.0 + Engine::spread(index, 4) * 0.08) / SR as f64;
            assert!((advance - expected).abs() < 1e-12, "voice {}", index);
        }
        let outer = advances(100.0);
        assert!(approx_eq(outer[0] / (targets[0] / SR as f64), 0.92));
        assert!(approx_eq(outer[3] / (targets[3] / SR as f64), 1.08));

        for (index, advance) in advances(0.0).into_iter().enumerate() {
            assert!((advance - targets[index] / SR as f64).abs() < 1e-12, "voice {}", index);
        }
    }

    #[test]
    fn test_velocity_scales_output() {
        let render = |velocity: f64| {
            let mut engine = engine();
            engine.note_on(60, velocity);
            let mut buffer = [0.0; 1];
            (0..2000)
                .map(|_| {
                    engine.tick(&mut buffer);
                    buffer[0].abs()
                })
                .fold(0.0, f64::max)
        };
        let loud = render(1.0);
        let quiet = render(0.25);
        assert!(loud > 0.0);
        assert!(approx_eq(quiet, loud * 0.25));
    }

    #[test]
    fn test_glide_rate() {
        let mut engine = engine();
        engine.update("GLIDE", 0.0).unwrap();
        assert_eq!(engine.glide_rate(), 1.0);
        engine.update("GLIDE", 100.0).unwrap();
        assert!(approx_eq(engine.glide_rate(), 1.0 / 4410.0));
        engine.update("GLIDE", 2000.0).unwrap();
        assert_eq!(engine.glide_rate(), 0.0001);
    }
}
