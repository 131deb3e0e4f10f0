//! Single-voice wavetable engine.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::base::{ATTACK, RELEASE};
use super::params::{self, ParamSpec};
use super::{EngineBase, VoiceEngine};
use crate::Result;
use crate::core::pitch::{ms_to_samples, semitone_ratio};
use crate::dsp::{
    BuiltinBank, EffectsChain, Filter, FxType, Lfo, LfoShape, MultiFx, MultiModeFilter,
    WavetableBank,
};
use crate::envelopes::{EnvelopeGenerator, EnvelopeStage};

const MIDDLE_C_HZ: f64 = 261.63;
const MIDDLE_C: u8 = 60;

const PUNCH_MS: f64 = 150.0;
const PUNCH_DEPTH: f64 = 0.02;
/// Widest LFO sweep, as a fraction of the bank (8 of 64 frames).
const WAVE_MOD_RANGE: f64 = 0.125;

const PARAM_COUNT: usize = 13;

static PARAMS: [ParamSpec; PARAM_COUNT] = [
    ATTACK,
    RELEASE,
    ParamSpec::new("PITCH", "Pitch", -32.0, 32.0, 0.0, "st"),
    ParamSpec::new("LFO_RATE", "LFO Rate", 0.1, 100.0, 1.0, "Hz"),
    ParamSpec::new("LFO_WAVEFORM", "LFO", 0.0, 5.0, 0.0, ""),
    ParamSpec::percent("LFO_WAVE_MOD", "Wave. Mod.", 0.0),
    ParamSpec::percent("ENV_FILTER_MOD", "Env>Filter", 50.0),
    ParamSpec::new("WAVE", "Wave", 0.0, 2.0, 0.0, ""),
    ParamSpec::new("WAVE_EDIT", "Wave Edit", 1.0, 64.0, 1.0, ""),
    ParamSpec::new("CUTOFF", "LPF | HPF", -100.0, 100.0, 50.0, ""),
    ParamSpec::percent("RESONANCE", "Resonance", 0.0),
    ParamSpec::new("FX_TYPE", "FX type", 0.0, 4.0, 0.0, ""),
    ParamSpec::percent("FX_AMOUNT", "FX edit", 0.0),
];

/// Low-pass cutoff ratio that keeps `note` from aliasing.
///
/// Fully open up to C2 (note 36), closing linearly with pitch and never below 0.15.
///
/// # Examples
///
/// ```
/// use multiengine::engine::anti_alias_cutoff;
///
/// assert_eq!(anti_alias_cutoff(36), 1.0);
/// assert!((anti_alias_cutoff(96) - 0.3).abs() < 1e-9);
/// assert_eq!(anti_alias_cutoff(127), 0.15);
/// ```
pub fn anti_alias_cutoff(note: u8) -> f64 {
    let note_ratio = (f64::from(note) - 36.0) / 60.0;
    (1.0 - note_ratio * 0.7).clamp(0.15, 1.0)
}

/// One oscillator reading a morphable wavetable.
///
/// An LFO can sweep the morph position, a short pitch punch bends each note in
/// from slightly sharp, and the amplitude envelope can open the filter.
///
/// # Examples
///
/// ```
/// use multiengine::engine::{VoiceEngine, WavetableEngine};
///
/// let mut engine = WavetableEngine::<44100>::new();
/// engine.update("WAVE", 1.0)?; // harmonics bank
/// engine.update("WAVE_EDIT", 32.0)?;
///
/// let mut buffer = [0.0];
/// engine.note_on(48, 1.0);
/// for _ in 0..1000 {
///     engine.tick(&mut buffer);
/// }
/// assert!(!engine.is_silent());
/// # Ok::<(), multiengine::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct WavetableEngine<const SAMPLE_RATE: u32, R: Rng = StdRng> {
    base: EngineBase<SAMPLE_RATE>,
    bank: WavetableBank,
    bank_kind: Option<BuiltinBank>,
    phase: f64,
    increment: f64,
    note: u8,
    /// LFO offset applied to the morph position on the last sample, as a fraction of the bank
    wave_offset: f64,

    lfo: Lfo<SAMPLE_RATE, R>,
    punch: EnvelopeGenerator,
    anti_alias: MultiModeFilter<SAMPLE_RATE>,
    filter: MultiModeFilter<SAMPLE_RATE>,
    fx: MultiFx<SAMPLE_RATE>,

    held_notes: u32,
    velocity: f64,

    values: [f64; PARAM_COUNT],
    pitch: f64,
    wave_mod: f64,
    env_filter_mod: f64,
    cutoff: f64,
    base_cutoff: f64,
    fx_amount: f64,
}

impl<const SAMPLE_RATE: u32> WavetableEngine<SAMPLE_RATE, StdRng> {
    /// Creates an engine whose random LFO is seeded from system entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }
}

impl<const SAMPLE_RATE: u32> Default for WavetableEngine<SAMPLE_RATE, StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SAMPLE_RATE: u32, R: Rng> WavetableEngine<SAMPLE_RATE, R> {
    /// Creates an engine whose random LFO draws from `rng`.
    pub fn with_rng(rng: R) -> Self {
        let mut punch = EnvelopeGenerator::from_array([
            EnvelopeStage::new(1.0, ms_to_samples(PUNCH_MS, SAMPLE_RATE as f64).max(1)),
            EnvelopeStage::new(0.0, 0),
        ]);
        punch.stop();

        let bank_kind = BuiltinBank::default();
        let mut engine = Self {
            base: EngineBase::new(0),
            bank: WavetableBank::new(bank_kind),
            bank_kind: Some(bank_kind),
            phase: 0.0,
            increment: 0.0,
            note: MIDDLE_C,
            wave_offset: 0.0,
            lfo: Lfo::with_rng(1.0, rng),
            punch,
            anti_alias: MultiModeFilter::lowpass(),
            filter: MultiModeFilter::default(),
            fx: MultiFx::new(),
            held_notes: 0,
            velocity: 1.0,
            values: [0.0; PARAM_COUNT],
            pitch: 0.0,
            wave_mod: 0.0,
            env_filter_mod: 0.0,
            cutoff: 0.0,
            base_cutoff: 1.0,
            fx_amount: 0.0,
        };
        for (index, spec) in PARAMS.iter().enumerate() {
            engine.apply(index, spec.default);
        }
        engine.set_note(MIDDLE_C);
        tracing::debug!(sample_rate = SAMPLE_RATE, "wavetable engine created");
        engine
    }

    /// Routes output to buffer slot `track`.
    pub fn with_track(mut self, track: usize) -> Self {
        self.base.set_track(track);
        self
    }

    /// Plays from `bank` instead of a built-in one.
    ///
    /// Selecting a `WAVE` afterwards switches back to the built-in banks.
    pub fn with_bank(mut self, bank: WavetableBank) -> Self {
        tracing::debug!(
            frames = bank.frame_count(),
            frame_len = bank.frame_len(),
            "wavetable engine using custom bank"
        );
        self.bank = bank;
        self.bank_kind = None;
        self.apply_wave_edit(self.values[index_of("WAVE_EDIT")]);
        self.set_note(self.note);
        self
    }

    fn apply(&mut self, index: usize, value: f64) {
        self.values[index] = value;
        match PARAMS[index].key {
            "PITCH" => {
                self.pitch = value;
                self.set_note(self.note);
            }
            "LFO_RATE" => self.lfo.set_rate(value),
            "LFO_WAVEFORM" => self.lfo.set_shape(LfoShape::from_index(value.round() as usize)),
            "LFO_WAVE_MOD" => self.wave_mod = value / 100.0,
            "ENV_FILTER_MOD" => self.env_filter_mod = value / 100.0,
            "WAVE" => {
                let kind = BuiltinBank::from_index(value.round() as usize);
                if self.bank_kind != Some(kind) {
                    self.bank.fill(kind);
                    self.bank_kind = Some(kind);
                    self.set_note(self.note);
                }
                // a new bank starts from its first frame
                self.values[index_of("WAVE_EDIT")] = 1.0;
                self.apply_wave_edit(1.0);
            }
            "WAVE_EDIT" => self.apply_wave_edit(value),
            "CUTOFF" => {
                self.cutoff = value;
                self.filter.apply_cutoff_control(value);
                // the envelope sweeps from the control's position on a 0..1 scale
                self.base_cutoff = (value + 100.0) / 200.0;
            }
            "RESONANCE" => self.filter.set_resonance(value / 100.0),
            "FX_TYPE" => self.fx.set_type(FxType::from_index(value.round() as usize)),
            "FX_AMOUNT" => self.fx_amount = value / 100.0,
            key => {
                let handled = self.base.update(key, value);
                debug_assert!(handled, "declared parameter {key} has no handler");
            }
        }
    }

    fn apply_wave_edit(&mut self, value: f64) {
        self.bank.morph(value.round() - 1.0);
    }

    /// Recomputes the read increment and anti-alias cutoff for `note`.
    fn set_note(&mut self, note: u8) {
        self.note = note;
        let hz = MIDDLE_C_HZ * semitone_ratio(f64::from(note) - f64::from(MIDDLE_C) + self.pitch);
        self.increment = hz * self.bank.frame_len() as f64 / SAMPLE_RATE as f64;
        self.anti_alias.set_cutoff(anti_alias_cutoff(note));
    }

    /// Samples of the wavetable advanced per output sample, before pitch punch.
    pub fn increment(&self) -> f64 {
        self.increment
    }

    /// Read position inside the current frame.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Frame position the last sample was read from, LFO modulation included.
    pub fn morph_position(&self) -> f64 {
        let frames = self.bank.frame_count() as f64;
        (self.bank.position() + self.wave_offset * frames).clamp(0.0, frames - 1.0)
    }

    pub fn bank(&self) -> &WavetableBank {
        &self.bank
    }

    pub fn held_notes(&self) -> u32 {
        self.held_notes
    }

    /// Cutoff ratio the user filter is currently running at.
    pub fn filter_cutoff(&self) -> f64 {
        self.filter.cutoff()
    }

    /// Cutoff ratio of the pitch-tracking anti-alias filter.
    pub fn anti_alias_cutoff(&self) -> f64 {
        self.anti_alias.cutoff()
    }

    pub fn punch(&self) -> &EnvelopeGenerator {
        &self.punch
    }
}

fn index_of(key: &str) -> usize {
    PARAMS.iter().position(|p| p.key == key).unwrap_or(0)
}

impl<const SAMPLE_RATE: u32, R: Rng> VoiceEngine<SAMPLE_RATE> for WavetableEngine<SAMPLE_RATE, R> {
    fn name(&self) -> &'static str {
        "Wavetable"
    }

    fn note_on(&mut self, note: u8, velocity: f64) {
        self.base.note_on();
        self.velocity = velocity;
        self.set_note(note);
        self.phase = 0.0;
        self.punch.reset();
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

        let increment = self.increment * (1.0 + self.punch.next() * PUNCH_DEPTH);

        let lfo = self.lfo.process();
        let modulation = if self.wave_mod > 0.0 {
            lfo * self.wave_mod * WAVE_MOD_RANGE
        } else {
            0.0
        };

        self.wave_offset = modulation;
        let out = self.bank.sample(&mut self.phase, increment, modulation);
        let out = self.anti_alias.process(out);

        if self.env_filter_mod > 0.01 && self.cutoff != 0.0 {
            let env_mod = envelope_amplitude * self.env_filter_mod;
            let cutoff = if self.cutoff > 0.0 {
                self.base_cutoff + (1.0 - self.base_cutoff) * env_mod
            } else {
                self.base_cutoff * (1.0 - env_mod * 0.5)
            };
            self.filter.set_cutoff(cutoff);
        }

        let out = self.filter.process(out) * envelope_amplitude * self.velocity;
        let out = self.fx.apply(out, self.fx_amount);
        self.base.write(buffer, out);
    }

    fn update(&mut self, key: &str, value: f64) -> Result<()> {
        let (spec, value) = params::resolve(self.name(), &PARAMS, key, value)?;
        self.apply(index_of(spec.key), value);
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
    use crate::dsp::FRAME_LEN;
    use approx::assert_relative_eq;

    const SR: u32 = 44100;

    type Engine = WavetableEngine<SR>;

    fn engine() -> Engine {
        WavetableEngine::with_rng(StdRng::seed_from_u64(7))
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
        assert_eq!(engine.param("CUTOFF"), Some(50.0));
        assert_eq!(engine.param("ENV_FILTER_MOD"), Some(50.0));
        assert_eq!(engine.param("WAVE_EDIT"), Some(1.0));
        assert_relative_eq!(engine.filter_cutoff(), 0.5);
        assert!(engine.is_silent());
    }

    #[test]
    fn test_increment_from_note_and_pitch() {
        let mut engine = engine();
        engine.note_on(60, 1.0);
        assert_relative_eq!(engine.increment(), 261.63 * FRAME_LEN as f64 / 44100.0);

        engine.update("PITCH", 12.0).unwrap();
        assert_relative_eq!(engine.increment(), 2.0 * 261.63 * FRAME_LEN as f64 / 44100.0);

        engine.note_on(48, 1.0);
        assert_relative_eq!(engine.increment(), 261.63 * FRAME_LEN as f64 / 44100.0);
    }

    #[test]
    fn test_anti_alias_tracks_note() {
        let mut previous = f64::INFINITY;
        for note in 0..=127u8 {
            let cutoff = anti_alias_cutoff(note);
            assert!((0.15..=1.0).contains(&cutoff));
            assert!(cutoff <= previous);
            previous = cutoff;
        }

        let mut engine = engine();
        engine.note_on(96, 1.0);
        assert_relative_eq!(engine.anti_alias_cutoff(), 0.3, epsilon = 1e-12);

        // pitch offset does not move the anti-alias filter
        engine.update("PITCH", -24.0).unwrap();
        assert_relative_eq!(engine.anti_alias_cutoff(), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_note_on_resets_phase_and_punch() {
        let mut engine = engine();
        engine.note_on(60, 1.0);
        run(&mut engine, 1000);
        assert!(engine.phase() > 0.0);

        engine.note_on(62, 1.0);
        assert_eq!(engine.phase(), 0.0);
        assert_eq!(engine.punch().peek(), 1.0);
    }

    #[test]
    fn test_punch_decays_in_150ms() {
        let mut engine = engine();
        engine.note_on(60, 1.0);
        let punch_samples = ms_to_samples(PUNCH_MS, SR as f64) as usize;
        run(&mut engine, punch_samples - 100);
        assert!(!engine.punch().is_silent());
        run(&mut engine, 200);
        assert!(engine.punch().is_silent());
    }

    #[test]
    fn test_envelope_opens_lowpass() {
        // CUTOFF sits at 0.75 on the 0..1 scale, sustain 1.0, depth 50%
        let mut engine = engine();
        engine.note_on(60, 1.0);
        run(&mut engine, 4410);
        assert_relative_eq!(engine.filter_cutoff(), 0.875, epsilon = 1e-12);
    }

    #[test]
    fn test_envelope_opens_closed_lowpass_fully() {
        let mut engine = engine();
        engine.update("CUTOFF", 100.0).unwrap();
        assert_relative_eq!(engine.filter_cutoff(), 0.0);
        engine.note_on(60, 1.0);
        run(&mut engine, 4410);
        assert_relative_eq!(engine.filter_cutoff(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_envelope_thins_highpass() {
        let mut engine = engine();
        engine.update("CUTOFF", -40.0).unwrap();
        engine.note_on(60, 1.0);
        run(&mut engine, 4410);
        // 0.3 * (1 - 0.5 * 0.5)
        assert_relative_eq!(engine.filter_cutoff(), 0.225, epsilon = 1e-12);
    }

    #[test]
    fn test_punch_bends_increment_at_onset() {
        let mut engine = engine();
        let mut buffer = [0.0];
        engine.note_on(60, 1.0);
        let increment = engine.increment();

        engine.sample(&mut buffer, 1.0);
        assert_relative_eq!(engine.phase() / increment, 1.0 + PUNCH_DEPTH, epsilon = 1e-12);

        // once the punch has decayed the read position moves at the plain increment
        for _ in 0..ms_to_samples(PUNCH_MS, SR as f64) + 10 {
            engine.sample(&mut buffer, 1.0);
        }
        assert!(engine.punch().is_silent());
        let before = engine.phase();
        engine.sample(&mut buffer, 1.0);
        let advance = (engine.phase() - before).rem_euclid(FRAME_LEN as f64);
        assert_relative_eq!(advance, increment, epsilon = 1e-9);
    }

    #[test]
    fn test_lfo_wave_mod_range() {
        let sweep = |depth: f64| {
            let mut engine = engine();
            engine.update("WAVE_EDIT", 32.0).unwrap();
            engine.update("LFO_WAVEFORM", 2.0).unwrap(); // square, exactly +-1
            engine.update("LFO_RATE", 10.0).unwrap();
            engine.update("LFO_WAVE_MOD", depth).unwrap();
            engine.note_on(60, 1.0);

            let mut buffer = [0.0];
            let (mut low, mut high) = (f64::INFINITY, f64::NEG_INFINITY);
            for _ in 0..SR {
                engine.sample(&mut buffer, 1.0);
                low = low.min(engine.morph_position());
                high = high.max(engine.morph_position());
            }
            (low, high)
        };

        // 12.5% of 64 frames either side of frame 31
        assert_eq!(sweep(100.0), (23.0, 39.0));
        assert_eq!(sweep(50.0), (27.0, 35.0));
        assert_eq!(sweep(0.0), (31.0, 31.0));
    }

    #[test]
    fn test_envelope_filter_coupling_disabled() {
        let mut engine = engine();
        engine.update("ENV_FILTER_MOD", 0.0).unwrap();
        engine.note_on(60, 1.0);
        run(&mut engine, 4410);
        assert_relative_eq!(engine.filter_cutoff(), 0.5);
    }

    #[test]
    fn test_wave_change_restarts_wave_edit() {
        let mut engine = engine();
        engine.update("WAVE_EDIT", 40.0).unwrap();
        assert_eq!(engine.bank().position(), 39.0);

        engine.update("WAVE", 2.0).unwrap();
        assert_eq!(engine.param("WAVE_EDIT"), Some(1.0));
        assert_eq!(engine.bank().position(), 0.0);
    }

    #[test]
    fn test_custom_bank() {
        let frames = vec![0.0, 1.0, 0.0, -1.0, 0.0, 0.5, 0.0, -0.5];
        let bank = WavetableBank::from_samples(frames, 4).unwrap();
        let mut engine = engine().with_bank(bank);
        engine.note_on(60, 1.0);
        assert_relative_eq!(engine.increment(), 261.63 * 4.0 / 44100.0);
        assert_eq!(engine.bank().frame_count(), 2);
    }

    #[test]
    fn test_held_note_counting() {
        let mut engine = engine();
        engine.note_on(60, 1.0);
        engine.note_on(67, 1.0);
        engine.note_off(60, 0.0);
        assert_eq!(engine.base().envelope().cursor().stage, 0);
        engine.note_off(67, 0.0);
        assert_eq!(engine.held_notes(), 0);
        run(&mut engine, 44100);
        assert!(engine.is_silent());
    }
}
