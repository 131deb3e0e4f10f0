//! Shared multi-effects unit.
//!
//! The engines push one sample at a time through an [`EffectsChain`] together
//! with a normalized amount. [`MultiFx`] switches between a handful of classic
//! effects; all of its memory is allocated up front.

use std::f64::consts::TAU;

/// Per-sample effects contract consumed by the voice engines.
pub trait EffectsChain {
    /// Processes one sample. `amount` is the normalized effect intensity (0.0 to 1.0).
    fn apply(&mut self, input: f64, amount: f64) -> f64;
}

/// Effect selected in a [`MultiFx`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FxType {
    #[default]
    Bypass,
    Delay,
    Distortion,
    Bitcrusher,
    Tremolo,
}

impl FxType {
    pub const ALL: [FxType; 5] = [
        FxType::Bypass,
        FxType::Delay,
        FxType::Distortion,
        FxType::Bitcrusher,
        FxType::Tremolo,
    ];

    /// Maps a parameter index to an effect, clamping out-of-range values.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }
}

const MAX_DELAY_SECONDS: f64 = 1.0;
const DELAY_TIME_SECONDS: f64 = 0.25;
const MAX_FEEDBACK: f64 = 0.85;
const TREMOLO_RATE_HZ: f64 = 5.0;

/// Multi-effects processor with a fixed set of effect types.
///
/// # Examples
///
/// ```
/// use multiengine::dsp::{EffectsChain, FxType, MultiFx};
///
/// let mut fx = MultiFx::<44100>::new();
/// fx.set_type(FxType::Distortion);
/// let out = fx.apply(0.5, 1.0);
/// assert!(out.abs() <= 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct MultiFx<const SAMPLE_RATE: u32> {
    fx_type: FxType,

    // delay
    buffer: Box<[f64]>,
    write_pos: usize,

    // bitcrusher
    hold_counter: f64,
    held_sample: f64,

    // tremolo
    tremolo_phase: f64,
}

impl<const SAMPLE_RATE: u32> MultiFx<SAMPLE_RATE> {
    pub fn new() -> Self {
        let buffer_size = (MAX_DELAY_SECONDS * SAMPLE_RATE as f64).ceil() as usize + 1;
        Self {
            fx_type: FxType::Bypass,
            buffer: vec![0.0; buffer_size].into_boxed_slice(),
            write_pos: 0,
            hold_counter: f64::INFINITY,
            held_sample: 0.0,
            tremolo_phase: 0.0,
        }
    }

    pub fn fx_type(&self) -> FxType {
        self.fx_type
    }

    /// Switches the effect type, clearing any state left by the previous one.
    pub fn set_type(&mut self, fx_type: FxType) {
        if fx_type != self.fx_type {
            self.fx_type = fx_type;
            self.reset();
        }
    }

    /// Clears the delay line and all effect state.
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        self.hold_counter = f64::INFINITY;
        self.held_sample = 0.0;
        self.tremolo_phase = 0.0;
    }

    fn delay(&mut self, input: f64, amount: f64) -> f64 {
        let feedback = amount * MAX_FEEDBACK;
        let mix = amount * 0.5;

        let len = self.buffer.len();
        let delay_samples = ((DELAY_TIME_SECONDS * SAMPLE_RATE as f64) as usize).min(len - 1);
        let read_pos = (self.write_pos + len - delay_samples) % len;

        let delayed = self.buffer[read_pos];
        self.buffer[self.write_pos] = input + delayed * feedback;
        self.write_pos = (self.write_pos + 1) % len;

        input * (1.0 - mix) + delayed * mix
    }

    fn distortion(&mut self, input: f64, amount: f64) -> f64 {
        let drive = 1.0 + amount * 20.0;
        let wet = (input * drive).tanh() * 0.7;
        input * (1.0 - amount) + wet * amount
    }

    fn bitcrusher(&mut self, input: f64, amount: f64) -> f64 {
        let reduction = 1.0 + amount * 15.0;
        if self.hold_counter >= reduction {
            self.held_sample = input;
            self.hold_counter = 0.0;
        }
        self.hold_counter += 1.0;

        let bits = 16.0 - amount * 12.0;
        let levels = 2.0_f64.powf(bits);
        (self.held_sample * levels).round() / levels
    }

    fn tremolo(&mut self, input: f64, amount: f64) -> f64 {
        let lfo = self.tremolo_phase.sin();
        self.tremolo_phase = (self.tremolo_phase + TAU * TREMOLO_RATE_HZ / SAMPLE_RATE as f64) % TAU;

        // lfo mapped to 0..1, depth scales how far the gain dips
        let modulation = (lfo + 1.0) * 0.5;
        input * (1.0 - amount * (1.0 - modulation))
    }
}

impl<const SAMPLE_RATE: u32> Default for MultiFx<SAMPLE_RATE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SAMPLE_RATE: u32> EffectsChain for MultiFx<SAMPLE_RATE> {
    #[inline]
    fn apply(&mut self, input: f64, amount: f64) -> f64 {
        let amount = amount.clamp(0.0, 1.0);
        match self.fx_type {
            FxType::Bypass => input,
            FxType::Delay => self.delay(input, amount),
            FxType::Distortion => self.distortion(input, amount),
            FxType::Bitcrusher => self.bitcrusher(input, amount),
            FxType::Tremolo => self.tremolo(input, amount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_index_clamps() {
        assert_eq!(FxType::from_index(0), FxType::Bypass);
        assert_eq!(FxType::from_index(3), FxType::Bitcrusher);
        assert_eq!(FxType::from_index(99), FxType::Tremolo);
    }

    #[test]
    fn test_bypass_is_transparent() {
        let mut fx = MultiFx::<44100>::new();
        for x in [0.1, -0.9, 0.5] {
            assert_eq!(fx.apply(x, 1.0), x);
        }
    }

    #[test]
    fn test_delay_tail_on_silence() {
        let mut fx = MultiFx::<1000>::new();
        fx.set_type(FxType::Delay);

        // single impulse, then silence
        let first = fx.apply(1.0, 0.8);
        assert!((first - 0.6).abs() < 1e-12);

        let tail: Vec<f64> = (0..1000).map(|_| fx.apply(0.0, 0.8)).collect();
        let echo = tail[249];
        assert!((echo - 0.4).abs() < 1e-12, "echo {}", echo);

        // feedback produces a second, quieter echo
        let second_echo = tail[499];
        assert!(second_echo > 0.0 && second_echo < echo);
    }

    #[test]
    fn test_zero_amount_leaves_delay_dry() {
        let mut fx = MultiFx::<1000>::new();
        fx.set_type(FxType::Delay);
        assert_eq!(fx.apply(0.7, 0.0), 0.7);
        for _ in 0..500 {
            assert_eq!(fx.apply(0.0, 0.0), 0.0);
        }
    }

    #[test]
    fn test_distortion_is_bounded() {
        let mut fx = MultiFx::<44100>::new();
        fx.set_type(FxType::Distortion);
        for x in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            let y = fx.apply(x, 1.0);
            assert!(y.abs() <= 0.7 + 1e-12);
        }
    }

    #[test]
    fn test_bitcrusher_holds_samples() {
        let mut fx = MultiFx::<44100>::new();
        fx.set_type(FxType::Bitcrusher);
        let a = fx.apply(0.25, 1.0);
        let b = fx.apply(0.75, 1.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_tremolo_attenuates_only() {
        let mut fx = MultiFx::<44100>::new();
        fx.set_type(FxType::Tremolo);
        let mut min: f64 = 1.0;
        for _ in 0..44100 {
            let y = fx.apply(1.0, 1.0);
            assert!((0.0..=1.0).contains(&y));
            min = min.min(y);
        }
        assert!(min < 0.01);
    }

    #[test]
    fn test_switching_type_clears_delay() {
        let mut fx = MultiFx::<1000>::new();
        fx.set_type(FxType::Delay);
        fx.apply(1.0, 1.0);
        fx.set_type(FxType::Bypass);
        fx.set_type(FxType::Delay);
        for _ in 0..1000 {
            assert_eq!(fx.apply(0.0, 1.0), 0.0);
        }
    }
}
