//! Low frequency oscillator used for wave modulation.

use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{AudioSignal, Signal};

/// Waveform of an [`Lfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LfoShape {
    #[default]
    Sine,
    Triangle,
    Square,
    Saw,
    SawDown,
    /// Sample & hold: a new random level every cycle.
    Random,
}

impl LfoShape {
    pub const ALL: [LfoShape; 6] = [
        LfoShape::Sine,
        LfoShape::Triangle,
        LfoShape::Square,
        LfoShape::Saw,
        LfoShape::SawDown,
        LfoShape::Random,
    ];

    /// Maps a parameter index to a shape, clamping out-of-range values.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    /// Evaluates the deterministic shapes at `phase` (0.0 to 1.0).
    ///
    /// `Random` has no closed form and evaluates to 0.0 here.
    #[inline]
    pub fn evaluate(&self, phase: f64) -> f64 {
        match self {
            LfoShape::Sine => (phase * TAU).sin(),
            LfoShape::Triangle => {
                let p = phase * 4.0;
                if p < 1.0 {
                    p
                } else if p < 3.0 {
                    2.0 - p
                } else {
                    p - 4.0
                }
            }
            LfoShape::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoShape::Saw => phase * 2.0 - 1.0,
            LfoShape::SawDown => 1.0 - phase * 2.0,
            LfoShape::Random => 0.0,
        }
    }
}

/// Free-running LFO producing values in `[-1.0, 1.0]`.
///
/// # Examples
///
/// ```
/// use multiengine::dsp::{Lfo, LfoShape};
/// use rand::SeedableRng;
///
/// let rng = rand::rngs::StdRng::seed_from_u64(7);
/// let mut lfo = Lfo::<1000, _>::with_rng(10.0, rng);
/// lfo.set_shape(LfoShape::Saw);
/// assert_eq!(lfo.process(), -1.0);
/// ```
#[derive(Debug, Clone)]
pub struct Lfo<const SAMPLE_RATE: u32, R: Rng = StdRng> {
    rate: f64,
    shape: LfoShape,
    phase: f64,
    held: f64,
    rng: R,
}

impl<const SAMPLE_RATE: u32> Lfo<SAMPLE_RATE, StdRng> {
    /// Creates an LFO seeded from system entropy.
    ///
    /// # Arguments
    ///
    /// * `rate` - Frequency in Hz
    pub fn new(rate: f64) -> Self {
        Self::with_rng(rate, StdRng::from_entropy())
    }
}

impl<const SAMPLE_RATE: u32, R: Rng> Lfo<SAMPLE_RATE, R> {
    /// Creates an LFO drawing its random levels from `rng`.
    pub fn with_rng(rate: f64, mut rng: R) -> Self {
        let held = rng.gen_range(-1.0..=1.0);
        Self {
            rate: rate.max(0.0),
            shape: LfoShape::default(),
            phase: 0.0,
            held,
            rng,
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate.max(0.0);
    }

    pub fn shape(&self) -> LfoShape {
        self.shape
    }

    pub fn set_shape(&mut self, shape: LfoShape) {
        self.shape = shape;
    }

    /// Restarts the cycle.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Returns the current value and advances by one sample.
    #[inline]
    pub fn process(&mut self) -> f64 {
        let value = match self.shape {
            LfoShape::Random => self.held,
            shape => shape.evaluate(self.phase),
        };

        self.phase += self.rate / SAMPLE_RATE as f64;
        if self.phase >= 1.0 {
            self.phase = self.phase.fract();
            self.held = self.rng.gen_range(-1.0..=1.0);
        }

        value
    }
}

impl<const SAMPLE_RATE: u32, R: Rng> Signal for Lfo<SAMPLE_RATE, R> {
    fn next_sample(&mut self) -> f64 {
        self.process()
    }
}

impl<const SAMPLE_RATE: u32, R: Rng> AudioSignal<SAMPLE_RATE> for Lfo<SAMPLE_RATE, R> {}
