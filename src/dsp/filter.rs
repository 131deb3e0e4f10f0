//! Shared low-pass/high-pass filter.
//!
//! Engines only see the [`Filter`] contract: a normalized cutoff, a normalized
//! resonance and a per-sample `process`. [`MultiModeFilter`] implements it with
//! a biquad using Robert Bristow-Johnson's Audio EQ Cookbook formulas.

use std::f64::consts::PI;

/// Per-sample filter contract consumed by the voice engines.
pub trait Filter {
    /// Sets the cutoff as a ratio of the usable range (0.0 = lowest, 1.0 = highest).
    fn set_cutoff(&mut self, ratio: f64);

    /// Sets the resonance as a ratio (0.0 = none, 1.0 = maximum).
    fn set_resonance(&mut self, ratio: f64);

    /// Filters one sample.
    fn process(&mut self, input: f64) -> f64;
}

/// Response selected for a [`MultiModeFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Input passes through untouched
    #[default]
    Bypass,
    /// Attenuates frequencies above the cutoff
    LowPass,
    /// Attenuates frequencies below the cutoff
    HighPass,
}

const MIN_CUTOFF_HZ: f64 = 20.0;
const CUTOFF_CURVE: f64 = 1.5;
const MIN_Q: f64 = 0.707;
const MAX_EXTRA_Q: f64 = 8.0;

/// Biquad filter switchable between low-pass, high-pass and bypass.
///
/// # Examples
///
/// ```
/// use multiengine::dsp::{Filter, FilterMode, MultiModeFilter};
///
/// let mut filter = MultiModeFilter::<44100>::new(FilterMode::LowPass);
/// filter.set_cutoff(0.3);
/// let out = filter.process(1.0);
/// assert!(out < 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct MultiModeFilter<const SAMPLE_RATE: u32> {
    mode: FilterMode,
    cutoff: f64,
    resonance: f64,

    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl<const SAMPLE_RATE: u32> MultiModeFilter<SAMPLE_RATE> {
    /// Creates a filter fully open (cutoff 1.0) with no resonance.
    pub fn new(mode: FilterMode) -> Self {
        let mut filter = Self {
            mode,
            cutoff: 1.0,
            resonance: 0.0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        };
        filter.update_coefficients();
        filter
    }

    pub fn lowpass() -> Self {
        Self::new(FilterMode::LowPass)
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn cutoff(&self) -> f64 {
        self.cutoff
    }

    pub fn resonance(&self) -> f64 {
        self.resonance
    }

    pub fn set_mode(&mut self, mode: FilterMode) {
        if mode != self.mode {
            self.mode = mode;
            self.update_coefficients();
        }
    }

    /// Cutoff frequency in Hz for the current ratio.
    pub fn cutoff_hz(&self) -> f64 {
        let max_hz = SAMPLE_RATE as f64 * 0.45;
        MIN_CUTOFF_HZ + (max_hz - MIN_CUTOFF_HZ) * self.cutoff.powf(CUTOFF_CURVE)
    }

    /// Applies a centered `-100..=100` cutoff control and returns the base ratio.
    ///
    /// Positive values select low-pass: 0+ is fully open and 100 fully closed.
    /// Negative values select high-pass: 0- is fully open and -100 the thinnest.
    /// Zero bypasses the filter.
    pub fn apply_cutoff_control(&mut self, control: f64) -> f64 {
        let control = control.clamp(-100.0, 100.0);
        let (mode, ratio) = if control > 0.0 {
            (FilterMode::LowPass, 1.0 - control / 100.0)
        } else if control < 0.0 {
            (FilterMode::HighPass, -control / 100.0)
        } else {
            (FilterMode::Bypass, 1.0)
        };
        self.mode = mode;
        self.cutoff = ratio;
        self.update_coefficients();
        ratio
    }

    /// Clears the filter history.
    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    fn update_coefficients(&mut self) {
        if self.mode == FilterMode::Bypass {
            self.b0 = 1.0;
            self.b1 = 0.0;
            self.b2 = 0.0;
            self.a1 = 0.0;
            self.a2 = 0.0;
            return;
        }

        let sample_rate = SAMPLE_RATE as f64;
        let freq = self.cutoff_hz().clamp(1.0, sample_rate * 0.49);
        let q = MIN_Q + self.resonance * MAX_EXTRA_Q;

        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();
        let alpha = sin_omega / (2.0 * q);

        let (b0, b1, b2) = match self.mode {
            FilterMode::HighPass => (
                (1.0 + cos_omega) / 2.0,
                -(1.0 + cos_omega),
                (1.0 + cos_omega) / 2.0,
            ),
            _ => (
                (1.0 - cos_omega) / 2.0,
                1.0 - cos_omega,
                (1.0 - cos_omega) / 2.0,
            ),
        };
        let a0 = 1.0 + alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = -2.0 * cos_omega / a0;
        self.a2 = (1.0 - alpha) / a0;
    }
}

impl<const SAMPLE_RATE: u32> Default for MultiModeFilter<SAMPLE_RATE> {
    fn default() -> Self {
        Self::new(FilterMode::Bypass)
    }
}

impl<const SAMPLE_RATE: u32> Filter for MultiModeFilter<SAMPLE_RATE> {
    fn set_cutoff(&mut self, ratio: f64) {
        let ratio = ratio.clamp(0.0, 1.0);
        if ratio != self.cutoff {
            self.cutoff = ratio;
            self.update_coefficients();
        }
    }

    fn set_resonance(&mut self, ratio: f64) {
        let ratio = ratio.clamp(0.0, 1.0);
        if ratio != self.resonance {
            self.resonance = ratio;
            self.update_coefficients();
        }
    }

    #[inline]
    fn process(&mut self, input: f64) -> f64 {
        if self.mode == FilterMode::Bypass {
            return input;
        }

        // Direct Form I
        let output = self.b0 * input + self.b1 * self.x1 + self.b2 * self.x2
            - self.a1 * self.y1
            - self.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }
}
