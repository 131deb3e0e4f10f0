//! Morphable single-cycle oscillator shared by the chord voices.
//!
//! The oscillator itself is stateless: each caller owns its phase and passes it
//! in, so one oscillator can drive any number of sub-voices.

use std::f64::consts::TAU;

/// Reference frequency that `freq_ratio` is relative to.
pub const REFERENCE_HZ: f64 = 110.0;

/// Waveform of a [`WaveOscillator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaveShape {
    #[default]
    Sine,
    Saw,
    Square,
    Triangle,
    Pulse,
    /// Two-operator FM, modulator at twice the carrier.
    Fm,
    /// FM with a square-wave modulator.
    FmSquare,
}

impl WaveShape {
    pub const ALL: [WaveShape; 7] = [
        WaveShape::Sine,
        WaveShape::Saw,
        WaveShape::Square,
        WaveShape::Triangle,
        WaveShape::Pulse,
        WaveShape::Fm,
        WaveShape::FmSquare,
    ];

    /// Maps a parameter index to a shape, clamping out-of-range values.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }
}

/// Oscillator with a selectable shape and a 0..1 morph control.
///
/// What morph does depends on the shape:
/// - `Sine`: phase distortion
/// - `Saw`: blends toward a triangle
/// - `Square`: softens toward a sine
/// - `Triangle`: blends toward a sine
/// - `Pulse`: narrows the duty cycle from 50% to 5%
/// - `Fm`, `FmSquare`: modulation index
///
/// # Examples
///
/// ```
/// use multiengine::dsp::{WaveOscillator, WaveShape};
///
/// let osc = WaveOscillator::<44100>::new(WaveShape::Saw);
/// let mut phase = 0.0;
/// let sample = osc.sample(&mut phase, 2.0); // 220 Hz
/// assert!(sample.abs() <= 1.0);
/// assert!(phase > 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaveOscillator<const SAMPLE_RATE: u32> {
    shape: WaveShape,
    morph: f64,
}

impl<const SAMPLE_RATE: u32> WaveOscillator<SAMPLE_RATE> {
    pub fn new(shape: WaveShape) -> Self {
        Self { shape, morph: 0.0 }
    }

    pub fn shape(&self) -> WaveShape {
        self.shape
    }

    pub fn set_shape(&mut self, shape: WaveShape) {
        self.shape = shape;
    }

    pub fn morph(&self) -> f64 {
        self.morph
    }

    pub fn set_morph(&mut self, morph: f64) {
        self.morph = morph.clamp(0.0, 1.0);
    }

    /// Evaluates the waveform at `phase` and advances it.
    ///
    /// # Arguments
    ///
    /// * `phase` - Caller-owned phase in cycles (0.0 to 1.0), wrapped in place
    /// * `freq_ratio` - Frequency as a multiple of [`REFERENCE_HZ`]
    #[inline]
    pub fn sample(&self, phase: &mut f64, freq_ratio: f64) -> f64 {
        let dt = (REFERENCE_HZ * freq_ratio / SAMPLE_RATE as f64).clamp(0.0, 0.5);
        let p = *phase;
        let m = self.morph;

        let out = match self.shape {
            WaveShape::Sine => (TAU * (p + m * 0.25 * (TAU * p).sin())).sin(),
            WaveShape::Saw => {
                let saw = 2.0 * p - 1.0 - poly_blep(p, dt);
                saw * (1.0 - m) + triangle(p) * m
            }
            WaveShape::Square => square(p, 0.5, dt) * (1.0 - m) + (TAU * p).sin() * m,
            WaveShape::Triangle => triangle(p) * (1.0 - m) + (TAU * p).sin() * m,
            WaveShape::Pulse => square(p, 0.5 - m * 0.45, dt),
            WaveShape::Fm => {
                let modulator = (TAU * 2.0 * p).sin();
                (TAU * p + m * 4.0 * modulator).sin()
            }
            WaveShape::FmSquare => {
                let modulator = if (2.0 * p).fract() < 0.5 { 1.0 } else { -1.0 };
                (TAU * p + m * 2.0 * modulator).sin()
            }
        };

        *phase = (p + dt).fract();
        out
    }
}

impl<const SAMPLE_RATE: u32> Default for WaveOscillator<SAMPLE_RATE> {
    fn default() -> Self {
        Self::new(WaveShape::Sine)
    }
}

#[inline]
fn triangle(p: f64) -> f64 {
    if p < 0.5 {
        4.0 * p - 1.0
    } else {
        3.0 - 4.0 * p
    }
}

#[inline]
fn square(p: f64, width: f64, dt: f64) -> f64 {
    let naive = if p < width { 1.0 } else { -1.0 };
    naive + poly_blep(p, dt) - poly_blep((p - width + 1.0).fract(), dt)
}

/// Polynomial band-limited step correction around a discontinuity at phase 0.
#[inline]
fn poly_blep(t: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_advance_matches_frequency() {
        let osc = WaveOscillator::<44100>::new(WaveShape::Sine);
        let mut phase = 0.0;
        osc.sample(&mut phase, 1.0);
        assert!((phase - 110.0 / 44100.0).abs() < 1e-12);
    }

    #[test]
    fn test_phase_wraps() {
        let osc = WaveOscillator::<1000>::new(WaveShape::Saw);
        let mut phase = 0.95;
        osc.sample(&mut phase, 1.0);
        assert!((0.0..1.0).contains(&phase));
    }

    #[test]
    fn test_sine_without_morph_is_pure() {
        let osc = WaveOscillator::<44100>::new(WaveShape::Sine);
        let mut phase = 0.25;
        assert!((osc.sample(&mut phase, 1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_all_shapes_bounded_across_morph() {
        for shape in WaveShape::ALL {
            for morph in [0.0, 0.3, 0.7, 1.0] {
                let mut osc = WaveOscillator::<44100>::new(shape);
                osc.set_morph(morph);
                let mut phase = 0.0;
                for _ in 0..2000 {
                    let v = osc.sample(&mut phase, 4.0);
                    assert!(v.abs() <= 1.0 + 1e-9, "{:?} morph {} gave {}", shape, morph, v);
                }
            }
        }
    }

    #[test]
    fn test_pulse_width_follows_morph() {
        let mut osc = WaveOscillator::<1000>::new(WaveShape::Pulse);
        osc.set_morph(1.0);
        // 1 Hz so the band-limiting correction only touches the edges
        let ratio = 1.0 / REFERENCE_HZ;
        let mut phase = 0.0;
        let high = (0..1000).filter(|_| osc.sample(&mut phase, ratio) > 0.0).count();
        assert!((45..=55).contains(&high), "high for {} samples", high);
    }

    #[test]
    fn test_from_index_clamps() {
        assert_eq!(WaveShape::from_index(4), WaveShape::Pulse);
        assert_eq!(WaveShape::from_index(100), WaveShape::FmSquare);
    }
}
