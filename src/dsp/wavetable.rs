//! Multi-frame wavetable storage and playback.
//!
//! A bank holds a set of single-cycle frames of equal length laid out back to
//! back in one buffer. Playback reads the frame at the current morph position,
//! interpolating linearly both inside a frame and between neighbouring frames.

use std::f64::consts::TAU;

use crate::{Error, Result};

#[cfg(feature = "wavetable-loader")]
use std::path::Path;

/// Frames in a built-in bank.
pub const FRAME_COUNT: usize = 64;
/// Samples per frame in a built-in bank.
pub const FRAME_LEN: usize = 2048;

const MAX_HARMONICS: usize = 31;

/// Built-in wavetable banks, generated on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuiltinBank {
    /// Sine, triangle, saw, square and back to sine.
    #[default]
    BasicShapes,
    /// Adds 1/h partials one frame at a time, up to 32.
    Harmonics,
    /// Band-limited pulse with the duty cycle swept from 50% to 5%.
    PwmSweep,
}

impl BuiltinBank {
    pub const ALL: [BuiltinBank; 3] = [
        BuiltinBank::BasicShapes,
        BuiltinBank::Harmonics,
        BuiltinBank::PwmSweep,
    ];

    /// Maps a parameter index to a bank, clamping out-of-range values.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }
}

/// A set of morphable single-cycle waveforms.
///
/// # Examples
///
/// ```
/// use multiengine::dsp::{BuiltinBank, WavetableBank};
///
/// let mut bank = WavetableBank::new(BuiltinBank::Harmonics);
/// bank.morph(10.0);
///
/// let mut phase = 0.0;
/// let increment = 440.0 * bank.frame_len() as f64 / 44100.0;
/// let sample = bank.sample(&mut phase, increment, 0.0);
/// assert!(sample.abs() <= 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct WavetableBank {
    data: Box<[f64]>,
    frame_len: usize,
    frame_count: usize,
    position: f64,
}

impl WavetableBank {
    /// Creates a bank filled with one of the built-in wavetables.
    pub fn new(bank: BuiltinBank) -> Self {
        let mut wavetable = Self {
            data: vec![0.0; FRAME_COUNT * FRAME_LEN].into_boxed_slice(),
            frame_len: FRAME_LEN,
            frame_count: FRAME_COUNT,
            position: 0.0,
        };
        wavetable.fill(bank);
        wavetable
    }

    /// Creates a bank from raw frames laid out back to back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWavetable`] if `frame_len` is zero, `samples` is
    /// empty, or its length is not a whole number of frames.
    pub fn from_samples(samples: Vec<f64>, frame_len: usize) -> Result<Self> {
        if frame_len == 0 || samples.is_empty() {
            return Err(Error::InvalidWavetable(
                "wavetable must contain at least one non-empty frame".into(),
            ));
        }
        if samples.len() % frame_len != 0 {
            return Err(Error::InvalidWavetable(format!(
                "{} samples is not a multiple of the frame length {}",
                samples.len(),
                frame_len
            )));
        }

        Ok(Self {
            frame_count: samples.len() / frame_len,
            frame_len,
            data: samples.into_boxed_slice(),
            position: 0.0,
        })
    }

    /// Loads frames from the first channel of a WAV file.
    ///
    /// Files whose length is a multiple of [`FRAME_LEN`] are split into frames
    /// of that size. Shorter files are treated as a single frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a valid WAV file, or
    /// does not fit the frame layout.
    #[cfg(feature = "wavetable-loader")]
    pub fn from_wav_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();

        let samples: std::result::Result<Vec<f64>, _> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map(|v| v as f64))
                .collect(),
            hound::SampleFormat::Int => {
                let max_value = (1_i64 << (spec.bits_per_sample - 1)) as f64;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f64 / max_value))
                    .collect()
            }
        };
        let samples = samples?;

        let channel_samples: Vec<f64> = if spec.channels > 1 {
            samples
                .iter()
                .step_by(spec.channels as usize)
                .copied()
                .collect()
        } else {
            samples
        };

        let frame_len = if channel_samples.len() < FRAME_LEN {
            channel_samples.len()
        } else {
            FRAME_LEN
        };
        tracing::debug!(
            samples = channel_samples.len(),
            frame_len,
            "loaded wavetable from wav"
        );
        Self::from_samples(channel_samples, frame_len)
    }

    /// Regenerates a built-in bank, reusing the buffer when its size matches.
    pub fn fill(&mut self, bank: BuiltinBank) {
        if self.data.len() != FRAME_COUNT * FRAME_LEN {
            self.data = vec![0.0; FRAME_COUNT * FRAME_LEN].into_boxed_slice();
        }
        self.frame_len = FRAME_LEN;
        self.frame_count = FRAME_COUNT;
        self.position = self.position.min((FRAME_COUNT - 1) as f64);

        let sine: Vec<f64> = (0..FRAME_LEN)
            .map(|j| (TAU * j as f64 / FRAME_LEN as f64).sin())
            .collect();

        match bank {
            BuiltinBank::BasicShapes => self.fill_basic_shapes(&sine),
            BuiltinBank::Harmonics => self.fill_harmonics(&sine),
            BuiltinBank::PwmSweep => self.fill_pwm_sweep(&sine),
        }

        for frame in self.data.chunks_mut(FRAME_LEN) {
            normalize(frame);
        }
    }

    fn fill_basic_shapes(&mut self, sine: &[f64]) {
        let triangle = additive(sine, 1..=15, |k| {
            let n = 2 * k - 1;
            let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
            (n, sign / (n * n) as f64 * 0.8)
        });
        let saw = additive(sine, 1..=MAX_HARMONICS, |k| {
            let sign = if k % 2 == 1 { 1.0 } else { -1.0 };
            (k, sign / k as f64 * 0.5)
        });
        let square = additive(sine, 1..=MAX_HARMONICS / 2 + 1, |k| {
            let n = 2 * k - 1;
            (n, 0.6 / n as f64)
        });

        // sine -> triangle -> saw -> square -> sine
        let stops: [&[f64]; 5] = [sine, &triangle, &saw, &square, sine];
        for (i, frame) in self.data.chunks_mut(FRAME_LEN).enumerate() {
            let t = i as f64 / (FRAME_COUNT - 1) as f64;
            let segment = ((t * 4.0) as usize).min(3);
            let mix = t * 4.0 - segment as f64;
            let (from, to) = (stops[segment], stops[segment + 1]);
            for (j, sample) in frame.iter_mut().enumerate() {
                *sample = from[j] + (to[j] - from[j]) * mix;
            }
        }
    }

    fn fill_harmonics(&mut self, sine: &[f64]) {
        for (i, frame) in self.data.chunks_mut(FRAME_LEN).enumerate() {
            let partials = 1 + i * MAX_HARMONICS / (FRAME_COUNT - 1);
            for (j, sample) in frame.iter_mut().enumerate() {
                *sample = (1..=partials)
                    .map(|h| sine[(h * j) % FRAME_LEN] / h as f64)
                    .sum();
            }
        }
    }

    fn fill_pwm_sweep(&mut self, sine: &[f64]) {
        for (i, frame) in self.data.chunks_mut(FRAME_LEN).enumerate() {
            let duty = 0.5 - i as f64 * 0.45 / (FRAME_COUNT - 1) as f64;
            for (j, sample) in frame.iter_mut().enumerate() {
                *sample = (1..=MAX_HARMONICS)
                    .map(|k| {
                        let coef = (std::f64::consts::PI * k as f64 * duty).sin() / k as f64;
                        coef * sine[(k * j) % FRAME_LEN]
                    })
                    .sum();
            }
        }
    }

    /// Samples per frame. Phase increments are expressed in these units.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Current morph position as a (fractional) frame index.
    pub fn position(&self) -> f64 {
        self.position
    }

    /// Moves the morph position to frame `index`, clamped to the bank.
    pub fn morph(&mut self, index: f64) {
        self.position = index.clamp(0.0, (self.frame_count - 1) as f64);
    }

    /// Reads one sample and advances `phase` by `increment`.
    ///
    /// # Arguments
    ///
    /// * `phase` - Caller-owned read position in samples (0.0 to `frame_len`)
    /// * `increment` - Samples to advance per call
    /// * `modulation` - Offset added to the morph position, as a fraction of the whole bank
    #[inline]
    pub fn sample(&self, phase: &mut f64, increment: f64, modulation: f64) -> f64 {
        let len = self.frame_len;
        let last_frame = (self.frame_count - 1) as f64;

        let position = (self.position + modulation * self.frame_count as f64).clamp(0.0, last_frame);
        let frame0 = position.floor() as usize;
        let frame1 = (frame0 + 1).min(self.frame_count - 1);
        let frame_mix = position - frame0 as f64;

        let index0 = (phase.floor() as usize) % len;
        let index1 = (index0 + 1) % len;
        let frac = phase.fract();

        let read = |frame: usize| {
            let base = frame * len;
            let a = self.data[base + index0];
            let b = self.data[base + index1];
            a + frac * (b - a)
        };

        let a = read(frame0);
        let out = if frame1 == frame0 || frame_mix == 0.0 {
            a
        } else {
            a + frame_mix * (read(frame1) - a)
        };

        *phase = (*phase + increment).rem_euclid(len as f64);
        out
    }
}

impl Default for WavetableBank {
    fn default() -> Self {
        Self::new(BuiltinBank::default())
    }
}

/// Sums `(harmonic, amplitude)` partials into one frame using the sine table.
fn additive(
    sine: &[f64],
    range: std::ops::RangeInclusive<usize>,
    partial: impl Fn(usize) -> (usize, f64),
) -> Vec<f64> {
    let len = sine.len();
    let mut out = vec![0.0; len];
    for k in range {
        let (harmonic, amp) = partial(k);
        for (j, sample) in out.iter_mut().enumerate() {
            *sample += amp * sine[(harmonic * j) % len];
        }
    }
    out
}

fn normalize(frame: &mut [f64]) {
    let peak = frame.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
    if peak > 0.0 {
        frame.iter_mut().for_each(|s| *s /= peak);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_builtin_dimensions() {
        for bank in BuiltinBank::ALL {
            let wt = WavetableBank::new(bank);
            assert_eq!(wt.frame_count(), FRAME_COUNT);
            assert_eq!(wt.frame_len(), FRAME_LEN);
        }
    }

    #[test]
    fn test_frames_are_normalized() {
        let wt = WavetableBank::new(BuiltinBank::PwmSweep);
        for frame in wt.data.chunks(FRAME_LEN) {
            let peak = frame.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
            assert_relative_eq!(peak, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_first_basic_frame_is_sine() {
        let wt = WavetableBank::new(BuiltinBank::BasicShapes);
        let mut phase = FRAME_LEN as f64 / 4.0;
        assert_relative_eq!(wt.sample(&mut phase, 1.0, 0.0), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_interpolates_within_frame() {
        let wt = WavetableBank::from_samples(vec![0.0, 1.0, 0.0, -1.0], 4).unwrap();
        let mut phase = 0.5;
        assert_relative_eq!(wt.sample(&mut phase, 1.0, 0.0), 0.5);
        assert_relative_eq!(phase, 1.5);
        assert_relative_eq!(wt.sample(&mut phase, 1.0, 0.0), 0.5);
    }

    #[test]
    fn test_interpolates_between_frames() {
        let mut wt = WavetableBank::from_samples(vec![0.0, 0.0, 1.0, 1.0], 2).unwrap();
        wt.morph(0.25);
        let mut phase = 0.0;
        assert_relative_eq!(wt.sample(&mut phase, 0.0, 0.0), 0.25);

        // modulation is a fraction of the whole bank
        assert_relative_eq!(wt.sample(&mut phase, 0.0, 0.25), 0.75);
    }

    #[test]
    fn test_morph_and_modulation_clamp() {
        let mut wt = WavetableBank::from_samples(vec![0.0, 0.0, 1.0, 1.0], 2).unwrap();
        wt.morph(99.0);
        assert_eq!(wt.position(), 1.0);
        let mut phase = 0.0;
        assert_relative_eq!(wt.sample(&mut phase, 0.0, -5.0), 0.0);
    }

    #[test]
    fn test_phase_wraps() {
        let wt = WavetableBank::from_samples(vec![0.0, 1.0, 0.0, -1.0], 4).unwrap();
        let mut phase = 3.5;
        wt.sample(&mut phase, 1.0, 0.0);
        assert_relative_eq!(phase, 0.5);
    }

    #[test]
    fn test_rejects_bad_layout() {
        assert!(WavetableBank::from_samples(vec![], 4).is_err());
        assert!(WavetableBank::from_samples(vec![0.0; 5], 4).is_err());
        assert!(WavetableBank::from_samples(vec![0.0; 4], 0).is_err());
    }

    #[test]
    fn test_fill_reuses_buffer() {
        let mut wt = WavetableBank::new(BuiltinBank::BasicShapes);
        let ptr = wt.data.as_ptr();
        wt.fill(BuiltinBank::Harmonics);
        assert_eq!(ptr, wt.data.as_ptr());
    }

    #[test]
    fn test_from_index_clamps() {
        assert_eq!(BuiltinBank::from_index(1), BuiltinBank::Harmonics);
        assert_eq!(BuiltinBank::from_index(9), BuiltinBank::PwmSweep);
    }
}
