//! Audio signal trait for sample-rate-aware signals.

use crate::Signal;

/// A signal whose sample rate is part of its type.
///
/// The sample rate is encoded as a const generic parameter, so an LFO running at
/// 48 kHz cannot be handed to an engine running at 44.1 kHz by accident.
///
/// # Examples
///
/// ```
/// use multiengine::AudioSignal;
/// use multiengine::dsp::Lfo;
///
/// let lfo = Lfo::<44100>::new(2.0);
/// assert_eq!(lfo.sample_rate(), 44100.0);
/// ```
pub trait AudioSignal<const SAMPLE_RATE: u32>: Signal {
    /// Sample rate in Hz.
    fn sample_rate(&self) -> f64 {
        SAMPLE_RATE as f64
    }
}
