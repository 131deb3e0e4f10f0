//! Pitch conversions shared by the engines.

/// Converts a (possibly fractional) MIDI note number to a frequency in Hz.
///
/// Uses equal temperament with A4 (note 69) at 440 Hz.
///
/// # Examples
///
/// ```
/// use multiengine::core::pitch::midi_to_hz;
///
/// assert!((midi_to_hz(69.0) - 440.0).abs() < 1e-9);
/// assert!((midi_to_hz(60.0) - 261.63).abs() < 0.01);
/// ```
pub fn midi_to_hz(note: f64) -> f64 {
    440.0 * semitone_ratio(note - 69.0)
}

/// Returns the frequency ratio of an interval given in semitones.
///
/// # Examples
///
/// ```
/// use multiengine::core::pitch::semitone_ratio;
///
/// assert_eq!(semitone_ratio(12.0), 2.0);
/// assert_eq!(semitone_ratio(0.0), 1.0);
/// ```
pub fn semitone_ratio(semitones: f64) -> f64 {
    2.0_f64.powf(semitones / 12.0)
}

/// Converts a duration in milliseconds to a whole number of samples.
///
/// Negative and non-finite durations yield zero.
pub fn ms_to_samples(ms: f64, sample_rate: f64) -> u32 {
    let samples = ms * 0.001 * sample_rate;
    if samples.is_finite() && samples > 0.0 {
        samples.min(u32::MAX as f64) as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_reference_points() {
        assert!((midi_to_hz(69.0) - 440.0).abs() < 1e-9);
        assert!((midi_to_hz(57.0) - 220.0).abs() < 1e-9);
        assert!((midi_to_hz(81.0) - 880.0).abs() < 1e-9);
    }

    #[test]
    fn test_semitone_ratio_fifth() {
        assert!((semitone_ratio(7.0) - 1.498_307).abs() < 1e-6);
    }

    #[test]
    fn test_ms_to_samples() {
        assert_eq!(ms_to_samples(150.0, 44100.0), 6615);
        assert_eq!(ms_to_samples(1000.0, 48000.0), 48000);
        assert_eq!(ms_to_samples(0.0, 44100.0), 0);
        assert_eq!(ms_to_samples(-5.0, 44100.0), 0);
        assert_eq!(ms_to_samples(f64::NAN, 44100.0), 0);
    }
}
