//! Core signal trait.
//!
//! Every per-sample generator in the crate (envelopes, LFOs) implements `Signal`
//! so it can be driven the same way by engines, tests and demos.

/// Common interface for all per-sample generators.
///
/// The trait provides two operations:
/// - Single sample generation via `next_sample()`
/// - Batch generation via `process()`
pub trait Signal {
    /// Generates the next sample.
    fn next_sample(&mut self) -> f64;

    /// Fills a buffer with consecutive samples.
    ///
    /// Default implementation calls `next_sample()` for each element.
    ///
    /// # Arguments
    ///
    /// * `buffer` - Mutable slice to fill with samples
    fn process(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }
}

/// A constant value is the simplest signal.
///
/// # Examples
///
/// ```
/// use multiengine::Signal;
///
/// let mut constant = 0.5_f64;
/// assert_eq!(constant.next_sample(), 0.5);
///
/// let mut buffer = vec![0.0; 4];
/// constant.process(&mut buffer);
/// assert_eq!(buffer, vec![0.5, 0.5, 0.5, 0.5]);
/// ```
impl Signal for f64 {
    fn next_sample(&mut self) -> f64 {
        *self
    }

    fn process(&mut self, buffer: &mut [f64]) {
        buffer.fill(*self);
    }
}
