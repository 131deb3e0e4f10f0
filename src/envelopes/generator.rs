//! Multi-stage envelope generator with sustain/release semantics.

use crate::core::pitch::ms_to_samples;
use crate::{Error, Result, Signal};

/// One stage of an envelope.
///
/// The generator moves linearly from this stage's `level` to the following
/// stage's level over `duration` samples. A `duration` of zero makes this a
/// sustain stage: its level is held until [`EnvelopeGenerator::release`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeStage {
    pub level: f64,
    pub duration: u32,
}

impl EnvelopeStage {
    /// A timed stage ramping from `level` toward the next stage.
    pub const fn new(level: f64, duration: u32) -> Self {
        Self { level, duration }
    }

    /// A stage that holds `level` until released.
    pub const fn sustain(level: f64) -> Self {
        Self { level, duration: 0 }
    }

    #[inline]
    pub fn is_sustain(&self) -> bool {
        self.duration == 0
    }
}

/// Position inside an envelope.
///
/// Kept as a plain value so the same stage table can be walked by several
/// independent cursors, see [`EnvelopeGenerator::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub stage: usize,
    pub samples_into_stage: u32,
}

impl Cursor {
    /// The first sample of the first stage.
    pub const START: Cursor = Cursor {
        stage: 0,
        samples_into_stage: 0,
    };

    const fn at_stage(stage: usize) -> Self {
        Cursor {
            stage,
            samples_into_stage: 0,
        }
    }
}

/// Stage-sequenced scalar generator.
///
/// The stage table is fixed at construction. The last stage is terminal: once
/// the cursor reaches it the generator is silent and yields `0.0`.
///
/// Every method that works on the owned cursor has a `*_at` twin that takes an
/// explicit [`Cursor`] and returns the new one instead of mutating anything.
///
/// # Examples
///
/// ```
/// use multiengine::envelopes::{EnvelopeGenerator, EnvelopeStage};
///
/// // 0 -> 1 over 4 samples, hold at 1, fall to 0 over 4 samples.
/// let mut env = EnvelopeGenerator::new(vec![
///     EnvelopeStage::new(0.0, 4),
///     EnvelopeStage::sustain(1.0),
///     EnvelopeStage::new(1.0, 4),
///     EnvelopeStage::new(0.0, 0),
/// ])?;
///
/// let attack: Vec<f64> = (0..4).map(|_| env.next()).collect();
/// assert_eq!(attack, vec![0.0, 0.25, 0.5, 0.75]);
/// assert_eq!(env.next(), 1.0);
/// assert_eq!(env.next(), 1.0); // sustaining
///
/// env.release();
/// while !env.is_silent() {
///     env.next();
/// }
/// assert_eq!(env.next(), 0.0);
/// # Ok::<(), multiengine::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct EnvelopeGenerator {
    stages: Box<[EnvelopeStage]>,
    cursor: Cursor,
}

impl EnvelopeGenerator {
    /// Creates a generator from a stage table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEnvelope`] if the table has fewer than 2 stages.
    pub fn new(stages: impl Into<Vec<EnvelopeStage>>) -> Result<Self> {
        let stages = stages.into();
        if stages.len() < 2 {
            return Err(Error::InvalidEnvelope {
                stages: stages.len(),
            });
        }

        Ok(Self {
            stages: stages.into_boxed_slice(),
            cursor: Cursor::START,
        })
    }

    /// Creates a generator from a fixed-size stage table.
    ///
    /// The table length is checked at compile time, so this cannot fail.
    pub fn from_array<const N: usize>(stages: [EnvelopeStage; N]) -> Self {
        const { assert!(N >= 2, "an envelope needs at least 2 stages") };
        Self {
            stages: Box::new(stages),
            cursor: Cursor::START,
        }
    }

    /// Creates a generator from `(level, milliseconds)` pairs.
    ///
    /// A duration that rounds down to zero samples becomes a sustain stage.
    pub fn from_ms(stages: &[(f64, f64)], sample_rate: f64) -> Result<Self> {
        let stages: Vec<EnvelopeStage> = stages
            .iter()
            .map(|&(level, ms)| EnvelopeStage::new(level, ms_to_samples(ms, sample_rate)))
            .collect();
        Self::new(stages)
    }

    pub fn stages(&self) -> &[EnvelopeStage] {
        &self.stages
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Moves the owned cursor, clamping it to the terminal stage.
    pub fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = self.clamp_cursor(cursor);
    }

    /// Sum of all timed stage durations, ignoring sustain stages.
    pub fn total_duration(&self) -> u64 {
        self.stages[..self.terminal()]
            .iter()
            .map(|stage| u64::from(stage.duration))
            .sum()
    }

    #[inline]
    fn terminal(&self) -> usize {
        self.stages.len() - 1
    }

    fn clamp_cursor(&self, cursor: Cursor) -> Cursor {
        if cursor.stage >= self.terminal() {
            Cursor::at_stage(self.terminal())
        } else {
            cursor
        }
    }

    /// Computes the value at `cursor` and the cursor one sample later.
    ///
    /// This is the pure form of [`next`](Self::next).
    pub fn advance(&self, cursor: Cursor) -> (f64, Cursor) {
        let mut cursor = self.clamp_cursor(cursor);
        let terminal = self.terminal();

        if cursor.stage == terminal {
            return (0.0, cursor);
        }

        let stage = self.stages[cursor.stage];
        if stage.is_sustain() {
            return (stage.level, cursor);
        }

        if cursor.samples_into_stage >= stage.duration {
            cursor = Cursor::at_stage(cursor.stage + 1);
            let entered = self.stages[cursor.stage];
            if cursor.stage == terminal || entered.is_sustain() {
                return (entered.level, cursor);
            }
        }

        let value = self.interpolate(cursor);
        cursor.samples_into_stage += 1;
        (value, cursor)
    }

    /// Linear position between the cursor's stage level and the next level.
    ///
    /// Callers guarantee the stage is timed and not terminal.
    #[inline]
    fn interpolate(&self, cursor: Cursor) -> f64 {
        let from = self.stages[cursor.stage];
        let to = self.stages[cursor.stage + 1].level;
        let ratio = f64::from(cursor.samples_into_stage) / f64::from(from.duration);
        from.level + (to - from.level) * ratio
    }

    /// Value the next call to `advance(cursor)` would produce.
    pub fn peek_at(&self, cursor: Cursor) -> f64 {
        self.advance(cursor).0
    }

    /// Cursor after a release issued at `cursor`.
    ///
    /// In a sustain stage the cursor moves to the following stage. Otherwise it
    /// skips past the first sustain stage ahead, or stays put if there is none.
    pub fn release_at(&self, cursor: Cursor) -> Cursor {
        let cursor = self.clamp_cursor(cursor);
        let terminal = self.terminal();

        if cursor.stage == terminal {
            return cursor;
        }

        if self.stages[cursor.stage].is_sustain() {
            return Cursor::at_stage(cursor.stage + 1);
        }

        (cursor.stage + 1..terminal)
            .find(|&index| self.stages[index].is_sustain())
            .map_or(cursor, |index| Cursor::at_stage(index + 1))
    }

    pub fn is_silent_at(&self, cursor: Cursor) -> bool {
        cursor.stage >= self.terminal()
    }

    /// Advances one sample and returns the envelope value.
    #[inline]
    pub fn next(&mut self) -> f64 {
        let (value, cursor) = self.advance(self.cursor);
        self.cursor = cursor;
        value
    }

    /// Returns what [`next`](Self::next) would return, without advancing.
    pub fn peek(&self) -> f64 {
        self.peek_at(self.cursor)
    }

    /// Leaves the current sustain stage, or the first one ahead.
    pub fn release(&mut self) {
        self.cursor = self.release_at(self.cursor);
    }

    /// Restarts from the first stage.
    pub fn reset(&mut self) {
        self.cursor = Cursor::START;
    }

    /// Jumps straight to the terminal stage.
    pub fn stop(&mut self) {
        self.cursor = Cursor::at_stage(self.terminal());
    }

    pub fn is_silent(&self) -> bool {
        self.is_silent_at(self.cursor)
    }
}

impl Signal for EnvelopeGenerator {
    fn next_sample(&mut self) -> f64 {
        self.next()
    }
}
