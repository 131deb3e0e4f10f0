//! Voice engines.
//!
//! An engine turns note events and parameter updates into one output sample
//! per tick. The host owns a buffer with one slot per track; each engine writes
//! only the slot addressed by its [`EngineBase::track`].
//!
//! ```
//! use multiengine::engine::{ChordEngine, VoiceEngine, WavetableEngine};
//!
//! let mut engines: Vec<Box<dyn VoiceEngine<44100>>> = vec![
//!     Box::new(ChordEngine::<44100>::new().with_track(0)),
//!     Box::new(WavetableEngine::<44100>::new().with_track(1)),
//! ];
//!
//! let mut buffer = [0.0; 2];
//! for engine in engines.iter_mut() {
//!     engine.note_on(60, 1.0);
//! }
//! for _ in 0..4410 {
//!     for engine in engines.iter_mut() {
//!         engine.tick(&mut buffer);
//!     }
//! }
//! assert!(buffer.iter().any(|&s| s != 0.0));
//! ```

mod base;
mod chord;
mod params;
mod wavetable;

pub use base::{ATTACK, DECLICK_SAMPLES, DEFAULT_ATTACK_MS, DEFAULT_RELEASE_MS, EngineBase, RELEASE};
pub use chord::{CHORD_TABLE, ChordEngine, ChordType, SubVoice};
pub use params::ParamSpec;
pub use wavetable::{WavetableEngine, anti_alias_cutoff};

use crate::Result;

/// Contract between a host and a synthesis engine running at `SAMPLE_RATE`.
///
/// `note_on`, `note_off` and `sample` run on the audio thread and never
/// allocate. `update` is the control-rate entry point for parameter changes.
/// The trait is object safe, so hosts can mix engines as
/// `Box<dyn VoiceEngine<SAMPLE_RATE>>`.
pub trait VoiceEngine<const SAMPLE_RATE: u32> {
    /// Short display name.
    fn name(&self) -> &'static str;

    /// Starts (or glides to) `note` at `velocity` (0.0 to 1.0).
    fn note_on(&mut self, note: u8, velocity: f64);

    /// Ends one held note. The amplitude envelope is released once every
    /// held note has been let go.
    fn note_off(&mut self, note: u8, velocity: f64);

    /// Writes one sample into this engine's buffer slot.
    ///
    /// With `envelope_amplitude == 0.0` the oscillators and filter are skipped
    /// but the slot content still runs through the effects so tails ring out.
    fn sample(&mut self, buffer: &mut [f64], envelope_amplitude: f64);

    /// Applies a parameter change, clamping `value` into the declared range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownParameter`](crate::Error::UnknownParameter) if
    /// the engine declares no parameter named `key`.
    fn update(&mut self, key: &str, value: f64) -> Result<()>;

    /// Parameters this engine accepts.
    fn params(&self) -> &'static [ParamSpec];

    /// Current value of a declared parameter.
    fn param(&self, key: &str) -> Option<f64>;

    fn base(&self) -> &EngineBase<SAMPLE_RATE>;

    fn base_mut(&mut self) -> &mut EngineBase<SAMPLE_RATE>;

    /// True once the amplitude envelope has finished.
    fn is_silent(&self) -> bool {
        self.base().is_silent()
    }

    /// Advances the amplitude envelope and renders one sample.
    fn tick(&mut self, buffer: &mut [f64]) {
        let amp = self.base_mut().next_amp();
        self.sample(buffer, amp);
    }
}
