//! Multiengine - real-time voice engines for a multi-engine synthesizer
//!
//! This library provides a stage-sequenced envelope generator, the DSP primitives
//! the engines are built from, and two voice engines: a four-voice chord engine and
//! a single-voice wavetable engine.

pub mod core;
pub mod dsp;
#[cfg(feature = "engines")]
pub mod engine;
pub mod envelopes;
mod error;
pub mod status;

// Re-export commonly used types at the crate root
pub use self::core::{AudioSignal, Signal};
#[cfg(feature = "engines")]
pub use engine::{ChordEngine, EngineBase, ParamSpec, VoiceEngine, WavetableEngine};
pub use envelopes::{Cursor, EnvelopeGenerator, EnvelopeStage};
pub use error::{Error, Result};

#[cfg(feature = "macros")]
pub use multiengine_macros::note;
