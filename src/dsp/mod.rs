//! DSP primitives consumed by the voice engines.
//!
//! Each primitive is driven one sample at a time and never allocates once
//! constructed:
//! - [`Filter`] / [`MultiModeFilter`] - low-pass/high-pass biquad
//! - [`EffectsChain`] / [`MultiFx`] - delay, distortion, bitcrusher, tremolo
//! - [`WaveOscillator`] - morphable analytic waveforms
//! - [`WavetableBank`] - multi-frame wavetable with morphing
//! - [`Lfo`] - modulation source

mod effects;
mod filter;
mod lfo;
mod oscillator;
mod wavetable;

pub use effects::{EffectsChain, FxType, MultiFx};
pub use filter::{Filter, FilterMode, MultiModeFilter};
pub use lfo::{Lfo, LfoShape};
pub use oscillator::{REFERENCE_HZ, WaveOscillator, WaveShape};
pub use wavetable::{BuiltinBank, FRAME_COUNT, FRAME_LEN, WavetableBank};
