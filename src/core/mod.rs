//! Core signal processing types and traits.
//!
//! This module provides the fundamental abstractions shared by the envelopes,
//! DSP primitives and voice engines:
//! - `Signal` trait for anything that yields one sample per call
//! - `AudioSignal` trait for sample-rate-aware signals
//! - pitch helpers for converting MIDI notes and semitone offsets to frequencies

mod audio;
pub mod pitch;
mod signal;

pub use audio::AudioSignal;
pub use signal::Signal;
