//! Error types for multiengine.
//!
//! Errors only surface from construction and control-rate calls. Nothing on the
//! per-sample path returns a `Result`.

use thiserror::Error;

/// Result type alias for multiengine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in multiengine.
#[derive(Debug, Error)]
pub enum Error {
    /// An envelope needs at least a start stage and a terminal stage.
    #[error("envelope needs at least 2 stages, got {stages}")]
    InvalidEnvelope { stages: usize },

    /// `update()` was called with a key the engine does not declare.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// Wavetable data with an unusable shape.
    #[error("invalid wavetable: {0}")]
    InvalidWavetable(String),

    /// I/O error while loading a wavetable file.
    #[cfg(feature = "wavetable-loader")]
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WAV decoding error while loading a wavetable file.
    #[cfg(feature = "wavetable-loader")]
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}
