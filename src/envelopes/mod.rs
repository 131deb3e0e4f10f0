//! Stage-sequenced envelope generation.
//!
//! An envelope is a list of [`EnvelopeStage`]s, each naming a level and how many
//! samples it takes to move from that level to the next stage's level. A stage
//! with a duration of zero is a sustain stage and holds until released.

mod generator;

pub use generator::{Cursor, EnvelopeGenerator, EnvelopeStage};
