pub mod accidental;
pub mod pitch_transpose;

pub use accidental::Accidental;
pub use pitch_transpose::{steps_for_semitones, transpose_pitch, transpose_spelling, Spelling};
