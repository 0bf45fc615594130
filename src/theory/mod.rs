pub mod chord;
pub mod note;
pub mod scale;

// Re-export the main types for convenience
pub use chord::{equivalent, roman_numeral, Chord, Quality};
pub use note::{Accidental, Letter, Note};
pub use scale::{chord_at, scale, Key, Mode, POSITIONS};
