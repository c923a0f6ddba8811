//! Value types, from which the tree is measured.
//!
//! Every duration is `WholeNotes`, an exact rational. Positions are
//! derived from durations: `MeasurePosition` inside a measure,
//! `VoicePosition` inside a voice. Nothing here knows about the tree.

pub mod fraction_tools;
pub mod pitch;
pub mod position;
pub mod time_signature;
pub mod tuplet_factor;
pub mod whole_notes;

pub use fraction_tools::{
    divisions_per_quarter_note, lcm_of_denominators,
};
pub use pitch::{Accidental, NoteName, Pitch};
pub use position::{MeasurePosition, Moment, Position, VoicePosition};
pub use time_signature::{TimeSignature, TimeSignatureSymbol};
pub use tuplet_factor::TupletFactor;
pub use whole_notes::{DurationKind, WholeNotes};
