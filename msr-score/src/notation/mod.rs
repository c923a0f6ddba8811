//! Leaf descriptive elements, that hang on positioned nodes.

pub mod attachments;
pub mod directions;

pub use attachments::{Attachment, AttachmentKind, Attachments, Placement};
pub use directions::{
    BarLineKind, Clef, ClefKind, CodaKind, DalSegnoKind, Direction,
    FiguredBass, HairpinKind, Harmony, Key, KeyMode, WordsStyle,
};

/// Way to decide, whether a note attachment moves to the chord, when
/// the note becomes a chord member.
///
/// If true → it is carried by the chord once, instead of being
/// duplicated on every member note.
pub trait PromotesToChord {
    fn promotes_to_chord(&self) -> bool;
}
