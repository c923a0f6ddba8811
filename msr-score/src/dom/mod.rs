//! The score tree and the operations, that assemble it.
//!
//! Structure, from the top:
//! `Score` → `PartGroup` → `Part` → `Staff` → `Voice` → (`Segment` |
//! `Repeat`) → `Measure` → `MeasureElement`.
//!
//! Segments hold plain measures, multiple measure rests and measure
//! repeats. Repeats hold a common part and endings, both made of
//! segments (and nested repeats).

pub mod arena;
pub mod builder;
pub mod chord;
pub mod element;
pub mod measure;
pub mod measure_repeat;
pub mod multiple_measure_rest;
pub mod note;
pub mod part;
pub mod part_group;
pub mod repeat;
pub mod score;
pub mod segment;
pub mod source_event;
pub mod staff;
pub mod tuplet;
pub mod visitor;
pub mod voice;

pub use arena::{Arena, Handle};
pub use builder::ScoreBuilder;
pub use chord::{chord_append_note, create_chord_for_note, set_chord_members_measure_position, Chord};
pub use element::{
    leaf_notes, ElementHandle, ElementKind, GraceNotesGroup, HasMeasurePosition,
    HasSoundingDuration, HasVoicePosition, MeasureElement,
};
pub use measure::{
    Measure, MeasureEndRegularKind, MeasureImplicitKind, MeasureKind, MeasureRepeatContextKind,
    PuristNumbering, ShortestNote,
};
pub use measure_repeat::{MeasureRepeat, MeasureRepeatMeasures, MeasureRepeatPhase};
pub use multiple_measure_rest::{MultipleMeasureRest, UseSymbolsKind};
pub use note::{Note, NoteKind};
pub use part::Part;
pub use part_group::{PartGroup, PartGroupElement};
pub use repeat::{Repeat, RepeatCommonPart, RepeatEnding, RepeatEndingKind, RepeatPhase};
pub use score::Score;
pub use segment::{Segment, SegmentElement};
pub use source_event::{NoteEvent, SourceEvent, TupletStart};
pub use staff::Staff;
pub use tuplet::{create_tuplet, tuplet_append_member, unapply_sounding_factor_to_members, Tuplet};
pub use visitor::{browse_score, MsrVisitor, NodeRef};
pub use voice::{Voice, VoiceElement, VoiceKind};
