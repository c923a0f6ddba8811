//! Positioned elements of a measure.
//!
//! One tagged node type covers everything that can be placed in a
//! measure. What a node can tell about itself is expressed with small
//! capability traits instead of a class hierarchy.
//!
//! Chords, tuplets and grace notes groups hold their members as handles
//! into the same arena. Members point back at their container with a
//! plain handle.

use std::fmt;

use crate::{
    notation::{BarLineKind, Clef, Direction, FiguredBass, Harmony, Key},
    primitives::{
        MeasurePosition, Moment, TimeSignature, TupletFactor, VoicePosition,
        WholeNotes,
    },
};

use super::{
    arena::{Arena, Handle},
    chord::Chord,
    measure::Measure,
    note::Note,
    tuplet::Tuplet,
};

pub type ElementHandle = Handle<MeasureElement>;

pub trait HasMeasurePosition {
    fn measure_position(&self) -> MeasurePosition;
}
pub trait HasVoicePosition {
    fn voice_position(&self) -> VoicePosition;
}
pub trait HasSoundingDuration {
    fn sounding_whole_notes(&self) -> WholeNotes;
}

/// Zero-duration group of grace notes (or grace chords), placed right
/// before the note it ornaments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GraceNotesGroup {
    pub notes: Vec<ElementHandle>,
    pub slashed: bool,
    pub slurred: bool,
    pub beamed: bool,
    /// after-graces trail the last note of the measure.
    pub after: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Note(Note),
    Chord(Chord),
    Tuplet(Tuplet),
    GraceNotesGroup(GraceNotesGroup),
    Clef(Clef),
    Key(Key),
    Time(TimeSignature),
    BarLine(BarLineKind),
    Direction(Direction),
    Harmony { harmony: Harmony, moment: Moment },
    FiguredBass {
        figured_bass: FiguredBass,
        moment: Moment,
    },
    VoiceStaffChange { from: i32, to: i32 },
}
impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Note(_) => "note",
            Self::Chord(_) => "chord",
            Self::Tuplet(_) => "tuplet",
            Self::GraceNotesGroup(_) => "grace notes group",
            Self::Clef(_) => "clef",
            Self::Key(_) => "key",
            Self::Time(_) => "time",
            Self::BarLine(_) => "bar line",
            Self::Direction(_) => "direction",
            Self::Harmony { .. } => "harmony",
            Self::FiguredBass { .. } => "figured bass",
            Self::VoiceStaffChange { .. } => "voice staff change",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureElement {
    pub line: usize,
    measure: Option<Handle<Measure>>,
    container: Option<ElementHandle>,
    measure_position: MeasurePosition,
    voice_position: VoicePosition,
    sounding: WholeNotes,
    pub kind: ElementKind,
}
impl MeasureElement {
    pub fn new(kind: ElementKind, line: usize) -> Self {
        let sounding = match &kind {
            ElementKind::Note(note) => note.sounding_whole_notes(),
            ElementKind::Chord(chord) => chord.display_whole_notes(),
            _ => WholeNotes::zero(),
        };
        Self {
            line,
            measure: None,
            container: None,
            measure_position: MeasurePosition::start(),
            voice_position: VoicePosition::start(),
            sounding,
            kind,
        }
    }

    pub fn measure(&self) -> Option<Handle<Measure>> {
        self.measure
    }
    /// Chord, tuplet or grace notes group holding this element.
    pub fn container(&self) -> Option<ElementHandle> {
        self.container
    }
    pub(crate) fn set_container(&mut self, container: Option<ElementHandle>) {
        self.container = container;
    }
    pub(crate) fn set_sounding(&mut self, sounding: WholeNotes) {
        self.sounding = sounding;
    }

    pub fn as_note(&self) -> Option<&Note> {
        match &self.kind {
            ElementKind::Note(note) => Some(note),
            _ => None,
        }
    }
    pub fn as_note_mut(&mut self) -> Option<&mut Note> {
        match &mut self.kind {
            ElementKind::Note(note) => Some(note),
            _ => None,
        }
    }
    pub fn as_chord(&self) -> Option<&Chord> {
        match &self.kind {
            ElementKind::Chord(chord) => Some(chord),
            _ => None,
        }
    }
    pub fn as_tuplet(&self) -> Option<&Tuplet> {
        match &self.kind {
            ElementKind::Tuplet(tuplet) => Some(tuplet),
            _ => None,
        }
    }

    /// Members in declared order, empty for leaves.
    pub fn children(&self) -> &[ElementHandle] {
        match &self.kind {
            ElementKind::Chord(chord) => chord.notes(),
            ElementKind::Tuplet(tuplet) => tuplet.members(),
            ElementKind::GraceNotesGroup(group) => &group.notes,
            _ => &[],
        }
    }
    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<ElementHandle>> {
        match &mut self.kind {
            ElementKind::Chord(chord) => Some(chord.notes_mut()),
            ElementKind::Tuplet(tuplet) => Some(tuplet.members_mut()),
            ElementKind::GraceNotesGroup(group) => Some(&mut group.notes),
            _ => None,
        }
    }

    /// Whether appending the element makes the measure contain music.
    pub fn is_audible(&self) -> bool {
        match &self.kind {
            ElementKind::Note(note) => note.is_audible(),
            ElementKind::Chord(_)
            | ElementKind::Tuplet(_)
            | ElementKind::Harmony { .. }
            | ElementKind::FiguredBass { .. } => true,
            _ => false,
        }
    }
}
impl HasMeasurePosition for MeasureElement {
    fn measure_position(&self) -> MeasurePosition {
        self.measure_position
    }
}
impl HasVoicePosition for MeasureElement {
    fn voice_position(&self) -> VoicePosition {
        self.voice_position
    }
}
impl HasSoundingDuration for MeasureElement {
    fn sounding_whole_notes(&self) -> WholeNotes {
        self.sounding
    }
}
impl fmt::Display for MeasureElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ElementKind::Note(note) => write!(f, "{note}")?,
            kind => write!(f, "{}", kind.name())?,
        }
        write!(f, " {} (line {})", self.measure_position, self.line)
    }
}

/// Set measure uplink and positions of the element and of all its
/// members: chord and grace notes share the position, tuplet members
/// follow each other.
pub(crate) fn place_element(
    arena: &mut Arena<MeasureElement>,
    handle: ElementHandle,
    measure: Handle<Measure>,
    position: MeasurePosition,
    voice_position: VoicePosition,
) {
    let element = &mut arena[handle];
    element.measure = Some(measure);
    element.measure_position = position;
    element.voice_position = voice_position;
    let sequential = matches!(element.kind, ElementKind::Tuplet(_));
    let children = element.children().to_vec();
    let mut offset = WholeNotes::zero();
    for child in children {
        place_element(
            arena,
            child,
            measure,
            position + offset,
            voice_position + offset,
        );
        if sequential {
            offset += arena[child].sounding;
        }
    }
}

/// Recompute the sounding duration of the element and its members,
/// given the factor of the tuplets containing it.
///
/// # Returns
/// New sounding duration of the element.
pub(crate) fn refresh_sounding(
    arena: &mut Arena<MeasureElement>,
    handle: ElementHandle,
    containing: TupletFactor,
) -> WholeNotes {
    let children = arena[handle].children().to_vec();
    let current = arena[handle].sounding;
    let sounding = match &mut arena[handle].kind {
        ElementKind::Note(note) => {
            note.set_tuplet_factor(containing);
            note.sounding_whole_notes()
        }
        ElementKind::Chord(chord) => {
            let display = chord.display_whole_notes();
            for note in children {
                refresh_sounding(arena, note, containing);
            }
            containing.apply(display)
        }
        ElementKind::Tuplet(tuplet) => {
            let effective = tuplet.factor().compose(&containing);
            tuplet.set_effective_factor(effective);
            children
                .into_iter()
                .map(|member| refresh_sounding(arena, member, effective))
                .sum()
        }
        _ => current,
    };
    arena[handle].sounding = sounding;
    sounding
}

/// All notes reachable from the element, depth first.
pub fn leaf_notes(
    arena: &Arena<MeasureElement>,
    handle: ElementHandle,
) -> Vec<ElementHandle> {
    match &arena[handle].kind {
        ElementKind::Note(_) => vec![handle],
        _ => arena[handle]
            .children()
            .iter()
            .flat_map(|child| leaf_notes(arena, *child))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::{leaf_notes, ElementKind, HasSoundingDuration, MeasureElement};
    use crate::{
        dom::{arena::Arena, note::Note},
        notation::{Clef, ClefKind},
        primitives::{NoteName, Pitch, WholeNotes},
    };

    #[test]
    fn audible() {
        let quarter = WholeNotes::new(1, 4).unwrap();
        let note = MeasureElement::new(
            ElementKind::Note(Note::pitched(Pitch::natural(NoteName::A, 4), quarter)),
            10,
        );
        assert!(note.is_audible());
        assert_eq!(note.sounding_whole_notes(), quarter);
        let clef = MeasureElement::new(
            ElementKind::Clef(Clef::new(ClefKind::Bass, 2)),
            11,
        );
        assert!(!clef.is_audible());
        assert!(clef.sounding_whole_notes().is_zero());
        let mut arena = Arena::new();
        let handle = arena.alloc(note);
        assert_eq!(leaf_notes(&arena, handle), vec![handle]);
    }
}
