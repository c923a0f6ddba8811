//! Simultaneous notes, sharing one position and one display duration.
//!
//! Notes arrive one by one. The first member gives its promotable
//! attachments to the chord, later members only lose the duplicates of
//! what the chord already carries.

use crate::{
    errors::{MsrError, MsrResult},
    notation::{AttachmentKind, Attachments, PromotesToChord},
    primitives::{MeasurePosition, VoicePosition, WholeNotes},
};

use super::{
    arena::Arena,
    element::{
        place_element, ElementHandle, ElementKind, HasSoundingDuration,
        MeasureElement,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    notes: Vec<ElementHandle>,
    display: WholeNotes,
    pub attachments: Attachments,
}
impl Chord {
    pub fn new(display: WholeNotes) -> Self {
        Self {
            notes: Vec::new(),
            display,
            attachments: Attachments::new(),
        }
    }
    pub fn notes(&self) -> &[ElementHandle] {
        &self.notes
    }
    pub(crate) fn notes_mut(&mut self) -> &mut Vec<ElementHandle> {
        &mut self.notes
    }
    pub fn display_whole_notes(&self) -> WholeNotes {
        self.display
    }
}

/// Kinds, that are handed from the first member to the chord, in the
/// order they are copied.
const PROMOTED_KINDS: [AttachmentKind; 12] = [
    AttachmentKind::Beam,
    AttachmentKind::Articulation,
    AttachmentKind::Dynamic,
    AttachmentKind::Words,
    AttachmentKind::Tie,
    AttachmentKind::Slur,
    AttachmentKind::Ligature,
    AttachmentKind::Pedal,
    AttachmentKind::Technical,
    AttachmentKind::Ornament,
    AttachmentKind::Glissando,
    AttachmentKind::Slide,
];

/// Allocate an empty chord with the display duration of `note`.
pub fn create_chord_for_note(
    arena: &mut Arena<MeasureElement>,
    note: ElementHandle,
) -> MsrResult<ElementHandle> {
    let element = &arena[note];
    let line = element.line;
    let display = element
        .as_note()
        .ok_or_else(|| {
            MsrError::unsupported(
                line,
                format!("can not make a chord of {}", element.kind.name()),
            )
        })?
        .display_whole_notes();
    Ok(arena.alloc(MeasureElement::new(
        ElementKind::Chord(Chord::new(display)),
        line,
    )))
}

/// Add a member note to the chord.
///
/// The first member's attachments of promotable kinds move to the chord.
/// For the next members duplicates of the chord attachments are dropped.
pub fn chord_append_note(
    arena: &mut Arena<MeasureElement>,
    chord: ElementHandle,
    note: ElementHandle,
) -> MsrResult<()> {
    let line = arena[note].line;
    let Some(note_display) =
        arena[note].as_note().map(|n| n.display_whole_notes())
    else {
        return Err(MsrError::unsupported(
            line,
            format!(
                "only notes can be chord members, got {}",
                arena[note].kind.name()
            ),
        ));
    };
    let (chord_display, first_member) = match arena[chord].as_chord() {
        Some(chord_data) => {
            (chord_data.display, chord_data.notes.is_empty())
        }
        None => {
            return Err(MsrError::unsupported(
                arena[chord].line,
                format!("{} is not a chord", arena[chord].kind.name()),
            ))
        }
    };
    if note_display != chord_display {
        log::warn!(
            "line {line}: chord member duration {note_display} differs from \
            chord duration {chord_display}"
        );
    }
    if first_member {
        let sounding = arena[note].sounding_whole_notes();
        arena[chord].set_sounding(sounding);
    }
    let mut note_attachments = arena[note]
        .as_note_mut()
        .map(|n| std::mem::take(&mut n.attachments))
        .unwrap_or_default();
    if let ElementKind::Chord(chord_data) = &mut arena[chord].kind {
        match first_member {
            true => {
                for kind in PROMOTED_KINDS {
                    copy_note_attachments_to_chord(
                        &mut note_attachments,
                        &mut chord_data.attachments,
                        kind,
                    );
                }
            }
            false => remove_chord_duplicates(
                &mut note_attachments,
                &chord_data.attachments,
            ),
        }
        chord_data.notes.push(note);
    }
    let member = &mut arena[note];
    member.set_container(Some(chord));
    if let Some(note) = member.as_note_mut() {
        note.attachments = note_attachments;
    }
    log::debug!("line {line}: note appended to chord");
    Ok(())
}

/// Move every attachment of `kind` from the note to the chord.
fn copy_note_attachments_to_chord(
    note: &mut Attachments,
    chord: &mut Attachments,
    kind: AttachmentKind,
) {
    for attachment in note.take_kind(kind) {
        debug_assert!(attachment.promotes_to_chord());
        chord.push_unique(attachment);
    }
}

fn remove_chord_duplicates(note: &mut Attachments, chord: &Attachments) {
    note.retain(|at| !(at.promotes_to_chord() && chord.contains(at)));
}

/// Give every member the position of the chord.
pub fn set_chord_members_measure_position(
    arena: &mut Arena<MeasureElement>,
    chord: ElementHandle,
    position: MeasurePosition,
    voice_position: VoicePosition,
) {
    if let Some(measure) = arena[chord].measure() {
        place_element(arena, chord, measure, position, voice_position);
    }
}
