//! Tuplets: notes, chords and nested tuplets under an `actual:normal`
//! factor.
//!
//! A member's sounding duration is its display duration multiplied by
//! `normal / actual` of the *effective* factor: the product of the
//! tuplet own factor with the factors of all the tuplets containing it.
//! So a triplet nested in a triplet plays its eighths as `1/8 * 4/9`.

use crate::{
    errors::{MsrError, MsrResult},
    primitives::{TupletFactor, WholeNotes},
};

use super::{
    arena::Arena,
    element::{
        refresh_sounding, ElementHandle, ElementKind, HasSoundingDuration,
        MeasureElement,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuplet {
    number: i32,
    factor: TupletFactor,
    effective: TupletFactor,
    full_elements: usize,
    members: Vec<ElementHandle>,
    member_display: WholeNotes,
}
impl Tuplet {
    /// `full_elements` is the amount of members, after which the tuplet
    /// is filled.
    pub fn new(number: i32, factor: TupletFactor, full_elements: usize) -> Self {
        Self {
            number,
            factor,
            effective: factor,
            full_elements,
            members: Vec::new(),
            member_display: WholeNotes::zero(),
        }
    }
    pub fn number(&self) -> i32 {
        self.number
    }
    pub fn factor(&self) -> TupletFactor {
        self.factor
    }
    /// Own factor composed with all containing tuplets.
    pub fn effective_factor(&self) -> TupletFactor {
        self.effective
    }
    pub(crate) fn set_effective_factor(&mut self, factor: TupletFactor) {
        self.effective = factor;
    }
    pub fn members(&self) -> &[ElementHandle] {
        &self.members
    }
    pub(crate) fn members_mut(&mut self) -> &mut Vec<ElementHandle> {
        &mut self.members
    }
    pub fn full_elements(&self) -> usize {
        self.full_elements
    }
    /// Sum of the members display durations. A nested tuplet counts
    /// for the space it is written in.
    pub fn member_display_whole_notes(&self) -> WholeNotes {
        self.member_display
    }
    pub fn has_been_filled(&self) -> bool {
        self.members.len() >= self.full_elements
    }
}

pub fn create_tuplet(
    arena: &mut Arena<MeasureElement>,
    number: i32,
    factor: TupletFactor,
    full_elements: usize,
    line: usize,
) -> ElementHandle {
    log::debug!("line {line}: creating tuplet {number} {factor}");
    arena.alloc(MeasureElement::new(
        ElementKind::Tuplet(Tuplet::new(number, factor, full_elements)),
        line,
    ))
}

fn display_of(element: &MeasureElement) -> WholeNotes {
    match &element.kind {
        ElementKind::Note(note) => note.display_whole_notes(),
        ElementKind::Chord(chord) => chord.display_whole_notes(),
        // written space of a nested tuplet
        ElementKind::Tuplet(tuplet) => tuplet.factor.apply(tuplet.member_display),
        _ => WholeNotes::zero(),
    }
}

/// Append a note, chord or tuplet to the tuplet.
///
/// Sounding durations of the member (and of the members of a nested
/// tuplet) are recomputed under the tuplet effective factor.
///
/// # Errors
/// `TupletOverfull` if the tuplet has already been filled.
pub fn tuplet_append_member(
    arena: &mut Arena<MeasureElement>,
    tuplet: ElementHandle,
    member: ElementHandle,
) -> MsrResult<()> {
    let line = arena[member].line;
    if !matches!(
        arena[member].kind,
        ElementKind::Note(_) | ElementKind::Chord(_) | ElementKind::Tuplet(_)
    ) {
        return Err(MsrError::unsupported(
            line,
            format!(
                "{} can not be a tuplet member",
                arena[member].kind.name()
            ),
        ));
    }
    let member_display = display_of(&arena[member]);
    let effective = match &mut arena[tuplet].kind {
        ElementKind::Tuplet(data) => {
            if data.has_been_filled() {
                return Err(MsrError::TupletOverfull {
                    line,
                    number: data.number,
                    expected: data.full_elements,
                });
            }
            data.members.push(member);
            data.member_display += member_display;
            data.effective
        }
        kind => {
            return Err(MsrError::unsupported(
                line,
                format!("{} is not a tuplet", kind.name()),
            ))
        }
    };
    arena[member].set_container(Some(tuplet));
    let sounding = refresh_sounding(arena, member, effective);
    let total = arena[tuplet].sounding_whole_notes() + sounding;
    arena[tuplet].set_sounding(total);
    log::debug!("line {line}: appended {} to tuplet", arena[member]);
    Ok(())
}

/// Recompute member durations, once the tuplet became nested into a
/// tuplet with effective factor `containing`.
pub fn unapply_sounding_factor_to_members(
    arena: &mut Arena<MeasureElement>,
    tuplet: ElementHandle,
    containing: TupletFactor,
) -> WholeNotes {
    refresh_sounding(arena, tuplet, containing)
}

/// Replace a member (usually a note, that became a chord).
pub(crate) fn tuplet_replace_member(
    arena: &mut Arena<MeasureElement>,
    tuplet: ElementHandle,
    old: ElementHandle,
    new: ElementHandle,
) -> MsrResult<()> {
    let line = arena[old].line;
    let effective = match &mut arena[tuplet].kind {
        ElementKind::Tuplet(data) => {
            let slot = data
                .members
                .iter_mut()
                .find(|member| **member == old)
                .ok_or_else(|| {
                    MsrError::unsupported(line, "element is not a tuplet member")
                })?;
            *slot = new;
            data.effective
        }
        kind => {
            return Err(MsrError::unsupported(
                line,
                format!("{} is not a tuplet", kind.name()),
            ))
        }
    };
    arena[new].set_container(Some(tuplet));
    refresh_sounding(arena, new, effective);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{create_tuplet, tuplet_append_member};
    use crate::dom::element::ElementHandle;
    use crate::{
        dom::{
            arena::Arena,
            element::{ElementKind, HasSoundingDuration, MeasureElement},
            note::Note,
        },
        errors::MsrError,
        primitives::{NoteName, Pitch, TupletFactor, WholeNotes},
    };

    fn eighth(arena: &mut Arena<MeasureElement>) -> ElementHandle {
        arena.alloc(MeasureElement::new(
            ElementKind::Note(Note::pitched(
                Pitch::natural(NoteName::D, 5),
                WholeNotes::new(1, 8).unwrap(),
            )),
            7,
        ))
    }

    #[test]
    fn triplet() {
        let mut arena = Arena::new();
        let tuplet = create_tuplet(&mut arena, 1, TupletFactor::new(3, 2), 3, 7);
        for _ in 0..3 {
            let note = eighth(&mut arena);
            tuplet_append_member(&mut arena, tuplet, note).unwrap();
        }
        let data = arena[tuplet].as_tuplet().unwrap();
        assert!(data.has_been_filled());
        assert_eq!(data.member_display_whole_notes(), WholeNotes::new(3, 8).unwrap());
        assert_eq!(arena[tuplet].sounding_whole_notes(), WholeNotes::new(1, 4).unwrap());
        let extra = eighth(&mut arena);
        assert!(matches!(
            tuplet_append_member(&mut arena, tuplet, extra),
            Err(MsrError::TupletOverfull { line: 7, number: 1, expected: 3 })
        ));
    }

    #[test]
    fn nested_triplet_takes_its_written_space() {
        let mut arena = Arena::new();
        let outer = create_tuplet(&mut arena, 1, TupletFactor::new(3, 2), 2, 7);
        let first = eighth(&mut arena);
        tuplet_append_member(&mut arena, outer, first).unwrap();
        let inner = create_tuplet(&mut arena, 2, TupletFactor::new(3, 2), 3, 7);
        for _ in 0..3 {
            let note = eighth(&mut arena);
            tuplet_append_member(&mut arena, inner, note).unwrap();
        }
        tuplet_append_member(&mut arena, outer, inner).unwrap();
        let data = arena[outer].as_tuplet().unwrap();
        // an eighth and a triplet written over a quarter
        assert_eq!(data.member_display_whole_notes(), WholeNotes::new(3, 8).unwrap());
        assert_eq!(arena[inner].sounding_whole_notes(), WholeNotes::new(1, 6).unwrap());
        assert_eq!(arena[outer].sounding_whole_notes(), WholeNotes::new(1, 4).unwrap());
    }
}
