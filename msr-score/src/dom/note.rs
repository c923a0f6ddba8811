use std::fmt;

use crate::{
    notation::Attachments,
    primitives::{DurationKind, Pitch, TupletFactor, WholeNotes},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteKind {
    Pitched,
    Unpitched,
    Rest,
    /// Invisible filler, produced by padding and `<forward/>`.
    Skip,
}

/// A single note, rest or skip.
///
/// Display duration is what is written. Sounding duration is derived
/// from it with the effective tuplet factor, and is zero for grace notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub kind: NoteKind,
    pub pitch: Option<Pitch>,
    display: WholeNotes,
    factor: TupletFactor,
    pub grace: bool,
    pub staff: i32,
    pub voice: i32,
    pub attachments: Attachments,
}
impl Note {
    fn new(kind: NoteKind, pitch: Option<Pitch>, display: WholeNotes) -> Self {
        Self {
            kind,
            pitch,
            display,
            factor: TupletFactor::identity(),
            grace: false,
            staff: 1,
            voice: 1,
            attachments: Attachments::new(),
        }
    }
    pub fn pitched(pitch: Pitch, display: WholeNotes) -> Self {
        Self::new(NoteKind::Pitched, Some(pitch), display)
    }
    pub fn unpitched(display: WholeNotes) -> Self {
        Self::new(NoteKind::Unpitched, None, display)
    }
    pub fn rest(display: WholeNotes) -> Self {
        Self::new(NoteKind::Rest, None, display)
    }
    pub fn skip(display: WholeNotes) -> Self {
        Self::new(NoteKind::Skip, None, display)
    }
    pub fn from_kind(
        pitch: Option<Pitch>,
        duration: DurationKind,
        dots: u8,
    ) -> Self {
        let display = duration.with_dots(dots);
        match pitch {
            Some(pitch) => Self::pitched(pitch, display),
            None => Self::rest(display),
        }
    }
    pub fn in_staff(mut self, staff: i32, voice: i32) -> Self {
        self.staff = staff;
        self.voice = voice;
        self
    }
    pub fn as_grace(mut self) -> Self {
        self.grace = true;
        self
    }

    pub fn display_whole_notes(&self) -> WholeNotes {
        self.display
    }
    pub fn tuplet_factor(&self) -> TupletFactor {
        self.factor
    }
    pub(crate) fn set_tuplet_factor(&mut self, factor: TupletFactor) {
        self.factor = factor;
    }
    pub fn sounding_whole_notes(&self) -> WholeNotes {
        match self.grace {
            true => WholeNotes::zero(),
            false => self.factor.apply(self.display),
        }
    }

    pub fn is_rest(&self) -> bool {
        self.kind == NoteKind::Rest
    }
    pub fn is_skip(&self) -> bool {
        self.kind == NoteKind::Skip
    }
    /// Rests are music too: only skips are not.
    pub fn is_audible(&self) -> bool {
        !self.is_skip()
    }
}
impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.pitch) {
            (NoteKind::Pitched, Some(pitch)) => write!(f, "{pitch}")?,
            (NoteKind::Rest, _) => write!(f, "r")?,
            (NoteKind::Skip, _) => write!(f, "s")?,
            _ => write!(f, "x")?,
        }
        write!(f, "[{}]", self.display)?;
        if !self.factor.is_identity() {
            write!(f, "*{}", self.factor)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Note;
    use crate::primitives::{
        DurationKind, NoteName, Pitch, TupletFactor, WholeNotes,
    };

    #[test]
    fn sounding() {
        let mut note = Note::from_kind(
            Some(Pitch::natural(NoteName::C, 4)),
            DurationKind::Eighth,
            0,
        );
        assert_eq!(note.to_string(), "C4[1/8]");
        note.set_tuplet_factor(TupletFactor::new(3, 2));
        assert_eq!(note.sounding_whole_notes(), WholeNotes::new(1, 12).unwrap());
        let grace = note.clone().as_grace();
        assert!(grace.sounding_whole_notes().is_zero());
        assert!(Note::rest(WholeNotes::whole()).is_audible());
        assert!(!Note::skip(WholeNotes::whole()).is_audible());
    }
}
