use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NoteName {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}
impl NoteName {
    fn semitones(&self) -> i32 {
        match self {
            Self::C => 0,
            Self::D => 2,
            Self::E => 4,
            Self::F => 5,
            Self::G => 7,
            Self::A => 9,
            Self::B => 11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Accidental {
    DoubleFlat,
    Flat,
    #[default]
    Natural,
    Sharp,
    DoubleSharp,
}
impl Accidental {
    fn alteration(&self) -> i32 {
        match self {
            Self::DoubleFlat => -2,
            Self::Flat => -1,
            Self::Natural => 0,
            Self::Sharp => 1,
            Self::DoubleSharp => 2,
        }
    }
}

/// Spelled pitch, as the front-end delivered it.
///
/// No spelling or respelling is done here: pitch is an opaque payload
/// of the notes, used for equality and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pitch {
    pub name: NoteName,
    pub accidental: Accidental,
    /// octave 4 holds middle C
    pub octave: i8,
}
impl Pitch {
    pub fn new(name: NoteName, accidental: Accidental, octave: i8) -> Self {
        Self {
            name,
            accidental,
            octave,
        }
    }
    pub fn natural(name: NoteName, octave: i8) -> Self {
        Self::new(name, Accidental::Natural, octave)
    }

    pub fn midi(&self) -> i32 {
        (self.octave as i32 + 1) * 12
            + self.name.semitones()
            + self.accidental.alteration()
    }
}
impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let accidental = match self.accidental {
            Accidental::DoubleFlat => "bb",
            Accidental::Flat => "b",
            Accidental::Natural => "",
            Accidental::Sharp => "#",
            Accidental::DoubleSharp => "x",
        };
        write!(f, "{:?}{}{}", self.name, accidental, self.octave)
    }
}

#[cfg(test)]
mod tests {
    use super::{Accidental, NoteName, Pitch};

    #[test]
    fn midi_numbers() {
        assert_eq!(Pitch::natural(NoteName::C, 4).midi(), 60);
        let es = Pitch::new(NoteName::E, Accidental::Flat, 5);
        assert_eq!(es.midi(), 75);
        assert_eq!(es.to_string(), "Eb5");
    }
}
