//! Descriptive measure-level elements: clefs, keys, bar lines,
//! directions, harmonies and figured basses.
//!
//! Simple immutable value holders. The measure places them, nothing
//! here knows about positions.

use std::fmt;

use super::Placement;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClefKind {
    Treble,
    Bass,
    Alto,
    Tenor,
    Soprano,
    Percussion,
    Tablature,
    Jianpu,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Clef {
    pub kind: ClefKind,
    pub staff_number: i32,
}
impl Clef {
    pub fn new(kind: ClefKind, staff_number: i32) -> Self {
        Self { kind, staff_number }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyMode {
    #[default]
    Major,
    Minor,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Key {
    /// sharps if positive, flats if negative
    pub fifths: i8,
    pub mode: KeyMode,
}
impl Key {
    pub fn new(fifths: i8, mode: KeyMode) -> Self {
        Self { fifths, mode }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarLineKind {
    Regular,
    Double,
    Final,
    RepeatStart,
    RepeatEnd,
    EndingStart,
    EndingEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WordsStyle {
    #[default]
    Plain,
    Bold,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DalSegnoKind {
    DalSegno,
    DalSegnoAlFine,
    DalSegnoAlCoda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodaKind {
    First,
    Second,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HairpinKind {
    Crescendo,
    Decrescendo,
}

/// Directions, that have no duration of their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Direction {
    Words {
        text: String,
        style: WordsStyle,
        placement: Placement,
    },
    Tempo(String),
    RehearsalMark(String),
    Segno,
    DalSegno {
        kind: DalSegnoKind,
        text: String,
    },
    Coda(CodaKind),
    Hairpin {
        kind: HairpinKind,
        text: String,
    },
}
impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Words { text, .. } => write!(f, "words \"{text}\""),
            Self::Tempo(text) => write!(f, "tempo \"{text}\""),
            Self::RehearsalMark(text) => write!(f, "rehearsal mark \"{text}\""),
            Self::Segno => write!(f, "segno"),
            Self::DalSegno { kind, .. } => write!(f, "{kind:?}"),
            Self::Coda(kind) => write!(f, "coda {kind:?}"),
            Self::Hairpin { kind, .. } => write!(f, "{kind:?}"),
        }
    }
}

/// Chord symbol. Its analysis is somebody else's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harmony {
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiguredBass {
    pub figures: Vec<String>,
}
