//! Events of the source document, in the order the front-end reads them.

use crate::{
    notation::{
        Attachment, Attachments, BarLineKind, Clef, Direction, FiguredBass, Harmony, Key,
        Placement,
    },
    primitives::{DurationKind, Pitch, TimeSignature, TupletFactor, WholeNotes},
};

use super::{measure::MeasureImplicitKind, multiple_measure_rest::UseSymbolsKind, repeat::RepeatEndingKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupletStart {
    pub number: i32,
    pub factor: TupletFactor,
    /// Members count, when the tuplet is filled.
    pub full_elements: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteEvent {
    /// `None` for rests and unpitched notes.
    pub pitch: Option<Pitch>,
    pub unpitched: bool,
    pub duration: DurationKind,
    pub dots: u8,
    pub staff: i32,
    pub voice: i32,
    /// Sounds together with the previous note.
    pub chord: bool,
    pub grace: bool,
    /// Outer first.
    pub tuplet_starts: Vec<TupletStart>,
    /// Inner first.
    pub tuplet_stops: Vec<i32>,
    pub attachments: Attachments,
}
impl NoteEvent {
    pub fn new(pitch: Option<Pitch>, duration: DurationKind) -> Self {
        Self {
            pitch,
            unpitched: false,
            duration,
            dots: 0,
            staff: 1,
            voice: 1,
            chord: false,
            grace: false,
            tuplet_starts: Vec::new(),
            tuplet_stops: Vec::new(),
            attachments: Attachments::new(),
        }
    }
    pub fn rest(duration: DurationKind) -> Self {
        Self::new(None, duration)
    }
    pub fn unpitched(duration: DurationKind) -> Self {
        Self {
            unpitched: true,
            ..Self::new(None, duration)
        }
    }
    pub fn dotted(mut self, dots: u8) -> Self {
        self.dots = dots;
        self
    }
    pub fn in_voice(mut self, staff: i32, voice: i32) -> Self {
        self.staff = staff;
        self.voice = voice;
        self
    }
    pub fn in_chord(mut self) -> Self {
        self.chord = true;
        self
    }
    pub fn as_grace(mut self) -> Self {
        self.grace = true;
        self
    }
    pub fn starting_tuplet(
        mut self,
        number: i32,
        actual: u64,
        normal: u64,
        full_elements: usize,
    ) -> Self {
        self.tuplet_starts.push(TupletStart {
            number,
            factor: TupletFactor::new(actual, normal),
            full_elements,
        });
        self
    }
    pub fn stopping_tuplet(mut self, number: i32) -> Self {
        self.tuplet_stops.push(number);
        self
    }
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    PartGroupStart {
        number: i32,
        name: String,
    },
    PartGroupStop {
        number: i32,
    },
    PartStart {
        id: String,
        name: String,
    },
    PartEnd,
    MeasureStart {
        number: String,
        implicit: MeasureImplicitKind,
    },
    MeasureEnd,
    Note(NoteEvent),
    Backup(WholeNotes),
    Forward {
        duration: WholeNotes,
        staff: i32,
        voice: i32,
    },
    Clef(Clef),
    Key(Key),
    Time(TimeSignature),
    BarLine(BarLineKind),
    RepeatStart,
    RepeatEnd {
        times: u32,
    },
    EndingStart {
        number: String,
    },
    EndingEnd {
        number: String,
        kind: RepeatEndingKind,
    },
    MultipleRestStart {
        measures: usize,
        use_symbols: UseSymbolsKind,
    },
    MeasureRepeatStart {
        measures: usize,
        slashes: u32,
    },
    MeasureRepeatStop,
    Words {
        text: String,
        placement: Placement,
        staff: i32,
        voice: i32,
    },
    Direction {
        direction: Direction,
        staff: i32,
        voice: i32,
    },
    Harmony {
        harmony: Harmony,
        offset: WholeNotes,
    },
    FiguredBass {
        figured_bass: FiguredBass,
        offset: WholeNotes,
    },
}
impl SourceEvent {
    pub fn measure(number: impl Into<String>) -> Self {
        Self::MeasureStart {
            number: number.into(),
            implicit: MeasureImplicitKind::No,
        }
    }
    pub fn part(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::PartStart {
            id: id.into(),
            name: name.into(),
        }
    }
}
