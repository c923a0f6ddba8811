//! Measure contains the positioned elements of one voice.
//!
//! Elements are appended at the cursor, which then advances by their
//! sounding duration. `backup_to` rewinds the cursor: elements appended
//! below the already reached position wait in a pending list, and are
//! merged by position once the cursor catches up again (or at
//! finalization). So the elements list is always ordered by position.
//!
//! The measure kind and the purist number are assigned once, by
//! `finalize`, when all the elements are known.
//!
//! # Example
//!
//! ```
//! use msr_score::dom::{
//!     Arena, ElementKind, Measure, MeasureElement, MeasureKind, Note,
//!     PuristNumbering,
//! };
//! use msr_score::primitives::WholeNotes;
//!
//! let mut elements = Arena::new();
//! let mut measures = Arena::new();
//! let half = WholeNotes::new(1, 2).unwrap();
//! let measure = measures.alloc_with(|h| Measure::new(h, "1", 1, 1));
//! measures[measure].set_full_duration(Some(WholeNotes::whole()));
//! for _ in 0..2 {
//!     let note = elements.alloc(MeasureElement::new(
//!         ElementKind::Note(Note::rest(half)),
//!         2,
//!     ));
//!     measures[measure].append(&mut elements, note).unwrap();
//! }
//! let kind = measures[measure]
//!     .finalize(&mut elements, &mut PuristNumbering::new(), false, 3)
//!     .unwrap();
//! assert_eq!(kind, MeasureKind::Regular);
//! assert_eq!(measures[measure].purist_number(), Some(1));
//! ```

use std::fmt;

use itertools::Itertools;

use crate::{
    errors::{MsrError, MsrResult},
    primitives::{
        MeasurePosition, Position, TupletFactor, VoicePosition, WholeNotes,
    },
};

use super::{
    arena::{Arena, Handle},
    element::{
        leaf_notes, place_element, ElementHandle, ElementKind,
        HasMeasurePosition, HasSoundingDuration, HasVoicePosition,
        MeasureElement,
    },
    note::Note,
    segment::Segment,
    voice::Voice,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeasureKind {
    /// Not finalized yet.
    #[default]
    Unknown,
    Regular,
    Anacrusis,
    IncompleteStandalone,
    IncompleteLastMeasure,
    IncompleteLastInRepeatCommonPart,
    IncompleteLastInRepeatHookedEnding,
    IncompleteLastInRepeatHooklessEnding,
    IncompleteNextAfterCommonPart,
    IncompleteNextAfterHookedEnding,
    IncompleteNextAfterHooklessEnding,
    Overcomplete,
    Cadenza,
    MusicallyEmpty,
}
impl MeasureKind {
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Self::IncompleteStandalone
                | Self::IncompleteLastMeasure
                | Self::IncompleteLastInRepeatCommonPart
                | Self::IncompleteLastInRepeatHookedEnding
                | Self::IncompleteLastInRepeatHooklessEnding
                | Self::IncompleteNextAfterCommonPart
                | Self::IncompleteNextAfterHookedEnding
                | Self::IncompleteNextAfterHooklessEnding
        )
    }
}

/// MusicXML `implicit` attribute: the measure is not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeasureImplicitKind {
    Yes,
    #[default]
    No,
}

/// Whether the measure ends where a regular measure would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeasureEndRegularKind {
    #[default]
    Unknown,
    Yes,
    No,
}

/// Place of the measure relative to repeat boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MeasureRepeatContextKind {
    #[default]
    None,
    CommonPartLastMeasure,
    HookedEndingLastMeasure,
    HooklessEndingLastMeasure,
    NextMeasureAfterCommonPart,
    NextMeasureAfterHookedEnding,
    NextMeasureAfterHooklessEnding,
}
impl MeasureRepeatContextKind {
    fn incomplete_kind(&self) -> Option<MeasureKind> {
        match self {
            Self::None => None,
            Self::CommonPartLastMeasure => {
                Some(MeasureKind::IncompleteLastInRepeatCommonPart)
            }
            Self::HookedEndingLastMeasure => {
                Some(MeasureKind::IncompleteLastInRepeatHookedEnding)
            }
            Self::HooklessEndingLastMeasure => {
                Some(MeasureKind::IncompleteLastInRepeatHooklessEnding)
            }
            Self::NextMeasureAfterCommonPart => {
                Some(MeasureKind::IncompleteNextAfterCommonPart)
            }
            Self::NextMeasureAfterHookedEnding => {
                Some(MeasureKind::IncompleteNextAfterHookedEnding)
            }
            Self::NextMeasureAfterHooklessEnding => {
                Some(MeasureKind::IncompleteNextAfterHooklessEnding)
            }
        }
    }
}

/// Shortest sounding note seen, with the tuplet factor it was played
/// under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortestNote {
    pub sounding: WholeNotes,
    pub factor: TupletFactor,
}
impl ShortestNote {
    /// Keep the shorter one.
    pub fn merged(current: Option<Self>, candidate: Self) -> Self {
        match current {
            Some(current) if current.sounding <= candidate.sounding => current,
            _ => candidate,
        }
    }
}

/// Purist measure numbers counter of one voice.
///
/// Anacrusis is 0. A measure, that does not end where a regular measure
/// would, shares its purist number with the next one, until together
/// they fill a full measure. Every repeat ending restarts numbering from
/// the value it had, when the first ending began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuristNumbering {
    next: i32,
    run: WholeNotes,
    ending_restart: Option<(i32, WholeNotes)>,
}
impl PuristNumbering {
    pub fn new() -> Self {
        Self {
            next: 1,
            run: WholeNotes::zero(),
            ending_restart: None,
        }
    }
    pub fn next_number(&self) -> i32 {
        self.next
    }

    pub fn start_ending(&mut self) {
        match self.ending_restart {
            None => self.ending_restart = Some((self.next, self.run)),
            Some((next, run)) => {
                self.next = next;
                self.run = run;
            }
        }
    }
    pub fn end_repeat(&mut self) {
        self.ending_restart = None;
    }

    fn assign(
        &mut self,
        kind: MeasureKind,
        duration: WholeNotes,
        full: Option<WholeNotes>,
    ) -> (i32, MeasureEndRegularKind) {
        if kind == MeasureKind::Anacrusis {
            self.run = WholeNotes::zero();
            return (0, MeasureEndRegularKind::Yes);
        }
        let number = self.next;
        let ends_regular = match kind.is_incomplete() {
            false => true,
            true => {
                self.run += duration;
                full.map(|full| self.run >= full).unwrap_or(true)
            }
        };
        match ends_regular {
            true => {
                self.next += 1;
                self.run = WholeNotes::zero();
                (number, MeasureEndRegularKind::Yes)
            }
            false => (number, MeasureEndRegularKind::No),
        }
    }
}
impl Default for PuristNumbering {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Measure {
    handle: Handle<Measure>,
    number: String,
    pub line: usize,
    ordinal: usize,
    voice: Option<Handle<Voice>>,
    segment: Option<Handle<Segment>>,
    next_number: Option<String>,
    purist: Option<i32>,
    kind: MeasureKind,
    implicit: MeasureImplicitKind,
    end_regular: MeasureEndRegularKind,
    repeat_context: MeasureRepeatContextKind,
    first_in_voice: bool,
    contains_music: bool,
    finalized: bool,
    elements: Vec<ElementHandle>,
    pending: Vec<ElementHandle>,
    cursor: MeasurePosition,
    accumulated: WholeNotes,
    full_duration: Option<WholeNotes>,
    voice_position: VoicePosition,
    shortest: Option<ShortestNote>,
}
impl Measure {
    pub fn new(
        handle: Handle<Measure>,
        number: impl Into<String>,
        ordinal: usize,
        line: usize,
    ) -> Self {
        Self {
            handle,
            number: number.into(),
            line,
            ordinal,
            voice: None,
            segment: None,
            next_number: None,
            purist: None,
            kind: MeasureKind::Unknown,
            implicit: MeasureImplicitKind::No,
            end_regular: MeasureEndRegularKind::Unknown,
            repeat_context: MeasureRepeatContextKind::None,
            first_in_voice: false,
            contains_music: false,
            finalized: false,
            elements: Vec::new(),
            pending: Vec::new(),
            cursor: MeasurePosition::start(),
            accumulated: WholeNotes::zero(),
            full_duration: None,
            voice_position: VoicePosition::start(),
            shortest: None,
        }
    }

    pub fn handle(&self) -> Handle<Measure> {
        self.handle
    }
    pub fn number(&self) -> &str {
        &self.number
    }
    /// Position in the voice, starting from 1.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
    pub fn purist_number(&self) -> Option<i32> {
        self.purist
    }
    pub fn kind(&self) -> MeasureKind {
        self.kind
    }
    pub fn implicit(&self) -> MeasureImplicitKind {
        self.implicit
    }
    pub fn end_regular(&self) -> MeasureEndRegularKind {
        self.end_regular
    }
    pub fn repeat_context(&self) -> MeasureRepeatContextKind {
        self.repeat_context
    }
    pub fn is_first_in_voice(&self) -> bool {
        self.first_in_voice
    }
    pub fn contains_music(&self) -> bool {
        self.contains_music
    }
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
    pub fn voice(&self) -> Option<Handle<Voice>> {
        self.voice
    }
    pub fn segment(&self) -> Option<Handle<Segment>> {
        self.segment
    }
    pub fn next_number(&self) -> Option<&str> {
        self.next_number.as_deref()
    }
    /// Elements ordered by position. Pending elements are not included
    /// until they are merged.
    pub fn elements(&self) -> &[ElementHandle] {
        &self.elements
    }
    pub fn has_pending_elements(&self) -> bool {
        !self.pending.is_empty()
    }
    pub fn cursor(&self) -> MeasurePosition {
        self.cursor
    }
    /// The farthest position reached, i.e. the measure actual duration.
    pub fn accumulated_whole_notes(&self) -> WholeNotes {
        self.accumulated
    }
    /// Duration of a full measure under the active time signature.
    pub fn full_duration(&self) -> Option<WholeNotes> {
        self.full_duration
    }
    pub fn shortest_note(&self) -> Option<ShortestNote> {
        self.shortest
    }

    pub fn set_full_duration(&mut self, full_duration: Option<WholeNotes>) {
        self.full_duration = full_duration;
    }
    pub fn set_implicit(&mut self, implicit: MeasureImplicitKind) {
        self.implicit = implicit;
    }
    pub fn set_repeat_context(&mut self, context: MeasureRepeatContextKind) {
        log::debug!("measure {}: repeat context {context:?}", self.number);
        self.repeat_context = context;
    }
    pub fn set_next_number(&mut self, number: impl Into<String>) {
        self.next_number = Some(number.into());
    }
    pub(crate) fn set_first_in_voice(&mut self, first: bool) {
        self.first_in_voice = first;
    }
    pub(crate) fn set_voice(&mut self, voice: Handle<Voice>) {
        self.voice = Some(voice);
    }
    pub(crate) fn set_segment(&mut self, segment: Option<Handle<Segment>>) {
        self.segment = segment;
    }
    pub(crate) fn set_voice_position(&mut self, position: VoicePosition) {
        self.voice_position = position;
    }

    fn check_open(&self, line: usize, action: &str) -> MsrResult<()> {
        match self.finalized {
            true => Err(MsrError::unsupported(
                line,
                format!("{action} in finalized measure {}", self.number),
            )),
            false => Ok(()),
        }
    }

    /// Append element at the cursor.
    ///
    /// The cursor advances by the element sounding duration. A time
    /// signature element changes the full measure duration.
    pub fn append(
        &mut self,
        arena: &mut Arena<MeasureElement>,
        element: ElementHandle,
    ) -> MsrResult<()> {
        let line = arena[element].line;
        self.check_open(line, "append")?;
        if let ElementKind::Time(time) = &arena[element].kind {
            self.full_duration = time.whole_notes_per_measure();
        }
        let sounding = arena[element].sounding_whole_notes();
        place_element(
            arena,
            element,
            self.handle,
            self.cursor,
            VoicePosition::from_measure(self.voice_position, self.cursor),
        );
        match self.cursor.get() < self.accumulated {
            true => self.pending.push(element),
            false => {
                self.merge_pending(arena);
                self.elements.push(element);
            }
        }
        log::debug!(
            "measure {}: appended {}, sounding {sounding}",
            self.number,
            arena[element]
        );
        self.cursor = self.cursor + sounding;
        self.accumulated = self.accumulated.max(self.cursor.get());
        if arena[element].is_audible() {
            self.contains_music = true;
        }
        self.register_shortest(arena, element);
        Ok(())
    }

    fn register_shortest(
        &mut self,
        arena: &Arena<MeasureElement>,
        element: ElementHandle,
    ) {
        for note in leaf_notes(arena, element) {
            let Some(data) = arena[note].as_note() else {
                continue;
            };
            let sounding = data.sounding_whole_notes();
            if data.is_skip() || !sounding.is_positive() {
                continue;
            }
            self.shortest = Some(ShortestNote::merged(
                self.shortest,
                ShortestNote {
                    sounding,
                    factor: data.tuplet_factor(),
                },
            ));
        }
    }

    fn merge_pending(&mut self, arena: &Arena<MeasureElement>) {
        if self.pending.is_empty() {
            return;
        }
        let position = |handle: &ElementHandle| arena[*handle].measure_position();
        let mut pending = std::mem::take(&mut self.pending);
        pending.sort_by_key(position);
        self.elements = std::mem::take(&mut self.elements)
            .into_iter()
            .merge_by(pending, |a, b| position(a) <= position(b))
            .collect();
        log::debug!("measure {}: pending elements merged", self.number);
    }

    /// Insert an invisible skip of `target - cursor`, when the target is
    /// after the cursor.
    ///
    /// # Returns
    /// the padding note, if it was needed.
    pub fn pad_up_to_position(
        &mut self,
        arena: &mut Arena<MeasureElement>,
        target: MeasurePosition,
        line: usize,
    ) -> MsrResult<Option<ElementHandle>> {
        if target <= self.cursor {
            return Ok(None);
        }
        let duration = target.get() - self.cursor.get();
        log::debug!(
            "measure {}: padding {duration} up to {target}",
            self.number
        );
        let padding = arena.alloc(MeasureElement::new(
            ElementKind::Note(Note::skip(duration)),
            line,
        ));
        self.append(arena, padding)?;
        Ok(Some(padding))
    }

    /// Rewind the cursor. Already appended elements stay where they are.
    ///
    /// # Errors
    /// `BackupUnderflow` if the target precedes the measure start.
    pub fn backup_to(&mut self, target: WholeNotes, line: usize) -> MsrResult<()> {
        self.check_open(line, "backup")?;
        let target = MeasurePosition::new(target, &self.number)
            .map_err(|err| err.with_line(line))?;
        if target > self.cursor {
            return Err(MsrError::unsupported(
                line,
                format!(
                    "backup target {target} is after the cursor {} in measure {}",
                    self.cursor, self.number
                ),
            ));
        }
        log::debug!("measure {}: backup from {} to {target}", self.number, self.cursor);
        self.cursor = target;
        Ok(())
    }

    pub fn backup_by(&mut self, duration: WholeNotes, line: usize) -> MsrResult<()> {
        self.backup_to(self.cursor.get() - duration, line)
    }

    /// Move cursor to the target: pad forward or backup.
    pub fn move_cursor_to(
        &mut self,
        arena: &mut Arena<MeasureElement>,
        target: MeasurePosition,
        line: usize,
    ) -> MsrResult<()> {
        match target.cmp(&self.cursor) {
            std::cmp::Ordering::Less => self.backup_to(target.get(), line),
            std::cmp::Ordering::Equal => Ok(()),
            std::cmp::Ordering::Greater => {
                self.pad_up_to_position(arena, target, line).map(|_| ())
            }
        }
    }

    /// Remove element, recomputing the reached duration.
    pub fn remove_element(
        &mut self,
        arena: &Arena<MeasureElement>,
        element: ElementHandle,
        line: usize,
    ) -> MsrResult<()> {
        self.check_open(line, "remove element")?;
        let before = self.elements.len() + self.pending.len();
        self.elements.retain(|h| *h != element);
        self.pending.retain(|h| *h != element);
        if self.elements.len() + self.pending.len() == before {
            return Err(MsrError::unsupported(
                line,
                format!(
                    "{} not found in measure {}",
                    arena[element], self.number
                ),
            ));
        }
        let remaining = self.elements.iter().chain(self.pending.iter());
        self.accumulated = remaining
            .clone()
            .map(|h| arena[*h].measure_position().get() + arena[*h].sounding_whole_notes())
            .fold(WholeNotes::zero(), WholeNotes::max);
        self.contains_music = remaining.clone().any(|h| arena[*h].is_audible());
        if self.cursor.get() > self.accumulated {
            self.cursor = MeasurePosition::start() + self.accumulated;
        }
        log::debug!("measure {}: removed {}", self.number, arena[element]);
        Ok(())
    }

    /// Put `new` in place of `old`, at the same position.
    pub fn replace_element(
        &mut self,
        arena: &mut Arena<MeasureElement>,
        old: ElementHandle,
        new: ElementHandle,
        line: usize,
    ) -> MsrResult<()> {
        let slot = self
            .elements
            .iter_mut()
            .chain(self.pending.iter_mut())
            .find(|h| **h == old)
            .ok_or_else(|| {
                MsrError::unsupported(
                    line,
                    format!("element to replace not found in measure {}", self.number),
                )
            })?;
        *slot = new;
        let position = arena[old].measure_position();
        let voice_position = arena[old].voice_position();
        let old_sounding = arena[old].sounding_whole_notes();
        place_element(arena, new, self.handle, position, voice_position);
        let new_sounding = arena[new].sounding_whole_notes();
        if new_sounding != old_sounding {
            log::warn!(
                "line {line}: replacement in measure {} changes duration \
                from {old_sounding} to {new_sounding}",
                self.number
            );
            self.accumulated =
                self.accumulated.max(position.get() + new_sounding);
        }
        Ok(())
    }

    /// Assign the measure kind and the purist number.
    ///
    /// # Errors
    /// `DoubleFinalization` if called twice.
    pub fn finalize(
        &mut self,
        arena: &mut Arena<MeasureElement>,
        purist: &mut PuristNumbering,
        last_in_voice: bool,
        line: usize,
    ) -> MsrResult<MeasureKind> {
        if self.finalized {
            return Err(MsrError::DoubleFinalization {
                line,
                what: format!("measure {}", self.number),
            });
        }
        self.merge_pending(arena);
        self.kind = self.classify(last_in_voice);
        if self.kind == MeasureKind::Overcomplete {
            log::warn!(
                "line {line}: measure {} is overcomplete: {} instead of {}",
                self.number,
                self.accumulated,
                self.full_duration.unwrap_or_default()
            );
        }
        let (number, end_regular) =
            purist.assign(self.kind, self.accumulated, self.full_duration);
        self.purist = Some(number);
        self.end_regular = end_regular;
        self.finalized = true;
        log::debug!(
            "measure {} finalized: {:?}, purist number {number}, duration {}",
            self.number,
            self.kind,
            self.accumulated
        );
        Ok(self.kind)
    }

    fn classify(&self, last_in_voice: bool) -> MeasureKind {
        if !self.contains_music {
            return MeasureKind::MusicallyEmpty;
        }
        let Some(full) = self.full_duration else {
            return MeasureKind::Cadenza;
        };
        if self.accumulated > full {
            return MeasureKind::Overcomplete;
        }
        if self.accumulated == full {
            return MeasureKind::Regular;
        }
        if let Some(kind) = self.repeat_context.incomplete_kind() {
            return kind;
        }
        if self.first_in_voice {
            return MeasureKind::Anacrusis;
        }
        match last_in_voice {
            true => MeasureKind::IncompleteLastMeasure,
            false => MeasureKind::IncompleteStandalone,
        }
    }
}
impl HasVoicePosition for Measure {
    fn voice_position(&self) -> VoicePosition {
        self.voice_position
    }
}
impl HasSoundingDuration for Measure {
    fn sounding_whole_notes(&self) -> WholeNotes {
        self.accumulated
    }
}
impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "measure {} ({:?}, {})",
            self.number, self.kind, self.accumulated
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{Measure, MeasureKind, MeasureRepeatContextKind, PuristNumbering};
    use crate::{
        dom::{
            arena::{Arena, Handle},
            element::{ElementHandle, ElementKind, HasMeasurePosition, MeasureElement},
            note::Note,
        },
        errors::MsrError,
        primitives::{MeasurePosition, NoteName, Pitch, Position, WholeNotes},
    };

    struct Fixture {
        elements: Arena<MeasureElement>,
        measures: Arena<Measure>,
    }
    impl Fixture {
        fn new() -> Self {
            Self {
                elements: Arena::new(),
                measures: Arena::new(),
            }
        }
        fn measure(&mut self, number: &str, full: (i64, i64)) -> Handle<Measure> {
            let h = self.measures.alloc_with(|h| Measure::new(h, number, 1, 1));
            self.measures[h]
                .set_full_duration(Some(WholeNotes::new(full.0, full.1).unwrap()));
            h
        }
        fn note(&mut self, n: i64, d: i64) -> ElementHandle {
            self.elements.alloc(MeasureElement::new(
                ElementKind::Note(Note::pitched(
                    Pitch::natural(NoteName::E, 4),
                    WholeNotes::new(n, d).unwrap(),
                )),
                5,
            ))
        }
        fn append(&mut self, measure: Handle<Measure>, n: i64, d: i64) -> ElementHandle {
            let note = self.note(n, d);
            self.measures[measure].append(&mut self.elements, note).unwrap();
            note
        }
        fn finalize(
            &mut self,
            measure: Handle<Measure>,
            purist: &mut PuristNumbering,
        ) -> MeasureKind {
            self.measures[measure]
                .finalize(&mut self.elements, purist, false, 9)
                .unwrap()
        }
    }

    #[test]
    fn regular() {
        let mut fx = Fixture::new();
        let m = fx.measure("1", (3, 4));
        for _ in 0..3 {
            fx.append(m, 1, 4);
        }
        let mut purist = PuristNumbering::new();
        assert_eq!(fx.finalize(m, &mut purist), MeasureKind::Regular);
        assert_eq!(fx.measures[m].purist_number(), Some(1));
        assert_eq!(purist.next_number(), 2);
    }

    #[test]
    fn anacrusis() {
        let mut fx = Fixture::new();
        let m = fx.measure("0", (4, 4));
        fx.measures[m].set_first_in_voice(true);
        fx.append(m, 1, 4);
        let mut purist = PuristNumbering::new();
        assert_eq!(fx.finalize(m, &mut purist), MeasureKind::Anacrusis);
        assert_eq!(fx.measures[m].purist_number(), Some(0));
        assert_eq!(purist.next_number(), 1);
    }

    #[test]
    fn kinds_precedence() {
        let mut fx = Fixture::new();
        let mut purist = PuristNumbering::new();

        let over = fx.measure("1", (2, 4));
        fx.measures[over].set_first_in_voice(true);
        fx.append(over, 3, 4);
        assert_eq!(fx.finalize(over, &mut purist), MeasureKind::Overcomplete);

        let empty = fx.measure("2", (2, 4));
        fx.measures[empty].pad_up_to_position(
            &mut fx.elements,
            MeasurePosition::new(WholeNotes::new(1, 2).unwrap(), "2").unwrap(),
            3,
        )
        .unwrap();
        assert_eq!(fx.finalize(empty, &mut purist), MeasureKind::MusicallyEmpty);

        let cadenza = fx.measure("3", (2, 4));
        fx.measures[cadenza].set_full_duration(None);
        fx.append(cadenza, 5, 4);
        assert_eq!(fx.finalize(cadenza, &mut purist), MeasureKind::Cadenza);

        let in_repeat = fx.measure("4", (2, 4));
        fx.measures[in_repeat]
            .set_repeat_context(MeasureRepeatContextKind::CommonPartLastMeasure);
        fx.append(in_repeat, 1, 4);
        assert_eq!(
            fx.finalize(in_repeat, &mut purist),
            MeasureKind::IncompleteLastInRepeatCommonPart
        );
        let after = fx.measure("5", (2, 4));
        fx.measures[after]
            .set_repeat_context(MeasureRepeatContextKind::NextMeasureAfterCommonPart);
        fx.append(after, 1, 4);
        assert_eq!(
            fx.finalize(after, &mut purist),
            MeasureKind::IncompleteNextAfterCommonPart
        );
        // both halves make one purist measure
        assert_eq!(fx.measures[in_repeat].purist_number(), Some(4));
        assert_eq!(fx.measures[after].purist_number(), Some(4));
        assert_eq!(purist.next_number(), 5);
    }

    #[test]
    fn backup_round_trip() {
        let mut fx = Fixture::new();
        let m = fx.measure("1", (4, 4));
        let a = fx.append(m, 1, 2);
        fx.measures[m].backup_to(WholeNotes::zero(), 6).unwrap();
        let b = fx.append(m, 3, 4);
        assert!(fx.measures[m].has_pending_elements());
        assert!(fx.elements[a].measure_position().is_start());
        assert!(fx.elements[b].measure_position().is_start());
        fx.finalize(m, &mut PuristNumbering::new());
        assert_eq!(
            fx.measures[m].accumulated_whole_notes(),
            WholeNotes::new(3, 4).unwrap()
        );
        assert_eq!(fx.measures[m].elements(), &[a, b]);
    }

    #[test]
    fn pending_merged_by_position() {
        let mut fx = Fixture::new();
        let m = fx.measure("1", (4, 4));
        let a = fx.append(m, 1, 2);
        let b = fx.append(m, 1, 2);
        fx.measures[m].backup_by(WholeNotes::new(3, 4).unwrap(), 7).unwrap();
        let c = fx.append(m, 1, 4);
        assert_eq!(
            fx.elements[c].measure_position().get(),
            WholeNotes::new(1, 4).unwrap()
        );
        // cursor catches up with the reached position
        fx.measures[m]
            .move_cursor_to(
                &mut fx.elements,
                MeasurePosition::new(WholeNotes::whole(), "1").unwrap(),
                8,
            )
            .unwrap();
        let d = fx.append(m, 1, 4);
        let elements = fx.measures[m].elements().to_vec();
        assert_eq!(elements[0], a);
        assert_eq!(elements[1], c);
        assert_eq!(elements[elements.len() - 1], d);
        assert!(elements.contains(&b));
        assert!(!fx.measures[m].has_pending_elements());
    }

    #[test]
    fn backup_underflow() {
        let mut fx = Fixture::new();
        let m = fx.measure("12", (4, 4));
        fx.append(m, 1, 4);
        let err = fx.measures[m]
            .backup_by(WholeNotes::new(1, 2).unwrap(), 33)
            .unwrap_err();
        assert!(matches!(
            err,
            MsrError::BackupUnderflow { line: 33, ref measure, .. } if measure == "12"
        ));
    }

    #[test]
    fn double_finalization() {
        let mut fx = Fixture::new();
        let m = fx.measure("1", (1, 4));
        fx.append(m, 1, 4);
        let mut purist = PuristNumbering::new();
        fx.finalize(m, &mut purist);
        assert!(matches!(
            fx.measures[m].finalize(&mut fx.elements, &mut purist, false, 4),
            Err(MsrError::DoubleFinalization { line: 4, .. })
        ));
        let note = fx.note(1, 4);
        assert!(fx.measures[m].append(&mut fx.elements, note).is_err());
    }

    #[test]
    fn remove_and_replace() {
        let mut fx = Fixture::new();
        let m = fx.measure("1", (4, 4));
        let a = fx.append(m, 1, 4);
        let b = fx.append(m, 1, 2);
        fx.measures[m].remove_element(&fx.elements, b, 3).unwrap();
        assert_eq!(
            fx.measures[m].accumulated_whole_notes(),
            WholeNotes::new(1, 4).unwrap()
        );
        assert_eq!(fx.measures[m].cursor().get(), WholeNotes::new(1, 4).unwrap());
        let c = fx.note(1, 4);
        fx.measures[m].replace_element(&mut fx.elements, a, c, 3).unwrap();
        assert_eq!(fx.measures[m].elements(), &[c]);
        assert!(fx.elements[c].measure_position().is_start());
        assert!(fx.measures[m].remove_element(&fx.elements, a, 3).is_err());
    }
}
