//! Voice: the measures of one musical line, grouped into segments and
//! repeats.
//!
//! The voice keeps the assembly state: the open segment, the current
//! measure, the stack of repeats being built and the compressed
//! construct (multiple measure rest or measure repeat) being filled.
//! New segments land in the innermost open repeat part, or in the voice
//! itself.

use std::fmt;

use crate::{
    errors::{MsrError, MsrResult},
    primitives::{lcm_of_denominators, MeasurePosition, VoicePosition, WholeNotes},
};

use super::{
    arena::Handle,
    element::{leaf_notes, ElementHandle, ElementKind, HasSoundingDuration, MeasureElement},
    measure::{
        Measure, MeasureImplicitKind, MeasureRepeatContextKind, PuristNumbering,
        ShortestNote,
    },
    measure_repeat::MeasureRepeat,
    multiple_measure_rest::MultipleMeasureRest,
    part::Part,
    repeat::{Repeat, RepeatPhase},
    score::Score,
    segment::Segment,
    staff::Staff,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceElement {
    Segment(Handle<Segment>),
    Repeat(Handle<Repeat>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoiceKind {
    Regular,
    Harmonies,
    FiguredBass,
}

/// A repeat being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RepeatDescriptor {
    pub repeat: Handle<Repeat>,
    /// An ending is open: new segments go there.
    pub ending_open: bool,
}

/// Compressed construct, that receives the new measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Compressed {
    Rest(Handle<MultipleMeasureRest>),
    Repeat(Handle<MeasureRepeat>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    handle: Handle<Voice>,
    number: i32,
    kind: VoiceKind,
    part: Handle<Part>,
    staff: Option<Handle<Staff>>,
    pub line: usize,
    pub(crate) elements: Vec<VoiceElement>,
    pub(crate) current_segment: Option<Handle<Segment>>,
    pub(crate) current_measure: Option<Handle<Measure>>,
    measures_count: usize,
    pub(crate) purist: PuristNumbering,
    pub(crate) repeats: Vec<RepeatDescriptor>,
    pub(crate) last_repeat: Option<Handle<Repeat>>,
    pub(crate) next_context: MeasureRepeatContextKind,
    pub(crate) compressed: Option<Compressed>,
    position: VoicePosition,
    current_staff: i32,
    staff_changes: Vec<ElementHandle>,
    shortest: Option<ShortestNote>,
    finalized: bool,
}
impl Voice {
    pub fn new(
        handle: Handle<Voice>,
        number: i32,
        kind: VoiceKind,
        part: Handle<Part>,
        staff: Option<(Handle<Staff>, i32)>,
        line: usize,
    ) -> Self {
        Self {
            handle,
            number,
            kind,
            part,
            staff: staff.map(|(handle, _)| handle),
            line,
            elements: Vec::new(),
            current_segment: None,
            current_measure: None,
            measures_count: 0,
            purist: PuristNumbering::new(),
            repeats: Vec::new(),
            last_repeat: None,
            next_context: MeasureRepeatContextKind::None,
            compressed: None,
            position: VoicePosition::start(),
            current_staff: staff.map(|(_, number)| number).unwrap_or(0),
            staff_changes: Vec::new(),
            shortest: None,
            finalized: false,
        }
    }

    pub fn handle(&self) -> Handle<Voice> {
        self.handle
    }
    pub fn number(&self) -> i32 {
        self.number
    }
    pub fn kind(&self) -> VoiceKind {
        self.kind
    }
    pub fn elements(&self) -> &[VoiceElement] {
        &self.elements
    }
    pub fn current_measure(&self) -> Option<Handle<Measure>> {
        self.current_measure
    }
    pub fn measures_count(&self) -> usize {
        self.measures_count
    }
    /// Sum of the durations of the finalized measures.
    pub fn position(&self) -> VoicePosition {
        self.position
    }
    /// Staff of the notes currently appended, can differ from the owning
    /// staff for cross-staff notes.
    pub fn current_staff_number(&self) -> i32 {
        self.current_staff
    }
    pub fn staff_changes(&self) -> &[ElementHandle] {
        &self.staff_changes
    }
    pub fn shortest_note(&self) -> Option<ShortestNote> {
        self.shortest
    }
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
    pub fn repeats_in_progress(&self) -> usize {
        self.repeats.len()
    }

    /// A voice, that appears after the part start, goes on from where
    /// the part measures are.
    pub(crate) fn continue_part(
        &mut self,
        measures_count: usize,
        position: VoicePosition,
        purist: PuristNumbering,
    ) {
        self.measures_count = measures_count;
        self.position = position;
        self.purist = purist;
    }

    pub(crate) fn register_new_measure(&mut self) -> usize {
        self.measures_count += 1;
        self.measures_count
    }
}
impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} voice {}", self.kind, self.number)
    }
}

impl Score {
    pub(crate) fn create_voice(
        &mut self,
        part: Handle<Part>,
        staff: Option<(Handle<Staff>, i32)>,
        number: i32,
        kind: VoiceKind,
        line: usize,
    ) -> Handle<Voice> {
        let voice = self
            .voices
            .alloc_with(|h| Voice::new(h, number, kind, part, staff, line));
        let data = &self.parts[part];
        if !data.measures_whole_notes().is_empty() {
            let position = data
                .measures_whole_notes()
                .iter()
                .fold(VoicePosition::start(), |position, duration| position + *duration);
            let (measures_count, purist) =
                (data.measures_whole_notes().len(), data.purist().clone());
            self.voices[voice].continue_part(measures_count, position, purist);
        }
        log::info!(
            "line {line}: {} created in part \"{}\"",
            self.voices[voice],
            self.parts[part].id()
        );
        voice
    }

    pub fn fetch_voice_up_link_to_staff(&self, voice: Handle<Voice>) -> Option<Handle<Staff>> {
        self.voices[voice].staff
    }
    pub fn fetch_voice_up_link_to_part(&self, voice: Handle<Voice>) -> Handle<Part> {
        self.voices[voice].part
    }

    /// List, that receives new voice elements.
    pub(crate) fn voice_target(
        &mut self,
        voice: Handle<Voice>,
        line: usize,
    ) -> MsrResult<&mut Vec<VoiceElement>> {
        let open = self.voices[voice].repeats.iter().rev().find_map(|desc| {
            let phase = self.repeats[desc.repeat].phase();
            match (phase, desc.ending_open) {
                // waits for another ending or for completion
                (RepeatPhase::InEndings, false) => None,
                _ => Some((desc.repeat, phase)),
            }
        });
        match open {
            None => Ok(&mut self.voices[voice].elements),
            Some((repeat, RepeatPhase::InEndings)) => {
                match self.repeats[repeat].last_ending_mut() {
                    Some(ending) => Ok(ending.elements_mut()),
                    None => Err(MsrError::repeat_phase(line, "repeat has no ending")),
                }
            }
            Some((repeat, _)) => match self.repeats[repeat].common_part_mut() {
                Some(common_part) => Ok(common_part.elements_mut()),
                None => Err(MsrError::repeat_phase(
                    line,
                    "repeat has no common part",
                )),
            },
        }
    }

    pub(crate) fn voice_open_segment(
        &mut self,
        voice: Handle<Voice>,
        line: usize,
    ) -> MsrResult<Handle<Segment>> {
        if let Some(segment) = self.voices[voice].current_segment {
            return Ok(segment);
        }
        let segment = self.segments.alloc_with(|h| Segment::new(h, voice, line));
        self.voice_target(voice, line)?
            .push(VoiceElement::Segment(segment));
        self.voices[voice].current_segment = Some(segment);
        log::debug!("line {line}: new segment in {}", self.voices[voice]);
        Ok(segment)
    }

    /// Remove an emptied segment from whatever list holds it.
    pub(crate) fn voice_remove_segment(
        &mut self,
        voice: Handle<Voice>,
        segment: Handle<Segment>,
    ) {
        let element = VoiceElement::Segment(segment);
        self.voices[voice].elements.retain(|el| *el != element);
        let repeats: Vec<_> = self.voices[voice]
            .repeats
            .iter()
            .map(|desc| desc.repeat)
            .collect();
        for repeat in repeats {
            if let Some(common_part) = self.repeats[repeat].common_part_mut() {
                common_part.elements_mut().retain(|el| *el != element);
            }
            if let Some(ending) = self.repeats[repeat].last_ending_mut() {
                ending.elements_mut().retain(|el| *el != element);
            }
        }
        if self.voices[voice].current_segment == Some(segment) {
            self.voices[voice].current_segment = None;
        }
    }

    /// Allocate a measure of the voice, without placing it.
    pub(crate) fn new_voice_measure(
        &mut self,
        voice: Handle<Voice>,
        number: &str,
        implicit: MeasureImplicitKind,
        line: usize,
    ) -> Handle<Measure> {
        let ordinal = self.voices[voice].register_new_measure();
        let measure = self
            .measures
            .alloc_with(|h| Measure::new(h, number, ordinal, line));
        let data = &mut self.measures[measure];
        data.set_voice(voice);
        data.set_implicit(implicit);
        data.set_first_in_voice(ordinal == 1);
        measure
    }

    /// Start a new measure in the voice.
    ///
    /// It goes to the compressed construct being filled, if any, or to
    /// the open segment. An unfinalized previous measure is finalized
    /// first.
    pub fn create_measure_in_voice(
        &mut self,
        voice: Handle<Voice>,
        number: &str,
        implicit: MeasureImplicitKind,
        full_duration: Option<WholeNotes>,
        line: usize,
    ) -> MsrResult<Handle<Measure>> {
        if self.voices[voice].finalized {
            return Err(MsrError::unsupported(
                line,
                format!("{} is finalized, can not add measure {number}", self.voices[voice]),
            ));
        }
        let previous = self.voices[voice].current_measure;
        if let Some(previous) = previous {
            if !self.measures[previous].is_finalized() {
                self.voice_finalize_current_measure(voice, line)?;
            }
            self.measures[previous].set_next_number(number);
        }
        let measure = match self.voices[voice].compressed {
            Some(Compressed::Rest(rest))
                if !self.multiple_measure_rests[rest].has_been_filled() =>
            {
                let measure = self.new_voice_measure(voice, number, implicit, line);
                self.multiple_measure_rests[rest]
                    .append_measure(&mut self.measures, measure)?;
                measure
            }
            Some(Compressed::Repeat(repeat)) => {
                let measure = self.new_voice_measure(voice, number, implicit, line);
                self.measure_repeats[repeat].append_replica_measure(
                    &mut self.measures,
                    measure,
                    line,
                )?;
                measure
            }
            _ => {
                let segment = self.voice_open_segment(voice, line)?;
                self.create_and_append_measure_to_segment(segment, number, implicit, line)
            }
        };
        let position = self.voices[voice].position;
        let context = std::mem::take(&mut self.voices[voice].next_context);
        let data = &mut self.measures[measure];
        data.set_full_duration(full_duration);
        data.set_voice_position(position);
        if context != MeasureRepeatContextKind::None {
            data.set_repeat_context(context);
        }
        self.voices[voice].current_measure = Some(measure);
        Ok(measure)
    }

    pub fn voice_current_measure(
        &self,
        voice: Handle<Voice>,
        line: usize,
    ) -> MsrResult<Handle<Measure>> {
        self.voices[voice].current_measure.ok_or_else(|| {
            MsrError::unsupported(
                line,
                format!("{} has no measure yet", self.voices[voice]),
            )
        })
    }

    /// Append to the current measure at its cursor.
    pub fn append_element_to_voice(
        &mut self,
        voice: Handle<Voice>,
        element: ElementHandle,
    ) -> MsrResult<()> {
        let line = self.elements[element].line;
        self.complete_pending_repeats(voice, line)?;
        let measure = self.voice_current_measure(voice, line)?;
        self.measures[measure].append(&mut self.elements, element)
    }

    /// Allocate the element and append it to the voice.
    pub fn append_new_element_to_voice(
        &mut self,
        voice: Handle<Voice>,
        kind: ElementKind,
        line: usize,
    ) -> MsrResult<ElementHandle> {
        let element = self.elements.alloc(MeasureElement::new(kind, line));
        self.append_element_to_voice(voice, element)?;
        Ok(element)
    }

    /// Pad or backup the current measure, so that its cursor is at
    /// `target`.
    pub fn voice_move_cursor_to(
        &mut self,
        voice: Handle<Voice>,
        target: MeasurePosition,
        line: usize,
    ) -> MsrResult<()> {
        let measure = self.voice_current_measure(voice, line)?;
        self.measures[measure].move_cursor_to(&mut self.elements, target, line)
    }

    /// Record that the following notes of the voice are in another
    /// staff.
    pub fn append_voice_staff_change(
        &mut self,
        voice: Handle<Voice>,
        to_staff: i32,
        line: usize,
    ) -> MsrResult<ElementHandle> {
        let from = self.voices[voice].current_staff;
        log::debug!(
            "line {line}: {} changes staff {from} → {to_staff}",
            self.voices[voice]
        );
        let change = self.append_new_element_to_voice(
            voice,
            ElementKind::VoiceStaffChange { from, to: to_staff },
            line,
        )?;
        let data = &mut self.voices[voice];
        data.current_staff = to_staff;
        data.staff_changes.push(change);
        Ok(change)
    }

    /// Finalize the current measure, advance the voice position and
    /// propagate the shortest note up to staff and part.
    pub fn voice_finalize_current_measure(
        &mut self,
        voice: Handle<Voice>,
        line: usize,
    ) -> MsrResult<()> {
        self.finalize_voice_measure(voice, false, line)
    }

    fn finalize_voice_measure(
        &mut self,
        voice: Handle<Voice>,
        last_in_voice: bool,
        line: usize,
    ) -> MsrResult<()> {
        let measure = self.voice_current_measure(voice, line)?;
        let data = &mut self.voices[voice];
        self.measures[measure].finalize(
            &mut self.elements,
            &mut data.purist,
            last_in_voice,
            line,
        )?;
        data.position = data.position + self.measures[measure].sounding_whole_notes();
        let ordinal = self.measures[measure].ordinal();
        let part = &mut self.parts[data.part];
        if part.measures_whole_notes().len() < ordinal {
            part.record_measure(
                self.measures[measure].sounding_whole_notes(),
                data.purist.clone(),
            );
        }
        if let Some(shortest) = self.measures[measure].shortest_note() {
            self.register_shortest_note(voice, shortest);
        }
        if let Some(Compressed::Rest(rest)) = self.voices[voice].compressed {
            if self.multiple_measure_rests[rest].has_been_filled() {
                log::debug!("line {line}: multiple measure rest filled");
                let data = &mut self.voices[voice];
                data.compressed = None;
                data.current_segment = None;
            }
        }
        Ok(())
    }

    /// Shortest note goes up to the staff and the part.
    pub(crate) fn register_shortest_note(
        &mut self,
        voice: Handle<Voice>,
        shortest: ShortestNote,
    ) {
        let data = &mut self.voices[voice];
        data.shortest = Some(ShortestNote::merged(data.shortest, shortest));
        if let Some(staff) = data.staff {
            self.staves[staff].register_shortest_note(shortest);
        }
        let part = data.part;
        self.parts[part].register_shortest_note(shortest);
    }

    /// Close everything, that is still open, and finalize the last
    /// measure as such.
    ///
    /// # Errors
    /// `DoubleFinalization` if called twice.
    pub fn finalize_voice(&mut self, voice: Handle<Voice>, line: usize) -> MsrResult<()> {
        if self.voices[voice].finalized {
            return Err(MsrError::DoubleFinalization {
                line,
                what: self.voices[voice].to_string(),
            });
        }
        self.complete_pending_repeats(voice, line)?;
        self.close_dangling_repeats(voice, line)?;
        match self.voices[voice].compressed.take() {
            Some(Compressed::Rest(rest)) => {
                let rest = &self.multiple_measure_rests[rest];
                if !rest.has_been_filled() {
                    log::warn!(
                        "line {line}: multiple measure rest holds {} of {} measures",
                        rest.measures().len(),
                        rest.measures_number()
                    );
                }
            }
            Some(Compressed::Repeat(repeat)) => {
                self.measure_repeats[repeat].complete(line)?;
            }
            None => (),
        }
        if let Some(measure) = self.voices[voice].current_measure {
            if !self.measures[measure].is_finalized() {
                self.finalize_voice_measure(voice, true, line)?;
            }
        }
        let data = &mut self.voices[voice];
        data.current_segment = None;
        data.finalized = true;
        log::info!(
            "line {line}: {} finalized with {} measures",
            self.voices[voice],
            self.voices[voice].measures_count
        );
        Ok(())
    }

    /// Measures of the voice in order, with repeats and compressed
    /// constructs flattened.
    pub fn voice_measures(&self, voice: Handle<Voice>) -> Vec<Handle<Measure>> {
        self.voice_elements_measures(&self.voices[voice].elements)
    }

    pub(crate) fn voice_elements_measures(
        &self,
        elements: &[VoiceElement],
    ) -> Vec<Handle<Measure>> {
        elements
            .iter()
            .flat_map(|element| match element {
                VoiceElement::Segment(segment) => self.segment_measures(*segment),
                VoiceElement::Repeat(repeat) => {
                    let repeat = &self.repeats[*repeat];
                    let mut measures = repeat
                        .common_part()
                        .map(|part| self.voice_elements_measures(part.elements()))
                        .unwrap_or_default();
                    for ending in repeat.endings() {
                        measures.extend(self.voice_elements_measures(ending.elements()));
                    }
                    measures
                }
            })
            .collect()
    }

    /// Least common multiple of the denominators of all sounding
    /// durations in the voice.
    pub fn voice_lcm_of_denominators(&self, voice: Handle<Voice>) -> u64 {
        let durations = self
            .voice_measures(voice)
            .into_iter()
            .flat_map(|measure| self.measures[measure].elements().to_vec())
            .flat_map(|element| leaf_notes(&self.elements, element))
            .map(|note| self.elements[note].sounding_whole_notes())
            .collect::<Vec<_>>();
        lcm_of_denominators(durations)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        dom::{
            element::ElementKind,
            measure::{MeasureImplicitKind, MeasureKind},
            note::Note,
            score::Score,
        },
        errors::MsrError,
        primitives::{MeasurePosition, WholeNotes},
    };

    fn quarter_note() -> ElementKind {
        ElementKind::Note(Note::rest(WholeNotes::new(1, 4).unwrap()))
    }

    #[test]
    fn positions_and_numbers() {
        let mut score = Score::new();
        let voice = score.test_voice();
        let full = Some(WholeNotes::new(2, 4).unwrap());
        for number in ["0", "1", "2"] {
            score
                .create_measure_in_voice(voice, number, MeasureImplicitKind::No, full, 1)
                .unwrap();
            let notes = match number {
                "0" => 1,
                _ => 2,
            };
            for _ in 0..notes {
                score.append_new_element_to_voice(voice, quarter_note(), 2).unwrap();
            }
            score.voice_finalize_current_measure(voice, 3).unwrap();
        }
        score.finalize_voice(voice, 4).unwrap();
        let measures = score.voice_measures(voice);
        let kinds: Vec<_> = measures.iter().map(|m| score.measure(*m).kind()).collect();
        assert_eq!(
            kinds,
            [MeasureKind::Anacrusis, MeasureKind::Regular, MeasureKind::Regular]
        );
        let purist: Vec<_> = measures
            .iter()
            .map(|m| score.measure(*m).purist_number().unwrap())
            .collect();
        assert_eq!(purist, [0, 1, 2]);
        assert_eq!(score.voice(voice).position().to_string(), "voice@5/4");
        assert_eq!(score.measure(measures[0]).next_number(), Some("1"));
        assert!(matches!(
            score.finalize_voice(voice, 5),
            Err(MsrError::DoubleFinalization { line: 5, .. })
        ));
    }

    #[test]
    fn last_incomplete_measure() {
        let mut score = Score::new();
        let voice = score.test_voice();
        let full = Some(WholeNotes::whole());
        for number in ["1", "2"] {
            score
                .create_measure_in_voice(voice, number, MeasureImplicitKind::No, full, 1)
                .unwrap();
            score
                .voice_move_cursor_to(
                    voice,
                    MeasurePosition::new(WholeNotes::new(1, 2).unwrap(), number).unwrap(),
                    1,
                )
                .unwrap();
            score.append_new_element_to_voice(voice, quarter_note(), 2).unwrap();
        }
        score.finalize_voice(voice, 3).unwrap();
        let measures = score.voice_measures(voice);
        assert_eq!(
            score.measure(measures[0]).kind(),
            MeasureKind::Anacrusis
        );
        assert_eq!(
            score.measure(measures[1]).kind(),
            MeasureKind::IncompleteLastMeasure
        );
    }

    #[test]
    fn staff_changes() {
        let mut score = Score::new();
        let voice = score.test_voice();
        score
            .create_measure_in_voice(voice, "1", MeasureImplicitKind::No, None, 1)
            .unwrap();
        score.append_voice_staff_change(voice, 2, 5).unwrap();
        assert_eq!(score.voice(voice).current_staff_number(), 2);
        assert_eq!(score.voice(voice).staff_changes().len(), 1);
    }
}
