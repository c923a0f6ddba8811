//! Assembly driver: turns the source events stream into a `Score`.
//!
//! The driver keeps the part cursor, as the source expresses it (notes
//! advance it, backup and forward move it), and reconciles the cursor of
//! every voice measure with it before appending. Structural errors stop
//! the assembly at the first offending event.

use std::collections::BTreeMap;

use crate::{
    config::{AssemblyOptions, WordsConversion},
    errors::{MsrError, MsrResult},
    notation::{Attachment, AttachmentKind, Clef, Direction, Key, Placement},
    primitives::{MeasurePosition, Moment, Position, TimeSignature, TupletFactor, WholeNotes},
};

use super::{
    arena::Handle,
    chord::{chord_append_note, create_chord_for_note},
    element::{
        place_element, refresh_sounding, ElementHandle, ElementKind, GraceNotesGroup,
        HasMeasurePosition, HasVoicePosition, MeasureElement,
    },
    measure::MeasureImplicitKind,
    note::{Note, NoteKind},
    part::Part,
    part_group::PartGroup,
    score::Score,
    source_event::{NoteEvent, SourceEvent, TupletStart},
    tuplet::{create_tuplet, tuplet_append_member, tuplet_replace_member},
    voice::Voice,
};

#[derive(Debug, Clone)]
struct VoiceState {
    voice: Handle<Voice>,
    staff_number: i32,
    /// Open tuplets, outer first.
    tuplets: Vec<ElementHandle>,
    graces: Option<ElementHandle>,
    delayed: Vec<Attachment>,
}

#[derive(Debug, Clone)]
struct PartState {
    part: Handle<Part>,
    measure: Option<(String, MeasureImplicitKind)>,
    cursor: MeasurePosition,
    high_water: WholeNotes,
    voices: BTreeMap<i32, VoiceState>,
    /// Attributes of the current measure, for the voices created later.
    attributes: Vec<(Option<i32>, ElementKind)>,
    structure: Vec<SourceEvent>,
    clefs: BTreeMap<i32, Clef>,
    key: Option<Key>,
    last_note: Option<(i32, ElementHandle)>,
}
impl PartState {
    fn new(part: Handle<Part>) -> Self {
        Self {
            part,
            measure: None,
            cursor: MeasurePosition::start(),
            high_water: WholeNotes::zero(),
            voices: BTreeMap::new(),
            attributes: Vec::new(),
            structure: Vec::new(),
            clefs: BTreeMap::new(),
            key: None,
            last_note: None,
        }
    }
    fn measure_number(&self) -> &str {
        self.measure.as_ref().map(|(n, _)| n.as_str()).unwrap_or("")
    }
    fn advance(&mut self, duration: WholeNotes) {
        self.cursor = self.cursor + duration;
        self.high_water = self.high_water.max(self.cursor.get());
    }
}

/// Builds a `Score` from source events.
///
/// # Example
///
/// ```
/// use msr_score::{
///     config::AssemblyOptions,
///     dom::{MeasureKind, NoteEvent, ScoreBuilder, SourceEvent},
///     primitives::{DurationKind, NoteName, Pitch, TimeSignature},
/// };
///
/// let mut builder = ScoreBuilder::new(&AssemblyOptions::default()).unwrap();
/// let c4 = Some(Pitch::natural(NoteName::C, 4));
/// let events = [
///     SourceEvent::part("P1", "Flute"),
///     SourceEvent::measure("1"),
///     SourceEvent::Time(TimeSignature::new(2, 4)),
///     SourceEvent::Note(NoteEvent::new(c4, DurationKind::Half)),
///     SourceEvent::MeasureEnd,
///     SourceEvent::PartEnd,
/// ];
/// for (line, event) in events.into_iter().enumerate() {
///     builder.handle(line + 1, event).unwrap();
/// }
/// let score = builder.finish().unwrap();
/// let part = score.parts()[0];
/// let voice = score.part_voices(part)[0];
/// let measure = score.voice_measures(voice)[0];
/// assert_eq!(score.measure(measure).kind(), MeasureKind::Regular);
/// ```
#[derive(Debug)]
pub struct ScoreBuilder {
    options: AssemblyOptions,
    score: Score,
    groups: Vec<(i32, Handle<PartGroup>)>,
    default_group: Option<Handle<PartGroup>>,
    part: Option<PartState>,
    ignored_part: Option<String>,
    line: usize,
}
impl ScoreBuilder {
    /// # Errors
    /// `ConfigurationConflict` if the options contradict each other.
    pub fn new(options: &AssemblyOptions) -> MsrResult<Self> {
        Ok(Self {
            options: options.effective()?,
            score: Score::new(),
            groups: Vec::new(),
            default_group: None,
            part: None,
            ignored_part: None,
            line: 0,
        })
    }

    pub fn score(&self) -> &Score {
        &self.score
    }

    pub fn handle_all(
        &mut self,
        events: impl IntoIterator<Item = (usize, SourceEvent)>,
    ) -> MsrResult<()> {
        events
            .into_iter()
            .try_for_each(|(line, event)| self.handle(line, event))
    }

    pub fn handle(&mut self, line: usize, event: SourceEvent) -> MsrResult<()> {
        self.line = line;
        if self.ignored_part.is_some() {
            if matches!(event, SourceEvent::PartEnd) {
                if let Some(id) = self.ignored_part.take() {
                    log::debug!("line {line}: end of ignored part \"{id}\"");
                }
            }
            return Ok(());
        }
        match event {
            SourceEvent::PartGroupStart { number, name } => {
                let parent = self.groups.last().map(|(_, group)| *group);
                let group = self.score.create_part_group(number, &name, parent, line);
                self.groups.push((number, group));
                Ok(())
            }
            SourceEvent::PartGroupStop { number } => {
                match self.groups.iter().rposition(|(n, _)| *n == number) {
                    Some(index) => {
                        self.groups.remove(index);
                    }
                    None => log::warn!("line {line}: part group {number} stopped, not started"),
                }
                Ok(())
            }
            SourceEvent::PartStart { id, name } => self.part_start(&id, &name, line),
            SourceEvent::PartEnd => self.part_end(line),
            SourceEvent::MeasureStart { number, implicit } => {
                self.measure_start(number, implicit, line)
            }
            SourceEvent::MeasureEnd => self.measure_end(line),
            SourceEvent::Note(note) => self.note(note, line),
            SourceEvent::Backup(duration) => self.backup(duration, line),
            SourceEvent::Forward {
                duration,
                staff,
                voice,
            } => self.forward(duration, staff, voice, line),
            SourceEvent::Clef(clef) => self.clef(clef, line),
            SourceEvent::Key(key) => self.key(key, line),
            SourceEvent::Time(time) => self.time(time, line),
            SourceEvent::BarLine(kind) => {
                self.append_attribute(None, ElementKind::BarLine(kind), false, line)
            }
            event @ (SourceEvent::RepeatStart
            | SourceEvent::RepeatEnd { .. }
            | SourceEvent::EndingStart { .. }
            | SourceEvent::EndingEnd { .. }
            | SourceEvent::MultipleRestStart { .. }
            | SourceEvent::MeasureRepeatStart { .. }
            | SourceEvent::MeasureRepeatStop) => self.structure(event, line),
            SourceEvent::Words {
                text,
                placement,
                staff,
                voice,
            } => {
                let direction = self.words_direction(text, placement);
                self.direction(direction, staff, voice, line)
            }
            SourceEvent::Direction {
                direction,
                staff,
                voice,
            } => self.direction(direction, staff, voice, line),
            SourceEvent::Harmony { harmony, offset } => {
                if self.options.ignore_harmonies {
                    return Ok(());
                }
                self.part_level_element(false, line, |moment| ElementKind::Harmony {
                    harmony,
                    moment: Moment::new(moment, offset),
                })
            }
            SourceEvent::FiguredBass {
                figured_bass,
                offset,
            } => {
                if self.options.ignore_figured_basses {
                    return Ok(());
                }
                self.part_level_element(true, line, |moment| ElementKind::FiguredBass {
                    figured_bass,
                    moment: Moment::new(moment, offset),
                })
            }
        }
    }

    /// Close everything and finalize the score.
    pub fn finish(mut self) -> MsrResult<Score> {
        let line = self.line;
        if self.part.is_some() {
            log::warn!("line {line}: last part was not ended");
            self.part_end(line)?;
        }
        self.score.finalize(line)?;
        Ok(self.score)
    }

    fn part_state(&mut self, line: usize) -> MsrResult<&mut PartState> {
        self.part
            .as_mut()
            .ok_or_else(|| MsrError::unsupported(line, "event outside of a part"))
    }

    fn part_start(&mut self, id: &str, name: &str, line: usize) -> MsrResult<()> {
        if self.part.is_some() {
            return Err(MsrError::unsupported(
                line,
                format!("part \"{id}\" starts inside another part"),
            ));
        }
        if self.options.is_part_ignored(id, name) {
            log::info!("line {line}: part \"{id}\" ignored");
            self.ignored_part = Some(id.to_string());
            return Ok(());
        }
        let group = match self.groups.last() {
            Some((_, group)) => *group,
            None => match self.default_group {
                Some(group) => group,
                None => {
                    let group = self.score.create_part_group(0, "", None, line);
                    self.default_group = Some(group);
                    group
                }
            },
        };
        let part = self.score.create_part(group, id, name, line);
        self.part = Some(PartState::new(part));
        Ok(())
    }

    fn part_end(&mut self, line: usize) -> MsrResult<()> {
        if self.part_state(line)?.measure.is_some() {
            log::warn!("line {line}: part ends inside a measure");
            self.measure_end(line)?;
        }
        match self.part.take() {
            Some(state) => self.finalize_part(state, line),
            None => Ok(()),
        }
    }

    fn finalize_part(&mut self, state: PartState, line: usize) -> MsrResult<()> {
        for voice in self.score.part_voices(state.part) {
            if !self.score.voice(voice).is_finalized() {
                self.score.finalize_voice(voice, line)?;
            }
        }
        Ok(())
    }

    fn measure_start(
        &mut self,
        number: String,
        implicit: MeasureImplicitKind,
        line: usize,
    ) -> MsrResult<()> {
        if self.part_state(line)?.measure.is_some() {
            log::warn!("line {line}: measure {number} starts before the previous one ended");
            self.measure_end(line)?;
        }
        let state = self.part_state(line)?;
        let part = state.part;
        state.measure = Some((number.clone(), implicit));
        state.cursor = MeasurePosition::start();
        state.high_water = WholeNotes::zero();
        state.last_note = None;
        let full = self.score.part(part).full_measure_whole_notes();
        for voice in self.score.part_voices(part) {
            self.score
                .create_measure_in_voice(voice, &number, implicit, full, line)?;
        }
        log::debug!("line {line}: measure {number} started");
        Ok(())
    }

    fn measure_end(&mut self, line: usize) -> MsrResult<()> {
        let Some(mut state) = self.part.take() else {
            return Err(MsrError::unsupported(line, "measure end outside of a part"));
        };
        let result = self.close_measure(&mut state, line);
        state.measure = None;
        state.attributes.clear();
        state.structure.clear();
        state.last_note = None;
        self.part = Some(state);
        result
    }

    fn close_measure(&mut self, state: &mut PartState, line: usize) -> MsrResult<()> {
        let number = state.measure_number().to_string();
        let end = MeasurePosition::new(state.high_water, &number)?;
        for voice_state in state.voices.values_mut() {
            if let Some(tuplet) = voice_state.tuplets.first() {
                return Err(MsrError::unsupported(
                    line,
                    format!(
                        "{} still open at the end of measure {number}",
                        self.score.element(*tuplet)
                    ),
                ));
            }
            if let Some(group) = voice_state.graces.take() {
                if let ElementKind::GraceNotesGroup(data) =
                    &mut self.score.elements[group].kind
                {
                    data.after = true;
                }
                self.score.append_element_to_voice(voice_state.voice, group)?;
            }
        }
        // finalized by the next measure start, or as the last one of the voice
        for voice in self.score.part_voices(state.part) {
            self.score.voice_move_cursor_to(voice, end, line)?;
        }
        log::debug!("line {line}: measure {number} ended at {end}");
        Ok(())
    }

    /// Voice of the part, created with its staff on first use.
    fn voice_state(&mut self, staff: i32, voice: i32, line: usize) -> MsrResult<&mut VoiceState> {
        let state = self
            .part
            .as_mut()
            .ok_or_else(|| MsrError::unsupported(line, "note outside of a part"))?;
        if !state.voices.contains_key(&voice) {
            let (number, implicit) = state.measure.clone().ok_or_else(|| {
                MsrError::unsupported(line, format!("voice {voice} used outside of a measure"))
            })?;
            let staff_handle = self.score.part_create_staff_if_absent(state.part, staff, line);
            let handle = self
                .score
                .staff_create_regular_voice_if_absent(staff_handle, voice, line);
            let full = self.score.part(state.part).full_measure_whole_notes();
            self.score
                .create_measure_in_voice(handle, &number, implicit, full, line)?;
            for event in state.structure.iter() {
                apply_structure(&mut self.score, handle, event, line)?;
            }
            for (attribute_staff, kind) in state.attributes.iter() {
                if attribute_staff.map(|s| s == staff).unwrap_or(true) {
                    self.score
                        .append_new_element_to_voice(handle, kind.clone(), line)?;
                }
            }
            state.voices.insert(
                voice,
                VoiceState {
                    voice: handle,
                    staff_number: staff,
                    tuplets: Vec::new(),
                    graces: None,
                    delayed: Vec::new(),
                },
            );
        }
        state
            .voices
            .get_mut(&voice)
            .ok_or_else(|| MsrError::unknown(line, format!("voice {voice}")))
    }

    /// Bring the voice measure cursor to the part cursor, unless a tuplet
    /// of the voice is being filled.
    fn reconcile_voice_cursor(&mut self, voice: i32, line: usize) -> MsrResult<()> {
        let state = self.part_state(line)?;
        let cursor = state.cursor;
        let Some(voice_state) = state.voices.get(&voice) else {
            return Err(MsrError::unknown(line, format!("voice {voice}")));
        };
        if !voice_state.tuplets.is_empty() {
            return Ok(());
        }
        let handle = voice_state.voice;
        self.score.voice_move_cursor_to(handle, cursor, line)
    }

    /// Repeat and compression boundaries apply to every voice of the
    /// part, including the ones created later in the measure.
    fn structure(&mut self, event: SourceEvent, line: usize) -> MsrResult<()> {
        let state = self.part_state(line)?;
        let part = state.part;
        state.structure.push(event.clone());
        for voice in self.score.part_voices(part) {
            apply_structure(&mut self.score, voice, &event, line)?;
        }
        Ok(())
    }

    fn replay_structure(&mut self, voice: Handle<Voice>, line: usize) -> MsrResult<()> {
        let events = self.part_state(line)?.structure.clone();
        for event in events.iter() {
            apply_structure(&mut self.score, voice, event, line)?;
        }
        Ok(())
    }

    /// Append a staff or part attribute to the matching voices now, and to
    /// the voices created later in the measure.
    fn append_attribute(
        &mut self,
        staff: Option<i32>,
        kind: ElementKind,
        remember: bool,
        line: usize,
    ) -> MsrResult<()> {
        let state = self.part_state(line)?;
        if state.measure.is_none() {
            return Err(MsrError::unsupported(
                line,
                format!("{} outside of a measure", kind.name()),
            ));
        }
        if remember {
            state.attributes.push((staff, kind.clone()));
        }
        let targets: Vec<_> = state
            .voices
            .iter()
            .filter(|(_, vs)| staff.map(|s| s == vs.staff_number).unwrap_or(true))
            .map(|(number, _)| *number)
            .collect();
        for number in targets {
            self.reconcile_voice_cursor(number, line)?;
            let voice = self.voice_state_known(number, line)?;
            self.score.append_new_element_to_voice(voice, kind.clone(), line)?;
        }
        Ok(())
    }

    fn voice_state_known(&mut self, voice: i32, line: usize) -> MsrResult<Handle<Voice>> {
        self.part_state(line)?
            .voices
            .get(&voice)
            .map(|vs| vs.voice)
            .ok_or_else(|| MsrError::unknown(line, format!("voice {voice}")))
    }

    fn clef(&mut self, clef: Clef, line: usize) -> MsrResult<()> {
        let ignore_redundant = self.options.ignore_redundant_clefs;
        let state = self.part_state(line)?;
        if state.clefs.get(&clef.staff_number) == Some(&clef) && ignore_redundant {
            log::warn!("line {line}: redundant clef {:?} ignored", clef.kind);
            return Ok(());
        }
        state.clefs.insert(clef.staff_number, clef);
        self.append_attribute(Some(clef.staff_number), ElementKind::Clef(clef), true, line)
    }

    fn key(&mut self, key: Key, line: usize) -> MsrResult<()> {
        let ignore_redundant = self.options.ignore_redundant_keys;
        let state = self.part_state(line)?;
        if state.key == Some(key) && ignore_redundant {
            log::warn!("line {line}: redundant key {} ignored", key.fifths);
            return Ok(());
        }
        state.key = Some(key);
        self.append_attribute(None, ElementKind::Key(key), true, line)
    }

    fn time(&mut self, time: TimeSignature, line: usize) -> MsrResult<()> {
        let state = self.part_state(line)?;
        let part = state.part;
        if state.measure.is_none() {
            return Err(MsrError::unsupported(line, "time outside of a measure"));
        }
        if self.score.part(part).time() == Some(&time) && self.options.ignore_redundant_times {
            log::warn!("line {line}: redundant time {time} ignored");
            return Ok(());
        }
        self.score.part_mut(part).set_time(time.clone());
        // the time applies to the measure it appears in
        let full = time.whole_notes_per_measure();
        for voice in self.score.part_voices(part) {
            if let Some(measure) = self.score.voice(voice).current_measure() {
                if !self.score.measure(measure).is_finalized() {
                    self.score.measure_mut(measure).set_full_duration(full);
                }
            }
        }
        self.append_attribute(None, ElementKind::Time(time), true, line)
    }

    fn words_direction(&self, text: String, placement: Placement) -> Direction {
        match self.options.words_conversion(&text) {
            WordsConversion::Words {
                style,
                placement: converted,
            } => Direction::Words {
                text,
                style,
                placement: match converted {
                    Placement::Unspecified => placement,
                    converted => converted,
                },
            },
            WordsConversion::Tempo => Direction::Tempo(text),
            WordsConversion::RehearsalMark => Direction::RehearsalMark(text),
            WordsConversion::Segno => Direction::Segno,
            WordsConversion::DalSegno(kind) => Direction::DalSegno { kind, text },
            WordsConversion::Coda(kind) => Direction::Coda(kind),
            WordsConversion::Hairpin(kind) => Direction::Hairpin { kind, text },
        }
    }

    fn direction(
        &mut self,
        direction: Direction,
        staff: i32,
        voice: i32,
        line: usize,
    ) -> MsrResult<()> {
        if matches!(direction, Direction::Hairpin { .. }) && self.options.ignore_wedges {
            return Ok(());
        }
        let handle = self.voice_state(staff, voice, line)?.voice;
        self.reconcile_voice_cursor(voice, line)?;
        self.score
            .append_new_element_to_voice(handle, ElementKind::Direction(direction), line)
            .map(|_| ())
    }

    /// Harmonies and figured basses go to their dedicated part voice, at
    /// the part cursor.
    fn part_level_element(
        &mut self,
        figured_bass: bool,
        line: usize,
        make: impl FnOnce(MeasurePosition) -> ElementKind,
    ) -> MsrResult<()> {
        let state = self.part_state(line)?;
        let (part, cursor) = (state.part, state.cursor);
        let (number, implicit) = state.measure.clone().ok_or_else(|| {
            MsrError::unsupported(line, "harmony or figured bass outside of a measure")
        })?;
        let existing = match figured_bass {
            false => self.score.part(part).harmonies_voice(),
            true => self.score.part(part).figured_bass_voice(),
        };
        let voice = match existing {
            Some(voice) => voice,
            None => {
                let voice = match figured_bass {
                    false => self.score.part_create_harmonies_voice_if_absent(part, line),
                    true => self.score.part_create_figured_bass_voice_if_absent(part, line),
                };
                let full = self.score.part(part).full_measure_whole_notes();
                self.score
                    .create_measure_in_voice(voice, &number, implicit, full, line)?;
                self.replay_structure(voice, line)?;
                voice
            }
        };
        self.score.voice_move_cursor_to(voice, cursor, line)?;
        self.score
            .append_new_element_to_voice(voice, make(cursor), line)
            .map(|_| ())
    }

    fn backup(&mut self, duration: WholeNotes, line: usize) -> MsrResult<()> {
        let state = self.part_state(line)?;
        let target = MeasurePosition::new(state.cursor.get() - duration, state.measure_number())
            .map_err(|err| err.with_line(line))?;
        log::debug!("line {line}: backup from {} to {target}", state.cursor);
        state.cursor = target;
        state.last_note = None;
        Ok(())
    }

    fn forward(&mut self, duration: WholeNotes, staff: i32, voice: i32, line: usize) -> MsrResult<()> {
        let handle = self.voice_state(staff, voice, line)?.voice;
        self.reconcile_voice_cursor(voice, line)?;
        let state = self.part_state(line)?;
        state.advance(duration);
        state.last_note = None;
        self.reconcile_voice_cursor(voice, line)?;
        log::debug!(
            "line {line}: forward {duration} in {}",
            self.score.voice(handle)
        );
        Ok(())
    }

    fn make_note(&mut self, event: &mut NoteEvent, voice: i32, line: usize) -> MsrResult<Note> {
        let options = &self.options;
        event.attachments.retain(|at| !options.ignores(at.kind));
        let mut note = Note::from_kind(event.pitch, event.duration, event.dots)
            .in_staff(event.staff, event.voice);
        if event.unpitched {
            note.kind = NoteKind::Unpitched;
        }
        if event.grace {
            note = note.as_grace();
        }
        let mut attachments = std::mem::take(&mut event.attachments);
        let delays: Vec<AttachmentKind> = AttachmentKind::all()
            .into_iter()
            .filter(|kind| options.delays_on_rests(*kind))
            .collect();
        let voice_state = self.voice_state(event.staff, voice, line)?;
        match note.is_rest() {
            true => {
                for kind in delays {
                    voice_state.delayed.extend(attachments.take_kind(kind));
                }
            }
            false if !event.grace => {
                for attachment in voice_state.delayed.drain(..) {
                    log::debug!("line {line}: delayed {attachment} attached");
                    attachments.push(attachment);
                }
            }
            false => (),
        }
        note.attachments = attachments;
        Ok(note)
    }

    fn note(&mut self, mut event: NoteEvent, line: usize) -> MsrResult<()> {
        let number = self.part_state(line)?.measure_number().to_string();
        if self.part_state(line)?.measure.is_none() {
            return Err(MsrError::unsupported(line, "note outside of a measure"));
        }
        if event.chord {
            return self.chord_member(event, line);
        }
        let voice = event.voice;
        let note = self.make_note(&mut event, voice, line)?;
        let display = note.display_whole_notes();
        self.reconcile_voice_cursor(voice, line)?;
        let voice_state = self.voice_state(event.staff, voice, line)?;
        let handle = voice_state.voice;
        if self.score.voice(handle).current_staff_number() != event.staff {
            let part = self.score.fetch_voice_up_link_to_part(handle);
            self.score.part_create_staff_if_absent(part, event.staff, line);
            self.score.append_voice_staff_change(handle, event.staff, line)?;
        }
        let element = self
            .score
            .alloc_element(MeasureElement::new(ElementKind::Note(note), line));
        if event.grace {
            self.append_grace(voice, element, &event, line)?;
            self.part_state(line)?.last_note = Some((voice, element));
            return Ok(());
        }
        self.flush_graces(voice, line)?;
        let composed = self.open_tuplets(voice, &event.tuplet_starts, line)?;
        let sounding = composed.apply(display);
        let top = self.voice_state(event.staff, voice, line)?.tuplets.last().copied();
        match top {
            Some(tuplet) => tuplet_append_member(&mut self.score.elements, tuplet, element)?,
            None => self.score.append_element_to_voice(handle, element)?,
        }
        for number in event.tuplet_stops.iter() {
            self.close_tuplet(voice, *number, line)?;
        }
        let state = self.part_state(line)?;
        state.advance(sounding);
        state.last_note = Some((voice, element));
        log::debug!("line {line}: note {sounding} in voice {voice}, measure {number}");
        Ok(())
    }

    /// Push the tuplets started by the note.
    ///
    /// # Returns
    /// the factor, that applies to the note.
    fn open_tuplets(
        &mut self,
        voice: i32,
        starts: &[TupletStart],
        line: usize,
    ) -> MsrResult<TupletFactor> {
        for start in starts {
            let tuplet = create_tuplet(
                &mut self.score.elements,
                start.number,
                start.factor,
                start.full_elements,
                line,
            );
            self.part_state(line)?
                .voices
                .get_mut(&voice)
                .ok_or_else(|| MsrError::unknown(line, format!("voice {voice}")))?
                .tuplets
                .push(tuplet);
        }
        let state = self.part_state(line)?;
        let tuplets = state
            .voices
            .get(&voice)
            .map(|vs| vs.tuplets.clone())
            .unwrap_or_default();
        Ok(tuplets
            .iter()
            .filter_map(|t| self.score.element(*t).as_tuplet().map(|t| t.factor()))
            .fold(TupletFactor::identity(), |acc, factor| factor.compose(&acc)))
    }

    /// Pop the tuplet `number` and put it into its container: the
    /// enclosing tuplet or the measure.
    fn close_tuplet(&mut self, voice: i32, number: i32, line: usize) -> MsrResult<()> {
        let Some(voice_state) = self.part.as_mut().and_then(|state| state.voices.get_mut(&voice))
        else {
            return Err(MsrError::unknown(line, format!("voice {voice}")));
        };
        let handle = voice_state.voice;
        let score = &self.score;
        let position = voice_state.tuplets.iter().rposition(|tuplet| {
            score
                .element(*tuplet)
                .as_tuplet()
                .map(|t| t.number() == number)
                .unwrap_or(false)
        });
        let Some(position) = position else {
            log::warn!("line {line}: tuplet {number} stops, but it was not started");
            return Ok(());
        };
        let closed = voice_state.tuplets.split_off(position);
        let parent = voice_state.tuplets.last().copied();
        // inner tuplets left open are closed with it
        for (index, tuplet) in closed.iter().enumerate().rev() {
            let container = match index {
                0 => parent,
                _ => Some(closed[index - 1]),
            };
            match container {
                Some(container) => {
                    tuplet_append_member(&mut self.score.elements, container, *tuplet)?
                }
                None => self.score.append_element_to_voice(handle, *tuplet)?,
            }
        }
        Ok(())
    }

    fn append_grace(
        &mut self,
        voice: i32,
        note: ElementHandle,
        event: &NoteEvent,
        line: usize,
    ) -> MsrResult<()> {
        let options = &self.options;
        let slashed = options.slash_all_grace_notes
            || event.attachments.has_kind(AttachmentKind::Slash);
        let slurred = options.slur_all_grace_notes;
        let beamed = options.beam_all_grace_notes;
        let existing = self.voice_state(event.staff, voice, line)?.graces;
        let group = match existing {
            Some(group) => group,
            None => {
                let group = self.score.alloc_element(MeasureElement::new(
                    ElementKind::GraceNotesGroup(GraceNotesGroup {
                        notes: Vec::new(),
                        slashed,
                        slurred,
                        beamed,
                        after: false,
                    }),
                    line,
                ));
                self.voice_state(event.staff, voice, line)?.graces = Some(group);
                group
            }
        };
        if let Some(children) = self.score.elements[group].children_mut() {
            children.push(note);
        }
        self.score.elements[note].set_container(Some(group));
        Ok(())
    }

    /// Grace notes group goes right before the note, that follows it.
    fn flush_graces(&mut self, voice: i32, line: usize) -> MsrResult<()> {
        let state = self.part_state(line)?;
        let Some(voice_state) = state.voices.get_mut(&voice) else {
            return Ok(());
        };
        let Some(group) = voice_state.graces.take() else {
            return Ok(());
        };
        let handle = voice_state.voice;
        self.score.append_element_to_voice(handle, group)
    }

    /// The note sounds with the previous one: make it a chord, if it is
    /// not one yet.
    fn chord_member(&mut self, mut event: NoteEvent, line: usize) -> MsrResult<()> {
        let Some((voice, previous)) = self.part_state(line)?.last_note else {
            return Err(MsrError::unsupported(line, "chord member without a previous note"));
        };
        let note = self.make_note(&mut event, voice, line)?;
        let element = self
            .score
            .alloc_element(MeasureElement::new(ElementKind::Note(note), line));
        let arena = &mut self.score.elements;
        let chord = match arena[previous].container() {
            Some(container) if arena[container].as_chord().is_some() => container,
            container => {
                let chord = create_chord_for_note(arena, previous)?;
                self.replace_in_container(container, previous, chord, line)?;
                chord_append_note(&mut self.score.elements, chord, previous)?;
                chord
            }
        };
        chord_append_note(&mut self.score.elements, chord, element)?;
        self.replace_top_level(chord);
        Ok(())
    }

    fn replace_in_container(
        &mut self,
        container: Option<ElementHandle>,
        old: ElementHandle,
        new: ElementHandle,
        line: usize,
    ) -> MsrResult<()> {
        let arena = &mut self.score.elements;
        match container {
            Some(container) if arena[container].as_tuplet().is_some() => {
                tuplet_replace_member(arena, container, old, new)?;
                // the voice stack refers to the tuplet, not to the member
                Ok(())
            }
            Some(container) => {
                if let Some(slot) = arena[container]
                    .children_mut()
                    .and_then(|children| children.iter_mut().find(|h| **h == old))
                {
                    *slot = new;
                }
                arena[new].set_container(Some(container));
                Ok(())
            }
            None => {
                let measure = arena[old].measure().ok_or_else(|| {
                    MsrError::unsupported(line, "note to make a chord of is not in a measure")
                })?;
                self.score.measures[measure].replace_element(&mut self.score.elements, old, new, line)
            }
        }
    }

    /// Recompute durations and positions of the outermost container of
    /// the element, after its content changed.
    fn replace_top_level(&mut self, element: ElementHandle) {
        let arena = &mut self.score.elements;
        let mut top = element;
        while let Some(container) = arena[top].container() {
            top = container;
        }
        if let Some(factor) = arena[element]
            .container()
            .and_then(|c| arena[c].as_tuplet().map(|t| t.effective_factor()))
        {
            refresh_sounding(arena, element, factor);
        }
        if let Some(measure) = arena[top].measure() {
            let position = arena[top].measure_position();
            let voice_position = arena[top].voice_position();
            place_element(arena, top, measure, position, voice_position);
        }
    }
}

fn apply_structure(
    score: &mut Score,
    voice: Handle<Voice>,
    event: &SourceEvent,
    line: usize,
) -> MsrResult<()> {
    match event {
        SourceEvent::RepeatStart => score.voice_repeat_start(voice, line).map(|_| ()),
        SourceEvent::RepeatEnd { times } => score.voice_repeat_end(voice, *times, line).map(|_| ()),
        SourceEvent::EndingStart { number } => score.voice_ending_start(voice, number, line),
        SourceEvent::EndingEnd { number, kind } => {
            score.voice_ending_end(voice, number, *kind, line)
        }
        SourceEvent::MultipleRestStart {
            measures,
            use_symbols,
        } => score
            .voice_start_multiple_measure_rest(voice, *measures, 0, *use_symbols, line)
            .map(|_| ()),
        SourceEvent::MeasureRepeatStart { measures, slashes } => score
            .voice_start_measure_repeat(voice, *measures, *slashes, line)
            .map(|_| ()),
        SourceEvent::MeasureRepeatStop => score.voice_stop_measure_repeat(voice, line),
        _ => Ok(()),
    }
}
