//! Part: one instrument, its staves and the dedicated harmonies and
//! figured bass voices.

use std::{collections::BTreeMap, fmt};

use crate::{
    errors::{MsrError, MsrResult},
    primitives::{divisions_per_quarter_note, TimeSignature, WholeNotes},
};

use super::{
    arena::Handle,
    measure::{PuristNumbering, ShortestNote},
    part_group::{PartGroup, PartGroupElement},
    score::Score,
    staff::Staff,
    voice::{Voice, VoiceKind},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    handle: Handle<Part>,
    id: String,
    name: String,
    group: Handle<PartGroup>,
    pub line: usize,
    staves: BTreeMap<i32, Handle<Staff>>,
    harmonies_voice: Option<Handle<Voice>>,
    figured_bass_voice: Option<Handle<Voice>>,
    shortest: Option<ShortestNote>,
    time: Option<TimeSignature>,
    measures_whole_notes: Vec<WholeNotes>,
    purist: PuristNumbering,
}
impl Part {
    pub fn new(
        handle: Handle<Part>,
        id: impl Into<String>,
        name: impl Into<String>,
        group: Handle<PartGroup>,
        line: usize,
    ) -> Self {
        Self {
            handle,
            id: id.into(),
            name: name.into(),
            group,
            line,
            staves: BTreeMap::new(),
            harmonies_voice: None,
            figured_bass_voice: None,
            shortest: None,
            time: None,
            measures_whole_notes: Vec::new(),
            purist: PuristNumbering::new(),
        }
    }
    pub fn handle(&self) -> Handle<Part> {
        self.handle
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn group(&self) -> Handle<PartGroup> {
        self.group
    }
    /// Staves ordered by number.
    pub fn staves(&self) -> impl Iterator<Item = Handle<Staff>> + '_ {
        self.staves.values().copied()
    }
    pub fn harmonies_voice(&self) -> Option<Handle<Voice>> {
        self.harmonies_voice
    }
    pub fn figured_bass_voice(&self) -> Option<Handle<Voice>> {
        self.figured_bass_voice
    }
    pub fn shortest_note(&self) -> Option<ShortestNote> {
        self.shortest
    }
    pub(crate) fn register_shortest_note(&mut self, shortest: ShortestNote) {
        self.shortest = Some(ShortestNote::merged(self.shortest, shortest));
    }
    /// Time signature in effect for the next measures.
    pub fn time(&self) -> Option<&TimeSignature> {
        self.time.as_ref()
    }
    pub fn set_time(&mut self, time: TimeSignature) {
        self.time = Some(time);
    }
    /// Durations of the part measures finalized so far, in order.
    pub fn measures_whole_notes(&self) -> &[WholeNotes] {
        &self.measures_whole_notes
    }
    /// Purist numbering state after the last finalized measure.
    pub fn purist(&self) -> &PuristNumbering {
        &self.purist
    }
    pub(crate) fn record_measure(&mut self, duration: WholeNotes, purist: PuristNumbering) {
        self.measures_whole_notes.push(duration);
        self.purist = purist;
    }
    /// Full measure duration from the current time signature.
    pub fn full_measure_whole_notes(&self) -> Option<WholeNotes> {
        self.time.as_ref()?.whole_notes_per_measure()
    }
}
impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.is_empty() {
            true => write!(f, "part \"{}\"", self.id),
            false => write!(f, "part \"{}\" ({})", self.id, self.name),
        }
    }
}

impl Score {
    pub fn create_part(
        &mut self,
        group: Handle<PartGroup>,
        id: &str,
        name: &str,
        line: usize,
    ) -> Handle<Part> {
        let part = self
            .parts
            .alloc_with(|h| Part::new(h, id, name, group, line));
        self.part_groups[group]
            .elements
            .push(PartGroupElement::Part(part));
        log::info!("line {line}: {} created", self.parts[part]);
        part
    }

    pub fn part_create_staff_if_absent(
        &mut self,
        part: Handle<Part>,
        number: i32,
        line: usize,
    ) -> Handle<Staff> {
        if let Some(staff) = self.parts[part].staves.get(&number) {
            return *staff;
        }
        let staff = self
            .staves
            .alloc_with(|h| Staff::new(h, number, part, line));
        self.parts[part].staves.insert(number, staff);
        log::debug!("line {line}: staff {number} created in {}", self.parts[part]);
        staff
    }

    /// # Errors
    /// `UnknownStaffOrVoice` if the part has no such staff.
    pub fn part_fetch_staff(
        &self,
        part: Handle<Part>,
        number: i32,
        line: usize,
    ) -> MsrResult<Handle<Staff>> {
        self.parts[part]
            .staves
            .get(&number)
            .copied()
            .ok_or_else(|| {
                MsrError::unknown(line, format!("staff {number} in {}", self.parts[part]))
            })
    }

    pub fn part_fetch_voice(
        &self,
        part: Handle<Part>,
        staff: i32,
        voice: i32,
        line: usize,
    ) -> MsrResult<Handle<Voice>> {
        let staff = self.part_fetch_staff(part, staff, line)?;
        self.staff_fetch_voice(staff, voice, line)
    }

    /// The part holds at most one harmonies voice.
    pub fn part_create_harmonies_voice_if_absent(
        &mut self,
        part: Handle<Part>,
        line: usize,
    ) -> Handle<Voice> {
        if let Some(voice) = self.parts[part].harmonies_voice {
            return voice;
        }
        let voice = self.create_voice(part, None, 0, VoiceKind::Harmonies, line);
        self.parts[part].harmonies_voice = Some(voice);
        voice
    }

    /// The part holds at most one figured bass voice.
    pub fn part_create_figured_bass_voice_if_absent(
        &mut self,
        part: Handle<Part>,
        line: usize,
    ) -> Handle<Voice> {
        if let Some(voice) = self.parts[part].figured_bass_voice {
            return voice;
        }
        let voice = self.create_voice(part, None, 0, VoiceKind::FiguredBass, line);
        self.parts[part].figured_bass_voice = Some(voice);
        voice
    }

    /// Harmonies voice, figured bass voice, then the staves voices.
    pub fn part_voices(&self, part: Handle<Part>) -> Vec<Handle<Voice>> {
        let data = &self.parts[part];
        data.harmonies_voice
            .into_iter()
            .chain(data.figured_bass_voice)
            .chain(
                data.staves()
                    .flat_map(|staff| self.staves[staff].voices().collect::<Vec<_>>()),
            )
            .collect()
    }

    /// Divisions per quarter note, that express the shortest note of the
    /// part as an integer.
    pub fn part_divisions_per_quarter_note(&self, part: Handle<Part>) -> u64 {
        self.parts[part]
            .shortest
            .map(|shortest| divisions_per_quarter_note(shortest.sounding))
            .unwrap_or(1)
    }

    pub fn fetch_part_up_link_to_part_group(&self, part: Handle<Part>) -> Handle<PartGroup> {
        self.parts[part].group
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        dom::{
            element::ElementKind, measure::MeasureImplicitKind, note::Note,
            score::Score, voice::VoiceKind,
        },
        errors::MsrError,
        primitives::WholeNotes,
    };

    #[test]
    fn voices_and_divisions() {
        let mut score = Score::new();
        let voice = score.test_voice();
        let part = score.fetch_voice_up_link_to_part(voice);
        let harmonies = score.part_create_harmonies_voice_if_absent(part, 3);
        assert_eq!(score.part_create_harmonies_voice_if_absent(part, 4), harmonies);
        assert_eq!(score.voice(harmonies).kind(), VoiceKind::Harmonies);
        assert_eq!(score.part_voices(part), [harmonies, voice]);
        assert!(matches!(
            score.part_fetch_voice(part, 2, 1, 5),
            Err(MsrError::UnknownStaffOrVoice { line: 5, .. })
        ));
        assert_eq!(score.part_fetch_voice(part, 1, 1, 5).unwrap(), voice);

        assert_eq!(score.part_divisions_per_quarter_note(part), 1);
        score
            .create_measure_in_voice(voice, "1", MeasureImplicitKind::No, None, 6)
            .unwrap();
        score
            .append_new_element_to_voice(
                voice,
                ElementKind::Note(Note::rest(WholeNotes::new(1, 16).unwrap())),
                7,
            )
            .unwrap();
        score.voice_finalize_current_measure(voice, 8).unwrap();
        assert_eq!(score.part_divisions_per_quarter_note(part), 4);
    }
}
