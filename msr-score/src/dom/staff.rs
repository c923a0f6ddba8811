use std::{collections::BTreeMap, fmt};

use crate::errors::{MsrError, MsrResult};

use super::{
    arena::Handle,
    measure::ShortestNote,
    part::Part,
    score::Score,
    voice::{Voice, VoiceKind},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staff {
    handle: Handle<Staff>,
    number: i32,
    part: Handle<Part>,
    pub line: usize,
    voices: BTreeMap<i32, Handle<Voice>>,
    shortest: Option<ShortestNote>,
}
impl Staff {
    pub fn new(handle: Handle<Staff>, number: i32, part: Handle<Part>, line: usize) -> Self {
        Self {
            handle,
            number,
            part,
            line,
            voices: BTreeMap::new(),
            shortest: None,
        }
    }
    pub fn handle(&self) -> Handle<Staff> {
        self.handle
    }
    pub fn number(&self) -> i32 {
        self.number
    }
    pub fn part(&self) -> Handle<Part> {
        self.part
    }
    /// Voices ordered by number.
    pub fn voices(&self) -> impl Iterator<Item = Handle<Voice>> + '_ {
        self.voices.values().copied()
    }
    pub fn shortest_note(&self) -> Option<ShortestNote> {
        self.shortest
    }
    pub(crate) fn register_shortest_note(&mut self, shortest: ShortestNote) {
        self.shortest = Some(ShortestNote::merged(self.shortest, shortest));
    }
}
impl fmt::Display for Staff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "staff {}", self.number)
    }
}

impl Score {
    /// Voice `number` of the staff, created on first use.
    pub fn staff_create_regular_voice_if_absent(
        &mut self,
        staff: Handle<Staff>,
        number: i32,
        line: usize,
    ) -> Handle<Voice> {
        if let Some(voice) = self.staves[staff].voices.get(&number) {
            return *voice;
        }
        let part = self.staves[staff].part;
        let staff_number = self.staves[staff].number;
        let voice = self.create_voice(
            part,
            Some((staff, staff_number)),
            number,
            VoiceKind::Regular,
            line,
        );
        self.staves[staff].voices.insert(number, voice);
        voice
    }

    /// # Errors
    /// `UnknownStaffOrVoice` if the staff has no such voice.
    pub fn staff_fetch_voice(
        &self,
        staff: Handle<Staff>,
        number: i32,
        line: usize,
    ) -> MsrResult<Handle<Voice>> {
        self.staves[staff]
            .voices
            .get(&number)
            .copied()
            .ok_or_else(|| {
                MsrError::unknown(
                    line,
                    format!("voice {number} in {}", self.staves[staff]),
                )
            })
    }

    pub fn fetch_staff_up_link_to_part(&self, staff: Handle<Staff>) -> Handle<Part> {
        self.staves[staff].part
    }
}

#[cfg(test)]
mod tests {
    use crate::{dom::score::Score, errors::MsrError};

    #[test]
    fn voices_by_number() {
        let mut score = Score::new();
        let voice = score.test_voice();
        let staff = score.fetch_voice_up_link_to_staff(voice).unwrap();
        assert_eq!(score.staff_create_regular_voice_if_absent(staff, 1, 2), voice);
        let second = score.staff_create_regular_voice_if_absent(staff, 2, 2);
        assert_ne!(second, voice);
        assert_eq!(score.staff(staff).voices().collect::<Vec<_>>(), [voice, second]);
        assert_eq!(score.staff_fetch_voice(staff, 2, 3).unwrap(), second);
        assert!(matches!(
            score.staff_fetch_voice(staff, 3, 4),
            Err(MsrError::UnknownStaffOrVoice { line: 4, .. })
        ));
    }
}
