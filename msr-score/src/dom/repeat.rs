//! Repeats: a common part, followed by alternate endings.
//!
//! A repeat is built incrementally, its phase only moves forward:
//!
//! ```text
//! JustCreated ──set_common_part──▶ InCommonPart ──add_ending──▶ InEndings
//!                                        │                         │
//!                                        └────────complete─────────┴──▶ Completed
//! ```
//!
//! Everything else is rejected with `InvalidRepeatPhase`.

use crate::errors::{MsrError, MsrResult};

use super::{
    arena::Handle,
    measure::{Measure, MeasureRepeatContextKind},
    score::Score,
    voice::{RepeatDescriptor, Voice, VoiceElement},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepeatPhase {
    JustCreated,
    InCommonPart,
    InEndings,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RepeatEvent {
    SetCommonPart,
    AddEnding,
    Complete,
}

impl RepeatPhase {
    fn on(self, event: RepeatEvent) -> Option<Self> {
        use RepeatEvent as E;
        match (self, event) {
            (Self::JustCreated | Self::InCommonPart, E::SetCommonPart) => {
                Some(Self::InCommonPart)
            }
            (Self::InCommonPart | Self::InEndings, E::AddEnding) => {
                Some(Self::InEndings)
            }
            (Self::InCommonPart | Self::InEndings, E::Complete) => {
                Some(Self::Completed)
            }
            _ => None,
        }
    }
}

/// Hooked endings end with a bracket hook (`<ending type="stop">`),
/// hookless ones are left open (`type="discontinue"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RepeatEndingKind {
    #[default]
    Hooked,
    Hookless,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepeatCommonPart {
    pub line: usize,
    elements: Vec<VoiceElement>,
}
impl RepeatCommonPart {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            elements: Vec::new(),
        }
    }
    pub fn elements(&self) -> &[VoiceElement] {
        &self.elements
    }
    pub(crate) fn elements_mut(&mut self) -> &mut Vec<VoiceElement> {
        &mut self.elements
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepeatEnding {
    pub line: usize,
    /// As written: `"1"`, `"1, 2"`...
    number: String,
    kind: RepeatEndingKind,
    internal_number: usize,
    elements: Vec<VoiceElement>,
}
impl RepeatEnding {
    pub fn new(number: impl Into<String>, kind: RepeatEndingKind, line: usize) -> Self {
        Self {
            line,
            number: number.into(),
            kind,
            internal_number: 0,
            elements: Vec::new(),
        }
    }
    pub fn number(&self) -> &str {
        &self.number
    }
    pub fn kind(&self) -> RepeatEndingKind {
        self.kind
    }
    pub(crate) fn set_kind(&mut self, kind: RepeatEndingKind) {
        self.kind = kind;
    }
    /// Position among the endings of the repeat, starting from 1.
    pub fn internal_number(&self) -> usize {
        self.internal_number
    }
    pub fn elements(&self) -> &[VoiceElement] {
        &self.elements
    }
    pub(crate) fn elements_mut(&mut self) -> &mut Vec<VoiceElement> {
        &mut self.elements
    }
    fn numbers(&self) -> impl Iterator<Item = &str> {
        self.number.split(',').map(str::trim).filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repeat {
    handle: Handle<Repeat>,
    voice: Handle<Voice>,
    pub line: usize,
    times: u32,
    explicit_start: bool,
    phase: RepeatPhase,
    common_part: Option<RepeatCommonPart>,
    endings: Vec<RepeatEnding>,
    previous: Option<Handle<Repeat>>,
    next: Option<Handle<Repeat>>,
}
impl Repeat {
    pub fn new(
        handle: Handle<Repeat>,
        voice: Handle<Voice>,
        explicit_start: bool,
        line: usize,
    ) -> Self {
        Self {
            handle,
            voice,
            line,
            times: 2,
            explicit_start,
            phase: RepeatPhase::JustCreated,
            common_part: None,
            endings: Vec::new(),
            previous: None,
            next: None,
        }
    }

    pub fn handle(&self) -> Handle<Repeat> {
        self.handle
    }
    pub fn voice(&self) -> Handle<Voice> {
        self.voice
    }
    pub fn phase(&self) -> RepeatPhase {
        self.phase
    }
    pub fn is_complete(&self) -> bool {
        self.phase == RepeatPhase::Completed
    }
    /// How many times the common part is played.
    pub fn times(&self) -> u32 {
        self.times
    }
    pub fn set_times(&mut self, times: u32) {
        self.times = times.max(1);
    }
    /// Whether the source had a forward repeat bar line.
    pub fn explicit_start(&self) -> bool {
        self.explicit_start
    }
    pub fn common_part(&self) -> Option<&RepeatCommonPart> {
        self.common_part.as_ref()
    }
    pub(crate) fn common_part_mut(&mut self) -> Option<&mut RepeatCommonPart> {
        self.common_part.as_mut()
    }
    pub fn endings(&self) -> &[RepeatEnding] {
        &self.endings
    }
    pub(crate) fn last_ending_mut(&mut self) -> Option<&mut RepeatEnding> {
        self.endings.last_mut()
    }
    pub fn previous(&self) -> Option<Handle<Repeat>> {
        self.previous
    }
    pub fn next(&self) -> Option<Handle<Repeat>> {
        self.next
    }
    pub(crate) fn set_previous(&mut self, previous: Option<Handle<Repeat>>) {
        self.previous = previous;
    }
    pub(crate) fn set_next(&mut self, next: Option<Handle<Repeat>>) {
        self.next = next;
    }

    fn transition(&mut self, event: RepeatEvent, line: usize) -> MsrResult<()> {
        match self.phase.on(event) {
            Some(phase) => {
                log::debug!("line {line}: repeat {:?} → {phase:?}", self.phase);
                self.phase = phase;
                Ok(())
            }
            None => {
                let message = match (self.phase, event) {
                    (RepeatPhase::Completed, _) => {
                        "completed repeat can not be reopened".to_string()
                    }
                    (RepeatPhase::JustCreated, RepeatEvent::AddEnding) => {
                        "ending added before the repeat common part".to_string()
                    }
                    (phase, event) => {
                        format!("repeat can not handle {event:?} in phase {phase:?}")
                    }
                };
                Err(MsrError::repeat_phase(line, message))
            }
        }
    }

    pub fn set_common_part(
        &mut self,
        common_part: RepeatCommonPart,
        line: usize,
    ) -> MsrResult<()> {
        self.transition(RepeatEvent::SetCommonPart, line)?;
        self.common_part = Some(common_part);
        Ok(())
    }

    /// # Errors
    /// - `InvalidRepeatPhase` before the common part is set, or after
    ///   completion.
    /// - `UnsupportedConstruct` if the ending numbers conflict with an
    ///   existing ending.
    pub fn add_ending(
        &mut self,
        mut ending: RepeatEnding,
        line: usize,
    ) -> MsrResult<()> {
        if let Some(existing) = self
            .endings
            .iter()
            .find(|existing| existing.numbers().any(|n| ending.numbers().any(|m| m == n)))
        {
            return Err(MsrError::unsupported(
                line,
                format!(
                    "repeat ending \"{}\" conflicts with ending \"{}\"",
                    ending.number, existing.number
                ),
            ));
        }
        self.transition(RepeatEvent::AddEnding, line)?;
        ending.internal_number = self.endings.len() + 1;
        log::debug!(
            "line {line}: repeat ending \"{}\" added as #{}",
            ending.number,
            ending.internal_number
        );
        self.endings.push(ending);
        Ok(())
    }

    pub fn complete(&mut self, line: usize) -> MsrResult<()> {
        self.transition(RepeatEvent::Complete, line)?;
        log::info!(
            "line {line}: repeat completed with {} ending(s), played {} times",
            self.endings.len(),
            self.times
        );
        Ok(())
    }
}

impl Score {
    /// Complete the repeats, whose last ending has ended and no other
    /// ending followed.
    pub(crate) fn complete_pending_repeats(
        &mut self,
        voice: Handle<Voice>,
        line: usize,
    ) -> MsrResult<()> {
        while let Some(top) = self.voices[voice].repeats.last().copied() {
            let pending = self.repeats[top.repeat].phase() == RepeatPhase::InEndings
                && !top.ending_open;
            if !pending {
                break;
            }
            self.voices[voice].repeats.pop();
            self.complete_repeat(voice, top.repeat, line)?;
        }
        Ok(())
    }

    fn complete_repeat(
        &mut self,
        voice: Handle<Voice>,
        repeat: Handle<Repeat>,
        line: usize,
    ) -> MsrResult<()> {
        self.repeats[repeat].complete(line)?;
        let data = &mut self.voices[voice];
        data.purist.end_repeat();
        data.current_segment = None;
        if let Some(previous) = data.last_repeat.replace(repeat) {
            self.repeats[previous].set_next(Some(repeat));
            self.repeats[repeat].set_previous(Some(previous));
        }
        Ok(())
    }

    /// Repeats left open at the end of the voice are closed where they
    /// are.
    pub(crate) fn close_dangling_repeats(
        &mut self,
        voice: Handle<Voice>,
        line: usize,
    ) -> MsrResult<()> {
        while let Some(top) = self.voices[voice].repeats.pop() {
            log::warn!("line {line}: repeat left open at the end of the voice");
            self.complete_repeat(voice, top.repeat, line)?;
        }
        Ok(())
    }

    /// A repeat boundary met in a measure, that has just been created:
    /// the measure is detached, so that it can go to the new part.
    pub(crate) fn detach_just_created_measure(
        &mut self,
        voice: Handle<Voice>,
        line: usize,
    ) -> MsrResult<Option<Handle<Measure>>> {
        let Some(measure) = self.voices[voice].current_measure else {
            return Ok(None);
        };
        let data = &self.measures[measure];
        if data.is_finalized() || data.contains_music() {
            return Ok(None);
        }
        let Some(segment) = data.segment() else {
            return Ok(None);
        };
        if self.segments[segment].last_measure() != Some(measure) {
            return Ok(None);
        }
        self.segments[segment].remove_last_measure(&mut self.measures, measure, line)?;
        if self.segments[segment].is_empty() {
            self.voice_remove_segment(voice, segment);
        }
        self.voices[voice].current_segment = None;
        log::debug!(
            "line {line}: measure {} detached",
            self.measures[measure].number()
        );
        Ok(Some(measure))
    }

    pub(crate) fn reattach_measure(
        &mut self,
        voice: Handle<Voice>,
        measure: Handle<Measure>,
        line: usize,
    ) -> MsrResult<()> {
        let segment = self.voice_open_segment(voice, line)?;
        self.segments[segment].append_measure(&mut self.measures, measure);
        Ok(())
    }

    /// Elements since the previous repeat become the common part of a
    /// repeat, that had no forward bar line.
    fn create_implicit_repeat(
        &mut self,
        voice: Handle<Voice>,
        line: usize,
    ) -> MsrResult<Handle<Repeat>> {
        let repeat = self.repeats.alloc_with(|h| Repeat::new(h, voice, false, line));
        let target = self.voice_target(voice, line)?;
        let start = target
            .iter()
            .rposition(|el| matches!(el, VoiceElement::Repeat(_)))
            .map(|index| index + 1)
            .unwrap_or(0);
        let mut common_part = RepeatCommonPart::new(line);
        common_part.elements_mut().extend(target.drain(start..));
        target.push(VoiceElement::Repeat(repeat));
        self.repeats[repeat].set_common_part(common_part, line)?;
        log::debug!("line {line}: implicit repeat start in {}", self.voices[voice]);
        Ok(repeat)
    }

    fn set_current_measure_context(
        &mut self,
        voice: Handle<Voice>,
        context: MeasureRepeatContextKind,
    ) {
        if let Some(measure) = self.voices[voice].current_measure {
            self.measures[measure].set_repeat_context(context);
        }
    }

    /// Forward repeat bar line.
    pub fn voice_repeat_start(
        &mut self,
        voice: Handle<Voice>,
        line: usize,
    ) -> MsrResult<Handle<Repeat>> {
        self.complete_pending_repeats(voice, line)?;
        let detached = self.detach_just_created_measure(voice, line)?;
        self.voices[voice].current_segment = None;
        let repeat = self.repeats.alloc_with(|h| Repeat::new(h, voice, true, line));
        self.voice_target(voice, line)?
            .push(VoiceElement::Repeat(repeat));
        self.repeats[repeat].set_common_part(RepeatCommonPart::new(line), line)?;
        self.voices[voice].repeats.push(RepeatDescriptor {
            repeat,
            ending_open: false,
        });
        if let Some(measure) = detached {
            self.reattach_measure(voice, measure, line)?;
        }
        Ok(repeat)
    }

    /// Backward repeat bar line.
    ///
    /// Inside an open ending only the repeat count is taken, the ending
    /// goes on until its own end. The same holds right after an ending
    /// end in the same bar line, as `<ending type="stop"/>` precedes
    /// `<repeat direction="backward"/>`: the repeat stays pending until
    /// the next ending or the next append.
    pub fn voice_repeat_end(
        &mut self,
        voice: Handle<Voice>,
        times: u32,
        line: usize,
    ) -> MsrResult<Handle<Repeat>> {
        if let Some(top) = self.voices[voice].repeats.last().copied() {
            let ending_just_ended =
                self.repeats[top.repeat].phase() == RepeatPhase::InEndings;
            if top.ending_open || ending_just_ended {
                self.repeats[top.repeat].set_times(times);
                return Ok(top.repeat);
            }
        }
        self.complete_pending_repeats(voice, line)?;
        let repeat = match self.voices[voice].repeats.last().copied() {
            Some(top) if self.repeats[top.repeat].phase() == RepeatPhase::InCommonPart => {
                self.voices[voice].repeats.pop();
                top.repeat
            }
            _ => self.create_implicit_repeat(voice, line)?,
        };
        self.repeats[repeat].set_times(times);
        self.set_current_measure_context(voice, MeasureRepeatContextKind::CommonPartLastMeasure);
        self.complete_repeat(voice, repeat, line)?;
        self.voices[voice].next_context = MeasureRepeatContextKind::NextMeasureAfterCommonPart;
        Ok(repeat)
    }

    /// # Errors
    /// - `InvalidRepeatPhase` if another ending is still open.
    /// - `UnsupportedConstruct` if the current measure already has music.
    pub fn voice_ending_start(
        &mut self,
        voice: Handle<Voice>,
        number: &str,
        line: usize,
    ) -> MsrResult<()> {
        let top = self.voices[voice].repeats.last().copied();
        if top.map(|top| top.ending_open).unwrap_or(false) {
            return Err(MsrError::repeat_phase(
                line,
                format!("ending \"{number}\" starts before the previous one ended"),
            ));
        }
        let detached = self.detach_just_created_measure(voice, line)?;
        if detached.is_none() {
            if let Some(measure) = self.voices[voice].current_measure {
                let data = &self.measures[measure];
                if !data.is_finalized() && data.contains_music() {
                    return Err(MsrError::unsupported(
                        line,
                        format!(
                            "ending \"{number}\" starts in the middle of measure {}",
                            data.number()
                        ),
                    ));
                }
            }
        }
        let repeat = match top {
            Some(top) => top.repeat,
            None => {
                let repeat = self.create_implicit_repeat(voice, line)?;
                self.voices[voice].repeats.push(RepeatDescriptor {
                    repeat,
                    ending_open: false,
                });
                repeat
            }
        };
        self.repeats[repeat].add_ending(
            RepeatEnding::new(number, RepeatEndingKind::Hooked, line),
            line,
        )?;
        let data = &mut self.voices[voice];
        if let Some(top) = data.repeats.last_mut() {
            top.ending_open = true;
        }
        data.purist.start_ending();
        data.current_segment = None;
        if let Some(measure) = detached {
            self.reattach_measure(voice, measure, line)?;
        }
        Ok(())
    }

    pub fn voice_ending_end(
        &mut self,
        voice: Handle<Voice>,
        number: &str,
        kind: RepeatEndingKind,
        line: usize,
    ) -> MsrResult<()> {
        let top = match self.voices[voice].repeats.last().copied() {
            Some(top) if top.ending_open => top,
            _ => {
                return Err(MsrError::repeat_phase(
                    line,
                    format!("ending \"{number}\" ends, but no ending is open"),
                ))
            }
        };
        if let Some(ending) = self.repeats[top.repeat].last_ending_mut() {
            if ending.number() != number {
                log::warn!(
                    "line {line}: ending \"{}\" ended as \"{number}\"",
                    ending.number()
                );
            }
            ending.set_kind(kind);
        }
        let (context, next_context) = match kind {
            RepeatEndingKind::Hooked => (
                MeasureRepeatContextKind::HookedEndingLastMeasure,
                MeasureRepeatContextKind::NextMeasureAfterHookedEnding,
            ),
            RepeatEndingKind::Hookless => (
                MeasureRepeatContextKind::HooklessEndingLastMeasure,
                MeasureRepeatContextKind::NextMeasureAfterHooklessEnding,
            ),
        };
        self.set_current_measure_context(voice, context);
        let data = &mut self.voices[voice];
        if let Some(top) = data.repeats.last_mut() {
            top.ending_open = false;
        }
        data.current_segment = None;
        data.next_context = next_context;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Repeat, RepeatCommonPart, RepeatEnding, RepeatEndingKind, RepeatPhase};
    use crate::{
        dom::score::Score,
        errors::MsrError,
    };

    #[test]
    fn ending_before_common_part() {
        let mut score = Score::new();
        let voice = score.test_voice();
        let repeat = score.repeats.alloc_with(|h| Repeat::new(h, voice, true, 1));
        let repeat = &mut score.repeats[repeat];
        let err = repeat
            .add_ending(RepeatEnding::new("1", RepeatEndingKind::Hooked, 12), 12)
            .unwrap_err();
        assert!(matches!(err, MsrError::InvalidRepeatPhase { line: 12, .. }));
        assert_eq!(repeat.phase(), RepeatPhase::JustCreated);
    }

    #[test]
    fn full_cycle() {
        let mut score = Score::new();
        let voice = score.test_voice();
        let repeat = score.repeats.alloc_with(|h| Repeat::new(h, voice, false, 1));
        let repeat = &mut score.repeats[repeat];
        repeat.set_common_part(RepeatCommonPart::new(1), 1).unwrap();
        repeat
            .add_ending(RepeatEnding::new("1, 2", RepeatEndingKind::Hooked, 2), 2)
            .unwrap();
        assert!(matches!(
            repeat.add_ending(RepeatEnding::new("2", RepeatEndingKind::Hookless, 3), 3),
            Err(MsrError::UnsupportedConstruct { line: 3, .. })
        ));
        repeat
            .add_ending(RepeatEnding::new("3", RepeatEndingKind::Hookless, 4), 4)
            .unwrap();
        assert!(repeat.set_common_part(RepeatCommonPart::new(5), 5).is_err());
        repeat.complete(6).unwrap();
        assert!(repeat.is_complete());
        assert_eq!(repeat.endings()[1].internal_number(), 2);
        assert!(matches!(
            repeat.add_ending(RepeatEnding::new("4", RepeatEndingKind::Hooked, 7), 7),
            Err(MsrError::InvalidRepeatPhase { line: 7, .. })
        ));
    }
}
