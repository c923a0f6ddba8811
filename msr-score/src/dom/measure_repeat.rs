//! Measures shown as repetitions of the preceding ones (`%` signs).
//!
//! The repeated measures form the pattern, the repetitions form the
//! replicas. Both keep the original measures, so the expansion is
//! lossless.

use crate::errors::{MsrError, MsrResult};

use super::{
    arena::{Arena, Handle},
    measure::Measure,
    score::Score,
    segment::Segment,
    voice::{Compressed, Voice, VoiceElement},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasureRepeatPhase {
    JustCreated,
    InPattern,
    InReplicas,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum MeasureRepeatEvent {
    SetPattern,
    AppendReplica,
    Complete,
}

impl MeasureRepeatPhase {
    /// Allowed transitions. `None` for the illegal ones.
    fn on(self, event: MeasureRepeatEvent) -> Option<Self> {
        use MeasureRepeatEvent as E;
        match (self, event) {
            (Self::JustCreated, E::SetPattern) => Some(Self::InPattern),
            (Self::InPattern | Self::InReplicas, E::AppendReplica) => {
                Some(Self::InReplicas)
            }
            (Self::InReplicas, E::Complete) => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Pattern or replicas: measures, that can be finalized once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeasureRepeatMeasures {
    measures: Vec<Handle<Measure>>,
    finalized: bool,
}
impl MeasureRepeatMeasures {
    pub fn measures(&self) -> &[Handle<Measure>] {
        &self.measures
    }
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
    fn finalize(&mut self, what: &str, line: usize) -> MsrResult<()> {
        if self.finalized {
            return Err(MsrError::DoubleFinalization {
                line,
                what: format!("measure repeat {what}"),
            });
        }
        self.finalized = true;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureRepeat {
    handle: Handle<MeasureRepeat>,
    pub line: usize,
    pattern_measures_number: usize,
    slashes_number: u32,
    phase: MeasureRepeatPhase,
    pattern: MeasureRepeatMeasures,
    replicas: MeasureRepeatMeasures,
    segment: Option<Handle<Segment>>,
}
impl MeasureRepeat {
    pub fn new(
        handle: Handle<MeasureRepeat>,
        pattern_measures_number: usize,
        slashes_number: u32,
        line: usize,
    ) -> Self {
        Self {
            handle,
            line,
            pattern_measures_number,
            slashes_number,
            phase: MeasureRepeatPhase::JustCreated,
            pattern: MeasureRepeatMeasures::default(),
            replicas: MeasureRepeatMeasures::default(),
            segment: None,
        }
    }

    pub fn handle(&self) -> Handle<MeasureRepeat> {
        self.handle
    }
    pub fn phase(&self) -> MeasureRepeatPhase {
        self.phase
    }
    pub fn pattern_measures_number(&self) -> usize {
        self.pattern_measures_number
    }
    pub fn slashes_number(&self) -> u32 {
        self.slashes_number
    }
    pub fn pattern(&self) -> &MeasureRepeatMeasures {
        &self.pattern
    }
    pub fn replicas(&self) -> &MeasureRepeatMeasures {
        &self.replicas
    }
    /// Amount of times the pattern is replicated.
    pub fn replicas_number(&self) -> usize {
        match self.pattern_measures_number {
            0 => 0,
            n => self.replicas.measures.len() / n,
        }
    }
    pub fn segment(&self) -> Option<Handle<Segment>> {
        self.segment
    }
    pub(crate) fn set_segment(&mut self, segment: Handle<Segment>) {
        self.segment = Some(segment);
    }

    fn transition(
        &mut self,
        event: MeasureRepeatEvent,
        line: usize,
    ) -> MsrResult<()> {
        match self.phase.on(event) {
            Some(phase) => {
                log::debug!(
                    "line {line}: measure repeat {:?} → {phase:?}",
                    self.phase
                );
                self.phase = phase;
                Ok(())
            }
            None => Err(MsrError::repeat_phase(
                line,
                format!(
                    "measure repeat can not handle {event:?} in phase {:?}",
                    self.phase
                ),
            )),
        }
    }

    pub fn set_pattern(
        &mut self,
        measures: &mut Arena<Measure>,
        pattern: Vec<Handle<Measure>>,
        line: usize,
    ) -> MsrResult<()> {
        if pattern.len() != self.pattern_measures_number {
            return Err(MsrError::unsupported(
                line,
                format!(
                    "measure repeat pattern of {} measures got {}",
                    self.pattern_measures_number,
                    pattern.len()
                ),
            ));
        }
        self.transition(MeasureRepeatEvent::SetPattern, line)?;
        for measure in pattern.iter() {
            measures[*measure].set_segment(self.segment);
        }
        self.pattern.measures = pattern;
        Ok(())
    }

    pub fn append_replica_measure(
        &mut self,
        measures: &mut Arena<Measure>,
        measure: Handle<Measure>,
        line: usize,
    ) -> MsrResult<()> {
        if self.replicas.finalized {
            return Err(MsrError::repeat_phase(
                line,
                "measure repeat replicas are already finalized",
            ));
        }
        self.transition(MeasureRepeatEvent::AppendReplica, line)?;
        measures[measure].set_segment(self.segment);
        self.replicas.measures.push(measure);
        Ok(())
    }

    /// Take back the last replica, if it is `measure`.
    pub(crate) fn detach_last_replica(
        &mut self,
        measures: &mut Arena<Measure>,
        measure: Handle<Measure>,
    ) -> bool {
        match self.replicas.measures.last() == Some(&measure) && !self.replicas.finalized {
            true => {
                self.replicas.measures.pop();
                measures[measure].set_segment(None);
                true
            }
            false => false,
        }
    }

    pub fn finalize_pattern(&mut self, line: usize) -> MsrResult<()> {
        self.pattern.finalize("pattern", line)
    }
    pub fn finalize_replicas(&mut self, line: usize) -> MsrResult<()> {
        self.replicas.finalize("replicas", line)
    }

    /// # Errors
    /// `InvalidRepeatPhase` if no replica has been appended.
    pub fn complete(&mut self, line: usize) -> MsrResult<()> {
        self.transition(MeasureRepeatEvent::Complete, line)?;
        if !self.pattern.finalized {
            self.pattern.finalize("pattern", line)?;
        }
        if !self.replicas.finalized {
            self.replicas.finalize("replicas", line)?;
        }
        Ok(())
    }

    /// Pattern measures followed by replicas measures.
    pub fn collect_into_flat_list(&self) -> Vec<Handle<Measure>> {
        self.pattern
            .measures
            .iter()
            .chain(self.replicas.measures.iter())
            .copied()
            .collect()
    }
}

impl Score {
    /// The last `pattern_measures_number` measures of the voice become
    /// the pattern, the following ones are the replicas until
    /// [`Score::voice_stop_measure_repeat`].
    pub fn voice_start_measure_repeat(
        &mut self,
        voice: Handle<Voice>,
        pattern_measures_number: usize,
        slashes_number: u32,
        line: usize,
    ) -> MsrResult<Handle<MeasureRepeat>> {
        self.complete_pending_repeats(voice, line)?;
        if self.voices[voice].compressed.is_some() {
            return Err(MsrError::unsupported(
                line,
                "measure repeat starts inside another compressed construct",
            ));
        }
        let detached = self.detach_just_created_measure(voice, line)?;
        let source = self.last_segment_of_voice(voice).ok_or_else(|| {
            MsrError::unsupported(line, "measure repeat without measures to repeat")
        })?;
        let pattern = self.segments[source].take_last_measures(
            &mut self.measures,
            pattern_measures_number,
            line,
        )?;
        if self.segments[source].is_empty() {
            self.voice_remove_segment(voice, source);
        }
        self.voices[voice].current_segment = None;
        let segment = self.voice_open_segment(voice, line)?;
        let repeat = self.measure_repeats.alloc_with(|h| {
            MeasureRepeat::new(h, pattern_measures_number, slashes_number, line)
        });
        let data = &mut self.measure_repeats[repeat];
        data.set_segment(segment);
        data.set_pattern(&mut self.measures, pattern, line)?;
        data.finalize_pattern(line)?;
        self.segments[segment].append_measure_repeat(repeat);
        self.voices[voice].compressed = Some(Compressed::Repeat(repeat));
        if let Some(measure) = detached {
            self.measure_repeats[repeat].append_replica_measure(
                &mut self.measures,
                measure,
                line,
            )?;
        }
        log::info!(
            "line {line}: measure repeat of {pattern_measures_number} measures in {}",
            self.voices[voice]
        );
        Ok(repeat)
    }

    /// The measure just created, if it has no music yet, is the first
    /// one after the replicas.
    ///
    /// # Errors
    /// `InvalidRepeatPhase` without a measure repeat in progress, or
    /// without replicas.
    pub fn voice_stop_measure_repeat(
        &mut self,
        voice: Handle<Voice>,
        line: usize,
    ) -> MsrResult<()> {
        let Some(Compressed::Repeat(repeat)) = self.voices[voice].compressed else {
            return Err(MsrError::repeat_phase(
                line,
                "measure repeat stop without a measure repeat",
            ));
        };
        let mut detached = None;
        if let Some(measure) = self.voices[voice].current_measure {
            let data = &self.measures[measure];
            if !data.is_finalized()
                && !data.contains_music()
                && self.measure_repeats[repeat].detach_last_replica(&mut self.measures, measure)
            {
                detached = Some(measure);
            }
        }
        self.measure_repeats[repeat].complete(line)?;
        let data = &mut self.voices[voice];
        data.compressed = None;
        data.current_segment = None;
        if let Some(measure) = detached {
            self.reattach_measure(voice, measure, line)?;
        }
        Ok(())
    }

    /// Last segment in the list, that receives the new voice elements.
    fn last_segment_of_voice(&mut self, voice: Handle<Voice>) -> Option<Handle<Segment>> {
        let line = self.voices[voice].line;
        self.voice_target(voice, line)
            .ok()?
            .iter()
            .rev()
            .find_map(|el| match el {
                VoiceElement::Segment(segment) => Some(*segment),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{MeasureRepeat, MeasureRepeatPhase};
    use crate::{
        dom::{arena::Arena, measure::Measure},
        errors::MsrError,
    };

    #[test]
    fn phases() {
        let mut measures = Arena::new();
        let all: Vec<_> = (1..=3)
            .map(|n| measures.alloc_with(|h| Measure::new(h, n.to_string(), n, 1)))
            .collect();
        let mut repeats = Arena::new();
        let repeat = repeats.alloc_with(|h| MeasureRepeat::new(h, 1, 1, 1));
        let repeat = &mut repeats[repeat];
        assert!(matches!(
            repeat.append_replica_measure(&mut measures, all[1], 2),
            Err(MsrError::InvalidRepeatPhase { line: 2, .. })
        ));
        assert!(repeat.complete(2).is_err());
        repeat.set_pattern(&mut measures, vec![all[0]], 2).unwrap();
        repeat.finalize_pattern(2).unwrap();
        assert!(matches!(
            repeat.finalize_pattern(3),
            Err(MsrError::DoubleFinalization { line: 3, .. })
        ));
        repeat.append_replica_measure(&mut measures, all[1], 4).unwrap();
        repeat.append_replica_measure(&mut measures, all[2], 4).unwrap();
        assert_eq!(repeat.phase(), MeasureRepeatPhase::InReplicas);
        repeat.complete(5).unwrap();
        assert_eq!(repeat.phase(), MeasureRepeatPhase::Completed);
        assert!(repeat.replicas().is_finalized());
        assert_eq!(repeat.replicas_number(), 2);
        assert_eq!(repeat.collect_into_flat_list(), all);
    }
}
