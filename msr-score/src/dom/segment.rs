//! A run of measures of one voice, with no repeat boundary inside.
//!
//! Multiple measure rests and measure repeats also live in segments,
//! but the voice always gives them a segment of their own.

use crate::{
    errors::{MsrError, MsrResult},
    primitives::WholeNotes,
};

use super::{
    arena::{Arena, Handle},
    measure::{Measure, MeasureImplicitKind},
    measure_repeat::MeasureRepeat,
    multiple_measure_rest::MultipleMeasureRest,
    score::Score,
    voice::Voice,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentElement {
    Measure(Handle<Measure>),
    MultipleMeasureRest(Handle<MultipleMeasureRest>),
    MeasureRepeat(Handle<MeasureRepeat>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    handle: Handle<Segment>,
    voice: Handle<Voice>,
    pub line: usize,
    elements: Vec<SegmentElement>,
}
impl Segment {
    pub fn new(handle: Handle<Segment>, voice: Handle<Voice>, line: usize) -> Self {
        Self {
            handle,
            voice,
            line,
            elements: Vec::new(),
        }
    }
    pub fn handle(&self) -> Handle<Segment> {
        self.handle
    }
    pub fn voice(&self) -> Handle<Voice> {
        self.voice
    }
    pub fn elements(&self) -> &[SegmentElement] {
        &self.elements
    }
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn append_measure(
        &mut self,
        measures: &mut Arena<Measure>,
        measure: Handle<Measure>,
    ) {
        measures[measure].set_segment(Some(self.handle));
        self.elements.push(SegmentElement::Measure(measure));
    }
    pub fn append_multiple_measure_rest(
        &mut self,
        rest: Handle<MultipleMeasureRest>,
    ) {
        self.elements.push(SegmentElement::MultipleMeasureRest(rest));
    }
    pub fn append_measure_repeat(&mut self, repeat: Handle<MeasureRepeat>) {
        self.elements.push(SegmentElement::MeasureRepeat(repeat));
    }

    pub fn last_measure(&self) -> Option<Handle<Measure>> {
        match self.elements.last() {
            Some(SegmentElement::Measure(measure)) => Some(*measure),
            _ => None,
        }
    }

    /// Detach the last element, if it is `measure`.
    pub fn remove_last_measure(
        &mut self,
        measures: &mut Arena<Measure>,
        measure: Handle<Measure>,
        line: usize,
    ) -> MsrResult<()> {
        match self.last_measure() == Some(measure) {
            true => {
                self.elements.pop();
                measures[measure].set_segment(None);
                Ok(())
            }
            false => Err(MsrError::unsupported(
                line,
                format!(
                    "measure {} is not the last one of its segment",
                    measures[measure].number()
                ),
            )),
        }
    }

    /// Detach the `count` last measures, in their order.
    ///
    /// # Errors
    /// if the segment does not end with `count` plain measures.
    pub fn take_last_measures(
        &mut self,
        measures: &mut Arena<Measure>,
        count: usize,
        line: usize,
    ) -> MsrResult<Vec<Handle<Measure>>> {
        let plain = self
            .elements
            .iter()
            .rev()
            .take_while(|el| matches!(el, SegmentElement::Measure(_)))
            .count();
        if count == 0 || plain < count {
            return Err(MsrError::unsupported(
                line,
                format!("segment has {plain} trailing measures, {count} requested"),
            ));
        }
        let taken = self
            .elements
            .split_off(self.elements.len() - count)
            .into_iter()
            .filter_map(|el| match el {
                SegmentElement::Measure(measure) => Some(measure),
                _ => None,
            })
            .collect::<Vec<_>>();
        for measure in taken.iter() {
            measures[*measure].set_segment(None);
        }
        Ok(taken)
    }
}

impl Score {
    /// Create a measure and append it to the segment.
    ///
    /// The measure ordinal follows the voice count of measures; the
    /// very first one is registered as first in voice.
    pub fn create_and_append_measure_to_segment(
        &mut self,
        segment: Handle<Segment>,
        number: &str,
        implicit: MeasureImplicitKind,
        line: usize,
    ) -> Handle<Measure> {
        let voice = self.segments[segment].voice;
        let measure = self.new_voice_measure(voice, number, implicit, line);
        self.segments[segment].append_measure(&mut self.measures, measure);
        log::debug!(
            "line {line}: measure {number} created in voice {}",
            self.voices[voice].number()
        );
        measure
    }

    /// Measures of the segment in order, with compressed constructs
    /// expanded.
    pub fn segment_measures(&self, segment: Handle<Segment>) -> Vec<Handle<Measure>> {
        self.segments[segment]
            .elements
            .iter()
            .flat_map(|el| match el {
                SegmentElement::Measure(measure) => vec![*measure],
                SegmentElement::MultipleMeasureRest(rest) => {
                    self.multiple_measure_rests[*rest].collect_into_flat_list()
                }
                SegmentElement::MeasureRepeat(repeat) => {
                    self.measure_repeats[*repeat].collect_into_flat_list()
                }
            })
            .collect()
    }

    pub fn segment_whole_notes(&self, segment: Handle<Segment>) -> WholeNotes {
        self.segment_measures(segment)
            .into_iter()
            .map(|m| self.measures[m].accumulated_whole_notes())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::{Segment, SegmentElement};
    use crate::dom::{measure::Measure, score::Score};

    #[test]
    fn take_last_measures() {
        let mut score = Score::new();
        let voice = score.test_voice();
        let segment = score.segments.alloc_with(|h| Segment::new(h, voice, 1));
        let handles: Vec<_> = (1..=3)
            .map(|n| {
                let m = score
                    .measures
                    .alloc_with(|h| Measure::new(h, n.to_string(), n, 1));
                score.segments[segment].append_measure(&mut score.measures, m);
                m
            })
            .collect();
        let measures = &mut score.measures;
        let segment = &mut score.segments[segment];
        assert_eq!(segment.last_measure(), Some(handles[2]));
        assert!(segment.take_last_measures(measures, 4, 2).is_err());
        let taken = segment.take_last_measures(measures, 2, 2).unwrap();
        assert_eq!(taken, &handles[1..]);
        assert_eq!(segment.elements(), &[SegmentElement::Measure(handles[0])]);
        assert_eq!(measures[handles[1]].segment(), None);
        assert!(segment.remove_last_measure(measures, handles[1], 3).is_err());
        segment.remove_last_measure(measures, handles[0], 3).unwrap();
        assert!(segment.is_empty());
    }
}
