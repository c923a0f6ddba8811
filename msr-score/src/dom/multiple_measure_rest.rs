//! Compressed run of rest measures.
//!
//! The original measures are kept, so that the expanded form is
//! available for whoever needs it.

use crate::{
    errors::{MsrError, MsrResult},
    primitives::WholeNotes,
};

use super::{
    arena::{Arena, Handle},
    measure::Measure,
    score::Score,
    segment::Segment,
    voice::{Compressed, Voice},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UseSymbolsKind {
    /// Plain H-bar with the count.
    #[default]
    No,
    /// Church rests style symbols, when the count is small.
    Yes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleMeasureRest {
    handle: Handle<MultipleMeasureRest>,
    pub line: usize,
    measures_number: usize,
    slashes_number: u32,
    use_symbols: UseSymbolsKind,
    measures: Vec<Handle<Measure>>,
    segment: Option<Handle<Segment>>,
}
impl MultipleMeasureRest {
    pub fn new(
        handle: Handle<MultipleMeasureRest>,
        measures_number: usize,
        slashes_number: u32,
        use_symbols: UseSymbolsKind,
        line: usize,
    ) -> Self {
        Self {
            handle,
            line,
            measures_number,
            slashes_number,
            use_symbols,
            measures: Vec::new(),
            segment: None,
        }
    }

    pub fn handle(&self) -> Handle<MultipleMeasureRest> {
        self.handle
    }
    /// The declared count.
    pub fn measures_number(&self) -> usize {
        self.measures_number
    }
    pub fn slashes_number(&self) -> u32 {
        self.slashes_number
    }
    pub fn use_symbols(&self) -> UseSymbolsKind {
        self.use_symbols
    }
    pub fn segment(&self) -> Option<Handle<Segment>> {
        self.segment
    }
    pub(crate) fn set_segment(&mut self, segment: Handle<Segment>) {
        self.segment = Some(segment);
    }
    pub fn has_been_filled(&self) -> bool {
        self.measures.len() >= self.measures_number
    }
    pub fn measures(&self) -> &[Handle<Measure>] {
        &self.measures
    }

    /// # Errors
    /// if the declared count has already been reached.
    pub fn append_measure(
        &mut self,
        measures: &mut Arena<Measure>,
        measure: Handle<Measure>,
    ) -> MsrResult<()> {
        if self.has_been_filled() {
            return Err(MsrError::unsupported(
                measures[measure].line,
                format!(
                    "multiple measure rest of {} measures can not hold measure {}",
                    self.measures_number,
                    measures[measure].number()
                ),
            ));
        }
        measures[measure].set_segment(self.segment);
        self.measures.push(measure);
        Ok(())
    }

    /// Duration of one contained measure.
    ///
    /// Not multiplied by the count: measures, that differ from the
    /// first one, are reported instead of being averaged out.
    pub fn fetch_measure_sounding_notes(
        &self,
        measures: &Arena<Measure>,
    ) -> Option<WholeNotes> {
        let first = measures[*self.measures.first()?].accumulated_whole_notes();
        for measure in self.measures.iter().skip(1) {
            let duration = measures[*measure].accumulated_whole_notes();
            if duration != first {
                log::warn!(
                    "line {}: measure {} in multiple measure rest lasts {duration}, \
                    first one lasts {first}",
                    self.line,
                    measures[*measure].number()
                );
            }
        }
        Some(first)
    }

    /// The original measures, in order.
    pub fn collect_into_flat_list(&self) -> Vec<Handle<Measure>> {
        self.measures.clone()
    }
}

impl Score {
    /// The next `measures_number` measures of the voice, the current one
    /// included if it has no music yet, go to a new multiple measure
    /// rest, in a segment of its own.
    pub fn voice_start_multiple_measure_rest(
        &mut self,
        voice: Handle<Voice>,
        measures_number: usize,
        slashes_number: u32,
        use_symbols: UseSymbolsKind,
        line: usize,
    ) -> MsrResult<Handle<MultipleMeasureRest>> {
        self.complete_pending_repeats(voice, line)?;
        if self.voices[voice].compressed.is_some() {
            return Err(MsrError::unsupported(
                line,
                format!(
                    "multiple measure rest starts inside another compressed construct in {}",
                    self.voices[voice]
                ),
            ));
        }
        let detached = self.detach_just_created_measure(voice, line)?;
        self.voices[voice].current_segment = None;
        let segment = self.voice_open_segment(voice, line)?;
        let rest = self.multiple_measure_rests.alloc_with(|h| {
            MultipleMeasureRest::new(h, measures_number, slashes_number, use_symbols, line)
        });
        self.multiple_measure_rests[rest].set_segment(segment);
        self.segments[segment].append_multiple_measure_rest(rest);
        self.voices[voice].compressed = Some(Compressed::Rest(rest));
        if let Some(measure) = detached {
            self.multiple_measure_rests[rest].append_measure(&mut self.measures, measure)?;
        }
        log::info!(
            "line {line}: multiple measure rest of {measures_number} measures in {}",
            self.voices[voice]
        );
        Ok(rest)
    }
}
