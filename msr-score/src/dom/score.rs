//! Score: owner of every node of the tree.
//!
//! Nodes live in typed arenas and refer to each other by handles. The
//! assembly operations are methods of `Score`, spread over the modules of
//! the nodes they are about.

use crate::errors::{MsrError, MsrResult};

use super::{
    arena::{Arena, Handle},
    element::{leaf_notes, ElementHandle, MeasureElement},
    measure::Measure,
    measure_repeat::MeasureRepeat,
    multiple_measure_rest::MultipleMeasureRest,
    part::Part,
    part_group::PartGroup,
    repeat::Repeat,
    segment::Segment,
    staff::Staff,
    voice::Voice,
};

#[derive(Debug, Clone, Default)]
pub struct Score {
    pub(crate) elements: Arena<MeasureElement>,
    pub(crate) measures: Arena<Measure>,
    pub(crate) segments: Arena<Segment>,
    pub(crate) repeats: Arena<Repeat>,
    pub(crate) multiple_measure_rests: Arena<MultipleMeasureRest>,
    pub(crate) measure_repeats: Arena<MeasureRepeat>,
    pub(crate) voices: Arena<Voice>,
    pub(crate) staves: Arena<Staff>,
    pub(crate) parts: Arena<Part>,
    pub(crate) part_groups: Arena<PartGroup>,
    pub(crate) groups: Vec<Handle<PartGroup>>,
    finalized: bool,
}
impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, handle: Handle<MeasureElement>) -> &MeasureElement {
        &self.elements[handle]
    }
    pub fn measure(&self, handle: Handle<Measure>) -> &Measure {
        &self.measures[handle]
    }
    pub fn measure_mut(&mut self, handle: Handle<Measure>) -> &mut Measure {
        &mut self.measures[handle]
    }
    pub fn segment(&self, handle: Handle<Segment>) -> &Segment {
        &self.segments[handle]
    }
    pub fn repeat(&self, handle: Handle<Repeat>) -> &Repeat {
        &self.repeats[handle]
    }
    pub fn multiple_measure_rest(
        &self,
        handle: Handle<MultipleMeasureRest>,
    ) -> &MultipleMeasureRest {
        &self.multiple_measure_rests[handle]
    }
    pub fn measure_repeat(&self, handle: Handle<MeasureRepeat>) -> &MeasureRepeat {
        &self.measure_repeats[handle]
    }
    pub fn voice(&self, handle: Handle<Voice>) -> &Voice {
        &self.voices[handle]
    }
    pub fn staff(&self, handle: Handle<Staff>) -> &Staff {
        &self.staves[handle]
    }
    pub fn part(&self, handle: Handle<Part>) -> &Part {
        &self.parts[handle]
    }
    pub fn part_mut(&mut self, handle: Handle<Part>) -> &mut Part {
        &mut self.parts[handle]
    }
    pub fn part_group(&self, handle: Handle<PartGroup>) -> &PartGroup {
        &self.part_groups[handle]
    }
    /// Top level part groups.
    pub fn part_groups(&self) -> &[Handle<PartGroup>] {
        &self.groups
    }
    pub fn alloc_element(&mut self, element: MeasureElement) -> Handle<MeasureElement> {
        self.elements.alloc(element)
    }
    /// Mutable access to a not yet appended element.
    pub fn element_mut(&mut self, handle: Handle<MeasureElement>) -> &mut MeasureElement {
        &mut self.elements[handle]
    }

    /// Notes of the element, chord and tuplet members included.
    pub fn leaf_notes(&self, element: ElementHandle) -> Vec<ElementHandle> {
        leaf_notes(&self.elements, element)
    }

    /// All parts in score order.
    pub fn parts(&self) -> Vec<Handle<Part>> {
        self.groups
            .iter()
            .flat_map(|group| self.part_group_parts(*group))
            .collect()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Finalize every voice. The score can be browsed afterwards.
    ///
    /// # Errors
    /// `DoubleFinalization` if called twice.
    pub fn finalize(&mut self, line: usize) -> MsrResult<()> {
        if self.finalized {
            return Err(MsrError::DoubleFinalization {
                line,
                what: "score".to_string(),
            });
        }
        let voices: Vec<_> = self.voices.iter().map(|(handle, _)| handle).collect();
        for voice in voices {
            if !self.voices[voice].is_finalized() {
                self.finalize_voice(voice, line)?;
            }
        }
        self.finalized = true;
        log::info!(
            "line {line}: score finalized: {} parts, {} staves, {} voices, {} measures",
            self.parts.len(),
            self.staves.len(),
            self.voices.len(),
            self.number_of_measures()
        );
        Ok(())
    }

    /// Longest voice, in measures.
    pub fn number_of_measures(&self) -> usize {
        self.voices
            .iter()
            .map(|(voice, _)| self.voice_measures(voice).len())
            .max()
            .unwrap_or(0)
    }
    pub fn number_of_parts(&self) -> usize {
        self.parts.len()
    }
    pub fn number_of_staves(&self) -> usize {
        self.staves.len()
    }
    pub fn number_of_voices(&self) -> usize {
        self.voices.len()
    }

    /// Group, part, staff 1 and its voice 1.
    #[cfg(test)]
    pub(crate) fn test_voice(&mut self) -> Handle<Voice> {
        let group = self.create_part_group(1, "", None, 1);
        let part = self.create_part(group, "P1", "Piano", 1);
        let staff = self.part_create_staff_if_absent(part, 1, 1);
        self.staff_create_regular_voice_if_absent(staff, 1, 1)
    }
}
