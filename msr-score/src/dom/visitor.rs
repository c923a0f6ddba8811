//! Depth-first traversal of a finalized score.
//!
//! Every node is visited once, children in declared order. A visitor
//! gets `visit_start` before the children of a node and `visit_end`
//! after them.

use crate::errors::{MsrError, MsrResult};

use super::{
    arena::Handle,
    element::{ElementHandle, MeasureElement},
    measure::Measure,
    measure_repeat::{MeasureRepeat, MeasureRepeatMeasures},
    multiple_measure_rest::MultipleMeasureRest,
    part::Part,
    part_group::{PartGroup, PartGroupElement},
    repeat::{Repeat, RepeatCommonPart, RepeatEnding},
    score::Score,
    segment::{Segment, SegmentElement},
    staff::Staff,
    voice::{Voice, VoiceElement},
};

#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Score(&'a Score),
    PartGroup(Handle<PartGroup>, &'a PartGroup),
    Part(Handle<Part>, &'a Part),
    Staff(Handle<Staff>, &'a Staff),
    Voice(Handle<Voice>, &'a Voice),
    Segment(Handle<Segment>, &'a Segment),
    Repeat(Handle<Repeat>, &'a Repeat),
    RepeatCommonPart(&'a RepeatCommonPart),
    RepeatEnding(&'a RepeatEnding),
    MultipleMeasureRest(Handle<MultipleMeasureRest>, &'a MultipleMeasureRest),
    MeasureRepeat(Handle<MeasureRepeat>, &'a MeasureRepeat),
    MeasureRepeatPattern(&'a MeasureRepeatMeasures),
    MeasureRepeatReplicas(&'a MeasureRepeatMeasures),
    Measure(Handle<Measure>, &'a Measure),
    Element(ElementHandle, &'a MeasureElement),
}

pub trait MsrVisitor {
    fn visit_start(&mut self, _node: NodeRef<'_>) -> MsrResult<()> {
        Ok(())
    }
    fn visit_end(&mut self, _node: NodeRef<'_>) -> MsrResult<()> {
        Ok(())
    }
}

/// Walk the whole score.
///
/// # Errors
/// `UnsupportedConstruct` if the score is not finalized, or whatever the
/// visitor returns.
pub fn browse_score(score: &Score, visitor: &mut impl MsrVisitor) -> MsrResult<()> {
    if !score.is_finalized() {
        return Err(MsrError::unsupported(0, "score browsed before finalization"));
    }
    Browser { score, visitor }.score()
}

struct Browser<'a, V> {
    score: &'a Score,
    visitor: &'a mut V,
}
impl<'a, V: MsrVisitor> Browser<'a, V> {
    fn around(
        &mut self,
        node: NodeRef<'a>,
        children: impl FnOnce(&mut Self) -> MsrResult<()>,
    ) -> MsrResult<()> {
        self.visitor.visit_start(node)?;
        children(self)?;
        self.visitor.visit_end(node)
    }

    fn score(&mut self) -> MsrResult<()> {
        let score = self.score;
        self.around(NodeRef::Score(score), |b| {
            score
                .part_groups()
                .iter()
                .try_for_each(|group| b.part_group(*group))
        })
    }

    fn part_group(&mut self, group: Handle<PartGroup>) -> MsrResult<()> {
        let score = self.score;
        let data = &score.part_groups[group];
        self.around(NodeRef::PartGroup(group, data), |b| {
            data.elements().iter().try_for_each(|element| match element {
                PartGroupElement::Part(part) => b.part(*part),
                PartGroupElement::PartGroup(nested) => b.part_group(*nested),
            })
        })
    }

    fn part(&mut self, part: Handle<Part>) -> MsrResult<()> {
        let score = self.score;
        let data = &score.parts[part];
        self.around(NodeRef::Part(part, data), |b| {
            for voice in data.harmonies_voice().into_iter().chain(data.figured_bass_voice()) {
                b.voice(voice)?;
            }
            data.staves().try_for_each(|staff| b.staff(staff))
        })
    }

    fn staff(&mut self, staff: Handle<Staff>) -> MsrResult<()> {
        let score = self.score;
        let data = &score.staves[staff];
        self.around(NodeRef::Staff(staff, data), |b| {
            data.voices().try_for_each(|voice| b.voice(voice))
        })
    }

    fn voice(&mut self, voice: Handle<Voice>) -> MsrResult<()> {
        let score = self.score;
        let data = &score.voices[voice];
        self.around(NodeRef::Voice(voice, data), |b| {
            b.voice_elements(data.elements())
        })
    }

    fn voice_elements(&mut self, elements: &'a [VoiceElement]) -> MsrResult<()> {
        elements.iter().try_for_each(|element| match element {
            VoiceElement::Segment(segment) => self.segment(*segment),
            VoiceElement::Repeat(repeat) => self.repeat(*repeat),
        })
    }

    fn segment(&mut self, segment: Handle<Segment>) -> MsrResult<()> {
        let score = self.score;
        let data = &score.segments[segment];
        self.around(NodeRef::Segment(segment, data), |b| {
            data.elements().iter().try_for_each(|element| match element {
                SegmentElement::Measure(measure) => b.measure(*measure),
                SegmentElement::MultipleMeasureRest(rest) => {
                    let rest_data = &score.multiple_measure_rests[*rest];
                    b.around(NodeRef::MultipleMeasureRest(*rest, rest_data), |b| {
                        b.measures(rest_data.measures())
                    })
                }
                SegmentElement::MeasureRepeat(repeat) => {
                    let repeat_data = &score.measure_repeats[*repeat];
                    b.around(NodeRef::MeasureRepeat(*repeat, repeat_data), |b| {
                        let pattern = repeat_data.pattern();
                        b.around(NodeRef::MeasureRepeatPattern(pattern), |b| {
                            b.measures(pattern.measures())
                        })?;
                        let replicas = repeat_data.replicas();
                        b.around(NodeRef::MeasureRepeatReplicas(replicas), |b| {
                            b.measures(replicas.measures())
                        })
                    })
                }
            })
        })
    }

    fn repeat(&mut self, repeat: Handle<Repeat>) -> MsrResult<()> {
        let score = self.score;
        let data = &score.repeats[repeat];
        self.around(NodeRef::Repeat(repeat, data), |b| {
            if let Some(common_part) = data.common_part() {
                b.around(NodeRef::RepeatCommonPart(common_part), |b| {
                    b.voice_elements(common_part.elements())
                })?;
            }
            data.endings().iter().try_for_each(|ending| {
                b.around(NodeRef::RepeatEnding(ending), |b| {
                    b.voice_elements(ending.elements())
                })
            })
        })
    }

    fn measures(&mut self, measures: &[Handle<Measure>]) -> MsrResult<()> {
        measures.iter().try_for_each(|measure| self.measure(*measure))
    }

    fn measure(&mut self, measure: Handle<Measure>) -> MsrResult<()> {
        let score = self.score;
        let data = &score.measures[measure];
        self.around(NodeRef::Measure(measure, data), |b| {
            data.elements().iter().try_for_each(|element| b.element(*element))
        })
    }

    fn element(&mut self, element: ElementHandle) -> MsrResult<()> {
        let score = self.score;
        let data = &score.elements[element];
        self.around(NodeRef::Element(element, data), |b| {
            data.children().iter().try_for_each(|child| b.element(*child))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{browse_score, MsrVisitor, NodeRef};
    use crate::{
        dom::{element::ElementKind, measure::MeasureImplicitKind, note::Note, score::Score},
        errors::{MsrError, MsrResult},
        primitives::WholeNotes,
    };

    #[derive(Default)]
    struct Depth {
        depth: i32,
        max: i32,
        measures: usize,
    }
    impl MsrVisitor for Depth {
        fn visit_start(&mut self, node: NodeRef<'_>) -> MsrResult<()> {
            self.depth += 1;
            self.max = self.max.max(self.depth);
            if let NodeRef::Measure(..) = node {
                self.measures += 1;
            }
            Ok(())
        }
        fn visit_end(&mut self, _node: NodeRef<'_>) -> MsrResult<()> {
            self.depth -= 1;
            Ok(())
        }
    }

    #[test]
    fn balanced() {
        let mut score = Score::new();
        let voice = score.test_voice();
        let mut visitor = Depth::default();
        assert!(matches!(
            browse_score(&score, &mut visitor),
            Err(MsrError::UnsupportedConstruct { .. })
        ));
        score
            .create_measure_in_voice(voice, "1", MeasureImplicitKind::No, None, 1)
            .unwrap();
        score
            .append_new_element_to_voice(
                voice,
                ElementKind::Note(Note::rest(WholeNotes::whole())),
                2,
            )
            .unwrap();
        score.finalize(3).unwrap();
        browse_score(&score, &mut visitor).unwrap();
        assert_eq!(visitor.depth, 0);
        assert_eq!(visitor.measures, 1);
        // score, group, part, staff, voice, segment, measure, note
        assert_eq!(visitor.max, 8);
    }
}
