use itertools::Itertools;
use msr_score::{
    config::AssemblyOptions,
    dom::{
        browse_score, HasSoundingDuration, Handle, Measure, MeasureKind, MsrVisitor, NodeRef,
        NoteEvent, RepeatEndingKind, RepeatPhase, Score, ScoreBuilder, SegmentElement,
        SourceEvent, UseSymbolsKind, Voice, VoiceElement,
    },
    errors::{MsrError, MsrResult},
    primitives::{DurationKind, NoteName, Pitch, TimeSignature, WholeNotes},
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn whole_note() -> SourceEvent {
    SourceEvent::Note(NoteEvent::new(
        Some(Pitch::natural(NoteName::G, 4)),
        DurationKind::Whole,
    ))
}

fn whole_rest() -> SourceEvent {
    SourceEvent::Note(NoteEvent::rest(DurationKind::Whole))
}

/// One part, 4/4, every measure given as its inner events.
fn one_part(measures: Vec<Vec<SourceEvent>>) -> Vec<SourceEvent> {
    let mut events = vec![SourceEvent::part("P1", "Violin")];
    for (idx, inner) in measures.into_iter().enumerate() {
        events.push(SourceEvent::measure((idx + 1).to_string()));
        if idx == 0 {
            events.push(SourceEvent::Time(TimeSignature::new(4, 4)));
        }
        events.extend(inner);
        events.push(SourceEvent::MeasureEnd);
    }
    events.push(SourceEvent::PartEnd);
    events
}

fn build(events: Vec<SourceEvent>) -> MsrResult<Score> {
    init_logger();
    let mut builder = ScoreBuilder::new(&AssemblyOptions::default())?;
    builder.handle_all(events.into_iter().enumerate().map(|(idx, ev)| (idx + 1, ev)))?;
    builder.finish()
}

fn single_voice(score: &Score) -> Handle<Voice> {
    let part = score.parts()[0];
    score.part_voices(part)[0]
}

#[test]
fn repeat_with_two_endings() {
    let score = build(one_part(vec![
        vec![SourceEvent::RepeatStart, whole_note()],
        vec![
            SourceEvent::EndingStart {
                number: "1".to_string(),
            },
            whole_note(),
            SourceEvent::RepeatEnd { times: 2 },
            SourceEvent::EndingEnd {
                number: "1".to_string(),
                kind: RepeatEndingKind::Hooked,
            },
        ],
        vec![
            SourceEvent::EndingStart {
                number: "2".to_string(),
            },
            whole_note(),
            SourceEvent::EndingEnd {
                number: "2".to_string(),
                kind: RepeatEndingKind::Hookless,
            },
        ],
        vec![whole_note()],
    ]))
    .unwrap();
    let voice = single_voice(&score);
    let elements = score.voice(voice).elements();
    assert_eq!(elements.len(), 2);
    let VoiceElement::Repeat(repeat) = elements[0] else {
        panic!("voice should start with a repeat");
    };
    assert!(matches!(elements[1], VoiceElement::Segment(_)));

    let repeat = score.repeat(repeat);
    assert_eq!(repeat.phase(), RepeatPhase::Completed);
    assert_eq!(repeat.times(), 2);
    assert!(repeat.explicit_start());
    assert_eq!(
        repeat
            .endings()
            .iter()
            .map(|ending| (ending.number(), ending.kind()))
            .collect_vec(),
        [("1", RepeatEndingKind::Hooked), ("2", RepeatEndingKind::Hookless)]
    );

    let measures = score.voice_measures(voice);
    for (measure, (number, purist)) in measures
        .iter()
        .zip_eq([("1", 1), ("2", 2), ("3", 2), ("4", 3)])
    {
        let measure = score.measure(*measure);
        assert_eq!(measure.number(), number);
        assert_eq!(measure.kind(), MeasureKind::Regular);
        assert_eq!(measure.purist_number(), Some(purist));
    }
}

#[test]
fn ending_stop_before_backward_repeat() {
    // bar line order: <ending type="stop"/> comes before <repeat direction="backward"/>
    let score = build(one_part(vec![
        vec![SourceEvent::RepeatStart, whole_note()],
        vec![
            SourceEvent::EndingStart {
                number: "1".to_string(),
            },
            whole_note(),
            SourceEvent::EndingEnd {
                number: "1".to_string(),
                kind: RepeatEndingKind::Hooked,
            },
            SourceEvent::RepeatEnd { times: 3 },
        ],
        vec![
            SourceEvent::EndingStart {
                number: "2".to_string(),
            },
            whole_note(),
            SourceEvent::EndingEnd {
                number: "2".to_string(),
                kind: RepeatEndingKind::Hookless,
            },
        ],
        vec![whole_note()],
    ]))
    .unwrap();
    let voice = single_voice(&score);
    let elements = score.voice(voice).elements();
    assert_eq!(elements.len(), 2);
    let VoiceElement::Repeat(repeat) = elements[0] else {
        panic!("voice should start with a repeat");
    };
    assert!(matches!(elements[1], VoiceElement::Segment(_)));
    let repeat = score.repeat(repeat);
    assert_eq!(repeat.phase(), RepeatPhase::Completed);
    assert_eq!(repeat.times(), 3);
    assert!(repeat.explicit_start());
    assert_eq!(repeat.common_part().unwrap().elements().len(), 1);
    assert_eq!(
        repeat
            .endings()
            .iter()
            .map(|ending| (ending.number(), ending.kind(), ending.elements().len()))
            .collect_vec(),
        [
            ("1", RepeatEndingKind::Hooked, 1),
            ("2", RepeatEndingKind::Hookless, 1)
        ]
    );
    let purist = score
        .voice_measures(voice)
        .into_iter()
        .map(|m| score.measure(m).purist_number())
        .collect_vec();
    assert_eq!(purist, [Some(1), Some(2), Some(2), Some(3)]);
}

#[test]
fn repeat_end_without_start_is_implicit() {
    let score = build(one_part(vec![
        vec![whole_note()],
        vec![whole_note(), SourceEvent::RepeatEnd { times: 2 }],
        vec![whole_note()],
    ]))
    .unwrap();
    let voice = single_voice(&score);
    let elements = score.voice(voice).elements();
    let VoiceElement::Repeat(repeat) = elements[0] else {
        panic!("voice should start with a repeat");
    };
    let repeat = score.repeat(repeat);
    assert!(!repeat.explicit_start());
    assert!(repeat.endings().is_empty());
    let common = repeat.common_part().unwrap();
    let [VoiceElement::Segment(segment)] = common.elements() else {
        panic!("common part should be one segment");
    };
    assert_eq!(score.segment_measures(*segment).len(), 2);
    assert_eq!(score.voice_measures(voice).len(), 3);
}

#[test]
fn multiple_measure_rest_keeps_its_measures() {
    let score = build(one_part(vec![
        vec![
            SourceEvent::MultipleRestStart {
                measures: 3,
                use_symbols: UseSymbolsKind::No,
            },
            whole_rest(),
        ],
        vec![whole_rest()],
        vec![whole_rest()],
        vec![whole_note()],
    ]))
    .unwrap();
    let voice = single_voice(&score);
    let elements = score.voice(voice).elements();
    assert_eq!(elements.len(), 2);
    let VoiceElement::Segment(first) = elements[0] else {
        panic!("voice should start with a segment");
    };
    let SegmentElement::MultipleMeasureRest(rest) = score.segment(first).elements()[0] else {
        panic!("segment should hold the multiple measure rest");
    };
    let rest = score.multiple_measure_rest(rest);
    assert!(rest.has_been_filled());
    assert_eq!(
        rest.measures()
            .iter()
            .map(|m| score.measure(*m).number())
            .collect_vec(),
        ["1", "2", "3"]
    );
    assert_eq!(score.voice_measures(voice).len(), 4);
}

#[test]
fn multiple_measure_rest_expands_to_its_measures() {
    let mut measures = vec![vec![
        SourceEvent::MultipleRestStart {
            measures: 5,
            use_symbols: UseSymbolsKind::Yes,
        },
        whole_rest(),
    ]];
    measures.extend((0..4).map(|_| vec![whole_rest()]));
    measures.push(vec![whole_note()]);
    let score = build(one_part(measures)).unwrap();
    let voice = single_voice(&score);
    let VoiceElement::Segment(first) = score.voice(voice).elements()[0] else {
        panic!("voice should start with a segment");
    };
    let SegmentElement::MultipleMeasureRest(rest) = score.segment(first).elements()[0] else {
        panic!("segment should hold the multiple measure rest");
    };
    let rest = score.multiple_measure_rest(rest);
    assert_eq!(rest.measures_number(), 5);
    let expanded = rest.collect_into_flat_list();
    let originals = score.voice_measures(voice);
    assert_eq!(expanded.len(), 5);
    for (measure, (original, number)) in expanded
        .iter()
        .zip_eq(originals[..5].iter().zip_eq(["1", "2", "3", "4", "5"]))
    {
        let (measure, original) = (score.measure(*measure), score.measure(*original));
        assert_eq!(measure.number(), number);
        assert_eq!(measure.number(), original.number());
        assert_eq!(measure.sounding_whole_notes(), WholeNotes::whole());
        assert_eq!(measure.sounding_whole_notes(), original.sounding_whole_notes());
        assert_eq!(measure.kind(), MeasureKind::Regular);
        assert_eq!(measure.kind(), original.kind());
    }
    assert_eq!(score.measure(originals[5]).number(), "6");
}

#[test]
fn measure_repeat_takes_previous_measures() {
    let score = build(one_part(vec![
        vec![whole_note()],
        vec![whole_note()],
        vec![
            SourceEvent::MeasureRepeatStart {
                measures: 2,
                slashes: 1,
            },
            whole_rest(),
        ],
        vec![whole_rest()],
        vec![SourceEvent::MeasureRepeatStop, whole_note()],
    ]))
    .unwrap();
    let voice = single_voice(&score);
    let elements = score.voice(voice).elements();
    assert_eq!(elements.len(), 2);
    let VoiceElement::Segment(first) = elements[0] else {
        panic!("voice should start with a segment");
    };
    let SegmentElement::MeasureRepeat(repeat) = score.segment(first).elements()[0] else {
        panic!("segment should hold the measure repeat");
    };
    let repeat = score.measure_repeat(repeat);
    let numbers = |measures: &[Handle<Measure>]| {
        measures
            .iter()
            .map(|m| score.measure(*m).number().to_string())
            .collect_vec()
    };
    assert_eq!(numbers(repeat.pattern().measures()), ["1", "2"]);
    assert_eq!(numbers(repeat.replicas().measures()), ["3", "4"]);
    assert!(repeat.replicas().is_finalized());
    assert_eq!(
        numbers(&score.voice_measures(voice)),
        ["1", "2", "3", "4", "5"]
    );
}

#[test]
fn measure_repeat_stop_without_start() {
    let err = build(one_part(vec![
        vec![whole_note()],
        vec![SourceEvent::MeasureRepeatStop, whole_note()],
    ]))
    .unwrap_err();
    assert!(matches!(err, MsrError::InvalidRepeatPhase { .. }));
}

#[test]
fn anacrusis_and_last_incomplete_measure() {
    let quarter = || {
        SourceEvent::Note(NoteEvent::new(
            Some(Pitch::natural(NoteName::D, 5)),
            DurationKind::Quarter,
        ))
    };
    let mut events = one_part(vec![
        vec![quarter()],
        vec![whole_note()],
        vec![quarter(), quarter(), quarter()],
    ]);
    if let SourceEvent::MeasureStart { number, .. } = &mut events[1] {
        *number = "0".to_string();
    }
    let score = build(events).unwrap();
    let voice = single_voice(&score);
    let kinds = score
        .voice_measures(voice)
        .into_iter()
        .map(|m| (score.measure(m).kind(), score.measure(m).purist_number()))
        .collect_vec();
    assert_eq!(
        kinds,
        [
            (MeasureKind::Anacrusis, Some(0)),
            (MeasureKind::Regular, Some(1)),
            (MeasureKind::IncompleteLastMeasure, Some(2)),
        ]
    );
}

#[derive(Default)]
struct Census {
    repeats: usize,
    endings: usize,
    measures: usize,
    notes: usize,
    open: usize,
}
impl MsrVisitor for Census {
    fn visit_start(&mut self, node: NodeRef<'_>) -> MsrResult<()> {
        self.open += 1;
        match node {
            NodeRef::Repeat(..) => self.repeats += 1,
            NodeRef::RepeatEnding(_) => self.endings += 1,
            NodeRef::Measure(..) => self.measures += 1,
            NodeRef::Element(_, element) if element.as_note().is_some() => self.notes += 1,
            _ => (),
        }
        Ok(())
    }
    fn visit_end(&mut self, _node: NodeRef<'_>) -> MsrResult<()> {
        self.open -= 1;
        Ok(())
    }
}

#[test]
fn browsing_visits_everything_once() {
    let score = build(one_part(vec![
        vec![SourceEvent::RepeatStart, whole_note()],
        vec![
            SourceEvent::EndingStart {
                number: "1".to_string(),
            },
            whole_note(),
            SourceEvent::RepeatEnd { times: 2 },
            SourceEvent::EndingEnd {
                number: "1".to_string(),
                kind: RepeatEndingKind::Hooked,
            },
        ],
        vec![
            SourceEvent::EndingStart {
                number: "2".to_string(),
            },
            whole_note(),
            SourceEvent::EndingEnd {
                number: "2".to_string(),
                kind: RepeatEndingKind::Hookless,
            },
        ],
    ]))
    .unwrap();
    let mut census = Census::default();
    browse_score(&score, &mut census).unwrap();
    assert_eq!(census.open, 0);
    assert_eq!(census.repeats, 1);
    assert_eq!(census.endings, 2);
    assert_eq!(census.measures, 3);
    assert_eq!(census.notes, 3);
}

/// Records `+kind` on entering a node and `-kind` on leaving it.
#[derive(Default)]
struct Trace(Vec<String>);
impl Trace {
    fn label(node: NodeRef<'_>) -> &'static str {
        match node {
            NodeRef::Score(_) => "score",
            NodeRef::PartGroup(..) => "group",
            NodeRef::Part(..) => "part",
            NodeRef::Staff(..) => "staff",
            NodeRef::Voice(..) => "voice",
            NodeRef::Segment(..) => "segment",
            NodeRef::Repeat(..) => "repeat",
            NodeRef::RepeatCommonPart(_) => "common",
            NodeRef::RepeatEnding(_) => "ending",
            NodeRef::MultipleMeasureRest(..) => "rest",
            NodeRef::MeasureRepeat(..) => "measure repeat",
            NodeRef::MeasureRepeatPattern(_) => "pattern",
            NodeRef::MeasureRepeatReplicas(_) => "replicas",
            NodeRef::Measure(..) => "measure",
            NodeRef::Element(_, element) => element.kind.name(),
        }
    }
}
impl MsrVisitor for Trace {
    fn visit_start(&mut self, node: NodeRef<'_>) -> MsrResult<()> {
        self.0.push(format!("+{}", Self::label(node)));
        Ok(())
    }
    fn visit_end(&mut self, node: NodeRef<'_>) -> MsrResult<()> {
        self.0.push(format!("-{}", Self::label(node)));
        Ok(())
    }
}

#[test]
fn browsing_follows_children_order() {
    let score = build(one_part(vec![
        vec![
            SourceEvent::RepeatStart,
            whole_note(),
            SourceEvent::RepeatEnd { times: 2 },
        ],
        vec![whole_note()],
    ]))
    .unwrap();
    let mut trace = Trace::default();
    browse_score(&score, &mut trace).unwrap();
    assert_eq!(
        trace.0,
        [
            "+score", "+group", "+part", "+staff", "+voice", //
            "+repeat", "+common", "+segment", "+measure", //
            "+time", "-time", "+note", "-note", //
            "-measure", "-segment", "-common", "-repeat", //
            "+segment", "+measure", "+note", "-note", "-measure", "-segment", //
            "-voice", "-staff", "-part", "-group", "-score",
        ]
    );
}
