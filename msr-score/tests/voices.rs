use itertools::Itertools;
use msr_score::{
    config::AssemblyOptions,
    dom::{
        ElementKind, HasMeasurePosition, HasSoundingDuration, HasVoicePosition, MeasureKind,
        NoteEvent, Score, ScoreBuilder, SourceEvent, VoiceKind,
    },
    notation::{Clef, ClefKind, Harmony},
    primitives::{DurationKind, NoteName, Pitch, Position, TimeSignature, WholeNotes},
};

fn note(name: NoteName, duration: DurationKind) -> NoteEvent {
    NoteEvent::new(Some(Pitch::natural(name, 4)), duration)
}

fn build(inner: Vec<SourceEvent>) -> Score {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut events = vec![
        SourceEvent::part("P1", "Piano"),
        SourceEvent::measure("1"),
        SourceEvent::Time(TimeSignature::new(4, 4)),
    ];
    events.extend(inner);
    events.extend([SourceEvent::MeasureEnd, SourceEvent::PartEnd]);
    let mut builder = ScoreBuilder::new(&AssemblyOptions::default()).unwrap();
    builder
        .handle_all(events.into_iter().enumerate().map(|(idx, ev)| (idx + 1, ev)))
        .unwrap();
    builder.finish().unwrap()
}

fn wn(numerator: i64, denominator: i64) -> WholeNotes {
    WholeNotes::new(numerator, denominator).unwrap()
}

#[test]
fn nested_tuplets() {
    let score = build(vec![
        SourceEvent::Note(note(NoteName::C, DurationKind::Eighth).starting_tuplet(1, 3, 2, 3)),
        SourceEvent::Note(note(NoteName::D, DurationKind::N16th).starting_tuplet(2, 3, 2, 3)),
        SourceEvent::Note(note(NoteName::E, DurationKind::N16th)),
        SourceEvent::Note(note(NoteName::F, DurationKind::N16th).stopping_tuplet(2)),
        SourceEvent::Note(note(NoteName::G, DurationKind::Eighth).stopping_tuplet(1)),
        SourceEvent::Note(note(NoteName::A, DurationKind::Half)),
        SourceEvent::Note(note(NoteName::B, DurationKind::Quarter)),
    ]);
    let part = score.parts()[0];
    let voice = score.part_voices(part)[0];
    let measure = score.voice_measures(voice)[0];
    assert_eq!(score.measure(measure).kind(), MeasureKind::Regular);

    let outer = score
        .measure(measure)
        .elements()
        .iter()
        .copied()
        .find(|el| score.element(*el).as_tuplet().is_some())
        .unwrap();
    assert_eq!(score.element(outer).sounding_whole_notes(), wn(1, 4));
    // eighth, sixteenths triplet over an eighth, eighth
    assert_eq!(
        score.element(outer).as_tuplet().unwrap().member_display_whole_notes(),
        wn(3, 8)
    );
    let inner = score.element(outer).children()[1];
    let factor = score.element(inner).as_tuplet().unwrap().effective_factor();
    assert_eq!((factor.actual(), factor.normal()), (9, 4));
    assert_eq!(score.element(inner).sounding_whole_notes(), wn(1, 12));

    let soundings = score.leaf_notes(outer)
        .into_iter()
        .map(|n| score.element(n).sounding_whole_notes())
        .collect_vec();
    assert_eq!(
        soundings,
        [wn(1, 12), wn(1, 36), wn(1, 36), wn(1, 36), wn(1, 12)]
    );
    let positions = score
        .element(inner)
        .children()
        .iter()
        .map(|n| score.element(*n).measure_position().get())
        .collect_vec();
    assert_eq!(positions, [wn(1, 12), wn(1, 9), wn(5, 36)]);
    assert_eq!(score.part_divisions_per_quarter_note(part), 9);
}

#[test]
fn cross_staff_notes() {
    let score = build(vec![
        SourceEvent::Clef(Clef::new(ClefKind::Treble, 1)),
        SourceEvent::Clef(Clef::new(ClefKind::Bass, 2)),
        SourceEvent::Note(note(NoteName::C, DurationKind::Half)),
        SourceEvent::Note(note(NoteName::E, DurationKind::Half).in_voice(2, 1)),
    ]);
    let part = score.parts()[0];
    assert_eq!(score.part(part).staves().count(), 2);
    let voice = score.part_voices(part)[0];
    assert_eq!(score.voice(voice).staff_changes().len(), 1);
    assert_eq!(score.voice(voice).current_staff_number(), 2);
    let measure = score.voice_measures(voice)[0];
    let kinds = score
        .measure(measure)
        .elements()
        .iter()
        .map(|el| score.element(*el).kind.name())
        .collect_vec();
    // only the clef of the voice staff
    assert_eq!(kinds, ["time", "clef", "note", "voice staff change", "note"]);
    assert_eq!(score.measure(measure).kind(), MeasureKind::Regular);
}

#[test]
fn harmonies_follow_the_part_cursor() {
    let score = build(vec![
        SourceEvent::Note(note(NoteName::C, DurationKind::Quarter)),
        SourceEvent::Harmony {
            harmony: Harmony {
                symbol: "G7".to_string(),
            },
            offset: WholeNotes::zero(),
        },
        SourceEvent::Note(note(NoteName::G, DurationKind::Eighth)),
        SourceEvent::Note(NoteEvent::rest(DurationKind::Eighth)),
        SourceEvent::Note(NoteEvent::rest(DurationKind::Half)),
    ]);
    let part = score.parts()[0];
    let voices = score.part_voices(part);
    assert_eq!(voices.len(), 2);
    assert_eq!(score.voice(voices[0]).kind(), VoiceKind::Harmonies);
    let measure = score.voice_measures(voices[0])[0];
    let harmony = score
        .measure(measure)
        .elements()
        .iter()
        .copied()
        .find(|el| matches!(score.element(*el).kind, ElementKind::Harmony { .. }))
        .unwrap();
    assert_eq!(score.element(harmony).measure_position().get(), wn(1, 4));
    assert_eq!(score.measure(measure).sounding_whole_notes(), WholeNotes::whole());
    assert_eq!(score.part_divisions_per_quarter_note(part), 2);
}

#[test]
fn voice_appearing_in_a_later_measure() {
    let _ = env_logger::builder().is_test(true).try_init();
    let events = vec![
        SourceEvent::part("P1", "Piano"),
        SourceEvent::measure("1"),
        SourceEvent::Time(TimeSignature::new(4, 4)),
        SourceEvent::Note(note(NoteName::C, DurationKind::Whole)),
        SourceEvent::MeasureEnd,
        SourceEvent::measure("2"),
        SourceEvent::Note(note(NoteName::D, DurationKind::Whole)),
        SourceEvent::Backup(WholeNotes::whole()),
        SourceEvent::Note(note(NoteName::F, DurationKind::Half).in_voice(1, 2)),
        SourceEvent::MeasureEnd,
        SourceEvent::PartEnd,
    ];
    let mut builder = ScoreBuilder::new(&AssemblyOptions::default()).unwrap();
    builder
        .handle_all(events.into_iter().enumerate().map(|(idx, ev)| (idx + 1, ev)))
        .unwrap();
    let score = builder.finish().unwrap();
    let part = score.parts()[0];
    assert_eq!(
        score.part(part).measures_whole_notes(),
        [WholeNotes::whole(), WholeNotes::whole()]
    );
    let voices = score.part_voices(part);
    assert_eq!(voices.len(), 2);
    let first = score.measure(score.voice_measures(voices[0])[1]);
    let late_measures = score.voice_measures(voices[1]);
    let [late] = late_measures[..] else {
        panic!("second voice should have one measure");
    };
    let late = score.measure(late);
    assert_eq!(late.number(), "2");
    assert!(!late.is_first_in_voice());
    assert_eq!(late.ordinal(), first.ordinal());
    assert_eq!(late.purist_number(), Some(2));
    assert_eq!(late.purist_number(), first.purist_number());
    assert_eq!(late.voice_position().get(), WholeNotes::whole());
    assert_eq!(late.kind(), MeasureKind::Regular);
    let notes = late
        .elements()
        .iter()
        .filter(|el| score.element(**el).as_note().is_some())
        .map(|el| score.element(*el).voice_position().get())
        .collect_vec();
    assert_eq!(notes[0], WholeNotes::whole());
    assert_eq!(score.voice(voices[1]).position().get(), wn(2, 1));
}
