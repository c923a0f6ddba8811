//! Read-only options of the assembly pass.
//!
//! Constructed once by the caller (usually deserialized from whatever the
//! command line layer produced), validated, and then passed by reference
//! into `ScoreBuilder`.
//!
//! # Example
//!
//! ```
//! use msr_score::config::{AssemblyOptions, WordsConversion};
//!
//! let mut options = AssemblyOptions::default();
//! options.cubase = true;
//! options.words_to_segno.insert("Segno".to_string());
//! let options = options.effective().unwrap();
//! assert!(options.ignore_redundant_clefs);
//! assert_eq!(options.words_conversion("Segno"), WordsConversion::Segno);
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    errors::{MsrError, MsrResult},
    notation::{AttachmentKind, CodaKind, DalSegnoKind, HairpinKind, Placement, WordsStyle},
};

type StringSet = BTreeSet<String>;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AssemblyOptions {
    pub ignored_part_ids: StringSet,
    pub kept_part_ids: StringSet,
    pub ignored_part_names: StringSet,
    pub kept_part_names: StringSet,

    pub ignore_redundant_clefs: bool,
    pub ignore_redundant_keys: bool,
    pub ignore_redundant_times: bool,

    pub delay_rests_dynamics: bool,
    pub delay_rests_words: bool,
    pub delay_rests_beams: bool,
    pub delay_rests_slurs: bool,
    pub delay_rests_ligatures: bool,
    pub delay_rests_pedals: bool,
    pub delay_rests_slashes: bool,
    pub delay_rests_wedges: bool,

    pub slash_all_grace_notes: bool,
    pub slur_all_grace_notes: bool,
    pub beam_all_grace_notes: bool,

    pub ignore_articulations: bool,
    pub ignore_ornaments: bool,
    pub ignore_ties: bool,
    pub ignore_dynamics: bool,
    pub ignore_slurs: bool,
    pub ignore_wedges: bool,
    pub ignore_lyrics: bool,
    pub ignore_harmonies: bool,
    pub ignore_figured_basses: bool,

    pub words_to_bold: StringSet,
    pub words_to_italic: StringSet,
    pub words_to_above: StringSet,
    pub words_to_below: StringSet,
    pub words_to_tempo: StringSet,
    pub words_to_rehearsal_mark: StringSet,
    pub words_to_segno: StringSet,
    pub words_to_dal_segno: StringSet,
    pub words_to_dal_segno_al_fine: StringSet,
    pub words_to_dal_segno_al_coda: StringSet,
    pub words_to_coda_first: StringSet,
    pub words_to_coda_second: StringSet,
    pub words_to_cresc: StringSet,
    pub words_to_decresc: StringSet,

    /// Settings useful for MusicXML exported from Cubase:
    /// implies all `ignore_redundant_*` flags.
    pub cubase: bool,
}

/// What a `<words/>` direction becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordsConversion {
    Words { style: WordsStyle, placement: Placement },
    Tempo,
    RehearsalMark,
    Segno,
    DalSegno(DalSegnoKind),
    Coda(CodaKind),
    Hairpin(HairpinKind),
}

impl AssemblyOptions {
    /// Check the option sets against each other.
    ///
    /// Fails with `ConfigurationConflict` when an ignore set and its keep
    /// counterpart are both given, or when the same words text converts
    /// into two different element kinds.
    pub fn validate(&self) -> MsrResult<()> {
        if !self.ignored_part_ids.is_empty() && !self.kept_part_ids.is_empty() {
            return Err(MsrError::ConfigurationConflict(
                "part ids can not be both ignored and kept".to_string(),
            ));
        }
        if !self.ignored_part_names.is_empty()
            && !self.kept_part_names.is_empty()
        {
            return Err(MsrError::ConfigurationConflict(
                "part names can not be both ignored and kept".to_string(),
            ));
        }
        let converting = self.converting_sets();
        for (idx, (name_a, set_a)) in converting.iter().enumerate() {
            for (name_b, set_b) in converting.iter().skip(idx + 1) {
                if let Some(text) = set_a.intersection(set_b).next() {
                    return Err(MsrError::ConfigurationConflict(format!(
                        "words \"{text}\" converted both to {name_a} and to {name_b}"
                    )));
                }
            }
        }
        if let Some(text) = self.words_to_above.intersection(&self.words_to_below).next() {
            return Err(MsrError::ConfigurationConflict(format!(
                "words \"{text}\" placed both above and below"
            )));
        }
        Ok(())
    }

    /// Validated copy with combined modes expanded.
    pub fn effective(&self) -> MsrResult<Self> {
        self.validate()?;
        let mut options = self.clone();
        if options.cubase {
            options.ignore_redundant_clefs = true;
            options.ignore_redundant_keys = true;
            options.ignore_redundant_times = true;
        }
        Ok(options)
    }

    pub fn is_part_ignored(&self, id: &str, name: &str) -> bool {
        if self.ignored_part_ids.contains(id) || self.ignored_part_names.contains(name) {
            return true;
        }
        if !self.kept_part_ids.is_empty() && !self.kept_part_ids.contains(id) {
            return true;
        }
        !self.kept_part_names.is_empty() && !self.kept_part_names.contains(name)
    }

    /// Whether attachments of this kind found on a rest wait for the
    /// next note.
    pub fn delays_on_rests(&self, kind: AttachmentKind) -> bool {
        match kind {
            AttachmentKind::Dynamic => self.delay_rests_dynamics,
            AttachmentKind::Words => self.delay_rests_words,
            AttachmentKind::Beam => self.delay_rests_beams,
            AttachmentKind::Slur => self.delay_rests_slurs,
            AttachmentKind::Ligature => self.delay_rests_ligatures,
            AttachmentKind::Pedal => self.delay_rests_pedals,
            AttachmentKind::Slash => self.delay_rests_slashes,
            AttachmentKind::Wedge => self.delay_rests_wedges,
            _ => false,
        }
    }

    pub fn ignores(&self, kind: AttachmentKind) -> bool {
        match kind {
            AttachmentKind::Articulation => self.ignore_articulations,
            AttachmentKind::Ornament => self.ignore_ornaments,
            AttachmentKind::Tie => self.ignore_ties,
            AttachmentKind::Dynamic => self.ignore_dynamics,
            AttachmentKind::Slur => self.ignore_slurs,
            AttachmentKind::Wedge => self.ignore_wedges,
            AttachmentKind::Lyric => self.ignore_lyrics,
            _ => false,
        }
    }

    pub fn words_conversion(&self, text: &str) -> WordsConversion {
        let converted = [
            (&self.words_to_tempo, WordsConversion::Tempo),
            (&self.words_to_rehearsal_mark, WordsConversion::RehearsalMark),
            (&self.words_to_segno, WordsConversion::Segno),
            (
                &self.words_to_dal_segno,
                WordsConversion::DalSegno(DalSegnoKind::DalSegno),
            ),
            (
                &self.words_to_dal_segno_al_fine,
                WordsConversion::DalSegno(DalSegnoKind::DalSegnoAlFine),
            ),
            (
                &self.words_to_dal_segno_al_coda,
                WordsConversion::DalSegno(DalSegnoKind::DalSegnoAlCoda),
            ),
            (&self.words_to_coda_first, WordsConversion::Coda(CodaKind::First)),
            (&self.words_to_coda_second, WordsConversion::Coda(CodaKind::Second)),
            (
                &self.words_to_cresc,
                WordsConversion::Hairpin(HairpinKind::Crescendo),
            ),
            (
                &self.words_to_decresc,
                WordsConversion::Hairpin(HairpinKind::Decrescendo),
            ),
        ]
        .into_iter()
        .find(|(set, _)| set.contains(text))
        .map(|(_, conversion)| conversion);
        if let Some(conversion) = converted {
            return conversion;
        }
        let style = match (
            self.words_to_bold.contains(text),
            self.words_to_italic.contains(text),
        ) {
            (true, _) => WordsStyle::Bold,
            (false, true) => WordsStyle::Italic,
            (false, false) => WordsStyle::Plain,
        };
        let placement = match (
            self.words_to_above.contains(text),
            self.words_to_below.contains(text),
        ) {
            (true, _) => Placement::Above,
            (false, true) => Placement::Below,
            (false, false) => Placement::Unspecified,
        };
        WordsConversion::Words { style, placement }
    }

    fn converting_sets(&self) -> Vec<(&'static str, &StringSet)> {
        vec![
            ("tempo", &self.words_to_tempo),
            ("rehearsal mark", &self.words_to_rehearsal_mark),
            ("segno", &self.words_to_segno),
            ("dal segno", &self.words_to_dal_segno),
            ("dal segno al fine", &self.words_to_dal_segno_al_fine),
            ("dal segno al coda", &self.words_to_dal_segno_al_coda),
            ("coda first", &self.words_to_coda_first),
            ("coda second", &self.words_to_coda_second),
            ("cresc", &self.words_to_cresc),
            ("decresc", &self.words_to_decresc),
        ]
    }
}
