use std::fmt;

use super::WholeNotes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeSignatureSymbol {
    #[default]
    Numeric,
    Common,
    Cut,
    /// No meter at all: measures under it are cadenzas.
    SenzaMisura,
}

/// Time signature, possibly composite (`3+2/8`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimeSignature {
    beats: Vec<u32>,
    beat_type: u32,
    symbol: TimeSignatureSymbol,
}
impl TimeSignature {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            beats: vec![numerator],
            beat_type: denominator.max(1),
            symbol: TimeSignatureSymbol::Numeric,
        }
    }
    pub fn composite(beats: Vec<u32>, beat_type: u32) -> Self {
        Self {
            beats,
            beat_type: beat_type.max(1),
            symbol: TimeSignatureSymbol::Numeric,
        }
    }
    pub fn common() -> Self {
        Self {
            symbol: TimeSignatureSymbol::Common,
            ..Self::new(4, 4)
        }
    }
    pub fn cut() -> Self {
        Self {
            symbol: TimeSignatureSymbol::Cut,
            ..Self::new(2, 2)
        }
    }
    pub fn senza_misura() -> Self {
        Self {
            beats: Vec::new(),
            beat_type: 4,
            symbol: TimeSignatureSymbol::SenzaMisura,
        }
    }

    pub fn numerator(&self) -> u32 {
        self.beats.iter().sum()
    }
    pub fn denominator(&self) -> u32 {
        self.beat_type
    }
    pub fn symbol(&self) -> TimeSignatureSymbol {
        self.symbol
    }

    /// Duration of a full measure, `None` for senza misura.
    pub fn whole_notes_per_measure(&self) -> Option<WholeNotes> {
        match self.symbol {
            TimeSignatureSymbol::SenzaMisura => None,
            _ => WholeNotes::new(self.numerator() as i64, self.beat_type as i64)
                .ok(),
        }
    }
}
impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.symbol {
            TimeSignatureSymbol::SenzaMisura => write!(f, "senza misura"),
            _ => {
                let beats = self
                    .beats
                    .iter()
                    .map(|b| b.to_string())
                    .collect::<Vec<_>>()
                    .join("+");
                write!(f, "{beats}/{}", self.beat_type)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TimeSignature;
    use crate::primitives::WholeNotes;

    #[test]
    fn measure_durations() {
        assert_eq!(
            TimeSignature::new(6, 8).whole_notes_per_measure(),
            Some(WholeNotes::new(3, 4).unwrap())
        );
        let composite = TimeSignature::composite(vec![3, 2], 8);
        assert_eq!(composite.to_string(), "3+2/8");
        assert_eq!(
            composite.whole_notes_per_measure(),
            Some(WholeNotes::new(5, 8).unwrap())
        );
        assert_eq!(TimeSignature::senza_misura().whole_notes_per_measure(), None);
        assert_ne!(TimeSignature::common(), TimeSignature::new(4, 4));
    }
}
