//! Everything needed to place elements in time.
//!
//! Mainly, there are two kinds of positions: measure and voice.
//!
//! `MeasurePosition` is the distance from the start of the owning measure.
//! `VoicePosition` is the distance from the start of the owning voice,
//! i.e. the sum of the full durations of the measures before plus the
//! in-measure offset.
//!
//! # Examples
//!
//! ```
//! use msr_score::primitives::{
//!     MeasurePosition, Position, VoicePosition, WholeNotes,
//! };
//!
//! let quarter = WholeNotes::new(1, 4).unwrap();
//! let eighth = WholeNotes::new(1, 8).unwrap();
//! let in_measure = MeasurePosition::accumulate([quarter, eighth]);
//! assert_eq!(in_measure.get(), WholeNotes::new(3, 8).unwrap());
//!
//! let voice = VoicePosition::accumulate(
//!     [WholeNotes::new(3, 4).unwrap(), WholeNotes::whole()],
//!     in_measure,
//! );
//! assert_eq!(voice.get(), WholeNotes::new(17, 8).unwrap());
//! assert_eq!(
//!     voice.distance_to(&VoicePosition::start()),
//!     WholeNotes::new(17, 8).unwrap()
//! );
//! ```

use std::{fmt, ops::Add};

use crate::errors::{MsrError, MsrResult};

use super::WholeNotes;

/// Unifies distance calculations between positions of one kind.
pub trait Position {
    fn get(&self) -> WholeNotes;

    /// Absolute distance, never negative.
    fn distance_to(&self, other: &Self) -> WholeNotes {
        let (a, b) = (self.get(), other.get());
        match a < b {
            true => b - a,
            false => a - b,
        }
    }
}

/// Offset from the start of the owning measure. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MeasurePosition {
    position: WholeNotes,
}
impl MeasurePosition {
    pub fn start() -> Self {
        Self {
            position: WholeNotes::zero(),
        }
    }

    /// Fails with `BackupUnderflow` if position is before the measure
    /// start.
    pub fn new(position: WholeNotes, measure_number: &str) -> MsrResult<Self> {
        if position.is_negative() {
            return Err(MsrError::BackupUnderflow {
                line: 0,
                measure: measure_number.to_string(),
                message: format!(
                    "position {position} precedes the start of the measure"
                ),
            });
        }
        Ok(Self { position })
    }

    /// Sum of the sounding durations of the prior siblings.
    pub fn accumulate(
        durations: impl IntoIterator<Item = WholeNotes>,
    ) -> Self {
        Self {
            position: durations.into_iter().sum(),
        }
    }

    pub fn advanced_by(&self, duration: WholeNotes) -> MsrResult<Self> {
        Self::new(self.position + duration, "")
    }

    pub fn is_start(&self) -> bool {
        self.position.is_zero()
    }
}
impl Position for MeasurePosition {
    fn get(&self) -> WholeNotes {
        self.position
    }
}
impl Add<WholeNotes> for MeasurePosition {
    type Output = Self;
    /// Saturates at the measure start: use `advanced_by` for checked
    /// arithmetic.
    fn add(self, rhs: WholeNotes) -> Self::Output {
        Self {
            position: (self.position + rhs).max(WholeNotes::zero()),
        }
    }
}
impl fmt::Display for MeasurePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.position)
    }
}

/// Offset from the start of the owning voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VoicePosition {
    position: WholeNotes,
}
impl VoicePosition {
    pub fn start() -> Self {
        Self {
            position: WholeNotes::zero(),
        }
    }

    /// Voice position of an element, given the voice position of its
    /// measure.
    pub fn from_measure(
        measure_start: VoicePosition,
        in_measure: MeasurePosition,
    ) -> Self {
        Self {
            position: measure_start.position + in_measure.get(),
        }
    }

    /// Prior measures full durations plus the in-measure offset.
    pub fn accumulate(
        measure_durations: impl IntoIterator<Item = WholeNotes>,
        in_measure: MeasurePosition,
    ) -> Self {
        let measure_start = Self {
            position: measure_durations.into_iter().sum(),
        };
        Self::from_measure(measure_start, in_measure)
    }
}
impl Position for VoicePosition {
    fn get(&self) -> WholeNotes {
        self.position
    }
}
impl Add<WholeNotes> for VoicePosition {
    type Output = Self;
    fn add(self, rhs: WholeNotes) -> Self::Output {
        Self {
            position: (self.position + rhs).max(WholeNotes::zero()),
        }
    }
}
impl fmt::Display for VoicePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice@{}", self.position)
    }
}

/// A measure position with a relative offset, as MusicXML `<offset>`
/// gives for harmonies and figured basses.
///
/// The offset may be negative, the resolved position is clamped at the
/// measure start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Moment {
    pub position: MeasurePosition,
    pub relative_offset: WholeNotes,
}
impl Moment {
    pub fn new(position: MeasurePosition, relative_offset: WholeNotes) -> Self {
        Self {
            position,
            relative_offset,
        }
    }
    pub fn resolved(&self) -> MeasurePosition {
        self.position + self.relative_offset
    }
}
impl fmt::Display for Moment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:+}", self.position, self.relative_offset.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::MsrError;
    use crate::primitives::{
        MeasurePosition, Moment, Position, VoicePosition, WholeNotes,
    };

    #[test]
    fn measure_position() {
        let a = MeasurePosition::new(WholeNotes::new(1, 4).unwrap(), "1")
            .unwrap();
        let b = a.advanced_by(WholeNotes::new(1, 8).unwrap()).unwrap();
        assert_eq!(b.get(), WholeNotes::new(3, 8).unwrap());
        assert_eq!(a.distance_to(&b), WholeNotes::new(1, 8).unwrap());
        assert_eq!(b.distance_to(&a), WholeNotes::new(1, 8).unwrap());
        assert!(a < b);
    }

    #[test]
    fn negative_measure_position() {
        let err = MeasurePosition::new(WholeNotes::new(-1, 4).unwrap(), "7")
            .unwrap_err();
        assert!(matches!(err, MsrError::BackupUnderflow { .. }));
        let start = MeasurePosition::start();
        assert!(start.advanced_by(WholeNotes::new(-1, 8).unwrap()).is_err());
    }

    #[test]
    fn voice_position() {
        let pos = VoicePosition::from_measure(
            VoicePosition::start() + WholeNotes::new(3, 4).unwrap(),
            MeasurePosition::new(WholeNotes::new(1, 2).unwrap(), "2")
                .unwrap(),
        );
        assert_eq!(pos.get(), WholeNotes::new(5, 4).unwrap());
    }

    #[test]
    fn moment() {
        let moment = Moment::new(
            MeasurePosition::new(WholeNotes::new(1, 2).unwrap(), "1")
                .unwrap(),
            WholeNotes::new(-1, 8).unwrap(),
        );
        assert_eq!(moment.resolved().get(), WholeNotes::new(3, 8).unwrap());
        let early = Moment::new(
            MeasurePosition::start(),
            WholeNotes::new(-1, 8).unwrap(),
        );
        assert!(early.resolved().is_start());
    }
}
