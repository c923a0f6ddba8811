use std::fmt;

use super::WholeNotes;

/// `actual:normal` ratio of a tuplet, e.g. `3:2` for a triplet: three
/// notes are played in the time of two.
///
/// Always kept reduced. Sounding duration of a member is its display
/// duration multiplied by `normal / actual`.
///
/// # Example
///
/// ```
/// use msr_score::primitives::{TupletFactor, WholeNotes};
///
/// let triplet = TupletFactor::new(3, 2);
/// let nested = triplet.compose(&triplet);
/// assert_eq!(nested, TupletFactor::new(9, 4));
/// assert_eq!(
///     nested.apply(WholeNotes::new(1, 8).unwrap()),
///     WholeNotes::new(1, 18).unwrap()
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TupletFactor {
    actual: u64,
    normal: u64,
}
impl TupletFactor {
    /// Zero parts are replaced by 1.
    pub fn new(actual: u64, normal: u64) -> Self {
        let (actual, normal) = (actual.max(1), normal.max(1));
        let divisor = super::fraction_tools::gcd(actual, normal);
        Self {
            actual: actual / divisor,
            normal: normal / divisor,
        }
    }
    pub fn identity() -> Self {
        Self::new(1, 1)
    }

    pub fn actual(&self) -> u64 {
        self.actual
    }
    pub fn normal(&self) -> u64 {
        self.normal
    }
    pub fn is_identity(&self) -> bool {
        self.actual == self.normal
    }

    /// Factor of a tuplet nested in a tuplet with factor `containing`.
    pub fn compose(&self, containing: &Self) -> Self {
        Self::new(
            self.actual * containing.actual,
            self.normal * containing.normal,
        )
    }

    /// Display duration → sounding duration.
    pub fn apply(&self, display: WholeNotes) -> WholeNotes {
        display.scaled(self.normal, self.actual)
    }
    /// Sounding duration → display duration.
    pub fn unapply(&self, sounding: WholeNotes) -> WholeNotes {
        sounding.scaled(self.actual, self.normal)
    }
}
impl Default for TupletFactor {
    fn default() -> Self {
        Self::identity()
    }
}
impl fmt::Display for TupletFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.actual, self.normal)
    }
}
