//! Exact-rational durations, measured in whole notes.
//!
//! Every duration and position of the tree is a `WholeNotes`. It wraps
//! `fraction::Fraction`, which is always kept reduced, and never
//! quantizes: the whole assembly relies on exact sums.
//!
//! # Example
//!
//! ```
//! use msr_score::primitives::{DurationKind, WholeNotes};
//!
//! let quarter = DurationKind::Quarter.whole_notes();
//! let dotted_eighth = DurationKind::Eighth.with_dots(1);
//! assert_eq!(quarter + dotted_eighth, WholeNotes::new(7, 16).unwrap());
//! assert!(WholeNotes::new(1, 0).is_err());
//! ```

use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use fraction::Fraction;

use crate::errors::{MsrError, MsrResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WholeNotes {
    fraction: Fraction,
}
impl WholeNotes {
    /// Fails with `InvalidDuration` on zero or negative denominator.
    ///
    /// Negative numerators are allowed: differences of positions are
    /// `WholeNotes` too.
    pub fn new(numerator: i64, denominator: i64) -> MsrResult<Self> {
        if denominator <= 0 {
            return Err(MsrError::InvalidDuration {
                line: 0,
                message: format!(
                    "{numerator}/{denominator}: denominator should be positive"
                ),
            });
        }
        Ok(Self::from_parts(numerator, denominator as u64))
    }

    fn from_parts(numerator: i64, denominator: u64) -> Self {
        let fraction = match numerator < 0 {
            true => Fraction::new_neg(numerator.unsigned_abs(), denominator),
            false => Fraction::new(numerator as u64, denominator),
        };
        Self::wrap(fraction)
    }

    /// Keeps zero unsigned, so that derived `Eq`/`Hash` stay consistent.
    fn wrap(fraction: Fraction) -> Self {
        match fraction.numer() {
            Some(0) => Self {
                fraction: Fraction::new(0_u64, 1_u64),
            },
            _ => Self { fraction },
        }
    }

    pub fn zero() -> Self {
        Self::from_parts(0, 1)
    }
    pub fn whole() -> Self {
        Self::from_parts(1, 1)
    }
    pub fn from_integer(value: i64) -> Self {
        Self::from_parts(value, 1)
    }

    pub fn get(&self) -> Fraction {
        self.fraction
    }
    /// Signed numerator of the reduced fraction.
    pub fn numerator(&self) -> i64 {
        let numer = *self.fraction.numer().unwrap_or(&0) as i64;
        match self.is_negative() {
            true => -numer,
            false => numer,
        }
    }
    /// Denominator of the reduced fraction, always > 0.
    pub fn denominator(&self) -> u64 {
        *self.fraction.denom().unwrap_or(&1)
    }

    pub fn is_zero(&self) -> bool {
        self.numerator() == 0
    }
    pub fn is_negative(&self) -> bool {
        self.fraction.is_sign_negative() && self.fraction.numer() != Some(&0)
    }
    /// Strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && !self.is_negative()
    }

    /// Multiply by `numerator / denominator`.
    ///
    /// Used by the tuplets machinery, that keeps its own factors as
    /// integer pairs.
    pub fn scaled(&self, numerator: u64, denominator: u64) -> Self {
        let factor = Fraction::new(numerator, denominator.max(1));
        Self::wrap(self.fraction * factor)
    }

    /// How many times `other` fits into `self`, as exact ratio.
    pub fn ratio_to(&self, other: &Self) -> Option<Fraction> {
        match other.is_zero() {
            true => None,
            false => Some(self.fraction / other.fraction),
        }
    }

    pub fn max(self, other: Self) -> Self {
        match self >= other {
            true => self,
            false => other,
        }
    }
    pub fn min(self, other: Self) -> Self {
        match self <= other {
            true => self,
            false => other,
        }
    }

    /// For diagnostics only. Never compare these values.
    pub fn as_f64(&self) -> f64 {
        self.numerator() as f64 / self.denominator() as f64
    }
}
impl Default for WholeNotes {
    fn default() -> Self {
        Self::zero()
    }
}
impl fmt::Display for WholeNotes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.denominator() {
            1 => write!(f, "{}", self.numerator()),
            denom => write!(f, "{}/{}", self.numerator(), denom),
        }
    }
}
impl Add for WholeNotes {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self::wrap(self.fraction + rhs.fraction)
    }
}
impl Sub for WholeNotes {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self::wrap(self.fraction - rhs.fraction)
    }
}
impl AddAssign for WholeNotes {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
impl SubAssign for WholeNotes {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}
impl Neg for WholeNotes {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::zero() - self
    }
}
impl Sum for WholeNotes {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, item| acc + item)
    }
}
impl<'a> Sum<&'a WholeNotes> for WholeNotes {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, item| acc + *item)
    }
}

/// Written note values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DurationKind {
    Maxima,
    Long,
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    N16th,
    N32nd,
    N64th,
    N128th,
    N256th,
    N512th,
    N1024th,
}
impl DurationKind {
    pub fn whole_notes(&self) -> WholeNotes {
        match self {
            Self::Maxima => WholeNotes::from_parts(8, 1),
            Self::Long => WholeNotes::from_parts(4, 1),
            Self::Breve => WholeNotes::from_parts(2, 1),
            Self::Whole => WholeNotes::from_parts(1, 1),
            Self::Half => WholeNotes::from_parts(1, 2),
            Self::Quarter => WholeNotes::from_parts(1, 4),
            Self::Eighth => WholeNotes::from_parts(1, 8),
            Self::N16th => WholeNotes::from_parts(1, 16),
            Self::N32nd => WholeNotes::from_parts(1, 32),
            Self::N64th => WholeNotes::from_parts(1, 64),
            Self::N128th => WholeNotes::from_parts(1, 128),
            Self::N256th => WholeNotes::from_parts(1, 256),
            Self::N512th => WholeNotes::from_parts(1, 512),
            Self::N1024th => WholeNotes::from_parts(1, 1024),
        }
    }

    /// Every dot adds half of the previous addition:
    /// `base * (2 - 1/2^dots)`.
    pub fn with_dots(&self, dots: u8) -> WholeNotes {
        let dots = dots.min(8) as u32;
        let denominator = 2_u64.pow(dots);
        self.whole_notes()
            .scaled(2 * denominator - 1, denominator)
    }

    /// Find written value and dots, that give exactly `whole_notes`.
    pub fn from_whole_notes(whole_notes: WholeNotes) -> Option<(Self, u8)> {
        for kind in Self::all() {
            for dots in 0..4 {
                if kind.with_dots(dots) == whole_notes {
                    return Some((kind, dots));
                }
            }
        }
        None
    }

    fn all() -> [Self; 14] {
        [
            Self::Maxima,
            Self::Long,
            Self::Breve,
            Self::Whole,
            Self::Half,
            Self::Quarter,
            Self::Eighth,
            Self::N16th,
            Self::N32nd,
            Self::N64th,
            Self::N128th,
            Self::N256th,
            Self::N512th,
            Self::N1024th,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::{DurationKind, WholeNotes};

    #[test]
    fn whole_notes_are_reduced() {
        let a = WholeNotes::new(2, 8).unwrap();
        assert_eq!(a.numerator(), 1);
        assert_eq!(a.denominator(), 4);
        assert_eq!(a, DurationKind::Quarter.whole_notes());
        assert_eq!(a.to_string(), "1/4");
        assert_eq!(WholeNotes::new(8, 4).unwrap().to_string(), "2");
    }

    #[test]
    fn invalid_denominators() {
        assert!(WholeNotes::new(1, 0).is_err());
        assert!(WholeNotes::new(1, -4).is_err());
        assert!(WholeNotes::new(-1, 4).is_ok());
    }

    #[test]
    fn arithmetic_is_exact() {
        let third = WholeNotes::new(1, 3).unwrap();
        let sum: WholeNotes = [third, third, third].iter().sum();
        assert_eq!(sum, WholeNotes::whole());
        let diff = WholeNotes::new(1, 4).unwrap() - WholeNotes::new(1, 2).unwrap();
        assert!(diff.is_negative());
        assert_eq!(diff.numerator(), -1);
        assert_eq!(diff, -WholeNotes::new(1, 4).unwrap());
        assert!(third < WholeNotes::new(1, 2).unwrap());
        assert!(diff < WholeNotes::zero());
    }

    #[test]
    fn dotted_values() {
        assert_eq!(
            DurationKind::Quarter.with_dots(1),
            WholeNotes::new(3, 8).unwrap()
        );
        assert_eq!(
            DurationKind::Half.with_dots(2),
            WholeNotes::new(7, 8).unwrap()
        );
        assert_eq!(
            DurationKind::from_whole_notes(WholeNotes::new(3, 16).unwrap()),
            Some((DurationKind::Eighth, 1))
        );
        assert_eq!(
            DurationKind::from_whole_notes(WholeNotes::new(1, 12).unwrap()),
            None
        );
    }
}
