//! Tools for turning exact durations into export-friendly integers.

use super::{DurationKind, TupletFactor, WholeNotes};

pub fn gcd(a: u64, b: u64) -> u64 {
    match b {
        0 => a.max(1),
        _ => gcd(b, a % b),
    }
}

pub fn lcm(a: u64, b: u64) -> u64 {
    a / gcd(a, b) * b
}

/// Least common multiple of the denominators of all given durations.
///
/// With it every duration is an integer amount of
/// `1 / lcm` whole notes.
pub fn lcm_of_denominators(
    durations: impl IntoIterator<Item = WholeNotes>,
) -> u64 {
    durations
        .into_iter()
        .filter(|dur| !dur.is_zero())
        .fold(1, |acc, dur| lcm(acc, dur.denominator()))
}

/// Smallest amount of divisions per quarter note, such that `shortest`
/// is an integer amount of divisions.
///
/// # Example
///
/// ```
/// use msr_score::primitives::{divisions_per_quarter_note, WholeNotes};
///
/// // sixteenth notes → 4 divisions per quarter
/// assert_eq!(
///     divisions_per_quarter_note(WholeNotes::new(1, 16).unwrap()),
///     4
/// );
/// // triplet eighths → 3 divisions per quarter
/// assert_eq!(
///     divisions_per_quarter_note(WholeNotes::new(1, 12).unwrap()),
///     3
/// );
/// // dotted quarter → 2 divisions per quarter
/// assert_eq!(
///     divisions_per_quarter_note(WholeNotes::new(3, 8).unwrap()),
///     2
/// );
/// ```
pub fn divisions_per_quarter_note(shortest: WholeNotes) -> u64 {
    if !shortest.is_positive() {
        return 1;
    }
    let quarter = DurationKind::Quarter.whole_notes();
    // quarter / shortest == a / b (reduced) → `a` divisions per quarter
    let ratio = quarter.scaled(shortest.denominator(), shortest.numerator() as u64);
    ratio.numerator().max(1) as u64
}

/// Like `divisions_per_quarter_note`, for a note that was displayed
/// as `display` under `factor`.
pub fn divisions_for_display(display: WholeNotes, factor: TupletFactor) -> u64 {
    divisions_per_quarter_note(factor.apply(display))
}

#[cfg(test)]
mod tests {
    use super::{divisions_for_display, gcd, lcm, lcm_of_denominators};
    use crate::primitives::{TupletFactor, WholeNotes};

    #[test]
    fn gcd_lcm() {
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(gcd(0, 0), 1);
        assert_eq!(lcm(4, 6), 12);
    }

    #[test]
    fn denominators() {
        let durations = [
            WholeNotes::new(1, 4).unwrap(),
            WholeNotes::new(1, 6).unwrap(),
            WholeNotes::zero(),
        ];
        assert_eq!(lcm_of_denominators(durations), 12);
    }

    #[test]
    fn display_under_factor() {
        let eighth = WholeNotes::new(1, 8).unwrap();
        assert_eq!(divisions_for_display(eighth, TupletFactor::new(3, 2)), 3);
        assert_eq!(divisions_for_display(eighth, TupletFactor::identity()), 2);
    }
}
