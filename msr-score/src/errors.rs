//! Typed failures of the assembly pass.
//!
//! Every variant carries the source line the offending event came from,
//! so that a front-end can point at the input that broke the structure.
//! Formatting oddities with a sane default (overfull measures and the like)
//! never end up here, they are classified and logged instead.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MsrError {
    /// Rational with a zero or negative denominator.
    #[error("line {line}: invalid duration: {message}")]
    InvalidDuration { line: usize, message: String },

    /// Backup (or explicit position) before the start of the measure.
    #[error("line {line}: backup underflow in measure `{measure}`: {message}")]
    BackupUnderflow {
        line: usize,
        measure: String,
        message: String,
    },

    /// Something that must happen once happened twice.
    #[error("line {line}: {what} finalized more than once")]
    DoubleFinalization { line: usize, what: String },

    /// Repeat or measure-repeat transition not allowed in current phase.
    #[error("line {line}: invalid repeat phase: {message}")]
    InvalidRepeatPhase { line: usize, message: String },

    /// Member appended to a tuplet that already holds all its elements.
    #[error(
        "line {line}: tuplet {number} is full ({expected} elements), \
        can not append another one"
    )]
    TupletOverfull {
        line: usize,
        number: i32,
        expected: usize,
    },

    #[error("line {line}: unknown staff or voice: {message}")]
    UnknownStaffOrVoice { line: usize, message: String },

    #[error("configuration conflict: {0}")]
    ConfigurationConflict(String),

    #[error("line {line}: unsupported construct: {message}")]
    UnsupportedConstruct { line: usize, message: String },
}
impl MsrError {
    /// Source line of the event, that caused the error.
    ///
    /// Configuration conflicts do not come from the source, so they
    /// report line 0.
    pub fn line(&self) -> usize {
        match self {
            Self::InvalidDuration { line, .. }
            | Self::BackupUnderflow { line, .. }
            | Self::DoubleFinalization { line, .. }
            | Self::InvalidRepeatPhase { line, .. }
            | Self::TupletOverfull { line, .. }
            | Self::UnknownStaffOrVoice { line, .. }
            | Self::UnsupportedConstruct { line, .. } => *line,
            Self::ConfigurationConflict(_) => 0,
        }
    }

    /// Attach the source line to an error, produced by line-agnostic
    /// arithmetic (e.g. a `WholeNotes` constructor).
    pub fn with_line(mut self, new_line: usize) -> Self {
        match &mut self {
            Self::InvalidDuration { line, .. }
            | Self::BackupUnderflow { line, .. }
            | Self::DoubleFinalization { line, .. }
            | Self::InvalidRepeatPhase { line, .. }
            | Self::TupletOverfull { line, .. }
            | Self::UnknownStaffOrVoice { line, .. }
            | Self::UnsupportedConstruct { line, .. } => *line = new_line,
            Self::ConfigurationConflict(_) => (),
        }
        self
    }

    pub(crate) fn unsupported(line: usize, message: impl Into<String>) -> Self {
        Self::UnsupportedConstruct {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn unknown(line: usize, message: impl Into<String>) -> Self {
        Self::UnknownStaffOrVoice {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn repeat_phase(line: usize, message: impl Into<String>) -> Self {
        Self::InvalidRepeatPhase {
            line,
            message: message.into(),
        }
    }
}

pub type MsrResult<T> = Result<T, MsrError>;

#[cfg(test)]
mod tests {
    use super::MsrError;

    #[test]
    fn line_is_reported() {
        let err = MsrError::TupletOverfull {
            line: 42,
            number: 1,
            expected: 3,
        };
        assert_eq!(err.line(), 42);
        assert_eq!(
            err.to_string(),
            "line 42: tuplet 1 is full (3 elements), can not append another one"
        );
        assert_eq!(MsrError::ConfigurationConflict("x".into()).line(), 0);
    }
}
