use std::path::PathBuf;

use crate::escape_ascii;

/// Represents a failure to parse a condition expression string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConditionParseError {
    position: usize,
    expected: Box<str>,
}

impl ConditionParseError {
    pub(crate) fn new(position: usize, expected: &str) -> Self {
        Self {
            position,
            expected: expected.into(),
        }
    }

    /// The byte offset into the expression at which parsing failed.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl std::fmt::Display for ConditionParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "expected {} at byte offset {}",
            self.expected, self.position
        )
    }
}

impl std::error::Error for ConditionParseError {}

/// Represents a failure to evaluate a parsed condition expression.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConditionEvalError {
    IoError(PathBuf, std::io::Error),
}

impl std::fmt::Display for ConditionEvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(path, _) => write!(
                f,
                "an I/O error occurred while evaluating a condition against \"{}\"",
                escape_ascii(path)
            ),
        }
    }
}

impl std::error::Error for ConditionEvalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(_, e) => Some(e),
        }
    }
}

/// Represents an error that occurred while parsing or evaluating a condition
/// expression.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConditionError {
    /// The expression string could not be parsed.
    ParseError(String, ConditionParseError),
    /// The expression could not be evaluated.
    EvalError(String, ConditionEvalError),
}

impl std::fmt::Display for ConditionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParseError(condition, _) => {
                write!(f, "the condition \"{condition}\" could not be parsed")
            }
            Self::EvalError(condition, _) => {
                write!(f, "the condition \"{condition}\" could not be evaluated")
            }
        }
    }
}

impl std::error::Error for ConditionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ParseError(_, e) => Some(e),
            Self::EvalError(_, e) => Some(e),
        }
    }
}
