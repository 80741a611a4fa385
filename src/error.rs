use std::fmt;

use thiserror::Error;

/// A fatal violation found while translating a directive region.
#[derive(Debug, Clone)]
pub struct TranslationError {
    pub kind: TranslationErrorKind,
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationErrorKind {
    /// Directive layout problems: overlapping regions, missing bodies, duplicate lines.
    Structural,
    /// Constructs the engine cannot translate: clauses, operators, loop shapes.
    Semantic,
    /// Constructs that would be unsafe once the code runs on the task runtime.
    Safety,
}

impl TranslationError {
    pub fn new(kind: TranslationErrorKind, line: usize, message: String) -> Self {
        Self {
            kind,
            line,
            message,
        }
    }
}

impl fmt::Display for TranslationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationErrorKind::Structural => write!(f, "structural"),
            TranslationErrorKind::Semantic => write!(f, "semantic"),
            TranslationErrorKind::Safety => write!(f, "safety"),
        }
    }
}

impl fmt::Display for TranslationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error at line {}: {}", self.kind, self.line, self.message)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Translation(TranslationError),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn structural(line: usize, message: impl Into<String>) -> Self {
        Error::Translation(TranslationError::new(
            TranslationErrorKind::Structural,
            line,
            message.into(),
        ))
    }

    pub fn semantic(line: usize, message: impl Into<String>) -> Self {
        Error::Translation(TranslationError::new(
            TranslationErrorKind::Semantic,
            line,
            message.into(),
        ))
    }

    pub fn safety(line: usize, message: impl Into<String>) -> Self {
        Error::Translation(TranslationError::new(
            TranslationErrorKind::Safety,
            line,
            message.into(),
        ))
    }

    /// The translation category, if this is a translation error.
    pub fn kind(&self) -> Option<TranslationErrorKind> {
        match self {
            Error::Translation(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl From<TranslationError> for Error {
    fn from(error: TranslationError) -> Self {
        Error::Translation(error)
    }
}
