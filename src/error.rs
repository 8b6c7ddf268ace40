/*!
Errors returned by the evaluation engine. Only malformed input and configurations without
defined semantics are errors. A zero denominator is *not* an error: it is resolved into a
`MetricValue` by the active `UndefinedPolicy`.
*/
use std::io;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EvaluationError>;

/// Why a label collection was rejected when building a `LabelIndex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidLabelSet {
    /// No label at all.
    Empty,
    /// The same label appears twice.
    DuplicateLabel(String),
    /// A legend assigns the same index twice.
    DuplicateIndex(usize),
    /// A legend skips an index. Indices must be dense, starting at 0.
    MissingIndex(usize),
}

impl std::fmt::Display for InvalidLabelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "the label set is empty"),
            Self::DuplicateLabel(label) => write!(f, "the label `{}` appears twice", label),
            Self::DuplicateIndex(idx) => write!(f, "the index {} is assigned twice", idx),
            Self::MissingIndex(idx) => write!(f, "no label is assigned to index {}", idx),
        }
    }
}

/// Enum error encompassing every fatal failure of the evaluation engine.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Invalid label set: {0}")]
    InvalidLabelSet(InvalidLabelSet),
    #[error("Malformed outcome line {line}: {reason}")]
    MalformedOutcomeLine { line: usize, reason: String },
    #[error("Unknown label index {index} on line {line}; only {label_count} labels are declared")]
    UnknownLabelIndex {
        line: usize,
        index: usize,
        label_count: usize,
    },
    #[error("The instance id `{0}` appears more than once")]
    DuplicateInstanceId(String),
    #[error("Unsupported evaluation mode: {0}")]
    UnsupportedEvaluationMode(String),
    #[error("Beta value is not positive")]
    BetaNotPositive,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<InvalidLabelSet> for EvaluationError {
    fn from(value: InvalidLabelSet) -> Self {
        Self::InvalidLabelSet(value)
    }
}

impl EvaluationError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedOutcomeLine {
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedEvaluationMode(reason.into())
    }
}
