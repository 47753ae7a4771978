use thiserror::Error;

use crate::fraction::FractionError;
use crate::question::{Operation, QuestionType};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Operation '{operation}' is not supported by the {question_type} generator")]
    UnsupportedOperation {
        question_type: QuestionType,
        operation: Operation,
    },
    #[error("Degenerate range for '{param}': min {min} must be below max {max}")]
    DegenerateRange { param: String, min: i64, max: i64 },
    #[error("Range for '{param}' ({min}..={max}) exceeds the magnitude limit {limit}")]
    RangeTooWide {
        param: String,
        min: i64,
        max: i64,
        limit: i64,
    },
    #[error("No range configured for parameter '{0}'")]
    MissingRange(String),
    #[error("Missing or malformed parameter '{0}'")]
    MissingParameter(String),
    #[error("Unsatisfiable generation constraint: {0}")]
    Unsatisfiable(String),
    #[error("No generator registered for topic '{0}'")]
    UnknownTopic(String),
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
    #[error(transparent)]
    Fraction(#[from] FractionError),
}

pub type Result<T> = std::result::Result<T, GenerationError>;
