use mathlern_core::AnswerFormat;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Cannot read '{input}' as {format}")]
    Unparseable { input: String, format: AnswerFormat },
}

pub type Result<T> = std::result::Result<T, ValidationError>;
