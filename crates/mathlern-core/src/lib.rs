#![warn(clippy::unwrap_used, clippy::expect_used)]
//! Shared contract of the practice engine: the [`Question`] record, the
//! operation taxonomy and the [`QuestionGenerator`] trait every math domain
//! implements.

mod error;
mod fraction;
mod question;

pub use error::{GenerationError, Result};
pub use fraction::{gcd, lcm, Fraction, FractionError};
pub use question::{
    clamp_unit, format_decimal, param_i64, param_str, range_for, round2, validate_ranges,
    AnswerFormat, AnswerValue, BaseRanges, DifficultyTier, Operation, ParamRange, Parameters,
    Question, QuestionParts, QuestionType, MAX_PARAM_MAGNITUDE,
};

use rand::seq::SliceRandom;
use rand::RngCore;

/// A procedural question source for one math domain.
///
/// Implementations must compute `correct_answer` from the sampled
/// parameters, so that [`QuestionGenerator::compute_answer`] applied to
/// `question.parameters` reproduces it.
pub trait QuestionGenerator {
    fn question_type(&self) -> QuestionType;

    fn supported_operations(&self) -> &'static [Operation];

    /// Builds a question at `difficulty` (clamped to `[0, 1]`). With no
    /// operation a supported one is drawn from `rng`.
    fn generate(
        &self,
        difficulty: f64,
        operation: Option<Operation>,
        rng: &mut dyn RngCore,
    ) -> Result<Question>;

    /// Recomputes the exact answer from generator parameters.
    fn compute_answer(&self, operation: Operation, parameters: &Parameters) -> Result<AnswerValue>;

    fn supports(&self, operation: Operation) -> bool {
        self.supported_operations().contains(&operation)
    }

    /// Resolves the operation to use, rejecting ones outside this domain.
    fn pick_operation(
        &self,
        operation: Option<Operation>,
        rng: &mut dyn RngCore,
    ) -> Result<Operation> {
        match operation {
            Some(op) if self.supports(op) => Ok(op),
            Some(op) => Err(GenerationError::UnsupportedOperation {
                question_type: self.question_type(),
                operation: op,
            }),
            None => self
                .supported_operations()
                .choose(rng)
                .copied()
                .ok_or_else(|| {
                    GenerationError::Unsatisfiable(format!(
                        "{} generator has no operations",
                        self.question_type()
                    ))
                }),
        }
    }

    /// True when the question's answer re-derives from its parameters.
    fn verify(&self, question: &Question) -> Result<bool> {
        if question.question_type != self.question_type() {
            return Ok(false);
        }
        let recomputed = self.compute_answer(question.operation, &question.parameters)?;
        Ok(recomputed == question.correct_answer)
    }
}
