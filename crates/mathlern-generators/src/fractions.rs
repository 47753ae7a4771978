use mathlern_adaptive::DifficultyMapper;
use mathlern_core::{
    param_i64, AnswerValue, BaseRanges, Fraction, GenerationError, Operation, Parameters,
    Question, QuestionGenerator, QuestionParts, QuestionType, Result,
};
use rand::{Rng, RngCore};
use serde_json::json;

use crate::common::{params, RangeSet};
use crate::distractor::{Distractors, DISTRACTOR_COUNT};

const OPERATIONS: &[Operation] = &[
    Operation::Addition,
    Operation::Subtraction,
    Operation::Multiplication,
    Operation::Division,
];

/// Below this difficulty both operands share a denominator.
const LIKE_DENOMINATORS_BELOW: f64 = 0.3;
/// From this difficulty numerators may exceed their denominator.
const IMPROPER_FROM: f64 = 0.7;

/// The four operations on fractions, answered in lowest terms.
#[derive(Debug, Clone)]
pub struct FractionsGenerator {
    ranges: RangeSet,
}

impl FractionsGenerator {
    #[must_use]
    pub fn new(mapper: DifficultyMapper) -> Self {
        Self {
            ranges: RangeSet::new(mapper, &[("denominator", 2, 12)]),
        }
    }

    pub fn with_base_ranges(mut self, ranges: BaseRanges) -> Result<Self> {
        self.ranges.merge(ranges)?;
        Ok(self)
    }

    fn operands(
        &self,
        difficulty: f64,
        rng: &mut dyn RngCore,
    ) -> Result<(i64, i64, i64, i64)> {
        let ranges = self.ranges.scaled(difficulty);
        let d1 = proper_denominator(ranges.sample_nonzero("denominator", rng)?);
        let d2 = if difficulty < LIKE_DENOMINATORS_BELOW {
            d1
        } else {
            proper_denominator(ranges.sample_nonzero("denominator", rng)?)
        };
        let numerator = |d: i64, rng: &mut dyn RngCore| {
            let upper = if difficulty >= IMPROPER_FROM { 2 * d - 1 } else { d - 1 };
            rng.gen_range(1..=upper.max(1))
        };
        let n1 = numerator(d1, &mut *rng);
        let n2 = numerator(d2, &mut *rng);
        Ok((n1, d1, n2, d2))
    }
}

impl QuestionGenerator for FractionsGenerator {
    fn question_type(&self) -> QuestionType {
        QuestionType::Fractions
    }

    fn supported_operations(&self) -> &'static [Operation] {
        OPERATIONS
    }

    fn generate(
        &self,
        difficulty: f64,
        operation: Option<Operation>,
        rng: &mut dyn RngCore,
    ) -> Result<Question> {
        let difficulty = mathlern_core::clamp_unit(difficulty);
        let operation = self.pick_operation(operation, rng)?;
        let (mut n1, mut d1, mut n2, mut d2) = self.operands(difficulty, rng)?;
        if operation == Operation::Subtraction && Fraction::new(n1, d1)? < Fraction::new(n2, d2)? {
            std::mem::swap(&mut n1, &mut n2);
            std::mem::swap(&mut d1, &mut d2);
        }

        let parameters = params([
            ("n1", json!(n1)),
            ("d1", json!(d1)),
            ("n2", json!(n2)),
            ("d2", json!(d2)),
            ("operation", json!(operation.name())),
        ]);
        let answer = self.compute_answer(operation, &parameters)?;
        let AnswerValue::Fraction(result) = &answer else {
            return Err(GenerationError::Unsatisfiable("fraction answer expected".into()));
        };

        let mut distractors = Distractors::new(&answer);
        match operation {
            Operation::Addition => {
                distractors.push_fraction(n1 + n2, d1 + d2);
                if d1 != d2 {
                    distractors.push_fraction(n1 + n2, d1.max(d2));
                }
            }
            Operation::Subtraction => {
                distractors.push_fraction(n1 - n2, d1 - d2);
                if d1 != d2 {
                    distractors.push_fraction(n1 - n2, d1.max(d2));
                }
            }
            Operation::Multiplication => {
                distractors.push_fraction(n1 * d2, d1 * n2);
                distractors.push_fraction(n1 * n2, d1);
            }
            _ => {
                distractors.push_fraction(n1 * n2, d1 * d2);
                distractors.push_fraction(d1 * n2, n1 * d2);
            }
        }
        if let Ok(inverse) = result.recip() {
            distractors.push(AnswerValue::Fraction(inverse));
        }
        distractors.push_fraction(result.numerator() + 1, result.denominator());

        let symbol = match operation {
            Operation::Addition => "+",
            Operation::Subtraction => "-",
            Operation::Multiplication => "×",
            _ => "÷",
        };
        let mut steps = Vec::new();
        match operation {
            Operation::Addition | Operation::Subtraction if d1 != d2 => {
                let common = mathlern_core::lcm(d1, d2);
                steps.push(format!(
                    "Rewrite over {common}: {}/{common} {symbol} {}/{common}",
                    n1 * (common / d1),
                    n2 * (common / d2)
                ));
            }
            Operation::Division => steps.push(format!("Multiply by the reciprocal {d2}/{n2}")),
            _ => {}
        }
        steps.push(format!("Simplify to {result}"));

        let parts = QuestionParts {
            question_type: QuestionType::Fractions,
            operation,
            expression: format!("{n1}/{d1} {symbol} {n2}/{d2} = ?"),
            correct_answer: answer.clone(),
            distractors: distractors.finish(rng),
            parameters,
            difficulty,
            hint: Some("Give the answer in lowest terms.".into()),
            explanation: None,
            steps: Some(steps),
        };
        Question::assemble(parts, DISTRACTOR_COUNT, rng)
    }

    fn compute_answer(&self, operation: Operation, parameters: &Parameters) -> Result<AnswerValue> {
        let left = Fraction::new(param_i64(parameters, "n1")?, param_i64(parameters, "d1")?)?;
        let right = Fraction::new(param_i64(parameters, "n2")?, param_i64(parameters, "d2")?)?;
        let value = match operation {
            Operation::Addition => left + right,
            Operation::Subtraction => left - right,
            Operation::Multiplication => left * right,
            Operation::Division => left.checked_div(right)?,
            other => {
                return Err(GenerationError::UnsupportedOperation {
                    question_type: QuestionType::Fractions,
                    operation: other,
                })
            }
        };
        Ok(AnswerValue::Fraction(value))
    }
}

/// Denominators below 2 would turn the operand into a whole number.
fn proper_denominator(value: i64) -> i64 {
    value.abs().max(2)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn generator() -> FractionsGenerator {
        FractionsGenerator::new(DifficultyMapper::new())
    }

    #[test]
    fn answers_are_reduced_and_verifiable() {
        let gen = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        for difficulty in [0.1, 0.5, 0.9] {
            for _ in 0..25 {
                let q = gen.generate(difficulty, None, &mut rng).unwrap();
                let AnswerValue::Fraction(f) = q.correct_answer else {
                    panic!("fraction expected");
                };
                assert_eq!(mathlern_core::gcd(f.numerator(), f.denominator()), 1);
                assert!(f.denominator() > 0);
                assert!(gen.verify(&q).unwrap());
            }
        }
    }

    #[test]
    fn easy_questions_share_a_denominator() {
        let gen = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let q = gen.generate(0.1, Some(Operation::Addition), &mut rng).unwrap();
        assert_eq!(q.parameters["d1"], q.parameters["d2"]);
    }

    #[test]
    fn subtraction_result_is_non_negative() {
        let gen = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        for _ in 0..40 {
            let q = gen.generate(0.6, Some(Operation::Subtraction), &mut rng).unwrap();
            let AnswerValue::Fraction(f) = q.correct_answer else {
                panic!("fraction expected");
            };
            assert!(f.numerator() >= 0);
        }
    }

    #[test]
    fn known_addition() {
        let p = params([("n1", json!(1)), ("d1", json!(4)), ("n2", json!(1)), ("d2", json!(4))]);
        assert_eq!(
            generator().compute_answer(Operation::Addition, &p).unwrap(),
            AnswerValue::Fraction(Fraction::new(1, 2).unwrap())
        );
    }

    #[test]
    fn division_by_zero_fraction_fails() {
        let p = params([("n1", json!(1)), ("d1", json!(4)), ("n2", json!(0)), ("d2", json!(4))]);
        assert!(generator().compute_answer(Operation::Division, &p).is_err());
    }
}
