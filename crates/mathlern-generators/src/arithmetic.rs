use mathlern_adaptive::DifficultyMapper;
use mathlern_core::{
    param_i64, param_str, AnswerValue, BaseRanges, GenerationError, Operation, Parameters,
    Question, QuestionGenerator, QuestionParts, QuestionType, Result,
};
use rand::RngCore;
use serde_json::json;

use crate::common::{coin, params, RangeSet};
use crate::distractor::{Distractors, DISTRACTOR_COUNT};

const OPERATIONS: &[Operation] = &[
    Operation::Addition,
    Operation::Subtraction,
    Operation::Multiplication,
    Operation::Division,
    Operation::Mixed,
];

/// Subtraction may go negative from this difficulty on.
const NEGATIVE_RESULTS_FROM: f64 = 0.8;

/// Whole-number arithmetic: the four operations and two-step order of
/// operations.
#[derive(Debug, Clone)]
pub struct ArithmeticGenerator {
    ranges: RangeSet,
}

impl ArithmeticGenerator {
    #[must_use]
    pub fn new(mapper: DifficultyMapper) -> Self {
        Self {
            ranges: RangeSet::new(
                mapper,
                &[
                    ("addend", 1, 100),
                    ("factor", 2, 12),
                    ("divisor", 2, 12),
                    ("quotient", 1, 25),
                    ("term", 1, 50),
                ],
            ),
        }
    }

    pub fn with_base_ranges(mut self, ranges: BaseRanges) -> Result<Self> {
        self.ranges.merge(ranges)?;
        Ok(self)
    }

    fn single(
        &self,
        difficulty: f64,
        operation: Operation,
        rng: &mut dyn RngCore,
    ) -> Result<QuestionParts> {
        let ranges = self.ranges.scaled(difficulty);
        let (a, b) = match operation {
            Operation::Addition => (ranges.sample("addend", rng)?, ranges.sample("addend", rng)?),
            Operation::Subtraction => {
                let x = ranges.sample("addend", rng)?;
                let y = ranges.sample("addend", rng)?;
                if difficulty < NEGATIVE_RESULTS_FROM && x < y {
                    (y, x)
                } else {
                    (x, y)
                }
            }
            Operation::Multiplication => {
                (ranges.sample("factor", rng)?, ranges.sample("factor", rng)?)
            }
            Operation::Division => {
                let divisor = ranges.sample_nonzero("divisor", rng)?;
                let quotient = ranges.sample("quotient", rng)?;
                (divisor * quotient, divisor)
            }
            other => {
                return Err(GenerationError::UnsupportedOperation {
                    question_type: QuestionType::Arithmetic,
                    operation: other,
                })
            }
        };

        let parameters = params([
            ("a", json!(a)),
            ("b", json!(b)),
            ("operation", json!(operation.name())),
        ]);
        let answer = self.compute_answer(operation, &parameters)?;
        let AnswerValue::Integer(result) = &answer else {
            return Err(GenerationError::Unsatisfiable("non-integer arithmetic result".into()));
        };

        let mut distractors = Distractors::new(&answer);
        // Operation confusion first, then the generic slips.
        match operation {
            Operation::Addition => distractors.push_int(a - b),
            Operation::Subtraction | Operation::Multiplication => distractors.push_int(a + b),
            _ if b < 20 => distractors.push_int(a * b),
            _ => distractors.push_int(a - b),
        };
        distractors.push_numeric_slips();

        Ok(QuestionParts {
            question_type: QuestionType::Arithmetic,
            operation,
            expression: format!("{a} {} {b} = ?", symbol(operation)),
            correct_answer: answer.clone(),
            distractors: distractors.finish(rng),
            parameters,
            difficulty,
            hint: Some(hint(operation).to_string()),
            explanation: Some(format!("{a} {} {b} = {result}", symbol(operation))),
            steps: None,
        })
    }

    fn mixed(&self, difficulty: f64, rng: &mut dyn RngCore) -> Result<QuestionParts> {
        let ranges = self.ranges.scaled(difficulty);
        let a = ranges.sample("term", rng)?;
        let op1 = if coin(rng) { "+" } else { "-" };
        let op2 = if coin(rng) { "×" } else { "÷" };
        let (b, c) = if op2 == "×" {
            (ranges.sample("factor", rng)?, ranges.sample("factor", rng)?)
        } else {
            let c = ranges.sample_nonzero("divisor", rng)?;
            (c * ranges.sample("quotient", rng)?, c)
        };
        let form = if coin(rng) { "leading" } else { "trailing" };

        let parameters = params([
            ("a", json!(a)),
            ("b", json!(b)),
            ("c", json!(c)),
            ("op1", json!(op1)),
            ("op2", json!(op2)),
            ("form", json!(form)),
            ("operation", json!(Operation::Mixed.name())),
        ]);
        let answer = self.compute_answer(Operation::Mixed, &parameters)?;

        #[allow(clippy::cast_precision_loss)]
        let (af, bf, cf) = (a as f64, b as f64, c as f64);
        let apply = |x: f64, op: &str, y: f64| match op {
            "+" => x + y,
            "-" => x - y,
            "×" => x * y,
            _ => x / y,
        };
        let mut distractors = Distractors::new(&answer);
        let expression = if form == "leading" {
            // left to right: (a op1 b) op2 c
            distractors.push_number(apply(apply(af, op1, bf), op2, cf));
            format!("{a} {op1} {b} {op2} {c} = ?")
        } else {
            // op1 bound first: b op2 (c op1 a)
            let inner = apply(cf, op1, af);
            if inner != 0.0 {
                distractors.push_number(apply(bf, op2, inner));
            }
            format!("{b} {op2} {c} {op1} {a} = ?")
        };
        distractors.push_numeric_slips();

        Ok(QuestionParts {
            question_type: QuestionType::Arithmetic,
            operation: Operation::Mixed,
            expression,
            correct_answer: answer,
            distractors: distractors.finish(rng),
            parameters,
            difficulty,
            hint: Some("Multiply and divide before adding and subtracting.".into()),
            explanation: None,
            steps: Some(vec![
                format!("{b} {op2} {c} = {}", if op2 == "×" { b * c } else { b / c }),
                "Then apply the remaining addition or subtraction.".into(),
            ]),
        })
    }
}

impl QuestionGenerator for ArithmeticGenerator {
    fn question_type(&self) -> QuestionType {
        QuestionType::Arithmetic
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
        let parts = match operation {
            Operation::Mixed => self.mixed(difficulty, rng)?,
            op => self.single(difficulty, op, rng)?,
        };
        Question::assemble(parts, DISTRACTOR_COUNT, rng)
    }

    fn compute_answer(&self, operation: Operation, parameters: &Parameters) -> Result<AnswerValue> {
        let a = param_i64(parameters, "a")?;
        let b = param_i64(parameters, "b")?;
        let value = match operation {
            Operation::Addition => a.checked_add(b),
            Operation::Subtraction => a.checked_sub(b),
            Operation::Multiplication => a.checked_mul(b),
            Operation::Division => exact_div(a, b)?,
            Operation::Mixed => {
                let c = param_i64(parameters, "c")?;
                let product = match param_str(parameters, "op2")? {
                    "×" => b.checked_mul(c),
                    "÷" => exact_div(b, c)?,
                    _ => return Err(GenerationError::MissingParameter("op2".into())),
                };
                let product = product.ok_or_else(overflow)?;
                let trailing = param_str(parameters, "form")? == "trailing";
                match (param_str(parameters, "op1")?, trailing) {
                    ("+", _) => a.checked_add(product),
                    ("-", false) => a.checked_sub(product),
                    ("-", true) => product.checked_sub(a),
                    _ => return Err(GenerationError::MissingParameter("op1".into())),
                }
            }
            other => {
                return Err(GenerationError::UnsupportedOperation {
                    question_type: QuestionType::Arithmetic,
                    operation: other,
                })
            }
        };
        value.map(AnswerValue::Integer).ok_or_else(overflow)
    }
}

fn exact_div(a: i64, b: i64) -> Result<Option<i64>> {
    if b == 0 {
        return Err(GenerationError::Unsatisfiable("division by zero".into()));
    }
    if a % b != 0 {
        return Err(GenerationError::Unsatisfiable(format!("{a} is not divisible by {b}")));
    }
    Ok(a.checked_div(b))
}

fn overflow() -> GenerationError {
    GenerationError::Unsatisfiable("integer overflow".into())
}

fn symbol(operation: Operation) -> &'static str {
    match operation {
        Operation::Addition => "+",
        Operation::Subtraction => "-",
        Operation::Multiplication => "×",
        _ => "÷",
    }
}

fn hint(operation: Operation) -> &'static str {
    match operation {
        Operation::Addition => "Add the ones first, then the tens.",
        Operation::Subtraction => "Check your answer by adding it back.",
        Operation::Multiplication => "Think of it as repeated addition.",
        _ => "Which number times the divisor gives the dividend?",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mathlern_core::ParamRange;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn generator() -> ArithmeticGenerator {
        ArithmeticGenerator::new(DifficultyMapper::new())
    }

    #[test]
    fn division_is_exact_and_never_by_zero() {
        let gen = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..20 {
            let q = gen.generate(0.6, Some(Operation::Division), &mut rng).unwrap();
            let a = q.parameters["a"].as_i64().unwrap();
            let b = q.parameters["b"].as_i64().unwrap();
            assert_ne!(b, 0);
            assert_eq!(a % b, 0);
            assert_eq!(q.correct_answer, AnswerValue::Integer(a / b));
        }
    }

    #[test]
    fn easy_subtraction_stays_non_negative() {
        let gen = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..50 {
            let q = gen.generate(0.3, Some(Operation::Subtraction), &mut rng).unwrap();
            assert!(matches!(q.correct_answer, AnswerValue::Integer(n) if n >= 0));
        }
    }

    #[test]
    fn mixed_respects_order_of_operations() {
        let gen = generator();
        let p = params([
            ("a", json!(3)),
            ("b", json!(4)),
            ("c", json!(5)),
            ("op1", json!("+")),
            ("op2", json!("×")),
            ("form", json!("leading")),
        ]);
        assert_eq!(gen.compute_answer(Operation::Mixed, &p).unwrap(), AnswerValue::Integer(23));

        let p = params([
            ("a", json!(2)),
            ("b", json!(12)),
            ("c", json!(4)),
            ("op1", json!("-")),
            ("op2", json!("÷")),
            ("form", json!("trailing")),
        ]);
        assert_eq!(gen.compute_answer(Operation::Mixed, &p).unwrap(), AnswerValue::Integer(1));
    }

    #[test]
    fn mixed_questions_verify() {
        let gen = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        for _ in 0..30 {
            let q = gen.generate(0.7, Some(Operation::Mixed), &mut rng).unwrap();
            assert!(gen.verify(&q).unwrap(), "{}", q.expression);
            assert!(!q.distractors.contains(&q.correct_answer));
        }
    }

    #[test]
    fn zero_divisor_is_rejected() {
        let gen = generator();
        let p = params([("a", json!(5)), ("b", json!(0))]);
        assert!(matches!(
            gen.compute_answer(Operation::Division, &p),
            Err(GenerationError::Unsatisfiable(_))
        ));
    }

    #[test]
    fn zero_in_divisor_range_is_resampled() {
        let mut ranges = BaseRanges::new();
        ranges.insert("divisor".into(), ParamRange::new(0, 1));
        let gen = generator().with_base_ranges(ranges).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        // scaled range at difficulty 0 is 0..=1
        for _ in 0..20 {
            match gen.generate(0.0, Some(Operation::Division), &mut rng) {
                Ok(q) => assert_ne!(q.parameters["b"].as_i64().unwrap(), 0),
                Err(e) => assert!(matches!(e, GenerationError::Unsatisfiable(_))),
            }
        }
    }

    #[test]
    fn degenerate_base_range_fails_fast() {
        let mut ranges = BaseRanges::new();
        ranges.insert("addend".into(), ParamRange::new(10, 10));
        assert!(matches!(
            generator().with_base_ranges(ranges),
            Err(GenerationError::DegenerateRange { .. })
        ));
    }

    #[test]
    fn foreign_operation_is_rejected() {
        let gen = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = gen.generate(0.5, Some(Operation::Area), &mut rng).unwrap_err();
        assert!(matches!(err, GenerationError::UnsupportedOperation { .. }));
    }
}
