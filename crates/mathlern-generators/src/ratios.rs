use mathlern_adaptive::DifficultyMapper;
use mathlern_core::{
    gcd, param_i64, param_str, AnswerValue, BaseRanges, GenerationError, Operation, Parameters,
    Question, QuestionGenerator, QuestionParts, QuestionType, Result,
};
use rand::seq::SliceRandom;
use rand::RngCore;
use serde_json::json;

use crate::common::{coin, params, RangeSet};
use crate::distractor::{Distractors, DISTRACTOR_COUNT};

const OPERATIONS: &[Operation] = &[
    Operation::Simplify,
    Operation::MissingValue,
    Operation::Proportion,
    Operation::PartToWhole,
    Operation::Scale,
];

const EASY_SCALES: &[i64] = &[10, 50, 100];
const HARD_SCALES: &[i64] = &[200, 250, 500, 1000];

/// Missing-value word problems as (context, sentence with `{a}`, `{b}` and
/// `{c}` placeholders).
const CONTEXTS: &[(&str, &str)] = &[
    (
        "recipe",
        "A recipe uses {a} cups of flour for every {b} cups of sugar. How many cups of sugar go with {c} cups of flour?",
    ),
    (
        "class",
        "The ratio of boys to girls in a class is {a}:{b}. If there are {c} boys, how many girls are there?",
    ),
    (
        "shopping",
        "If {a} notebooks cost ${b}, how much do {c} notebooks cost?",
    ),
];

/// From this difficulty missing values are asked as word problems.
const WORD_PROBLEMS_FROM: f64 = 0.5;

/// Ratio simplification, equivalent ratios, proportions, shares and map
/// scales.
#[derive(Debug, Clone)]
pub struct RatiosGenerator {
    ranges: RangeSet,
}

impl RatiosGenerator {
    #[must_use]
    pub fn new(mapper: DifficultyMapper) -> Self {
        Self {
            ranges: RangeSet::new(
                mapper,
                &[
                    ("term", 1, 12),
                    ("factor", 2, 10),
                    ("part", 1, 6),
                    ("multiplier", 2, 20),
                    ("map_distance", 2, 20),
                ],
            ),
        }
    }

    pub fn with_base_ranges(mut self, ranges: BaseRanges) -> Result<Self> {
        self.ranges.merge(ranges)?;
        Ok(self)
    }
}

/// `numerator / denominator`, failing unless the division is exact.
fn exact_div(numerator: i64, denominator: i64) -> Result<i64> {
    if denominator == 0 || numerator % denominator != 0 {
        return Err(GenerationError::Unsatisfiable(format!(
            "{numerator} / {denominator} is not a whole number"
        )));
    }
    Ok(numerator / denominator)
}

impl QuestionGenerator for RatiosGenerator {
    fn question_type(&self) -> QuestionType {
        QuestionType::Ratios
    }

    fn supported_operations(&self) -> &'static [Operation] {
        OPERATIONS
    }

    #[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
    fn generate(
        &self,
        difficulty: f64,
        operation: Option<Operation>,
        rng: &mut dyn RngCore,
    ) -> Result<Question> {
        let difficulty = mathlern_core::clamp_unit(difficulty);
        let operation = self.pick_operation(operation, rng)?;
        let ranges = self.ranges.scaled(difficulty);
        let term = |rng: &mut dyn RngCore| -> Result<i64> {
            Ok(ranges.sample_nonzero("term", rng)?.abs())
        };

        let (expression, mut parameters, hint) = match operation {
            Operation::Simplify => {
                let (x, y) = (term(&mut *rng)?, term(&mut *rng)?);
                let g = gcd(x, y).max(1);
                let k = ranges.sample_nonzero("factor", rng)?.abs().max(2);
                let (a, b) = (x / g * k, y / g * k);
                (
                    format!("Simplify the ratio {a}:{b}"),
                    params([("a", json!(a)), ("b", json!(b))]),
                    "Divide both terms by their greatest common factor.",
                )
            }
            Operation::MissingValue => {
                let a = term(&mut *rng)?.max(2);
                let mut b = term(&mut *rng)?.max(2);
                if b == a {
                    b += 1;
                }
                let k = ranges.sample_nonzero("factor", rng)?.abs().max(2);
                let c = a * k;
                let mut parameters = params([("a", json!(a)), ("b", json!(b)), ("c", json!(c))]);
                let expression = if difficulty >= WORD_PROBLEMS_FROM {
                    let (context, template) = CONTEXTS.choose(rng).copied().unwrap_or(CONTEXTS[0]);
                    parameters.insert("context".into(), json!(context));
                    template
                        .replace("{a}", &a.to_string())
                        .replace("{b}", &b.to_string())
                        .replace("{c}", &c.to_string())
                } else {
                    format!("Find the missing value: {a}:{b} = {c}:?")
                };
                (expression, parameters, "Find the factor that turns the first term into the given one.")
            }
            Operation::Proportion => {
                // a/b reduces to p/q; c is a multiple of p so x stays whole.
                let (a, b) = (term(&mut *rng)?, term(&mut *rng)?);
                let p = a / gcd(a, b).max(1);
                let k = ranges.sample_nonzero("factor", rng)?.abs();
                let c = p * k;
                (
                    format!("Solve for x: {a}/{b} = {c}/x"),
                    params([("a", json!(a)), ("b", json!(b)), ("c", json!(c))]),
                    "Cross-multiply: a · x = b · c.",
                )
            }
            Operation::PartToWhole => {
                let p = ranges.sample_nonzero("part", rng)?.abs();
                let q = ranges.sample_nonzero("part", rng)?.abs();
                let m = ranges.sample_nonzero("multiplier", rng)?.abs();
                let total = (p + q) * m;
                let share = if coin(rng) { "first" } else { "second" };
                (
                    format!(
                        "${total} is shared in the ratio {p}:{q}. How much is the {share} share?"
                    ),
                    params([
                        ("p", json!(p)),
                        ("q", json!(q)),
                        ("total", json!(total)),
                        ("share", json!(share)),
                    ]),
                    "Divide the total by the number of parts, then multiply.",
                )
            }
            Operation::Scale => {
                let pool = if difficulty < 0.5 { EASY_SCALES } else { HARD_SCALES };
                let scale = pool.choose(rng).copied().unwrap_or(100);
                let map = ranges.sample_nonzero("map_distance", rng)?.abs();
                if difficulty >= 0.5 && coin(rng) {
                    let actual = map * scale;
                    (
                        format!(
                            "On a map with scale 1:{scale}, what map distance in cm represents {actual} cm in real life?"
                        ),
                        params([
                            ("scale", json!(scale)),
                            ("actual", json!(actual)),
                            ("find", json!("map")),
                        ]),
                        "Divide the real distance by the scale.",
                    )
                } else {
                    (
                        format!(
                            "On a map with scale 1:{scale}, {map} cm represents how many cm in real life?"
                        ),
                        params([
                            ("scale", json!(scale)),
                            ("map", json!(map)),
                            ("find", json!("actual")),
                        ]),
                        "Multiply the map distance by the scale.",
                    )
                }
            }
            other => {
                return Err(GenerationError::UnsupportedOperation {
                    question_type: QuestionType::Ratios,
                    operation: other,
                })
            }
        };
        parameters.insert("operation".into(), json!(operation.name()));
        let answer = self.compute_answer(operation, &parameters)?;

        let mut distractors = Distractors::new(&answer);
        let get = |key: &str| param_i64(&parameters, key);
        match operation {
            Operation::Simplify => {
                if let AnswerValue::Ratio(x, y) = answer {
                    distractors
                        .push(AnswerValue::Ratio(y, x))
                        .push(AnswerValue::ratio(x + 1, y))
                        .push(AnswerValue::ratio(x, y + 1))
                        .push(AnswerValue::ratio(x + 1, y + 1));
                }
            }
            Operation::MissingValue | Operation::Proportion => {
                let (a, b, c) = (get("a")?, get("b")?, get("c")?);
                distractors
                    // additive instead of multiplicative
                    .push_int(c + b - a)
                    .push_int(b * c)
                    .push_number(a as f64 * c as f64 / b as f64)
                    .push_int(c);
            }
            Operation::PartToWhole => {
                let (p, q, total) = (get("p")?, get("q")?, get("total")?);
                let unit = total / (p + q);
                let other = if param_str(&parameters, "share")? == "first" { q } else { p };
                distractors
                    .push_int(other * unit)
                    .push_int(unit)
                    .push_int(total)
                    .push_number(total as f64 / other as f64);
            }
            _ => {
                let scale = get("scale")?;
                let value = match param_str(&parameters, "find")? {
                    "map" => get("actual")?,
                    _ => get("map")?,
                };
                distractors
                    .push_int(value + scale)
                    .push_number(value as f64 * scale as f64 / 10.0)
                    .push_number(value as f64 / scale as f64 * 10.0);
            }
        }
        distractors.push_numeric_slips();

        let parts = QuestionParts {
            question_type: QuestionType::Ratios,
            operation,
            expression,
            correct_answer: answer,
            distractors: distractors.finish(rng),
            parameters,
            difficulty,
            hint: Some(hint.into()),
            explanation: None,
            steps: None,
        };
        Question::assemble(parts, DISTRACTOR_COUNT, rng)
    }

    fn compute_answer(&self, operation: Operation, parameters: &Parameters) -> Result<AnswerValue> {
        let get = |key: &str| param_i64(parameters, key);
        let value = match operation {
            Operation::Simplify => {
                let (a, b) = (get("a")?, get("b")?);
                if a <= 0 || b <= 0 {
                    return Err(GenerationError::Unsatisfiable(format!(
                        "ratio {a}:{b} needs positive terms"
                    )));
                }
                return Ok(AnswerValue::ratio(a, b));
            }
            // a:b = c:x and a/b = c/x share the cross product
            Operation::MissingValue | Operation::Proportion => {
                exact_div(get("b")? * get("c")?, get("a")?)?
            }
            Operation::PartToWhole => {
                let (p, q) = (get("p")?, get("q")?);
                let share = match param_str(parameters, "share")? {
                    "first" => p,
                    _ => q,
                };
                exact_div(get("total")? * share, p + q)?
            }
            Operation::Scale => match param_str(parameters, "find")? {
                "map" => exact_div(get("actual")?, get("scale")?)?,
                _ => get("map")? * get("scale")?,
            },
            other => {
                return Err(GenerationError::UnsupportedOperation {
                    question_type: QuestionType::Ratios,
                    operation: other,
                })
            }
        };
        Ok(AnswerValue::Integer(value))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn generator() -> RatiosGenerator {
        RatiosGenerator::new(DifficultyMapper::new())
    }

    #[test]
    fn every_operation_verifies() {
        let gen = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(51);
        for &operation in OPERATIONS {
            for difficulty in [0.1, 0.5, 0.9] {
                for _ in 0..8 {
                    let q = gen.generate(difficulty, Some(operation), &mut rng).unwrap();
                    assert!(gen.verify(&q).unwrap(), "{}", q.expression);
                    assert_eq!(q.distractors.len(), DISTRACTOR_COUNT, "{}", q.expression);
                    assert!(!q.distractors.contains(&q.correct_answer));
                }
            }
        }
    }

    #[test]
    fn simplified_ratios_are_reduced() {
        let gen = generator();
        let p = params([("a", json!(12)), ("b", json!(18))]);
        assert_eq!(gen.compute_answer(Operation::Simplify, &p).unwrap(), AnswerValue::Ratio(2, 3));

        let mut rng = ChaCha8Rng::seed_from_u64(52);
        for _ in 0..20 {
            let q = gen.generate(0.4, Some(Operation::Simplify), &mut rng).unwrap();
            let AnswerValue::Ratio(x, y) = q.correct_answer else {
                panic!("ratio expected");
            };
            assert_eq!(gcd(x, y), 1);
        }
    }

    #[test]
    fn known_answers() {
        let gen = generator();
        let p = params([("a", json!(2)), ("b", json!(3)), ("c", json!(8))]);
        assert_eq!(gen.compute_answer(Operation::MissingValue, &p).unwrap(), AnswerValue::Integer(12));
        let p = params([("p", json!(2)), ("q", json!(3)), ("total", json!(50)), ("share", json!("second"))]);
        assert_eq!(gen.compute_answer(Operation::PartToWhole, &p).unwrap(), AnswerValue::Integer(30));
        let p = params([("scale", json!(500)), ("actual", json!(3500)), ("find", json!("map"))]);
        assert_eq!(gen.compute_answer(Operation::Scale, &p).unwrap(), AnswerValue::Integer(7));
    }

    #[test]
    fn inexact_proportion_is_rejected() {
        let p = params([("a", json!(4)), ("b", json!(3)), ("c", json!(5))]);
        assert!(matches!(
            generator().compute_answer(Operation::Proportion, &p),
            Err(GenerationError::Unsatisfiable(_))
        ));
    }

    #[test]
    fn word_problems_carry_their_context() {
        let gen = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(53);
        let q = gen.generate(0.8, Some(Operation::MissingValue), &mut rng).unwrap();
        assert!(q.parameters.contains_key("context"));
        assert!(!q.expression.contains('{'));
    }
}
