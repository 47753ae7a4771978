//! Checking a learner's typed answer against a generated question.
//!
//! Input is normalised first (case, whitespace, `$`, `%` and unit words are
//! dropped), then parsed according to the question's [`AnswerFormat`] and
//! compared by value. Wrong answers are classified into an [`ErrorKind`]
//! so feedback can name the likely slip.

use mathlern_core::{gcd, AnswerFormat, AnswerValue, Fraction, Operation, Question};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

/// Absolute tolerance for decimal answers.
pub const DECIMAL_TOLERANCE: f64 = 0.01;
/// Absolute tolerance for percentage answers, in percentage points.
pub const PERCENTAGE_TOLERANCE: f64 = 0.1;
/// Credit for an integer answer that is off by exactly one.
const OFF_BY_ONE_CREDIT: f64 = 0.5;
/// Credit for a ratio that is right by value but was asked to be simplified.
const UNSIMPLIFIED_RATIO_CREDIT: f64 = 0.5;

const EXACT: f64 = 1e-9;

/// Likely cause of a wrong (or not fully right) answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Sign,
    OffByOne,
    Magnitude,
    Reversed,
    NotSimplified,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_correct: bool,
    /// Input as typed, trimmed.
    pub user_answer: String,
    /// Parsed input; `None` when it could not be read in the expected format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<AnswerValue>,
    pub correct_answer: AnswerValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// 1.0 for a correct answer, partial credit in `(0, 1)` for near misses.
    pub partial_credit: f64,
    pub feedback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Judgement {
    is_correct: bool,
    error_kind: Option<ErrorKind>,
    partial_credit: f64,
}

impl Judgement {
    fn correct() -> Self {
        Self {
            is_correct: true,
            error_kind: None,
            partial_credit: 1.0,
        }
    }

    fn wrong(kind: ErrorKind) -> Self {
        Self {
            is_correct: false,
            error_kind: Some(kind),
            partial_credit: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnswerValidator {
    decimal_tolerance: f64,
    percentage_tolerance: f64,
}

impl Default for AnswerValidator {
    fn default() -> Self {
        Self {
            decimal_tolerance: DECIMAL_TOLERANCE,
            percentage_tolerance: PERCENTAGE_TOLERANCE,
        }
    }
}

impl AnswerValidator {
    /// Validator with custom tolerances. Negative or non-finite values fall
    /// back to the defaults.
    #[must_use]
    pub fn new(decimal_tolerance: f64, percentage_tolerance: f64) -> Self {
        let pick = |value: f64, default: f64| {
            if value.is_finite() && value >= 0.0 {
                value
            } else {
                default
            }
        };
        Self {
            decimal_tolerance: pick(decimal_tolerance, DECIMAL_TOLERANCE),
            percentage_tolerance: pick(percentage_tolerance, PERCENTAGE_TOLERANCE),
        }
    }

    /// Reads `input` as a value of `format`.
    ///
    /// Integer questions accept `4.0`; a non-whole number comes back as a
    /// decimal so it can still be compared (and judged wrong).
    pub fn parse(&self, input: &str, format: AnswerFormat) -> Result<AnswerValue> {
        parse_clean(&clean(input), format).ok_or_else(|| ValidationError::Unparseable {
            input: input.trim().to_string(),
            format,
        })
    }

    #[must_use]
    pub fn validate(&self, input: &str, question: &Question) -> ValidationResult {
        let correct = question.correct_answer.clone();
        let cleaned = clean(input);
        let user_answer = input.trim().to_string();

        let Some(parsed) = parse_clean(&cleaned, question.answer_format) else {
            return ValidationResult {
                is_correct: false,
                user_answer,
                normalized: None,
                correct_answer: correct,
                error_kind: None,
                partial_credit: 0.0,
                feedback: format!(
                    "Invalid answer format. Expected {}.",
                    format_hint(question.answer_format)
                ),
                hint: None,
            };
        };

        let judgement = self.judge(&cleaned, &parsed, question);
        let feedback = feedback_message(judgement, &correct);
        ValidationResult {
            is_correct: judgement.is_correct,
            user_answer,
            normalized: Some(parsed),
            correct_answer: correct,
            error_kind: judgement.error_kind,
            partial_credit: judgement.partial_credit,
            feedback,
            hint: if judgement.is_correct {
                None
            } else {
                question.hint.clone()
            },
        }
    }

    fn judge(&self, cleaned: &str, parsed: &AnswerValue, question: &Question) -> Judgement {
        let correct = &question.correct_answer;
        match question.answer_format {
            AnswerFormat::Integer | AnswerFormat::Decimal | AnswerFormat::Percentage => {
                let (Some(user), Some(expected)) = (parsed.as_f64(), correct.as_f64()) else {
                    return Judgement::wrong(ErrorKind::General);
                };
                let tolerance = match question.answer_format {
                    AnswerFormat::Decimal => self.decimal_tolerance,
                    AnswerFormat::Percentage => self.percentage_tolerance,
                    _ => EXACT,
                };
                if (user - expected).abs() < tolerance {
                    return Judgement::correct();
                }
                let mut judgement = Judgement::wrong(classify_number(user, expected));
                if judgement.error_kind == Some(ErrorKind::OffByOne)
                    && question.answer_format == AnswerFormat::Integer
                {
                    judgement.partial_credit = OFF_BY_ONE_CREDIT;
                }
                judgement
            }
            AnswerFormat::Fraction => {
                let (AnswerValue::Fraction(user), AnswerValue::Fraction(expected)) =
                    (parsed, correct)
                else {
                    return Judgement::wrong(ErrorKind::General);
                };
                if user == expected {
                    let mut judgement = Judgement::correct();
                    if terms(cleaned, '/').is_some_and(|(n, d)| gcd(n, d) > 1) {
                        judgement.error_kind = Some(ErrorKind::NotSimplified);
                    }
                    return judgement;
                }
                if !expected.is_zero() && *user == -*expected {
                    Judgement::wrong(ErrorKind::Sign)
                } else if expected.recip().ok() == Some(*user) {
                    Judgement::wrong(ErrorKind::Reversed)
                } else {
                    Judgement::wrong(ErrorKind::General)
                }
            }
            AnswerFormat::Ratio => {
                let (AnswerValue::Ratio(ua, ub), AnswerValue::Ratio(ca, cb)) = (parsed, correct)
                else {
                    return Judgement::wrong(ErrorKind::General);
                };
                if (ua, ub) == (ca, cb) {
                    let unreduced = terms(cleaned, ':').is_some_and(|(a, b)| gcd(a, b) > 1);
                    return match (unreduced, question.operation) {
                        (true, Operation::Simplify) => Judgement {
                            is_correct: false,
                            error_kind: Some(ErrorKind::NotSimplified),
                            partial_credit: UNSIMPLIFIED_RATIO_CREDIT,
                        },
                        (true, _) => Judgement {
                            error_kind: Some(ErrorKind::NotSimplified),
                            ..Judgement::correct()
                        },
                        (false, _) => Judgement::correct(),
                    };
                }
                if (ua, ub) == (cb, ca) {
                    Judgement::wrong(ErrorKind::Reversed)
                } else {
                    Judgement::wrong(ErrorKind::General)
                }
            }
            AnswerFormat::Expression => {
                let (AnswerValue::Expression(user), AnswerValue::Expression(expected)) =
                    (parsed, correct)
                else {
                    return Judgement::wrong(ErrorKind::General);
                };
                let expected = clean(expected);
                match (roots(user), roots(&expected)) {
                    (Some(u), Some(e)) if u == e => Judgement::correct(),
                    (Some(u), Some(e)) => {
                        let mut negated: Vec<i64> = e.iter().map(|r| -r).collect();
                        negated.sort_unstable();
                        if u == negated {
                            Judgement::wrong(ErrorKind::Sign)
                        } else {
                            Judgement::wrong(ErrorKind::General)
                        }
                    }
                    _ if *user == expected => Judgement::correct(),
                    _ => Judgement::wrong(ErrorKind::General),
                }
            }
        }
    }
}

/// Lower-cased input without whitespace, currency and percent signs or
/// unit words.
fn clean(input: &str) -> String {
    let mut text = input.trim().to_lowercase().replace(['$', '%'], "");
    for word in ["square units", "sq units", "units"] {
        text = text.replace(word, "");
    }
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn parse_clean(text: &str, format: AnswerFormat) -> Option<AnswerValue> {
    if text.is_empty() {
        return None;
    }
    match format {
        AnswerFormat::Integer => {
            if let Ok(n) = text.parse::<i64>() {
                return Some(AnswerValue::Integer(n));
            }
            let value = number(text)?;
            Some(whole(value).map_or(AnswerValue::Decimal(value), AnswerValue::Integer))
        }
        AnswerFormat::Decimal => number(text).map(AnswerValue::Decimal),
        AnswerFormat::Percentage => {
            let value = number(text)?;
            Some(whole(value).map_or(AnswerValue::Decimal(value), AnswerValue::Percentage))
        }
        AnswerFormat::Fraction => {
            if let Ok(f) = text.parse::<Fraction>() {
                return Some(AnswerValue::Fraction(f));
            }
            decimal_fraction(text).map(AnswerValue::Fraction)
        }
        AnswerFormat::Ratio => {
            let (a, b) = terms(text, ':')?;
            (a > 0 && b > 0).then(|| AnswerValue::ratio(a, b))
        }
        AnswerFormat::Expression => Some(AnswerValue::Expression(text.to_string())),
    }
}

fn number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[allow(clippy::cast_possible_truncation)]
fn whole(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && value.abs() < 1e15).then_some(value as i64)
}

/// Integer terms on both sides of `separator`, as typed.
fn terms(text: &str, separator: char) -> Option<(i64, i64)> {
    let (left, right) = text.split_once(separator)?;
    Some((left.parse().ok()?, right.parse().ok()?))
}

/// `0.75` → `3/4`, up to six decimal places.
fn decimal_fraction(text: &str) -> Option<Fraction> {
    let (_, digits) = text.split_once('.')?;
    if digits.is_empty() || digits.len() > 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value = number(text)?;
    let scale = 10_i64.pow(u32::try_from(digits.len()).ok()?);
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let numerator = (value * scale as f64).round() as i64;
    Fraction::new(numerator, scale).ok()
}

/// Sorted, de-duplicated roots from `x=-2orx=3`, `-2,3` and similar.
fn roots(text: &str) -> Option<Vec<i64>> {
    let mut values = Vec::new();
    for part in text.split("or").flat_map(|p| p.split(',')).flat_map(|p| p.split("and")) {
        let part = part.strip_prefix("x=").unwrap_or(part);
        values.push(part.parse::<i64>().ok()?);
    }
    values.sort_unstable();
    values.dedup();
    Some(values)
}

fn classify_number(user: f64, expected: f64) -> ErrorKind {
    if expected != 0.0 && (user + expected).abs() < EXACT {
        ErrorKind::Sign
    } else if ((user - expected).abs() - 1.0).abs() < EXACT {
        ErrorKind::OffByOne
    } else if user != 0.0
        && ((user / 10.0 - expected).abs() < DECIMAL_TOLERANCE
            || (user * 10.0 - expected).abs() < DECIMAL_TOLERANCE)
    {
        ErrorKind::Magnitude
    } else {
        ErrorKind::General
    }
}

fn feedback_message(judgement: Judgement, correct: &AnswerValue) -> String {
    match (judgement.is_correct, judgement.error_kind) {
        (true, Some(ErrorKind::NotSimplified)) => {
            format!("Correct! Next time write it in lowest terms: {correct}.")
        }
        (true, _) => "Correct! Well done!".to_string(),
        (false, Some(ErrorKind::Sign)) => {
            format!("Almost! Check your sign. The correct answer is {correct}.")
        }
        (false, Some(ErrorKind::OffByOne)) => {
            format!("So close! You were off by one. The correct answer is {correct}.")
        }
        (false, Some(ErrorKind::Magnitude)) => {
            format!("Check your decimal place. The correct answer is {correct}.")
        }
        (false, Some(ErrorKind::Reversed)) => {
            format!("You have it the wrong way round. The correct answer is {correct}.")
        }
        (false, Some(ErrorKind::NotSimplified)) => {
            format!("Your answer needs to be simplified. The correct answer is {correct}.")
        }
        (false, _) => format!("Not quite. The correct answer is {correct}."),
    }
}

fn format_hint(format: AnswerFormat) -> &'static str {
    match format {
        AnswerFormat::Integer => "a whole number (e.g. 42)",
        AnswerFormat::Decimal => "a decimal number (e.g. 3.14)",
        AnswerFormat::Fraction => "a fraction (e.g. 3/4)",
        AnswerFormat::Ratio => "a ratio (e.g. 2:3)",
        AnswerFormat::Percentage => "a percentage (e.g. 25 or 25%)",
        AnswerFormat::Expression => "an expression (e.g. x = 2 or x = 3)",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mathlern_core::{QuestionGenerator, QuestionType};
    use mathlern_generators::GeneratorRegistry;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn question(topic: &str, operation: Operation, seed: u64) -> Question {
        GeneratorRegistry::default()
            .generate(topic, 0.5, Some(operation), &mut ChaCha8Rng::seed_from_u64(seed))
            .unwrap()
    }

    fn with_answer(mut q: Question, answer: AnswerValue) -> Question {
        q.answer_format = answer.format();
        q.correct_answer = answer;
        q
    }

    fn integer_question(answer: i64) -> Question {
        with_answer(question("arithmetic", Operation::Addition, 1), AnswerValue::Integer(answer))
    }

    #[test]
    fn rendered_correct_answers_validate_for_every_topic() {
        let registry = GeneratorRegistry::default();
        let validator = AnswerValidator::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for topic in QuestionType::ALL {
            for _ in 0..10 {
                let q = registry.generate(topic.slug(), 0.6, None, &mut rng).unwrap();
                let result = validator.validate(&q.correct_answer.to_string(), &q);
                assert!(result.is_correct, "{} for {}", q.correct_answer, q.expression);
                assert!((result.partial_credit - 1.0).abs() < f64::EPSILON);
                assert!(registry.get(topic.slug()).unwrap().verify(&q).unwrap());
            }
        }
    }

    #[test]
    fn integers_accept_trailing_zero_and_units() {
        let validator = AnswerValidator::default();
        let q = integer_question(4);
        assert!(validator.validate("4.0", &q).is_correct);
        assert!(validator.validate(" 4 units", &q).is_correct);
        assert!(validator.validate("$4", &q).is_correct);
        assert!(!validator.validate("4.5", &q).is_correct);
        assert!(!validator.validate("4.001", &q).is_correct);
    }

    #[test]
    fn integer_error_kinds() {
        let validator = AnswerValidator::default();
        let q = integer_question(42);

        let r = validator.validate("-42", &q);
        assert_eq!(r.error_kind, Some(ErrorKind::Sign));

        let r = validator.validate("43", &q);
        assert_eq!(r.error_kind, Some(ErrorKind::OffByOne));
        assert!((r.partial_credit - 0.5).abs() < f64::EPSILON);

        let r = validator.validate("420", &q);
        assert_eq!(r.error_kind, Some(ErrorKind::Magnitude));

        let r = validator.validate("7", &q);
        assert_eq!(r.error_kind, Some(ErrorKind::General));
        assert!(r.feedback.contains("42"));
    }

    #[test]
    fn decimal_and_percentage_tolerances() {
        let validator = AnswerValidator::default();
        let q = with_answer(integer_question(0), AnswerValue::decimal(12.5));
        assert!(validator.validate("12.505", &q).is_correct);
        assert!(!validator.validate("12.52", &q).is_correct);
        let r = validator.validate("13.5", &q);
        assert_eq!(r.error_kind, Some(ErrorKind::OffByOne));
        assert!(r.partial_credit.abs() < f64::EPSILON);

        let q = with_answer(integer_question(0), AnswerValue::Percentage(40));
        assert!(validator.validate("40%", &q).is_correct);
        assert!(validator.validate("40.05", &q).is_correct);
        assert!(!validator.validate("41", &q).is_correct);
    }

    #[test]
    fn fractions_compare_by_value() {
        let validator = AnswerValidator::default();
        let q = with_answer(
            question("fractions", Operation::Addition, 2),
            AnswerValue::Fraction(Fraction::new(3, 4).unwrap()),
        );
        let r = validator.validate("3/4", &q);
        assert!(r.is_correct);
        assert_eq!(r.error_kind, None);

        let r = validator.validate("6/8", &q);
        assert!(r.is_correct);
        assert_eq!(r.error_kind, Some(ErrorKind::NotSimplified));
        assert!((r.partial_credit - 1.0).abs() < f64::EPSILON);

        assert!(validator.validate("0.75", &q).is_correct);
        assert_eq!(validator.validate("4/3", &q).error_kind, Some(ErrorKind::Reversed));
        assert_eq!(validator.validate("-3/4", &q).error_kind, Some(ErrorKind::Sign));
    }

    #[test]
    fn ratios_compare_after_reduction() {
        let validator = AnswerValidator::default();
        let q = with_answer(
            question("ratios", Operation::MissingValue, 3),
            AnswerValue::ratio(2, 3),
        );
        let r = validator.validate("4:6", &q);
        assert!(r.is_correct);
        assert_eq!(r.error_kind, Some(ErrorKind::NotSimplified));
        assert_eq!(validator.validate("3:2", &q).error_kind, Some(ErrorKind::Reversed));

        let q = question("ratios", Operation::Simplify, 4);
        let AnswerValue::Ratio(a, b) = q.correct_answer else {
            panic!("ratio expected");
        };
        let r = validator.validate(&format!("{}:{}", a * 2, b * 2), &q);
        assert!(!r.is_correct);
        assert_eq!(r.error_kind, Some(ErrorKind::NotSimplified));
        assert!((r.partial_credit - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn roots_compare_as_sets() {
        let validator = AnswerValidator::default();
        let q = with_answer(
            question("algebra", Operation::Quadratic, 5),
            AnswerValue::Expression("x = -2 or x = 3".into()),
        );
        assert!(validator.validate("x = 3 or x = -2", &q).is_correct);
        assert!(validator.validate("3, -2", &q).is_correct);
        assert!(validator.validate("X=-2  OR  X=3", &q).is_correct);
        assert_eq!(validator.validate("x = 2 or x = -3", &q).error_kind, Some(ErrorKind::Sign));
        assert!(!validator.validate("x = 1", &q).is_correct);
    }

    #[test]
    fn unparseable_input_is_reported() {
        let validator = AnswerValidator::default();
        let q = integer_question(4);
        let r = validator.validate("four", &q);
        assert!(!r.is_correct);
        assert!(r.normalized.is_none());
        assert!(r.feedback.contains("whole number"));

        assert!(matches!(
            validator.parse("1/0", AnswerFormat::Fraction),
            Err(ValidationError::Unparseable { format: AnswerFormat::Fraction, .. })
        ));
        assert!(validator.parse("", AnswerFormat::Integer).is_err());
        assert!(validator.parse("2:0", AnswerFormat::Ratio).is_err());
    }

    #[test]
    fn hint_only_on_wrong_answers() {
        let validator = AnswerValidator::default();
        let q = question("percentages", Operation::FindPercentage, 6);
        assert!(validator.validate(&q.correct_answer.to_string(), &q).hint.is_none());
        assert!(validator.validate("-99999", &q).hint.is_some());
    }
}
