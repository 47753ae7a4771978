//! Data records produced by the question engine.
//!
//! A [`Question`] is the only thing a generator hands back. It carries the
//! plain-text expression, the exact correct answer, its distractors and the
//! parameters needed to re-derive the answer independently.

use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{GenerationError, Result};
use crate::fraction::Fraction;

/// Math domain a generator covers. The slug doubles as the topic key used
/// by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Arithmetic,
    Fractions,
    Percentages,
    Algebra,
    Geometry,
    Ratios,
}

impl QuestionType {
    pub const ALL: [QuestionType; 6] = [
        QuestionType::Arithmetic,
        QuestionType::Fractions,
        QuestionType::Percentages,
        QuestionType::Algebra,
        QuestionType::Geometry,
        QuestionType::Ratios,
    ];

    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            QuestionType::Arithmetic => "arithmetic",
            QuestionType::Fractions => "fractions",
            QuestionType::Percentages => "percentages",
            QuestionType::Algebra => "algebra",
            QuestionType::Geometry => "geometry",
            QuestionType::Ratios => "ratios",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for QuestionType {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        QuestionType::ALL
            .into_iter()
            .find(|t| t.slug() == needle)
            .ok_or_else(|| GenerationError::UnknownTopic(s.to_string()))
    }
}

/// Operation taxonomy across all domains. Each generator supports a fixed
/// subset, see `QuestionGenerator::supported_operations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Mixed,
    FindPercentage,
    FindWhole,
    FindPercent,
    PercentageChange,
    Discount,
    Tax,
    Linear,
    Quadratic,
    Area,
    Perimeter,
    Circumference,
    Volume,
    SurfaceArea,
    Pythagorean,
    Simplify,
    MissingValue,
    Proportion,
    PartToWhole,
    Scale,
}

impl Operation {
    pub const ALL: [Operation; 24] = [
        Operation::Addition,
        Operation::Subtraction,
        Operation::Multiplication,
        Operation::Division,
        Operation::Mixed,
        Operation::FindPercentage,
        Operation::FindWhole,
        Operation::FindPercent,
        Operation::PercentageChange,
        Operation::Discount,
        Operation::Tax,
        Operation::Linear,
        Operation::Quadratic,
        Operation::Area,
        Operation::Perimeter,
        Operation::Circumference,
        Operation::Volume,
        Operation::SurfaceArea,
        Operation::Pythagorean,
        Operation::Simplify,
        Operation::MissingValue,
        Operation::Proportion,
        Operation::PartToWhole,
        Operation::Scale,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Operation::Addition => "addition",
            Operation::Subtraction => "subtraction",
            Operation::Multiplication => "multiplication",
            Operation::Division => "division",
            Operation::Mixed => "mixed",
            Operation::FindPercentage => "find_percentage",
            Operation::FindWhole => "find_whole",
            Operation::FindPercent => "find_percent",
            Operation::PercentageChange => "percentage_change",
            Operation::Discount => "discount",
            Operation::Tax => "tax",
            Operation::Linear => "linear",
            Operation::Quadratic => "quadratic",
            Operation::Area => "area",
            Operation::Perimeter => "perimeter",
            Operation::Circumference => "circumference",
            Operation::Volume => "volume",
            Operation::SurfaceArea => "surface_area",
            Operation::Pythagorean => "pythagorean",
            Operation::Simplify => "simplify",
            Operation::MissingValue => "missing_value",
            Operation::Proportion => "proportion",
            Operation::PartToWhole => "part_to_whole",
            Operation::Scale => "scale",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == needle)
            .ok_or_else(|| GenerationError::UnknownOperation(s.to_string()))
    }
}

/// How a submitted answer has to be parsed and compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFormat {
    Integer,
    Decimal,
    Fraction,
    Ratio,
    Percentage,
    Expression,
}

impl fmt::Display for AnswerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnswerFormat::Integer => "integer",
            AnswerFormat::Decimal => "decimal",
            AnswerFormat::Fraction => "fraction",
            AnswerFormat::Ratio => "ratio",
            AnswerFormat::Percentage => "percentage",
            AnswerFormat::Expression => "expression",
        };
        f.write_str(name)
    }
}

/// Exact answer value. The variant always matches the question's
/// [`AnswerFormat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Integer(i64),
    /// Rounded to two decimal places on construction, see [`AnswerValue::decimal`].
    Decimal(f64),
    Fraction(Fraction),
    /// Reduced `a:b`.
    Ratio(i64, i64),
    Percentage(i64),
    Expression(String),
}

impl AnswerValue {
    /// Decimal answer rounded to cents, so equal amounts compare equal.
    #[must_use]
    pub fn decimal(value: f64) -> Self {
        AnswerValue::Decimal(round2(value))
    }

    /// Integer when the rounded value is whole, decimal otherwise.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn number(value: f64) -> Self {
        let rounded = round2(value);
        if rounded.fract() == 0.0 {
            AnswerValue::Integer(rounded as i64)
        } else {
            AnswerValue::Decimal(rounded)
        }
    }

    /// Ratio reduced to lowest terms.
    #[must_use]
    pub fn ratio(a: i64, b: i64) -> Self {
        let g = crate::fraction::gcd(a, b).max(1);
        AnswerValue::Ratio(a / g, b / g)
    }

    #[must_use]
    pub fn format(&self) -> AnswerFormat {
        match self {
            AnswerValue::Integer(_) => AnswerFormat::Integer,
            AnswerValue::Decimal(_) => AnswerFormat::Decimal,
            AnswerValue::Fraction(_) => AnswerFormat::Fraction,
            AnswerValue::Ratio(..) => AnswerFormat::Ratio,
            AnswerValue::Percentage(_) => AnswerFormat::Percentage,
            AnswerValue::Expression(_) => AnswerFormat::Expression,
        }
    }

    /// Numeric value for the numeric formats.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AnswerValue::Integer(v) | AnswerValue::Percentage(v) => Some(*v as f64),
            AnswerValue::Decimal(v) => Some(*v),
            AnswerValue::Fraction(f) => Some(f.to_f64()),
            AnswerValue::Ratio(..) | AnswerValue::Expression(_) => None,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Integer(v) => write!(f, "{v}"),
            AnswerValue::Decimal(v) => f.write_str(&format_decimal(*v)),
            AnswerValue::Fraction(frac) => write!(f, "{frac}"),
            AnswerValue::Ratio(a, b) => write!(f, "{a}:{b}"),
            AnswerValue::Percentage(v) => write!(f, "{v}%"),
            AnswerValue::Expression(e) => f.write_str(e),
        }
    }
}

/// Rounds to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Renders a decimal with at most two places and no trailing zeros.
#[must_use]
pub fn format_decimal(value: f64) -> String {
    let text = format!("{:.2}", round2(value));
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Coarse difficulty band derived from `difficulty_score`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyTier {
    Novice,
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl DifficultyTier {
    #[must_use]
    pub fn from_score(difficulty: f64) -> Self {
        if difficulty < 0.2 {
            DifficultyTier::Novice
        } else if difficulty < 0.4 {
            DifficultyTier::Beginner
        } else if difficulty < 0.6 {
            DifficultyTier::Intermediate
        } else if difficulty < 0.8 {
            DifficultyTier::Advanced
        } else {
            DifficultyTier::Expert
        }
    }
}

/// Inclusive integer range for one generator parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: i64,
    pub max: i64,
}

impl ParamRange {
    #[must_use]
    pub const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// Uniform draw from `[min, max]`. Callers only sample validated ranges.
    pub fn sample(&self, rng: &mut dyn RngCore) -> i64 {
        use rand::Rng;
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Named base ranges a generator scales with difficulty.
pub type BaseRanges = BTreeMap<String, ParamRange>;

/// Largest absolute bound a configured base range may use. Generators
/// multiply up to three sampled values (and a constant), which stays inside
/// `i64` below this bound.
pub const MAX_PARAM_MAGNITUDE: i64 = 100_000;

/// Rejects any base range whose `max <= min` or whose bounds exceed
/// [`MAX_PARAM_MAGNITUDE`] in magnitude.
pub fn validate_ranges(ranges: &BaseRanges) -> Result<()> {
    for (param, range) in ranges {
        if range.max <= range.min {
            return Err(GenerationError::DegenerateRange {
                param: param.clone(),
                min: range.min,
                max: range.max,
            });
        }
        let limit = MAX_PARAM_MAGNITUDE.unsigned_abs();
        if range.min.unsigned_abs() > limit || range.max.unsigned_abs() > limit {
            return Err(GenerationError::RangeTooWide {
                param: param.clone(),
                min: range.min,
                max: range.max,
                limit: MAX_PARAM_MAGNITUDE,
            });
        }
    }
    Ok(())
}

/// Looks up a scaled range by name.
pub fn range_for(ranges: &BaseRanges, param: &str) -> Result<ParamRange> {
    ranges
        .get(param)
        .copied()
        .ok_or_else(|| GenerationError::MissingRange(param.to_string()))
}

/// Generator inputs used to build a question.
pub type Parameters = BTreeMap<String, Value>;

pub fn param_i64(parameters: &Parameters, key: &str) -> Result<i64> {
    parameters
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| GenerationError::MissingParameter(key.to_string()))
}

pub fn param_str<'a>(parameters: &'a Parameters, key: &str) -> Result<&'a str> {
    parameters
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| GenerationError::MissingParameter(key.to_string()))
}

/// A generated practice question. Owned by the caller once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question_id: String,
    pub question_type: QuestionType,
    pub operation: Operation,
    /// Plain-text rendering, operator symbols only.
    pub expression: String,
    pub answer_format: AnswerFormat,
    pub correct_answer: AnswerValue,
    /// Plausible wrong answers; never contains `correct_answer`, no duplicates.
    pub distractors: Vec<AnswerValue>,
    /// `correct_answer` and `distractors` in shuffled order.
    pub options: Vec<AnswerValue>,
    pub parameters: Parameters,
    pub difficulty_score: f64,
    pub difficulty_tier: DifficultyTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<String>>,
}

/// Everything a generator decides; [`Question::assemble`] adds the rest.
#[derive(Debug, Clone)]
pub struct QuestionParts {
    pub question_type: QuestionType,
    pub operation: Operation,
    pub expression: String,
    pub correct_answer: AnswerValue,
    pub distractors: Vec<AnswerValue>,
    pub parameters: Parameters,
    pub difficulty: f64,
    pub hint: Option<String>,
    pub explanation: Option<String>,
    pub steps: Option<Vec<String>>,
}

impl Question {
    /// Finalises generator output: drops distractors equal to the answer or
    /// to an earlier distractor, keeps at most `max_distractors`, assigns an
    /// id and tier and shuffles the options.
    ///
    /// Fails when no distractor survives, so a question always offers at
    /// least one wrong option.
    pub fn assemble(
        parts: QuestionParts,
        max_distractors: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Self> {
        let answer_format = parts.correct_answer.format();
        let mut distractors: Vec<AnswerValue> = Vec::with_capacity(max_distractors);
        for candidate in parts.distractors {
            if distractors.len() >= max_distractors {
                break;
            }
            if candidate == parts.correct_answer
                || candidate.format() != answer_format
                || distractors.contains(&candidate)
            {
                continue;
            }
            distractors.push(candidate);
        }
        if distractors.is_empty() {
            return Err(GenerationError::Unsatisfiable(format!(
                "no distractor distinct from {} for '{}'",
                parts.correct_answer, parts.expression
            )));
        }

        let mut options = distractors.clone();
        options.push(parts.correct_answer.clone());
        options.shuffle(rng);

        let difficulty_score = clamp_unit(parts.difficulty);
        Ok(Self {
            question_id: format!("{:08x}", rng.next_u32()),
            question_type: parts.question_type,
            operation: parts.operation,
            expression: parts.expression,
            answer_format,
            correct_answer: parts.correct_answer,
            distractors,
            options,
            parameters: parts.parameters,
            difficulty_score,
            difficulty_tier: DifficultyTier::from_score(difficulty_score),
            hint: parts.hint,
            explanation: parts.explanation,
            steps: parts.steps,
        })
    }
}

/// Clamps into `[0, 1]`; NaN maps to 0.
#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
