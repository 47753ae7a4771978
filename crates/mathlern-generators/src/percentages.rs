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
    Operation::FindPercentage,
    Operation::FindWhole,
    Operation::FindPercent,
    Operation::PercentageChange,
    Operation::Discount,
    Operation::Tax,
];

const EASY_PERCENTAGES: &[i64] = &[10, 20, 25, 50, 75, 100];
const MEDIUM_PERCENTAGES: &[i64] = &[5, 15, 30, 40, 60, 80, 90];
const HARD_PERCENTAGES: &[i64] = &[12, 17, 23, 33, 37, 45, 55, 67, 78, 83];
const TAX_RATES: &[i64] = &[5, 6, 7, 8, 10, 15, 20];

/// Below this difficulty "p% of v" is chosen to come out whole.
const WHOLE_RESULTS_BELOW: f64 = 0.5;

/// Percent of a number, reverse percentages, change, discount and tax.
#[derive(Debug, Clone)]
pub struct PercentagesGenerator {
    ranges: RangeSet,
}

impl PercentagesGenerator {
    #[must_use]
    pub fn new(mapper: DifficultyMapper) -> Self {
        Self {
            ranges: RangeSet::new(mapper, &[("value", 10, 500), ("price", 10, 200)]),
        }
    }

    pub fn with_base_ranges(mut self, ranges: BaseRanges) -> Result<Self> {
        self.ranges.merge(ranges)?;
        Ok(self)
    }
}

fn percent_pool(difficulty: f64) -> &'static [i64] {
    if difficulty < 0.4 {
        EASY_PERCENTAGES
    } else if difficulty < 0.7 {
        MEDIUM_PERCENTAGES
    } else {
        HARD_PERCENTAGES
    }
}

fn pick(pool: &[i64], rng: &mut dyn RngCore) -> Result<i64> {
    pool.choose(rng)
        .copied()
        .ok_or_else(|| GenerationError::Unsatisfiable("empty percentage pool".into()))
}

/// Smallest whole `v` with `v * percent / 100` whole.
fn whole_step(percent: i64) -> i64 {
    100 / gcd(percent, 100).max(1)
}

/// Rounds `value` up to a positive multiple of `step`.
fn round_up(value: i64, step: i64) -> i64 {
    let value = value.max(1);
    ((value + step - 1) / step) * step
}

/// `hundredths / 100` as an integer answer when whole, else as a decimal.
#[allow(clippy::cast_precision_loss)]
fn hundredths(n: i64) -> AnswerValue {
    AnswerValue::number(n as f64 / 100.0)
}

#[allow(clippy::cast_precision_loss)]
fn money(cents: i64) -> AnswerValue {
    AnswerValue::decimal(cents as f64 / 100.0)
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(value: i64) -> f64 {
    value as f64
}

impl QuestionGenerator for PercentagesGenerator {
    fn question_type(&self) -> QuestionType {
        QuestionType::Percentages
    }

    fn supported_operations(&self) -> &'static [Operation] {
        OPERATIONS
    }

    #[allow(clippy::too_many_lines)]
    fn generate(
        &self,
        difficulty: f64,
        operation: Option<Operation>,
        rng: &mut dyn RngCore,
    ) -> Result<Question> {
        let difficulty = mathlern_core::clamp_unit(difficulty);
        let operation = self.pick_operation(operation, rng)?;
        let ranges = self.ranges.scaled(difficulty);
        let percent = if operation == Operation::Tax {
            pick(TAX_RATES, rng)?
        } else {
            pick(percent_pool(difficulty), rng)?
        };
        let step = whole_step(percent);

        let (expression, parameters, hint) = match operation {
            Operation::FindPercentage => {
                let mut value = ranges.sample("value", rng)?;
                if difficulty < WHOLE_RESULTS_BELOW {
                    value = round_up(value, step);
                }
                (
                    format!("What is {percent}% of {value}?"),
                    params([("percent", json!(percent)), ("value", json!(value))]),
                    "Divide by 100, then multiply by the percent.",
                )
            }
            Operation::FindWhole => {
                let whole = round_up(ranges.sample("value", rng)?, step);
                let part = whole * percent / 100;
                (
                    format!("{part} is {percent}% of what number?"),
                    params([("percent", json!(percent)), ("part", json!(part))]),
                    "Find 1% first, then multiply by 100.",
                )
            }
            Operation::FindPercent => {
                let whole = round_up(ranges.sample("value", rng)?, step);
                let part = whole * percent / 100;
                (
                    format!("{part} is what percent of {whole}?"),
                    params([("part", json!(part)), ("whole", json!(whole))]),
                    "Divide the part by the whole and multiply by 100.",
                )
            }
            Operation::PercentageChange => {
                let original = ranges.sample("value", rng)?;
                let direction = if coin(rng) { "increase" } else { "decrease" };
                let verb = if direction == "increase" { "increased" } else { "decreased" };
                (
                    format!("{original} is {verb} by {percent}%. What is the new value?"),
                    params([
                        ("original", json!(original)),
                        ("percent", json!(percent)),
                        ("direction", json!(direction)),
                    ]),
                    "Work out the change first, then apply it.",
                )
            }
            Operation::Discount => {
                let price = ranges.sample("price", rng)?;
                (
                    format!("An item costs ${price} and is {percent}% off. What is the sale price?"),
                    params([("price", json!(price)), ("percent", json!(percent))]),
                    "Subtract the discount from the original price.",
                )
            }
            Operation::Tax => {
                let price = ranges.sample("price", rng)?;
                (
                    format!("An item costs ${price}. With {percent}% tax, what is the total price?"),
                    params([("price", json!(price)), ("percent", json!(percent))]),
                    "Add the tax to the original price.",
                )
            }
            other => {
                return Err(GenerationError::UnsupportedOperation {
                    question_type: QuestionType::Percentages,
                    operation: other,
                })
            }
        };

        let mut parameters = parameters;
        parameters.insert("operation".into(), json!(operation.name()));
        let answer = self.compute_answer(operation, &parameters)?;

        let mut distractors = Distractors::new(&answer);
        let p = as_f64(percent);
        match operation {
            Operation::FindPercentage => {
                let v = as_f64(param_i64(&parameters, "value")?);
                distractors
                    .push_number(v * p / 10.0)
                    .push_number(v * (100.0 - p) / 100.0);
            }
            Operation::FindWhole => {
                let part = as_f64(param_i64(&parameters, "part")?);
                distractors
                    .push_number(part * p / 100.0)
                    .push_number(part * p)
                    .push_number(part + p);
            }
            Operation::FindPercent => {
                distractors
                    .push(AnswerValue::Percentage(100 - percent))
                    .push(AnswerValue::Percentage(percent * 10));
            }
            Operation::PercentageChange => {
                let original = as_f64(param_i64(&parameters, "original")?);
                let change = original * p / 100.0;
                let increase = param_str(&parameters, "direction")? == "increase";
                distractors
                    .push_number(change)
                    .push_number(if increase { original - change } else { original + change })
                    .push_number(if increase { original + p } else { original - p });
            }
            _ => {
                let price = as_f64(param_i64(&parameters, "price")?);
                let amount = price * p / 100.0;
                let (wrong_way, naive) = if operation == Operation::Discount {
                    (price + amount, price - p)
                } else {
                    (price - amount, price + p)
                };
                distractors.push_number(amount).push_number(wrong_way).push_number(naive);
            }
        }
        distractors.push_numeric_slips();

        let parts = QuestionParts {
            question_type: QuestionType::Percentages,
            operation,
            expression,
            correct_answer: answer.clone(),
            distractors: distractors.finish(rng),
            parameters,
            difficulty,
            hint: Some(hint.to_string()),
            explanation: Some(format!("The answer is {answer}.")),
            steps: None,
        };
        Question::assemble(parts, DISTRACTOR_COUNT, rng)
    }

    fn compute_answer(&self, operation: Operation, parameters: &Parameters) -> Result<AnswerValue> {
        let percent_of = |key: &str| -> Result<i64> {
            let value = param_i64(parameters, key)?;
            let percent = param_i64(parameters, "percent")?;
            value
                .checked_mul(percent)
                .ok_or_else(|| GenerationError::Unsatisfiable("integer overflow".into()))
        };
        match operation {
            Operation::FindPercentage => Ok(hundredths(percent_of("value")?)),
            Operation::FindWhole => {
                let percent = param_i64(parameters, "percent")?;
                if percent == 0 {
                    return Err(GenerationError::Unsatisfiable("0% has no whole".into()));
                }
                let part = param_i64(parameters, "part")?;
                Ok(AnswerValue::number(as_f64(part * 100) / as_f64(percent)))
            }
            Operation::FindPercent => {
                let whole = param_i64(parameters, "whole")?;
                if whole == 0 {
                    return Err(GenerationError::Unsatisfiable("whole of zero".into()));
                }
                let part = param_i64(parameters, "part")?;
                #[allow(clippy::cast_possible_truncation)]
                let percent = (as_f64(part * 100) / as_f64(whole)).round() as i64;
                Ok(AnswerValue::Percentage(percent))
            }
            Operation::PercentageChange => {
                let original = param_i64(parameters, "original")?;
                let percent = param_i64(parameters, "percent")?;
                let factor = match param_str(parameters, "direction")? {
                    "increase" => 100 + percent,
                    "decrease" => 100 - percent,
                    _ => return Err(GenerationError::MissingParameter("direction".into())),
                };
                Ok(money(original * factor))
            }
            Operation::Discount => {
                let price = param_i64(parameters, "price")?;
                Ok(money(price * (100 - param_i64(parameters, "percent")?)))
            }
            Operation::Tax => {
                let price = param_i64(parameters, "price")?;
                Ok(money(price * (100 + param_i64(parameters, "percent")?)))
            }
            other => Err(GenerationError::UnsupportedOperation {
                question_type: QuestionType::Percentages,
                operation: other,
            }),
        }
    }
}
