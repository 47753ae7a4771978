//! Wrong-answer construction shared by all generators.
//!
//! Generators push candidates from their misconception strategies into a
//! [`Distractors`] set. The set converts numbers into the answer's format,
//! drops anything equal to the answer or already present, and tops itself
//! up with nearby values when the strategies did not yield enough.

use mathlern_core::{AnswerValue, Fraction};
use rand::{Rng, RngCore};

use crate::telemetry;

/// Distractors offered per question.
pub const DISTRACTOR_COUNT: usize = 3;

const RANDOM_CLOSE_ATTEMPTS: usize = 30;

#[derive(Debug)]
pub struct Distractors {
    answer: AnswerValue,
    items: Vec<AnswerValue>,
}

impl Distractors {
    #[must_use]
    pub fn new(answer: &AnswerValue) -> Self {
        Self {
            answer: answer.clone(),
            items: Vec::with_capacity(DISTRACTOR_COUNT),
        }
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.items.len() >= DISTRACTOR_COUNT
    }

    /// Adds a candidate unless it equals the answer, repeats an earlier
    /// one or has a different format.
    pub fn push(&mut self, candidate: AnswerValue) -> &mut Self {
        if !self.is_full()
            && candidate != self.answer
            && candidate.format() == self.answer.format()
            && !self.items.contains(&candidate)
        {
            self.items.push(candidate);
        }
        self
    }

    pub fn push_opt(&mut self, candidate: Option<AnswerValue>) -> &mut Self {
        if let Some(c) = candidate {
            self.push(c);
        }
        self
    }

    /// Adds a number in the answer's numeric format.
    #[allow(clippy::cast_possible_truncation)]
    pub fn push_number(&mut self, value: f64) -> &mut Self {
        if !value.is_finite() {
            return self;
        }
        let candidate = match self.answer {
            AnswerValue::Integer(_) => AnswerValue::Integer(value.round() as i64),
            AnswerValue::Percentage(_) => AnswerValue::Percentage(value.round() as i64),
            AnswerValue::Decimal(_) => AnswerValue::decimal(value),
            _ => return self,
        };
        self.push(candidate)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn push_int(&mut self, value: i64) -> &mut Self {
        self.push_number(value as f64)
    }

    pub fn push_fraction(&mut self, numerator: i64, denominator: i64) -> &mut Self {
        if let Ok(f) = Fraction::new(numerator, denominator) {
            self.push(AnswerValue::Fraction(f));
        }
        self
    }

    /// Sign, off-by-one and magnitude slips on a numeric answer.
    pub fn push_numeric_slips(&mut self) -> &mut Self {
        let Some(value) = self.answer.as_f64() else {
            return self;
        };
        if value != 0.0 {
            self.push_number(-value);
        }
        self.push_number(value + 1.0);
        if value - 1.0 < 0.0 && value > 0.0 {
            self.push_number(value + 2.0);
        } else {
            self.push_number(value - 1.0);
        }
        if value != 0.0 {
            if value.abs() < 10.0 {
                self.push_number(value * 10.0);
            } else if matches!(self.answer, AnswerValue::Integer(_)) {
                self.push_number((value / 10.0).trunc());
            } else {
                self.push_number(value / 10.0);
            }
        }
        self
    }

    /// Fills the remaining slots with values near the answer and returns
    /// the distractors.
    pub fn finish(mut self, rng: &mut dyn RngCore) -> Vec<AnswerValue> {
        let mut attempts = 0;
        while !self.is_full() && attempts < RANDOM_CLOSE_ATTEMPTS {
            attempts += 1;
            let candidate = random_close(&self.answer, rng);
            self.push_opt(candidate);
        }
        let mut step = 1;
        while !self.is_full() && step <= 50 {
            let candidate = stepped(&self.answer, step);
            self.push_opt(candidate);
            step += 1;
        }
        if self.items.is_empty() {
            telemetry::warn(&format!(
                "no distractor could be derived for answer {}",
                self.answer
            ));
        }
        self.items
    }
}

/// A random value near `answer`, scaled to its magnitude. Positive answers
/// stay positive.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn random_close(answer: &AnswerValue, rng: &mut dyn RngCore) -> Option<AnswerValue> {
    let sign: i64 = if rng.gen_bool(0.5) { 1 } else { -1 };
    match answer {
        AnswerValue::Integer(n) | AnswerValue::Percentage(n) => {
            let n = *n;
            let delta = int_delta(n, rng);
            let mut value = n + sign * delta;
            if n > 0 && value <= 0 {
                value = n + delta;
            }
            Some(match answer {
                AnswerValue::Percentage(_) => AnswerValue::Percentage(value),
                _ => AnswerValue::Integer(value),
            })
        }
        AnswerValue::Decimal(x) => {
            let x = *x;
            let magnitude = x.abs().max(1.0);
            let delta = magnitude * rng.gen_range(0.05..0.25);
            let mut value = x + sign as f64 * delta;
            if x > 0.0 && value <= 0.0 {
                value = x + delta;
            }
            Some(AnswerValue::decimal(value))
        }
        AnswerValue::Fraction(f) => {
            let k = rng.gen_range(1..=3) * sign;
            let shifted = Fraction::new(f.numerator() + k, f.denominator()).ok()?;
            if f.numerator() > 0 && shifted.numerator() <= 0 {
                return None;
            }
            Some(AnswerValue::Fraction(shifted))
        }
        AnswerValue::Ratio(a, b) => {
            let k = rng.gen_range(1..=3);
            let (a, b) = if rng.gen_bool(0.5) { (a + k, *b) } else { (*a, b + k) };
            Some(AnswerValue::ratio(a, b))
        }
        AnswerValue::Expression(_) => None,
    }
}

/// Deterministic fallback once random attempts are used up.
fn stepped(answer: &AnswerValue, step: i64) -> Option<AnswerValue> {
    match answer {
        AnswerValue::Integer(n) => Some(AnswerValue::Integer(n + step)),
        AnswerValue::Percentage(n) => Some(AnswerValue::Percentage(n + step)),
        #[allow(clippy::cast_precision_loss)]
        AnswerValue::Decimal(x) => Some(AnswerValue::decimal(x + step as f64)),
        AnswerValue::Fraction(f) => Fraction::new(f.numerator() + step, f.denominator())
            .ok()
            .map(AnswerValue::Fraction),
        AnswerValue::Ratio(a, b) => Some(AnswerValue::ratio(a + step, *b)),
        AnswerValue::Expression(_) => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn int_delta(n: i64, rng: &mut dyn RngCore) -> i64 {
    let magnitude = n.saturating_abs();
    if magnitude < 10 {
        rng.gen_range(2..=5)
    } else if magnitude < 100 {
        rng.gen_range(5..=15)
    } else if magnitude < 1000 {
        rng.gen_range(10..=50)
    } else {
        ((magnitude as f64) * rng.gen_range(0.05..0.15)).max(1.0) as i64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn slips_for_integer_answer() {
        let answer = AnswerValue::Integer(42);
        let mut set = Distractors::new(&answer);
        set.push_numeric_slips();
        let items = set.finish(&mut ChaCha8Rng::seed_from_u64(0));
        assert_eq!(
            items,
            vec![
                AnswerValue::Integer(-42),
                AnswerValue::Integer(43),
                AnswerValue::Integer(41)
            ]
        );
    }

    #[test]
    fn rejects_answer_duplicates_and_foreign_formats() {
        let answer = AnswerValue::Integer(5);
        let mut set = Distractors::new(&answer);
        set.push_int(5)
            .push_int(6)
            .push_int(6)
            .push(AnswerValue::decimal(6.5))
            .push(AnswerValue::Percentage(7));
        let items = set.finish(&mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(items.len(), DISTRACTOR_COUNT);
        assert_eq!(items[0], AnswerValue::Integer(6));
        assert!(!items.contains(&answer));
        assert!(items.iter().all(|d| d.format() == answer.format()));
    }

    #[test]
    fn zero_answer_still_gets_distractors() {
        let answer = AnswerValue::Integer(0);
        let mut set = Distractors::new(&answer);
        set.push_numeric_slips();
        let items = set.finish(&mut ChaCha8Rng::seed_from_u64(2));
        assert_eq!(items.len(), DISTRACTOR_COUNT);
        assert!(!items.contains(&answer));
    }

    #[test]
    fn fractions_and_ratios_are_topped_up() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for answer in [
            AnswerValue::Fraction(Fraction::new(3, 4).unwrap()),
            AnswerValue::ratio(2, 3),
            AnswerValue::decimal(12.75),
            AnswerValue::Percentage(40),
        ] {
            let items = Distractors::new(&answer).finish(&mut rng);
            assert_eq!(items.len(), DISTRACTOR_COUNT, "{answer}");
            assert!(!items.contains(&answer));
            for (i, a) in items.iter().enumerate() {
                assert!(!items[i + 1..].contains(a));
            }
        }
    }

    #[test]
    fn expressions_only_keep_explicit_candidates() {
        let answer = AnswerValue::Expression("x = 2 or x = 3".into());
        let mut set = Distractors::new(&answer);
        set.push(AnswerValue::Expression("x = -3 or x = -2".into()));
        let items = set.finish(&mut ChaCha8Rng::seed_from_u64(4));
        assert_eq!(items.len(), 1);
    }
}
