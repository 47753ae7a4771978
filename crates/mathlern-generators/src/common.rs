//! Helpers shared by the domain generators.

use mathlern_adaptive::DifficultyMapper;
use mathlern_core::{
    range_for, validate_ranges, BaseRanges, GenerationError, ParamRange, Parameters, Result,
};
use rand::{Rng, RngCore};
use serde_json::Value;

/// Upper bound on re-sampling before a generator gives up.
pub const MAX_RESAMPLES: usize = 20;

/// Base ranges of one generator, scaled per request.
#[derive(Debug, Clone)]
pub struct RangeSet {
    mapper: DifficultyMapper,
    base: BaseRanges,
}

impl RangeSet {
    pub fn new(mapper: DifficultyMapper, defaults: &[(&str, i64, i64)]) -> Self {
        let base = defaults
            .iter()
            .map(|(name, min, max)| ((*name).to_string(), ParamRange::new(*min, *max)))
            .collect();
        Self { mapper, base }
    }

    /// Overrides (and adds) base ranges. Degenerate ranges are rejected.
    pub fn merge(&mut self, overrides: BaseRanges) -> Result<()> {
        validate_ranges(&overrides)?;
        self.base.extend(overrides);
        Ok(())
    }

    pub fn scaled(&self, difficulty: f64) -> Scaled {
        Scaled(self.mapper.get_parameter_ranges(difficulty, &self.base))
    }
}

/// Difficulty-scaled ranges for one question.
#[derive(Debug, Clone)]
pub struct Scaled(BaseRanges);

impl Scaled {
    pub fn range(&self, param: &str) -> Result<ParamRange> {
        range_for(&self.0, param)
    }

    pub fn sample(&self, param: &str, rng: &mut dyn RngCore) -> Result<i64> {
        Ok(self.range(param)?.sample(rng))
    }

    /// Draws a value other than zero, re-sampling a bounded number of times.
    pub fn sample_nonzero(&self, param: &str, rng: &mut dyn RngCore) -> Result<i64> {
        let range = self.range(param)?;
        for _ in 0..MAX_RESAMPLES {
            let value = range.sample(rng);
            if value != 0 {
                return Ok(value);
            }
        }
        Err(GenerationError::Unsatisfiable(format!(
            "range {}..={} for '{param}' keeps yielding zero",
            range.min, range.max
        )))
    }
}

/// Builds a parameter map from key/value pairs.
pub fn params<const N: usize>(pairs: [(&str, Value); N]) -> Parameters {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

pub fn coin(rng: &mut dyn RngCore) -> bool {
    rng.gen_bool(0.5)
}

/// `+ 5` / `- 5` for the trailing term of an expression.
pub fn signed_term(value: i64) -> String {
    if value < 0 {
        format!("- {}", value.unsigned_abs())
    } else {
        format!("+ {value}")
    }
}

/// `3x`, `x`, `-x`, `-3x`.
pub fn coefficient(value: i64, var: &str) -> String {
    match value {
        1 => var.to_string(),
        -1 => format!("-{var}"),
        v => format!("{v}{var}"),
    }
}

/// Exact integer square root, `None` for negatives and non-squares.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn isqrt(n: i64) -> Option<i64> {
    if n < 0 {
        return None;
    }
    let s = (n as f64).sqrt().round() as i64;
    (s * s == n).then_some(s)
}
