//! Session-level difficulty progression.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AdaptiveError;
use crate::telemetry;

const WARM_UP_QUESTIONS: u32 = 5;
const WARM_UP_STEP: f64 = 0.04;
const WARM_UP_FLOOR: f64 = 0.1;
const PUSH_EVERY_CORRECT: u32 = 5;
const PUSH_STEP: f64 = 0.05;
const PUSH_MAX_BOOST: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Eases the first questions of a session.
    #[default]
    WarmUp,
    Steady,
    /// Raises the ceiling every few correct answers.
    Push,
}

impl Strategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::WarmUp => "warm_up",
            Strategy::Steady => "steady",
            Strategy::Push => "push",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = AdaptiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "warm_up" => Ok(Strategy::WarmUp),
            "steady" => Ok(Strategy::Steady),
            "push" => Ok(Strategy::Push),
            _ => Err(AdaptiveError::UnknownStrategy(s.to_string())),
        }
    }
}

/// Counters of one session. Both only grow until [`AdaptiveScheduler::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchedulerState {
    pub strategy: Strategy,
    pub question_count: u32,
    pub correct_count: u32,
}

#[derive(Debug, Clone, Default)]
pub struct AdaptiveScheduler {
    state: SchedulerState,
}

impl AdaptiveScheduler {
    #[must_use]
    pub fn new(strategy: Strategy) -> Self {
        Self {
            state: SchedulerState {
                strategy,
                ..SchedulerState::default()
            },
        }
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.state.strategy
    }

    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Counts a new question and shapes `base_difficulty` by the strategy.
    pub fn get_next_difficulty(&mut self, base_difficulty: f64) -> f64 {
        let next = self.peek_next_difficulty(base_difficulty);
        self.state.question_count = self.state.question_count.saturating_add(1);
        telemetry::scheduled(
            self.state.strategy.as_str(),
            self.state.question_count,
            mathlern_core::clamp_unit(base_difficulty),
            next,
        );
        next
    }

    /// What [`AdaptiveScheduler::get_next_difficulty`] would return, without
    /// counting the question.
    #[must_use]
    pub fn peek_next_difficulty(&self, base_difficulty: f64) -> f64 {
        let count = self.state.question_count.saturating_add(1);
        let base = mathlern_core::clamp_unit(base_difficulty);
        match self.state.strategy {
            Strategy::WarmUp => warm_up(count, base),
            Strategy::Push => self.push(base),
            Strategy::Steady => base,
        }
    }

    /// One call per answered question.
    pub fn record_response(&mut self, is_correct: bool) {
        if is_correct {
            self.state.correct_count = self.state.correct_count.saturating_add(1);
        }
    }

    /// Starts a new session with the same strategy.
    pub fn reset(&mut self) {
        self.state.question_count = 0;
        self.state.correct_count = 0;
    }

    fn push(&self, base: f64) -> f64 {
        let steps = self.state.correct_count / PUSH_EVERY_CORRECT;
        let boost = (f64::from(steps) * PUSH_STEP).min(PUSH_MAX_BOOST);
        (base + boost).min(1.0)
    }
}

/// Eases question `count` (1-based) of a session, never below the floor.
fn warm_up(count: u32, base: f64) -> f64 {
    if count > WARM_UP_QUESTIONS {
        return base;
    }
    let reduction = f64::from(WARM_UP_QUESTIONS - count) * WARM_UP_STEP;
    (base - reduction).max(WARM_UP_FLOOR)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_converges_to_base() {
        let mut scheduler = AdaptiveScheduler::new(Strategy::WarmUp);
        let first_five: Vec<f64> = (0..5).map(|_| scheduler.get_next_difficulty(0.5)).collect();
        assert!((first_five[0] - 0.34).abs() < 1e-6);
        assert!(first_five.windows(2).all(|w| w[0] <= w[1] + 1e-12));
        assert!((first_five[4] - 0.5).abs() < 1e-6);
        for _ in 0..5 {
            assert_eq!(scheduler.get_next_difficulty(0.5), 0.5);
        }
    }

    #[test]
    fn warm_up_respects_floor() {
        let mut scheduler = AdaptiveScheduler::new(Strategy::WarmUp);
        assert!((scheduler.get_next_difficulty(0.15) - 0.1).abs() < 1e-9);
        // a base already below the floor is lifted to it
        assert!((scheduler.get_next_difficulty(0.05) - 0.1).abs() < 1e-9);
        assert!((scheduler.get_next_difficulty(0.0) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn peek_does_not_count() {
        let mut scheduler = AdaptiveScheduler::new(Strategy::WarmUp);
        let peeked = scheduler.peek_next_difficulty(0.5);
        assert_eq!(scheduler.peek_next_difficulty(0.5), peeked);
        assert_eq!(scheduler.state().question_count, 0);
        assert_eq!(scheduler.get_next_difficulty(0.5), peeked);
        assert_eq!(scheduler.state().question_count, 1);
    }

    #[test]
    fn push_boosts_every_five_correct() {
        let mut scheduler = AdaptiveScheduler::new(Strategy::Push);
        assert!((scheduler.get_next_difficulty(0.5) - 0.5).abs() < 1e-9);
        for _ in 0..5 {
            scheduler.record_response(true);
        }
        assert!((scheduler.get_next_difficulty(0.5) - 0.55).abs() < 1e-9);
        for _ in 0..40 {
            scheduler.record_response(true);
        }
        assert!((scheduler.get_next_difficulty(0.5) - 0.7).abs() < 1e-9);
        assert!((scheduler.get_next_difficulty(0.95) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn steady_passes_through_and_reset_zeroes_counters() {
        let mut scheduler = AdaptiveScheduler::new(Strategy::Steady);
        assert_eq!(scheduler.get_next_difficulty(0.42), 0.42);
        scheduler.record_response(true);
        scheduler.record_response(false);
        let state = scheduler.state();
        assert_eq!((state.question_count, state.correct_count), (1, 1));
        scheduler.reset();
        assert_eq!(scheduler.state(), SchedulerState {
            strategy: Strategy::Steady,
            question_count: 0,
            correct_count: 0,
        });
    }

    #[test]
    fn strategy_parses_from_config_strings() {
        assert_eq!("warm_up".parse::<Strategy>().unwrap(), Strategy::WarmUp);
        assert_eq!("Push".parse::<Strategy>().unwrap(), Strategy::Push);
        assert!(matches!(
            "sprint".parse::<Strategy>(),
            Err(AdaptiveError::UnknownStrategy(_))
        ));
        assert_eq!(serde_json::to_string(&Strategy::WarmUp).unwrap(), "\"warm_up\"");
    }
}
