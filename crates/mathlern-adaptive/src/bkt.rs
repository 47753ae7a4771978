//! Bayesian Knowledge Tracing: mastery as the probability that a skill is
//! known, updated by Bayes' rule after every answer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

use crate::difficulty::DifficultyMapper;
use crate::error::{AdaptiveError, Result};
use crate::mastery::{summarize, MasteryRecord, TopicSummary, MAX_HISTORY};
use crate::telemetry;
use crate::tracker::KnowledgeTracker;

/// Probability of knowing the skill before the first answer.
pub const DEFAULT_PRIOR: f64 = 0.1;
/// Probability of learning the skill from one practice opportunity.
pub const DEFAULT_LEARN: f64 = 0.3;
/// Probability of a correct answer without knowing the skill.
pub const DEFAULT_GUESS: f64 = 0.25;
/// Probability of a wrong answer despite knowing the skill.
pub const DEFAULT_SLIP: f64 = 0.1;
/// `P(L)` at which a skill counts as mastered.
pub const MASTERED_AT: f64 = 0.95;

/// The four probabilities of the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BktParameters {
    pub prior: f64,
    pub learn: f64,
    pub guess: f64,
    pub slip: f64,
}

impl Default for BktParameters {
    fn default() -> Self {
        Self {
            prior: DEFAULT_PRIOR,
            learn: DEFAULT_LEARN,
            guess: DEFAULT_GUESS,
            slip: DEFAULT_SLIP,
        }
    }
}

impl BktParameters {
    /// Each probability must lie in `[0, 1]` and `guess + slip` below 1.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("prior", self.prior),
            ("learn", self.learn),
            ("guess", self.guess),
            ("slip", self.slip),
        ];
        for (name, value) in fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(AdaptiveError::InvalidBktParameters(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        if self.guess + self.slip >= 1.0 {
            return Err(AdaptiveError::InvalidBktParameters(format!(
                "guess + slip must stay below 1, got {}",
                self.guess + self.slip
            )));
        }
        Ok(())
    }

    /// `P(correct) = P(L)(1 - slip) + (1 - P(L)) guess`.
    #[must_use]
    pub fn correct_probability(&self, known: f64) -> f64 {
        known * (1.0 - self.slip) + (1.0 - known) * self.guess
    }

    /// Posterior `P(L | answer)` followed by the learning transition.
    #[must_use]
    pub fn next_mastery(&self, known: f64, is_correct: bool) -> f64 {
        let (joint, evidence) = if is_correct {
            (known * (1.0 - self.slip), self.correct_probability(known))
        } else {
            (
                known * self.slip,
                known * self.slip + (1.0 - known) * (1.0 - self.guess),
            )
        };
        let posterior = if evidence > 0.0 { joint / evidence } else { known };
        mathlern_core::clamp_unit(posterior + (1.0 - posterior) * self.learn)
    }
}

/// Serializable BKT state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BktSnapshot {
    #[serde(default)]
    pub params: BktParameters,
    #[serde(default)]
    pub records: BTreeMap<String, MasteryRecord>,
}

/// Bayesian Knowledge Tracing per topic key.
///
/// Records reuse [`MasteryRecord`]; `mastery_score` holds `P(L)` and starts
/// at the prior.
#[derive(Debug, Clone, Default)]
pub struct BktTracker {
    params: BktParameters,
    mapper: DifficultyMapper,
    records: BTreeMap<String, MasteryRecord>,
}

impl BktTracker {
    pub fn new(params: BktParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_mapper(mut self, mapper: DifficultyMapper) -> Self {
        self.mapper = mapper;
        self
    }

    #[must_use]
    pub fn params(&self) -> BktParameters {
        self.params
    }

    /// `P(L)` for a topic; the prior when it has no record.
    #[must_use]
    pub fn get_mastery(&self, topic: &str) -> f64 {
        self.peek(topic).map_or(self.params.prior, |r| r.mastery_score)
    }

    pub fn get_record(&mut self, topic: &str) -> &MasteryRecord {
        self.entry(topic)
    }

    #[must_use]
    pub fn peek(&self, topic: &str) -> Option<&MasteryRecord> {
        self.records.get(topic)
    }

    pub fn update(&mut self, topic: &str, is_correct: bool) -> &MasteryRecord {
        let params = self.params;
        let record = self.entry(topic);
        let old = record.mastery_score;
        record.mastery_score = params.next_mastery(old, is_correct);
        record.attempts = record.attempts.saturating_add(1);
        if is_correct {
            record.correct = record.correct.saturating_add(1);
            record.streak = record.streak.saturating_add(1);
            record.best_streak = record.best_streak.max(record.streak);
        } else {
            record.streak = 0;
        }
        record.history.push(if is_correct { 1.0 } else { 0.0 });
        if record.history.len() > MAX_HISTORY {
            record.history.remove(0);
        }
        record.last_updated = Some(OffsetDateTime::now_utc());

        telemetry::mastery_updated(topic, old, record.mastery_score, record.streak);
        record
    }

    /// Chance that the next answer on `topic` is correct.
    #[must_use]
    pub fn predict_correct_probability(&self, topic: &str) -> f64 {
        self.params.correct_probability(self.get_mastery(topic))
    }

    /// Correct answers in a row needed to reach `target`, capped at
    /// `max_questions`. Zero when the topic is already there.
    #[must_use]
    pub fn estimate_questions_to_mastery(&self, topic: &str, target: f64, max_questions: u32) -> u32 {
        let mut known = self.get_mastery(topic);
        let mut questions = 0;
        while known < target && questions < max_questions {
            known = self.params.next_mastery(known, true);
            questions += 1;
        }
        questions
    }

    #[must_use]
    pub fn is_mastered(&self, topic: &str) -> bool {
        self.get_mastery(topic) >= MASTERED_AT
    }

    /// Difficulty for the current `P(L)` in the default learning zone.
    pub fn get_recommended_difficulty(&mut self, topic: &str) -> f64 {
        let mastery = self.get_mastery(topic);
        self.mapper.map(mastery, None).difficulty
    }

    pub fn reset(&mut self, topic: &str) {
        self.records.remove(topic);
    }

    pub fn reset_all(&mut self) {
        self.records.clear();
    }

    #[must_use]
    pub fn topic_summary(&self, topic: &str) -> TopicSummary {
        summarize(topic, self.records.values(), self.params.prior)
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, &MasteryRecord)> {
        self.records.iter().map(|(k, r)| (k.as_str(), r))
    }

    #[must_use]
    pub fn snapshot(&self) -> BktSnapshot {
        BktSnapshot {
            params: self.params,
            records: self.records.clone(),
        }
    }

    pub fn from_snapshot(snapshot: BktSnapshot) -> Result<Self> {
        let mut tracker = Self::new(snapshot.params)?;
        for (key, mut record) in snapshot.records {
            if record.repair() {
                telemetry::warn(&format!("snapshot record '{key}' was out of range and got clamped"));
            }
            tracker.records.insert(key, record);
        }
        Ok(tracker)
    }

    pub fn load(value: serde_json::Value) -> Result<Self> {
        let snapshot: BktSnapshot = serde_json::from_value(value)?;
        Self::from_snapshot(snapshot)
    }

    fn entry(&mut self, topic: &str) -> &mut MasteryRecord {
        let prior = self.params.prior;
        self.records.entry(topic.to_string()).or_insert_with(|| {
            let mut record = MasteryRecord::new(topic);
            record.mastery_score = prior;
            record
        })
    }
}

impl KnowledgeTracker for BktTracker {
    fn get_record(&mut self, topic: &str) -> &MasteryRecord {
        BktTracker::get_record(self, topic)
    }

    fn update(&mut self, topic: &str, is_correct: bool) -> &MasteryRecord {
        BktTracker::update(self, topic, is_correct)
    }

    fn get_recommended_difficulty(&mut self, topic: &str) -> f64 {
        BktTracker::get_recommended_difficulty(self, topic)
    }

    fn topic_summary(&self, topic: &str) -> TopicSummary {
        BktTracker::topic_summary(self, topic)
    }
}
