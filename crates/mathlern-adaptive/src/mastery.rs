//! Per-topic mastery estimation with an exponential moving average.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use time::OffsetDateTime;

use crate::difficulty::DifficultyMapper;
use crate::error::{AdaptiveError, Result};
use crate::telemetry;
use crate::tracker::KnowledgeTracker;

pub const DEFAULT_ALPHA: f64 = 0.3;
pub const INITIAL_MASTERY: f64 = 0.5;
/// Number of recent performance values kept per record.
pub const MAX_HISTORY: usize = 20;

const FAST_RESPONSE_MS: f64 = 5_000.0;
const SLOW_RESPONSE_MS: f64 = 30_000.0;
const VERY_SLOW_RESPONSE_MS: f64 = 60_000.0;

/// Human-readable band of a mastery score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryLevel {
    Novice,
    Beginner,
    Developing,
    Proficient,
    Advanced,
    Expert,
}

impl MasteryLevel {
    /// Lower bounds are inclusive.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score < 0.20 {
            MasteryLevel::Novice
        } else if score < 0.40 {
            MasteryLevel::Beginner
        } else if score < 0.60 {
            MasteryLevel::Developing
        } else if score < 0.70 {
            MasteryLevel::Proficient
        } else if score < 0.85 {
            MasteryLevel::Advanced
        } else {
            MasteryLevel::Expert
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MasteryLevel::Novice => "Novice",
            MasteryLevel::Beginner => "Beginner",
            MasteryLevel::Developing => "Developing",
            MasteryLevel::Proficient => "Proficient",
            MasteryLevel::Advanced => "Advanced",
            MasteryLevel::Expert => "Expert",
        }
    }
}

/// Mastery state of one topic (or `topic:subtopic` key).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryRecord {
    pub topic_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtopic_id: Option<String>,
    /// Always within `[0, 1]`.
    pub mastery_score: f64,
    /// Consecutive correct answers; never above `best_streak`.
    pub streak: u32,
    pub best_streak: u32,
    pub attempts: u32,
    pub correct: u32,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
    #[serde(default)]
    pub history: Vec<f64>,
}

impl MasteryRecord {
    /// Fresh record for a tracker key. `"topic:sub"` keys carry both ids.
    #[must_use]
    pub fn new(key: &str) -> Self {
        let (topic_id, subtopic_id) = match key.split_once(':') {
            Some((topic, sub)) if !sub.is_empty() => (topic.to_string(), Some(sub.to_string())),
            _ => (key.to_string(), None),
        };
        Self {
            topic_id,
            subtopic_id,
            mastery_score: INITIAL_MASTERY,
            streak: 0,
            best_streak: 0,
            attempts: 0,
            correct: 0,
            last_updated: None,
            history: Vec::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> String {
        MasteryTracker::topic_key(&self.topic_id, self.subtopic_id.as_deref())
    }

    #[must_use]
    pub fn level(&self) -> MasteryLevel {
        MasteryLevel::from_score(self.mastery_score)
    }

    /// `correct / attempts`, 0 before the first attempt.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.attempts)
        }
    }

    /// Clamps the score and lifts `best_streak` to the current streak.
    /// Returns true if anything had to change.
    pub(crate) fn repair(&mut self) -> bool {
        let mut repaired = false;
        if !(0.0..=1.0).contains(&self.mastery_score) {
            self.mastery_score = mathlern_core::clamp_unit(self.mastery_score);
            repaired = true;
        }
        if self.best_streak < self.streak {
            self.best_streak = self.streak;
            repaired = true;
        }
        if self.correct > self.attempts {
            self.attempts = self.correct;
            repaired = true;
        }
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
        repaired
    }
}

/// Aggregate over every record that belongs to one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub topic_id: String,
    pub average_mastery: f64,
    pub total_attempts: u32,
    pub total_correct: u32,
    pub accuracy: f64,
    pub subtopic_count: usize,
}

/// Serializable tracker state handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub alpha: f64,
    #[serde(default)]
    pub records: BTreeMap<String, MasteryRecord>,
}

/// Exponential moving average of correctness per topic key.
///
/// `new = alpha * performance + (1 - alpha) * old`, with `performance` 1.0
/// for a correct and 0.0 for an incorrect answer. Unknown topics are
/// created lazily at [`INITIAL_MASTERY`].
#[derive(Debug, Clone)]
pub struct MasteryTracker {
    alpha: f64,
    mapper: DifficultyMapper,
    records: BTreeMap<String, MasteryRecord>,
}

impl Default for MasteryTracker {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            mapper: DifficultyMapper::new(),
            records: BTreeMap::new(),
        }
    }
}

impl MasteryTracker {
    /// Tracker with a fixed smoothing constant in `(0, 1)`.
    pub fn new(alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(AdaptiveError::InvalidAlpha(alpha));
        }
        Ok(Self {
            alpha,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_mapper(mut self, mapper: DifficultyMapper) -> Self {
        self.mapper = mapper;
        self
    }

    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Record key for a topic and optional sub-topic.
    #[must_use]
    pub fn topic_key(topic: &str, subtopic: Option<&str>) -> String {
        match subtopic {
            Some(sub) if !sub.is_empty() => format!("{topic}:{sub}"),
            _ => topic.to_string(),
        }
    }

    pub fn get_mastery(&mut self, topic: &str) -> f64 {
        self.get_record(topic).mastery_score
    }

    pub fn get_record(&mut self, topic: &str) -> &MasteryRecord {
        self.entry(topic)
    }

    /// Current record without creating one.
    #[must_use]
    pub fn peek(&self, topic: &str) -> Option<&MasteryRecord> {
        self.records.get(topic)
    }

    pub fn level_for(&mut self, topic: &str) -> MasteryLevel {
        self.get_record(topic).level()
    }

    pub fn update(&mut self, topic: &str, is_correct: bool) -> &MasteryRecord {
        self.update_timed(topic, is_correct, None)
    }

    /// Like [`MasteryTracker::update`], weighting a correct answer by how
    /// fluently it was given.
    pub fn update_timed(
        &mut self,
        topic: &str,
        is_correct: bool,
        response_time: Option<Duration>,
    ) -> &MasteryRecord {
        let alpha = self.alpha;
        let mut performance = if is_correct { 1.0 } else { 0.0 };
        if let (true, Some(elapsed)) = (is_correct, response_time) {
            performance = (performance * fluency_factor(elapsed)).min(1.0);
        }

        let record = self.entry(topic);
        let old = record.mastery_score;
        record.mastery_score = mathlern_core::clamp_unit(alpha * performance + (1.0 - alpha) * old);
        record.attempts = record.attempts.saturating_add(1);
        if is_correct {
            record.correct = record.correct.saturating_add(1);
            record.streak = record.streak.saturating_add(1);
            record.best_streak = record.best_streak.max(record.streak);
        } else {
            record.streak = 0;
        }
        record.history.push(performance);
        if record.history.len() > MAX_HISTORY {
            record.history.remove(0);
        }
        record.last_updated = Some(OffsetDateTime::now_utc());

        telemetry::mastery_updated(topic, old, record.mastery_score, record.streak);
        record
    }

    /// Drops the record; the next lookup starts again at the default.
    pub fn reset(&mut self, topic: &str) {
        self.records.remove(topic);
    }

    pub fn reset_all(&mut self) {
        self.records.clear();
    }

    /// Difficulty for the current mastery in the default learning zone.
    pub fn get_recommended_difficulty(&mut self, topic: &str) -> f64 {
        let mastery = self.get_mastery(topic);
        self.mapper.map(mastery, None).difficulty
    }

    #[must_use]
    pub fn topic_summary(&self, topic: &str) -> TopicSummary {
        summarize(topic, self.records.values(), INITIAL_MASTERY)
    }

    pub fn records(&self) -> impl Iterator<Item = (&str, &MasteryRecord)> {
        self.records.iter().map(|(k, r)| (k.as_str(), r))
    }

    /// Loads one already-materialised record, repairing broken invariants.
    pub fn restore(&mut self, mut record: MasteryRecord) {
        let key = record.key();
        if record.repair() {
            telemetry::warn(&format!("restored mastery record '{key}' was out of range and got clamped"));
        }
        self.records.insert(key, record);
    }

    #[must_use]
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            alpha: self.alpha,
            records: self.records.clone(),
        }
    }

    pub fn from_snapshot(snapshot: TrackerSnapshot) -> Result<Self> {
        let mut tracker = Self::new(snapshot.alpha)?;
        for (key, mut record) in snapshot.records {
            if record.repair() {
                telemetry::warn(&format!("snapshot record '{key}' was out of range and got clamped"));
            }
            tracker.records.insert(key, record);
        }
        Ok(tracker)
    }

    /// Rebuilds a tracker from its JSON snapshot form.
    pub fn load(value: serde_json::Value) -> Result<Self> {
        let snapshot: TrackerSnapshot = serde_json::from_value(value)?;
        Self::from_snapshot(snapshot)
    }

    fn entry(&mut self, topic: &str) -> &mut MasteryRecord {
        self.records
            .entry(topic.to_string())
            .or_insert_with(|| MasteryRecord::new(topic))
    }
}

impl KnowledgeTracker for MasteryTracker {
    fn get_record(&mut self, topic: &str) -> &MasteryRecord {
        MasteryTracker::get_record(self, topic)
    }

    fn update(&mut self, topic: &str, is_correct: bool) -> &MasteryRecord {
        MasteryTracker::update(self, topic, is_correct)
    }

    fn get_recommended_difficulty(&mut self, topic: &str) -> f64 {
        MasteryTracker::get_recommended_difficulty(self, topic)
    }

    fn topic_summary(&self, topic: &str) -> TopicSummary {
        MasteryTracker::topic_summary(self, topic)
    }
}

/// Rolls the records of `topic` into one summary. `empty_mastery` is
/// reported when the topic has no records yet.
pub(crate) fn summarize<'a>(
    topic: &str,
    records: impl Iterator<Item = &'a MasteryRecord>,
    empty_mastery: f64,
) -> TopicSummary {
    let records: Vec<&MasteryRecord> = records.filter(|r| r.topic_id == topic).collect();

    if records.is_empty() {
        return TopicSummary {
            topic_id: topic.to_string(),
            average_mastery: empty_mastery,
            total_attempts: 0,
            total_correct: 0,
            accuracy: 0.0,
            subtopic_count: 0,
        };
    }

    // A topic-level record already counts every answer its sub-topics saw.
    let (total_attempts, total_correct) = match records.iter().find(|r| r.subtopic_id.is_none()) {
        Some(own) => (own.attempts, own.correct),
        None => (
            records.iter().map(|r| r.attempts).sum(),
            records.iter().map(|r| r.correct).sum(),
        ),
    };
    #[allow(clippy::cast_precision_loss)]
    let average_mastery =
        records.iter().map(|r| r.mastery_score).sum::<f64>() / records.len() as f64;

    TopicSummary {
        topic_id: topic.to_string(),
        average_mastery,
        total_attempts,
        total_correct,
        accuracy: f64::from(total_correct) / f64::from(total_attempts.max(1)),
        subtopic_count: records.iter().filter(|r| r.subtopic_id.is_some()).count(),
    }
}

/// Multiplier for a correct answer, 0.8 to 1.1 depending on response time.
#[must_use]
pub fn fluency_factor(elapsed: Duration) -> f64 {
    let ms = elapsed.as_secs_f64() * 1000.0;
    if ms < FAST_RESPONSE_MS {
        (1.0 + (FAST_RESPONSE_MS - ms) / FAST_RESPONSE_MS * 0.1).min(1.1)
    } else if ms < SLOW_RESPONSE_MS {
        1.0
    } else if ms < VERY_SLOW_RESPONSE_MS {
        let penalty = (ms - SLOW_RESPONSE_MS) / (VERY_SLOW_RESPONSE_MS - SLOW_RESPONSE_MS) * 0.1;
        (1.0 - penalty).max(0.9)
    } else {
        0.8
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn unknown_topic_starts_at_default() {
        let mut tracker = MasteryTracker::default();
        assert!((tracker.get_mastery("algebra") - 0.5).abs() < f64::EPSILON);
        let record = tracker.get_record("algebra");
        assert_eq!(record.attempts, 0);
        assert_eq!(record.streak, 0);
        assert_eq!(record.best_streak, 0);
    }

    #[test]
    fn one_correct_answer_follows_ema_law() {
        let mut tracker = MasteryTracker::new(0.3).unwrap();
        let record = tracker.update("fractions", true);
        assert!((record.mastery_score - 0.65).abs() < 1e-6);
        assert_eq!(record.attempts, 1);
        assert_eq!(record.correct, 1);
        assert!(record.last_updated.is_some());
    }

    #[test]
    fn streaks_reset_but_best_is_kept() {
        let mut tracker = MasteryTracker::default();
        for _ in 0..4 {
            tracker.update("ratios", true);
        }
        assert_eq!(tracker.get_record("ratios").streak, 4);
        let record = tracker.update("ratios", false);
        assert_eq!(record.streak, 0);
        assert_eq!(record.best_streak, 4);
        assert_eq!(record.attempts, 5);
        assert_eq!(record.correct, 4);
        assert!((record.accuracy() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn reset_restores_default() {
        let mut tracker = MasteryTracker::default();
        for _ in 0..10 {
            tracker.update("geometry", false);
        }
        assert!(tracker.get_mastery("geometry") < 0.1);
        tracker.reset("geometry");
        assert!((tracker.get_mastery("geometry") - 0.5).abs() < f64::EPSILON);
        tracker.reset("never-seen");
    }

    #[test]
    fn alpha_outside_open_unit_interval_is_rejected() {
        for alpha in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
            assert!(matches!(
                MasteryTracker::new(alpha),
                Err(AdaptiveError::InvalidAlpha(_))
            ));
        }
    }

    #[test]
    fn level_bands() {
        let cases = [
            (0.0, MasteryLevel::Novice),
            (0.10, MasteryLevel::Novice),
            (0.19, MasteryLevel::Novice),
            (0.20, MasteryLevel::Beginner),
            (0.39, MasteryLevel::Beginner),
            (0.40, MasteryLevel::Developing),
            (0.59, MasteryLevel::Developing),
            (0.60, MasteryLevel::Proficient),
            (0.69, MasteryLevel::Proficient),
            (0.70, MasteryLevel::Advanced),
            (0.84, MasteryLevel::Advanced),
            (0.85, MasteryLevel::Expert),
            (0.90, MasteryLevel::Expert),
            (1.0, MasteryLevel::Expert),
        ];
        for (score, level) in cases {
            let mut record = MasteryRecord::new("t");
            record.mastery_score = score;
            assert_eq!(record.level(), level, "score {score}");
        }
    }

    #[test]
    fn history_is_capped() {
        let mut tracker = MasteryTracker::default();
        for i in 0..30 {
            tracker.update("arithmetic", i % 2 == 0);
        }
        let record = tracker.get_record("arithmetic");
        assert_eq!(record.history.len(), MAX_HISTORY);
        assert_eq!(record.attempts, 30);
    }

    #[test]
    fn fast_answers_count_at_most_full_performance() {
        let mut tracker = MasteryTracker::default();
        let fast = tracker
            .update_timed("a", true, Some(Duration::from_millis(500)))
            .mastery_score;
        let mut plain = MasteryTracker::default();
        assert!((fast - plain.update("a", true).mastery_score).abs() < 1e-9);

        let slow = tracker
            .update_timed("b", true, Some(Duration::from_secs(90)))
            .mastery_score;
        assert!((slow - (0.3 * 0.8 + 0.7 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn fluency_factor_tiers() {
        assert!((fluency_factor(Duration::ZERO) - 1.1).abs() < 1e-9);
        assert!((fluency_factor(Duration::from_millis(2_500)) - 1.05).abs() < 1e-9);
        assert!((fluency_factor(Duration::from_secs(10)) - 1.0).abs() < 1e-9);
        assert!((fluency_factor(Duration::from_secs(45)) - 0.95).abs() < 1e-9);
        assert!((fluency_factor(Duration::from_secs(60)) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn subtopic_keys_roll_up_into_summary() {
        let mut tracker = MasteryTracker::default();
        let add = MasteryTracker::topic_key("arithmetic", Some("addition"));
        let mul = MasteryTracker::topic_key("arithmetic", Some("multiplication"));
        assert_eq!(add, "arithmetic:addition");
        tracker.update(&add, true);
        tracker.update(&add, true);
        tracker.update(&mul, false);

        let record = tracker.get_record(&add);
        assert_eq!(record.topic_id, "arithmetic");
        assert_eq!(record.subtopic_id.as_deref(), Some("addition"));

        let summary = tracker.topic_summary("arithmetic");
        assert_eq!(summary.subtopic_count, 2);
        assert_eq!(summary.total_attempts, 3);
        assert_eq!(summary.total_correct, 2);

        tracker.update("arithmetic", true);
        tracker.update("arithmetic", true);
        tracker.update("arithmetic", false);
        let summary = tracker.topic_summary("arithmetic");
        assert_eq!(summary.subtopic_count, 2);
        assert_eq!(summary.total_attempts, 3);

        let empty = tracker.topic_summary("geometry");
        assert_eq!(empty.subtopic_count, 0);
        assert!((empty.average_mastery - INITIAL_MASTERY).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_round_trip_repairs_bad_records() {
        let mut tracker = MasteryTracker::new(0.2).unwrap();
        tracker.update("algebra", true);
        let json = serde_json::to_value(tracker.snapshot()).unwrap();
        let restored = MasteryTracker::load(json).unwrap();
        assert!((restored.alpha() - 0.2).abs() < f64::EPSILON);
        let (before, after) = (tracker.peek("algebra").unwrap(), restored.peek("algebra").unwrap());
        assert_eq!(after.attempts, before.attempts);
        assert_eq!(after.streak, before.streak);
        assert!((after.mastery_score - before.mastery_score).abs() < 1e-12);
        assert_eq!(after.last_updated, before.last_updated);

        let broken = json!({
            "alpha": 0.3,
            "records": {
                "ratios": {
                    "topic_id": "ratios",
                    "mastery_score": 1.7,
                    "streak": 4,
                    "best_streak": 1,
                    "attempts": 4,
                    "correct": 4
                }
            }
        });
        let repaired = MasteryTracker::load(broken).unwrap();
        let record = repaired.peek("ratios").unwrap();
        assert!((record.mastery_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(record.best_streak, 4);
    }

    #[test]
    fn snapshot_with_invalid_alpha_fails() {
        let err = MasteryTracker::load(json!({"alpha": 3.0})).unwrap_err();
        assert!(matches!(err, AdaptiveError::InvalidAlpha(_)));
        let err = MasteryTracker::load(json!({"records": []})).unwrap_err();
        assert!(matches!(err, AdaptiveError::Snapshot(_)));
    }

    proptest! {
        #[test]
        fn score_stays_in_unit_interval(answers in proptest::collection::vec(any::<bool>(), 0..60)) {
            let mut tracker = MasteryTracker::default();
            for correct in answers {
                let r = tracker.update("t", correct);
                prop_assert!((0.0..=1.0).contains(&r.mastery_score));
                prop_assert!(r.streak <= r.best_streak);
            }
        }

        #[test]
        fn recommended_difficulty_is_monotonic(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let mut tracker = MasteryTracker::default();
            let mut low = MasteryRecord::new("low");
            low.mastery_score = lo;
            let mut high = MasteryRecord::new("high");
            high.mastery_score = hi;
            tracker.restore(low);
            tracker.restore(high);
            prop_assert!(
                tracker.get_recommended_difficulty("low")
                    <= tracker.get_recommended_difficulty("high")
            );
        }
    }
}
