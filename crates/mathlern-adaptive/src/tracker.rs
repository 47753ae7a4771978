use crate::mastery::{MasteryRecord, TopicSummary};

/// A per-topic mastery estimator a practice session can run on.
///
/// Both the exponential moving average in [`crate::MasteryTracker`] and the
/// Bayesian model in [`crate::BktTracker`] keep one [`MasteryRecord`] per
/// `topic` or `topic:subtopic` key.
pub trait KnowledgeTracker {
    /// Current record, created at the tracker's starting estimate if missing.
    fn get_record(&mut self, topic: &str) -> &MasteryRecord;

    /// Folds one answer into the record and returns it.
    fn update(&mut self, topic: &str, is_correct: bool) -> &MasteryRecord;

    fn get_recommended_difficulty(&mut self, topic: &str) -> f64;

    fn topic_summary(&self, topic: &str) -> TopicSummary;
}
