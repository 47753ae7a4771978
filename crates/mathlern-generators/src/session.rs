//! One learner's practice run: mastery drives difficulty, answers drive
//! mastery.

use std::collections::BTreeMap;

use mathlern_adaptive::{
    AdaptiveScheduler, DifficultyMapper, DifficultyZone, KnowledgeTracker, MasteryRecord,
    MasteryTracker,
};
use mathlern_core::{Question, Result};
use rand::RngCore;

use crate::registry::GeneratorRegistry;

/// Runs on any [`KnowledgeTracker`]; the moving-average tracker by default.
#[derive(Debug)]
pub struct PracticeSession<T = MasteryTracker> {
    tracker: T,
    scheduler: AdaptiveScheduler,
    mapper: DifficultyMapper,
    target_zone: Option<DifficultyZone>,
    registry: GeneratorRegistry,
    /// Consecutive wrong answers per topic, reset on a correct one. Lives
    /// only as long as the session.
    incorrect_streaks: BTreeMap<String, u32>,
}

impl<T: KnowledgeTracker> PracticeSession<T> {
    /// The default generators share `mapper` with the session.
    #[must_use]
    pub fn new(tracker: T, scheduler: AdaptiveScheduler, mapper: DifficultyMapper) -> Self {
        Self {
            tracker,
            scheduler,
            mapper,
            target_zone: None,
            registry: GeneratorRegistry::with_defaults(mapper),
            incorrect_streaks: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_target_zone(mut self, zone: DifficultyZone) -> Self {
        self.target_zone = Some(zone);
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: GeneratorRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    #[must_use]
    pub fn scheduler(&self) -> &AdaptiveScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn mapper(&self) -> DifficultyMapper {
        self.mapper
    }

    #[must_use]
    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    #[must_use]
    pub fn into_tracker(self) -> T {
        self.tracker
    }

    #[must_use]
    pub fn incorrect_streak(&self, topic: &str) -> u32 {
        self.incorrect_streaks.get(topic).copied().unwrap_or(0)
    }

    /// Mastery mapped into the target zone and nudged by both streaks,
    /// before the scheduler shapes it.
    fn plan(&mut self, topic: &str) -> f64 {
        let incorrect = self.incorrect_streak(topic);
        let record = self.tracker.get_record(topic);
        let (mastery, streak) = (record.mastery_score, record.streak);
        let mapping = self.mapper.map(mastery, self.target_zone);
        self.mapper
            .adjust_for_streak(mapping.difficulty, streak, incorrect)
    }

    /// Generates the next question for a topic slug. The scheduler only
    /// counts the question once generation succeeded.
    pub fn next_question(&mut self, topic: &str, rng: &mut dyn RngCore) -> Result<Question> {
        self.registry.get(topic)?;
        let base = self.plan(topic);
        let difficulty = self.scheduler.peek_next_difficulty(base);
        let question = self.registry.generate(topic, difficulty, None, rng)?;
        self.scheduler.get_next_difficulty(base);
        Ok(question)
    }

    /// Records an answer to `question` and returns the updated topic record.
    /// The question's operation is tracked as a sub-topic alongside.
    pub fn submit(&mut self, topic: &str, question: &Question, is_correct: bool) -> MasteryRecord {
        self.scheduler.record_response(is_correct);
        let streak = self.incorrect_streaks.entry(topic.to_string()).or_insert(0);
        *streak = if is_correct { 0 } else { streak.saturating_add(1) };
        let sub_key = MasteryTracker::topic_key(topic, Some(question.operation.name()));
        self.tracker.update(&sub_key, is_correct);
        self.tracker.update(topic, is_correct).clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use mathlern_adaptive::{BktTracker, Strategy};
    use mathlern_core::{
        AnswerValue, GenerationError, Operation, Parameters, QuestionGenerator, QuestionType,
    };
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn session(strategy: Strategy) -> PracticeSession {
        PracticeSession::new(
            MasteryTracker::default(),
            AdaptiveScheduler::new(strategy),
            DifficultyMapper::new(),
        )
    }

    /// Registered under arithmetic, never manages to build a question.
    struct Exhausted;

    impl QuestionGenerator for Exhausted {
        fn question_type(&self) -> QuestionType {
            QuestionType::Arithmetic
        }

        fn supported_operations(&self) -> &'static [Operation] {
            &[Operation::Addition]
        }

        fn generate(
            &self,
            _difficulty: f64,
            _operation: Option<Operation>,
            _rng: &mut dyn RngCore,
        ) -> Result<Question> {
            Err(GenerationError::Unsatisfiable("no operands left".into()))
        }

        fn compute_answer(&self, _operation: Operation, _parameters: &Parameters) -> Result<AnswerValue> {
            Err(GenerationError::Unsatisfiable("no operands left".into()))
        }
    }

    #[test]
    fn correct_answers_raise_difficulty() {
        let mut s = session(Strategy::Steady);
        let mut rng = ChaCha8Rng::seed_from_u64(71);
        let first = s.next_question("arithmetic", &mut rng).unwrap();
        for _ in 0..10 {
            let q = s.next_question("arithmetic", &mut rng).unwrap();
            s.submit("arithmetic", &q, true);
        }
        let q = s.next_question("arithmetic", &mut rng).unwrap();
        assert!(q.difficulty_score > first.difficulty_score);
        assert!(s.tracker().peek("arithmetic").unwrap().mastery_score > 0.9);
        assert_eq!(s.scheduler().state().correct_count, 10);
    }

    #[test]
    fn wrong_answers_build_an_incorrect_streak() {
        let mut s = session(Strategy::Steady);
        let mut rng = ChaCha8Rng::seed_from_u64(72);
        let q = s.next_question("fractions", &mut rng).unwrap();
        for _ in 0..3 {
            s.submit("fractions", &q, false);
        }
        assert_eq!(s.incorrect_streak("fractions"), 3);
        let record = s.submit("fractions", &q, true);
        assert_eq!(s.incorrect_streak("fractions"), 0);
        assert_eq!(record.streak, 1);
        assert_eq!(record.attempts, 4);
        let sub = MasteryTracker::topic_key("fractions", Some(q.operation.name()));
        assert_eq!(s.tracker().peek(&sub).unwrap().attempts, 4);
    }

    #[test]
    fn incorrect_streak_lowers_next_difficulty() {
        let mut plain = session(Strategy::Steady);
        let mut struggling = session(Strategy::Steady);
        let mut rng = ChaCha8Rng::seed_from_u64(73);
        let q = struggling.next_question("algebra", &mut rng).unwrap();
        plain.next_question("algebra", &mut rng).unwrap();
        for _ in 0..3 {
            struggling.submit("algebra", &q, false);
        }
        // Same mastery for both, only the session streak differs.
        struggling.tracker.reset("algebra");
        let eased = struggling.plan("algebra");
        let normal = plain.plan("algebra");
        assert!((normal - eased - 0.09).abs() < 1e-9);
    }

    #[test]
    fn unknown_topic_does_not_count_as_scheduled() {
        let mut s = session(Strategy::WarmUp);
        let mut rng = ChaCha8Rng::seed_from_u64(74);
        assert!(s.next_question("calculus", &mut rng).is_err());
        assert_eq!(s.scheduler().state().question_count, 0);
    }

    #[test]
    fn target_zone_shifts_difficulty() {
        let mut comfort = session(Strategy::Steady).with_target_zone(DifficultyZone::Comfort);
        let mut struggle = session(Strategy::Steady).with_target_zone(DifficultyZone::Struggle);
        assert!(comfort.plan("ratios") < struggle.plan("ratios"));
    }

    #[test]
    fn failed_generation_does_not_count_as_scheduled() {
        let mut registry = GeneratorRegistry::new();
        registry.register(Box::new(Exhausted));
        let mut s = session(Strategy::WarmUp).with_registry(registry);
        let mut rng = ChaCha8Rng::seed_from_u64(75);
        for _ in 0..3 {
            assert!(matches!(
                s.next_question("arithmetic", &mut rng),
                Err(GenerationError::Unsatisfiable(_))
            ));
        }
        assert_eq!(s.scheduler().state().question_count, 0);
    }

    #[test]
    fn warm_up_eases_the_first_generated_question() {
        let mut s = session(Strategy::WarmUp);
        let mut rng = ChaCha8Rng::seed_from_u64(76);
        let base = s.plan("geometry");
        let q = s.next_question("geometry", &mut rng).unwrap();
        assert!((q.difficulty_score - (base - 0.16).max(0.1)).abs() < 1e-9);
        assert_eq!(s.scheduler().state().question_count, 1);
    }

    #[test]
    fn runs_on_bayesian_tracing() {
        let mut s = PracticeSession::new(
            BktTracker::default(),
            AdaptiveScheduler::new(Strategy::Steady),
            DifficultyMapper::new(),
        );
        let mut rng = ChaCha8Rng::seed_from_u64(77);
        let first = s.next_question("percentages", &mut rng).unwrap();
        let mut last = 0.0;
        for _ in 0..3 {
            let q = s.next_question("percentages", &mut rng).unwrap();
            last = s.submit("percentages", &q, true).mastery_score;
        }
        // prior 0.1 → 0.5 → 0.848 → 0.967
        assert!(last > 0.95);
        assert!(s.tracker().is_mastered("percentages"));
        let q = s.next_question("percentages", &mut rng).unwrap();
        assert!(q.difficulty_score > first.difficulty_score);
        assert_eq!(s.scheduler().state().question_count, 5);
        let summary = s.tracker().topic_summary("percentages");
        assert_eq!(summary.total_attempts, 3);
        assert!(summary.subtopic_count >= 1);
    }

    #[test]
    fn mapper_is_shared_with_the_session() {
        let s = session(Strategy::Steady);
        assert_eq!(s.mapper(), DifficultyMapper::new());
    }
}
