#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Answer validation and retrospective session analysis.
//!
//! [`AnswerValidator`] judges a single typed answer. [`SessionAnalyzer`]
//! looks back over a run of [`ResponseOutcome`]s and proposes a different
//! target zone or scheduling strategy. It only proposes: trackers and
//! schedulers are never touched here.

mod error;
mod validate;

pub use error::{Result, ValidationError};
pub use validate::{
    AnswerValidator, ErrorKind, ValidationResult, DECIMAL_TOLERANCE, PERCENTAGE_TOLERANCE,
};

use std::collections::BTreeMap;

use mathlern_adaptive::{DifficultyZone, Strategy};
use mathlern_core::{Operation, Question, QuestionType};
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

// Confidence calculation constants
/// Sample size at which confidence plateaus
const CONFIDENCE_SAMPLE_SIZE_PLATEAU: f64 = 50.0;
/// Confidence level when 2+ patterns detected
const CONFIDENCE_HIGH_PATTERN: f64 = 0.7;
/// Confidence level when fewer than 2 patterns detected
const CONFIDENCE_LOW_PATTERN: f64 = 0.5;
/// Weight for sample size component in confidence calculation
const CONFIDENCE_SAMPLE_WEIGHT: f64 = 0.4;
/// Weight for pattern count component in confidence calculation
const CONFIDENCE_PATTERN_WEIGHT: f64 = 0.6;

// Pattern detection thresholds
/// Minimum answers for one operation before it is analyzed on its own
const PATTERN_MIN_RESPONSES_PER_OPERATION: usize = 5;
/// Failure rate (60%) at or above which an operation is flagged
const PATTERN_HIGH_FAILURE_THRESHOLD: f64 = 0.6;
/// Overall failure rate (50%) above which the session is too hard
const PATTERN_OVERALL_FAILURE_THRESHOLD: f64 = 0.5;
/// Overall success rate (85%) above which the session is too easy
const PATTERN_OVERALL_SUCCESS_THRESHOLD: f64 = 0.85;

/// Version of the proposal record format
const PROPOSAL_VERSION: &str = "0.1.0";

// Fallback constants
/// Fallback timestamp when formatting fails
const FALLBACK_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

/// One answered question, reduced to what the analyzer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseOutcome {
    pub question_id: String,
    /// RFC 3339 time the answer was recorded
    pub ts: String,
    pub topic: QuestionType,
    pub operation: Operation,
    pub difficulty: f64,
    pub is_correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
}

impl ResponseOutcome {
    #[must_use]
    pub fn from_validation(question: &Question, result: &ValidationResult) -> Self {
        Self {
            question_id: question.question_id.clone(),
            ts: iso8601_now(),
            topic: question.question_type,
            operation: question.operation,
            difficulty: question.difficulty_score,
            is_correct: result.is_correct,
            error_kind: result.error_kind,
            response_time_ms: None,
        }
    }

    #[must_use]
    pub fn with_response_time(mut self, millis: u64) -> Self {
        self.response_time_ms = Some(millis);
        self
    }
}

/// Evidence supporting a session adjustment proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Number of answers analyzed
    pub responses_analyzed: usize,
    pub success_rate: f64,
    pub average_difficulty: f64,
    /// Identified patterns that led to this proposal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<String>>,
}

/// Suggested change to the next session's target zone and strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAdjustmentProposal {
    /// Version of the proposal format
    pub version: String,
    /// Timestamp when the proposal was generated
    pub ts: String,
    /// Topic the analyzed answers belong to; `None` for mixed topics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<QuestionType>,
    pub suggested_zone: DifficultyZone,
    pub suggested_strategy: Strategy,
    /// Confidence in the proposal (0.0 to 1.0)
    pub confidence: f64,
    pub evidence: Evidence,
    /// Human-readable reasoning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Vec<String>>,
    #[serde(default)]
    pub status: ProposalStatus,
}

/// Lifecycle status of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    #[default]
    Proposed,
    Accepted,
    Rejected,
    Superseded,
}

/// Statistics aggregated from response outcomes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OutcomeStatistics {
    /// Total number of outcomes (successes + failures).
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
    pub total_difficulty: f64,
}

impl OutcomeStatistics {
    fn add(&mut self, outcome: &ResponseOutcome) {
        self.total += 1;
        if outcome.is_correct {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        if outcome.difficulty.is_finite() {
            self.total_difficulty += outcome.difficulty;
        }
    }

    /// Success rate (0.0 to 1.0).
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.successes as f64 / self.total as f64
        }
    }

    /// Failure rate (0.0 to 1.0).
    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        debug_assert!(
            self.successes + self.failures == self.total,
            "OutcomeStatistics totals are inconsistent"
        );
        if self.total == 0 {
            return 0.0;
        }
        1.0 - self.success_rate()
    }

    #[must_use]
    pub fn average_difficulty(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.total_difficulty / self.total as f64
        }
    }
}

/// Reviews answered questions and proposes session adjustments.
#[derive(Debug)]
pub struct SessionAnalyzer {
    /// Minimum number of answers required before proposing anything
    min_responses: usize,
    /// Minimum confidence threshold for proposals
    min_confidence: f64,
}

impl Default for SessionAnalyzer {
    fn default() -> Self {
        Self {
            min_responses: 10,
            min_confidence: 0.5,
        }
    }
}

impl SessionAnalyzer {
    #[must_use]
    pub fn new(min_responses: usize, min_confidence: f64) -> Self {
        Self {
            min_responses,
            min_confidence: min_confidence.clamp(0.0, 1.0),
        }
    }

    /// Aggregate outcomes by a grouping key (operation, topic, error kind).
    #[must_use]
    pub fn aggregate_outcomes(
        &self,
        outcomes: &[ResponseOutcome],
        key_fn: impl Fn(&ResponseOutcome) -> Option<String>,
    ) -> BTreeMap<String, OutcomeStatistics> {
        let mut stats: BTreeMap<String, OutcomeStatistics> = BTreeMap::new();
        for outcome in outcomes {
            if let Some(key) = key_fn(outcome) {
                stats.entry(key).or_default().add(outcome);
            }
        }
        stats
    }

    #[must_use]
    pub fn summarize_outcomes(&self, outcomes: &[ResponseOutcome]) -> OutcomeStatistics {
        let mut stats = OutcomeStatistics::default();
        for outcome in outcomes {
            stats.add(outcome);
        }
        stats
    }

    /// Heuristic patterns over the answers. Empty below `min_responses`.
    #[must_use]
    pub fn analyze_patterns(&self, outcomes: &[ResponseOutcome]) -> Vec<String> {
        let mut patterns = Vec::new();

        if outcomes.len() < self.min_responses {
            return patterns;
        }

        let by_operation =
            self.aggregate_outcomes(outcomes, |o| Some(o.operation.name().to_string()));
        for (operation, stats) in &by_operation {
            if stats.total >= PATTERN_MIN_RESPONSES_PER_OPERATION
                && stats.failure_rate() >= PATTERN_HIGH_FAILURE_THRESHOLD
            {
                patterns.push(format!(
                    "High failure rate ({:.1}%) for operation '{}'",
                    stats.failure_rate() * 100.0,
                    operation
                ));
            }
        }

        let overall = self.summarize_outcomes(outcomes);
        if overall.failure_rate() > PATTERN_OVERALL_FAILURE_THRESHOLD {
            patterns.push(format!(
                "Overall failure rate is high ({:.1}%)",
                overall.failure_rate() * 100.0
            ));
        } else if overall.success_rate() > PATTERN_OVERALL_SUCCESS_THRESHOLD {
            patterns.push(format!(
                "Overall success rate is high ({:.1}%)",
                overall.success_rate() * 100.0
            ));
        }

        patterns
    }

    /// Proposes a zone and strategy for the next session.
    ///
    /// Returns `None` with too few answers, no detected pattern, or a
    /// confidence below the threshold.
    #[must_use]
    pub fn propose_adjustment(
        &self,
        outcomes: &[ResponseOutcome],
    ) -> Option<SessionAdjustmentProposal> {
        if outcomes.len() < self.min_responses {
            return None;
        }

        let patterns = self.analyze_patterns(outcomes);
        if patterns.is_empty() {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let confidence = {
            let sample_confidence =
                (outcomes.len() as f64 / CONFIDENCE_SAMPLE_SIZE_PLATEAU).min(1.0);
            let pattern_confidence = if patterns.len() >= 2 {
                CONFIDENCE_HIGH_PATTERN
            } else {
                CONFIDENCE_LOW_PATTERN
            };
            (sample_confidence * CONFIDENCE_SAMPLE_WEIGHT
                + pattern_confidence * CONFIDENCE_PATTERN_WEIGHT)
                .clamp(0.0, 1.0)
        };

        if confidence < self.min_confidence {
            return None;
        }

        let overall = self.summarize_outcomes(outcomes);
        let mut reasoning = Vec::new();
        let (suggested_zone, suggested_strategy) =
            if overall.failure_rate() > PATTERN_OVERALL_FAILURE_THRESHOLD {
                reasoning.push("Ease off: most answers were wrong".to_string());
                (DifficultyZone::Comfort, Strategy::WarmUp)
            } else if overall.success_rate() > PATTERN_OVERALL_SUCCESS_THRESHOLD {
                reasoning.push("Raise the challenge: nearly every answer was right".to_string());
                (DifficultyZone::Struggle, Strategy::Push)
            } else {
                reasoning.push("Stay in the learning zone and practise weak operations".to_string());
                (DifficultyZone::Learning, Strategy::Steady)
            };

        let first = outcomes.first().map(|o| o.topic);
        let topic = first.filter(|t| outcomes.iter().all(|o| o.topic == *t));

        Some(SessionAdjustmentProposal {
            version: PROPOSAL_VERSION.to_string(),
            ts: iso8601_now(),
            topic,
            suggested_zone,
            suggested_strategy,
            confidence,
            evidence: Evidence {
                responses_analyzed: outcomes.len(),
                success_rate: overall.success_rate(),
                average_difficulty: overall.average_difficulty(),
                patterns: Some(patterns),
            },
            reasoning: Some(reasoning),
            status: ProposalStatus::Proposed,
        })
    }
}

fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| FALLBACK_TIMESTAMP.to_string())
}
