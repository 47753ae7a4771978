//! CLI for mathlern.
//!
//! Generates questions, runs simulated learners through the adaptive loop,
//! checks typed answers and manages the persisted mastery state. Results go
//! to stdout as JSON, logs to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mathlern_adaptive::{
    AdaptiveScheduler, DifficultyMapper, DifficultyZone, MasteryRecord, MasteryTracker, Strategy,
    TopicSummary, TrackerSnapshot, DEFAULT_ALPHA,
};
use mathlern_core::{Operation, Question, QuestionType};
use mathlern_feedback::{
    AnswerValidator, ResponseOutcome, SessionAdjustmentProposal, SessionAnalyzer,
};
use mathlern_generators::{GeneratorRegistry, PracticeSession};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_STATE_FILE: &str = "data/mathlern.mastery.json";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate questions as JSON lines
    Generate {
        /// Topic slug (arithmetic, fractions, percentages, algebra, geometry, ratios)
        #[arg(long)]
        topic: QuestionType,

        /// Difficulty in [0, 1]
        #[arg(long, default_value = "0.5")]
        difficulty: f64,

        /// Operation to use; random supported one when omitted
        #[arg(long)]
        operation: Option<Operation>,

        /// Number of questions
        #[arg(long, default_value = "1")]
        count: u32,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
    /// List topics and their operations
    Topics,
    /// Run a simulated learner through an adaptive session
    Simulate {
        #[arg(long)]
        topic: QuestionType,

        /// Number of questions to answer
        #[arg(long, default_value = "20")]
        questions: u32,

        /// Probability that the simulated learner answers correctly
        #[arg(long, default_value = "0.7")]
        accuracy: f64,

        /// Scheduling strategy (warm_up, steady, push)
        #[arg(long, default_value = "warm_up")]
        strategy: Strategy,

        /// Target zone (comfort, learning, struggle)
        #[arg(long, default_value = "learning")]
        zone: DifficultyZone,

        /// Smoothing constant for a fresh tracker
        #[arg(long, default_value_t = DEFAULT_ALPHA)]
        alpha: f64,

        #[arg(long)]
        seed: Option<u64>,

        /// Path to the mastery state file
        #[arg(long, default_value = DEFAULT_STATE_FILE)]
        state_file: PathBuf,
    },
    /// Validate an answer against a question JSON file
    Check {
        /// Question as printed by `generate`
        #[arg(long)]
        question: PathBuf,

        /// Answer as the learner typed it
        #[arg(long)]
        answer: String,
    },
    /// Inspect or edit the mastery state file
    Mastery {
        #[command(subcommand)]
        action: MasteryAction,
    },
}

#[derive(Subcommand)]
enum MasteryAction {
    /// Print records, or one topic's summary and records
    Show {
        #[arg(long)]
        topic: Option<String>,

        #[arg(long, default_value = DEFAULT_STATE_FILE)]
        state_file: PathBuf,
    },
    /// Drop one topic (with its sub-topics) or everything
    Reset {
        #[arg(long)]
        topic: Option<String>,

        #[arg(long, default_value = DEFAULT_STATE_FILE)]
        state_file: PathBuf,
    },
}

#[derive(Serialize)]
struct SimulationStep<'a> {
    step: u32,
    question_id: &'a str,
    operation: Operation,
    difficulty: f64,
    expression: &'a str,
    answer: &'a str,
    is_correct: bool,
    feedback: &'a str,
    mastery: f64,
    streak: u32,
}

#[derive(Serialize)]
struct SimulationSummary {
    summary: TopicSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    proposal: Option<SessionAdjustmentProposal>,
}

#[derive(Serialize)]
struct TopicListing {
    topic: QuestionType,
    operations: &'static [Operation],
}

#[derive(Serialize)]
struct TopicReport<'a> {
    summary: TopicSummary,
    records: Vec<&'a MasteryRecord>,
}

fn load_tracker(path: &Path, alpha: f64) -> Result<MasteryTracker> {
    if !path.exists() {
        return MasteryTracker::new(alpha).context("Invalid smoothing constant");
    }
    let file = File::open(path)
        .with_context(|| format!("Failed to open state file {}", path.display()))?;
    let snapshot: TrackerSnapshot = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse state file {}", path.display()))?;
    MasteryTracker::from_snapshot(snapshot).context("Invalid state file")
}

fn save_tracker(tracker: &MasteryTracker, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create state file {}", path.display()))?;
    serde_json::to_writer_pretty(file, &tracker.snapshot())?;
    debug!(path = %path.display(), "state saved");
    Ok(())
}

fn make_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn print_line(value: &impl Serialize) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn generate(
    topic: QuestionType,
    difficulty: f64,
    operation: Option<Operation>,
    count: u32,
    seed: Option<u64>,
) -> Result<()> {
    if !(0.0..=1.0).contains(&difficulty) {
        anyhow::bail!("Difficulty must lie in [0, 1], got {difficulty}");
    }
    let registry = GeneratorRegistry::default();
    let mut rng = make_rng(seed);
    for _ in 0..count {
        let question = registry
            .generate(topic.slug(), difficulty, operation, &mut rng)
            .with_context(|| format!("Failed to generate a {topic} question"))?;
        print_line(&question)?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn simulate(
    topic: QuestionType,
    questions: u32,
    accuracy: f64,
    strategy: Strategy,
    zone: DifficultyZone,
    alpha: f64,
    seed: Option<u64>,
    state_file: &Path,
) -> Result<()> {
    if !(0.0..=1.0).contains(&accuracy) {
        anyhow::bail!("Accuracy must lie in [0, 1], got {accuracy}");
    }
    let tracker = load_tracker(state_file, alpha)?;
    let mut session =
        PracticeSession::new(tracker, AdaptiveScheduler::new(strategy), DifficultyMapper::new())
            .with_target_zone(zone);
    let validator = AnswerValidator::default();
    let mut rng = make_rng(seed);
    let mut outcomes = Vec::with_capacity(questions as usize);
    let slug = topic.slug();

    for step in 1..=questions {
        let question = session
            .next_question(slug, &mut rng)
            .with_context(|| format!("Failed to generate question {step}"))?;
        let typed = simulated_answer(&question, accuracy, &mut rng);
        let result = validator.validate(&typed, &question);
        let record = session.submit(slug, &question, result.is_correct);
        outcomes.push(ResponseOutcome::from_validation(&question, &result));

        print_line(&SimulationStep {
            step,
            question_id: &question.question_id,
            operation: question.operation,
            difficulty: question.difficulty_score,
            expression: &question.expression,
            answer: &typed,
            is_correct: result.is_correct,
            feedback: &result.feedback,
            mastery: record.mastery_score,
            streak: record.streak,
        })?;
    }

    let tracker = session.into_tracker();
    save_tracker(&tracker, state_file).context("Failed to save state")?;
    info!(topic = slug, questions, "simulation finished");

    print_line(&SimulationSummary {
        summary: tracker.topic_summary(slug),
        proposal: SessionAnalyzer::default().propose_adjustment(&outcomes),
    })
}

/// Correct answer with probability `accuracy`, otherwise a distractor.
fn simulated_answer(question: &Question, accuracy: f64, rng: &mut ChaCha8Rng) -> String {
    if rng.gen_bool(accuracy) {
        return question.correct_answer.to_string();
    }
    if question.distractors.is_empty() {
        return String::new();
    }
    let pick = rng.gen_range(0..question.distractors.len());
    question.distractors[pick].to_string()
}

fn check(question: &Path, answer: &str) -> Result<()> {
    let file = File::open(question)
        .with_context(|| format!("Failed to open question file {}", question.display()))?;
    let question: Question = serde_json::from_reader(BufReader::new(file))
        .context("Question file is not a valid question record")?;
    let result = AnswerValidator::default().validate(answer, &question);
    print_line(&result)
}

fn mastery(action: MasteryAction) -> Result<()> {
    match action {
        MasteryAction::Show { topic, state_file } => {
            let tracker = load_tracker(&state_file, DEFAULT_ALPHA)?;
            match topic {
                Some(topic) => {
                    let records = tracker
                        .records()
                        .filter(|(_, r)| r.topic_id == topic)
                        .map(|(_, r)| r)
                        .collect();
                    print_line(&TopicReport {
                        summary: tracker.topic_summary(&topic),
                        records,
                    })
                }
                None => print_line(&tracker.snapshot()),
            }
        }
        MasteryAction::Reset { topic, state_file } => {
            let mut tracker = load_tracker(&state_file, DEFAULT_ALPHA)?;
            match topic {
                Some(topic) => {
                    let keys: Vec<String> = tracker
                        .records()
                        .filter(|(_, r)| r.topic_id == topic)
                        .map(|(k, _)| k.to_string())
                        .collect();
                    for key in &keys {
                        tracker.reset(key);
                    }
                    info!(topic = %topic, removed = keys.len(), "topic reset");
                }
                None => tracker.reset_all(),
            }
            save_tracker(&tracker, &state_file).context("Failed to save state")
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            topic,
            difficulty,
            operation,
            count,
            seed,
        } => generate(topic, difficulty, operation, count, seed),
        Commands::Topics => {
            let registry = GeneratorRegistry::default();
            for (topic, operations) in registry.topics() {
                print_line(&TopicListing { topic, operations })?;
            }
            Ok(())
        }
        Commands::Simulate {
            topic,
            questions,
            accuracy,
            strategy,
            zone,
            alpha,
            seed,
            state_file,
        } => simulate(
            topic,
            questions,
            accuracy,
            strategy,
            zone,
            alpha,
            seed,
            &state_file,
        ),
        Commands::Check { question, answer } => check(&question, &answer),
        Commands::Mastery { action } => mastery(action),
    }
}
