//! Simulates a short practice run, validates typed answers and prints the
//! analyzer's proposal for the next session.
//!
//! Run with: cargo run -p mathlern-feedback --example session_review

use std::error::Error;

use mathlern_core::Operation;
use mathlern_feedback::{AnswerValidator, ResponseOutcome, SessionAnalyzer};
use mathlern_generators::GeneratorRegistry;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn main() -> Result<(), Box<dyn Error>> {
    let registry = GeneratorRegistry::default();
    let validator = AnswerValidator::default();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    // A learner who is fine with fractions addition but mostly fails division.
    let mut outcomes = Vec::new();
    for i in 0..24 {
        let (operation, accuracy) = if i % 2 == 0 {
            (Operation::Addition, 0.9)
        } else {
            (Operation::Division, 0.2)
        };
        let question = registry.generate("fractions", 0.5, Some(operation), &mut rng)?;
        let typed = if rng.gen_bool(accuracy) {
            question.correct_answer.to_string()
        } else {
            question
                .distractors
                .first()
                .map_or_else(|| "0".to_string(), ToString::to_string)
        };
        let result = validator.validate(&typed, &question);
        println!(
            "{:<40} {:>8} -> {}",
            question.expression, typed, result.feedback
        );
        outcomes.push(ResponseOutcome::from_validation(&question, &result));
    }

    let analyzer = SessionAnalyzer::default();
    println!();
    for (operation, stats) in analyzer.aggregate_outcomes(&outcomes, |o| {
        Some(o.operation.name().to_string())
    }) {
        println!(
            "{operation}: {}/{} correct ({:.1}%)",
            stats.successes,
            stats.total,
            stats.success_rate() * 100.0
        );
    }

    match analyzer.propose_adjustment(&outcomes) {
        Some(proposal) => println!("\n{}", serde_json::to_string_pretty(&proposal)?),
        None => println!("\nNo adjustment proposed."),
    }
    Ok(())
}
