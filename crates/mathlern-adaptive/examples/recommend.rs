use std::env;
use std::io::{self, Read};

use mathlern_adaptive::{DifficultyMapper, DifficultyMapping, MasteryLevel, MasteryTracker};
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

#[derive(Serialize)]
struct RecommendationRecord {
    ts: String,
    topic: String,
    mastery: f64,
    level: MasteryLevel,
    mapping: DifficultyMapping,
    streak_adjusted: f64,
}

fn iso8601_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Reads an optional tracker snapshot from stdin and prints the
/// recommended difficulty for the topic given as first argument.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let topic = env::args().nth(1).unwrap_or_else(|| "arithmetic".to_string());

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let mut tracker = if input.trim().is_empty() {
        MasteryTracker::default()
    } else {
        MasteryTracker::load(serde_json::from_str(&input)?)?
    };

    let mapper = DifficultyMapper::new();
    let record = tracker.get_record(&topic).clone();
    let mapping = mapper.map(record.mastery_score, None);
    let streak_adjusted = mapper.adjust_for_streak(mapping.difficulty, record.streak, 0);

    let out = RecommendationRecord {
        ts: iso8601_now(),
        topic,
        mastery: record.mastery_score,
        level: record.level(),
        mapping,
        streak_adjusted,
    };

    serde_json::to_writer_pretty(io::stdout(), &out)?;
    println!();

    Ok(())
}
