//! Logging hooks, see the `telemetry` feature.

use mathlern_core::Question;

pub(crate) fn warn(message: &str) {
    #[cfg(feature = "telemetry")]
    tracing::warn!("{message}");
    #[cfg(not(feature = "telemetry"))]
    eprintln!("warning: {message}");
}

#[allow(unused_variables)]
pub(crate) fn generated(question: &Question) {
    #[cfg(feature = "telemetry")]
    tracing::debug!(
        id = %question.question_id,
        topic = %question.question_type,
        operation = %question.operation,
        difficulty = question.difficulty_score,
        "question generated"
    );
}
