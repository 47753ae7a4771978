//! Logging hooks. With the `telemetry` feature events go through
//! `tracing`; without it only warnings are printed to stderr.

pub(crate) fn warn(message: &str) {
    #[cfg(feature = "telemetry")]
    tracing::warn!("{message}");
    #[cfg(not(feature = "telemetry"))]
    eprintln!("warning: {message}");
}

#[allow(unused_variables)]
pub(crate) fn mastery_updated(topic: &str, old: f64, new: f64, streak: u32) {
    #[cfg(feature = "telemetry")]
    tracing::debug!(topic, old, new, streak, "mastery updated");
}

#[allow(unused_variables)]
pub(crate) fn scheduled(strategy: &str, question: u32, base: f64, next: f64) {
    #[cfg(feature = "telemetry")]
    tracing::debug!(strategy, question, base, next, "next difficulty scheduled");
}
