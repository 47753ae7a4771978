#![warn(clippy::unwrap_used, clippy::expect_used)]
//! Procedural question generators for six math domains, a slug-keyed
//! registry and the [`PracticeSession`] loop tying them to the adaptive
//! crate.
//!
//! Every generator samples its parameters from difficulty-scaled ranges,
//! computes the answer exactly from those parameters and builds
//! distractors from typical misconceptions.

mod algebra;
mod arithmetic;
mod common;
mod distractor;
mod fractions;
mod geometry;
mod percentages;
mod ratios;
mod registry;
mod session;
mod telemetry;

pub use algebra::{roots_text, AlgebraGenerator};
pub use arithmetic::ArithmeticGenerator;
pub use distractor::{Distractors, DISTRACTOR_COUNT};
pub use fractions::FractionsGenerator;
pub use geometry::GeometryGenerator;
pub use percentages::PercentagesGenerator;
pub use ratios::RatiosGenerator;
pub use registry::GeneratorRegistry;
pub use session::PracticeSession;
