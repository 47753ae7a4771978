use std::collections::BTreeMap;

use mathlern_adaptive::DifficultyMapper;
use mathlern_core::{GenerationError, Operation, Question, QuestionGenerator, QuestionType, Result};
use rand::RngCore;

use crate::{
    telemetry, AlgebraGenerator, ArithmeticGenerator, FractionsGenerator, GeometryGenerator,
    PercentagesGenerator, RatiosGenerator,
};

/// Generators keyed by topic slug.
pub struct GeneratorRegistry {
    generators: BTreeMap<&'static str, Box<dyn QuestionGenerator>>,
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("topics", &self.slugs())
            .finish()
    }
}

impl GeneratorRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generators: BTreeMap::new(),
        }
    }

    /// All six domain generators sharing one mapper.
    #[must_use]
    pub fn with_defaults(mapper: DifficultyMapper) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ArithmeticGenerator::new(mapper)));
        registry.register(Box::new(FractionsGenerator::new(mapper)));
        registry.register(Box::new(PercentagesGenerator::new(mapper)));
        registry.register(Box::new(AlgebraGenerator::new(mapper)));
        registry.register(Box::new(GeometryGenerator::new(mapper)));
        registry.register(Box::new(RatiosGenerator::new(mapper)));
        registry
    }

    /// Adds a generator under its topic slug, replacing any earlier one.
    pub fn register(&mut self, generator: Box<dyn QuestionGenerator>) {
        self.generators
            .insert(generator.question_type().slug(), generator);
    }

    pub fn get(&self, slug: &str) -> Result<&dyn QuestionGenerator> {
        self.generators
            .get(slug)
            .map(|g| &**g)
            .ok_or_else(|| GenerationError::UnknownTopic(slug.to_string()))
    }

    #[must_use]
    pub fn slugs(&self) -> Vec<&'static str> {
        self.generators.keys().copied().collect()
    }

    pub fn topics(&self) -> impl Iterator<Item = (QuestionType, &'static [Operation])> + '_ {
        self.generators
            .values()
            .map(|g| (g.question_type(), g.supported_operations()))
    }

    pub fn generate(
        &self,
        slug: &str,
        difficulty: f64,
        operation: Option<Operation>,
        rng: &mut dyn RngCore,
    ) -> Result<Question> {
        let question = self.get(slug)?.generate(difficulty, operation, rng)?;
        telemetry::generated(&question);
        Ok(question)
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::with_defaults(DifficultyMapper::new())
    }
}
