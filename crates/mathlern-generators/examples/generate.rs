use std::env;

use mathlern_generators::GeneratorRegistry;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Prints one question per topic at the difficulty given as first argument
/// (default 0.5), seeded for reproducible output.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let difficulty = match env::args().nth(1) {
        Some(arg) => arg.parse::<f64>()?,
        None => 0.5,
    };
    let registry = GeneratorRegistry::default();
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    for slug in registry.slugs() {
        let question = registry.generate(slug, difficulty, None, &mut rng)?;
        println!("{}", serde_json::to_string(&question)?);
    }
    Ok(())
}
