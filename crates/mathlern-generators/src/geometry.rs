use mathlern_adaptive::DifficultyMapper;
use mathlern_core::{
    param_i64, param_str, AnswerValue, BaseRanges, GenerationError, Operation, Parameters,
    Question, QuestionGenerator, QuestionParts, QuestionType, Result,
};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde_json::json;

use crate::common::{coin, isqrt, params, RangeSet, Scaled};
use crate::distractor::{Distractors, DISTRACTOR_COUNT};

const OPERATIONS: &[Operation] = &[
    Operation::Area,
    Operation::Perimeter,
    Operation::Circumference,
    Operation::Volume,
    Operation::SurfaceArea,
    Operation::Pythagorean,
];

/// Primitive triples; questions scale them by a multiplier.
const PYTHAGOREAN_TRIPLES: &[(i64, i64, i64)] = &[(3, 4, 5), (5, 12, 13), (8, 15, 17), (7, 24, 25)];

/// π is taken as 3.14 and all circle arithmetic runs in hundredths.
const PI_HUNDREDTHS: i64 = 314;

/// Areas, perimeters, circles, solids and right triangles.
#[derive(Debug, Clone)]
pub struct GeometryGenerator {
    ranges: RangeSet,
}

impl GeometryGenerator {
    #[must_use]
    pub fn new(mapper: DifficultyMapper) -> Self {
        Self {
            ranges: RangeSet::new(
                mapper,
                &[
                    ("side", 1, 20),
                    ("height", 1, 15),
                    ("radius", 1, 10),
                    ("multiplier", 1, 5),
                ],
            ),
        }
    }

    pub fn with_base_ranges(mut self, ranges: BaseRanges) -> Result<Self> {
        self.ranges.merge(ranges)?;
        Ok(self)
    }
}

fn shapes_for(operation: Operation, difficulty: f64) -> &'static [&'static str] {
    match operation {
        Operation::Area if difficulty < 0.3 => &["square", "rectangle"],
        Operation::Area if difficulty < 0.6 => &["square", "rectangle", "triangle", "parallelogram"],
        Operation::Area => &["triangle", "parallelogram", "trapezoid", "circle"],
        Operation::Perimeter if difficulty < 0.4 => &["square", "rectangle"],
        Operation::Perimeter => &["rectangle", "triangle"],
        Operation::Volume if difficulty < 0.5 => &["cube", "prism"],
        Operation::Volume => &["prism", "cylinder"],
        Operation::SurfaceArea => &["cube", "prism"],
        Operation::Pythagorean => &["right_triangle"],
        _ => &["circle"],
    }
}

/// A strictly positive length.
fn length(ranges: &Scaled, param: &str, rng: &mut dyn RngCore) -> Result<i64> {
    Ok(ranges.sample_nonzero(param, rng)?.abs())
}

/// `3.14 × n` as a two-place decimal.
#[allow(clippy::cast_precision_loss)]
fn pi_times(n: i64) -> AnswerValue {
    AnswerValue::decimal((PI_HUNDREDTHS * n) as f64 / 100.0)
}

#[allow(clippy::cast_precision_loss)]
fn pi_f64(n: i64) -> f64 {
    (PI_HUNDREDTHS * n) as f64 / 100.0
}

fn halve(doubled: i64) -> Result<AnswerValue> {
    if doubled % 2 != 0 {
        return Err(GenerationError::Unsatisfiable(format!(
            "{doubled} / 2 is not a whole number"
        )));
    }
    Ok(AnswerValue::Integer(doubled / 2))
}

impl QuestionGenerator for GeometryGenerator {
    fn question_type(&self) -> QuestionType {
        QuestionType::Geometry
    }

    fn supported_operations(&self) -> &'static [Operation] {
        OPERATIONS
    }

    #[allow(clippy::too_many_lines, clippy::cast_precision_loss)]
    fn generate(
        &self,
        difficulty: f64,
        operation: Option<Operation>,
        rng: &mut dyn RngCore,
    ) -> Result<Question> {
        let difficulty = mathlern_core::clamp_unit(difficulty);
        let operation = self.pick_operation(operation, rng)?;
        let ranges = self.ranges.scaled(difficulty);
        let shape = shapes_for(operation, difficulty)
            .choose(rng)
            .copied()
            .unwrap_or("square");

        // Each arm yields the expression, its parameters and the numbers a
        // learner typically ends up with by mixing up formulas.
        let (expression, mut parameters, slips): (String, Parameters, Vec<f64>) =
            match (operation, shape) {
                (Operation::Area | Operation::Perimeter | Operation::Volume | Operation::SurfaceArea, "square" | "cube") => {
                    let s = length(&ranges, "side", rng)?;
                    let sf = s as f64;
                    let (what, slips) = match operation {
                        Operation::Area => ("area", vec![4.0 * sf, 2.0 * sf]),
                        Operation::Perimeter => ("perimeter", vec![sf * sf, 2.0 * sf]),
                        Operation::Volume => ("volume", vec![6.0 * sf * sf, 3.0 * sf]),
                        _ => ("surface area", vec![sf * sf * sf, 4.0 * sf * sf]),
                    };
                    (
                        format!("Find the {what} of a {shape} with side {s} units."),
                        params([("shape", json!(shape)), ("side", json!(s))]),
                        slips,
                    )
                }
                (Operation::Area | Operation::Perimeter, "rectangle") => {
                    let l = length(&ranges, "side", rng)?;
                    let mut w = length(&ranges, "side", rng)?;
                    if w == l {
                        w += 1;
                    }
                    let (lf, wf) = (l as f64, w as f64);
                    let (what, slips) = if operation == Operation::Area {
                        ("area", vec![2.0 * (lf + wf), lf + wf])
                    } else {
                        ("perimeter", vec![lf * wf, lf + wf])
                    };
                    (
                        format!("Find the {what} of a rectangle with length {l} and width {w} units."),
                        params([("shape", json!(shape)), ("length", json!(l)), ("width", json!(w))]),
                        slips,
                    )
                }
                (Operation::Area, "triangle" | "parallelogram") => {
                    let mut base = length(&ranges, "side", rng)?;
                    if shape == "triangle" && base % 2 != 0 {
                        base += 1;
                    }
                    let height = length(&ranges, "height", rng)?;
                    let (bf, hf) = (base as f64, height as f64);
                    let slips = if shape == "triangle" {
                        // forgot the half
                        vec![bf * hf, bf + hf]
                    } else {
                        vec![bf * hf / 2.0, 2.0 * (bf + hf)]
                    };
                    (
                        format!("Find the area of a {shape} with base {base} and height {height} units."),
                        params([("shape", json!(shape)), ("base", json!(base)), ("height", json!(height))]),
                        slips,
                    )
                }
                (Operation::Area, "trapezoid") => {
                    let base = length(&ranges, "side", rng)?;
                    let mut top = length(&ranges, "side", rng)?;
                    if (base + top) % 2 != 0 {
                        top += 1;
                    }
                    let height = length(&ranges, "height", rng)?;
                    let sum = (base + top) as f64;
                    let hf = height as f64;
                    (
                        format!(
                            "Find the area of a trapezoid with parallel sides {base} and {top} and height {height} units."
                        ),
                        params([
                            ("shape", json!(shape)),
                            ("base", json!(base)),
                            ("top", json!(top)),
                            ("height", json!(height)),
                        ]),
                        vec![sum * hf, (base as f64) * hf, sum + hf],
                    )
                }
                (Operation::Area | Operation::Circumference, "circle") => {
                    let r = length(&ranges, "radius", rng)?;
                    let (what, slips) = if operation == Operation::Area {
                        // diameter in place of radius, circumference, r not squared
                        ("area", vec![pi_f64(4 * r * r), pi_f64(2 * r), pi_f64(r)])
                    } else {
                        ("circumference", vec![pi_f64(r), pi_f64(r * r), pi_f64(4 * r)])
                    };
                    (
                        format!("Find the {what} of a circle with radius {r} units. (Use π = 3.14)"),
                        params([("shape", json!(shape)), ("radius", json!(r))]),
                        slips,
                    )
                }
                (Operation::Perimeter, "triangle") => {
                    let a = length(&ranges, "side", rng)?;
                    let b = length(&ranges, "side", rng)?;
                    let c = rng.gen_range((a - b).abs() + 1..=(a + b - 1).max((a - b).abs() + 1));
                    let (af, bf, cf) = (a as f64, b as f64, c as f64);
                    (
                        format!("Find the perimeter of a triangle with sides {a}, {b} and {c} units."),
                        params([
                            ("shape", json!(shape)),
                            ("side_a", json!(a)),
                            ("side_b", json!(b)),
                            ("side_c", json!(c)),
                        ]),
                        vec![af * bf / 2.0, af + bf, 2.0 * (af + bf + cf)],
                    )
                }
                (Operation::Volume | Operation::SurfaceArea, "prism") => {
                    let l = length(&ranges, "side", rng)?;
                    let w = length(&ranges, "side", rng)?;
                    let h = length(&ranges, "height", rng)?;
                    let (lf, wf, hf) = (l as f64, w as f64, h as f64);
                    let (what, slips) = if operation == Operation::Volume {
                        ("volume", vec![2.0 * (lf * wf + lf * hf + wf * hf), lf * wf, lf + wf + hf])
                    } else {
                        // one face of each pair only
                        ("surface area", vec![lf * wf + lf * hf + wf * hf, lf * wf * hf, 2.0 * lf * wf])
                    };
                    (
                        format!(
                            "Find the {what} of a rectangular prism with length {l}, width {w} and height {h} units."
                        ),
                        params([
                            ("shape", json!(shape)),
                            ("length", json!(l)),
                            ("width", json!(w)),
                            ("height", json!(h)),
                        ]),
                        slips,
                    )
                }
                (Operation::Volume, "cylinder") => {
                    let r = length(&ranges, "radius", rng)?;
                    let h = length(&ranges, "height", rng)?;
                    (
                        format!(
                            "Find the volume of a cylinder with radius {r} and height {h} units. (Use π = 3.14)"
                        ),
                        params([("shape", json!(shape)), ("radius", json!(r)), ("height", json!(h))]),
                        vec![pi_f64(4 * r * r * h), pi_f64(r * h), pi_f64(2 * r * h)],
                    )
                }
                (Operation::Pythagorean, _) => {
                    let available = if difficulty < 0.4 {
                        1
                    } else if difficulty < 0.7 {
                        2
                    } else {
                        PYTHAGOREAN_TRIPLES.len()
                    };
                    let (ta, tb, tc) = PYTHAGOREAN_TRIPLES[..available]
                        .choose(rng)
                        .copied()
                        .unwrap_or((3, 4, 5));
                    let k = length(&ranges, "multiplier", rng)?;
                    let (a, b, c) = (ta * k, tb * k, tc * k);
                    let (af, bf, cf) = (a as f64, b as f64, c as f64);
                    if difficulty >= 0.5 && coin(rng) {
                        (
                            format!(
                                "A right triangle has hypotenuse {c} and one leg {a}. Find the other leg."
                            ),
                            params([
                                ("shape", json!("right_triangle")),
                                ("unknown", json!("leg")),
                                ("leg", json!(a)),
                                ("hypotenuse", json!(c)),
                            ]),
                            // added the squares, or subtracted the sides
                            vec![cf - af, cf + af, (cf * cf + af * af).sqrt().round()],
                        )
                    } else {
                        (
                            format!("A right triangle has legs {a} and {b}. Find the hypotenuse."),
                            params([
                                ("shape", json!("right_triangle")),
                                ("unknown", json!("hypotenuse")),
                                ("leg_a", json!(a)),
                                ("leg_b", json!(b)),
                            ]),
                            // leg sum
                            vec![af + bf, cf + 1.0, cf - 1.0],
                        )
                    }
                }
                (operation, shape) => {
                    return Err(GenerationError::Unsatisfiable(format!(
                        "no {operation} question for shape '{shape}'"
                    )))
                }
            };
        parameters.insert("operation".into(), json!(operation.name()));
        let answer = self.compute_answer(operation, &parameters)?;

        let mut distractors = Distractors::new(&answer);
        for slip in slips {
            distractors.push_number(slip);
        }
        distractors.push_numeric_slips();

        let hint = match operation {
            Operation::Area => "Area is measured in square units.",
            Operation::Perimeter => "Add the lengths of all sides.",
            Operation::Circumference => "C = 2πr",
            Operation::Volume => "Volume is base area times height.",
            Operation::SurfaceArea => "Add the areas of all faces.",
            _ => "a² + b² = c²",
        };
        let parts = QuestionParts {
            question_type: QuestionType::Geometry,
            operation,
            expression,
            correct_answer: answer,
            distractors: distractors.finish(rng),
            parameters,
            difficulty,
            hint: Some(hint.into()),
            explanation: None,
            steps: None,
        };
        Question::assemble(parts, DISTRACTOR_COUNT, rng)
    }

    fn compute_answer(&self, operation: Operation, parameters: &Parameters) -> Result<AnswerValue> {
        let get = |key: &str| param_i64(parameters, key);
        let shape = param_str(parameters, "shape")?;
        let answer = match (operation, shape) {
            (Operation::Area, "square") => AnswerValue::Integer(get("side")?.pow(2)),
            (Operation::Area, "rectangle") => AnswerValue::Integer(get("length")? * get("width")?),
            (Operation::Area, "triangle") => halve(get("base")? * get("height")?)?,
            (Operation::Area, "parallelogram") => AnswerValue::Integer(get("base")? * get("height")?),
            (Operation::Area, "trapezoid") => halve((get("base")? + get("top")?) * get("height")?)?,
            (Operation::Area, "circle") => pi_times(get("radius")?.pow(2)),
            (Operation::Perimeter, "square") => AnswerValue::Integer(4 * get("side")?),
            (Operation::Perimeter, "rectangle") => {
                AnswerValue::Integer(2 * (get("length")? + get("width")?))
            }
            (Operation::Perimeter, "triangle") => {
                let (a, b, c) = (get("side_a")?, get("side_b")?, get("side_c")?);
                if a + b <= c || a + c <= b || b + c <= a {
                    return Err(GenerationError::Unsatisfiable(format!(
                        "sides {a}, {b}, {c} do not form a triangle"
                    )));
                }
                AnswerValue::Integer(a + b + c)
            }
            (Operation::Circumference, "circle") => pi_times(2 * get("radius")?),
            (Operation::Volume, "cube") => AnswerValue::Integer(get("side")?.pow(3)),
            (Operation::Volume, "prism") => {
                AnswerValue::Integer(get("length")? * get("width")? * get("height")?)
            }
            (Operation::Volume, "cylinder") => pi_times(get("radius")?.pow(2) * get("height")?),
            (Operation::SurfaceArea, "cube") => AnswerValue::Integer(6 * get("side")?.pow(2)),
            (Operation::SurfaceArea, "prism") => {
                let (l, w, h) = (get("length")?, get("width")?, get("height")?);
                AnswerValue::Integer(2 * (l * w + l * h + w * h))
            }
            (Operation::Pythagorean, "right_triangle") => {
                let squared = match param_str(parameters, "unknown")? {
                    "hypotenuse" => get("leg_a")?.pow(2) + get("leg_b")?.pow(2),
                    _ => get("hypotenuse")?.pow(2) - get("leg")?.pow(2),
                };
                let side = isqrt(squared).ok_or_else(|| {
                    GenerationError::Unsatisfiable(format!("{squared} is not a perfect square"))
                })?;
                AnswerValue::Integer(side)
            }
            (
                Operation::Area
                | Operation::Perimeter
                | Operation::Circumference
                | Operation::Volume
                | Operation::SurfaceArea
                | Operation::Pythagorean,
                other,
            ) => {
                return Err(GenerationError::MissingParameter(format!(
                    "shape '{other}' for {operation}"
                )))
            }
            (other, _) => {
                return Err(GenerationError::UnsupportedOperation {
                    question_type: QuestionType::Geometry,
                    operation: other,
                })
            }
        };
        Ok(answer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn generator() -> GeometryGenerator {
        GeometryGenerator::new(DifficultyMapper::new())
    }

    #[test]
    fn every_operation_verifies() {
        let gen = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(41);
        for &operation in OPERATIONS {
            for difficulty in [0.1, 0.5, 0.9] {
                for _ in 0..8 {
                    let q = gen.generate(difficulty, Some(operation), &mut rng).unwrap();
                    assert!(gen.verify(&q).unwrap(), "{}", q.expression);
                    assert_eq!(q.distractors.len(), DISTRACTOR_COUNT);
                    assert!(!q.distractors.contains(&q.correct_answer));
                }
            }
        }
    }

    #[test]
    fn circles_use_two_place_pi() {
        let gen = generator();
        let p = params([("shape", json!("circle")), ("radius", json!(5))]);
        assert_eq!(gen.compute_answer(Operation::Area, &p).unwrap(), AnswerValue::Decimal(78.5));
        assert_eq!(
            gen.compute_answer(Operation::Circumference, &p).unwrap(),
            AnswerValue::Decimal(31.4)
        );
        let p = params([("shape", json!("cylinder")), ("radius", json!(2)), ("height", json!(10))]);
        assert_eq!(gen.compute_answer(Operation::Volume, &p).unwrap(), AnswerValue::Decimal(125.6));
    }

    #[test]
    fn halved_areas_stay_whole() {
        let gen = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..40 {
            let q = gen.generate(0.8, Some(Operation::Area), &mut rng).unwrap();
            let shape = q.parameters["shape"].as_str().unwrap();
            if shape == "circle" {
                assert!(matches!(q.correct_answer, AnswerValue::Decimal(_)));
            } else {
                assert!(matches!(q.correct_answer, AnswerValue::Integer(_)), "{shape}");
            }
        }
    }

    #[test]
    fn pythagorean_known_values() {
        let gen = generator();
        let p = params([
            ("shape", json!("right_triangle")),
            ("unknown", json!("hypotenuse")),
            ("leg_a", json!(6)),
            ("leg_b", json!(8)),
        ]);
        assert_eq!(gen.compute_answer(Operation::Pythagorean, &p).unwrap(), AnswerValue::Integer(10));
        let p = params([
            ("shape", json!("right_triangle")),
            ("unknown", json!("leg")),
            ("leg", json!(5)),
            ("hypotenuse", json!(13)),
        ]);
        assert_eq!(gen.compute_answer(Operation::Pythagorean, &p).unwrap(), AnswerValue::Integer(12));
    }

    #[test]
    fn impossible_triangle_is_rejected() {
        let p = params([
            ("shape", json!("triangle")),
            ("side_a", json!(1)),
            ("side_b", json!(2)),
            ("side_c", json!(5)),
        ]);
        assert!(matches!(
            generator().compute_answer(Operation::Perimeter, &p),
            Err(GenerationError::Unsatisfiable(_))
        ));
    }

    #[test]
    fn shape_must_fit_operation() {
        let p = params([("shape", json!("circle")), ("radius", json!(2))]);
        assert!(generator().compute_answer(Operation::SurfaceArea, &p).is_err());
        assert!(matches!(
            generator().compute_answer(Operation::Addition, &p),
            Err(GenerationError::UnsupportedOperation { .. })
        ));
    }
}
