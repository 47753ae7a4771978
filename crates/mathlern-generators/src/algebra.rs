use mathlern_adaptive::DifficultyMapper;
use mathlern_core::{
    param_i64, param_str, AnswerValue, BaseRanges, Fraction, GenerationError, Operation,
    Parameters, Question, QuestionGenerator, QuestionParts, QuestionType, Result,
};
use rand::seq::SliceRandom;
use rand::RngCore;
use serde_json::json;

use crate::common::{coefficient, coin, isqrt, params, signed_term, RangeSet, MAX_RESAMPLES};
use crate::distractor::{Distractors, DISTRACTOR_COUNT};

const OPERATIONS: &[Operation] = &[Operation::Linear, Operation::Quadratic];

/// Solutions may be negative from this difficulty on.
const NEGATIVE_SOLUTIONS_FROM: f64 = 0.5;

/// Linear equations in one unknown and monic quadratics with integer roots.
#[derive(Debug, Clone)]
pub struct AlgebraGenerator {
    ranges: RangeSet,
}

impl AlgebraGenerator {
    #[must_use]
    pub fn new(mapper: DifficultyMapper) -> Self {
        Self {
            ranges: RangeSet::new(
                mapper,
                &[
                    ("solution", 1, 20),
                    ("coefficient", 2, 12),
                    ("constant", 1, 50),
                    ("root", 1, 12),
                ],
            ),
        }
    }

    pub fn with_base_ranges(mut self, ranges: BaseRanges) -> Result<Self> {
        self.ranges.merge(ranges)?;
        Ok(self)
    }

    fn linear(&self, difficulty: f64, rng: &mut dyn RngCore) -> Result<QuestionParts> {
        let ranges = self.ranges.scaled(difficulty);
        let mut x = ranges.sample("solution", rng)?;
        if difficulty >= NEGATIVE_SOLUTIONS_FROM && coin(rng) {
            x = -x;
        }
        let a = ranges.sample_nonzero("coefficient", rng)?;
        let b = ranges.sample("constant", rng)?;

        // Each form also yields the result of its typical misstep.
        let (form, expression, parameters, misstep) = if difficulty < 0.25 {
            let form = ["add", "sub", "mul", "div"]
                .choose(rng)
                .copied()
                .unwrap_or("add");
            match form {
                "add" => (
                    form,
                    format!("x + {b} = {}", x + b),
                    params([("a", json!(b)), ("b", json!(x + b))]),
                    x + 2 * b,
                ),
                "sub" => (
                    form,
                    format!("x - {b} = {}", x - b),
                    params([("a", json!(b)), ("b", json!(x - b))]),
                    x - 2 * b,
                ),
                "mul" => (
                    form,
                    format!("{a}x = {}", a * x),
                    params([("a", json!(a)), ("b", json!(a * x))]),
                    a * x - a,
                ),
                _ => {
                    // x ÷ a = q, so x is a multiple of a
                    let q = x;
                    x = a * q;
                    (
                        form,
                        format!("x ÷ {a} = {q}"),
                        params([("a", json!(a)), ("b", json!(q))]),
                        q / a,
                    )
                }
            }
        } else if difficulty < 0.5 {
            let c = a * x + b;
            (
                "two_step",
                format!("{} {} = {c}", coefficient(a, "x"), signed_term(b)),
                params([("a", json!(a)), ("b", json!(b)), ("c", json!(c))]),
                // forgot to divide
                c - b,
            )
        } else if difficulty < 0.75 {
            let b = if coin(rng) { b } else { -b };
            let c = a * (x + b);
            (
                "distributive",
                format!("{a}(x {}) = {c}", signed_term(b)),
                params([("a", json!(a)), ("b", json!(b)), ("c", json!(c))]),
                // forgot to subtract the bracket constant
                x + b,
            )
        } else {
            let mut c = ranges.sample_nonzero("coefficient", rng)?;
            for _ in 0..MAX_RESAMPLES {
                if c != a {
                    break;
                }
                c = ranges.sample_nonzero("coefficient", rng)?;
            }
            if c == a {
                c = a + 1;
            }
            let d = a * x + b - c * x;
            (
                "both_sides",
                format!(
                    "{} {} = {} {}",
                    coefficient(a, "x"),
                    signed_term(b),
                    coefficient(c, "x"),
                    signed_term(d)
                ),
                params([("a", json!(a)), ("b", json!(b)), ("c", json!(c)), ("d", json!(d))]),
                // moved the constant without changing its sign
                x + 2 * b / (a - c),
            )
        };

        let mut parameters = parameters;
        parameters.insert("form".into(), json!(form));
        parameters.insert("operation".into(), json!(Operation::Linear.name()));
        let answer = self.compute_answer(Operation::Linear, &parameters)?;

        let mut distractors = Distractors::new(&answer);
        distractors
            .push_int(-x)
            .push_int(misstep)
            .push_int(x + 1)
            .push_int(x - 1)
            .push_int(x + 2)
            .push_int(x - 2)
            .push_int(2 * x);

        Ok(QuestionParts {
            question_type: QuestionType::Algebra,
            operation: Operation::Linear,
            expression: format!("Solve for x: {expression}"),
            correct_answer: answer,
            distractors: distractors.finish(rng),
            parameters,
            difficulty,
            hint: Some(linear_hint(form).into()),
            explanation: Some(format!("x = {x}")),
            steps: None,
        })
    }

    fn quadratic(&self, difficulty: f64, rng: &mut dyn RngCore) -> Result<QuestionParts> {
        let ranges = self.ranges.scaled(difficulty);
        let mut r1 = ranges.sample("root", rng)?;
        let mut r2 = ranges.sample("root", rng)?;
        if coin(rng) {
            r1 = -r1;
        }
        if coin(rng) {
            r2 = -r2;
        }
        let b = -(r1 + r2);
        let c = r1 * r2;

        let parameters = params([
            ("b", json!(b)),
            ("c", json!(c)),
            ("operation", json!(Operation::Quadratic.name())),
        ]);
        let answer = self.compute_answer(Operation::Quadratic, &parameters)?;

        let mut distractors = Distractors::new(&answer);
        distractors
            .push(AnswerValue::Expression(roots_text(-r1, -r2)))
            .push(AnswerValue::Expression(roots_text(r1, -r2)))
            .push(AnswerValue::Expression(roots_text(-b, c)))
            .push(AnswerValue::Expression(roots_text(r1 + 1, r2 + 1)))
            .push(AnswerValue::Expression(roots_text(r1 - 1, r2 - 1)));

        let mut expression = String::from("x²");
        if b != 0 {
            expression.push(' ');
            expression.push_str(&signed_term_var(b, "x"));
        }
        if c != 0 {
            expression.push(' ');
            expression.push_str(&signed_term(c));
        }
        expression.push_str(" = 0");

        Ok(QuestionParts {
            question_type: QuestionType::Algebra,
            operation: Operation::Quadratic,
            expression: format!("Solve for x: {expression}"),
            correct_answer: answer,
            distractors: distractors.finish(rng),
            parameters,
            difficulty,
            hint: Some("Find two numbers that multiply to the constant and add to the x coefficient.".into()),
            explanation: None,
            steps: Some(vec![
                format!("Factor: (x {})(x {}) = 0", signed_term(-r1), signed_term(-r2)),
                format!("Set each factor to zero: {}", roots_text(r1, r2)),
            ]),
        })
    }
}

impl QuestionGenerator for AlgebraGenerator {
    fn question_type(&self) -> QuestionType {
        QuestionType::Algebra
    }

    fn supported_operations(&self) -> &'static [Operation] {
        OPERATIONS
    }

    fn generate(
        &self,
        difficulty: f64,
        operation: Option<Operation>,
        rng: &mut dyn RngCore,
    ) -> Result<Question> {
        let difficulty = mathlern_core::clamp_unit(difficulty);
        let operation = self.pick_operation(operation, rng)?;
        let parts = match operation {
            Operation::Quadratic => self.quadratic(difficulty, rng)?,
            _ => self.linear(difficulty, rng)?,
        };
        Question::assemble(parts, DISTRACTOR_COUNT, rng)
    }

    fn compute_answer(&self, operation: Operation, parameters: &Parameters) -> Result<AnswerValue> {
        match operation {
            Operation::Linear => solve_linear(parameters).map(AnswerValue::Integer),
            Operation::Quadratic => {
                let (r1, r2) = solve_monic(param_i64(parameters, "b")?, param_i64(parameters, "c")?)?;
                Ok(AnswerValue::Expression(roots_text(r1, r2)))
            }
            other => Err(GenerationError::UnsupportedOperation {
                question_type: QuestionType::Algebra,
                operation: other,
            }),
        }
    }
}

/// Integer solution of the stored linear form.
fn solve_linear(parameters: &Parameters) -> Result<i64> {
    let a = param_i64(parameters, "a")?;
    let b = param_i64(parameters, "b")?;
    let solution = match param_str(parameters, "form")? {
        "add" => Fraction::whole(b - a),
        "sub" => Fraction::whole(b + a),
        "mul" => Fraction::whole(b).checked_div(Fraction::whole(a))?,
        "div" => Fraction::whole(b * a),
        "two_step" => {
            let c = param_i64(parameters, "c")?;
            Fraction::whole(c - b).checked_div(Fraction::whole(a))?
        }
        "distributive" => {
            let c = param_i64(parameters, "c")?;
            Fraction::whole(c).checked_div(Fraction::whole(a))? - Fraction::whole(b)
        }
        "both_sides" => {
            let c = param_i64(parameters, "c")?;
            let d = param_i64(parameters, "d")?;
            Fraction::whole(d - b).checked_div(Fraction::whole(a - c))?
        }
        other => return Err(GenerationError::MissingParameter(format!("form '{other}'"))),
    };
    if !solution.is_whole() {
        return Err(GenerationError::Unsatisfiable(format!(
            "linear equation has non-integer solution {solution}"
        )));
    }
    Ok(solution.numerator())
}

/// Integer roots of `x² + bx + c = 0`.
fn solve_monic(b: i64, c: i64) -> Result<(i64, i64)> {
    let discriminant = b * b - 4 * c;
    let root = isqrt(discriminant).ok_or_else(|| {
        GenerationError::Unsatisfiable(format!("x² {} has no integer roots", signed_term(c)))
    })?;
    let (hi, lo) = (-b + root, -b - root);
    if hi % 2 != 0 || lo % 2 != 0 {
        return Err(GenerationError::Unsatisfiable("roots are not integers".into()));
    }
    Ok((lo / 2, hi / 2))
}

/// `x = -2 or x = 3`, roots ascending; a double root is listed once.
#[must_use]
pub fn roots_text(r1: i64, r2: i64) -> String {
    let (lo, hi) = if r1 <= r2 { (r1, r2) } else { (r2, r1) };
    if lo == hi {
        format!("x = {lo}")
    } else {
        format!("x = {lo} or x = {hi}")
    }
}

fn signed_term_var(value: i64, var: &str) -> String {
    match value {
        1 => format!("+ {var}"),
        -1 => format!("- {var}"),
        v if v < 0 => format!("- {}{var}", v.unsigned_abs()),
        v => format!("+ {v}{var}"),
    }
}

fn linear_hint(form: &str) -> &'static str {
    match form {
        "add" | "sub" => "Undo the addition or subtraction on both sides.",
        "mul" | "div" => "Undo the multiplication or division on both sides.",
        "two_step" => "Move the constant first, then divide by the coefficient.",
        "distributive" => "Divide both sides by the factor outside the brackets.",
        _ => "Collect the x terms on one side.",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn generator() -> AlgebraGenerator {
        AlgebraGenerator::new(DifficultyMapper::new())
    }

    #[test]
    fn linear_forms_follow_difficulty() {
        let gen = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(31);
        let cases = [
            (0.1, &["add", "sub", "mul", "div"][..]),
            (0.3, &["two_step"][..]),
            (0.6, &["distributive"][..]),
            (0.9, &["both_sides"][..]),
        ];
        for (difficulty, forms) in cases {
            for _ in 0..10 {
                let q = gen.generate(difficulty, Some(Operation::Linear), &mut rng).unwrap();
                let form = q.parameters["form"].as_str().unwrap();
                assert!(forms.contains(&form), "{form} at {difficulty}");
                assert!(gen.verify(&q).unwrap(), "{}", q.expression);
            }
        }
    }

    #[test]
    fn known_linear_solutions() {
        let gen = generator();
        let p = params([("form", json!("two_step")), ("a", json!(3)), ("b", json!(5)), ("c", json!(20))]);
        assert_eq!(gen.compute_answer(Operation::Linear, &p).unwrap(), AnswerValue::Integer(5));

        let p = params([
            ("form", json!("both_sides")),
            ("a", json!(5)),
            ("b", json!(3)),
            ("c", json!(2)),
            ("d", json!(12)),
        ]);
        assert_eq!(gen.compute_answer(Operation::Linear, &p).unwrap(), AnswerValue::Integer(3));

        let p = params([("form", json!("two_step")), ("a", json!(2)), ("b", json!(0)), ("c", json!(3))]);
        assert!(matches!(
            gen.compute_answer(Operation::Linear, &p),
            Err(GenerationError::Unsatisfiable(_))
        ));
    }

    #[test]
    fn quadratic_roots_render_sorted() {
        let gen = generator();
        let p = params([("b", json!(-1)), ("c", json!(-6))]);
        assert_eq!(
            gen.compute_answer(Operation::Quadratic, &p).unwrap(),
            AnswerValue::Expression("x = -2 or x = 3".into())
        );
        let p = params([("b", json!(-4)), ("c", json!(4))]);
        assert_eq!(
            gen.compute_answer(Operation::Quadratic, &p).unwrap(),
            AnswerValue::Expression("x = 2".into())
        );
        let p = params([("b", json!(1)), ("c", json!(1))]);
        assert!(gen.compute_answer(Operation::Quadratic, &p).is_err());
    }

    #[test]
    fn quadratics_have_distinct_distractors() {
        let gen = generator();
        let mut rng = ChaCha8Rng::seed_from_u64(32);
        for _ in 0..30 {
            let q = gen.generate(0.7, Some(Operation::Quadratic), &mut rng).unwrap();
            assert!(q.expression.starts_with("Solve for x: x²"));
            assert_eq!(q.distractors.len(), DISTRACTOR_COUNT);
            assert!(!q.distractors.contains(&q.correct_answer));
            assert!(gen.verify(&q).unwrap());
        }
    }
}
