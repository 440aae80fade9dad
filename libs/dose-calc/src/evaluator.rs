//! Evaluator - walks a logic definition and produces a dose or rate
//!
//! Evaluation order for one logic definition:
//! 1. empty logic evaluates to 0
//! 2. a leading `special_case` token is dispatched to its protocol
//! 3. the first `conditional` token selects a branch (first match wins)
//! 4. a sole `string` token is returned verbatim
//! 5. anything else is parsed and evaluated as arithmetic
//!
//! Every failure is logged and turned into a diagnostic string so callers can
//! show the result to a clinician directly.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::error::{CalcError, Result};
use crate::expr;
use crate::special;
use crate::token::{Conditional, InputMap, Token};

/// Returned when no condition matched and there is no `else`
pub const NO_CONDITION_MATCHED: &str = "no condition matched";

/// Returned for malformed logic or an invalid arithmetic result
pub const FORMULA_ERROR: &str = "formula error";

pub const DEFAULT_DECIMAL_PLACES: u32 = 2;
pub const MAX_DECIMAL_PLACES: u32 = 20;
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Hard ceiling on `max_depth`; deeper nesting would risk the thread stack
pub const MAX_DEPTH_LIMIT: usize = 256;

/// Fraction digits needed to write any f64 exactly
const EXACT_FRACTION_DIGITS: usize = 1074;

/// Raw evaluation result
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Numeric(f64),
    Text(String),
}

impl Outcome {
    /// Condition truthiness: a non-zero number; text is never true
    pub fn is_truthy(&self) -> bool {
        matches!(self, Outcome::Numeric(value) if *value != 0.0)
    }

    fn diagnostic(text: &str) -> Self {
        Outcome::Text(text.to_string())
    }
}

/// Caller-facing result
///
/// Serializes as `null` when absent, otherwise as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FormattedResult {
    /// Nothing to compute (empty logic)
    Absent,
    /// Fixed-precision decimal
    Number(String),
    /// Table lookup text or diagnostic, never rounded
    Text(String),
}

impl FormattedResult {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FormattedResult::Absent => None,
            FormattedResult::Number(text) | FormattedResult::Text(text) => Some(text),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, FormattedResult::Absent)
    }
}

impl fmt::Display for FormattedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str().unwrap_or("-"))
    }
}

/// Evaluator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Maximum nesting of conditionals, parentheses and prefix signs
    pub max_depth: usize,

    /// Rounding applied when the caller gives no decimal places
    pub default_decimal_places: u32,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            default_decimal_places: DEFAULT_DECIMAL_PLACES,
        }
    }
}

/// Formula evaluator
///
/// Stateless apart from its settings; one instance can serve any number of
/// concurrent callers.
///
/// # Example
/// ```
/// use dose_calc::{Evaluator, FormattedResult, InputMap, Operator, Token};
///
/// let evaluator = Evaluator::default();
/// let logic = vec![
///     Token::var("dose"),
///     Token::op(Operator::Mul),
///     Token::var("weight"),
/// ];
///
/// let mut inputs = InputMap::new();
/// inputs.insert("dose".to_string(), 0.1);
/// inputs.insert("weight".to_string(), 72.5);
///
/// assert_eq!(
///     evaluator.format(&logic, &inputs, Some(1)),
///     FormattedResult::Number("7.3".to_string())
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvaluatorConfig,
}

impl Evaluator {
    /// `max_depth` is clamped to [`MAX_DEPTH_LIMIT`]
    pub fn new(mut config: EvaluatorConfig) -> Self {
        config.max_depth = config.max_depth.min(MAX_DEPTH_LIMIT);
        Self { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate a logic definition to a number or a displayable string
    pub fn evaluate(&self, logic: &[Token], inputs: &InputMap) -> Outcome {
        match self.eval_at(logic, inputs, 0) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Formula evaluation aborted: {}", e);
                Outcome::diagnostic(FORMULA_ERROR)
            },
        }
    }

    /// Evaluate and round for display
    ///
    /// Empty logic is [`FormattedResult::Absent`]. Numbers are rounded to
    /// `decimal_places` (or the configured default); text passes through.
    pub fn format(
        &self,
        logic: &[Token],
        inputs: &InputMap,
        decimal_places: Option<u32>,
    ) -> FormattedResult {
        if logic.is_empty() {
            return FormattedResult::Absent;
        }

        let places = decimal_places.unwrap_or(self.config.default_decimal_places);
        match self.evaluate(logic, inputs) {
            Outcome::Numeric(value) if value.is_finite() => {
                FormattedResult::Number(format_fixed(value, places))
            },
            Outcome::Numeric(value) => {
                warn!("Non-finite result {} cannot be formatted", value);
                FormattedResult::Text(FORMULA_ERROR.to_string())
            },
            Outcome::Text(text) => FormattedResult::Text(text),
        }
    }

    // Only the depth bound propagates as Err; every other failure becomes a
    // diagnostic at the level where it happened.
    fn eval_at(&self, logic: &[Token], inputs: &InputMap, depth: usize) -> Result<Outcome> {
        if depth > self.config.max_depth {
            return Err(CalcError::DepthExceeded(self.config.max_depth));
        }

        let Some(first) = logic.first() else {
            return Ok(Outcome::Numeric(0.0));
        };

        if let Token::SpecialCase { id } = first {
            debug!("Dispatching special case {}", id);
            return Ok(special::dispatch(id, inputs));
        }

        if let Some(conditional) = logic.iter().find_map(Token::as_conditional) {
            return self.eval_conditional(conditional, inputs, depth);
        }

        if let [Token::StringLiteral { value }] = logic {
            return Ok(Outcome::Text(value.clone()));
        }

        match expr::evaluate(logic, inputs, self.config.max_depth) {
            Ok(value) => Ok(Outcome::Numeric(value)),
            Err(e @ CalcError::DepthExceeded(_)) => Err(e),
            Err(e) => {
                warn!("Arithmetic evaluation failed: {}", e);
                Ok(Outcome::diagnostic(FORMULA_ERROR))
            },
        }
    }

    fn eval_conditional(
        &self,
        conditional: &Conditional,
        inputs: &InputMap,
        depth: usize,
    ) -> Result<Outcome> {
        for (index, branch) in conditional.conditions.iter().enumerate() {
            if self.eval_at(&branch.condition, inputs, depth + 1)?.is_truthy() {
                debug!("Condition {} matched", index);
                return self.eval_at(&branch.then, inputs, depth + 1);
            }
        }

        match &conditional.otherwise {
            Some(otherwise) => self.eval_at(otherwise.logic(), inputs, depth + 1),
            None => {
                warn!(
                    "None of {} conditions matched and no else branch",
                    conditional.conditions.len()
                );
                Ok(Outcome::diagnostic(NO_CONDITION_MATCHED))
            },
        }
    }
}

/// Evaluate with the default settings
pub fn evaluate(logic: &[Token], inputs: &InputMap) -> Outcome {
    Evaluator::default().evaluate(logic, inputs)
}

/// Format with the default settings
pub fn format(logic: &[Token], inputs: &InputMap, decimal_places: Option<u32>) -> FormattedResult {
    Evaluator::default().format(logic, inputs, decimal_places)
}

/// Render with exactly `places` fraction digits
///
/// Rounds the exact binary value of `value`, so 2.675 (stored as
/// 2.67499999...) gives "2.67". Exact ties go away from zero.
pub fn format_fixed(value: f64, places: u32) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let places = places.min(MAX_DECIMAL_PLACES) as usize;
    let exact = format!("{:.*}", EXACT_FRACTION_DIGITS, value.abs());
    let (int_part, fraction) = exact.split_once('.').unwrap_or((exact.as_str(), ""));

    let mut digits: Vec<u8> = int_part
        .bytes()
        .chain(fraction.bytes().take(places))
        .collect();
    if fraction.as_bytes().get(places).is_some_and(|d| *d >= b'5') {
        round_up(&mut digits);
    }

    let int_len = digits.len() - places;
    let mut out = String::with_capacity(digits.len() + 2);
    if value < 0.0 {
        out.push('-');
    }
    out.extend(digits[..int_len].iter().map(|d| char::from(*d)));
    if places > 0 {
        out.push('.');
        out.extend(digits[int_len..].iter().map(|d| char::from(*d)));
    }
    out
}

// Add one unit in the last place of an ASCII digit string.
fn round_up(digits: &mut Vec<u8>) {
    for digit in digits.iter_mut().rev() {
        if *digit == b'9' {
            *digit = b'0';
        } else {
            *digit += 1;
            return;
        }
    }
    digits.insert(0, b'1');
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::special::{FILL_IN_DATA, UNKNOWN_SPECIAL_CASE};
    use crate::token::Operator::{Add, Div, Mul, Sub};
    use crate::token::{ConditionBranch, ElseBranch};
    use tracing_test::traced_test;

    fn make_inputs(pairs: &[(&str, f64)]) -> InputMap {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn branch(condition: Vec<Token>, then: Vec<Token>) -> ConditionBranch {
        ConditionBranch { condition, then }
    }

    fn conditional(conditions: Vec<ConditionBranch>, otherwise: Option<ElseBranch>) -> Token {
        Token::Conditional(Conditional {
            conditions,
            otherwise,
        })
    }

    #[test]
    fn test_empty_logic() {
        let inputs = InputMap::new();
        assert_eq!(evaluate(&[], &inputs), Outcome::Numeric(0.0));
        assert_eq!(format(&[], &inputs, Some(2)), FormattedResult::Absent);
        assert_eq!(format(&[], &inputs, None), FormattedResult::Absent);
    }

    #[test]
    fn test_arithmetic() {
        let logic = [
            Token::num(3.0),
            Token::op(Add),
            Token::num(4.0),
            Token::op(Mul),
            Token::num(2.0),
        ];
        assert_eq!(evaluate(&logic, &InputMap::new()), Outcome::Numeric(11.0));
    }

    #[test]
    fn test_sole_string_literal() {
        let logic = [Token::text("see protocol sheet")];
        assert_eq!(
            evaluate(&logic, &InputMap::new()),
            Outcome::Text("see protocol sheet".to_string())
        );
        assert_eq!(
            format(&logic, &InputMap::new(), Some(3)),
            FormattedResult::Text("see protocol sheet".to_string())
        );
    }

    #[test]
    fn test_string_inside_arithmetic_is_error() {
        let logic = [Token::text("a"), Token::op(Add), Token::num(1.0)];
        assert_eq!(
            evaluate(&logic, &InputMap::new()),
            Outcome::Text(FORMULA_ERROR.to_string())
        );
    }

    #[test]
    fn test_special_case_ignores_rest() {
        let logic = [Token::special("TNK"), Token::op(Add), Token::num(1.0)];
        let inputs = make_inputs(&[("weight", 75.0)]);
        assert_eq!(
            evaluate(&logic, &inputs),
            Outcome::Text("8000unit (40mg / 8ml)".to_string())
        );
    }

    #[test]
    fn test_special_case_outcomes() {
        let lido = [Token::special("LIDO_BOLUS")];
        let filled = make_inputs(&[("weight", 70.0), ("desired_dose", 1.5)]);

        assert_eq!(
            format(&lido, &filled, Some(2)),
            FormattedResult::Number("5.25".to_string())
        );
        assert_eq!(
            format(&lido, &InputMap::new(), Some(2)),
            FormattedResult::Text(FILL_IN_DATA.to_string())
        );
        assert_eq!(
            format(&[Token::special("NOPE")], &InputMap::new(), None),
            FormattedResult::Text(UNKNOWN_SPECIAL_CASE.to_string())
        );
    }

    #[test]
    fn test_conditional_first_match_wins() {
        let logic = [conditional(
            vec![
                branch(vec![Token::num(1.0)], vec![Token::text("X")]),
                branch(vec![Token::num(2.0)], vec![Token::text("Y")]),
            ],
            None,
        )];
        assert_eq!(
            evaluate(&logic, &InputMap::new()),
            Outcome::Text("X".to_string())
        );
    }

    #[test]
    fn test_conditional_uses_inputs() {
        // if (weight - 60) then weight * 0.5 else 30
        let logic = [conditional(
            vec![branch(
                vec![Token::var("weight"), Token::op(Sub), Token::num(60.0)],
                vec![Token::var("weight"), Token::op(Mul), Token::num(0.5)],
            )],
            Some(ElseBranch::Logic(vec![Token::num(30.0)])),
        )];

        let heavy = make_inputs(&[("weight", 80.0)]);
        let boundary = make_inputs(&[("weight", 60.0)]);
        assert_eq!(evaluate(&logic, &heavy), Outcome::Numeric(40.0));
        assert_eq!(evaluate(&logic, &boundary), Outcome::Numeric(30.0));
    }

    #[test]
    fn test_conditional_wrapped_else() {
        let logic = [conditional(
            vec![branch(vec![Token::num(0.0)], vec![Token::num(1.0)])],
            Some(ElseBranch::Wrapped {
                logic: vec![Token::num(2.0)],
            }),
        )];
        assert_eq!(evaluate(&logic, &InputMap::new()), Outcome::Numeric(2.0));
    }

    #[test]
    #[traced_test]
    fn test_conditional_without_match() {
        let logic = [conditional(
            vec![branch(vec![Token::var("flag")], vec![Token::num(1.0)])],
            None,
        )];
        assert_eq!(
            evaluate(&logic, &InputMap::new()),
            Outcome::Text(NO_CONDITION_MATCHED.to_string())
        );
        assert!(logs_contain("no else branch"));
    }

    #[test]
    fn test_text_condition_is_never_true() {
        let logic = [conditional(
            vec![
                branch(vec![Token::text("yes")], vec![Token::num(1.0)]),
                // failing arithmetic yields a diagnostic, which is text
                branch(
                    vec![Token::num(1.0), Token::op(Div), Token::num(0.0)],
                    vec![Token::num(2.0)],
                ),
                branch(vec![Token::special("TNK")], vec![Token::num(3.0)]),
            ],
            Some(ElseBranch::Logic(vec![Token::num(4.0)])),
        )];
        assert_eq!(evaluate(&logic, &InputMap::new()), Outcome::Numeric(4.0));
    }

    #[test]
    fn test_nested_conditionals() {
        let inner = conditional(
            vec![branch(vec![Token::var("b")], vec![Token::text("a and b")])],
            Some(ElseBranch::Logic(vec![Token::text("a only")])),
        );
        let logic = [conditional(
            vec![branch(vec![Token::var("a")], vec![inner])],
            Some(ElseBranch::Logic(vec![Token::text("neither")])),
        )];

        let both = make_inputs(&[("a", 1.0), ("b", 1.0)]);
        let only_a = make_inputs(&[("a", 1.0)]);
        assert_eq!(
            evaluate(&logic, &both),
            Outcome::Text("a and b".to_string())
        );
        assert_eq!(
            evaluate(&logic, &only_a),
            Outcome::Text("a only".to_string())
        );
        assert_eq!(
            evaluate(&logic, &InputMap::new()),
            Outcome::Text("neither".to_string())
        );
    }

    #[test]
    #[traced_test]
    fn test_depth_limit_is_diagnostic() {
        let mut logic = vec![Token::num(1.0)];
        for _ in 0..10 {
            logic = vec![conditional(vec![branch(vec![Token::num(1.0)], logic)], None)];
        }

        let shallow = Evaluator::new(EvaluatorConfig {
            max_depth: 5,
            ..Default::default()
        });
        assert_eq!(
            shallow.evaluate(&logic, &InputMap::new()),
            Outcome::Text(FORMULA_ERROR.to_string())
        );
        assert!(logs_contain("Nesting depth exceeds limit of 5"));

        assert_eq!(
            Evaluator::default().evaluate(&logic, &InputMap::new()),
            Outcome::Numeric(1.0)
        );
    }

    #[test]
    #[traced_test]
    fn test_malformed_logic_is_diagnostic() {
        let logic = [Token::open(), Token::num(3.0), Token::op(Add), Token::num(4.0)];
        assert_eq!(
            format(&logic, &InputMap::new(), None),
            FormattedResult::Text(FORMULA_ERROR.to_string())
        );
        assert!(logs_contain("unmatched '('"));
    }

    #[test]
    fn test_division_by_zero_is_diagnostic() {
        let logic = [Token::var("dose"), Token::op(Div), Token::var("weight")];
        let inputs = make_inputs(&[("dose", 5.0)]);
        assert_eq!(
            evaluate(&logic, &inputs),
            Outcome::Text(FORMULA_ERROR.to_string())
        );
    }

    #[test]
    fn test_format_rounding() {
        let logic = [Token::var("x")];
        let inputs = make_inputs(&[("x", 5.2567)]);

        assert_eq!(
            format(&logic, &inputs, Some(2)),
            FormattedResult::Number("5.26".to_string())
        );
        assert_eq!(
            format(&logic, &inputs, None),
            FormattedResult::Number("5.26".to_string())
        );
        assert_eq!(
            format(&logic, &inputs, Some(0)),
            FormattedResult::Number("5".to_string())
        );
        assert_eq!(
            format(&logic, &inputs, Some(5)),
            FormattedResult::Number("5.25670".to_string())
        );
    }

    #[test]
    fn test_configured_default_places() {
        let evaluator = Evaluator::new(EvaluatorConfig {
            default_decimal_places: 3,
            ..Default::default()
        });
        let logic = [Token::num(2.0), Token::op(Div), Token::num(3.0)];

        assert_eq!(
            evaluator.format(&logic, &InputMap::new(), None),
            FormattedResult::Number("0.667".to_string())
        );
    }

    #[test]
    fn test_format_fixed() {
        assert_eq!(format_fixed(2.5, 0), "3");
        assert_eq!(format_fixed(-2.5, 0), "-3");
        assert_eq!(format_fixed(0.125, 2), "0.13");
        assert_eq!(format_fixed(10.0, 2), "10.00");
        assert_eq!(format_fixed(1.0, 99), format!("{:.20}", 1.0));
        assert_eq!(format_fixed(9.995, 2), "9.99");
        assert_eq!(format_fixed(99.5, 0), "100");
        assert_eq!(format_fixed(0.0, 2), "0.00");
        assert_eq!(format_fixed(-0.001, 2), "-0.00");
        assert_eq!(format_fixed(f64::INFINITY, 2), "inf");
    }

    #[test]
    fn test_format_fixed_rounds_stored_value() {
        // 2.675 is stored as 2.67499999999999982236431605997495353221893310546875
        assert_eq!(format_fixed(2.675, 2), "2.67");
        assert_eq!(format_fixed(1.005, 2), "1.00");
        // 0.0375 is stored just below the tie
        assert_eq!(format_fixed(4.5 * 32.0 / 64.0 / 60.0, 3), "0.037");
    }

    #[test]
    fn test_lido_bolus_rounds_stored_value() {
        // (0.9 * 1) / 20 is stored just below 0.045
        let lido = [Token::special("LIDO_BOLUS")];
        let inputs = make_inputs(&[("weight", 1.0), ("desired_dose", 0.9)]);
        assert_eq!(
            format(&lido, &inputs, Some(2)),
            FormattedResult::Number("0.04".to_string())
        );
    }

    #[test]
    fn test_max_depth_is_clamped() {
        let evaluator = Evaluator::new(EvaluatorConfig {
            max_depth: 10_000_000,
            ..Default::default()
        });
        assert_eq!(evaluator.config().max_depth, MAX_DEPTH_LIMIT);

        let mut logic = vec![Token::open(); 5_000];
        logic.push(Token::num(1.0));
        logic.extend(vec![Token::close(); 5_000]);
        assert_eq!(
            evaluator.format(&logic, &InputMap::new(), None),
            FormattedResult::Text(FORMULA_ERROR.to_string())
        );
    }

    #[test]
    fn test_formatted_result_serialization() {
        assert_eq!(
            serde_json::to_value(FormattedResult::Absent).unwrap(),
            serde_json::Value::Null
        );
        assert_eq!(
            serde_json::to_value(FormattedResult::Number("1.50".to_string())).unwrap(),
            serde_json::json!("1.50")
        );
    }

    #[test]
    fn test_deterministic() {
        let logic = [
            Token::open(),
            Token::var("rate"),
            Token::op(Mul),
            Token::num(80.0),
            Token::close(),
            Token::op(Div),
            Token::var("weight"),
            Token::op(Div),
            Token::num(60.0),
        ];
        let inputs = make_inputs(&[("rate", 7.0), ("weight", 63.0)]);
        let first = evaluate(&logic, &inputs);
        for _ in 0..10 {
            assert_eq!(evaluate(&logic, &inputs), first);
        }
    }
}
