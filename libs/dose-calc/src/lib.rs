//! dose-calc - Clinical dosing formula evaluator
//!
//! Turns a stored formula logic (a JSON token sequence) plus patient/infusion
//! inputs into a dose, a pump rate, or a displayable message.
//!
//! # Features
//!
//! - **Arithmetic**: `+ - * /` with standard precedence, parentheses, prefix sign
//! - **Conditionals**: ordered `if`/`then` branches with an optional `else`
//! - **Special cases**: hand-coded protocols for table-driven dosing
//! - **Formatting**: fixed-precision rounding of numeric results only
//!
//! Evaluation is pure and never fails: malformed logic, missing data and
//! arithmetic faults come back as diagnostic text.
//!
//! # Example
//!
//! ```rust
//! use dose_calc::{format, parse_logic, FormattedResult, InputMap};
//!
//! let logic = parse_logic(r#"[
//!     { "type": "parenthesis", "value": "(" },
//!     { "type": "variable", "id": "rate" },
//!     { "type": "operator", "value": "*" },
//!     { "type": "constant", "value": 32 },
//!     { "type": "parenthesis", "value": ")" },
//!     { "type": "operator", "value": "/" },
//!     { "type": "variable", "id": "weight" },
//!     { "type": "operator", "value": "/" },
//!     { "type": "constant", "value": 60 }
//! ]"#).unwrap();
//!
//! let mut inputs = InputMap::new();
//! inputs.insert("rate".to_string(), 10.0);
//! inputs.insert("weight".to_string(), 50.0);
//!
//! // (10 * 32) / 50 / 60
//! assert_eq!(
//!     format(&logic, &inputs, Some(3)),
//!     FormattedResult::Number("0.107".to_string())
//! );
//! ```
//!
//! # Special cases
//!
//! | Id | Inputs | Result |
//! |----|--------|--------|
//! | `TNK` | `weight` (kg) | Tenecteplase dose text by 10 kg band (<60 … ≥90) |
//! | `LIDO_BOLUS` | `weight` (kg), `desired_dose` (mg/kg) | bolus volume in ml at 20 mg/ml |
//!
//! # Diagnostics
//!
//! | Text | When |
//! |------|------|
//! | `please fill in the data` | a special case is missing a required input |
//! | `unrecognized special formula` | unknown special-case id |
//! | `no condition matched` | no branch matched and there is no `else` |
//! | `formula error` | malformed logic, division by zero, non-finite result |

pub mod catalog;
pub mod error;
pub mod evaluator;
pub mod expr;
pub mod formula;
pub mod special;
pub mod token;
pub mod validate;

// Re-exports for convenience
pub use catalog::{find_standard, standard_formulas};
pub use error::{CalcError, Result};
pub use evaluator::{
    evaluate, format, format_fixed, Evaluator, EvaluatorConfig, FormattedResult, Outcome,
    FORMULA_ERROR, MAX_DEPTH_LIMIT, NO_CONDITION_MATCHED,
};
pub use formula::{Calculation, Formula, FormulaInput, LogicKind, RATE_DECIMAL_PLACES, RATE_UNIT};
pub use special::{dispatch, SpecialCase, FILL_IN_DATA, UNKNOWN_SPECIAL_CASE};
pub use token::{
    inputs_from_value, logic_from_value, parse_logic, ConditionBranch, Conditional, ElseBranch,
    InputMap, LogicDefinition, Operator, Paren, Token,
};
pub use validate::{validate_logic, validate_logic_with};
