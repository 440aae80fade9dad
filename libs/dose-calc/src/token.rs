//! Token model for stored formula logic
//!
//! A logic definition is stored as a JSON array of token objects tagged by
//! `"type"`:
//!
//! ```json
//! [
//!   { "type": "parenthesis", "value": "(" },
//!   { "type": "variable", "id": "rate" },
//!   { "type": "operator", "value": "*" },
//!   { "type": "constant", "value": 32 },
//!   { "type": "parenthesis", "value": ")" },
//!   { "type": "operator", "value": "/" },
//!   { "type": "variable", "id": "weight" }
//! ]
//! ```
//!
//! Conditionals nest further logic definitions, so the model is an owned tree.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::{CalcError, Result};

/// Ordered token sequence describing one computable expression
pub type LogicDefinition = Vec<Token>;

/// Caller-supplied variable values for one evaluation
pub type InputMap = HashMap<String, f64>;

/// One element of a logic definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Token {
    /// Reference to an input value, 0 when absent
    Variable { id: String },

    /// Literal operand (numbers and numeric strings are accepted)
    Constant {
        #[serde(deserialize_with = "deserialize_number")]
        value: f64,
    },

    /// Infix arithmetic operator
    Operator { value: Operator },

    /// Grouping mark
    Parenthesis { value: Paren },

    /// Literal text result, only meaningful as the sole token
    #[serde(rename = "string")]
    StringLiteral { value: String },

    /// Branch selection block
    Conditional(Conditional),

    /// Hand-coded dosing protocol, only meaningful as the first token
    SpecialCase { id: String },
}

impl Token {
    pub fn var(id: impl Into<String>) -> Self {
        Token::Variable { id: id.into() }
    }

    pub fn num(value: f64) -> Self {
        Token::Constant { value }
    }

    pub fn op(value: Operator) -> Self {
        Token::Operator { value }
    }

    pub fn open() -> Self {
        Token::Parenthesis { value: Paren::Open }
    }

    pub fn close() -> Self {
        Token::Parenthesis { value: Paren::Close }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Token::StringLiteral {
            value: value.into(),
        }
    }

    pub fn special(id: impl Into<String>) -> Self {
        Token::SpecialCase { id: id.into() }
    }

    pub fn as_conditional(&self) -> Option<&Conditional> {
        match self {
            Token::Conditional(conditional) => Some(conditional),
            _ => None,
        }
    }

    /// Stored `type` tag, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Token::Variable { .. } => "variable",
            Token::Constant { .. } => "constant",
            Token::Operator { .. } => "operator",
            Token::Parenthesis { .. } => "parenthesis",
            Token::StringLiteral { .. } => "string",
            Token::Conditional(_) => "conditional",
            Token::SpecialCase { .. } => "special_case",
        }
    }
}

/// Arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
}

impl Operator {
    /// Binding strength: `* /` bind tighter than `+ -`
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Mul | Operator::Div => 2,
            Operator::Add | Operator::Sub => 1,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Parenthesis side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Paren {
    #[serde(rename = "(")]
    Open,
    #[serde(rename = ")")]
    Close,
}

/// Conditional block: first matching condition wins, else falls through
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Conditional {
    /// Branches, scanned in stored order
    #[serde(default)]
    pub conditions: Vec<ConditionBranch>,

    /// Fallback when no condition matches
    #[serde(default, rename = "else", skip_serializing_if = "Option::is_none")]
    pub otherwise: Option<ElseBranch>,
}

/// One `if`/`then` pair
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionBranch {
    #[serde(rename = "if", default)]
    pub condition: LogicDefinition,

    #[serde(default)]
    pub then: LogicDefinition,
}

/// `else` branch, stored either bare or as `{ "logic": [...] }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ElseBranch {
    Logic(LogicDefinition),
    Wrapped {
        #[serde(default)]
        logic: LogicDefinition,
    },
}

impl ElseBranch {
    pub fn logic(&self) -> &[Token] {
        match self {
            ElseBranch::Logic(logic) | ElseBranch::Wrapped { logic } => logic,
        }
    }
}

fn deserialize_number<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(value) => Ok(value),
        NumberOrText::Text(text) => parse_finite(&text)
            .ok_or_else(|| de::Error::custom(format!("invalid numeric constant '{}'", text))),
    }
}

fn parse_finite(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Parse a stored logic definition from its JSON text
pub fn parse_logic(json: &str) -> Result<LogicDefinition> {
    Ok(serde_json::from_str(json)?)
}

/// Convert an already-decoded JSON value into a logic definition
pub fn logic_from_value(value: Value) -> Result<LogicDefinition> {
    Ok(serde_json::from_value(value)?)
}

/// Build an input map from caller-submitted JSON
///
/// Numbers and numeric strings are accepted. `null` and blank strings are
/// skipped so they read as missing (0). Anything else is rejected.
pub fn inputs_from_value(value: &Value) -> Result<InputMap> {
    let object = value
        .as_object()
        .ok_or_else(|| CalcError::invalid_input("inputs", "expected a JSON object"))?;

    let mut inputs = InputMap::with_capacity(object.len());
    for (name, raw) in object {
        let parsed = match raw {
            Value::Null => None,
            Value::Number(number) => number.as_f64(),
            Value::String(text) if text.trim().is_empty() => None,
            Value::String(text) => Some(
                parse_finite(text)
                    .ok_or_else(|| CalcError::invalid_input(name, "not a number"))?,
            ),
            other => {
                return Err(CalcError::invalid_input(
                    name,
                    format!("expected a number, found {}", other),
                ))
            },
        };
        if let Some(number) = parsed {
            inputs.insert(name.clone(), number);
        }
    }

    Ok(inputs)
}

/// Read an input value; absent or NaN reads as 0
pub fn input_value(inputs: &InputMap, name: &str) -> f64 {
    inputs
        .get(name)
        .copied()
        .filter(|value| !value.is_nan())
        .unwrap_or(0.0)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_arithmetic_tokens() {
        let logic = logic_from_value(json!([
            { "type": "parenthesis", "value": "(" },
            { "type": "variable", "id": "rate" },
            { "type": "operator", "value": "*" },
            { "type": "constant", "value": 32 },
            { "type": "parenthesis", "value": ")" }
        ]))
        .unwrap();

        assert_eq!(
            logic,
            vec![
                Token::open(),
                Token::var("rate"),
                Token::op(Operator::Mul),
                Token::num(32.0),
                Token::close(),
            ]
        );
    }

    #[test]
    fn test_constant_accepts_numeric_string() {
        let logic = logic_from_value(json!([{ "type": "constant", "value": " 2.5 " }])).unwrap();
        assert_eq!(logic, vec![Token::num(2.5)]);

        let err = logic_from_value(json!([{ "type": "constant", "value": "abc" }]));
        assert!(err.is_err());
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let result = logic_from_value(json!([{ "type": "operator", "value": "^" }]));
        assert!(matches!(result, Err(CalcError::Serialization(_))));
    }

    #[test]
    fn test_unknown_token_type_rejected() {
        let result = parse_logic(r#"[{"type": "function", "id": "sqrt"}]"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_else_branch_shapes() {
        let bare = logic_from_value(json!([{
            "type": "conditional",
            "conditions": [],
            "else": [{ "type": "constant", "value": 1 }]
        }]))
        .unwrap();
        let wrapped = logic_from_value(json!([{
            "type": "conditional",
            "conditions": [],
            "else": { "logic": [{ "type": "constant", "value": 1 }] }
        }]))
        .unwrap();
        let absent = logic_from_value(json!([{
            "type": "conditional",
            "conditions": [],
            "else": null
        }]))
        .unwrap();

        let bare = bare[0].as_conditional().unwrap();
        let wrapped = wrapped[0].as_conditional().unwrap();
        assert_eq!(bare.otherwise.as_ref().unwrap().logic(), &[Token::num(1.0)]);
        assert_eq!(
            wrapped.otherwise.as_ref().unwrap().logic(),
            &[Token::num(1.0)]
        );
        assert!(absent[0].as_conditional().unwrap().otherwise.is_none());
    }

    #[test]
    fn test_nested_conditional_round_trip() {
        let source = json!([{
            "type": "conditional",
            "conditions": [{
                "if": [{ "type": "variable", "id": "weight" }],
                "then": [{ "type": "string", "value": "ok" }]
            }]
        }]);
        let logic = logic_from_value(source.clone()).unwrap();
        assert_eq!(serde_json::to_value(&logic).unwrap(), source);
    }

    #[test]
    fn test_inputs_from_value() {
        let inputs = inputs_from_value(&json!({
            "weight": 70,
            "rate": "12.5",
            "blank": "",
            "missing": null
        }))
        .unwrap();

        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs["weight"], 70.0);
        assert_eq!(inputs["rate"], 12.5);

        assert!(inputs_from_value(&json!({ "weight": "heavy" })).is_err());
        assert!(inputs_from_value(&json!({ "weight": [1] })).is_err());
        assert!(inputs_from_value(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_input_value_defaults() {
        let mut inputs = InputMap::new();
        inputs.insert("nan".to_string(), f64::NAN);
        inputs.insert("w".to_string(), 3.0);

        assert_eq!(input_value(&inputs, "w"), 3.0);
        assert_eq!(input_value(&inputs, "nan"), 0.0);
        assert_eq!(input_value(&inputs, "absent"), 0.0);
    }
}
