//! Error types for dose-calc

use thiserror::Error;

use crate::formula::LogicKind;

/// Calculation errors
///
/// These never escape [`Evaluator::evaluate`](crate::Evaluator::evaluate);
/// there they are logged and replaced by a diagnostic string. They are
/// returned as-is from the caller-side APIs (deserialization, validation,
/// formula lookup).
#[derive(Debug, Error)]
pub enum CalcError {
    #[error("Expression error: {0}")]
    Expression(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Expression produced a non-finite value: {0}")]
    NonFinite(f64),

    #[error("Nesting depth exceeds limit of {0}")]
    DepthExceeded(usize),

    #[error("Invalid logic: {0}")]
    InvalidLogic(String),

    #[error("Unknown special case: {0}")]
    UnknownSpecialCase(String),

    #[error("Formula '{formula}' has no {kind} logic")]
    MissingLogic { formula: String, kind: LogicKind },

    #[error("Invalid input '{name}': {reason}")]
    InvalidInput { name: String, reason: String },

    #[error("Formula not found: {0}")]
    FormulaNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CalcError {
    pub fn expression(msg: impl Into<String>) -> Self {
        Self::Expression(msg.into())
    }

    pub fn invalid_logic(msg: impl Into<String>) -> Self {
        Self::InvalidLogic(msg.into())
    }

    pub fn invalid_input(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_logic(formula: impl Into<String>, kind: LogicKind) -> Self {
        Self::MissingLogic {
            formula: formula.into(),
            kind,
        }
    }
}

impl From<serde_json::Error> for CalcError {
    fn from(err: serde_json::Error) -> Self {
        CalcError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CalcError>;
