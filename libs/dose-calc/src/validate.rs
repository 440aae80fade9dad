//! Logic validation
//!
//! Checks a logic definition's structure without any input values, so a
//! formula can be rejected when it is saved instead of when a clinician
//! submits numbers. The evaluator never depends on this having run.

use crate::error::{CalcError, Result};
use crate::evaluator::{EvaluatorConfig, MAX_DEPTH_LIMIT};
use crate::expr::Expr;
use crate::special::SpecialCase;
use crate::token::Token;

/// Validate with the default evaluator settings
pub fn validate_logic(logic: &[Token]) -> Result<()> {
    validate_logic_with(logic, &EvaluatorConfig::default())
}

/// Validate with explicit settings (the depth bound must match the evaluator's)
pub fn validate_logic_with(logic: &[Token], config: &EvaluatorConfig) -> Result<()> {
    validate_at(logic, 0, config.max_depth.min(MAX_DEPTH_LIMIT))
}

fn validate_at(logic: &[Token], depth: usize, max_depth: usize) -> Result<()> {
    if depth > max_depth {
        return Err(CalcError::DepthExceeded(max_depth));
    }

    let Some(first) = logic.first() else {
        return Ok(());
    };

    if let Token::SpecialCase { id } = first {
        return match SpecialCase::from_id(id) {
            Some(_) => Ok(()),
            None => Err(CalcError::UnknownSpecialCase(id.clone())),
        };
    }

    let mut conditionals = 0;
    for (position, token) in logic.iter().enumerate() {
        match token {
            Token::SpecialCase { id } => {
                return Err(CalcError::invalid_logic(format!(
                    "special case '{}' at position {} must be the first token",
                    id, position
                )));
            },
            Token::StringLiteral { .. } if logic.len() > 1 => {
                return Err(CalcError::invalid_logic(format!(
                    "string at position {} must be the only token",
                    position
                )));
            },
            Token::Conditional(_) => conditionals += 1,
            _ => {},
        }
    }

    if conditionals > 1 {
        return Err(CalcError::invalid_logic(format!(
            "found {} conditional blocks, only one is allowed",
            conditionals
        )));
    }

    if let Some(conditional) = logic.iter().find_map(Token::as_conditional) {
        if conditional.conditions.is_empty() {
            return Err(CalcError::invalid_logic("conditional has no conditions"));
        }
        for branch in &conditional.conditions {
            validate_at(&branch.condition, depth + 1, max_depth)?;
            validate_at(&branch.then, depth + 1, max_depth)?;
        }
        if let Some(otherwise) = &conditional.otherwise {
            validate_at(otherwise.logic(), depth + 1, max_depth)?;
        }
        return Ok(());
    }

    if let [Token::StringLiteral { .. }] = logic {
        return Ok(());
    }

    Expr::parse(logic, max_depth).map(|_| ())
}
