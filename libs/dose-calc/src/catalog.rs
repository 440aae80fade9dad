//! Standard formula catalog
//!
//! Public formulas every deployment starts with: vasopressor/inotrope
//! infusions plus the TNK and lidocaine bolus protocols.

use crate::error::{CalcError, Result};
use crate::formula::Formula;

const STANDARD_FORMULAS_JSON: &str = include_str!("../catalog/standard_formulas.json");

/// Load the embedded standard formulas
pub fn standard_formulas() -> Result<Vec<Formula>> {
    Ok(serde_json::from_str(STANDARD_FORMULAS_JSON)?)
}

/// Find a standard formula by name, ignoring case
pub fn find_standard(name: &str) -> Result<Formula> {
    standard_formulas()?
        .into_iter()
        .find(|formula| formula.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| CalcError::FormulaNotFound(name.to_string()))
}
