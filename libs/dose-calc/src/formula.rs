//! Formula definitions and dose/rate calculation
//!
//! A formula pairs a dose logic (pump rate → delivered dose) with a rate logic
//! (target dose → pump rate), plus the unit and precision used to present the
//! dose.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::error::{CalcError, Result};
use crate::evaluator::{Evaluator, FormattedResult};
use crate::token::{InputMap, LogicDefinition, Token};
use crate::validate::validate_logic_with;

/// Unit of every rate result
pub const RATE_UNIT: &str = "ml/hr";

/// Precision of every rate result
pub const RATE_DECIMAL_PLACES: u32 = 2;

/// Which of a formula's two logics to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicKind {
    Dose,
    Rate,
}

impl fmt::Display for LogicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicKind::Dose => f.write_str("dose"),
            LogicKind::Rate => f.write_str("rate"),
        }
    }
}

/// Input field a formula asks the clinician for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaInput {
    /// Variable name referenced by the logic
    pub id: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub unit: String,

    /// Logic the input feeds
    #[serde(default = "default_logic_type")]
    pub logic_type: LogicKind,
}

fn default_logic_type() -> LogicKind {
    LogicKind::Dose
}

/// Named dosing formula
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Unit label attached to dose results
    #[serde(default)]
    pub result_unit: String,

    /// Dose precision; `None` uses the evaluator default
    #[serde(default)]
    pub decimal_places: Option<u32>,

    #[serde(default)]
    pub inputs: Vec<FormulaInput>,

    #[serde(default)]
    pub dose_logic: LogicDefinition,

    #[serde(default)]
    pub rate_logic: LogicDefinition,
}

/// Result handed back to the caller
///
/// Serializes as `{"result", "unit"}` for a dose and `{"rate", "unit"}` for
/// a rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calculation {
    pub kind: LogicKind,
    pub result: FormattedResult,
    pub unit: String,
}

impl Serialize for Calculation {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let key = match self.kind {
            LogicKind::Dose => "result",
            LogicKind::Rate => "rate",
        };
        let mut state = serializer.serialize_struct("Calculation", 2)?;
        state.serialize_field(key, &self.result)?;
        state.serialize_field("unit", &self.unit)?;
        state.end()
    }
}

impl Formula {
    pub fn logic(&self, kind: LogicKind) -> &[Token] {
        match kind {
            LogicKind::Dose => &self.dose_logic,
            LogicKind::Rate => &self.rate_logic,
        }
    }

    /// Declared inputs for one logic, first declaration of each id kept
    pub fn inputs_for(&self, kind: LogicKind) -> Vec<&FormulaInput> {
        let mut seen = HashSet::new();
        self.inputs
            .iter()
            .filter(|input| input.logic_type == kind)
            .filter(|input| seen.insert(input.id.as_str()))
            .collect()
    }

    /// Check both logics with the evaluator's depth bound
    pub fn validate_with(&self, evaluator: &Evaluator) -> Result<()> {
        for kind in [LogicKind::Dose, LogicKind::Rate] {
            validate_logic_with(self.logic(kind), evaluator.config()).map_err(|e| {
                CalcError::invalid_logic(format!("{} {} logic: {}", self.name, kind, e))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_with(&Evaluator::default())
    }

    /// Run one logic and tag the result with its unit
    ///
    /// Dose results use the formula's precision and `result_unit`; rate
    /// results are always [`RATE_DECIMAL_PLACES`] in [`RATE_UNIT`].
    pub fn calculate_with(
        &self,
        evaluator: &Evaluator,
        kind: LogicKind,
        inputs: &InputMap,
    ) -> Result<Calculation> {
        let logic = self.logic(kind);
        if logic.is_empty() {
            return Err(CalcError::missing_logic(&self.name, kind));
        }

        let (decimal_places, unit) = match kind {
            LogicKind::Dose => (self.decimal_places, self.result_unit.clone()),
            LogicKind::Rate => (Some(RATE_DECIMAL_PLACES), RATE_UNIT.to_string()),
        };

        let result = evaluator.format(logic, inputs, decimal_places);
        debug!("{} {} = {} {}", self.name, kind, result, unit);

        Ok(Calculation { kind, result, unit })
    }

    pub fn calculate_dose(&self, inputs: &InputMap) -> Result<Calculation> {
        self.calculate_with(&Evaluator::default(), LogicKind::Dose, inputs)
    }

    pub fn calculate_rate(&self, inputs: &InputMap) -> Result<Calculation> {
        self.calculate_with(&Evaluator::default(), LogicKind::Rate, inputs)
    }
}
