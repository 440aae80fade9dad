//! Special-case dosing protocols
//!
//! Formulas that cannot be written as arithmetic (weight-band tables, fixed
//! concentration conversions) are stored as a single `special_case` token and
//! dispatched here by id. Protocols never fail: missing data and unknown ids
//! produce a displayable diagnostic instead.

use tracing::{debug, warn};

use crate::evaluator::Outcome;
use crate::token::{input_value, InputMap};

/// Returned when a protocol is missing a required input
pub const FILL_IN_DATA: &str = "please fill in the data";

/// Returned for an id that names no known protocol
pub const UNKNOWN_SPECIAL_CASE: &str = "unrecognized special formula";

/// Tenecteplase dose by weight band, upper bounds exclusive
const TNK_BANDS: [(f64, &str); 4] = [
    (60.0, "6000unit (30mg / 6ml)"),
    (70.0, "7000unit (35mg / 7ml)"),
    (80.0, "8000unit (40mg / 8ml)"),
    (90.0, "9000unit (45mg / 9ml)"),
];
const TNK_MAX_DOSE: &str = "10000unit (50mg / 10ml)";

/// Lidocaine bolus stock concentration (mg/ml)
const LIDOCAINE_MG_PER_ML: f64 = 20.0;

/// Known special-case protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialCase {
    /// Tenecteplase weight-band table
    Tnk,
    /// Lidocaine bolus volume from mg/kg dose
    LidoBolus,
}

impl SpecialCase {
    pub const ALL: [SpecialCase; 2] = [SpecialCase::Tnk, SpecialCase::LidoBolus];

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|case| case.id() == id)
    }

    /// Stored id of the protocol
    pub fn id(self) -> &'static str {
        match self {
            SpecialCase::Tnk => "TNK",
            SpecialCase::LidoBolus => "LIDO_BOLUS",
        }
    }

    /// Input names the protocol reads
    pub fn required_inputs(self) -> &'static [&'static str] {
        match self {
            SpecialCase::Tnk => &["weight"],
            SpecialCase::LidoBolus => &["weight", "desired_dose"],
        }
    }

    /// Required inputs that are absent or zero
    pub fn missing_inputs(self, inputs: &InputMap) -> Vec<&'static str> {
        self.required_inputs()
            .iter()
            .copied()
            .filter(|name| input_value(inputs, name) == 0.0)
            .collect()
    }

    pub fn apply(self, inputs: &InputMap) -> Outcome {
        match self {
            SpecialCase::Tnk => tnk(input_value(inputs, "weight")),
            SpecialCase::LidoBolus => {
                let missing = self.missing_inputs(inputs);
                if !missing.is_empty() {
                    debug!(?missing, "LIDO_BOLUS missing input");
                    return Outcome::Text(FILL_IN_DATA.to_string());
                }
                lido_bolus(
                    input_value(inputs, "weight"),
                    input_value(inputs, "desired_dose"),
                )
            },
        }
    }
}

// Missing weight reads as 0 and lands in the lowest band.
fn tnk(weight: f64) -> Outcome {
    let dose = TNK_BANDS
        .iter()
        .find(|(upper, _)| weight < *upper)
        .map_or(TNK_MAX_DOSE, |(_, dose)| *dose);
    debug!(weight, dose, "TNK band selected");
    Outcome::Text(dose.to_string())
}

fn lido_bolus(weight: f64, desired_dose: f64) -> Outcome {
    Outcome::Numeric(desired_dose * weight / LIDOCAINE_MG_PER_ML)
}

/// Run the protocol named by `id`
pub fn dispatch(id: &str, inputs: &InputMap) -> Outcome {
    match SpecialCase::from_id(id) {
        Some(case) => case.apply(inputs),
        None => {
            warn!("Unknown special case: {}", id);
            Outcome::Text(UNKNOWN_SPECIAL_CASE.to_string())
        },
    }
}
