//! Result rendering for text, JSON and YAML output

use anyhow::Result;
use clap::ValueEnum;
use colored::*;
use dose_calc::{Calculation, Formula, FormattedResult, LogicKind};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

/// Render `value` as JSON/YAML, or as the given text for text output
pub fn render<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce(&T) -> String,
) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => text(value),
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?.trim_end().to_string(),
    })
}

pub fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce(&T) -> String,
) -> Result<()> {
    println!("{}", render(format, value, text)?);
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct EvalReport {
    pub result: FormattedResult,
}

#[derive(Debug, Serialize)]
pub struct CalcReport {
    pub formula: String,
    pub kind: LogicKind,
    #[serde(flatten)]
    pub calculation: Calculation,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub target: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Catalog listing entry
#[derive(Debug, Serialize)]
pub struct FormulaSummary {
    pub name: String,
    pub description: Option<String>,
    pub result_unit: String,
    pub decimal_places: Option<u32>,
    pub dose_inputs: Vec<String>,
    pub rate_inputs: Vec<String>,
}

impl From<&Formula> for FormulaSummary {
    fn from(formula: &Formula) -> Self {
        let ids = |kind| -> Vec<String> {
            formula
                .inputs_for(kind)
                .into_iter()
                .map(|input| input.id.clone())
                .collect()
        };
        Self {
            name: formula.name.clone(),
            description: formula.description.clone(),
            result_unit: formula.result_unit.clone(),
            decimal_places: formula.decimal_places,
            dose_inputs: ids(LogicKind::Dose),
            rate_inputs: ids(LogicKind::Rate),
        }
    }
}

/// Diagnostic text stands out from numbers
fn paint_result(result: &FormattedResult) -> String {
    match result {
        FormattedResult::Absent => "-".dimmed().to_string(),
        FormattedResult::Number(number) => number.bright_green().to_string(),
        FormattedResult::Text(text) => text.yellow().to_string(),
    }
}

pub fn eval_text(report: &EvalReport) -> String {
    paint_result(&report.result)
}

pub fn calc_text(report: &CalcReport) -> String {
    let unit = &report.calculation.unit;
    let value = paint_result(&report.calculation.result);
    if unit.is_empty() || report.calculation.result.is_absent() {
        format!("{} {}: {}", report.formula.bright_cyan(), report.kind, value)
    } else {
        format!(
            "{} {}: {} {}",
            report.formula.bright_cyan(),
            report.kind,
            value,
            unit
        )
    }
}

pub fn validation_text(report: &ValidationReport) -> String {
    match &report.error {
        None => format!("{} {}", "OK".bright_green(), report.target),
        Some(error) => format!("{} {}: {}", "INVALID".red(), report.target, error),
    }
}

#[allow(clippy::ptr_arg)]
pub fn catalog_text(formulas: &Vec<FormulaSummary>) -> String {
    let mut lines = Vec::with_capacity(formulas.len() * 3);
    for formula in formulas {
        let unit = if formula.result_unit.is_empty() {
            String::new()
        } else {
            format!(" [{}]", formula.result_unit)
        };
        lines.push(format!("{}{}", formula.name.bright_yellow(), unit));
        if let Some(description) = &formula.description {
            lines.push(format!("  {}", description));
        }
        if !formula.dose_inputs.is_empty() {
            lines.push(format!("  dose inputs: {}", formula.dose_inputs.join(", ")));
        }
        if !formula.rate_inputs.is_empty() {
            lines.push(format!("  rate inputs: {}", formula.rate_inputs.join(", ")));
        }
    }
    lines.join("\n")
}
