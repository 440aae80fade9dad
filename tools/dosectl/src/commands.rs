//! Subcommand handlers
//!
//! Evaluation diagnostics are results, not failures: only unreadable files,
//! bad arguments and unknown formulas return `Err`.

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use dose_calc::{find_standard, standard_formulas, Evaluator, Formula, LogicKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::input::{self, Document};
use crate::output::{
    self, CalcReport, EvalReport, FormulaSummary, OutputFormat, ValidationReport,
};

#[derive(Debug, Args)]
pub struct EvalArgs {
    /// Logic definition JSON file, or - for stdin
    #[arg(short, long)]
    pub logic: PathBuf,

    /// Input value as name=value (repeatable)
    #[arg(short, long = "input", value_name = "NAME=VALUE")]
    pub inputs: Vec<String>,

    /// JSON object of input values
    #[arg(long)]
    pub inputs_json: Option<PathBuf>,

    /// Decimal places for numeric results (default from config)
    #[arg(short, long)]
    pub decimal_places: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Dose,
    Rate,
}

impl From<KindArg> for LogicKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Dose => LogicKind::Dose,
            KindArg::Rate => LogicKind::Rate,
        }
    }
}

#[derive(Debug, Args)]
pub struct CalcArgs {
    /// Standard formula name (case-insensitive)
    #[arg(required_unless_present = "formula_file")]
    pub formula: Option<String>,

    /// Formula JSON file to use instead of the standard catalog
    #[arg(long, conflicts_with = "formula")]
    pub formula_file: Option<PathBuf>,

    /// Which logic to run
    #[arg(short, long, value_enum, default_value = "dose")]
    pub kind: KindArg,

    /// Input value as name=value (repeatable)
    #[arg(short, long = "input", value_name = "NAME=VALUE")]
    pub inputs: Vec<String>,

    /// JSON object of input values
    #[arg(long)]
    pub inputs_json: Option<PathBuf>,
}

pub fn eval(evaluator: &Evaluator, args: &EvalArgs, format: OutputFormat) -> Result<()> {
    let logic = input::load_logic(&args.logic)?;
    let inputs = input::collect_inputs(&args.inputs, args.inputs_json.as_deref())?;
    debug!(
        "Evaluating {} tokens with {} inputs",
        logic.len(),
        inputs.len()
    );

    let report = EvalReport {
        result: evaluator.format(&logic, &inputs, args.decimal_places),
    };
    output::emit(format, &report, output::eval_text)
}

fn resolve_formula(args: &CalcArgs) -> Result<Formula> {
    match (&args.formula_file, &args.formula) {
        (Some(path), _) => input::load_formula(path),
        (None, Some(name)) => Ok(find_standard(name)?),
        (None, None) => bail!("Give a formula name or --formula-file"),
    }
}

pub fn calc(evaluator: &Evaluator, args: &CalcArgs, format: OutputFormat) -> Result<()> {
    let formula = resolve_formula(args)?;
    let kind = LogicKind::from(args.kind);
    let inputs = input::collect_inputs(&args.inputs, args.inputs_json.as_deref())?;

    let calculation = formula.calculate_with(evaluator, kind, &inputs)?;
    info!("Calculated {} {}", formula.name, kind);

    let report = CalcReport {
        formula: formula.name,
        kind: calculation.kind,
        calculation,
    };
    output::emit(format, &report, output::calc_text)
}

/// Validate a logic or formula file; `Ok(false)` when it is invalid
pub fn validate(evaluator: &Evaluator, path: &Path, format: OutputFormat) -> Result<bool> {
    let outcome = match input::load_document(path)? {
        Document::Logic(logic) => {
            dose_calc::validate_logic_with(&logic, evaluator.config()).map_err(|e| e.to_string())
        },
        Document::Formula(formula) => formula
            .validate_with(evaluator)
            .map_err(|e| e.to_string()),
    };

    let report = ValidationReport {
        target: path.display().to_string(),
        valid: outcome.is_ok(),
        error: outcome.err(),
    };
    output::emit(format, &report, output::validation_text)?;
    Ok(report.valid)
}

pub fn list(format: OutputFormat) -> Result<()> {
    let formulas = standard_formulas().context("Standard catalog is corrupt")?;
    let summaries: Vec<FormulaSummary> = formulas.iter().map(FormulaSummary::from).collect();
    output::emit(format, &summaries, output::catalog_text)
}
