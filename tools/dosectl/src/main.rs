//! dosectl - command-line front end for the dose-calc evaluator
//!
//! Evaluates stored logic definitions, runs dose/rate calculations against
//! the standard catalog, and validates formula files before they are saved.

mod commands;
mod input;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use common::{logging, DosecalcConfig, LogConfig};
use dose_calc::Evaluator;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::commands::{CalcArgs, EvalArgs};
use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "dosectl")]
#[command(about = "Clinical dosing formula evaluator")]
#[command(long_about = "Clinical dosing formula evaluator

Commands:
  eval        Evaluate a logic definition with input values
  calc        Run a formula's dose or rate calculation
  validate    Check a logic definition or formula file
  list        List the standard formula catalog
  config      Show the effective configuration

Examples:
  dosectl eval --logic logic.json -i weight=70
  dosectl calc \"Levophed 8:250\" -i rate=10 -i weight=50
  dosectl calc \"Levophed 8:250\" --kind rate -i weight=50 -i max_dose=0.1
  dosectl validate formula.json
  dosectl --output json list")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Configuration file (default: config/dosecalc.yaml if present)
    #[arg(short, long, global = true, env = "DOSECALC_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a logic definition
    #[command(about = "Evaluate a logic definition with input values")]
    Eval(EvalArgs),

    /// Run a formula calculation
    #[command(about = "Run a standard or file formula's dose or rate calculation")]
    Calc(CalcArgs),

    /// Validate a logic or formula file
    #[command(about = "Check a logic definition or formula file without evaluating it")]
    Validate {
        /// JSON file holding a logic array or a formula object
        file: PathBuf,
    },

    /// List standard formulas
    #[command(about = "List the standard formula catalog with declared inputs")]
    List,

    /// Show configuration
    #[command(about = "Show the effective configuration after file and environment overrides")]
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "ERROR".red(), e);
            ExitCode::FAILURE
        },
    }
}

fn run(cli: Cli) -> Result<bool> {
    let config = DosecalcConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let mut log_config = LogConfig::from(&config.logging);
    if cli.verbose {
        log_config.level = "debug".to_string();
    }
    log_config.ansi = !cli.no_color;
    logging::init_with_config(&log_config).context("Failed to initialize logging")?;

    let evaluator = Evaluator::new(config.evaluator.clone());

    match cli.command {
        Commands::Eval(args) => commands::eval(&evaluator, &args, cli.output)?,
        Commands::Calc(args) => commands::calc(&evaluator, &args, cli.output)?,
        Commands::Validate { file } => {
            return commands::validate(&evaluator, &file, cli.output);
        },
        Commands::List => commands::list(cli.output)?,
        Commands::Config => show_config(&config, cli.output)?,
    }

    Ok(true)
}

fn show_config(config: &DosecalcConfig, format: OutputFormat) -> Result<()> {
    let yaml = config.to_yaml().context("Failed to render configuration")?;
    output::emit(format, config, |_| yaml.trim_end().to_string())
}
